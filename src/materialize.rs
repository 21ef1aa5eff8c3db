//! # Materialization Module
//!
//! Materializing decodes a metric (or every metric) into flat arrays so
//! that every subsequent lookup is a bounds-checked array index, O(1)
//! regardless of the underlying encoding.  The produced views own their
//! arrays outright; the source blobs may be dropped afterwards.
//!
//! Tags are materialized iff at least one contributing blob carries tags;
//! points from tagless blobs contribute empty strings so the arrays stay
//! index-aligned.  With no tagged contributor the tag array is empty and
//! `tag_at` reports the empty string for any in-range index.

use std::collections::HashMap;
use crate::blob::numeric::{NumericBlob,NumericPoint};
use crate::blob::text::{TextBlob,TextPoint};
use crate::set::{NumericBlobSet,TextBlobSet};

/// One numeric metric decoded into flat arrays.
#[derive(Clone,Debug,Default)]
pub struct MaterializedNumericMetric {
    pub id: u64,
    pub timestamps: Vec<i64>,
    pub values: Vec<f64>,
    /// empty when no contributing blob carried tags
    pub tags: Vec<String>
}

impl MaterializedNumericMetric {
    pub fn len(&self) -> usize {
        self.timestamps.len()
    }
    pub fn is_empty(&self) -> bool {
        self.timestamps.is_empty()
    }
    pub fn timestamp_at(&self,i: usize) -> Option<i64> {
        self.timestamps.get(i).copied()
    }
    pub fn value_at(&self,i: usize) -> Option<f64> {
        self.values.get(i).copied()
    }
    /// Empty string for any in-range index when tags were not materialized.
    pub fn tag_at(&self,i: usize) -> Option<String> {
        if i >= self.len() {
            return None;
        }
        Some(self.tags.get(i).cloned().unwrap_or_default())
    }
    pub fn numeric_at(&self,i: usize) -> Option<NumericPoint> {
        Some(NumericPoint {
            ts: self.timestamp_at(i)?,
            val: self.value_at(i)?,
            tag: self.tag_at(i)?
        })
    }
}

/// One text metric decoded into flat arrays.
#[derive(Clone,Debug,Default)]
pub struct MaterializedTextMetric {
    pub id: u64,
    pub timestamps: Vec<i64>,
    pub values: Vec<String>,
    pub tags: Vec<String>
}

impl MaterializedTextMetric {
    pub fn len(&self) -> usize {
        self.timestamps.len()
    }
    pub fn is_empty(&self) -> bool {
        self.timestamps.is_empty()
    }
    pub fn timestamp_at(&self,i: usize) -> Option<i64> {
        self.timestamps.get(i).copied()
    }
    pub fn text_value_at(&self,i: usize) -> Option<String> {
        self.values.get(i).cloned()
    }
    pub fn tag_at(&self,i: usize) -> Option<String> {
        if i >= self.len() {
            return None;
        }
        Some(self.tags.get(i).cloned().unwrap_or_default())
    }
    pub fn text_at(&self,i: usize) -> Option<TextPoint> {
        Some(TextPoint {
            ts: self.timestamp_at(i)?,
            val: self.text_value_at(i)?,
            tag: self.tag_at(i)?
        })
    }
}

/// All numeric metrics of a blob or blob set, decoded into flat arrays.
pub struct MaterializedNumeric {
    metrics: Vec<MaterializedNumericMetric>,
    by_id: HashMap<u64,usize>,
    names: HashMap<String,u64>
}

impl MaterializedNumeric {
    fn build(metrics: Vec<MaterializedNumericMetric>,names: HashMap<String,u64>) -> Self {
        let by_id = metrics.iter().enumerate().map(|(i,m)| (m.id,i)).collect();
        Self { metrics, by_id, names }
    }
    pub fn metric_count(&self) -> usize {
        self.metrics.len()
    }
    pub fn metric_ids(&self) -> Vec<u64> {
        self.metrics.iter().map(|m| m.id).collect()
    }
    pub fn has_metric_id(&self,id: u64) -> bool {
        self.by_id.contains_key(&id)
    }
    pub fn has_metric_name(&self,name: &str) -> bool {
        self.has_metric_id(self.resolve(name))
    }
    fn resolve(&self,name: &str) -> u64 {
        match self.names.get(name) {
            Some(id) => *id,
            None => crate::metric_id(name)
        }
    }
    pub fn metric(&self,id: u64) -> Option<&MaterializedNumericMetric> {
        self.by_id.get(&id).map(|i| &self.metrics[*i])
    }
    pub fn metric_by_name(&self,name: &str) -> Option<&MaterializedNumericMetric> {
        self.metric(self.resolve(name))
    }
    pub fn len(&self,id: u64) -> usize {
        self.metric(id).map(|m| m.len()).unwrap_or(0)
    }
    pub fn timestamp_at(&self,id: u64,i: usize) -> Option<i64> {
        self.metric(id)?.timestamp_at(i)
    }
    pub fn value_at(&self,id: u64,i: usize) -> Option<f64> {
        self.metric(id)?.value_at(i)
    }
    pub fn tag_at(&self,id: u64,i: usize) -> Option<String> {
        self.metric(id)?.tag_at(i)
    }
    pub fn numeric_at(&self,id: u64,i: usize) -> Option<NumericPoint> {
        self.metric(id)?.numeric_at(i)
    }
    pub fn timestamp_at_by_name(&self,name: &str,i: usize) -> Option<i64> {
        self.timestamp_at(self.resolve(name),i)
    }
    pub fn value_at_by_name(&self,name: &str,i: usize) -> Option<f64> {
        self.value_at(self.resolve(name),i)
    }
    pub fn tag_at_by_name(&self,name: &str,i: usize) -> Option<String> {
        self.tag_at(self.resolve(name),i)
    }
    pub fn numeric_at_by_name(&self,name: &str,i: usize) -> Option<NumericPoint> {
        self.numeric_at(self.resolve(name),i)
    }
}

/// All text metrics of a blob or blob set, decoded into flat arrays.
pub struct MaterializedText {
    metrics: Vec<MaterializedTextMetric>,
    by_id: HashMap<u64,usize>,
    names: HashMap<String,u64>
}

impl MaterializedText {
    fn build(metrics: Vec<MaterializedTextMetric>,names: HashMap<String,u64>) -> Self {
        let by_id = metrics.iter().enumerate().map(|(i,m)| (m.id,i)).collect();
        Self { metrics, by_id, names }
    }
    pub fn metric_count(&self) -> usize {
        self.metrics.len()
    }
    pub fn metric_ids(&self) -> Vec<u64> {
        self.metrics.iter().map(|m| m.id).collect()
    }
    pub fn has_metric_id(&self,id: u64) -> bool {
        self.by_id.contains_key(&id)
    }
    pub fn has_metric_name(&self,name: &str) -> bool {
        self.has_metric_id(self.resolve(name))
    }
    fn resolve(&self,name: &str) -> u64 {
        match self.names.get(name) {
            Some(id) => *id,
            None => crate::metric_id(name)
        }
    }
    pub fn metric(&self,id: u64) -> Option<&MaterializedTextMetric> {
        self.by_id.get(&id).map(|i| &self.metrics[*i])
    }
    pub fn metric_by_name(&self,name: &str) -> Option<&MaterializedTextMetric> {
        self.metric(self.resolve(name))
    }
    pub fn len(&self,id: u64) -> usize {
        self.metric(id).map(|m| m.len()).unwrap_or(0)
    }
    pub fn timestamp_at(&self,id: u64,i: usize) -> Option<i64> {
        self.metric(id)?.timestamp_at(i)
    }
    pub fn text_value_at(&self,id: u64,i: usize) -> Option<String> {
        self.metric(id)?.text_value_at(i)
    }
    pub fn tag_at(&self,id: u64,i: usize) -> Option<String> {
        self.metric(id)?.tag_at(i)
    }
    pub fn text_at(&self,id: u64,i: usize) -> Option<TextPoint> {
        self.metric(id)?.text_at(i)
    }
    pub fn timestamp_at_by_name(&self,name: &str,i: usize) -> Option<i64> {
        self.timestamp_at(self.resolve(name),i)
    }
    pub fn text_value_at_by_name(&self,name: &str,i: usize) -> Option<String> {
        self.text_value_at(self.resolve(name),i)
    }
    pub fn tag_at_by_name(&self,name: &str,i: usize) -> Option<String> {
        self.tag_at(self.resolve(name),i)
    }
    pub fn text_at_by_name(&self,name: &str,i: usize) -> Option<TextPoint> {
        self.text_at(self.resolve(name),i)
    }
}

fn numeric_metric_from_blobs<'a,I>(blobs: I,id: u64,capacity: usize,any_tags: bool) -> MaterializedNumericMetric
where I: IntoIterator<Item = &'a NumericBlob> {
    let mut m = MaterializedNumericMetric {
        id,
        timestamps: Vec::with_capacity(capacity),
        values: Vec::with_capacity(capacity),
        tags: match any_tags {
            true => Vec::with_capacity(capacity),
            false => Vec::new()
        }
    };
    for b in blobs {
        let n = b.len(id);
        if n == 0 {
            continue;
        }
        m.timestamps.extend(b.all_timestamps(id));
        m.values.extend(b.all_values(id));
        if any_tags {
            match b.has_tags() {
                true => m.tags.extend(b.all_tags(id)),
                false => m.tags.extend(std::iter::repeat(String::new()).take(n))
            }
        }
    }
    m
}

fn text_metric_from_blobs<'a,I>(blobs: I,id: u64,capacity: usize,any_tags: bool) -> MaterializedTextMetric
where I: IntoIterator<Item = &'a TextBlob> {
    let mut m = MaterializedTextMetric {
        id,
        timestamps: Vec::with_capacity(capacity),
        values: Vec::with_capacity(capacity),
        tags: match any_tags {
            true => Vec::with_capacity(capacity),
            false => Vec::new()
        }
    };
    for b in blobs {
        let n = b.len(id);
        if n == 0 {
            continue;
        }
        for p in b.all(id) {
            m.timestamps.push(p.ts);
            m.values.push(p.val);
            if any_tags {
                m.tags.push(p.tag);
            }
        }
    }
    m
}

impl NumericBlob {
    /// Decode every metric of this blob into flat arrays.
    pub fn materialize(&self) -> MaterializedNumeric {
        let metrics = self.metric_ids().iter()
            .map(|id| numeric_metric_from_blobs([self],*id,self.len(*id),self.has_tags()))
            .collect();
        let names = self.metric_names().iter()
            .map(|n| (n.clone(),self.resolve(n)))
            .collect();
        MaterializedNumeric::build(metrics,names)
    }
    /// Decode one metric into flat arrays; `None` when the id is absent.
    pub fn materialize_metric(&self,id: u64) -> Option<MaterializedNumericMetric> {
        if !self.has_metric_id(id) {
            return None;
        }
        Some(numeric_metric_from_blobs([self],id,self.len(id),self.has_tags()))
    }
    pub fn materialize_metric_by_name(&self,name: &str) -> Option<MaterializedNumericMetric> {
        self.materialize_metric(self.resolve(name))
    }
}

impl TextBlob {
    /// Decode every metric of this blob into flat arrays.
    pub fn materialize(&self) -> MaterializedText {
        let metrics = self.metric_ids().iter()
            .map(|id| text_metric_from_blobs([self],*id,self.len(*id),self.has_tags()))
            .collect();
        let names = self.metric_names().iter()
            .map(|n| (n.clone(),self.resolve(n)))
            .collect();
        MaterializedText::build(metrics,names)
    }
    pub fn materialize_metric(&self,id: u64) -> Option<MaterializedTextMetric> {
        if !self.has_metric_id(id) {
            return None;
        }
        Some(text_metric_from_blobs([self],id,self.len(id),self.has_tags()))
    }
    pub fn materialize_metric_by_name(&self,name: &str) -> Option<MaterializedTextMetric> {
        self.materialize_metric(self.resolve(name))
    }
}

impl NumericBlobSet {
    /// Decode every metric across every blob into flat arrays, appending in
    /// sorted-blob order.  The name table is the union of per-blob tables.
    pub fn materialize(&self) -> MaterializedNumeric {
        let metrics = self.metric_ids().iter()
            .map(|id| {
                let any_tags = self.blobs().iter().any(|b| b.has_metric_id(*id) && b.has_tags());
                numeric_metric_from_blobs(self.blobs(),*id,self.len(*id),any_tags)
            })
            .collect();
        let mut names = HashMap::new();
        for b in self.blobs() {
            if let Some(table) = b.name_table() {
                for (name,id) in table {
                    names.entry(name.clone()).or_insert(*id);
                }
            }
        }
        MaterializedNumeric::build(metrics,names)
    }
    /// Decode one metric across the whole set; `None` when no blob has it.
    pub fn materialize_metric(&self,id: u64) -> Option<MaterializedNumericMetric> {
        if !self.has_metric_id(id) {
            return None;
        }
        let any_tags = self.blobs().iter().any(|b| b.has_metric_id(id) && b.has_tags());
        Some(numeric_metric_from_blobs(self.blobs(),id,self.len(id),any_tags))
    }
    pub fn materialize_metric_by_name(&self,name: &str) -> Option<MaterializedNumericMetric> {
        self.materialize_metric(self.resolve(name))
    }
}

impl TextBlobSet {
    /// Decode every metric across every blob into flat arrays, appending in
    /// sorted-blob order.  The name table is the union of per-blob tables.
    pub fn materialize(&self) -> MaterializedText {
        let metrics = self.metric_ids().iter()
            .map(|id| {
                let any_tags = self.blobs().iter().any(|b| b.has_metric_id(*id) && b.has_tags());
                text_metric_from_blobs(self.blobs(),*id,self.len(*id),any_tags)
            })
            .collect();
        let mut names = HashMap::new();
        for b in self.blobs() {
            if let Some(table) = b.name_table() {
                for (name,id) in table {
                    names.entry(name.clone()).or_insert(*id);
                }
            }
        }
        MaterializedText::build(metrics,names)
    }
    pub fn materialize_metric(&self,id: u64) -> Option<MaterializedTextMetric> {
        if !self.has_metric_id(id) {
            return None;
        }
        let any_tags = self.blobs().iter().any(|b| b.has_metric_id(id) && b.has_tags());
        Some(text_metric_from_blobs(self.blobs(),id,self.len(id),any_tags))
    }
    pub fn materialize_metric_by_name(&self,name: &str) -> Option<MaterializedTextMetric> {
        self.materialize_metric(self.resolve(name))
    }
}
