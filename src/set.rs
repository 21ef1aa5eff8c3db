//! # Blob Set Module
//!
//! A blob set presents many blobs as one logical stream.  Blobs are copied
//! in at construction and sorted ascending by start time (stable, so equal
//! start times keep their input order).  Iteration yields
//! `(global_index, item)` pairs where the global index concatenates
//! per-blob counts in sort order, skipping blobs that lack the metric.
//!
//! Metric ids belong to exactly one category, so the mixed set's shared
//! timestamp and tag accessors consult the numeric list first and fall back
//! to the text list only when no numeric blob carries the id.

use log::debug;
use crate::blob::{self,Blob};
use crate::blob::numeric::{NumericBlob,NumericPoint};
use crate::blob::text::{TextBlob,TextPoint};
use crate::Result;

/// Chronologically sorted numeric blobs with global indexing.
pub struct NumericBlobSet {
    blobs: Vec<NumericBlob>
}

impl NumericBlobSet {
    /// Take ownership of the blobs and sort them by start time.
    pub fn new(mut blobs: Vec<NumericBlob>) -> Self {
        blobs.sort_by_key(|b| b.start_micros());
        Self { blobs }
    }
    pub fn blob_count(&self) -> usize {
        self.blobs.len()
    }
    pub fn is_empty(&self) -> bool {
        self.blobs.is_empty()
    }
    pub fn blobs(&self) -> &[NumericBlob] {
        &self.blobs
    }
    pub fn has_metric_id(&self,id: u64) -> bool {
        self.blobs.iter().any(|b| b.has_metric_id(id))
    }
    pub fn has_metric_name(&self,name: &str) -> bool {
        self.has_metric_id(self.resolve(name))
    }
    /// Union of metric ids across all blobs, in first-seen sort order.
    pub fn metric_ids(&self) -> Vec<u64> {
        let mut seen = std::collections::HashSet::new();
        let mut ans = Vec::new();
        for b in &self.blobs {
            for id in b.metric_ids() {
                if seen.insert(id) {
                    ans.push(id);
                }
            }
        }
        ans
    }
    /// Total point count for a metric across all blobs.
    pub fn len(&self,id: u64) -> usize {
        self.blobs.iter().map(|b| b.len(id)).sum()
    }
    pub fn len_by_name(&self,name: &str) -> usize {
        self.len(self.resolve(name))
    }
    /// Resolve a name against the first blob that records it, then the hash.
    pub(crate) fn resolve(&self,name: &str) -> u64 {
        for b in &self.blobs {
            if let Some(id) = b.name_table().and_then(|t| t.get(name)) {
                return *id;
            }
        }
        crate::metric_id(name)
    }

    /// Iterate a metric across all blobs with global indices.
    pub fn all(&self,id: u64) -> impl Iterator<Item = (usize,NumericPoint)> + '_ {
        self.blobs.iter().flat_map(move |b| b.all(id)).enumerate()
    }
    pub fn all_by_name(&self,name: &str) -> impl Iterator<Item = (usize,NumericPoint)> + '_ {
        self.all(self.resolve(name))
    }
    pub fn all_timestamps(&self,id: u64) -> impl Iterator<Item = (usize,i64)> + '_ {
        self.blobs.iter().flat_map(move |b| b.all_timestamps(id)).enumerate()
    }
    pub fn all_values(&self,id: u64) -> impl Iterator<Item = (usize,f64)> + '_ {
        self.blobs.iter().flat_map(move |b| b.all_values(id)).enumerate()
    }
    pub fn all_tags(&self,id: u64) -> impl Iterator<Item = (usize,String)> + '_ {
        self.blobs.iter().flat_map(move |b| b.all_tags(id)).enumerate()
    }
    pub fn all_timestamps_by_name(&self,name: &str) -> impl Iterator<Item = (usize,i64)> + '_ {
        self.all_timestamps(self.resolve(name))
    }
    pub fn all_values_by_name(&self,name: &str) -> impl Iterator<Item = (usize,f64)> + '_ {
        self.all_values(self.resolve(name))
    }
    pub fn all_tags_by_name(&self,name: &str) -> impl Iterator<Item = (usize,String)> + '_ {
        self.all_tags(self.resolve(name))
    }

    /// Locate the blob holding global index `i` and delegate with the local index.
    fn locate(&self,id: u64,i: usize) -> Option<(&NumericBlob,usize)> {
        let mut offset = 0;
        for b in &self.blobs {
            let n = b.len(id);
            if offset + n > i {
                return Some((b,i - offset));
            }
            offset += n;
        }
        None
    }
    pub fn timestamp_at(&self,id: u64,i: usize) -> Option<i64> {
        self.locate(id,i).and_then(|(b,local)| b.timestamp_at(id,local))
    }
    pub fn value_at(&self,id: u64,i: usize) -> Option<f64> {
        self.locate(id,i).and_then(|(b,local)| b.value_at(id,local))
    }
    pub fn tag_at(&self,id: u64,i: usize) -> Option<String> {
        self.locate(id,i).and_then(|(b,local)| b.tag_at(id,local))
    }
    pub fn numeric_at(&self,id: u64,i: usize) -> Option<NumericPoint> {
        self.locate(id,i).and_then(|(b,local)| b.numeric_at(id,local))
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

    /// Span between a metric's first and last stored timestamps; 0 when the
    /// metric has fewer than two points or the pair is not increasing.
    pub fn duration(&self,id: u64) -> i64 {
        if self.len(id) < 2 {
            return 0;
        }
        let first = self.blobs.iter()
            .find(|b| b.len(id) > 0)
            .and_then(|b| b.timestamp_at(id,0));
        let last = self.blobs.iter().rev()
            .find(|b| b.len(id) > 0)
            .and_then(|b| b.timestamp_at(id,b.len(id)-1));
        match (first,last) {
            (Some(first),Some(last)) if last > first => last - first,
            _ => 0
        }
    }
}

/// Chronologically sorted text blobs with global indexing.
pub struct TextBlobSet {
    blobs: Vec<TextBlob>
}

impl TextBlobSet {
    /// Take ownership of the blobs and sort them by start time.
    pub fn new(mut blobs: Vec<TextBlob>) -> Self {
        blobs.sort_by_key(|b| b.start_micros());
        Self { blobs }
    }
    pub fn blob_count(&self) -> usize {
        self.blobs.len()
    }
    pub fn is_empty(&self) -> bool {
        self.blobs.is_empty()
    }
    pub fn blobs(&self) -> &[TextBlob] {
        &self.blobs
    }
    pub fn has_metric_id(&self,id: u64) -> bool {
        self.blobs.iter().any(|b| b.has_metric_id(id))
    }
    pub fn has_metric_name(&self,name: &str) -> bool {
        self.has_metric_id(self.resolve(name))
    }
    pub fn metric_ids(&self) -> Vec<u64> {
        let mut seen = std::collections::HashSet::new();
        let mut ans = Vec::new();
        for b in &self.blobs {
            for id in b.metric_ids() {
                if seen.insert(id) {
                    ans.push(id);
                }
            }
        }
        ans
    }
    pub fn len(&self,id: u64) -> usize {
        self.blobs.iter().map(|b| b.len(id)).sum()
    }
    pub fn len_by_name(&self,name: &str) -> usize {
        self.len(self.resolve(name))
    }
    pub(crate) fn resolve(&self,name: &str) -> u64 {
        for b in &self.blobs {
            if let Some(id) = b.name_table().and_then(|t| t.get(name)) {
                return *id;
            }
        }
        crate::metric_id(name)
    }

    pub fn all(&self,id: u64) -> impl Iterator<Item = (usize,TextPoint)> + '_ {
        self.blobs.iter().flat_map(move |b| b.all(id)).enumerate()
    }
    pub fn all_by_name(&self,name: &str) -> impl Iterator<Item = (usize,TextPoint)> + '_ {
        self.all(self.resolve(name))
    }
    pub fn all_timestamps(&self,id: u64) -> impl Iterator<Item = (usize,i64)> + '_ {
        self.blobs.iter().flat_map(move |b| b.all_timestamps(id)).enumerate()
    }
    pub fn all_text_values(&self,id: u64) -> impl Iterator<Item = (usize,String)> + '_ {
        self.blobs.iter().flat_map(move |b| b.all_text_values(id)).enumerate()
    }
    pub fn all_tags(&self,id: u64) -> impl Iterator<Item = (usize,String)> + '_ {
        self.blobs.iter().flat_map(move |b| b.all_tags(id)).enumerate()
    }
    pub fn all_timestamps_by_name(&self,name: &str) -> impl Iterator<Item = (usize,i64)> + '_ {
        self.all_timestamps(self.resolve(name))
    }
    pub fn all_text_values_by_name(&self,name: &str) -> impl Iterator<Item = (usize,String)> + '_ {
        self.all_text_values(self.resolve(name))
    }
    pub fn all_tags_by_name(&self,name: &str) -> impl Iterator<Item = (usize,String)> + '_ {
        self.all_tags(self.resolve(name))
    }

    fn locate(&self,id: u64,i: usize) -> Option<(&TextBlob,usize)> {
        let mut offset = 0;
        for b in &self.blobs {
            let n = b.len(id);
            if offset + n > i {
                return Some((b,i - offset));
            }
            offset += n;
        }
        None
    }
    pub fn text_at(&self,id: u64,i: usize) -> Option<TextPoint> {
        self.locate(id,i).and_then(|(b,local)| b.text_at(id,local))
    }
    pub fn timestamp_at(&self,id: u64,i: usize) -> Option<i64> {
        self.locate(id,i).and_then(|(b,local)| b.timestamp_at(id,local))
    }
    pub fn text_value_at(&self,id: u64,i: usize) -> Option<String> {
        self.locate(id,i).and_then(|(b,local)| b.text_value_at(id,local))
    }
    pub fn tag_at(&self,id: u64,i: usize) -> Option<String> {
        self.locate(id,i).and_then(|(b,local)| b.tag_at(id,local))
    }
    pub fn text_at_by_name(&self,name: &str,i: usize) -> Option<TextPoint> {
        self.text_at(self.resolve(name),i)
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

    pub fn duration(&self,id: u64) -> i64 {
        if self.len(id) < 2 {
            return 0;
        }
        let first = self.blobs.iter()
            .find(|b| b.len(id) > 0)
            .and_then(|b| b.timestamp_at(id,0));
        let last = self.blobs.iter().rev()
            .find(|b| b.len(id) > 0)
            .and_then(|b| b.timestamp_at(id,b.len(id)-1));
        match (first,last) {
            (Some(first),Some(last)) if last > first => last - first,
            _ => 0
        }
    }
}

/// A mixed blob set: two independent typed lists behind one surface.
pub struct BlobSet {
    numerics: NumericBlobSet,
    texts: TextBlobSet
}

impl BlobSet {
    pub fn new(numerics: Vec<NumericBlob>,texts: Vec<TextBlob>) -> Self {
        Self {
            numerics: NumericBlobSet::new(numerics),
            texts: TextBlobSet::new(texts)
        }
    }
    /// Classify each byte sequence by magic number and decode it into the
    /// matching list.  The first failure, including an unrecognized magic
    /// number, aborts the whole decode.
    pub fn decode(inputs: &[Vec<u8>]) -> Result<Self> {
        let mut numerics = Vec::new();
        let mut texts = Vec::new();
        for bytes in inputs {
            match blob::decode(bytes)? {
                Blob::Numeric(b) => numerics.push(b),
                Blob::Text(b) => texts.push(b)
            }
        }
        debug!("mixed decode: {} numeric, {} text",numerics.len(),texts.len());
        Ok(Self::new(numerics,texts))
    }
    pub fn numerics(&self) -> &NumericBlobSet {
        &self.numerics
    }
    pub fn texts(&self) -> &TextBlobSet {
        &self.texts
    }
    /// True iff at least one numeric blob contains the id.
    pub fn is_numeric_metric(&self,id: u64) -> bool {
        self.numerics.has_metric_id(id)
    }
    /// True iff at least one text blob contains the id.
    pub fn is_text_metric(&self,id: u64) -> bool {
        self.texts.has_metric_id(id)
    }
    fn resolve(&self,name: &str) -> u64 {
        for b in self.numerics.blobs() {
            if let Some(id) = b.name_table().and_then(|t| t.get(name)) {
                return *id;
            }
        }
        for b in self.texts.blobs() {
            if let Some(id) = b.name_table().and_then(|t| t.get(name)) {
                return *id;
            }
        }
        crate::metric_id(name)
    }

    pub fn all_numerics(&self,id: u64) -> impl Iterator<Item = (usize,NumericPoint)> + '_ {
        self.numerics.all(id)
    }
    pub fn all_texts(&self,id: u64) -> impl Iterator<Item = (usize,TextPoint)> + '_ {
        self.texts.all(id)
    }
    pub fn all_numeric_values(&self,id: u64) -> impl Iterator<Item = (usize,f64)> + '_ {
        self.numerics.all_values(id)
    }
    pub fn all_text_values(&self,id: u64) -> impl Iterator<Item = (usize,String)> + '_ {
        self.texts.all_text_values(id)
    }
    /// Timestamps from whichever category holds the id, numeric first.
    pub fn all_timestamps(&self,id: u64) -> Box<dyn Iterator<Item = (usize,i64)> + '_> {
        match self.numerics.has_metric_id(id) {
            true => Box::new(self.numerics.all_timestamps(id)),
            false => Box::new(self.texts.all_timestamps(id))
        }
    }
    /// Tags from whichever category holds the id, numeric first.
    pub fn all_tags(&self,id: u64) -> Box<dyn Iterator<Item = (usize,String)> + '_> {
        match self.numerics.has_metric_id(id) {
            true => Box::new(self.numerics.all_tags(id)),
            false => Box::new(self.texts.all_tags(id))
        }
    }
    pub fn all_numerics_by_name(&self,name: &str) -> impl Iterator<Item = (usize,NumericPoint)> + '_ {
        self.all_numerics(self.resolve(name))
    }
    pub fn all_texts_by_name(&self,name: &str) -> impl Iterator<Item = (usize,TextPoint)> + '_ {
        self.all_texts(self.resolve(name))
    }
    pub fn all_numeric_values_by_name(&self,name: &str) -> impl Iterator<Item = (usize,f64)> + '_ {
        self.all_numeric_values(self.resolve(name))
    }
    pub fn all_text_values_by_name(&self,name: &str) -> impl Iterator<Item = (usize,String)> + '_ {
        self.all_text_values(self.resolve(name))
    }
    pub fn all_timestamps_by_name(&self,name: &str) -> Box<dyn Iterator<Item = (usize,i64)> + '_> {
        self.all_timestamps(self.resolve(name))
    }
    pub fn all_tags_by_name(&self,name: &str) -> Box<dyn Iterator<Item = (usize,String)> + '_> {
        self.all_tags(self.resolve(name))
    }

    pub fn numeric_at(&self,id: u64,i: usize) -> Option<NumericPoint> {
        self.numerics.numeric_at(id,i)
    }
    pub fn text_at(&self,id: u64,i: usize) -> Option<TextPoint> {
        self.texts.text_at(id,i)
    }
    pub fn value_at(&self,id: u64,i: usize) -> Option<f64> {
        self.numerics.value_at(id,i)
    }
    pub fn text_value_at(&self,id: u64,i: usize) -> Option<String> {
        self.texts.text_value_at(id,i)
    }
    pub fn timestamp_at(&self,id: u64,i: usize) -> Option<i64> {
        match self.numerics.has_metric_id(id) {
            true => self.numerics.timestamp_at(id,i),
            false => self.texts.timestamp_at(id,i)
        }
    }
    pub fn tag_at(&self,id: u64,i: usize) -> Option<String> {
        match self.numerics.has_metric_id(id) {
            true => self.numerics.tag_at(id,i),
            false => self.texts.tag_at(id,i)
        }
    }
    pub fn numeric_at_by_name(&self,name: &str,i: usize) -> Option<NumericPoint> {
        self.numeric_at(self.resolve(name),i)
    }
    pub fn text_at_by_name(&self,name: &str,i: usize) -> Option<TextPoint> {
        self.text_at(self.resolve(name),i)
    }
    pub fn value_at_by_name(&self,name: &str,i: usize) -> Option<f64> {
        self.value_at(self.resolve(name),i)
    }
    pub fn text_value_at_by_name(&self,name: &str,i: usize) -> Option<String> {
        self.text_value_at(self.resolve(name),i)
    }
    pub fn timestamp_at_by_name(&self,name: &str,i: usize) -> Option<i64> {
        self.timestamp_at(self.resolve(name),i)
    }
    pub fn tag_at_by_name(&self,name: &str,i: usize) -> Option<String> {
        self.tag_at(self.resolve(name),i)
    }

    /// Total point count in whichever category holds the id.
    pub fn metric_len(&self,id: u64) -> usize {
        match self.numerics.has_metric_id(id) {
            true => self.numerics.len(id),
            false => self.texts.len(id)
        }
    }
    /// Span between first and last stored timestamps of the metric.
    pub fn metric_duration(&self,id: u64) -> i64 {
        match self.numerics.has_metric_id(id) {
            true => self.numerics.duration(id),
            false => self.texts.duration(id)
        }
    }
    pub fn metric_len_by_name(&self,name: &str) -> usize {
        self.metric_len(self.resolve(name))
    }
    pub fn metric_duration_by_name(&self,name: &str) -> i64 {
        self.metric_duration(self.resolve(name))
    }
}
