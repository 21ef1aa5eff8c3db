//! # Numeric blobs
//!
//! A numeric blob stores three parallel columns: timestamps, `f64` values,
//! and (optionally) tags.  Each metric occupies a contiguous slice of each
//! column, located by its index entry.  The encoder is a one-shot builder
//! driven metric by metric; the decoded blob is immutable and safe to share.

use std::collections::{HashMap,HashSet};
use log::debug;
use crate::codec::{TimestampEncoding,ValueEncoding};
use crate::codec::compress::{self,Compression};
use crate::codec::timestamp::{self,DeltaTimestamps,RawTimestamps,Timestamps,TimestampWriter};
use crate::codec::value::{self,GorillaValues,RawValues,Values,ValueWriter};
use crate::codec::tag::{self,Tags,TagWriter};
use crate::{Error,Result,MAX_METRICS,MAX_STR_BYTES};
use super::{append_crc,check_crc,parse_name_table,resolve_name,write_name_table,
    BlobOptions,Header,NumericEntry,
    NUMERIC_ENTRY_LEN,NUMERIC_HEADER_LEN,NUMERIC_MAGIC,FORMAT_VERSION};

/// One decoded numeric data point.
#[derive(Clone,Debug,PartialEq)]
pub struct NumericPoint {
    pub ts: i64,
    pub val: f64,
    pub tag: String
}

struct OpenMetric {
    id: u64,
    expected: usize,
    emitted: usize,
    ts: TimestampWriter,
    val: ValueWriter,
    tags: Option<TagWriter>
}

/// Builds a numeric blob one metric at a time.
///
/// The legal call sequence is `start_metric_* (add_point* end_metric)` per
/// metric, then `finish`, which consumes the encoder and returns the
/// finalized byte sequence.  Anything else is rejected with
/// `Error::InvalidState`.
pub struct NumericEncoder {
    opts: BlobOptions,
    start_micros: i64,
    ts_col: Vec<u8>,
    val_col: Vec<u8>,
    tag_col: Vec<u8>,
    entries: Vec<NumericEntry>,
    ids: HashSet<u64>,
    names: Vec<(u64,String)>,
    open: Option<OpenMetric>
}

impl NumericEncoder {
    pub fn new(start_micros: i64,opts: BlobOptions) -> Self {
        Self {
            opts,
            start_micros,
            ts_col: Vec::new(),
            val_col: Vec::new(),
            tag_col: Vec::new(),
            entries: Vec::new(),
            ids: HashSet::new(),
            names: Vec::new(),
            open: None
        }
    }
    fn start(&mut self,id: u64,name: Option<String>,expected: usize) -> Result<()> {
        if self.open.is_some() {
            return Err(Error::InvalidState("previous metric is still open"));
        }
        if self.entries.len() + 1 > MAX_METRICS {
            return Err(Error::CapacityExceeded("too many metrics in one blob"));
        }
        if !self.ids.insert(id) {
            return Err(Error::InvalidState("metric id already in blob"));
        }
        if let Some(name) = name {
            self.names.push((id,name));
        }
        self.open = Some(OpenMetric {
            id,
            expected,
            emitted: 0,
            ts: TimestampWriter::new(self.opts.ts_encoding,self.opts.endian,self.start_micros,expected),
            val: ValueWriter::new(self.opts.value_encoding,self.opts.endian,expected),
            tags: match self.opts.tags_enabled {
                true => Some(TagWriter::new(expected*4)),
                false => None
            }
        });
        Ok(())
    }
    /// Open a metric under an explicit id, declaring its point count.
    pub fn start_metric_by_id(&mut self,id: u64,expected: usize) -> Result<()> {
        self.start(id,None,expected)
    }
    /// Open a metric under a name; the id is derived with `crate::metric_id`
    /// and the name is recorded in the blob's name table.
    pub fn start_metric_by_name(&mut self,name: &str,expected: usize) -> Result<()> {
        self.start(crate::metric_id(name),Some(name.to_string()),expected)
    }
    /// Append one point to the open metric.  The tag is ignored when tags
    /// are disabled for this blob.
    pub fn add_point(&mut self,ts: i64,val: f64,tag: &str) -> Result<()> {
        let open = self.open.as_mut().ok_or(Error::InvalidState("no metric is open"))?;
        if open.emitted >= open.expected {
            return Err(Error::CapacityExceeded("metric exceeds its declared point count"));
        }
        if tag.len() > MAX_STR_BYTES {
            return Err(Error::CapacityExceeded("tag longer than 255 bytes"));
        }
        open.ts.push(ts);
        open.val.push(val);
        if let Some(tags) = open.tags.as_mut() {
            tags.push(tag);
        }
        open.emitted += 1;
        Ok(())
    }
    /// Close the open metric and record its index entry.
    pub fn end_metric(&mut self) -> Result<()> {
        let open = self.open.take().ok_or(Error::InvalidState("no metric is open"))?;
        if open.emitted != open.expected {
            // restore nothing: a declared/actual mismatch poisons the metric
            return Err(Error::CapacityExceeded("emitted point count does not match the declared count"));
        }
        let ts_bytes = open.ts.into_bytes();
        let val_bytes = open.val.into_bytes();
        let tag_bytes = open.tags.map(TagWriter::into_bytes).unwrap_or_default();
        let entry = NumericEntry {
            id: open.id,
            count: open.emitted,
            ts_off: self.ts_col.len(),
            ts_len: ts_bytes.len(),
            val_off: self.val_col.len(),
            val_len: val_bytes.len(),
            tag_off: self.tag_col.len(),
            tag_len: tag_bytes.len()
        };
        self.ts_col.extend_from_slice(&ts_bytes);
        self.val_col.extend_from_slice(&val_bytes);
        self.tag_col.extend_from_slice(&tag_bytes);
        self.entries.push(entry);
        Ok(())
    }
    /// Finalize the blob: header, index, optional name table, payload
    /// sections, trailing CRC32.  Consumes the encoder.
    pub fn finish(self) -> Result<Vec<u8>> {
        if self.open.is_some() {
            return Err(Error::InvalidState("finish with a metric still open"));
        }
        let endian = self.opts.endian;
        let ts_wire = compress::compress(self.opts.ts_compression,&self.ts_col)?;
        let val_wire = compress::compress(self.opts.value_compression,&self.val_col)?;
        // the tag column is always zstd on the wire when present
        let tag_wire = match self.opts.tags_enabled {
            true => compress::compress(Compression::Zstd,&self.tag_col)?,
            false => Vec::new()
        };
        let name_table = match self.names.is_empty() {
            true => Vec::new(),
            false => write_name_table(endian,&self.names)
        };
        let mut out: Vec<u8> = Vec::with_capacity(
            NUMERIC_HEADER_LEN + self.entries.len()*NUMERIC_ENTRY_LEN
            + name_table.len() + ts_wire.len() + val_wire.len() + tag_wire.len() + 4);
        out.extend_from_slice(&NUMERIC_MAGIC);
        out.push(FORMAT_VERSION);
        out.push(self.opts.flag_byte());
        out.push(self.opts.comp_byte());
        out.push(0);
        endian.put_i64(&mut out,self.start_micros);
        endian.put_u32(&mut out,self.entries.len() as u32);
        endian.put_u32(&mut out,name_table.len() as u32);
        endian.put_u32(&mut out,ts_wire.len() as u32);
        endian.put_u32(&mut out,val_wire.len() as u32);
        endian.put_u32(&mut out,tag_wire.len() as u32);
        for entry in &self.entries {
            entry.write(endian,&mut out);
        }
        out.extend_from_slice(&name_table);
        out.extend_from_slice(&ts_wire);
        out.extend_from_slice(&val_wire);
        out.extend_from_slice(&tag_wire);
        append_crc(endian,&mut out);
        debug!("finalized numeric blob: {} metrics, {} bytes",self.entries.len(),out.len());
        Ok(out)
    }
}

/// An immutable, decoded numeric container.
pub struct NumericBlob {
    opts: BlobOptions,
    start_micros: i64,
    entries: Vec<NumericEntry>,
    by_id: HashMap<u64,usize>,
    by_name: Option<HashMap<String,u64>>,
    ts_col: Vec<u8>,
    val_col: Vec<u8>,
    tag_col: Vec<u8>
}

impl NumericBlob {
    /// Parse, checksum, and decompress a finalized numeric blob.
    pub fn decode(bytes: &[u8]) -> Result<Self> {
        let header = Header::parse(NUMERIC_MAGIC,bytes)?;
        let endian = header.opts.endian;
        let body = check_crc(endian,bytes)?;
        let index_len = header.metric_count * NUMERIC_ENTRY_LEN;
        let names_off = NUMERIC_HEADER_LEN + index_len;
        let payload_off = names_off + header.name_table_size;
        let [ts_size,val_size,tag_size]: [usize;3] = header.section_sizes.clone().try_into()
            .map_err(|_| Error::InvalidFormat("wrong section count"))?;
        if body.len() != payload_off + ts_size + val_size + tag_size {
            return Err(Error::InvalidFormat("declared section sizes do not match the blob length"));
        }
        if !header.opts.tags_enabled && tag_size != 0 {
            return Err(Error::InvalidFormat("tag section present but tags are disabled"));
        }
        let mut entries = Vec::with_capacity(header.metric_count);
        let mut by_id = HashMap::with_capacity(header.metric_count);
        for i in 0..header.metric_count {
            let entry = NumericEntry::parse(endian,body,NUMERIC_HEADER_LEN + i*NUMERIC_ENTRY_LEN)?;
            if by_id.insert(entry.id,i).is_some() {
                return Err(Error::InvalidFormat("duplicate metric id"));
            }
            entries.push(entry);
        }
        let by_name = match header.name_table_size {
            0 => None,
            _ => Some(parse_name_table(endian,&body[names_off..payload_off])?)
        };
        let ts_col = compress::decompress(header.opts.ts_compression,&body[payload_off..payload_off+ts_size])?;
        let val_col = compress::decompress(header.opts.value_compression,&body[payload_off+ts_size..payload_off+ts_size+val_size])?;
        let tag_col = match header.opts.tags_enabled {
            true => compress::decompress(Compression::Zstd,&body[payload_off+ts_size+val_size..payload_off+ts_size+val_size+tag_size])?,
            false => Vec::new()
        };
        for entry in &entries {
            if entry.ts_off + entry.ts_len > ts_col.len()
                || entry.val_off + entry.val_len > val_col.len()
                || entry.tag_off + entry.tag_len > tag_col.len() {
                return Err(Error::InvalidFormat("metric entry exceeds its column"));
            }
            if header.opts.ts_encoding == TimestampEncoding::Raw && entry.ts_len != entry.count*8 {
                return Err(Error::InvalidFormat("raw timestamp slice length mismatch"));
            }
            if header.opts.value_encoding == ValueEncoding::Raw && entry.val_len != entry.count*8 {
                return Err(Error::InvalidFormat("raw value slice length mismatch"));
            }
        }
        debug!("numeric blob: {} metrics, ts {:?}, val {:?}, tags {}",
            entries.len(),header.opts.ts_encoding,header.opts.value_encoding,header.opts.tags_enabled);
        Ok(Self {
            opts: header.opts,
            start_micros: header.start_micros,
            entries,
            by_id,
            by_name,
            ts_col,
            val_col,
            tag_col
        })
    }

    pub fn start_micros(&self) -> i64 {
        self.start_micros
    }
    pub fn metric_count(&self) -> usize {
        self.entries.len()
    }
    pub fn has_tags(&self) -> bool {
        self.opts.tags_enabled
    }
    pub fn has_metric_id(&self,id: u64) -> bool {
        self.by_id.contains_key(&id)
    }
    pub fn has_metric_name(&self,name: &str) -> bool {
        self.has_metric_id(resolve_name(self.by_name.as_ref(),name))
    }
    /// Metric ids in index (insertion) order.
    pub fn metric_ids(&self) -> Vec<u64> {
        self.entries.iter().map(|e| e.id).collect()
    }
    /// Registered metric names; empty when the blob carries no name table.
    pub fn metric_names(&self) -> Vec<String> {
        match &self.by_name {
            Some(table) => table.keys().cloned().collect(),
            None => Vec::new()
        }
    }
    /// Point count of a metric; 0 when the id is absent.
    pub fn len(&self,id: u64) -> usize {
        self.entry(id).map(|e| e.count).unwrap_or(0)
    }
    pub fn len_by_name(&self,name: &str) -> usize {
        self.len(resolve_name(self.by_name.as_ref(),name))
    }

    pub(crate) fn entry(&self,id: u64) -> Option<&NumericEntry> {
        self.by_id.get(&id).map(|i| &self.entries[*i])
    }
    pub(crate) fn resolve(&self,name: &str) -> u64 {
        resolve_name(self.by_name.as_ref(),name)
    }
    pub(crate) fn name_table(&self) -> Option<&HashMap<String,u64>> {
        self.by_name.as_ref()
    }
    fn ts_slice(&self,entry: &NumericEntry) -> &[u8] {
        &self.ts_col[entry.ts_off..entry.ts_off+entry.ts_len]
    }
    fn val_slice(&self,entry: &NumericEntry) -> &[u8] {
        &self.val_col[entry.val_off..entry.val_off+entry.val_len]
    }
    fn tag_slice(&self,entry: &NumericEntry) -> &[u8] {
        &self.tag_col[entry.tag_off..entry.tag_off+entry.tag_len]
    }

    /// Iterate a metric's timestamps in insertion order.
    pub fn all_timestamps(&self,id: u64) -> Timestamps<'_> {
        match self.entry(id) {
            Some(e) => Timestamps::new(self.opts.ts_encoding,self.ts_slice(e),self.opts.endian,self.start_micros,e.count),
            None => Timestamps::new(self.opts.ts_encoding,&[],self.opts.endian,self.start_micros,0)
        }
    }
    /// Iterate a metric's values in insertion order.
    pub fn all_values(&self,id: u64) -> Values<'_> {
        match self.entry(id) {
            Some(e) => Values::new(self.opts.value_encoding,self.val_slice(e),self.opts.endian,e.count),
            None => Values::new(self.opts.value_encoding,&[],self.opts.endian,0)
        }
    }
    /// Iterate a metric's tags; empty when tags are disabled.
    pub fn all_tags(&self,id: u64) -> Tags<'_> {
        match self.entry(id) {
            Some(e) if self.opts.tags_enabled => Tags::new(self.tag_slice(e),e.count),
            _ => Tags::new(&[],0)
        }
    }
    /// Iterate a metric's complete points.
    pub fn all(&self,id: u64) -> NumericPoints<'_> {
        let (ts,val,tags,count) = match self.entry(id) {
            Some(e) => (self.ts_slice(e),self.val_slice(e),
                self.opts.tags_enabled.then(|| Tags::new(self.tag_slice(e),e.count)),e.count),
            None => (&[][..],&[][..],None,0)
        };
        NumericPoints::new(&self.opts,ts,val,tags,self.start_micros,count)
    }
    pub fn all_by_name(&self,name: &str) -> NumericPoints<'_> {
        self.all(self.resolve(name))
    }
    pub fn all_timestamps_by_name(&self,name: &str) -> Timestamps<'_> {
        self.all_timestamps(self.resolve(name))
    }
    pub fn all_values_by_name(&self,name: &str) -> Values<'_> {
        self.all_values(self.resolve(name))
    }
    pub fn all_tags_by_name(&self,name: &str) -> Tags<'_> {
        self.all_tags(self.resolve(name))
    }

    /// Timestamp of point `i`; O(1) for raw encoding, forward scan for delta.
    pub fn timestamp_at(&self,id: u64,i: usize) -> Option<i64> {
        let e = self.entry(id)?;
        timestamp::timestamp_at(self.opts.ts_encoding,self.ts_slice(e),self.opts.endian,self.start_micros,e.count,i)
    }
    /// Value of point `i`; O(1) for raw encoding, forward scan for Gorilla.
    pub fn value_at(&self,id: u64,i: usize) -> Option<f64> {
        let e = self.entry(id)?;
        value::value_at(self.opts.value_encoding,self.val_slice(e),self.opts.endian,e.count,i)
    }
    /// Tag of point `i` by forward scan; `None` when tags are disabled.
    pub fn tag_at(&self,id: u64,i: usize) -> Option<String> {
        if !self.opts.tags_enabled {
            return None;
        }
        let e = self.entry(id)?;
        tag::tag_at(self.tag_slice(e),e.count,i)
    }
    /// Complete point `i`.  Succeeds with an empty tag when tags are disabled.
    pub fn numeric_at(&self,id: u64,i: usize) -> Option<NumericPoint> {
        let ts = self.timestamp_at(id,i)?;
        let val = self.value_at(id,i)?;
        let tag = match self.opts.tags_enabled {
            true => self.tag_at(id,i)?,
            false => String::new()
        };
        Some(NumericPoint { ts, val, tag })
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

/// Fused point iterator over one metric.
///
/// The common encoding pairs get dedicated variants so each step advances
/// two concrete column scanners without per-point dispatch.  Advancement is
/// synchronized: the iterator stops at the first column that fails or runs
/// out.
pub enum NumericPoints<'a> {
    RawRaw { ts: RawTimestamps<'a>, val: RawValues<'a>, tags: Option<Tags<'a>> },
    RawGorilla { ts: RawTimestamps<'a>, val: GorillaValues<'a>, tags: Option<Tags<'a>> },
    DeltaRaw { ts: DeltaTimestamps<'a>, val: RawValues<'a>, tags: Option<Tags<'a>> },
    DeltaGorilla { ts: DeltaTimestamps<'a>, val: GorillaValues<'a>, tags: Option<Tags<'a>> }
}

impl<'a> NumericPoints<'a> {
    fn new(opts: &BlobOptions,ts: &'a [u8],val: &'a [u8],tags: Option<Tags<'a>>,base: i64,count: usize) -> Self {
        match (opts.ts_encoding,opts.value_encoding) {
            (TimestampEncoding::Raw,ValueEncoding::Raw) => Self::RawRaw {
                ts: RawTimestamps::new(ts,opts.endian,count),
                val: RawValues::new(val,opts.endian,count),
                tags
            },
            (TimestampEncoding::Raw,ValueEncoding::Gorilla) => Self::RawGorilla {
                ts: RawTimestamps::new(ts,opts.endian,count),
                val: GorillaValues::new(val,count),
                tags
            },
            (TimestampEncoding::Delta,ValueEncoding::Raw) => Self::DeltaRaw {
                ts: DeltaTimestamps::new(ts,base,count),
                val: RawValues::new(val,opts.endian,count),
                tags
            },
            (TimestampEncoding::Delta,ValueEncoding::Gorilla) => Self::DeltaGorilla {
                ts: DeltaTimestamps::new(ts,base,count),
                val: GorillaValues::new(val,count),
                tags
            }
        }
    }
}

fn fuse(ts: Option<i64>,val: Option<f64>,tags: &mut Option<Tags<'_>>) -> Option<NumericPoint> {
    let ts = ts?;
    let val = val?;
    let tag = match tags {
        Some(it) => it.next()?,
        None => String::new()
    };
    Some(NumericPoint { ts, val, tag })
}

impl<'a> Iterator for NumericPoints<'a> {
    type Item = NumericPoint;
    fn next(&mut self) -> Option<NumericPoint> {
        match self {
            Self::RawRaw { ts, val, tags } => fuse(ts.next(),val.next(),tags),
            Self::RawGorilla { ts, val, tags } => fuse(ts.next(),val.next(),tags),
            Self::DeltaRaw { ts, val, tags } => fuse(ts.next(),val.next(),tags),
            Self::DeltaGorilla { ts, val, tags } => fuse(ts.next(),val.next(),tags)
        }
    }
}
