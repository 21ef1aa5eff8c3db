//! # Text blobs
//!
//! Text values vary in length, so a text blob stores a single
//! row-interleaved payload instead of parallel columns.  Each row is
//!
//! ```text
//!     +--------------+---------+----------------------+-------------+-----------+
//!     | encoded ts   | len_val | len_tag (tags only)  | value bytes | tag bytes |
//!     +--------------+---------+----------------------+-------------+-----------+
//! ```
//!
//! with the length bytes grouped before the data bytes.  A raw-encoded
//! timestamp is prefixed with a `u8` length byte whose value is always 8;
//! a delta timestamp is a bare zigzag varint.  Every access is a forward
//! scan; callers that need O(1) lookups should materialize.

use std::collections::{HashMap,HashSet};
use log::debug;
use crate::codec::{Endian,TimestampEncoding};
use crate::codec::compress;
use crate::codec::varint;
use crate::{Error,Result,MAX_METRICS,MAX_STR_BYTES};
use super::{append_crc,check_crc,parse_name_table,resolve_name,write_name_table,
    BlobOptions,Header,TextEntry,
    TEXT_ENTRY_LEN,TEXT_HEADER_LEN,TEXT_MAGIC,FORMAT_VERSION};

/// One decoded text data point.
#[derive(Clone,Debug,PartialEq)]
pub struct TextPoint {
    pub ts: i64,
    pub val: String,
    pub tag: String
}

struct OpenMetric {
    id: u64,
    expected: usize,
    emitted: usize,
    prev_ts: i64,
    rows: Vec<u8>
}

/// Builds a text blob one metric at a time; same state machine as the
/// numeric encoder.
pub struct TextEncoder {
    opts: BlobOptions,
    start_micros: i64,
    payload: Vec<u8>,
    entries: Vec<TextEntry>,
    ids: HashSet<u64>,
    names: Vec<(u64,String)>,
    open: Option<OpenMetric>
}

impl TextEncoder {
    pub fn new(start_micros: i64,opts: BlobOptions) -> Self {
        Self {
            opts,
            start_micros,
            payload: Vec::new(),
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
            prev_ts: self.start_micros,
            rows: Vec::with_capacity(expected*16)
        });
        Ok(())
    }
    pub fn start_metric_by_id(&mut self,id: u64,expected: usize) -> Result<()> {
        self.start(id,None,expected)
    }
    pub fn start_metric_by_name(&mut self,name: &str,expected: usize) -> Result<()> {
        self.start(crate::metric_id(name),Some(name.to_string()),expected)
    }
    /// Append one row to the open metric.  The tag is ignored when tags are
    /// disabled for this blob.
    pub fn add_point(&mut self,ts: i64,val: &str,tag: &str) -> Result<()> {
        let tags_enabled = self.opts.tags_enabled;
        let ts_encoding = self.opts.ts_encoding;
        let endian = self.opts.endian;
        let open = self.open.as_mut().ok_or(Error::InvalidState("no metric is open"))?;
        if open.emitted >= open.expected {
            return Err(Error::CapacityExceeded("metric exceeds its declared point count"));
        }
        if val.len() > MAX_STR_BYTES {
            return Err(Error::CapacityExceeded("text value longer than 255 bytes"));
        }
        if tag.len() > MAX_STR_BYTES {
            return Err(Error::CapacityExceeded("tag longer than 255 bytes"));
        }
        match ts_encoding {
            TimestampEncoding::Raw => {
                // single-metric per-row framing: fixed length byte then the stamp
                open.rows.push(8);
                endian.put_i64(&mut open.rows,ts);
            },
            TimestampEncoding::Delta => {
                varint::put_i64(&mut open.rows,ts.wrapping_sub(open.prev_ts));
                open.prev_ts = ts;
            }
        }
        open.rows.push(val.len() as u8);
        if tags_enabled {
            open.rows.push(tag.len() as u8);
        }
        open.rows.extend_from_slice(val.as_bytes());
        if tags_enabled {
            open.rows.extend_from_slice(tag.as_bytes());
        }
        open.emitted += 1;
        Ok(())
    }
    pub fn end_metric(&mut self) -> Result<()> {
        let open = self.open.take().ok_or(Error::InvalidState("no metric is open"))?;
        if open.emitted != open.expected {
            return Err(Error::CapacityExceeded("emitted point count does not match the declared count"));
        }
        let entry = TextEntry {
            id: open.id,
            count: open.emitted,
            off: self.payload.len(),
            len: open.rows.len()
        };
        self.payload.extend_from_slice(&open.rows);
        self.entries.push(entry);
        Ok(())
    }
    /// Finalize the blob.  The single payload section is compressed with
    /// the timestamp codec id, which is the only one a text header carries.
    pub fn finish(self) -> Result<Vec<u8>> {
        if self.open.is_some() {
            return Err(Error::InvalidState("finish with a metric still open"));
        }
        let endian = self.opts.endian;
        let wire = compress::compress(self.opts.ts_compression,&self.payload)?;
        let name_table = match self.names.is_empty() {
            true => Vec::new(),
            false => write_name_table(endian,&self.names)
        };
        let mut out: Vec<u8> = Vec::with_capacity(
            TEXT_HEADER_LEN + self.entries.len()*TEXT_ENTRY_LEN + name_table.len() + wire.len() + 4);
        out.extend_from_slice(&TEXT_MAGIC);
        out.push(FORMAT_VERSION);
        // the value-encoding flag bit stays clear for text blobs
        let mut opts = self.opts;
        opts.value_encoding = crate::codec::ValueEncoding::Raw;
        opts.value_compression = crate::codec::compress::Compression::None;
        out.push(opts.flag_byte());
        out.push(opts.comp_byte());
        out.push(0);
        endian.put_i64(&mut out,self.start_micros);
        endian.put_u32(&mut out,self.entries.len() as u32);
        endian.put_u32(&mut out,name_table.len() as u32);
        endian.put_u32(&mut out,wire.len() as u32);
        for entry in &self.entries {
            entry.write(endian,&mut out);
        }
        out.extend_from_slice(&name_table);
        out.extend_from_slice(&wire);
        append_crc(endian,&mut out);
        debug!("finalized text blob: {} metrics, {} bytes",self.entries.len(),out.len());
        Ok(out)
    }
}

/// An immutable, decoded text container.
pub struct TextBlob {
    opts: BlobOptions,
    start_micros: i64,
    entries: Vec<TextEntry>,
    by_id: HashMap<u64,usize>,
    by_name: Option<HashMap<String,u64>>,
    payload: Vec<u8>
}

impl TextBlob {
    /// Parse, checksum, and decompress a finalized text blob.
    pub fn decode(bytes: &[u8]) -> Result<Self> {
        let header = Header::parse(TEXT_MAGIC,bytes)?;
        let endian = header.opts.endian;
        let body = check_crc(endian,bytes)?;
        let index_len = header.metric_count * TEXT_ENTRY_LEN;
        let names_off = TEXT_HEADER_LEN + index_len;
        let payload_off = names_off + header.name_table_size;
        let [payload_size]: [usize;1] = header.section_sizes.clone().try_into()
            .map_err(|_| Error::InvalidFormat("wrong section count"))?;
        if body.len() != payload_off + payload_size {
            return Err(Error::InvalidFormat("declared section sizes do not match the blob length"));
        }
        let mut entries = Vec::with_capacity(header.metric_count);
        let mut by_id = HashMap::with_capacity(header.metric_count);
        for i in 0..header.metric_count {
            let entry = TextEntry::parse(endian,body,TEXT_HEADER_LEN + i*TEXT_ENTRY_LEN)?;
            if by_id.insert(entry.id,i).is_some() {
                return Err(Error::InvalidFormat("duplicate metric id"));
            }
            entries.push(entry);
        }
        let by_name = match header.name_table_size {
            0 => None,
            _ => Some(parse_name_table(endian,&body[names_off..payload_off])?)
        };
        let payload = compress::decompress(header.opts.ts_compression,&body[payload_off..payload_off+payload_size])?;
        for entry in &entries {
            if entry.off + entry.len > payload.len() {
                return Err(Error::InvalidFormat("metric entry exceeds the payload"));
            }
        }
        debug!("text blob: {} metrics, ts {:?}, tags {}",
            entries.len(),header.opts.ts_encoding,header.opts.tags_enabled);
        Ok(Self {
            opts: header.opts,
            start_micros: header.start_micros,
            entries,
            by_id,
            by_name,
            payload
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
    pub fn metric_ids(&self) -> Vec<u64> {
        self.entries.iter().map(|e| e.id).collect()
    }
    pub fn metric_names(&self) -> Vec<String> {
        match &self.by_name {
            Some(table) => table.keys().cloned().collect(),
            None => Vec::new()
        }
    }
    pub fn len(&self,id: u64) -> usize {
        self.entry(id).map(|e| e.count).unwrap_or(0)
    }
    pub fn len_by_name(&self,name: &str) -> usize {
        self.len(resolve_name(self.by_name.as_ref(),name))
    }

    pub(crate) fn entry(&self,id: u64) -> Option<&TextEntry> {
        self.by_id.get(&id).map(|i| &self.entries[*i])
    }
    pub(crate) fn resolve(&self,name: &str) -> u64 {
        resolve_name(self.by_name.as_ref(),name)
    }
    pub(crate) fn name_table(&self) -> Option<&HashMap<String,u64>> {
        self.by_name.as_ref()
    }
    fn rows(&self,id: u64) -> TextPoints<'_> {
        match self.entry(id) {
            Some(e) => TextPoints::new(&self.opts,&self.payload[e.off..e.off+e.len],self.start_micros,e.count),
            None => TextPoints::new(&self.opts,&[],self.start_micros,0)
        }
    }

    /// Iterate a metric's complete rows.
    pub fn all(&self,id: u64) -> TextPoints<'_> {
        self.rows(id)
    }
    pub fn all_by_name(&self,name: &str) -> TextPoints<'_> {
        self.all(self.resolve(name))
    }
    /// Iterate a metric's timestamps in insertion order.
    pub fn all_timestamps(&self,id: u64) -> impl Iterator<Item = i64> + '_ {
        self.rows(id).map(|p| p.ts)
    }
    /// Iterate a metric's text values in insertion order.
    pub fn all_text_values(&self,id: u64) -> impl Iterator<Item = String> + '_ {
        self.rows(id).map(|p| p.val)
    }
    /// Iterate a metric's tags; empty when tags are disabled.
    pub fn all_tags(&self,id: u64) -> impl Iterator<Item = String> + '_ {
        let rows = match self.opts.tags_enabled {
            true => self.rows(id),
            false => TextPoints::new(&self.opts,&[],self.start_micros,0)
        };
        rows.map(|p| p.tag)
    }
    pub fn all_timestamps_by_name(&self,name: &str) -> impl Iterator<Item = i64> + '_ {
        self.all_timestamps(self.resolve(name))
    }
    pub fn all_text_values_by_name(&self,name: &str) -> impl Iterator<Item = String> + '_ {
        self.all_text_values(self.resolve(name))
    }
    pub fn all_tags_by_name(&self,name: &str) -> impl Iterator<Item = String> + '_ {
        self.all_tags(self.resolve(name))
    }

    /// Complete row `i` by forward scan; the row layout admits no shortcut.
    pub fn text_at(&self,id: u64,i: usize) -> Option<TextPoint> {
        let e = self.entry(id)?;
        if i >= e.count {
            return None;
        }
        self.rows(id).nth(i)
    }
    pub fn timestamp_at(&self,id: u64,i: usize) -> Option<i64> {
        self.text_at(id,i).map(|p| p.ts)
    }
    pub fn text_value_at(&self,id: u64,i: usize) -> Option<String> {
        self.text_at(id,i).map(|p| p.val)
    }
    /// Tag of row `i`; `None` when tags are disabled.
    pub fn tag_at(&self,id: u64,i: usize) -> Option<String> {
        if !self.opts.tags_enabled {
            return None;
        }
        self.text_at(id,i).map(|p| p.tag)
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
}

/// Sequential scanner over one metric's row slice.
pub struct TextPoints<'a> {
    buf: &'a [u8],
    pos: usize,
    remaining: usize,
    endian: Endian,
    ts_encoding: TimestampEncoding,
    tags_enabled: bool,
    prev_ts: i64
}

impl<'a> TextPoints<'a> {
    fn new(opts: &BlobOptions,buf: &'a [u8],base: i64,count: usize) -> Self {
        Self {
            buf,
            pos: 0,
            remaining: count,
            endian: opts.endian,
            ts_encoding: opts.ts_encoding,
            tags_enabled: opts.tags_enabled,
            prev_ts: base
        }
    }
    fn read_str(&mut self,len: usize) -> Option<String> {
        let bytes = self.buf.get(self.pos..self.pos+len)?;
        let s = std::str::from_utf8(bytes).ok()?;
        self.pos += len;
        Some(s.to_string())
    }
}

impl<'a> Iterator for TextPoints<'a> {
    type Item = TextPoint;
    fn next(&mut self) -> Option<TextPoint> {
        if self.remaining == 0 {
            return None;
        }
        let ts = match self.ts_encoding {
            TimestampEncoding::Raw => {
                if *self.buf.get(self.pos)? != 8 {
                    return None;
                }
                let ts = self.endian.read_i64(self.buf,self.pos+1)?;
                self.pos += 9;
                ts
            },
            TimestampEncoding::Delta => {
                let (delta,n) = varint::read_i64(self.buf.get(self.pos..)?)?;
                self.pos += n;
                self.prev_ts = self.prev_ts.wrapping_add(delta);
                self.prev_ts
            }
        };
        let len_val = *self.buf.get(self.pos)? as usize;
        let len_tag = match self.tags_enabled {
            true => *self.buf.get(self.pos+1)? as usize,
            false => 0
        };
        self.pos += 1 + self.tags_enabled as usize;
        let val = self.read_str(len_val)?;
        let tag = match self.tags_enabled {
            true => self.read_str(len_tag)?,
            false => String::new()
        };
        self.remaining -= 1;
        Some(TextPoint { ts, val, tag })
    }
    fn size_hint(&self) -> (usize,Option<usize>) {
        (0,Some(self.remaining))
    }
}
