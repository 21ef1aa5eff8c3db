//! # Blob Module
//!
//! Wire layout shared by the numeric and text containers, the tagged
//! `Blob` variant, and the magic-number classifier.
//!
//! ## Container layout
//!
//! ```text
//!     +--------+--------------+------------+------------------+-------+
//!     | header | metric index | name table |  payload section(s) | crc |
//!     +--------+--------------+------------+------------------+-------+
//! ```
//!
//! Numeric header (36 bytes):
//!
//! ```text
//!     +-------+---------+-------+------+------+--------------+--------------+-----------------+---------+----------+----------+
//!     | magic | version | flags | comp | rsvd | start_micros | metric_count | name_table_size | ts_size | val_size | tag_size |
//!     |  [4]  |   u8    |  u8   |  u8  |  u8  |     i64      |     u32      |       u32       |   u32   |   u32    |   u32    |
//!     +-------+---------+-------+------+------+--------------+--------------+-----------------+---------+----------+----------+
//! ```
//!
//! The text header (28 bytes) is identical through `name_table_size` and
//! ends with a single `payload_size:u32` for the row-interleaved section.
//!
//! Flag bits: 0 endianness (0 little, 1 big), 1 timestamp encoding
//! (0 raw, 1 delta), 2 value encoding (0 raw, 1 gorilla; numeric only),
//! 3 tags present.  `comp` carries the timestamp compression id in the low
//! nibble and the value compression id in the high nibble; a text blob's
//! single payload codec rides in the low nibble.
//!
//! Numeric index entries are 36 bytes (`metric_id:u64 count:u32` plus an
//! offset/length pair per column), text entries 20 bytes (`metric_id:u64
//! count:u32 offset:u32 size:u32`).  Offsets refer to *decompressed*
//! section bytes; the `*_size` header fields are on-wire sizes.  The name
//! table, present iff `name_table_size > 0`, is `entry_count:u32` followed
//! by `metric_id:u64, name_len:varint, name bytes` per entry.  The trailing
//! CRC32 covers every preceding byte.
//!
//! All fixed-width fields are in the byte order declared by flag bit 0;
//! the three single-byte fields before the first multi-byte field make the
//! flag readable without knowing the order.

pub mod numeric;
pub mod text;

use std::collections::HashMap;
use log::{debug,error,info};
use crate::codec::{Endian,TimestampEncoding,ValueEncoding};
use crate::codec::compress::Compression;
use crate::codec::varint;
use crate::{Error,Result,MAX_METRICS};
use numeric::NumericBlob;
use text::TextBlob;

pub const NUMERIC_MAGIC: [u8;4] = *b"TSNB";
pub const TEXT_MAGIC: [u8;4] = *b"TSTB";
pub const FORMAT_VERSION: u8 = 1;

pub(crate) const NUMERIC_HEADER_LEN: usize = 36;
pub(crate) const TEXT_HEADER_LEN: usize = 28;
pub(crate) const NUMERIC_ENTRY_LEN: usize = 36;
pub(crate) const TEXT_ENTRY_LEN: usize = 20;

const FLAG_BIG_ENDIAN: u8 = 0x01;
const FLAG_DELTA_TS: u8 = 0x02;
const FLAG_GORILLA_VAL: u8 = 0x04;
const FLAG_TAGS: u8 = 0x08;

/// Per-encoder configuration recorded in the blob header.
#[derive(Clone,Copy,Debug)]
pub struct BlobOptions {
    pub endian: Endian,
    pub ts_encoding: TimestampEncoding,
    /// numeric blobs only; ignored by the text encoder
    pub value_encoding: ValueEncoding,
    pub ts_compression: Compression,
    /// numeric blobs only; the text payload codec comes from `ts_compression`
    pub value_compression: Compression,
    pub tags_enabled: bool
}

impl Default for BlobOptions {
    fn default() -> Self {
        Self {
            endian: Endian::Little,
            ts_encoding: TimestampEncoding::Delta,
            value_encoding: ValueEncoding::Gorilla,
            ts_compression: Compression::None,
            value_compression: Compression::None,
            tags_enabled: false
        }
    }
}

impl BlobOptions {
    pub(crate) fn flag_byte(&self) -> u8 {
        let mut flags = 0;
        if self.endian == Endian::Big {
            flags |= FLAG_BIG_ENDIAN;
        }
        if self.ts_encoding == TimestampEncoding::Delta {
            flags |= FLAG_DELTA_TS;
        }
        if self.value_encoding == ValueEncoding::Gorilla {
            flags |= FLAG_GORILLA_VAL;
        }
        if self.tags_enabled {
            flags |= FLAG_TAGS;
        }
        flags
    }
    pub(crate) fn comp_byte(&self) -> u8 {
        self.ts_compression.id() | (self.value_compression.id() << 4)
    }
    pub(crate) fn from_bytes(flags: u8,comp: u8) -> Result<Self> {
        Ok(Self {
            endian: match flags & FLAG_BIG_ENDIAN {
                0 => Endian::Little,
                _ => Endian::Big
            },
            ts_encoding: match flags & FLAG_DELTA_TS {
                0 => TimestampEncoding::Raw,
                _ => TimestampEncoding::Delta
            },
            value_encoding: match flags & FLAG_GORILLA_VAL {
                0 => ValueEncoding::Raw,
                _ => ValueEncoding::Gorilla
            },
            ts_compression: Compression::from_id(comp & 0x0f)?,
            value_compression: Compression::from_id(comp >> 4)?,
            tags_enabled: flags & FLAG_TAGS != 0
        })
    }
}

/// Parsed fixed-width header fields common to both categories.
pub(crate) struct Header {
    pub opts: BlobOptions,
    pub start_micros: i64,
    pub metric_count: usize,
    pub name_table_size: usize,
    /// on-wire payload section sizes: `[ts,val,tag]` or `[payload]`
    pub section_sizes: Vec<usize>
}

impl Header {
    /// Parse and validate a header of either category.  `magic` selects the
    /// category; `buf` is the entire blob byte sequence.
    pub fn parse(magic: [u8;4],buf: &[u8]) -> Result<Header> {
        let (header_len,sections) = match magic {
            NUMERIC_MAGIC => (NUMERIC_HEADER_LEN,3),
            _ => (TEXT_HEADER_LEN,1)
        };
        if buf.len() < header_len + 4 {
            error!("blob shorter than header, {} bytes",buf.len());
            return Err(Error::InvalidFormat("truncated header"));
        }
        if buf[0..4] != magic {
            return Err(Error::InvalidFormat("magic number mismatch"));
        }
        if buf[4] != FORMAT_VERSION {
            error!("unknown format version {}",buf[4]);
            return Err(Error::InvalidFormat("unknown format version"));
        }
        let opts = BlobOptions::from_bytes(buf[5],buf[6])?;
        let endian = opts.endian;
        let start_micros = endian.read_i64(buf,8).ok_or(Error::InvalidFormat("truncated header"))?;
        let metric_count = endian.read_u32(buf,16).ok_or(Error::InvalidFormat("truncated header"))? as usize;
        if metric_count > MAX_METRICS {
            error!("blob declares {} metrics",metric_count);
            return Err(Error::InvalidFormat("metric count out of range"));
        }
        let name_table_size = endian.read_u32(buf,20).ok_or(Error::InvalidFormat("truncated header"))? as usize;
        let mut section_sizes = Vec::with_capacity(sections);
        for i in 0..sections {
            let sz = endian.read_u32(buf,24+4*i).ok_or(Error::InvalidFormat("truncated header"))? as usize;
            section_sizes.push(sz);
        }
        Ok(Header {
            opts,
            start_micros,
            metric_count,
            name_table_size,
            section_sizes
        })
    }
}

/// Append the trailing CRC32 over everything written so far.
pub(crate) fn append_crc(endian: Endian,buf: &mut Vec<u8>) {
    let crc = crc32fast::hash(buf);
    endian.put_u32(buf,crc);
}

/// Verify the trailing CRC32 and return the covered prefix.
pub(crate) fn check_crc(endian: Endian,buf: &[u8]) -> Result<&[u8]> {
    if buf.len() < 4 {
        return Err(Error::InvalidFormat("blob too short for checksum"));
    }
    let body = &buf[..buf.len()-4];
    let stored = endian.read_u32(buf,buf.len()-4).ok_or(Error::InvalidFormat("blob too short for checksum"))?;
    if crc32fast::hash(body) != stored {
        error!("checksum mismatch over {} bytes",body.len());
        return Err(Error::ChecksumMismatch);
    }
    Ok(body)
}

/// Serialize the name table section.
pub(crate) fn write_name_table(endian: Endian,names: &[(u64,String)]) -> Vec<u8> {
    let mut buf: Vec<u8> = Vec::new();
    endian.put_u32(&mut buf,names.len() as u32);
    for (id,name) in names {
        endian.put_u64(&mut buf,*id);
        varint::put_u64(&mut buf,name.len() as u64);
        buf.extend_from_slice(name.as_bytes());
    }
    buf
}

/// Parse the name table section into a name lookup map.
pub(crate) fn parse_name_table(endian: Endian,buf: &[u8]) -> Result<HashMap<String,u64>> {
    let count = endian.read_u32(buf,0).ok_or(Error::InvalidFormat("truncated name table"))? as usize;
    let mut pos = 4;
    let mut ans = HashMap::with_capacity(count);
    for _ in 0..count {
        let id = endian.read_u64(buf,pos).ok_or(Error::InvalidFormat("truncated name table"))?;
        pos += 8;
        let tail = buf.get(pos..).ok_or(Error::InvalidFormat("truncated name table"))?;
        let (len,n) = varint::read_u64(tail).ok_or(Error::InvalidFormat("truncated name table"))?;
        pos += n;
        let end = pos.checked_add(len as usize).ok_or(Error::InvalidFormat("truncated name table"))?;
        let bytes = buf.get(pos..end).ok_or(Error::InvalidFormat("truncated name table"))?;
        let name = std::str::from_utf8(bytes).map_err(|_| Error::InvalidFormat("name table is not UTF-8"))?;
        pos = end;
        ans.insert(name.to_string(),id);
    }
    if pos != buf.len() {
        return Err(Error::InvalidFormat("name table length mismatch"));
    }
    debug!("name table holds {} entries",ans.len());
    Ok(ans)
}

/// Per-metric index entry of a numeric blob.  Offsets and lengths refer to
/// the decompressed column bytes.
#[derive(Clone,Copy,Debug)]
pub(crate) struct NumericEntry {
    pub id: u64,
    pub count: usize,
    pub ts_off: usize,
    pub ts_len: usize,
    pub val_off: usize,
    pub val_len: usize,
    pub tag_off: usize,
    pub tag_len: usize
}

impl NumericEntry {
    pub fn write(&self,endian: Endian,dst: &mut Vec<u8>) {
        endian.put_u64(dst,self.id);
        endian.put_u32(dst,self.count as u32);
        endian.put_u32(dst,self.ts_off as u32);
        endian.put_u32(dst,self.ts_len as u32);
        endian.put_u32(dst,self.val_off as u32);
        endian.put_u32(dst,self.val_len as u32);
        endian.put_u32(dst,self.tag_off as u32);
        endian.put_u32(dst,self.tag_len as u32);
    }
    pub fn parse(endian: Endian,buf: &[u8],off: usize) -> Result<Self> {
        Ok(Self {
            id: endian.read_u64(buf,off).ok_or(Error::InvalidFormat("truncated metric index"))?,
            count: endian.read_u32(buf,off+8).ok_or(Error::InvalidFormat("truncated metric index"))? as usize,
            ts_off: endian.read_u32(buf,off+12).ok_or(Error::InvalidFormat("truncated metric index"))? as usize,
            ts_len: endian.read_u32(buf,off+16).ok_or(Error::InvalidFormat("truncated metric index"))? as usize,
            val_off: endian.read_u32(buf,off+20).ok_or(Error::InvalidFormat("truncated metric index"))? as usize,
            val_len: endian.read_u32(buf,off+24).ok_or(Error::InvalidFormat("truncated metric index"))? as usize,
            tag_off: endian.read_u32(buf,off+28).ok_or(Error::InvalidFormat("truncated metric index"))? as usize,
            tag_len: endian.read_u32(buf,off+32).ok_or(Error::InvalidFormat("truncated metric index"))? as usize
        })
    }
}

/// Per-metric index entry of a text blob.
#[derive(Clone,Copy,Debug)]
pub(crate) struct TextEntry {
    pub id: u64,
    pub count: usize,
    pub off: usize,
    pub len: usize
}

impl TextEntry {
    pub fn write(&self,endian: Endian,dst: &mut Vec<u8>) {
        endian.put_u64(dst,self.id);
        endian.put_u32(dst,self.count as u32);
        endian.put_u32(dst,self.off as u32);
        endian.put_u32(dst,self.len as u32);
    }
    pub fn parse(endian: Endian,buf: &[u8],off: usize) -> Result<Self> {
        Ok(Self {
            id: endian.read_u64(buf,off).ok_or(Error::InvalidFormat("truncated metric index"))?,
            count: endian.read_u32(buf,off+8).ok_or(Error::InvalidFormat("truncated metric index"))? as usize,
            off: endian.read_u32(buf,off+12).ok_or(Error::InvalidFormat("truncated metric index"))? as usize,
            len: endian.read_u32(buf,off+16).ok_or(Error::InvalidFormat("truncated metric index"))? as usize
        })
    }
}

/// Resolve a name against an optional name table, falling back to the hash.
pub(crate) fn resolve_name(table: Option<&HashMap<String,u64>>,name: &str) -> u64 {
    match table.and_then(|t| t.get(name)) {
        Some(id) => *id,
        None => crate::metric_id(name)
    }
}

/// An immutable container of either category.
pub enum Blob {
    Numeric(NumericBlob),
    Text(TextBlob)
}

impl Blob {
    pub fn is_numeric(&self) -> bool {
        matches!(self,Blob::Numeric(_))
    }
    pub fn is_text(&self) -> bool {
        matches!(self,Blob::Text(_))
    }
    pub fn as_numeric(&self) -> Option<&NumericBlob> {
        match self {
            Blob::Numeric(b) => Some(b),
            _ => None
        }
    }
    pub fn as_text(&self) -> Option<&TextBlob> {
        match self {
            Blob::Text(b) => Some(b),
            _ => None
        }
    }
    pub fn start_micros(&self) -> i64 {
        match self {
            Blob::Numeric(b) => b.start_micros(),
            Blob::Text(b) => b.start_micros()
        }
    }
    pub fn metric_count(&self) -> usize {
        match self {
            Blob::Numeric(b) => b.metric_count(),
            Blob::Text(b) => b.metric_count()
        }
    }
}

/// Classify a byte sequence by its magic number and decode it.
pub fn decode(bytes: &[u8]) -> Result<Blob> {
    if bytes.len() >= 4 && bytes[0..4] == NUMERIC_MAGIC {
        info!("identified numeric blob");
        return Ok(Blob::Numeric(NumericBlob::decode(bytes)?));
    }
    if bytes.len() >= 4 && bytes[0..4] == TEXT_MAGIC {
        info!("identified text blob");
        return Ok(Blob::Text(TextBlob::decode(bytes)?));
    }
    error!("no blob category matches the magic number");
    Err(Error::InvalidFormat("unrecognized magic number"))
}
