//! # Codec Module
//!
//! Byte- and bit-level machinery shared by the blob encoders and decoders.
//! Submodules handle the individual columns:
//! * `varint` wraps zigzag LEB128 integers (timestamp deltas, name lengths)
//! * `timestamp` writes and iterates the timestamp column (raw or delta)
//! * `value` writes and iterates the numeric value column (raw or Gorilla)
//! * `tag` writes and iterates the length-prefixed tag column
//! * `compress` applies the opaque payload codecs
//!
//! This module itself provides the endian engine: every fixed-width field in
//! a blob is read and written in the byte order declared by the blob header.
//! When the blob order matches the host order the fixed-width readers take
//! the native-order path and skip the byte swap.

pub mod varint;
pub mod timestamp;
pub mod value;
pub mod tag;
pub mod compress;

/// Byte order of all fixed-width fields in a blob.
#[derive(Clone,Copy,PartialEq,Eq,Debug)]
pub enum Endian {
    Little,
    Big
}

impl Default for Endian {
    fn default() -> Self {
        Endian::Little
    }
}

impl Endian {
    /// Whether this order matches the host order; used to select the
    /// unchecked native-order read path.
    pub fn is_native(self) -> bool {
        match self {
            Endian::Little => cfg!(target_endian = "little"),
            Endian::Big => cfg!(target_endian = "big")
        }
    }
    pub fn put_u16(self,dst: &mut Vec<u8>,v: u16) {
        match self {
            Endian::Little => dst.extend_from_slice(&v.to_le_bytes()),
            Endian::Big => dst.extend_from_slice(&v.to_be_bytes())
        }
    }
    pub fn put_u32(self,dst: &mut Vec<u8>,v: u32) {
        match self {
            Endian::Little => dst.extend_from_slice(&v.to_le_bytes()),
            Endian::Big => dst.extend_from_slice(&v.to_be_bytes())
        }
    }
    pub fn put_u64(self,dst: &mut Vec<u8>,v: u64) {
        match self {
            Endian::Little => dst.extend_from_slice(&v.to_le_bytes()),
            Endian::Big => dst.extend_from_slice(&v.to_be_bytes())
        }
    }
    pub fn put_i64(self,dst: &mut Vec<u8>,v: i64) {
        self.put_u64(dst,v as u64);
    }
    pub fn put_f64(self,dst: &mut Vec<u8>,v: f64) {
        self.put_u64(dst,v.to_bits());
    }
    /// Decode 8 bytes already known to be in this order.
    pub fn u64_from(self,b: [u8;8]) -> u64 {
        if self.is_native() {
            return u64::from_ne_bytes(b);
        }
        match self {
            Endian::Little => u64::from_le_bytes(b),
            Endian::Big => u64::from_be_bytes(b)
        }
    }
    /// Bounds-checked read of a `u16` at `off`.
    pub fn read_u16(self,buf: &[u8],off: usize) -> Option<u16> {
        let b: [u8;2] = buf.get(off..off+2)?.try_into().ok()?;
        Some(match self {
            Endian::Little => u16::from_le_bytes(b),
            Endian::Big => u16::from_be_bytes(b)
        })
    }
    /// Bounds-checked read of a `u32` at `off`.
    pub fn read_u32(self,buf: &[u8],off: usize) -> Option<u32> {
        let b: [u8;4] = buf.get(off..off+4)?.try_into().ok()?;
        Some(match self {
            Endian::Little => u32::from_le_bytes(b),
            Endian::Big => u32::from_be_bytes(b)
        })
    }
    /// Bounds-checked read of a `u64` at `off`.
    pub fn read_u64(self,buf: &[u8],off: usize) -> Option<u64> {
        let b: [u8;8] = buf.get(off..off+8)?.try_into().ok()?;
        Some(self.u64_from(b))
    }
    /// Bounds-checked read of an `i64` at `off`.
    pub fn read_i64(self,buf: &[u8],off: usize) -> Option<i64> {
        self.read_u64(buf,off).map(|v| v as i64)
    }
    /// Bounds-checked read of an `f64` at `off`.
    pub fn read_f64(self,buf: &[u8],off: usize) -> Option<f64> {
        self.read_u64(buf,off).map(f64::from_bits)
    }
}

/// Timestamp column encoding.
#[derive(Clone,Copy,PartialEq,Eq,Debug)]
pub enum TimestampEncoding {
    /// fixed 8 bytes per point, O(1) random access
    Raw,
    /// zigzag-varint successive differences, sequential decode only
    Delta
}

impl Default for TimestampEncoding {
    fn default() -> Self {
        TimestampEncoding::Delta
    }
}

/// Numeric value column encoding.
#[derive(Clone,Copy,PartialEq,Eq,Debug)]
pub enum ValueEncoding {
    /// fixed 8 bytes IEEE-754 per point, O(1) random access
    Raw,
    /// Gorilla XOR bit stream, sequential decode only
    Gorilla
}

impl Default for ValueEncoding {
    fn default() -> Self {
        ValueEncoding::Gorilla
    }
}
