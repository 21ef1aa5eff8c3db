//! Timestamp column codec.
//!
//! Raw encoding stores each timestamp as a fixed-width `i64` in the blob's
//! byte order, which gives O(1) random access.  Delta encoding stores the
//! difference from the previous point (from the blob start time for the
//! first point of a metric) as a zigzag varint and can only be decoded
//! sequentially.  Timestamps are kept in insertion order and are not
//! required to be monotonic; deltas carry either sign.

use super::{Endian,TimestampEncoding};
use super::varint;

/// Accumulates one metric's timestamp bytes.
pub struct TimestampWriter {
    encoding: TimestampEncoding,
    endian: Endian,
    prev: i64,
    buf: Vec<u8>
}

impl TimestampWriter {
    /// `base` is the blob start time; the first delta is taken against it.
    pub fn new(encoding: TimestampEncoding,endian: Endian,base: i64,capacity: usize) -> Self {
        let hint = match encoding {
            TimestampEncoding::Raw => capacity * 8,
            TimestampEncoding::Delta => capacity * 2
        };
        Self {
            encoding,
            endian,
            prev: base,
            buf: Vec::with_capacity(hint)
        }
    }
    pub fn push(&mut self,ts: i64) {
        match self.encoding {
            TimestampEncoding::Raw => self.endian.put_i64(&mut self.buf,ts),
            TimestampEncoding::Delta => {
                varint::put_i64(&mut self.buf,ts.wrapping_sub(self.prev));
                self.prev = ts;
            }
        }
    }
    pub fn byte_len(&self) -> usize {
        self.buf.len()
    }
    pub fn into_bytes(self) -> Vec<u8> {
        self.buf
    }
}

/// Iterates a raw timestamp slice.
pub struct RawTimestamps<'a> {
    buf: &'a [u8],
    endian: Endian,
    idx: usize,
    count: usize
}

impl<'a> RawTimestamps<'a> {
    pub fn new(buf: &'a [u8],endian: Endian,count: usize) -> Self {
        Self { buf, endian, idx: 0, count }
    }
}

impl<'a> Iterator for RawTimestamps<'a> {
    type Item = i64;
    fn next(&mut self) -> Option<i64> {
        if self.idx >= self.count {
            return None;
        }
        let ts = self.endian.read_i64(self.buf,self.idx*8)?;
        self.idx += 1;
        Some(ts)
    }
    fn size_hint(&self) -> (usize,Option<usize>) {
        let n = self.count - self.idx;
        (n,Some(n))
    }
}

/// Iterates a delta timestamp slice, reconstructing absolute values.
pub struct DeltaTimestamps<'a> {
    buf: &'a [u8],
    pos: usize,
    prev: i64,
    remaining: usize
}

impl<'a> DeltaTimestamps<'a> {
    /// `base` must equal the base the writer was created with.
    pub fn new(buf: &'a [u8],base: i64,count: usize) -> Self {
        Self { buf, pos: 0, prev: base, remaining: count }
    }
}

impl<'a> Iterator for DeltaTimestamps<'a> {
    type Item = i64;
    fn next(&mut self) -> Option<i64> {
        if self.remaining == 0 {
            return None;
        }
        let (delta,n) = varint::read_i64(&self.buf[self.pos..])?;
        self.pos += n;
        self.prev = self.prev.wrapping_add(delta);
        self.remaining -= 1;
        Some(self.prev)
    }
    fn size_hint(&self) -> (usize,Option<usize>) {
        (0,Some(self.remaining))
    }
}

/// Either timestamp iterator, selected by the blob's encoding flag.
pub enum Timestamps<'a> {
    Raw(RawTimestamps<'a>),
    Delta(DeltaTimestamps<'a>)
}

impl<'a> Timestamps<'a> {
    pub fn new(encoding: TimestampEncoding,buf: &'a [u8],endian: Endian,base: i64,count: usize) -> Self {
        match encoding {
            TimestampEncoding::Raw => Self::Raw(RawTimestamps::new(buf,endian,count)),
            TimestampEncoding::Delta => Self::Delta(DeltaTimestamps::new(buf,base,count))
        }
    }
}

impl<'a> Iterator for Timestamps<'a> {
    type Item = i64;
    fn next(&mut self) -> Option<i64> {
        match self {
            Self::Raw(it) => it.next(),
            Self::Delta(it) => it.next()
        }
    }
}

/// Random access into a timestamp slice.  O(1) for raw, forward scan for delta.
pub fn timestamp_at(encoding: TimestampEncoding,buf: &[u8],endian: Endian,base: i64,count: usize,i: usize) -> Option<i64> {
    if i >= count {
        return None;
    }
    match encoding {
        TimestampEncoding::Raw => endian.read_i64(buf,i*8),
        TimestampEncoding::Delta => DeltaTimestamps::new(buf,base,count).nth(i)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const BASE: i64 = 1_700_000_000_000_000;

    fn column(encoding: TimestampEncoding,endian: Endian,series: &[i64]) -> Vec<u8> {
        let mut w = TimestampWriter::new(encoding,endian,BASE,series.len());
        for ts in series {
            w.push(*ts);
        }
        w.into_bytes()
    }

    #[test]
    fn raw_round_trip_and_random_access() {
        let series = [BASE,BASE+1_000_000,BASE-5,BASE+2_000_000];
        for endian in [Endian::Little,Endian::Big] {
            let buf = column(TimestampEncoding::Raw,endian,&series);
            assert_eq!(buf.len(),series.len()*8);
            let got: Vec<i64> = Timestamps::new(TimestampEncoding::Raw,&buf,endian,BASE,series.len()).collect();
            assert_eq!(got,series);
            for (i,ts) in series.iter().enumerate() {
                assert_eq!(timestamp_at(TimestampEncoding::Raw,&buf,endian,BASE,series.len(),i),Some(*ts));
            }
            assert_eq!(timestamp_at(TimestampEncoding::Raw,&buf,endian,BASE,series.len(),series.len()),None);
        }
    }

    #[test]
    fn delta_round_trip_with_backward_steps() {
        // insertion order is preserved even when time goes backwards
        let series = [BASE+10,BASE+5,BASE+5,BASE+1_000_000,BASE-3];
        let buf = column(TimestampEncoding::Delta,Endian::Little,&series);
        let got: Vec<i64> = Timestamps::new(TimestampEncoding::Delta,&buf,Endian::Little,BASE,series.len()).collect();
        assert_eq!(got,series);
        assert_eq!(timestamp_at(TimestampEncoding::Delta,&buf,Endian::Little,BASE,series.len(),4),Some(BASE-3));
    }

    #[test]
    fn delta_stops_on_truncation() {
        let series = [BASE+1,BASE+2,BASE+1_000_000_000];
        let buf = column(TimestampEncoding::Delta,Endian::Little,&series);
        let cut = &buf[..buf.len()-1];
        let got: Vec<i64> = Timestamps::new(TimestampEncoding::Delta,cut,Endian::Little,BASE,series.len()).collect();
        assert_eq!(got,vec![BASE+1,BASE+2]);
    }
}
