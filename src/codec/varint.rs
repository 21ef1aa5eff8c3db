//! Zigzag-varint integers.
//!
//! Signed values map through zigzag `(n << 1) ^ (n >> 63)` and are then
//! written as unsigned LEB128, so deltas of either sign stay short.  The
//! `integer-encoding` crate implements exactly that mapping; these wrappers
//! pin the slice-cursor calling convention used by the column scanners.

use integer_encoding::VarInt;

/// Append a zigzag-varint `i64`.
pub fn put_i64(dst: &mut Vec<u8>,v: i64) {
    let mut scratch = [0u8;10];
    let n = v.encode_var(&mut scratch);
    dst.extend_from_slice(&scratch[..n]);
}

/// Append an unsigned varint length field.
pub fn put_u64(dst: &mut Vec<u8>,v: u64) {
    let mut scratch = [0u8;10];
    let n = v.encode_var(&mut scratch);
    dst.extend_from_slice(&scratch[..n]);
}

/// Decode a zigzag-varint `i64` at the start of `buf`, returning the value
/// and the number of bytes consumed.  `None` on truncation or overflow.
pub fn read_i64(buf: &[u8]) -> Option<(i64,usize)> {
    i64::decode_var(buf)
}

/// Decode an unsigned varint at the start of `buf`.
pub fn read_u64(buf: &[u8]) -> Option<(u64,usize)> {
    u64::decode_var(buf)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trip_signed_edges() {
        let cases = [0i64,1,-1,63,-64,64,-65,1_000_000,-1_000_000,i64::MAX,i64::MIN];
        for v in cases {
            let mut buf: Vec<u8> = Vec::new();
            put_i64(&mut buf,v);
            let (back,n) = read_i64(&buf).expect("varint decode failed");
            assert_eq!(back,v);
            assert_eq!(n,buf.len());
        }
    }

    #[test]
    fn small_magnitudes_stay_short() {
        // one microsecond of delta in either direction fits in one byte
        for v in [-63i64,0,63] {
            let mut buf: Vec<u8> = Vec::new();
            put_i64(&mut buf,v);
            assert_eq!(buf.len(),1);
        }
    }

    #[test]
    fn truncated_input_is_none() {
        let mut buf: Vec<u8> = Vec::new();
        put_i64(&mut buf,i64::MIN);
        assert!(read_i64(&buf[..buf.len()-1]).is_none());
        assert!(read_i64(&[]).is_none());
    }
}
