//! Opaque payload compression.
//!
//! Payload columns pass through one of four byte-in/byte-out codecs.  The
//! codecs are black boxes here; index offsets always refer to the
//! *decompressed* bytes, and the header records the on-wire size of each
//! section.  LZ4 uses size-prepended framing so the decoder can size its
//! output; zstd and snappy carry their own framing.

use log::error;
use crate::{Error,Result};

/// Compression codec ids as stored in the header `comp` nibbles.
#[derive(Clone,Copy,PartialEq,Eq,Debug)]
pub enum Compression {
    None,
    Zstd,
    /// Snappy-family codec, wire id 2
    Snappy,
    Lz4
}

impl Default for Compression {
    fn default() -> Self {
        Compression::None
    }
}

impl Compression {
    pub fn id(self) -> u8 {
        match self {
            Compression::None => 0,
            Compression::Zstd => 1,
            Compression::Snappy => 2,
            Compression::Lz4 => 3
        }
    }
    pub fn from_id(id: u8) -> Result<Self> {
        match id {
            0 => Ok(Compression::None),
            1 => Ok(Compression::Zstd),
            2 => Ok(Compression::Snappy),
            3 => Ok(Compression::Lz4),
            n => Err(Error::UnsupportedEncoding(n))
        }
    }
}

/// Compress a payload section.  `Compression::None` is a pass-through copy.
pub fn compress(codec: Compression,data: &[u8]) -> Result<Vec<u8>> {
    match codec {
        Compression::None => Ok(data.to_vec()),
        Compression::Zstd => zstd::bulk::compress(data,0).map_err(|e| {
            error!("zstd compression failed: {}",e);
            Error::InvalidFormat("zstd compression failed")
        }),
        Compression::Snappy => snap::raw::Encoder::new().compress_vec(data).map_err(|e| {
            error!("snappy compression failed: {}",e);
            Error::InvalidFormat("snappy compression failed")
        }),
        Compression::Lz4 => Ok(lz4_flex::compress_prepend_size(data))
    }
}

/// Decompress a payload section.
pub fn decompress(codec: Compression,data: &[u8]) -> Result<Vec<u8>> {
    match codec {
        Compression::None => Ok(data.to_vec()),
        Compression::Zstd => zstd::stream::decode_all(data).map_err(|e| {
            error!("zstd decompression failed: {}",e);
            Error::InvalidFormat("zstd payload did not decompress")
        }),
        Compression::Snappy => snap::raw::Decoder::new().decompress_vec(data).map_err(|e| {
            error!("snappy decompression failed: {}",e);
            Error::InvalidFormat("snappy payload did not decompress")
        }),
        Compression::Lz4 => lz4_flex::decompress_size_prepended(data).map_err(|e| {
            error!("lz4 decompression failed: {}",e);
            Error::InvalidFormat("lz4 payload did not decompress")
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn all_codecs_round_trip() {
        let data: Vec<u8> = (0..2048u32).map(|i| (i % 7) as u8).collect();
        for codec in [Compression::None,Compression::Zstd,Compression::Snappy,Compression::Lz4] {
            let wire = compress(codec,&data).expect("compress failed");
            let back = decompress(codec,&wire).expect("decompress failed");
            assert_eq!(back,data);
        }
    }

    #[test]
    fn empty_payload_round_trips() {
        for codec in [Compression::None,Compression::Zstd,Compression::Snappy,Compression::Lz4] {
            let wire = compress(codec,&[]).expect("compress failed");
            let back = decompress(codec,&wire).expect("decompress failed");
            assert!(back.is_empty());
        }
    }

    #[test]
    fn unknown_id_is_unsupported() {
        assert!(matches!(Compression::from_id(9),Err(Error::UnsupportedEncoding(9))));
    }

    #[test]
    fn garbage_input_is_invalid_format() {
        let junk = [0xffu8;16];
        assert!(decompress(Compression::Zstd,&junk).is_err());
        assert!(decompress(Compression::Lz4,&junk[..2]).is_err());
    }
}
