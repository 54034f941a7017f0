//! Option numbers, uint option values and block-wise transfer values.

use crate::error::{CoapError, CoapResult};
use std::fmt;

/// Registered option number.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct OptionNumber(u16);

impl OptionNumber {
    /// If-Match.
    pub const IF_MATCH: OptionNumber = OptionNumber(1);
    /// Uri-Host.
    pub const URI_HOST: OptionNumber = OptionNumber(3);
    /// ETag.
    pub const ETAG: OptionNumber = OptionNumber(4);
    /// If-None-Match.
    pub const IF_NONE_MATCH: OptionNumber = OptionNumber(5);
    /// Observe.
    pub const OBSERVE: OptionNumber = OptionNumber(6);
    /// Uri-Port.
    pub const URI_PORT: OptionNumber = OptionNumber(7);
    /// Location-Path.
    pub const LOCATION_PATH: OptionNumber = OptionNumber(8);
    /// Uri-Path.
    pub const URI_PATH: OptionNumber = OptionNumber(11);
    /// Content-Format.
    pub const CONTENT_FORMAT: OptionNumber = OptionNumber(12);
    /// Max-Age.
    pub const MAX_AGE: OptionNumber = OptionNumber(14);
    /// Uri-Query.
    pub const URI_QUERY: OptionNumber = OptionNumber(15);
    /// Accept.
    pub const ACCEPT: OptionNumber = OptionNumber(17);
    /// Location-Query.
    pub const LOCATION_QUERY: OptionNumber = OptionNumber(20);
    /// Block2 (response payload block).
    pub const BLOCK2: OptionNumber = OptionNumber(23);
    /// Block1 (request payload block).
    pub const BLOCK1: OptionNumber = OptionNumber(27);
    /// Size2.
    pub const SIZE2: OptionNumber = OptionNumber(28);
    /// Proxy-Uri.
    pub const PROXY_URI: OptionNumber = OptionNumber(35);
    /// Proxy-Scheme.
    pub const PROXY_SCHEME: OptionNumber = OptionNumber(39);
    /// Size1.
    pub const SIZE1: OptionNumber = OptionNumber(60);

    /// Wraps a raw option number.
    pub const fn new(number: u16) -> Self {
        OptionNumber(number)
    }

    /// Returns the raw option number.
    pub const fn value(self) -> u16 {
        self.0
    }

    /// Critical options have an odd number.
    pub fn is_critical(self) -> bool {
        self.0 & 0x01 == 0x01
    }
}

impl fmt::Display for OptionNumber {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A single option instance.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CoapOption {
    /// Option number.
    pub number: OptionNumber,
    /// Raw option value.
    pub value: Vec<u8>,
}

impl CoapOption {
    /// Creates an option.
    pub fn new(number: OptionNumber, value: impl Into<Vec<u8>>) -> Self {
        Self {
            number,
            value: value.into(),
        }
    }
}

/// Encodes an unsigned integer option value with the fewest bytes.
///
/// Zero encodes as an empty value.
pub fn encode_uint(value: u32) -> Vec<u8> {
    let bytes = value.to_be_bytes();
    let skip = bytes.iter().take_while(|&&b| b == 0).count();
    bytes[skip..].to_vec()
}

/// Decodes an unsigned integer option value of up to 4 bytes.
pub fn decode_uint(bytes: &[u8]) -> CoapResult<u32> {
    if bytes.len() > 4 {
        return Err(CoapError::InvalidUint { len: bytes.len() });
    }
    Ok(bytes
        .iter()
        .fold(0u32, |acc, &b| (acc << 8) | u32::from(b)))
}

/// Value of a Block1 or Block2 option (RFC 7959).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BlockValue {
    num: u32,
    more: bool,
    szx: u8,
}

impl BlockValue {
    /// Largest block number that fits the 3-byte encoding.
    pub const MAX_NUM: u32 = (1 << 20) - 1;

    /// Largest size exponent (1024-byte blocks).
    pub const MAX_SZX: u8 = 6;

    /// Creates a block value.
    pub fn new(num: u32, more: bool, szx: u8) -> CoapResult<Self> {
        if szx > Self::MAX_SZX {
            return Err(CoapError::invalid_block(format!(
                "size exponent {} out of range",
                szx
            )));
        }
        if num > Self::MAX_NUM {
            return Err(CoapError::invalid_block(format!(
                "block number {} out of range",
                num
            )));
        }
        Ok(Self { num, more, szx })
    }

    /// Returns the size exponent for a block size of 16..=1024 bytes.
    pub fn szx_for_size(size: usize) -> CoapResult<u8> {
        match size {
            16 => Ok(0),
            32 => Ok(1),
            64 => Ok(2),
            128 => Ok(3),
            256 => Ok(4),
            512 => Ok(5),
            1024 => Ok(6),
            _ => Err(CoapError::invalid_block(format!(
                "block size {} is not a power of two between 16 and 1024",
                size
            ))),
        }
    }

    /// Block number.
    pub fn num(&self) -> u32 {
        self.num
    }

    /// Whether more blocks follow.
    pub fn more(&self) -> bool {
        self.more
    }

    /// Size exponent.
    pub fn szx(&self) -> u8 {
        self.szx
    }

    /// Block size in bytes.
    pub fn size(&self) -> usize {
        1 << (usize::from(self.szx) + 4)
    }

    /// Byte offset of this block in the full body.
    pub fn offset(&self) -> usize {
        self.num as usize * self.size()
    }

    /// Encodes the option value.
    pub fn encode(&self) -> Vec<u8> {
        let more = if self.more { 0x08 } else { 0x00 };
        encode_uint((self.num << 4) | more | u32::from(self.szx))
    }

    /// Decodes an option value.
    pub fn decode(bytes: &[u8]) -> CoapResult<Self> {
        if bytes.len() > 3 {
            return Err(CoapError::invalid_block(format!(
                "value of {} bytes exceeds 3 bytes",
                bytes.len()
            )));
        }
        let raw = decode_uint(bytes)?;
        let szx = (raw & 0x07) as u8;
        if szx == 7 {
            return Err(CoapError::invalid_block("reserved size exponent 7"));
        }
        Ok(Self {
            num: raw >> 4,
            more: raw & 0x08 != 0,
            szx,
        })
    }
}

impl fmt::Display for BlockValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}/{}/{}",
            self.num,
            if self.more { 1 } else { 0 },
            self.size()
        )
    }
}
