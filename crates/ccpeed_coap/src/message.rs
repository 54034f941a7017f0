//! CoAP message and its wire codec.

use crate::code::{Code, ContentFormat, MessageType};
use crate::error::{CoapError, CoapResult};
use crate::option::{decode_uint, encode_uint, BlockValue, CoapOption, OptionNumber};

/// Protocol version carried in every header.
pub const VERSION: u8 = 1;

/// Maximum token length in bytes.
pub const MAX_TOKEN_LEN: usize = 8;

const HEADER_LEN: usize = 4;
const PAYLOAD_MARKER: u8 = 0xff;

/// Largest option delta or length the extended 14 form can carry.
const MAX_OPTION_EXT: usize = 269 + 0xffff;

/// A CoAP message.
///
/// Options are kept ordered by number; repeated options keep their
/// insertion order, which is significant for Uri-Path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Message {
    /// Message type.
    pub message_type: MessageType,
    /// Method or response code.
    pub code: Code,
    /// Message ID used for deduplication and ACK matching.
    pub message_id: u16,
    /// Token used to match responses to requests.
    pub token: Vec<u8>,
    options: Vec<CoapOption>,
    /// Payload bytes.
    pub payload: Vec<u8>,
}

impl Message {
    /// Creates a message without token, options or payload.
    pub fn new(message_type: MessageType, code: Code, message_id: u16) -> Self {
        Self {
            message_type,
            code,
            message_id,
            token: Vec::new(),
            options: Vec::new(),
            payload: Vec::new(),
        }
    }

    /// Creates a confirmable request.
    pub fn request(code: Code, message_id: u16, token: Vec<u8>) -> Self {
        let mut message = Self::new(MessageType::Confirmable, code, message_id);
        message.token = token;
        message
    }

    /// Creates an empty acknowledgement for `message_id`.
    pub fn empty_ack(message_id: u16) -> Self {
        Self::new(MessageType::Acknowledgement, Code::EMPTY, message_id)
    }

    /// Creates a reset for `message_id`.
    pub fn reset(message_id: u16) -> Self {
        Self::new(MessageType::Reset, Code::EMPTY, message_id)
    }

    /// Sets the token.
    pub fn with_token(mut self, token: Vec<u8>) -> Self {
        self.token = token;
        self
    }

    /// Sets the payload.
    pub fn with_payload(mut self, payload: Vec<u8>) -> Self {
        self.payload = payload;
        self
    }

    /// All options in wire order.
    pub fn options(&self) -> &[CoapOption] {
        &self.options
    }

    /// Appends an option after any existing options with the same number.
    pub fn add_option(&mut self, number: OptionNumber, value: impl Into<Vec<u8>>) {
        let at = self
            .options
            .iter()
            .position(|o| o.number > number)
            .unwrap_or(self.options.len());
        self.options.insert(at, CoapOption::new(number, value));
    }

    /// Replaces every instance of an option with a single value.
    pub fn set_option(&mut self, number: OptionNumber, value: impl Into<Vec<u8>>) {
        self.remove_option(number);
        self.add_option(number, value);
    }

    /// Removes every instance of an option.
    pub fn remove_option(&mut self, number: OptionNumber) {
        self.options.retain(|o| o.number != number);
    }

    /// First value of an option.
    pub fn option(&self, number: OptionNumber) -> Option<&[u8]> {
        self.option_values(number).next()
    }

    /// All values of a repeatable option, in order.
    pub fn option_values(&self, number: OptionNumber) -> impl Iterator<Item = &[u8]> {
        self.options
            .iter()
            .filter(move |o| o.number == number)
            .map(|o| o.value.as_slice())
    }

    /// Sets Uri-Path from a `/`-separated path. Empty segments are dropped.
    pub fn set_uri_path(&mut self, path: &str) {
        self.remove_option(OptionNumber::URI_PATH);
        for segment in path.split('/').filter(|s| !s.is_empty()) {
            self.add_option(OptionNumber::URI_PATH, segment.as_bytes());
        }
    }

    /// Uri-Path segments joined with `/`.
    pub fn uri_path(&self) -> String {
        self.option_values(OptionNumber::URI_PATH)
            .map(String::from_utf8_lossy)
            .collect::<Vec<_>>()
            .join("/")
    }

    /// Content-Format option, if present.
    pub fn content_format(&self) -> CoapResult<Option<ContentFormat>> {
        self.option(OptionNumber::CONTENT_FORMAT)
            .map(|v| {
                let raw = decode_uint(v)?;
                u16::try_from(raw)
                    .map(ContentFormat::new)
                    .map_err(|_| CoapError::InvalidUint { len: v.len() })
            })
            .transpose()
    }

    /// Sets the Content-Format option.
    pub fn set_content_format(&mut self, format: ContentFormat) {
        self.set_option(
            OptionNumber::CONTENT_FORMAT,
            encode_uint(u32::from(format.value())),
        );
    }

    /// Block1 option, if present.
    pub fn block1(&self) -> CoapResult<Option<BlockValue>> {
        self.option(OptionNumber::BLOCK1)
            .map(BlockValue::decode)
            .transpose()
    }

    /// Sets the Block1 option.
    pub fn set_block1(&mut self, block: BlockValue) {
        self.set_option(OptionNumber::BLOCK1, block.encode());
    }

    /// Block2 option, if present.
    pub fn block2(&self) -> CoapResult<Option<BlockValue>> {
        self.option(OptionNumber::BLOCK2)
            .map(BlockValue::decode)
            .transpose()
    }

    /// Sets the Block2 option.
    pub fn set_block2(&mut self, block: BlockValue) {
        self.set_option(OptionNumber::BLOCK2, block.encode());
    }

    /// Returns true for 0.00 messages (pings, empty ACKs and resets).
    pub fn is_empty(&self) -> bool {
        self.code.is_empty()
    }

    /// Encodes the message into a datagram.
    pub fn encode(&self) -> CoapResult<Vec<u8>> {
        if self.token.len() > MAX_TOKEN_LEN {
            return Err(CoapError::InvalidTokenLength(self.token.len()));
        }

        let mut buf = Vec::with_capacity(HEADER_LEN + self.token.len() + self.payload.len() + 16);
        buf.push((VERSION << 6) | (self.message_type.bits() << 4) | self.token.len() as u8);
        buf.push(self.code.raw());
        buf.extend_from_slice(&self.message_id.to_be_bytes());
        buf.extend_from_slice(&self.token);

        let mut previous = 0u16;
        for option in &self.options {
            let delta = usize::from(option.number.value() - previous);
            let len = option.value.len();
            if len > MAX_OPTION_EXT {
                return Err(CoapError::OptionTooLong {
                    number: option.number.value(),
                    len,
                });
            }

            let (delta_nibble, delta_ext) = split_option_field(delta);
            let (len_nibble, len_ext) = split_option_field(len);
            buf.push((delta_nibble << 4) | len_nibble);
            buf.extend_from_slice(&delta_ext);
            buf.extend_from_slice(&len_ext);
            buf.extend_from_slice(&option.value);
            previous = option.number.value();
        }

        if !self.payload.is_empty() {
            buf.push(PAYLOAD_MARKER);
            buf.extend_from_slice(&self.payload);
        }

        Ok(buf)
    }

    /// Decodes a datagram.
    ///
    /// # Errors
    ///
    /// Returns an error for truncated input, unsupported versions, reserved
    /// option nibbles and other message format errors.
    pub fn decode(bytes: &[u8]) -> CoapResult<Self> {
        if bytes.len() < HEADER_LEN {
            return Err(CoapError::truncated("header"));
        }

        let version = bytes[0] >> 6;
        if version != VERSION {
            return Err(CoapError::InvalidVersion(version));
        }
        let message_type = MessageType::from_bits(bytes[0] >> 4);
        let token_len = usize::from(bytes[0] & 0x0f);
        if token_len > MAX_TOKEN_LEN {
            return Err(CoapError::InvalidTokenLength(token_len));
        }
        let code = Code::from_raw(bytes[1]);
        let message_id = u16::from_be_bytes([bytes[2], bytes[3]]);

        if code.is_empty() && bytes.len() != HEADER_LEN {
            return Err(CoapError::InvalidEmptyMessage);
        }

        let mut reader = Reader::new(&bytes[HEADER_LEN..]);
        let token = reader.take(token_len, "token")?.to_vec();

        let mut options = Vec::new();
        let mut number = 0usize;
        let mut payload = Vec::new();

        while let Some(byte) = reader.next_byte() {
            if byte == PAYLOAD_MARKER {
                let rest = reader.rest();
                if rest.is_empty() {
                    return Err(CoapError::EmptyPayload);
                }
                payload = rest.to_vec();
                break;
            }

            let delta = reader.option_field(byte >> 4, "option delta")?;
            let len = reader.option_field(byte & 0x0f, "option length")?;
            number += delta;
            let option_number = u16::try_from(number).map_err(|_| {
                CoapError::invalid_option_header(format!("option number {} overflows", number))
            })?;
            let value = reader.take(len, "option value")?;
            options.push(CoapOption::new(OptionNumber::new(option_number), value));
        }

        Ok(Self {
            message_type,
            code,
            message_id,
            token,
            options,
            payload,
        })
    }
}

/// Splits a delta or length into its 4-bit nibble and extension bytes.
fn split_option_field(value: usize) -> (u8, Vec<u8>) {
    if value < 13 {
        (value as u8, Vec::new())
    } else if value < 269 {
        (13, vec![(value - 13) as u8])
    } else {
        (14, ((value - 269) as u16).to_be_bytes().to_vec())
    }
}

struct Reader<'a> {
    data: &'a [u8],
    pos: usize,
}

impl<'a> Reader<'a> {
    fn new(data: &'a [u8]) -> Self {
        Self { data, pos: 0 }
    }

    fn next_byte(&mut self) -> Option<u8> {
        let byte = *self.data.get(self.pos)?;
        self.pos += 1;
        Some(byte)
    }

    fn take(&mut self, len: usize, context: &'static str) -> CoapResult<&'a [u8]> {
        if self.pos + len > self.data.len() {
            return Err(CoapError::truncated(context));
        }
        let bytes = &self.data[self.pos..self.pos + len];
        self.pos += len;
        Ok(bytes)
    }

    fn rest(&mut self) -> &'a [u8] {
        let rest = &self.data[self.pos..];
        self.pos = self.data.len();
        rest
    }

    fn option_field(&mut self, nibble: u8, context: &'static str) -> CoapResult<usize> {
        match nibble {
            0..=12 => Ok(usize::from(nibble)),
            13 => Ok(usize::from(self.take(1, context)?[0]) + 13),
            14 => {
                let ext = self.take(2, context)?;
                Ok(usize::from(u16::from_be_bytes([ext[0], ext[1]])) + 269)
            }
            _ => Err(CoapError::invalid_option_header(format!(
                "reserved nibble 15 in {}",
                context
            ))),
        }
    }
}
