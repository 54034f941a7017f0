//! # ccpeed CoAP
//!
//! CoAP (RFC 7252) message model and binary codec.
//!
//! This crate provides:
//! - `Message` with header, token, options and payload
//! - Request methods and response codes (`Code`)
//! - Typed option numbers and content formats
//! - Block1/Block2 option values for block-wise transfer (RFC 7959)
//!
//! This is a pure codec crate with no I/O operations. The UDP client
//! lives in `ccpeed_sync_engine`.
//!
//! ## Usage
//!
//! ```
//! use ccpeed_coap::{Code, Message};
//!
//! let mut request = Message::request(Code::GET, 0x1234, vec![0xAB]);
//! request.set_uri_path("fs");
//! let bytes = request.encode().unwrap();
//!
//! let decoded = Message::decode(&bytes).unwrap();
//! assert_eq!(decoded.uri_path(), "fs");
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod code;
mod error;
mod message;
mod option;

pub use code::{Code, ContentFormat, MessageType};
pub use error::{CoapError, CoapResult};
pub use message::{Message, MAX_TOKEN_LEN, VERSION};
pub use option::{decode_uint, encode_uint, BlockValue, CoapOption, OptionNumber};
