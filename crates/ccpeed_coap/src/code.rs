//! Message types, method/response codes and content formats.

use std::fmt;

/// CoAP message type (2-bit header field).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MessageType {
    /// Requires an acknowledgement.
    Confirmable,
    /// Does not require an acknowledgement.
    NonConfirmable,
    /// Acknowledges a confirmable message.
    Acknowledgement,
    /// Rejects a message that could not be processed.
    Reset,
}

impl MessageType {
    /// Returns the 2-bit wire value.
    pub fn bits(self) -> u8 {
        match self {
            MessageType::Confirmable => 0,
            MessageType::NonConfirmable => 1,
            MessageType::Acknowledgement => 2,
            MessageType::Reset => 3,
        }
    }

    /// Parses the 2-bit wire value (higher bits are ignored).
    pub fn from_bits(bits: u8) -> Self {
        match bits & 0x03 {
            0 => MessageType::Confirmable,
            1 => MessageType::NonConfirmable,
            2 => MessageType::Acknowledgement,
            _ => MessageType::Reset,
        }
    }
}

/// Method or response code, stored as `class << 5 | detail`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Code(u8);

impl Code {
    /// Empty message (0.00).
    pub const EMPTY: Code = Code::new(0, 0);
    /// GET request.
    pub const GET: Code = Code::new(0, 1);
    /// POST request.
    pub const POST: Code = Code::new(0, 2);
    /// PUT request.
    pub const PUT: Code = Code::new(0, 3);
    /// DELETE request.
    pub const DELETE: Code = Code::new(0, 4);

    /// 2.01 Created.
    pub const CREATED: Code = Code::new(2, 1);
    /// 2.02 Deleted.
    pub const DELETED: Code = Code::new(2, 2);
    /// 2.03 Valid.
    pub const VALID: Code = Code::new(2, 3);
    /// 2.04 Changed.
    pub const CHANGED: Code = Code::new(2, 4);
    /// 2.05 Content.
    pub const CONTENT: Code = Code::new(2, 5);
    /// 2.31 Continue (block-wise upload in progress).
    pub const CONTINUE: Code = Code::new(2, 31);

    /// 4.00 Bad Request.
    pub const BAD_REQUEST: Code = Code::new(4, 0);
    /// 4.01 Unauthorized.
    pub const UNAUTHORIZED: Code = Code::new(4, 1);
    /// 4.02 Bad Option.
    pub const BAD_OPTION: Code = Code::new(4, 2);
    /// 4.03 Forbidden.
    pub const FORBIDDEN: Code = Code::new(4, 3);
    /// 4.04 Not Found.
    pub const NOT_FOUND: Code = Code::new(4, 4);
    /// 4.05 Method Not Allowed.
    pub const METHOD_NOT_ALLOWED: Code = Code::new(4, 5);
    /// 4.06 Not Acceptable.
    pub const NOT_ACCEPTABLE: Code = Code::new(4, 6);
    /// 4.08 Request Entity Incomplete.
    pub const REQUEST_INCOMPLETE: Code = Code::new(4, 8);
    /// 4.12 Precondition Failed.
    pub const PRECONDITION_FAILED: Code = Code::new(4, 12);
    /// 4.13 Request Entity Too Large.
    pub const REQUEST_TOO_LARGE: Code = Code::new(4, 13);
    /// 4.15 Unsupported Content-Format.
    pub const UNSUPPORTED_FORMAT: Code = Code::new(4, 15);

    /// 5.00 Internal Server Error.
    pub const INTERNAL_ERROR: Code = Code::new(5, 0);
    /// 5.01 Not Implemented.
    pub const NOT_IMPLEMENTED: Code = Code::new(5, 1);
    /// 5.02 Bad Gateway.
    pub const BAD_GATEWAY: Code = Code::new(5, 2);
    /// 5.03 Service Unavailable.
    pub const SERVICE_UNAVAILABLE: Code = Code::new(5, 3);
    /// 5.04 Gateway Timeout.
    pub const GATEWAY_TIMEOUT: Code = Code::new(5, 4);
    /// 5.05 Proxying Not Supported.
    pub const PROXY_NOT_SUPPORTED: Code = Code::new(5, 5);

    /// Builds a code from its class (0-7) and detail (0-31).
    pub const fn new(class: u8, detail: u8) -> Self {
        Code(((class & 0x07) << 5) | (detail & 0x1f))
    }

    /// Wraps a raw header byte.
    pub const fn from_raw(raw: u8) -> Self {
        Code(raw)
    }

    /// Returns the raw header byte.
    pub const fn raw(self) -> u8 {
        self.0
    }

    /// Returns the class digit.
    pub const fn class(self) -> u8 {
        self.0 >> 5
    }

    /// Returns the detail digits.
    pub const fn detail(self) -> u8 {
        self.0 & 0x1f
    }

    /// Returns true for 0.00.
    pub fn is_empty(self) -> bool {
        self == Code::EMPTY
    }

    /// Returns true for request methods (class 0, non-empty).
    pub fn is_request(self) -> bool {
        self.class() == 0 && !self.is_empty()
    }

    /// Returns true for response codes (classes 2, 4 and 5).
    pub fn is_response(self) -> bool {
        matches!(self.class(), 2 | 4 | 5)
    }

    /// Returns true for 2.xx responses.
    pub fn is_success(self) -> bool {
        self.class() == 2
    }

    /// Human-readable name of well-known codes.
    pub fn name(self) -> Option<&'static str> {
        let name = match self {
            Code::EMPTY => "Empty",
            Code::GET => "GET",
            Code::POST => "POST",
            Code::PUT => "PUT",
            Code::DELETE => "DELETE",
            Code::CREATED => "Created",
            Code::DELETED => "Deleted",
            Code::VALID => "Valid",
            Code::CHANGED => "Changed",
            Code::CONTENT => "Content",
            Code::CONTINUE => "Continue",
            Code::BAD_REQUEST => "Bad Request",
            Code::UNAUTHORIZED => "Unauthorized",
            Code::BAD_OPTION => "Bad Option",
            Code::FORBIDDEN => "Forbidden",
            Code::NOT_FOUND => "Not Found",
            Code::METHOD_NOT_ALLOWED => "Method Not Allowed",
            Code::NOT_ACCEPTABLE => "Not Acceptable",
            Code::REQUEST_INCOMPLETE => "Request Entity Incomplete",
            Code::PRECONDITION_FAILED => "Precondition Failed",
            Code::REQUEST_TOO_LARGE => "Request Entity Too Large",
            Code::UNSUPPORTED_FORMAT => "Unsupported Content-Format",
            Code::INTERNAL_ERROR => "Internal Server Error",
            Code::NOT_IMPLEMENTED => "Not Implemented",
            Code::BAD_GATEWAY => "Bad Gateway",
            Code::SERVICE_UNAVAILABLE => "Service Unavailable",
            Code::GATEWAY_TIMEOUT => "Gateway Timeout",
            Code::PROXY_NOT_SUPPORTED => "Proxying Not Supported",
            _ => return None,
        };
        Some(name)
    }
}

impl fmt::Display for Code {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{:02}", self.class(), self.detail())?;
        if let Some(name) = self.name() {
            write!(f, " {}", name)?;
        }
        Ok(())
    }
}

/// Content-Format option value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ContentFormat(u16);

impl ContentFormat {
    /// `text/plain; charset=utf-8`
    pub const TEXT_PLAIN: ContentFormat = ContentFormat(0);
    /// `application/link-format`
    pub const LINK_FORMAT: ContentFormat = ContentFormat(40);
    /// `application/xml`
    pub const XML: ContentFormat = ContentFormat(41);
    /// `application/octet-stream`
    pub const OCTET_STREAM: ContentFormat = ContentFormat(42);
    /// `application/json`
    pub const JSON: ContentFormat = ContentFormat(50);
    /// `application/cbor`
    pub const CBOR: ContentFormat = ContentFormat(60);

    /// Wraps a registry value.
    pub const fn new(value: u16) -> Self {
        ContentFormat(value)
    }

    /// Returns the registry value.
    pub const fn value(self) -> u16 {
        self.0
    }

    /// Media type of well-known formats.
    pub fn media_type(self) -> Option<&'static str> {
        match self {
            ContentFormat::TEXT_PLAIN => Some("text/plain"),
            ContentFormat::LINK_FORMAT => Some("application/link-format"),
            ContentFormat::XML => Some("application/xml"),
            ContentFormat::OCTET_STREAM => Some("application/octet-stream"),
            ContentFormat::JSON => Some("application/json"),
            ContentFormat::CBOR => Some("application/cbor"),
            _ => None,
        }
    }
}

impl fmt::Display for ContentFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.media_type() {
            Some(media_type) => f.write_str(media_type),
            None => write!(f, "content-format {}", self.0),
        }
    }
}
