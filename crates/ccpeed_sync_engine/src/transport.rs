//! Transport layer between the sync engine and a device.
//!
//! [`DeviceClient`] performs one request/response exchange and knows nothing
//! about expected statuses. [`DeviceTransport`] wraps a client, enforces the
//! expected status per method and decodes the body by content format.

use crate::error::{SyncError, SyncResult};
use ccpeed_coap::{Code, ContentFormat};
use ccpeed_sync_protocol::DeviceAddress;
use ciborium::Value;
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::fmt;
use std::sync::Arc;
use tracing::debug;

/// Request method.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Method {
    /// Fetch a resource (GET).
    Read,
    /// Replace a resource (PUT).
    WriteReplace,
    /// Trigger an action (POST).
    WriteCreate,
}

impl Method {
    /// CoAP request code.
    pub fn code(self) -> Code {
        match self {
            Method::Read => Code::GET,
            Method::WriteReplace => Code::PUT,
            Method::WriteCreate => Code::POST,
        }
    }

    /// Status a successful response must carry.
    pub fn expected_status(self) -> Code {
        match self {
            Method::Read => Code::CONTENT,
            Method::WriteReplace | Method::WriteCreate => Code::CHANGED,
        }
    }
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Method::Read => "GET",
            Method::WriteReplace => "PUT",
            Method::WriteCreate => "POST",
        };
        f.write_str(name)
    }
}

/// A request to a device resource.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceRequest {
    /// Request method.
    pub method: Method,
    /// Resource path, `/`-separated.
    pub path: String,
    /// Request payload.
    pub payload: Vec<u8>,
}

impl DeviceRequest {
    /// Creates a request.
    pub fn new(method: Method, path: impl Into<String>, payload: Vec<u8>) -> Self {
        Self {
            method,
            path: path.into(),
            payload,
        }
    }
}

/// A complete, reassembled device response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceResponse {
    /// Response status.
    pub status: Code,
    /// Declared content format, if any.
    pub content_format: Option<ContentFormat>,
    /// Response payload.
    pub payload: Vec<u8>,
}

impl DeviceResponse {
    /// Creates a response with no body.
    pub fn new(status: Code) -> Self {
        Self {
            status,
            content_format: None,
            payload: Vec::new(),
        }
    }

    /// Sets the body and its content format.
    pub fn with_body(mut self, format: ContentFormat, payload: Vec<u8>) -> Self {
        self.content_format = Some(format);
        self.payload = payload;
        self
    }

    /// Sets a plain-text body.
    pub fn with_text(self, text: &str) -> Self {
        self.with_body(ContentFormat::TEXT_PLAIN, text.as_bytes().to_vec())
    }

    /// Sets a CBOR body.
    pub fn with_cbor(self, value: &Value) -> SyncResult<Self> {
        let mut payload = Vec::new();
        ciborium::ser::into_writer(value, &mut payload)
            .map_err(|e| SyncError::Decode(format!("failed to encode CBOR body: {}", e)))?;
        Ok(self.with_body(ContentFormat::CBOR, payload))
    }
}

/// Decoded response body.
#[derive(Debug, Clone, PartialEq)]
pub enum ResponseBody {
    /// No payload.
    Empty,
    /// CBOR payload.
    Structured(Value),
    /// Text payload.
    Text(String),
}

impl ResponseBody {
    /// Decodes a response payload according to its content format.
    pub fn decode(response: &DeviceResponse) -> SyncResult<Self> {
        if response.payload.is_empty() {
            return Ok(ResponseBody::Empty);
        }
        match response.content_format {
            Some(ContentFormat::CBOR) => ciborium::de::from_reader(response.payload.as_slice())
                .map(ResponseBody::Structured)
                .map_err(|e| SyncError::Decode(format!("invalid CBOR body: {}", e))),
            None | Some(ContentFormat::TEXT_PLAIN) => String::from_utf8(response.payload.clone())
                .map(ResponseBody::Text)
                .map_err(|e| SyncError::Decode(format!("invalid UTF-8 body: {}", e))),
            Some(other) => Err(SyncError::Decode(format!(
                "unsupported content format {}",
                other
            ))),
        }
    }

    /// Returns true if there was no payload.
    pub fn is_empty(&self) -> bool {
        matches!(self, ResponseBody::Empty)
    }

    /// The CBOR value, if the body was structured.
    pub fn as_structured(&self) -> Option<&Value> {
        match self {
            ResponseBody::Structured(value) => Some(value),
            _ => None,
        }
    }

    /// The text, if the body was text.
    pub fn as_text(&self) -> Option<&str> {
        match self {
            ResponseBody::Text(text) => Some(text),
            _ => None,
        }
    }
}

/// Performs request/response exchanges with one device.
///
/// Implementations handle message layer concerns (retransmission, block-wise
/// transfer) and return the final reassembled response whatever its status.
pub trait DeviceClient: Send + Sync {
    /// Sends a request and waits for its response.
    fn exchange(&self, request: &DeviceRequest) -> SyncResult<DeviceResponse>;
}

impl<T: DeviceClient + ?Sized> DeviceClient for Arc<T> {
    fn exchange(&self, request: &DeviceRequest) -> SyncResult<DeviceResponse> {
        (**self).exchange(request)
    }
}

impl<T: DeviceClient + ?Sized> DeviceClient for Box<T> {
    fn exchange(&self, request: &DeviceRequest) -> SyncResult<DeviceResponse> {
        (**self).exchange(request)
    }
}

/// Status-checking, body-decoding transport bound to one device.
pub struct DeviceTransport<C: DeviceClient> {
    address: DeviceAddress,
    client: C,
}

impl<C: DeviceClient> DeviceTransport<C> {
    /// Creates a transport for `address` over `client`.
    pub fn new(address: DeviceAddress, client: C) -> Self {
        Self { address, client }
    }

    /// The device this transport talks to.
    pub fn address(&self) -> &DeviceAddress {
        &self.address
    }

    /// The underlying client.
    pub fn client(&self) -> &C {
        &self.client
    }

    /// Issues a request and decodes the response.
    ///
    /// Fails with [`SyncError::Protocol`] unless the device answers with the
    /// status expected for `method`.
    pub fn request(
        &self,
        path: &str,
        method: Method,
        payload: Vec<u8>,
    ) -> SyncResult<ResponseBody> {
        let request = DeviceRequest::new(method, path, payload);
        debug!(%method, path, bytes = request.payload.len(), "device request");

        let response = self.client.exchange(&request)?;
        debug!(
            %method,
            path,
            status = %response.status,
            bytes = response.payload.len(),
            "device response"
        );

        if response.status != method.expected_status() {
            return Err(SyncError::Protocol {
                method,
                path: path.to_string(),
                status: response.status,
                body: response.payload,
            });
        }
        ResponseBody::decode(&response)
    }
}

/// A scripted client for testing.
///
/// Responses are returned in the order they were queued; every request is
/// recorded.
#[derive(Debug, Default)]
pub struct MockClient {
    responses: Mutex<VecDeque<DeviceResponse>>,
    requests: Mutex<Vec<DeviceRequest>>,
}

impl MockClient {
    /// Creates a client with no queued responses.
    pub fn new() -> Self {
        Self::default()
    }

    /// Queues a response.
    pub fn push_response(&self, response: DeviceResponse) {
        self.responses.lock().push_back(response);
    }

    /// Requests received so far.
    pub fn requests(&self) -> Vec<DeviceRequest> {
        self.requests.lock().clone()
    }
}

impl DeviceClient for MockClient {
    fn exchange(&self, request: &DeviceRequest) -> SyncResult<DeviceResponse> {
        self.requests.lock().push(request.clone());
        self.responses
            .lock()
            .pop_front()
            .ok_or_else(|| {
                SyncError::transport(format!("no scripted response for {}", request.path))
            })
    }
}
