//! CoAP-over-UDP device client.
//!
//! Every request is sent confirmable. Lost messages are retransmitted with
//! exponential back-off; payloads larger than one block go out block-wise
//! and block-wise responses are reassembled before they are returned.

use crate::config::CoapConfig;
use crate::error::{SyncError, SyncResult};
use crate::transport::{DeviceClient, DeviceRequest, DeviceResponse, DeviceTransport, Method};
use ccpeed_coap::{encode_uint, BlockValue, Code, CoapError, Message, MessageType, OptionNumber};
use ccpeed_sync_protocol::DeviceAddress;
use std::io::ErrorKind as IoErrorKind;
use std::net::{Ipv4Addr, Ipv6Addr, SocketAddr, ToSocketAddrs, UdpSocket};
use std::sync::atomic::{AtomicU16, Ordering};
use std::time::Instant;
use tracing::{debug, trace, warn};

/// Receive buffer size; one 1024-byte block plus headers fits comfortably.
const RECV_BUFFER: usize = 2048;

const TOKEN_LEN: usize = 4;

/// Outcome of waiting for the acknowledgement of a confirmable message.
enum AckState {
    /// Piggybacked (or early separate) response.
    Response(Message),
    /// Empty ACK; the response follows separately.
    Separate,
    /// Nothing matching arrived before the deadline.
    TimedOut,
}

/// A CoAP client bound to one device.
#[derive(Debug)]
pub struct CoapClient {
    socket: UdpSocket,
    peer: SocketAddr,
    config: CoapConfig,
    next_message_id: AtomicU16,
}

impl CoapClient {
    /// Resolves `address` and opens a UDP socket connected to it.
    ///
    /// IPv6 literals may be given with or without brackets.
    pub fn connect(address: &DeviceAddress, config: CoapConfig) -> SyncResult<Self> {
        let host = address
            .as_str()
            .trim_start_matches('[')
            .trim_end_matches(']');
        let peer = (host, config.port)
            .to_socket_addrs()
            .map_err(|e| SyncError::transport_io(format!("cannot resolve {}", address), e))?
            .next()
            .ok_or_else(|| SyncError::transport(format!("no address found for {}", address)))?;

        let local: SocketAddr = if peer.is_ipv6() {
            (Ipv6Addr::UNSPECIFIED, 0).into()
        } else {
            (Ipv4Addr::UNSPECIFIED, 0).into()
        };
        let socket = UdpSocket::bind(local)
            .map_err(|e| SyncError::transport_io("failed to bind UDP socket", e))?;
        socket
            .connect(peer)
            .map_err(|e| SyncError::transport_io(format!("failed to connect to {}", peer), e))?;

        debug!(%peer, "coap client ready");
        Ok(Self {
            socket,
            peer,
            config,
            next_message_id: AtomicU16::new(rand::random()),
        })
    }

    /// Socket address of the device.
    pub fn peer(&self) -> SocketAddr {
        self.peer
    }

    /// Client configuration.
    pub fn config(&self) -> &CoapConfig {
        &self.config
    }

    fn next_message_id(&self) -> u16 {
        self.next_message_id.fetch_add(1, Ordering::Relaxed)
    }

    fn build_message(&self, request: &DeviceRequest, payload: Vec<u8>) -> Message {
        let token = rand::random::<[u8; TOKEN_LEN]>().to_vec();
        let mut message = Message::request(request.method.code(), self.next_message_id(), token)
            .with_payload(payload);
        message.set_uri_path(&request.path);
        message
    }

    fn send(&self, message: &Message) -> SyncResult<()> {
        let bytes = message
            .encode()
            .map_err(|e| SyncError::transport(format!("failed to encode message: {}", e)))?;
        self.socket
            .send(&bytes)
            .map_err(|e| SyncError::transport_io(format!("failed to send to {}", self.peer), e))?;
        Ok(())
    }

    fn acknowledge(&self, message: &Message) -> SyncResult<()> {
        self.send(&Message::empty_ack(message.message_id))
    }

    /// Receives the next well-formed message, or `None` at the deadline.
    fn recv_until(&self, deadline: Instant, buf: &mut [u8]) -> SyncResult<Option<Message>> {
        loop {
            let now = Instant::now();
            if now >= deadline {
                return Ok(None);
            }
            self.socket
                .set_read_timeout(Some(deadline - now))
                .map_err(|e| SyncError::transport_io("failed to set socket timeout", e))?;

            match self.socket.recv(buf) {
                Ok(len) => match Message::decode(&buf[..len]) {
                    Ok(message) => return Ok(Some(message)),
                    Err(e) => debug!(error = %e, "ignoring malformed datagram"),
                },
                Err(e) if matches!(e.kind(), IoErrorKind::WouldBlock | IoErrorKind::TimedOut) => {
                    return Ok(None)
                }
                Err(e) => {
                    return Err(SyncError::transport_io(
                        format!("failed to receive from {}", self.peer),
                        e,
                    ))
                }
            }
        }
    }

    /// Sends a confirmable message and returns the matching response.
    fn transact(&self, request: &Message, path: &str) -> SyncResult<Message> {
        let mut buf = vec![0u8; RECV_BUFFER];
        let initial = self.config.initial_timeout();
        let attempts = self.config.max_retransmit + 1;

        for attempt in 0..attempts {
            if attempt > 0 {
                warn!(path, attempt, message_id = request.message_id, "retransmitting");
            }
            self.send(request)?;

            let deadline = Instant::now() + self.config.retransmit_timeout(initial, attempt);
            match self.await_ack(request, deadline, &mut buf)? {
                AckState::Response(response) => return Ok(response),
                AckState::Separate => return self.await_separate(request, path, &mut buf),
                AckState::TimedOut => {}
            }
        }

        Err(SyncError::Timeout {
            path: path.to_string(),
            attempts,
        })
    }

    fn await_ack(
        &self,
        request: &Message,
        deadline: Instant,
        buf: &mut [u8],
    ) -> SyncResult<AckState> {
        while let Some(reply) = self.recv_until(deadline, buf)? {
            let same_exchange = reply.message_id == request.message_id;
            match reply.message_type {
                MessageType::Acknowledgement if same_exchange => {
                    if reply.is_empty() {
                        trace!(message_id = reply.message_id, "empty ack");
                        return Ok(AckState::Separate);
                    }
                    if reply.token == request.token {
                        return Ok(AckState::Response(reply));
                    }
                    debug!(message_id = reply.message_id, "ack with foreign token ignored");
                }
                MessageType::Reset if same_exchange => {
                    return Err(SyncError::transport(format!(
                        "device reset message {}",
                        request.message_id
                    )));
                }
                MessageType::Confirmable | MessageType::NonConfirmable
                    if reply.token == request.token && reply.code.is_response() =>
                {
                    // Separate response overtook its empty ACK.
                    if reply.message_type == MessageType::Confirmable {
                        self.acknowledge(&reply)?;
                    }
                    return Ok(AckState::Response(reply));
                }
                MessageType::Confirmable => {
                    debug!(message_id = reply.message_id, "rejecting unexpected message");
                    self.send(&Message::reset(reply.message_id))?;
                }
                _ => trace!(message_id = reply.message_id, "ignoring unrelated message"),
            }
        }
        Ok(AckState::TimedOut)
    }

    fn await_separate(
        &self,
        request: &Message,
        path: &str,
        buf: &mut [u8],
    ) -> SyncResult<Message> {
        let deadline = Instant::now() + self.config.response_timeout;
        while let Some(reply) = self.recv_until(deadline, buf)? {
            let is_response = reply.token == request.token && reply.code.is_response();
            match reply.message_type {
                MessageType::Confirmable if is_response => {
                    self.acknowledge(&reply)?;
                    return Ok(reply);
                }
                MessageType::NonConfirmable if is_response => return Ok(reply),
                MessageType::Confirmable => {
                    self.send(&Message::reset(reply.message_id))?;
                }
                _ => trace!(message_id = reply.message_id, "ignoring unrelated message"),
            }
        }
        Err(SyncError::Timeout {
            path: path.to_string(),
            attempts: 1,
        })
    }

    /// Uploads a payload as a sequence of Block1 requests.
    ///
    /// Returns the reply to the last block, or the first error reply. Any
    /// other status than 2.31 Continue for an earlier block is a protocol
    /// error, since the device has not received the whole payload.
    fn upload_blockwise(&self, request: &DeviceRequest) -> SyncResult<Message> {
        let payload = &request.payload;
        let mut szx = self.config.block_szx();
        let mut offset = 0usize;

        loop {
            let size = 1usize << (szx + 4);
            let end = (offset + size).min(payload.len());
            let more = end < payload.len();
            let block = BlockValue::new((offset / size) as u32, more, szx).map_err(block_error)?;

            let mut message = self.build_message(request, payload[offset..end].to_vec());
            message.set_block1(block);
            if block.num() == 0 {
                message.set_option(OptionNumber::SIZE1, encode_uint(payload.len() as u32));
            }
            debug!(path = %request.path, block = block.num(), more, size, "sending block");

            let reply = self.transact(&message, &request.path)?;
            if !more || reply.code.class() >= 4 {
                return Ok(reply);
            }
            if reply.code != Code::CONTINUE {
                return Err(SyncError::Protocol {
                    method: request.method,
                    path: request.path.clone(),
                    status: reply.code,
                    body: reply.payload,
                });
            }

            if let Some(ack) = reply.block1().map_err(block_error)? {
                if ack.szx() < szx {
                    debug!(from = size, to = ack.size(), "device requested smaller blocks");
                    szx = ack.szx();
                }
            }
            offset = end;
        }
    }

    /// Fetches the remaining Block2 blocks of a response and reassembles it.
    fn collect_blocks(
        &self,
        request: &DeviceRequest,
        first: Message,
    ) -> SyncResult<DeviceResponse> {
        let status = first.code;
        let content_format = first.content_format().map_err(block_error)?;
        let mut block = first.block2().map_err(block_error)?;
        let mut payload = first.payload;

        while let Some(current) = block.filter(BlockValue::more) {
            if request.method != Method::Read {
                warn!(path = %request.path, "ignoring block-wise response to a write");
                break;
            }
            let next_num = current.num() + 1;
            let next = BlockValue::new(next_num, false, current.szx()).map_err(block_error)?;

            let mut message = self.build_message(request, Vec::new());
            message.set_block2(next);
            let reply = self.transact(&message, &request.path)?;
            if reply.code != status {
                return Ok(DeviceResponse {
                    status: reply.code,
                    content_format: reply.content_format().map_err(block_error)?,
                    payload: reply.payload,
                });
            }

            block = reply.block2().map_err(block_error)?;
            match block {
                Some(received) if received.num() == next_num => {}
                _ => {
                    return Err(SyncError::Decode(format!(
                        "expected block {} of {}",
                        next_num, request.path
                    )))
                }
            }
            payload.extend_from_slice(&reply.payload);
        }

        Ok(DeviceResponse {
            status,
            content_format,
            payload,
        })
    }
}

impl DeviceClient for CoapClient {
    fn exchange(&self, request: &DeviceRequest) -> SyncResult<DeviceResponse> {
        let first = if request.payload.len() > self.config.block_size() {
            self.upload_blockwise(request)?
        } else {
            let message = self.build_message(request, request.payload.clone());
            self.transact(&message, &request.path)?
        };
        self.collect_blocks(request, first)
    }
}

impl DeviceTransport<CoapClient> {
    /// Opens a CoAP transport to `address`.
    pub fn connect(address: DeviceAddress, config: CoapConfig) -> SyncResult<Self> {
        let client = CoapClient::connect(&address, config)?;
        Ok(Self::new(address, client))
    }
}

fn block_error(err: CoapError) -> SyncError {
    SyncError::Decode(err.to_string())
}
