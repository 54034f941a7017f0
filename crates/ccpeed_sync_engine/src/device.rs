//! In-memory device for tests and demos.

use crate::error::{SyncError, SyncResult};
use crate::transport::{DeviceClient, DeviceRequest, DeviceResponse, Method};
use ccpeed_coap::{Code, ContentFormat};
use ccpeed_sync_protocol::{Fingerprint, RemoteFileTable, FS_RESOURCE, RESTART_RESOURCE};
use parking_lot::Mutex;
use std::collections::{BTreeMap, HashMap};

#[derive(Debug, Default)]
struct DeviceState {
    files: BTreeMap<String, Vec<u8>>,
    restarts: u32,
    requests: Vec<DeviceRequest>,
    failures: HashMap<(Method, String), Code>,
    unreachable: bool,
}

/// A simulated device serving `fs`, `fs/{name}` and `restart`.
///
/// Etags are computed from stored content the same way the firmware does.
#[derive(Debug, Default)]
pub struct MemoryDevice {
    state: Mutex<DeviceState>,
}

impl MemoryDevice {
    /// Creates a device with no files.
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a file, builder style.
    pub fn with_file(self, name: &str, content: impl AsRef<[u8]>) -> Self {
        self.put_file(name, content);
        self
    }

    /// Stores a file.
    pub fn put_file(&self, name: &str, content: impl AsRef<[u8]>) {
        self.state
            .lock()
            .files
            .insert(name.to_string(), content.as_ref().to_vec());
    }

    /// Content of a stored file.
    pub fn file(&self, name: &str) -> Option<Vec<u8>> {
        self.state.lock().files.get(name).cloned()
    }

    /// Names of stored files.
    pub fn file_names(&self) -> Vec<String> {
        self.state.lock().files.keys().cloned().collect()
    }

    /// The table the device would report.
    pub fn table(&self) -> RemoteFileTable {
        table_of(&self.state.lock().files)
    }

    /// Number of restart requests served.
    pub fn restart_count(&self) -> u32 {
        self.state.lock().restarts
    }

    /// Every request received, in order.
    pub fn requests(&self) -> Vec<DeviceRequest> {
        self.state.lock().requests.clone()
    }

    /// Paths of every write request received, in order.
    pub fn uploads(&self) -> Vec<String> {
        self.state
            .lock()
            .requests
            .iter()
            .filter(|r| r.method == Method::WriteReplace)
            .map(|r| r.path.clone())
            .collect()
    }

    /// Forgets recorded requests.
    pub fn clear_requests(&self) {
        self.state.lock().requests.clear();
    }

    /// Makes `method` on `path` answer with `status` from now on.
    pub fn fail(&self, method: Method, path: &str, status: Code) {
        self.state
            .lock()
            .failures
            .insert((method, path.to_string()), status);
    }

    /// Makes every exchange time out.
    pub fn set_unreachable(&self, unreachable: bool) {
        self.state.lock().unreachable = unreachable;
    }
}

impl DeviceClient for MemoryDevice {
    fn exchange(&self, request: &DeviceRequest) -> SyncResult<DeviceResponse> {
        let mut state = self.state.lock();
        state.requests.push(request.clone());

        if state.unreachable {
            return Err(SyncError::Timeout {
                path: request.path.clone(),
                attempts: 1,
            });
        }
        if let Some(status) = state
            .failures
            .get(&(request.method, request.path.clone()))
        {
            return Ok(DeviceResponse::new(*status).with_text("injected failure"));
        }

        let file_name = request.path.strip_prefix("fs/");
        match (request.method, request.path.as_str(), file_name) {
            (Method::Read, FS_RESOURCE, _) => {
                DeviceResponse::new(Code::CONTENT).with_cbor(&table_of(&state.files).to_cbor())
            }
            (Method::Read, _, Some(name)) => match state.files.get(name) {
                Some(content) => Ok(DeviceResponse::new(Code::CONTENT)
                    .with_body(ContentFormat::OCTET_STREAM, content.clone())),
                None => Ok(DeviceResponse::new(Code::NOT_FOUND)),
            },
            (Method::WriteReplace, _, Some(name)) if !name.is_empty() => {
                state.files.insert(name.to_string(), request.payload.clone());
                Ok(DeviceResponse::new(Code::CHANGED))
            }
            (Method::WriteCreate, RESTART_RESOURCE, _) => {
                state.restarts += 1;
                Ok(DeviceResponse::new(Code::CHANGED))
            }
            (_, FS_RESOURCE, _) | (_, RESTART_RESOURCE, _) | (_, _, Some(_)) => {
                Ok(DeviceResponse::new(Code::METHOD_NOT_ALLOWED))
            }
            _ => Ok(DeviceResponse::new(Code::NOT_FOUND)),
        }
    }
}

fn table_of(files: &BTreeMap<String, Vec<u8>>) -> RemoteFileTable {
    files
        .iter()
        .map(|(name, content)| (name.clone(), Fingerprint::of(content)))
        .collect()
}
