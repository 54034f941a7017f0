//! List command implementation.

use ccpeed_sync_engine::{fetch_remote_table, CoapConfig, DeviceTransport};
use ccpeed_sync_protocol::{DeviceAddress, RemoteFileTable};
use serde::Serialize;

/// Device file listing.
#[derive(Debug, Serialize)]
pub struct ListResult {
    /// Device address.
    pub device: String,
    /// Files in name order.
    pub files: Vec<RemoteFile>,
}

/// A file on the device.
#[derive(Debug, Serialize)]
pub struct RemoteFile {
    /// File name.
    pub name: String,
    /// Etag, hex.
    pub etag: String,
}

impl ListResult {
    fn new(address: &DeviceAddress, table: &RemoteFileTable) -> Self {
        Self {
            device: address.to_string(),
            files: table
                .iter()
                .map(|(name, etag)| RemoteFile {
                    name: name.to_string(),
                    etag: etag.to_hex(),
                })
                .collect(),
        }
    }
}

/// Prints the device file table.
pub fn run(
    address: DeviceAddress,
    coap: CoapConfig,
    format: &str,
) -> Result<(), Box<dyn std::error::Error>> {
    let transport = DeviceTransport::connect(address.clone(), coap)?;
    let table = fetch_remote_table(&transport)?;
    let result = ListResult::new(&address, &table);

    match format {
        "json" => {
            println!("{}", serde_json::to_string_pretty(&result)?);
        }
        _ => {
            for file in &result.files {
                println!("{}  {}", file.etag, file.name);
            }
            println!("{} file(s) on {}", result.files.len(), result.device);
        }
    }

    Ok(())
}
