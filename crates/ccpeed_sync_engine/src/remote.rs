//! Reads the device's file table.

use crate::error::{SyncError, SyncResult};
use crate::transport::{DeviceClient, DeviceTransport, Method, ResponseBody};
use ccpeed_sync_protocol::{RemoteFileTable, FS_RESOURCE};
use tracing::debug;

/// Fetches the remote file table with a single read of the `fs` resource.
pub fn fetch_remote_table<C: DeviceClient>(
    transport: &DeviceTransport<C>,
) -> SyncResult<RemoteFileTable> {
    let value = match transport.request(FS_RESOURCE, Method::Read, Vec::new())? {
        ResponseBody::Structured(value) => value,
        ResponseBody::Empty => {
            return Err(SyncError::Decode("file listing response has no body".into()))
        }
        ResponseBody::Text(_) => {
            return Err(SyncError::Decode(
                "file listing is text, expected CBOR".into(),
            ))
        }
    };

    let table = RemoteFileTable::from_cbor(&value)?;
    debug!(device = %transport.address(), files = table.len(), "fetched remote file table");
    Ok(table)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use crate::transport::{DeviceResponse, MockClient};
    use ccpeed_coap::Code;
    use ccpeed_sync_protocol::{DeviceAddress, Fingerprint};
    use ciborium::Value;

    fn transport(response: DeviceResponse) -> DeviceTransport<MockClient> {
        let client = MockClient::new();
        client.push_response(response);
        DeviceTransport::new(DeviceAddress::new("fd00::1"), client)
    }

    #[test]
    fn reads_listing() {
        let table: RemoteFileTable = vec![("init.lua".to_string(), Fingerprint::of(b"x"))]
            .into_iter()
            .collect();
        let transport = transport(
            DeviceResponse::new(Code::CONTENT)
                .with_cbor(&table.to_cbor())
                .unwrap(),
        );

        assert_eq!(fetch_remote_table(&transport).unwrap(), table);

        let requests = transport.client().requests();
        assert_eq!(requests.len(), 1);
        assert_eq!(requests[0].method, Method::Read);
        assert_eq!(requests[0].path, "fs");
    }

    #[test]
    fn error_status_is_protocol_error() {
        let transport = transport(DeviceResponse::new(Code::SERVICE_UNAVAILABLE));
        let err = fetch_remote_table(&transport).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Protocol);
    }

    #[test]
    fn wrong_shapes_are_decode_errors() {
        let bodies = vec![
            DeviceResponse::new(Code::CONTENT),
            DeviceResponse::new(Code::CONTENT).with_text("files"),
            DeviceResponse::new(Code::CONTENT)
                .with_cbor(&Value::Array(vec![]))
                .unwrap(),
        ];
        for body in bodies {
            let err = fetch_remote_table(&transport(body)).unwrap_err();
            assert_eq!(err.kind(), ErrorKind::Decode);
        }
    }
}
