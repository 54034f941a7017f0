//! Integration tests for sync sessions against simulated devices.

use ccpeed_coap::{Code, Message, MessageType};
use ccpeed_sync_engine::{
    CoapConfig, DeviceClient, DeviceRequest, DeviceResponse, DeviceTransport, ErrorKind,
    FileStatus, MemoryDevice, Method, SessionConfig, SyncEngine, SyncError,
};
use ccpeed_sync_protocol::{DeviceAddress, Fingerprint};
use ccpeed_testkit::{ScriptDir, TEST_CLASS, TEST_DEVICE};
use std::net::UdpSocket;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

fn engine(scripts: &ScriptDir, device: &Arc<MemoryDevice>) -> SyncEngine<Arc<MemoryDevice>> {
    engine_with(scripts, device, SessionConfig::new(TEST_CLASS))
}

fn engine_with(
    scripts: &ScriptDir,
    device: &Arc<MemoryDevice>,
    config: SessionConfig,
) -> SyncEngine<Arc<MemoryDevice>> {
    SyncEngine::new(
        DeviceTransport::new(DeviceAddress::new(TEST_DEVICE), Arc::clone(device)),
        config.with_source_dir(scripts.path()),
    )
}

/// A device already holding exactly the standard layout.
fn synced_device(scripts: &ScriptDir) -> Arc<MemoryDevice> {
    let device = MemoryDevice::new()
        .with_file("init.lua", scripts.read("fd00_1__2.lua"))
        .with_file("a.lua", scripts.read("a.lua"))
        .with_file("b.lua", scripts.read("b.lua"))
        .with_file("c.lua", scripts.read("c.lua"));
    Arc::new(device)
}

#[test]
fn resolves_boot_script_then_common_then_class() {
    let scripts = ScriptDir::standard();
    let device = Arc::new(MemoryDevice::new());
    let files = engine(&scripts, &device).resolve_files().unwrap();

    let names: Vec<&str> = files.iter().map(|e| e.name.as_str()).collect();
    assert_eq!(names, vec!["fd00_1__2.lua", "a.lua", "b.lua", "c.lua"]);
    assert_eq!(files.boot_script().remote, "init.lua");
    assert!(device.requests().is_empty());
}

#[test]
fn first_session_uploads_everything_and_reboots() {
    let scripts = ScriptDir::standard();
    let device = Arc::new(MemoryDevice::new());

    let report = engine(&scripts, &device).run().unwrap();

    assert_eq!(report.remote_files, 0);
    assert_eq!(report.sync.changes, 4);
    assert!(report.rebooted);
    assert_eq!(
        device.uploads(),
        vec!["fs/init.lua", "fs/a.lua", "fs/b.lua", "fs/c.lua"]
    );
    assert_eq!(device.file("init.lua").unwrap(), scripts.read("fd00_1__2.lua"));
    assert_eq!(device.restart_count(), 1);

    // listing first, restart last
    let requests = device.requests();
    assert_eq!(requests.first().unwrap().path, "fs");
    assert_eq!(requests.last().unwrap().path, "restart");
}

#[test]
fn second_session_is_idempotent() {
    let scripts = ScriptDir::standard();
    let device = Arc::new(MemoryDevice::new());

    engine(&scripts, &device).run().unwrap();
    device.clear_requests();

    let report = engine(&scripts, &device).run().unwrap();
    assert_eq!(report.sync.changes, 0);
    assert!(report.sync.is_noop());
    assert!(!report.rebooted);
    assert_eq!(device.restart_count(), 1);
    assert!(device.uploads().is_empty());
    assert_eq!(device.requests().len(), 1);
}

#[test]
fn only_mismatched_file_is_uploaded() {
    let scripts = ScriptDir::standard();
    let device = synced_device(&scripts);
    device.put_file("b.lua", "-- stale b");

    let report = engine(&scripts, &device).run().unwrap();

    assert_eq!(report.sync.changes, 1);
    assert!(report.rebooted);
    assert_eq!(device.uploads(), vec!["fs/b.lua"]);
    assert_eq!(device.file("b.lua").unwrap(), scripts.read("b.lua"));

    let b = &report.sync.outcomes[2];
    assert_eq!(b.status, FileStatus::Updated);
    assert_eq!(b.remote_etag, Some(Fingerprint::of(b"-- stale b")));
    assert_eq!(b.local, Some(Fingerprint::of(&scripts.read("b.lua"))));
}

#[test]
fn all_matching_means_no_uploads_and_no_reboot() {
    let scripts = ScriptDir::standard();
    let device = synced_device(&scripts);

    let report = engine(&scripts, &device).run().unwrap();

    assert_eq!(report.sync.changes, 0);
    assert_eq!(report.sync.unchanged(), 4);
    assert!(!report.rebooted);
    assert!(device.uploads().is_empty());
    assert_eq!(device.restart_count(), 0);
}

#[test]
fn extra_remote_files_are_left_alone() {
    let scripts = ScriptDir::standard();
    let device = synced_device(&scripts);
    device.put_file("old.lua", "-- leftover");

    let report = engine(&scripts, &device).run().unwrap();
    assert_eq!(report.remote_files, 5);
    assert_eq!(report.sync.changes, 0);
    assert!(device.file("old.lua").is_some());
}

#[test]
fn unreadable_file_aborts_before_later_files() {
    let scripts = ScriptDir::standard();
    scripts.remove("b.lua");
    let device = Arc::new(MemoryDevice::new());

    let err = engine(&scripts, &device).run().unwrap_err();

    assert_eq!(err.kind(), ErrorKind::Io);
    match &err {
        SyncError::FileFailed {
            file,
            remote,
            uploaded,
            ..
        } => {
            assert_eq!(file, "b.lua");
            assert_eq!(remote, "b.lua");
            assert_eq!(*uploaded, 2);
        }
        other => panic!("unexpected error: {:?}", other),
    }
    assert_eq!(device.uploads(), vec!["fs/init.lua", "fs/a.lua"]);
    assert!(device.file("c.lua").is_none());
    assert_eq!(device.restart_count(), 0);
}

#[test]
fn missing_boot_script_fails_first() {
    let scripts = ScriptDir::standard();
    scripts.remove("fd00_1__2.lua");
    let device = Arc::new(MemoryDevice::new());

    let err = engine(&scripts, &device).run().unwrap_err();
    assert!(matches!(
        &err,
        SyncError::FileFailed { remote, uploaded: 0, .. } if remote == "init.lua"
    ));
    assert!(device.uploads().is_empty());
}

#[test]
fn rejected_upload_stops_session_without_reboot() {
    let scripts = ScriptDir::standard();
    let device = Arc::new(MemoryDevice::new());
    device.fail(Method::WriteReplace, "fs/a.lua", Code::REQUEST_TOO_LARGE);

    let err = engine(&scripts, &device).run().unwrap_err();

    assert_eq!(err.kind(), ErrorKind::Protocol);
    assert_eq!(err.status(), Some(Code::REQUEST_TOO_LARGE));
    assert!(device.file("init.lua").is_some());
    assert!(device.file("b.lua").is_none());
    assert_eq!(device.restart_count(), 0);
}

#[test]
fn failed_reboot_keeps_uploads() {
    let scripts = ScriptDir::standard();
    let device = Arc::new(MemoryDevice::new());
    device.fail(Method::WriteCreate, "restart", Code::SERVICE_UNAVAILABLE);

    let err = engine(&scripts, &device).run().unwrap_err();

    assert!(matches!(err, SyncError::RebootFailed { changes: 4, .. }));
    assert_eq!(err.kind(), ErrorKind::Protocol);
    assert_eq!(device.file_names().len(), 4);
}

#[test]
fn failed_listing_stops_before_uploads() {
    let scripts = ScriptDir::standard();
    let device = Arc::new(MemoryDevice::new());
    device.fail(Method::Read, "fs", Code::INTERNAL_ERROR);

    let err = engine(&scripts, &device).run().unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Protocol);
    assert_eq!(device.requests().len(), 1);
}

#[test]
fn unknown_class_contacts_nothing() {
    let scripts = ScriptDir::standard();
    let device = Arc::new(MemoryDevice::new());

    let err = engine_with(&scripts, &device, SessionConfig::new("thermostat"))
        .run()
        .unwrap_err();

    assert_eq!(err.kind(), ErrorKind::Manifest);
    assert!(device.requests().is_empty());
}

#[test]
fn malformed_manifest_is_manifest_error() {
    let scripts = ScriptDir::standard();
    scripts.write_raw_manifest("common: [a.lua\n");
    let device = Arc::new(MemoryDevice::new());

    let err = engine(&scripts, &device).run().unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Manifest);
}

#[test]
fn missing_manifest_is_io_error() {
    let scripts = ScriptDir::new();
    let device = Arc::new(MemoryDevice::new());

    let err = engine(&scripts, &device).run().unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Io);
}

#[test]
fn duplicate_entries_upload_twice_last_wins() {
    let scripts = ScriptDir::with_manifest(&["a.lua"], &[(TEST_CLASS, &["a.lua"])]);
    scripts.write_device_script(&DeviceAddress::new(TEST_DEVICE), "-- boot");
    scripts.write("a.lua", "-- a");
    let device = Arc::new(MemoryDevice::new().with_file("init.lua", "-- boot"));

    let report = engine(&scripts, &device).run().unwrap();

    // the remote table is not refreshed between uploads
    assert_eq!(report.sync.changes, 2);
    assert_eq!(device.uploads(), vec!["fs/a.lua", "fs/a.lua"]);
    assert_eq!(device.restart_count(), 1);
}

#[test]
fn dry_run_changes_nothing() {
    let scripts = ScriptDir::standard();
    let device = synced_device(&scripts);
    device.put_file("c.lua", "-- old c");

    let report = engine_with(
        &scripts,
        &device,
        SessionConfig::new(TEST_CLASS).with_dry_run(true),
    )
    .run()
    .unwrap();

    assert_eq!(report.sync.changes, 1);
    assert_eq!(report.sync.uploaded(), 0);
    assert!(!report.rebooted);
    assert_eq!(device.file("c.lua").unwrap(), b"-- old c");
    assert_eq!(device.restart_count(), 0);
    assert_eq!(report.sync.changed().next().unwrap().name, "c.lua");
}

#[test]
fn unreachable_device_is_transport_error() {
    let scripts = ScriptDir::standard();
    let device = Arc::new(MemoryDevice::new());
    device.set_unreachable(true);

    let err = engine(&scripts, &device).run().unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Transport);
}

/// Serves a [`MemoryDevice`] over CoAP on a loopback UDP socket.
///
/// Handles Block1 reassembly, answers retransmissions from a reply cache
/// and can drop the first datagram it receives. `block_reply` replaces the
/// 2.31 Continue sent for intermediate Block1 blocks.
struct UdpDevice {
    port: u16,
    stop: Arc<AtomicBool>,
    handle: Option<JoinHandle<()>>,
}

impl UdpDevice {
    fn spawn(device: Arc<MemoryDevice>, drop_first: bool) -> Self {
        Self::spawn_with(device, drop_first, None)
    }

    fn spawn_with(device: Arc<MemoryDevice>, drop_first: bool, block_reply: Option<Code>) -> Self {
        let socket = UdpSocket::bind("127.0.0.1:0").unwrap();
        socket
            .set_read_timeout(Some(Duration::from_millis(50)))
            .unwrap();
        let port = socket.local_addr().unwrap().port();
        let stop = Arc::new(AtomicBool::new(false));

        let handle = thread::spawn({
            let stop = Arc::clone(&stop);
            move || serve(socket, device, drop_first, block_reply, stop)
        });

        Self {
            port,
            stop,
            handle: Some(handle),
        }
    }
}

impl Drop for UdpDevice {
    fn drop(&mut self) {
        self.stop.store(true, Ordering::SeqCst);
        if let Some(handle) = self.handle.take() {
            handle.join().unwrap();
        }
    }
}

fn serve(
    socket: UdpSocket,
    device: Arc<MemoryDevice>,
    drop_first: bool,
    block_reply: Option<Code>,
    stop: Arc<AtomicBool>,
) {
    let mut buf = [0u8; 2048];
    let mut upload = Vec::new();
    let mut dropped = !drop_first;
    let mut last_reply: Option<(u16, Vec<u8>)> = None;

    while !stop.load(Ordering::SeqCst) {
        let Ok((len, from)) = socket.recv_from(&mut buf) else {
            continue;
        };
        let request = Message::decode(&buf[..len]).unwrap();
        if request.message_type != MessageType::Confirmable {
            continue;
        }
        if !dropped {
            dropped = true;
            continue;
        }
        if let Some((message_id, bytes)) = &last_reply {
            if *message_id == request.message_id {
                socket.send_to(bytes, from).unwrap();
                continue;
            }
        }

        let method = match request.code {
            Code::GET => Method::Read,
            Code::PUT => Method::WriteReplace,
            Code::POST => Method::WriteCreate,
            _ => continue,
        };
        let mut reply = Message::new(MessageType::Acknowledgement, Code::EMPTY, request.message_id)
            .with_token(request.token.clone());

        let payload = match request.block1().unwrap() {
            Some(block) => {
                if block.num() == 0 {
                    upload.clear();
                }
                upload.extend_from_slice(&request.payload);
                reply.set_block1(block);
                if block.more() {
                    reply.code = block_reply.unwrap_or(Code::CONTINUE);
                    let bytes = reply.encode().unwrap();
                    socket.send_to(&bytes, from).unwrap();
                    last_reply = Some((request.message_id, bytes));
                    continue;
                }
                std::mem::take(&mut upload)
            }
            None => request.payload.clone(),
        };

        let response: DeviceResponse = device
            .exchange(&DeviceRequest::new(method, request.uri_path(), payload))
            .unwrap();
        reply.code = response.status;
        reply.payload = response.payload;
        if let Some(format) = response.content_format {
            reply.set_content_format(format);
        }
        let bytes = reply.encode().unwrap();
        socket.send_to(&bytes, from).unwrap();
        last_reply = Some((request.message_id, bytes));
    }
}

fn coap_engine(scripts: &ScriptDir, port: u16) -> SyncEngine<ccpeed_sync_engine::CoapClient> {
    let config = CoapConfig::new()
        .with_port(port)
        .with_ack_timeout(Duration::from_millis(50))
        .with_response_timeout(Duration::from_secs(2));
    let transport = DeviceTransport::connect(DeviceAddress::new("127.0.0.1"), config).unwrap();
    SyncEngine::new(
        transport,
        SessionConfig::new(TEST_CLASS).with_source_dir(scripts.path()),
    )
}

#[test]
fn coap_session_with_blockwise_upload_and_lost_datagram() {
    let scripts = ScriptDir::standard();
    scripts.write_device_script(&DeviceAddress::new("127.0.0.1"), "-- boot over udp");
    let big: Vec<u8> = (0..3000u32).map(|i| b'a' + (i % 26) as u8).collect();
    scripts.write("c.lua", &big);

    let device = Arc::new(MemoryDevice::new());
    let server = UdpDevice::spawn(Arc::clone(&device), true);

    let report = coap_engine(&scripts, server.port).run().unwrap();

    assert_eq!(report.sync.changes, 4);
    assert!(report.rebooted);
    assert_eq!(device.file("c.lua").unwrap(), big);
    assert_eq!(device.file("init.lua").unwrap(), b"-- boot over udp");
    assert_eq!(device.restart_count(), 1);

    // second pass over the wire finds nothing to do
    let report = coap_engine(&scripts, server.port).run().unwrap();
    assert_eq!(report.sync.changes, 0);
    assert!(!report.rebooted);
    assert_eq!(device.restart_count(), 1);
}

#[test]
fn coap_session_fails_when_block_upload_is_cut_short() {
    for block_reply in [Code::CHANGED, Code::REQUEST_TOO_LARGE] {
        let scripts = ScriptDir::standard();
        scripts.write_device_script(&DeviceAddress::new("127.0.0.1"), "-- boot");
        scripts.write("c.lua", vec![b'x'; 3000]);

        let device = Arc::new(MemoryDevice::new());
        let server = UdpDevice::spawn_with(Arc::clone(&device), false, Some(block_reply));

        let err = coap_engine(&scripts, server.port).run().unwrap_err();

        match &err {
            SyncError::FileFailed {
                file,
                remote,
                uploaded,
                ..
            } => {
                assert_eq!(file, "c.lua");
                assert_eq!(remote, "c.lua");
                assert_eq!(*uploaded, 3);
            }
            other => panic!("expected FileFailed, got {other:?}"),
        }
        assert_eq!(err.kind(), ErrorKind::Protocol);
        assert_eq!(err.status(), Some(block_reply));
        assert!(device.file("c.lua").is_none());
        assert_eq!(device.restart_count(), 0);
    }
}
