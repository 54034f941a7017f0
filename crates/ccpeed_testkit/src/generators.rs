//! Property-based test generators using proptest.

use ccpeed_sync_protocol::Manifest;
use proptest::prelude::*;
use std::collections::BTreeMap;
use std::net::Ipv6Addr;

/// Strategy for generating script file names.
pub fn file_name_strategy() -> impl Strategy<Value = String> {
    prop::string::string_regex("[a-z][a-z0-9_]{0,11}\\.lua").expect("Invalid regex")
}

/// Strategy for generating script contents.
pub fn file_content_strategy() -> impl Strategy<Value = Vec<u8>> {
    prop::collection::vec(any::<u8>(), 0..4096)
}

/// Strategy for generating IPv6 device addresses in canonical text form.
pub fn device_address_strategy() -> impl Strategy<Value = String> {
    prop::array::uniform8(any::<u16>()).prop_map(|segments| {
        let [a, b, c, d, e, f, g, h] = segments;
        Ipv6Addr::new(a, b, c, d, e, f, g, h).to_string()
    })
}

/// Strategy for generating device class names.
pub fn device_class_strategy() -> impl Strategy<Value = String> {
    prop::string::string_regex("[a-z][a-z_]{0,15}").expect("Invalid regex")
}

/// Strategy for generating valid manifests with at least one class.
pub fn manifest_strategy() -> impl Strategy<Value = Manifest> {
    (
        prop::collection::vec(file_name_strategy(), 0..5),
        prop::collection::btree_map(
            device_class_strategy(),
            prop::collection::vec(file_name_strategy(), 0..5),
            1..4,
        ),
    )
        .prop_map(|(common, device_classes)| Manifest {
            common,
            device_classes,
        })
}

/// Strategy for generating a set of named scripts.
pub fn script_set_strategy() -> impl Strategy<Value = BTreeMap<String, Vec<u8>>> {
    prop::collection::btree_map(file_name_strategy(), file_content_strategy(), 0..8)
}
