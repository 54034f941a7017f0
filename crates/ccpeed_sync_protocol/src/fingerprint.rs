//! Content fingerprints.

use md5::{Digest, Md5};
use std::fmt;

/// Length of a fingerprint in bytes.
pub const FINGERPRINT_LEN: usize = 16;

/// MD5 digest of a file's raw bytes.
///
/// The device reports its etags with the same digest, so a local
/// fingerprint compares directly against a remote etag.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Fingerprint([u8; FINGERPRINT_LEN]);

impl Fingerprint {
    /// Fingerprints `content`.
    pub fn of(content: &[u8]) -> Self {
        let digest = Md5::digest(content);
        let mut bytes = [0u8; FINGERPRINT_LEN];
        bytes.copy_from_slice(&digest);
        Self(bytes)
    }

    /// Wraps raw digest bytes.
    pub const fn from_bytes(bytes: [u8; FINGERPRINT_LEN]) -> Self {
        Self(bytes)
    }

    /// Wraps a slice, if it has exactly 16 bytes.
    pub fn from_slice(bytes: &[u8]) -> Option<Self> {
        bytes.try_into().ok().map(Self)
    }

    /// Raw digest bytes.
    pub fn as_bytes(&self) -> &[u8; FINGERPRINT_LEN] {
        &self.0
    }

    /// Lowercase hex form.
    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }
}

impl fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

impl fmt::Debug for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Fingerprint({})", self.to_hex())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn known_digests() {
        assert_eq!(
            Fingerprint::of(b"").to_hex(),
            "d41d8cd98f00b204e9800998ecf8427e"
        );
        assert_eq!(
            Fingerprint::of(b"print('hello')\n").to_hex(),
            hex::encode(Md5::digest(b"print('hello')\n"))
        );
    }

    #[test]
    fn from_slice_requires_16_bytes() {
        assert!(Fingerprint::from_slice(&[0u8; 16]).is_some());
        assert!(Fingerprint::from_slice(&[0u8; 15]).is_none());
        assert!(Fingerprint::from_slice(&[0u8; 17]).is_none());
    }

    #[test]
    fn single_byte_change_is_detected() {
        let a = Fingerprint::of(b"local x = 1");
        let b = Fingerprint::of(b"local x = 2");
        assert_ne!(a, b);
    }

    proptest! {
        #[test]
        fn equal_content_equal_fingerprint(
            content in proptest::collection::vec(any::<u8>(), 0..512)
        ) {
            let copy = content.clone();
            prop_assert_eq!(Fingerprint::of(&content), Fingerprint::of(&copy));
        }

        #[test]
        fn different_content_different_fingerprint(
            a in proptest::collection::vec(any::<u8>(), 0..256),
            b in proptest::collection::vec(any::<u8>(), 0..256),
        ) {
            prop_assume!(a != b);
            prop_assert_ne!(Fingerprint::of(&a), Fingerprint::of(&b));
        }
    }
}
