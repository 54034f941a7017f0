//! Remote file table, as reported by the device's `fs` resource.

use crate::error::ListingError;
use crate::fingerprint::Fingerprint;
use ciborium::Value;
use std::collections::BTreeMap;

/// Mapping of remote file name to etag.
///
/// Fetched once per session. It is not refreshed after uploads, so it
/// describes the device as it was before the session started.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RemoteFileTable {
    files: BTreeMap<String, Fingerprint>,
}

impl RemoteFileTable {
    /// Creates an empty table.
    pub fn new() -> Self {
        Self::default()
    }

    /// Records an etag for a file.
    pub fn insert(&mut self, name: impl Into<String>, etag: Fingerprint) {
        self.files.insert(name.into(), etag);
    }

    /// Etag of a remote file, if the device has it.
    pub fn get(&self, name: &str) -> Option<&Fingerprint> {
        self.files.get(name)
    }

    /// Returns true if the device has the file.
    pub fn contains(&self, name: &str) -> bool {
        self.files.contains_key(name)
    }

    /// Number of files on the device.
    pub fn len(&self) -> usize {
        self.files.len()
    }

    /// Returns true if the device reported no files.
    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }

    /// Files in name order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &Fingerprint)> {
        self.files.iter().map(|(name, etag)| (name.as_str(), etag))
    }

    /// Decodes the listing document `{ "files": { name: etag, ... } }`.
    ///
    /// Other top-level fields are ignored.
    pub fn from_cbor(value: &Value) -> Result<Self, ListingError> {
        let Value::Map(fields) = value else {
            return Err(ListingError::NotAMap);
        };

        let files = fields
            .iter()
            .find(|(key, _)| matches!(key, Value::Text(k) if k == "files"))
            .map(|(_, v)| v)
            .ok_or(ListingError::MissingFiles)?;

        let Value::Map(entries) = files else {
            return Err(ListingError::FilesNotAMap);
        };

        let mut table = Self::new();
        for (key, etag) in entries {
            let Value::Text(name) = key else {
                return Err(ListingError::InvalidName);
            };
            let etag = match etag {
                Value::Bytes(bytes) => Fingerprint::from_slice(bytes),
                _ => None,
            }
            .ok_or_else(|| ListingError::InvalidEtag { name: name.clone() })?;
            table.insert(name.clone(), etag);
        }
        Ok(table)
    }

    /// Encodes the table as a listing document.
    pub fn to_cbor(&self) -> Value {
        let entries = self
            .files
            .iter()
            .map(|(name, etag)| {
                (
                    Value::Text(name.clone()),
                    Value::Bytes(etag.as_bytes().to_vec()),
                )
            })
            .collect();
        Value::Map(vec![(Value::Text("files".into()), Value::Map(entries))])
    }
}

impl FromIterator<(String, Fingerprint)> for RemoteFileTable {
    fn from_iter<I: IntoIterator<Item = (String, Fingerprint)>>(iter: I) -> Self {
        Self {
            files: iter.into_iter().collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn listing(entries: Vec<(Value, Value)>) -> Value {
        Value::Map(vec![
            (Value::Text("files".into()), Value::Map(entries)),
            (Value::Text("next".into()), Value::Null),
        ])
    }

    #[test]
    fn decodes_files_map() {
        let etag = Fingerprint::of(b"-- init");
        let value = listing(vec![(
            Value::Text("init.lua".into()),
            Value::Bytes(etag.as_bytes().to_vec()),
        )]);

        let table = RemoteFileTable::from_cbor(&value).unwrap();
        assert_eq!(table.len(), 1);
        assert_eq!(table.get("init.lua"), Some(&etag));
        assert!(!table.contains("main.lua"));
    }

    #[test]
    fn empty_device() {
        let table = RemoteFileTable::from_cbor(&listing(vec![])).unwrap();
        assert!(table.is_empty());
    }

    #[test]
    fn rejects_non_map_body() {
        assert_eq!(
            RemoteFileTable::from_cbor(&Value::Text("files".into())),
            Err(ListingError::NotAMap)
        );
    }

    #[test]
    fn rejects_missing_files_field() {
        let value = Value::Map(vec![(Value::Text("count".into()), Value::Integer(3.into()))]);
        assert_eq!(
            RemoteFileTable::from_cbor(&value),
            Err(ListingError::MissingFiles)
        );
    }

    #[test]
    fn rejects_short_etag() {
        let value = listing(vec![(
            Value::Text("a.lua".into()),
            Value::Bytes(vec![1, 2, 3]),
        )]);
        assert_eq!(
            RemoteFileTable::from_cbor(&value),
            Err(ListingError::InvalidEtag {
                name: "a.lua".into()
            })
        );
    }

    #[test]
    fn rejects_text_etag() {
        let value = listing(vec![(
            Value::Text("a.lua".into()),
            Value::Text("d41d8cd98f00b204e9800998ecf8427e".into()),
        )]);
        assert!(matches!(
            RemoteFileTable::from_cbor(&value),
            Err(ListingError::InvalidEtag { .. })
        ));
    }

    #[test]
    fn encoded_listing_decodes() {
        let table: RemoteFileTable = vec![
            ("init.lua".to_string(), Fingerprint::of(b"a")),
            ("dali.lua".to_string(), Fingerprint::of(b"b")),
        ]
        .into_iter()
        .collect();

        let decoded = RemoteFileTable::from_cbor(&table.to_cbor()).unwrap();
        assert_eq!(decoded, table);
        let names: Vec<&str> = decoded.iter().map(|(name, _)| name).collect();
        assert_eq!(names, vec!["dali.lua", "init.lua"]);
    }
}
