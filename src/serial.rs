//! Binary serialization of activity registries.
//!
//! A registry is persisted as a 32-byte fixed header followed by a
//! bincode-encoded payload listing every activity identifier with its
//! execution container. Decoding rebinds each entry through the same
//! factories and provider used by [`ActivityRegistry::from_json`].
//!
//! ## Wire Format
//!
//! ```text
//! Offset  Size  Field
//! 0       4     Magic bytes: b"DAPP"
//! 4       2     Format version (u16, little-endian)
//! 6       2     Engine version (u16, little-endian)
//! 8       4     Flags (u32, reserved)
//! 12      4     Payload length in bytes (u32, little-endian)
//! 16      16    BLAKE3 hash of the payload (truncated to 16 bytes)
//! 32..    var   Bincode-encoded payload
//! ```
//!
//! ## Versioning
//!
//! The format version in the header must match exactly. If it does not,
//! decoding fails immediately with [`DeserializeError::IncompatibleVersion`].
//! The engine version is informational only. The input must end exactly
//! where the announced payload ends.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

use crate::activity::ActivityFactory;
use crate::registry::{ActivityProvider, ActivityRegistry};
use crate::types::{ExecutionContainer, RegistryError};

// ---------------------------------------------------------------------------
// Constants
// ---------------------------------------------------------------------------

const MAGIC: &[u8; 4] = b"DAPP";
const FORMAT_VERSION: u16 = 1;
const ENGINE_VERSION: u16 = 1;
const HEADER_SIZE: usize = 32;

// ---------------------------------------------------------------------------
// Error types
// ---------------------------------------------------------------------------

/// Errors that can occur when writing an [`ActivityRegistry`] to bytes.
#[derive(Debug, Error)]
pub enum SerializeError {
    #[error("failed to encode registry: {0}")]
    Encode(#[from] bincode::error::EncodeError),

    #[error("registry payload of {len} bytes exceeds the 4 GiB format limit")]
    PayloadTooLarge { len: usize },

    #[error("I/O error during serialization: {0}")]
    Io(#[from] std::io::Error),
}

/// Errors that can occur when reading an [`ActivityRegistry`] from bytes.
#[derive(Debug, Error)]
pub enum DeserializeError {
    #[error("not a data app registry: invalid magic bytes")]
    BadMagic,

    #[error("incompatible format version: blob is v{blob}, engine supports v{supported}")]
    IncompatibleVersion { blob: u16, supported: u16 },

    #[error("integrity check failed: BLAKE3 checksum mismatch")]
    ChecksumMismatch,

    #[error("payload length mismatch: expected {expected} bytes, got {actual}")]
    LengthMismatch { expected: usize, actual: usize },

    #[error("failed to decode payload: {0}")]
    Decode(#[from] bincode::error::DecodeError),

    #[error("validation failed: {0}")]
    Validation(String),

    #[error("cannot rebuild registry: {0}")]
    Registry(#[from] RegistryError),

    #[error("I/O error during deserialization: {0}")]
    Io(#[from] std::io::Error),
}

// ---------------------------------------------------------------------------
// Serialized mirror types
// ---------------------------------------------------------------------------

#[derive(Debug, Serialize, Deserialize)]
struct SerializedRegistry {
    metadata: RegistryMetadata,
    entries: Vec<SerializedEntry>,
}

#[derive(Debug, Serialize, Deserialize)]
struct RegistryMetadata {
    entry_count: u32,
}

#[derive(Debug, Serialize, Deserialize)]
struct SerializedEntry {
    identifier: String,
    container: SerializedContainer,
}

/// Externally tagged copy of [`ExecutionContainer`]; bincode cannot read
/// the internally tagged JSON form.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
enum SerializedContainer {
    Noop,
    Embedded,
    External(String),
}

// ---------------------------------------------------------------------------
// Container conversion
// ---------------------------------------------------------------------------

fn serialize_container(container: &ExecutionContainer) -> SerializedContainer {
    match container {
        ExecutionContainer::Noop => SerializedContainer::Noop,
        ExecutionContainer::Embedded => SerializedContainer::Embedded,
        ExecutionContainer::External { implementation } => {
            SerializedContainer::External(implementation.clone())
        }
    }
}

fn deserialize_container(container: SerializedContainer) -> ExecutionContainer {
    match container {
        SerializedContainer::Noop => ExecutionContainer::Noop,
        SerializedContainer::Embedded => ExecutionContainer::Embedded,
        SerializedContainer::External(implementation) => {
            ExecutionContainer::External { implementation }
        }
    }
}

// ---------------------------------------------------------------------------
// Registry -> serialized
// ---------------------------------------------------------------------------

fn registry_to_serialized(registry: &ActivityRegistry) -> SerializedRegistry {
    // `containers()` is ordered, so equal registries encode to equal bytes
    let entries: Vec<SerializedEntry> = registry
        .containers()
        .into_iter()
        .map(|(identifier, container)| SerializedEntry {
            identifier: identifier.to_owned(),
            container: serialize_container(container),
        })
        .collect();
    SerializedRegistry {
        metadata: RegistryMetadata {
            entry_count: u32::try_from(entries.len()).unwrap_or(u32::MAX),
        },
        entries,
    }
}

// ---------------------------------------------------------------------------
// Validation
// ---------------------------------------------------------------------------

fn validate(ser: &SerializedRegistry) -> Result<(), DeserializeError> {
    if ser.metadata.entry_count as usize != ser.entries.len() {
        return Err(DeserializeError::Validation(format!(
            "entry_count is {} but {} entries are present",
            ser.metadata.entry_count,
            ser.entries.len()
        )));
    }

    let mut seen = HashSet::with_capacity(ser.entries.len());
    for entry in &ser.entries {
        if entry.identifier.is_empty() {
            return Err(DeserializeError::Validation(
                "entry with empty identifier".to_owned(),
            ));
        }
        if !seen.insert(entry.identifier.as_str()) {
            return Err(DeserializeError::Validation(format!(
                "duplicate activity identifier '{}'",
                entry.identifier
            )));
        }
        if let SerializedContainer::External(implementation) = &entry.container {
            if implementation.is_empty() {
                return Err(DeserializeError::Validation(format!(
                    "activity '{}' has an empty implementation name",
                    entry.identifier
                )));
            }
        }
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Header
// ---------------------------------------------------------------------------

/// Fixed-size prefix announcing the payload that follows it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Header {
    format_version: u16,
    engine_version: u16,
    payload_len: u32,
    digest: [u8; 16],
}

fn digest(payload: &[u8]) -> [u8; 16] {
    let mut out = [0u8; 16];
    out.copy_from_slice(&blake3::hash(payload).as_bytes()[..16]);
    out
}

impl Header {
    fn describe(payload: &[u8]) -> Result<Self, SerializeError> {
        let payload_len = u32::try_from(payload.len())
            .map_err(|_| SerializeError::PayloadTooLarge { len: payload.len() })?;
        Ok(Self {
            format_version: FORMAT_VERSION,
            engine_version: ENGINE_VERSION,
            payload_len,
            digest: digest(payload),
        })
    }

    fn to_bytes(self) -> [u8; HEADER_SIZE] {
        let mut out = [0u8; HEADER_SIZE];
        out[0..4].copy_from_slice(MAGIC);
        out[4..6].copy_from_slice(&self.format_version.to_le_bytes());
        out[6..8].copy_from_slice(&self.engine_version.to_le_bytes());
        // 8..12: flags, reserved as zero
        out[12..16].copy_from_slice(&self.payload_len.to_le_bytes());
        out[16..32].copy_from_slice(&self.digest);
        out
    }

    /// Check the header of `bytes` and return it with exactly the payload it
    /// announces. Missing or extra bytes are both a length mismatch.
    fn split(bytes: &[u8]) -> Result<(Self, &[u8]), DeserializeError> {
        if bytes.len() < HEADER_SIZE {
            return Err(DeserializeError::LengthMismatch {
                expected: HEADER_SIZE,
                actual: bytes.len(),
            });
        }
        let (head, payload) = bytes.split_at(HEADER_SIZE);
        if &head[0..4] != MAGIC {
            return Err(DeserializeError::BadMagic);
        }

        let format_version = u16::from_le_bytes([head[4], head[5]]);
        if format_version != FORMAT_VERSION {
            return Err(DeserializeError::IncompatibleVersion {
                blob: format_version,
                supported: FORMAT_VERSION,
            });
        }

        let payload_len = u32::from_le_bytes([head[12], head[13], head[14], head[15]]);
        if payload.len() != payload_len as usize {
            return Err(DeserializeError::LengthMismatch {
                expected: payload_len as usize,
                actual: payload.len(),
            });
        }

        let mut stored = [0u8; 16];
        stored.copy_from_slice(&head[16..32]);
        if stored != digest(payload) {
            return Err(DeserializeError::ChecksumMismatch);
        }

        let header = Self {
            format_version,
            engine_version: u16::from_le_bytes([head[6], head[7]]),
            payload_len,
            digest: stored,
        };
        Ok((header, payload))
    }
}

// ---------------------------------------------------------------------------
// Public encode/decode
// ---------------------------------------------------------------------------

pub(crate) fn encode(registry: &ActivityRegistry) -> Result<Vec<u8>, SerializeError> {
    let payload = bincode::serde::encode_to_vec(
        registry_to_serialized(registry),
        bincode::config::standard(),
    )?;
    let header = Header::describe(&payload)?;

    let mut buf = Vec::with_capacity(HEADER_SIZE + payload.len());
    buf.extend_from_slice(&header.to_bytes());
    buf.extend_from_slice(&payload);
    Ok(buf)
}

pub(crate) fn decode(
    bytes: &[u8],
    factories: &[(&str, ActivityFactory)],
    provider: &dyn ActivityProvider,
) -> Result<ActivityRegistry, DeserializeError> {
    let (header, payload) = Header::split(bytes)?;
    debug!(
        engine_version = header.engine_version,
        payload_len = header.payload_len,
        "decoding activity registry"
    );

    let (serialized, read): (SerializedRegistry, usize) =
        bincode::serde::decode_from_slice(payload, bincode::config::standard())?;
    if read != payload.len() {
        return Err(DeserializeError::Validation(format!(
            "{} unread bytes after the registry payload",
            payload.len() - read
        )));
    }

    validate(&serialized)?;

    let containers = serialized
        .entries
        .into_iter()
        .map(|entry| (entry.identifier, deserialize_container(entry.container)));
    Ok(ActivityRegistry::from_containers(
        containers, factories, provider,
    )?)
}

impl ActivityRegistry {
    /// Serialize the registry to the binary artifact format.
    ///
    /// # Errors
    ///
    /// [`SerializeError`] if the payload cannot be encoded.
    pub fn to_binary(&self) -> Result<Vec<u8>, SerializeError> {
        encode(self)
    }

    /// Rebuild a registry from bytes produced by [`to_binary`](Self::to_binary).
    ///
    /// # Errors
    ///
    /// [`DeserializeError`] if the header, checksum or payload is invalid, or
    /// an entry cannot be rebound.
    pub fn from_binary(
        bytes: &[u8],
        factories: &[(&str, ActivityFactory)],
        provider: &dyn ActivityProvider,
    ) -> Result<Self, DeserializeError> {
        decode(bytes, factories, provider)
    }
}

// ---------------------------------------------------------------------------
// Unit tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::activity::{core_activities, Activity};

    struct NoProvider;

    impl ActivityProvider for NoProvider {
        fn load(&self, implementation: &str) -> Result<Arc<dyn Activity>, RegistryError> {
            Err(RegistryError::Provider {
                implementation: implementation.to_owned(),
                reason: "nothing to load".into(),
            })
        }
    }

    fn registry() -> ActivityRegistry {
        let mut registry = ActivityRegistry::with_core_activities();
        registry.register("acme.Pending").unwrap();
        registry
    }

    #[test]
    fn header_layout() {
        let bytes = encode(&registry()).unwrap();
        assert_eq!(&bytes[0..4], b"DAPP");
        assert_eq!(u16::from_le_bytes([bytes[4], bytes[5]]), FORMAT_VERSION);
        let len = u32::from_le_bytes([bytes[12], bytes[13], bytes[14], bytes[15]]) as usize;
        assert_eq!(bytes.len(), HEADER_SIZE + len);
    }

    #[test]
    fn decode_rebinds_entries() {
        let original = registry();
        let bytes = encode(&original).unwrap();
        let restored = decode(&bytes, &core_activities(), &NoProvider).unwrap();
        assert_eq!(restored.containers(), original.containers());
        assert!(restored.instantiate("core.ReadFile").is_ok());
        assert_eq!(
            restored.container("acme.Pending"),
            Some(&ExecutionContainer::Noop)
        );
    }

    #[test]
    fn encoding_is_deterministic() {
        assert_eq!(encode(&registry()).unwrap(), encode(&registry()).unwrap());
    }

    #[test]
    fn bad_magic() {
        let mut bytes = encode(&registry()).unwrap();
        bytes[0] = b'X';
        assert!(matches!(
            decode(&bytes, &core_activities(), &NoProvider),
            Err(DeserializeError::BadMagic)
        ));
    }

    #[test]
    fn flipped_payload_byte_fails_checksum() {
        let mut bytes = encode(&registry()).unwrap();
        let last = bytes.len() - 1;
        bytes[last] ^= 0xFF;
        assert!(matches!(
            decode(&bytes, &core_activities(), &NoProvider),
            Err(DeserializeError::ChecksumMismatch)
        ));
    }

    #[test]
    fn version_mismatch() {
        let mut bytes = encode(&registry()).unwrap();
        bytes[4..6].copy_from_slice(&99u16.to_le_bytes());
        assert!(matches!(
            decode(&bytes, &core_activities(), &NoProvider),
            Err(DeserializeError::IncompatibleVersion {
                blob: 99,
                supported: 1
            })
        ));
    }

    #[test]
    fn truncated_input() {
        let bytes = encode(&registry()).unwrap();
        assert!(matches!(
            decode(&bytes[..10], &core_activities(), &NoProvider),
            Err(DeserializeError::LengthMismatch { .. })
        ));
    }

    #[test]
    fn trailing_bytes_are_rejected() {
        let mut bytes = encode(&registry()).unwrap();
        let payload_len = bytes.len() - HEADER_SIZE;
        bytes.extend_from_slice(b"tail");
        match decode(&bytes, &core_activities(), &NoProvider) {
            Err(DeserializeError::LengthMismatch { expected, actual }) => {
                assert_eq!(expected, payload_len);
                assert_eq!(actual, payload_len + 4);
            }
            other => panic!("expected LengthMismatch, got {other:?}"),
        }
    }

    #[test]
    fn header_survives_its_byte_form() {
        let payload = b"registry payload";
        let header = Header::describe(payload).unwrap();
        let mut bytes = header.to_bytes().to_vec();
        bytes.extend_from_slice(payload);
        let (parsed, rest) = Header::split(&bytes).unwrap();
        assert_eq!(parsed, header);
        assert_eq!(rest, payload);
        assert_eq!(&bytes[8..12], &[0, 0, 0, 0]);
    }

    #[test]
    fn missing_factory_is_a_registry_error() {
        let bytes = encode(&registry()).unwrap();
        assert!(matches!(
            decode(&bytes, &[], &NoProvider),
            Err(DeserializeError::Registry(RegistryError::NotResolved { .. }))
        ));
    }

    #[test]
    fn validation_rejects_duplicates() {
        let ser = SerializedRegistry {
            metadata: RegistryMetadata { entry_count: 2 },
            entries: vec![
                SerializedEntry {
                    identifier: "a.B".into(),
                    container: SerializedContainer::Noop,
                },
                SerializedEntry {
                    identifier: "a.B".into(),
                    container: SerializedContainer::Embedded,
                },
            ],
        };
        assert!(matches!(validate(&ser), Err(DeserializeError::Validation(_))));
    }

    #[test]
    fn validation_rejects_count_mismatch() {
        let ser = SerializedRegistry {
            metadata: RegistryMetadata { entry_count: 3 },
            entries: vec![],
        };
        assert!(matches!(validate(&ser), Err(DeserializeError::Validation(_))));
    }

    #[test]
    fn validation_rejects_empty_implementation() {
        let ser = SerializedRegistry {
            metadata: RegistryMetadata { entry_count: 1 },
            entries: vec![SerializedEntry {
                identifier: "acme.X".into(),
                container: SerializedContainer::External(String::new()),
            }],
        };
        assert!(matches!(validate(&ser), Err(DeserializeError::Validation(_))));
    }
}
