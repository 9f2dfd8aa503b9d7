//! Core types for the casecore event sourcing library.
//!
//! All types use smart constructors to ensure validity at construction time,
//! following the "parse, don't validate" principle.

use crate::validation::{is_dotted_command_name, no_glob_metacharacters};
use chrono::{DateTime, Utc};
use nutype::nutype;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A stream identifier that uniquely identifies an event stream.
///
/// `StreamId` values are trimmed, non-empty, at most 255 characters and free
/// of glob metacharacters (`*`, `?`, `[`, `]`).
#[nutype(
    sanitize(trim),
    validate(not_empty, len_char_max = 255, predicate = no_glob_metacharacters),
    derive(
        Debug,
        Clone,
        PartialEq,
        Eq,
        PartialOrd,
        Ord,
        Hash,
        AsRef,
        Deref,
        Display,
        Serialize,
        Deserialize
    )
)]
pub struct StreamId(String);

/// A globally unique event identifier using UUIDv7 format.
///
/// `UUIDv7` gives time-based ordering and global uniqueness.
#[nutype(
    validate(predicate = |id: &Uuid| id.get_version() == Some(uuid::Version::SortRand)),
    derive(
        Debug,
        Clone,
        Copy,
        PartialEq,
        Eq,
        PartialOrd,
        Ord,
        Hash,
        AsRef,
        Deref,
        Display,
        Serialize,
        Deserialize
    )
)]
pub struct EventId(Uuid);

impl EventId {
    /// Creates a new `EventId` with the current timestamp.
    pub fn new() -> Self {
        // Uuid::now_v7() always yields a version 7 UUID
        Self::try_new(Uuid::now_v7()).expect("Uuid::now_v7() should always return a valid v7 UUID")
    }
}

impl Default for EventId {
    fn default() -> Self {
        Self::new()
    }
}

/// The position of an event within its stream.
///
/// The first event of a stream has version 0; each appended event takes the
/// next version. An empty stream has no version at all (`Option::None`).
#[nutype(
    validate(greater_or_equal = 0),
    derive(
        Debug,
        Clone,
        Copy,
        PartialEq,
        Eq,
        PartialOrd,
        Ord,
        Hash,
        Display,
        Into,
        Serialize,
        Deserialize
    )
)]
pub struct EventVersion(u64);

impl EventVersion {
    /// The version of the first event in any stream.
    pub fn initial() -> Self {
        Self::try_new(0).expect("0 is always a valid version")
    }

    /// Returns the next version after this one.
    #[must_use]
    pub fn next(self) -> Self {
        let current: u64 = self.into();
        Self::try_new(current + 1).expect("next version should always be valid")
    }

    /// Version of the event that follows a stream currently at `current`.
    pub fn following(current: Option<Self>) -> Self {
        current.map_or_else(Self::initial, Self::next)
    }
}

/// A timestamp for when an event occurred.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Timestamp(DateTime<Utc>);

impl Timestamp {
    /// Creates a new timestamp from a UTC `DateTime`.
    pub const fn new(datetime: DateTime<Utc>) -> Self {
        Self(datetime)
    }

    /// Creates a timestamp representing the current moment.
    pub fn now() -> Self {
        Self(Utc::now())
    }

    /// Returns the underlying `DateTime`.
    pub const fn as_datetime(&self) -> &DateTime<Utc> {
        &self.0
    }
}

impl From<DateTime<Utc>> for Timestamp {
    fn from(datetime: DateTime<Utc>) -> Self {
        Self::new(datetime)
    }
}

impl std::fmt::Display for Timestamp {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        self.0.fmt(f)
    }
}

/// Name under which an external dispatcher delivers a command.
///
/// Dotted lowercase segments, e.g. `progression.command.associate-defence-organisation`.
#[nutype(
    sanitize(trim),
    validate(not_empty, len_char_max = 255, predicate = is_dotted_command_name),
    derive(
        Debug,
        Clone,
        PartialEq,
        Eq,
        Hash,
        AsRef,
        Deref,
        Display,
        Serialize,
        Deserialize
    )
)]
pub struct CommandName(String);

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    proptest! {
        #[test]
        fn stream_id_accepts_valid_strings(s in "[a-zA-Z0-9_-]{1,255}") {
            let result = StreamId::try_new(s.clone());
            prop_assert!(result.is_ok());
            let stream_id = result.unwrap();
            prop_assert_eq!(stream_id.as_ref(), &s);
        }

        #[test]
        fn stream_id_trims_whitespace(s in " {0,10}[a-zA-Z0-9_-]{1,240} {0,10}") {
            let stream_id = StreamId::try_new(s.clone()).unwrap();
            prop_assert_eq!(stream_id.as_ref(), s.trim());
        }

        #[test]
        fn stream_id_rejects_empty_strings(s in " {0,50}") {
            prop_assert!(StreamId::try_new(s).is_err());
        }

        #[test]
        fn stream_id_rejects_strings_over_255_chars(s in "[a-zA-Z0-9]{256,500}") {
            prop_assert!(StreamId::try_new(s).is_err());
        }

        #[test]
        fn event_id_rejects_non_v7_uuids(uuid_bytes in any::<[u8; 16]>(), version in 0u8..=6u8) {
            let mut bytes = uuid_bytes;
            bytes[6] = (bytes[6] & 0x0F) | (version << 4);
            bytes[8] = (bytes[8] & 0x3F) | 0x80;

            prop_assert!(EventId::try_new(Uuid::from_bytes(bytes)).is_err());
        }

        #[test]
        fn event_version_next_increments_by_one(v in 0u64..u64::MAX) {
            let next: u64 = EventVersion::try_new(v).unwrap().next().into();
            prop_assert_eq!(next, v + 1);
        }
    }

    #[test]
    fn first_event_of_a_stream_has_version_zero() {
        assert_eq!(EventVersion::following(None), EventVersion::initial());
        assert_eq!(
            EventVersion::following(Some(EventVersion::initial())),
            EventVersion::try_new(1).unwrap()
        );
    }

    #[test]
    fn stream_id_rejects_glob_metacharacters() {
        assert!(StreamId::try_new("group-cases-*").is_err());
        assert!(StreamId::try_new("hearing-[1]").is_err());
    }

    #[test]
    fn command_name_validation() {
        assert!(CommandName::try_new("progression.command.create-hearing").is_ok());
        assert!(CommandName::try_new("  progression.command.create-hearing ").is_ok());
        assert!(CommandName::try_new("").is_err());
        assert!(CommandName::try_new("Progression.Create").is_err());
    }

    #[test]
    fn event_id_roundtrip_serialization() {
        let event_id = EventId::new();
        let json = serde_json::to_string(&event_id).unwrap();
        let deserialized: EventId = serde_json::from_str(&json).unwrap();
        assert_eq!(event_id, deserialized);
    }
}
