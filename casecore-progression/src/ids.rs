//! Identifiers of progression entities.
//!
//! All ids are UUIDs ordered by value. The ordering is what the group flows
//! rely on for a stable commit order and for picking a new group master.

use nutype::nutype;
use uuid::Uuid;

macro_rules! progression_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[nutype(derive(
            Debug,
            Clone,
            Copy,
            PartialEq,
            Eq,
            PartialOrd,
            Ord,
            Hash,
            AsRef,
            Display,
            FromStr,
            Serialize,
            Deserialize
        ))]
        pub struct $name(Uuid);

        impl $name {
            /// A fresh time-ordered id.
            pub fn generate() -> Self {
                Self::new(Uuid::now_v7())
            }
        }
    };
}

progression_id!(
    /// A prosecution case.
    CaseId
);

progression_id!(
    /// A group of related prosecution cases managed together.
    GroupId
);

progression_id!(
    /// A defendant on a prosecution case.
    DefendantId
);

progression_id!(
    /// A defence organisation, or the court service itself.
    OrganisationId
);

progression_id!(
    /// A hearing.
    HearingId
);
