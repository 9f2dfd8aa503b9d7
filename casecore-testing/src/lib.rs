//! Test support for casecore.
//!
//! [`chaos::ChaosEventStore`] wraps any event store and injects version
//! conflicts or outages, either at a configured rate or for a scripted number
//! of appends, to drive the executor's retry and failure paths.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod chaos;

pub use chaos::*;
