//! Case progression on `casecore`.
//!
//! Prosecution cases, case groups, defence associations and hearings, each an
//! aggregate over its own stream of [`ProgressionEvent`]s. The
//! [`ProgressionCommandHandler`] runs single-stream commands directly and
//! sequences the multi-stream ones (group formation, member removal with
//! master reassignment, listing status propagation). The
//! [`ProgressionDispatcher`] maps named envelopes onto it.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod dispatch;
pub mod domain;
pub mod events;
pub mod handler;
pub mod ids;

pub use dispatch::{names, ProgressionCommand, ProgressionDispatcher, ProgressionError};
pub use domain::*;
pub use events::{AggregateKind, ProgressionEvent, UnexpectedEvent};
pub use handler::{ProgressionCommandHandler, ProgressionOutcome};
pub use ids::{CaseId, DefendantId, GroupId, HearingId, OrganisationId};
