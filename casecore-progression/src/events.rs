//! The closed event type stored in the progression event log.
//!
//! Every stream holds [`ProgressionEvent`]s. Each aggregate converts its own
//! events into it on commit and reads them back with `TryFrom`, refusing
//! events that belong to another kind.

use crate::domain::{
    CaseAggregate, CaseEvent, DefenceAssociationAggregate, DefenceAssociationEvent,
    GroupCaseAggregate, GroupCasesEvent, HearingAggregate, HearingEvent,
};
use casecore::{Aggregate, DomainEvent};
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Aggregate kinds of the progression context.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AggregateKind {
    /// Prosecution case
    Case,
    /// Group of cases
    GroupCases,
    /// Defence association of a defendant
    DefenceAssociation,
    /// Hearing
    Hearing,
}

impl AggregateKind {
    /// Prefix of the streams holding this kind.
    pub const fn stream_prefix(self) -> &'static str {
        match self {
            Self::Case => CaseAggregate::KIND,
            Self::GroupCases => GroupCaseAggregate::KIND,
            Self::DefenceAssociation => DefenceAssociationAggregate::KIND,
            Self::Hearing => HearingAggregate::KIND,
        }
    }
}

impl fmt::Display for AggregateKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.stream_prefix())
    }
}

/// Any event of the progression context.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "aggregate", content = "event", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ProgressionEvent {
    /// Event of a prosecution case stream
    Case(CaseEvent),
    /// Event of a group stream
    GroupCases(GroupCasesEvent),
    /// Event of a defence association stream
    DefenceAssociation(DefenceAssociationEvent),
    /// Event of a hearing stream
    Hearing(HearingEvent),
}

impl ProgressionEvent {
    /// Kind of the aggregate that emitted the event.
    pub const fn kind(&self) -> AggregateKind {
        match self {
            Self::Case(_) => AggregateKind::Case,
            Self::GroupCases(_) => AggregateKind::GroupCases,
            Self::DefenceAssociation(_) => AggregateKind::DefenceAssociation,
            Self::Hearing(_) => AggregateKind::Hearing,
        }
    }
}

impl DomainEvent for ProgressionEvent {
    fn event_type(&self) -> &'static str {
        match self {
            Self::Case(event) => event.event_type(),
            Self::GroupCases(event) => event.event_type(),
            Self::DefenceAssociation(event) => event.event_type(),
            Self::Hearing(event) => event.event_type(),
        }
    }
}

/// A stored event read back by an aggregate of another kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("expected a {expected} event, found a {found} event")]
pub struct UnexpectedEvent {
    /// Kind the reader folds
    pub expected: AggregateKind,
    /// Kind found in the stream
    pub found: AggregateKind,
}

macro_rules! aggregate_events {
    ($($variant:ident => $event:ty),+ $(,)?) => {
        $(
            impl From<$event> for ProgressionEvent {
                fn from(event: $event) -> Self {
                    Self::$variant(event)
                }
            }

            impl TryFrom<&ProgressionEvent> for $event {
                type Error = UnexpectedEvent;

                fn try_from(event: &ProgressionEvent) -> Result<Self, Self::Error> {
                    match event {
                        ProgressionEvent::$variant(inner) => Ok(inner.clone()),
                        other => Err(UnexpectedEvent {
                            expected: AggregateKind::$variant,
                            found: other.kind(),
                        }),
                    }
                }
            }
        )+
    };
}

aggregate_events! {
    Case => CaseEvent,
    GroupCases => GroupCasesEvent,
    DefenceAssociation => DefenceAssociationEvent,
    Hearing => HearingEvent,
}
