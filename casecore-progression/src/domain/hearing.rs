//! Hearing aggregate and listing status propagation.
//!
//! A hearing moves through [`ListingStatus`] values until it is resulted.
//! `HearingResulted` is terminal: later updates are dropped, not rejected,
//! so that late or re-delivered messages can never regress a resulted
//! hearing.

use crate::ids::{CaseId, GroupId, HearingId};
use casecore::{Aggregate, AggregateCommand, DomainError, DomainEvent, Handle};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;

/// Listing status of a hearing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ListingStatus {
    /// Not yet sent for listing
    #[default]
    NotListed,
    /// Sent to listing, awaiting a slot
    SentForListing,
    /// A slot is allocated
    Listed,
    /// The hearing has started
    HearingInitialised,
    /// The hearing has a result; terminal
    HearingResulted,
}

impl ListingStatus {
    /// Position in the listing lifecycle.
    pub const fn priority(self) -> u8 {
        match self {
            Self::NotListed => 0,
            Self::SentForListing => 1,
            Self::Listed => 2,
            Self::HearingInitialised => 3,
            Self::HearingResulted => 4,
        }
    }

    /// Whether no further status change is accepted.
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::HearingResulted)
    }
}

impl PartialOrd for ListingStatus {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for ListingStatus {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        self.priority().cmp(&other.priority())
    }
}

impl fmt::Display for ListingStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::NotListed => "NOT_LISTED",
            Self::SentForListing => "SENT_FOR_LISTING",
            Self::Listed => "LISTED",
            Self::HearingInitialised => "HEARING_INITIALISED",
            Self::HearingResulted => "HEARING_RESULTED",
        };
        f.write_str(name)
    }
}

/// A case heard in a hearing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HearingCase {
    /// The case
    pub case_id: CaseId,
    /// Whether the case is its group's master
    #[serde(default)]
    pub is_group_master: bool,
}

/// A hearing was created for a set of cases.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HearingCreated {
    /// The hearing
    pub hearing_id: HearingId,
    /// Cases heard, ordered by id
    pub cases: Vec<HearingCase>,
    /// The group the cases belong to, for a group hearing
    pub group_id: Option<GroupId>,
}

/// The hearing's listing status changed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListingStatusChanged {
    /// The hearing
    pub hearing_id: HearingId,
    /// New status
    pub status: ListingStatus,
    /// Cases affected, ordered by id
    pub case_ids: Vec<CaseId>,
}

/// One member case of a group hearing took the hearing's new status.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CaseListingStatusExpanded {
    /// The hearing
    pub hearing_id: HearingId,
    /// The member case
    pub case_id: CaseId,
    /// New status
    pub status: ListingStatus,
    /// Whether the case is its group's master
    pub is_group_master: bool,
}

/// Events of the hearing stream.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "PascalCase")]
pub enum HearingEvent {
    /// See [`HearingCreated`]
    HearingCreated(HearingCreated),
    /// See [`ListingStatusChanged`]
    ListingStatusChanged(ListingStatusChanged),
    /// See [`CaseListingStatusExpanded`]
    CaseListingStatusExpanded(CaseListingStatusExpanded),
}

impl DomainEvent for HearingEvent {
    fn event_type(&self) -> &'static str {
        match self {
            Self::HearingCreated(_) => "HearingCreated",
            Self::ListingStatusChanged(_) => "ListingStatusChanged",
            Self::CaseListingStatusExpanded(_) => "CaseListingStatusExpanded",
        }
    }
}

/// Folded state of a hearing.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HearingAggregate {
    hearing_id: Option<HearingId>,
    cases: Vec<HearingCase>,
    group_id: Option<GroupId>,
    status: ListingStatus,
}

impl HearingAggregate {
    /// Whether the hearing has been created.
    pub const fn exists(&self) -> bool {
        self.hearing_id.is_some()
    }

    /// Current listing status.
    pub const fn status(&self) -> ListingStatus {
        self.status
    }

    /// Cases heard, ordered by id.
    pub fn cases(&self) -> &[HearingCase] {
        &self.cases
    }

    /// Group of a group hearing.
    pub const fn group_id(&self) -> Option<GroupId> {
        self.group_id
    }
}

impl Aggregate for HearingAggregate {
    const KIND: &'static str = "hearing";
    type Id = HearingId;
    type Event = HearingEvent;

    fn apply(&mut self, event: &HearingEvent) {
        match event {
            HearingEvent::HearingCreated(created) => {
                self.hearing_id = Some(created.hearing_id);
                self.cases.clone_from(&created.cases);
                self.group_id = created.group_id;
            }
            HearingEvent::ListingStatusChanged(changed) => self.status = changed.status,
            // Per-case detail of a status change already folded above
            HearingEvent::CaseListingStatusExpanded(_) => {}
        }
    }
}

/// Creates a hearing for a set of cases.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateHearing {
    /// The hearing
    pub hearing_id: HearingId,
    /// Cases to hear
    pub cases: Vec<HearingCase>,
    /// Group the cases belong to, for a group hearing
    #[serde(default)]
    pub group_id: Option<GroupId>,
}

impl AggregateCommand for CreateHearing {
    type Aggregate = HearingAggregate;

    fn aggregate_id(&self) -> HearingId {
        self.hearing_id
    }
}

impl Handle<CreateHearing> for HearingAggregate {
    fn handle(&self, command: &CreateHearing) -> Result<Vec<HearingEvent>, DomainError> {
        if self.exists() {
            return Ok(vec![]);
        }
        if command.cases.is_empty() {
            return Err(DomainError::ValidationFailed(
                "a hearing needs at least one case".to_string(),
            ));
        }
        let distinct: BTreeSet<_> = command.cases.iter().map(|c| c.case_id).collect();
        if distinct.len() != command.cases.len() {
            return Err(DomainError::ValidationFailed(
                "a case is listed twice in the hearing".to_string(),
            ));
        }
        let masters = command.cases.iter().filter(|c| c.is_group_master).count();
        if command.group_id.is_some() && masters != 1 {
            return Err(DomainError::ValidationFailed(format!(
                "a group hearing needs exactly one master case, found {masters}"
            )));
        }
        if command.group_id.is_none() && masters != 0 {
            return Err(DomainError::ValidationFailed(
                "only a group hearing can have a master case".to_string(),
            ));
        }

        let mut cases = command.cases.clone();
        cases.sort_by_key(|c| c.case_id);
        Ok(vec![HearingEvent::HearingCreated(HearingCreated {
            hearing_id: command.hearing_id,
            cases,
            group_id: command.group_id,
        })])
    }
}

/// Moves a hearing to a new listing status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateListingStatus {
    /// The hearing
    pub hearing_id: HearingId,
    /// Requested status
    pub status: ListingStatus,
}

impl AggregateCommand for UpdateListingStatus {
    type Aggregate = HearingAggregate;

    fn aggregate_id(&self) -> HearingId {
        self.hearing_id
    }
}

impl Handle<UpdateListingStatus> for HearingAggregate {
    fn handle(&self, command: &UpdateListingStatus) -> Result<Vec<HearingEvent>, DomainError> {
        if !self.exists() {
            return Err(DomainError::NotFound(format!(
                "hearing {}",
                command.hearing_id
            )));
        }
        if self.status.is_terminal() || self.status == command.status {
            return Ok(vec![]);
        }

        let mut events = vec![HearingEvent::ListingStatusChanged(ListingStatusChanged {
            hearing_id: command.hearing_id,
            status: command.status,
            case_ids: self.cases.iter().map(|c| c.case_id).collect(),
        })];
        if self.group_id.is_some() {
            events.extend(self.cases.iter().map(|case| {
                HearingEvent::CaseListingStatusExpanded(CaseListingStatusExpanded {
                    hearing_id: command.hearing_id,
                    case_id: case.case_id,
                    status: command.status,
                    is_group_master: case.is_group_master,
                })
            }));
        }
        Ok(events)
    }
}
