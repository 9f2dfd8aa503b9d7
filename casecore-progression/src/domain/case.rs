//! Prosecution case aggregate.
//!
//! A case records which group it belongs to and the listing status of each
//! hearing it is listed in. Both are written by the multi-stream flows in
//! [`crate::handler`], so every command here reaches a fixed point when the
//! case already carries the requested values.
//!
//! A case is a member of at most one group at a time. Leaving a group the
//! case is not in is a fixed point.

use super::hearing::ListingStatus;
use crate::ids::{CaseId, DefendantId, GroupId, HearingId};
use casecore::{Aggregate, AggregateCommand, DomainError, DomainEvent, Handle};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// A prosecution case was opened.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProsecutionCaseCreated {
    /// The new case
    pub case_id: CaseId,
    /// Unique reference number
    pub urn: String,
    /// Defendants charged on the case
    pub defendant_ids: Vec<DefendantId>,
}

/// The case's group membership changed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CaseGroupInfoUpdated {
    /// The case
    pub case_id: CaseId,
    /// The group the flags refer to
    pub group_id: GroupId,
    /// Whether the case is a member of the group
    pub is_group_member: bool,
    /// Whether the case is the group master
    pub is_group_master: bool,
}

/// The listing status of one of the case's hearings changed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CaseListingStatusChanged {
    /// The case
    pub case_id: CaseId,
    /// The hearing whose status changed
    pub hearing_id: HearingId,
    /// New status
    pub status: ListingStatus,
    /// Whether the case is its group's master
    pub is_group_master: bool,
}

/// Events of the prosecution case stream.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "PascalCase")]
pub enum CaseEvent {
    /// See [`ProsecutionCaseCreated`]
    ProsecutionCaseCreated(ProsecutionCaseCreated),
    /// See [`CaseGroupInfoUpdated`]
    CaseGroupInfoUpdated(CaseGroupInfoUpdated),
    /// See [`CaseListingStatusChanged`]
    CaseListingStatusChanged(CaseListingStatusChanged),
}

impl DomainEvent for CaseEvent {
    fn event_type(&self) -> &'static str {
        match self {
            Self::ProsecutionCaseCreated(_) => "ProsecutionCaseCreated",
            Self::CaseGroupInfoUpdated(_) => "CaseGroupInfoUpdated",
            Self::CaseListingStatusChanged(_) => "CaseListingStatusChanged",
        }
    }
}

/// Group membership as recorded on the case.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GroupInfo {
    /// The group
    pub group_id: GroupId,
    /// Member flag
    pub is_group_member: bool,
    /// Master flag
    pub is_group_master: bool,
}

/// Listing of the case in one hearing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CaseListing {
    /// Current status
    pub status: ListingStatus,
    /// Master flag at the time of the update
    pub is_group_master: bool,
}

/// Folded state of a prosecution case.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CaseAggregate {
    case_id: Option<CaseId>,
    urn: Option<String>,
    defendant_ids: Vec<DefendantId>,
    group: Option<GroupInfo>,
    listings: BTreeMap<HearingId, CaseListing>,
}

impl CaseAggregate {
    /// Whether the case has been created.
    pub const fn exists(&self) -> bool {
        self.case_id.is_some()
    }

    /// The case's reference number.
    pub fn urn(&self) -> Option<&str> {
        self.urn.as_deref()
    }

    /// Defendants on the case.
    pub fn defendant_ids(&self) -> &[DefendantId] {
        &self.defendant_ids
    }

    /// Group membership, if the case was ever grouped.
    pub const fn group(&self) -> Option<GroupInfo> {
        self.group
    }

    /// Listing of the case in `hearing_id`.
    pub fn listing(&self, hearing_id: HearingId) -> Option<CaseListing> {
        self.listings.get(&hearing_id).copied()
    }

    fn require_exists(&self, case_id: CaseId) -> Result<(), DomainError> {
        if self.exists() {
            Ok(())
        } else {
            Err(DomainError::NotFound(format!("prosecution case {case_id}")))
        }
    }
}

impl Aggregate for CaseAggregate {
    const KIND: &'static str = "prosecution-case";
    type Id = CaseId;
    type Event = CaseEvent;

    fn apply(&mut self, event: &CaseEvent) {
        match event {
            CaseEvent::ProsecutionCaseCreated(created) => {
                self.case_id = Some(created.case_id);
                self.urn = Some(created.urn.clone());
                self.defendant_ids.clone_from(&created.defendant_ids);
            }
            CaseEvent::CaseGroupInfoUpdated(updated) => {
                self.group = Some(GroupInfo {
                    group_id: updated.group_id,
                    is_group_member: updated.is_group_member,
                    is_group_master: updated.is_group_master,
                });
            }
            CaseEvent::CaseListingStatusChanged(changed) => {
                self.listings.insert(
                    changed.hearing_id,
                    CaseListing {
                        status: changed.status,
                        is_group_master: changed.is_group_master,
                    },
                );
            }
        }
    }
}

/// Opens a prosecution case.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateProsecutionCase {
    /// The case to open
    pub case_id: CaseId,
    /// Unique reference number
    pub urn: String,
    /// Defendants charged on the case
    pub defendant_ids: Vec<DefendantId>,
}

impl AggregateCommand for CreateProsecutionCase {
    type Aggregate = CaseAggregate;

    fn aggregate_id(&self) -> CaseId {
        self.case_id
    }
}

impl Handle<CreateProsecutionCase> for CaseAggregate {
    fn handle(&self, command: &CreateProsecutionCase) -> Result<Vec<CaseEvent>, DomainError> {
        if self.exists() {
            return Ok(vec![]);
        }
        if command.urn.trim().is_empty() {
            return Err(DomainError::ValidationFailed(
                "case URN must not be empty".to_string(),
            ));
        }
        Ok(vec![CaseEvent::ProsecutionCaseCreated(
            ProsecutionCaseCreated {
                case_id: command.case_id,
                urn: command.urn.trim().to_string(),
                defendant_ids: command.defendant_ids.clone(),
            },
        )])
    }
}

/// Sets the case's group membership flags.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateCaseGroupInfo {
    /// The case to update
    pub case_id: CaseId,
    /// The group
    pub group_id: GroupId,
    /// Member flag
    pub is_group_member: bool,
    /// Master flag
    pub is_group_master: bool,
}

impl UpdateCaseGroupInfo {
    /// The case leaves `group_id` and loses any master role.
    pub const fn leave(case_id: CaseId, group_id: GroupId) -> Self {
        Self {
            case_id,
            group_id,
            is_group_member: false,
            is_group_master: false,
        }
    }

    /// The case becomes master of `group_id`.
    pub const fn promote(case_id: CaseId, group_id: GroupId) -> Self {
        Self {
            case_id,
            group_id,
            is_group_member: true,
            is_group_master: true,
        }
    }

    fn requested(&self) -> GroupInfo {
        GroupInfo {
            group_id: self.group_id,
            is_group_member: self.is_group_member,
            is_group_master: self.is_group_master,
        }
    }
}

impl AggregateCommand for UpdateCaseGroupInfo {
    type Aggregate = CaseAggregate;

    fn aggregate_id(&self) -> CaseId {
        self.case_id
    }
}

impl Handle<UpdateCaseGroupInfo> for CaseAggregate {
    fn handle(&self, command: &UpdateCaseGroupInfo) -> Result<Vec<CaseEvent>, DomainError> {
        self.require_exists(command.case_id)?;
        if command.is_group_master && !command.is_group_member {
            return Err(DomainError::ValidationFailed(
                "a group master must be a group member".to_string(),
            ));
        }
        if self.group == Some(command.requested()) {
            return Ok(vec![]);
        }
        let current = self
            .group
            .filter(|group| group.is_group_member)
            .map(|group| group.group_id);
        match current {
            Some(other) if command.is_group_member && other != command.group_id => {
                return Err(DomainError::BusinessRuleViolation(format!(
                    "case {} is already a member of group {other}",
                    command.case_id
                )));
            }
            // Leaving a group the case is not in.
            _ if !command.is_group_member && current != Some(command.group_id) => {
                return Ok(vec![]);
            }
            _ => {}
        }
        Ok(vec![CaseEvent::CaseGroupInfoUpdated(CaseGroupInfoUpdated {
            case_id: command.case_id,
            group_id: command.group_id,
            is_group_member: command.is_group_member,
            is_group_master: command.is_group_master,
        })])
    }
}

/// Records the listing status of one of the case's hearings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RecordCaseListingStatus {
    /// The case
    pub case_id: CaseId,
    /// The hearing
    pub hearing_id: HearingId,
    /// New status
    pub status: ListingStatus,
    /// Whether the case is its group's master
    pub is_group_master: bool,
}

impl AggregateCommand for RecordCaseListingStatus {
    type Aggregate = CaseAggregate;

    fn aggregate_id(&self) -> CaseId {
        self.case_id
    }
}

impl Handle<RecordCaseListingStatus> for CaseAggregate {
    fn handle(&self, command: &RecordCaseListingStatus) -> Result<Vec<CaseEvent>, DomainError> {
        self.require_exists(command.case_id)?;
        if let Some(current) = self.listing(command.hearing_id) {
            if current.status.is_terminal() || current.status == command.status {
                return Ok(vec![]);
            }
        }
        Ok(vec![CaseEvent::CaseListingStatusChanged(
            CaseListingStatusChanged {
                case_id: command.case_id,
                hearing_id: command.hearing_id,
                status: command.status,
                is_group_master: command.is_group_master,
            },
        )])
    }
}
