//! Group of prosecution cases with one master case.
//!
//! Removing a member follows a fixed plan ([`GroupCaseAggregate::plan_removal`]):
//!
//! 1. a group with a single member refuses every removal and records the
//!    refusal as a [`LastMemberRemovalRejected`] event;
//! 2. removing a case that is not a member changes nothing;
//! 3. removing the master promotes the lowest remaining case id.
//!
//! The plan is a pure function of the member set, so re-running a removal
//! against the updated group settles on the same answer.

use crate::ids::{CaseId, GroupId};
use casecore::{Aggregate, AggregateCommand, DomainError, DomainEvent, Handle};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// A group was formed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GroupCasesCreated {
    /// The group
    pub group_id: GroupId,
    /// Members, ordered by id
    pub member_case_ids: Vec<CaseId>,
    /// The master case
    pub master_case_id: CaseId,
}

/// A case left the group.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CaseRemovedFromGroupCases {
    /// The group
    pub group_id: GroupId,
    /// The group master once the case has left
    pub master_case_id: CaseId,
    /// The case that left
    pub removed_case_id: CaseId,
    /// The promoted master, when the removed case was the master
    pub new_master_case_id: Option<CaseId>,
}

/// Removal of the group's only member was refused.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LastMemberRemovalRejected {
    /// The group
    pub group_id: GroupId,
    /// The case named in the refused removal
    pub case_id: CaseId,
}

/// Events of the group stream.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "PascalCase")]
pub enum GroupCasesEvent {
    /// See [`GroupCasesCreated`]
    GroupCasesCreated(GroupCasesCreated),
    /// See [`CaseRemovedFromGroupCases`]
    CaseRemovedFromGroupCases(CaseRemovedFromGroupCases),
    /// See [`LastMemberRemovalRejected`]
    LastMemberRemovalRejected(LastMemberRemovalRejected),
}

impl DomainEvent for GroupCasesEvent {
    fn event_type(&self) -> &'static str {
        match self {
            Self::GroupCasesCreated(_) => "GroupCasesCreated",
            Self::CaseRemovedFromGroupCases(_) => "CaseRemovedFromGroupCases",
            Self::LastMemberRemovalRejected(_) => "LastMemberRemovalRejected",
        }
    }
}

/// Outcome of planning a member removal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RemovalPlan {
    /// The group has a single member; the removal is refused.
    Reject,
    /// The case is not a member; nothing to do.
    NoOp,
    /// Remove the case, promoting `new_master` when the master leaves.
    Remove {
        /// The promoted master, if any
        new_master: Option<CaseId>,
    },
}

/// Folded state of a case group.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GroupCaseAggregate {
    group_id: Option<GroupId>,
    members: BTreeSet<CaseId>,
    master: Option<CaseId>,
}

impl GroupCaseAggregate {
    /// Whether the group has been formed.
    pub const fn exists(&self) -> bool {
        self.group_id.is_some()
    }

    /// Member cases in ascending id order.
    pub const fn members(&self) -> &BTreeSet<CaseId> {
        &self.members
    }

    /// The master case.
    pub const fn master(&self) -> Option<CaseId> {
        self.master
    }

    /// Decides what removing `case_id` does to this group.
    pub fn plan_removal(&self, case_id: CaseId) -> RemovalPlan {
        if self.members.len() == 1 {
            return RemovalPlan::Reject;
        }
        if !self.members.contains(&case_id) {
            return RemovalPlan::NoOp;
        }
        let new_master = if self.master == Some(case_id) {
            self.members.iter().copied().find(|id| *id != case_id)
        } else {
            None
        };
        RemovalPlan::Remove { new_master }
    }
}

impl Aggregate for GroupCaseAggregate {
    const KIND: &'static str = "group-cases";
    type Id = GroupId;
    type Event = GroupCasesEvent;

    fn apply(&mut self, event: &GroupCasesEvent) {
        match event {
            GroupCasesEvent::GroupCasesCreated(created) => {
                self.group_id = Some(created.group_id);
                self.members = created.member_case_ids.iter().copied().collect();
                self.master = Some(created.master_case_id);
            }
            GroupCasesEvent::CaseRemovedFromGroupCases(removed) => {
                self.members.remove(&removed.removed_case_id);
                self.master = Some(removed.master_case_id);
            }
            GroupCasesEvent::LastMemberRemovalRejected(_) => {}
        }
    }
}

/// Forms a group of cases.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateGroupCases {
    /// The group
    pub group_id: GroupId,
    /// Member cases
    pub member_case_ids: Vec<CaseId>,
    /// The master case; must be a member
    pub master_case_id: CaseId,
}

impl CreateGroupCases {
    /// Members in ascending id order, without duplicates.
    pub fn ordered_members(&self) -> Vec<CaseId> {
        self.member_case_ids
            .iter()
            .copied()
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect()
    }
}

impl AggregateCommand for CreateGroupCases {
    type Aggregate = GroupCaseAggregate;

    fn aggregate_id(&self) -> GroupId {
        self.group_id
    }
}

impl Handle<CreateGroupCases> for GroupCaseAggregate {
    fn handle(&self, command: &CreateGroupCases) -> Result<Vec<GroupCasesEvent>, DomainError> {
        if self.exists() {
            return Ok(vec![]);
        }
        let members = command.ordered_members();
        if members.is_empty() {
            return Err(DomainError::ValidationFailed(
                "a group needs at least one member case".to_string(),
            ));
        }
        if !members.contains(&command.master_case_id) {
            return Err(DomainError::ValidationFailed(format!(
                "master case {} is not a member of group {}",
                command.master_case_id, command.group_id
            )));
        }
        Ok(vec![GroupCasesEvent::GroupCasesCreated(GroupCasesCreated {
            group_id: command.group_id,
            member_case_ids: members,
            master_case_id: command.master_case_id,
        })])
    }
}

/// Removes a case from a group.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RemoveCaseFromGroup {
    /// The group
    pub group_id: GroupId,
    /// The case to remove
    pub case_id: CaseId,
}

impl AggregateCommand for RemoveCaseFromGroup {
    type Aggregate = GroupCaseAggregate;

    fn aggregate_id(&self) -> GroupId {
        self.group_id
    }
}

impl Handle<RemoveCaseFromGroup> for GroupCaseAggregate {
    fn handle(&self, command: &RemoveCaseFromGroup) -> Result<Vec<GroupCasesEvent>, DomainError> {
        let (Some(group_id), Some(master)) = (self.group_id, self.master) else {
            return Err(DomainError::NotFound(format!(
                "group {}",
                command.group_id
            )));
        };

        Ok(match self.plan_removal(command.case_id) {
            RemovalPlan::Reject => vec![GroupCasesEvent::LastMemberRemovalRejected(
                LastMemberRemovalRejected {
                    group_id,
                    case_id: command.case_id,
                },
            )],
            RemovalPlan::NoOp => vec![],
            RemovalPlan::Remove { new_master } => vec![GroupCasesEvent::CaseRemovedFromGroupCases(
                CaseRemovedFromGroupCases {
                    group_id,
                    master_case_id: new_master.unwrap_or(master),
                    removed_case_id: command.case_id,
                    new_master_case_id: new_master,
                },
            )],
        })
    }
}
