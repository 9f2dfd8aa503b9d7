//! Command handlers of the progression context.
//!
//! Single-stream commands go straight to the executor. Commands touching
//! several streams run as a fixed sequence of single-stream executions, each
//! reaching a fixed point when repeated, so re-delivering a partially applied
//! command completes it without duplicating events.

use crate::domain::{
    AssociateDefenceOrganisation, CaseAggregate, CreateGroupCases, CreateHearing,
    CreateProsecutionCase, DisassociateDefenceOrganisation, GroupCaseAggregate, HearingAggregate,
    LockDefenceAssociation, RecordCaseListingStatus, RemovalPlan, RemoveCaseFromGroup,
    UnlockDefenceAssociation, UpdateCaseGroupInfo, UpdateListingStatus,
};
use crate::events::ProgressionEvent;
use crate::ids::{CaseId, GroupId};
use casecore::{
    CommandExecutor, CommandOutcome, DomainError, EventStore, EventStoreResult, ExecutionContext,
};
use std::collections::BTreeSet;
use tracing::{debug, info, instrument};

/// Outcome of a progression command.
pub type ProgressionOutcome = CommandOutcome<ProgressionEvent>;

/// Handles progression commands against a store of [`ProgressionEvent`]s.
#[derive(Debug, Clone)]
pub struct ProgressionCommandHandler<ES> {
    executor: CommandExecutor<ES>,
}

impl<ES> ProgressionCommandHandler<ES>
where
    ES: EventStore<Event = ProgressionEvent>,
{
    /// Wraps a configured executor.
    pub const fn new(executor: CommandExecutor<ES>) -> Self {
        Self { executor }
    }

    /// The executor running each single-stream step.
    pub const fn executor(&self) -> &CommandExecutor<ES> {
        &self.executor
    }

    /// Opens a prosecution case.
    #[instrument(skip_all, fields(case_id = %command.case_id))]
    pub async fn create_prosecution_case(
        &self,
        command: &CreateProsecutionCase,
        context: &ExecutionContext,
    ) -> EventStoreResult<ProgressionOutcome> {
        self.executor.submit(command, context).await
    }

    /// Sets a case's group flags directly.
    #[instrument(skip_all, fields(case_id = %command.case_id, group_id = %command.group_id))]
    pub async fn update_case_group_info(
        &self,
        command: &UpdateCaseGroupInfo,
        context: &ExecutionContext,
    ) -> EventStoreResult<ProgressionOutcome> {
        self.executor.submit(command, context).await
    }

    /// Forms a group: member case streams in ascending id order, then the
    /// group stream.
    ///
    /// Every member case must exist and belong to no other group; both are
    /// checked before anything is written. Re-delivery after the group stream
    /// was written is a no-op.
    ///
    /// When a later step fails, the outcome is that step's rejection or
    /// exhaustion alone. Case streams written by earlier steps stay committed;
    /// re-delivering the command completes the flow.
    #[instrument(skip_all, fields(group_id = %command.group_id))]
    pub async fn create_group_cases(
        &self,
        command: &CreateGroupCases,
        context: &ExecutionContext,
    ) -> EventStoreResult<ProgressionOutcome> {
        let group = self
            .executor
            .repository()
            .load::<GroupCaseAggregate>(&command.group_id)
            .await?;
        if group.state.exists() {
            debug!("group already formed");
            return Ok(CommandOutcome::unchanged());
        }

        let members = command.ordered_members();
        if let Some(error) = self.check_cases(&members, Some(command.group_id)).await? {
            return Ok(CommandOutcome::Rejected(error));
        }
        if !members.contains(&command.master_case_id) {
            // Let the group aggregate refuse it before any case is touched.
            return self.executor.submit(command, context).await;
        }

        let mut outcome = CommandOutcome::unchanged();
        for case_id in members {
            let is_master = case_id == command.master_case_id;
            let step = UpdateCaseGroupInfo {
                case_id,
                group_id: command.group_id,
                is_group_member: true,
                is_group_master: is_master,
            };
            outcome = outcome.merge(self.executor.submit(&step, context).await?);
            if !outcome.is_accepted() {
                return Ok(outcome);
            }
        }
        Ok(outcome.merge(self.executor.submit(command, context).await?))
    }

    /// Removes a case from its group, promoting a new master when the master
    /// leaves.
    ///
    /// Commit order: removed case stream, new master stream, group stream.
    /// Removing the sole member appends a rejection to the group stream and
    /// touches no case.
    ///
    /// A failed step is reported on its own and steps already committed are
    /// not rolled back. The group stream is written last, so re-delivery
    /// plans the same removal and finishes it.
    #[instrument(skip_all, fields(group_id = %command.group_id, case_id = %command.case_id))]
    pub async fn remove_case_from_group(
        &self,
        command: &RemoveCaseFromGroup,
        context: &ExecutionContext,
    ) -> EventStoreResult<ProgressionOutcome> {
        let group = self
            .executor
            .repository()
            .load::<GroupCaseAggregate>(&command.group_id)
            .await?;
        if !group.state.exists() {
            return Ok(CommandOutcome::Rejected(DomainError::NotFound(format!(
                "group {}",
                command.group_id
            ))));
        }

        let new_master = match group.state.plan_removal(command.case_id) {
            RemovalPlan::Reject => {
                info!("refusing to remove the last member of the group");
                return self.executor.submit(command, context).await;
            }
            RemovalPlan::NoOp => {
                debug!("case is not a member of the group");
                return Ok(CommandOutcome::unchanged());
            }
            RemovalPlan::Remove { new_master } => new_master,
        };

        let mut steps = vec![UpdateCaseGroupInfo::leave(command.case_id, command.group_id)];
        if let Some(master) = new_master {
            info!(new_master = %master, "promoting new group master");
            steps.push(UpdateCaseGroupInfo::promote(master, command.group_id));
        }

        let mut outcome = CommandOutcome::unchanged();
        for step in &steps {
            outcome = outcome.merge(self.executor.submit(step, context).await?);
            if !outcome.is_accepted() {
                return Ok(outcome);
            }
        }
        Ok(outcome.merge(self.executor.submit(command, context).await?))
    }

    /// Associates a defence organisation with a defendant.
    #[instrument(skip_all, fields(defendant_id = %command.defendant_id, organisation_id = %command.organisation_id))]
    pub async fn associate_defence_organisation(
        &self,
        command: &AssociateDefenceOrganisation,
        context: &ExecutionContext,
    ) -> EventStoreResult<ProgressionOutcome> {
        self.executor.submit(command, context).await
    }

    /// Ends a defendant's representation.
    #[instrument(skip_all, fields(defendant_id = %command.defendant_id, organisation_id = %command.organisation_id))]
    pub async fn disassociate_defence_organisation(
        &self,
        command: &DisassociateDefenceOrganisation,
        context: &ExecutionContext,
    ) -> EventStoreResult<ProgressionOutcome> {
        self.executor.submit(command, context).await
    }

    /// Locks a defence association under a legal aid contract.
    #[instrument(skip_all, fields(defendant_id = %command.defendant_id))]
    pub async fn lock_defence_association(
        &self,
        command: &LockDefenceAssociation,
        context: &ExecutionContext,
    ) -> EventStoreResult<ProgressionOutcome> {
        self.executor.submit(command, context).await
    }

    /// Lifts the legal aid lock.
    #[instrument(skip_all, fields(defendant_id = %command.defendant_id))]
    pub async fn unlock_defence_association(
        &self,
        command: &UnlockDefenceAssociation,
        context: &ExecutionContext,
    ) -> EventStoreResult<ProgressionOutcome> {
        self.executor.submit(command, context).await
    }

    /// Creates a hearing. Every listed case must exist.
    #[instrument(skip_all, fields(hearing_id = %command.hearing_id))]
    pub async fn create_hearing(
        &self,
        command: &CreateHearing,
        context: &ExecutionContext,
    ) -> EventStoreResult<ProgressionOutcome> {
        let cases: BTreeSet<CaseId> = command.cases.iter().map(|c| c.case_id).collect();
        if let Some(error) = self.check_cases(&cases, None).await? {
            return Ok(CommandOutcome::Rejected(error));
        }
        self.executor.submit(command, context).await
    }

    /// Moves a hearing to a new listing status and records it on each case.
    ///
    /// The decision comes from a fresh load of the hearing: a terminal or
    /// unchanged hearing drops the whole command. Otherwise the case streams
    /// are written in ascending id order, then the hearing stream.
    #[instrument(skip_all, fields(hearing_id = %command.hearing_id, status = %command.status))]
    pub async fn update_listing_status(
        &self,
        command: &UpdateListingStatus,
        context: &ExecutionContext,
    ) -> EventStoreResult<ProgressionOutcome> {
        let hearing = self
            .executor
            .repository()
            .load::<HearingAggregate>(&command.hearing_id)
            .await?;
        if !hearing.state.exists() {
            return Ok(CommandOutcome::Rejected(DomainError::NotFound(format!(
                "hearing {}",
                command.hearing_id
            ))));
        }
        if hearing.state.status().is_terminal() || hearing.state.status() == command.status {
            debug!(current = %hearing.state.status(), "listing status update dropped");
            return Ok(CommandOutcome::unchanged());
        }

        let mut outcome = CommandOutcome::unchanged();
        for case in hearing.state.cases() {
            let step = RecordCaseListingStatus {
                case_id: case.case_id,
                hearing_id: command.hearing_id,
                status: command.status,
                is_group_master: case.is_group_master,
            };
            outcome = outcome.merge(self.executor.submit(&step, context).await?);
            if !outcome.is_accepted() {
                return Ok(outcome);
            }
        }
        Ok(outcome.merge(self.executor.submit(command, context).await?))
    }

    /// Refuses the first case that does not exist or, when `joining` is
    /// given, that is still a member of another group.
    async fn check_cases<'a, I>(
        &self,
        cases: I,
        joining: Option<GroupId>,
    ) -> EventStoreResult<Option<DomainError>>
    where
        I: IntoIterator<Item = &'a CaseId>,
    {
        for case_id in cases {
            let case = self
                .executor
                .repository()
                .load::<CaseAggregate>(case_id)
                .await?;
            if !case.state.exists() {
                info!(%case_id, "command refers to an unknown case");
                return Ok(Some(DomainError::NotFound(format!(
                    "prosecution case {case_id}"
                ))));
            }
            let Some(joining) = joining else { continue };
            if let Some(current) = case.state.group() {
                if current.is_group_member && current.group_id != joining {
                    info!(%case_id, group_id = %current.group_id, "case already belongs to a group");
                    return Ok(Some(DomainError::BusinessRuleViolation(format!(
                        "case {case_id} is already a member of group {}",
                        current.group_id
                    ))));
                }
            }
        }
        Ok(None)
    }
}
