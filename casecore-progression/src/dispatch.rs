//! Named command ingress for the progression context.
//!
//! The transport delivers `(name, aggregate id hint, payload)`. The name picks
//! the command type and the field the hint fills; the handler method follows
//! from the command type.

use crate::domain::{
    AssociateDefenceOrganisation, CreateGroupCases, CreateHearing, CreateProsecutionCase,
    DisassociateDefenceOrganisation, LockDefenceAssociation, RemoveCaseFromGroup,
    UnlockDefenceAssociation, UpdateCaseGroupInfo, UpdateListingStatus,
};
use crate::events::ProgressionEvent;
use crate::handler::{ProgressionCommandHandler, ProgressionOutcome};
use casecore::{
    CommandEnvelope, CommandRoute, DispatchError, EventStore, EventStoreError, EventStoreResult,
    ExecutionContext,
};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{instrument, warn};

/// Command names accepted by the progression context.
pub mod names {
    /// [`super::CreateProsecutionCase`]
    pub const CREATE_PROSECUTION_CASE: &str = "progression.command.create-prosecution-case";
    /// [`super::UpdateCaseGroupInfo`]
    pub const UPDATE_CASE_GROUP_INFO: &str = "progression.command.update-case-group-info";
    /// [`super::CreateGroupCases`]
    pub const CREATE_GROUP_CASES: &str = "progression.command.create-group-cases";
    /// [`super::RemoveCaseFromGroup`]
    pub const REMOVE_CASE_FROM_GROUP_CASES: &str =
        "progression.command.remove-case-from-group-cases";
    /// [`super::AssociateDefenceOrganisation`]
    pub const ASSOCIATE_DEFENCE_ORGANISATION: &str =
        "progression.command.associate-defence-organisation";
    /// [`super::DisassociateDefenceOrganisation`]
    pub const DISASSOCIATE_DEFENCE_ORGANISATION: &str =
        "progression.command.disassociate-defence-organisation";
    /// [`super::LockDefenceAssociation`]
    pub const LOCK_DEFENCE_ASSOCIATION_FOR_LAA: &str =
        "progression.command.lock-defence-association-for-laa";
    /// [`super::UnlockDefenceAssociation`]
    pub const UNLOCK_DEFENCE_ASSOCIATION: &str = "progression.command.unlock-defence-association";
    /// [`super::CreateHearing`]
    pub const CREATE_HEARING: &str = "progression.command.create-hearing";
    /// [`super::UpdateListingStatus`]
    pub const UPDATE_LISTING_STATUS: &str = "progression.command.update-listing-status";
}

/// Any progression command.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "PascalCase")]
pub enum ProgressionCommand {
    /// See [`CreateProsecutionCase`]
    CreateProsecutionCase(CreateProsecutionCase),
    /// See [`UpdateCaseGroupInfo`]
    UpdateCaseGroupInfo(UpdateCaseGroupInfo),
    /// See [`CreateGroupCases`]
    CreateGroupCases(CreateGroupCases),
    /// See [`RemoveCaseFromGroup`]
    RemoveCaseFromGroup(RemoveCaseFromGroup),
    /// See [`AssociateDefenceOrganisation`]
    AssociateDefenceOrganisation(AssociateDefenceOrganisation),
    /// See [`DisassociateDefenceOrganisation`]
    DisassociateDefenceOrganisation(DisassociateDefenceOrganisation),
    /// See [`LockDefenceAssociation`]
    LockDefenceAssociation(LockDefenceAssociation),
    /// See [`UnlockDefenceAssociation`]
    UnlockDefenceAssociation(UnlockDefenceAssociation),
    /// See [`CreateHearing`]
    CreateHearing(CreateHearing),
    /// See [`UpdateListingStatus`]
    UpdateListingStatus(UpdateListingStatus),
}

impl ProgressionCommand {
    /// The name this command is delivered under.
    pub const fn name(&self) -> &'static str {
        match self {
            Self::CreateProsecutionCase(_) => names::CREATE_PROSECUTION_CASE,
            Self::UpdateCaseGroupInfo(_) => names::UPDATE_CASE_GROUP_INFO,
            Self::CreateGroupCases(_) => names::CREATE_GROUP_CASES,
            Self::RemoveCaseFromGroup(_) => names::REMOVE_CASE_FROM_GROUP_CASES,
            Self::AssociateDefenceOrganisation(_) => names::ASSOCIATE_DEFENCE_ORGANISATION,
            Self::DisassociateDefenceOrganisation(_) => names::DISASSOCIATE_DEFENCE_ORGANISATION,
            Self::LockDefenceAssociation(_) => names::LOCK_DEFENCE_ASSOCIATION_FOR_LAA,
            Self::UnlockDefenceAssociation(_) => names::UNLOCK_DEFENCE_ASSOCIATION,
            Self::CreateHearing(_) => names::CREATE_HEARING,
            Self::UpdateListingStatus(_) => names::UPDATE_LISTING_STATUS,
        }
    }
}

impl CommandRoute for ProgressionCommand {
    const COMMAND_NAMES: &'static [&'static str] = &[
        names::CREATE_PROSECUTION_CASE,
        names::UPDATE_CASE_GROUP_INFO,
        names::CREATE_GROUP_CASES,
        names::REMOVE_CASE_FROM_GROUP_CASES,
        names::ASSOCIATE_DEFENCE_ORGANISATION,
        names::DISASSOCIATE_DEFENCE_ORGANISATION,
        names::LOCK_DEFENCE_ASSOCIATION_FOR_LAA,
        names::UNLOCK_DEFENCE_ASSOCIATION,
        names::CREATE_HEARING,
        names::UPDATE_LISTING_STATUS,
    ];

    fn decode(envelope: &CommandEnvelope) -> Result<Self, DispatchError> {
        Ok(match envelope.name.as_ref() {
            names::CREATE_PROSECUTION_CASE => {
                Self::CreateProsecutionCase(envelope.decode_payload("caseId")?)
            }
            names::UPDATE_CASE_GROUP_INFO => {
                Self::UpdateCaseGroupInfo(envelope.decode_payload("caseId")?)
            }
            names::CREATE_GROUP_CASES => Self::CreateGroupCases(envelope.decode_payload("groupId")?),
            names::REMOVE_CASE_FROM_GROUP_CASES => {
                Self::RemoveCaseFromGroup(envelope.decode_payload("groupId")?)
            }
            names::ASSOCIATE_DEFENCE_ORGANISATION => {
                Self::AssociateDefenceOrganisation(envelope.decode_payload("defendantId")?)
            }
            names::DISASSOCIATE_DEFENCE_ORGANISATION => {
                Self::DisassociateDefenceOrganisation(envelope.decode_payload("defendantId")?)
            }
            names::LOCK_DEFENCE_ASSOCIATION_FOR_LAA => {
                Self::LockDefenceAssociation(envelope.decode_payload("defendantId")?)
            }
            names::UNLOCK_DEFENCE_ASSOCIATION => {
                Self::UnlockDefenceAssociation(envelope.decode_payload("defendantId")?)
            }
            names::CREATE_HEARING => Self::CreateHearing(envelope.decode_payload("hearingId")?),
            names::UPDATE_LISTING_STATUS => {
                Self::UpdateListingStatus(envelope.decode_payload("hearingId")?)
            }
            other => return Err(DispatchError::UnknownCommand(other.to_string())),
        })
    }
}

impl<ES> ProgressionCommandHandler<ES>
where
    ES: EventStore<Event = ProgressionEvent>,
{
    /// Runs any progression command through its handler method.
    pub async fn handle(
        &self,
        command: &ProgressionCommand,
        context: &ExecutionContext,
    ) -> EventStoreResult<ProgressionOutcome> {
        match command {
            ProgressionCommand::CreateProsecutionCase(c) => {
                self.create_prosecution_case(c, context).await
            }
            ProgressionCommand::UpdateCaseGroupInfo(c) => {
                self.update_case_group_info(c, context).await
            }
            ProgressionCommand::CreateGroupCases(c) => self.create_group_cases(c, context).await,
            ProgressionCommand::RemoveCaseFromGroup(c) => {
                self.remove_case_from_group(c, context).await
            }
            ProgressionCommand::AssociateDefenceOrganisation(c) => {
                self.associate_defence_organisation(c, context).await
            }
            ProgressionCommand::DisassociateDefenceOrganisation(c) => {
                self.disassociate_defence_organisation(c, context).await
            }
            ProgressionCommand::LockDefenceAssociation(c) => {
                self.lock_defence_association(c, context).await
            }
            ProgressionCommand::UnlockDefenceAssociation(c) => {
                self.unlock_defence_association(c, context).await
            }
            ProgressionCommand::CreateHearing(c) => self.create_hearing(c, context).await,
            ProgressionCommand::UpdateListingStatus(c) => {
                self.update_listing_status(c, context).await
            }
        }
    }
}

/// Failure to run an enveloped command.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ProgressionError {
    /// The envelope could not be turned into a command.
    #[error(transparent)]
    Dispatch(#[from] DispatchError),

    /// The event log failed while the command ran.
    #[error(transparent)]
    Store(#[from] EventStoreError),
}

/// Routes named envelopes to a [`ProgressionCommandHandler`].
#[derive(Debug, Clone)]
pub struct ProgressionDispatcher<ES> {
    handler: ProgressionCommandHandler<ES>,
}

impl<ES> ProgressionDispatcher<ES>
where
    ES: EventStore<Event = ProgressionEvent>,
{
    /// Creates a dispatcher over a handler.
    pub const fn new(handler: ProgressionCommandHandler<ES>) -> Self {
        Self { handler }
    }

    /// The handler commands are routed to.
    pub const fn handler(&self) -> &ProgressionCommandHandler<ES> {
        &self.handler
    }

    /// Whether `name` is a progression command.
    pub fn accepts(name: &str) -> bool {
        ProgressionCommand::accepts(name)
    }

    /// Decodes and runs an envelope.
    #[instrument(skip_all, fields(command = %envelope.name, correlation_id = %context.correlation_id))]
    pub async fn dispatch(
        &self,
        envelope: &CommandEnvelope,
        context: &ExecutionContext,
    ) -> Result<ProgressionOutcome, ProgressionError> {
        let command = ProgressionCommand::decode(envelope).map_err(|error| {
            warn!(%error, "envelope refused");
            error
        })?;
        Ok(self.handler.handle(&command, context).await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use casecore::CommandName;
    use serde_json::json;

    fn envelope(name: &str, payload: serde_json::Value) -> CommandEnvelope {
        CommandEnvelope::new(CommandName::try_new(name).unwrap(), payload)
    }

    #[test]
    fn every_command_name_is_routed() {
        for name in ProgressionCommand::COMMAND_NAMES {
            let decoded = ProgressionCommand::decode(&envelope(name, json!({})));
            assert!(!matches!(decoded, Err(DispatchError::UnknownCommand(_))), "{name}");
        }
        assert!(!ProgressionCommand::accepts("progression.command.unknown"));
    }

    #[test]
    fn hint_supplies_the_target_group() {
        let group = "0192f5c4-1111-7000-8000-000000000001";
        let case = "0192f5c4-2222-7000-8000-000000000002";
        let command = ProgressionCommand::decode(
            &envelope(names::REMOVE_CASE_FROM_GROUP_CASES, json!({ "caseId": case }))
                .with_aggregate_id_hint(group),
        )
        .unwrap();

        match &command {
            ProgressionCommand::RemoveCaseFromGroup(remove) => {
                assert_eq!(remove.group_id.to_string(), group);
                assert_eq!(remove.case_id.to_string(), case);
            }
            other => panic!("Expected RemoveCaseFromGroup, got {other:?}"),
        }
        assert_eq!(command.name(), names::REMOVE_CASE_FROM_GROUP_CASES);
    }

    #[test]
    fn unknown_names_are_refused() {
        let err = ProgressionCommand::decode(&envelope("progression.command.unknown", json!({})))
            .unwrap_err();
        assert_eq!(
            err,
            DispatchError::UnknownCommand("progression.command.unknown".to_string())
        );
    }

    #[test]
    fn missing_target_is_reported() {
        let err = ProgressionCommand::decode(&envelope(
            names::UNLOCK_DEFENCE_ASSOCIATION,
            json!({}),
        ))
        .unwrap_err();
        assert!(matches!(err, DispatchError::MissingAggregateId(_)));
    }

    #[test]
    fn malformed_payload_is_reported() {
        let err = ProgressionCommand::decode(&envelope(
            names::UPDATE_LISTING_STATUS,
            json!({ "hearingId": "not-a-uuid", "status": "LISTED" }),
        ))
        .unwrap_err();
        assert!(matches!(err, DispatchError::InvalidPayload { .. }));
    }
}
