//! Association of a defendant with a defence organisation.
//!
//! The rules depend on who is asking. The caller's [`OrganisationType`] is
//! resolved before the command is built and travels on the command:
//!
//! - with no current association, any association succeeds;
//! - re-associating the current organisation changes nothing;
//! - replacing a different organisation is an HMCTS-only override;
//! - disassociating needs the current organisation id, unless HMCTS asks;
//! - a locked association can be neither replaced nor ended by anyone.

use crate::ids::{DefendantId, OrganisationId};
use casecore::{Aggregate, AggregateCommand, DomainError, DomainEvent, Handle};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// Kind of organisation a caller acts for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OrganisationType {
    /// The court service; may override existing associations
    Hmcts,
    /// Any other organisation
    NonHmcts,
}

/// How the defence is funded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RepresentationType {
    /// Legal aid representation order
    RepresentationOrder,
    /// Privately funded
    Private,
}

/// A defence organisation now represents the defendant.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DefenceOrganisationAssociated {
    /// The defendant
    pub defendant_id: DefendantId,
    /// The representing organisation
    pub organisation_id: OrganisationId,
    /// Display name of the organisation
    pub organisation_name: String,
    /// Funding of the representation
    pub representation_type: RepresentationType,
    /// First day of the representation
    pub start_date: NaiveDate,
    /// The organisation replaced by an HMCTS override
    pub replaced_organisation_id: Option<OrganisationId>,
}

/// A defence organisation stopped representing the defendant.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DefenceOrganisationDisassociated {
    /// The defendant
    pub defendant_id: DefendantId,
    /// The organisation leaving
    pub organisation_id: OrganisationId,
    /// Last day of the representation
    pub end_date: NaiveDate,
}

/// The association was locked under a legal aid contract.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DefenceAssociationLocked {
    /// The defendant
    pub defendant_id: DefendantId,
    /// Contract under which the association is locked
    pub laa_contract_number: String,
}

/// The legal aid lock was lifted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DefenceAssociationUnlocked {
    /// The defendant
    pub defendant_id: DefendantId,
}

/// Events of the defence association stream.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "PascalCase")]
pub enum DefenceAssociationEvent {
    /// See [`DefenceOrganisationAssociated`]
    DefenceOrganisationAssociated(DefenceOrganisationAssociated),
    /// See [`DefenceOrganisationDisassociated`]
    DefenceOrganisationDisassociated(DefenceOrganisationDisassociated),
    /// See [`DefenceAssociationLocked`]
    DefenceAssociationLocked(DefenceAssociationLocked),
    /// See [`DefenceAssociationUnlocked`]
    DefenceAssociationUnlocked(DefenceAssociationUnlocked),
}

impl DomainEvent for DefenceAssociationEvent {
    fn event_type(&self) -> &'static str {
        match self {
            Self::DefenceOrganisationAssociated(_) => "DefenceOrganisationAssociated",
            Self::DefenceOrganisationDisassociated(_) => "DefenceOrganisationDisassociated",
            Self::DefenceAssociationLocked(_) => "DefenceAssociationLocked",
            Self::DefenceAssociationUnlocked(_) => "DefenceAssociationUnlocked",
        }
    }
}

/// The organisation currently representing the defendant.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Association {
    /// The organisation
    pub organisation_id: OrganisationId,
    /// Display name
    pub organisation_name: String,
    /// Funding
    pub representation_type: RepresentationType,
    /// First day of the representation
    pub start_date: NaiveDate,
}

/// A finished representation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PastAssociation {
    /// The organisation
    pub organisation_id: OrganisationId,
    /// First day
    pub start_date: NaiveDate,
    /// Last day
    pub end_date: NaiveDate,
}

/// Folded state of a defendant's defence association.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DefenceAssociationAggregate {
    current: Option<Association>,
    laa_contract_number: Option<String>,
    history: Vec<PastAssociation>,
}

impl DefenceAssociationAggregate {
    /// The organisation currently representing the defendant.
    pub const fn current(&self) -> Option<&Association> {
        self.current.as_ref()
    }

    /// Whether the association is locked for legal aid.
    pub const fn is_locked(&self) -> bool {
        self.laa_contract_number.is_some()
    }

    /// Earlier representations, oldest first.
    pub fn history(&self) -> &[PastAssociation] {
        &self.history
    }

    fn refuse_when_locked(&self, action: &str) -> Result<(), DomainError> {
        match &self.laa_contract_number {
            Some(contract) => Err(DomainError::ValidationFailed(format!(
                "cannot {action}: association is locked under LAA contract {contract}"
            ))),
            None => Ok(()),
        }
    }
}

impl Aggregate for DefenceAssociationAggregate {
    const KIND: &'static str = "defence-association";
    type Id = DefendantId;
    type Event = DefenceAssociationEvent;

    fn apply(&mut self, event: &DefenceAssociationEvent) {
        match event {
            DefenceAssociationEvent::DefenceOrganisationAssociated(associated) => {
                if let Some(previous) = self.current.take() {
                    self.history.push(PastAssociation {
                        organisation_id: previous.organisation_id,
                        start_date: previous.start_date,
                        end_date: associated.start_date,
                    });
                }
                self.current = Some(Association {
                    organisation_id: associated.organisation_id,
                    organisation_name: associated.organisation_name.clone(),
                    representation_type: associated.representation_type,
                    start_date: associated.start_date,
                });
            }
            DefenceAssociationEvent::DefenceOrganisationDisassociated(disassociated) => {
                if let Some(previous) = self.current.take() {
                    self.history.push(PastAssociation {
                        organisation_id: previous.organisation_id,
                        start_date: previous.start_date,
                        end_date: disassociated.end_date,
                    });
                }
            }
            DefenceAssociationEvent::DefenceAssociationLocked(locked) => {
                self.laa_contract_number = Some(locked.laa_contract_number.clone());
            }
            DefenceAssociationEvent::DefenceAssociationUnlocked(_) => {
                self.laa_contract_number = None;
            }
        }
    }
}

/// Associates a defence organisation with a defendant.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AssociateDefenceOrganisation {
    /// The defendant
    pub defendant_id: DefendantId,
    /// The organisation to associate
    pub organisation_id: OrganisationId,
    /// Display name of the organisation
    pub organisation_name: String,
    /// Funding of the representation
    pub representation_type: RepresentationType,
    /// First day of the representation
    pub start_date: NaiveDate,
    /// Type of the organisation issuing the command
    pub caller_organisation_type: OrganisationType,
}

impl AggregateCommand for AssociateDefenceOrganisation {
    type Aggregate = DefenceAssociationAggregate;

    fn aggregate_id(&self) -> DefendantId {
        self.defendant_id
    }
}

impl Handle<AssociateDefenceOrganisation> for DefenceAssociationAggregate {
    fn handle(
        &self,
        command: &AssociateDefenceOrganisation,
    ) -> Result<Vec<DefenceAssociationEvent>, DomainError> {
        let replaced = match &self.current {
            None => None,
            Some(current) if current.organisation_id == command.organisation_id => {
                return Ok(vec![]);
            }
            Some(current) => {
                self.refuse_when_locked("replace the defence organisation")?;
                if command.caller_organisation_type != OrganisationType::Hmcts {
                    return Err(DomainError::ValidationFailed(format!(
                        "defendant {} is already represented by organisation {}",
                        command.defendant_id, current.organisation_id
                    )));
                }
                if command.start_date < current.start_date {
                    return Err(DomainError::ValidationFailed(format!(
                        "new representation cannot start before {}",
                        current.start_date
                    )));
                }
                Some(current.organisation_id)
            }
        };

        Ok(vec![DefenceAssociationEvent::DefenceOrganisationAssociated(
            DefenceOrganisationAssociated {
                defendant_id: command.defendant_id,
                organisation_id: command.organisation_id,
                organisation_name: command.organisation_name.clone(),
                representation_type: command.representation_type,
                start_date: command.start_date,
                replaced_organisation_id: replaced,
            },
        )])
    }
}

/// Ends the defendant's current representation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DisassociateDefenceOrganisation {
    /// The defendant
    pub defendant_id: DefendantId,
    /// The organisation believed to represent the defendant
    pub organisation_id: OrganisationId,
    /// Last day of the representation
    pub end_date: NaiveDate,
    /// Type of the organisation issuing the command
    pub caller_organisation_type: OrganisationType,
}

impl AggregateCommand for DisassociateDefenceOrganisation {
    type Aggregate = DefenceAssociationAggregate;

    fn aggregate_id(&self) -> DefendantId {
        self.defendant_id
    }
}

impl Handle<DisassociateDefenceOrganisation> for DefenceAssociationAggregate {
    fn handle(
        &self,
        command: &DisassociateDefenceOrganisation,
    ) -> Result<Vec<DefenceAssociationEvent>, DomainError> {
        let Some(current) = &self.current else {
            return Ok(vec![]);
        };
        self.refuse_when_locked("end the representation")?;
        if current.organisation_id != command.organisation_id
            && command.caller_organisation_type != OrganisationType::Hmcts
        {
            return Err(DomainError::ValidationFailed(format!(
                "organisation {} does not represent defendant {}",
                command.organisation_id, command.defendant_id
            )));
        }
        if command.end_date < current.start_date {
            return Err(DomainError::ValidationFailed(format!(
                "representation cannot end before it started on {}",
                current.start_date
            )));
        }

        Ok(vec![
            DefenceAssociationEvent::DefenceOrganisationDisassociated(
                DefenceOrganisationDisassociated {
                    defendant_id: command.defendant_id,
                    organisation_id: current.organisation_id,
                    end_date: command.end_date,
                },
            ),
        ])
    }
}

/// Locks the current association under a legal aid contract.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LockDefenceAssociation {
    /// The defendant
    pub defendant_id: DefendantId,
    /// The legal aid contract
    pub laa_contract_number: String,
}

impl AggregateCommand for LockDefenceAssociation {
    type Aggregate = DefenceAssociationAggregate;

    fn aggregate_id(&self) -> DefendantId {
        self.defendant_id
    }
}

impl Handle<LockDefenceAssociation> for DefenceAssociationAggregate {
    fn handle(
        &self,
        command: &LockDefenceAssociation,
    ) -> Result<Vec<DefenceAssociationEvent>, DomainError> {
        if self.is_locked() {
            return Ok(vec![]);
        }
        if self.current.is_none() {
            return Err(DomainError::BusinessRuleViolation(format!(
                "defendant {} has no defence organisation to lock",
                command.defendant_id
            )));
        }
        if command.laa_contract_number.trim().is_empty() {
            return Err(DomainError::ValidationFailed(
                "LAA contract number must not be empty".to_string(),
            ));
        }
        Ok(vec![DefenceAssociationEvent::DefenceAssociationLocked(
            DefenceAssociationLocked {
                defendant_id: command.defendant_id,
                laa_contract_number: command.laa_contract_number.trim().to_string(),
            },
        )])
    }
}

/// Lifts the legal aid lock.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UnlockDefenceAssociation {
    /// The defendant
    pub defendant_id: DefendantId,
}

impl AggregateCommand for UnlockDefenceAssociation {
    type Aggregate = DefenceAssociationAggregate;

    fn aggregate_id(&self) -> DefendantId {
        self.defendant_id
    }
}

impl Handle<UnlockDefenceAssociation> for DefenceAssociationAggregate {
    fn handle(
        &self,
        command: &UnlockDefenceAssociation,
    ) -> Result<Vec<DefenceAssociationEvent>, DomainError> {
        if !self.is_locked() {
            return Ok(vec![]);
        }
        Ok(vec![DefenceAssociationEvent::DefenceAssociationUnlocked(
            DefenceAssociationUnlocked {
                defendant_id: command.defendant_id,
            },
        )])
    }
}
