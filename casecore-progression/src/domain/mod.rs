//! Progression aggregates, one module per stream kind.

pub mod case;
pub mod defence_association;
pub mod group_cases;
pub mod hearing;

pub use case::{
    CaseAggregate, CaseEvent, CaseGroupInfoUpdated, CaseListing, CaseListingStatusChanged,
    CreateProsecutionCase, GroupInfo, ProsecutionCaseCreated, RecordCaseListingStatus,
    UpdateCaseGroupInfo,
};
pub use defence_association::{
    AssociateDefenceOrganisation, Association, DefenceAssociationAggregate,
    DefenceAssociationEvent, DefenceAssociationLocked, DefenceAssociationUnlocked,
    DefenceOrganisationAssociated, DefenceOrganisationDisassociated,
    DisassociateDefenceOrganisation, LockDefenceAssociation, OrganisationType, PastAssociation,
    RepresentationType, UnlockDefenceAssociation,
};
pub use group_cases::{
    CaseRemovedFromGroupCases, CreateGroupCases, GroupCaseAggregate, GroupCasesCreated,
    GroupCasesEvent, LastMemberRemovalRejected, RemovalPlan, RemoveCaseFromGroup,
};
pub use hearing::{
    CaseListingStatusExpanded, CreateHearing, HearingAggregate, HearingCase, HearingCreated,
    HearingEvent, ListingStatus, ListingStatusChanged, UpdateListingStatus,
};
