use casecore::{
    Aggregate, CommandExecutor, CommandOutcome, DomainError, EventStore, ExecutionContext,
    RetryConfig, StreamId,
};
use casecore_memory::InMemoryEventStore;
use casecore_progression::{
    CaseAggregate, CaseEvent, CaseGroupInfoUpdated, CaseId, CaseRemovedFromGroupCases,
    CreateGroupCases, CreateProsecutionCase, GroupCaseAggregate, GroupCasesEvent, GroupId,
    GroupInfo, LastMemberRemovalRejected, ProgressionCommandHandler, ProgressionEvent,
    RemoveCaseFromGroup, UpdateCaseGroupInfo,
};
use casecore_testing::{ChaosConfig, ChaosEventStoreExt};
use uuid::Uuid;

type Store = InMemoryEventStore<ProgressionEvent>;

fn case(n: u128) -> CaseId {
    CaseId::new(Uuid::from_u128(n))
}

fn group() -> GroupId {
    GroupId::new(Uuid::from_u128(100))
}

fn handler<ES>(store: ES) -> ProgressionCommandHandler<ES>
where
    ES: EventStore<Event = ProgressionEvent>,
{
    ProgressionCommandHandler::new(
        CommandExecutor::new(store).with_retry_config(RetryConfig::immediate(3)),
    )
}

fn case_stream(id: CaseId) -> StreamId {
    CaseAggregate::stream_id(&id).unwrap()
}

fn group_stream() -> StreamId {
    GroupCaseAggregate::stream_id(&group()).unwrap()
}

fn group_info(case_id: CaseId, member: bool, master: bool) -> ProgressionEvent {
    CaseEvent::CaseGroupInfoUpdated(CaseGroupInfoUpdated {
        case_id,
        group_id: group(),
        is_group_member: member,
        is_group_master: master,
    })
    .into()
}

async fn stream_len(store: &Store, stream: &StreamId) -> usize {
    store.read_stream(stream).await.unwrap().len()
}

/// Opens cases 1..=n and groups them under [`group`] with case 1 as master.
async fn grouped_cases<ES>(handler: &ProgressionCommandHandler<ES>, n: u128)
where
    ES: EventStore<Event = ProgressionEvent>,
{
    let context = ExecutionContext::default();
    for id in 1..=n {
        let outcome = handler
            .create_prosecution_case(
                &CreateProsecutionCase {
                    case_id: case(id),
                    urn: format!("URN-{id}"),
                    defendant_ids: vec![],
                },
                &context,
            )
            .await
            .unwrap();
        assert!(outcome.is_accepted());
    }

    let outcome = handler
        .create_group_cases(
            &CreateGroupCases {
                group_id: group(),
                member_case_ids: (1..=n).rev().map(case).collect(),
                master_case_id: case(1),
            },
            &context,
        )
        .await
        .unwrap();
    assert!(outcome.is_accepted(), "{outcome:?}");
}

async fn load_case(store: &Store, id: CaseId) -> CaseAggregate {
    handler(store.clone())
        .executor()
        .repository()
        .load::<CaseAggregate>(&id)
        .await
        .unwrap()
        .state
}

#[tokio::test]
async fn group_creation_writes_cases_in_ascending_order_then_group() {
    let store = Store::new();
    let handler = handler(store.clone());
    grouped_cases(&handler, 3).await;

    let log: Vec<_> = store
        .all_events()
        .unwrap()
        .into_iter()
        .skip(3)
        .map(|stored| stored.payload)
        .collect();

    assert_eq!(
        log,
        vec![
            group_info(case(1), true, true),
            group_info(case(2), true, false),
            group_info(case(3), true, false),
            GroupCasesEvent::GroupCasesCreated(casecore_progression::GroupCasesCreated {
                group_id: group(),
                member_case_ids: vec![case(1), case(2), case(3)],
                master_case_id: case(1),
            })
            .into(),
        ]
    );
}

#[tokio::test]
async fn group_creation_redelivery_is_a_no_op() {
    let store = Store::new();
    let handler = handler(store.clone());
    grouped_cases(&handler, 2).await;
    let before = store.all_events().unwrap().len();

    let outcome = handler
        .create_group_cases(
            &CreateGroupCases {
                group_id: group(),
                member_case_ids: vec![case(1), case(2)],
                master_case_id: case(1),
            },
            &ExecutionContext::default(),
        )
        .await
        .unwrap();

    assert_eq!(outcome, CommandOutcome::unchanged());
    assert_eq!(store.all_events().unwrap().len(), before);
}

#[tokio::test]
async fn group_creation_with_unknown_case_touches_nothing() {
    let store = Store::new();
    let handler = handler(store.clone());
    handler
        .create_prosecution_case(
            &CreateProsecutionCase {
                case_id: case(1),
                urn: "URN-1".to_string(),
                defendant_ids: vec![],
            },
            &ExecutionContext::default(),
        )
        .await
        .unwrap();

    let outcome = handler
        .create_group_cases(
            &CreateGroupCases {
                group_id: group(),
                member_case_ids: vec![case(1), case(2)],
                master_case_id: case(1),
            },
            &ExecutionContext::default(),
        )
        .await
        .unwrap();

    assert!(matches!(outcome, CommandOutcome::Rejected(DomainError::NotFound(_))));
    assert_eq!(store.all_events().unwrap().len(), 1);
}

#[tokio::test]
async fn case_in_another_group_cannot_join_a_new_one() {
    // Given: G1 = {C1, C2} with master C1, and an ungrouped C3
    let store = Store::new();
    let handler = handler(store.clone());
    let context = ExecutionContext::default();
    grouped_cases(&handler, 2).await;
    handler
        .create_prosecution_case(
            &CreateProsecutionCase {
                case_id: case(3),
                urn: "URN-3".to_string(),
                defendant_ids: vec![],
            },
            &context,
        )
        .await
        .unwrap();
    let second_group = GroupId::new(Uuid::from_u128(101));
    let form_second = CreateGroupCases {
        group_id: second_group,
        member_case_ids: vec![case(1), case(3)],
        master_case_id: case(1),
    };
    let before = store.all_events().unwrap().len();

    // When: C1 is put into G2 while still master of G1
    let outcome = handler
        .create_group_cases(&form_second, &context)
        .await
        .unwrap();

    // Then: nothing is written to any stream
    assert!(matches!(
        outcome,
        CommandOutcome::Rejected(DomainError::BusinessRuleViolation(_))
    ));
    assert_eq!(store.all_events().unwrap().len(), before);

    // Leaving a group the case is not in changes nothing
    let outcome = handler
        .update_case_group_info(&UpdateCaseGroupInfo::leave(case(1), second_group), &context)
        .await
        .unwrap();
    assert_eq!(outcome, CommandOutcome::unchanged());
    assert_eq!(
        load_case(&store, case(1)).await.group(),
        Some(GroupInfo {
            group_id: group(),
            is_group_member: true,
            is_group_master: true,
        })
    );

    // Once C1 has left G1, G2 can be formed
    handler
        .remove_case_from_group(
            &RemoveCaseFromGroup {
                group_id: group(),
                case_id: case(1),
            },
            &context,
        )
        .await
        .unwrap();
    let outcome = handler
        .create_group_cases(&form_second, &context)
        .await
        .unwrap();
    assert!(outcome.is_accepted(), "{outcome:?}");
    assert_eq!(
        load_case(&store, case(1)).await.group(),
        Some(GroupInfo {
            group_id: second_group,
            is_group_member: true,
            is_group_master: true,
        })
    );
}

#[tokio::test]
async fn removing_the_master_promotes_the_lowest_remaining_case() {
    // Given: group G = {C1, C2, C3} with master C1
    let store = Store::new();
    let handler = handler(store.clone());
    grouped_cases(&handler, 3).await;

    // When: C1 is removed
    let command = RemoveCaseFromGroup {
        group_id: group(),
        case_id: case(1),
    };
    let outcome = handler
        .remove_case_from_group(&command, &ExecutionContext::default())
        .await
        .unwrap();

    // Then: removed case, new master, group, in that order
    assert_eq!(
        outcome,
        CommandOutcome::Accepted {
            events: vec![
                (case_stream(case(1)), group_info(case(1), false, false)),
                (case_stream(case(2)), group_info(case(2), true, true)),
                (
                    group_stream(),
                    GroupCasesEvent::CaseRemovedFromGroupCases(CaseRemovedFromGroupCases {
                        group_id: group(),
                        master_case_id: case(2),
                        removed_case_id: case(1),
                        new_master_case_id: Some(case(2)),
                    })
                    .into(),
                ),
            ]
        }
    );

    let group_state = handler
        .executor()
        .repository()
        .load::<GroupCaseAggregate>(&group())
        .await
        .unwrap()
        .state;
    assert_eq!(group_state.master(), Some(case(2)));
    assert_eq!(
        group_state.members().iter().copied().collect::<Vec<_>>(),
        vec![case(2), case(3)]
    );
    assert_eq!(
        load_case(&store, case(2)).await.group(),
        Some(GroupInfo {
            group_id: group(),
            is_group_member: true,
            is_group_master: true,
        })
    );

    // And: re-delivering the same command changes nothing
    let before = store.all_events().unwrap().len();
    let again = handler
        .remove_case_from_group(&command, &ExecutionContext::default())
        .await
        .unwrap();
    assert_eq!(again, CommandOutcome::unchanged());
    assert_eq!(store.all_events().unwrap().len(), before);
}

#[tokio::test]
async fn removing_a_plain_member_keeps_the_master() {
    let store = Store::new();
    let handler = handler(store.clone());
    grouped_cases(&handler, 3).await;

    let outcome = handler
        .remove_case_from_group(
            &RemoveCaseFromGroup {
                group_id: group(),
                case_id: case(3),
            },
            &ExecutionContext::default(),
        )
        .await
        .unwrap();

    let streams: Vec<_> = outcome.events().iter().map(|(s, _)| s.clone()).collect();
    assert_eq!(streams, vec![case_stream(case(3)), group_stream()]);
    assert!(matches!(
        &outcome.events()[1].1,
        ProgressionEvent::GroupCases(GroupCasesEvent::CaseRemovedFromGroupCases(removed))
            if removed.master_case_id == case(1) && removed.new_master_case_id.is_none()
    ));
    assert_eq!(stream_len(&store, &case_stream(case(1))).await, 2);
}

#[tokio::test]
async fn last_member_removal_is_rejected_on_the_group_stream_only() {
    let store = Store::new();
    let handler = handler(store.clone());
    grouped_cases(&handler, 1).await;
    let case_events = stream_len(&store, &case_stream(case(1))).await;

    // Any id is refused once a single member is left
    for target in [case(1), case(9)] {
        let outcome = handler
            .remove_case_from_group(
                &RemoveCaseFromGroup {
                    group_id: group(),
                    case_id: target,
                },
                &ExecutionContext::default(),
            )
            .await
            .unwrap();
        assert_eq!(
            outcome.events(),
            &[(
                group_stream(),
                GroupCasesEvent::LastMemberRemovalRejected(LastMemberRemovalRejected {
                    group_id: group(),
                    case_id: target,
                })
                .into(),
            )]
        );
    }

    assert_eq!(stream_len(&store, &case_stream(case(1))).await, case_events);
    assert_eq!(stream_len(&store, &group_stream()).await, 3);
}

#[tokio::test]
async fn removing_a_non_member_is_a_no_op() {
    let store = Store::new();
    let handler = handler(store.clone());
    grouped_cases(&handler, 2).await;
    let before = store.all_events().unwrap().len();

    let outcome = handler
        .remove_case_from_group(
            &RemoveCaseFromGroup {
                group_id: group(),
                case_id: case(42),
            },
            &ExecutionContext::default(),
        )
        .await
        .unwrap();

    assert_eq!(outcome, CommandOutcome::unchanged());
    assert_eq!(store.all_events().unwrap().len(), before);
}

#[tokio::test]
async fn removal_from_unknown_group_is_rejected() {
    let outcome = handler(Store::new())
        .remove_case_from_group(
            &RemoveCaseFromGroup {
                group_id: group(),
                case_id: case(1),
            },
            &ExecutionContext::default(),
        )
        .await
        .unwrap();

    assert!(matches!(outcome, CommandOutcome::Rejected(DomainError::NotFound(_))));
}

#[tokio::test]
async fn partially_applied_removal_completes_on_redelivery() {
    // Given: a removal that stopped after the removed case was updated
    let store = Store::new();
    let handler = handler(store.clone());
    grouped_cases(&handler, 3).await;
    handler
        .update_case_group_info(
            &UpdateCaseGroupInfo::leave(case(1), group()),
            &ExecutionContext::default(),
        )
        .await
        .unwrap();

    // When: the command is delivered again
    let outcome = handler
        .remove_case_from_group(
            &RemoveCaseFromGroup {
                group_id: group(),
                case_id: case(1),
            },
            &ExecutionContext::default(),
        )
        .await
        .unwrap();

    // Then: only the missing steps are written
    let streams: Vec<_> = outcome.events().iter().map(|(s, _)| s.clone()).collect();
    assert_eq!(streams, vec![case_stream(case(2)), group_stream()]);
    assert_eq!(stream_len(&store, &case_stream(case(1))).await, 3);
}

#[tokio::test]
async fn removal_survives_version_conflicts() {
    // Given: a store whose next two appends lose a race
    let store = Store::new();
    let setup = handler(store.clone());
    grouped_cases(&setup, 3).await;
    let contested = handler(
        store
            .clone()
            .with_chaos(ChaosConfig::deterministic().with_conflicts_before_success(2)),
    );

    // When: the master is removed
    let outcome = contested
        .remove_case_from_group(
            &RemoveCaseFromGroup {
                group_id: group(),
                case_id: case(1),
            },
            &ExecutionContext::default(),
        )
        .await
        .unwrap();

    // Then: every step still lands exactly once
    assert_eq!(outcome.events().len(), 3);
    assert_eq!(contested.executor().repository().store().append_calls(), 5);
    assert_eq!(stream_len(&store, &case_stream(case(1))).await, 3);
    assert_eq!(stream_len(&store, &case_stream(case(2))).await, 3);
    assert_eq!(stream_len(&store, &group_stream()).await, 2);
}
