//! Group master reassignment walkthrough
//!
//! Opens three cases, groups them under the first one, then removes the
//! master and prints what each stream received.

use casecore::{CommandExecutor, EventStore, ExecutionContext, ExecutorConfig};
use casecore_memory::InMemoryEventStore;
use casecore_progression::{
    CaseId, CreateGroupCases, CreateProsecutionCase, GroupId, ProgressionCommandHandler,
    ProgressionEvent, RemoveCaseFromGroup,
};
use tracing::{info, Level};
use tracing_subscriber::FmtSubscriber;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let subscriber = FmtSubscriber::builder()
        .with_max_level(Level::DEBUG)
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    let store: InMemoryEventStore<ProgressionEvent> = InMemoryEventStore::new();
    let config = ExecutorConfig::from_json(r#"{ "max_attempts": 5, "base_delay_ms": 10 }"#)?;
    let handler = ProgressionCommandHandler::new(CommandExecutor::with_config(
        store.clone(),
        &config,
    ));
    let context = ExecutionContext::with_correlation_id("demo-1").acting_as("listing-officer");

    let mut cases: Vec<CaseId> = (0..3).map(|_| CaseId::generate()).collect();
    cases.sort();
    for (n, case_id) in cases.iter().enumerate() {
        handler
            .create_prosecution_case(
                &CreateProsecutionCase {
                    case_id: *case_id,
                    urn: format!("42GD00{n}"),
                    defendant_ids: vec![],
                },
                &context,
            )
            .await?;
    }

    let group_id = GroupId::generate();
    info!(%group_id, master = %cases[0], "forming group");
    handler
        .create_group_cases(
            &CreateGroupCases {
                group_id,
                member_case_ids: cases.clone(),
                master_case_id: cases[0],
            },
            &context,
        )
        .await?;

    info!(removed = %cases[0], "removing the master");
    let outcome = handler
        .remove_case_from_group(
            &RemoveCaseFromGroup {
                group_id,
                case_id: cases[0],
            },
            &context,
        )
        .await?;
    for (stream, event) in outcome.events() {
        info!(%stream, event = %serde_json::to_string(event)?, "appended");
    }

    for stream in store.stream_ids()? {
        let data = store.read_stream(&stream).await?;
        info!(%stream, events = data.len(), "stream");
    }

    Ok(())
}
