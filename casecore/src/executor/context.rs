//! Execution context carried through one command execution.
//!
//! The context supplies the correlation and user ids stamped onto every event
//! the command appends, across all the streams it touches.

use crate::event_store::EventMetadata;
use std::collections::HashMap;
use uuid::Uuid;

/// Context information for command execution.
#[derive(Debug, Clone)]
pub struct ExecutionContext {
    /// Correlation ID for request tracing.
    pub correlation_id: String,
    /// User ID for auditing.
    pub user_id: Option<String>,
    /// Additional metadata for the execution.
    pub metadata: HashMap<String, String>,
}

impl Default for ExecutionContext {
    fn default() -> Self {
        Self {
            correlation_id: Uuid::now_v7().to_string(),
            user_id: None,
            metadata: HashMap::new(),
        }
    }
}

impl ExecutionContext {
    /// Context for a request that already has a correlation id.
    pub fn with_correlation_id(correlation_id: impl Into<String>) -> Self {
        Self {
            correlation_id: correlation_id.into(),
            ..Self::default()
        }
    }

    /// Sets the acting user.
    #[must_use]
    pub fn acting_as(mut self, user_id: impl Into<String>) -> Self {
        self.user_id = Some(user_id.into());
        self
    }

    /// Metadata attached to every event written under this context.
    pub fn event_metadata(&self) -> EventMetadata {
        let mut metadata = EventMetadata::new().with_correlation_id(self.correlation_id.clone());
        if let Some(user_id) = &self.user_id {
            metadata = metadata.with_user_id(user_id.clone());
        }
        metadata.custom.extend(self.metadata.clone());
        metadata
    }
}
