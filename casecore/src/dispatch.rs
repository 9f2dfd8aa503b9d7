//! Routing named commands to typed handlers.
//!
//! An external dispatcher delivers a [`CommandEnvelope`]: the command name, an
//! optional hint naming the target aggregate, and a JSON payload. A handler
//! declares the names it accepts through [`CommandRoute::COMMAND_NAMES`] and
//! decodes envelopes into its own command type.

use crate::errors::DispatchError;
use crate::types::CommandName;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// A named command as delivered by the transport.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CommandEnvelope {
    /// Command name, e.g. `progression.command.remove-case-from-group-cases`
    pub name: CommandName,
    /// Target aggregate id supplied by the transport, if any
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub aggregate_id_hint: Option<String>,
    /// Command body
    pub payload: Value,
}

impl CommandEnvelope {
    /// Creates an envelope without an aggregate id hint.
    pub const fn new(name: CommandName, payload: Value) -> Self {
        Self {
            name,
            aggregate_id_hint: None,
            payload,
        }
    }

    /// Sets the aggregate id hint.
    #[must_use]
    pub fn with_aggregate_id_hint(mut self, hint: impl Into<String>) -> Self {
        self.aggregate_id_hint = Some(hint.into());
        self
    }

    /// Decodes the payload into `T`.
    ///
    /// When the payload lacks `id_field` and the envelope carries a hint, the
    /// hint is used for that field.
    pub fn decode_payload<T>(&self, id_field: &str) -> Result<T, DispatchError>
    where
        T: DeserializeOwned,
    {
        let mut payload = self.payload.clone();
        if let (Value::Object(fields), Some(hint)) = (&mut payload, &self.aggregate_id_hint) {
            fields
                .entry(id_field)
                .or_insert_with(|| Value::String(hint.clone()));
        }

        if let Value::Object(fields) = &payload {
            if !fields.contains_key(id_field) {
                return Err(DispatchError::MissingAggregateId(self.name.to_string()));
            }
        }

        serde_json::from_value(payload).map_err(|e| DispatchError::InvalidPayload {
            command: self.name.to_string(),
            detail: e.to_string(),
        })
    }
}

/// A command type reachable through named envelopes.
pub trait CommandRoute: Sized {
    /// Every command name this type decodes.
    const COMMAND_NAMES: &'static [&'static str];

    /// Decodes an envelope whose name is one of [`Self::COMMAND_NAMES`].
    ///
    /// # Errors
    ///
    /// `UnknownCommand` for a name outside [`Self::COMMAND_NAMES`]; payload
    /// errors otherwise.
    fn decode(envelope: &CommandEnvelope) -> Result<Self, DispatchError>;

    /// Whether `name` is routed to this type.
    fn accepts(name: &str) -> bool {
        Self::COMMAND_NAMES.contains(&name)
    }
}
