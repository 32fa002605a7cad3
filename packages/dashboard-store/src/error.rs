//! Structured error types for the state container.
//!
//! `TransportError` is the one failure kind an action can settle with. It is
//! produced by the HTTP collaborator and handed back to the dispatcher
//! untouched, while its `errors` payload is committed to the Error Slot.
//!
//! `StoreError` covers registration and lookup problems, which are programmer
//! errors surfaced while the container is assembled or queried.
//!
//! # Example
//!
//! ```ignore
//! use dashboard_store::{ActionId, DispatchError};
//!
//! match store.dispatch(ActionId::FetchAccounts, None).await {
//!     Ok(accounts) => render(accounts),
//!     Err(DispatchError::Transport(failure)) => {
//!         eprintln!("backend said: {}", failure.errors);
//!     }
//!     Err(other) => eprintln!("{other}"),
//! }
//! ```

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use thiserror::Error;

use crate::core::{ActionId, GetterId, MutationId};

// =============================================================================
// Transport Failure
// =============================================================================

/// Failure envelope returned by the HTTP collaborator.
///
/// `errors` is opaque backend data. It is `null` when the backend answered
/// without an `errors` field (an empty 404 for an unknown session, say).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Error)]
#[error("{}", self.describe())]
pub struct TransportError {
    /// Path of the request that failed, relative to the API base.
    pub path: String,
    /// HTTP status, when a response was received at all.
    pub status: Option<u16>,
    /// The backend's `errors` payload.
    pub errors: Value,
}

impl TransportError {
    pub fn new(path: impl Into<String>, status: Option<u16>, errors: Value) -> Self {
        Self {
            path: path.into(),
            status,
            errors,
        }
    }

    /// A failure without a response: connection refused, timeout, decode error.
    pub fn network(path: impl Into<String>, message: impl Into<String>) -> Self {
        Self::new(path, None, Value::String(message.into()))
    }

    fn describe(&self) -> String {
        let request = match self.status {
            Some(status) => format!("request to `{}` failed with status {}", self.path, status),
            None => format!("request to `{}` failed", self.path),
        };
        match &self.errors {
            Value::Null => request,
            Value::String(s) => format!("{request}: {s}"),
            other => format!("{request}: {other}"),
        }
    }

    /// The failure in the `{response: {status, data: {errors}}}` shape the
    /// dashboard UI reads.
    pub fn envelope(&self) -> Value {
        json!({
            "response": {
                "status": self.status,
                "data": { "errors": self.errors },
            }
        })
    }
}


// =============================================================================
// Dispatch Error
// =============================================================================

/// Outcome of a rejected dispatch.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum DispatchError {
    /// No registered module provides this action.
    #[error("action {action} is not registered")]
    UnknownAction {
        /// The action that was dispatched.
        action: ActionId,
    },

    /// The backend call failed. Carries the collaborator's envelope unchanged.
    #[error(transparent)]
    Transport(#[from] TransportError),
}

impl DispatchError {
    /// The transport envelope, if the failure came from the backend.
    pub fn transport(&self) -> Option<&TransportError> {
        match self {
            Self::Transport(failure) => Some(failure),
            Self::UnknownAction { .. } => None,
        }
    }
}

// =============================================================================
// Store Error
// =============================================================================

/// Registration and lookup errors.
///
/// These are pattern-matchable so that callers assembling a container can
/// tell a name collision from a wiring mistake.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StoreError {
    /// A module with this name is already registered.
    #[error("module `{name}` is already registered")]
    DuplicateModule {
        /// The colliding module name.
        name: &'static str,
    },

    /// Another module already provides this action.
    #[error("action {action} from module `{module}` is already provided by `{existing}`")]
    DuplicateAction {
        action: ActionId,
        module: &'static str,
        existing: &'static str,
    },

    /// Another module already provides this mutation.
    #[error("mutation {mutation} from module `{module}` is already provided by `{existing}`")]
    DuplicateMutation {
        mutation: MutationId,
        module: &'static str,
        existing: &'static str,
    },

    /// Another module already provides this getter.
    #[error("getter {getter} from module `{module}` is already provided by `{existing}`")]
    DuplicateGetter {
        getter: GetterId,
        module: &'static str,
        existing: &'static str,
    },

    /// A descriptor names a field that is not part of the module's state.
    #[error("module `{module}` has no state field `{field}`")]
    UnknownField {
        module: &'static str,
        field: &'static str,
    },

    /// An action commits a mutation its module does not provide.
    #[error("action {action} in module `{module}` commits {mutation}, which the module does not provide")]
    UnknownMutation {
        module: &'static str,
        action: ActionId,
        mutation: MutationId,
    },

    /// Modules may not provide the error mutation; the container owns it.
    #[error("module `{module}` registers SET_ERROR, which is reserved for the container")]
    ReservedMutation { module: &'static str },

    /// The name belongs to the container's Error Slot. Either a module's state
    /// declares an `errors` field, or a module is itself named `errors`.
    #[error("module `{module}` uses `{field}`, which is reserved for the error slot")]
    ReservedField {
        module: &'static str,
        field: &'static str,
    },

    /// No module with this name is registered.
    #[error("no module named `{name}`")]
    UnknownModule { name: String },

    /// No registered module provides this getter.
    #[error("getter {getter} is not registered")]
    UnknownGetter { getter: GetterId },
}
