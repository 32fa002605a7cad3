//! # Dashboard Store
//!
//! The shared application state container behind the license dashboard.
//! Every asynchronous read from the backend goes through it, and every
//! component reads the results from it.
//!
//! ## Core Concepts
//!
//! - [`ActionId`] = an async operation that calls the backend exactly once
//! - [`MutationId`] = a synchronous transition that replaces one state field
//! - [`GetterId`] = a pure projection over the current state
//!
//! Actions never write state directly. A settled action commits exactly one
//! mutation: its success mutation with the payload, or `SET_ERROR` with the
//! failure's `errors` field.
//!
//! ## Architecture
//!
//! ```text
//! dispatch(action, filter)
//!     │
//!     ▼
//! action bridge ── set_header()? ──► HttpCollaborator.get / post
//!     │                                     │
//!     │◄──────────── Ok(data) / Err(TransportError)
//!     │
//!     ├─► commit(SET_*) or commit(SET_ERROR) ─► StateTree ─► CommitBus
//!     │
//!     ▼
//! Ok(data) / Err(DispatchError::Transport)
//! ```
//!
//! ## Key Invariants
//!
//! 1. **One writer path** - state changes only through committed mutations
//! 2. **Commits are atomic** - readers never see a half-applied transition
//! 3. **Completion order** - concurrent actions commit in the order their calls
//!    complete, so the last completion wins
//! 4. **Always settles** - every dispatch resolves or rejects, even when the
//!    collaborator panics
//!
//! ## Example
//!
//! ```ignore
//! use dashboard_store::{dashboard_store, ActionId, ErrorScope, Filter, GetterId};
//!
//! let store = dashboard_store(api_client, ErrorScope::PerModule)?;
//!
//! store
//!     .dispatch(ActionId::FetchCustomers, Some(Filter::new().with("va", "acme")))
//!     .await?;
//!
//! let customers = store.getter(GetterId::TopCustomers)?;
//! ```

mod bridge;
mod bus;
mod core;
mod error;
mod http;
mod module;
pub mod modules;
mod state;
mod store;

#[cfg(any(test, feature = "testing"))]
pub mod testing;


pub use bus::{CommitBus, CommitRecord};
pub use crate::core::{ActionId, DispatchId, Filter, GetterId, MutationId};
pub use crate::error::{DispatchError, StoreError, TransportError};
pub use http::{ApiResponse, Endpoint, HttpCollaborator, Method};
pub use module::{
    field, state_from, ActionDescriptor, GetterDescriptor, Module, ModuleState,
    MutationDescriptor, Reducer, Selector,
};
pub use modules::{dashboard_store, AuthModule, LicenseModule};
pub use state::{ErrorScope, StateTree, ERRORS_FIELD};
pub use store::{
    ActionEntry, ActionPhase, InflightGuard, InflightTracker, Store, StoreBuilder,
};
