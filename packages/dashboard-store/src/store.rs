//! The root container: registered modules, the state tree and the
//! dispatch/read surface.
//!
//! ```text
//! UI ──dispatch(ActionId, Option<Filter>)──► Store
//!                                              │
//!                                              ▼
//!                                    action bridge ──► HttpCollaborator
//!                                              │
//!                      ┌───────────────────────┴──────────────┐
//!                      ▼ success                    failure ▼
//!              commit success mutation           commit SET_ERROR
//!                      │                                      │
//!                      └──────────► StateTree ◄───────────────┘
//!                                      │
//!                    CommitBus ◄───────┤
//!                                      ▼
//! UI ◄──────────────── getter(GetterId)
//! ```
//!
//! # Usage
//!
//! ```ignore
//! use dashboard_store::{ActionId, GetterId, StoreBuilder};
//! use dashboard_store::modules::{AuthModule, LicenseModule};
//!
//! let store = StoreBuilder::new(api_client)
//!     .try_with_module(AuthModule)?
//!     .try_with_module(LicenseModule)?
//!     .build();
//!
//! store.dispatch(ActionId::FetchAccounts, None).await?;
//! let accounts = store.getter(GetterId::ListAccounts)?;
//! ```
//!
//! # Concurrency
//!
//! `Store` is a cheap handle; clones share one container. Commits take the
//! state write lock for the duration of one reducer, so commits never
//! interleave and every read sees a fully committed tree. Actions hold no
//! lock while awaiting the backend, so concurrent dispatches commit in the
//! order their calls complete.

use std::fmt;
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};

use chrono::Utc;
use dashmap::DashMap;
use serde_json::Value;
use tokio::sync::broadcast;
use tracing::{debug, error, info, warn};

use crate::bridge;
use crate::bus::{CommitBus, CommitRecord};
use crate::core::{ActionId, Filter, GetterId, MutationId};
use crate::error::{DispatchError, StoreError, TransportError};
use crate::http::HttpCollaborator;
use crate::module::{ActionDescriptor, Module, ModuleState, MutationDescriptor, Registry};
use crate::state::{ErrorScope, StateTree};

// =============================================================================
// Inflight Tracking
// =============================================================================

/// Lifecycle of one action invocation.
///
/// `Fulfilled` and `Rejected` are terminal. There is no retry: a rejected
/// action stays rejected until the UI dispatches it again.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActionPhase {
    Idle,
    Pending,
    Fulfilled,
    Rejected,
}

impl fmt::Display for ActionPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ActionPhase::Idle => write!(f, "idle"),
            ActionPhase::Pending => write!(f, "pending"),
            ActionPhase::Fulfilled => write!(f, "fulfilled"),
            ActionPhase::Rejected => write!(f, "rejected"),
        }
    }
}

/// Counts in-flight dispatches per action.
///
/// Concurrent dispatches of the same action are independent; the tracker
/// only observes them, it never deduplicates or cancels.
#[derive(Default)]
pub struct InflightTracker {
    entries: DashMap<ActionId, usize>,
}

impl InflightTracker {
    pub fn new() -> Self {
        Self {
            entries: DashMap::new(),
        }
    }

    /// Mark one dispatch of `action` as pending until the guard drops.
    pub fn begin(self: &Arc<Self>, action: ActionId) -> InflightGuard {
        *self.entries.entry(action).or_insert(0) += 1;
        InflightGuard {
            tracker: self.clone(),
            action,
        }
    }

    fn end(&self, action: ActionId) {
        if let Some(mut count) = self.entries.get_mut(&action) {
            *count = count.saturating_sub(1);
        }
        self.entries.remove_if(&action, |_, count| *count == 0);
    }

    /// Number of dispatches of `action` that have not settled.
    pub fn pending(&self, action: ActionId) -> usize {
        self.entries.get(&action).map(|count| *count).unwrap_or(0)
    }

    /// Number of unsettled dispatches across all actions.
    pub fn total(&self) -> usize {
        self.entries.iter().map(|entry| *entry.value()).sum()
    }
}

impl fmt::Debug for InflightTracker {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("InflightTracker")
            .field("pending", &self.total())
            .finish()
    }
}

/// RAII guard for one pending dispatch.
///
/// Decrements on drop, so the count is released on every exit path of the
/// action task, including a panic or runtime shutdown.
pub struct InflightGuard {
    tracker: Arc<InflightTracker>,
    action: ActionId,
}

impl Drop for InflightGuard {
    fn drop(&mut self) {
        self.tracker.end(self.action);
    }
}

// =============================================================================
// Store
// =============================================================================

/// A registered action as listed by [`Store::actions`].
#[derive(Debug, Clone, Copy)]
pub struct ActionEntry {
    pub module: &'static str,
    pub descriptor: ActionDescriptor,
    /// Getter that reads the field the action's success mutation writes.
    pub getter: Option<GetterId>,
}

struct StoreInner {
    http: Arc<dyn HttpCollaborator>,
    registry: Registry,
    state: RwLock<StateTree>,
    bus: CommitBus,
    inflight: Arc<InflightTracker>,
}

/// Handle to the shared application state container.
#[derive(Clone)]
pub struct Store {
    inner: Arc<StoreInner>,
}

impl Store {
    /// Create a new store builder.
    pub fn builder(http: impl HttpCollaborator) -> StoreBuilder {
        StoreBuilder::new(http)
    }

    /// Dispatch an action.
    ///
    /// Resolves with the backend payload after the success mutation has been
    /// committed, or rejects with the collaborator's failure after `SET_ERROR`
    /// has been committed. Always settles.
    ///
    /// The action runs on its own task. Dropping the returned future only
    /// stops waiting for it: the call still completes and its outcome is still
    /// committed.
    pub async fn dispatch(
        &self,
        action: ActionId,
        filter: Option<Filter>,
    ) -> Result<Value, DispatchError> {
        let Some(registered) = self.inner.registry.action(action).copied() else {
            warn!(action = %action, "dispatch of unregistered action");
            return Err(DispatchError::UnknownAction { action });
        };

        let store = self.clone();
        let task = tokio::spawn(async move { bridge::run(&store, registered, filter).await });

        match task.await {
            Ok(outcome) => outcome,
            Err(join_error) => {
                error!(action = %action, error = %join_error, "action task did not complete");
                Err(DispatchError::Transport(TransportError::network(
                    registered.descriptor.endpoint.path,
                    format!("action task did not complete: {join_error}"),
                )))
            }
        }
    }

    /// Resolve a getter against the current state.
    pub fn getter(&self, getter: GetterId) -> Result<Value, StoreError> {
        let (module, descriptor) = self
            .inner
            .registry
            .getter(getter)
            .ok_or(StoreError::UnknownGetter { getter })?;
        let state = self.read_state();
        let module_state = state.module(module).ok_or_else(|| StoreError::UnknownModule {
            name: module.to_string(),
        })?;
        Ok((descriptor.selector)(module_state))
    }

    /// The getter tied to an action's success mutation.
    pub fn getter_for(&self, action: ActionId) -> Option<GetterId> {
        self.inner.registry.getter_for(action)
    }

    /// The Error Slot written by `module`'s actions.
    pub fn errors(&self, module: &str) -> Result<Value, StoreError> {
        self.read_state()
            .errors(module)
            .ok_or_else(|| StoreError::UnknownModule {
                name: module.to_string(),
            })
    }

    /// The most recently completed failure payload, in any module.
    pub fn last_error(&self) -> Value {
        self.read_state().last_error().clone()
    }

    /// The whole state tree as JSON.
    pub fn snapshot(&self) -> Value {
        self.read_state().to_json()
    }

    /// A copy of one module's state.
    pub fn module_state(&self, module: &str) -> Result<ModuleState, StoreError> {
        self.read_state()
            .module(module)
            .cloned()
            .ok_or_else(|| StoreError::UnknownModule {
                name: module.to_string(),
            })
    }

    pub fn error_scope(&self) -> ErrorScope {
        self.read_state().scope()
    }

    /// Registered actions in identifier order.
    pub fn actions(&self) -> Vec<ActionEntry> {
        self.inner
            .registry
            .actions()
            .into_iter()
            .map(|registered| ActionEntry {
                module: registered.module,
                descriptor: registered.descriptor,
                getter: self.inner.registry.getter_for(registered.descriptor.id),
            })
            .collect()
    }

    /// Receive a record for every commit from now on.
    pub fn subscribe(&self) -> broadcast::Receiver<CommitRecord> {
        self.inner.bus.subscribe()
    }

    /// Number of unsettled dispatches of `action`.
    pub fn pending(&self, action: ActionId) -> usize {
        self.inner.inflight.pending(action)
    }

    /// `Pending` while any dispatch of `action` is in flight, `Idle` otherwise.
    pub fn phase(&self, action: ActionId) -> ActionPhase {
        if self.pending(action) > 0 {
            ActionPhase::Pending
        } else {
            ActionPhase::Idle
        }
    }

    pub(crate) fn http(&self) -> &Arc<dyn HttpCollaborator> {
        &self.inner.http
    }

    pub(crate) fn inflight(&self) -> &Arc<InflightTracker> {
        &self.inner.inflight
    }

    /// Commit a module's mutation. The only write path besides [`Self::commit_error`].
    pub(crate) fn commit(&self, module: &'static str, mutation: &MutationDescriptor, payload: Value) {
        let mut state = self.write_state();
        match state.apply(module, mutation, payload) {
            Some(sequence) => self.publish(sequence, module, mutation.id),
            None => warn!(module, mutation = %mutation.id, "commit for unknown module dropped"),
        }
    }

    /// Commit `SET_ERROR` for a failure raised by one of `module`'s actions.
    pub(crate) fn commit_error(&self, module: &'static str, errors: Value) {
        let mut state = self.write_state();
        match state.set_error(module, errors) {
            Some(sequence) => self.publish(sequence, module, MutationId::SetError),
            None => warn!(module, "error commit for unknown module dropped"),
        }
    }

    /// Called with the state write guard held, so records keep commit order.
    fn publish(&self, sequence: u64, module: &'static str, mutation: MutationId) {
        debug!(module, mutation = %mutation, sequence, "mutation committed");
        self.inner.bus.publish(CommitRecord {
            sequence,
            module,
            mutation,
            committed_at: Utc::now(),
        });
    }

    fn read_state(&self) -> RwLockReadGuard<'_, StateTree> {
        match self.inner.state.read() {
            Ok(guard) => guard,
            Err(poisoned) => {
                warn!("state lock was poisoned, recovering");
                poisoned.into_inner()
            }
        }
    }

    fn write_state(&self) -> RwLockWriteGuard<'_, StateTree> {
        match self.inner.state.write() {
            Ok(guard) => guard,
            Err(poisoned) => {
                warn!("state lock was poisoned, recovering");
                poisoned.into_inner()
            }
        }
    }
}

impl fmt::Debug for Store {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Store")
            .field("inflight", &self.inner.inflight)
            .field("bus", &self.inner.bus)
            .finish_non_exhaustive()
    }
}

// =============================================================================
// Store Builder
// =============================================================================

/// Builder for constructing a [`Store`] from modules.
///
/// # Example
///
/// ```ignore
/// let store = StoreBuilder::new(http)
///     .error_scope(ErrorScope::Shared)
///     .try_with_module(AuthModule)?
///     .try_with_module(LicenseModule)?
///     .build();
/// ```
pub struct StoreBuilder {
    http: Arc<dyn HttpCollaborator>,
    registry: Registry,
    modules: Vec<(&'static str, ModuleState)>,
    error_scope: ErrorScope,
    bus: CommitBus,
}

impl StoreBuilder {
    /// Create a builder around the HTTP collaborator actions will use.
    pub fn new(http: impl HttpCollaborator) -> Self {
        Self {
            http: Arc::new(http),
            registry: Registry::new(),
            modules: Vec::new(),
            error_scope: ErrorScope::default(),
            bus: CommitBus::new(),
        }
    }

    /// Choose where failed actions record their errors.
    pub fn error_scope(mut self, scope: ErrorScope) -> Self {
        self.error_scope = scope;
        self
    }

    /// Use an existing commit bus instead of creating a new one.
    pub fn with_bus(mut self, bus: CommitBus) -> Self {
        self.bus = bus;
        self
    }

    /// Register a module.
    ///
    /// Fails if the module's name, or any of its actions, mutations or
    /// getters, is already registered, or if its descriptors are inconsistent
    /// with its state.
    pub fn try_with_module<M: Module>(mut self, module: M) -> Result<Self, StoreError> {
        let initial = module.initial_state();
        self.registry.register(&module, &initial)?;
        debug!(module = module.name(), fields = initial.len(), "module registered");
        self.modules.push((module.name(), initial));
        Ok(self)
    }

    /// Build the container. The state tree starts from each module's initial state.
    pub fn build(self) -> Store {
        let mut state = StateTree::new(self.error_scope);
        let names: Vec<&'static str> = self.modules.iter().map(|(name, _)| *name).collect();
        for (name, initial) in self.modules {
            state.insert_module(name, initial);
        }

        info!(modules = ?names, error_scope = %self.error_scope, "state container built");

        Store {
            inner: Arc::new(StoreInner {
                http: self.http,
                registry: self.registry,
                state: RwLock::new(state),
                bus: self.bus,
                inflight: Arc::new(InflightTracker::new()),
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::modules::{AuthModule, LicenseModule};
    use crate::testing::ScriptedHttp;
    use serde_json::json;

    fn store(http: Arc<ScriptedHttp>) -> Store {
        StoreBuilder::new(http)
            .try_with_module(AuthModule)
            .unwrap()
            .try_with_module(LicenseModule)
            .unwrap()
            .build()
    }

    #[test]
    fn test_initial_state_comes_from_modules() {
        let store = store(Arc::new(ScriptedHttp::new()));

        assert_eq!(store.getter(GetterId::SsoLink).unwrap(), json!(""));
        assert_eq!(store.getter(GetterId::ListAccounts).unwrap(), json!({}));
        assert_eq!(store.getter(GetterId::TopCustomers).unwrap(), json!({}));
        assert_eq!(store.errors("license").unwrap(), Value::Null);
        assert_eq!(store.last_error(), Value::Null);
    }

    #[test]
    fn test_duplicate_module_fails_registration() {
        let result = StoreBuilder::new(ScriptedHttp::new())
            .try_with_module(LicenseModule)
            .unwrap()
            .try_with_module(LicenseModule);

        assert!(matches!(
            result,
            Err(StoreError::DuplicateModule { name: "license" })
        ));
    }

    #[test]
    fn test_getter_of_unregistered_module_is_an_error() {
        let store = StoreBuilder::new(ScriptedHttp::new())
            .try_with_module(AuthModule)
            .unwrap()
            .build();

        assert_eq!(
            store.getter(GetterId::ListAccounts),
            Err(StoreError::UnknownGetter {
                getter: GetterId::ListAccounts
            })
        );
        assert!(matches!(
            store.errors("license"),
            Err(StoreError::UnknownModule { .. })
        ));
    }

    #[tokio::test]
    async fn test_dispatch_of_unregistered_action_rejects() {
        let http = Arc::new(ScriptedHttp::new());
        let store = StoreBuilder::new(http.clone())
            .try_with_module(AuthModule)
            .unwrap()
            .build();

        let err = store
            .dispatch(ActionId::FetchAccounts, None)
            .await
            .unwrap_err();

        assert_eq!(
            err,
            DispatchError::UnknownAction {
                action: ActionId::FetchAccounts
            }
        );
        assert!(http.calls().is_empty());
        assert_eq!(store.last_error(), Value::Null);
    }

    #[test]
    fn test_getter_is_stable_without_commits() {
        let store = store(Arc::new(ScriptedHttp::new()));
        let first = store.getter(GetterId::TopTechnology).unwrap();
        let second = store.getter(GetterId::TopTechnology).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn test_actions_lists_registry_with_getters() {
        let store = store(Arc::new(ScriptedHttp::new()));
        let entries = store.actions();

        let ids: Vec<ActionId> = entries.iter().map(|e| e.descriptor.id).collect();
        assert_eq!(ids, ActionId::all().to_vec());

        let sso = &entries[0];
        assert_eq!(sso.module, "auth");
        assert_eq!(sso.getter, Some(GetterId::SsoLink));

        let customers = entries
            .iter()
            .find(|e| e.descriptor.id == ActionId::FetchCustomers)
            .unwrap();
        assert_eq!(customers.module, "license");
        assert_eq!(customers.getter, Some(GetterId::TopCustomers));
    }

    #[test]
    fn test_snapshot_and_scope() {
        let store = StoreBuilder::new(ScriptedHttp::new())
            .error_scope(ErrorScope::Shared)
            .try_with_module(AuthModule)
            .unwrap()
            .build();

        assert_eq!(store.error_scope(), ErrorScope::Shared);
        assert_eq!(store.snapshot(), json!({"auth": {"ssoLink": ""}, "errors": null}));
        assert_eq!(
            store.module_state("auth").unwrap().get("ssoLink"),
            Some(&json!(""))
        );
    }

    #[tokio::test]
    async fn test_external_bus_receives_commits() {
        let bus = CommitBus::with_capacity(8);
        let mut commits = bus.subscribe();
        let http = Arc::new(ScriptedHttp::new());
        http.respond("ssoapi/sso-link", json!("https://sso.example/abc"));

        let store = Store::builder(http)
            .with_bus(bus)
            .try_with_module(AuthModule)
            .unwrap()
            .build();
        store.dispatch(ActionId::FetchSsoLink, None).await.unwrap();

        let record = commits.recv().await.unwrap();
        assert_eq!(record.sequence, 1);
        assert_eq!(record.mutation, MutationId::SetSsoLink);
    }

    #[test]
    fn test_inflight_guard_releases_on_drop() {
        let tracker = Arc::new(InflightTracker::new());

        let first = tracker.begin(ActionId::FetchAccounts);
        let second = tracker.begin(ActionId::FetchAccounts);
        let other = tracker.begin(ActionId::FetchSsoLink);
        assert_eq!(tracker.pending(ActionId::FetchAccounts), 2);
        assert_eq!(tracker.total(), 3);

        drop(first);
        assert_eq!(tracker.pending(ActionId::FetchAccounts), 1);
        drop(second);
        drop(other);
        assert_eq!(tracker.pending(ActionId::FetchAccounts), 0);
        assert_eq!(tracker.total(), 0);
    }
}
