//! Module contract and the registry that validates it.
//!
//! A module packages a slice of state with the actions that fetch it, the
//! mutations that write it and the getters that read it. Modules are plain
//! descriptor tables: actions name their endpoint and success mutation,
//! mutations and getters are function pointers over the module's own state.
//!
//! # Key Properties
//!
//! - **State is namespaced**: a module only ever sees its own fields
//! - **Mutations are total**: `fn(&mut ModuleState, Value)`, no I/O, no failure
//! - **Getters are pure**: `fn(&ModuleState) -> Value`
//! - **One success mutation per action**: the error mutation is shared and
//!   owned by the container
//!
//! # Example
//!
//! ```ignore
//! struct NewsModule;
//!
//! fn set_news(state: &mut ModuleState, news: Value) {
//!     state.insert("news".into(), news);
//! }
//!
//! fn news(state: &ModuleState) -> Value {
//!     state.get("news").cloned().unwrap_or(Value::Null)
//! }
//!
//! impl Module for NewsModule {
//!     fn name(&self) -> &'static str { "news" }
//!     fn initial_state(&self) -> ModuleState { state_from([("news", json!([]))]) }
//!     fn actions(&self) -> &[ActionDescriptor] { &NEWS_ACTIONS }
//!     fn mutations(&self) -> &[MutationDescriptor] { &NEWS_MUTATIONS }
//!     fn getters(&self) -> &[GetterDescriptor] { &NEWS_GETTERS }
//! }
//! ```

use std::collections::HashMap;
use std::fmt;

use serde_json::{Map, Value};

use crate::core::{ActionId, GetterId, MutationId};
use crate::error::StoreError;
use crate::http::Endpoint;
use crate::state::ERRORS_FIELD;

/// Field name → value mapping owned by one module.
pub type ModuleState = Map<String, Value>;

/// Synchronous state transition: replaces the field(s) it owns.
pub type Reducer = fn(&mut ModuleState, Value);

/// Pure projection over a module's state.
pub type Selector = fn(&ModuleState) -> Value;

/// Build a module state from `(field, initial value)` pairs.
pub fn state_from<const N: usize>(fields: [(&str, Value); N]) -> ModuleState {
    fields
        .into_iter()
        .map(|(field, value)| (field.to_string(), value))
        .collect()
}

/// Read a field, treating a missing field as `null`.
pub fn field(state: &ModuleState, name: &str) -> Value {
    state.get(name).cloned().unwrap_or(Value::Null)
}

/// An asynchronous operation that calls the backend once.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ActionDescriptor {
    pub id: ActionId,
    pub endpoint: Endpoint,
    /// Re-read credentials into the outgoing headers before the call.
    pub refresh_headers: bool,
    /// The mutation committed with the payload on success.
    pub commits: MutationId,
}

/// A state transition owned by one module.
#[derive(Clone, Copy)]
pub struct MutationDescriptor {
    pub id: MutationId,
    /// The field the reducer replaces.
    pub field: &'static str,
    pub reducer: Reducer,
}

/// A read projection owned by one module.
#[derive(Clone, Copy)]
pub struct GetterDescriptor {
    pub id: GetterId,
    /// The field the selector projects.
    pub field: &'static str,
    pub selector: Selector,
}

impl fmt::Debug for MutationDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MutationDescriptor")
            .field("id", &self.id)
            .field("field", &self.field)
            .finish_non_exhaustive()
    }
}

impl fmt::Debug for GetterDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GetterDescriptor")
            .field("id", &self.id)
            .field("field", &self.field)
            .finish_non_exhaustive()
    }
}

/// A self-contained unit of state, actions, mutations and getters.
pub trait Module: Send + Sync + 'static {
    /// Unique name; also the key of the module's state in the tree.
    fn name(&self) -> &'static str;

    /// State the tree starts with. Its keys are the module's fixed schema.
    /// `errors` is reserved for the container and may not appear here.
    fn initial_state(&self) -> ModuleState;

    fn actions(&self) -> &[ActionDescriptor];

    fn mutations(&self) -> &[MutationDescriptor];

    fn getters(&self) -> &[GetterDescriptor];
}

/// An action resolved to the module that owns it.
#[derive(Debug, Clone, Copy)]
pub(crate) struct RegisteredAction {
    pub module: &'static str,
    pub descriptor: ActionDescriptor,
    pub success: MutationDescriptor,
}

/// Static dispatch tables built from registered modules.
#[derive(Default)]
pub(crate) struct Registry {
    modules: Vec<&'static str>,
    actions: HashMap<ActionId, RegisteredAction>,
    mutations: HashMap<MutationId, (&'static str, MutationDescriptor)>,
    getters: HashMap<GetterId, (&'static str, GetterDescriptor)>,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Validate a module and add its descriptors.
    ///
    /// Validation runs to completion before anything is inserted, so a
    /// rejected module leaves the registry unchanged.
    pub fn register(&mut self, module: &dyn Module, schema: &ModuleState) -> Result<(), StoreError> {
        let name = module.name();

        if self.contains_module(name) {
            return Err(StoreError::DuplicateModule { name });
        }
        if name == ERRORS_FIELD || schema.contains_key(ERRORS_FIELD) {
            return Err(StoreError::ReservedField {
                module: name,
                field: ERRORS_FIELD,
            });
        }

        let mut own_mutations: HashMap<MutationId, MutationDescriptor> = HashMap::new();
        for mutation in module.mutations() {
            if mutation.id == MutationId::SetError {
                return Err(StoreError::ReservedMutation { module: name });
            }
            if let Some((existing, _)) = self.mutations.get(&mutation.id) {
                return Err(StoreError::DuplicateMutation {
                    mutation: mutation.id,
                    module: name,
                    existing: *existing,
                });
            }
            if own_mutations.insert(mutation.id, *mutation).is_some() {
                return Err(StoreError::DuplicateMutation {
                    mutation: mutation.id,
                    module: name,
                    existing: name,
                });
            }
            if !schema.contains_key(mutation.field) {
                return Err(StoreError::UnknownField {
                    module: name,
                    field: mutation.field,
                });
            }
        }

        let mut own_getters: Vec<GetterId> = Vec::new();
        for getter in module.getters() {
            if let Some((existing, _)) = self.getters.get(&getter.id) {
                return Err(StoreError::DuplicateGetter {
                    getter: getter.id,
                    module: name,
                    existing: *existing,
                });
            }
            if own_getters.contains(&getter.id) {
                return Err(StoreError::DuplicateGetter {
                    getter: getter.id,
                    module: name,
                    existing: name,
                });
            }
            own_getters.push(getter.id);
            if !schema.contains_key(getter.field) {
                return Err(StoreError::UnknownField {
                    module: name,
                    field: getter.field,
                });
            }
        }

        let mut own_actions: Vec<RegisteredAction> = Vec::new();
        for action in module.actions() {
            let existing = self
                .actions
                .get(&action.id)
                .map(|a| a.module)
                .or_else(|| own_actions.iter().find(|a| a.descriptor.id == action.id).map(|a| a.module));
            if let Some(existing) = existing {
                return Err(StoreError::DuplicateAction {
                    action: action.id,
                    module: name,
                    existing,
                });
            }
            let success = own_mutations.get(&action.commits).copied().ok_or(
                StoreError::UnknownMutation {
                    module: name,
                    action: action.id,
                    mutation: action.commits,
                },
            )?;
            own_actions.push(RegisteredAction {
                module: name,
                descriptor: *action,
                success,
            });
        }

        self.modules.push(name);
        for (id, mutation) in own_mutations {
            self.mutations.insert(id, (name, mutation));
        }
        for getter in module.getters() {
            self.getters.insert(getter.id, (name, *getter));
        }
        for action in own_actions {
            self.actions.insert(action.descriptor.id, action);
        }

        Ok(())
    }

    pub fn action(&self, id: ActionId) -> Option<&RegisteredAction> {
        self.actions.get(&id)
    }

    pub fn getter(&self, id: GetterId) -> Option<(&'static str, GetterDescriptor)> {
        self.getters.get(&id).copied()
    }

    pub fn contains_module(&self, name: &str) -> bool {
        self.modules.iter().any(|m| *m == name)
    }

    /// Registered actions in identifier order.
    pub fn actions(&self) -> Vec<RegisteredAction> {
        let mut actions: Vec<RegisteredAction> = self.actions.values().copied().collect();
        actions.sort_by_key(|a| a.descriptor.id);
        actions
    }

    /// The getter projecting the field an action's success mutation writes.
    pub fn getter_for(&self, action: ActionId) -> Option<GetterId> {
        let registered = self.actions.get(&action)?;
        let mut matches: Vec<GetterId> = self
            .getters
            .iter()
            .filter(|(_, (module, getter))| {
                *module == registered.module && getter.field == registered.success.field
            })
            .map(|(id, _)| *id)
            .collect();
        matches.sort();
        matches.into_iter().next()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn set_items(state: &mut ModuleState, items: Value) {
        state.insert("items".into(), items);
    }

    fn items(state: &ModuleState) -> Value {
        field(state, "items")
    }

    const ACTIONS: [ActionDescriptor; 1] = [ActionDescriptor {
        id: ActionId::FetchAccounts,
        endpoint: Endpoint::get("ssoapi/accounts"),
        refresh_headers: true,
        commits: MutationId::SetAccount,
    }];

    const MUTATIONS: [MutationDescriptor; 1] = [MutationDescriptor {
        id: MutationId::SetAccount,
        field: "items",
        reducer: set_items,
    }];

    const GETTERS: [GetterDescriptor; 1] = [GetterDescriptor {
        id: GetterId::ListAccounts,
        field: "items",
        selector: items,
    }];

    /// Test module whose tables can be swapped per case.
    struct TableModule {
        name: &'static str,
        state: ModuleState,
        actions: Vec<ActionDescriptor>,
        mutations: Vec<MutationDescriptor>,
        getters: Vec<GetterDescriptor>,
    }

    impl TableModule {
        fn accounts(name: &'static str) -> Self {
            Self {
                name,
                state: state_from([("items", json!({}))]),
                actions: ACTIONS.to_vec(),
                mutations: MUTATIONS.to_vec(),
                getters: GETTERS.to_vec(),
            }
        }

        fn empty(name: &'static str) -> Self {
            Self {
                name,
                state: state_from([("items", json!({}))]),
                actions: Vec::new(),
                mutations: Vec::new(),
                getters: Vec::new(),
            }
        }
    }

    impl Module for TableModule {
        fn name(&self) -> &'static str {
            self.name
        }

        fn initial_state(&self) -> ModuleState {
            self.state.clone()
        }

        fn actions(&self) -> &[ActionDescriptor] {
            &self.actions
        }

        fn mutations(&self) -> &[MutationDescriptor] {
            &self.mutations
        }

        fn getters(&self) -> &[GetterDescriptor] {
            &self.getters
        }
    }

    fn register(registry: &mut Registry, module: &TableModule) -> Result<(), StoreError> {
        registry.register(module, &module.initial_state())
    }

    #[test]
    fn test_register_builds_dispatch_tables() {
        let mut registry = Registry::new();
        register(&mut registry, &TableModule::accounts("accounts")).unwrap();

        let action = registry.action(ActionId::FetchAccounts).unwrap();
        assert_eq!(action.module, "accounts");
        assert_eq!(action.success.id, MutationId::SetAccount);
        assert_eq!(action.success.field, "items");
        assert_eq!(registry.getter_for(ActionId::FetchAccounts), Some(GetterId::ListAccounts));
        assert!(registry.contains_module("accounts"));
    }

    #[test]
    fn test_duplicate_module_name_is_rejected() {
        let mut registry = Registry::new();
        register(&mut registry, &TableModule::empty("license")).unwrap();

        let err = register(&mut registry, &TableModule::empty("license")).unwrap_err();
        assert_eq!(err, StoreError::DuplicateModule { name: "license" });
    }

    #[test]
    fn test_action_claimed_by_two_modules_is_rejected() {
        let mut registry = Registry::new();
        register(&mut registry, &TableModule::accounts("first")).unwrap();

        let mut second = TableModule::accounts("second");
        second.mutations.clear();
        second.getters.clear();
        let err = register(&mut registry, &second).unwrap_err();
        assert_eq!(
            err,
            StoreError::DuplicateAction {
                action: ActionId::FetchAccounts,
                module: "second",
                existing: "first",
            }
        );
    }

    #[test]
    fn test_mutation_claimed_by_two_modules_is_rejected() {
        let mut registry = Registry::new();
        register(&mut registry, &TableModule::accounts("first")).unwrap();

        let mut second = TableModule::empty("second");
        second.mutations = MUTATIONS.to_vec();
        let err = register(&mut registry, &second).unwrap_err();
        assert!(matches!(err, StoreError::DuplicateMutation { existing: "first", .. }));
    }

    #[test]
    fn test_getter_claimed_by_two_modules_is_rejected() {
        let mut registry = Registry::new();
        register(&mut registry, &TableModule::accounts("first")).unwrap();

        let mut second = TableModule::empty("second");
        second.getters = GETTERS.to_vec();
        let err = register(&mut registry, &second).unwrap_err();
        assert!(matches!(err, StoreError::DuplicateGetter { getter: GetterId::ListAccounts, .. }));
    }

    #[test]
    fn test_mutation_outside_schema_is_rejected() {
        let mut module = TableModule::accounts("accounts");
        module.state = state_from([("other", json!(null))]);

        let err = register(&mut Registry::new(), &module).unwrap_err();
        assert_eq!(
            err,
            StoreError::UnknownField {
                module: "accounts",
                field: "items",
            }
        );
    }

    #[test]
    fn test_action_must_commit_own_mutation() {
        let mut module = TableModule::accounts("accounts");
        module.mutations.clear();

        let err = register(&mut Registry::new(), &module).unwrap_err();
        assert_eq!(
            err,
            StoreError::UnknownMutation {
                module: "accounts",
                action: ActionId::FetchAccounts,
                mutation: MutationId::SetAccount,
            }
        );
    }

    #[test]
    fn test_error_mutation_is_reserved() {
        let mut module = TableModule::empty("sneaky");
        module.mutations.push(MutationDescriptor {
            id: MutationId::SetError,
            field: "items",
            reducer: set_items,
        });

        let err = register(&mut Registry::new(), &module).unwrap_err();
        assert_eq!(err, StoreError::ReservedMutation { module: "sneaky" });
    }

    #[test]
    fn test_errors_field_in_module_state_is_reserved() {
        fn set_errors(state: &mut ModuleState, errors: Value) {
            state.insert("errors".into(), errors);
        }

        let mut module = TableModule::empty("audit");
        module.state = state_from([("errors", json!([1, 2, 3]))]);
        module.mutations.push(MutationDescriptor {
            id: MutationId::SetAccount,
            field: "errors",
            reducer: set_errors,
        });

        let mut registry = Registry::new();
        let err = register(&mut registry, &module).unwrap_err();
        assert_eq!(
            err,
            StoreError::ReservedField {
                module: "audit",
                field: "errors",
            }
        );
        assert!(!registry.contains_module("audit"));
    }

    #[test]
    fn test_module_named_errors_is_reserved() {
        let err = register(&mut Registry::new(), &TableModule::empty("errors")).unwrap_err();
        assert_eq!(
            err,
            StoreError::ReservedField {
                module: "errors",
                field: "errors",
            }
        );
    }

    #[test]
    fn test_rejected_module_leaves_registry_unchanged() {
        let mut registry = Registry::new();
        let mut module = TableModule::accounts("accounts");
        module.getters[0].field = "missing";

        assert!(register(&mut registry, &module).is_err());
        assert!(!registry.contains_module("accounts"));
        assert!(registry.action(ActionId::FetchAccounts).is_none());

        register(&mut registry, &TableModule::accounts("accounts")).unwrap();
        assert!(registry.action(ActionId::FetchAccounts).is_some());
    }
}
