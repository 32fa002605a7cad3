//! The state tree and the mutation committer.
//!
//! The tree maps module name to module state. It is written only by
//! [`StateTree::apply`] and [`StateTree::set_error`], both of which build the
//! next value of the field aside and swap it in, so a reader holding the
//! container's read lock never sees a half-applied transition.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::module::{ModuleState, MutationDescriptor};

/// Name of the Error Slot field, both per module and at the root.
pub const ERRORS_FIELD: &str = "errors";

/// Where failed actions record their `errors` payload.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorScope {
    /// Each module has its own slot; failures never clobber another module's.
    #[default]
    #[serde(rename = "module")]
    PerModule,
    /// One slot for the whole tree, overwritten by any failing action.
    ///
    /// The slot is a root `errors` key beside the module keys rather than a
    /// field inside `auth`, so no module's state holds another module's
    /// failures. Registration reserves the name for this reason.
    Shared,
}

impl ErrorScope {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::PerModule => "module",
            Self::Shared => "shared",
        }
    }
}

impl fmt::Display for ErrorScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ErrorScope {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "module" | "per-module" | "per_module" => Ok(Self::PerModule),
            "shared" => Ok(Self::Shared),
            other => Err(format!("unknown error scope `{other}` (expected `module` or `shared`)")),
        }
    }
}

/// The container's state: one [`ModuleState`] per registered module.
#[derive(Debug, Clone)]
pub struct StateTree {
    modules: BTreeMap<&'static str, ModuleState>,
    scope: ErrorScope,
    /// Root slot, written only in [`ErrorScope::Shared`].
    shared_errors: Value,
    /// Most recent failure payload, whatever the scope.
    last_error: Value,
    sequence: u64,
}

impl StateTree {
    pub fn new(scope: ErrorScope) -> Self {
        Self {
            modules: BTreeMap::new(),
            scope,
            shared_errors: Value::Null,
            last_error: Value::Null,
            sequence: 0,
        }
    }

    pub fn scope(&self) -> ErrorScope {
        self.scope
    }

    /// Add a module's initial state.
    ///
    /// In per-module scope the module gets an `errors` field starting at `null`.
    /// Registration has already rejected modules that declare that field.
    pub(crate) fn insert_module(&mut self, name: &'static str, mut initial: ModuleState) {
        if self.scope == ErrorScope::PerModule {
            initial.insert(ERRORS_FIELD.to_string(), Value::Null);
        }
        self.modules.insert(name, initial);
    }

    pub fn module(&self, name: &str) -> Option<&ModuleState> {
        self.modules.get(name)
    }

    /// Number of commits applied so far.
    pub fn sequence(&self) -> u64 {
        self.sequence
    }

    /// Commit a mutation owned by `module`. Returns the commit's sequence number.
    ///
    /// Returns `None` if the module is not part of the tree.
    pub(crate) fn apply(
        &mut self,
        module: &str,
        mutation: &MutationDescriptor,
        payload: Value,
    ) -> Option<u64> {
        let current = self.modules.get_mut(module)?;
        let mut next = current.clone();
        (mutation.reducer)(&mut next, payload);
        *current = next;
        Some(self.bump())
    }

    /// Commit the error mutation for a failure raised by `module`'s action.
    pub(crate) fn set_error(&mut self, module: &str, errors: Value) -> Option<u64> {
        match self.scope {
            ErrorScope::PerModule => {
                let state = self.modules.get_mut(module)?;
                state.insert(ERRORS_FIELD.to_string(), errors.clone());
            }
            ErrorScope::Shared => {
                if !self.modules.contains_key(module) {
                    return None;
                }
                self.shared_errors = errors.clone();
            }
        }
        self.last_error = errors;
        Some(self.bump())
    }

    /// The Error Slot that `module`'s actions write.
    pub fn errors(&self, module: &str) -> Option<Value> {
        match self.scope {
            ErrorScope::PerModule => self
                .modules
                .get(module)
                .map(|state| state.get(ERRORS_FIELD).cloned().unwrap_or(Value::Null)),
            ErrorScope::Shared => self.modules.contains_key(module).then(|| self.shared_errors.clone()),
        }
    }

    /// The payload of the most recently completed failure, in any module.
    pub fn last_error(&self) -> &Value {
        &self.last_error
    }

    /// The whole tree as JSON: one key per module, plus the root `errors` slot
    /// in shared scope.
    pub fn to_json(&self) -> Value {
        let mut root = Map::new();
        for (name, state) in &self.modules {
            root.insert((*name).to_string(), Value::Object(state.clone()));
        }
        if self.scope == ErrorScope::Shared {
            root.insert(ERRORS_FIELD.to_string(), self.shared_errors.clone());
        }
        Value::Object(root)
    }

    fn bump(&mut self) -> u64 {
        self.sequence += 1;
        self.sequence
    }
}
