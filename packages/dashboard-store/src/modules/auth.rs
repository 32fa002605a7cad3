//! Single sign-on link.

use serde_json::{json, Value};

use crate::core::{ActionId, GetterId, MutationId};
use crate::http::Endpoint;
use crate::module::{
    field, state_from, ActionDescriptor, GetterDescriptor, Module, ModuleState,
    MutationDescriptor,
};

const SSO_LINK: &str = "ssoLink";

fn set_sso_link(state: &mut ModuleState, link: Value) {
    state.insert(SSO_LINK.to_string(), link);
}

fn sso_link(state: &ModuleState) -> Value {
    field(state, SSO_LINK)
}

const ACTIONS: [ActionDescriptor; 1] = [ActionDescriptor {
    id: ActionId::FetchSsoLink,
    endpoint: Endpoint::get("ssoapi/sso-link"),
    refresh_headers: false,
    commits: MutationId::SetSsoLink,
}];

const MUTATIONS: [MutationDescriptor; 1] = [MutationDescriptor {
    id: MutationId::SetSsoLink,
    field: SSO_LINK,
    reducer: set_sso_link,
}];

const GETTERS: [GetterDescriptor; 1] = [GetterDescriptor {
    id: GetterId::SsoLink,
    field: SSO_LINK,
    selector: sso_link,
}];

/// Holds the link the UI sends users to for signing in.
#[derive(Debug, Clone, Copy, Default)]
pub struct AuthModule;

impl Module for AuthModule {
    fn name(&self) -> &'static str {
        "auth"
    }

    fn initial_state(&self) -> ModuleState {
        state_from([(SSO_LINK, json!(""))])
    }

    fn actions(&self) -> &[ActionDescriptor] {
        &ACTIONS
    }

    fn mutations(&self) -> &[MutationDescriptor] {
        &MUTATIONS
    }

    fn getters(&self) -> &[GetterDescriptor] {
        &GETTERS
    }
}
