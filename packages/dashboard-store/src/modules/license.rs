//! License analytics: expiring licenses, technology mix, accounts, customers.
//!
//! Every action here talks to an authenticated endpoint, so each one refreshes
//! the authorization header before calling. Payloads are stored as the backend
//! sends them.

use serde_json::{json, Value};

use crate::core::{ActionId, GetterId, MutationId};
use crate::http::Endpoint;
use crate::module::{
    field, state_from, ActionDescriptor, GetterDescriptor, Module, ModuleState,
    MutationDescriptor,
};

const EXPIRING_LICENSE: &str = "expiring_license";
const TOP_TECHNOLOGY: &str = "top_technology";
const ACCOUNTS: &str = "accounts";
const CUSTOMERS: &str = "customers";

fn set_license(state: &mut ModuleState, payload: Value) {
    state.insert(EXPIRING_LICENSE.to_string(), payload);
}

fn set_technology(state: &mut ModuleState, payload: Value) {
    state.insert(TOP_TECHNOLOGY.to_string(), payload);
}

fn set_account(state: &mut ModuleState, payload: Value) {
    state.insert(ACCOUNTS.to_string(), payload);
}

fn set_customers(state: &mut ModuleState, payload: Value) {
    state.insert(CUSTOMERS.to_string(), payload);
}

fn expiring_license(state: &ModuleState) -> Value {
    field(state, EXPIRING_LICENSE)
}

fn top_technology(state: &ModuleState) -> Value {
    field(state, TOP_TECHNOLOGY)
}

fn list_accounts(state: &ModuleState) -> Value {
    field(state, ACCOUNTS)
}

fn top_customers(state: &ModuleState) -> Value {
    field(state, CUSTOMERS)
}

const ACTIONS: [ActionDescriptor; 4] = [
    ActionDescriptor {
        id: ActionId::FetchExpiring,
        endpoint: Endpoint::post("ssoapi/expired_license"),
        refresh_headers: true,
        commits: MutationId::SetLicense,
    },
    ActionDescriptor {
        id: ActionId::FetchTechnology,
        endpoint: Endpoint::post("ssoapi/technology"),
        refresh_headers: true,
        commits: MutationId::SetTechnology,
    },
    ActionDescriptor {
        id: ActionId::FetchAccounts,
        endpoint: Endpoint::get("ssoapi/accounts"),
        refresh_headers: true,
        commits: MutationId::SetAccount,
    },
    ActionDescriptor {
        id: ActionId::FetchCustomers,
        endpoint: Endpoint::post("ssoapi/customer"),
        refresh_headers: true,
        commits: MutationId::SetCustomers,
    },
];

const MUTATIONS: [MutationDescriptor; 4] = [
    MutationDescriptor {
        id: MutationId::SetLicense,
        field: EXPIRING_LICENSE,
        reducer: set_license,
    },
    MutationDescriptor {
        id: MutationId::SetTechnology,
        field: TOP_TECHNOLOGY,
        reducer: set_technology,
    },
    MutationDescriptor {
        id: MutationId::SetAccount,
        field: ACCOUNTS,
        reducer: set_account,
    },
    MutationDescriptor {
        id: MutationId::SetCustomers,
        field: CUSTOMERS,
        reducer: set_customers,
    },
];

const GETTERS: [GetterDescriptor; 4] = [
    GetterDescriptor {
        id: GetterId::ExpiringLicense,
        field: EXPIRING_LICENSE,
        selector: expiring_license,
    },
    GetterDescriptor {
        id: GetterId::TopTechnology,
        field: TOP_TECHNOLOGY,
        selector: top_technology,
    },
    GetterDescriptor {
        id: GetterId::ListAccounts,
        field: ACCOUNTS,
        selector: list_accounts,
    },
    GetterDescriptor {
        id: GetterId::TopCustomers,
        field: CUSTOMERS,
        selector: top_customers,
    },
];

#[derive(Debug, Clone, Copy, Default)]
pub struct LicenseModule;

impl Module for LicenseModule {
    fn name(&self) -> &'static str {
        "license"
    }

    fn initial_state(&self) -> ModuleState {
        state_from([
            (EXPIRING_LICENSE, json!({})),
            (TOP_TECHNOLOGY, json!({})),
            (ACCOUNTS, json!({})),
            (CUSTOMERS, json!({})),
        ])
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
