//! Identifiers for the dispatch, commit and read surfaces.
//!
//! The dashboard never addresses an action, mutation or getter by a runtime
//! string. Every operation has an enum identifier whose wire name matches the
//! name the backend and UI already use (`FETCH_ACCOUNTS`, `SET_ACCOUNT`,
//! `list_accounts`), and the container resolves identifiers through the
//! descriptor tables registered by each module.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use uuid::Uuid;

/// An operation the UI may dispatch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ActionId {
    FetchSsoLink,
    FetchExpiring,
    FetchTechnology,
    FetchAccounts,
    FetchCustomers,
}

impl ActionId {
    /// Stable identifier, also used on the command line.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::FetchSsoLink => "FETCH_SSO_LINK",
            Self::FetchExpiring => "FETCH_EXPIRING",
            Self::FetchTechnology => "FETCH_TECHNOLOGY",
            Self::FetchAccounts => "FETCH_ACCOUNTS",
            Self::FetchCustomers => "FETCH_CUSTOMERS",
        }
    }

    /// All variants for iteration.
    pub fn all() -> &'static [ActionId] {
        &[
            Self::FetchSsoLink,
            Self::FetchExpiring,
            Self::FetchTechnology,
            Self::FetchAccounts,
            Self::FetchCustomers,
        ]
    }

    /// Parse a wire name. Unknown names return `None`.
    pub fn parse(s: &str) -> Option<Self> {
        Self::all().iter().copied().find(|a| a.as_str() == s)
    }
}

/// A state transition committed by the container.
///
/// Mutations are never dispatched by the UI; they are the outcome of an
/// action settling.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum MutationId {
    SetSsoLink,
    SetLicense,
    SetTechnology,
    SetAccount,
    SetCustomers,
    /// Committed by the container on every failed action.
    SetError,
}

impl MutationId {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::SetSsoLink => "SET_SSO_LINK",
            Self::SetLicense => "SET_LICENSE",
            Self::SetTechnology => "SET_TECHNOLOGY",
            Self::SetAccount => "SET_ACCOUNT",
            Self::SetCustomers => "SET_CUSTOMERS",
            Self::SetError => "SET_ERROR",
        }
    }
}

/// A read projection exposed to the UI.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum GetterId {
    #[serde(rename = "ssoLink")]
    SsoLink,
    #[serde(rename = "expiring_license")]
    ExpiringLicense,
    #[serde(rename = "top_technology")]
    TopTechnology,
    #[serde(rename = "list_accounts")]
    ListAccounts,
    #[serde(rename = "top_customers")]
    TopCustomers,
}

impl GetterId {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::SsoLink => "ssoLink",
            Self::ExpiringLicense => "expiring_license",
            Self::TopTechnology => "top_technology",
            Self::ListAccounts => "list_accounts",
            Self::TopCustomers => "top_customers",
        }
    }

    pub fn all() -> &'static [GetterId] {
        &[
            Self::SsoLink,
            Self::ExpiringLicense,
            Self::TopTechnology,
            Self::ListAccounts,
            Self::TopCustomers,
        ]
    }

    pub fn parse(s: &str) -> Option<Self> {
        Self::all().iter().copied().find(|g| g.as_str() == s)
    }
}

macro_rules! display_as_str {
    ($($ty:ty),+) => {
        $(
            impl fmt::Display for $ty {
                fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                    f.write_str(self.as_str())
                }
            }
        )+
    };
}

display_as_str!(ActionId, MutationId, GetterId);

impl FromStr for ActionId {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s).ok_or_else(|| format!("unknown action `{s}`"))
    }
}

impl FromStr for GetterId {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s).ok_or_else(|| format!("unknown getter `{s}`"))
    }
}

/// Caller-supplied filter object sent as the request body of POST actions.
///
/// The backend interprets the keys (virtual accounts, date ranges); the
/// container forwards them untouched.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Filter(Map<String, Value>);

impl Filter {
    pub fn new() -> Self {
        Self(Map::new())
    }

    /// Add or replace a key.
    pub fn with(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.0.insert(key.into(), value.into());
        self
    }

    /// Build a filter from a JSON value. Only objects are filters.
    pub fn from_value(value: Value) -> Option<Self> {
        match value {
            Value::Object(map) => Some(Self(map)),
            _ => None,
        }
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn as_map(&self) -> &Map<String, Value> {
        &self.0
    }

    pub fn to_value(&self) -> Value {
        Value::Object(self.0.clone())
    }
}

/// Identifier attached to one dispatch for log correlation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct DispatchId(Uuid);

impl DispatchId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    pub fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl Default for DispatchId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for DispatchId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_action_wire_names_round_trip_through_parse() {
        for action in ActionId::all() {
            assert_eq!(ActionId::parse(action.as_str()), Some(*action));
        }
        assert_eq!(ActionId::parse("FETCH_NOTHING"), None);
    }

    #[test]
    fn test_serde_names_match_wire_names() {
        assert_eq!(
            serde_json::to_value(ActionId::FetchSsoLink).unwrap(),
            json!("FETCH_SSO_LINK")
        );
        assert_eq!(
            serde_json::to_value(MutationId::SetCustomers).unwrap(),
            json!("SET_CUSTOMERS")
        );
        assert_eq!(
            serde_json::to_value(GetterId::SsoLink).unwrap(),
            json!("ssoLink")
        );
        assert_eq!(
            serde_json::to_value(GetterId::ListAccounts).unwrap(),
            json!("list_accounts")
        );
    }

    #[test]
    fn test_from_str_reports_unknown_names() {
        let err = "fetch_accounts".parse::<ActionId>().unwrap_err();
        assert!(err.contains("fetch_accounts"));
        assert_eq!("top_customers".parse::<GetterId>(), Ok(GetterId::TopCustomers));
    }

    #[test]
    fn test_filter_only_accepts_objects() {
        assert!(Filter::from_value(json!([1, 2])).is_none());
        assert!(Filter::from_value(json!("year")).is_none());

        let filter = Filter::from_value(json!({"year": 2024})).unwrap();
        assert_eq!(filter.get("year"), Some(&json!(2024)));
        assert_eq!(filter, Filter::new().with("year", 2024));
    }

    #[test]
    fn test_filter_serializes_as_plain_object() {
        let filter = Filter::new().with("va", json!(["VA-1", "VA-2"]));
        assert_eq!(
            serde_json::to_value(&filter).unwrap(),
            json!({"va": ["VA-1", "VA-2"]})
        );
    }
}
