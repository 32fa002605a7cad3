//! The dashboard's two modules.
//!
//! | Module    | Action           | Call                         | Commits          | Getter             |
//! |-----------|------------------|------------------------------|------------------|--------------------|
//! | `auth`    | FETCH_SSO_LINK   | GET  `ssoapi/sso-link`       | SET_SSO_LINK     | `ssoLink`          |
//! | `license` | FETCH_EXPIRING   | POST `ssoapi/expired_license`| SET_LICENSE      | `expiring_license` |
//! | `license` | FETCH_TECHNOLOGY | POST `ssoapi/technology`     | SET_TECHNOLOGY   | `top_technology`   |
//! | `license` | FETCH_ACCOUNTS   | GET  `ssoapi/accounts`       | SET_ACCOUNT      | `list_accounts`    |
//! | `license` | FETCH_CUSTOMERS  | POST `ssoapi/customer`       | SET_CUSTOMERS    | `top_customers`    |
//!
//! Only license actions refresh the authorization header before calling.

mod auth;
mod license;

pub use auth::AuthModule;
pub use license::LicenseModule;

use crate::error::StoreError;
use crate::http::HttpCollaborator;
use crate::state::ErrorScope;
use crate::store::{Store, StoreBuilder};

/// Build the dashboard container with both modules registered.
pub fn dashboard_store(
    http: impl HttpCollaborator,
    error_scope: ErrorScope,
) -> Result<Store, StoreError> {
    Ok(StoreBuilder::new(http)
        .error_scope(error_scope)
        .try_with_module(AuthModule)?
        .try_with_module(LicenseModule)?
        .build())
}
