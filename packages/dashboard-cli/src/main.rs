//! Command-line driver for the dashboard state container.
//!
//! Builds the store against the configured backend, dispatches actions and
//! prints what the UI would read. Output on stdout is always JSON; logs go to
//! stderr.

mod config;

use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use dashboard_api::ApiClient;
use dashboard_store::{dashboard_store, ActionId, DispatchError, ErrorScope, Filter, Store};
use serde_json::{json, Value};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use crate::config::Config;

#[derive(Parser)]
#[command(name = "dashboard")]
#[command(about = "Fetch license dashboard data through the shared state container")]
struct Cli {
    /// Backend base URL (overrides DASHBOARD_API_URL)
    #[arg(long, global = true)]
    api_url: Option<String>,

    /// Error Slot scoping: `module` or `shared` (overrides DASHBOARD_ERROR_SCOPE)
    #[arg(long, global = true)]
    error_scope: Option<ErrorScope>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List registered actions with their endpoint, mutation and getter
    Actions,

    /// Dispatch one action and print its getter
    Fetch {
        /// Action identifier, e.g. FETCH_ACCOUNTS
        action: ActionId,

        /// Filter object sent as the request body, e.g. '{"year": 2024}'
        #[arg(long)]
        filter: Option<String>,
    },

    /// Dispatch several actions concurrently and print the whole state
    State {
        #[arg(required = true)]
        actions: Vec<ActionId>,
    },
}

#[tokio::main]
async fn main() -> Result<ExitCode> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();

    let mut config = Config::from_env().context("Failed to load configuration")?;
    if let Some(api_url) = cli.api_url {
        config.api_url = api_url;
    }
    if let Some(error_scope) = cli.error_scope {
        config.error_scope = error_scope;
    }

    let store = build_store(&config)?;

    match cli.command {
        Commands::Actions => {
            output(&list_actions(&store))?;
            Ok(ExitCode::SUCCESS)
        }
        Commands::Fetch { action, filter } => {
            let filter = filter.as_deref().map(parse_filter).transpose()?;
            fetch(&store, action, filter).await
        }
        Commands::State { actions } => state(&store, &actions).await,
    }
}

fn build_store(config: &Config) -> Result<Store> {
    let client = ApiClient::new(&config.api_url, config.timeout)
        .context("Failed to build API client")?
        .with_session(config.session.clone());

    tracing::info!(
        api_url = %client.base_url(),
        timeout_secs = config.timeout.as_secs(),
        "API client ready"
    );

    dashboard_store(client, config.error_scope).context("Failed to assemble dashboard store")
}

fn list_actions(store: &Store) -> Value {
    store
        .actions()
        .into_iter()
        .map(|entry| {
            json!({
                "action": entry.descriptor.id,
                "module": entry.module,
                "method": entry.descriptor.endpoint.method,
                "path": entry.descriptor.endpoint.path,
                "refresh_headers": entry.descriptor.refresh_headers,
                "mutation": entry.descriptor.commits,
                "getter": entry.getter,
            })
        })
        .collect()
}

fn parse_filter(raw: &str) -> Result<Filter> {
    let value: Value = serde_json::from_str(raw).context("--filter must be valid JSON")?;
    Filter::from_value(value).context("--filter must be a JSON object")
}

async fn fetch(store: &Store, action: ActionId, filter: Option<Filter>) -> Result<ExitCode> {
    match store.dispatch(action, filter).await {
        Ok(data) => {
            let value = match store.getter_for(action) {
                Some(getter) => store.getter(getter)?,
                None => data,
            };
            output(&value)?;
            Ok(ExitCode::SUCCESS)
        }
        Err(DispatchError::Transport(failure)) => {
            output(&failure.envelope())?;
            Ok(ExitCode::FAILURE)
        }
        Err(e) => Err(e.into()),
    }
}

async fn state(store: &Store, actions: &[ActionId]) -> Result<ExitCode> {
    let results =
        futures::future::join_all(actions.iter().map(|&action| store.dispatch(action, None)))
            .await;

    let mut failed = 0;
    for (action, result) in actions.iter().zip(&results) {
        if let Err(e) = result {
            failed += 1;
            tracing::warn!(action = %action, error = %e, "action rejected");
        }
    }

    output(&store.snapshot())?;
    Ok(if failed == 0 {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    })
}

fn output(value: &Value) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_fetch_parses_action_and_filter() {
        let cli = Cli::try_parse_from([
            "dashboard",
            "fetch",
            "FETCH_EXPIRING",
            "--filter",
            r#"{"year": 2024}"#,
            "--error-scope",
            "shared",
        ])
        .unwrap();

        assert_eq!(cli.error_scope, Some(ErrorScope::Shared));
        match cli.command {
            Commands::Fetch { action, filter } => {
                assert_eq!(action, ActionId::FetchExpiring);
                let filter = parse_filter(&filter.unwrap()).unwrap();
                assert_eq!(filter.get("year"), Some(&json!(2024)));
            }
            _ => panic!("expected fetch"),
        }
    }

    #[test]
    fn test_unknown_action_is_rejected() {
        assert!(Cli::try_parse_from(["dashboard", "fetch", "FETCH_EVERYTHING"]).is_err());
        assert!(Cli::try_parse_from(["dashboard", "state"]).is_err());
    }

    #[test]
    fn test_filter_must_be_an_object() {
        assert!(parse_filter("[1, 2]").is_err());
        assert!(parse_filter("{not json").is_err());
        assert!(parse_filter("{}").unwrap().is_empty());
    }

    #[test]
    fn test_actions_listing_names_wire_identifiers() {
        let client = ApiClient::new("http://localhost:5000/", std::time::Duration::from_secs(1)).unwrap();
        let store = dashboard_store(client, ErrorScope::PerModule).unwrap();

        let listing = list_actions(&store);
        assert_eq!(listing.as_array().unwrap().len(), 5);
        assert_eq!(
            listing[0],
            json!({
                "action": "FETCH_SSO_LINK",
                "module": "auth",
                "method": "GET",
                "path": "ssoapi/sso-link",
                "refresh_headers": false,
                "mutation": "SET_SSO_LINK",
                "getter": "ssoLink",
            })
        );
        assert_eq!(listing[3]["getter"], json!("list_accounts"));
    }
}
