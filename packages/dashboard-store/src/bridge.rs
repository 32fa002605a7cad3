//! The action-promise bridge.
//!
//! Runs one dispatched action against the HTTP collaborator and settles it:
//!
//! 1. Mark the action pending (released on every exit path)
//! 2. Refresh the authorization header if the action asks for it
//! 3. Issue exactly one GET or POST
//! 4. Commit the success mutation with the payload, or `SET_ERROR` with the
//!    failure's `errors` field
//! 5. Resolve with the payload, or reject with the failure unchanged
//!
//! The commit always happens before the caller observes the outcome, so a
//! getter read right after `dispatch` returns sees the new value.

use std::any::Any;
use std::panic::AssertUnwindSafe;

use futures::FutureExt;
use serde_json::Value;
use tracing::{debug, error, warn};

use crate::core::{DispatchId, Filter};
use crate::error::{DispatchError, TransportError};
use crate::http::{ApiResponse, Method};
use crate::module::RegisteredAction;
use crate::store::{ActionPhase, Store};

pub(crate) async fn run(
    store: &Store,
    action: RegisteredAction,
    filter: Option<Filter>,
) -> Result<Value, DispatchError> {
    let id = action.descriptor.id;
    let endpoint = action.descriptor.endpoint;
    let dispatch_id = DispatchId::new();

    let _inflight = store.inflight().begin(id);
    debug!(
        %dispatch_id,
        action = %id,
        %endpoint,
        phase = %ActionPhase::Pending,
        "action dispatched"
    );

    let outcome = match AssertUnwindSafe(call(store, &action, filter.as_ref()))
        .catch_unwind()
        .await
    {
        Ok(outcome) => outcome,
        Err(panic_info) => {
            let panic_msg = panic_message(panic_info.as_ref());
            error!(
                %dispatch_id,
                action = %id,
                panic = %panic_msg,
                "http collaborator panicked"
            );
            Err(TransportError::network(
                endpoint.path,
                format!("http collaborator panicked: {panic_msg}"),
            ))
        }
    };

    match outcome {
        Ok(response) => {
            store.commit(action.module, &action.success, response.data.clone());
            debug!(
                %dispatch_id,
                action = %id,
                mutation = %action.success.id,
                phase = %ActionPhase::Fulfilled,
                "action settled"
            );
            Ok(response.data)
        }
        Err(failure) => {
            store.commit_error(action.module, failure.errors.clone());
            warn!(
                %dispatch_id,
                action = %id,
                status = ?failure.status,
                error = %failure,
                phase = %ActionPhase::Rejected,
                "action settled"
            );
            Err(DispatchError::Transport(failure))
        }
    }
}

async fn call(
    store: &Store,
    action: &RegisteredAction,
    filter: Option<&Filter>,
) -> Result<ApiResponse, TransportError> {
    let http = store.http();
    let endpoint = action.descriptor.endpoint;

    if action.descriptor.refresh_headers {
        http.set_header();
    }

    match endpoint.method {
        Method::Get => {
            if let Some(filter) = filter {
                debug!(
                    action = %action.descriptor.id,
                    filter = %filter.to_value(),
                    "filter ignored for GET action"
                );
            }
            http.get(endpoint.path).await
        }
        Method::Post => http.post(endpoint.path, filter).await,
    }
}

fn panic_message(panic_info: &(dyn Any + Send)) -> String {
    if let Some(s) = panic_info.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = panic_info.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}
