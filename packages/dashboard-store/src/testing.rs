//! Scripted HTTP collaborator for exercising actions without a backend.
//!
//! # Feature Flag
//!
//! Available under `cfg(test)` and with the `testing` feature:
//!
//! ```toml
//! [dev-dependencies]
//! dashboard-store = { workspace = true, features = ["testing"] }
//! ```
//!
//! # Canned Replies
//!
//! ```ignore
//! let http = Arc::new(ScriptedHttp::new());
//! http.respond("ssoapi/accounts", json!([{"va": "acme"}]));
//! http.reject("ssoapi/customer", Some(422), json!("invalid filter"));
//!
//! let store = dashboard_store(http.clone(), ErrorScope::PerModule)?;
//! store.dispatch(ActionId::FetchAccounts, None).await?;
//! ```
//!
//! # Controlling Completion Order
//!
//! A deferred reply holds the call open until the test settles it, so tests
//! decide which of several concurrent calls completes first:
//!
//! ```ignore
//! let first = http.defer("ssoapi/accounts");
//! let second = http.defer("ssoapi/accounts");
//!
//! let a = tokio::spawn({ let s = store.clone(); async move { s.dispatch(ActionId::FetchAccounts, None).await } });
//! http.wait_for_calls(1).await;
//! let b = tokio::spawn({ let s = store.clone(); async move { s.dispatch(ActionId::FetchAccounts, None).await } });
//! http.wait_for_calls(2).await;
//!
//! second.resolve(json!({"a": 2}));
//! b.await??;
//! first.resolve(json!({"a": 1}));
//! a.await??;
//! ```
//!
//! Replies for one path are consumed in the order calls arrive. A call with
//! nothing scripted fails with an empty 404, which is what the backend returns
//! for an unauthenticated request.

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Mutex, MutexGuard};

use async_trait::async_trait;
use serde_json::Value;
use tokio::sync::{oneshot, Notify};

use crate::core::Filter;
use crate::error::TransportError;
use crate::http::{ApiResponse, HttpCollaborator, Method};

type Reply = Result<ApiResponse, TransportError>;

enum Script {
    Ready(Reply),
    Deferred(oneshot::Receiver<Reply>),
    Panic(String),
}

/// One call received by [`ScriptedHttp`].
#[derive(Debug, Clone, PartialEq)]
pub struct RecordedCall {
    pub method: Method,
    pub path: String,
    /// JSON body for POST calls; `None` for GET and for POST without a filter.
    pub body: Option<Value>,
    /// How many times `set_header` had been called when this call arrived.
    pub header_refreshes: usize,
}

/// A reply held open until the test settles it.
///
/// Dropping it without settling fails the call with a network error.
pub struct Deferred {
    path: String,
    sender: oneshot::Sender<Reply>,
}

impl Deferred {
    /// Complete the call with a success payload.
    pub fn resolve(self, data: Value) {
        let _ = self.sender.send(Ok(ApiResponse::new(data)));
    }

    /// Complete the call with a backend failure.
    pub fn reject(self, status: Option<u16>, errors: Value) {
        let _ = self
            .sender
            .send(Err(TransportError::new(self.path, status, errors)));
    }

    /// Complete the call as if the connection failed.
    pub fn fail(self, message: &str) {
        let _ = self
            .sender
            .send(Err(TransportError::network(self.path, message)));
    }
}

/// An [`HttpCollaborator`] driven by per-path scripts.
#[derive(Default)]
pub struct ScriptedHttp {
    scripts: Mutex<HashMap<String, VecDeque<Script>>>,
    calls: Mutex<Vec<RecordedCall>>,
    header_refreshes: AtomicUsize,
    call_notify: Notify,
}

impl ScriptedHttp {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue a successful reply for the next call to `path`.
    pub fn respond(&self, path: &str, data: Value) -> &Self {
        self.push(path, Script::Ready(Ok(ApiResponse::new(data))))
    }

    /// Queue a failure for the next call to `path`.
    pub fn reject(&self, path: &str, status: Option<u16>, errors: Value) -> &Self {
        self.push(
            path,
            Script::Ready(Err(TransportError::new(path, status, errors))),
        )
    }

    /// Queue a reply for the next call to `path` that the test settles later.
    pub fn defer(&self, path: &str) -> Deferred {
        let (sender, receiver) = oneshot::channel();
        self.push(path, Script::Deferred(receiver));
        Deferred {
            path: path.to_string(),
            sender,
        }
    }

    /// Make the next call to `path` panic.
    pub fn panic_on(&self, path: &str, message: &str) -> &Self {
        self.push(path, Script::Panic(message.to_string()))
    }

    /// Calls received so far, in arrival order.
    pub fn calls(&self) -> Vec<RecordedCall> {
        lock(&self.calls).clone()
    }

    /// Number of `set_header` calls so far.
    pub fn header_refreshes(&self) -> usize {
        self.header_refreshes.load(Ordering::SeqCst)
    }

    /// Wait until at least `n` calls have arrived.
    pub async fn wait_for_calls(&self, n: usize) {
        loop {
            // Register before checking so a call landing in between still wakes us.
            let notified = self.call_notify.notified();
            if lock(&self.calls).len() >= n {
                return;
            }
            notified.await;
        }
    }

    fn push(&self, path: &str, script: Script) -> &Self {
        lock(&self.scripts)
            .entry(path.to_string())
            .or_default()
            .push_back(script);
        self
    }

    async fn handle(&self, method: Method, path: &str, body: Option<Value>) -> Reply {
        let script = lock(&self.scripts)
            .get_mut(path)
            .and_then(|queue| queue.pop_front());

        lock(&self.calls).push(RecordedCall {
            method,
            path: path.to_string(),
            body,
            header_refreshes: self.header_refreshes(),
        });
        self.call_notify.notify_waiters();

        match script {
            Some(Script::Ready(reply)) => reply,
            Some(Script::Deferred(receiver)) => receiver.await.unwrap_or_else(|_| {
                Err(TransportError::network(path, "deferred reply dropped"))
            }),
            Some(Script::Panic(message)) => panic!("{message}"),
            None => Err(TransportError::new(path, Some(404), Value::Null)),
        }
    }
}

#[async_trait]
impl HttpCollaborator for ScriptedHttp {
    async fn get(&self, path: &str) -> Result<ApiResponse, TransportError> {
        self.handle(Method::Get, path, None).await
    }

    async fn post(&self, path: &str, body: Option<&Filter>) -> Result<ApiResponse, TransportError> {
        self.handle(Method::Post, path, body.map(Filter::to_value))
            .await
    }

    fn set_header(&self) {
        self.header_refreshes.fetch_add(1, Ordering::SeqCst);
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    match mutex.lock() {
        Ok(guard) => guard,
        Err(poisoned) => poisoned.into_inner(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn test_replies_are_consumed_in_order() {
        let http = ScriptedHttp::new();
        http.respond("ssoapi/accounts", json!(1))
            .respond("ssoapi/accounts", json!(2));

        assert_eq!(http.get("ssoapi/accounts").await.unwrap().data, json!(1));
        assert_eq!(http.get("ssoapi/accounts").await.unwrap().data, json!(2));
        let exhausted = http.get("ssoapi/accounts").await.unwrap_err();
        assert_eq!(exhausted.status, Some(404));
        assert_eq!(exhausted.errors, Value::Null);
    }

    #[test]
    fn test_unscripted_call_is_an_empty_404() {
        let http = ScriptedHttp::new();
        let err = tokio_test::block_on(http.get("ssoapi/accounts")).unwrap_err();
        assert_eq!(err.status, Some(404));
        assert_eq!(err.errors, Value::Null);
        assert_eq!(http.calls().len(), 1);
    }

    #[tokio::test]
    async fn test_post_records_body() {
        let http = ScriptedHttp::new();
        http.respond("ssoapi/customer", json!([]));
        let filter = Filter::new().with("va", "acme");

        http.post("ssoapi/customer", Some(&filter)).await.unwrap();
        http.post("ssoapi/customer", None).await.unwrap_err();

        let calls = http.calls();
        assert_eq!(calls[0].body, Some(json!({"va": "acme"})));
        assert_eq!(calls[1].body, None);
        assert_eq!(calls[1].method, Method::Post);
    }

    #[tokio::test]
    async fn test_dropped_deferred_fails_the_call() {
        let http = ScriptedHttp::new();
        drop(http.defer("ssoapi/technology"));

        let err = http.post("ssoapi/technology", None).await.unwrap_err();
        assert_eq!(err.status, None);
        assert_eq!(err.errors, json!("deferred reply dropped"));
    }

    #[tokio::test]
    async fn test_header_refreshes_are_counted_per_call() {
        let http = ScriptedHttp::new();
        http.set_header();
        let _ = http.get("ssoapi/sso-link").await;

        assert_eq!(http.header_refreshes(), 1);
        assert_eq!(http.calls()[0].header_refreshes, 1);
    }
}
