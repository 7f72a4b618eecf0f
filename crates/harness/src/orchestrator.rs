//! Concurrency orchestrator - one task per actor, all launched, all joined
//!
//! Every actor runs its own transaction on a tokio task over the shared
//! [`Transport`]. A failing or panicking actor never aborts its siblings
//! unless [`FailurePolicy::FailFast`] is selected. When the run is stopped
//! early (deadline, shutdown signal, fail-fast) the unfinished actors are
//! reported as [`FailureKind::Cancelled`] and finished outcomes are kept.

use std::any::Any;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::{Duration, Instant};

use futures::FutureExt;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::{error, info, warn};

use crate::actors::Actor;
use crate::error::AggregateError;
use crate::outcome::{Failure, FailureKind, Outcome};
use crate::transaction::{check_login, run_transaction, Expectations};
use crate::transport::Transport;

/// Which transaction each actor runs
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum RunMode {
    /// Login then create an order
    #[default]
    Order,
    /// Login and verify the reply only
    LoginOnly,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum FailurePolicy {
    /// Run every actor to completion regardless of failures
    #[default]
    Isolated,
    /// Stop the run at the first failed outcome
    FailFast,
}

#[derive(Debug, Clone, Default)]
pub struct RunOptions {
    pub mode: RunMode,
    pub policy: FailurePolicy,

    /// Stop the whole run after this long
    pub deadline: Option<Duration>,

    /// Cap on concurrently running transactions (None = all at once)
    pub max_in_flight: Option<usize>,

    pub expectations: Expectations,
}

pub struct Orchestrator {
    transport: Arc<dyn Transport>,
    options: RunOptions,
}

impl Orchestrator {
    pub fn new(transport: Arc<dyn Transport>, options: RunOptions) -> Self {
        Self { transport, options }
    }

    pub fn options(&self) -> &RunOptions {
        &self.options
    }

    /// Run every actor and return one outcome per actor, `result[i]` for `actors[i]`
    pub async fn run_all(&self, actors: &[Actor]) -> Vec<Outcome> {
        self.run_until(actors, std::future::pending()).await
    }

    /// Like [`run_all`](Self::run_all), but an error when any outcome failed
    pub async fn run_all_checked(&self, actors: &[Actor]) -> Result<Vec<Outcome>, AggregateError> {
        let outcomes = self.run_all(actors).await;
        let failed = outcomes.iter().filter(|o| !o.succeeded).count();
        if failed > 0 {
            Err(AggregateError { failed, outcomes })
        } else {
            Ok(outcomes)
        }
    }

    /// Run every actor until all finish or `shutdown` resolves
    pub async fn run_until<F>(&self, actors: &[Actor], shutdown: F) -> Vec<Outcome>
    where
        F: Future<Output = ()>,
    {
        let start = Instant::now();
        let semaphore = self
            .options
            .max_in_flight
            .map(|limit| Arc::new(Semaphore::new(limit.max(1))));

        info!("Running {} transaction(s) concurrently...", actors.len());

        let mut tasks = JoinSet::new();
        for (index, actor) in actors.iter().cloned().enumerate() {
            let transport = Arc::clone(&self.transport);
            let expect = self.options.expectations.clone();
            let mode = self.options.mode;
            let semaphore = semaphore.clone();

            tasks.spawn(async move {
                let _permit = match semaphore {
                    Some(semaphore) => semaphore.acquire_owned().await.ok(),
                    None => None,
                };

                let started = Instant::now();
                let run = AssertUnwindSafe(run_one(mode, transport.as_ref(), &actor, &expect))
                    .catch_unwind()
                    .await;

                let outcome = match run {
                    Ok(outcome) => outcome,
                    Err(panic) => {
                        let failure = Failure::new(
                            FailureKind::InternalError,
                            format!("transaction panicked: {}", panic_message(panic.as_ref())),
                        );
                        Outcome::failed(actor, failure, None, started.elapsed().as_millis() as u64)
                    }
                };
                (index, outcome)
            });
        }

        let mut slots: Vec<Option<Outcome>> = vec![None; actors.len()];
        let mut stopped: Option<String> = None;

        let deadline = self.options.deadline;
        let expiry = async move {
            match deadline {
                Some(limit) => tokio::time::sleep(limit).await,
                None => std::future::pending::<()>().await,
            }
        };
        tokio::pin!(expiry);
        tokio::pin!(shutdown);

        loop {
            tokio::select! {
                next = tasks.join_next() => match next {
                    None => break,
                    Some(Ok((index, outcome))) => {
                        log_outcome(&outcome);
                        let failed = !outcome.succeeded;
                        slots[index] = Some(outcome);
                        if failed && self.options.policy == FailurePolicy::FailFast {
                            stopped = Some("run stopped after first failure".to_string());
                            break;
                        }
                    }
                    Some(Err(e)) => {
                        error!("Transaction task ended abnormally: {}", e);
                    }
                },
                _ = &mut expiry => {
                    let limit = deadline.unwrap_or_default();
                    warn!("Run deadline of {:?} expired", limit);
                    stopped = Some(format!("run deadline of {:?} expired", limit));
                    break;
                }
                _ = &mut shutdown => {
                    warn!("Run interrupted");
                    stopped = Some("run interrupted".to_string());
                    break;
                }
            }
        }

        tasks.abort_all();

        let outcomes: Vec<Outcome> = slots
            .into_iter()
            .zip(actors)
            .map(|(slot, actor)| {
                slot.unwrap_or_else(|| {
                    let failure = match &stopped {
                        Some(reason) => Failure::new(FailureKind::Cancelled, reason.clone()),
                        None => Failure::new(
                            FailureKind::InternalError,
                            "transaction task produced no outcome",
                        ),
                    };
                    let outcome = Outcome::failed(actor.clone(), failure, None, 0);
                    log_outcome(&outcome);
                    outcome
                })
            })
            .collect();

        let passed = outcomes.iter().filter(|o| o.succeeded).count();
        info!(
            "Transactions: {} passed, {} failed ({} ms)",
            passed,
            outcomes.len() - passed,
            start.elapsed().as_millis()
        );

        outcomes
    }
}

async fn run_one(
    mode: RunMode,
    transport: &dyn Transport,
    actor: &Actor,
    expect: &Expectations,
) -> Outcome {
    match mode {
        RunMode::Order => run_transaction(transport, actor, expect).await,
        RunMode::LoginOnly => check_login(transport, actor, expect).await,
    }
}

fn log_outcome(outcome: &Outcome) {
    match &outcome.failure {
        None => match &outcome.order_id {
            Some(order_id) => info!(
                "✓ {} order {} ({} ms)",
                outcome.actor.user_name, order_id, outcome.duration_ms
            ),
            None => info!("✓ {} ({} ms)", outcome.actor.user_name, outcome.duration_ms),
        },
        Some(failure) => warn!("✗ {} - {}", outcome.actor.user_name, failure),
    }
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(message) = panic.downcast_ref::<&str>() {
        message.to_string()
    } else if let Some(message) = panic.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic payload".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    use async_trait::async_trait;
    use serde_json::{json, Value};

    use crate::transaction::{CREATE_ORDER_PATH, LOGIN_PATH};
    use crate::transport::testing::StubTransport;
    use crate::transport::{TransportError, TransportResponse};

    /// Order service stub that echoes the caller's identity into its replies
    fn echo_service() -> StubTransport {
        StubTransport::new()
            .route(LOGIN_PATH, |body, _| {
                let user = body["userName"].as_str().unwrap_or_default();
                match user {
                    "unreachable" => Err(TransportError::Connect {
                        path: LOGIN_PATH.to_string(),
                        reason: "connection refused".to_string(),
                    }),
                    "boom" => panic!("stub exploded"),
                    "rejected" => Ok(TransportResponse::json(
                        200,
                        json!({"code": 1, "message": "bad credentials", "data": {}}),
                    )),
                    _ => {
                        let password = body["password"].as_str().unwrap_or_default();
                        Ok(TransportResponse::json(
                            200,
                            json!({
                                "code": 0,
                                "message": "请求成功",
                                "data": {"loginKey": format!("key-{}-{}", user, password)}
                            }),
                        ))
                    }
                }
            })
            .route(CREATE_ORDER_PATH, |body, headers| {
                let key = headers.get("loginKey").cloned().unwrap_or_default();
                Ok(TransportResponse::json(
                    200,
                    json!({"data": {"reserveOrder": {
                        "innerOrderNo": format!("{}:{}", key, body["productsId"])
                    }}}),
                ))
            })
    }

    /// Delays logins per user name
    struct DelayedTransport {
        inner: StubTransport,
        delays: HashMap<String, Duration>,
    }

    #[async_trait]
    impl Transport for DelayedTransport {
        async fn post(
            &self,
            path: &str,
            body: &Value,
            headers: &[(&str, &str)],
        ) -> Result<TransportResponse, TransportError> {
            if let Some(delay) = body["userName"].as_str().and_then(|u| self.delays.get(u)) {
                tokio::time::sleep(*delay).await;
            }
            self.inner.post(path, body, headers).await
        }

        async fn get(
            &self,
            path: &str,
            headers: &[(&str, &str)],
        ) -> Result<TransportResponse, TransportError> {
            self.inner.get(path, headers).await
        }
    }

    fn actors(names: &[&str]) -> Vec<Actor> {
        names
            .iter()
            .enumerate()
            .map(|(i, name)| Actor::new(*name, format!("pw{}", i)).with_order_index(i as u32))
            .collect()
    }

    #[tokio::test]
    async fn test_one_outcome_per_actor_without_cross_assignment() {
        // Duplicate user names with distinct passwords and indices
        let actors = actors(&["u1", "u2", "u1", "u3", "u2", "u4"]);
        let orchestrator = Orchestrator::new(Arc::new(echo_service()), RunOptions::default());

        let outcomes = orchestrator.run_all(&actors).await;

        assert_eq!(outcomes.len(), actors.len());
        for (i, (actor, outcome)) in actors.iter().zip(&outcomes).enumerate() {
            assert_eq!(&outcome.actor, actor);
            assert!(outcome.succeeded, "{:?}", outcome.failure);
            let key = format!("key-{}-pw{}", actor.user_name, i);
            assert_eq!(outcome.login_key.as_deref(), Some(key.as_str()));
            assert_eq!(outcome.order_id, Some(format!("{}:{}", key, 97 + i)));
        }
    }

    #[tokio::test]
    async fn test_transport_failure_is_isolated() {
        let actors = actors(&["u1", "unreachable", "u2", "u3"]);
        let orchestrator = Orchestrator::new(Arc::new(echo_service()), RunOptions::default());

        let outcomes = orchestrator.run_all(&actors).await;

        assert_eq!(outcomes.len(), 4);
        let transport_failures: Vec<_> = outcomes
            .iter()
            .filter(|o| o.failure_kind() == Some(FailureKind::TransportError))
            .collect();
        assert_eq!(transport_failures.len(), 1);
        assert_eq!(transport_failures[0].actor.user_name, "unreachable");
        assert_eq!(outcomes.iter().filter(|o| o.succeeded).count(), 3);
    }

    #[tokio::test]
    async fn test_panic_becomes_internal_error() {
        let actors = actors(&["u1", "boom", "u2"]);
        let orchestrator = Orchestrator::new(Arc::new(echo_service()), RunOptions::default());

        let outcomes = orchestrator.run_all(&actors).await;

        assert!(outcomes[0].succeeded);
        assert_eq!(outcomes[1].failure_kind(), Some(FailureKind::InternalError));
        assert!(outcomes[1].failure.as_ref().unwrap().message.contains("stub exploded"));
        assert!(outcomes[2].succeeded);
    }

    #[tokio::test]
    async fn test_runs_concurrently() {
        let latency = Duration::from_millis(100);
        let transport = echo_service().with_latency(latency);
        let actors = actors(&["a", "b", "c", "d", "e", "f", "g", "h"]);
        let orchestrator = Orchestrator::new(Arc::new(transport), RunOptions::default());

        let start = Instant::now();
        let outcomes = orchestrator.run_all(&actors).await;
        let elapsed = start.elapsed();

        assert!(outcomes.iter().all(|o| o.succeeded));
        // Two calls per actor: one actor takes ~200ms, eight in sequence ~1.6s
        assert!(elapsed < Duration::from_millis(800), "took {:?}", elapsed);
    }

    #[tokio::test]
    async fn test_max_in_flight_serializes() {
        let transport = echo_service().with_latency(Duration::from_millis(50));
        let actors = actors(&["a", "b", "c", "d"]);
        let options = RunOptions {
            max_in_flight: Some(1),
            ..Default::default()
        };
        let orchestrator = Orchestrator::new(Arc::new(transport), options);

        let start = Instant::now();
        let outcomes = orchestrator.run_all(&actors).await;

        assert!(outcomes.iter().all(|o| o.succeeded));
        assert!(start.elapsed() >= Duration::from_millis(400));
    }

    #[tokio::test]
    async fn test_deadline_keeps_finished_outcomes() {
        let transport = DelayedTransport {
            inner: echo_service(),
            delays: HashMap::from([("hang".to_string(), Duration::from_secs(30))]),
        };
        let actors = actors(&["u1", "hang", "u2"]);
        let options = RunOptions {
            deadline: Some(Duration::from_millis(300)),
            ..Default::default()
        };
        let orchestrator = Orchestrator::new(Arc::new(transport), options);

        let outcomes = orchestrator.run_all(&actors).await;

        assert_eq!(outcomes.len(), 3);
        assert!(outcomes[0].succeeded);
        assert_eq!(outcomes[1].failure_kind(), Some(FailureKind::Cancelled));
        assert_eq!(outcomes[1].actor.user_name, "hang");
        assert!(outcomes[2].succeeded);
    }

    #[tokio::test]
    async fn test_shutdown_signal_cancels_unfinished() {
        let transport = DelayedTransport {
            inner: echo_service(),
            delays: HashMap::from([("slow".to_string(), Duration::from_secs(30))]),
        };
        let actors = actors(&["slow", "u1"]);
        let orchestrator = Orchestrator::new(Arc::new(transport), RunOptions::default());

        let outcomes = orchestrator
            .run_until(&actors, tokio::time::sleep(Duration::from_millis(200)))
            .await;

        assert_eq!(outcomes[0].failure_kind(), Some(FailureKind::Cancelled));
        assert!(outcomes[1].succeeded);
    }

    #[tokio::test]
    async fn test_fail_fast_cancels_the_rest() {
        let transport = DelayedTransport {
            inner: echo_service(),
            delays: HashMap::from([
                ("u1".to_string(), Duration::from_secs(30)),
                ("u2".to_string(), Duration::from_secs(30)),
            ]),
        };
        let actors = actors(&["u1", "rejected", "u2"]);
        let options = RunOptions {
            policy: FailurePolicy::FailFast,
            ..Default::default()
        };
        let orchestrator = Orchestrator::new(Arc::new(transport), options);

        let err = orchestrator.run_all_checked(&actors).await.unwrap_err();

        assert_eq!(err.outcomes.len(), 3);
        assert_eq!(err.failed, 3);
        assert_eq!(err.outcomes[1].failure_kind(), Some(FailureKind::UnexpectedStatus));
        assert_eq!(err.outcomes[0].failure_kind(), Some(FailureKind::Cancelled));
        assert_eq!(err.outcomes[2].failure_kind(), Some(FailureKind::Cancelled));
    }

    #[tokio::test]
    async fn test_checked_run_reports_all_outcomes() {
        let actors = actors(&["u1", "rejected", "u2"]);
        let orchestrator = Orchestrator::new(Arc::new(echo_service()), RunOptions::default());

        let err = orchestrator.run_all_checked(&actors).await.unwrap_err();

        assert_eq!(err.failed, 1);
        assert_eq!(err.failures().count(), 1);
        assert!(err.outcomes[0].succeeded && err.outcomes[2].succeeded);
    }

    #[tokio::test]
    async fn test_login_only_mode_skips_orders() {
        let stub = Arc::new(echo_service());
        let options = RunOptions {
            mode: RunMode::LoginOnly,
            ..Default::default()
        };
        let orchestrator = Orchestrator::new(stub.clone(), options);

        let outcomes = orchestrator.run_all(&actors(&["u1", "u2"])).await;

        assert!(outcomes.iter().all(|o| o.succeeded && o.order_id.is_none()));
        assert!(stub.calls_to(CREATE_ORDER_PATH).is_empty());
    }

    #[tokio::test]
    async fn test_empty_actor_list() {
        let orchestrator = Orchestrator::new(Arc::new(echo_service()), RunOptions::default());
        assert!(orchestrator.run_all(&[]).await.is_empty());
        assert!(orchestrator.run_all_checked(&[]).await.unwrap().is_empty());
    }
}
