//! orderprobe harness
//!
//! Runs a login-then-order transaction for every configured test account
//! against the admin order API, all accounts at once, and reports a
//! structured outcome per account.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                    Orchestrator (fan-out/in)                │
//! ├─────────────────────────────────────────────────────────────┤
//! │  run_all(actors) -> Vec<Outcome>                            │
//! │    ├── one tokio task per Actor                             │
//! │    ├── panic    -> InternalError                            │
//! │    └── deadline -> Cancelled                                │
//! ├─────────────────────────────────────────────────────────────┤
//! │  run_transaction(transport, actor)                          │
//! │    ├── POST /api/admin/admin-user/login                     │
//! │    └── POST /api/admin/reserveOrder/create  (loginKey hdr)  │
//! ├─────────────────────────────────────────────────────────────┤
//! │  Transport (reqwest::Client, shared pool, no session state) │
//! └─────────────────────────────────────────────────────────────┘
//! ```

pub mod actors;
pub mod config;
pub mod error;
pub mod orchestrator;
pub mod outcome;
pub mod payload;
pub mod report;
pub mod transaction;
pub mod transport;

pub use actors::{load_actors, Actor, ActorSource};
pub use config::SuiteConfig;
pub use error::{AggregateError, HarnessError, HarnessResult};
pub use orchestrator::{FailurePolicy, Orchestrator, RunMode, RunOptions};
pub use outcome::{Failure, FailureKind, Outcome};
pub use payload::OrderPayload;
pub use report::RunReport;
pub use transaction::{check_login, run_transaction, Expectations};
pub use transport::{HttpTransport, Transport, TransportError, TransportResponse};
