//! Login and order commands

use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use clap::Args;
use tracing::{info, warn};

use orderprobe_harness::config::{ACCOUNTS_KEY, VALID_ACCOUNTS_KEY};
use orderprobe_harness::{
    load_actors, Actor, ActorSource, FailurePolicy, HttpTransport, Orchestrator, RunMode,
    RunOptions, RunReport, SuiteConfig,
};

use crate::output::{self, OutputFormat};

/// Global settings shared by every command
pub struct Settings {
    pub config: PathBuf,
    pub env: Option<String>,
    pub base_url: Option<String>,
    pub format: OutputFormat,
    pub output: PathBuf,
}

/// Where the accounts come from and how long to wait
#[derive(Args, Debug, Clone)]
pub struct RunArgs {
    /// Account list key in the suite config
    #[arg(short, long)]
    pub accounts: Option<String>,

    /// Read accounts from a CSV file instead of the suite config
    #[arg(long)]
    pub csv: Option<PathBuf>,

    /// Per-request timeout in seconds (overrides `request_timeout_secs`)
    #[arg(long)]
    pub request_timeout_secs: Option<u64>,

    /// Timeout for the whole run in seconds (overrides `run_timeout_secs`)
    #[arg(long)]
    pub timeout_secs: Option<u64>,
}

pub async fn login(settings: &Settings, args: RunArgs) -> Result<bool> {
    let options = RunOptions {
        mode: RunMode::LoginOnly,
        ..Default::default()
    };
    execute(settings, args, ACCOUNTS_KEY, options).await
}

pub async fn order(
    settings: &Settings,
    args: RunArgs,
    fail_fast: bool,
    max_in_flight: Option<usize>,
) -> Result<bool> {
    let options = RunOptions {
        mode: RunMode::Order,
        policy: if fail_fast {
            FailurePolicy::FailFast
        } else {
            FailurePolicy::Isolated
        },
        max_in_flight,
        ..Default::default()
    };
    execute(settings, args, VALID_ACCOUNTS_KEY, options).await
}

async fn execute(
    settings: &Settings,
    args: RunArgs,
    default_key: &str,
    mut options: RunOptions,
) -> Result<bool> {
    let config = SuiteConfig::load(&settings.config)?
        .with_overrides(settings.env.as_deref(), settings.base_url.as_deref());
    let base_url = config.base_url()?.to_string();

    let actors = resolve_actors(&config, &args, default_key)?;
    if actors.is_empty() {
        warn!("No accounts configured");
    }

    let request_timeout = args
        .request_timeout_secs
        .map(Duration::from_secs)
        .unwrap_or_else(|| config.request_timeout());
    let transport = HttpTransport::new(&base_url, request_timeout)
        .with_context(|| format!("cannot build HTTP client for {}", base_url))?;

    options.deadline = args
        .timeout_secs
        .map(Duration::from_secs)
        .or_else(|| config.run_timeout());
    options.expectations = config.expectations();
    let mode = options.mode;

    info!("Target {} ({})", base_url, config.env);

    let orchestrator = Orchestrator::new(Arc::new(transport), options);
    let started_at = chrono::Utc::now();
    let start = Instant::now();
    let outcomes = orchestrator.run_until(&actors, interrupted()).await;

    let report = RunReport::new(
        mode,
        &config.env,
        &base_url,
        started_at,
        start.elapsed().as_millis() as u64,
        outcomes,
    );
    report.write(&settings.output)?;
    output::print_report(&report, settings.format);

    Ok(report.all_passed())
}

fn resolve_actors(config: &SuiteConfig, args: &RunArgs, default_key: &str) -> Result<Vec<Actor>> {
    let actors = match &args.csv {
        Some(path) => load_actors(&ActorSource::Csv { path: path.clone() })?,
        None => {
            let key = args.accounts.as_deref().unwrap_or(default_key);
            config
                .actors(key)
                .with_context(|| format!("cannot load accounts '{}'", key))?
        }
    };
    Ok(actors)
}

/// Resolves on Ctrl-C
async fn interrupted() {
    if tokio::signal::ctrl_c().await.is_err() {
        std::future::pending::<()>().await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    const CONFIG: &str = r#"
env: dev
base_url:
  dev: http://127.0.0.1:1
accounts:
  - userName: admin
    password: secret
valid_accounts:
  - userName: u1
    password: p1
  - userName: u2
    password: p2
    order_index: 1
"#;

    fn args() -> RunArgs {
        RunArgs {
            accounts: None,
            csv: None,
            request_timeout_secs: None,
            timeout_secs: None,
        }
    }

    #[test]
    fn test_default_key_per_command() {
        let config = SuiteConfig::from_yaml(CONFIG).unwrap();
        assert_eq!(resolve_actors(&config, &args(), ACCOUNTS_KEY).unwrap().len(), 1);
        assert_eq!(resolve_actors(&config, &args(), VALID_ACCOUNTS_KEY).unwrap().len(), 2);
    }

    #[test]
    fn test_explicit_key_and_csv() {
        let config = SuiteConfig::from_yaml(CONFIG).unwrap();

        let explicit = RunArgs {
            accounts: Some("accounts".to_string()),
            ..args()
        };
        let actors = resolve_actors(&config, &explicit, VALID_ACCOUNTS_KEY).unwrap();
        assert_eq!(actors[0].user_name, "admin");

        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "userName,password").unwrap();
        writeln!(file, "csvuser,pw").unwrap();
        let from_csv = RunArgs {
            csv: Some(file.path().to_path_buf()),
            ..args()
        };
        let actors = resolve_actors(&config, &from_csv, VALID_ACCOUNTS_KEY).unwrap();
        assert_eq!(actors[0].user_name, "csvuser");
    }

    #[tokio::test]
    async fn test_unknown_env_is_fatal() {
        let dir = tempfile::tempdir().unwrap();
        let config_path = dir.path().join("config.yaml");
        std::fs::write(&config_path, CONFIG).unwrap();

        let settings = Settings {
            config: config_path,
            env: Some("prod".to_string()),
            base_url: None,
            format: OutputFormat::Json,
            output: dir.path().join("out"),
        };

        let err = order(&settings, args(), false, None).await.unwrap_err();
        assert!(err.to_string().contains("Base URL not found for env: prod"));
        assert!(!dir.path().join("out").exists());
    }
}
