use std::io::Read;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use clap::Parser;
use tokio::io::{
    AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt, BufReader, DuplexStream,
};
use tokio::runtime::Handle;
use tokio::signal;
use tokio::sync::oneshot;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use incident_ratelimit::config::{LogFormat, ServiceConfig};
use incident_ratelimit::ratelimit::{
    spawn_sweeper, Clock, PolicySet, RateLimitKey, RateLimitOptions, RateLimiter,
};

/// Buffer between the stdin reader thread and the replay loop.
const STDIN_PIPE_CAPACITY: usize = 64 * 1024;

/// Replay identifiers from stdin through the rate limiter and print one JSON
/// decision per line.
///
/// Each input line is either a bare identifier, checked against `--policy`,
/// or `<action> <source>`, checked against the policy named by the action.
#[derive(Debug, Parser)]
#[command(version, about)]
struct Args {
    /// YAML configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Policy applied to bare identifiers
    #[arg(short, long, default_value = "login")]
    policy: String,

    /// Ad-hoc limit overriding every policy
    #[arg(long, requires = "window_ms")]
    limit: Option<i64>,

    /// Ad-hoc window length in milliseconds overriding every policy
    #[arg(long, requires = "limit")]
    window_ms: Option<i64>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    let config = ServiceConfig::load(args.config.as_deref())
        .context("failed to load configuration")?;
    init_tracing(&config);

    info!("Starting incident portal rate limiter");
    info!("Version: {}", env!("CARGO_PKG_VERSION"));

    let policies = config.policy_set();
    let fixed = args
        .limit
        .zip(args.window_ms)
        .map(|(limit, window_ms)| RateLimitOptions::new(limit, window_ms));
    if fixed.is_none() {
        policies
            .require(&args.policy)
            .with_context(|| format!("default policy {:?} is not configured", args.policy))?;
    }
    info!(
        policies = policies.policies.len(),
        default_policy = %args.policy,
        sweep_enabled = config.sweep.enabled,
        "Configuration loaded"
    );

    let limiter = Arc::new(RateLimiter::new());

    let (stop_tx, stop_rx) = oneshot::channel::<()>();
    let sweeper = config.sweep.enabled.then(|| {
        spawn_sweeper(
            limiter.clone(),
            Duration::from_secs(config.sweep.interval_secs),
            async move {
                let _ = stop_rx.await;
            },
        )
    });

    tokio::select! {
        result = replay(
            &*limiter,
            &policies,
            &args.policy,
            fixed,
            BufReader::new(stdin_pipe()),
            tokio::io::stdout(),
        ) => result?,
        _ = shutdown_signal() => {}
    }

    let _ = stop_tx.send(());
    if let Some(sweeper) = sweeper {
        sweeper.await.context("sweeper task failed")?;
    }

    info!(tracked = limiter.len(), "Rate limiter stopped");
    Ok(())
}

/// Check every input line and write one JSON decision per checked line.
async fn replay<C, R, W>(
    limiter: &RateLimiter<C>,
    policies: &PolicySet,
    default_policy: &str,
    fixed: Option<RateLimitOptions>,
    input: R,
    mut output: W,
) -> anyhow::Result<()>
where
    C: Clock,
    R: AsyncBufRead + Unpin,
    W: AsyncWrite + Unpin,
{
    let mut lines = input.lines();

    while let Some(line) = lines.next_line().await? {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }

        let (identifier, policy) = match line.split_once(char::is_whitespace) {
            Some((action, source)) => {
                let key = RateLimitKey::new(action, source.trim());
                (key.to_string(), action)
            }
            None => (line.to_string(), default_policy),
        };

        let options = match fixed {
            Some(options) => options,
            None => match policies.get(policy) {
                Some(options) => *options,
                None => {
                    warn!(policy = policy, "Skipping line with unknown policy");
                    continue;
                }
            },
        };

        let decision = limiter.check(&identifier, &options);
        let mut out = serde_json::to_vec(&decision)?;
        out.push(b'\n');
        output.write_all(&out).await?;
    }

    output.flush().await?;
    Ok(())
}

/// Forward stdin through an in-memory pipe fed by a plain thread.
///
/// `tokio::io::stdin` parks a blocking-pool thread that the runtime waits for
/// on shutdown; a detached thread lets Ctrl+C exit while a read is pending.
fn stdin_pipe() -> DuplexStream {
    let (reader, mut writer) = tokio::io::duplex(STDIN_PIPE_CAPACITY);
    let handle = Handle::current();

    std::thread::spawn(move || {
        let mut stdin = std::io::stdin().lock();
        let mut buf = [0u8; 8192];
        loop {
            let n = match stdin.read(&mut buf) {
                Ok(0) => break,
                Ok(n) => n,
                Err(e) => {
                    warn!(error = %e, "Failed to read stdin");
                    break;
                }
            };
            if handle.block_on(writer.write_all(&buf[..n])).is_err() {
                break;
            }
        }
    });

    reader
}

fn init_tracing(config: &ServiceConfig) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&config.log_level));

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_thread_ids(true)
        .with_writer(std::io::stderr);

    match config.log_format {
        LogFormat::Json => builder.json().init(),
        LogFormat::Text => builder.init(),
    }
}

/// Wait for a shutdown signal (Ctrl+C or SIGTERM).
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            warn!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                warn!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C, initiating graceful shutdown");
        }
        _ = terminate => {
            info!("Received SIGTERM, initiating graceful shutdown");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use incident_ratelimit::ratelimit::{Decision, ManualClock};

    fn login_policies(limit: i64, window_ms: i64) -> PolicySet {
        let mut policies = PolicySet::empty();
        policies.insert("login", RateLimitOptions::new(limit, window_ms));
        policies
    }

    async fn run(
        limiter: &RateLimiter<ManualClock>,
        policies: &PolicySet,
        fixed: Option<RateLimitOptions>,
        input: &str,
    ) -> Vec<Decision> {
        let mut out = Vec::new();
        replay(limiter, policies, "login", fixed, input.as_bytes(), &mut out)
            .await
            .unwrap();

        String::from_utf8(out)
            .unwrap()
            .lines()
            .map(|line| serde_json::from_str(line).unwrap())
            .collect()
    }

    #[tokio::test]
    async fn test_replay_three_per_second() {
        let clock = ManualClock::new(0);
        let limiter = RateLimiter::with_clock(clock.clone());
        let policies = login_policies(3, 1_000);

        let decisions = run(&limiter, &policies, None, "ip1\nip1\nip1\nip1\n").await;

        let remaining: Vec<u64> = decisions.iter().map(|d| d.remaining).collect();
        let exceeded: Vec<bool> = decisions.iter().map(|d| d.is_exceeded).collect();
        assert_eq!(remaining, vec![2, 1, 0, 0]);
        assert_eq!(exceeded, vec![false, false, false, true]);

        clock.advance(1_001);
        let decisions = run(&limiter, &policies, None, "ip1\n").await;
        assert_eq!(decisions.len(), 1);
        assert!(!decisions[0].is_exceeded);
        assert_eq!(decisions[0].remaining, 2);
    }

    #[tokio::test]
    async fn test_replay_skips_blank_lines() {
        let limiter = RateLimiter::with_clock(ManualClock::new(0));
        let policies = login_policies(5, 1_000);

        let decisions = run(&limiter, &policies, None, "\n   \nip1\n\n").await;

        assert_eq!(decisions.len(), 1);
        assert_eq!(limiter.len(), 1);
    }

    #[tokio::test]
    async fn test_replay_builds_composite_identifier() {
        let limiter = RateLimiter::with_clock(ManualClock::new(0));
        let policies = login_policies(5, 1_000);

        let decisions = run(&limiter, &policies, None, "login   10.0.0.1\n").await;

        assert_eq!(decisions.len(), 1);
        assert_eq!(decisions[0].remaining, 4);
        assert_eq!(limiter.record("login:10.0.0.1").unwrap().count, 1);
    }

    #[tokio::test]
    async fn test_replay_skips_unknown_policy() {
        let limiter = RateLimiter::with_clock(ManualClock::new(0));
        let policies = login_policies(5, 1_000);

        let decisions = run(&limiter, &policies, None, "export 10.0.0.1\nip1\n").await;

        assert_eq!(decisions.len(), 1);
        assert_eq!(limiter.record("export:10.0.0.1"), None);
        assert!(limiter.record("ip1").is_some());
    }

    #[tokio::test]
    async fn test_replay_fixed_options_override_policies() {
        let limiter = RateLimiter::with_clock(ManualClock::new(0));
        let policies = login_policies(5, 1_000);
        let fixed = Some(RateLimitOptions::new(0, 1_000));

        let decisions = run(&limiter, &policies, fixed, "export a\nip1\n").await;

        assert_eq!(decisions.len(), 2);
        assert!(decisions.iter().all(|d| d.is_exceeded && d.remaining == 0));
        assert_eq!(limiter.record("export:a").unwrap().count, 1);
    }
}
