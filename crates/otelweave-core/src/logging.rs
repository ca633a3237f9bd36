//! Tracing subscriber initialization, shared by both CLI sub-commands.
//!
//! The interceptor runs as hundreds of short-lived processes under the build tool's own
//! scheduler, so logs go to stderr with no color/ANSI codes by default (the build tool
//! captures and re-emits stderr on failure per spec.md §7) and the default level is `warn`
//! unless `OTELWEAVE_LOG` says otherwise.
use tracing_subscriber::EnvFilter;

const ENV_VAR: &str = "OTELWEAVE_LOG";

/// Installs a global `tracing` subscriber. Safe to call more than once per process; later
/// calls are no-ops (`tracing_subscriber::fmt().try_init()` returns an error we ignore).
pub fn init() {
    let filter = EnvFilter::try_from_env(ENV_VAR).unwrap_or_else(|_| EnvFilter::new("warn"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_writer(std::io::stderr)
        .try_init();
}
