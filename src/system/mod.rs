//! External collaborators: the proxy's syntax checker and the service
//! manager's reload.
//!
//! # Responsibilities
//! - Run the configured argv (`nginx -t`, `systemctl reload nginx`)
//! - Capture exit status and the diagnostic stream
//!
//! # Design Decisions
//! - Both collaborators are object-safe traits so tests can inject
//!   programmable stand-ins
//! - A spawn failure is folded into a failing outcome; the caller always
//!   sees pass/fail plus diagnostic text, never a second error channel
//! - Timeouts are enforced by the deployer, not here

use async_trait::async_trait;
use tokio::process::Command;

/// Result of an external command: pass/fail plus its diagnostic stream.
///
/// The diagnostic is the child's stderr; stdout is substituted when stderr
/// is empty (`nginx -t` writes to stderr, some service managers do not).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandOutcome {
    pub success: bool,
    pub diagnostic: String,
}

impl CommandOutcome {
    pub fn ok() -> Self {
        Self {
            success: true,
            diagnostic: String::new(),
        }
    }

    pub fn failed(diagnostic: impl Into<String>) -> Self {
        Self {
            success: false,
            diagnostic: diagnostic.into(),
        }
    }
}

/// Validates the entire active configuration tree, not just one domain.
#[async_trait]
pub trait ConfigChecker: Send + Sync {
    async fn check(&self) -> CommandOutcome;
}

/// Asks the host's service manager to reload the running proxy process.
#[async_trait]
pub trait ServiceReloader: Send + Sync {
    async fn reload(&self) -> CommandOutcome;
}

/// Runs the configured syntax-check argv, `nginx -t` by default.
pub struct NginxChecker {
    argv: Vec<String>,
}

impl NginxChecker {
    pub fn new(argv: Vec<String>) -> Self {
        Self { argv }
    }
}

#[async_trait]
impl ConfigChecker for NginxChecker {
    async fn check(&self) -> CommandOutcome {
        run_argv(&self.argv).await
    }
}

/// Runs the configured reload argv, `systemctl reload nginx` by default.
pub struct SystemdReloader {
    argv: Vec<String>,
}

impl SystemdReloader {
    pub fn new(argv: Vec<String>) -> Self {
        Self { argv }
    }
}

#[async_trait]
impl ServiceReloader for SystemdReloader {
    async fn reload(&self) -> CommandOutcome {
        run_argv(&self.argv).await
    }
}

async fn run_argv(argv: &[String]) -> CommandOutcome {
    let Some((program, args)) = argv.split_first() else {
        return CommandOutcome::failed("empty command line");
    };

    tracing::debug!(command = %argv.join(" "), "running external command");

    match Command::new(program).args(args).output().await {
        Ok(output) => {
            let mut diagnostic = String::from_utf8_lossy(&output.stderr).into_owned();
            if diagnostic.trim().is_empty() {
                diagnostic = String::from_utf8_lossy(&output.stdout).into_owned();
            }
            CommandOutcome {
                success: output.status.success(),
                diagnostic,
            }
        }
        Err(e) => CommandOutcome::failed(format!("failed to run {program}: {e}")),
    }
}
