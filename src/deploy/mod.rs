//! Deployment orchestration.
//!
//! # Data Flow
//! ```text
//! deploy(host id)
//!     → repository (host + ordered routes)
//!     → renderer (config text)
//!     → sites-available/<domain> (overwrite)
//!     → sites-enabled/<domain> (symlink, only if absent)
//!     → checker (whole active tree)
//!         failure/timeout → rollback to the exact pre-deploy state
//!     → reloader (running process)
//!         failure/timeout → config stays staged; reload() retries
//! ```
//!
//! # Design Decisions
//! - One global mutex: the checker inspects the entire active tree and the
//!   reload affects the entire process, so deploys for different domains
//!   must queue, never race
//! - No cancellation once a deploy starts; it runs to completion, timeout,
//!   or failure
//! - The validation and reload failure paths are deliberately asymmetric,
//!   matching the activation model: an invalid tree must never stay
//!   enabled, while a validated-but-unloaded config is safe to keep

use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use thiserror::Error;
use tokio::fs;
use tokio::sync::Mutex;
use tokio::time::timeout;

use crate::config::{PathsConfig, TimeoutConfig};
use crate::model::HostId;
use crate::render::ConfigRenderer;
use crate::repository::{Repository, RepositoryError};
use crate::system::{CommandOutcome, ConfigChecker, ServiceReloader};

/// Pipeline step a timeout is attributed to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeployStep {
    Validate,
    Reload,
}

impl fmt::Display for DeployStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DeployStep::Validate => write!(f, "validate"),
            DeployStep::Reload => write!(f, "reload"),
        }
    }
}

/// Errors surfaced by the deployment pipeline. Every variant carries the
/// causing diagnostic; nothing is swallowed.
#[derive(Debug, Error)]
pub enum DeployError {
    #[error("virtual host not found")]
    NotFound,

    /// The syntax checker rejected the active tree. The filesystem has
    /// been rolled back to its pre-deploy state.
    #[error("configuration failed the syntax check: {0}")]
    SyntaxInvalid(String),

    /// The reload failed. The staged config is still on disk, ahead of
    /// the running process; retry with [`Deployer::reload`].
    #[error("reload failed: {0}")]
    ReloadFailed(String),

    #[error("{step} step timed out: {diagnostic}")]
    Timeout {
        step: DeployStep,
        diagnostic: String,
    },

    #[error("filesystem error: {0}")]
    Filesystem(#[from] std::io::Error),

    #[error(transparent)]
    Repository(#[from] RepositoryError),
}

/// Outcome of a [`Deployer::delete`]: the record and artifacts are gone,
/// and the best-effort reload result is reported alongside.
#[derive(Debug, Clone)]
pub struct DeleteReport {
    pub reload: CommandOutcome,
}

/// Orchestrates the render → write → link → validate → reload pipeline
/// for one host's active configuration set.
pub struct Deployer {
    paths: PathsConfig,
    timeouts: TimeoutConfig,
    renderer: ConfigRenderer,
    repository: Arc<dyn Repository>,
    checker: Arc<dyn ConfigChecker>,
    reloader: Arc<dyn ServiceReloader>,
    /// Serializes deploy/delete/reload; see module docs.
    gate: Mutex<()>,
}

impl Deployer {
    pub fn new(
        paths: PathsConfig,
        timeouts: TimeoutConfig,
        repository: Arc<dyn Repository>,
        checker: Arc<dyn ConfigChecker>,
        reloader: Arc<dyn ServiceReloader>,
    ) -> Self {
        let renderer = ConfigRenderer::new(paths.log_dir.clone());
        Self {
            paths,
            timeouts,
            renderer,
            repository,
            checker,
            reloader,
            gate: Mutex::new(()),
        }
    }

    fn available_path(&self, domain: &str) -> PathBuf {
        self.paths.sites_available.join(domain)
    }

    fn enabled_path(&self, domain: &str) -> PathBuf {
        self.paths.sites_enabled.join(domain)
    }

    /// Render a host's configuration without touching the filesystem.
    pub async fn render_preview(&self, id: HostId) -> Result<String, DeployError> {
        let host = self.repository.get(id)?.ok_or(DeployError::NotFound)?;
        let routes = self.repository.routes_for(id)?;
        Ok(self.renderer.render(&host, &routes))
    }

    /// Render, activate, validate, and reload a host's configuration.
    pub async fn deploy(&self, id: HostId) -> Result<(), DeployError> {
        let _gate = self.gate.lock().await;

        let host = self.repository.get(id)?.ok_or(DeployError::NotFound)?;
        let routes = self.repository.routes_for(id)?;

        tracing::info!(
            domain = %host.domain,
            routes = routes.len(),
            tls = host.tls_enabled,
            "deploying configuration"
        );
        let rendered = self.renderer.render(&host, &routes);

        fs::create_dir_all(&self.paths.sites_available).await?;
        fs::create_dir_all(self.renderer.log_dir()).await?;

        let available = self.available_path(&host.domain);
        let enabled = self.enabled_path(&host.domain);

        fs::write(&available, rendered.as_bytes()).await?;
        tracing::debug!(path = %available.display(), "configuration written");

        // Enable only if not already enabled; an existing link is left
        // untouched so rollback can restore the exact prior state.
        let created_link = if fs::symlink_metadata(&enabled).await.is_err() {
            fs::symlink(&available, &enabled).await?;
            tracing::debug!(path = %enabled.display(), "configuration enabled");
            true
        } else {
            false
        };

        let check = match timeout(self.timeouts.check(), self.checker.check()).await {
            Ok(outcome) => outcome,
            Err(_) => {
                self.rollback(&available, &enabled, created_link).await;
                return Err(DeployError::Timeout {
                    step: DeployStep::Validate,
                    diagnostic: format!(
                        "syntax check did not finish within {}s",
                        self.timeouts.check_secs
                    ),
                });
            }
        };
        if !check.success {
            tracing::warn!(
                domain = %host.domain,
                diagnostic = %check.diagnostic,
                "syntax check rejected configuration, rolling back"
            );
            self.rollback(&available, &enabled, created_link).await;
            return Err(DeployError::SyntaxInvalid(check.diagnostic));
        }

        let reload = match timeout(self.timeouts.reload(), self.reloader.reload()).await {
            Ok(outcome) => outcome,
            Err(_) => {
                return Err(DeployError::Timeout {
                    step: DeployStep::Reload,
                    diagnostic: format!(
                        "reload did not finish within {}s",
                        self.timeouts.reload_secs
                    ),
                });
            }
        };
        if !reload.success {
            return Err(DeployError::ReloadFailed(reload.diagnostic));
        }

        tracing::info!(domain = %host.domain, "configuration deployed");
        Ok(())
    }

    /// Remove a host's filesystem artifacts and its records (cascading its
    /// routes), then reload best-effort.
    pub async fn delete(&self, id: HostId) -> Result<DeleteReport, DeployError> {
        let _gate = self.gate.lock().await;

        let host = self.repository.get(id)?.ok_or(DeployError::NotFound)?;

        remove_if_present(&self.available_path(&host.domain)).await?;
        remove_if_present(&self.enabled_path(&host.domain)).await?;
        self.repository.delete_host(id)?;
        tracing::info!(domain = %host.domain, "virtual host deleted");

        // The record is already gone; a failed reload only delays the
        // running process catching up, so it is reported, not fatal.
        let reload = match timeout(self.timeouts.reload(), self.reloader.reload()).await {
            Ok(outcome) => outcome,
            Err(_) => CommandOutcome::failed(format!(
                "reload did not finish within {}s",
                self.timeouts.reload_secs
            )),
        };
        if !reload.success {
            tracing::warn!(
                domain = %host.domain,
                diagnostic = %reload.diagnostic,
                "reload after delete failed"
            );
        }

        Ok(DeleteReport { reload })
    }

    /// Re-trigger a reload without re-rendering, to recover from a
    /// [`DeployError::ReloadFailed`] deploy whose config is already staged.
    pub async fn reload(&self) -> Result<(), DeployError> {
        let _gate = self.gate.lock().await;

        let outcome = match timeout(self.timeouts.reload(), self.reloader.reload()).await {
            Ok(outcome) => outcome,
            Err(_) => {
                return Err(DeployError::Timeout {
                    step: DeployStep::Reload,
                    diagnostic: format!(
                        "reload did not finish within {}s",
                        self.timeouts.reload_secs
                    ),
                });
            }
        };
        if !outcome.success {
            return Err(DeployError::ReloadFailed(outcome.diagnostic));
        }
        Ok(())
    }

    /// Restore the exact pre-deploy state: drop the written file, and the
    /// enabling link only when this deploy created it.
    async fn rollback(&self, available: &Path, enabled: &Path, created_link: bool) {
        if let Err(e) = fs::remove_file(available).await {
            tracing::warn!(
                path = %available.display(),
                error = %e,
                "rollback could not remove config file"
            );
        }
        if created_link {
            if let Err(e) = fs::remove_file(enabled).await {
                tracing::warn!(
                    path = %enabled.display(),
                    error = %e,
                    "rollback could not remove enabling link"
                );
            }
        }
    }
}

async fn remove_if_present(path: &Path) -> Result<(), std::io::Error> {
    match fs::remove_file(path).await {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(e),
    }
}
