//! Shared fixtures for the deployment pipeline tests.

use std::collections::VecDeque;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use tempfile::TempDir;

use nginx_manager::config::{PathsConfig, TimeoutConfig};
use nginx_manager::deploy::Deployer;
use nginx_manager::model::{ExtraDirectives, Route, VirtualHost};
use nginx_manager::repository::{JsonFileRepository, Repository};
use nginx_manager::system::{CommandOutcome, ConfigChecker, ServiceReloader};

/// Isolated nginx-style directory layout inside a tempdir.
pub struct NginxLayout {
    // Held so the tempdir outlives the test body.
    #[allow(dead_code)]
    dir: TempDir,
    pub paths: PathsConfig,
    pub store_path: PathBuf,
}

pub fn nginx_layout() -> NginxLayout {
    let dir = TempDir::new().unwrap();
    let paths = PathsConfig {
        sites_available: dir.path().join("sites-available"),
        sites_enabled: dir.path().join("sites-enabled"),
        log_dir: dir.path().join("log"),
    };
    // sites-enabled exists on any real nginx install; the deployer only
    // creates the available and log directories.
    std::fs::create_dir_all(&paths.sites_enabled).unwrap();
    NginxLayout {
        store_path: dir.path().join("store.json"),
        paths,
        dir,
    }
}

/// Sorted directory listing; a missing directory reads as empty.
pub fn snapshot(dir: &Path) -> Vec<String> {
    let mut names: Vec<String> = match std::fs::read_dir(dir) {
        Ok(entries) => entries
            .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
            .collect(),
        Err(_) => Vec::new(),
    };
    names.sort();
    names
}

/// Store seeded with one TLS host (`api.example.com`) owning one rewrite
/// route `/v1 -> backend.internal`.
pub fn seeded_repository(store_path: &Path) -> (Arc<JsonFileRepository>, VirtualHost) {
    let repo = Arc::new(JsonFileRepository::open(store_path).unwrap());
    let host = VirtualHost::new(
        "api",
        "api.example.com",
        true,
        "/etc/ssl/a.pem",
        "/etc/ssl/a.key",
    )
    .unwrap();
    repo.create_host(host.clone()).unwrap();
    let route = Route::new(
        host.id,
        "/v1",
        "backend.internal",
        true,
        ExtraDirectives::new(),
    )
    .unwrap();
    repo.create_route(route).unwrap();
    (repo, host)
}

pub fn build_deployer(
    layout: &NginxLayout,
    repo: Arc<JsonFileRepository>,
    checker: Arc<StubChecker>,
    reloader: Arc<StubReloader>,
) -> Deployer {
    Deployer::new(
        layout.paths.clone(),
        TimeoutConfig {
            check_secs: 1,
            reload_secs: 1,
        },
        repo,
        checker,
        reloader,
    )
}

/// Checker stand-in with a scripted outcome, optional delay, and
/// concurrency accounting.
pub struct StubChecker {
    outcome: CommandOutcome,
    delay: Duration,
    calls: AtomicUsize,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
}

impl StubChecker {
    fn with(outcome: CommandOutcome, delay: Duration) -> Arc<Self> {
        Arc::new(Self {
            outcome,
            delay,
            calls: AtomicUsize::new(0),
            in_flight: AtomicUsize::new(0),
            max_in_flight: AtomicUsize::new(0),
        })
    }

    pub fn passing() -> Arc<Self> {
        Self::with(CommandOutcome::ok(), Duration::ZERO)
    }

    pub fn failing(diagnostic: &str) -> Arc<Self> {
        Self::with(CommandOutcome::failed(diagnostic), Duration::ZERO)
    }

    /// Passing checker that takes longer than the configured step timeout.
    pub fn slow(delay: Duration) -> Arc<Self> {
        Self::with(CommandOutcome::ok(), delay)
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ConfigChecker for StubChecker {
    async fn check(&self) -> CommandOutcome {
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now, Ordering::SeqCst);
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        self.in_flight.fetch_sub(1, Ordering::SeqCst);
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.outcome.clone()
    }
}

/// Reloader stand-in: scripted outcomes consumed in order, then the
/// fallback (success).
pub struct StubReloader {
    scripted: Mutex<VecDeque<CommandOutcome>>,
    delay: Duration,
    calls: AtomicUsize,
}

impl StubReloader {
    fn with(scripted: Vec<CommandOutcome>, delay: Duration) -> Arc<Self> {
        Arc::new(Self {
            scripted: Mutex::new(scripted.into()),
            delay,
            calls: AtomicUsize::new(0),
        })
    }

    pub fn passing() -> Arc<Self> {
        Self::with(Vec::new(), Duration::ZERO)
    }

    pub fn failing(diagnostic: &str) -> Arc<Self> {
        // Every call fails until the script is empty, so push a generous
        // number for tests that reload repeatedly.
        Self::with(vec![CommandOutcome::failed(diagnostic); 8], Duration::ZERO)
    }

    /// First calls take the scripted outcomes, later calls succeed.
    pub fn sequence(outcomes: Vec<CommandOutcome>) -> Arc<Self> {
        Self::with(outcomes, Duration::ZERO)
    }

    pub fn slow(delay: Duration) -> Arc<Self> {
        Self::with(Vec::new(), delay)
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ServiceReloader for StubReloader {
    async fn reload(&self) -> CommandOutcome {
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.scripted
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(CommandOutcome::ok)
    }
}
