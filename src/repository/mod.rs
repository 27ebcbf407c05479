//! Durable storage for virtual-host and route records.
//!
//! # Responsibilities
//! - CRUD for hosts and routes, with cascade delete of owned routes
//! - Uniqueness of host names and domains
//! - Stable route ordering per host (stored order drives rendering)
//!
//! # Design Decisions
//! - No ambient global handle: callers construct a repository and pass it
//!   into the deployer by parameter
//! - Every mutation validates first, then rewrites the whole store through
//!   a temp file + rename, so a failed write leaves no partial record
//! - Rendered filesystem artifacts are derived state and never read back

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::RwLock;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::model::{HostId, Route, RouteId, ValidationError, VirtualHost};

/// Errors from repository operations.
#[derive(Debug, Error)]
pub enum RepositoryError {
    #[error("record not found")]
    NotFound,

    #[error("a virtual host named {0:?} already exists")]
    DuplicateName(String),

    #[error("a virtual host for domain {0:?} already exists")]
    DuplicateDomain(String),

    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error("store I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("store is corrupted: {0}")]
    Corrupt(#[from] serde_json::Error),

    /// The in-process lock was poisoned by a panicking writer.
    #[error("store lock poisoned")]
    Poisoned,
}

/// Storage collaborator supplying and durably persisting records.
pub trait Repository: Send + Sync {
    fn get(&self, id: HostId) -> Result<Option<VirtualHost>, RepositoryError>;
    fn find_by_name(&self, name: &str) -> Result<Option<VirtualHost>, RepositoryError>;
    fn find_by_domain(&self, domain: &str) -> Result<Option<VirtualHost>, RepositoryError>;
    fn list(&self) -> Result<Vec<VirtualHost>, RepositoryError>;
    fn create_host(&self, host: VirtualHost) -> Result<(), RepositoryError>;
    fn update_host(&self, host: VirtualHost) -> Result<(), RepositoryError>;
    /// Delete a host and every route it owns, as one transaction.
    fn delete_host(&self, id: HostId) -> Result<(), RepositoryError>;

    /// Routes owned by a host, in stored (rendering) order.
    fn routes_for(&self, id: HostId) -> Result<Vec<Route>, RepositoryError>;
    fn get_route(&self, id: RouteId) -> Result<Option<Route>, RepositoryError>;
    fn create_route(&self, route: Route) -> Result<(), RepositoryError>;
    fn update_route(&self, route: Route) -> Result<(), RepositoryError>;
    fn delete_route(&self, id: RouteId) -> Result<(), RepositoryError>;
}

/// On-disk shape of the store: one JSON document.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct StoreData {
    hosts: Vec<VirtualHost>,
    /// All routes; per-host order is their order in this list.
    routes: Vec<Route>,
}

/// JSON-file-backed repository.
///
/// The whole store is held in memory behind an `RwLock` and rewritten on
/// every mutation. Mutations operate on a scratch copy: the file write
/// happens first, and the in-memory state is swapped only after it
/// succeeds.
pub struct JsonFileRepository {
    path: PathBuf,
    state: RwLock<StoreData>,
}

impl JsonFileRepository {
    /// Open the store at `path`, creating an empty one (and its parent
    /// directory) when missing.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self, RepositoryError> {
        let path = path.into();
        let state = if path.exists() {
            let content = fs::read_to_string(&path)?;
            serde_json::from_str(&content)?
        } else {
            if let Some(parent) = path.parent() {
                fs::create_dir_all(parent)?;
            }
            StoreData::default()
        };
        Ok(Self {
            path,
            state: RwLock::new(state),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn persist(&self, data: &StoreData) -> Result<(), RepositoryError> {
        let rendered = serde_json::to_vec_pretty(data)?;
        let tmp = self.path.with_extension("json.tmp");
        fs::write(&tmp, rendered)?;
        fs::rename(&tmp, &self.path)?;
        Ok(())
    }

    /// Run a mutation against a scratch copy, persist it, then commit it.
    fn mutate<F>(&self, op: F) -> Result<(), RepositoryError>
    where
        F: FnOnce(&mut StoreData) -> Result<(), RepositoryError>,
    {
        let mut state = self.state.write().map_err(|_| RepositoryError::Poisoned)?;
        let mut scratch = state.clone();
        op(&mut scratch)?;
        self.persist(&scratch)?;
        *state = scratch;
        Ok(())
    }

    fn read<T, F>(&self, op: F) -> Result<T, RepositoryError>
    where
        F: FnOnce(&StoreData) -> T,
    {
        let state = self.state.read().map_err(|_| RepositoryError::Poisoned)?;
        Ok(op(&state))
    }
}

fn check_host_uniqueness(data: &StoreData, host: &VirtualHost) -> Result<(), RepositoryError> {
    for existing in &data.hosts {
        if existing.id == host.id {
            continue;
        }
        if existing.name == host.name {
            return Err(RepositoryError::DuplicateName(host.name.clone()));
        }
        if existing.domain == host.domain {
            return Err(RepositoryError::DuplicateDomain(host.domain.clone()));
        }
    }
    Ok(())
}

impl Repository for JsonFileRepository {
    fn get(&self, id: HostId) -> Result<Option<VirtualHost>, RepositoryError> {
        self.read(|data| data.hosts.iter().find(|h| h.id == id).cloned())
    }

    fn find_by_name(&self, name: &str) -> Result<Option<VirtualHost>, RepositoryError> {
        self.read(|data| data.hosts.iter().find(|h| h.name == name).cloned())
    }

    fn find_by_domain(&self, domain: &str) -> Result<Option<VirtualHost>, RepositoryError> {
        self.read(|data| data.hosts.iter().find(|h| h.domain == domain).cloned())
    }

    fn list(&self) -> Result<Vec<VirtualHost>, RepositoryError> {
        self.read(|data| data.hosts.clone())
    }

    fn create_host(&self, host: VirtualHost) -> Result<(), RepositoryError> {
        host.validate()?;
        self.mutate(|data| {
            check_host_uniqueness(data, &host)?;
            data.hosts.push(host.clone());
            Ok(())
        })
    }

    fn update_host(&self, mut host: VirtualHost) -> Result<(), RepositoryError> {
        host.validate()?;
        host.updated_at = chrono::Utc::now();
        self.mutate(|data| {
            check_host_uniqueness(data, &host)?;
            let slot = data
                .hosts
                .iter_mut()
                .find(|h| h.id == host.id)
                .ok_or(RepositoryError::NotFound)?;
            *slot = host.clone();
            Ok(())
        })
    }

    fn delete_host(&self, id: HostId) -> Result<(), RepositoryError> {
        self.mutate(|data| {
            let before = data.hosts.len();
            data.hosts.retain(|h| h.id != id);
            if data.hosts.len() == before {
                return Err(RepositoryError::NotFound);
            }
            // Cascade: owned routes go in the same rewrite.
            data.routes.retain(|r| r.host_id != id);
            Ok(())
        })
    }

    fn routes_for(&self, id: HostId) -> Result<Vec<Route>, RepositoryError> {
        self.read(|data| {
            data.routes
                .iter()
                .filter(|r| r.host_id == id)
                .cloned()
                .collect()
        })
    }

    fn get_route(&self, id: RouteId) -> Result<Option<Route>, RepositoryError> {
        self.read(|data| data.routes.iter().find(|r| r.id == id).cloned())
    }

    fn create_route(&self, mut route: Route) -> Result<(), RepositoryError> {
        route.validate()?;
        route.path = crate::model::normalize_path(&route.path);
        self.mutate(|data| {
            if !data.hosts.iter().any(|h| h.id == route.host_id) {
                return Err(RepositoryError::NotFound);
            }
            data.routes.push(route.clone());
            Ok(())
        })
    }

    fn update_route(&self, mut route: Route) -> Result<(), RepositoryError> {
        route.validate()?;
        route.path = crate::model::normalize_path(&route.path);
        route.updated_at = chrono::Utc::now();
        self.mutate(|data| {
            let slot = data
                .routes
                .iter_mut()
                .find(|r| r.id == route.id)
                .ok_or(RepositoryError::NotFound)?;
            *slot = route.clone();
            Ok(())
        })
    }

    fn delete_route(&self, id: RouteId) -> Result<(), RepositoryError> {
        self.mutate(|data| {
            let before = data.routes.len();
            data.routes.retain(|r| r.id != id);
            if data.routes.len() == before {
                return Err(RepositoryError::NotFound);
            }
            Ok(())
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::ExtraDirectives;
    use tempfile::TempDir;

    fn open_repo(dir: &TempDir) -> JsonFileRepository {
        JsonFileRepository::open(dir.path().join("store.json")).unwrap()
    }

    fn sample_host(name: &str, domain: &str) -> VirtualHost {
        VirtualHost::new(name, domain, false, "", "").unwrap()
    }

    fn sample_route(host_id: HostId, path: &str) -> Route {
        Route::new(host_id, path, "backend.internal", true, ExtraDirectives::new()).unwrap()
    }

    #[test]
    fn test_create_and_get_host() {
        let dir = TempDir::new().unwrap();
        let repo = open_repo(&dir);
        let host = sample_host("api", "api.example.com");
        repo.create_host(host.clone()).unwrap();

        let fetched = repo.get(host.id).unwrap().unwrap();
        assert_eq!(fetched.name, "api");
        assert_eq!(repo.find_by_domain("api.example.com").unwrap().unwrap().id, host.id);
        assert!(repo.get(HostId::new()).unwrap().is_none());
    }

    #[test]
    fn test_duplicate_name_and_domain_rejected() {
        let dir = TempDir::new().unwrap();
        let repo = open_repo(&dir);
        repo.create_host(sample_host("api", "api.example.com")).unwrap();

        let err = repo
            .create_host(sample_host("api", "other.example.com"))
            .unwrap_err();
        assert!(matches!(err, RepositoryError::DuplicateName(_)));

        let err = repo
            .create_host(sample_host("other", "api.example.com"))
            .unwrap_err();
        assert!(matches!(err, RepositoryError::DuplicateDomain(_)));

        // Nothing partial was left behind.
        assert_eq!(repo.list().unwrap().len(), 1);
    }

    #[test]
    fn test_invalid_host_is_not_persisted() {
        let dir = TempDir::new().unwrap();
        let repo = open_repo(&dir);
        let mut host = sample_host("api", "api.example.com");
        host.tls_enabled = true; // no cert/key paths
        assert!(matches!(
            repo.create_host(host).unwrap_err(),
            RepositoryError::Validation(ValidationError::TlsPathsMissing)
        ));
        assert!(repo.list().unwrap().is_empty());
    }

    #[test]
    fn test_routes_keep_insertion_order() {
        let dir = TempDir::new().unwrap();
        let repo = open_repo(&dir);
        let host = sample_host("api", "api.example.com");
        repo.create_host(host.clone()).unwrap();

        repo.create_route(sample_route(host.id, "/v2")).unwrap();
        repo.create_route(sample_route(host.id, "/v1")).unwrap();

        let routes = repo.routes_for(host.id).unwrap();
        let paths: Vec<_> = routes.iter().map(|r| r.path.as_str()).collect();
        assert_eq!(paths, vec!["/v2", "/v1"]);
    }

    #[test]
    fn test_route_requires_existing_host() {
        let dir = TempDir::new().unwrap();
        let repo = open_repo(&dir);
        let err = repo.create_route(sample_route(HostId::new(), "/v1")).unwrap_err();
        assert!(matches!(err, RepositoryError::NotFound));
    }

    #[test]
    fn test_unnormalized_path_is_normalized_before_persist() {
        let dir = TempDir::new().unwrap();
        let repo = open_repo(&dir);
        let host = sample_host("api", "api.example.com");
        repo.create_host(host.clone()).unwrap();

        // Bypass Route::new normalization to simulate a stale record.
        let mut route = sample_route(host.id, "/v1");
        route.path = "v1".to_string();
        repo.create_route(route).unwrap();

        assert_eq!(repo.routes_for(host.id).unwrap()[0].path, "/v1");
    }

    #[test]
    fn test_delete_host_cascades_routes() {
        let dir = TempDir::new().unwrap();
        let repo = open_repo(&dir);
        let host = sample_host("api", "api.example.com");
        let other = sample_host("web", "web.example.com");
        repo.create_host(host.clone()).unwrap();
        repo.create_host(other.clone()).unwrap();
        repo.create_route(sample_route(host.id, "/v1")).unwrap();
        repo.create_route(sample_route(other.id, "/app")).unwrap();

        repo.delete_host(host.id).unwrap();

        assert!(repo.get(host.id).unwrap().is_none());
        assert!(repo.routes_for(host.id).unwrap().is_empty());
        // Unrelated host untouched.
        assert_eq!(repo.routes_for(other.id).unwrap().len(), 1);
    }

    #[test]
    fn test_store_survives_reopen() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("store.json");
        let host = sample_host("api", "api.example.com");
        {
            let repo = JsonFileRepository::open(&path).unwrap();
            repo.create_host(host.clone()).unwrap();
            repo.create_route(sample_route(host.id, "/v1")).unwrap();
        }

        let repo = JsonFileRepository::open(&path).unwrap();
        assert_eq!(repo.list().unwrap().len(), 1);
        assert_eq!(repo.routes_for(host.id).unwrap()[0].path, "/v1");
    }

    #[test]
    fn test_update_route_bumps_timestamp() {
        let dir = TempDir::new().unwrap();
        let repo = open_repo(&dir);
        let host = sample_host("api", "api.example.com");
        repo.create_host(host.clone()).unwrap();
        let route = sample_route(host.id, "/v1");
        repo.create_route(route.clone()).unwrap();

        let mut changed = route.clone();
        changed.target_domain = "new.internal".to_string();
        repo.update_route(changed).unwrap();

        let stored = repo.get_route(route.id).unwrap().unwrap();
        assert_eq!(stored.target_domain, "new.internal");
        assert!(stored.updated_at >= route.updated_at);
    }
}
