//! Domain records: virtual hosts and their routes.
//!
//! # Responsibilities
//! - Strongly-typed record ids
//! - Input validation before anything is persisted
//! - Path normalization (every route path starts with `/`)
//! - Deterministic handling of operator-supplied extra directives
//!
//! # Design Decisions
//! - Validation lives on the records themselves; the repository refuses to
//!   persist a record that fails `validate()`
//! - Extra directive values stay literal (no escaping) but deserialize from
//!   scalar JSON/TOML values only

use std::collections::BTreeMap;
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use thiserror::Error;
use uuid::Uuid;

/// Virtual-host id for strong typing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct HostId(pub Uuid);

impl HostId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for HostId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for HostId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// Route id for strong typing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RouteId(pub Uuid);

impl RouteId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for RouteId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for RouteId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// Errors raised by record validation, before any persistence or
/// filesystem action takes place.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("name is required")]
    EmptyName,

    #[error("domain is required")]
    EmptyDomain,

    #[error("SSL certificate and key paths are required when TLS is enabled")]
    TlsPathsMissing,

    #[error("route path is required")]
    EmptyPath,

    #[error("target domain is required")]
    EmptyTargetDomain,
}

/// A named, domain-bound reverse-proxy configuration unit.
///
/// The domain is unique across all hosts and keys the filesystem artifacts
/// (`sites-available/<domain>`, `sites-enabled/<domain>`, per-domain logs).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VirtualHost {
    pub id: HostId,

    /// Unique human-readable name.
    pub name: String,

    /// Unique hostname the primary listener binds to.
    pub domain: String,

    pub tls_enabled: bool,

    /// PEM certificate path, required when `tls_enabled`.
    #[serde(default)]
    pub cert_path: String,

    /// PEM key path, required when `tls_enabled`.
    #[serde(default)]
    pub key_path: String,

    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl VirtualHost {
    /// Build a new host record with a fresh id and timestamps.
    pub fn new(
        name: impl Into<String>,
        domain: impl Into<String>,
        tls_enabled: bool,
        cert_path: impl Into<String>,
        key_path: impl Into<String>,
    ) -> Result<Self, ValidationError> {
        let now = Utc::now();
        let host = Self {
            id: HostId::new(),
            name: name.into(),
            domain: domain.into(),
            tls_enabled,
            cert_path: cert_path.into(),
            key_path: key_path.into(),
            created_at: now,
            updated_at: now,
        };
        host.validate()?;
        Ok(host)
    }

    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.name.trim().is_empty() {
            return Err(ValidationError::EmptyName);
        }
        if self.domain.trim().is_empty() {
            return Err(ValidationError::EmptyDomain);
        }
        if self.tls_enabled && (self.cert_path.is_empty() || self.key_path.is_empty()) {
            return Err(ValidationError::TlsPathsMissing);
        }
        Ok(())
    }
}

/// A path-prefix rule within a virtual host, forwarding matching requests
/// to a target domain over HTTPS.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Route {
    pub id: RouteId,

    /// Owning virtual host. A route never outlives its host.
    pub host_id: HostId,

    /// Match prefix, always normalized to start with `/`.
    pub path: String,

    /// Upstream to forward matching requests to.
    pub target_domain: String,

    /// Strip the matched prefix from the request URI before forwarding.
    pub use_rewrite: bool,

    /// Operator-supplied directives rendered verbatim into the location
    /// block.
    #[serde(default)]
    pub extra_directives: ExtraDirectives,

    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Route {
    /// Build a new route record; the path is validated, then normalized.
    pub fn new(
        host_id: HostId,
        path: impl Into<String>,
        target_domain: impl Into<String>,
        use_rewrite: bool,
        extra_directives: ExtraDirectives,
    ) -> Result<Self, ValidationError> {
        let now = Utc::now();
        let mut route = Self {
            id: RouteId::new(),
            host_id,
            path: path.into(),
            target_domain: target_domain.into(),
            use_rewrite,
            extra_directives,
            created_at: now,
            updated_at: now,
        };
        route.validate()?;
        route.path = normalize_path(&route.path);
        Ok(route)
    }

    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.path.trim().is_empty() {
            return Err(ValidationError::EmptyPath);
        }
        if self.target_domain.trim().is_empty() {
            return Err(ValidationError::EmptyTargetDomain);
        }
        Ok(())
    }
}

/// Ensure a route path starts with `/`. Idempotent.
pub fn normalize_path(path: &str) -> String {
    if path.starts_with('/') {
        path.to_string()
    } else {
        format!("/{path}")
    }
}

/// Operator-supplied nginx directives for a route's location block.
///
/// Keys map to literal values emitted verbatim as `key value;` lines, with
/// no escaping. Iteration follows key order so rendering stays
/// deterministic. Values deserialize from strings, numbers, and booleans
/// (numbers and booleans are stored with their display form); arrays,
/// objects, and null are rejected.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct ExtraDirectives(BTreeMap<String, String>);

impl ExtraDirectives {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.0.insert(key.into(), value.into());
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }
}

/// Scalar directive value accepted at the deserialization boundary.
#[derive(Deserialize)]
#[serde(untagged)]
enum DirectiveValue {
    Bool(bool),
    Int(i64),
    Float(f64),
    Text(String),
}

impl DirectiveValue {
    fn into_literal(self) -> String {
        match self {
            DirectiveValue::Bool(b) => b.to_string(),
            DirectiveValue::Int(i) => i.to_string(),
            DirectiveValue::Float(f) => f.to_string(),
            DirectiveValue::Text(s) => s,
        }
    }
}

impl<'de> Deserialize<'de> for ExtraDirectives {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let raw = BTreeMap::<String, DirectiveValue>::deserialize(deserializer)?;
        Ok(Self(
            raw.into_iter().map(|(k, v)| (k, v.into_literal())).collect(),
        ))
    }
}
