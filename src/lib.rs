//! nginx virtual-host manager library.
//!
//! Turns virtual-host records (domain, optional TLS material, ordered
//! path routes) into nginx configuration and activates it on the host:
//! write to `sites-available`, link into `sites-enabled`, validate the
//! whole tree with the proxy's own checker, reload the running process,
//! roll back on validation failure.

pub mod config;
pub mod deploy;
pub mod model;
pub mod render;
pub mod repository;
pub mod system;

pub use config::ManagerConfig;
pub use deploy::{DeployError, Deployer};
pub use model::{ExtraDirectives, HostId, Route, RouteId, VirtualHost};
pub use render::ConfigRenderer;
pub use repository::{JsonFileRepository, Repository};
pub use system::{CommandOutcome, ConfigChecker, NginxChecker, ServiceReloader, SystemdReloader};
