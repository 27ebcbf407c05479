//! Manager configuration subsystem.
//!
//! # Data Flow
//! ```text
//! config file (TOML)
//!     → loader.rs (parse & deserialize)
//!     → validation.rs (semantic checks)
//!     → ManagerConfig (validated, immutable)
//!     → passed by value into the repository and deployer
//! ```
//!
//! # Design Decisions
//! - Config is immutable once loaded
//! - All fields have defaults so a missing config file means stock
//!   nginx/systemd paths and commands
//! - Validation separates syntactic (serde) from semantic checks

pub mod loader;
pub mod schema;
pub mod validation;

pub use schema::CommandsConfig;
pub use schema::ManagerConfig;
pub use schema::PathsConfig;
pub use schema::StoreConfig;
pub use schema::TimeoutConfig;
