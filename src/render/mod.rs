//! Configuration rendering subsystem.
//!
//! # Data Flow
//! ```text
//! VirtualHost + ordered Vec<Route>
//!     → site.rs (assemble typed blocks per rendering rules)
//!     → document.rs (serialize with indentation)
//!     → String (one per-domain config file)
//! ```
//!
//! # Design Decisions
//! - Rendering is pure; the deployer owns all filesystem effects
//! - Typed blocks/directives instead of string concatenation

pub mod document;
pub mod site;

pub use site::ConfigRenderer;
