//! OctoFHIR resource server core: resource profiles, the validate / derive /
//! persist pipeline and the versioned resource lifecycle.
//!
//! ```no_run
//! use octofhir_server::bootstrap;
//! use serde_json::json;
//!
//! # async fn run() -> anyhow::Result<()> {
//! let manager = bootstrap::init(Some("octofhir.toml"))?;
//! let created = manager
//!     .create("Organization", json!({"resourceType": "Organization", "name": "ACME"}))
//!     .await?;
//! let id = created.id().unwrap_or_default().to_string();
//! manager
//!     .update("Organization", &id, json!({"name": "ACME Inc."}), Some("W/\"1\""))
//!     .await?;
//! # Ok(())
//! # }
//! ```

pub mod bootstrap;
pub mod conditional;
pub mod config;
pub mod constraints;
pub mod error;
pub mod lifecycle;
pub mod observability;
pub mod pipeline;
pub mod profiles;
pub mod registry;
pub mod summary;

pub use conditional::{FilterMatch, parse_criteria};
pub use config::{AppConfig, LoggingConfig, ProfileSettings, TerminologySettings};
pub use constraints::{ConstraintError, FieldConstraint, ProfileConstraint};
pub use error::{ErrorCategory, LifecycleError, validation_outcome};
pub use lifecycle::{LifecycleResult, OutcomeKind, ResourceManager, ResourceOutcome};
pub use observability::{apply_logging_level, init_tracing, init_tracing_with_level};
pub use pipeline::{Pipeline, Prepared, Validated};
pub use profiles::{ResourceProfile, ResourceRule};
pub use registry::ProfileRegistry;
pub use summary::SummaryMode;
