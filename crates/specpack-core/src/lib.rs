//! Spec Pack engine
//!
//! Async facade over the artifact, validation, composition and governance
//! crates, plus configuration and tracing setup.
//!
//! # Example
//!
//! ```rust,ignore
//! use specpack_core::{EngineConfig, SpecPackEngine, telemetry};
//! use specpack_governance::{ProjectId, ProvenanceInputs};
//!
//! let config = EngineConfig::from_toml_str(&std::fs::read_to_string("specpack.toml")?)?;
//! telemetry::init_tracing(&config.log_filter);
//! let engine = SpecPackEngine::new(config);
//!
//! let base = engine.import(base_bytes).await?;
//! let proposal = engine.import(proposal_bytes).await?;
//! let change = engine.propose(&base.pack, &proposal.pack)?;
//! println!("{}", change.diff.full_patch_text);
//!
//! let project = ProjectId::from("proj-1");
//! engine.lock_patch(&project, &base.pack, &change.patch, ProvenanceInputs::new()).await?;
//! ```

#![warn(missing_docs)]
#![warn(unreachable_pub)]

pub mod config;
pub mod telemetry;

mod engine;
mod error;

pub use config::{ConfigError, EngineConfig};
pub use engine::{ImportedPack, Proposal, SpecPackEngine};
pub use error::EngineError;

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
