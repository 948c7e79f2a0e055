//! Document generation and signing pipeline.
//!
//! The core of the DocForge backend: substitutes caller values into a
//! template package, converts the populated document into a fixed-layout PDF
//! through a local or remote engine, optionally applies a certificate-backed
//! signature, and tracks per-document and per-batch outcomes under partial
//! failure.

pub mod archive;
pub mod config;
pub mod engine;
pub mod error;
pub mod intake;
pub mod janitor;
pub mod orchestrator;
pub mod renderer;
pub mod signing;
pub mod vault;

pub use config::Config;
pub use error::PipelineError;
pub use orchestrator::{
    BatchOrchestrator, BatchOutcome, BatchRequest, CertificateChoice, ItemOutcome,
};
