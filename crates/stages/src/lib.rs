//! Reqforge analysis stage implementations.
//!
//! This crate provides the three default stages — framework detection,
//! requirement synthesis, and project-structure templating — plus the
//! [`AnalysisRunner`] that assembles them into a pipeline and drives one job
//! end-to-end.
//!
//! ## Architectural Layer
//!
//! **Orchestration layer.** Stages sequence calls between the domain types in
//! the [`pipeline`] crate and the infrastructure ports ([`pipeline::FileReader`],
//! [`pipeline::LlmProvider`]). They contain no transport details of their own.
//!
//! Every stage follows the same failure discipline: it checks for the inputs
//! it needs and fails its own step when they are absent, leaving the context
//! intact for whatever can still run after it.

pub mod detector;
pub mod requirements;
pub mod runner;
pub mod structure;

pub use detector::FrameworkDetector;
pub use requirements::RequirementGenerator;
pub use runner::{default_registry, AnalysisRunner};
pub use structure::ProjectStructure;
