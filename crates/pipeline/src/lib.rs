//! Core orchestration domain for Reqforge.
//!
//! This crate contains every domain concept used throughout the pipeline: the
//! stage contract, the stage registry with its dependency resolver, the
//! pipeline compiler, the execution engine, the per-job `RunContext`, the wire
//! message types, and the cross-cutting error types. Infrastructure crates
//! implement the port traits defined here; they never add domain rules.
//!
//! ## Architectural Layer
//!
//! **Business logic + port definitions.** This crate has no I/O dependencies.
//! It defines *what* is needed; infrastructure crates define *how* to supply it.
//!
//! ## Module Layout
//!
//! | Module | Contents |
//! |--------|----------|
//! | [`identifiers`] | Newtype domain identifiers (`StageName`, `StepId`, `JobId`) |
//! | [`types`] | Shared value types (`Timestamp`, `TokenUsage`, `GenerateOptions`) |
//! | [`errors`] | Pipeline assembly and step error types |
//! | [`context`] | The per-job mutable `RunContext` |
//! | [`job`] | Wire-level job message, result payload, and the `JobHandler` port |
//! | [`ports`] | Infrastructure port traits (`FileReader`, `LlmProvider`) |
//! | [`stage`] | The stage contract (`StageModule`, `PipelineStep`, `GraphBuilder`) |
//! | [`registry`] | Stage registration and dependency resolution |
//! | [`compile`] | Linear pipeline compilation |
//! | [`engine`] | The failure-tolerant execution engine |

pub mod compile;
pub mod context;
pub mod engine;
pub mod errors;
pub mod identifiers;
pub mod job;
pub mod ports;
pub mod registry;
pub mod stage;
pub mod types;

// Re-export everything at the crate root for ergonomic usage by downstream crates.
pub use compile::{compile, ExecutablePipeline};
pub use context::{ErrorRecord, RunContext};
pub use engine::run;
pub use errors::{PipelineError, StepError};
pub use identifiers::{JobId, StageName, StepId};
pub use job::{result_payload, JobHandler, JobMessage};
pub use ports::{FileReader, LlmError, LlmProvider};
pub use registry::{ExecutionOrder, StageRegistry};
pub use stage::{GraphBuilder, PipelineStep, StageModule};
pub use types::{GenerateOptions, Timestamp, TokenUsage};
