//! Services module - the business logic of the generation pipeline.
//!
//! Everything here is framework-agnostic: no CLI parsing, no ambient state,
//! only explicit parameters and an immutable configuration threaded through
//! each call.
//!
//! # Components
//!
//! - [`PdfGenerator`]: the batch orchestrator. Discovers input documents,
//!   schedules conversions across a bounded worker pool, reassembles
//!   completions into discovery order, and triggers the index rebuild.
//!
//! - [`MetadataExtractor`]: derives structural statistics and a content
//!   summary from a document, independent of rendering and scheduling.
//!
//! - [`Renderer`] / [`PandocRenderer`]: the external renderer collaborator
//!   behind a one-method trait, so the orchestrator's concurrency and
//!   aggregation logic can be tested against a recording fake.
//!
//! - [`StylesheetSource`] / [`CssThemeRenderer`]: per-theme stylesheet
//!   generation, with atomic writes for the shared cache files.
//!
//! - [`IndexBuilder`]: folds the persisted metadata store into one aggregate
//!   report.
//!
//! - [`Mailer`] / [`PopMailer`]: the delivery collaborator behind a
//!   one-method trait, shelling out to the Charm `pop` CLI.
//!
//! # Design Philosophy
//!
//! - **Stateless**: all operations take explicit parameters; no hidden state
//! - **Isolated failures**: one document's conversion failure is captured in
//!   its own result and never interrupts sibling jobs
//! - **Deterministic output**: batch reports preserve discovery order and the
//!   index is byte-identical across rebuilds of an unchanged store
//! - **Async**: subprocess execution and the worker pool use tokio

pub mod delivery;
pub mod extract;
pub mod generator;
pub mod index;
pub mod render;
pub mod themes;

pub use delivery::{DeliveryError, DeliveryReceipt, EmailMessage, Mailer, PopMailer};
pub use extract::MetadataExtractor;
pub use generator::{BatchError, PdfGenerator, DEFAULT_PATTERN};
pub use index::{format_bytes, IndexBuilder};
pub use render::{ConversionError, PandocRenderer, RenderRequest, Renderer};
pub use themes::{CssThemeRenderer, StylesheetSource, Theme, ThemeSelection};
