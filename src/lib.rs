// BARQUE - Batch markdown-to-PDF report generation
//
// This is the library crate containing the generation pipeline and its
// configuration. The binary crate (main.rs) provides the CLI entry point.

pub mod config;
pub mod logging;
pub mod metrics;
pub mod models;
pub mod services;

// Re-export commonly used types for convenience
pub use config::{BarqueConfig, ConfigError, ConfigResolver, Environment, Overrides};
pub use models::{BatchReport, DocumentMetadata, GenerationResult};
pub use services::{PdfGenerator, ThemeSelection};

/// Application version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Application name
pub const APP_NAME: &str = env!("CARGO_PKG_NAME");
