// Library surface: the CLI in main.rs and the integration tests both go
// through `Analyzer`.
pub mod analysis;
pub mod app_dirs;
pub mod binder;
pub mod config;
pub mod diagnostics;
pub mod error;
pub mod executor;
pub mod features;
pub mod frame;
pub mod logging;
pub mod model;
pub mod resolver;
pub mod sanitize;
pub mod stroke;
pub mod util;
pub mod value;

pub use analysis::{analyze, Analysis, AnalysisResult, Analyzer};
pub use diagnostics::{Diagnostic, DiagnosticKind};
pub use error::{ArtifactError, InputError, ModelError, SchemaError};
pub use stroke::{StrokeRecord, StrokeSource};
