pub mod analysis_error;
pub mod analyzer;
pub mod config;
pub mod dos_functions;
pub mod exe_loader;
pub mod interrupt_scanner;

pub use analysis_error::{AnalysisError, GeometryError};
pub use analyzer::MzAnalyzer;
pub use config::AnalyzerConfig;
