/// Number of code bytes inspected from the start of the load image.
pub const DEFAULT_CODE_WINDOW_LIMIT: usize = 1024;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AnalyzerConfig {
	/// Upper bound on the number of code bytes read from the start of the load image.
	pub code_window_limit: usize,
}

impl AnalyzerConfig {
	pub fn with_code_window_limit(code_window_limit: usize) -> AnalyzerConfig {
		AnalyzerConfig { code_window_limit }
	}
}

impl Default for AnalyzerConfig {
	fn default() -> Self {
		AnalyzerConfig { code_window_limit: DEFAULT_CODE_WINDOW_LIMIT }
	}
}
