/// Knobs for one evaluator instance.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EvaluatorConfig {
    /// Function called by `Evaluator::run` after the globals are set up.
    pub entry: String,
    /// Deepest allowed nesting of source-function calls.
    pub max_call_depth: usize,
    /// Largest array (in elements) a declaration may allocate.
    pub max_array_elements: u64,
}

impl Default for EvaluatorConfig {
    fn default() -> Self {
        Self {
            entry: "main".to_string(),
            max_call_depth: 512,
            max_array_elements: 1 << 26,
        }
    }
}

impl EvaluatorConfig {
    pub fn with_entry(mut self, entry: &str) -> Self {
        self.entry = entry.to_string();
        self
    }

    pub fn with_max_call_depth(mut self, depth: usize) -> Self {
        self.max_call_depth = depth;
        self
    }
}
