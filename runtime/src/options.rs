//! Options that control linking and execution.

/// Options for the interpreter.
#[derive(Clone, Debug)]
pub struct Options {
    /// Link compilation units even when they carry syntax diagnostics.
    pub resolve_links_on_parse_error: bool,

    /// The maximum number of micro-steps in one cycle before the cycle is
    /// abandoned.
    pub max_micro_steps_per_cycle: u64,

    /// Size in bytes of each direct memory area (`%I`, `%Q`, `%M`).
    pub memory_size: usize,

    /// Tolerance for equality of real values.
    pub real_epsilon: f64,
}

impl Default for Options {
    fn default() -> Self {
        Self {
            resolve_links_on_parse_error: false,
            max_micro_steps_per_cycle: 1_000_000,
            memory_size: 1024,
            real_epsilon: 1e-4,
        }
    }
}

impl Options {
    pub fn with_resolve_links_on_parse_error(mut self, value: bool) -> Self {
        self.resolve_links_on_parse_error = value;
        self
    }

    pub fn with_max_micro_steps_per_cycle(mut self, value: u64) -> Self {
        self.max_micro_steps_per_cycle = value;
        self
    }

    pub fn with_memory_size(mut self, value: usize) -> Self {
        self.memory_size = value;
        self
    }
}
