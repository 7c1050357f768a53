//! The sink that accumulates diagnostics raised while linking and running.
use stplc_dsl::diagnostic::Diagnostic;

/// Accumulated diagnostics together with a sticky fatal flag.
///
/// The fatal flag is set once any internal or memory problem is recorded
/// and is only cleared by `clear`.
#[derive(Clone, Debug, Default)]
pub struct Issues {
    diagnostics: Vec<Diagnostic>,
    fatal: bool,
}

impl Issues {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, diagnostic: Diagnostic) {
        if diagnostic.is_fatal() {
            self.fatal = true;
        }
        self.diagnostics.push(diagnostic);
    }

    pub fn extend(&mut self, diagnostics: impl IntoIterator<Item = Diagnostic>) {
        for diagnostic in diagnostics {
            self.push(diagnostic);
        }
    }

    pub fn is_fatal(&self) -> bool {
        self.fatal
    }

    pub fn is_empty(&self) -> bool {
        self.diagnostics.is_empty()
    }

    pub fn len(&self) -> usize {
        self.diagnostics.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Diagnostic> {
        self.diagnostics.iter()
    }

    pub fn clear(&mut self) {
        self.diagnostics.clear();
        self.fatal = false;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use stplc_dsl::{core::SourceSpan, diagnostic::Label};
    use stplc_problems::Problem;

    #[test]
    fn push_when_internal_problem_then_fatal_is_sticky() {
        let mut issues = Issues::new();
        issues.push(Diagnostic::internal(&SourceSpan::default(), "bad"));
        issues.push(Diagnostic::problem(
            Problem::DivisionByZero,
            Label::span(SourceSpan::default(), "Divisor"),
        ));
        assert!(issues.is_fatal());
        assert_eq!(issues.len(), 2);
    }

    #[test]
    fn push_when_user_problem_then_not_fatal() {
        let mut issues = Issues::new();
        issues.push(Diagnostic::problem(
            Problem::DivisionByZero,
            Label::span(SourceSpan::default(), "Divisor"),
        ));
        assert!(!issues.is_fatal());
    }
}
