//! Provides definition for diagnostics, which are the errors reported while
//! parsing, linking and executing Structured Text.
use std::fmt;

use stplc_problems::{Problem, ProblemKind};

use crate::core::{FileId, Id, Located, SourceSpan};

/// A label that refers to some range in a file and a message related to
/// that range.
#[derive(Clone, Debug)]
pub struct Label {
    /// The position of label.
    pub span: SourceSpan,

    /// A message describing this label.
    pub message: String,
}

impl Label {
    pub fn span(span: SourceSpan, message: impl Into<String>) -> Self {
        Self {
            span,
            message: message.into(),
        }
    }

    pub fn located(item: &dyn Located, message: impl Into<String>) -> Self {
        Label::span(item.span(), message)
    }

    /// A "position" that is a file in its entirety rather than a particular
    /// range.
    pub fn file(file_id: impl Into<FileId>, message: impl Into<String>) -> Self {
        Self {
            span: SourceSpan::range(0, 0).with_file_id(&file_id.into()),
            message: message.into(),
        }
    }
}

/// A diagnostic. Diagnostics have a problem that gives the code and
/// category, a primary location and possibly other locations.
#[derive(Clone, Debug)]
pub struct Diagnostic {
    pub problem: Problem,

    /// The primary or first location.
    pub primary: Label,

    /// Additional descriptions to the constant description.
    pub described: Vec<String>,

    /// Additional locations related to the diagnostic.
    pub secondary: Vec<Label>,
}

impl Diagnostic {
    /// Creates a diagnostic from the problem code and with the specified label.
    pub fn problem(problem: Problem, primary: Label) -> Self {
        Self {
            problem,
            primary,
            described: vec![],
            secondary: vec![],
        }
    }

    /// Creates a "todo" diagnostic associated with a file and line in the Rust
    /// source code rather than the Structured Text source.
    pub fn todo(file: &str, line: u32) -> Self {
        Diagnostic::problem(
            Problem::NotImplemented,
            Label::span(
                SourceSpan::builtin(),
                format!("Not implemented at {}#L{}", file, line),
            ),
        )
    }

    /// Creates an internal invariant diagnostic at the span.
    pub fn internal(span: &SourceSpan, message: impl Into<String>) -> Self {
        Diagnostic::problem(Problem::InternalInvariant, Label::span(span.clone(), message))
    }

    /// Adds to the problem description additional context about the problem.
    pub fn with_context(mut self, description: &str, item: &str) -> Self {
        self.described.push(format!("{}={}", description, item));
        self
    }

    pub fn with_context_id(mut self, description: &str, item: &Id) -> Self {
        self.described.push(format!("{}={}", description, item));
        self
    }

    pub fn with_secondary(mut self, label: Label) -> Self {
        self.secondary.push(label);
        self
    }

    pub fn code(&self) -> &'static str {
        self.problem.code()
    }

    pub fn kind(&self) -> ProblemKind {
        self.problem.kind()
    }

    pub fn is_fatal(&self) -> bool {
        self.problem.kind().is_fatal()
    }

    /// Returns the description for the diagnostic including any context.
    pub fn description(&self) -> String {
        if self.described.is_empty() {
            self.problem.message().to_string()
        } else {
            format!("{} ({})", self.problem.message(), self.described.join(", "))
        }
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}: {} ({}) {}",
            self.code(),
            self.description(),
            self.primary.span,
            self.primary.message
        )?;
        for label in &self.secondary {
            write!(f, "; {} ({})", label.message, label.span)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn description_when_has_context_then_includes_context() {
        let diagnostic = Diagnostic::problem(
            Problem::MissingMember,
            Label::span(SourceSpan::default(), "Initializer"),
        )
        .with_context("member", "b");
        assert_eq!(
            diagnostic.description(),
            "Structure initializer does not set every member (member=b)"
        );
    }

    #[test]
    fn display_when_secondary_then_includes_secondary() {
        let diagnostic = Diagnostic::problem(
            Problem::DuplicateDeclaration,
            Label::span(SourceSpan::range(10, 11), "Duplicate"),
        )
        .with_secondary(Label::span(SourceSpan::range(1, 2), "First declaration"));
        let text = format!("{}", diagnostic);
        assert!(text.starts_with("L0005:"));
        assert!(text.contains("First declaration"));
    }
}
