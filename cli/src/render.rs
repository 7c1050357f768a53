//! Writes diagnostics to the terminal with the source text they point at.
use codespan_reporting::{
    diagnostic::{Diagnostic, Label, LabelStyle, Severity},
    files::SimpleFiles,
    term::{
        self,
        termcolor::{ColorChoice, StandardStream},
    },
};
use stplc_dsl::core::FileId;

/// The text of every source file that was read.
#[derive(Default)]
pub struct Sources {
    files: Vec<(FileId, String)>,
}

impl Sources {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, file_id: FileId, content: String) {
        self.files.push((file_id, content));
    }

    pub fn iter(&self) -> impl Iterator<Item = &(FileId, String)> {
        self.files.iter()
    }

    fn position(&self, file_id: &FileId) -> Option<usize> {
        self.files.iter().position(|(id, _)| id == file_id)
    }
}

/// Writes the diagnostics to standard error.
///
/// A diagnostic that refers to something other than a source file (such as
/// a built-in type) is written as one line.
pub fn write_diagnostics(diagnostics: &[stplc_dsl::diagnostic::Diagnostic], sources: &Sources) {
    let writer = StandardStream::stderr(ColorChoice::Auto);
    let config = term::Config::default();

    let mut files: SimpleFiles<String, &String> = SimpleFiles::new();
    for (file_id, content) in sources.iter() {
        files.add(file_id.to_string(), content);
    }

    for diagnostic in diagnostics {
        match map_diagnostic(diagnostic, sources) {
            Some(mapped) => {
                let _ = term::emit(&mut writer.lock(), &config, &files, &mapped).map_err(|err| {
                    eprintln!("Failed writing to terminal: {}", err);
                });
            }
            None => eprintln!("error[{}]: {}", diagnostic.code(), diagnostic),
        }
    }
}

fn map_label(label: &stplc_dsl::diagnostic::Label, style: LabelStyle, sources: &Sources) -> Option<Label<usize>> {
    let file = sources.position(&label.span.file_id)?;
    let content = &sources.files[file].1;
    let end = label.span.end.min(content.len());
    let start = label.span.start.min(end);
    Some(Label::new(style, file, start..end).with_message(label.message.clone()))
}

fn map_diagnostic(diagnostic: &stplc_dsl::diagnostic::Diagnostic, sources: &Sources) -> Option<Diagnostic<usize>> {
    // Set the primary labels
    let mut labels = vec![map_label(&diagnostic.primary, LabelStyle::Primary, sources)?];

    // Add any secondary labels that are in a source file
    labels.extend(
        diagnostic
            .secondary
            .iter()
            .filter_map(|label| map_label(label, LabelStyle::Secondary, sources)),
    );

    Some(
        Diagnostic::new(Severity::Error)
            .with_code(diagnostic.code())
            .with_message(diagnostic.description())
            .with_labels(labels),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use stplc_dsl::{core::SourceSpan, diagnostic::Label as DslLabel};
    use stplc_problems::Problem;

    fn sources() -> Sources {
        let mut sources = Sources::new();
        sources.add(FileId::from_string("main.st"), "PROGRAM P END_PROGRAM".to_string());
        sources
    }

    #[test]
    fn map_diagnostic_when_span_in_source_then_labels() {
        let diagnostic = stplc_dsl::diagnostic::Diagnostic::problem(
            Problem::SyntaxError,
            DslLabel::span(SourceSpan::range(8, 9).with_file_id(&FileId::from_string("main.st")), "Here"),
        );
        let mapped = map_diagnostic(&diagnostic, &sources()).unwrap();
        assert_eq!(mapped.code.as_deref(), Some("S0002"));
        assert_eq!(mapped.labels[0].range, 8..9);
    }

    #[test]
    fn map_diagnostic_when_builtin_span_then_none() {
        let diagnostic = stplc_dsl::diagnostic::Diagnostic::problem(
            Problem::NotStarted,
            DslLabel::span(SourceSpan::builtin(), "Start"),
        );
        assert!(map_diagnostic(&diagnostic, &sources()).is_none());
    }

    #[test]
    fn map_label_when_span_past_end_then_clamped() {
        let label = DslLabel::span(SourceSpan::range(15, 40).with_file_id(&FileId::from_string("main.st")), "End");
        let mapped = map_label(&label, LabelStyle::Primary, &sources()).unwrap();
        assert_eq!(mapped.range, 15..21);
    }
}
