//! Common items for working with Structured Text elements that are not
//! part of the language itself.
use core::fmt;
use std::hash::{Hash, Hasher};
use std::path::Path;
use std::sync::{Arc, LazyLock};

static EMPTY_FILE_ID: LazyLock<Arc<str>> = LazyLock::new(|| Arc::from(""));

/// FileId identifies the origin of source code.
///
/// Built-in items (elementary types, standard functions) have no source
/// file and use `FileId::BuiltIn`.
#[derive(Clone, Debug, Eq, Hash, PartialEq)]
pub enum FileId {
    /// Source code from a file. The string is the file path.
    File(Arc<str>),
    /// Intrinsic to the interpreter.
    BuiltIn,
}

impl FileId {
    pub fn new() -> Self {
        FileId::default()
    }

    pub fn from_path(path: &Path) -> Self {
        FileId::File(Arc::from(path.to_string_lossy().as_ref()))
    }

    pub fn from_string(path: &str) -> Self {
        FileId::File(Arc::from(path))
    }

    pub fn builtin() -> Self {
        FileId::BuiltIn
    }

    pub fn is_builtin(&self) -> bool {
        matches!(self, FileId::BuiltIn)
    }
}

impl Default for FileId {
    fn default() -> Self {
        FileId::File(EMPTY_FILE_ID.clone())
    }
}

impl fmt::Display for FileId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FileId::File(path) => write!(f, "{}", path),
            FileId::BuiltIn => write!(f, "<builtin>"),
        }
    }
}

/// Location in a file of a language element.
///
/// The location is defined by byte offsets in the source file.
#[derive(Debug, Clone)]
pub struct SourceSpan {
    /// The position of the starting character (0-indexed).
    pub start: usize,
    /// The position after the ending character (0-indexed).
    pub end: usize,
    pub file_id: FileId,
}

impl SourceSpan {
    pub fn join(start: &SourceSpan, end: &SourceSpan) -> Self {
        Self {
            start: start.start,
            end: end.end,
            file_id: start.file_id.clone(),
        }
    }

    pub fn range(start: usize, end: usize) -> Self {
        Self {
            start,
            end,
            file_id: FileId::default(),
        }
    }

    pub fn with_file_id(&self, file_id: &FileId) -> Self {
        Self {
            start: self.start,
            end: self.end,
            file_id: file_id.clone(),
        }
    }

    pub fn builtin() -> Self {
        Self {
            start: 0,
            end: 0,
            file_id: FileId::builtin(),
        }
    }

    pub fn is_builtin(&self) -> bool {
        self.file_id.is_builtin()
    }

    /// Returns true if this span is at the same position as the other span.
    ///
    /// `PartialEq` ignores positions, so use this when the position matters.
    pub fn same_position(&self, other: &SourceSpan) -> bool {
        self.start == other.start && self.end == other.end && self.file_id == other.file_id
    }
}

impl Default for SourceSpan {
    fn default() -> Self {
        SourceSpan::range(0, 0)
    }
}

impl PartialEq for SourceSpan {
    fn eq(&self, _other: &Self) -> bool {
        // Items compare equal regardless of where they were declared.
        true
    }
}
impl Eq for SourceSpan {}

impl fmt::Display for SourceSpan {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}..{}", self.file_id, self.start, self.end)
    }
}

/// Defines an element that has a location in source code.
pub trait Located {
    fn span(&self) -> SourceSpan;
}

/// Implements Identifier.
///
/// Identifiers are case insensitive. The type keeps the original text for
/// display and compares using the lower case text.
pub struct Id {
    pub original: String,
    pub lower_case: String,
    pub span: SourceSpan,
}

impl Id {
    /// Converts a `&str` into an `Id`.
    pub fn from(str: &str) -> Self {
        Id {
            original: String::from(str),
            lower_case: str.to_lowercase(),
            span: SourceSpan::default(),
        }
    }

    pub fn with_position(mut self, span: SourceSpan) -> Self {
        self.span = span;
        self
    }

    pub fn lower_case(&self) -> &str {
        &self.lower_case
    }

    pub fn original(&self) -> &str {
        &self.original
    }

    /// Returns true if the identifier matches the text ignoring case.
    pub fn is(&self, text: &str) -> bool {
        self.lower_case.eq_ignore_ascii_case(text)
    }
}

impl Clone for Id {
    fn clone(&self) -> Self {
        Id {
            original: self.original.clone(),
            lower_case: self.lower_case.clone(),
            span: self.span.clone(),
        }
    }
}

impl PartialEq for Id {
    fn eq(&self, other: &Self) -> bool {
        self.lower_case == other.lower_case
    }
}
impl Eq for Id {}

impl Hash for Id {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.lower_case.hash(state);
    }
}

impl fmt::Debug for Id {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.original)
    }
}

impl fmt::Display for Id {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.original)
    }
}

impl Located for Id {
    fn span(&self) -> SourceSpan {
        self.span.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn id_when_different_case_then_equal() {
        assert_eq!(Id::from("Motor"), Id::from("MOTOR"));
    }

    #[test]
    fn id_when_different_case_then_same_hash() {
        let mut set = HashSet::new();
        set.insert(Id::from("Motor"));
        assert!(set.contains(&Id::from("motor")));
    }

    #[test]
    fn id_when_display_then_original_text() {
        assert_eq!(format!("{}", Id::from("Motor")), "Motor");
    }

    #[test]
    fn source_span_when_join_then_covers_both() {
        let span = SourceSpan::join(&SourceSpan::range(2, 4), &SourceSpan::range(8, 10));
        assert_eq!(span.start, 2);
        assert_eq!(span.end, 10);
    }

    #[test]
    fn source_span_same_position_when_different_offsets_then_false() {
        assert!(!SourceSpan::range(0, 1).same_position(&SourceSpan::range(0, 2)));
        assert!(SourceSpan::range(0, 1).same_position(&SourceSpan::range(0, 1)));
    }

    #[test]
    fn file_id_builtin_when_display_then_returns_builtin_marker() {
        assert_eq!(format!("{}", FileId::builtin()), "<builtin>");
    }
}
