//! Options for parsing.
use stplc_dsl::core::FileId;

#[derive(Clone, Debug, Default)]
pub struct ParseOptions {
    /// The file that positions in the source refer to.
    pub file_id: FileId,
}

impl ParseOptions {
    pub fn new(file_id: FileId) -> Self {
        Self { file_id }
    }
}
