use serde::{Deserialize, Serialize};

/// Relative paths of the rendered artifacts for one document, one slot per
/// theme. A slot is `None` when that theme was not requested for the run that
/// produced the record.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ThemeArtifacts {
    #[serde(default)]
    pub light: Option<String>,

    #[serde(default)]
    pub dark: Option<String>,
}

/// Per-document derived facts, persisted as `metadata/<stem>.json` under the
/// output root.
///
/// A record is written wholesale on every generation of its document and is
/// never mutated in place; the aggregate index is rebuilt from these records
/// rather than from in-memory batch state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DocumentMetadata {
    /// Document stem, also the record key in the metadata store.
    pub name: String,

    /// Source file path as given to the extractor.
    pub file: String,

    /// Resolved title: frontmatter `title`, else first level-1 heading, else
    /// the filename stem.
    pub title: String,

    pub file_size: u64,
    pub line_count: usize,
    pub word_count: usize,
    pub section_count: usize,
    pub code_blocks: usize,
    pub links: usize,
    pub images: usize,

    /// Regex-based detection; may have false negatives on pathological
    /// nesting.
    pub has_math: bool,

    /// RFC3339 creation timestamp (falls back to `modified` on filesystems
    /// without birth times).
    pub created: String,

    /// RFC3339 modification timestamp.
    pub modified: String,

    /// First 200 characters of the body with frontmatter stripped and
    /// newlines flattened to spaces.
    pub summary: String,

    /// Theme names applicable to this document.
    pub themes: Vec<String>,

    #[serde(default)]
    pub pdf_files: ThemeArtifacts,
}
