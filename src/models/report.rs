use camino::Utf8PathBuf;

use crate::models::DocumentMetadata;
use crate::services::themes::ThemeSelection;

/// One scheduled unit of batch work: a single document with its requested
/// theme selection and resolved output root. Themes for one document are never
/// split across pool slots, so metadata writes stay atomic per document.
#[derive(Debug, Clone)]
pub struct ConversionJob {
    pub source: Utf8PathBuf,
    pub selection: ThemeSelection,
    pub output_dir: Utf8PathBuf,
}

/// Outcome of converting one document.
///
/// Exactly one of the two shapes is produced: success with a non-empty
/// artifact list (light before dark when both were requested), or failure
/// with an error message and no artifacts. A theme that fails to render fails
/// the whole document; there is no silent partial success.
#[derive(Debug, Clone)]
pub struct GenerationResult {
    pub success: bool,
    pub files: Vec<Utf8PathBuf>,
    pub metadata: Option<DocumentMetadata>,
    pub error: Option<String>,
}

impl GenerationResult {
    pub fn succeeded(files: Vec<Utf8PathBuf>, metadata: DocumentMetadata) -> Self {
        Self {
            success: true,
            files,
            metadata: Some(metadata),
            error: None,
        }
    }

    pub fn failed(error: impl Into<String>) -> Self {
        Self {
            success: false,
            files: Vec::new(),
            metadata: None,
            error: Some(error.into()),
        }
    }
}

/// Aggregate over one batch run. `results` is in discovery order, not
/// completion order, so listings are reproducible across runs regardless of
/// scheduling.
#[derive(Debug, Clone)]
pub struct BatchReport {
    pub total: usize,
    pub succeeded: usize,
    pub failed: usize,
    pub results: Vec<GenerationResult>,
}

impl BatchReport {
    pub fn from_results(results: Vec<GenerationResult>) -> Self {
        let total = results.len();
        let succeeded = results.iter().filter(|r| r.success).count();
        Self {
            total,
            succeeded,
            failed: total - succeeded,
            results,
        }
    }

    /// True when every document in the batch converted successfully. An empty
    /// batch counts as all-successful.
    pub fn all_succeeded(&self) -> bool {
        self.failed == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::ThemeArtifacts;

    fn minimal_metadata(name: &str) -> DocumentMetadata {
        DocumentMetadata {
            name: name.to_string(),
            file: format!("{name}.md"),
            title: name.to_string(),
            file_size: 0,
            line_count: 0,
            word_count: 0,
            section_count: 0,
            code_blocks: 0,
            links: 0,
            images: 0,
            has_math: false,
            created: "2025-01-01T00:00:00+00:00".to_string(),
            modified: "2025-01-01T00:00:00+00:00".to_string(),
            summary: String::new(),
            themes: vec!["light".to_string(), "dark".to_string()],
            pdf_files: ThemeArtifacts::default(),
        }
    }

    #[test]
    fn test_report_counts() {
        let results = vec![
            GenerationResult::failed("boom"),
            GenerationResult::succeeded(
                vec![Utf8PathBuf::from("light/a-light.pdf")],
                minimal_metadata("a"),
            ),
        ];
        let report = BatchReport::from_results(results);

        assert_eq!(report.total, 2);
        assert_eq!(report.succeeded, 1);
        assert_eq!(report.failed, 1);
        assert!(!report.all_succeeded());
    }

    #[test]
    fn test_empty_report_is_successful() {
        let report = BatchReport::from_results(Vec::new());
        assert_eq!(report.total, 0);
        assert!(report.all_succeeded());
    }

    #[test]
    fn test_failed_result_has_no_files() {
        let result = GenerationResult::failed("renderer exited with status 1");
        assert!(!result.success);
        assert!(result.files.is_empty());
        assert!(result.metadata.is_none());
        assert!(result.error.is_some());
    }
}
