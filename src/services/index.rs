use anyhow::{Context, Result};
use camino::{Utf8Path, Utf8PathBuf};
use chrono::{DateTime, Utc};
use std::fs;

use crate::models::DocumentMetadata;
use crate::services::extract::MetadataExtractor;

/// File name of the aggregate index at the output root.
pub const INDEX_FILE_NAME: &str = "INDEX.md";

/// Builds the aggregate index from the persisted metadata store.
///
/// The index is derived from the store alone, never from in-memory batch
/// state, so it always reflects cumulative history and can be rebuilt at any
/// time. Rebuilding from an unchanged store is byte-identical: records are
/// sorted by recorded modification time descending (name ascending as
/// tie-break) and the rendered text carries no generation timestamp.
pub struct IndexBuilder {
    output_dir: Utf8PathBuf,
    metadata_dir: Utf8PathBuf,
    project_name: String,
}

impl IndexBuilder {
    pub fn new(output_dir: &Utf8Path, metadata_dir: &Utf8Path, project_name: &str) -> Self {
        Self {
            output_dir: output_dir.to_path_buf(),
            metadata_dir: metadata_dir.to_path_buf(),
            project_name: project_name.to_string(),
        }
    }

    /// Load every record in the store, sorted for rendering. Records that
    /// fail to read or parse are logged and skipped so one corrupt file
    /// cannot take down the whole index.
    pub fn load_records(&self) -> Result<Vec<DocumentMetadata>> {
        if !self.metadata_dir.exists() {
            return Ok(Vec::new());
        }

        let extractor = MetadataExtractor::new();
        let mut paths = Vec::new();

        let entries = fs::read_dir(&self.metadata_dir)
            .with_context(|| format!("Failed to read metadata store: {}", self.metadata_dir))?;
        for entry in entries {
            let entry = entry.context("Failed to read metadata store entry")?;
            let Ok(path) = Utf8PathBuf::from_path_buf(entry.path()) else {
                tracing::warn!("Skipping non-UTF-8 metadata path: {:?}", entry.path());
                continue;
            };
            if path.extension() == Some("json") {
                paths.push(path);
            }
        }
        paths.sort();

        let mut records = Vec::new();
        for path in paths {
            match extractor.load_metadata(&path) {
                Ok(record) => records.push(record),
                Err(e) => tracing::warn!("Skipping unreadable metadata record {}: {:#}", path, e),
            }
        }

        records.sort_by(|a, b| {
            modified_key(b)
                .cmp(&modified_key(a))
                .then_with(|| a.name.cmp(&b.name))
        });

        Ok(records)
    }

    /// Render the index text for a set of records. Pure function of its
    /// input.
    pub fn render(&self, records: &[DocumentMetadata]) -> String {
        if records.is_empty() {
            return "# PDF Documentation Index\n\nNo documents generated yet.\n".to_string();
        }

        let total_docs = records.len();
        let total_words: usize = records.iter().map(|r| r.word_count).sum();
        let total_size: u64 = records.iter().map(|r| r.file_size).sum();

        let mut content = format!(
            "\
# PDF Documentation Index

**Project:** {project}

## Statistics

- **Total Documents**: {total_docs}
- **Total Words**: {total_words}
- **Total Size**: {size}

## Themes

### Light Mode
Browse [Light Theme PDFs](light/)

### Dark Mode
Browse [Dark Theme PDFs](dark/)

## All Documents
",
            project = self.project_name,
            size = format_bytes(total_size),
        );

        for record in records {
            let math_indicator = if record.has_math { " (math)" } else { "" };
            let modified = record.modified.get(..10).unwrap_or(&record.modified);

            // Links are emitted for both themes even when one was never
            // generated; readers are expected to note missing files.
            content.push_str(&format!(
                "
### {title}{math_indicator}
- **Words**: {words}
- **Sections**: {sections}
- **Modified**: {modified}
- **Files**:
  - [Light Theme](light/{name}-light.pdf)
  - [Dark Theme](dark/{name}-dark.pdf)
",
                title = record.title,
                words = record.word_count,
                sections = record.section_count,
                name = record.name,
            ));
        }

        content.push_str(
            "
## Legend

| Field | Meaning |
|----------|---------|
| (math) | Contains mathematical formulas |
| Words | Total word count in document |
| Sections | Number of headings/sections |
| Modified | Last modification date |
",
        );

        content
    }

    /// Rebuild the index file from the store and write it to the output
    /// root.
    pub fn build(&self) -> Result<Utf8PathBuf> {
        let records = self.load_records()?;
        let content = self.render(&records);

        let index_file = self.output_dir.join(INDEX_FILE_NAME);
        fs::write(&index_file, content)
            .with_context(|| format!("Failed to write index: {index_file}"))?;

        tracing::info!("Wrote index of {} documents to {}", records.len(), index_file);
        Ok(index_file)
    }
}

fn modified_key(record: &DocumentMetadata) -> DateTime<Utc> {
    DateTime::parse_from_rfc3339(&record.modified)
        .map(|d| d.with_timezone(&Utc))
        .unwrap_or(DateTime::<Utc>::UNIX_EPOCH)
}

/// Human-readable size with 1024 steps and one decimal place.
pub fn format_bytes(bytes: u64) -> String {
    let mut size = bytes as f64;
    for unit in ["B", "KB", "MB", "GB", "TB"] {
        if size < 1024.0 {
            return format!("{size:.1} {unit}");
        }
        size /= 1024.0;
    }
    format!("{size:.1} PB")
}
