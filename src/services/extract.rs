use anyhow::{Context, Result};
use camino::Utf8Path;
use chrono::{DateTime, Local};
use regex::Regex;
use std::fs;
use std::time::SystemTime;

use crate::models::DocumentMetadata;

/// Number of body characters kept as the summary.
const SUMMARY_LENGTH: usize = 200;

/// Extracts structural metadata from markdown documents.
///
/// Extraction is a pure function of the document text plus filesystem stat
/// data: no network access, no rendering, and no dependence on batch
/// scheduling. All patterns are compiled once at construction.
///
/// Math detection is regex-based pattern matching, not a full parser; it may
/// produce false negatives on pathological nesting. That limitation is
/// intentional — guessing intent would be worse than missing an edge case.
pub struct MetadataExtractor {
    /// Leading `---`-delimited YAML frontmatter block
    frontmatter_pattern: Regex,

    /// First level-1 heading line, used when frontmatter has no title
    title_pattern: Regex,

    /// Any heading line, counted as a section
    heading_pattern: Regex,

    /// Inline links `[text](target)`; image syntax also contains a match
    link_pattern: Regex,

    /// Images `![alt](src)`
    image_pattern: Regex,

    /// Display math `$$...$$`
    display_math_pattern: Regex,

    /// Inline math `$...$`
    inline_math_pattern: Regex,

    /// `\begin{equation}` / `\begin{align}` environment markers
    environment_pattern: Regex,

    /// LaTeX display mode `\[...\]`
    bracket_math_pattern: Regex,
}

impl MetadataExtractor {
    pub fn new() -> Self {
        Self {
            frontmatter_pattern: Regex::new(r"(?s)\A---[ \t]*\n(.*?)\n---[ \t]*\n")
                .expect("Invalid frontmatter regex"),
            title_pattern: Regex::new(r"(?m)^#\s+(.+)$").expect("Invalid title regex"),
            heading_pattern: Regex::new(r"(?m)^#+\s+").expect("Invalid heading regex"),
            link_pattern: Regex::new(r"\[[^\]]+\]\([^)]+\)").expect("Invalid link regex"),
            image_pattern: Regex::new(r"!\[[^\]]*\]\([^)]+\)").expect("Invalid image regex"),
            display_math_pattern: Regex::new(r"(?s)\$\$.+?\$\$")
                .expect("Invalid display math regex"),
            inline_math_pattern: Regex::new(r"\$[^$]+\$").expect("Invalid inline math regex"),
            environment_pattern: Regex::new(r"\\begin\{(equation|align)")
                .expect("Invalid environment regex"),
            bracket_math_pattern: Regex::new(r"(?s)\\\[.+?\\\]")
                .expect("Invalid bracket math regex"),
        }
    }

    /// Extract metadata for one document.
    ///
    /// Structural counts and the summary are computed on the body with
    /// frontmatter stripped; frontmatter keys win over derived values only
    /// for the title.
    pub fn extract(&self, path: &Utf8Path) -> Result<DocumentMetadata> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read document: {path}"))?;
        let stat =
            fs::metadata(path).with_context(|| format!("Failed to stat document: {path}"))?;

        let name = path.file_stem().unwrap_or(path.as_str()).to_string();
        let body = self.strip_frontmatter(&content);

        let title = self
            .frontmatter_title(&content)
            .or_else(|| {
                self.title_pattern
                    .captures(body)
                    .map(|c| c[1].trim().to_string())
            })
            .unwrap_or_else(|| name.clone());

        let modified = stat
            .modified()
            .map(to_rfc3339)
            .with_context(|| format!("Failed to read modification time: {path}"))?;
        // Not every filesystem records birth times.
        let created = stat.created().map(to_rfc3339).unwrap_or_else(|_| modified.clone());

        let summary: String = body
            .chars()
            .take(SUMMARY_LENGTH)
            .map(|c| if c == '\n' { ' ' } else { c })
            .collect::<String>()
            .trim()
            .to_string();

        Ok(DocumentMetadata {
            name,
            file: path.to_string(),
            title,
            file_size: stat.len(),
            line_count: body.split('\n').count(),
            word_count: body.split_whitespace().count(),
            section_count: self.heading_pattern.find_iter(body).count(),
            code_blocks: body.matches("```").count() / 2,
            links: self.link_pattern.find_iter(body).count(),
            images: self.image_pattern.find_iter(body).count(),
            has_math: self.detect_math(body),
            created,
            modified,
            summary,
            themes: vec!["light".to_string(), "dark".to_string()],
            pdf_files: Default::default(),
        })
    }

    /// The document body with any leading frontmatter block removed.
    fn strip_frontmatter<'a>(&self, content: &'a str) -> &'a str {
        match self.frontmatter_pattern.find(content) {
            Some(m) => &content[m.end()..],
            None => content,
        }
    }

    /// Title from the frontmatter block, if one parses and carries the key.
    fn frontmatter_title(&self, content: &str) -> Option<String> {
        let captures = self.frontmatter_pattern.captures(content)?;
        let value: serde_yaml_ng::Value = serde_yaml_ng::from_str(&captures[1]).ok()?;
        value
            .get("title")
            .and_then(|t| t.as_str())
            .map(str::to_string)
    }

    fn detect_math(&self, body: &str) -> bool {
        self.display_math_pattern.is_match(body)
            || self.inline_math_pattern.is_match(body)
            || self.environment_pattern.is_match(body)
            || self.bracket_math_pattern.is_match(body)
    }

    /// Persist a metadata record as pretty-printed JSON, creating parent
    /// directories as needed.
    pub fn save_metadata(&self, metadata: &DocumentMetadata, path: &Utf8Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create metadata directory: {parent}"))?;
        }

        let json = serde_json::to_string_pretty(metadata)
            .context("Failed to serialize metadata to JSON")?;
        fs::write(path, json).with_context(|| format!("Failed to write metadata: {path}"))?;

        tracing::debug!("Saved metadata record {}", path);
        Ok(())
    }

    /// Load a previously persisted metadata record.
    pub fn load_metadata(&self, path: &Utf8Path) -> Result<DocumentMetadata> {
        let contents =
            fs::read_to_string(path).with_context(|| format!("Failed to read metadata: {path}"))?;
        serde_json::from_str(&contents)
            .with_context(|| format!("Failed to parse metadata: {path}"))
    }
}

impl Default for MetadataExtractor {
    fn default() -> Self {
        Self::new()
    }
}

fn to_rfc3339(time: SystemTime) -> String {
    DateTime::<Local>::from(time).to_rfc3339()
}
