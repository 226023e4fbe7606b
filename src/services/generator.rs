use anyhow::{Context, Result};
use camino::{Utf8Path, Utf8PathBuf};
use globset::Glob;
use std::fs;
use std::sync::Arc;
use std::time::Instant;
use thiserror::Error;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;

use crate::config::BarqueConfig;
use crate::metrics::Metrics;
use crate::models::{BatchReport, ConversionJob, GenerationResult, ThemeArtifacts};
use crate::services::extract::MetadataExtractor;
use crate::services::index::IndexBuilder;
use crate::services::render::{PandocRenderer, RenderRequest, Renderer};
use crate::services::themes::{
    write_stylesheet, CssThemeRenderer, StylesheetSource, Theme, ThemeSelection,
};

/// Default glob for batch discovery.
pub const DEFAULT_PATTERN: &str = "**/*.md";

/// Orchestrator-level failures, all raised before any job is dispatched. Per
/// document failures never surface here; they are captured into that
/// document's [`GenerationResult`].
#[derive(Error, Debug)]
pub enum BatchError {
    #[error("input directory not found: {0}")]
    MissingInputRoot(Utf8PathBuf),

    #[error("invalid file pattern '{pattern}': {source}")]
    Pattern {
        pattern: String,
        source: globset::Error,
    },

    #[error("conversion task panicked: {0}")]
    Join(#[from] tokio::task::JoinError),
}

/// The batch orchestrator.
///
/// Cloning is cheap (shared collaborators behind `Arc`), which is how each
/// pooled conversion task gets its own handle. Construction creates the whole
/// output tree up front; per-job writes then land in disjoint per-document
/// subpaths, leaving the shared stylesheets as the only contention point
/// (resolved by idempotent atomic overwrites, not locks).
#[derive(Clone)]
pub struct PdfGenerator {
    config: Arc<BarqueConfig>,
    renderer: Arc<dyn Renderer>,
    stylesheets: Arc<dyn StylesheetSource>,
    extractor: Arc<MetadataExtractor>,
    metrics: Arc<Metrics>,
    output_dir: Utf8PathBuf,
    temp_dir: Utf8PathBuf,
    metadata_dir: Utf8PathBuf,
}

impl PdfGenerator {
    /// Generator with the production pandoc renderer.
    pub fn new(config: BarqueConfig) -> Result<Self> {
        Self::with_renderer(config, Arc::new(PandocRenderer::new()))
    }

    /// Generator with an injected renderer collaborator.
    pub fn with_renderer(config: BarqueConfig, renderer: Arc<dyn Renderer>) -> Result<Self> {
        let output_dir = config.output_dir.clone();
        let temp_dir = output_dir.join(".temp");
        let metadata_dir = output_dir.join("metadata");

        let generator = Self {
            config: Arc::new(config),
            renderer,
            stylesheets: Arc::new(CssThemeRenderer::new()),
            extractor: Arc::new(MetadataExtractor::new()),
            metrics: Arc::new(Metrics::new()),
            output_dir,
            temp_dir,
            metadata_dir,
        };
        generator.init_directories()?;
        Ok(generator)
    }

    /// Create the output directory tree. Failure here aborts the run before
    /// any job is dispatched.
    fn init_directories(&self) -> Result<()> {
        let mut dirs = vec![
            self.output_dir.clone(),
            self.temp_dir.clone(),
            self.metadata_dir.clone(),
        ];
        if self.config.organize_by_theme {
            dirs.push(self.output_dir.join(Theme::Light.as_str()));
            dirs.push(self.output_dir.join(Theme::Dark.as_str()));
        }

        for dir in dirs {
            fs::create_dir_all(&dir)
                .with_context(|| format!("Failed to create output directory: {dir}"))?;
        }
        Ok(())
    }

    pub fn config(&self) -> &BarqueConfig {
        &self.config
    }

    pub fn metrics(&self) -> &Metrics {
        &self.metrics
    }

    pub fn output_dir(&self) -> &Utf8Path {
        &self.output_dir
    }

    pub fn index_builder(&self) -> IndexBuilder {
        IndexBuilder::new(
            &self.output_dir,
            &self.metadata_dir,
            &self.config.project_name,
        )
    }

    /// Rebuild the aggregate index from the full persisted metadata store.
    pub fn generate_index(&self) -> Result<Utf8PathBuf> {
        self.index_builder().build()
    }

    /// Convert one document.
    ///
    /// Never returns an error: every failure is captured into the returned
    /// [`GenerationResult`] so a batch can keep going.
    pub async fn generate(&self, input: &Utf8Path, selection: ThemeSelection) -> GenerationResult {
        match self.try_generate(input, selection).await {
            Ok(result) => {
                self.metrics.record_document_converted();
                result
            }
            Err(e) => {
                self.metrics.record_document_failed();
                tracing::warn!("Conversion failed for {}: {:#}", input, e);
                GenerationResult::failed(format!("{e:#}"))
            }
        }
    }

    async fn try_generate(
        &self,
        input: &Utf8Path,
        selection: ThemeSelection,
    ) -> Result<GenerationResult> {
        let mut metadata = self.extractor.extract(input)?;

        self.prepare_stylesheets(selection)?;

        let mut files = Vec::new();
        let mut artifacts = ThemeArtifacts::default();

        // Light renders before dark, so artifact ordering is stable.
        for theme in selection.themes() {
            let relative = self.artifact_rel_path(&metadata.name, *theme);
            let output = self.output_dir.join(&relative);

            let request = RenderRequest {
                input: input.to_path_buf(),
                output,
                stylesheet: self.temp_dir.join(theme.css_file_name()),
                title: metadata.name.clone(),
                math_enabled: self.config.math_enabled,
                toc_depth: 3,
                numbered_sections: true,
            };

            let start = Instant::now();
            self.renderer
                .render(&request)
                .await
                .with_context(|| format!("Failed to render {theme} theme for {input}"))?;
            self.metrics.record_artifact_rendered();
            self.metrics.record_render_time(start.elapsed());

            match theme {
                Theme::Light => artifacts.light = Some(relative.to_string()),
                Theme::Dark => artifacts.dark = Some(relative.to_string()),
            }
            files.push(request.output);
        }

        metadata.pdf_files = artifacts;

        let record_path = self.metadata_dir.join(format!("{}.json", metadata.name));
        self.extractor.save_metadata(&metadata, &record_path)?;

        Ok(GenerationResult::succeeded(files, metadata))
    }

    /// Regenerate the shared stylesheet cache files for the requested themes.
    /// Many jobs do this near-simultaneously; the content is deterministic
    /// and each write is atomic, so last-writer-wins is indistinguishable
    /// from first-writer-wins.
    fn prepare_stylesheets(&self, selection: ThemeSelection) -> Result<()> {
        for theme in selection.themes() {
            let css = self.stylesheets.stylesheet(*theme, &self.config);
            write_stylesheet(&self.temp_dir, *theme, &css)?;
        }
        Ok(())
    }

    fn artifact_rel_path(&self, name: &str, theme: Theme) -> Utf8PathBuf {
        let file_name = format!("{name}-{theme}.pdf");
        if self.config.organize_by_theme {
            Utf8PathBuf::from(theme.as_str()).join(file_name)
        } else {
            Utf8PathBuf::from(file_name)
        }
    }

    /// Enumerate input documents under `root` matching `pattern`, in
    /// deterministic discovery order.
    ///
    /// Zero matches is not an error; a missing root is. Matching follows the
    /// path, not the file type, so a directory carrying a matching name is
    /// discovered too and fails later at the read step, as its own result.
    pub fn discover(
        &self,
        root: &Utf8Path,
        pattern: &str,
    ) -> Result<Vec<Utf8PathBuf>, BatchError> {
        if !root.is_dir() {
            return Err(BatchError::MissingInputRoot(root.to_path_buf()));
        }

        let matcher = Glob::new(pattern)
            .map_err(|source| BatchError::Pattern {
                pattern: pattern.to_string(),
                source,
            })?
            .compile_matcher();

        let mut documents = Vec::new();
        for entry in walkdir::WalkDir::new(root).sort_by_file_name() {
            let entry = match entry {
                Ok(entry) => entry,
                Err(e) => {
                    tracing::warn!("Skipping unreadable entry under {}: {}", root, e);
                    continue;
                }
            };

            let Ok(relative) = entry.path().strip_prefix(root) else {
                continue;
            };
            if relative.as_os_str().is_empty() || !matcher.is_match(relative) {
                continue;
            }

            match Utf8PathBuf::from_path_buf(entry.into_path()) {
                Ok(path) => documents.push(path),
                Err(path) => {
                    tracing::warn!("Skipping non-UTF-8 path: {}", path.display());
                }
            }
        }

        documents.sort();
        Ok(documents)
    }

    /// Convert every matching document under `input_dir`.
    ///
    /// With one worker the documents are processed strictly sequentially in
    /// discovery order; otherwise one job per document goes into a bounded
    /// pool and completions are reassembled back into discovery order. A
    /// document requiring both themes stays a single job so its metadata
    /// write is never raced by a sibling.
    pub async fn batch_generate(
        &self,
        input_dir: &Utf8Path,
        selection: ThemeSelection,
        workers: Option<usize>,
        pattern: &str,
    ) -> Result<BatchReport, BatchError> {
        let documents = self.discover(input_dir, pattern)?;

        if documents.is_empty() {
            tracing::info!("No documents matching '{}' under {}", pattern, input_dir);
            return Ok(BatchReport::from_results(Vec::new()));
        }

        let workers = workers.unwrap_or(self.config.workers).max(1);
        tracing::info!(
            "Batch: {} document(s), {} worker(s), theme '{}'",
            documents.len(),
            workers,
            selection
        );

        let jobs: Vec<ConversionJob> = documents
            .into_iter()
            .map(|source| ConversionJob {
                source,
                selection,
                output_dir: self.output_dir.clone(),
            })
            .collect();

        let results = if workers == 1 {
            let mut results = Vec::with_capacity(jobs.len());
            for job in &jobs {
                results.push(self.generate(&job.source, job.selection).await);
            }
            results
        } else {
            self.run_pool(jobs, workers).await?
        };

        let report = BatchReport::from_results(results);

        if self.config.create_index {
            // The batch itself already succeeded; a broken index must not
            // turn completed conversions into a failure.
            if let Err(e) = self.generate_index() {
                tracing::warn!("Index rebuild failed: {:#}", e);
            }
        }

        self.metrics.log_summary();
        Ok(report)
    }

    /// Fan jobs out over a semaphore-bounded pool and fan completions back in
    /// at their submission index.
    async fn run_pool(
        &self,
        jobs: Vec<ConversionJob>,
        workers: usize,
    ) -> Result<Vec<GenerationResult>, BatchError> {
        let total = jobs.len();
        let semaphore = Arc::new(Semaphore::new(workers));
        let mut join_set = JoinSet::new();

        for (index, job) in jobs.into_iter().enumerate() {
            let generator = self.clone();
            let semaphore = Arc::clone(&semaphore);
            join_set.spawn(async move {
                // The semaphore lives for the whole batch and is never
                // closed.
                let _permit = semaphore
                    .acquire_owned()
                    .await
                    .expect("pool semaphore closed");
                let result = generator.generate(&job.source, job.selection).await;
                (index, result)
            });
        }

        let mut slots: Vec<Option<GenerationResult>> = Vec::with_capacity(total);
        slots.resize_with(total, || None);

        while let Some(joined) = join_set.join_next().await {
            let (index, result) = joined?;
            slots[index] = Some(result);
        }

        Ok(slots
            .into_iter()
            .map(|slot| {
                slot.unwrap_or_else(|| GenerationResult::failed("conversion produced no result"))
            })
            .collect())
    }
}
