use anyhow::{Context, Result};
use camino::{Utf8Path, Utf8PathBuf};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs;
use thiserror::Error;

pub mod delivery;

pub use delivery::{
    DefaultsConfig, DeliveryConfig, DeliveryConfigLoader, DeliveryPolicy, DeliveryProvider,
    ResendConfig, SmtpConfig,
};

/// Directory name of the project-local configuration, searched upward from the
/// working directory.
pub const PROJECT_CONFIG_DIR: &str = ".barque";

/// File name of the main configuration inside [`PROJECT_CONFIG_DIR`] and the
/// user configuration directory.
pub const CONFIG_FILE_NAME: &str = "config.yaml";

/// Math engines accepted by the `math.engine` setting.
pub const MATH_ENGINES: &[&str] = &["mathjax", "katex", "latex"];

/// Color keys every theme map must provide.
pub const REQUIRED_THEME_KEYS: &[&str] = &["background", "text", "accent"];

/// Configuration failure carrying every problem found in one pass, so a user
/// sees all of them at once instead of fixing one per run.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("invalid configuration:\n  - {}", .0.join("\n  - "))]
    Invalid(Vec<String>),
}

impl ConfigError {
    /// The individual problem messages.
    pub fn messages(&self) -> &[String] {
        match self {
            Self::Invalid(messages) => messages,
        }
    }
}

/// Snapshot of process environment variables.
///
/// Threaded explicitly through resolution so tests can construct arbitrary
/// environments without touching real process state.
#[derive(Debug, Clone, Default)]
pub struct Environment {
    vars: HashMap<String, String>,
}

impl Environment {
    pub fn from_process() -> Self {
        Self {
            vars: std::env::vars().collect(),
        }
    }

    pub fn from_pairs<I, K, V>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        Self {
            vars: pairs
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        }
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.vars.get(key).map(String::as_str)
    }
}

/// Fully resolved BARQUE configuration.
///
/// Produced once by [`ConfigResolver::resolve`] and treated as immutable from
/// then on; every component receives it by reference instead of consulting any
/// ambient state.
#[derive(Debug, Clone, PartialEq)]
pub struct BarqueConfig {
    // Project information
    pub project_name: String,
    pub project_description: String,
    pub project_author: String,

    // Output settings
    pub output_dir: Utf8PathBuf,
    pub organize_by_theme: bool,
    pub create_index: bool,

    // Styling
    pub font_family: String,
    pub base_font_size: String,
    pub line_height: f64,
    pub max_width: String,

    // Theme color maps
    pub light_theme: IndexMap<String, String>,
    pub dark_theme: IndexMap<String, String>,

    // Mathematical formulas
    pub math_enabled: bool,
    pub math_engine: String,
    pub math_inline_delimiter: String,
    pub math_display_delimiter: String,

    // Processing
    pub workers: usize,
    pub cache_enabled: bool,
    pub incremental_build: bool,

    // User preferences
    pub default_theme: String,
}

fn default_light_theme() -> IndexMap<String, String> {
    IndexMap::from([
        ("background".to_string(), "#ffffff".to_string()),
        ("text".to_string(), "#1a1a1a".to_string()),
        ("accent".to_string(), "#2563eb".to_string()),
        ("code_bg".to_string(), "#f0f0f0".to_string()),
        ("border".to_string(), "#e0e0e0".to_string()),
    ])
}

fn default_dark_theme() -> IndexMap<String, String> {
    IndexMap::from([
        ("background".to_string(), "#1a1a1a".to_string()),
        ("text".to_string(), "#e8e8e8".to_string()),
        ("accent".to_string(), "#60a5fa".to_string()),
        ("code_bg".to_string(), "#2d2d2d".to_string()),
        ("border".to_string(), "#3d3d3d".to_string()),
    ])
}

impl Default for BarqueConfig {
    fn default() -> Self {
        Self {
            project_name: "Untitled".to_string(),
            project_description: String::new(),
            project_author: String::new(),
            output_dir: Utf8PathBuf::from("./output"),
            organize_by_theme: true,
            create_index: true,
            font_family: "Inter, -apple-system, BlinkMacSystemFont, sans-serif".to_string(),
            base_font_size: "14px".to_string(),
            line_height: 1.6,
            max_width: "900px".to_string(),
            light_theme: default_light_theme(),
            dark_theme: default_dark_theme(),
            math_enabled: true,
            math_engine: "mathjax".to_string(),
            math_inline_delimiter: "$".to_string(),
            math_display_delimiter: "$$".to_string(),
            workers: 4,
            cache_enabled: true,
            incremental_build: false,
            default_theme: "both".to_string(),
        }
    }
}

impl BarqueConfig {
    /// Append every validation problem to `errors` instead of failing on the
    /// first one.
    fn validate_into(&self, errors: &mut Vec<String>) {
        if self.output_dir.as_str().is_empty() {
            errors.push("Output directory not specified".to_string());
        }

        if !MATH_ENGINES.contains(&self.math_engine.as_str()) {
            errors.push(format!("Invalid math engine: {}", self.math_engine));
        }

        if self.workers < 1 {
            errors.push(format!("Workers must be >= 1, got {}", self.workers));
        }

        for (theme_name, theme_map) in [("light", &self.light_theme), ("dark", &self.dark_theme)] {
            for key in REQUIRED_THEME_KEYS {
                if !theme_map.contains_key(*key) {
                    errors.push(format!("Missing key '{key}' in {theme_name}_theme"));
                }
            }
        }

        if !["light", "dark", "both"].contains(&self.default_theme.as_str()) {
            errors.push(format!("Invalid default theme: {}", self.default_theme));
        }
    }

    /// Validate a finished configuration, aggregating all problems.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let mut errors = Vec::new();
        self.validate_into(&mut errors);
        if errors.is_empty() {
            Ok(())
        } else {
            Err(ConfigError::Invalid(errors))
        }
    }

    /// Serialize to the on-disk YAML layout.
    pub fn to_yaml(&self) -> Result<String> {
        serde_yaml_ng::to_string(&ConfigPatch::from_config(self))
            .context("Failed to serialize configuration to YAML")
    }

    /// Write the configuration to a file, creating parent directories.
    pub fn save(&self, path: &Utf8Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create config directory: {parent}"))?;
        }
        fs::write(path, self.to_yaml()?).with_context(|| format!("Failed to write config: {path}"))?;
        tracing::info!("Saved configuration to {}", path);
        Ok(())
    }

    /// Default configuration as a YAML string, used by `barque init`.
    pub fn default_yaml() -> String {
        // The default structure contains only strings, numbers, and bools.
        Self::default()
            .to_yaml()
            .expect("default config serializes")
    }
}

#[derive(Debug, Default, Clone, Serialize, Deserialize)]
struct ProjectPatch {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    author: Option<String>,
}

#[derive(Debug, Default, Clone, Serialize, Deserialize)]
struct OutputPatch {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    directory: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    organize_by_theme: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    create_index: Option<bool>,
}

#[derive(Debug, Default, Clone, Serialize, Deserialize)]
struct StylingPatch {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    font_family: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    base_font_size: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    line_height: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    max_width: Option<String>,
}

#[derive(Debug, Default, Clone, Serialize, Deserialize)]
struct MathPatch {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    enabled: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    engine: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    inline_delimiter: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    display_delimiter: Option<String>,
}

#[derive(Debug, Default, Clone, Serialize, Deserialize)]
struct ProcessingPatch {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    workers: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    cache_enabled: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    incremental_build: Option<bool>,
}

#[derive(Debug, Default, Clone, Serialize, Deserialize)]
struct PreferencesPatch {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    default_theme: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    default_output_dir: Option<String>,
}

/// One layer of configuration.
///
/// Every field is optional; a layer only overrides what it explicitly sets and
/// everything else falls through to the layer below. Theme color maps merge
/// per key, not per map. The same structure doubles as the on-disk YAML layout
/// (a fully populated patch is a complete config file).
#[derive(Debug, Default, Clone, Serialize, Deserialize)]
pub struct ConfigPatch {
    #[serde(default)]
    project: ProjectPatch,
    #[serde(default)]
    output: OutputPatch,
    #[serde(default)]
    styling: StylingPatch,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    light_theme: Option<IndexMap<String, String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    dark_theme: Option<IndexMap<String, String>>,
    #[serde(default)]
    math: MathPatch,
    #[serde(default)]
    processing: ProcessingPatch,
    #[serde(default)]
    preferences: PreferencesPatch,
}

impl ConfigPatch {
    /// Overlay this layer onto `config`, field by field.
    pub fn apply(&self, config: &mut BarqueConfig) {
        if let Some(v) = &self.project.name {
            config.project_name = v.clone();
        }
        if let Some(v) = &self.project.description {
            config.project_description = v.clone();
        }
        if let Some(v) = &self.project.author {
            config.project_author = v.clone();
        }

        // Preferences sit below the output section within the same layer, so
        // an explicit output.directory wins over default_output_dir.
        if let Some(v) = &self.preferences.default_output_dir {
            config.output_dir = Utf8PathBuf::from(v);
        }
        if let Some(v) = &self.preferences.default_theme {
            config.default_theme = v.clone();
        }

        if let Some(v) = &self.output.directory {
            config.output_dir = Utf8PathBuf::from(v);
        }
        if let Some(v) = self.output.organize_by_theme {
            config.organize_by_theme = v;
        }
        if let Some(v) = self.output.create_index {
            config.create_index = v;
        }

        if let Some(v) = &self.styling.font_family {
            config.font_family = v.clone();
        }
        if let Some(v) = &self.styling.base_font_size {
            config.base_font_size = v.clone();
        }
        if let Some(v) = self.styling.line_height {
            config.line_height = v;
        }
        if let Some(v) = &self.styling.max_width {
            config.max_width = v.clone();
        }

        if let Some(map) = &self.light_theme {
            for (key, value) in map {
                config.light_theme.insert(key.clone(), value.clone());
            }
        }
        if let Some(map) = &self.dark_theme {
            for (key, value) in map {
                config.dark_theme.insert(key.clone(), value.clone());
            }
        }

        if let Some(v) = self.math.enabled {
            config.math_enabled = v;
        }
        if let Some(v) = &self.math.engine {
            config.math_engine = v.clone();
        }
        if let Some(v) = &self.math.inline_delimiter {
            config.math_inline_delimiter = v.clone();
        }
        if let Some(v) = &self.math.display_delimiter {
            config.math_display_delimiter = v.clone();
        }

        if let Some(v) = self.processing.workers {
            config.workers = v;
        }
        if let Some(v) = self.processing.cache_enabled {
            config.cache_enabled = v;
        }
        if let Some(v) = self.processing.incremental_build {
            config.incremental_build = v;
        }
    }

    /// Build the environment layer. Malformed values are reported through
    /// `errors` and treated as unset.
    pub fn from_env(env: &Environment, errors: &mut Vec<String>) -> Self {
        let mut patch = Self::default();

        patch.project.name = env.get("BARQUE_PROJECT_NAME").map(str::to_string);
        patch.output.directory = env.get("BARQUE_OUTPUT_DIR").map(str::to_string);
        patch.math.engine = env.get("BARQUE_MATH_ENGINE").map(str::to_string);

        patch.output.create_index = parse_env_bool(env, "BARQUE_CREATE_INDEX", errors);
        patch.math.enabled = parse_env_bool(env, "BARQUE_MATH_ENABLED", errors);
        patch.processing.cache_enabled = parse_env_bool(env, "BARQUE_CACHE_ENABLED", errors);

        if let Some(raw) = env.get("BARQUE_WORKERS") {
            match raw.parse::<usize>() {
                Ok(workers) => patch.processing.workers = Some(workers),
                Err(_) => errors.push(format!("BARQUE_WORKERS must be an integer, got '{raw}'")),
            }
        }

        patch
    }

    /// A fully populated patch mirroring `config`, used for serialization.
    fn from_config(config: &BarqueConfig) -> Self {
        Self {
            project: ProjectPatch {
                name: Some(config.project_name.clone()),
                description: Some(config.project_description.clone()),
                author: Some(config.project_author.clone()),
            },
            output: OutputPatch {
                directory: Some(config.output_dir.to_string()),
                organize_by_theme: Some(config.organize_by_theme),
                create_index: Some(config.create_index),
            },
            styling: StylingPatch {
                font_family: Some(config.font_family.clone()),
                base_font_size: Some(config.base_font_size.clone()),
                line_height: Some(config.line_height),
                max_width: Some(config.max_width.clone()),
            },
            light_theme: Some(config.light_theme.clone()),
            dark_theme: Some(config.dark_theme.clone()),
            math: MathPatch {
                enabled: Some(config.math_enabled),
                engine: Some(config.math_engine.clone()),
                inline_delimiter: Some(config.math_inline_delimiter.clone()),
                display_delimiter: Some(config.math_display_delimiter.clone()),
            },
            processing: ProcessingPatch {
                workers: Some(config.workers),
                cache_enabled: Some(config.cache_enabled),
                incremental_build: Some(config.incremental_build),
            },
            preferences: PreferencesPatch {
                default_theme: Some(config.default_theme.clone()),
                default_output_dir: None,
            },
        }
    }
}

fn parse_env_bool(env: &Environment, key: &str, errors: &mut Vec<String>) -> Option<bool> {
    let raw = env.get(key)?;
    match raw.to_ascii_lowercase().as_str() {
        "true" | "1" | "yes" => Some(true),
        "false" | "0" | "no" => Some(false),
        _ => {
            errors.push(format!("{key} must be a boolean, got '{raw}'"));
            None
        }
    }
}

/// Explicit per-invocation overrides, the highest-precedence layer.
#[derive(Debug, Clone, Default)]
pub struct Overrides {
    pub output_dir: Option<Utf8PathBuf>,
    pub workers: Option<usize>,
}

/// Loads and merges configuration from all sources.
///
/// Precedence, highest wins: explicit overrides > explicit config file >
/// environment variables > project config file (found by walking upward from
/// the start directory) > user config file > built-in defaults.
#[derive(Debug, Clone)]
pub struct ConfigResolver {
    start_dir: Utf8PathBuf,
    user_config_dir: Utf8PathBuf,
}

impl ConfigResolver {
    /// Resolver rooted at the current working directory and the platform user
    /// configuration directory.
    pub fn new() -> Result<Self> {
        let cwd = Utf8PathBuf::from_path_buf(
            std::env::current_dir().context("Failed to read working directory")?,
        )
        .map_err(|p| anyhow::anyhow!("Working directory is not UTF-8: {}", p.display()))?;

        let user_config_dir = dirs::config_dir()
            .and_then(|p| Utf8PathBuf::from_path_buf(p).ok())
            .map(|p| p.join("barque"))
            .context("Failed to determine user config directory")?;

        Ok(Self {
            start_dir: cwd,
            user_config_dir,
        })
    }

    /// Resolver with explicit roots, for tests and embedding.
    pub fn with_roots(start_dir: Utf8PathBuf, user_config_dir: Utf8PathBuf) -> Self {
        Self {
            start_dir,
            user_config_dir,
        }
    }

    /// Path of the user-level config file.
    pub fn user_config_file(&self) -> Utf8PathBuf {
        self.user_config_dir.join(CONFIG_FILE_NAME)
    }

    /// Walk from the start directory upward looking for `.barque/config.yaml`.
    pub fn find_project_config(&self) -> Option<Utf8PathBuf> {
        let mut dir = Some(self.start_dir.as_path());
        while let Some(current) = dir {
            let candidate = current.join(PROJECT_CONFIG_DIR).join(CONFIG_FILE_NAME);
            if candidate.exists() {
                return Some(candidate);
            }
            dir = current.parent();
        }
        None
    }

    /// Merge all configuration sources into one immutable snapshot.
    ///
    /// Every problem found along the way (unreadable files, malformed YAML,
    /// bad environment values, validation failures) is aggregated into a
    /// single [`ConfigError::Invalid`].
    pub fn resolve(
        &self,
        explicit: Option<&Utf8Path>,
        env: &Environment,
        overrides: &Overrides,
    ) -> Result<BarqueConfig, ConfigError> {
        let mut errors = Vec::new();
        let mut config = BarqueConfig::default();

        if let Some(patch) = load_patch(&self.user_config_file(), &mut errors) {
            patch.apply(&mut config);
        }

        if let Some(project_file) = self.find_project_config() {
            tracing::debug!("Using project config {}", project_file);
            if let Some(patch) = load_patch(&project_file, &mut errors) {
                patch.apply(&mut config);
            }
        }

        ConfigPatch::from_env(env, &mut errors).apply(&mut config);

        if let Some(path) = explicit {
            if path.exists() {
                if let Some(patch) = load_patch(path, &mut errors) {
                    patch.apply(&mut config);
                }
            } else {
                errors.push(format!("Config file not found: {path}"));
            }
        }

        if let Some(dir) = &overrides.output_dir {
            config.output_dir = dir.clone();
        }
        if let Some(workers) = overrides.workers {
            // Programmatic overrides are clamped rather than rejected.
            config.workers = workers.max(1);
        }

        config.validate_into(&mut errors);

        if errors.is_empty() {
            Ok(config)
        } else {
            Err(ConfigError::Invalid(errors))
        }
    }
}

/// Read and parse one layer file. A missing file is simply an absent layer;
/// read or parse failures become error entries.
fn load_patch(path: &Utf8Path, errors: &mut Vec<String>) -> Option<ConfigPatch> {
    if !path.exists() {
        return None;
    }

    let contents = match fs::read_to_string(path) {
        Ok(contents) => contents,
        Err(e) => {
            errors.push(format!("Failed to read config {path}: {e}"));
            return None;
        }
    };

    match serde_yaml_ng::from_str::<ConfigPatch>(&contents) {
        Ok(patch) => Some(patch),
        Err(e) => {
            errors.push(format!("Failed to parse config {path}: {e}"));
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn utf8(dir: &TempDir) -> Utf8PathBuf {
        Utf8PathBuf::try_from(dir.path().to_path_buf()).unwrap()
    }

    fn bare_resolver(dir: &TempDir) -> ConfigResolver {
        let root = utf8(dir);
        ConfigResolver::with_roots(root.join("project"), root.join("userconf"))
    }

    #[test]
    fn test_defaults() {
        let config = BarqueConfig::default();
        assert_eq!(config.project_name, "Untitled");
        assert_eq!(config.workers, 4);
        assert_eq!(config.math_engine, "mathjax");
        assert_eq!(config.light_theme["background"], "#ffffff");
        assert_eq!(config.dark_theme["accent"], "#60a5fa");
        config.validate().unwrap();
    }

    #[test]
    fn test_unset_sources_yield_defaults() {
        let temp = TempDir::new().unwrap();
        let resolver = bare_resolver(&temp);
        let config = resolver
            .resolve(None, &Environment::default(), &Overrides::default())
            .unwrap();
        assert_eq!(config, BarqueConfig::default());
    }

    #[test]
    fn test_patch_is_field_level() {
        let patch: ConfigPatch =
            serde_yaml_ng::from_str("project:\n  name: Reports\nprocessing:\n  workers: 8\n")
                .unwrap();

        let mut config = BarqueConfig::default();
        patch.apply(&mut config);

        assert_eq!(config.project_name, "Reports");
        assert_eq!(config.workers, 8);
        // Fields the patch never mentioned keep their values.
        assert_eq!(config.project_description, "");
        assert!(config.cache_enabled);
    }

    #[test]
    fn test_theme_map_merges_per_key() {
        let patch: ConfigPatch =
            serde_yaml_ng::from_str("light_theme:\n  accent: '#ff0000'\n").unwrap();

        let mut config = BarqueConfig::default();
        patch.apply(&mut config);

        assert_eq!(config.light_theme["accent"], "#ff0000");
        // The rest of the map survives a partial override.
        assert_eq!(config.light_theme["background"], "#ffffff");
        assert_eq!(config.light_theme["code_bg"], "#f0f0f0");
    }

    #[test]
    fn test_env_layer_overrides_project_file() {
        let temp = TempDir::new().unwrap();
        let resolver = bare_resolver(&temp);
        let project_cfg = utf8(&temp).join("project").join(PROJECT_CONFIG_DIR);
        fs::create_dir_all(&project_cfg).unwrap();
        fs::write(
            project_cfg.join(CONFIG_FILE_NAME),
            "project:\n  name: FromProject\nprocessing:\n  workers: 2\n",
        )
        .unwrap();

        let env = Environment::from_pairs([("BARQUE_PROJECT_NAME", "FromEnv")]);
        let config = resolver.resolve(None, &env, &Overrides::default()).unwrap();

        // Env wins where it sets a field; project file wins where env is silent.
        assert_eq!(config.project_name, "FromEnv");
        assert_eq!(config.workers, 2);
    }

    #[test]
    fn test_project_config_found_by_upward_walk() {
        let temp = TempDir::new().unwrap();
        let root = utf8(&temp);
        let nested = root.join("project").join("docs").join("deep");
        fs::create_dir_all(&nested).unwrap();
        let marker = root.join("project").join(PROJECT_CONFIG_DIR);
        fs::create_dir_all(&marker).unwrap();
        fs::write(marker.join(CONFIG_FILE_NAME), "project:\n  name: Walked\n").unwrap();

        let resolver = ConfigResolver::with_roots(nested, root.join("userconf"));
        assert_eq!(
            resolver.find_project_config(),
            Some(marker.join(CONFIG_FILE_NAME))
        );
        let config = resolver
            .resolve(None, &Environment::default(), &Overrides::default())
            .unwrap();
        assert_eq!(config.project_name, "Walked");
    }

    #[test]
    fn test_validation_aggregates_all_errors() {
        let mut config = BarqueConfig::default();
        config.math_engine = "wolfram".to_string();
        config.workers = 0;
        config.light_theme.shift_remove("accent");

        let err = config.validate().unwrap_err();
        let ConfigError::Invalid(errors) = err;
        assert_eq!(errors.len(), 3);
        assert!(errors.iter().any(|e| e.contains("math engine")));
        assert!(errors.iter().any(|e| e.contains("Workers")));
        assert!(errors.iter().any(|e| e.contains("'accent'")));
    }

    #[test]
    fn test_malformed_env_value_is_reported() {
        let temp = TempDir::new().unwrap();
        let resolver = bare_resolver(&temp);
        let env = Environment::from_pairs([("BARQUE_WORKERS", "many")]);

        let err = resolver
            .resolve(None, &env, &Overrides::default())
            .unwrap_err();
        let ConfigError::Invalid(errors) = err;
        assert!(errors.iter().any(|e| e.contains("BARQUE_WORKERS")));
    }

    #[test]
    fn test_missing_explicit_file_is_an_error() {
        let temp = TempDir::new().unwrap();
        let resolver = bare_resolver(&temp);
        let missing = utf8(&temp).join("nope.yaml");

        let err = resolver
            .resolve(
                Some(&missing),
                &Environment::default(),
                &Overrides::default(),
            )
            .unwrap_err();
        let ConfigError::Invalid(errors) = err;
        assert!(errors[0].contains("not found"));
    }

    #[test]
    fn test_override_workers_clamped_to_one() {
        let temp = TempDir::new().unwrap();
        let resolver = bare_resolver(&temp);
        let overrides = Overrides {
            output_dir: None,
            workers: Some(0),
        };

        let config = resolver
            .resolve(None, &Environment::default(), &overrides)
            .unwrap();
        assert_eq!(config.workers, 1);
    }

    #[test]
    fn test_save_and_reload_round_trip() {
        let temp = TempDir::new().unwrap();
        let path = utf8(&temp).join("config.yaml");

        let mut config = BarqueConfig::default();
        config.project_name = "Round Trip".to_string();
        config
            .dark_theme
            .insert("accent".to_string(), "#123456".to_string());
        config.save(&path).unwrap();

        let mut errors = Vec::new();
        let patch = load_patch(&path, &mut errors).unwrap();
        assert!(errors.is_empty());

        let mut reloaded = BarqueConfig::default();
        patch.apply(&mut reloaded);
        assert_eq!(reloaded, config);
    }

    #[test]
    fn test_preferences_feed_defaults_below_output_section() {
        let patch: ConfigPatch = serde_yaml_ng::from_str(
            "preferences:\n  default_theme: dark\n  default_output_dir: ./reports\n",
        )
        .unwrap();
        let mut config = BarqueConfig::default();
        patch.apply(&mut config);
        assert_eq!(config.default_theme, "dark");
        assert_eq!(config.output_dir, Utf8PathBuf::from("./reports"));

        // An explicit output.directory in the same layer wins over the
        // preference.
        let patch: ConfigPatch = serde_yaml_ng::from_str(
            "output:\n  directory: ./explicit\npreferences:\n  default_output_dir: ./pref\n",
        )
        .unwrap();
        let mut config = BarqueConfig::default();
        patch.apply(&mut config);
        assert_eq!(config.output_dir, Utf8PathBuf::from("./explicit"));
    }
}
