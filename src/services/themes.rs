//! Theme vocabulary and stylesheet generation.
//!
//! Stylesheets are shared between every conversion job in a batch, so writes
//! go through a temp-file-and-rename step: many jobs may regenerate the same
//! file near-simultaneously, and because generation is deterministic the
//! redundant overwrites are harmless as long as no reader ever observes a
//! half-written file.

use anyhow::{Context, Result};
use camino::{Utf8Path, Utf8PathBuf};
use std::fmt;
use std::io::Write;
use std::str::FromStr;

use crate::config::BarqueConfig;

/// A named visual style applied to a rendered artifact.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Theme {
    Light,
    Dark,
}

impl Theme {
    pub fn as_str(self) -> &'static str {
        match self {
            Theme::Light => "light",
            Theme::Dark => "dark",
        }
    }

    /// File name of this theme's shared stylesheet in the cache directory.
    pub fn css_file_name(self) -> String {
        format!("{}-theme.css", self.as_str())
    }
}

impl fmt::Display for Theme {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Which themes to generate for a document. `Both` always renders light
/// before dark so artifact ordering is stable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ThemeSelection {
    Light,
    Dark,
    #[default]
    Both,
}

impl ThemeSelection {
    /// The themes in generation order.
    pub fn themes(self) -> &'static [Theme] {
        match self {
            ThemeSelection::Light => &[Theme::Light],
            ThemeSelection::Dark => &[Theme::Dark],
            ThemeSelection::Both => &[Theme::Light, Theme::Dark],
        }
    }

    pub fn includes(self, theme: Theme) -> bool {
        self.themes().contains(&theme)
    }
}

impl FromStr for ThemeSelection {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "light" => Ok(ThemeSelection::Light),
            "dark" => Ok(ThemeSelection::Dark),
            "both" => Ok(ThemeSelection::Both),
            other => Err(format!(
                "invalid theme '{other}' (expected 'light', 'dark', or 'both')"
            )),
        }
    }
}

impl fmt::Display for ThemeSelection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ThemeSelection::Light => "light",
            ThemeSelection::Dark => "dark",
            ThemeSelection::Both => "both",
        };
        f.write_str(s)
    }
}

/// Stylesheet generation, injectable so tests can substitute a fake and so a
/// project can swap in hand-written CSS.
pub trait StylesheetSource: Send + Sync {
    /// Full CSS text for one theme.
    fn stylesheet(&self, theme: Theme, config: &BarqueConfig) -> String;
}

/// Default stylesheet generator driven by the configured theme color maps and
/// styling section. Output is a pure function of the configuration, which is
/// what makes concurrent redundant writes safe.
#[derive(Debug, Default, Clone)]
pub struct CssThemeRenderer;

impl CssThemeRenderer {
    pub fn new() -> Self {
        Self
    }

    fn color<'a>(map: &'a indexmap::IndexMap<String, String>, key: &str, fallback: &'a str) -> &'a str {
        map.get(key).map(String::as_str).unwrap_or(fallback)
    }
}

impl StylesheetSource for CssThemeRenderer {
    fn stylesheet(&self, theme: Theme, config: &BarqueConfig) -> String {
        let colors = match theme {
            Theme::Light => &config.light_theme,
            Theme::Dark => &config.dark_theme,
        };

        let background = Self::color(colors, "background", "#ffffff");
        let text = Self::color(colors, "text", "#1a1a1a");
        let accent = Self::color(colors, "accent", "#2563eb");
        let code_bg = Self::color(colors, "code_bg", background);
        let border = Self::color(colors, "border", text);

        format!(
            "\
body {{
  background-color: {background};
  color: {text};
  font-family: {font_family};
  font-size: {font_size};
  line-height: {line_height};
  max-width: {max_width};
  margin: 0 auto;
  padding: 2em;
}}

h1, h2, h3, h4, h5, h6 {{
  color: {text};
  border-bottom: 1px solid {border};
}}

a {{
  color: {accent};
}}

pre, code {{
  background-color: {code_bg};
  border-radius: 4px;
}}

pre {{
  padding: 1em;
  overflow-x: auto;
}}

blockquote {{
  border-left: 4px solid {accent};
  margin-left: 0;
  padding-left: 1em;
}}

table {{
  border-collapse: collapse;
}}

th, td {{
  border: 1px solid {border};
  padding: 0.4em 0.8em;
}}
",
            font_family = config.font_family,
            font_size = config.base_font_size,
            line_height = config.line_height,
            max_width = config.max_width,
        )
    }
}

/// Write a theme stylesheet into `dir`, atomically.
///
/// The content goes to a uniquely named temp file in the same directory and is
/// renamed into place, so a concurrent reader sees either the old complete
/// file or the new complete file, never a torn write.
pub fn write_stylesheet(dir: &Utf8Path, theme: Theme, css: &str) -> Result<Utf8PathBuf> {
    std::fs::create_dir_all(dir)
        .with_context(|| format!("Failed to create stylesheet directory: {dir}"))?;

    let target = dir.join(theme.css_file_name());

    let mut temp = tempfile::NamedTempFile::new_in(dir)
        .with_context(|| format!("Failed to create temp stylesheet in {dir}"))?;
    temp.write_all(css.as_bytes())
        .with_context(|| format!("Failed to write stylesheet for theme {theme}"))?;
    temp.persist(&target)
        .with_context(|| format!("Failed to move stylesheet into place: {target}"))?;

    tracing::debug!("Wrote stylesheet {}", target);
    Ok(target)
}
