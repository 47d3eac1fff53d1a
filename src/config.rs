//! # Configuration
//!
//! Conversion styles can be redefined in a YAML file. Without one,
//! [`Config::default()`] provides the three built-in [`Style`]s.
//!
//! ## Format
//! ```yaml
//! marker: "🪗"
//! alignment: strict
//! banner: false
//! styles:
//!   - name: bass-only
//!     tag: Bass
//!     steps:
//!       - op: copy-staff
//!         src: 1
//!         tgt: 2
//!       - op: expand-chords
//!         staff: 2
//!       - op: hide-staff
//!         staff: 1
//! ```
//!
//! Every key is optional except the steps of a style. Step names are the
//! kebab-case forms of the [`Transform`] variants.

use crate::error::{PaviaError, Result};
use crate::measure::Alignment;
use crate::pipeline::{Pipeline, Style};
use crate::transform::Transform;
use serde::Deserialize;
use std::collections::HashSet;
use std::path::Path;

/// Appended to the stem of every output file; inputs ending with it are skipped.
pub const DEFAULT_MARKER: &str = "🪗";

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct StyleConfig {
    pub name: String,
    pub tag: String,
    #[serde(default)]
    pub banner: Option<String>,
    pub steps: Vec<Transform>,
}

impl From<Style> for StyleConfig {
    fn from(style: Style) -> Self {
        Self {
            name: style.name().to_string(),
            tag: style.tag().to_string(),
            banner: Some(style.banner().to_string()),
            steps: style.steps(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct Config {
    #[serde(default = "default_marker")]
    pub marker: String,
    #[serde(default)]
    pub alignment: Alignment,
    #[serde(default = "default_banner")]
    pub banner: bool,
    #[serde(default = "default_styles")]
    pub styles: Vec<StyleConfig>,
}

fn default_marker() -> String {
    DEFAULT_MARKER.to_string()
}

fn default_banner() -> bool {
    true
}

fn default_styles() -> Vec<StyleConfig> {
    Style::ALL.into_iter().map(StyleConfig::from).collect()
}

impl Default for Config {
    fn default() -> Self {
        Self {
            marker: default_marker(),
            alignment: Alignment::default(),
            banner: default_banner(),
            styles: default_styles(),
        }
    }
}

impl Config {
    pub fn from_yaml(content: &str) -> Result<Self> {
        let config: Config =
            serde_yaml::from_str(content).map_err(|e| PaviaError::ConfigError(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn load(path: &Path) -> Result<Self> {
        Self::from_yaml(&std::fs::read_to_string(path)?)
    }

    fn validate(&self) -> Result<()> {
        if self.marker.trim().is_empty() {
            return Err(PaviaError::ConfigError("marker must not be empty".to_string()));
        }
        if self.styles.is_empty() {
            return Err(PaviaError::ConfigError("no styles defined".to_string()));
        }
        let mut names = HashSet::new();
        let mut tags = HashSet::new();
        for style in &self.styles {
            if style.steps.is_empty() {
                return Err(PaviaError::ConfigError(format!("style {} has no steps", style.name)));
            }
            if !names.insert(style.name.as_str()) {
                return Err(PaviaError::ConfigError(format!("duplicate style name {}", style.name)));
            }
            // Outputs are named by tag, so two styles sharing one would overwrite each other
            if !tags.insert(style.tag.as_str()) {
                return Err(PaviaError::ConfigError(format!("duplicate style tag {}", style.tag)));
            }
        }
        Ok(())
    }

    pub fn style(&self, name: &str) -> Option<&StyleConfig> {
        self.styles.iter().find(|style| style.name == name)
    }

    /// The pipeline for one style, honouring the banner and alignment settings.
    pub fn pipeline(&self, style: &StyleConfig) -> Pipeline {
        let pipeline =
            Pipeline::new(style.name.as_str(), style.steps.clone()).with_alignment(self.alignment);
        match (&style.banner, self.banner) {
            (Some(text), true) => pipeline.with_banner(text.as_str()),
            _ => pipeline,
        }
    }
}
