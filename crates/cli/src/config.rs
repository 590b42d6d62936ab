//! Layered configuration: file, then environment, then command line.
//!
//! # Configuration File Format
//!
//! ```toml
//! [canvas]
//! base_url = "https://canvas.example.edu/api/v1"
//! course_id = 1234
//! # access_token is better supplied through CANVAS_ACCESS_TOKEN
//!
//! [mapping]
//! path = "canvas-git-map.csv"
//! lms_column = "canvas_id"
//! vcs_column = "git_id"
//! delimiter = ","
//!
//! [roster]
//! path = "students.lst"
//! member_separator = " "
//! include_groupless = false
//!
//! [broadcast]
//! message = "This assignment is managed by repobee-canvas."
//!
//! [archive]
//! name = "submission"
//! extension = "zip"
//! exclude = [".git", ".hg", ".svn"]
//!
//! [retry]
//! max_attempts = 3
//! initial_delay_ms = 500
//! max_delay_ms = 8000
//! ```
//!
//! A relative `mapping.path` is resolved against the directory holding the
//! configuration file, so a course directory can be moved as a whole.

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{anyhow, bail, Context, Result};
use coursework::{
    Backoff, Broadcast, CourseId, MappingColumns, DEFAULT_LMS_COLUMN, DEFAULT_MEMBER_SEPARATOR,
    DEFAULT_VCS_COLUMN,
};
use serde::{Deserialize, Serialize};

/// Environment variable holding the Canvas access token. Wins over the file.
pub const TOKEN_ENV: &str = "CANVAS_ACCESS_TOKEN";

/// File name of the configuration inside its directory.
pub const CONFIG_FILE_NAME: &str = "config.toml";

/// Default mapping table file name written by the wizards.
pub const DEFAULT_MAPPING_FILE: &str = "canvas-git-map.csv";

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub canvas: CanvasSection,
    pub mapping: MappingSection,
    pub roster: RosterSection,
    pub broadcast: BroadcastSection,
    pub archive: ArchiveSection,
    pub retry: RetrySection,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CanvasSection {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub base_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub course_id: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub access_token: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MappingSection {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub path: Option<PathBuf>,
    pub lms_column: String,
    pub vcs_column: String,
    pub delimiter: char,
}

impl Default for MappingSection {
    fn default() -> Self {
        Self {
            path: None,
            lms_column: DEFAULT_LMS_COLUMN.to_string(),
            vcs_column: DEFAULT_VCS_COLUMN.to_string(),
            delimiter: ',',
        }
    }
}

impl MappingSection {
    pub fn columns(&self) -> Result<MappingColumns> {
        if !self.delimiter.is_ascii() {
            bail!(
                "mapping.delimiter must be a single ASCII character, got '{}'",
                self.delimiter
            );
        }
        Ok(MappingColumns {
            lms_column: self.lms_column.clone(),
            vcs_column: self.vcs_column.clone(),
            delimiter: self.delimiter as u8,
        })
    }

    /// Mapping table path, or an error naming the missing setting.
    pub fn require_path(&self) -> Result<&Path> {
        self.path
            .as_deref()
            .ok_or_else(|| anyhow!("no mapping table configured; set mapping.path or pass --mapping"))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RosterSection {
    pub path: PathBuf,
    pub member_separator: String,
    pub include_groupless: bool,
}

impl Default for RosterSection {
    fn default() -> Self {
        Self {
            path: PathBuf::from("students.lst"),
            member_separator: DEFAULT_MEMBER_SEPARATOR.to_string(),
            include_groupless: false,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BroadcastSection {
    pub message: String,
}

impl Default for BroadcastSection {
    fn default() -> Self {
        Self {
            message: Broadcast::DEFAULT_MESSAGE.to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ArchiveSection {
    pub name: String,
    pub extension: String,
    pub exclude: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub staging_dir: Option<PathBuf>,
}

impl Default for ArchiveSection {
    fn default() -> Self {
        Self {
            name: "submission".to_string(),
            extension: archive::DEFAULT_EXTENSION.to_string(),
            exclude: archive::DEFAULT_EXCLUDES
                .iter()
                .map(|s| s.to_string())
                .collect(),
            staging_dir: None,
        }
    }
}

impl ArchiveSection {
    /// Where archives are written before upload.
    pub fn staging_dir(&self) -> PathBuf {
        self.staging_dir
            .clone()
            .unwrap_or_else(|| std::env::temp_dir().join("coursebridge"))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetrySection {
    pub max_attempts: u32,
    pub initial_delay_ms: u64,
    pub max_delay_ms: u64,
}

impl Default for RetrySection {
    fn default() -> Self {
        let backoff = Backoff::default();
        Self {
            max_attempts: backoff.max_attempts,
            initial_delay_ms: backoff.initial_delay.as_millis() as u64,
            max_delay_ms: backoff.max_delay.as_millis() as u64,
        }
    }
}

impl RetrySection {
    pub fn backoff(&self) -> Backoff {
        Backoff {
            max_attempts: self.max_attempts.max(1),
            initial_delay: Duration::from_millis(self.initial_delay_ms),
            max_delay: Duration::from_millis(self.max_delay_ms),
        }
    }
}

// ---------------------------------------------------------------------------
// Loading
// ---------------------------------------------------------------------------

/// Values given on the command line; `None` leaves the file value alone.
#[derive(Debug, Clone, Default)]
pub struct Overrides {
    pub base_url: Option<String>,
    pub course_id: Option<u64>,
    pub access_token: Option<String>,
    pub mapping: Option<PathBuf>,
}

/// Everything needed to reach one Canvas course.
#[derive(Clone)]
pub struct CanvasSettings {
    pub api_base: String,
    pub course_id: CourseId,
    pub access_token: String,
}

impl std::fmt::Debug for CanvasSettings {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CanvasSettings")
            .field("api_base", &self.api_base)
            .field("course_id", &self.course_id)
            .finish_non_exhaustive()
    }
}

impl Config {
    /// `<config_dir>/coursebridge/config.toml`, if the platform has a config dir.
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|d| d.join("coursebridge").join(CONFIG_FILE_NAME))
    }

    /// Loads the file at `explicit`, or the default file when present.
    ///
    /// An explicitly named file must exist; a missing default file yields the
    /// built-in defaults.
    pub fn load(explicit: Option<&Path>) -> Result<Self> {
        let path = match explicit {
            Some(path) => Some(path.to_path_buf()),
            None => Self::default_path().filter(|p| p.is_file()),
        };
        let Some(path) = path else {
            return Ok(Self::default());
        };
        let text = std::fs::read_to_string(&path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;
        let mut config = Self::parse(&text)
            .with_context(|| format!("Failed to parse config file {}", path.display()))?;
        if let Some(dir) = path.parent() {
            config.resolve_relative_to(dir);
        }
        Ok(config)
    }

    pub fn parse(text: &str) -> Result<Self> {
        Ok(toml::from_str(text)?)
    }

    fn resolve_relative_to(&mut self, dir: &Path) {
        if let Some(path) = &self.mapping.path {
            if path.is_relative() {
                self.mapping.path = Some(dir.join(path));
            }
        }
    }

    /// Applies the environment and then command-line values, so a token
    /// passed with `--access-token` beats `CANVAS_ACCESS_TOKEN`, which beats
    /// the file.
    pub fn apply(&mut self, env_token: Option<String>, overrides: &Overrides) {
        if let Some(token) = env_token.filter(|t| !t.trim().is_empty()) {
            self.canvas.access_token = Some(token);
        }
        if let Some(url) = &overrides.base_url {
            self.canvas.base_url = Some(url.clone());
        }
        if let Some(id) = overrides.course_id {
            self.canvas.course_id = Some(id);
        }
        if let Some(token) = &overrides.access_token {
            self.canvas.access_token = Some(token.clone());
        }
        if let Some(path) = &overrides.mapping {
            self.mapping.path = Some(path.clone());
        }
    }

    /// Canvas connection settings, or an error naming every missing value.
    pub fn canvas_settings(&self) -> Result<CanvasSettings> {
        let mut missing = Vec::new();
        if self.canvas.base_url.is_none() {
            missing.push("canvas.base_url (--base-url)");
        }
        if self.canvas.course_id.is_none() {
            missing.push("canvas.course_id (--course-id)");
        }
        if self.canvas.access_token.is_none() {
            missing.push("canvas.access_token (--access-token or CANVAS_ACCESS_TOKEN)");
        }
        match (
            &self.canvas.base_url,
            self.canvas.course_id,
            &self.canvas.access_token,
        ) {
            (Some(base_url), Some(course_id), Some(token)) => Ok(CanvasSettings {
                api_base: base_url.clone(),
                course_id: CourseId::new(course_id),
                access_token: token.clone(),
            }),
            _ => bail!("missing configuration: {}", missing.join(", ")),
        }
    }

    /// Serialises the configuration, leaving the access token out.
    pub fn to_toml_without_token(&self) -> Result<String> {
        let mut copy = self.clone();
        copy.canvas.access_token = None;
        Ok(toml::to_string_pretty(&copy)?)
    }
}
