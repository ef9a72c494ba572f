use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

use crate::error::ConfigError;

/// A file the driver drops into the pipeline on start-up.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct Source {
    /// Overrides the label derived from the file name.
    #[serde(default)]
    pub name: Option<String>,
    pub path: PathBuf,
}

impl Source {
    /// The same source with `path` made absolute against the working
    /// directory. Item references only accept absolute paths.
    pub fn into_absolute(self) -> Self {
        match std::path::absolute(&self.path) {
            Ok(path) => Self { path, ..self },
            Err(_) => self,
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
#[serde(default)]
pub struct Config {
    /// Edge length, in pixels, of extracted and exported icons.
    pub icon_dimensions: u32,
    pub max_concurrent_items: usize,
    pub event_capacity: usize,
    /// Batch export folder. `None` means the user's downloads directory.
    pub export_dir: Option<PathBuf>,
    pub sources: Vec<Source>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            icon_dimensions: 1024,
            max_concurrent_items: 8,
            event_capacity: 64,
            export_dir: None,
            sources: Vec::new(),
        }
    }
}

/// Loads `path`, falling back to the defaults when the file does not exist.
pub fn load_config<P: AsRef<Path>>(path: P) -> Result<Config, ConfigError> {
    let path = path.as_ref();
    if !path.exists() {
        return Ok(Config::default());
    }
    let content = fs::read_to_string(path)?;
    let config: Config = serde_json::from_str(&content)?;
    Ok(config)
}
