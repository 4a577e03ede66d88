use crate::config::AppConfig;
use crate::constants::{CONFIG_FILE_NAME, REPORTS_DIR_NAME};
use crate::models::{Collection, Environment, HistoryEntry};
use crate::runner::RunReport;
use anyhow::{Context, Result};
use std::collections::VecDeque;
use std::fs;
use std::path::{Path, PathBuf};

const MAX_HISTORY: usize = 50;

/// Collection name and folder path, reduced to `[A-Za-z0-9_-]` and joined by `-`
fn report_file_stem(report: &RunReport) -> String {
    let stem = std::iter::once(report.collection_name.as_str())
        .chain(report.folder_path.iter().map(String::as_str))
        .map(|part| {
            part.chars()
                .map(|c| if c.is_ascii_alphanumeric() || c == '-' || c == '_' { c } else { '_' })
                .collect::<String>()
        })
        .collect::<Vec<_>>()
        .join("-");
    if stem.is_empty() {
        "run".to_string()
    } else {
        stem
    }
}

/// Manages request history and file storage
pub struct Storage {
    pub history: VecDeque<HistoryEntry>,
    pub collections: Vec<Collection>,
    pub environments: Vec<Environment>,
    pub current_env: Option<usize>,
    config_dir: PathBuf,
}

impl Storage {
    pub fn new() -> Self {
        Self::with_dir(AppConfig::config_dir())
    }

    /// Storage rooted at `config_dir`; falls back to the built-in samples
    /// when nothing is stored there yet
    pub fn with_dir(config_dir: impl Into<PathBuf>) -> Self {
        let mut storage = Storage {
            history: VecDeque::with_capacity(MAX_HISTORY),
            collections: Vec::new(),
            environments: Vec::new(),
            current_env: None,
            config_dir: config_dir.into(),
        };

        if let Err(e) = storage.load_all() {
            tracing::warn!(dir = %storage.config_dir.display(), error = %e, "Failed to load saved data");
        }
        storage.seed_samples();
        storage
    }

    pub fn config_dir(&self) -> &Path {
        &self.config_dir
    }

    fn seed_samples(&mut self) {
        if self.collections.is_empty() {
            self.collections.push(Collection::sample());
        }
        if self.environments.is_empty() {
            self.environments.push(Environment::sample());
        }
        if self.current_env.is_none() {
            self.current_env = Some(0);
        }
    }

    /// Add entry to history
    pub fn add_to_history(&mut self, entry: HistoryEntry) {
        if self.history.len() >= MAX_HISTORY {
            self.history.pop_back();
        }
        self.history.push_front(entry);
    }

    /// Get current environment
    pub fn current_environment(&self) -> Option<&Environment> {
        self.current_env.and_then(|i| self.environments.get(i))
    }

    /// Cycles through the environments, ending with none selected
    pub fn cycle_environment(&mut self) {
        self.current_env = match self.current_env {
            None if !self.environments.is_empty() => Some(0),
            Some(i) if i + 1 < self.environments.len() => Some(i + 1),
            _ => None,
        };
    }

    /// Ensure a directory exists
    fn ensure_dir(dir: &Path) -> Result<()> {
        if !dir.exists() {
            fs::create_dir_all(dir)
                .with_context(|| format!("failed to create {}", dir.display()))?;
        }
        Ok(())
    }

    /// Save a collection to file
    pub fn save_collection(&self, collection: &Collection) -> Result<PathBuf> {
        Self::ensure_dir(&self.config_dir)?;
        let path = self.config_dir.join(format!("{}.yaml", collection.name));
        let content = serde_yaml::to_string(collection)?;
        fs::write(&path, content).with_context(|| format!("failed to write {}", path.display()))?;
        Ok(path)
    }

    /// Save an environment to file
    pub fn save_environment(&self, environment: &Environment) -> Result<PathBuf> {
        Self::ensure_dir(&self.config_dir)?;
        let path = self
            .config_dir
            .join(format!("{}.env.yaml", environment.name));
        let content = serde_yaml::to_string(environment)?;
        fs::write(&path, content).with_context(|| format!("failed to write {}", path.display()))?;
        Ok(path)
    }

    /// Writes `report` as pretty JSON under the reports directory
    pub fn export_run_report(&self, report: &RunReport) -> Result<PathBuf> {
        let dir = self.config_dir.join(REPORTS_DIR_NAME);
        Self::ensure_dir(&dir)?;

        let stamp = report
            .end_time
            .or(report.start_time)
            .unwrap_or_else(chrono::Utc::now)
            .format("%Y%m%d-%H%M%S");
        let path = dir.join(format!("{}-{}.json", report_file_stem(report), stamp));

        let content = serde_json::to_string_pretty(report)?;
        fs::write(&path, content).with_context(|| format!("failed to write {}", path.display()))?;
        tracing::info!(path = %path.display(), "Run report exported");
        Ok(path)
    }

    /// Load all collections and environments from disk
    pub fn load_all(&mut self) -> Result<()> {
        if !self.config_dir.exists() {
            return Ok(());
        }

        let mut paths: Vec<PathBuf> = fs::read_dir(&self.config_dir)?
            .filter_map(|entry| entry.ok().map(|e| e.path()))
            .filter(|path| path.is_file())
            .collect();
        paths.sort();

        for path in paths {
            let Some(filename) = path.file_name().and_then(|n| n.to_str()) else {
                continue;
            };
            if filename == CONFIG_FILE_NAME {
                continue;
            }

            if filename.ends_with(".env.yaml") {
                match read_yaml::<Environment>(&path) {
                    Ok(env) => self.environments.push(env),
                    Err(e) => tracing::warn!(error = %format!("{:#}", e), "Skipping environment"),
                }
            } else if filename.ends_with(".yaml") {
                match read_yaml::<Collection>(&path) {
                    Ok(col) => self.collections.push(col),
                    Err(e) => tracing::warn!(error = %format!("{:#}", e), "Skipping collection"),
                }
            }
        }

        Ok(())
    }

    /// Get history item by index (0 = most recent)
    pub fn get_history(&self, index: usize) -> Option<&HistoryEntry> {
        self.history.get(index)
    }

    /// History length
    pub fn history_len(&self) -> usize {
        self.history.len()
    }
}

fn read_yaml<T: serde::de::DeserializeOwned>(path: &Path) -> Result<T> {
    let content =
        fs::read_to_string(path).with_context(|| format!("failed to read {}", path.display()))?;
    serde_yaml::from_str(&content).with_context(|| format!("failed to parse {}", path.display()))
}

impl Default for Storage {
    fn default() -> Self {
        Self::new()
    }
}
