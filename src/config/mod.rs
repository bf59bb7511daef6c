use crate::models::{AppSettings, RecentFile, RecentFiles};
use crate::presets::Preset;
use anyhow::{Context, Result};
use camino::{Utf8Path, Utf8PathBuf};
use config::{Config, Environment, File, FileFormat};
use std::fs;

/// Prefix of environment variables overriding `settings.yaml` (e.g. `DOCFMT_API_BASE_URL`).
pub const ENV_PREFIX: &str = "DOCFMT";

/// Configuration manager for loading and saving YAML configuration files.
///
/// Manages three files inside the configuration directory:
/// - `settings.yaml`: service URL, queue limits, logging
/// - `presets.yaml`: user-defined presets appended to the built-in catalog
/// - `recent_files.yaml`: recently formatted documents, newest first
#[derive(Debug, Clone)]
pub struct ConfigManager {
    config_dir: Utf8PathBuf,
    settings_path: Utf8PathBuf,
    presets_path: Utf8PathBuf,
    recent_files_path: Utf8PathBuf,
}

impl ConfigManager {
    /// Create a new ConfigManager with the specified configuration directory.
    ///
    /// # Arguments
    /// * `config_dir` - Directory containing configuration files (e.g., "docfmt-data")
    pub fn new<P: AsRef<Utf8Path>>(config_dir: P) -> Result<Self> {
        let config_dir = config_dir.as_ref().to_path_buf();

        // Create config directory if it doesn't exist
        if !config_dir.exists() {
            fs::create_dir_all(&config_dir)
                .with_context(|| format!("Failed to create config directory: {}", config_dir))?;
        }

        Ok(Self {
            settings_path: config_dir.join("settings.yaml"),
            presets_path: config_dir.join("presets.yaml"),
            recent_files_path: config_dir.join("recent_files.yaml"),
            config_dir,
        })
    }

    pub fn config_dir(&self) -> &Utf8Path {
        &self.config_dir
    }

    /// Load application settings.
    ///
    /// Layers, lowest first: built-in defaults, `settings.yaml` (optional),
    /// `DOCFMT_*` environment variables.
    pub fn load_settings(&self) -> Result<AppSettings> {
        self.load_settings_with(Environment::with_prefix(ENV_PREFIX))
    }

    fn load_settings_with(&self, environment: Environment) -> Result<AppSettings> {
        if !self.settings_path.exists() {
            tracing::warn!(
                "Settings file not found at {}, using defaults",
                self.settings_path
            );
        }

        let settings: AppSettings = Config::builder()
            .add_source(
                File::from(self.settings_path.as_std_path())
                    .format(FileFormat::Yaml)
                    .required(false),
            )
            .add_source(environment.try_parsing(true))
            .build()
            .with_context(|| format!("Failed to read settings: {}", self.settings_path))?
            .try_deserialize()
            .with_context(|| format!("Failed to parse settings: {}", self.settings_path))?;

        tracing::info!("Loaded settings (format service at {})", settings.api_base_url);
        Ok(settings)
    }

    /// Save the application settings.
    pub fn save_settings(&self, settings: &AppSettings) -> Result<()> {
        let yaml_string =
            serde_yaml_ng::to_string(settings).context("Failed to serialize settings to YAML")?;

        fs::write(&self.settings_path, yaml_string)
            .with_context(|| format!("Failed to write settings: {}", self.settings_path))?;

        tracing::info!("Saved settings to {}", self.settings_path);
        Ok(())
    }

    /// Load user-defined presets.
    ///
    /// # Returns
    /// The presets in file order, or an empty list if the file doesn't exist
    pub fn load_custom_presets(&self) -> Result<Vec<Preset>> {
        if !self.presets_path.exists() {
            tracing::debug!("No custom presets at {}", self.presets_path);
            return Ok(Vec::new());
        }

        let file_contents = fs::read_to_string(&self.presets_path)
            .with_context(|| format!("Failed to read presets: {}", self.presets_path))?;

        let presets: Vec<Preset> = serde_yaml_ng::from_str(&file_contents)
            .with_context(|| format!("Failed to parse presets: {}", self.presets_path))?;

        tracing::info!(
            "Loaded {} custom preset(s) from {}",
            presets.len(),
            self.presets_path
        );
        Ok(presets)
    }

    pub fn save_custom_presets(&self, presets: &[Preset]) -> Result<()> {
        let yaml_string =
            serde_yaml_ng::to_string(presets).context("Failed to serialize presets to YAML")?;

        fs::write(&self.presets_path, yaml_string)
            .with_context(|| format!("Failed to write presets: {}", self.presets_path))?;

        tracing::info!("Saved {} preset(s) to {}", presets.len(), self.presets_path);
        Ok(())
    }

    /// Load the recent-files list, capped at `limit`.
    pub fn load_recent_files(&self, limit: usize) -> Result<RecentFiles> {
        if !self.recent_files_path.exists() {
            tracing::debug!("No recent files list at {}", self.recent_files_path);
            return Ok(RecentFiles::new(limit));
        }

        let file_contents = fs::read_to_string(&self.recent_files_path).with_context(|| {
            format!("Failed to read recent files: {}", self.recent_files_path)
        })?;

        let entries: Vec<RecentFile> = serde_yaml_ng::from_str(&file_contents).with_context(|| {
            format!("Failed to parse recent files: {}", self.recent_files_path)
        })?;

        Ok(RecentFiles::from_entries(limit, entries))
    }

    pub fn save_recent_files(&self, recent: &RecentFiles) -> Result<()> {
        let yaml_string = serde_yaml_ng::to_string(recent.entries())
            .context("Failed to serialize recent files to YAML")?;

        fs::write(&self.recent_files_path, yaml_string).with_context(|| {
            format!("Failed to write recent files: {}", self.recent_files_path)
        })?;

        tracing::debug!(
            "Saved {} recent file(s) to {}",
            recent.len(),
            self.recent_files_path
        );
        Ok(())
    }
}
