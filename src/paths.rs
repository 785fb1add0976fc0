//! Application path management for portable and installed modes.
//!
//! - **Dev mode** (debug builds): `config.yaml` in the current working
//!   directory wins, everything else lives next to it.
//! - **Portable mode**: a `.portable` marker file next to the executable
//!   keeps all data files in the executable's directory.
//! - **Installed mode** (default): data lives in the platform data directory
//!   (`%APPDATA%\Soundscape Surface`, `~/.local/share/Soundscape Surface`).

use anyhow::Context;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Application name used for directories in installed mode
const APP_NAME: &str = "Soundscape Surface";

const CONFIG_FILE: &str = "config.yaml";
const EXAMPLE_CONFIG_FILE: &str = "config.example.yaml";
const STATE_FILE: &str = "state.xml";

/// Application paths for config, state document and logs.
#[derive(Debug, Clone)]
pub struct AppPaths {
    /// Path to the YAML configuration file
    pub config: PathBuf,
    /// Path to the XML state document
    pub state_file: PathBuf,
    /// Path to the logs directory
    pub logs_dir: PathBuf,
    /// Whether running in portable mode (files next to exe)
    pub is_portable: bool,
}

impl AppPaths {
    /// All files inside one directory
    pub fn in_dir(dir: &Path, is_portable: bool) -> Self {
        Self {
            config: dir.join(CONFIG_FILE),
            state_file: dir.join(STATE_FILE),
            logs_dir: dir.join("logs"),
            is_portable,
        }
    }

    /// Detect the appropriate paths based on environment.
    ///
    /// Called before logging is initialized, so diagnostics go to stderr.
    pub fn detect() -> Self {
        let exe_dir = exe_dir();

        #[cfg(debug_assertions)]
        {
            let cwd = std::env::current_dir().unwrap_or_else(|_| PathBuf::from("."));
            if cwd.join(CONFIG_FILE).exists() {
                eprintln!("[paths] Running in DEV mode (config.yaml found in {})", cwd.display());
                // Treat dev mode like portable
                return Self::in_dir(&cwd, true);
            }
        }

        if exe_dir.join(".portable").exists() {
            #[cfg(debug_assertions)]
            eprintln!("[paths] Running in PORTABLE mode (.portable marker found)");
            return Self::in_dir(&exe_dir, true);
        }

        let app_data = dirs::data_dir()
            .unwrap_or_else(|| {
                eprintln!("[paths] WARNING: no data directory, falling back to exe dir");
                exe_dir.clone()
            })
            .join(APP_NAME);

        #[cfg(debug_assertions)]
        eprintln!("[paths] Running in INSTALLED mode (data dir: {})", app_data.display());

        Self::in_dir(&app_data, false)
    }

    /// Get the base directory (for displaying in logs)
    pub fn base_dir(&self) -> PathBuf {
        self.config
            .parent()
            .map(|p| p.to_path_buf())
            .unwrap_or_else(|| PathBuf::from("."))
    }

    /// Ensure all required directories exist.
    ///
    /// In installed mode, also copies `config.example.yaml` to the config
    /// location if the config file doesn't exist.
    pub fn ensure_directories(&self) -> anyhow::Result<()> {
        if !self.logs_dir.exists() {
            debug!("Creating logs directory: {}", self.logs_dir.display());
            std::fs::create_dir_all(&self.logs_dir)?;
        }

        if let Some(state_parent) = self.state_file.parent() {
            if !state_parent.as_os_str().is_empty() && !state_parent.exists() {
                debug!("Creating state directory: {}", state_parent.display());
                std::fs::create_dir_all(state_parent)?;
            }
        }

        if !self.is_portable && !self.config.exists() {
            self.copy_example_config()?;
        }

        Ok(())
    }

    /// Copy `config.example.yaml` from next to the exe or from cwd
    fn copy_example_config(&self) -> anyhow::Result<()> {
        let candidates = [
            exe_dir().join(EXAMPLE_CONFIG_FILE),
            PathBuf::from(EXAMPLE_CONFIG_FILE),
        ];

        if let Some(example) = candidates.iter().find(|p| p.exists()) {
            info!("Copying example config {} to {}", example.display(), self.config.display());
            std::fs::copy(example, &self.config).with_context(|| {
                format!(
                    "Failed to copy example config from {} to {}",
                    example.display(),
                    self.config.display()
                )
            })?;
            return Ok(());
        }

        info!("No config found, please create {}", self.config.display());
        Ok(())
    }
}

fn exe_dir() -> PathBuf {
    std::env::current_exe()
        .ok()
        .and_then(|p| p.parent().map(|p| p.to_path_buf()))
        .unwrap_or_else(|| PathBuf::from("."))
}
