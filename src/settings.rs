use anyhow::{bail, Context, Result};
use log::warn;
use serde::{Deserialize, Serialize};
use std::{
    fs,
    path::PathBuf,
    sync::{RwLock, RwLockReadGuard, RwLockWriteGuard},
};

use crate::analysis::{BackgroundColor, CorrosionThresholds, RustColor};

pub const ENDPOINT_ENV: &str = "CORROSCAN_ENDPOINT";
pub const DATA_DIR_ENV: &str = "CORROSCAN_DATA_DIR";

const SUPPORTED_LANGUAGES: [&str; 2] = ["pt-BR", "en-US"];

/// Identity stamped on records and audit events.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct OperatorProfile {
    pub id: String,
    pub email: String,
    pub name: String,
}

impl Default for OperatorProfile {
    fn default() -> Self {
        Self {
            id: "local-operator".into(),
            email: "operator@localhost".into(),
            name: "Manual Analysis".into(),
        }
    }
}

/// Simulated analyzer delay window, in milliseconds.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LatencyRange {
    pub min: u64,
    pub max: u64,
}

impl Default for LatencyRange {
    fn default() -> Self {
        Self {
            min: 2000,
            max: 5000,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct AppSettings {
    /// Remote analysis service. `None` selects the simulated analyzer.
    pub analysis_endpoint: Option<String>,
    pub request_timeout_ms: u64,
    pub thresholds: CorrosionThresholds,
    pub items_per_page: usize,
    pub language: String,
    pub theme: String,
    pub notifications: bool,
    pub default_rust_color: RustColor,
    pub default_background_color: BackgroundColor,
    pub operator: OperatorProfile,
    /// Seed an empty store with simulated records on first listing.
    pub demo_data: bool,
    pub simulated_latency_ms: LatencyRange,
}

impl Default for AppSettings {
    fn default() -> Self {
        Self {
            analysis_endpoint: None,
            request_timeout_ms: 30_000,
            thresholds: CorrosionThresholds::default(),
            items_per_page: 10,
            language: "pt-BR".into(),
            theme: "light".into(),
            notifications: true,
            default_rust_color: RustColor::Red,
            default_background_color: BackgroundColor::Black,
            operator: OperatorProfile::default(),
            demo_data: true,
            simulated_latency_ms: LatencyRange::default(),
        }
    }
}

impl AppSettings {
    pub fn validate(&self) -> Result<()> {
        self.thresholds.validate()?;

        if let Some(endpoint) = &self.analysis_endpoint {
            let url = reqwest::Url::parse(endpoint)
                .with_context(|| format!("invalid analysis endpoint '{endpoint}'"))?;
            if !matches!(url.scheme(), "http" | "https") {
                bail!("analysis endpoint must use http or https");
            }
        }
        if self.request_timeout_ms == 0 {
            bail!("request timeout must be greater than zero");
        }
        if self.items_per_page == 0 {
            bail!("items per page must be greater than zero");
        }
        if !SUPPORTED_LANGUAGES.contains(&self.language.as_str()) {
            bail!(
                "unsupported language '{}' (expected one of {})",
                self.language,
                SUPPORTED_LANGUAGES.join(", ")
            );
        }
        if self.simulated_latency_ms.min > self.simulated_latency_ms.max {
            bail!("simulated latency min must not exceed max");
        }
        Ok(())
    }
}

/// Process-only values layered over the stored settings. Never written to
/// the settings file.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SettingsOverrides {
    /// `Some(None)` forces the simulated analyzer.
    pub analysis_endpoint: Option<Option<String>>,
}

impl SettingsOverrides {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Read `CORROSCAN_ENDPOINT` through `lookup`. A blank value disables the
    /// remote analyzer.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let analysis_endpoint = lookup(ENDPOINT_ENV).map(|raw| {
            let endpoint = raw.trim();
            (!endpoint.is_empty()).then(|| endpoint.to_string())
        });
        Self { analysis_endpoint }
    }

    /// An explicit endpoint wins over anything read from the environment.
    pub fn with_endpoint(mut self, endpoint: Option<String>) -> Self {
        if let Some(endpoint) = endpoint {
            self.analysis_endpoint = Some(Some(endpoint));
        }
        self
    }

    pub fn apply(&self, settings: &mut AppSettings) {
        if let Some(endpoint) = &self.analysis_endpoint {
            settings.analysis_endpoint = endpoint.clone();
        }
    }
}

pub struct SettingsStore {
    path: PathBuf,
    data: RwLock<AppSettings>,
    overrides: SettingsOverrides,
}

impl SettingsStore {
    pub fn new(path: PathBuf) -> Result<Self> {
        let data = if path.exists() {
            let contents = fs::read_to_string(&path)
                .with_context(|| format!("Failed to read settings from {}", path.display()))?;
            match serde_json::from_str(&contents) {
                Ok(settings) => settings,
                Err(err) => {
                    warn!(
                        "Ignoring malformed settings at {}: {err}; using defaults",
                        path.display()
                    );
                    AppSettings::default()
                }
            }
        } else {
            AppSettings::default()
        };

        Ok(Self {
            path,
            data: RwLock::new(data),
            overrides: SettingsOverrides::default(),
        })
    }

    /// Store that never touches disk until `update` is called.
    pub fn with_settings(path: PathBuf, settings: AppSettings) -> Self {
        Self {
            path,
            data: RwLock::new(settings),
            overrides: SettingsOverrides::default(),
        }
    }

    pub fn with_overrides(mut self, overrides: SettingsOverrides) -> Self {
        self.overrides = overrides;
        self
    }

    /// Effective settings: the stored values with the overrides applied.
    pub fn get(&self) -> AppSettings {
        let mut settings = self.stored();
        self.overrides.apply(&mut settings);
        settings
    }

    /// What the settings file holds, without overrides.
    pub fn stored(&self) -> AppSettings {
        self.read().clone()
    }

    /// Mutate, validate and persist. Invalid edits leave the stored settings
    /// untouched. Returns the effective settings.
    pub fn update<F>(&self, edit: F) -> Result<AppSettings>
    where
        F: FnOnce(&mut AppSettings),
    {
        self.try_update(|settings| {
            edit(settings);
            Ok(())
        })
    }

    /// Like [`update`](Self::update) for edits that can fail. The edit sees
    /// the stored values only.
    pub fn try_update<F>(&self, edit: F) -> Result<AppSettings>
    where
        F: FnOnce(&mut AppSettings) -> Result<()>,
    {
        let mut guard = self.write();
        let mut candidate = guard.clone();
        edit(&mut candidate)?;
        candidate.validate()?;
        self.persist(&candidate)?;
        *guard = candidate.clone();
        drop(guard);

        self.overrides.apply(&mut candidate);
        Ok(candidate)
    }

    pub fn reload(&self) -> Result<()> {
        let contents = fs::read_to_string(&self.path)?;
        let data: AppSettings = serde_json::from_str(&contents)?;
        *self.write() = data;
        Ok(())
    }

    fn persist(&self, data: &AppSettings) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }
        let serialized = serde_json::to_string_pretty(data)?;
        fs::write(&self.path, serialized)
            .with_context(|| format!("Failed to write settings to {}", self.path.display()))
    }

    fn read(&self) -> RwLockReadGuard<'_, AppSettings> {
        self.data.read().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn write(&self) -> RwLockWriteGuard<'_, AppSettings> {
        self.data
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}
