pub mod analysis;
pub mod audit;
pub mod batch;
pub mod calibration;
mod cli;
pub mod db;
pub mod pieces;
pub mod reports;
pub mod settings;
pub mod settings_commands;
pub mod utils;

use std::{path::PathBuf, sync::Arc};

use anyhow::{Context, Result};
use clap::Parser;

use analysis::{AnalysisService, ArtifactStore};
use audit::AuditLog;
use batch::BatchProcessor;
use db::Database;
use reports::ReportService;
use settings::{AppSettings, SettingsOverrides, SettingsStore};

pub const DATABASE_FILE: &str = "corroscan.sqlite3";
pub const SETTINGS_FILE: &str = "settings.json";
pub const ARTIFACTS_DIR: &str = "artifacts";

/// Everything the commands need, opened once per data directory.
pub struct AppState {
    pub db: Database,
    pub settings: Arc<SettingsStore>,
    pub data_dir: PathBuf,
    pub audit: AuditLog,
    pub analysis: AnalysisService,
    pub batches: BatchProcessor,
    pub reports: ReportService,
}

impl AppState {
    /// Open the store under `data_dir`. `CORROSCAN_ENDPOINT` and then
    /// `endpoint` override the saved endpoint for this process only.
    pub fn open(data_dir: PathBuf, endpoint: Option<String>) -> Result<Self> {
        Self::open_with(data_dir, SettingsOverrides::from_env().with_endpoint(endpoint))
    }

    pub fn open_with(data_dir: PathBuf, overrides: SettingsOverrides) -> Result<Self> {
        let settings =
            SettingsStore::new(data_dir.join(SETTINGS_FILE))?.with_overrides(overrides);
        settings.get().validate().context("invalid settings")?;
        Self::from_store(data_dir, Arc::new(settings))
    }

    pub fn with_settings(data_dir: PathBuf, settings: AppSettings) -> Result<Self> {
        let settings = SettingsStore::with_settings(data_dir.join(SETTINGS_FILE), settings);
        Self::from_store(data_dir, Arc::new(settings))
    }

    fn from_store(data_dir: PathBuf, settings: Arc<SettingsStore>) -> Result<Self> {
        std::fs::create_dir_all(&data_dir)
            .with_context(|| format!("failed to create data dir {}", data_dir.display()))?;

        let db = Database::new(data_dir.join(DATABASE_FILE))?;
        let audit = AuditLog::new(db.clone(), settings.clone());
        let analysis = AnalysisService::new(
            db.clone(),
            settings.clone(),
            ArtifactStore::new(data_dir.join(ARTIFACTS_DIR)),
            audit.clone(),
        );
        let batches = BatchProcessor::new(
            db.clone(),
            settings.clone(),
            analysis.clone(),
            audit.clone(),
        );
        let reports = ReportService::new(db.clone(), audit.clone());

        Ok(Self {
            db,
            settings,
            data_dir,
            audit,
            analysis,
            batches,
            reports,
        })
    }
}

pub fn run() {
    utils::logging::init(log::LevelFilter::Info);

    let cli = cli::Cli::parse();

    let runtime = match tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
    {
        Ok(runtime) => runtime,
        Err(err) => {
            eprintln!("error: failed to start async runtime: {err}");
            std::process::exit(1);
        }
    };

    if let Err(err) = runtime.block_on(cli::dispatch(cli)) {
        log::error!("{err:#}");
        eprintln!("error: {err:#}");
        std::process::exit(1);
    }
}
