//! `corroscan` command line. Every command prints pretty JSON on stdout.

use std::path::PathBuf;

use anyhow::{anyhow, Result};
use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use clap::{Args, Parser, Subcommand};
use serde::Serialize;
use tokio_util::sync::CancellationToken;

use crate::{
    analysis::{self, BackgroundColor, RustColor, SubmissionOptions, SubmitRequest},
    audit, batch, calibration,
    db::{
        models::{CalibrationProfileInput, PieceTypeInput, PieceTypePatch},
        AnalysisQuery, AnalysisStatus, AuditAction, AuditQuery, RegionOfInterest,
    },
    pieces, reports,
    reports::ReportRange,
    settings::DATA_DIR_ENV,
    settings_commands, AppState,
};

#[derive(Debug, Parser)]
#[command(name = "corroscan", version, about = "Corrosion inspection records")]
pub struct Cli {
    /// Directory holding the database, settings and artifacts.
    #[arg(long, global = true, env = DATA_DIR_ENV, default_value = ".corroscan")]
    pub data_dir: PathBuf,

    /// Analysis service URL for this run.
    #[arg(long, global = true)]
    pub endpoint: Option<String>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Submit one image for analysis.
    Analyze {
        image: PathBuf,
        #[command(flatten)]
        submission: SubmissionArgs,
    },
    #[command(subcommand)]
    Analyses(AnalysesCommand),
    #[command(subcommand)]
    Batch(BatchCommand),
    #[command(subcommand)]
    Calibration(CalibrationCommand),
    #[command(subcommand)]
    Pieces(PiecesCommand),
    #[command(subcommand)]
    Audit(AuditCommand),
    #[command(subcommand)]
    Report(ReportCommand),
    #[command(subcommand)]
    Settings(SettingsCommand),
}

#[derive(Debug, Args)]
pub struct SubmissionArgs {
    /// Region of interest as x,y,width,height.
    #[arg(long)]
    roi: Option<RegionOfInterest>,
    /// red, black or white. Defaults to the configured colour.
    #[arg(long)]
    rust_color: Option<RustColor>,
    /// black or white. Defaults to the configured colour.
    #[arg(long)]
    background: Option<BackgroundColor>,
    #[arg(long)]
    piece_type: Option<String>,
}

impl SubmissionArgs {
    fn into_request(self, state: &AppState) -> SubmitRequest {
        let settings = state.settings.get();
        SubmitRequest {
            options: SubmissionOptions {
                roi: self.roi,
                rust_color: self.rust_color.unwrap_or(settings.default_rust_color),
                background_color: self
                    .background
                    .unwrap_or(settings.default_background_color),
            },
            piece_type: self.piece_type,
            batch_id: None,
        }
    }
}

fn parse_day(value: &str) -> Option<NaiveDate> {
    NaiveDate::parse_from_str(value, "%Y-%m-%d").ok()
}

/// RFC 3339 timestamp, or a `YYYY-MM-DD` day taken from its first instant.
fn parse_start(value: &str) -> Result<DateTime<Utc>, String> {
    if let Some(day) = parse_day(value) {
        return Ok(day.and_time(NaiveTime::MIN).and_utc());
    }
    DateTime::parse_from_rfc3339(value)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|err| format!("invalid date '{value}': {err}"))
}

/// RFC 3339 timestamp, or a `YYYY-MM-DD` day taken through its last millisecond.
fn parse_end(value: &str) -> Result<DateTime<Utc>, String> {
    if let Some(day) = parse_day(value) {
        let end = NaiveTime::from_hms_milli_opt(23, 59, 59, 999)
            .ok_or_else(|| "invalid end of day".to_string())?;
        return Ok(day.and_time(end).and_utc());
    }
    parse_start(value)
}

#[derive(Debug, Args)]
pub struct FilterArgs {
    #[arg(long)]
    status: Option<AnalysisStatus>,
    #[arg(long)]
    operator: Option<String>,
    #[arg(long, value_parser = parse_start)]
    from: Option<DateTime<Utc>>,
    #[arg(long, value_parser = parse_end)]
    to: Option<DateTime<Utc>>,
    /// Case-insensitive match on filename, piece type or operator.
    #[arg(long)]
    search: Option<String>,
}

impl FilterArgs {
    fn into_query(self, page: Option<usize>, limit: Option<usize>) -> AnalysisQuery {
        AnalysisQuery {
            page,
            limit,
            status: self.status,
            operator: self.operator,
            date_from: self.from,
            date_to: self.to,
            search: self.search,
        }
    }
}

#[derive(Debug, Subcommand)]
pub enum AnalysesCommand {
    List {
        #[arg(long)]
        page: Option<usize>,
        #[arg(long)]
        limit: Option<usize>,
        #[command(flatten)]
        filter: FilterArgs,
    },
    Show {
        id: String,
    },
    /// Change the status of a record.
    Status {
        id: String,
        status: AnalysisStatus,
        #[arg(long)]
        notes: Option<String>,
    },
}

#[derive(Debug, Subcommand)]
pub enum BatchCommand {
    /// Analyze several images under one batch. Ctrl-C stops after the
    /// current image.
    Process {
        #[arg(required = true)]
        files: Vec<PathBuf>,
        #[command(flatten)]
        submission: SubmissionArgs,
    },
    Create {
        name: String,
    },
    Show {
        id: String,
    },
    List,
}

#[derive(Debug, Subcommand)]
pub enum CalibrationCommand {
    Create {
        #[arg(long)]
        name: String,
        #[arg(long)]
        pixels_per_mm: f64,
        #[arg(long)]
        description: Option<String>,
        #[arg(long)]
        reference_image: Option<String>,
        #[arg(long = "default")]
        make_default: bool,
    },
    List,
    /// Make a profile the default one.
    Default {
        id: String,
    },
    Delete {
        id: String,
    },
}

#[derive(Debug, Subcommand)]
pub enum PiecesCommand {
    Create {
        #[arg(long)]
        code: String,
        #[arg(long)]
        name: String,
        #[arg(long)]
        tolerance: f64,
        #[arg(long)]
        description: Option<String>,
        #[arg(long)]
        category: Option<String>,
    },
    List,
    Update {
        id: String,
        #[arg(long)]
        name: Option<String>,
        #[arg(long)]
        tolerance: Option<f64>,
        #[arg(long)]
        description: Option<String>,
        #[arg(long)]
        category: Option<String>,
    },
    Delete {
        id: String,
    },
}

#[derive(Debug, Subcommand)]
pub enum AuditCommand {
    List {
        #[arg(long)]
        action: Option<AuditAction>,
        /// User id or email.
        #[arg(long)]
        user: Option<String>,
        #[arg(long)]
        search: Option<String>,
        #[arg(long, default_value_t = 50)]
        limit: usize,
    },
}

#[derive(Debug, Subcommand)]
pub enum ReportCommand {
    Show {
        #[arg(long, value_parser = parse_start)]
        from: Option<DateTime<Utc>>,
        #[arg(long, value_parser = parse_end)]
        to: Option<DateTime<Utc>>,
    },
    /// Write matching records and a report to a JSON file.
    Export {
        path: PathBuf,
        #[command(flatten)]
        filter: FilterArgs,
    },
}

#[derive(Debug, Subcommand)]
pub enum SettingsCommand {
    Show,
    /// Set a dotted camelCase key, e.g. `thresholds.approved 25`.
    Set { key: String, value: String },
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn emit<T: Serialize>(result: Result<T, String>) -> Result<()> {
    print_json(&result.map_err(|e| anyhow!(e))?)
}

pub async fn dispatch(cli: Cli) -> Result<()> {
    let state = AppState::open(cli.data_dir, cli.endpoint)?;

    match cli.command {
        Command::Analyze { image, submission } => {
            let request = submission.into_request(&state);
            emit(analysis::commands::analyze_image(&state, image, request).await)
        }
        Command::Analyses(command) => match command {
            AnalysesCommand::List {
                page,
                limit,
                filter,
            } => emit(
                analysis::commands::list_analyses(&state, filter.into_query(page, limit)).await,
            ),
            AnalysesCommand::Show { id } => {
                emit(analysis::commands::get_analysis(&state, id).await)
            }
            AnalysesCommand::Status { id, status, notes } => emit(
                analysis::commands::update_analysis_status(&state, id, status, notes).await,
            ),
        },
        Command::Batch(command) => match command {
            BatchCommand::Process { files, submission } => {
                let request = submission.into_request(&state);
                let cancel_token = CancellationToken::new();
                let watcher = {
                    let token = cancel_token.clone();
                    tokio::spawn(async move {
                        if tokio::signal::ctrl_c().await.is_ok() {
                            log::warn!("interrupt received, stopping after the current image");
                            token.cancel();
                        }
                    })
                };
                let result =
                    batch::commands::process_batch(&state, files, request, cancel_token).await;
                watcher.abort();
                emit(result)
            }
            BatchCommand::Create { name } => emit(batch::commands::create_batch(&state, name).await),
            BatchCommand::Show { id } => emit(batch::commands::get_batch(&state, id).await),
            BatchCommand::List => emit(batch::commands::list_batches(&state).await),
        },
        Command::Calibration(command) => match command {
            CalibrationCommand::Create {
                name,
                pixels_per_mm,
                description,
                reference_image,
                make_default,
            } => emit(
                calibration::commands::create_calibration_profile(
                    &state,
                    CalibrationProfileInput {
                        name,
                        description,
                        pixels_per_mm,
                        reference_image_url: reference_image,
                        is_default: make_default,
                    },
                )
                .await,
            ),
            CalibrationCommand::List => {
                emit(calibration::commands::list_calibration_profiles(&state).await)
            }
            CalibrationCommand::Default { id } => {
                emit(calibration::commands::set_default_calibration_profile(&state, id).await)
            }
            CalibrationCommand::Delete { id } => {
                emit(calibration::commands::delete_calibration_profile(&state, id).await)
            }
        },
        Command::Pieces(command) => match command {
            PiecesCommand::Create {
                code,
                name,
                tolerance,
                description,
                category,
            } => emit(
                pieces::commands::create_piece_type(
                    &state,
                    PieceTypeInput {
                        code,
                        name,
                        description,
                        tolerance_percentage: tolerance,
                        category,
                    },
                )
                .await,
            ),
            PiecesCommand::List => emit(pieces::commands::list_piece_types(&state).await),
            PiecesCommand::Update {
                id,
                name,
                tolerance,
                description,
                category,
            } => emit(
                pieces::commands::update_piece_type(
                    &state,
                    id,
                    PieceTypePatch {
                        name,
                        description,
                        tolerance_percentage: tolerance,
                        category,
                    },
                )
                .await,
            ),
            PiecesCommand::Delete { id } => {
                emit(pieces::commands::delete_piece_type(&state, id).await)
            }
        },
        Command::Audit(AuditCommand::List {
            action,
            user,
            search,
            limit,
        }) => emit(
            audit::commands::list_audit_events(
                &state,
                AuditQuery {
                    action,
                    user,
                    search,
                    limit,
                },
            )
            .await,
        ),
        Command::Report(command) => match command {
            ReportCommand::Show { from, to } => {
                emit(reports::commands::get_report(&state, ReportRange { from, to }).await)
            }
            ReportCommand::Export { path, filter } => emit(
                reports::commands::export_report(&state, path, filter.into_query(None, None))
                    .await,
            ),
        },
        Command::Settings(command) => match command {
            SettingsCommand::Show => emit(settings_commands::get_settings(&state)),
            SettingsCommand::Set { key, value } => {
                emit(settings_commands::update_setting(&state, key, value).await)
            }
        },
    }
}
