use std::path::PathBuf;

use anyhow::Context;
use chrono::{Local, NaiveDate};
use clap::{Args, Parser, Subcommand};
use tracing::{error, info, Level};
use tracing_subscriber::FmtSubscriber;

mod config;
mod db;
mod error;
mod export;
mod filters;
mod import;
mod models;
mod pivot;
mod records;
mod report;
mod sheet;

use config::{Session, Settings};
use error::StatusError;
use filters::{DateWindow, ExportFilters};
use models::{ImportPayload, StatusRecord};
use pivot::PivotTable;

#[derive(Parser)]
#[command(name = "status-matrix")]
#[command(about = "Standup status import, review and export", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create or upgrade the database schema
    InitDb,
    /// Group a standup spreadsheet into one entry per employee per date
    Import {
        /// Workbook (.xlsx, .xls, .xlsb, .ods) or .csv file
        #[arg(long)]
        file: PathBuf,
        /// Year for date headers such as 5-May
        #[arg(long)]
        year: Option<i32>,
        /// Write the upload payload as JSON
        #[arg(long)]
        json_out: Option<PathBuf>,
        /// Store the grouped entries in Postgres
        #[arg(long)]
        persist: bool,
    },
    /// Render the team/user/question by date grid as markdown
    Preview {
        #[command(flatten)]
        source: SourceArgs,
        #[arg(long, default_value_t = 1)]
        page: usize,
        #[arg(long, default_value_t = 4)]
        teams_per_page: usize,
        #[arg(long, default_value = "status-preview.md")]
        out: PathBuf,
    },
    /// Write the grid to an Excel workbook
    Export {
        #[command(flatten)]
        source: SourceArgs,
        /// Defaults to a name derived from the filters
        #[arg(long)]
        out: Option<PathBuf>,
    },
    /// Find the status record behind one user's cell on a given day
    Locate {
        #[command(flatten)]
        source: SourceArgs,
        #[arg(long)]
        date: NaiveDate,
    },
}

#[derive(Args)]
struct SourceArgs {
    /// Status list JSON as served by the status API; reads Postgres when omitted
    #[arg(long)]
    input: Option<PathBuf>,
    #[arg(long)]
    team: Option<String>,
    #[arg(long)]
    user: Option<String>,
    #[arg(long)]
    start_date: Option<NaiveDate>,
    #[arg(long)]
    end_date: Option<NaiveDate>,
    /// YYYY-MM; overrides the start/end range
    #[arg(long)]
    month: Option<String>,
}

impl SourceArgs {
    fn filters(&self) -> ExportFilters {
        ExportFilters {
            team: self.team.clone(),
            user: self.user.clone(),
            start_date: self.start_date,
            end_date: self.end_date,
            month: self.month.clone(),
        }
    }
}

async fn load_records(
    settings: &Settings,
    source: &SourceArgs,
    filters: &ExportFilters,
    window: &DateWindow,
) -> anyhow::Result<Vec<StatusRecord>> {
    match &source.input {
        Some(path) => {
            let records = records::read_records(path)?;
            Ok(records::apply_filters(records, filters, window))
        }
        None => {
            let session = Session::connect(settings).await?;
            Ok(db::fetch_statuses(&session, filters, window).await?)
        }
    }
}

async fn run(cli: Cli, settings: Settings) -> anyhow::Result<()> {
    let today = Local::now().date_naive();

    match cli.command {
        Commands::InitDb => {
            let session = Session::connect(&settings).await?;
            db::init_db(&session).await?;
            println!("Schema ready.");
        }
        Commands::Import {
            file,
            year,
            json_out,
            persist,
        } => {
            let rows = sheet::read_rows(&file)?;
            let entries = import::process_rows(&rows);
            print!("{}", report::summarize_import(&entries));

            if entries.is_empty() {
                return Ok(());
            }

            if let Some(path) = json_out {
                let payload = serde_json::to_string_pretty(&ImportPayload { data: &entries })?;
                std::fs::write(&path, payload)
                    .with_context(|| format!("failed to write {}", path.display()))?;
                println!("Upload payload written to {}.", path.display());
            }

            if persist {
                let session = Session::connect(&settings).await?;
                let year = year.unwrap_or_else(import::current_year);
                let summary = db::upsert_statuses(&session, &entries, year).await?;
                println!(
                    "Successfully processed: {} entries, {} inserted, {} modified, {} skipped",
                    summary.status_entries,
                    summary.inserted_count,
                    summary.modified_count,
                    summary.skipped_count
                );
                println!("Teams: {}", summary.teams_processed.join(", "));
                println!("Users: {}", summary.users_processed.join(", "));
                println!(
                    "Questions: {} ({} responses written)",
                    summary.questions_processed.len(),
                    summary.responses_written
                );
            }
        }
        Commands::Preview {
            source,
            page,
            teams_per_page,
            out,
        } => {
            let filters = source.filters();
            let window = filters.date_window()?;
            let records = load_records(&settings, &source, &filters, &window).await?;
            let questions = pivot::collect_questions(&records);

            let pages = pivot::page_count(&records, teams_per_page);
            let page_records = pivot::page_of_teams(&records, page, teams_per_page);
            let table = PivotTable::build(&page_records, &questions);

            let title = format!("Status Preview (page {} of {})", page, pages.max(1));
            let preview = report::build_preview(&table, questions.len(), &title);
            std::fs::write(&out, preview)
                .with_context(|| format!("failed to write {}", out.display()))?;
            println!("Preview written to {}.", out.display());
        }
        Commands::Export { source, out } => {
            let filters = source.filters();
            let window = filters.export_window(today)?;
            let records = load_records(&settings, &source, &filters, &window).await?;
            if records.is_empty() {
                println!("No data found for the selected criteria.");
                return Ok(());
            }

            let questions = pivot::collect_questions(&records);
            let table = PivotTable::build(&records, &questions);
            let out = out.unwrap_or_else(|| PathBuf::from(filters.export_file_name(today)));
            export::write_workbook(&table, &out)?;
            println!("Report written to {}.", out.display());
        }
        Commands::Locate { source, date } => {
            let Some(user_name) = source.user.clone() else {
                return Err(StatusError::Validation("--user is required".to_string()).into());
            };
            let filters = source.filters();
            let window = DateWindow {
                start: Some(date),
                end: Some(date),
            };
            let records = load_records(&settings, &source, &filters, &window).await?;
            let table = PivotTable::build(&records, &[]);

            let found = table
                .teams
                .iter()
                .flat_map(|team| team.users.iter().map(move |user| (team, user)))
                .filter(|(_, user)| user.name == user_name)
                .filter_map(|(team, user)| {
                    let user_id = user.user_id.as_deref()?;
                    table
                        .record_id(user_id, date)
                        .map(|record_id| (team.name.as_str(), record_id))
                })
                .collect::<Vec<_>>();

            if found.is_empty() {
                println!("No status recorded for {} on {}.", user_name, date);
            }
            for (team, record_id) in found {
                println!("{} / {} on {}: {}", team, user_name, date, record_id);
            }
        }
    }

    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    FmtSubscriber::builder()
        .with_max_level(
            std::env::var("RUST_LOG")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(Level::INFO),
        )
        .with_target(true)
        .init();

    let cli = Cli::parse();
    let settings = Settings::from_env();
    info!(actor = %settings.actor, "status-matrix starting");

    let result = run(cli, settings).await;
    if let Err(err) = &result {
        if let Some(status_err) = err.downcast_ref::<StatusError>() {
            error!(error = %status_err, "{}", status_err.user_message());
        }
    }
    result
}
