//! schedboard CLI - Installation schedule dashboard
//!
//! Queries, reports and exports over a schedule workbook.

mod commands;
mod exit;

use std::fs;
use std::path::{Path, PathBuf};
use std::process;

use anyhow::{bail, Context, Result};
use chrono::{Local, NaiveDate};
use clap::{Parser, Subcommand, ValueEnum};
use schedboard_core::{ProjectInfo, ScheduleData};
use schedboard_ingest::{ingest_bytes, IngestConfig, IngestOptions, Ingested};
use schedboard_render::{
    output_filename, CsvExporter, Renderer, SummaryExporter, TemplateGenerator, WeeklyReportRenderer,
    WorkbookWriter, XlsxExporter,
};
use tracing::{debug, info};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use crate::exit::ExitCode;

#[derive(Parser)]
#[command(name = "schedboard")]
#[command(author, version, about = "Installation schedule dashboard", long_about = None)]
struct Cli {
    /// Verbose output
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// Schedule workbook; falls back to the first .xlsx in the current directory
    #[arg(short, long, global = true, default_value = "schedule.xlsx", env = "SCHEDBOARD_FILE")]
    file: PathBuf,

    /// Ingest configuration (TOML)
    #[arg(long, global = true, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Reference date for status inference and date windows
    #[arg(long, global = true, value_name = "YYYY-MM-DD", env = "SCHEDBOARD_TODAY")]
    today: Option<NaiveDate>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    #[command(flatten)]
    Query(Query),

    /// Create a blank schedule workbook
    Init {
        /// Output file path
        #[arg(short, long, default_value = "schedule.xlsx")]
        output: PathBuf,

        /// Project name
        #[arg(long)]
        name: Option<String>,

        /// Project code
        #[arg(long)]
        code: Option<String>,

        /// Leave the task and milestone tables empty
        #[arg(long)]
        empty: bool,

        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },
}

/// Commands that read the schedule workbook
#[derive(Subcommand)]
enum Query {
    /// Project status summary
    Status,

    /// Delayed tasks with their risk
    Delay,

    /// Going tasks due within a window
    Upcoming {
        /// Window length in days
        #[arg(short, long, default_value_t = 7)]
        days: i64,
    },

    /// Find tasks by name
    Search {
        /// Case-insensitive name fragment
        keyword: Option<String>,
    },

    /// Weekly report (Markdown)
    Report {
        /// Output file (stdout if not specified)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Workload per owner
    Owner,

    /// Write the schedule out
    Export {
        #[arg(long, value_enum, default_value_t = ExportFormat::Workbook)]
        format: ExportFormat,

        /// Output file (derived from the input name if not specified)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
enum ExportFormat {
    /// The original workbook, refreshed in place
    Workbook,
    /// Flat task list as CSV
    Csv,
    /// Flat task list as a single-sheet workbook
    Xlsx,
    /// Structured project summary
    Json,
}

fn main() -> process::ExitCode {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    match run(cli) {
        Ok(code) => code.into(),
        Err(err) => {
            eprintln!("錯誤: {:#}", err);
            ExitCode::Failure.into()
        }
    }
}

fn init_tracing(verbose: u8) {
    let default_level = match verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(filter)
        .init();
}

fn run(cli: Cli) -> Result<ExitCode> {
    let today = cli.today.unwrap_or_else(|| Local::now().date_naive());
    match cli.command {
        Commands::Init {
            output,
            name,
            code,
            empty,
            force,
        } => init(&output, name.as_deref(), code.as_deref(), empty, force, today),
        Commands::Query(query) => {
            let options = load_options(cli.config.as_deref(), today)?;
            let path = resolve_input(&cli.file)?;
            run_query(query, &path, options, today)
        }
    }
}

fn run_query(query: Query, path: &Path, options: IngestOptions, today: NaiveDate) -> Result<ExitCode> {
    let bytes = fs::read(path).with_context(|| format!("無法讀取 {}", path.display()))?;
    let ingested =
        ingest_bytes(&bytes, &options).with_context(|| format!("無法載入檔案 {}", path.display()))?;
    debug!(diagnostics = ?ingested.diagnostics, "workbook ingested");
    let data = &ingested.data;

    match query {
        Query::Status => print!("{}", commands::status(data)),
        Query::Delay => print!("{}", commands::delay(data)),
        Query::Upcoming { days } => print!("{}", commands::upcoming_list(data, today, days)),
        Query::Search { keyword } => {
            let Some(keyword) = keyword.filter(|k| !k.trim().is_empty()) else {
                bail!("search 命令需要提供關鍵字");
            };
            print!("{}", commands::search_results(data, &keyword));
        }
        Query::Owner => print!("{}", commands::owners(data)),
        Query::Report { output } => {
            let text = WeeklyReportRenderer::new(today).render(data)?;
            match output {
                Some(out) => {
                    fs::write(&out, text).with_context(|| format!("無法寫入 {}", out.display()))?;
                    println!("週報已寫入 {}", out.display());
                }
                None => print!("{}", text),
            }
        }
        Query::Export { format, output } => {
            let out = output.unwrap_or_else(|| default_export_path(path, &data.project, format, today));
            export(format, &bytes, &ingested, options, today, &out)?;
            println!("已匯出 {}", out.display());
        }
    }
    Ok(ExitCode::Success)
}

fn load_options(config: Option<&Path>, today: NaiveDate) -> Result<IngestOptions> {
    let options = IngestOptions::new(today);
    match config {
        Some(path) => {
            let config = IngestConfig::load(path).with_context(|| format!("無法載入設定 {}", path.display()))?;
            Ok(options.with_config(config))
        }
        None => Ok(options),
    }
}

/// The named file, or the first workbook in the current directory
fn resolve_input(file: &Path) -> Result<PathBuf> {
    if file.exists() {
        return Ok(file.to_path_buf());
    }
    let mut candidates: Vec<PathBuf> = fs::read_dir(".")
        .context("無法列出目前目錄")?
        .filter_map(|entry| entry.ok().map(|e| e.path()))
        .filter(|p| p.extension().is_some_and(|ext| ext.eq_ignore_ascii_case("xlsx")))
        .filter(|p| !p.file_name().is_some_and(|n| n.to_string_lossy().starts_with("~$")))
        .collect();
    candidates.sort();
    match candidates.into_iter().next() {
        Some(found) => {
            eprintln!("使用檔案: {}", found.display());
            Ok(found)
        }
        None => bail!("找不到 Excel 檔案 {}，請使用 -f 參數指定檔案路徑", file.display()),
    }
}

fn default_export_path(input: &Path, project: &ProjectInfo, format: ExportFormat, today: NaiveDate) -> PathBuf {
    let stem = input
        .file_stem()
        .map_or_else(|| "schedule".to_string(), |s| s.to_string_lossy().into_owned());
    let name = match format {
        ExportFormat::Workbook => {
            let original = input.file_name().map(|n| n.to_string_lossy().into_owned());
            output_filename(&project.name, today, original.as_deref())
        }
        ExportFormat::Csv => format!("{}_tasks.csv", stem),
        ExportFormat::Xlsx => format!("{}_tasks.xlsx", stem),
        ExportFormat::Json => format!("{}_summary.json", stem),
    };
    input.with_file_name(name)
}

fn export(
    format: ExportFormat,
    original: &[u8],
    ingested: &Ingested,
    options: IngestOptions,
    today: NaiveDate,
    out: &Path,
) -> Result<()> {
    let data = &ingested.data;
    let bytes = match format {
        ExportFormat::Workbook => {
            let written = WorkbookWriter::new(options).write(original, data, today)?;
            info!(report = ?written.report, "workbook patched");
            written.bytes
        }
        ExportFormat::Csv => CsvExporter::new().render(data)?,
        ExportFormat::Xlsx => XlsxExporter::new().render(data)?,
        ExportFormat::Json => {
            let exported_at = today.and_time(Local::now().time());
            SummaryExporter::new(exported_at).render(data)?.into_bytes()
        }
    };
    fs::write(out, bytes).with_context(|| format!("無法寫入 {}", out.display()))
}

fn init(
    output: &Path,
    name: Option<&str>,
    code: Option<&str>,
    empty: bool,
    force: bool,
    today: NaiveDate,
) -> Result<ExitCode> {
    if output.exists() && !force {
        bail!("{} 已存在，使用 --force 覆寫", output.display());
    }
    let data = ScheduleData {
        project: ProjectInfo {
            code: code.unwrap_or_default().to_string(),
            name: name.unwrap_or_default().to_string(),
            start_date: Some(today),
            ..ProjectInfo::default()
        },
        ..ScheduleData::default()
    };
    let mut generator = TemplateGenerator::new().start_date(today);
    if empty {
        generator = generator.without_defaults();
    }
    let bytes = generator.render(&data)?;
    fs::write(output, bytes).with_context(|| format!("無法寫入 {}", output.display()))?;
    println!("已建立 {}", output.display());
    Ok(ExitCode::Success)
}
