//! `challan` command-line entry point.

use std::io::IsTerminal;
use std::process::ExitCode;

use anyhow::{Context, bail};
use clap::{Parser, Subcommand};
use owo_colors::OwoColorize;

use challan_desktop::display::{format_notice, format_view};
use challan_desktop::types::{ProgressState, TableBody};
use challan_desktop::{
    App, AppSettings, AppsScriptGateway, DataSource, DesktopConfig, KeyValueStore, LocalCache,
    PayloadDecoder, SheetsGateway, SourceConfig, SqliteStore, StatusFilter, ViewModel, ViewObserver,
    WriteGateway,
};

#[derive(Parser)]
#[command(name = "challan")]
#[command(about = "Receive purchase-order lines and delivery challans from a shared sheet")]
#[command(version)]
struct Cli {
    /// Print the view model as JSON instead of a table
    #[arg(long, global = true)]
    json: bool,

    /// Disable colored output
    #[arg(long, global = true)]
    no_color: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List rows, optionally searched and filtered by status
    #[command(visible_alias = "ls")]
    List {
        /// Case-insensitive text to look for in any field
        #[arg(short, long)]
        search: Option<String>,

        /// Status filter: all (open items), all-statuses, or an exact status
        #[arg(long)]
        status: Option<StatusFilter>,
    },

    /// Receive a quantity of one purchase-order line
    Receive {
        /// Item code
        code: String,

        /// Quantity received (a whole number greater than 0)
        quantity: String,
    },

    /// Receive several lines at once as one summary submission
    Bulk {
        /// Lines as CODE=QTY
        #[arg(required = true, value_parser = parse_line)]
        lines: Vec<(String, String)>,
    },

    /// Show the items of one delivery challan
    #[command(visible_alias = "dc")]
    Challan {
        /// Transfer ID of the challan
        transfer_id: String,
    },

    /// Mark a draft delivery challan as completed
    Finalize {
        /// Transfer ID of the challan
        transfer_id: String,
    },

    /// Remove the locally saved dataset
    ClearCache,
}

impl Commands {
    /// Name of the write operation, for commands that need a writable source.
    fn write_operation(&self) -> Option<&'static str> {
        match self {
            Commands::Receive { .. } => Some("receive"),
            Commands::Bulk { .. } => Some("bulk"),
            Commands::Finalize { .. } => Some("finalize"),
            Commands::List { .. } | Commands::Challan { .. } | Commands::ClearCache => None,
        }
    }
}

fn parse_line(raw: &str) -> Result<(String, String), String> {
    match raw.split_once('=') {
        Some((code, qty)) if !code.trim().is_empty() => Ok((code.trim().to_string(), qty.trim().to_string())),
        _ => Err(format!("expected CODE=QTY, got '{raw}'")),
    }
}

/// Reports refresh progress on stderr; tables are printed once at the end.
struct ProgressLog;

impl ViewObserver for ProgressLog {
    fn render(&mut self, view: &ViewModel) {
        tracing::debug!(rows = view.rows.len(), screen = ?view.screen, "view updated");
    }

    fn progress(&mut self, state: ProgressState) {
        match state {
            ProgressState::Running => tracing::info!("refreshing from the sheet"),
            ProgressState::Failed => tracing::warn!("refresh failed"),
            ProgressState::Done | ProgressState::Idle => tracing::debug!(?state, "refresh settled"),
        }
    }
}

struct Output {
    json: bool,
    color: bool,
}

impl Output {
    fn print(&self, view: &ViewModel) -> anyhow::Result<ExitCode> {
        if self.json {
            println!("{}", serde_json::to_string_pretty(view).context("failed to serialize view")?);
        } else {
            print!("{}", format_view(view, self.color));
        }
        Ok(match view.body {
            TableBody::Error(_) => ExitCode::FAILURE,
            _ => ExitCode::SUCCESS,
        })
    }
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> ExitCode {
    challan_observability::init();
    let cli = Cli::parse();
    let color = !cli.no_color && std::io::stdout().is_terminal();

    match run(cli, color).await {
        Ok(code) => code,
        Err(err) => {
            let label = if color { "error:".red().to_string() } else { "error:".to_string() };
            eprintln!("{label} {err:#}");
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli, color: bool) -> anyhow::Result<ExitCode> {
    let config = DesktopConfig::from_env().context("invalid configuration")?;
    if let Some(operation) = cli.command.write_operation() {
        config.require_writable(operation)?;
    }

    let store = match &config.cache_db {
        Some(path) => SqliteStore::at(path),
        None => SqliteStore::new(),
    };
    let cache = LocalCache::new(store, config.cache_key.clone());
    let output = Output { json: cli.json, color };

    if let Commands::ClearCache = cli.command {
        cache.invalidate().await;
        println!("Cleared cached dataset '{}'.", cache.key());
        return Ok(ExitCode::SUCCESS);
    }

    let decoder = PayloadDecoder::new(config.view, config.fields.clone())
        .with_default_columns(config.default_columns.clone());
    let settings = AppSettings::from(&config);

    match &config.source {
        SourceConfig::AppsScript { url, write_mode } => {
            let gateway = AppsScriptGateway::new(url.as_str(), *write_mode, config.timeout, decoder)?;
            let mut app = App::new(gateway, cache, settings).with_observer(ProgressLog);
            match cli.command.write_operation() {
                Some(_) => run_write(&mut app, cli.command, &output).await,
                None => run_read(&mut app, cli.command, &output).await,
            }
        }
        SourceConfig::Sheets {
            base_url,
            spreadsheet_id,
            api_key,
            sheet,
            items_sheet,
        } => {
            let gateway = SheetsGateway::new(
                base_url.as_str(),
                spreadsheet_id.as_str(),
                api_key.as_str(),
                sheet.as_str(),
                items_sheet.as_str(),
                config.timeout,
                decoder,
            )?;
            let mut app = App::new(gateway, cache, settings).with_observer(ProgressLog);
            run_read(&mut app, cli.command, &output).await
        }
    }
}

async fn run_read<G, S>(app: &mut App<G, S>, command: Commands, output: &Output) -> anyhow::Result<ExitCode>
where
    G: DataSource,
    S: KeyValueStore,
{
    app.activate().await;
    match command {
        Commands::List { search, status } => {
            if let Some(search) = search {
                app.set_search(search);
            }
            if let Some(status) = status {
                app.set_status_filter(status);
            }
        }
        Commands::Challan { transfer_id } => app.open_challan(&transfer_id)?,
        other => bail!(
            "'{}' needs a writable data source",
            other.write_operation().unwrap_or("this command")
        ),
    }
    output.print(&app.view())
}

async fn run_write<G, S>(app: &mut App<G, S>, command: Commands, output: &Output) -> anyhow::Result<ExitCode>
where
    G: WriteGateway,
    S: KeyValueStore,
{
    app.activate().await;
    match command {
        Commands::Receive { code, quantity } => {
            app.receive(&code, &quantity).await?;
        }
        Commands::Bulk { lines } => {
            for (code, _) in &lines {
                if !app.session().selection.contains(&code.parse()?) {
                    app.toggle_row(code)?;
                }
            }
            app.create_summary()?;
            for (code, quantity) in &lines {
                app.edit_summary_quantity(code, quantity.as_str())?;
            }
            if !output.json {
                print!("{}", format_view(&app.view(), output.color));
            }
            app.submit_summary().await?;
        }
        Commands::Finalize { transfer_id } => {
            app.finalize(&transfer_id).await?;
        }
        Commands::List { .. } | Commands::Challan { .. } | Commands::ClearCache => {
            bail!("not a write command")
        }
    }

    if let Some(notice) = &app.session().notice {
        eprintln!("{}", format_notice(notice, output.color));
    }
    let mut view = app.view();
    view.notice = None;
    output.print(&view)
}
