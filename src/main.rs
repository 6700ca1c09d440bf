/*!
 * s3nav CLI - browse S3-compatible object stores as a folder tree
 */

use clap::{Args, Parser, Subcommand, ValueEnum};
use dialoguer::{theme::ColorfulTheme, Confirm, Input, Select};
use indicatif::{ProgressBar, ProgressStyle};
use s3nav::{
    cli_style::{
        self, entry_label, format_bytes, listing_table, location_line, print_error, print_info,
        print_success, print_warning, section_header, upload_summary_table, Icons, Theme,
    },
    config::{BrowserConfig, LogLevel},
    core::{
        navigator::{self, LargeFolderChoice, LargeFolderPrompt, NavigationSnapshot, Navigator, Step},
        session::{Intent, Session, SessionEvent, SessionHandle},
        upload::{UploadProgress, UploadReport, Uploader},
        Location,
    },
    error::{BrowserError, Result, EXIT_SUCCESS},
    local::{collect_sources, total_size},
    logging,
    protocol::{
        parse_location,
        s3::{ObjectStore, S3Client},
    },
};
use std::cell::Cell;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tokio::runtime::Runtime;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

#[derive(Parser)]
#[command(name = "s3nav")]
#[command(version, about = "Browse S3-compatible object stores as a folder tree", long_about = None)]
struct Cli {
    /// Configuration file (default: <config dir>/s3nav/config.toml)
    #[arg(short = 'c', long = "config", value_name = "FILE", global = true)]
    config: Option<PathBuf>,

    #[command(flatten)]
    store: StoreArgs,

    /// Log level
    #[arg(long = "log-level", value_enum, global = true)]
    log_level: Option<LogLevelArg>,

    /// Write JSON logs to this file instead of stderr
    #[arg(long = "log", value_name = "FILE", global = true)]
    log: Option<PathBuf>,

    /// Verbose output (debug logging)
    #[arg(short = 'v', long = "verbose", global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Args)]
struct StoreArgs {
    /// S3-compatible endpoint, e.g. http://localhost:9000
    #[arg(long, value_name = "URL", global = true)]
    endpoint: Option<String>,

    /// Signing region
    #[arg(long, global = true)]
    region: Option<String>,

    /// Access key ID
    #[arg(long = "access-key", global = true)]
    access_key: Option<String>,

    /// Secret access key
    #[arg(long = "secret-key", global = true)]
    secret_key: Option<String>,

    /// Use virtual-hosted style addressing instead of path style
    #[arg(long = "virtual-hosted", global = true)]
    virtual_hosted: bool,

    /// Per-call timeout in seconds (0 disables it)
    #[arg(long, value_name = "SECONDS", global = true)]
    timeout: Option<u64>,
}

#[derive(Subcommand)]
enum Commands {
    /// Browse interactively (the default)
    Browse {
        /// Start here instead of the bucket list (s3://bucket/prefix/)
        start: Option<String>,
    },

    /// List one location
    Ls {
        /// s3://bucket/prefix/
        uri: String,

        /// For large folders show the first page of everything instead of folders only
        #[arg(long)]
        first_items: bool,

        /// Print the listing as JSON
        #[arg(long)]
        json: bool,
    },

    /// Upload local files or folders into a location
    Upload {
        /// Files or folders to upload
        #[arg(required = true)]
        paths: Vec<PathBuf>,

        /// Destination (s3://bucket/prefix/)
        #[arg(long = "to", value_name = "URI")]
        to: String,

        /// Skip the confirmation prompt
        #[arg(short = 'y', long)]
        yes: bool,
    },

    /// Write the effective configuration to the config file
    Init {
        /// Overwrite an existing file without asking
        #[arg(long)]
        force: bool,
    },
}

#[derive(Copy, Clone, PartialEq, Eq, PartialOrd, Ord, ValueEnum)]
enum LogLevelArg {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

impl From<LogLevelArg> for LogLevel {
    fn from(arg: LogLevelArg) -> Self {
        match arg {
            LogLevelArg::Error => LogLevel::Error,
            LogLevelArg::Warn => LogLevel::Warn,
            LogLevelArg::Info => LogLevel::Info,
            LogLevelArg::Debug => LogLevel::Debug,
            LogLevelArg::Trace => LogLevel::Trace,
        }
    }
}

fn main() {
    let code = match run() {
        Ok(()) => EXIT_SUCCESS,
        Err(e) => {
            eprintln!("Error: {}", e);
            e.exit_code()
        }
    };
    std::process::exit(code);
}

fn run() -> Result<()> {
    let cli = Cli::parse();

    let mut config = BrowserConfig::load(cli.config.as_deref()).unwrap_or_else(|e| {
        cli_style::print_warning(&format!("Failed to load config file: {}", e));
        BrowserConfig::default()
    });
    apply_overrides(&mut config, &cli);

    if let Err(e) = logging::init_logging(&config.logging) {
        eprintln!("Warning: Failed to initialize logging: {}", e);
    }

    match cli.command.unwrap_or(Commands::Browse { start: None }) {
        Commands::Browse { start } => browse(&config, start.as_deref()),
        Commands::Ls {
            uri,
            first_items,
            json,
        } => {
            let choice = if first_items {
                LargeFolderChoice::FirstItems
            } else {
                LargeFolderChoice::FoldersOnly
            };
            new_runtime()?.block_on(list(&config, &uri, choice, json))
        }
        Commands::Upload { paths, to, yes } => {
            new_runtime()?.block_on(upload(&config, &paths, &to, yes))
        }
        Commands::Init { force } => init_config(&config, cli.config.as_deref(), force),
    }
}

/// Flags win over the config file
fn apply_overrides(config: &mut BrowserConfig, cli: &Cli) {
    let store = &cli.store;
    if let Some(endpoint) = &store.endpoint {
        config.store.endpoint = Some(endpoint.clone());
    }
    if let Some(region) = &store.region {
        config.store.region = region.clone();
    }
    if let Some(access_key) = &store.access_key {
        config.store.access_key = Some(access_key.clone());
    }
    if let Some(secret_key) = &store.secret_key {
        config.store.secret_key = Some(secret_key.clone());
    }
    if store.virtual_hosted {
        config.store.force_path_style = false;
    }
    if let Some(timeout) = store.timeout {
        config.store.timeout_seconds = timeout;
    }

    if let Some(level) = cli.log_level {
        config.logging.level = level.into();
    }
    if let Some(log) = &cli.log {
        config.logging.file = Some(log.clone());
    }
    config.logging.verbose |= cli.verbose;
}

fn new_runtime() -> Result<Runtime> {
    Runtime::new()
        .map_err(|e| BrowserError::Config(format!("Failed to start async runtime: {}", e)))
}

async fn connect_store(config: &BrowserConfig) -> Result<Arc<dyn ObjectStore>> {
    let client = S3Client::new(config.store.clone()).await?;
    Ok(Arc::new(client))
}

/// Build a client and make sure the endpoint answers
async fn connect_checked(config: &BrowserConfig) -> Result<Arc<dyn ObjectStore>> {
    let client = S3Client::new(config.store.clone()).await?;
    client.test_connection(&CancellationToken::new()).await?;
    Ok(Arc::new(client))
}

fn spinner(message: &str) -> ProgressBar {
    let bar = ProgressBar::new_spinner();
    bar.set_style(
        ProgressStyle::default_spinner()
            .template("{spinner:.cyan} {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner()),
    );
    bar.set_message(message.to_string());
    bar.enable_steady_tick(Duration::from_millis(100));
    bar
}

fn upload_bar(total: usize) -> ProgressBar {
    let bar = ProgressBar::new(total as u64);
    bar.set_style(
        ProgressStyle::default_bar()
            .template("{msg}\n{spinner:.green} [{elapsed_precise}] [{wide_bar:.cyan/blue}] {pos}/{len} files")
            .unwrap_or_else(|_| ProgressStyle::default_bar())
            .progress_chars("#>-"),
    );
    bar
}

fn show_progress(bar: &ProgressBar, progress: &UploadProgress) {
    bar.set_position(progress.completed as u64);
    let icon = if progress.outcome.is_success() {
        Icons::SUCCESS
    } else {
        Icons::ERROR
    };
    bar.set_message(format!("{} {}", icon, progress.key));
}

/// Print the batch summary; any failed file makes the run partial
fn finish_upload(report: &UploadReport) -> Result<()> {
    println!("{}", upload_summary_table(report));
    if report.is_complete_success() {
        print_success(&format!("Uploaded {} files", report.succeeded));
        Ok(())
    } else {
        Err(BrowserError::PartialUpload {
            succeeded: report.succeeded,
            failed: report.failed.len(),
        })
    }
}

fn large_folder_warning(prompt: &LargeFolderPrompt) -> String {
    format!(
        "{} holds at least {} entries",
        prompt.location, prompt.estimate
    )
}

// ============================================================================
// ls
// ============================================================================

async fn list(
    config: &BrowserConfig,
    uri: &str,
    choice: LargeFolderChoice,
    json: bool,
) -> Result<()> {
    let location = parse_location(uri)?;
    let store = connect_store(config).await?;
    let token = CancellationToken::new();

    let mut nav = Navigator::new(config.navigation.clone());
    let request = if location.is_root() {
        nav.connect()?
    } else {
        nav.open(location)?
    };

    let mut step = navigator::drive(&mut nav, store.as_ref(), request, &token).await;
    if let Step::Prompt(prompt) = &step {
        print_warning(&large_folder_warning(prompt));
        let request = nav.choose(choice)?;
        step = navigator::drive(&mut nav, store.as_ref(), request, &token).await;
    }
    if let Step::Failed(err) = step {
        return Err(err.into());
    }

    let snapshot = nav.snapshot();
    if json {
        println!("{}", serde_json::to_string_pretty(&snapshot)?);
    } else {
        let shown = snapshot.entries.iter().filter(|e| !e.is_synthetic()).count();
        println!("{}", Theme::muted(location_line(&snapshot.location, shown)));
        println!("{}", listing_table(&snapshot.entries));
    }
    Ok(())
}

// ============================================================================
// upload
// ============================================================================

async fn upload(config: &BrowserConfig, paths: &[PathBuf], to: &str, yes: bool) -> Result<()> {
    let destination = parse_location(to)?;
    if destination.is_root() {
        return Err(BrowserError::InvalidUri(format!(
            "{} does not name a bucket",
            to
        )));
    }

    let sources = collect_sources(paths)?;
    if sources.is_empty() {
        print_warning("Nothing to upload");
        return Ok(());
    }

    if !yes && !confirm_upload(&sources, &destination)? {
        print_info("Upload cancelled");
        return Ok(());
    }

    let store = connect_checked(config).await?;
    let uploader = Uploader::new(store);

    let bar = upload_bar(sources.len());
    let (tx, mut rx) = mpsc::unbounded_channel();
    let watcher = {
        let bar = bar.clone();
        tokio::spawn(async move {
            while let Some(progress) = rx.recv().await {
                show_progress(&bar, &progress);
            }
        })
    };

    let job = uploader.upload(sources, destination, Some(tx)).await;
    let _ = watcher.await;
    bar.finish_and_clear();

    finish_upload(&job?.report())
}

fn confirm_upload(sources: &[PathBuf], destination: &Location) -> Result<bool> {
    let prompt = format!(
        "Upload {} files ({}) to {}?",
        sources.len(),
        format_bytes(total_size(sources)),
        destination
    );
    Ok(Confirm::with_theme(&ColorfulTheme::default())
        .with_prompt(prompt)
        .default(true)
        .interact()?)
}

// ============================================================================
// init
// ============================================================================

fn init_config(config: &BrowserConfig, path: Option<&Path>, force: bool) -> Result<()> {
    let path = path
        .map(Path::to_path_buf)
        .or_else(BrowserConfig::default_path)
        .ok_or_else(|| BrowserError::Config("No config directory on this platform".to_string()))?;

    if path.exists() && !force {
        let overwrite = Confirm::with_theme(&ColorfulTheme::default())
            .with_prompt(format!("{} exists. Overwrite?", path.display()))
            .default(false)
            .interact()?;
        if !overwrite {
            print_info("Left the existing configuration untouched");
            return Ok(());
        }
    }

    config.to_file(&path)?;
    print_success(&format!("Configuration written to {}", path.display()));
    Ok(())
}

// ============================================================================
// browse
// ============================================================================

fn browse(config: &BrowserConfig, start: Option<&str>) -> Result<()> {
    let start = start.map(parse_location).transpose()?;

    let runtime = new_runtime()?;
    let store = runtime.block_on(connect_store(config))?;
    cli_style::print_banner(config.store.endpoint_label());

    let (handle, task) = {
        let _guard = runtime.enter();
        Session::spawn(store, config.navigation.clone())
    };

    let mut browser = Browser {
        runtime: &runtime,
        handle,
        theme: ColorfulTheme::default(),
        snapshot: None,
    };

    let first = match start {
        Some(location) if !location.is_root() => Intent::Open(location),
        _ => Intent::Connect,
    };
    let result = browser.request(first).and_then(|_| browser.run());

    let _ = runtime.block_on(browser.handle.send(Intent::Shutdown));
    let _ = runtime.block_on(task);
    result
}

enum Action {
    Open(usize),
    Upload,
    Reload,
    Reconnect,
    Quit,
}

/// Blocking terminal front end over a running session
struct Browser<'a> {
    runtime: &'a Runtime,
    handle: SessionHandle,
    theme: ColorfulTheme,
    snapshot: Option<NavigationSnapshot>,
}

impl Browser<'_> {
    fn run(&mut self) -> Result<()> {
        while let Some(snapshot) = self.snapshot.clone() {
            match self.pick(&snapshot)? {
                Action::Open(index) => self.request(Intent::Select(index))?,
                Action::Upload => self.upload_here(&snapshot.location)?,
                Action::Reload => self.request(Intent::Reload)?,
                Action::Reconnect => self.request(Intent::Connect)?,
                Action::Quit => break,
            }
        }
        Ok(())
    }

    fn pick(&self, snapshot: &NavigationSnapshot) -> Result<Action> {
        let title = if snapshot.location.is_root() {
            "Buckets".to_string()
        } else {
            snapshot.location.to_string()
        };
        section_header(&title);
        let shown = snapshot.entries.iter().filter(|e| !e.is_synthetic()).count();
        println!("{}", Theme::muted(location_line(&snapshot.location, shown)));

        let mut items: Vec<String> = snapshot.entries.iter().map(entry_label).collect();
        let mut actions: Vec<Action> = (0..items.len()).map(Action::Open).collect();

        if !snapshot.connected {
            items.push(format!("{} Reconnect", Icons::ARROW_RIGHT));
            actions.push(Action::Reconnect);
        } else {
            if !snapshot.location.is_root() {
                items.push(format!("{} Upload files here", Icons::ARROW_RIGHT));
                actions.push(Action::Upload);
            }
            items.push(format!("{} Reload", Icons::ARROW_RIGHT));
            actions.push(Action::Reload);
        }
        items.push(format!("{} Quit", Icons::ARROW_RIGHT));
        actions.push(Action::Quit);

        let selection = Select::with_theme(&self.theme)
            .with_prompt("Open")
            .items(&items)
            .default(0)
            .max_length(20)
            .interact_opt()?;

        Ok(selection
            .and_then(|index| actions.into_iter().nth(index))
            .unwrap_or(Action::Quit))
    }

    /// Send an intent and handle everything up to the next settled snapshot
    fn request(&mut self, intent: Intent) -> Result<()> {
        self.runtime
            .block_on(self.handle.send(intent))
            .map_err(|e| BrowserError::Terminal(e.to_string()))?;

        let interrupted = Cell::new(false);
        let interrupt = async {
            ctrl_c().await;
            interrupted.set(true);
        };

        let spinner = spinner("Loading... (Ctrl-C to cancel)");
        let events = self
            .runtime
            .block_on(self.handle.recv_until_settled_or_cancel(interrupt));
        spinner.finish_and_clear();

        let events = events.ok_or_else(session_closed)?;
        if interrupted.get() {
            print_info("Cancelled");
        }
        let mut follow_up = None;
        for event in events {
            if let Some(intent) = self.handle_event(event)? {
                follow_up = Some(intent);
            }
        }

        match follow_up {
            Some(intent) => self.request(intent),
            None => Ok(()),
        }
    }

    fn handle_event(&mut self, event: SessionEvent) -> Result<Option<Intent>> {
        match event {
            SessionEvent::Snapshot(snapshot) => self.snapshot = Some(snapshot),
            SessionEvent::LargeFolder(prompt) => return self.ask_large_folder(&prompt).map(Some),
            SessionEvent::FileInfo(info) => {
                print_info(&format!(
                    "{} {}  s3://{}/{}",
                    Icons::FILE,
                    info.name,
                    info.bucket,
                    info.key
                ));
            }
            SessionEvent::Error(message) => print_error(&message, None),
            SessionEvent::UploadProgress(_) | SessionEvent::UploadFinished(_) => {}
        }
        Ok(None)
    }

    fn ask_large_folder(&self, prompt: &LargeFolderPrompt) -> Result<Intent> {
        print_warning(&large_folder_warning(prompt));

        let options = [
            "Show folders only".to_string(),
            "Show the first items".to_string(),
            "Cancel".to_string(),
        ];
        let selection = Select::with_theme(&self.theme)
            .with_prompt("This folder is large")
            .items(&options)
            .default(0)
            .interact_opt()?;

        Ok(match selection {
            Some(0) => Intent::Choose(LargeFolderChoice::FoldersOnly),
            Some(1) => Intent::Choose(LargeFolderChoice::FirstItems),
            _ => Intent::Dismiss,
        })
    }

    fn upload_here(&mut self, destination: &Location) -> Result<()> {
        let input: String = Input::with_theme(&self.theme)
            .with_prompt("Local files or folders (space separated)")
            .allow_empty(true)
            .interact_text()?;
        let paths: Vec<PathBuf> = input.split_whitespace().map(PathBuf::from).collect();
        if paths.is_empty() {
            return Ok(());
        }

        let sources = match collect_sources(&paths) {
            Ok(sources) if !sources.is_empty() => sources,
            Ok(_) => {
                print_warning("Nothing to upload");
                return Ok(());
            }
            Err(e) => {
                print_error(&e.to_string(), Some("Check the path and try again"));
                return Ok(());
            }
        };

        if !confirm_upload(&sources, destination)? {
            return Ok(());
        }

        let bar = upload_bar(sources.len());
        self.runtime
            .block_on(self.handle.send(Intent::Upload(sources)))
            .map_err(|e| BrowserError::Terminal(e.to_string()))?;

        loop {
            match self.runtime.block_on(self.handle.next_event()) {
                Some(SessionEvent::UploadProgress(progress)) => show_progress(&bar, &progress),
                Some(SessionEvent::UploadFinished(report)) => {
                    bar.finish_and_clear();
                    if let Err(e) = finish_upload(&report) {
                        print_warning(&e.to_string());
                    }
                    break;
                }
                Some(SessionEvent::Error(message)) => {
                    bar.abandon();
                    print_error(&message, None);
                    return Ok(());
                }
                Some(SessionEvent::Snapshot(snapshot)) => self.snapshot = Some(snapshot),
                Some(_) => {}
                None => return Err(session_closed()),
            }
        }

        // The session refreshes the destination once the batch is done
        let events = self
            .runtime
            .block_on(self.handle.recv_until_settled())
            .ok_or_else(session_closed)?;
        for event in events {
            self.handle_event(event)?;
        }
        Ok(())
    }
}

/// Resolves on the first Ctrl-C; never if the handler cannot be installed
async fn ctrl_c() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::debug!(error = %e, "ctrl-c handler unavailable");
        std::future::pending::<()>().await;
    }
}

fn session_closed() -> BrowserError {
    BrowserError::Terminal("browser session ended unexpectedly".to_string())
}
