//! Run command handler: walk a listing, accept control commands on stdin,
//! retry failures and report.

use std::io::{BufRead, IsTerminal};
use std::sync::Arc;
use std::sync::atomic::Ordering;

use anyhow::{Context, Result, bail};
use archive_fetch::{
    ControllerConfig, ControllerError, DirectoryStore, DomainNormalizer, HtmlListingSource,
    HttpClient, JsonSettingsStore, PageSource, ResilientFetcher, RetrievalController,
    RetryReport, RunHandle, RunState, RunSummary, Settings, SettingsError, SettingsStore,
    StaticPageSource,
};
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::ProcessExit;
use crate::app::{exit_handler, progress_manager, terminal};
use crate::cli::RunArgs;
use crate::output;

/// A line typed on stdin while the run command is active.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum ControlCommand {
    Pause,
    Resume,
    Stop,
    Retry,
    Status,
    Help,
    Empty,
    Unknown(String),
}

impl ControlCommand {
    pub(crate) fn parse(line: &str) -> Self {
        let word = line.trim().to_ascii_lowercase();
        match word.as_str() {
            "" => Self::Empty,
            "pause" | "p" => Self::Pause,
            "resume" | "start" | "r" => Self::Resume,
            "stop" | "s" | "quit" | "q" => Self::Stop,
            "retry" => Self::Retry,
            "status" => Self::Status,
            "help" | "?" => Self::Help,
            _ => Self::Unknown(word),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Flow {
    Continue,
    Exit,
}

/// Applies the run flags on top of the stored settings.
pub(crate) fn apply_run_overrides(mut settings: Settings, args: &RunArgs) -> Settings {
    if let Some(delay) = args.delay {
        settings.inter_download_delay = delay;
    }
    if let Some(page_delay) = args.page_delay {
        settings.inter_page_delay = page_delay;
    }
    if let Some(max_retries) = args.max_retries {
        settings.max_retries = max_retries;
    }
    if let Some(prefix) = &args.prefix {
        settings.target_name_prefix.clone_from(prefix);
    }
    if let Some(host) = &args.canonical_host {
        settings.canonical_host = Some(host.clone());
    }
    if args.no_notify {
        settings.notifications_enabled = false;
    }
    settings
}

pub async fn run_archive_command(args: RunArgs, quiet: bool) -> Result<ProcessExit> {
    let store = match JsonSettingsStore::default_location() {
        Ok(store) => Some(store),
        Err(e) => {
            warn!(error = %e, "settings unavailable, using defaults");
            None
        }
    };
    let stored = store.as_ref().map(SettingsStore::load).unwrap_or_default();
    let settings = apply_run_overrides(stored, &args);
    settings.validate().context("invalid run settings")?;

    if args.save {
        let Some(store) = &store else {
            bail!("cannot save settings: {}", SettingsError::NoConfigDir);
        };
        store.save(&settings)?;
        info!(path = %store.path().display(), "settings saved");
    }

    let client = HttpClient::with_timeout(settings.request_timeout())?;
    let (source, normalizer) = build_source(&args, &settings, &client).await?;
    info!(canonical_host = normalizer.canonical_host(), "mirror links will be normalized");

    let fetcher = ResilientFetcher::new(
        Arc::new(client),
        Arc::new(DirectoryStore::new(args.output_dir.clone())),
    )
    .with_retry_delay(settings.retry_delay())
    .with_attempt_timeout(settings.request_timeout());
    let controller = RetrievalController::new(
        source,
        fetcher,
        normalizer,
        ControllerConfig::from_settings(&settings),
    );

    let use_spinner = terminal::should_use_spinner(
        std::io::stderr().is_terminal(),
        quiet,
        terminal::is_dumb_terminal(),
    );
    let (spinner, spinner_stop) =
        progress_manager::spawn_progress_ui(use_spinner, controller.subscribe());

    let interactive = !args.no_input;
    if interactive && !quiet && std::io::stdin().is_terminal() {
        println!("{}", output::INTERACTIVE_HELP);
    }
    let stop_requested = drive_run(&controller, interactive).await?;

    for pass in 1..=args.retry_failed {
        let Some(result) = retry_pass(&controller, ctrl_c_received()).await else {
            warn!("Interrupt received, abandoning retry passes");
            break;
        };
        let report = result?;
        if report.is_noop() {
            break;
        }
        info!(
            pass,
            succeeded = report.succeeded,
            failed = report.failed,
            "retry pass finished"
        );
    }

    spinner_stop.store(true, Ordering::SeqCst);
    if let Some(handle) = spinner {
        let _ = handle.await;
    }

    let state = controller.state();
    let summary = controller.summary()?;
    output::print_run_summary(state, &controller.progress(), &summary, &args.output_dir);

    if state == RunState::Stopped && !stop_requested {
        warn!("run ended on an error before the listing was finished");
        return Ok(ProcessExit::Failure);
    }
    Ok(exit_handler::determine_exit_outcome(&summary))
}

async fn build_source(
    args: &RunArgs,
    settings: &Settings,
    client: &HttpClient,
) -> Result<(Box<dyn PageSource>, DomainNormalizer)> {
    let canonical = settings.canonical_host.as_deref();
    if let Some(listing_url) = &args.listing_url {
        let source = HtmlListingSource::new(
            client.clone(),
            listing_url,
            settings.mirror_hosts.clone(),
            settings.target_name_prefix.clone(),
        )?;
        let normalizer = match (canonical, source.current_host()) {
            (Some(host), _) | (None, Some(host)) => {
                DomainNormalizer::for_current_host(host, &settings.mirror_hosts)?
            }
            (None, None) => DomainNormalizer::new(&settings.mirror_hosts, None)?,
        };
        return Ok((Box::new(source), normalizer));
    }

    if let Some(manifest) = &args.manifest {
        let source = StaticPageSource::from_manifest(manifest).await?;
        info!(pages = source.page_count(), "manifest loaded");
        let normalizer = DomainNormalizer::new(&settings.mirror_hosts, canonical)?;
        return Ok((Box::new(source), normalizer));
    }

    bail!("either --listing-url or --manifest is required")
}

/// Starts the run and services control commands until it is over.
///
/// Returns whether the operator asked for a stop.
async fn drive_run(controller: &RetrievalController, interactive: bool) -> Result<bool> {
    let mut run = Some(controller.start()?);
    let mut lines = if interactive {
        spawn_stdin_reader()
    } else {
        mpsc::unbounded_channel().1
    };
    let mut stdin_open = interactive;
    let mut ctrl_c_available = true;
    let mut stop_requested = false;

    loop {
        tokio::select! {
            summary = wait_for_run(&mut run) => {
                run = None;
                debug!(
                    succeeded = summary.success_count(),
                    failed = summary.failure_count(),
                    "run task finished"
                );
                if controller.state() != RunState::Idle || !stdin_open {
                    break;
                }
                println!("Run paused. Type `resume` to continue or `stop` to finish.");
            }
            line = lines.recv(), if stdin_open => match line {
                Some(line) => {
                    let command = ControlCommand::parse(&line);
                    if command == ControlCommand::Stop {
                        stop_requested = true;
                    }
                    if handle_command(controller, command, &mut run).await == Flow::Exit {
                        break;
                    }
                }
                None => {
                    debug!("stdin closed, control commands disabled");
                    stdin_open = false;
                    if run.is_none() {
                        break;
                    }
                }
            },
            result = tokio::signal::ctrl_c(), if ctrl_c_available => {
                if let Err(e) = result {
                    warn!(error = %e, "cannot listen for Ctrl-C");
                    ctrl_c_available = false;
                    continue;
                }
                warn!("Interrupt received, stopping after the current download");
                stop_requested = true;
                if let Err(e) = controller.stop() {
                    debug!(error = %e, "nothing to stop");
                }
                if run.is_none() {
                    break;
                }
            }
        }
    }

    if let Some(mut handle) = run {
        handle.wait().await;
    }
    Ok(stop_requested)
}

/// Reads stdin lines on a detached thread; a blocking read cannot be
/// cancelled and must not hold up runtime shutdown.
fn spawn_stdin_reader() -> mpsc::UnboundedReceiver<String> {
    let (tx, rx) = mpsc::unbounded_channel();
    std::thread::spawn(move || {
        for line in std::io::stdin().lock().lines() {
            match line {
                Ok(line) => {
                    if tx.send(line).is_err() {
                        break;
                    }
                }
                Err(e) => {
                    warn!(error = %e, "cannot read stdin, control commands disabled");
                    break;
                }
            }
        }
    });
    rx
}

/// Runs one retry pass, or gives it up when `interrupt` resolves first.
///
/// A pass given up part-way keeps every failure it had not re-attempted.
async fn retry_pass(
    controller: &RetrievalController,
    interrupt: impl Future<Output = ()>,
) -> Option<Result<RetryReport, ControllerError>> {
    tokio::select! {
        result = controller.retry_failed_only() => Some(result),
        () = interrupt => None,
    }
}

/// Resolves on Ctrl-C; never resolves when the handler cannot be installed.
async fn ctrl_c_received() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        debug!(error = %e, "cannot listen for Ctrl-C during retry pass");
        std::future::pending::<()>().await;
    }
}

async fn wait_for_run(run: &mut Option<RunHandle>) -> RunSummary {
    match run.as_mut() {
        Some(handle) => handle.wait().await,
        None => std::future::pending().await,
    }
}

async fn handle_command(
    controller: &RetrievalController,
    command: ControlCommand,
    run: &mut Option<RunHandle>,
) -> Flow {
    match command {
        ControlCommand::Empty => {}
        ControlCommand::Pause => match controller.pause() {
            Ok(()) => println!("Pausing after the current download."),
            Err(e) => println!("Cannot pause: {e}"),
        },
        ControlCommand::Resume => {
            if run.is_some() {
                println!("A run is already in progress.");
            } else {
                match controller.start() {
                    Ok(handle) => *run = Some(handle),
                    Err(e) => println!("Cannot resume: {e}"),
                }
            }
        }
        ControlCommand::Stop => match controller.stop() {
            Ok(()) if run.is_some() => println!("Stopping after the current download."),
            Ok(()) => return Flow::Exit,
            Err(e) => {
                println!("Nothing to stop: {e}");
                if run.is_none() {
                    return Flow::Exit;
                }
            }
        },
        ControlCommand::Retry => {
            println!("Retrying failed downloads. Ctrl-C abandons the pass.");
            match retry_pass(controller, ctrl_c_received()).await {
                Some(Ok(report)) => println!("{}", output::render_retry_report_line(&report)),
                Some(Err(e)) => println!("Cannot retry now: {e}"),
                None => println!("Retry pass abandoned. Downloads not retried yet stay failed."),
            }
        }
        ControlCommand::Status => {
            println!(
                "{}",
                output::render_status_line(controller.state(), &controller.progress())
            );
        }
        ControlCommand::Help => println!("{}", output::INTERACTIVE_HELP),
        ControlCommand::Unknown(word) => {
            println!("Unknown command `{word}`. {}", output::INTERACTIVE_HELP);
        }
    }
    Flow::Continue
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;

    use archive_fetch::{DownloadDescriptor, DownloadError, ResourceClient};
    use async_trait::async_trait;
    use clap::Parser;
    use tempfile::TempDir;

    use crate::cli::{Cli, Command};

    /// Fails the first `failures` requests, then either hangs or succeeds.
    struct FlakyClient {
        failures: usize,
        hang_after: bool,
        calls: AtomicUsize,
    }

    #[async_trait]
    impl ResourceClient for FlakyClient {
        async fn get_bytes(&self, url: &str) -> Result<Vec<u8>, DownloadError> {
            let call = self.calls.fetch_add(1, Ordering::SeqCst);
            if call < self.failures {
                return Err(DownloadError::http_status(url, 503));
            }
            if self.hang_after {
                std::future::pending::<()>().await;
            }
            Ok(b"{}".to_vec())
        }
    }

    async fn controller_with_one_failure(hang_after: bool, output: &TempDir) -> RetrievalController {
        let client = FlakyClient {
            failures: 1,
            hang_after,
            calls: AtomicUsize::new(0),
        };
        let fetcher = ResilientFetcher::new(
            Arc::new(client),
            Arc::new(DirectoryStore::new(output.path())),
        );
        let source = StaticPageSource::new(vec![vec![DownloadDescriptor::new(
            "https://stake.us/_api/archive/1",
            "archive_2024-01-01.json",
        )]]);
        let controller = RetrievalController::new(
            Box::new(source),
            fetcher,
            DomainNormalizer::with_default_mirrors(),
            ControllerConfig {
                max_attempts: 1,
                notifications_enabled: false,
                ..ControllerConfig::default()
            },
        );
        controller.start().unwrap().wait().await;
        controller
    }

    #[tokio::test]
    async fn test_retry_pass_given_up_keeps_failures() {
        let output = TempDir::new().unwrap();
        let controller = controller_with_one_failure(true, &output).await;

        let result = retry_pass(&controller, std::future::ready(())).await;

        assert!(result.is_none());
        assert_eq!(controller.failed_descriptors().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_retry_pass_without_interrupt_reports() {
        let output = TempDir::new().unwrap();
        let controller = controller_with_one_failure(false, &output).await;

        let report = retry_pass(&controller, std::future::pending())
            .await
            .unwrap()
            .unwrap();

        assert_eq!(report.succeeded, 1);
        assert!(controller.failed_descriptors().unwrap().is_empty());
    }

    fn run_args(argv: &[&str]) -> RunArgs {
        let mut full = vec!["archive-fetch", "run", "--manifest", "m.json"];
        full.extend_from_slice(argv);
        match Cli::try_parse_from(full).unwrap().command {
            Command::Run(args) => args,
            Command::Settings { .. } => panic!("expected run subcommand"),
        }
    }

    #[test]
    fn test_control_command_parse_words_and_aliases() {
        assert_eq!(ControlCommand::parse(" Pause \n"), ControlCommand::Pause);
        assert_eq!(ControlCommand::parse("start"), ControlCommand::Resume);
        assert_eq!(ControlCommand::parse("resume"), ControlCommand::Resume);
        assert_eq!(ControlCommand::parse("q"), ControlCommand::Stop);
        assert_eq!(ControlCommand::parse("retry"), ControlCommand::Retry);
        assert_eq!(ControlCommand::parse("status"), ControlCommand::Status);
        assert_eq!(ControlCommand::parse(""), ControlCommand::Empty);
        assert_eq!(
            ControlCommand::parse("jump"),
            ControlCommand::Unknown("jump".to_string())
        );
    }

    #[test]
    fn test_apply_run_overrides_keeps_stored_values_when_flags_unset() {
        let stored = Settings {
            inter_download_delay: 250,
            target_name_prefix: "bets".to_string(),
            ..Settings::default()
        };

        let merged = apply_run_overrides(stored.clone(), &run_args(&[]));

        assert_eq!(merged, stored);
    }

    #[test]
    fn test_apply_run_overrides_flags_win() {
        let merged = apply_run_overrides(
            Settings::default(),
            &run_args(&[
                "--delay",
                "0",
                "--page-delay",
                "10",
                "-r",
                "5",
                "--prefix",
                "bets",
                "--canonical-host",
                "stake.com",
                "--no-notify",
            ]),
        );

        assert_eq!(merged.inter_download_delay, 0);
        assert_eq!(merged.inter_page_delay, 10);
        assert_eq!(merged.max_retries, 5);
        assert_eq!(merged.target_name_prefix, "bets");
        assert_eq!(merged.canonical_host.as_deref(), Some("stake.com"));
        assert!(!merged.notifications_enabled);
    }
}
