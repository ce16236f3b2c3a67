//! Research Console
//!
//! Command-line entry point: submit research questions, follow the running
//! job and browse local history.

use mimalloc::MiMalloc;

/// Global allocator for improved performance (M-MIMALLOC-APPS).
#[global_allocator]
static GLOBAL: MiMalloc = MiMalloc;

use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, bail};
use clap::Parser;
use dotenvy::dotenv;
use futures::StreamExt;
use tokio_stream::wrappers::BroadcastStream;
use tokio_stream::wrappers::errors::BroadcastStreamRecvError;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

use research_console::config::{AppConfig, Cli, Command};
use research_console::history::FileStore;
use research_console::session::{SessionController, SessionOptions, ViewUpdate, runtime};
use research_console::status::Severity;
use research_console::transport::{HttpApi, PushChannel, SsePushChannel};
use research_console::ui::TerminalView;
use research_console::ui::terminal::{format_history, format_log, format_models};

/// How long to keep printing trailing output after the job finished.
const TRAILING_GRACE: Duration = Duration::from_millis(750);

#[tokio::main]
async fn main() -> anyhow::Result<ExitCode> {
    // Load .env (if present)
    let _ = dotenv();

    let cli = Cli::parse();
    let config = AppConfig::load_from_cli(&cli).context("Failed to load configuration")?;
    init_tracing(&config.log.format);

    info!(
        name: "console.config.loaded",
        server = %config.server.base_url,
        history = %config.history.resolved_path().display(),
        "Configuration loaded"
    );

    let api = Arc::new(HttpApi::new(&config.server.base_url)?);
    let store = FileStore::open(config.history.resolved_path());
    let options = SessionOptions {
        stale_after: config.session.stale_after(),
        default_model: config.session.default_model.clone(),
    };
    let mut controller = SessionController::new(api, Box::new(store), options);

    match cli.command.unwrap_or(Command::Watch) {
        Command::Models => {
            if controller.load_models().await.is_err() {
                print_log(&controller);
                return Ok(ExitCode::FAILURE);
            }
            println!("{}", format_models(controller.models()));
            Ok(ExitCode::SUCCESS)
        }
        Command::History => {
            println!("{}", format_history(controller.history()));
            Ok(ExitCode::SUCCESS)
        }
        Command::Ask { question, model } => {
            run_job(controller, &config, cli.status_line, Some((question, model))).await
        }
        Command::Rerun { index } => {
            // Needed to decide whether the stored model is still offered.
            if controller.load_models().await.is_err() {
                print_log(&controller);
            }
            let Some(selection) = controller.select_history(index) else {
                bail!("No history entry at index {index}");
            };
            let model = selection.model_id.unwrap_or_default();
            let submission = Some((selection.question, model));
            run_job(controller, &config, cli.status_line, submission).await
        }
        Command::Watch => run_job(controller, &config, cli.status_line, None).await,
    }
}

/// Print the output log so far, for errors raised before anything follows it.
fn print_log(controller: &SessionController) {
    if !controller.surface().is_empty() {
        eprintln!("{}", format_log(controller.surface().units()));
    }
}

fn init_tracing(format: &str) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let registry = tracing_subscriber::registry().with(filter);
    if format.eq_ignore_ascii_case("json") {
        registry
            .with(fmt::layer().json().with_writer(std::io::stderr))
            .init();
    } else {
        registry
            .with(fmt::layer().with_target(true).with_writer(std::io::stderr))
            .init();
    }
}

/// Boot the session, optionally submit a question, and print the job's
/// output until it finishes.
async fn run_job(
    mut controller: SessionController,
    config: &AppConfig,
    show_status_line: bool,
    submission: Option<(String, String)>,
) -> anyhow::Result<ExitCode> {
    let shutdown = CancellationToken::new();
    let push = SsePushChannel::new(
        &config.server.base_url,
        &config.push.events_path,
        config.push.reconnect_delay(),
    )?;

    let updates = BroadcastStream::new(controller.subscribe());
    let printer = tokio::spawn(follow(updates, show_status_line, shutdown.clone()));

    let push_rx = push.subscribe(shutdown.child_token());
    controller.boot().await;

    if submission.is_none() && !controller.session().is_active() {
        println!("No research in progress.");
        shutdown.cancel();
        let _ = printer.await;
        return Ok(ExitCode::SUCCESS);
    }

    let (handle, task) = runtime::spawn(controller, push_rx, shutdown.clone());

    let ctrl_c = shutdown.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            ctrl_c.cancel();
        }
    });

    if let Some((question, model)) = submission {
        if let Err(e) = handle.submit(question, model).await {
            warn!(name: "console.submit.failed", error = %e, "Submission failed");
            // Transport failures end the job themselves; rejections do not.
            if !e.is_transport() {
                shutdown.cancel();
            }
        }
    }

    let finished = printer.await.context("output printer panicked")??;
    shutdown.cancel();
    drop(handle);
    let _ = task.await;

    Ok(match finished {
        Some(Severity::Success) => ExitCode::SUCCESS,
        _ => ExitCode::FAILURE,
    })
}

/// Print view updates until the job reaches a terminal status (plus a short
/// grace period for trailing output) or shutdown is requested.
async fn follow(
    mut updates: BroadcastStream<ViewUpdate>,
    show_status_line: bool,
    shutdown: CancellationToken,
) -> std::io::Result<Option<Severity>> {
    let mut view = TerminalView::stdout().with_status_line(show_status_line);
    let mut finished = None;

    loop {
        let next = if finished.is_some() {
            match tokio::time::timeout(TRAILING_GRACE, updates.next()).await {
                Ok(next) => next,
                Err(_elapsed) => break,
            }
        } else {
            tokio::select! {
                () = shutdown.cancelled() => break,
                next = updates.next() => next,
            }
        };

        let update = match next {
            Some(Ok(update)) => update,
            Some(Err(BroadcastStreamRecvError::Lagged(skipped))) => {
                warn!(name: "console.output.lagged", skipped, "Output fell behind");
                continue;
            }
            None => break,
        };

        view.apply(&update)?;
        if let ViewUpdate::Status(status) = &update {
            if !status.active && matches!(status.severity, Severity::Success | Severity::Danger) {
                finished = Some(status.severity);
            }
        }
    }

    Ok(finished)
}
