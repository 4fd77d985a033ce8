// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tokio::sync::mpsc;
use tracing::info;
use tracing_subscriber::EnvFilter;

use broadcatch::{
    CheckerCommand, DefaultDelivery, FeedChecker, HistoryStore, InProcessWorker, LastCheckStatus,
    ReqwestClient, Settings, WorkerProxy, worker,
};

/// Check broadcatching feeds and download new episodes
#[derive(Parser, Debug)]
#[command(name = "broadcatch")]
#[command(about = "Check broadcatching feeds and download new episodes")]
#[command(version)]
struct Args {
    /// Path to the JSON settings file
    #[arg(short, long, default_value = "broadcatch.json")]
    config: PathBuf,

    /// Path to the download history file
    #[arg(long, default_value = "history.json")]
    history: PathBuf,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Check feeds on a schedule until interrupted
    Run,

    /// Run a single check and exit
    Check,

    /// Serve check requests over stdin/stdout (spawned by `run`)
    #[command(hide = true)]
    Worker,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Logs go to stderr; in worker mode stdout carries the protocol
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();

    match args.command {
        Command::Run => run(&args).await,
        Command::Check => check_once(&args).await,
        Command::Worker => worker::serve().await.context("worker failed"),
    }
}

/// Check feeds every ten minutes until Ctrl-C
async fn run(args: &Args) -> Result<()> {
    let settings = load_settings(args)?;
    let history = load_history(args, &settings)?;

    let (proxy, interruptions) = WorkerProxy::spawn().context("failed to locate executable")?;

    let (commands_tx, commands_rx) = mpsc::channel(8);

    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("interrupt received");
            let _ = commands_tx.send(CheckerCommand::Shutdown).await;
        }
    });

    let checker = FeedChecker::new(settings, history, Arc::new(proxy), Arc::new(DefaultDelivery));
    checker.run(commands_rx, interruptions).await;

    Ok(())
}

/// Run one check in-process, without the worker boundary
async fn check_once(args: &Args) -> Result<()> {
    let settings = load_settings(args)?;
    let history = load_history(args, &settings)?;

    let transport = Arc::new(InProcessWorker::new(ReqwestClient::new()));
    let mut checker = FeedChecker::new(settings, history, transport, Arc::new(DefaultDelivery));

    match checker.check_once().await {
        LastCheckStatus::Successful(_) => Ok(()),
        LastCheckStatus::Skipped(_) => {
            anyhow::bail!("configuration is unusable, check skipped")
        }
        LastCheckStatus::Failed(_, error) => Err(anyhow::Error::new(error.clone())),
        status => anyhow::bail!("check did not run: {status:?}"),
    }
}

fn load_settings(args: &Args) -> Result<Settings> {
    Settings::load(&args.config)
        .with_context(|| format!("failed to load settings from {}", args.config.display()))
}

fn load_history(args: &Args, settings: &Settings) -> Result<HistoryStore> {
    HistoryStore::load(&args.history, settings.feeds.len())
        .with_context(|| format!("failed to load history from {}", args.history.display()))
}
