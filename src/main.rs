//! Binary entrypoint: mounts a show from markup and drives it from stdin.
//!
//! Each input line is one command: `next`, `prev`, `details`, `close`,
//! `wait <duration>` or `state`. Commands turn into clicks on the matching
//! controls, so a click that lands mid-transition is ignored just like a
//! real one; use `wait` to let transitions finish.

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use clap::{ArgAction, Parser};
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use tracing_subscriber::EnvFilter;

use detail_slideshow::config::Configuration;
use detail_slideshow::dom::Dom;
use detail_slideshow::events::SlideshowCommand;
use detail_slideshow::slideshow::{self, Slideshow};
use detail_slideshow::tween::Animator;
use detail_slideshow::{markup, preload};

#[derive(Debug, Parser)]
#[command(
    name = "detail-slideshow",
    version,
    about = "headless slideshow with a details overlay"
)]
struct Args {
    /// Path to the XHTML markup
    #[arg(value_name = "MARKUP")]
    markup: PathBuf,
    /// Path to YAML config (defaults apply when omitted)
    #[arg(short, long, value_name = "FILE")]
    config: Option<PathBuf>,
    /// Increase log verbosity (repeatable)
    #[arg(short = 'v', long = "verbose", action = ArgAction::Count)]
    verbose: u8,
}

fn init_tracing(verbosity: u8) {
    // RUST_LOG wins; otherwise map -v to a level
    let fallback = match verbosity {
        0 => "info",
        1 => "debug",
        _ => "trace",
    };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(fallback)),
        )
        .with_target(false)
        .compact()
        .init();
}

#[tokio::main]
async fn main() -> Result<()> {
    let Args {
        markup: markup_path,
        config,
        verbose,
    } = Args::parse();
    init_tracing(verbose);

    let cfg = Configuration::load(config.as_deref())?;
    debug!(?cfg, "configuration ready");

    let document = markup::load(&markup_path)
        .with_context(|| format!("failed to load markup from {}", markup_path.display()))?;
    let dom = Dom::new(document);
    let animator = Animator::new(dom.clone(), cfg.animator.frame_interval);

    let (command_tx, command_rx) = mpsc::channel::<SlideshowCommand>(16); // Listeners -> Slideshow
    let show = Slideshow::mount(animator, &cfg, command_tx).context("failed to mount slideshow")?;

    let cancel = CancellationToken::new();

    let preload_task = tokio::spawn({
        let dom = dom.clone();
        let images = show.image_elements();
        let base_dir = markup_path
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_default();
        let max_concurrent = cfg.preload.max_concurrent;
        async move { preload::preload(dom, images, &base_dir, max_concurrent).await }
    });

    {
        let cancel = cancel.clone();
        tokio::spawn(async move {
            if let Err(err) = tokio::signal::ctrl_c().await {
                warn!("ctrl-c handler failed: {err}");
                return;
            }
            info!("ctrl-c received; initiating shutdown");
            cancel.cancel();
        });
    }

    let runner = tokio::spawn(slideshow::run(show.clone(), command_rx, cancel.clone()));

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        let line = tokio::select! {
            _ = cancel.cancelled() => break,
            line = lines.next_line() => line.context("failed to read stdin")?,
        };
        let Some(line) = line else {
            info!("stdin closed; initiating shutdown");
            break;
        };
        dispatch(&show, line.trim(), &cancel).await;
    }

    cancel.cancel();
    runner.await.context("slideshow loop panicked")?;

    match preload_task.await {
        Ok(report) if !report.failed.is_empty() => {
            warn!(failed = report.failed.len(), "some images could not be preloaded");
        }
        Ok(_) => {}
        Err(err) => warn!("preload task failed: {err}"),
    }
    print_state(&show);
    Ok(())
}

async fn dispatch(show: &Slideshow, line: &str, cancel: &CancellationToken) {
    let mut words = line.split_whitespace();
    let Some(command) = words.next() else {
        return;
    };
    let target = match command {
        "next" => show.navigation().next_control(),
        "prev" => show.navigation().prev_control(),
        "details" => show.details_control(),
        "close" => match show.slides().get(show.current()) {
            Some(slide) => slide.close_control(),
            None => {
                warn!("no slide to close details on");
                return;
            }
        },
        "wait" => {
            match words.next().map(humantime::parse_duration) {
                Some(Ok(duration)) => {
                    if !wait_or_cancel(duration, cancel).await {
                        debug!("wait interrupted by shutdown");
                    }
                }
                Some(Err(err)) => warn!(line, "invalid duration: {err}"),
                None => warn!(line, "usage: wait <duration>"),
            }
            return;
        }
        "state" => {
            print_state(show);
            return;
        }
        other => {
            warn!(command = other, "unknown command");
            return;
        }
    };
    let listeners = show.dom().click(target);
    debug!(command, listeners, "click dispatched");
}

/// Sleeps for `duration` unless shutdown starts first. Returns `false` when
/// cancelled.
async fn wait_or_cancel(duration: Duration, cancel: &CancellationToken) -> bool {
    tokio::select! {
        _ = cancel.cancelled() => false,
        _ = tokio::time::sleep(duration) => true,
    }
}

fn print_state(show: &Slideshow) {
    println!(
        "slide {}/{}  label {}/{}  {:?}  details {}",
        show.current() + 1,
        show.total(),
        show.navigation().current_text(),
        show.navigation().total_text(),
        show.state(),
        if show.is_details_open() {
            "open"
        } else {
            "closed"
        }
    );
}
