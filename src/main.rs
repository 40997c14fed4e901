use std::io::IsTerminal;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{ArgAction, Parser};
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::{mpsc, watch};
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;

#[cfg(unix)]
use tokio::signal::unix::{SignalKind, signal};

use studio_slideshow::config::SlideshowConfig;
use studio_slideshow::events::{Displayed, ImageSettled, PreloadRequest, SlideshowCommand};
use studio_slideshow::fetch::UrlFetcher;
use studio_slideshow::render::RenderPlan;
use studio_slideshow::tasks::{loader, scheduler, viewer};

#[derive(Debug, Parser)]
#[command(
    name = "studio-slideshow",
    version,
    about = "Hero image slideshow scheduler"
)]
struct Args {
    /// Path to YAML config
    #[arg(value_name = "CONFIG")]
    config: PathBuf,
    /// Override the startup viewport width (logical pixels)
    #[arg(long = "viewport-width", value_name = "PX")]
    viewport_width: Option<u32>,
    /// Print the frame order for N frames without running the timers
    #[arg(long = "dry-run", value_name = "FRAMES")]
    dry_run: Option<usize>,
    /// Increase log verbosity (repeatable)
    #[arg(short = 'v', long = "verbose", action = ArgAction::Count)]
    verbose: u8,
}

fn init_tracing(verbosity: u8) {
    let default = match verbosity {
        0 => "info",
        1 => "studio_slideshow=debug,info",
        _ => "studio_slideshow=trace,debug",
    };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default)),
        )
        .with_target(false)
        .compact()
        .init();
}

#[tokio::main]
async fn main() -> Result<()> {
    let Args {
        config,
        viewport_width,
        dry_run,
        verbose,
    } = Args::parse();
    init_tracing(verbose);

    let mut cfg = SlideshowConfig::from_yaml_file(&config)
        .with_context(|| format!("failed to load configuration from {}", config.display()))?
        .validated()
        .context("invalid configuration values")?;
    if let Some(width) = viewport_width {
        cfg.viewport_width = width;
    }
    tracing::debug!("Loaded configuration from {}:\n{:#?}", config.display(), cfg);

    if let Some(frames) = dry_run {
        print_dry_run(&cfg, frames);
        return Ok(());
    }

    // Channels (small/bounded)
    let (command_tx, command_rx) = mpsc::channel::<SlideshowCommand>(16); // Control -> Scheduler
    let (settled_tx, settled_rx) = mpsc::channel::<ImageSettled>(64); // Loader -> Scheduler
    let (displayed_tx, displayed_rx) = mpsc::channel::<Displayed>(16); // Scheduler -> Viewer
    let (preload_tx, preload_rx) = watch::channel::<Option<PreloadRequest>>(None); // Scheduler -> Loader
    let (plan_tx, plan_rx) = watch::channel(RenderPlan::Loading); // Scheduler -> Viewer

    let cancel = CancellationToken::new();

    {
        let cancel = cancel.clone();
        tokio::spawn(async move {
            if let Err(err) = tokio::signal::ctrl_c().await {
                tracing::warn!("ctrl-c handler failed: {err}");
                return;
            }
            tracing::info!("ctrl-c received; initiating shutdown");
            cancel.cancel();
        });
    }

    // Control lines on an interactive stdin; EOF (Ctrl-D) or `quit` shuts down.
    if std::io::stdin().is_terminal() {
        let cancel = cancel.clone();
        let control = command_tx.clone();
        tokio::spawn(async move {
            let mut lines = BufReader::new(tokio::io::stdin()).lines();
            loop {
                let line = tokio::select! {
                    _ = cancel.cancelled() => break,
                    line = lines.next_line() => line,
                };
                match line {
                    Ok(Some(line)) if line.trim().is_empty() => {}
                    Ok(Some(line)) if line.trim() == "quit" => break,
                    Ok(Some(line)) => match line.parse::<SlideshowCommand>() {
                        Ok(cmd) => {
                            if control.send(cmd).await.is_err() {
                                break;
                            }
                        }
                        Err(err) => tracing::warn!("ignoring control input: {err}"),
                    },
                    Ok(None) => {
                        tracing::info!("stdin closed; initiating shutdown");
                        break;
                    }
                    Err(err) => {
                        tracing::warn!("stdin watcher failed: {err}");
                        break;
                    }
                }
            }
            cancel.cancel();
        });
    } else {
        tracing::debug!("stdin is not a terminal; skipping control input");
    }

    #[cfg(unix)]
    {
        let cancel = cancel.clone();
        let control = command_tx.clone();
        tokio::spawn(async move {
            match signal(SignalKind::user_defined1()) {
                Ok(mut sigusr1) => loop {
                    tokio::select! {
                        _ = cancel.cancelled() => break,
                        received = sigusr1.recv() => {
                            if received.is_none() {
                                break;
                            }
                            tracing::info!("SIGUSR1 received; advancing slideshow");
                            if let Err(err) = control.send(SlideshowCommand::Next).await {
                                tracing::warn!("failed to forward advance request: {err}");
                                break;
                            }
                        }
                    }
                },
                Err(err) => tracing::warn!("failed to register SIGUSR1 handler: {err}"),
            }
        });
    }
    drop(command_tx);

    let mut tasks = JoinSet::new();

    // Loader
    tasks.spawn({
        let fetcher = Arc::new(UrlFetcher::new().context("failed to build http client")?);
        let cancel = cancel.clone();
        let max_in_flight = cfg.loader_max_concurrent_fetches;
        let timeout = cfg.fetch_timeout;
        async move {
            loader::run(fetcher, preload_rx, settled_tx, cancel, max_in_flight, timeout)
                .await
                .context("loader task failed")
        }
    });

    // Scheduler
    tasks.spawn({
        let cfg = cfg.clone();
        let cancel = cancel.clone();
        async move {
            scheduler::run(
                cfg,
                command_rx,
                settled_rx,
                preload_tx,
                plan_tx,
                displayed_tx,
                cancel,
            )
            .await
            .context("scheduler task failed")
        }
    });

    // Viewer
    tasks.spawn({
        let cancel = cancel.clone();
        async move {
            viewer::run(plan_rx, displayed_rx, cancel)
                .await
                .context("viewer task failed")
        }
    });

    while let Some(res) = tasks.join_next().await {
        // Any task ending takes the others down with it.
        cancel.cancel();
        match res {
            Ok(Ok(())) => {}
            Ok(Err(e)) => tracing::error!("task error: {e:?}"),
            Err(e) => tracing::error!("join error: {e}"),
        }
    }

    Ok(())
}

fn print_dry_run(cfg: &SlideshowConfig, frames: usize) {
    let plan = scheduler::simulate_schedule(cfg, cfg.viewport_width, frames);
    let narrow = cfg.viewport_width < cfg.mobile_breakpoint;

    println!(
        "# slideshow dry run\n# viewport: {}px ({})\n# interval: {}\n# transition: {}\n# frames: {}\n",
        cfg.viewport_width,
        if narrow { "narrow" } else { "wide" },
        humantime::format_duration(cfg.interval),
        humantime::format_duration(cfg.transition),
        frames,
    );

    println!("# planned order:");
    if plan.is_empty() {
        println!("(no frames)");
    }
    for (idx, url) in plan.iter().enumerate() {
        println!("  {:>4}: {}", idx + 1, url);
    }
}
