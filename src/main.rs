// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Au-Zone Technologies. All Rights Reserved.

use args::Args;
use clap::Parser;
use edgefirst_camera_lcd::{
    capture::{CaptureLoop, LoopStats},
    config::Config,
    session::CaptureSession,
};
use std::{
    io,
    process::ExitCode,
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc,
    },
};
use tokio::signal::unix::{signal, SignalKind};
use tracing::{error, info, level_filters::LevelFilter, warn};
use tracing_subscriber::{layer::SubscriberExt as _, util::SubscriberInitExt as _, Layer as _};

mod args;

#[tokio::main]
async fn main() -> ExitCode {
    let args = Args::parse();
    init_tracing(&args);

    info!("EdgeFirst Camera LCD Preview");

    let cancel = Arc::new(AtomicBool::new(false));
    let signalled = cancel.clone();
    tokio::spawn(async move {
        if let Err(e) = wait_for_shutdown(&signalled).await {
            warn!("signal handling unavailable: {}", e);
        }
    });

    let config = Config::from(args);
    match tokio::task::spawn_blocking(move || preview(&config, &cancel)).await {
        Ok(Ok(stats)) => {
            info!(
                "displayed {} frames ({} short) with {} timeouts",
                stats.frames, stats.short_frames, stats.timeouts
            );
            ExitCode::SUCCESS
        }
        Ok(Err(code)) => ExitCode::from(code),
        Err(e) => {
            error!("capture thread failed: {}", e);
            ExitCode::FAILURE
        }
    }
}

/// Sets up the devices and runs the capture loop until cancelled.
///
/// Returns the process exit code on failure: the setup stage's own code, or 1
/// once streaming had started. The session is torn down before returning.
fn preview(config: &Config, cancel: &AtomicBool) -> Result<LoopStats, u8> {
    let mut session = CaptureSession::from_config(config).map_err(|e| {
        error!("setup failed: {}", e);
        e.exit_code()
    })?;

    let mut capture = CaptureLoop::new(&mut session, config.timeout)
        .map_err(|e| {
            error!("{}", e);
            1
        })?
        .with_max_timeouts(config.max_timeouts);

    capture.run(cancel).map_err(|_| 1)
}

async fn wait_for_shutdown(cancel: &AtomicBool) -> io::Result<()> {
    let mut terminate = signal(SignalKind::terminate())?;
    tokio::select! {
        res = tokio::signal::ctrl_c() => res?,
        _ = terminate.recv() => {}
    }
    info!("shutdown requested");
    cancel.store(true, Ordering::Release);
    Ok(())
}

fn init_tracing(args: &Args) {
    let level = if args.verbose {
        LevelFilter::DEBUG
    } else {
        LevelFilter::INFO
    };

    let stdout = tracing_subscriber::fmt::layer().with_filter(level);
    let journald = tracing_journald::layer()
        .ok()
        .map(|layer| layer.with_filter(level));
    let tracy = if args.tracy {
        tracy_client::Client::start();
        Some(tracing_tracy::TracyLayer::default().with_filter(level))
    } else {
        None
    };

    tracing_subscriber::registry()
        .with(stdout)
        .with(journald)
        .with(tracy)
        .init();
}
