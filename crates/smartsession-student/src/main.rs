mod app;
mod session;
mod state;

use std::sync::{mpsc as std_mpsc, Arc, Mutex};

use anyhow::{anyhow, Context, Result};
use smartsession_core::{ClientConfig, StudentIdentity};
use tokio::sync::mpsc;
use tracing::{error, info};

use state::GuiState;

fn main() -> Result<()> {
    // ── Logging ───────────────────────────────────────────────────────────
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .compact()
        .init();

    // ── Config + identity ─────────────────────────────────────────────────
    let config = ClientConfig::from_env();
    config.validate().context("Invalid client configuration")?;
    let identity = StudentIdentity::generate();
    info!("Starting student session {} ({}) against {}", identity.id, identity.name, config.server_url);

    // ── Shared state ──────────────────────────────────────────────────────
    let shared_state: state::SharedState = Arc::new(Mutex::new(GuiState::new(identity.clone())));

    // ── Window options ────────────────────────────────────────────────────
    let window_options = eframe::NativeOptions {
        viewport: egui::ViewportBuilder::default()
            .with_title("SmartSession Student")
            .with_inner_size([1000.0, 640.0])
            .with_min_inner_size([720.0, 480.0])
            .with_resizable(true),
        ..Default::default()
    };

    let (join_tx, join_rx) = std_mpsc::channel();

    eframe::run_native(
        "SmartSession Student",
        window_options,
        Box::new(move |cc| {
            let state_bg = Arc::clone(&shared_state);
            let ctx_bg   = cc.egui_ctx.clone();
            let (shutdown_tx, shutdown_rx) = mpsc::channel::<()>(1);

            // Dedicated OS thread with its own runtime keeps the socket and
            // capture loop off the egui main thread.
            let runtime = tokio::runtime::Builder::new_multi_thread()
                .worker_threads(2)
                .enable_all()
                .build()?;
            let join = std::thread::Builder::new()
                .name("smartsession-session".into())
                .spawn(move || {
                    runtime.block_on(session::run(state_bg, ctx_bg, config, identity, shutdown_rx));
                })?;
            let _ = join_tx.send(join);

            Ok(Box::new(app::StudentApp::new(cc, shared_state, shutdown_tx)))
        }),
    )
    .map_err(|e| anyhow!("GUI error: {e}"))?;

    // The app (and its shutdown sender) is gone; wait for teardown to finish.
    if let Ok(join) = join_rx.try_recv() {
        if join.join().is_err() {
            error!("Session thread panicked");
        }
    }
    info!("Student client exited");
    Ok(())
}
