//! Remote-Mouse-Over-IP client application entry point.
//!
//! Wires together the config store, the UDP transport, the input backend,
//! and the session state machine, then runs the Tokio async event loop.
//!
//! # Architecture
//!
//! ```text
//! main()
//!  └─ load_config() + env overrides + validate()
//!  └─ UdpTransport::connect()      -- connected UDP socket
//!  └─ CommandDispatcher            -- routes commands to the input backend
//!  └─ Session::run()               -- open / serve / refresh / close
//!       ├─ ctrl-c  -> shutdown flag -> best-effort CLOSE
//!       └─ peer CLOSE              -> graceful exit
//! ```
//!
//! # Input backend
//!
//! The `MockInputEmulator` used here records all injected events rather
//! than actually synthesising OS input.  A production build replaces it
//! with an OS adapter (XTest, `SendInput`, CoreGraphics) behind the same
//! `InputAction` trait.

use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc,
};

use anyhow::Context;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use rmouse_client::application::{
    dispatch_input::{CommandDispatcher, InputAction},
    run_session::Session,
};
use rmouse_client::infrastructure::{
    input_emulation::mock::MockInputEmulator,
    network::UdpTransport,
    storage::config::{apply_env_overrides, load_config, remember_peer_address, validate},
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialise structured logging.
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    info!("Remote-Mouse-Over-IP client starting");

    // ── Configuration ─────────────────────────────────────────────────────────
    let mut config = load_config().context("loading configuration")?;
    apply_env_overrides(&mut config);
    let validated = validate(&config).context("validating configuration")?;

    if validated.session.password.is_none() {
        warn!("no password configured; running the legacy plaintext protocol");
    }

    // ── Transport and dispatcher ──────────────────────────────────────────────
    let transport = UdpTransport::connect(validated.peer, validated.session.frame_block)
        .await
        .context("connecting datagram transport")?;

    let backend = Arc::new(MockInputEmulator::new());
    let dispatcher = CommandDispatcher::new(Arc::clone(&backend) as Arc<dyn InputAction>);

    // ── Ctrl-C handler ────────────────────────────────────────────────────────
    let shutdown = Arc::new(AtomicBool::new(false));
    let shutdown_flag = Arc::clone(&shutdown);
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("shutdown signal received");
            shutdown_flag.store(true, Ordering::Relaxed);
        }
    });

    // ── Session loop ──────────────────────────────────────────────────────────
    info!(peer = %validated.peer, "connecting to sender");
    let mut session = Session::new(
        transport,
        dispatcher,
        validated.session.clone(),
        Arc::clone(&shutdown),
    );
    session.run().await.context("running session")?;

    // Remember the peer that just worked for the next run.
    if let Err(e) = remember_peer_address(&config.peer.address) {
        warn!(error = %e, "could not persist peer address");
    }

    info!("Remote-Mouse-Over-IP client stopped");
    Ok(())
}
