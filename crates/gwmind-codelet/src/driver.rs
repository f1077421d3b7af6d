//! Tick drivers
//!
//! [`run_loop`] drives a codelet as a tokio task; [`run_blocking`] and
//! [`spawn_thread`] drive it on a dedicated OS thread. Both are do-while
//! loops: a codelet always gets at least one tick, then keeps ticking while
//! its loop flag is set. A non-zero time step is the minimum period between
//! tick starts.

use crate::codelet::Codelet;
use std::sync::Arc;
use std::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

/// Drive `codelet` until its loop flag clears or `cancel` fires.
///
/// Cancellation is cooperative: a tick in progress always completes.
pub async fn run_loop(codelet: Arc<Codelet>, cancel: CancellationToken) {
    codelet.set_running(true);
    info!("Codelet {} started ({})", codelet.name(), codelet.kind());

    loop {
        let started = tokio::time::Instant::now();
        let outcome = codelet.tick();
        debug!("Codelet {} tick: {:?}", codelet.name(), outcome);

        if !codelet.should_loop() || cancel.is_cancelled() {
            break;
        }

        let step = codelet.time_step();
        if step.is_zero() {
            tokio::task::yield_now().await;
        } else {
            tokio::select! {
                _ = tokio::time::sleep_until(started + step) => {}
                _ = cancel.cancelled() => break,
            }
        }

        if !codelet.should_loop() {
            break;
        }
    }

    codelet.set_running(false);
    info!(
        "Codelet {} stopped after {} ticks ({} fired)",
        codelet.name(),
        codelet.ticks(),
        codelet.fired()
    );
}

/// Drive `codelet` on the calling thread until its loop flag clears.
pub fn run_blocking(codelet: &Codelet) {
    codelet.set_running(true);
    info!("Codelet {} started ({})", codelet.name(), codelet.kind());

    loop {
        let started = Instant::now();
        let outcome = codelet.tick();
        debug!("Codelet {} tick: {:?}", codelet.name(), outcome);

        if !codelet.should_loop() {
            break;
        }

        let step = codelet.time_step();
        if !step.is_zero() {
            let remaining = (started + step).saturating_duration_since(Instant::now());
            if !remaining.is_zero() {
                std::thread::sleep(remaining);
            }
        }

        if !codelet.should_loop() {
            break;
        }
    }

    codelet.set_running(false);
    info!(
        "Codelet {} stopped after {} ticks ({} fired)",
        codelet.name(),
        codelet.ticks(),
        codelet.fired()
    );
}

/// Run `codelet` on its own named thread.
pub fn spawn_thread(codelet: Arc<Codelet>) -> std::io::Result<std::thread::JoinHandle<()>> {
    std::thread::Builder::new()
        .name(codelet.name())
        .spawn(move || run_blocking(&codelet))
}
