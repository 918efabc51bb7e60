//! Background tracking loop.

use std::panic::{self, AssertUnwindSafe};
use std::sync::mpsc::{self, RecvTimeoutError};
use std::sync::{Arc, Mutex};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use tracing::{debug, error, info, warn};

use crate::axis::{AxisEngine, MoveHandle};
use crate::config::{Degrees, TrackingConfig};

use super::state::Bookkeeping;

/// Source of the position to follow, polled once per tick.
///
/// Must return promptly; the loop's cadence depends on it.
pub trait TargetFeed: Send + 'static {
    /// Current target as `(azimuth_deg, elevation_deg)`.
    fn target(&mut self) -> (f64, f64);
}

impl<F> TargetFeed for F
where
    F: FnMut() -> (f64, f64) + Send + 'static,
{
    fn target(&mut self) -> (f64, f64) {
        self()
    }
}

/// Running tracking loop.
#[derive(Debug)]
pub struct TrackingLoop {
    stop_tx: mpsc::Sender<()>,
    done_rx: mpsc::Receiver<()>,
    handle: JoinHandle<()>,
}

/// Move issued by the loop on one axis.
struct InFlight {
    target: Degrees,
    handle: MoveHandle,
}

impl TrackingLoop {
    /// Spawn the loop thread.
    pub(crate) fn spawn(
        axes: [Arc<AxisEngine>; 2],
        mut feed: Box<dyn TargetFeed>,
        settings: TrackingConfig,
        book: Arc<Mutex<Bookkeeping>>,
    ) -> std::io::Result<Self> {
        let (stop_tx, stop_rx) = mpsc::channel();
        let (done_tx, done_rx) = mpsc::channel();

        let handle = thread::Builder::new()
            .name("tracking".to_string())
            .spawn(move || {
                run(&axes, feed.as_mut(), settings, &book, &stop_rx);
                let _ = done_tx.send(());
            })?;

        Ok(Self {
            stop_tx,
            done_rx,
            handle,
        })
    }

    /// Signal the loop to exit and wait at most `timeout` for it.
    ///
    /// Returns false if the loop did not exit in time (it is then detached).
    pub fn stop(self, timeout: Duration) -> bool {
        let _ = self.stop_tx.send(());
        match self.done_rx.recv_timeout(timeout) {
            Ok(()) | Err(RecvTimeoutError::Disconnected) => {
                if self.handle.join().is_err() {
                    error!("Tracking thread panicked");
                }
                true
            }
            Err(RecvTimeoutError::Timeout) => {
                warn!(?timeout, "Tracking loop did not exit in time");
                false
            }
        }
    }

    /// True once the loop thread has exited.
    pub fn is_finished(&self) -> bool {
        self.handle.is_finished()
    }
}

fn run(
    axes: &[Arc<AxisEngine>; 2],
    feed: &mut dyn TargetFeed,
    settings: TrackingConfig,
    book: &Mutex<Bookkeeping>,
    stop_rx: &mpsc::Receiver<()>,
) {
    let tolerance = settings.position_tolerance.0;
    let mut in_flight: [Option<InFlight>; 2] = [None, None];

    info!(interval = ?settings.interval(), tolerance, "Tracking loop started");

    loop {
        match panic::catch_unwind(AssertUnwindSafe(|| feed.target())) {
            Ok((az, el)) if az.is_finite() && el.is_finite() => {
                let targets = [
                    axes[0].limits().clamp(Degrees(az)),
                    axes[1].limits().clamp(Degrees(el)),
                ];
                {
                    let mut book = book.lock().unwrap_or_else(|e| e.into_inner());
                    book.az_target = targets[0];
                    book.el_target = targets[1];
                }

                for ((axis, slot), target) in axes.iter().zip(in_flight.iter_mut()).zip(targets) {
                    correct(axis, slot, target, tolerance);
                }
            }
            Ok((az, el)) => warn!(az, el, "Target feed returned a non-finite position"),
            Err(_) => error!("Target feed panicked"),
        }

        match stop_rx.recv_timeout(settings.interval()) {
            Err(RecvTimeoutError::Timeout) => {}
            Ok(()) | Err(RecvTimeoutError::Disconnected) => break,
        }
    }

    // Moves issued by the loop end with it
    for (axis, slot) in axes.iter().zip(in_flight.iter_mut()) {
        if let Some(flight) = slot.take() {
            axis.stop();
            flight.handle.join();
        }
    }
    info!("Tracking loop stopped");
}

/// Issue at most one corrective move on an axis.
fn correct(axis: &Arc<AxisEngine>, slot: &mut Option<InFlight>, target: Degrees, tolerance: f64) {
    if slot.as_ref().is_some_and(|f| f.handle.is_finished()) {
        if let Some(done) = slot.take() {
            done.handle.join();
        }
    }

    let error = target.distance(axis.position_degrees());
    if error <= tolerance {
        return;
    }

    // Already heading there
    if slot.as_ref().is_some_and(|f| f.target.distance(target) <= tolerance) {
        return;
    }

    debug!(axis = axis.name(), target = %target, error, "Tracking correction");
    let handle = axis.spawn_move(target);
    if let Some(previous) = slot.replace(InFlight { target, handle }) {
        // spawn_move already cancelled it
        previous.handle.join();
    }
}
