//! Tracker coordinator.
//!
//! Owns both axes and the pulse backend, and exposes the pointing API:
//! goto, home, park, stop and tracking.

use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use tracing::{error, info, warn};

use crate::axis::AxisEngine;
use crate::backend::PulseBackend;
use crate::config::{validate_config, AngleLimits, Degrees, TrackerConfig};
use crate::error::{HomingError, Result};

use super::state::{Bookkeeping, TrackerMode, TrackerStatus};
use super::tracking::{TargetFeed, TrackingLoop};

/// Longest `stop_tracking` waits for the loop to exit.
pub const STOP_TRACKING_TIMEOUT: Duration = Duration::from_secs(5);

/// Two-axis alt-az tracker.
///
/// All methods take `&self` and may be called from any thread. Motion
/// commands block the caller until the motion ends; status queries never
/// block on motion.
pub struct Tracker {
    config: TrackerConfig,
    backend: Arc<dyn PulseBackend>,
    az: Arc<AxisEngine>,
    el: Arc<AxisEngine>,
    book: Arc<Mutex<Bookkeeping>>,
    tracking: Mutex<Option<TrackingLoop>>,
    slews: AtomicUsize,
    stops: AtomicU64,
    shut_down: AtomicBool,
}

impl Tracker {
    /// Claim the pins of both axes and start in `Idle` with drivers disabled.
    ///
    /// # Errors
    ///
    /// Fails on an inconsistent configuration or if the backend refuses a pin.
    pub fn new(config: TrackerConfig, backend: Arc<dyn PulseBackend>) -> Result<Self> {
        validate_config(&config)?;

        let az = Arc::new(AxisEngine::new(
            "azimuth",
            config.azimuth.clone(),
            backend.clone(),
        )?);
        let el = Arc::new(AxisEngine::new(
            "elevation",
            config.elevation.clone(),
            backend.clone(),
        )?);

        let book = Bookkeeping {
            mode: TrackerMode::Idle,
            ..Bookkeeping::default()
        };

        info!(
            backend = backend.name(),
            simulated = backend.is_simulated(),
            az_resolution_arcsec = az.resolution_arcsec(),
            el_resolution_arcsec = el.resolution_arcsec(),
            "Tracker initialized"
        );

        Ok(Self {
            config,
            backend,
            az,
            el,
            book: Arc::new(Mutex::new(book)),
            tracking: Mutex::new(None),
            slews: AtomicUsize::new(0),
            stops: AtomicU64::new(0),
            shut_down: AtomicBool::new(false),
        })
    }

    /// Configuration the tracker was built from.
    pub fn config(&self) -> &TrackerConfig {
        &self.config
    }

    /// Azimuth axis.
    pub fn azimuth(&self) -> &Arc<AxisEngine> {
        &self.az
    }

    /// Elevation axis.
    pub fn elevation(&self) -> &Arc<AxisEngine> {
        &self.el
    }

    /// Current mode.
    pub fn mode(&self) -> TrackerMode {
        self.book().mode
    }

    /// Travel limits as `(azimuth, elevation)`.
    pub fn limits(&self) -> (AngleLimits, AngleLimits) {
        (self.az.limits(), self.el.limits())
    }

    /// Current `(azimuth, elevation)`. Never blocks on motion.
    pub fn position(&self) -> (Degrees, Degrees) {
        (self.az.position_degrees(), self.el.position_degrees())
    }

    /// True while the tracking loop runs.
    pub fn is_tracking(&self) -> bool {
        self.lock_tracking()
            .as_ref()
            .is_some_and(|l| !l.is_finished())
    }

    /// Enable both drivers.
    pub fn enable_motors(&self) {
        self.az.enable();
        self.el.enable();
        info!("Motors enabled");
    }

    /// Disable both drivers. Stop motion first.
    pub fn disable_motors(&self) {
        self.az.disable();
        self.el.disable();
        info!("Motors disabled");
    }

    /// Home elevation, then azimuth.
    ///
    /// A failure on either axis aborts and leaves the tracker not homed.
    pub fn home(&self) -> core::result::Result<(), HomingError> {
        if self.is_shut_down() {
            return Err(HomingError::ShutDown);
        }

        self.stop_tracking();
        self.set_mode(TrackerMode::Homing);
        self.book().homed = false;
        self.enable_motors();

        let stops = self.stops.load(Ordering::Acquire);
        let result = self.el.home().and_then(|()| {
            if self.stops.load(Ordering::Acquire) == stops {
                self.az.home()
            } else {
                Err(HomingError::Cancelled {
                    axis: self.az.name().to_string(),
                })
            }
        });

        let mut book = self.book();
        match &result {
            Ok(()) => {
                book.homed = true;
                info!("Both axes homed");
            }
            Err(e) => warn!(error = %e, "Homing failed"),
        }
        if book.mode == TrackerMode::Homing {
            book.mode = TrackerMode::Idle;
        }
        result
    }

    /// Slew both axes in parallel and wait for both to finish.
    ///
    /// Targets are clamped into the travel limits. Ends an active tracking
    /// loop, re-enables disabled drivers and clears the parked flag.
    pub fn goto(&self, az: Degrees, el: Degrees) {
        if self.is_shut_down() {
            warn!("goto ignored: tracker is shut down");
            return;
        }

        self.stop_tracking();
        if !(self.az.is_enabled() && self.el.is_enabled()) {
            self.enable_motors();
        }

        let az = self.az.limits().clamp(az);
        let el = self.el.limits().clamp(el);
        {
            let mut book = self.book();
            book.az_target = az;
            book.el_target = el;
            book.parked = false;
            book.mode = TrackerMode::Slewing;
        }
        self.slews.fetch_add(1, Ordering::AcqRel);
        info!(az = %az, el = %el, "Slewing");

        let az_move = self.az.spawn_move(az);
        let el_move = self.el.spawn_move(el);
        az_move.join();
        el_move.join();

        if self.slews.fetch_sub(1, Ordering::AcqRel) == 1 {
            let mut book = self.book();
            if book.mode == TrackerMode::Slewing {
                book.mode = TrackerMode::Idle;
            }
        }
    }

    /// Follow a moving target until `stop_tracking`, `stop`, `goto` or `park`.
    pub fn start_tracking<F: TargetFeed>(&self, feed: F) {
        if self.is_shut_down() {
            warn!("start_tracking ignored: tracker is shut down");
            return;
        }

        self.stop_tracking();
        if !(self.az.is_enabled() && self.el.is_enabled()) {
            self.enable_motors();
        }

        let spawned = TrackingLoop::spawn(
            [self.az.clone(), self.el.clone()],
            Box::new(feed),
            self.config.tracking,
            self.book.clone(),
        );

        match spawned {
            Ok(tracking) => {
                *self.lock_tracking() = Some(tracking);
                let mut book = self.book();
                book.parked = false;
                book.mode = TrackerMode::Tracking;
            }
            Err(e) => error!(error = %e, "Failed to start tracking thread"),
        }
    }

    /// End the tracking loop, waiting at most [`STOP_TRACKING_TIMEOUT`].
    pub fn stop_tracking(&self) {
        let Some(tracking) = self.lock_tracking().take() else {
            return;
        };

        tracking.stop(STOP_TRACKING_TIMEOUT);
        let mut book = self.book();
        if book.mode == TrackerMode::Tracking {
            book.mode = TrackerMode::Idle;
        }
        info!("Tracking stopped");
    }

    /// Emergency stop. Safe from any state; returns once no pulse is emitted.
    pub fn stop(&self) {
        self.stops.fetch_add(1, Ordering::AcqRel);
        self.stop_tracking();
        self.set_mode(TrackerMode::Stopped);
        self.az.stop();
        self.el.stop();
        warn!("Emergency stop");

        let mut book = self.book();
        if book.mode == TrackerMode::Stopped {
            book.mode = TrackerMode::Idle;
        }
    }

    /// Slew to the park position, then disable the drivers.
    ///
    /// If the slew is stopped or superseded before both axes arrive, the
    /// drivers stay enabled and the tracker is not marked parked.
    pub fn park(&self) {
        if self.is_shut_down() {
            warn!("park ignored: tracker is shut down");
            return;
        }

        let stops = self.stops.load(Ordering::Acquire);
        let park = self.config.park;
        info!(az = %park.azimuth, el = %park.elevation, "Parking");
        self.goto(park.azimuth, park.elevation);

        let arrived = self.az.is_at(park.azimuth) && self.el.is_at(park.elevation);
        if self.stops.load(Ordering::Acquire) != stops || !arrived {
            let (az, el) = self.position();
            warn!(az = %az, el = %el, "Park interrupted, not parked");
            return;
        }

        self.disable_motors();

        let mut book = self.book();
        book.parked = true;
        book.mode = TrackerMode::Parked;
    }

    /// Stop everything, disable the drivers and release the backend.
    ///
    /// Only the first call has an effect; also run on drop.
    pub fn shutdown(&self) {
        if self.shut_down.swap(true, Ordering::AcqRel) {
            return;
        }

        self.stop();
        self.disable_motors();
        self.backend.release();
        self.set_mode(TrackerMode::Uninitialized);
        info!("Tracker shut down");
    }

    /// Status snapshot. Never blocks on motion.
    pub fn status(&self) -> TrackerStatus {
        let book = *self.book();
        let (az, el) = self.position();
        let (az_enabled, el_enabled) = (self.az.is_enabled(), self.el.is_enabled());

        TrackerStatus {
            mode: book.mode,
            az_position: az.0,
            el_position: el.0,
            az_steps: self.az.position_steps().0,
            el_steps: self.el.position_steps().0,
            az_target: book.az_target.0,
            el_target: book.el_target.0,
            az_enabled,
            el_enabled,
            is_tracking: book.mode == TrackerMode::Tracking,
            is_slewing: book.mode == TrackerMode::Slewing,
            is_homed: book.homed,
            is_parked: book.parked,
            motors_enabled: az_enabled && el_enabled,
            az_resolution_arcsec: self.az.resolution_arcsec(),
            el_resolution_arcsec: self.el.resolution_arcsec(),
            backend: self.backend.name(),
            simulated: self.backend.is_simulated(),
        }
    }

    /// Name of the active pulse backend.
    pub fn backend_name(&self) -> &'static str {
        self.backend.name()
    }

    /// True when no hardware is driven.
    pub fn is_simulated(&self) -> bool {
        self.backend.is_simulated()
    }

    fn is_shut_down(&self) -> bool {
        self.shut_down.load(Ordering::Acquire)
    }

    fn set_mode(&self, mode: TrackerMode) {
        self.book().mode = mode;
    }

    fn book(&self) -> MutexGuard<'_, Bookkeeping> {
        self.book.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn lock_tracking(&self) -> MutexGuard<'_, Option<TrackingLoop>> {
        self.tracking.lock().unwrap_or_else(|e| e.into_inner())
    }
}

impl Drop for Tracker {
    fn drop(&mut self) {
        self.shutdown();
    }
}

impl core::fmt::Debug for Tracker {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("Tracker")
            .field("mode", &self.mode())
            .field("azimuth", &self.az)
            .field("elevation", &self.el)
            .field("backend", &self.backend.name())
            .finish()
    }
}
