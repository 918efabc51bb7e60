//! Integration tests for the tracker coordinator on the simulation backend.

use std::sync::{Arc, Mutex};
use std::thread;
use std::time::{Duration, Instant};

use altaz_rotator::backend::{Pacing, SimulatedBackend};
use altaz_rotator::config::{
    Degrees, DegreesPerSec, DegreesPerSecSquared, Microsteps, TrackerConfig,
};
use altaz_rotator::{Level, PinId, Tracker, TrackerMode};

const AZ_STEP: PinId = PinId(19);
const EL_STEP: PinId = PinId(18);
const AZ_SWITCH: PinId = PinId(5);
const EL_SWITCH: PinId = PinId(6);

fn tracker_with(config: TrackerConfig, pacing: Pacing) -> (Arc<Tracker>, Arc<SimulatedBackend>) {
    let sim = Arc::new(SimulatedBackend::new(pacing));
    let tracker = Tracker::new(config, sim.clone()).unwrap();
    (Arc::new(tracker), sim)
}

fn tracker(pacing: Pacing) -> (Arc<Tracker>, Arc<SimulatedBackend>) {
    tracker_with(TrackerConfig::default(), pacing)
}

/// Coarse, fast axes: 20 steps/deg, 40 deg/s, 80 deg/s².
fn fast_config() -> TrackerConfig {
    let mut config = TrackerConfig::default();
    for axis in [&mut config.azimuth, &mut config.elevation] {
        axis.microsteps = Microsteps::QUARTER;
        axis.gear_ratio = 9.0;
        axis.max_velocity = DegreesPerSec(40.0);
        axis.acceleration = DegreesPerSecSquared(80.0);
    }
    config
}

fn wait_until(timeout: Duration, mut done: impl FnMut() -> bool) -> bool {
    let deadline = Instant::now() + timeout;
    while Instant::now() < deadline {
        if done() {
            return true;
        }
        thread::sleep(Duration::from_millis(10));
    }
    done()
}

fn near(actual: Degrees, expected: f64) -> bool {
    (actual.0 - expected).abs() < 0.01
}

// =============================================================================
// Slewing
// =============================================================================

/// goto moves both axes and ends idle.
#[test]
fn test_goto_reaches_target() {
    let (tracker, _) = tracker(Pacing::Instant);

    tracker.goto(Degrees(180.0), Degrees(45.0));

    let (az, el) = tracker.position();
    assert!(near(az, 180.0));
    assert!(near(el, 45.0));

    let status = tracker.status();
    assert_eq!(status.mode, TrackerMode::Idle);
    assert!(!status.is_slewing);
    assert_eq!(status.az_target, 180.0);
    assert_eq!(status.el_target, 45.0);
}

/// Both axes run in parallel: the slew takes as long as the slower axis.
#[test]
fn test_goto_runs_axes_in_parallel() {
    let (tracker, _) = tracker_with(fast_config(), Pacing::RealTime);

    let start = Instant::now();
    tracker.goto(Degrees(20.0), Degrees(0.0));
    let t_az = start.elapsed();

    let start = Instant::now();
    tracker.goto(Degrees(20.0), Degrees(20.0));
    let t_el = start.elapsed();

    let start = Instant::now();
    tracker.goto(Degrees(0.0), Degrees(0.0));
    let t_both = start.elapsed();

    let sum = t_az + t_el;
    let slower = t_az.max(t_el);
    assert!(
        t_both < sum.mul_f64(0.75),
        "parallel slew took {t_both:?}, sequential would be {sum:?}"
    );
    assert!(t_both > slower.mul_f64(0.8));
}

/// Out-of-range targets are clamped into the limits.
#[test]
fn test_goto_clamps_targets() {
    let (tracker, _) = tracker(Pacing::Instant);

    tracker.goto(Degrees(400.0), Degrees(-5.0));

    let (az, el) = tracker.position();
    assert!(near(az, 360.0));
    assert!(near(el, 0.0));
    assert_eq!(tracker.status().el_target, 0.0);
}

/// Status reads never wait for a slew in progress.
#[test]
fn test_status_during_slew() {
    let (tracker, _) = tracker(Pacing::RealTime);

    let slewing = {
        let tracker = tracker.clone();
        thread::spawn(move || tracker.goto(Degrees(90.0), Degrees(45.0)))
    };
    assert!(wait_until(Duration::from_secs(1), || {
        tracker.mode() == TrackerMode::Slewing
    }));

    let start = Instant::now();
    let status = tracker.status();
    assert!(start.elapsed() < Duration::from_millis(50));
    assert!(status.is_slewing);
    assert!(status.motors_enabled);

    tracker.stop();
    slewing.join().unwrap();
    assert_eq!(tracker.mode(), TrackerMode::Idle);
}

/// Emergency stop ends a slew early and leaves the tracker idle.
#[test]
fn test_stop_interrupts_goto() {
    let (tracker, sim) = tracker(Pacing::RealTime);

    let slewing = {
        let tracker = tracker.clone();
        thread::spawn(move || tracker.goto(Degrees(90.0), Degrees(45.0)))
    };
    thread::sleep(Duration::from_millis(300));

    tracker.stop();
    let az_pulses = sim.pulse_count(AZ_STEP);
    let el_pulses = sim.pulse_count(EL_STEP);

    let start = Instant::now();
    slewing.join().unwrap();
    assert!(start.elapsed() < Duration::from_millis(500));

    let status = tracker.status();
    assert_eq!(status.mode, TrackerMode::Idle);
    assert_eq!(status.az_steps, az_pulses as i64);
    assert_eq!(status.el_steps, el_pulses as i64);
    assert!(status.az_position < 90.0);
}

/// The JSON status record carries mode and position.
#[test]
fn test_status_json() {
    let (tracker, _) = tracker(Pacing::Instant);
    tracker.goto(Degrees(90.0), Degrees(30.0));

    let json = tracker.status().to_json().unwrap();
    let value: serde_json::Value = serde_json::from_str(&json).unwrap();

    assert_eq!(value["mode"], "idle");
    assert_eq!(value["backend"], "simulation");
    assert_eq!(value["simulated"], true);
    assert!((value["az_position"].as_f64().unwrap() - 90.0).abs() < 0.01);
    assert!(!json.contains('\n'));
}

// =============================================================================
// Homing
// =============================================================================

/// Elevation homes first; its failure leaves azimuth untouched.
#[test]
fn test_home_fails_without_switch_contact() {
    let (tracker, sim) = tracker(Pacing::Instant);

    assert!(tracker.home().is_err());

    let status = tracker.status();
    assert!(!status.is_homed);
    assert_eq!(status.mode, TrackerMode::Idle);
    assert!(sim.pulse_count(EL_STEP) > 0);
    assert_eq!(sim.pulse_count(AZ_STEP), 0);
}

/// Pressed switches home both axes to their offsets.
#[test]
fn test_home_succeeds() {
    let (tracker, sim) = tracker(Pacing::Instant);
    sim.set_input(AZ_SWITCH, Level::Low);
    sim.set_input(EL_SWITCH, Level::Low);

    tracker.home().unwrap();

    let status = tracker.status();
    assert!(status.is_homed);
    assert!(status.motors_enabled);
    assert_eq!(status.az_steps, 0);
    assert_eq!(status.el_steps, 0);
}

// =============================================================================
// Parking
// =============================================================================

/// park slews to the park position and disables the drivers.
#[test]
fn test_park() {
    let (tracker, _) = tracker(Pacing::Instant);
    tracker.goto(Degrees(120.0), Degrees(30.0));

    tracker.park();

    let status = tracker.status();
    assert_eq!(status.mode, TrackerMode::Parked);
    assert!(status.is_parked);
    assert!(!status.motors_enabled);
    assert!(near(Degrees(status.az_position), 0.0));
    assert!(near(Degrees(status.el_position), 90.0));
}

/// A stop during the park slew leaves the tracker idle, enabled and unparked.
#[test]
fn test_stop_during_park() {
    let (tracker, _) = tracker(Pacing::RealTime);

    let parking = {
        let tracker = tracker.clone();
        thread::spawn(move || tracker.park())
    };
    thread::sleep(Duration::from_millis(300));

    tracker.stop();
    parking.join().unwrap();

    let status = tracker.status();
    assert_eq!(status.mode, TrackerMode::Idle);
    assert!(!status.is_parked);
    assert!(status.motors_enabled);
    assert!(status.el_position < 90.0);
}

/// Homing stopped between axes leaves azimuth alone.
#[test]
fn test_stop_during_home() {
    let (tracker, sim) = tracker(Pacing::RealTime);

    let homing = {
        let tracker = tracker.clone();
        thread::spawn(move || tracker.home())
    };
    thread::sleep(Duration::from_millis(200));

    tracker.stop();
    let result = homing.join().unwrap();

    assert!(result.is_err());
    assert!(!tracker.status().is_homed);
    assert_eq!(sim.pulse_count(AZ_STEP), 0);
    assert_eq!(tracker.mode(), TrackerMode::Idle);
}

// =============================================================================
// Tracking
// =============================================================================

fn tracking_config() -> TrackerConfig {
    let mut config = TrackerConfig::default();
    config.tracking.interval_secs = 0.02;
    config
}

/// The loop follows a moving target.
#[test]
fn test_tracking_follows_target() {
    let (tracker, _) = tracker_with(tracking_config(), Pacing::Instant);
    let target = Arc::new(Mutex::new((30.0, 10.0)));

    let feed = {
        let target = target.clone();
        move || *target.lock().unwrap()
    };
    tracker.start_tracking(feed);
    assert_eq!(tracker.mode(), TrackerMode::Tracking);

    assert!(wait_until(Duration::from_secs(5), || {
        let (az, el) = tracker.position();
        near(az, 30.0) && near(el, 10.0)
    }));

    *target.lock().unwrap() = (35.0, 12.0);
    assert!(wait_until(Duration::from_secs(5), || {
        let (az, el) = tracker.position();
        near(az, 35.0) && near(el, 12.0)
    }));

    tracker.stop_tracking();
    assert_eq!(tracker.mode(), TrackerMode::Idle);
    assert!(!tracker.is_tracking());
}

/// Errors within the tolerance issue no moves.
#[test]
fn test_tracking_ignores_small_errors() {
    let (tracker, sim) = tracker_with(tracking_config(), Pacing::Instant);

    tracker.start_tracking(|| (0.05, 0.05));
    thread::sleep(Duration::from_millis(200));
    tracker.stop_tracking();

    assert_eq!(sim.pulse_count(AZ_STEP), 0);
    assert_eq!(sim.pulse_count(EL_STEP), 0);
}

/// A panicking or non-finite feed does not end the loop.
#[test]
fn test_tracking_survives_bad_feed() {
    let (tracker, _) = tracker_with(tracking_config(), Pacing::Instant);
    let mut calls = 0u32;

    tracker.start_tracking(move || {
        calls += 1;
        match calls {
            1 => panic!("feed failure"),
            2 => (f64::NAN, 10.0),
            _ => (20.0, 10.0),
        }
    });

    assert!(wait_until(Duration::from_secs(5), || {
        let (az, el) = tracker.position();
        near(az, 20.0) && near(el, 10.0)
    }));
    assert!(tracker.is_tracking());
    tracker.stop();
    assert_eq!(tracker.mode(), TrackerMode::Idle);
}

/// goto ends the tracking loop first.
#[test]
fn test_goto_ends_tracking() {
    let (tracker, _) = tracker_with(tracking_config(), Pacing::Instant);

    tracker.start_tracking(|| (50.0, 20.0));
    tracker.goto(Degrees(10.0), Degrees(10.0));

    assert!(!tracker.is_tracking());
    let (az, el) = tracker.position();
    assert!(near(az, 10.0));
    assert!(near(el, 10.0));
}

/// Emergency stop from tracking leaves both axes still.
#[test]
fn test_stop_from_tracking() {
    let (tracker, sim) = tracker_with(tracking_config(), Pacing::RealTime);

    tracker.start_tracking(|| (90.0, 45.0));
    thread::sleep(Duration::from_millis(200));
    tracker.stop();

    assert!(!tracker.is_tracking());
    assert_eq!(tracker.mode(), TrackerMode::Idle);

    let az_pulses = sim.pulse_count(AZ_STEP);
    thread::sleep(Duration::from_millis(100));
    assert_eq!(sim.pulse_count(AZ_STEP), az_pulses);
}

// =============================================================================
// Shutdown
// =============================================================================

/// shutdown disables, releases and ignores later commands.
#[test]
fn test_shutdown() {
    let (tracker, sim) = tracker(Pacing::Instant);
    tracker.goto(Degrees(10.0), Degrees(10.0));

    tracker.shutdown();

    assert!(sim.is_released());
    let status = tracker.status();
    assert_eq!(status.mode, TrackerMode::Uninitialized);
    assert!(!status.motors_enabled);

    let pulses = sim.pulse_count(AZ_STEP);
    tracker.goto(Degrees(50.0), Degrees(50.0));
    tracker.start_tracking(|| (50.0, 50.0));
    assert_eq!(sim.pulse_count(AZ_STEP), pulses);
    assert!(!tracker.is_tracking());
}
