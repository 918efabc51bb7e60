//! Hardware-timed pulse trains through pigpiod waves.
//!
//! pigpio transmits one wave at a time, so trains are cut into short windows
//! and a single scheduler thread merges the windows of every running train
//! into one multi-GPIO wave. Both axes therefore step in parallel, with DMA
//! timing inside each window.

use std::collections::{BTreeMap, HashSet};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc;
use std::sync::{Arc, Condvar, Mutex};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use tracing::{debug, error, info};

use crate::error::BackendError;

use super::pigpio::{cmd, PigpioClient, MODE_INPUT, MODE_OUTPUT, PUD_UP};
use super::{Level, PinId, PulseBackend, PULSE_HIGH};

/// Length of one scheduled window. Also the cancellation latency.
pub const WINDOW: Duration = Duration::from_millis(20);

/// How long the scheduler waits for the other trains' next window.
const GATHER: Duration = Duration::from_millis(2);

/// pigpio accepts a bounded extension per WVAG call.
const MAX_PULSES_PER_CALL: usize = 1000;

/// One entry of a pigpio generic wave.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WavePulse {
    /// GPIOs switched on at the start of this entry.
    pub on: u32,
    /// GPIOs switched off at the start of this entry.
    pub off: u32,
    /// Microseconds until the next entry.
    pub delay_us: u32,
}

impl WavePulse {
    fn to_le_bytes(self) -> [u8; 12] {
        let mut out = [0u8; 12];
        out[0..4].copy_from_slice(&self.on.to_le_bytes());
        out[4..8].copy_from_slice(&self.off.to_le_bytes());
        out[8..12].copy_from_slice(&self.delay_us.to_le_bytes());
        out
    }
}

/// Merge per-pin windows that start together into one wave.
///
/// Each interval starts with a rising edge held for `hold`. The wave lasts
/// as long as the longest window.
pub fn merge_windows(windows: &[(PinId, &[Duration])], hold: Duration) -> Vec<WavePulse> {
    let hold_ns = hold.as_nanos();
    let to_us = |ns: u128| ((ns + 500) / 1000) as u64;

    let mut events: BTreeMap<u64, (u32, u32)> = BTreeMap::new();
    let mut end_us = 0u64;

    for (pin, intervals) in windows {
        let mask = pin.mask();
        let mut t_ns = 0u128;
        for interval in intervals.iter() {
            events.entry(to_us(t_ns)).or_default().0 |= mask;
            events.entry(to_us(t_ns + hold_ns)).or_default().1 |= mask;
            t_ns += interval.as_nanos().max(hold_ns + 1000);
        }
        end_us = end_us.max(to_us(t_ns));
    }

    let times: Vec<u64> = events.keys().copied().collect();
    events
        .values()
        .enumerate()
        .map(|(i, (on, off))| {
            let next = times.get(i + 1).copied().unwrap_or(end_us);
            WavePulse {
                on: *on,
                off: *off,
                delay_us: next.saturating_sub(times[i]).min(u32::MAX as u64) as u32,
            }
        })
        .collect()
}

/// Number of leading intervals that fill one window (at least one).
fn window_len(intervals: &[Duration]) -> usize {
    let mut total = Duration::ZERO;
    for (i, interval) in intervals.iter().enumerate() {
        total += *interval;
        if total >= WINDOW {
            return i + 1;
        }
    }
    intervals.len()
}

struct Request {
    pin: PinId,
    intervals: Vec<Duration>,
    reply: mpsc::Sender<Result<u64, BackendError>>,
}

#[derive(Default)]
struct Queue {
    active: usize,
    pending: Vec<Request>,
    shutdown: bool,
}

struct Shared {
    queue: Mutex<Queue>,
    ready: Condvar,
}

impl Shared {
    fn lock(&self) -> std::sync::MutexGuard<'_, Queue> {
        self.queue.lock().unwrap_or_else(|e| e.into_inner())
    }
}

/// Registration of a running train; the scheduler waits for its windows.
struct TrainGuard<'a>(&'a Shared);

impl Drop for TrainGuard<'_> {
    fn drop(&mut self) {
        self.0.lock().active -= 1;
        self.0.ready.notify_all();
    }
}

/// Hardware-timed backend over pigpiod.
pub struct WaveformBackend {
    client: Arc<PigpioClient>,
    shared: Arc<Shared>,
    worker: Mutex<Option<JoinHandle<()>>>,
    outputs: Mutex<HashSet<PinId>>,
    inputs: Mutex<HashSet<PinId>>,
    released: AtomicBool,
}

impl WaveformBackend {
    /// Connect to pigpiod and start the wave scheduler.
    pub fn connect(addr: &str) -> Result<Self, BackendError> {
        let client = Arc::new(PigpioClient::connect(addr)?);
        client.command(cmd::WVCLR, 0, 0)?;

        let shared = Arc::new(Shared {
            queue: Mutex::new(Queue::default()),
            ready: Condvar::new(),
        });

        let worker = {
            let client = client.clone();
            let shared = shared.clone();
            thread::Builder::new()
                .name("wave-scheduler".to_string())
                .spawn(move || run_scheduler(&client, &shared))?
        };

        info!(addr, "Connected to pigpiod");

        Ok(Self {
            client,
            shared,
            worker: Mutex::new(Some(worker)),
            outputs: Mutex::new(HashSet::new()),
            inputs: Mutex::new(HashSet::new()),
            released: AtomicBool::new(false),
        })
    }

    fn register(&self) -> TrainGuard<'_> {
        self.shared.lock().active += 1;
        TrainGuard(self.shared.as_ref())
    }

    fn submit(&self, pin: PinId, intervals: Vec<Duration>) -> Result<u64, BackendError> {
        let (reply, result) = mpsc::channel();
        {
            let mut queue = self.shared.lock();
            if queue.shutdown {
                return Err(BackendError::SchedulerStopped);
            }
            queue.pending.push(Request {
                pin,
                intervals,
                reply,
            });
        }
        self.shared.ready.notify_all();
        result.recv().map_err(|_| BackendError::SchedulerStopped)?
    }
}

impl PulseBackend for WaveformBackend {
    fn name(&self) -> &'static str {
        "pigpio-wave"
    }

    fn is_simulated(&self) -> bool {
        false
    }

    fn configure_output(&self, pin: PinId) -> Result<(), BackendError> {
        if pin.mask() == 0 {
            return Err(BackendError::PinOutOfRange(pin));
        }
        let mut outputs = self.outputs.lock().unwrap_or_else(|e| e.into_inner());
        if !outputs.contains(&pin) {
            self.client.set_mode(pin, MODE_OUTPUT)?;
            outputs.insert(pin);
        }
        Ok(())
    }

    fn configure_input_pulled_up(&self, pin: PinId) -> Result<(), BackendError> {
        let mut inputs = self.inputs.lock().unwrap_or_else(|e| e.into_inner());
        if !inputs.contains(&pin) {
            self.client.set_mode(pin, MODE_INPUT)?;
            self.client.set_pull(pin, PUD_UP)?;
            inputs.insert(pin);
        }
        Ok(())
    }

    fn write(&self, pin: PinId, level: Level) -> Result<(), BackendError> {
        self.client.write(pin, level.is_high())
    }

    fn pulse(&self, pin: PinId, high_hold: Duration) -> Result<(), BackendError> {
        let micros = high_hold.as_micros().clamp(1, 100) as u32;
        self.client.trigger(pin, micros, true)
    }

    fn read(&self, pin: PinId) -> Result<Level, BackendError> {
        self.client.read(pin).map(Level::from_bool)
    }

    fn delay(&self, duration: Duration) {
        thread::sleep(duration);
    }

    fn pulse_train(
        &self,
        pin: PinId,
        intervals: &[Duration],
        cancelled: &dyn Fn() -> bool,
        on_pulse: &mut dyn FnMut(),
    ) -> Result<u64, BackendError> {
        if pin.mask() == 0 {
            return Err(BackendError::PinOutOfRange(pin));
        }
        let _train = self.register();
        let mut emitted = 0;
        let mut rest = intervals;

        while !rest.is_empty() {
            if cancelled() {
                break;
            }
            let (window, tail) = rest.split_at(window_len(rest));
            let sent = self.submit(pin, window.to_vec())?;
            for _ in 0..sent {
                on_pulse();
            }
            emitted += sent;
            rest = tail;
        }

        Ok(emitted)
    }

    fn release(&self) {
        if self.released.swap(true, Ordering::AcqRel) {
            return;
        }

        self.shared.lock().shutdown = true;
        self.shared.ready.notify_all();
        if let Some(worker) = self
            .worker
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .take()
        {
            let _ = worker.join();
        }

        if let Err(e) = self.client.command(cmd::WVHLT, 0, 0) {
            error!(error = %e, "Failed to halt waves on release");
        }
        self.outputs.lock().unwrap_or_else(|e| e.into_inner()).clear();
        self.inputs.lock().unwrap_or_else(|e| e.into_inner()).clear();
        debug!("Released pigpiod backend");
    }
}

impl Drop for WaveformBackend {
    fn drop(&mut self) {
        self.release();
    }
}

fn run_scheduler(client: &PigpioClient, shared: &Shared) {
    loop {
        let batch = {
            let mut queue = shared.lock();
            while queue.pending.is_empty() && !queue.shutdown {
                queue = shared.ready.wait(queue).unwrap_or_else(|e| e.into_inner());
            }
            if queue.shutdown {
                for request in queue.pending.drain(..) {
                    let _ = request.reply.send(Err(BackendError::SchedulerStopped));
                }
                return;
            }

            // Give the other running trains a moment to hand in their window
            let deadline = Instant::now() + GATHER;
            while queue.pending.len() < queue.active && !queue.shutdown {
                let now = Instant::now();
                if now >= deadline {
                    break;
                }
                queue = shared
                    .ready
                    .wait_timeout(queue, deadline - now)
                    .unwrap_or_else(|e| e.into_inner())
                    .0;
            }

            take_one_per_pin(&mut queue.pending)
        };

        match transmit(client, &batch) {
            Ok(()) => {
                for request in batch {
                    let _ = request.reply.send(Ok(request.intervals.len() as u64));
                }
            }
            Err(e) => {
                error!(error = %e, "Wave transmission failed");
                for request in batch {
                    let _ = request.reply.send(Err(BackendError::Unavailable(e.to_string())));
                }
            }
        }
    }
}

fn take_one_per_pin(pending: &mut Vec<Request>) -> Vec<Request> {
    let mut seen = HashSet::new();
    let mut batch = Vec::new();
    let mut rest = Vec::new();
    for request in pending.drain(..) {
        if seen.insert(request.pin) {
            batch.push(request);
        } else {
            rest.push(request);
        }
    }
    *pending = rest;
    batch
}

fn transmit(client: &PigpioClient, batch: &[Request]) -> Result<(), BackendError> {
    let windows: Vec<(PinId, &[Duration])> = batch
        .iter()
        .map(|r| (r.pin, r.intervals.as_slice()))
        .collect();
    let pulses = merge_windows(&windows, PULSE_HIGH);
    let length: u64 = pulses.iter().map(|p| p.delay_us as u64).sum();

    for chunk in pulses.chunks(MAX_PULSES_PER_CALL) {
        let ext: Vec<u8> = chunk.iter().flat_map(|p| p.to_le_bytes()).collect();
        client.command_ext(cmd::WVAG, 0, 0, &ext)?;
    }

    let wave = client.command(cmd::WVCRE, 0, 0)?;
    client.command(cmd::WVTX, wave, 0)?;

    // Sleep through most of the wave, then poll for the tail
    thread::sleep(Duration::from_micros(length).saturating_sub(Duration::from_millis(1)));
    while client.command(cmd::WVBSY, 0, 0)? != 0 {
        thread::sleep(Duration::from_micros(200));
    }

    client.command(cmd::WVDEL, wave, 0)?;
    Ok(())
}
