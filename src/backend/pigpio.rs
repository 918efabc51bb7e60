//! Minimal pigpiod socket client.
//!
//! Every request is four little-endian `u32` words (command, p1, p2, p3)
//! where p3 is the length of an optional extension that follows. The daemon
//! answers with four words, the last one being the signed result.

use std::io::{Read, Write};
use std::net::{TcpStream, ToSocketAddrs};
use std::sync::Mutex;
use std::time::Duration;

use tracing::trace;

use crate::error::BackendError;

use super::PinId;

/// pigpio command numbers.
pub mod cmd {
    /// Set GPIO mode.
    pub const MODES: u32 = 0;
    /// Set pull-up/down.
    pub const PUD: u32 = 2;
    /// Read GPIO level.
    pub const READ: u32 = 3;
    /// Write GPIO level.
    pub const WRITE: u32 = 4;
    /// Hardware revision.
    pub const HWVER: u32 = 17;
    /// Clear all waveforms.
    pub const WVCLR: u32 = 27;
    /// Add generic pulses to the wave being built.
    pub const WVAG: u32 = 28;
    /// Wave transmission in progress.
    pub const WVBSY: u32 = 32;
    /// Abort wave transmission.
    pub const WVHLT: u32 = 33;
    /// Send a trigger pulse.
    pub const TRIG: u32 = 37;
    /// Create a wave from the added pulses.
    pub const WVCRE: u32 = 49;
    /// Delete a wave.
    pub const WVDEL: u32 = 50;
    /// Transmit a wave once.
    pub const WVTX: u32 = 51;
}

/// GPIO mode: input.
pub const MODE_INPUT: u32 = 0;
/// GPIO mode: output.
pub const MODE_OUTPUT: u32 = 1;
/// Pull-up resistor.
pub const PUD_UP: u32 = 2;

const CONNECT_TIMEOUT: Duration = Duration::from_millis(500);
const IO_TIMEOUT: Duration = Duration::from_secs(2);

/// Connection to a pigpio daemon.
///
/// Commands are serialized on one socket.
#[derive(Debug)]
pub struct PigpioClient {
    stream: Mutex<TcpStream>,
}

impl PigpioClient {
    /// Connect to pigpiod and check that it answers.
    pub fn connect(addr: &str) -> Result<Self, BackendError> {
        let addr = addr
            .to_socket_addrs()?
            .next()
            .ok_or_else(|| BackendError::Unavailable(format!("cannot resolve {addr}")))?;

        let stream = TcpStream::connect_timeout(&addr, CONNECT_TIMEOUT)?;
        stream.set_nodelay(true)?;
        stream.set_read_timeout(Some(IO_TIMEOUT))?;
        stream.set_write_timeout(Some(IO_TIMEOUT))?;

        let client = Self {
            stream: Mutex::new(stream),
        };
        client.command(cmd::HWVER, 0, 0)?;
        Ok(client)
    }

    /// Send a command without extension.
    pub fn command(&self, command: u32, p1: u32, p2: u32) -> Result<u32, BackendError> {
        self.command_ext(command, p1, p2, &[])
    }

    /// Send a command with an extension payload.
    ///
    /// Negative results are returned as [`BackendError::Pigpio`].
    pub fn command_ext(
        &self,
        command: u32,
        p1: u32,
        p2: u32,
        ext: &[u8],
    ) -> Result<u32, BackendError> {
        let mut request = Vec::with_capacity(16 + ext.len());
        for word in [command, p1, p2, ext.len() as u32] {
            request.extend_from_slice(&word.to_le_bytes());
        }
        request.extend_from_slice(ext);

        let mut response = [0u8; 16];
        {
            let mut stream = self.stream.lock().unwrap_or_else(|e| e.into_inner());
            stream.write_all(&request)?;
            stream.read_exact(&mut response)?;
        }

        let result = i32::from_le_bytes([response[12], response[13], response[14], response[15]]);
        trace!(command, p1, p2, ext_len = ext.len(), result, "pigpiod");

        if result < 0 {
            Err(BackendError::Pigpio {
                command,
                code: result,
            })
        } else {
            Ok(result as u32)
        }
    }

    /// Set a pin's mode.
    pub fn set_mode(&self, pin: PinId, mode: u32) -> Result<(), BackendError> {
        self.command(cmd::MODES, pin.0 as u32, mode).map(drop)
    }

    /// Set a pin's pull resistor.
    pub fn set_pull(&self, pin: PinId, pud: u32) -> Result<(), BackendError> {
        self.command(cmd::PUD, pin.0 as u32, pud).map(drop)
    }

    /// Drive a pin.
    pub fn write(&self, pin: PinId, high: bool) -> Result<(), BackendError> {
        self.command(cmd::WRITE, pin.0 as u32, high as u32).map(drop)
    }

    /// Read a pin.
    pub fn read(&self, pin: PinId) -> Result<bool, BackendError> {
        self.command(cmd::READ, pin.0 as u32, 0).map(|v| v != 0)
    }

    /// Hardware-timed single pulse of `micros` at `high` level.
    pub fn trigger(&self, pin: PinId, micros: u32, high: bool) -> Result<(), BackendError> {
        self.command_ext(
            cmd::TRIG,
            pin.0 as u32,
            micros,
            &(high as u32).to_le_bytes(),
        )
        .map(drop)
    }
}

#[cfg(test)]
pub(crate) mod fake {
    //! In-process stand-in for pigpiod.

    use std::io::{Read, Write};
    use std::net::{TcpListener, TcpStream};
    use std::sync::{Arc, Mutex};
    use std::thread;

    use super::cmd;

    /// One request as seen by the fake daemon.
    #[derive(Debug, Clone, PartialEq, Eq)]
    pub struct Request {
        pub command: u32,
        pub p1: u32,
        pub p2: u32,
        pub ext: Vec<u8>,
    }

    /// Fake pigpiod listening on an ephemeral loopback port.
    pub struct FakeDaemon {
        pub addr: String,
        pub log: Arc<Mutex<Vec<Request>>>,
    }

    impl FakeDaemon {
        pub fn start() -> Self {
            let listener = TcpListener::bind("127.0.0.1:0").unwrap();
            let addr = listener.local_addr().unwrap().to_string();
            let log = Arc::new(Mutex::new(Vec::new()));

            let shared = log.clone();
            thread::spawn(move || {
                for stream in listener.incoming() {
                    let Ok(stream) = stream else { break };
                    let shared = shared.clone();
                    thread::spawn(move || serve(stream, shared));
                }
            });

            Self { addr, log }
        }

        pub fn commands(&self) -> Vec<u32> {
            self.log.lock().unwrap().iter().map(|r| r.command).collect()
        }

        pub fn requests(&self, command: u32) -> Vec<Request> {
            self.log
                .lock()
                .unwrap()
                .iter()
                .filter(|r| r.command == command)
                .cloned()
                .collect()
        }
    }

    fn serve(mut stream: TcpStream, log: Arc<Mutex<Vec<Request>>>) {
        let mut next_wave = 0u32;
        loop {
            let mut header = [0u8; 16];
            if stream.read_exact(&mut header).is_err() {
                return;
            }
            let word = |i: usize| {
                u32::from_le_bytes([header[i], header[i + 1], header[i + 2], header[i + 3]])
            };
            let (command, p1, p2, p3) = (word(0), word(4), word(8), word(12));

            let mut ext = vec![0u8; p3 as usize];
            if stream.read_exact(&mut ext).is_err() {
                return;
            }

            let result: i32 = match command {
                cmd::HWVER => 0xa02082,
                cmd::READ => 1,
                cmd::WVCRE => {
                    next_wave += 1;
                    next_wave as i32 - 1
                }
                cmd::WVAG => (ext.len() / 12) as i32,
                cmd::WRITE if p1 > 53 => -3,
                _ => 0,
            };

            log.lock().unwrap().push(Request {
                command,
                p1,
                p2,
                ext,
            });

            let mut response = header;
            response[12..16].copy_from_slice(&result.to_le_bytes());
            if stream.write_all(&response).is_err() {
                return;
            }
        }
    }
}
