//! One client connection.

use std::net::SocketAddr;
use std::sync::Arc;

use heapless::Vec as LineBuf;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tracing::{debug, info, warn};

use crate::config::Degrees;
use crate::error::ProtocolError;
use crate::tracker::Tracker;

use super::protocol::{self, Command};

/// Longest accepted line, newline excluded.
pub const MAX_LINE: usize = 256;

/// What to do after a line has been handled.
enum Flow {
    Continue,
    Close,
}

/// Serve one connection until the client quits or disconnects.
pub async fn handle(mut stream: TcpStream, peer: SocketAddr, tracker: Arc<Tracker>) {
    info!(%peer, "Client connected");

    let mut buf = [0u8; 1024];
    let mut line: LineBuf<u8, MAX_LINE> = LineBuf::new();
    let mut overflowed = false;

    'session: loop {
        let n = match stream.read(&mut buf).await {
            Ok(0) => break,
            Ok(n) => n,
            Err(e) => {
                debug!(%peer, error = %e, "Read failed");
                break;
            }
        };

        for &byte in &buf[..n] {
            if byte == b'\n' {
                if overflowed {
                    overflowed = false;
                    line.clear();
                    continue;
                }

                let text = String::from_utf8_lossy(&line).into_owned();
                line.clear();

                let (reply, flow) = respond(&text, &tracker).await;
                if let Some(reply) = reply {
                    if stream.write_all(reply.as_bytes()).await.is_err() {
                        break 'session;
                    }
                }
                if let Flow::Close = flow {
                    break 'session;
                }
            } else if !overflowed && line.push(byte).is_err() {
                warn!(%peer, "Line too long, discarding");
                overflowed = true;
                line.clear();
                let reply = protocol::report(ProtocolError::LineTooLong.code());
                if stream.write_all(reply.as_bytes()).await.is_err() {
                    break 'session;
                }
            }
        }
    }

    info!(%peer, "Client disconnected");
}

/// Execute one line against the tracker.
async fn respond(line: &str, tracker: &Arc<Tracker>) -> (Option<String>, Flow) {
    let command = match protocol::parse(line) {
        Ok(Some(command)) => command,
        Ok(None) => return (None, Flow::Continue),
        Err(e) => {
            match e {
                ProtocolError::Unknown(_) => warn!(error = %e, "Rejected command"),
                _ => debug!(error = %e, "Rejected command"),
            }
            return (Some(protocol::report(e.code())), Flow::Continue);
        }
    };
    debug!(?command, "Command");

    let reply = match command {
        Command::Goto { az, el } => {
            let tracker = tracker.clone();
            // The reply does not wait for the slew
            drop(tokio::task::spawn_blocking(move || {
                tracker.goto(Degrees(az), Degrees(el))
            }));
            protocol::report(0)
        }
        Command::Position(dialect) => {
            let (az, el) = tracker.position();
            protocol::format_position(dialect, az.0, el.0)
        }
        Command::Stop => {
            let tracker = tracker.clone();
            if let Err(e) = tokio::task::spawn_blocking(move || tracker.stop()).await {
                warn!(error = %e, "Stop task failed");
            }
            protocol::report(0)
        }
        Command::Version => format!("{}\n", protocol::VERSION_BANNER),
        Command::Info => format!("{}\n", protocol::INFO_BANNER),
        Command::DumpState => {
            let (az, el) = tracker.limits();
            protocol::format_dump_state(az, el)
        }
        Command::Quit => return (None, Flow::Close),
    };

    (Some(reply), Flow::Continue)
}
