//! Rotator protocol server.
//!
//! Line-based TCP server speaking EasyComm2 and a rotctld subset, so that
//! Gpredict, SatDump and other Hamlib clients can point the antenna. Every
//! connection gets its own session; all sessions share one [`Tracker`].

use std::io;
use std::sync::Arc;

use tokio::net::{TcpListener, ToSocketAddrs};
use tracing::{info, warn};

use crate::tracker::Tracker;

pub mod protocol;
mod session;

pub use protocol::{Command, Dialect};
pub use session::MAX_LINE;

/// Standard rotctld port.
pub const DEFAULT_PORT: u16 = 4533;

/// Accept connections forever, one task per client.
pub async fn serve(listener: TcpListener, tracker: Arc<Tracker>) -> io::Result<()> {
    loop {
        match listener.accept().await {
            Ok((stream, peer)) => {
                tokio::spawn(session::handle(stream, peer, tracker.clone()));
            }
            Err(e) => warn!(error = %e, "Failed to accept connection"),
        }
    }
}

/// Bind `addr` and serve.
pub async fn run<A: ToSocketAddrs>(addr: A, tracker: Arc<Tracker>) -> io::Result<()> {
    let listener = TcpListener::bind(addr).await?;
    let local = listener.local_addr()?;
    info!(%local, "Rotator server listening");
    info!(
        "Connect Gpredict: Host={}, Port={}, Type=EasyComm2",
        local.ip(),
        local.port()
    );
    serve(listener, tracker).await
}
