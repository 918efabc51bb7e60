//! EasyComm2 and rotctld command parsing and reply formatting.

use crate::config::AngleLimits;
use crate::error::ProtocolError;

/// Reply to `VE`.
pub const VERSION_BANNER: &str = "space-station-rotator v1.0";

/// Reply to `_` / `\get_info`.
pub const INFO_BANNER: &str = "space-station-rotator";

/// Which client dialect asked for the position.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Dialect {
    /// `AZ<az> EL<el>`
    EasyComm,
    /// `<az>\n<el>` with six decimals
    Rotctld,
}

/// A parsed request line.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Command {
    /// Slew to a target without waiting for it.
    Goto {
        /// Target azimuth in degrees.
        az: f64,
        /// Target elevation in degrees.
        el: f64,
    },
    /// Report the current position.
    Position(Dialect),
    /// Emergency stop.
    Stop,
    /// Version banner.
    Version,
    /// Info banner.
    Info,
    /// rotctld capability dump.
    DumpState,
    /// Close the connection.
    Quit,
}

/// Parse one line (without its newline). First match wins.
///
/// Returns `Ok(None)` for blank lines, which get no reply.
pub fn parse(line: &str) -> Result<Option<Command>, ProtocolError> {
    let line = line.trim();
    if line.is_empty() {
        return Ok(None);
    }

    if line.starts_with("AZ") && line.contains("EL") {
        return parse_easycomm_position(line).map(Some);
    }

    let command = match line {
        "AZ" | "AZ EL" | "IP" => Command::Position(Dialect::EasyComm),
        "SA" | "SE" | "SA SE" => Command::Stop,
        "VE" => Command::Version,
        "p" | "\\get_pos" => Command::Position(Dialect::Rotctld),
        "S" | "\\stop" => Command::Stop,
        "_" | "\\get_info" => Command::Info,
        "1" | "\\dump_state" => Command::DumpState,
        "q" | "\\quit" => Command::Quit,
        _ if line.starts_with("P ") || line.starts_with("\\set_pos ") => {
            parse_set_pos(line)?
        }
        _ => return Err(ProtocolError::Unknown(line.to_string())),
    };

    Ok(Some(command))
}

/// `AZ<f> EL<f>` sets a target; with either value missing it is a query.
fn parse_easycomm_position(line: &str) -> Result<Command, ProtocolError> {
    let mut az = None;
    let mut el = None;

    for part in line.split_whitespace() {
        if let Some(value) = part.strip_prefix("AZ") {
            az = parse_optional(value, line)?.or(az);
        } else if let Some(value) = part.strip_prefix("EL") {
            el = parse_optional(value, line)?.or(el);
        }
    }

    Ok(match (az, el) {
        (Some(az), Some(el)) => Command::Goto { az, el },
        _ => Command::Position(Dialect::EasyComm),
    })
}

fn parse_optional(value: &str, line: &str) -> Result<Option<f64>, ProtocolError> {
    if value.is_empty() {
        return Ok(None);
    }
    value
        .parse()
        .map(Some)
        .map_err(|_| ProtocolError::Malformed(line.to_string()))
}

fn parse_set_pos(line: &str) -> Result<Command, ProtocolError> {
    let mut parts = line.split_whitespace().skip(1);
    let mut next = || -> Result<f64, ProtocolError> {
        parts
            .next()
            .and_then(|v| v.parse().ok())
            .ok_or_else(|| ProtocolError::Malformed(line.to_string()))
    };

    let az = next()?;
    let el = next()?;
    Ok(Command::Goto { az, el })
}

/// `RPRT <code>` line.
pub fn report(code: i32) -> String {
    format!("RPRT {code}\n")
}

/// Position reply in the requested dialect.
pub fn format_position(dialect: Dialect, az: f64, el: f64) -> String {
    match dialect {
        Dialect::EasyComm => format!("AZ{az:.1} EL{el:.1}\n"),
        Dialect::Rotctld => format!("{az:.6}\n{el:.6}\n"),
    }
}

/// rotctld `dump_state` reply: protocol version, model, write delay,
/// azimuth range, elevation range, status flags.
pub fn format_dump_state(az: AngleLimits, el: AngleLimits) -> String {
    format!(
        "0\n2\n0\n{:.1} {:.1}\n{:.1} {:.1}\n0\n",
        az.min.0, az.max.0, el.min.0, el.max.0
    )
}
