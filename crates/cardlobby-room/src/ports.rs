//! Room port allocation.
//!
//! A port is free when no waiting room or running match claims it and the
//! operating system does not report it as an active TCP endpoint. The OS
//! check is a snapshot: another process may bind the port between
//! allocation and the core's own bind, and the core has to cope with that.

use std::collections::HashSet;

use crate::RoomError;

/// Source of the ports currently in use by TCP sockets on this host.
pub trait PortProbe: Send {
    fn active_ports(&self) -> HashSet<u16>;
}

/// Returns the first port in `min..=max` that is neither claimed nor
/// active. The scan is ascending, so equal inputs give equal results.
pub fn allocate(
    min: u16,
    max: u16,
    claimed: &HashSet<u16>,
    active: &HashSet<u16>,
) -> Result<u16, RoomError> {
    (min..=max)
        .find(|port| !claimed.contains(port) && !active.contains(port))
        .ok_or(RoomError::NoFreePort)
}

/// A probe that never reports a busy port.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoProbe;

impl PortProbe for NoProbe {
    fn active_ports(&self) -> HashSet<u16> {
        HashSet::new()
    }
}

/// Reads local ports from `/proc/net/tcp` and `/proc/net/tcp6`.
#[derive(Debug, Clone, Copy, Default)]
pub struct ProcNetTcp;

impl PortProbe for ProcNetTcp {
    fn active_ports(&self) -> HashSet<u16> {
        let mut ports = HashSet::new();
        for table in ["/proc/net/tcp", "/proc/net/tcp6"] {
            match std::fs::read_to_string(table) {
                Ok(contents) => ports.extend(parse_proc_net_tcp(&contents)),
                Err(e) => tracing::debug!(table, error = %e, "TCP table unavailable"),
            }
        }
        ports
    }
}

/// The probe for the current platform. Only Linux exposes its TCP table;
/// elsewhere allocation relies on the registry's own claims.
pub fn system_probe() -> Box<dyn PortProbe> {
    if cfg!(target_os = "linux") {
        Box::new(ProcNetTcp)
    } else {
        Box::new(NoProbe)
    }
}

/// Extracts local ports from the text of a `/proc/net/tcp`-style table.
///
/// Each data row looks like `0: 0100007F:1F90 00000000:0000 0A ...`; the
/// port is the hex number after the colon of the second column.
fn parse_proc_net_tcp(contents: &str) -> impl Iterator<Item = u16> + '_ {
    contents.lines().skip(1).filter_map(|line| {
        let local = line.split_whitespace().nth(1)?;
        let (_, port) = local.rsplit_once(':')?;
        u16::from_str_radix(port, 16).ok()
    })
}
