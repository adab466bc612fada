//! Matches that have been handed off to a core process.

use std::time::Instant;

/// A spawned core process as seen by the registry.
///
/// The registry only needs to know whether the process is gone and how to
/// stop it when a match is abandoned.
pub trait CoreProcess: Send {
    /// Returns `true` once the process has exited.
    fn has_exited(&self) -> bool;

    /// Asks the process to terminate. Calling it on an exited process is a
    /// no-op.
    fn kill(&mut self);
}

/// Identifies one launch of a core.
///
/// Ports are reused once a match is reaped, so exit notifications carry
/// the launch serial too. A late exit of a reaped match then cannot be
/// mistaken for the exit of a newer match on the same port.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct MatchKey {
    pub port: u16,
    pub serial: u64,
}

/// A handed-off match. Its port stays claimed and its player names stay
/// taken until it is reaped.
#[derive(Debug)]
pub struct RunningMatch<C> {
    pub(crate) port: u16,
    pub(crate) serial: u64,
    pub(crate) names: [String; 2],
    pub(crate) started_at: Instant,
    pub(crate) finished: bool,
    pub(crate) core: C,
}

impl<C: CoreProcess> RunningMatch<C> {
    pub fn port(&self) -> u16 {
        self.port
    }

    pub fn key(&self) -> MatchKey {
        MatchKey {
            port: self.port,
            serial: self.serial,
        }
    }

    pub fn names(&self) -> &[String; 2] {
        &self.names
    }

    pub fn started_at(&self) -> Instant {
        self.started_at
    }

    /// `true` once the exit notification arrived or the poll saw the
    /// process gone.
    pub fn is_finished(&self) -> bool {
        self.finished || self.core.has_exited()
    }
}
