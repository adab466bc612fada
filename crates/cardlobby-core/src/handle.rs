//! Exit tracking for a running core.

use std::process::ExitStatus;
use std::sync::{Arc, OnceLock};

use cardlobby_room::{CoreProcess, MatchKey};
use tokio::process::Child;
use tokio::sync::{mpsc, oneshot};

/// Handle to a core that passed its handshake.
///
/// A watcher task owns the child process. It records the exit status and
/// sends the match key on the exit channel, which is how the lobby learns
/// about the exit without polling.
///
/// [`CoreProcess::has_exited`] is the polled check. Besides the recorded
/// status it asks the OS whether the pid still exists, so a core is seen
/// as gone even if the watcher never got to record it.
///
/// Dropping the handle leaves the core running.
#[derive(Debug)]
pub struct CoreHandle {
    key: MatchKey,
    pid: Option<u32>,
    // `None` inside the lock: waiting on the child failed.
    status: Arc<OnceLock<Option<ExitStatus>>>,
    kill: Option<oneshot::Sender<()>>,
}

impl CoreHandle {
    pub(crate) fn watch(
        key: MatchKey,
        mut child: Child,
        exits: mpsc::UnboundedSender<MatchKey>,
    ) -> Self {
        let port = key.port;
        let pid = child.id();
        let status = Arc::new(OnceLock::new());
        let (kill_tx, kill_rx) = oneshot::channel();

        let recorded = Arc::clone(&status);
        tokio::spawn(async move {
            let result = tokio::select! {
                result = child.wait() => result,
                Ok(()) = kill_rx => {
                    tracing::info!(port, "killing core");
                    if let Err(e) = child.start_kill() {
                        tracing::warn!(port, error = %e, "failed to signal core");
                    }
                    child.wait().await
                }
            };

            match result {
                Ok(status) => {
                    tracing::info!(port, %status, "core exited");
                    let _ = recorded.set(Some(status));
                }
                Err(e) => {
                    tracing::warn!(port, error = %e, "lost track of core process");
                    let _ = recorded.set(None);
                }
            }
            let _ = exits.send(key);
        });

        Self {
            key,
            pid,
            status,
            kill: Some(kill_tx),
        }
    }

    pub fn key(&self) -> MatchKey {
        self.key
    }

    pub fn port(&self) -> u16 {
        self.key.port
    }

    pub fn pid(&self) -> Option<u32> {
        self.pid
    }

    /// The exit status, once the core has exited and it could be read.
    pub fn exit_status(&self) -> Option<ExitStatus> {
        self.status.get().copied().flatten()
    }
}

impl CoreProcess for CoreHandle {
    fn has_exited(&self) -> bool {
        self.status.get().is_some() || self.pid.is_none_or(|pid| !process_alive(pid))
    }

    fn kill(&mut self) {
        if let Some(kill) = self.kill.take() {
            let _ = kill.send(());
        }
    }
}

/// Returns `true` while `pid` names a process, including an unreaped one.
#[cfg(unix)]
fn process_alive(pid: u32) -> bool {
    let Ok(pid) = libc::pid_t::try_from(pid) else {
        return false;
    };
    // SAFETY: signal 0 only checks that the process exists.
    if unsafe { libc::kill(pid, 0) } == 0 {
        return true;
    }
    // EPERM: it exists but belongs to someone else.
    std::io::Error::last_os_error().raw_os_error() == Some(libc::EPERM)
}

// Without a liveness check the recorded status is all there is.
#[cfg(not(unix))]
fn process_alive(_pid: u32) -> bool {
    true
}
