//! Spawning a core process and waiting for its readiness signal.
//!
//! The lobby creates an anonymous pipe, lets the child inherit the write
//! end and passes its descriptor number as `--pipe=<fd>`. The core writes
//! [`READY_SENTINEL`] once it accepts connections on the match port. Only
//! then are the players handed off, so they never race the core's bind.

use std::future::Future;
use std::path::PathBuf;
use std::process::Stdio;
use std::time::Duration;

use cardlobby_room::{CoreProcess, MatchKey, MatchPlan};
use serde::{Deserialize, Serialize};
use tokio::process::Command;
use tokio::sync::mpsc;

use crate::LaunchError;
#[cfg(unix)]
use crate::CoreHandle;

/// The byte a core writes to the handshake pipe when it is ready.
pub const READY_SENTINEL: u8 = 42;

/// How to invoke the core binary.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CoreInfo {
    pub file_name: String,
    /// Arguments placed before the lobby's own.
    #[serde(default)]
    pub arguments: Vec<String>,
    #[serde(default)]
    pub working_directory: Option<PathBuf>,
}

impl CoreInfo {
    /// A command for the core with the configured arguments and working
    /// directory. Callers append their mode-specific arguments.
    pub fn command(&self) -> Command {
        let mut command = Command::new(&self.file_name);
        command.args(&self.arguments).stdin(Stdio::null());
        if let Some(dir) = &self.working_directory {
            command.current_dir(dir);
        }
        command
    }
}

/// The lobby-supplied arguments for a match core.
pub fn match_arguments(plan: &MatchPlan, manifest: &str, pipe_fd: i32) -> Vec<String> {
    vec![
        "--replay=true".to_owned(),
        "--mode=duel".to_owned(),
        format!("--port={}", plan.port),
        format!("--players={manifest}"),
        format!("--noshuffle={}", plan.noshuffle),
        format!("--pipe={pipe_fd}"),
    ]
}

// ---------------------------------------------------------------------------
// Launcher
// ---------------------------------------------------------------------------

/// Starts cores for matches whose players are both ready.
///
/// On success the returned core is already accepting connections. The
/// launcher must send the plan's [`MatchKey`] on `exits` when the core
/// terminates.
pub trait Launcher: Send + Sync + 'static {
    type Core: CoreProcess + 'static;

    fn launch(
        &self,
        plan: &MatchPlan,
        exits: mpsc::UnboundedSender<MatchKey>,
    ) -> impl Future<Output = Result<Self::Core, LaunchError>> + Send;
}

/// Launches the configured core binary as a child process.
#[derive(Debug, Clone)]
pub struct CoreLauncher {
    info: CoreInfo,
    handshake_timeout: Duration,
}

impl CoreLauncher {
    pub fn new(info: CoreInfo, handshake_timeout: Duration) -> Self {
        Self {
            info,
            handshake_timeout,
        }
    }
}

#[cfg(unix)]
impl Launcher for CoreLauncher {
    type Core = CoreHandle;

    async fn launch(
        &self,
        plan: &MatchPlan,
        exits: mpsc::UnboundedSender<MatchKey>,
    ) -> Result<CoreHandle, LaunchError> {
        use std::os::fd::{AsRawFd, OwnedFd};

        use tokio::net::unix::pipe;

        let port = plan.port;
        let manifest = crate::manifest::encode_manifest(plan);
        let (reader, writer) = std::io::pipe().map_err(LaunchError::Pipe)?;
        let write_fd = writer.as_raw_fd();

        let mut command = self.info.command();
        command.args(match_arguments(plan, &manifest, write_fd));
        // SAFETY: the closure only calls fcntl, which is async-signal-safe.
        unsafe {
            command.pre_exec(move || inherit_fd(write_fd));
        }

        let mut child = command.spawn().map_err(LaunchError::Spawn)?;
        // The child holds its own copy; ours must go so a dying core shows
        // up as end-of-file.
        drop(writer);
        tracing::info!(port, pid = ?child.id(), "core spawned, awaiting handshake");

        let handshake = async {
            let mut receiver =
                pipe::Receiver::from_owned_fd(OwnedFd::from(reader)).map_err(LaunchError::Pipe)?;
            wait_for_sentinel(&mut receiver).await
        };
        let outcome = match tokio::time::timeout(self.handshake_timeout, handshake).await {
            Ok(result) => result,
            Err(_) => Err(LaunchError::HandshakeTimeout(self.handshake_timeout)),
        };

        match outcome {
            Ok(()) => {
                tracing::info!(port, "core signalled readiness");
                Ok(CoreHandle::watch(plan.key(), child, exits))
            }
            Err(e) => {
                tracing::error!(port, error = %e, "core handshake failed");
                if let Err(kill_err) = child.kill().await {
                    tracing::debug!(port, error = %kill_err, "failed to kill core");
                }
                Err(e)
            }
        }
    }
}

#[cfg(not(unix))]
impl Launcher for CoreLauncher {
    type Core = NoCore;

    async fn launch(
        &self,
        plan: &MatchPlan,
        _exits: mpsc::UnboundedSender<MatchKey>,
    ) -> Result<NoCore, LaunchError> {
        tracing::error!(port = plan.port, core = %self.info.file_name, "pipe handshake needs a unix host");
        Err(LaunchError::Unsupported)
    }
}

/// Placeholder core type on platforms without pipe inheritance.
#[cfg(not(unix))]
#[derive(Debug)]
pub enum NoCore {}

#[cfg(not(unix))]
impl CoreProcess for NoCore {
    fn has_exited(&self) -> bool {
        match *self {}
    }

    fn kill(&mut self) {
        match *self {}
    }
}

/// Clears `FD_CLOEXEC` so `fd` survives the exec into the core.
#[cfg(unix)]
fn inherit_fd(fd: i32) -> std::io::Result<()> {
    // SAFETY: plain fcntl calls on a descriptor owned by this process.
    let flags = unsafe { libc::fcntl(fd, libc::F_GETFD) };
    if flags == -1 {
        return Err(std::io::Error::last_os_error());
    }
    if unsafe { libc::fcntl(fd, libc::F_SETFD, flags & !libc::FD_CLOEXEC) } == -1 {
        return Err(std::io::Error::last_os_error());
    }
    Ok(())
}

/// Reads until the sentinel byte. Other bytes are ignored.
async fn wait_for_sentinel<R>(reader: &mut R) -> Result<(), LaunchError>
where
    R: tokio::io::AsyncRead + Unpin,
{
    use tokio::io::AsyncReadExt;

    let mut buf = [0u8; 64];
    loop {
        let n = reader.read(&mut buf).await.map_err(LaunchError::Handshake)?;
        if n == 0 {
            return Err(LaunchError::CoreExited);
        }
        if buf[..n].contains(&READY_SENTINEL) {
            return Ok(());
        }
    }
}
