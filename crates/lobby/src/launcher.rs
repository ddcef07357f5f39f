//! Starting game server processes.

use std::future::Future;
use std::io;
use std::path::PathBuf;
use std::process::Stdio;

use lobby_protocol::ErrorKind;
use tokio::process::Command;

/// Everything needed to start one game server.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LaunchSpec {
    pub room_name: String,
    pub game_id: String,
    /// Installed game directory; the process runs with this as its cwd.
    pub game_dir: PathBuf,
    /// The manifest's `server_entry`, relative to `game_dir`.
    pub server_entry: String,
    pub game_port: u16,
}

/// Why a game server could not be started.
#[derive(Debug, thiserror::Error)]
pub enum LaunchError {
    #[error("failed to launch {entry} for room {room}: {source}")]
    Spawn {
        room: String,
        entry: String,
        #[source]
        source: io::Error,
    },
}

impl LaunchError {
    pub fn kind(&self) -> ErrorKind {
        ErrorKind::Internal
    }
}

/// Starts game servers.
///
/// `launch` returns once the process is running; it does not wait for the
/// game to end.
pub trait GameLauncher: Send + Sync + 'static {
    fn launch(
        &self,
        spec: &LaunchSpec,
    ) -> impl Future<Output = Result<(), LaunchError>> + Send;
}

/// Launches each game as a detached child process.
///
/// The child gets `GAME_PORT` in its environment and inherits nothing on
/// stdin. A background task reaps it and logs how it exited.
#[derive(Debug, Clone, Default)]
pub struct ProcessLauncher {
    runner: Option<String>,
}

impl ProcessLauncher {
    /// Runs `server_entry` directly.
    pub fn new() -> Self {
        Self::default()
    }

    /// Runs `server_entry` through `runner`, as in `python3 server.py`.
    pub fn with_runner(runner: Option<String>) -> Self {
        Self { runner }
    }

    fn command(&self, spec: &LaunchSpec) -> Command {
        let mut command = match &self.runner {
            Some(runner) => {
                let mut command = Command::new(runner);
                command.arg(&spec.server_entry);
                command
            }
            None => Command::new(spec.game_dir.join(&spec.server_entry)),
        };
        command
            .current_dir(&spec.game_dir)
            .env("GAME_PORT", spec.game_port.to_string())
            .stdin(Stdio::null());
        command
    }
}

impl GameLauncher for ProcessLauncher {
    async fn launch(&self, spec: &LaunchSpec) -> Result<(), LaunchError> {
        let mut child = self.command(spec).spawn().map_err(|source| LaunchError::Spawn {
            room: spec.room_name.clone(),
            entry: spec.server_entry.clone(),
            source,
        })?;

        let room = spec.room_name.clone();
        let pid = child.id();
        tracing::info!(%room, game = %spec.game_id, ?pid, "game server launched");

        tokio::spawn(async move {
            match child.wait().await {
                Ok(status) => tracing::info!(%room, ?pid, %status, "game server exited"),
                Err(e) => tracing::warn!(%room, ?pid, error = %e, "failed to wait on game server"),
            }
        });
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn spec(dir: &std::path::Path, entry: &str) -> LaunchSpec {
        LaunchSpec {
            room_name: "r1".into(),
            game_id: "g".into(),
            game_dir: dir.to_path_buf(),
            server_entry: entry.into(),
            game_port: 60002,
        }
    }

    #[tokio::test]
    async fn test_launch_missing_entry_fails() {
        let dir = tempfile::tempdir().unwrap();
        let err = ProcessLauncher::new()
            .launch(&spec(dir.path(), "no-such-server"))
            .await
            .unwrap_err();
        assert!(matches!(err, LaunchError::Spawn { ref entry, .. } if entry == "no-such-server"));
        assert_eq!(err.kind(), ErrorKind::Internal);
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_launch_with_runner_starts_process() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("server.sh"), "exit 0\n").unwrap();

        let launcher = ProcessLauncher::with_runner(Some("sh".into()));
        launcher.launch(&spec(dir.path(), "server.sh")).await.unwrap();
    }

    #[test]
    fn test_command_sets_cwd_and_port() {
        let launcher = ProcessLauncher::with_runner(Some("python3".into()));
        let spec = spec(std::path::Path::new("/games/g"), "server.py");
        let command = launcher.command(&spec);
        let std_command = command.as_std();

        assert_eq!(std_command.get_program(), "python3");
        assert_eq!(std_command.get_args().collect::<Vec<_>>(), ["server.py"]);
        assert_eq!(std_command.get_current_dir(), Some(std::path::Path::new("/games/g")));
        let port = std_command
            .get_envs()
            .find(|(k, _)| *k == "GAME_PORT")
            .and_then(|(_, v)| v);
        assert_eq!(port, Some(std::ffi::OsStr::new("60002")));
    }
}
