//! External player process as the playback resource
//!
//! A running process is playing; a process that exited cleanly has reached
//! the end of its media; a non-zero exit or a spawn error is a failure.
//! Pausing stops the process and resuming starts it again from the top.

use std::path::{Path, PathBuf};
use std::process::{Child, Command, Stdio};

use kiosk_core::{KioskError, KioskResult, PlaybackHealth};

use crate::{MediaPlayer, PlayerFactory};

/// Placeholder replaced by the asset path in player arguments
pub const SOURCE_PLACEHOLDER: &str = "{path}";

/// Player process driving one asset
pub struct ProcessPlayer {
    program: String,
    args: Vec<String>,
    source: PathBuf,
    child: Option<Child>,
    failed: bool,
    /// Exited cleanly and not restarted since
    ended: bool,
}

impl ProcessPlayer {
    pub fn new(program: impl Into<String>, args: &[String], source: &Path) -> Self {
        let path = source.display().to_string();
        ProcessPlayer {
            program: program.into(),
            args: args.iter().map(|a| a.replace(SOURCE_PLACEHOLDER, &path)).collect(),
            source: source.to_path_buf(),
            child: None,
            failed: false,
            ended: false,
        }
    }

    /// Process id while running
    pub fn pid(&self) -> Option<u32> {
        self.child.as_ref().map(Child::id)
    }

    fn spawn(&mut self) -> KioskResult<()> {
        let child = Command::new(&self.program)
            .args(&self.args)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .spawn()
            .map_err(|e| {
                self.failed = true;
                KioskError::Playback(format!("spawn {}: {}", self.program, e))
            })?;
        tracing::debug!(pid = child.id(), program = %self.program, "player process started");
        self.child = Some(child);
        self.ended = false;
        Ok(())
    }

    fn stop(&mut self) -> KioskResult<()> {
        if let Some(mut child) = self.child.take() {
            // Already exited is fine
            let _ = child.kill();
            child
                .wait()
                .map_err(|e| KioskError::Playback(format!("reap player process: {}", e)))?;
        }
        Ok(())
    }
}

impl MediaPlayer for ProcessPlayer {
    fn health(&mut self) -> PlaybackHealth {
        if self.failed {
            return PlaybackHealth::FAILED;
        }
        let Some(child) = self.child.as_mut() else {
            return PlaybackHealth::STALLED;
        };
        match child.try_wait() {
            Ok(None) => PlaybackHealth::PLAYING,
            Ok(Some(status)) => {
                self.child = None;
                if status.success() {
                    self.ended = true;
                    PlaybackHealth::STALLED
                } else {
                    tracing::debug!(%status, "player process exited with failure");
                    self.failed = true;
                    PlaybackHealth::FAILED
                }
            }
            Err(e) => {
                tracing::debug!(error = %e, "player process status unavailable");
                self.failed = true;
                PlaybackHealth::FAILED
            }
        }
    }

    fn resume(&mut self) -> KioskResult<()> {
        if self.failed {
            return Err(KioskError::Playback("player process failed".into()));
        }
        if self.child.is_some() {
            return Ok(());
        }
        self.spawn()
    }

    fn pause(&mut self) -> KioskResult<()> {
        self.stop()
    }

    fn seek_to_start(&mut self) -> KioskResult<()> {
        self.stop()
    }

    fn reached_end(&mut self) -> bool {
        if self.child.is_some() {
            self.health();
        }
        self.ended
    }

    fn source(&self) -> &Path {
        &self.source
    }
}

impl Drop for ProcessPlayer {
    fn drop(&mut self) {
        if let Err(e) = self.stop() {
            tracing::warn!(error = %e, "player process teardown");
        }
    }
}

/// Builds a [`ProcessPlayer`] per asset
#[derive(Clone, Debug)]
pub struct ProcessPlayerFactory {
    pub program: String,
    pub args: Vec<String>,
}

impl ProcessPlayerFactory {
    pub fn new(program: impl Into<String>, args: Vec<String>) -> Self {
        ProcessPlayerFactory {
            program: program.into(),
            args,
        }
    }
}

impl PlayerFactory for ProcessPlayerFactory {
    fn create(&mut self, source: &Path) -> KioskResult<Box<dyn MediaPlayer>> {
        if !source.is_file() {
            return Err(KioskError::Playback(format!("asset {} not found", source.display())));
        }
        Ok(Box::new(ProcessPlayer::new(self.program.clone(), &self.args, source)))
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use std::time::{Duration, Instant};

    fn asset() -> (tempfile::TempDir, PathBuf) {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("clip.mp4");
        std::fs::write(&path, b"frames").unwrap();
        (dir, path)
    }

    fn shell(script: &str) -> ProcessPlayerFactory {
        ProcessPlayerFactory::new("sh", vec!["-c".into(), script.into(), SOURCE_PLACEHOLDER.into()])
    }

    fn wait_for(player: &mut dyn MediaPlayer, want: PlaybackHealth) -> bool {
        let deadline = Instant::now() + Duration::from_secs(5);
        while Instant::now() < deadline {
            if player.health() == want {
                return true;
            }
            std::thread::sleep(Duration::from_millis(20));
        }
        false
    }

    #[test]
    fn test_missing_asset_is_rejected() {
        let mut factory = shell("sleep 5");
        assert!(factory.create(Path::new("/nonexistent/clip.mp4")).is_err());
    }

    #[test]
    fn test_placeholder_is_substituted() {
        let (_dir, path) = asset();
        let player = ProcessPlayer::new("mpv", &["--loop".into(), "{path}".into()], &path);
        assert_eq!(player.args[1], path.display().to_string());
    }

    #[test]
    fn test_running_process_is_playing() {
        let (_dir, path) = asset();
        let mut player = shell("sleep 5").create(&path).unwrap();
        assert_eq!(player.health(), PlaybackHealth::STALLED);

        player.resume().unwrap();
        assert_eq!(player.health(), PlaybackHealth::PLAYING);

        player.pause().unwrap();
        assert_eq!(player.health(), PlaybackHealth::STALLED);
    }

    #[test]
    fn test_clean_exit_is_end_of_media() {
        let (_dir, path) = asset();
        let mut player = shell("exit 0").create(&path).unwrap();
        player.resume().unwrap();
        assert!(wait_for(player.as_mut(), PlaybackHealth::STALLED));
    }

    #[test]
    fn test_clean_exit_reports_end_until_restarted() {
        let (_dir, path) = asset();
        let mut player = ProcessPlayer::new("sh", &["-c".into(), "exit 0".into()], &path);
        assert!(!player.reached_end());
        player.resume().unwrap();

        let deadline = Instant::now() + Duration::from_secs(5);
        while !player.reached_end() && Instant::now() < deadline {
            std::thread::sleep(Duration::from_millis(20));
        }
        assert!(player.reached_end());
        assert!(player.pid().is_none());

        player.seek_to_start().unwrap();
        player.resume().unwrap();
        assert!(player.pid().is_some());
    }

    #[test]
    fn test_killed_process_is_not_end_of_media() {
        let (_dir, path) = asset();
        let mut player = ProcessPlayer::new("sh", &["-c".into(), "sleep 5".into()], &path);
        player.resume().unwrap();
        player.pause().unwrap();
        assert!(!player.reached_end());
    }

    #[test]
    fn test_non_zero_exit_is_failure() {
        let (_dir, path) = asset();
        let mut player = shell("exit 3").create(&path).unwrap();
        player.resume().unwrap();
        assert!(wait_for(player.as_mut(), PlaybackHealth::FAILED));
        assert!(player.resume().is_err());
    }

    #[test]
    fn test_spawn_error_is_failure() {
        let (_dir, path) = asset();
        let mut player = ProcessPlayerFactory::new("/nonexistent/player", vec![])
            .create(&path)
            .unwrap();
        assert!(player.resume().is_err());
        assert_eq!(player.health(), PlaybackHealth::FAILED);
    }
}
