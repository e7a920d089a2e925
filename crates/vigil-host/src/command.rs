//! Command-backed host actions
//!
//! Each action runs a configured argv (no shell) and waits for it to exit.
//! The announce argv may contain placeholders that are substituted per
//! argument:
//!
//! | Placeholder   | Value                                   |
//! |---------------|-----------------------------------------|
//! | `{phrase}`    | "You have 1 hour and 30 minutes remaining" |
//! | `{minutes}`   | whole minutes remaining                 |
//! | `{seconds}`   | whole seconds remaining                 |
//! | `{remaining}` | `H:MM:SS`                               |

use async_trait::async_trait;
use std::process::Stdio;
use std::time::Duration;
use tokio::process::Command;
use tracing::{debug, info};
use vigil_util::{delta_from_std, format_hms};

use crate::{speak_remaining, Announcer, HostError, HostResult, Restrictor};

/// Substitute announce placeholders into every argument
pub fn render_argv(argv: &[String], remaining: Duration) -> Vec<String> {
    let phrase = speak_remaining(remaining);
    let minutes = (remaining.as_secs() / 60).to_string();
    let seconds = remaining.as_secs().to_string();
    let clock = format_hms(delta_from_std(remaining));

    argv.iter()
        .map(|arg| {
            arg.replace("{phrase}", &phrase)
                .replace("{minutes}", &minutes)
                .replace("{seconds}", &seconds)
                .replace("{remaining}", &clock)
        })
        .collect()
}

async fn run(argv: &[String]) -> HostResult<()> {
    let (program, args) = argv
        .split_first()
        .ok_or_else(|| HostError::Internal("empty command".into()))?;

    debug!(program = %program, args = ?args, "Running host command");

    let status = Command::new(program)
        .args(args)
        .stdin(Stdio::null())
        .kill_on_drop(true)
        .status()
        .await
        .map_err(|e| HostError::SpawnFailed(format!("Failed to spawn {}: {}", program, e)))?;

    if status.success() {
        Ok(())
    } else {
        Err(HostError::CommandFailed {
            program: program.clone(),
            status: status.to_string(),
        })
    }
}

/// Announces by running a command (e.g. a text-to-speech tool)
#[derive(Debug, Clone)]
pub struct CommandAnnouncer {
    argv: Vec<String>,
}

impl CommandAnnouncer {
    pub fn new(argv: Vec<String>) -> Self {
        Self { argv }
    }
}

#[async_trait]
impl Announcer for CommandAnnouncer {
    async fn announce_remaining(&self, remaining: Duration) -> HostResult<()> {
        run(&render_argv(&self.argv, remaining)).await
    }
}

/// Restricts by running a command, `systemctl suspend` by default
#[derive(Debug, Clone)]
pub struct CommandRestrictor {
    argv: Vec<String>,
}

impl CommandRestrictor {
    pub fn new(argv: Vec<String>) -> Self {
        Self { argv }
    }
}

impl Default for CommandRestrictor {
    fn default() -> Self {
        Self::new(vec!["systemctl".into(), "suspend".into()])
    }
}

#[async_trait]
impl Restrictor for CommandRestrictor {
    async fn restrict(&self) -> HostResult<()> {
        run(&self.argv).await
    }
}

/// Announcer that only writes the phrase to the log
#[derive(Debug, Clone, Copy, Default)]
pub struct LogAnnouncer;

#[async_trait]
impl Announcer for LogAnnouncer {
    async fn announce_remaining(&self, remaining: Duration) -> HostResult<()> {
        info!(
            remaining_secs = remaining.as_secs(),
            phrase = %speak_remaining(remaining),
            "Readout"
        );
        Ok(())
    }
}

/// Restrictor that only logs; used for dry runs
#[derive(Debug, Clone, Copy, Default)]
pub struct LogRestrictor;

#[async_trait]
impl Restrictor for LogRestrictor {
    async fn restrict(&self) -> HostResult<()> {
        info!("Restrict requested (dry run, no action taken)");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn argv(parts: &[&str]) -> Vec<String> {
        parts.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn placeholders_are_substituted() {
        let rendered = render_argv(
            &argv(&["notify", "{phrase}", "--min={minutes}", "{seconds}s", "{remaining}"]),
            Duration::from_secs(5400),
        );
        assert_eq!(
            rendered,
            argv(&[
                "notify",
                "You have 1 hour and 30 minutes remaining",
                "--min=90",
                "5400s",
                "1:30:00"
            ])
        );
    }

    #[tokio::test]
    async fn successful_command() {
        let announcer = CommandAnnouncer::new(argv(&["true"]));
        announcer
            .announce_remaining(Duration::from_secs(60))
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn failing_command_reports_status() {
        let restrictor = CommandRestrictor::new(argv(&["false"]));
        let err = restrictor.restrict().await.unwrap_err();
        assert!(matches!(err, HostError::CommandFailed { ref program, .. } if program == "false"));
    }

    #[tokio::test]
    async fn missing_program_fails_to_spawn() {
        let restrictor = CommandRestrictor::new(argv(&["/nonexistent/vigil-test-binary"]));
        assert!(matches!(
            restrictor.restrict().await,
            Err(HostError::SpawnFailed(_))
        ));
    }

    #[tokio::test]
    async fn empty_argv_is_rejected() {
        let restrictor = CommandRestrictor::new(Vec::new());
        assert!(matches!(restrictor.restrict().await, Err(HostError::Internal(_))));
    }

    #[tokio::test]
    async fn log_actions_succeed() {
        LogAnnouncer
            .announce_remaining(Duration::from_secs(300))
            .await
            .unwrap();
        LogRestrictor.restrict().await.unwrap();
    }
}
