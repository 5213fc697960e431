//! OS-managed services
//!
//! Windows services are driven with `net stop` / `net start`; everywhere
//! else with `systemctl`.

use std::process::Command;
use std::time::Duration;

use super::process::{run_with_timeout, CommandOutput};
use super::{StartOutcome, StopOutcome};

/// NET HELPMSG 3521: "The ... service is not started."
const NET_NOT_STARTED: &str = "3521";
/// NET HELPMSG 2182: "The requested service has already been started."
const NET_ALREADY_STARTED: &str = "2182";

/// Service manager used to control services
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ServiceManager {
    /// `net stop|start "<name>"`
    WindowsNet,
    /// `systemctl stop|start <name>`
    Systemd,
}

impl ServiceManager {
    /// The manager for the platform we were built for
    pub fn native() -> Self {
        if cfg!(windows) {
            Self::WindowsNet
        } else {
            Self::Systemd
        }
    }
}

/// Controls a single OS service by name
#[derive(Debug, Clone)]
pub struct ServiceController {
    manager: ServiceManager,
    stop_timeout: Duration,
    start_timeout: Duration,
}

impl ServiceController {
    pub fn new(manager: ServiceManager, stop_timeout: Duration, start_timeout: Duration) -> Self {
        Self {
            manager,
            stop_timeout,
            start_timeout,
        }
    }

    pub(crate) fn command(&self, action: &str, name: &str) -> Command {
        let mut command = match self.manager {
            ServiceManager::WindowsNet => Command::new("net"),
            ServiceManager::Systemd => Command::new("systemctl"),
        };
        command.arg(action).arg(name);
        command
    }

    pub fn stop(&self, name: &str) -> StopOutcome {
        match run_with_timeout(self.command("stop", name), self.stop_timeout) {
            Ok(output) => classify_stop(&output),
            Err(reason) => StopOutcome::Failed(reason),
        }
    }

    pub fn start(&self, name: &str) -> StartOutcome {
        match run_with_timeout(self.command("start", name), self.start_timeout) {
            Ok(output) => classify_start(&output),
            Err(reason) => StartOutcome::Failed(reason),
        }
    }
}

fn classify_stop(output: &CommandOutput) -> StopOutcome {
    if output.success {
        return StopOutcome::Stopped;
    }
    let text = output.combined();
    let lower = text.to_lowercase();
    if text.contains(NET_NOT_STARTED) || lower.contains("is not started") {
        StopOutcome::AlreadyStopped
    } else {
        StopOutcome::Failed(failure_reason(output, &text))
    }
}

fn classify_start(output: &CommandOutput) -> StartOutcome {
    if output.success {
        return StartOutcome::Started;
    }
    let text = output.combined();
    let lower = text.to_lowercase();
    if text.contains(NET_ALREADY_STARTED) || lower.contains("already been started") {
        StartOutcome::AlreadyRunning
    } else {
        StartOutcome::Failed(failure_reason(output, &text))
    }
}

pub(super) fn failure_reason(output: &CommandOutput, text: &str) -> String {
    let code = output
        .code
        .map(|c| c.to_string())
        .unwrap_or_else(|| "signal".to_string());
    if text.is_empty() {
        format!("exit status {}", code)
    } else {
        format!("exit status {}: {}", code, text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn failed(stdout: &str, stderr: &str) -> CommandOutput {
        CommandOutput {
            success: false,
            code: Some(2),
            stdout: stdout.into(),
            stderr: stderr.into(),
        }
    }

    #[test]
    fn test_net_not_started_is_already_stopped() {
        let output = failed(
            "",
            "The Gitea service is not started.\n\nMore help is available by typing NET HELPMSG 3521.",
        );
        assert_eq!(classify_stop(&output), StopOutcome::AlreadyStopped);
    }

    #[test]
    fn test_net_already_started_is_already_running() {
        let output = failed(
            "",
            "The requested service has already been started.\n\nMore help is available by typing NET HELPMSG 2182.",
        );
        assert_eq!(classify_start(&output), StartOutcome::AlreadyRunning);
    }

    #[test]
    fn test_other_failures_carry_reason() {
        let output = failed("", "System error 5 has occurred.\n\nAccess is denied.");
        match classify_stop(&output) {
            StopOutcome::Failed(reason) => {
                assert!(reason.starts_with("exit status 2"));
                assert!(reason.contains("Access is denied."));
            }
            other => panic!("unexpected outcome: {:?}", other),
        }
    }

    #[test]
    fn test_success() {
        let output = CommandOutput {
            success: true,
            code: Some(0),
            ..Default::default()
        };
        assert_eq!(classify_stop(&output), StopOutcome::Stopped);
        assert_eq!(classify_start(&output), StartOutcome::Started);
    }

    #[test]
    fn test_command_shape() {
        let controller = ServiceController::new(
            ServiceManager::WindowsNet,
            Duration::from_secs(1),
            Duration::from_secs(1),
        );
        let command = controller.command("stop", "Gitea Server");
        assert_eq!(command.get_program(), "net");
        let args: Vec<_> = command.get_args().collect();
        assert_eq!(args, ["stop", "Gitea Server"]);

        let controller = ServiceController::new(
            ServiceManager::Systemd,
            Duration::from_secs(1),
            Duration::from_secs(1),
        );
        assert_eq!(controller.command("start", "redis").get_program(), "systemctl");
    }
}
