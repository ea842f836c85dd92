//! Push notifications for alerts.
//!
//! Delivery is best effort: the scheduler logs a failed send to the console
//! and carries on with the tick.

use anyhow::{anyhow, Context, Result};
use std::process::{Command, Stdio};

pub trait Notifier: Send + Sync {
    fn send(&self, messages: &[String]) -> Result<()>;
}

/// Hands the messages to an external program, one argument per message
/// (`telegram-send "msg one" "msg two"` by default).
pub struct CommandNotifier {
    command: String,
    args: Vec<String>,
}

impl CommandNotifier {
    pub fn new(command: impl Into<String>, args: Vec<String>) -> Self {
        Self { command: command.into(), args }
    }
}

impl Notifier for CommandNotifier {
    fn send(&self, messages: &[String]) -> Result<()> {
        if messages.is_empty() {
            return Ok(());
        }
        let status = Command::new(&self.command)
            .args(&self.args)
            .args(messages)
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .status()
            .with_context(|| format!("failed to run notifier `{}`", self.command))?;

        if !status.success() {
            return Err(anyhow!("notifier `{}` exited with {}", self.command, status));
        }
        Ok(())
    }
}
