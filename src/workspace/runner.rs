use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;

use crate::error::{with_timeout, AppError, Result};

/// Build or test executor. `run` returns the raw transcript; interpretation
/// happens elsewhere. `cleanup` must be safe to call after a failed `run`.
#[async_trait]
pub trait CommandRunner: Send + Sync {
    async fn run(&self) -> Result<String>;
    async fn cleanup(&self) -> Result<()>;
}

/// Runs shell commands in the project checkout, one after another.
pub struct ShellRunner {
    dir: PathBuf,
    commands: Vec<String>,
    timeout: Duration,
    /// Process groups started by `run`, reaped by `cleanup`.
    spawned: Mutex<Vec<u32>>,
}

impl ShellRunner {
    pub fn new(dir: &Path, commands: Vec<String>, timeout: Duration) -> Self {
        Self {
            dir: dir.to_path_buf(),
            commands,
            timeout,
            spawned: Mutex::new(Vec::new()),
        }
    }

    async fn run_one(&self, command: &str) -> Result<String> {
        let mut cmd = tokio::process::Command::new("sh");
        cmd.arg("-c")
            .arg(command)
            .current_dir(&self.dir)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        #[cfg(unix)]
        cmd.process_group(0);

        let child = cmd.spawn()?;
        if let Some(pid) = child.id() {
            self.track(pid);
        }

        let output = with_timeout(&format!("command `{command}`"), self.timeout, async {
            child.wait_with_output().await.map_err(AppError::from)
        })
        .await?;

        let status = match output.status.code() {
            Some(code) => format!("[exit status: {code}]"),
            None => "[terminated by signal]".to_string(),
        };

        Ok(format!(
            "$ {command}\n{}{}{status}\n",
            String::from_utf8_lossy(&output.stdout),
            String::from_utf8_lossy(&output.stderr),
        ))
    }

    fn track(&self, pid: u32) {
        if let Ok(mut spawned) = self.spawned.lock() {
            spawned.push(pid);
        }
    }
}

#[async_trait]
impl CommandRunner for ShellRunner {
    async fn run(&self) -> Result<String> {
        if self.commands.is_empty() {
            return Ok("No commands configured.".to_string());
        }

        let mut transcript = String::new();
        for command in &self.commands {
            tracing::info!(command = %command, dir = %self.dir.display(), "Running command");
            transcript.push_str(&self.run_one(command).await?);
        }
        Ok(transcript)
    }

    async fn cleanup(&self) -> Result<()> {
        let groups: Vec<u32> = match self.spawned.lock() {
            Ok(mut spawned) => spawned.drain(..).collect(),
            Err(_) => return Err(AppError::Internal("runner state poisoned".to_string())),
        };

        // Anything the commands left running in the background dies with its group.
        #[cfg(unix)]
        for pgid in groups {
            let _ = tokio::process::Command::new("kill")
                .args(["-KILL", "--", &format!("-{pgid}")])
                .stdout(Stdio::null())
                .stderr(Stdio::null())
                .status()
                .await;
        }
        #[cfg(not(unix))]
        drop(groups);

        Ok(())
    }
}
