// src/discovery/ssh.rs

use std::collections::BTreeMap;
use std::io;
use std::path::PathBuf;
use std::process::Stdio;
use std::time::Duration;

use async_trait::async_trait;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;
use zeroize::Zeroizing;

/// A single command to run on a remote host.
pub struct RemoteCommand {
    /// `user@host`
    pub target: String,
    pub command: String,
    /// Set on the local ssh process.
    pub env: BTreeMap<String, String>,
    pub timeout: Duration,
    /// Written to the remote command's stdin, then closed.
    pub stdin: Option<Zeroizing<Vec<u8>>>,
}

impl RemoteCommand {
    pub fn new(user: &str, host: &str, command: impl Into<String>, timeout: Duration) -> Self {
        Self {
            target: format!("{}@{}", user, host),
            command: command.into(),
            env: BTreeMap::new(),
            timeout,
            stdin: None,
        }
    }

    pub fn env(mut self, key: &str, value: &str) -> Self {
        self.env.insert(key.to_string(), value.to_string());
        self
    }

    pub fn stdin(mut self, input: Zeroizing<Vec<u8>>) -> Self {
        self.stdin = Some(input);
        self
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteOutput {
    pub status: i32,
    pub stdout: String,
    pub stderr: String,
}

impl RemoteOutput {
    pub fn success(&self) -> bool {
        self.status == 0
    }
}

#[derive(Debug, thiserror::Error)]
pub enum RemoteError {
    #[error("failed to start ssh: {0}")]
    Spawn(#[source] io::Error),
    #[error("command timed out after {0:?}")]
    Timeout(Duration),
    #[error("ssh I/O error: {0}")]
    Io(#[source] io::Error),
    #[error("ssh terminated by signal")]
    Killed,
}

#[async_trait]
pub trait RemoteExecutor: Send + Sync {
    async fn run(&self, command: RemoteCommand) -> Result<RemoteOutput, RemoteError>;
}

/// Runs commands through the local `ssh` binary.
#[derive(Debug, Clone, Default)]
pub struct SshExecutor {
    identity: Option<PathBuf>,
    options: Vec<String>,
}

impl SshExecutor {
    pub fn new(identity: Option<PathBuf>, options: Vec<String>) -> Self {
        Self { identity, options }
    }

    fn build_args(&self, command: &RemoteCommand) -> Vec<String> {
        let connect_timeout = command.timeout.as_secs().max(1);
        let mut args = vec![
            "-o".to_string(),
            format!("ConnectTimeout={}", connect_timeout),
        ];
        if let Some(identity) = &self.identity {
            args.push("-i".to_string());
            args.push(identity.display().to_string());
        }
        for option in &self.options {
            args.push("-o".to_string());
            args.push(option.clone());
        }
        args.push("--".to_string());
        args.push(command.target.clone());
        args.push(command.command.clone());
        args
    }
}

#[async_trait]
impl RemoteExecutor for SshExecutor {
    async fn run(&self, command: RemoteCommand) -> Result<RemoteOutput, RemoteError> {
        let mut child = Command::new("ssh")
            .args(self.build_args(&command))
            .envs(&command.env)
            .stdin(if command.stdin.is_some() {
                Stdio::piped()
            } else {
                Stdio::null()
            })
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(RemoteError::Spawn)?;

        let timeout = command.timeout;
        let exchange = async move {
            if let (Some(input), Some(mut pipe)) = (command.stdin, child.stdin.take()) {
                pipe.write_all(&input).await.map_err(RemoteError::Io)?;
                pipe.shutdown().await.map_err(RemoteError::Io)?;
            }
            child.wait_with_output().await.map_err(RemoteError::Io)
        };

        let output = tokio::time::timeout(timeout, exchange)
            .await
            .map_err(|_| RemoteError::Timeout(timeout))??;

        Ok(RemoteOutput {
            status: output.status.code().ok_or(RemoteError::Killed)?,
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
        })
    }
}
