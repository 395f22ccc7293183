// src/discovery/fetch.rs

use std::collections::BTreeMap;
use std::time::Duration;

use uuid::Uuid;
use zeroize::Zeroizing;

use super::ssh::{RemoteCommand, RemoteError, RemoteExecutor, RemoteOutput};
use crate::ui::{CredentialPrompt, PromptError};
use crate::utils::logging::Logger;

/// The control plane's own admin kubeconfig.
pub const ADMIN_CONF_PATH: &str = "/etc/kubernetes/admin.conf";

pub const DEFAULT_READ_TIMEOUT: Duration = Duration::from_secs(5);
pub const DEFAULT_SUDO_TIMEOUT: Duration = Duration::from_secs(30);

/// ssh reserves this exit status for its own failures.
const SSH_TRANSPORT_FAILURE: i32 = 255;

const ASKPASS_EOF: &str = "__KCU_ASKPASS_EOF__";

#[derive(Debug, thiserror::Error)]
pub enum FetchError {
    #[error("unable to read {path} from {host}: {stderr}")]
    Rejected {
        host: String,
        path: &'static str,
        stderr: String,
    },
    #[error("error connecting to {host}: {source}")]
    Transport {
        host: String,
        #[source]
        source: RemoteError,
    },
    #[error("ssh to {host} failed: {stderr}")]
    Unreachable { host: String, stderr: String },
    #[error("no sudo password for {host}: {source}")]
    Prompt {
        host: String,
        #[source]
        source: PromptError,
    },
}

#[derive(Debug, Clone, Copy)]
pub struct FetchTimeouts {
    pub read: Duration,
    pub sudo: Duration,
}

impl Default for FetchTimeouts {
    fn default() -> Self {
        Self {
            read: DEFAULT_READ_TIMEOUT,
            sudo: DEFAULT_SUDO_TIMEOUT,
        }
    }
}

/// Remote shell snippet that reads `path` through `sudo -A`.
///
/// The askpass helper lives in a fresh `mktemp -d` directory removed by an
/// EXIT trap. Its body is a quoted heredoc whose single line is taken from
/// the session's stdin, so the password is never part of any argv.
pub fn build_privileged_read_command(path: &str, token: &str) -> String {
    [
        "umask 077".to_string(),
        format!(
            "XDIR=$(mktemp -d \"/tmp/kubeconfig-updater.{}.XXXXXX\") || exit 1",
            token
        ),
        "trap 'rm -rf \"$XDIR\"' EXIT".to_string(),
        format!(
            "{{ printf '#!/bin/sh\\ncat <<'\\''{eof}'\\''\\n'; head -n 1; printf '{eof}\\n'; }} > \"$XDIR/askpass.sh\"",
            eof = ASKPASS_EOF
        ),
        "chmod 700 \"$XDIR/askpass.sh\"".to_string(),
        format!("SUDO_ASKPASS=\"$XDIR/askpass.sh\" sudo -A cat {}", path),
    ]
    .join("; ")
}

/// Process-unique tag for the remote helper directory.
pub fn helper_token() -> String {
    let id = Uuid::new_v4().simple().to_string();
    format!("{}-{}", std::process::id(), &id[..8])
}

/// Retrieves admin.conf text from a control-plane host, falling back to
/// `sudo` when a plain read is refused.
pub struct AdminConfFetcher<'a, E: RemoteExecutor> {
    executor: &'a E,
    timeouts: FetchTimeouts,
}

impl<'a, E: RemoteExecutor> AdminConfFetcher<'a, E> {
    pub fn new(executor: &'a E, timeouts: FetchTimeouts) -> Self {
        Self { executor, timeouts }
    }

    pub async fn fetch(
        &self,
        host: &str,
        username: &str,
        env: &BTreeMap<String, String>,
        prompt: &mut dyn CredentialPrompt,
        logger: &mut dyn Logger,
    ) -> Result<String, FetchError> {
        logger.info(&format!(
            "Reading {} from {} as {}...",
            ADMIN_CONF_PATH, host, username
        ));

        let plain = with_env(
            RemoteCommand::new(
                username,
                host,
                format!("cat {}", ADMIN_CONF_PATH),
                self.timeouts.read,
            ),
            env,
        );

        let output = self.run(host, plain).await?;
        if output.success() {
            return Ok(output.stdout);
        }
        logger.debug_log(&format!(
            "Plain read on {} exited with {}: {}",
            host,
            output.status,
            output.stderr.trim()
        ));

        logger.warn(&format!(
            "Sudo privileges required to read {} from {}",
            ADMIN_CONF_PATH, host
        ));
        let secret = prompt
            .ask_secret(&format!("Enter sudo password for {}@{}", username, host))
            .map_err(|source| FetchError::Prompt {
                host: host.to_string(),
                source,
            })?;

        let mut input = Zeroizing::new(Vec::with_capacity(secret.len() + 1));
        input.extend_from_slice(secret.as_bytes());
        input.push(b'\n');
        drop(secret);

        let privileged = with_env(
            RemoteCommand::new(
                username,
                host,
                build_privileged_read_command(ADMIN_CONF_PATH, &helper_token()),
                self.timeouts.sudo,
            ),
            env,
        )
        .stdin(input);

        let output = self.run(host, privileged).await?;
        if !output.success() {
            return Err(FetchError::Rejected {
                host: host.to_string(),
                path: ADMIN_CONF_PATH,
                stderr: output.stderr.trim().to_string(),
            });
        }
        Ok(output.stdout)
    }

    async fn run(&self, host: &str, command: RemoteCommand) -> Result<RemoteOutput, FetchError> {
        let output = self
            .executor
            .run(command)
            .await
            .map_err(|source| FetchError::Transport {
                host: host.to_string(),
                source,
            })?;
        if output.status == SSH_TRANSPORT_FAILURE {
            return Err(FetchError::Unreachable {
                host: host.to_string(),
                stderr: output.stderr.trim().to_string(),
            });
        }
        Ok(output)
    }
}

fn with_env(command: RemoteCommand, env: &BTreeMap<String, String>) -> RemoteCommand {
    env.iter().fold(command, |command, (key, value)| command.env(key, value))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::discovery::ssh::fake::{FakeExecutor, Scripted};
    use crate::ui::prompt::ScriptedPrompt;
    use crate::utils::logging::MemoryLogger;

    fn neutral_env() -> BTreeMap<String, String> {
        BTreeMap::from([("LC_ALL".to_string(), "C".to_string())])
    }

    #[test]
    fn privileged_command_shape() {
        let cmd = build_privileged_read_command(ADMIN_CONF_PATH, "42-abcd1234");

        assert!(cmd.starts_with("umask 077; "));
        assert!(cmd.contains("mktemp -d \"/tmp/kubeconfig-updater.42-abcd1234.XXXXXX\""));
        assert!(cmd.contains("trap 'rm -rf \"$XDIR\"' EXIT"));
        assert!(cmd.contains("head -n 1"));
        assert!(cmd.contains("chmod 700 \"$XDIR/askpass.sh\""));
        assert!(cmd.ends_with("SUDO_ASKPASS=\"$XDIR/askpass.sh\" sudo -A cat /etc/kubernetes/admin.conf"));
        // the trap is installed before the helper is written
        assert!(cmd.find("trap").unwrap() < cmd.find("askpass.sh").unwrap());
    }

    #[test]
    fn helper_tokens_are_unique_per_call() {
        let a = helper_token();
        let b = helper_token();
        assert_ne!(a, b);
        assert!(a.starts_with(&format!("{}-", std::process::id())));
    }

    #[tokio::test]
    async fn plain_read_success_skips_sudo() {
        let executor = FakeExecutor::new();
        executor.ok("host1", "users: []\n");
        let mut prompt = ScriptedPrompt::default();
        let mut logger = MemoryLogger::default();

        let text = AdminConfFetcher::new(&executor, FetchTimeouts::default())
            .fetch("host1", "ops", &neutral_env(), &mut prompt, &mut logger)
            .await
            .unwrap();

        assert_eq!(text, "users: []\n");
        let calls = executor.calls();
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].target, "ops@host1");
        assert_eq!(calls[0].command, "cat /etc/kubernetes/admin.conf");
        assert_eq!(calls[0].timeout, DEFAULT_READ_TIMEOUT);
        assert_eq!(calls[0].env.get("LC_ALL").map(String::as_str), Some("C"));
        assert_eq!(prompt.secret_prompts, 0);
    }

    #[tokio::test]
    async fn falls_back_to_sudo_without_leaking_secret() {
        let executor = FakeExecutor::new();
        executor
            .exit("host1", 1, "cat: /etc/kubernetes/admin.conf: Permission denied")
            .ok("host1", "kind: Config\n");
        let mut prompt = ScriptedPrompt::default().with_secret("s3cr3t!");
        let mut logger = MemoryLogger::default();

        let text = AdminConfFetcher::new(&executor, FetchTimeouts::default())
            .fetch("host1", "ops", &neutral_env(), &mut prompt, &mut logger)
            .await
            .unwrap();

        assert_eq!(text, "kind: Config\n");
        assert_eq!(prompt.secret_prompts, 1);

        let calls = executor.calls();
        assert_eq!(calls.len(), 2);
        let sudo = &calls[1];
        assert_eq!(sudo.timeout, DEFAULT_SUDO_TIMEOUT);
        assert!(sudo.command.contains("sudo -A cat /etc/kubernetes/admin.conf"));
        assert!(!sudo.command.contains("s3cr3t!"));
        assert_eq!(sudo.stdin.as_deref(), Some(&b"s3cr3t!\n"[..]));
        assert_eq!(sudo.env.get("LC_ALL").map(String::as_str), Some("C"));
        assert!(!logger.any_contains("s3cr3t!"));
    }

    #[tokio::test]
    async fn sudo_rejection_surfaces_stderr() {
        let executor = FakeExecutor::new();
        executor
            .exit("host1", 1, "Permission denied")
            .exit("host1", 1, "sudo: 1 incorrect password attempt\n");
        let mut prompt = ScriptedPrompt::default().with_secret("wrong");
        let mut logger = MemoryLogger::default();

        let err = AdminConfFetcher::new(&executor, FetchTimeouts::default())
            .fetch("host1", "ops", &neutral_env(), &mut prompt, &mut logger)
            .await
            .unwrap_err();

        match err {
            FetchError::Rejected { host, stderr, .. } => {
                assert_eq!(host, "host1");
                assert_eq!(stderr, "sudo: 1 incorrect password attempt");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[tokio::test]
    async fn transport_failures_do_not_prompt() {
        let executor = FakeExecutor::new();
        executor.push("down", Scripted::Fail(RemoteError::Timeout(DEFAULT_READ_TIMEOUT)));
        executor.exit("refused", 255, "ssh: connect to host refused port 22: Connection refused");
        let mut prompt = ScriptedPrompt::default();
        let mut logger = MemoryLogger::default();
        let fetcher = AdminConfFetcher::new(&executor, FetchTimeouts::default());

        let err = fetcher
            .fetch("down", "ops", &neutral_env(), &mut prompt, &mut logger)
            .await
            .unwrap_err();
        assert!(matches!(err, FetchError::Transport { .. }));

        let err = fetcher
            .fetch("refused", "ops", &neutral_env(), &mut prompt, &mut logger)
            .await
            .unwrap_err();
        assert!(matches!(err, FetchError::Unreachable { .. }));
        assert_eq!(prompt.secret_prompts, 0);
    }

    #[tokio::test]
    async fn prompt_failure_is_reported() {
        let executor = FakeExecutor::new();
        executor.exit("host1", 1, "Permission denied");
        let mut prompt = ScriptedPrompt::default();
        let mut logger = MemoryLogger::default();

        let err = AdminConfFetcher::new(&executor, FetchTimeouts::default())
            .fetch("host1", "ops", &neutral_env(), &mut prompt, &mut logger)
            .await
            .unwrap_err();
        assert!(matches!(err, FetchError::Prompt { .. }));
        assert_eq!(executor.calls().len(), 1);
    }
}
