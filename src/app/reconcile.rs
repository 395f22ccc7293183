// src/app/reconcile.rs
use std::collections::BTreeMap;
use std::fmt;

use crate::cert::summarize_certificate_data;
use crate::config::{CredentialUpdate, KubeConfig, NamedContext, RemoteCredentials, RemoteDocError};
use crate::discovery::{parse_hostname, AdminConfFetcher, FetchError, FetchTimeouts, RemoteExecutor};
use crate::ui::{CredentialPrompt, PromptError};
use crate::utils::logging::{LogLevel, Logger};

/// Why a context was left alone this run.
#[derive(Debug)]
pub enum SkipReason {
    MissingReference,
    UnknownCluster(String),
    MissingServer(String),
    UnparseableServer(String),
    NoUsername { host: String, source: PromptError },
    UnsafeLogin { host: String, login: String },
    Fetch(FetchError),
    RemoteDocument { host: String, source: RemoteDocError },
    UnknownUser(String),
}

impl SkipReason {
    fn level(&self) -> LogLevel {
        match self {
            SkipReason::Fetch(_)
            | SkipReason::NoUsername { .. }
            | SkipReason::RemoteDocument {
                source: RemoteDocError::Parse(_),
                ..
            } => LogLevel::Error,
            _ => LogLevel::Warn,
        }
    }
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SkipReason::MissingReference => write!(f, "missing cluster/user data"),
            SkipReason::UnknownCluster(name) => {
                write!(f, "cannot find cluster {} configuration", name)
            }
            SkipReason::MissingServer(name) => write!(f, "cluster {} missing server field", name),
            SkipReason::UnparseableServer(url) => {
                write!(f, "cannot parse hostname from server URL {}", url)
            }
            SkipReason::NoUsername { host, source } => {
                write!(f, "no SSH username for {}: {}", host, source)
            }
            SkipReason::UnsafeLogin { host, login } => {
                write!(f, "refusing SSH login '{}' for {}: starts with '-'", login, host)
            }
            SkipReason::Fetch(err) => write!(f, "{}", err),
            SkipReason::RemoteDocument { host, source } => {
                write!(f, "admin.conf from {}: {}", host, source)
            }
            SkipReason::UnknownUser(name) => {
                write!(f, "cannot find user {} in local kubeconfig", name)
            }
        }
    }
}

#[derive(Debug, Default)]
pub struct ReconcileReport {
    /// Contexts whose user credentials were rewritten, in file order.
    pub changed: Vec<String>,
    pub up_to_date: Vec<String>,
    pub skipped: Vec<(String, SkipReason)>,
}

/// Walks every context in file order and pulls fresh client credentials
/// from its control plane. A failure on one context never stops the rest.
pub struct Reconciler<'a, E: RemoteExecutor> {
    fetcher: AdminConfFetcher<'a, E>,
    prompt: &'a mut dyn CredentialPrompt,
    logger: &'a mut dyn Logger,
}

impl<'a, E: RemoteExecutor> Reconciler<'a, E> {
    pub fn new(
        executor: &'a E,
        timeouts: FetchTimeouts,
        prompt: &'a mut dyn CredentialPrompt,
        logger: &'a mut dyn Logger,
    ) -> Self {
        Self {
            fetcher: AdminConfFetcher::new(executor, timeouts),
            prompt,
            logger,
        }
    }

    pub async fn reconcile(&mut self, config: &mut KubeConfig) -> ReconcileReport {
        let contexts: Vec<NamedContext> = config.contexts().iter().cloned().collect();
        let total = contexts.len();
        let mut report = ReconcileReport::default();

        self.logger
            .info(&format!("Total contexts to process: {}", total));

        for (idx, ctx) in contexts.iter().enumerate() {
            self.logger.info(&format!(
                "Processing context {}/{}: {}",
                idx + 1,
                total,
                ctx.name
            ));

            match self.reconcile_context(config, ctx).await {
                Ok(update) if update.is_changed() => report.changed.push(ctx.name.clone()),
                Ok(_) => {
                    self.logger
                        .debug_log(&format!("Context {} is up to date", ctx.name));
                    report.up_to_date.push(ctx.name.clone());
                }
                Err(reason) => {
                    self.logger.log(
                        reason.level(),
                        &format!("Skipping context {}: {}", ctx.name, reason),
                    );
                    report.skipped.push((ctx.name.clone(), reason));
                }
            }
        }

        report
    }

    async fn reconcile_context(
        &mut self,
        config: &mut KubeConfig,
        ctx: &NamedContext,
    ) -> Result<CredentialUpdate, SkipReason> {
        let (cluster_name, user_name) = match (
            ctx.context.cluster.as_deref().filter(|s| !s.is_empty()),
            ctx.context.user.as_deref().filter(|s| !s.is_empty()),
        ) {
            (Some(cluster), Some(user)) => (cluster, user),
            _ => return Err(SkipReason::MissingReference),
        };

        let cluster = config
            .cluster(cluster_name)
            .ok_or_else(|| SkipReason::UnknownCluster(cluster_name.to_string()))?;
        let server = cluster
            .server_url()
            .ok_or_else(|| SkipReason::MissingServer(cluster_name.to_string()))?;
        let host = parse_hostname(server)
            .ok_or_else(|| SkipReason::UnparseableServer(server.to_string()))?;

        let username = self.server_username(config, cluster_name, &host)?;

        let env = BTreeMap::from([("LC_ALL".to_string(), "C".to_string())]);
        let text = self
            .fetcher
            .fetch(&host, &username, &env, &mut *self.prompt, &mut *self.logger)
            .await
            .map_err(SkipReason::Fetch)?;

        let remote = RemoteCredentials::from_admin_conf(&text).map_err(|source| {
            SkipReason::RemoteDocument {
                host: host.clone(),
                source,
            }
        })?;

        let update = config
            .update_user_credentials(&ctx.name, user_name, &remote)
            .ok_or_else(|| SkipReason::UnknownUser(user_name.to_string()))?;

        if update.certificate {
            let detail = match summarize_certificate_data(&remote.client_certificate_data) {
                Ok(summary) => format!(" ({})", summary),
                Err(e) => {
                    self.logger
                        .debug_log(&format!("Could not inspect certificate from {}: {}", host, e));
                    String::new()
                }
            };
            self.logger.info(&format!(
                "Updating {}'s client-certificate-data{}",
                user_name, detail
            ));
        }
        if update.key {
            self.logger
                .info(&format!("Updating {}'s client-key-data", user_name));
        }

        Ok(update)
    }

    /// The cluster's cached login, or a freshly prompted one that is cached
    /// on the cluster right away so later contexts reuse it.
    fn server_username(
        &mut self,
        config: &mut KubeConfig,
        cluster_name: &str,
        host: &str,
    ) -> Result<String, SkipReason> {
        if let Some(user) = config.cluster(cluster_name).and_then(|c| c.login()) {
            return checked_login(host, user.to_string());
        }

        let username = self
            .prompt
            .ask_text(&format!("Enter SSH username for {}", host))
            .map_err(|source| SkipReason::NoUsername {
                host: host.to_string(),
                source,
            })?;
        let username = checked_login(host, username)?;

        if let Some(cluster) = config.cluster_mut(cluster_name) {
            cluster.set_login(&username);
        }
        Ok(username)
    }
}

/// ssh would parse a leading `-` in `user@host` as an option.
fn checked_login(host: &str, login: String) -> Result<String, SkipReason> {
    if login.starts_with('-') {
        return Err(SkipReason::UnsafeLogin {
            host: host.to_string(),
            login,
        });
    }
    Ok(login)
}
