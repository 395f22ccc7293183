// config/types.rs
use serde::{Deserialize, Serialize};
use serde_yaml::{Mapping, Value};

/// Spelling some older files use for the cached login. Kept in `extra`
/// and written back under the same key.
const LEGACY_LOGIN_KEY: &str = "serverUser";

/// The `cluster` body of a `clusters[]` entry.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct ClusterConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub server: Option<String>,
    /// SSH login cached from an earlier prompt.
    #[serde(default, rename = "serveruser", skip_serializing_if = "Option::is_none")]
    pub server_user: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub certificate_authority_data: Option<String>,
    #[serde(flatten)]
    pub extra: Mapping,
}

impl ClusterConfig {
    /// The server URL, treating an empty string the same as a missing one.
    pub fn server_url(&self) -> Option<&str> {
        self.server.as_deref().filter(|s| !s.trim().is_empty())
    }

    /// The cached SSH login, from `serveruser` or else `serverUser`.
    pub fn login(&self) -> Option<&str> {
        self.server_user
            .as_deref()
            .filter(|u| !u.is_empty())
            .or_else(|| {
                self.extra
                    .get(LEGACY_LOGIN_KEY)
                    .and_then(Value::as_str)
                    .filter(|u| !u.is_empty())
            })
    }

    /// Caches `login` under `serverUser` if that is the only spelling the
    /// entry already has, otherwise under `serveruser`.
    pub fn set_login(&mut self, login: &str) {
        if self.server_user.is_none() && self.extra.contains_key(LEGACY_LOGIN_KEY) {
            self.extra.insert(LEGACY_LOGIN_KEY.into(), login.into());
        } else {
            self.server_user = Some(login.to_string());
        }
    }
}

/// The `user` body of a `users[]` entry.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct UserConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub client_certificate_data: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub client_key_data: Option<String>,
    #[serde(flatten)]
    pub extra: Mapping,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ContextEntry {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cluster: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub namespace: Option<String>,
    #[serde(flatten)]
    pub extra: Mapping,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NamedCluster {
    pub name: String,
    #[serde(default)]
    pub cluster: ClusterConfig,
    #[serde(flatten)]
    pub extra: Mapping,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NamedUser {
    pub name: String,
    #[serde(default)]
    pub user: UserConfig,
    #[serde(flatten)]
    pub extra: Mapping,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NamedContext {
    pub name: String,
    #[serde(default)]
    pub context: ContextEntry,
    #[serde(flatten)]
    pub extra: Mapping,
}

pub trait NamedEntry {
    fn name(&self) -> &str;
}

impl NamedEntry for NamedCluster {
    fn name(&self) -> &str {
        &self.name
    }
}

impl NamedEntry for NamedUser {
    fn name(&self) -> &str {
        &self.name
    }
}

impl NamedEntry for NamedContext {
    fn name(&self) -> &str {
        &self.name
    }
}

/// Client identity material taken from `users[0].user` of a remote admin.conf.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteCredentials {
    pub client_certificate_data: String,
    pub client_key_data: String,
}

/// Why a remote admin.conf did not yield usable credentials.
#[derive(Debug, thiserror::Error)]
pub enum RemoteDocError {
    #[error("unable to parse document: {0}")]
    Parse(#[from] serde_yaml::Error),
    #[error("no user data")]
    NoUsers,
    #[error("no client certificate data")]
    MissingCredentials,
}

#[derive(Debug, Deserialize)]
struct RemoteDocument {
    #[serde(default)]
    users: Option<Vec<RemoteUserEntry>>,
}

#[derive(Debug, Deserialize)]
struct RemoteUserEntry {
    #[serde(default)]
    user: Option<UserConfig>,
}

impl RemoteCredentials {
    /// Parses a remote admin.conf and pulls the first user's cert and key.
    /// Later user entries are never consulted.
    pub fn from_admin_conf(text: &str) -> Result<Self, RemoteDocError> {
        let doc: Option<RemoteDocument> = serde_yaml::from_str(text)?;
        let first = doc
            .and_then(|d| d.users)
            .and_then(|users| users.into_iter().next())
            .ok_or(RemoteDocError::NoUsers)?;

        let user = first.user.unwrap_or_default();
        match (
            user.client_certificate_data.filter(|s| !s.is_empty()),
            user.client_key_data.filter(|s| !s.is_empty()),
        ) {
            (Some(cert), Some(key)) => Ok(Self {
                client_certificate_data: cert,
                client_key_data: key,
            }),
            _ => Err(RemoteDocError::MissingCredentials),
        }
    }
}
