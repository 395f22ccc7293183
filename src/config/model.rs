// config/model.rs
use std::collections::HashMap;

use serde::{de::DeserializeOwned, Serialize};
use serde_yaml::{Mapping, Value};

use super::types::{
    ClusterConfig, NamedCluster, NamedContext, NamedEntry, NamedUser, RemoteCredentials,
};
use super::StoreError;
use crate::utils::logging::Logger;

const CLUSTERS_KEY: &str = "clusters";
const USERS_KEY: &str = "users";
const CONTEXTS_KEY: &str = "contexts";

#[derive(Debug, Clone)]
enum Slot<T> {
    /// A decoded entry and the value it was read from. Untouched entries
    /// are written back as read; touched ones are merged into `raw`.
    Typed { entry: T, raw: Value, touched: bool },
    /// An entry that could not be decoded; written back exactly as read.
    Opaque(Value),
}

impl<T: Serialize> Slot<T> {
    fn to_value(&self) -> Result<Value, serde_yaml::Error> {
        match self {
            Slot::Typed {
                entry,
                raw,
                touched: true,
            } => {
                let mut value = raw.clone();
                merge_into(&mut value, serde_yaml::to_value(entry)?);
                Ok(value)
            }
            Slot::Typed { raw, .. } | Slot::Opaque(raw) => Ok(raw.clone()),
        }
    }
}

/// Writes `updated` over `raw` key by key. Existing keys keep their
/// position, new keys go last, and keys only `raw` has are left alone.
fn merge_into(raw: &mut Value, updated: Value) {
    match (raw, updated) {
        (Value::Mapping(raw), Value::Mapping(updated)) => {
            for (key, value) in updated {
                match raw.get_mut(&key) {
                    Some(existing) => merge_into(existing, value),
                    None => {
                        raw.insert(key, value);
                    }
                }
            }
        }
        (raw, updated) => *raw = updated,
    }
}

/// One of the named lists (`clusters`, `users`, `contexts`) with a
/// name index over the first occurrence of every name.
#[derive(Debug, Clone)]
pub struct Section<T> {
    slots: Vec<Slot<T>>,
    index: HashMap<String, usize>,
}

impl<T> Section<T>
where
    T: NamedEntry + Serialize + DeserializeOwned,
{
    fn decode(key: &str, value: Option<&Value>, logger: &mut dyn Logger) -> Self {
        let mut section = Section {
            slots: Vec::new(),
            index: HashMap::new(),
        };

        let items = match value {
            Some(Value::Sequence(items)) => items,
            Some(Value::Null) | None => return section,
            Some(_) => {
                logger.warn(&format!("'{}' is not a list, leaving it untouched", key));
                return section;
            }
        };

        for (pos, item) in items.iter().enumerate() {
            match serde_yaml::from_value::<T>(item.clone()) {
                Ok(entry) => {
                    let name = entry.name().to_string();
                    if section.index.contains_key(&name) {
                        logger.warn(&format!(
                            "Duplicate {} entry '{}', only the first one is used",
                            key, name
                        ));
                    } else {
                        section.index.insert(name, section.slots.len());
                    }
                    section.slots.push(Slot::Typed {
                        entry,
                        raw: item.clone(),
                        touched: false,
                    });
                }
                Err(e) => {
                    logger.warn(&format!(
                        "Entry #{} in {} could not be read ({}), keeping it as-is",
                        pos + 1,
                        key,
                        e
                    ));
                    section.slots.push(Slot::Opaque(item.clone()));
                }
            }
        }

        section
    }

    pub fn get(&self, name: &str) -> Option<&T> {
        self.index.get(name).and_then(|&i| match &self.slots[i] {
            Slot::Typed { entry, .. } => Some(entry),
            Slot::Opaque(_) => None,
        })
    }

    /// Marks the entry as touched, so it is merged back on write.
    pub fn get_mut(&mut self, name: &str) -> Option<&mut T> {
        let i = *self.index.get(name)?;
        match &mut self.slots[i] {
            Slot::Typed { entry, touched, .. } => {
                *touched = true;
                Some(entry)
            }
            Slot::Opaque(_) => None,
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = &T> {
        self.slots.iter().filter_map(|slot| match slot {
            Slot::Typed { entry, .. } => Some(entry),
            Slot::Opaque(_) => None,
        })
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    fn to_value(&self) -> Result<Value, serde_yaml::Error> {
        let items = self
            .slots
            .iter()
            .map(Slot::to_value)
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Value::Sequence(items))
    }
}

/// Which credential fields an update replaced.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CredentialUpdate {
    pub certificate: bool,
    pub key: bool,
}

impl CredentialUpdate {
    pub fn is_changed(&self) -> bool {
        self.certificate || self.key
    }
}

/// The local kubeconfig: the ordered document as loaded plus typed,
/// indexed views of its clusters, users and contexts.
#[derive(Debug, Clone)]
pub struct KubeConfig {
    document: Mapping,
    clusters: Section<NamedCluster>,
    users: Section<NamedUser>,
    contexts: Section<NamedContext>,
    changed_contexts: Vec<String>,
}

impl KubeConfig {
    pub fn from_document(document: Value, logger: &mut dyn Logger) -> Result<Self, StoreError> {
        let document = match document {
            Value::Mapping(map) => map,
            Value::Null => Mapping::new(),
            other => {
                return Err(StoreError::InvalidDocument(format!(
                    "expected a mapping at the top level, found {}",
                    value_kind(&other)
                )))
            }
        };

        let clusters = Section::decode(CLUSTERS_KEY, document.get(CLUSTERS_KEY), logger);
        let users = Section::decode(USERS_KEY, document.get(USERS_KEY), logger);
        let contexts = Section::decode(CONTEXTS_KEY, document.get(CONTEXTS_KEY), logger);

        Ok(Self {
            document,
            clusters,
            users,
            contexts,
            changed_contexts: Vec::new(),
        })
    }

    pub fn contexts(&self) -> &Section<NamedContext> {
        &self.contexts
    }

    pub fn cluster(&self, name: &str) -> Option<&ClusterConfig> {
        self.clusters.get(name).map(|c| &c.cluster)
    }

    pub fn cluster_mut(&mut self, name: &str) -> Option<&mut ClusterConfig> {
        self.clusters.get_mut(name).map(|c| &mut c.cluster)
    }

    #[cfg(test)]
    pub fn user(&self, name: &str) -> Option<&super::types::UserConfig> {
        self.users.get(name).map(|u| &u.user)
    }

    /// Overwrites whichever of the user's cert/key differ from `remote`.
    /// Returns `None` when no such user exists. A change marks `context`
    /// as dirty.
    pub fn update_user_credentials(
        &mut self,
        context: &str,
        user_name: &str,
        remote: &RemoteCredentials,
    ) -> Option<CredentialUpdate> {
        let user = &mut self.users.get_mut(user_name)?.user;
        let mut update = CredentialUpdate::default();

        if user.client_certificate_data.as_deref() != Some(remote.client_certificate_data.as_str())
        {
            user.client_certificate_data = Some(remote.client_certificate_data.clone());
            update.certificate = true;
        }
        if user.client_key_data.as_deref() != Some(remote.client_key_data.as_str()) {
            user.client_key_data = Some(remote.client_key_data.clone());
            update.key = true;
        }

        if update.is_changed() && !self.changed_contexts.iter().any(|c| c == context) {
            self.changed_contexts.push(context.to_string());
        }
        Some(update)
    }

    pub fn is_dirty(&self) -> bool {
        !self.changed_contexts.is_empty()
    }

    pub fn changed_contexts(&self) -> &[String] {
        &self.changed_contexts
    }

    /// Rebuilds the document for writing. `clusters` and `users` are
    /// re-derived in their original order and put back in their original
    /// positions; only the keys an update changed differ from the loaded
    /// entries, and every other top-level key is as loaded.
    pub fn to_document(&self) -> Result<Value, serde_yaml::Error> {
        let mut document = self.document.clone();
        if document.contains_key(CLUSTERS_KEY) && self.clusters.len() > 0 {
            document.insert(CLUSTERS_KEY.into(), self.clusters.to_value()?);
        }
        if document.contains_key(USERS_KEY) && self.users.len() > 0 {
            document.insert(USERS_KEY.into(), self.users.to_value()?);
        }
        Ok(Value::Mapping(document))
    }
}

fn value_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Sequence(_) => "a list",
        Value::Mapping(_) => "a mapping",
        Value::Tagged(_) => "a tagged value",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::utils::logging::{LogLevel, MemoryLogger};

    const SAMPLE: &str = r#"
apiVersion: v1
clusters:
- name: k1
  cluster:
    server: https://host1:6443
    certificate-authority-data: CA1
- name: k2
  cluster:
    server: https://host2:6443
contexts:
- name: c1
  context:
    cluster: k1
    user: u1
current-context: c1
kind: Config
preferences: {}
users:
- name: u2
  user:
    client-certificate-data: X
    client-key-data: Y
- name: u1
  user:
    client-certificate-data: AAA
    client-key-data: BBB
"#;

    fn load(text: &str) -> (KubeConfig, MemoryLogger) {
        let mut logger = MemoryLogger::default();
        let doc: Value = serde_yaml::from_str(text).unwrap();
        let config = KubeConfig::from_document(doc, &mut logger).unwrap();
        (config, logger)
    }

    fn creds(cert: &str, key: &str) -> RemoteCredentials {
        RemoteCredentials {
            client_certificate_data: cert.to_string(),
            client_key_data: key.to_string(),
        }
    }

    #[test]
    fn lookups_by_name() {
        let (config, _) = load(SAMPLE);
        assert_eq!(
            config.cluster("k2").and_then(|c| c.server_url()),
            Some("https://host2:6443")
        );
        assert!(config.cluster("missing").is_none());
        assert_eq!(
            config.user("u1").and_then(|u| u.client_key_data.as_deref()),
            Some("BBB")
        );
        assert!(config.user("nobody").is_none());
    }

    #[test]
    fn update_changes_only_differing_fields_and_marks_context() {
        let (mut config, _) = load(SAMPLE);
        assert!(!config.is_dirty());

        let update = config
            .update_user_credentials("c1", "u1", &creds("CCC", "BBB"))
            .unwrap();
        assert!(update.certificate);
        assert!(!update.key);
        assert!(config.is_dirty());
        assert_eq!(config.changed_contexts(), ["c1".to_string()]);

        let user = config.user("u1").unwrap();
        assert_eq!(user.client_certificate_data.as_deref(), Some("CCC"));
        assert_eq!(user.client_key_data.as_deref(), Some("BBB"));
    }

    #[test]
    fn identical_credentials_leave_model_clean() {
        let (mut config, _) = load(SAMPLE);
        let update = config
            .update_user_credentials("c1", "u1", &creds("AAA", "BBB"))
            .unwrap();
        assert!(!update.is_changed());
        assert!(!config.is_dirty());
        assert!(config
            .update_user_credentials("c1", "ghost", &creds("AAA", "BBB"))
            .is_none());
    }

    #[test]
    fn document_keeps_key_and_user_order() {
        let (mut config, _) = load(SAMPLE);
        config.update_user_credentials("c1", "u1", &creds("CCC", "DDD"));

        let out = serde_yaml::to_string(&config.to_document().unwrap()).unwrap();
        let keys: Vec<&str> = out
            .lines()
            .filter(|l| !l.starts_with([' ', '-']))
            .map(|l| l.split(':').next().unwrap())
            .collect();
        assert_eq!(
            keys,
            ["apiVersion", "clusters", "contexts", "current-context", "kind", "preferences", "users"]
        );
        assert!(out.find("name: u2").unwrap() < out.find("name: u1").unwrap());
        assert!(out.contains("client-certificate-data: CCC"));
        assert!(out.contains("certificate-authority-data: CA1"));
    }

    #[test]
    fn duplicates_and_undecodable_entries_survive() {
        let text = r#"
users:
- name: u1
  user:
    client-certificate-data: FIRST
    client-key-data: K
- name: u1
  user:
    client-certificate-data: SECOND
    client-key-data: K
- just-a-string
"#;
        let (config, logger) = load(text);
        assert!(logger.contains(LogLevel::Warn, "Duplicate users entry 'u1'"));
        assert!(logger.contains(LogLevel::Warn, "Entry #3 in users"));
        assert_eq!(
            config
                .user("u1")
                .and_then(|u| u.client_certificate_data.as_deref()),
            Some("FIRST")
        );

        let doc = config.to_document().unwrap();
        let users = doc.get("users").and_then(Value::as_sequence).unwrap();
        assert_eq!(users.len(), 3);
        assert_eq!(users[2], Value::String("just-a-string".into()));
    }

    #[test]
    fn rewritten_entries_keep_their_key_order() {
        let text = r#"
users:
- user:
    client-key-data: K1
    exec-hint: none
    client-certificate-data: C1
  name: u1
- user:
    client-key-data: K2
    client-certificate-data: C2
  name: u2
"#;
        let (mut config, _) = load(text);
        config.update_user_credentials("c1", "u1", &creds("NEW", "K1"));

        let doc = config.to_document().unwrap();
        let users = doc.get("users").and_then(Value::as_sequence).unwrap();
        let keys = |v: &Value| -> Vec<String> {
            v.as_mapping()
                .unwrap()
                .keys()
                .map(|k| k.as_str().unwrap().to_string())
                .collect()
        };

        assert_eq!(keys(&users[0]), ["user", "name"]);
        assert_eq!(
            keys(&users[0]["user"]),
            ["client-key-data", "exec-hint", "client-certificate-data"]
        );
        assert_eq!(users[0]["user"]["client-certificate-data"], Value::from("NEW"));
        let original: Value = serde_yaml::from_str(text).unwrap();
        assert_eq!(users[1], original["users"][1]);
    }

    #[test]
    fn non_mapping_document_is_rejected() {
        let mut logger = MemoryLogger::default();
        let err = KubeConfig::from_document(Value::String("oops".into()), &mut logger)
            .unwrap_err();
        assert!(err.to_string().contains("a string"));
    }
}
