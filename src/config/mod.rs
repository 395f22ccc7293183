mod model;
pub mod store;
mod types;

pub use model::{CredentialUpdate, KubeConfig};
pub use store::StoreError;
pub use types::{NamedContext, RemoteCredentials, RemoteDocError};
