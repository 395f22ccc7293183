mod fetch;
mod hostname;
mod ssh;

pub use fetch::{AdminConfFetcher, FetchError, FetchTimeouts};
pub use hostname::parse_hostname;
pub use ssh::{RemoteExecutor, SshExecutor};

#[cfg(test)]
pub use ssh::fake;
