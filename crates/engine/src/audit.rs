//! Audit identity recorded on every transaction

use crate::config::StoreConfig;

const UNKNOWN: &str = "unknown";

/// Who wrote a batch, and from where
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuditIdentity {
    /// Writer's user name
    pub username: String,
    /// Writer's host name
    pub hostname: String,
}

impl AuditIdentity {
    /// Read `USER`/`USERNAME` and `HOSTNAME`/`COMPUTERNAME`
    pub fn from_env() -> Self {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Environment identity with config overrides applied
    pub fn resolve(config: &StoreConfig) -> Self {
        let env = Self::from_env();
        AuditIdentity {
            username: config.username.clone().unwrap_or(env.username),
            hostname: config.hostname.clone().unwrap_or(env.hostname),
        }
    }

    fn from_lookup<F: Fn(&str) -> Option<String>>(lookup: F) -> Self {
        let first = |names: &[&str]| {
            names
                .iter()
                .filter_map(|n| lookup(*n))
                .find(|v| !v.is_empty())
                .unwrap_or_else(|| UNKNOWN.to_string())
        };
        AuditIdentity {
            username: first(&["USER", "USERNAME"][..]),
            hostname: first(&["HOSTNAME", "COMPUTERNAME"][..]),
        }
    }
}
