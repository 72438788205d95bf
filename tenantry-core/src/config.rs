//! # Configuration
//!
//! A plain string key/value store, mirroring Feathers' `app.set()` /
//! `app.get()`. Every service call sees an immutable snapshot taken when
//! the call starts.
//!
//! ```rust
//! use tenantry_core::ScopedApp;
//! let app = ScopedApp::<(), ()>::new();
//!
//! app.set("paginate.default", "10");
//! assert_eq!(app.get("paginate.default"), Some("10".to_string()));
//! ```
//!
//! Environment overrides use a prefix and `__` as the separator:
//! `TENANTRY__PAGINATE__MAX=50` becomes `paginate.max = "50"`.
//!
//! Keys read by the workspace:
//!
//! | key | default |
//! |---|---|
//! | `http.host` | `127.0.0.1` |
//! | `http.port` | `3030` |
//! | `paginate.default` | `20` |
//! | `paginate.max` | `100` |
//! | `auth.secret` | required |
//! | `auth.issuer` | unset |
//! | `auth.audience` | unset |

use std::collections::HashMap;

use crate::app::ScopedApp;

pub const ENV_PREFIX: &str = "TENANTRY__";

#[derive(Debug, Default)]
pub struct AppConfig {
    values: HashMap<String, String>,
}

impl AppConfig {
    pub fn new() -> Self {
        Self {
            values: HashMap::new(),
        }
    }

    pub fn set<K, V>(&mut self, key: K, value: V)
    where
        K: Into<String>,
        V: Into<String>,
    {
        self.values.insert(key.into(), value.into());
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.values.get(key).map(|s| s.as_str())
    }

    pub fn has(&self, key: &str) -> bool {
        self.values.contains_key(key)
    }

    pub fn snapshot(&self) -> AppConfigSnapshot {
        AppConfigSnapshot::new(self.values.clone())
    }
}

#[derive(Debug, Clone, Default)]
pub struct AppConfigSnapshot {
    map: HashMap<String, String>,
}

impl AppConfigSnapshot {
    pub(crate) fn new(map: HashMap<String, String>) -> Self {
        Self { map }
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.map.get(key).map(|s| s.as_str())
    }

    pub fn get_string(&self, key: &str) -> Option<String> {
        self.map.get(key).cloned()
    }

    pub fn get_usize(&self, key: &str) -> Option<usize> {
        self.get(key).and_then(|v| v.trim().parse::<usize>().ok())
    }

    pub fn get_bool(&self, key: &str) -> Option<bool> {
        self.get(key).and_then(|v| v.trim().parse::<bool>().ok())
    }
}

/// `PREFIX_A__B` → `a.b`, or `None` if `key` lacks the prefix.
pub fn env_key_to_config_key(prefix: &str, key: &str) -> Option<String> {
    let stripped = key.strip_prefix(prefix)?;
    if stripped.is_empty() {
        return None;
    }
    Some(stripped.to_lowercase().replace("__", "."))
}

/// Copy every `prefix`-ed environment variable into the app config.
/// Returns how many keys were set.
pub fn load_env_config<R, P>(app: &ScopedApp<R, P>, prefix: &str) -> usize
where
    R: Send + 'static,
    P: Send + Clone + 'static,
{
    load_config_from(app, prefix, std::env::vars())
}

pub fn load_config_from<R, P, I>(app: &ScopedApp<R, P>, prefix: &str, vars: I) -> usize
where
    R: Send + 'static,
    P: Send + Clone + 'static,
    I: IntoIterator<Item = (String, String)>,
{
    let mut count = 0;
    for (key, value) in vars {
        if let Some(normalized) = env_key_to_config_key(prefix, &key) {
            app.set(normalized, value);
            count += 1;
        }
    }
    count
}
