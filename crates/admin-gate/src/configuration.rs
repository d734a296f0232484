use std::time::Duration;

use admin_auth::{AuthConfig, DEFAULT_MAX_TRACKED, Limit, MAX_WINDOW_MS};
use serde::Deserialize;

pub const DEFAULT_SECRET_ENV: &str = "ADMIN_PASSWORD";

/// Gate settings, read from the same YAML file handed to pingora.
#[derive(Debug, Clone, Deserialize)]
pub struct GateConfig {
    #[serde(default = "default_listen")]
    pub listen: String,
    /// Data service backends (`ip:port`).
    pub upstreams: Vec<String>,
    /// SQLite file holding the `admin_password` table.
    pub password_db: String,
    /// Environment variable that holds the shared token secret.
    #[serde(default = "default_secret_env")]
    pub token_secret_env: String,
    /// Inline secret; takes precedence over the environment variable.
    #[serde(default)]
    pub token_secret: Option<String>,
    /// Embed only the first N characters of the secret in tokens.
    #[serde(default)]
    pub secret_prefix_chars: Option<usize>,
    #[serde(default = "default_token_max_age_secs")]
    pub token_max_age_secs: u64,
    /// Derive client keys from X-Forwarded-For / X-Real-IP.
    #[serde(default)]
    pub trust_proxy_headers: bool,
    #[serde(default = "default_max_tracked")]
    pub max_tracked_clients: usize,
    #[serde(default = "default_sweep_interval_secs")]
    pub sweep_interval_secs: u64,
    #[serde(default = "default_health_check_secs")]
    pub health_check_secs: u64,
    #[serde(default = "default_login_limit")]
    pub login_limit: LimitConfig,
    #[serde(default = "default_routes")]
    pub routes: Vec<RouteConfig>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub struct LimitConfig {
    pub max_attempts: u32,
    pub window_secs: u64,
}

impl From<LimitConfig> for Limit {
    fn from(conf: LimitConfig) -> Self {
        let window_ms = i64::try_from(conf.window_secs.saturating_mul(1000)).unwrap_or(i64::MAX);
        Limit::new(conf.max_attempts, window_ms)
    }
}

/// A privileged path prefix and the limit applied to it.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct RouteConfig {
    pub prefix: String,
    pub limit: LimitConfig,
}

fn default_listen() -> String {
    "0.0.0.0:8080".to_string()
}

fn default_secret_env() -> String {
    DEFAULT_SECRET_ENV.to_string()
}

fn default_token_max_age_secs() -> u64 {
    24 * 60 * 60
}

fn default_max_tracked() -> usize {
    DEFAULT_MAX_TRACKED
}

fn default_sweep_interval_secs() -> u64 {
    60
}

fn default_health_check_secs() -> u64 {
    5
}

fn default_login_limit() -> LimitConfig {
    LimitConfig {
        max_attempts: 10,
        window_secs: 5 * 60,
    }
}

fn default_routes() -> Vec<RouteConfig> {
    let per_minute = |max_attempts| LimitConfig {
        max_attempts,
        window_secs: 60,
    };
    vec![
        RouteConfig {
            prefix: "/admin/data".to_string(),
            limit: per_minute(60),
        },
        RouteConfig {
            prefix: "/admin/write".to_string(),
            limit: per_minute(30),
        },
        RouteConfig {
            prefix: "/admin/newsletter".to_string(),
            limit: per_minute(30),
        },
    ]
}

impl GateConfig {
    pub fn from_yaml(yaml: &str) -> Result<Self, String> {
        let conf: GateConfig =
            serde_yaml::from_str(yaml).map_err(|e| format!("failed to parse gate config: {e}"))?;
        conf.validate()?;
        Ok(conf)
    }

    pub fn validate(&self) -> Result<(), String> {
        if self.upstreams.is_empty() {
            return Err("at least one upstream is required".to_string());
        }
        if self.password_db.is_empty() {
            return Err("password_db must be set".to_string());
        }
        if self.token_max_age_secs == 0 {
            return Err("token_max_age_secs must be positive".to_string());
        }
        if self.secret_prefix_chars == Some(0) {
            return Err("secret_prefix_chars must be positive".to_string());
        }
        check_limit("login_limit", &self.login_limit)?;
        for route in &self.routes {
            if !route.prefix.starts_with('/') {
                return Err(format!("route prefix '{}' must start with '/'", route.prefix));
            }
            check_limit(&route.prefix, &route.limit)?;
        }
        Ok(())
    }

    /// Resolve the token secret from inline config or the environment.
    pub fn resolve_secret(&self) -> Result<String, String> {
        let secret = match &self.token_secret {
            Some(inline) => inline.clone(),
            None => std::env::var(&self.token_secret_env)
                .map_err(|_| format!("environment variable {} is not set", self.token_secret_env))?,
        };
        if secret.is_empty() {
            return Err("token secret is empty".to_string());
        }
        Ok(match self.secret_prefix_chars {
            Some(n) => secret.chars().take(n).collect(),
            None => secret,
        })
    }

    pub fn auth_config(&self) -> AuthConfig {
        let max_age_ms =
            i64::try_from(self.token_max_age_secs.saturating_mul(1000)).unwrap_or(i64::MAX);
        AuthConfig::new()
            .with_login_limit(self.login_limit.into())
            .with_token_max_age(max_age_ms)
            .with_max_tracked(self.max_tracked_clients)
    }

    pub fn sweep_interval(&self) -> Duration {
        Duration::from_secs(self.sweep_interval_secs.max(1))
    }

    pub fn health_check_interval(&self) -> Duration {
        Duration::from_secs(self.health_check_secs.max(1))
    }
}

fn check_limit(name: &str, limit: &LimitConfig) -> Result<(), String> {
    if limit.max_attempts == 0 {
        return Err(format!("{name}: max_attempts must be positive"));
    }
    if limit.window_secs == 0 {
        return Err(format!("{name}: window_secs must be positive"));
    }
    let max_secs = MAX_WINDOW_MS / 1000;
    if limit.window_secs > max_secs as u64 {
        return Err(format!("{name}: window_secs must be at most {max_secs}"));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    const MINIMAL: &str = r#"
upstreams: ["127.0.0.1:9001"]
password_db: admin.db
"#;

    #[test]
    fn test_defaults() {
        let conf = GateConfig::from_yaml(MINIMAL).expect("Failed to parse config");
        assert_eq!(conf.listen, "0.0.0.0:8080");
        assert_eq!(conf.token_secret_env, "ADMIN_PASSWORD");
        assert_eq!(conf.token_max_age_secs, 86_400);
        assert!(!conf.trust_proxy_headers);
        assert_eq!(conf.login_limit.max_attempts, 10);
        assert_eq!(conf.login_limit.window_secs, 300);
        assert_eq!(conf.routes.len(), 3);
        assert_eq!(conf.routes[0].prefix, "/admin/data");
        assert_eq!(conf.routes[0].limit.max_attempts, 60);
        assert_eq!(conf.routes[1].limit.max_attempts, 30);
    }

    #[test]
    fn test_deserialize_full_config() {
        let yaml = r#"
listen: "127.0.0.1:9999"
upstreams: ["10.0.0.1:80", "10.0.0.2:80"]
password_db: /var/lib/site/admin.db
token_secret: hunter2hunter2
secret_prefix_chars: 8
token_max_age_secs: 3600
trust_proxy_headers: true
max_tracked_clients: 500
sweep_interval_secs: 10
login_limit:
  max_attempts: 5
  window_secs: 900
routes:
  - prefix: /admin/data
    limit:
      max_attempts: 120
      window_secs: 60
# pingora settings share this file and are ignored here
threads: 4
"#;
        let conf = GateConfig::from_yaml(yaml).expect("Failed to parse config");
        assert_eq!(conf.upstreams.len(), 2);
        assert_eq!(conf.routes.len(), 1);
        assert_eq!(conf.resolve_secret().unwrap(), "hunter2h");

        let auth = conf.auth_config();
        assert_eq!(auth.login_limit, Limit::new(5, 900_000));
        assert_eq!(auth.token_max_age_ms, 3_600_000);
        assert_eq!(auth.max_tracked, 500);
    }

    #[test]
    fn test_validate_rejects_bad_values() {
        let mut conf = GateConfig::from_yaml(MINIMAL).unwrap();
        conf.upstreams.clear();
        assert!(conf.validate().is_err());

        let mut conf = GateConfig::from_yaml(MINIMAL).unwrap();
        conf.login_limit.max_attempts = 0;
        assert!(conf.validate().is_err());

        let mut conf = GateConfig::from_yaml(MINIMAL).unwrap();
        conf.routes[0].prefix = "admin".to_string();
        assert!(conf.validate().is_err());

        let mut conf = GateConfig::from_yaml(MINIMAL).unwrap();
        conf.routes[1].limit.window_secs = 0;
        assert!(conf.validate().is_err());

        let mut conf = GateConfig::from_yaml(MINIMAL).unwrap();
        conf.login_limit.window_secs = u64::MAX;
        assert!(conf.validate().is_err());

        let mut conf = GateConfig::from_yaml(MINIMAL).unwrap();
        conf.routes[0].limit.window_secs = 7 * 24 * 60 * 60;
        assert!(conf.validate().is_ok());
    }

    #[test]
    fn test_missing_secret_is_error() {
        let mut conf = GateConfig::from_yaml(MINIMAL).unwrap();
        conf.token_secret_env = "ADMIN_GATE_TEST_SECRET_THAT_IS_NEVER_SET".to_string();
        assert!(conf.resolve_secret().is_err());

        conf.token_secret = Some(String::new());
        assert!(conf.resolve_secret().is_err());
    }
}
