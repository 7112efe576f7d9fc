use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{LockError, LockResult};
use crate::keys::{DEFAULT_RESOURCE_PREFIX, DEFAULT_TYPE_PREFIX, KeyScheme};

/// Lock lifetime used when the caller does not pass one (10 minutes).
pub const DEFAULT_TTL_SECS: u64 = 600;

/// Registry settings. Missing fields fall back to their defaults when
/// deserialized.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RegistryConfig {
    pub default_ttl_secs: u64,
    pub type_prefix: String,
    pub resource_prefix: String,
}

impl RegistryConfig {
    pub fn validate(&self) -> LockResult<()> {
        if self.default_ttl_secs == 0 {
            return Err(LockError::InvalidArgument(
                "default_ttl_secs must be greater than 0".to_string(),
            ));
        }
        for (name, prefix) in [
            ("type_prefix", &self.type_prefix),
            ("resource_prefix", &self.resource_prefix),
        ] {
            if prefix.is_empty() {
                return Err(LockError::InvalidArgument(format!("{} is required", name)));
            }
        }
        // "a:b:Order" would be both the type key of Order under "a:b" and the
        // resource key of b/Order under "a".
        let nested = |outer: &str, inner: &str| inner.starts_with(&format!("{}:", outer));
        if self.type_prefix == self.resource_prefix
            || nested(&self.type_prefix, &self.resource_prefix)
            || nested(&self.resource_prefix, &self.type_prefix)
        {
            return Err(LockError::InvalidArgument(
                "type_prefix and resource_prefix must not overlap".to_string(),
            ));
        }
        Ok(())
    }

    pub fn default_ttl(&self) -> Duration {
        Duration::from_secs(self.default_ttl_secs)
    }

    pub fn key_scheme(&self) -> KeyScheme {
        KeyScheme::new(self.type_prefix.clone(), self.resource_prefix.clone())
    }
}

impl Default for RegistryConfig {
    fn default() -> Self {
        Self {
            default_ttl_secs: DEFAULT_TTL_SECS,
            type_prefix: DEFAULT_TYPE_PREFIX.to_string(),
            resource_prefix: DEFAULT_RESOURCE_PREFIX.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partial_config_uses_defaults() {
        let config: RegistryConfig = serde_json::from_str(r#"{"default_ttl_secs": 30}"#).unwrap();
        assert_eq!(config.default_ttl(), Duration::from_secs(30));
        assert_eq!(config.type_prefix, "type:locks");
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_zero_ttl_is_rejected() {
        let config = RegistryConfig {
            default_ttl_secs: 0,
            ..RegistryConfig::default()
        };
        assert!(config.validate().unwrap_err().is_invalid_argument());
    }

    #[test]
    fn test_shared_prefix_is_rejected() {
        let config = RegistryConfig {
            type_prefix: "locks".to_string(),
            resource_prefix: "locks".to_string(),
            ..RegistryConfig::default()
        };
        assert!(config.validate().is_err());

        let nested = RegistryConfig {
            type_prefix: "locks:types".to_string(),
            resource_prefix: "locks".to_string(),
            ..RegistryConfig::default()
        };
        assert!(nested.validate().is_err());
    }
}
