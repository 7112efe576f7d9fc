use serde::{Deserialize, Serialize};

use crate::error::{LockError, LockResult};

/// Unix epoch milliseconds. Every index entry is scored by its expiry instant.
pub type Timestamp = u64;

/// A resource type discriminator such as `Order` or `invoice_line`.
///
/// Names are restricted to ASCII alphanumerics, `_`, `-` and `.` so that the
/// collection names derived from them can never contain the `:` separator.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ResourceType(String);

impl ResourceType {
    pub fn new(name: impl Into<String>) -> LockResult<Self> {
        let name = name.into();
        if name.is_empty() {
            return Err(LockError::InvalidArgument(
                "resource type must not be empty".to_string(),
            ));
        }
        if let Some(bad) = name
            .chars()
            .find(|c| !(c.is_ascii_alphanumeric() || matches!(c, '_' | '-' | '.')))
        {
            return Err(LockError::InvalidArgument(format!(
                "resource type '{}' contains invalid character {:?}",
                name, bad
            )));
        }
        Ok(Self(name))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for ResourceType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl TryFrom<String> for ResourceType {
    type Error = LockError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl TryFrom<&str> for ResourceType {
    type Error = LockError;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<ResourceType> for String {
    fn from(value: ResourceType) -> Self {
        value.0
    }
}

/// Renders a caller identifier into the string stored as a collection member.
pub(crate) fn identifier(label: &str, value: impl std::fmt::Display) -> LockResult<String> {
    let rendered = value.to_string();
    if rendered.is_empty() {
        return Err(LockError::InvalidArgument(format!(
            "{} must not be empty",
            label
        )));
    }
    if rendered.chars().any(char::is_control) {
        return Err(LockError::InvalidArgument(format!(
            "{} '{}' contains control characters",
            label,
            rendered.escape_debug()
        )));
    }
    Ok(rendered)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resource_type_accepts_plain_names() {
        assert_eq!(ResourceType::new("Order").unwrap().as_str(), "Order");
        assert!(ResourceType::new("invoice_line-v2.draft").is_ok());
    }

    #[test]
    fn test_resource_type_rejects_separators_and_empty() {
        assert!(matches!(
            ResourceType::new(""),
            Err(LockError::InvalidArgument(_))
        ));
        assert!(matches!(
            ResourceType::new("Order:42"),
            Err(LockError::InvalidArgument(_))
        ));
        assert!(ResourceType::new("Sales Order").is_err());
    }

    #[test]
    fn test_resource_type_deserializes_through_validation() {
        let ok: ResourceType = serde_json::from_str("\"Order\"").unwrap();
        assert_eq!(ok.to_string(), "Order");
        assert!(serde_json::from_str::<ResourceType>("\"a:b\"").is_err());
    }

    #[test]
    fn test_identifier_renders_numbers_and_rejects_blank() {
        assert_eq!(identifier("user_id", 7).unwrap(), "7");
        assert_eq!(identifier("resource_id", "abc-1").unwrap(), "abc-1");
        assert!(identifier("user_id", "").is_err());
        assert!(identifier("user_id", "a\nb").is_err());
    }
}
