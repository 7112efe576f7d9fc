//! Collection naming.
//!
//! The type index for `Order` lives at `type:locks:Order`; the resource index
//! for order 42 lives at `resource:locks:Order:42`. Resource type names never
//! contain `:`, so a resource key splits unambiguously at the first separator
//! after the prefix even when the resource id itself contains colons.

use crate::types::ResourceType;

pub const DEFAULT_TYPE_PREFIX: &str = "type:locks";
pub const DEFAULT_RESOURCE_PREFIX: &str = "resource:locks";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyScheme {
    type_prefix: String,
    resource_prefix: String,
}

impl KeyScheme {
    pub fn new(type_prefix: impl Into<String>, resource_prefix: impl Into<String>) -> Self {
        Self {
            type_prefix: type_prefix.into(),
            resource_prefix: resource_prefix.into(),
        }
    }

    /// Collection holding the locked resource ids of one type.
    pub fn type_key(&self, resource_type: &ResourceType) -> String {
        format!("{}:{}", self.type_prefix, resource_type)
    }

    /// Collection holding the user ids that hold one resource.
    pub fn resource_key(&self, resource_type: &ResourceType, resource_id: &str) -> String {
        format!("{}:{}:{}", self.resource_prefix, resource_type, resource_id)
    }

    pub fn parse_type_key(&self, key: &str) -> Option<ResourceType> {
        let name = key
            .strip_prefix(self.type_prefix.as_str())?
            .strip_prefix(':')?;
        ResourceType::new(name).ok()
    }

    pub fn parse_resource_key(&self, key: &str) -> Option<(ResourceType, String)> {
        let rest = key
            .strip_prefix(self.resource_prefix.as_str())?
            .strip_prefix(':')?;
        let (name, resource_id) = rest.split_once(':')?;
        if resource_id.is_empty() {
            return None;
        }
        Some((ResourceType::new(name).ok()?, resource_id.to_string()))
    }
}

impl Default for KeyScheme {
    fn default() -> Self {
        Self::new(DEFAULT_TYPE_PREFIX, DEFAULT_RESOURCE_PREFIX)
    }
}
