#[cfg(test)]
mod tests {
    use crate::keys::KeyScheme;
    use crate::types::ResourceType;

    fn order() -> ResourceType {
        ResourceType::new("Order").unwrap()
    }

    #[test]
    fn test_default_key_format() {
        let keys = KeyScheme::default();
        assert_eq!(keys.type_key(&order()), "type:locks:Order");
        assert_eq!(keys.resource_key(&order(), "42"), "resource:locks:Order:42");
    }

    #[test]
    fn test_custom_prefixes() {
        let keys = KeyScheme::new("app:t", "app:r");
        assert_eq!(keys.type_key(&order()), "app:t:Order");
        assert_eq!(keys.resource_key(&order(), "9"), "app:r:Order:9");
    }

    #[test]
    fn test_resource_key_round_trips_ids_with_colons() {
        let keys = KeyScheme::default();
        let key = keys.resource_key(&order(), "eu:2024:42");
        let (resource_type, resource_id) = keys.parse_resource_key(&key).unwrap();
        assert_eq!(resource_type, order());
        assert_eq!(resource_id, "eu:2024:42");
    }

    #[test]
    fn test_parse_rejects_foreign_keys() {
        let keys = KeyScheme::default();
        assert_eq!(keys.parse_type_key("type:locks:Order"), Some(order()));
        assert_eq!(keys.parse_type_key("other:Order"), None);
        assert_eq!(keys.parse_resource_key("resource:locks:Order"), None);
        assert_eq!(keys.parse_resource_key("resource:locks:Order:"), None);
    }

    #[test]
    fn test_distinct_types_never_share_a_collection() {
        let keys = KeyScheme::default();
        let a = ResourceType::new("Order").unwrap();
        let b = ResourceType::new("order").unwrap();
        assert_ne!(keys.type_key(&a), keys.type_key(&b));
        assert_ne!(keys.resource_key(&a, "1"), keys.resource_key(&b, "1"));
    }
}
