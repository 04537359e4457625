use std::collections::BTreeMap;

pub const DEFAULT_CONNECTION_LABEL: &str = "default";

/// Named backend connection strings the session can switch between.
///
/// The `default` label is always present. Entries are never removed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectionRegistry {
    connections: BTreeMap<String, String>,
}

impl ConnectionRegistry {
    pub fn new(default_connection_string: impl Into<String>) -> Self {
        let mut connections = BTreeMap::new();
        connections.insert(
            DEFAULT_CONNECTION_LABEL.to_string(),
            default_connection_string.into(),
        );
        Self { connections }
    }

    /// Insert or overwrite a label.
    pub fn add(&mut self, label: impl Into<String>, connection_string: impl Into<String>) {
        self.connections.insert(label.into(), connection_string.into());
    }

    pub fn get(&self, label: &str) -> Option<&str> {
        self.connections.get(label).map(String::as_str)
    }

    pub fn contains(&self, label: &str) -> bool {
        self.connections.contains_key(label)
    }

    /// Entries in label order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.connections
            .iter()
            .map(|(label, uri)| (label.as_str(), uri.as_str()))
    }

    pub fn len(&self) -> usize {
        self.connections.len()
    }

    pub fn is_empty(&self) -> bool {
        self.connections.is_empty()
    }

    /// One `name=<label>, connection string=<uri>` line per entry.
    pub fn listing(&self) -> String {
        self.iter()
            .map(|(label, uri)| format!("name={label}, connection string={uri}"))
            .collect::<Vec<_>>()
            .join("\n")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_label_always_present() {
        let registry = ConnectionRegistry::new("tcp://127.0.0.1:12001");
        assert!(registry.contains(DEFAULT_CONNECTION_LABEL));
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn add_overwrites() {
        let mut registry = ConnectionRegistry::new("tcp://a:1");
        registry.add("lab", "tcp://b:2");
        registry.add("lab", "tcp://c:3");
        assert_eq!(registry.get("lab"), Some("tcp://c:3"));
        assert_eq!(registry.len(), 2);
    }

    #[test]
    fn listing_is_sorted_by_label() {
        let mut registry = ConnectionRegistry::new("tcp://a:1");
        registry.add("zeta", "tcp://z:9");
        registry.add("alpha", "tcp://b:2");
        assert_eq!(
            registry.listing(),
            "name=alpha, connection string=tcp://b:2\n\
             name=default, connection string=tcp://a:1\n\
             name=zeta, connection string=tcp://z:9"
        );
    }
}
