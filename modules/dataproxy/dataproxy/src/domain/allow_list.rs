use std::collections::HashSet;

/// Set of target authorities the proxy may forward to.
///
/// An empty list permits every target.
#[derive(Debug, Clone, Default)]
pub struct AllowList {
    hosts: HashSet<String>,
}

impl AllowList {
    #[must_use]
    pub fn new<I, S>(hosts: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            hosts: hosts
                .into_iter()
                .map(Into::<String>::into)
                .map(|h| h.trim().to_ascii_lowercase())
                .filter(|h| !h.is_empty())
                .collect(),
        }
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.hosts.is_empty()
    }

    /// Exact membership check on `host` or `host:port`, ignoring ASCII case.
    #[must_use]
    pub fn is_allowed(&self, authority: &str) -> bool {
        self.hosts.is_empty() || self.hosts.contains(&authority.to_ascii_lowercase())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_list_permits_everything() {
        let list = AllowList::default();
        assert!(list.is_allowed("anything.example.com"));
        assert!(list.is_allowed("10.0.0.1:8086"));
    }

    #[test]
    fn listed_authority_is_allowed() {
        let list = AllowList::new(["influx.internal:8086", "graphite.internal"]);
        assert!(list.is_allowed("influx.internal:8086"));
        assert!(list.is_allowed("graphite.internal"));
    }

    #[test]
    fn membership_is_exact() {
        let list = AllowList::new(["influx.internal:8086"]);
        assert!(!list.is_allowed("influx.internal"));
        assert!(!list.is_allowed("influx.internal:8087"));
        assert!(!list.is_allowed("evil.influx.internal:8086"));
    }

    #[test]
    fn host_case_is_ignored() {
        let list = AllowList::new(["Influx.Internal:8086"]);
        assert!(list.is_allowed("influx.internal:8086"));
        assert!(list.is_allowed("INFLUX.internal:8086"));
    }

    #[test]
    fn blank_entries_do_not_restrict() {
        let list = AllowList::new(["", "  "]);
        assert!(list.is_empty());
        assert!(list.is_allowed("graphite.internal"));
    }
}
