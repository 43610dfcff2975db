use dashmap::DashMap;
use dataproxy_sdk::{DataSource, DataSourceResolver, ResolveError, SecurityContext};

/// In-memory data source store backed by `DashMap`, keyed by `(org_id, id)`.
pub struct InMemoryDataSourceRepo {
    store: DashMap<(i64, i64), DataSource>,
}

impl InMemoryDataSourceRepo {
    #[must_use]
    pub fn new() -> Self {
        Self {
            store: DashMap::new(),
        }
    }

    #[must_use]
    pub fn with_data_sources(data_sources: impl IntoIterator<Item = DataSource>) -> Self {
        let repo = Self::new();
        for ds in data_sources {
            repo.insert(ds);
        }
        repo
    }

    /// Insert or replace a data source.
    pub fn insert(&self, ds: DataSource) {
        self.store.insert((ds.org_id, ds.id), ds);
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.store.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.store.is_empty()
    }
}

impl Default for InMemoryDataSourceRepo {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait::async_trait]
impl DataSourceResolver for InMemoryDataSourceRepo {
    async fn resolve(&self, ctx: &SecurityContext, id: i64) -> Result<DataSource, ResolveError> {
        self.store
            .get(&(ctx.organization_id(), id))
            .map(|ds| ds.clone())
            .ok_or(ResolveError::NotFound { id })
    }
}

#[cfg(test)]
mod tests {
    use dataproxy_sdk::DataSourceKind;

    use super::*;

    fn repo() -> InMemoryDataSourceRepo {
        InMemoryDataSourceRepo::with_data_sources([
            DataSource::new(1, 10, DataSourceKind::GenericHttp, "http://graphite"),
            DataSource::new(1, 20, DataSourceKind::TimeSeriesV1, "http://influx:8086"),
        ])
    }

    #[tokio::test]
    async fn resolves_within_caller_organization() {
        let ds = repo().resolve(&SecurityContext::new(20), 1).await.unwrap();
        assert_eq!(ds.org_id, 20);
        assert_eq!(ds.kind, DataSourceKind::TimeSeriesV1);
    }

    #[tokio::test]
    async fn other_organization_is_not_found() {
        let err = repo()
            .resolve(&SecurityContext::new(30), 1)
            .await
            .unwrap_err();
        assert!(matches!(err, ResolveError::NotFound { id: 1 }));
        assert_eq!(err.to_string(), "data source 1 not found");
    }

    #[test]
    fn insert_replaces_existing_entry() {
        let repo = repo();
        repo.insert(DataSource::new(1, 10, DataSourceKind::GenericHttp, "http://graphite-2"));
        assert_eq!(repo.len(), 2);
    }
}
