pub(crate) mod datasource_repo;

pub use datasource_repo::InMemoryDataSourceRepo;
