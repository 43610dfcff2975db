pub(crate) mod allow_list;
pub(crate) mod auth;
pub(crate) mod error;
pub(crate) mod model;
pub(crate) mod services;
