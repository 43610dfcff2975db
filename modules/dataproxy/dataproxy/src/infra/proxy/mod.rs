pub(crate) mod director;
pub(crate) mod headers;
pub(crate) mod service;
pub(crate) mod transport;

pub(crate) use service::DataPlaneServiceImpl;
