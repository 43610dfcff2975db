pub(crate) mod proxy;
pub(crate) mod storage;
pub(crate) mod token;
