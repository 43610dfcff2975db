pub(crate) mod static_token;

pub use static_token::StaticTokenProvider;
