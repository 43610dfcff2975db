use dataproxy_sdk::{DataSource, SecretValue, SecurityContext, TokenError, TokenProvider};

/// Returns one configured token for every caller and data source.
///
/// Without a configured token every request is refused, so token-auth data
/// sources fail closed.
#[derive(Debug, Clone, Default)]
pub struct StaticTokenProvider {
    token: Option<SecretValue>,
}

impl StaticTokenProvider {
    #[must_use]
    pub fn new(token: Option<SecretValue>) -> Self {
        Self { token }
    }
}

#[async_trait::async_trait]
impl TokenProvider for StaticTokenProvider {
    async fn token(
        &self,
        _ctx: &SecurityContext,
        data_source: &DataSource,
    ) -> Result<SecretValue, TokenError> {
        match &self.token {
            Some(token) if !token.is_empty() => Ok(token.clone()),
            _ => Err(TokenError::Unavailable(format!(
                "no service token configured for data source {}",
                data_source.id
            ))),
        }
    }
}
