//! Secret resolution collaborator
//!
//! Required by `build_agent_config` to resolve per-agent provider credentials.
//! Added beyond the distilled interfaces since a real `build_agent_config`
//! cannot hand a provider API key to the LLM gateway without one.

use async_trait::async_trait;

use crate::error::{Error, Result};

#[async_trait]
pub trait SecretResolver: Send + Sync {
    /// Resolve a named secret, e.g. `"anthropic_api_key"`.
    async fn resolve(&self, name: &str) -> Result<String>;
}

/// Environment-variable-backed resolver: `resolve("anthropic_api_key")` reads
/// `ANTHROPIC_API_KEY`.
pub struct EnvSecretResolver;

#[async_trait]
impl SecretResolver for EnvSecretResolver {
    async fn resolve(&self, name: &str) -> Result<String> {
        let env_var = name.to_uppercase();
        std::env::var(&env_var)
            .map_err(|_| Error::Configuration(format!("secret `{env_var}` not set in environment")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn resolves_from_environment() {
        std::env::set_var("TEST_SECRET_KEY", "value");
        let resolver = EnvSecretResolver;
        assert_eq!(resolver.resolve("test_secret_key").await.unwrap(), "value");
        std::env::remove_var("TEST_SECRET_KEY");
    }

    #[tokio::test]
    async fn missing_secret_is_configuration_error() {
        std::env::remove_var("DEFINITELY_NOT_SET_KEY");
        let resolver = EnvSecretResolver;
        assert!(resolver.resolve("definitely_not_set_key").await.is_err());
    }
}
