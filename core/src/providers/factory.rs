use crate::config::Config;
use crate::providers::{BedrockProvider, OpenAIProvider, bedrock};
use crate::traits::Provider;
use anyhow::{Result, anyhow};
use std::sync::Arc;

const OPENROUTER_BASE_URL: &str = "https://openrouter.ai/api/v1";

pub fn create_provider(config: &Config) -> Result<Arc<dyn Provider>> {
    let provider_name = config.provider.as_deref().unwrap_or("openai");

    let provider = match provider_name.to_lowercase().as_str() {
        "bedrock" => {
            let api_key = resolve_api_key_with_fallback(
                &["AWS_BEARER_TOKEN_BEDROCK", "TABLETALK_BEDROCK_API_KEY"],
                &config.api_key,
            )?;
            let region = resolve_region(config.aws_region.as_deref());
            let mut provider = BedrockProvider::new(api_key, &region)
                .with_model(config.model.clone())
                .with_timeout(config.request_timeout())?;
            if let Some(base_url) = &config.base_url {
                provider = provider.with_base_url(base_url.clone());
            }
            return Ok(Arc::new(provider));
        }
        "openai" => {
            let api_key = resolve_api_key_with_fallback(
                &["OPENAI_API_KEY", "TABLETALK_OPENAI_API_KEY"],
                &config.api_key,
            )?;
            OpenAIProvider::new(api_key)
        }
        "openrouter" => {
            let api_key = resolve_api_key_with_fallback(
                &["OPENROUTER_API_KEY", "TABLETALK_OPENROUTER_API_KEY"],
                &config.api_key,
            )?;
            OpenAIProvider::new(api_key)
                .with_name("openrouter")
                .with_base_url(OPENROUTER_BASE_URL)
        }
        _ => {
            return Err(anyhow!(
                "Unknown provider: {}. Available: openai, openrouter, bedrock",
                provider_name
            ));
        }
    };

    let mut provider = provider
        .with_model(config.model.clone())
        .with_timeout(config.request_timeout())?;
    if let Some(base_url) = &config.base_url {
        provider = provider.with_base_url(base_url.clone());
    }
    Ok(Arc::new(provider))
}

/// Environment first, as the AWS tools do, then the config.
fn resolve_region(configured: Option<&str>) -> String {
    ["AWS_REGION", "AWS_DEFAULT_REGION"]
        .iter()
        .filter_map(|var| std::env::var(var).ok())
        .chain(configured.map(str::to_string))
        .find(|region| !region.trim().is_empty())
        .unwrap_or_else(|| bedrock::DEFAULT_REGION.to_string())
}

fn resolve_api_key_with_fallback(env_vars: &[&str], config_key: &str) -> Result<String> {
    for var_name in env_vars {
        if let Ok(key) = std::env::var(var_name)
            && !key.trim().is_empty()
        {
            return Ok(key);
        }
    }
    if !config_key.is_empty() {
        Ok(config_key.to_string())
    } else {
        Err(anyhow!(
            "No API key found. Set {} or run 'tabletalk onboard'.",
            env_vars.first().copied().unwrap_or("an API key variable")
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn config_key_is_the_fallback() {
        let key = resolve_api_key_with_fallback(&["TABLETALK_TEST_UNSET_KEY"], "sk-config").unwrap();
        assert_eq!(key, "sk-config");
        assert!(resolve_api_key_with_fallback(&["TABLETALK_TEST_UNSET_KEY"], "").is_err());
    }

    #[test]
    fn builds_known_providers() {
        let config = Config {
            provider: Some("OpenRouter".into()),
            api_key: "sk-config".into(),
            ..Config::default()
        };
        let provider = create_provider(&config).unwrap();
        assert_eq!(provider.name(), "openrouter");

        let bedrock = Config {
            provider: Some("bedrock".into()),
            api_key: "bedrock-key".into(),
            aws_region: Some("eu-west-1".into()),
            model: bedrock::DEFAULT_MODEL.into(),
            ..Config::default()
        };
        assert_eq!(create_provider(&bedrock).unwrap().name(), "bedrock");
    }

    #[test]
    fn configured_region_is_used_without_env() {
        if std::env::var("AWS_REGION").is_err() && std::env::var("AWS_DEFAULT_REGION").is_err() {
            assert_eq!(resolve_region(Some("eu-west-1")), "eu-west-1");
            assert_eq!(resolve_region(Some("  ")), bedrock::DEFAULT_REGION);
            assert_eq!(resolve_region(None), bedrock::DEFAULT_REGION);
        }
    }

    #[test]
    fn rejects_unknown_provider() {
        let config = Config {
            provider: Some("ollama".into()),
            api_key: "sk-config".into(),
            ..Config::default()
        };
        let err = create_provider(&config).err().unwrap();
        assert!(err.to_string().contains("Unknown provider"));
    }
}
