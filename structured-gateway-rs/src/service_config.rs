//! Bind address and backend selection from the environment

use std::collections::HashMap;
use std::env;
use std::net::SocketAddr;
use std::sync::Arc;

use structured_output::backend::{GenerationBackend, LlamaCliBackend, OpenAiCompatBackend};
use structured_output::config::{
    CompositeConfigProvider, ConfigProviderExt, EnvConfigProvider, LlamaCliConfig,
    MemoryConfigProvider, OpenAiCompatConfig, ServiceConfig, DEFAULT_PROVIDER,
};
use structured_output::{Result, RetryPolicy};

/// Port the web UI listens on by default
pub const DEFAULT_PORT: u16 = 7860;

/// Get service port from environment variables with proper fallback
///
/// Reads `<SERVICE>_SERVICE_PORT`; malformed values fall back to `default_port`.
pub fn get_service_port(service_name: &str, default_port: u16) -> u16 {
    let var_name = format!("{}_SERVICE_PORT", service_name.to_uppercase());
    match env::var(&var_name) {
        Ok(value) => value.trim().parse::<u16>().unwrap_or_else(|_| {
            log::warn!("Invalid port in {}, using default {}", var_name, default_port);
            default_port
        }),
        Err(_) => default_port,
    }
}

/// Create a SocketAddr for binding a service
///
/// `<SERVICE>_SERVICE_ADDR` wins when it parses, with or without an
/// `http://` scheme. Otherwise binds all interfaces on the configured port.
pub fn get_bind_address(service_name: &str, default_port: u16) -> SocketAddr {
    let var_name = format!("{}_SERVICE_ADDR", service_name.to_uppercase());

    if let Ok(addr_str) = env::var(&var_name) {
        let without_scheme = addr_str
            .strip_prefix("http://")
            .or_else(|| addr_str.strip_prefix("https://"))
            .unwrap_or(&addr_str);
        match without_scheme.parse::<SocketAddr>() {
            Ok(addr) => return addr,
            Err(_) => log::warn!("Invalid address format in {}, using default", var_name),
        }
    }

    let port = get_service_port(service_name, default_port);
    SocketAddr::from(([0, 0, 0, 0], port))
}

/// Settings layered as `OSMOSIS_<NAMESPACE>_*`, then `OSMOSIS_*`, then built-in defaults
pub fn gateway_provider(namespace: Option<&str>) -> CompositeConfigProvider {
    let base: &EnvConfigProvider = &DEFAULT_PROVIDER;
    layered_provider(base.clone(), namespace)
}

fn layered_provider(base: EnvConfigProvider, namespace: Option<&str>) -> CompositeConfigProvider {
    let mut provider = CompositeConfigProvider::new();
    if let Some(namespace) = namespace {
        provider.add_provider(base.clone().with_namespace(namespace));
    }
    provider
        .with_provider(base)
        .with_provider(MemoryConfigProvider::with_values(built_in_defaults()))
}

fn built_in_defaults() -> HashMap<String, String> {
    HashMap::from([
        ("backend".to_string(), "llama-cli".to_string()),
        ("default_model".to_string(), String::new()),
        ("enforce_vulkan".to_string(), "true".to_string()),
    ])
}

/// Model path pre-filled in the UI and used when a request leaves it blank
pub fn default_model_path() -> String {
    gateway_provider(None).get_string_or("default_model", "")
}

/// Build the backend named by `OSMOSIS_BACKEND` (`llama-cli` or `openai`).
/// Backend settings may be scoped, e.g. `OSMOSIS_LLAMA_GPU_LAYERS`.
pub fn backend_from_env() -> Result<Arc<dyn GenerationBackend>> {
    backend_from_provider(&gateway_provider(None), |namespace| gateway_provider(Some(namespace)))
}

fn backend_from_provider<F>(
    provider: &CompositeConfigProvider,
    scoped: F,
) -> Result<Arc<dyn GenerationBackend>>
where
    F: Fn(&str) -> CompositeConfigProvider,
{
    let kind = provider.get_string_or("backend", "llama-cli").to_lowercase();

    let backend: Arc<dyn GenerationBackend> = match kind.as_str() {
        "openai" | "openai-compat" => {
            let config = OpenAiCompatConfig::from_provider(&scoped("OPENAI"))?;
            log::info!("Configured {} at {}", config.service_name(), config.base_url);
            Arc::new(OpenAiCompatBackend::new(config)?)
        }
        _ => {
            let config = LlamaCliConfig::from_provider(&scoped("LLAMA"))?;
            log::info!("Configured {} via {}", config.service_name(), config.binary);
            Arc::new(LlamaCliBackend::new(config)?)
        }
    };
    Ok(backend)
}

/// Retry policy from `OSMOSIS_MAX_ATTEMPTS` and `OSMOSIS_BACKOFF_MS`
pub fn retry_policy_from_env() -> Result<RetryPolicy> {
    RetryPolicy::from_provider(&gateway_provider(None))
}

#[cfg(test)]
mod tests {
    use super::*;
    use structured_output::ConfigProvider;

    #[test]
    fn test_service_port_fallback() {
        env::set_var("SGW_PORT_TEST_SERVICE_PORT", "9000");
        assert_eq!(get_service_port("sgw_port_test", DEFAULT_PORT), 9000);

        env::set_var("SGW_PORT_TEST_SERVICE_PORT", "not-a-port");
        assert_eq!(get_service_port("sgw_port_test", DEFAULT_PORT), 7860);

        env::remove_var("SGW_PORT_TEST_SERVICE_PORT");
        assert_eq!(get_service_port("sgw_port_test", DEFAULT_PORT), 7860);
    }

    #[test]
    fn test_bind_address_override() {
        env::set_var("SGW_ADDR_TEST_SERVICE_ADDR", "http://127.0.0.1:8123");
        assert_eq!(
            get_bind_address("sgw_addr_test", DEFAULT_PORT),
            "127.0.0.1:8123".parse::<SocketAddr>().unwrap()
        );

        env::set_var("SGW_ADDR_TEST_SERVICE_ADDR", "garbage");
        assert_eq!(
            get_bind_address("sgw_addr_test", DEFAULT_PORT),
            "0.0.0.0:7860".parse::<SocketAddr>().unwrap()
        );
        env::remove_var("SGW_ADDR_TEST_SERVICE_ADDR");
    }

    #[test]
    fn test_layered_provider_precedence() {
        env::set_var("SGW_LAYER_TEST_LLAMA_GPU_LAYERS", "24");
        env::set_var("SGW_LAYER_TEST_GPU_LAYERS", "8");
        env::set_var("SGW_LAYER_TEST_N_PREDICT", "64");

        let base = EnvConfigProvider::new().with_prefix("SGW_LAYER_TEST");
        let scoped = layered_provider(base.clone(), Some("LLAMA"));
        let unscoped = layered_provider(base, None);

        assert_eq!(scoped.get::<u32>("gpu_layers").unwrap(), 24);
        assert_eq!(unscoped.get::<u32>("gpu_layers").unwrap(), 8);
        assert_eq!(scoped.get::<u32>("n_predict").unwrap(), 64);
        assert_eq!(unscoped.get_string("backend").unwrap(), "llama-cli");
        assert!(unscoped.get_bool_or("enforce_vulkan", false));

        env::remove_var("SGW_LAYER_TEST_LLAMA_GPU_LAYERS");
        env::remove_var("SGW_LAYER_TEST_GPU_LAYERS");
        env::remove_var("SGW_LAYER_TEST_N_PREDICT");
    }

    #[test]
    fn test_backend_selection_uses_scoped_settings() {
        env::set_var("SGW_BACKEND_TEST_BACKEND", "openai");
        env::set_var("SGW_BACKEND_TEST_OPENAI_OPENAI_BASE_URL", "http://127.0.0.1:1234/v1");

        let base = EnvConfigProvider::new().with_prefix("SGW_BACKEND_TEST");
        let backend = backend_from_provider(&layered_provider(base.clone(), None), |ns| {
            layered_provider(base.clone(), Some(ns))
        })
        .unwrap();
        assert_eq!(backend.name(), "openai-compat");

        env::set_var("SGW_BACKEND_TEST_OPENAI_OPENAI_BASE_URL", "not a url");
        let result = backend_from_provider(&layered_provider(base.clone(), None), |ns| {
            layered_provider(base.clone(), Some(ns))
        });
        assert!(result.is_err());

        env::remove_var("SGW_BACKEND_TEST_BACKEND");
        env::remove_var("SGW_BACKEND_TEST_OPENAI_OPENAI_BASE_URL");
        let backend = backend_from_provider(&layered_provider(base.clone(), None), |ns| {
            layered_provider(base.clone(), Some(ns))
        })
        .unwrap();
        assert_eq!(backend.name(), "llama-cli");
    }
}
