//! Plans GPU offload for a model and runs one short generation with it.
//!
//! Usage: `gpu-probe [MODEL_PATH]`, falling back to `OSMOSIS_DEFAULT_MODEL`.
//! Set `OSMOSIS_ENFORCE_VULKAN=false` to leave `LLAMA_CPP_BACKEND` untouched.

use structured_gateway::service_config::{default_model_path, gateway_provider};
use structured_output::backend::{
    BackendOutcome, GenerationBackend, GenerationRequest, LlamaCliBackend,
};
use structured_output::config::{ConfigProviderExt, LlamaCliConfig};
use structured_output::gpu::{ensure_vulkan_backend, probe_gpu_plan};

const PROBE_PROMPT: &str = "What is the meaning of life?";
const PROBE_TOKENS: u32 = 10;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenv::dotenv().ok();

    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let model = std::env::args()
        .nth(1)
        .unwrap_or_else(default_model_path);
    if model.trim().is_empty() {
        return Err("no model path given and OSMOSIS_DEFAULT_MODEL is not set".into());
    }

    let provider = gateway_provider(Some("LLAMA"));
    if provider.get_bool_or("enforce_vulkan", true) {
        ensure_vulkan_backend();
    }
    let plan = probe_gpu_plan().await;
    println!("Estimated usable VRAM: {} MB", plan.vram_mb);
    println!("Offloading {} layers to GPU", plan.layers);

    let mut config = LlamaCliConfig::from_provider(&provider)?;
    config.gpu_layers = Some(plan.layers);
    config.sampling.max_tokens = PROBE_TOKENS;

    let backend = LlamaCliBackend::new(config)?;
    let request = GenerationRequest::new(PROBE_PROMPT, model)?;

    match backend.generate(&request).await {
        BackendOutcome::Completed { text, .. } => {
            println!("Model output:\n{}", text);
            Ok(())
        }
        BackendOutcome::Failed {
            reason,
            diagnostics,
        } => {
            eprintln!("{}", diagnostics);
            Err(format!("generation failed: {}", reason).into())
        }
    }
}
