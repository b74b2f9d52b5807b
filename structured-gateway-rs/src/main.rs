// structured-gateway-rs/src/main.rs
// Structured Gateway - web UI over a structured-output session
// Port 7860 - HTTP entry point for the Run / Show Debug page
//
// Implements:
// - backend and retry policy selection from OSMOSIS_* settings
// - router bootstrap with body limits and CORS

use std::sync::Arc;

use structured_gateway::service_config::{
    backend_from_env, default_model_path, get_bind_address, retry_policy_from_env, DEFAULT_PORT,
};
use structured_gateway::StructuredGateway;
use structured_output::{GenerationBackend, StructuredGenerator, StructuredSession};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Load .env file
    dotenv::dotenv().ok();

    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let backend = backend_from_env()?;
    let policy = retry_policy_from_env()?;
    let default_model = default_model_path();

    log::info!("Using backend: {}", backend.name());
    log::info!("Using {}", policy);
    if default_model.is_empty() {
        log::warn!("OSMOSIS_DEFAULT_MODEL is not set, requests must name a model");
    }

    let generator = StructuredGenerator::new(backend).with_policy(policy);
    let gateway = Arc::new(StructuredGateway::new(
        StructuredSession::new(generator),
        default_model,
    ));
    let app = gateway.create_router();

    let addr = get_bind_address("gateway", DEFAULT_PORT);
    let listener = tokio::net::TcpListener::bind(&addr).await?;

    log::info!("Structured gateway starting on {}", addr);
    println!("Structured gateway listening on http://{}", addr);

    axum::serve(listener, app).await?;

    Ok(())
}
