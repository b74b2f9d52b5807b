//! `llama-cli` process backend
//!
//! Each call spawns the binary once with the model, sampling flags and prompt on
//! the command line, waits for it to exit, and reads both output channels.

use std::process::Stdio;

use async_trait::async_trait;
use log::{debug, warn};
use tokio::process::Command;

use super::{BackendOutcome, GenerationBackend, GenerationRequest};
use crate::config::{LlamaCliConfig, ServiceConfig};
use crate::error::Result;
use crate::util::truncate_string;

/// Spawns a local llama.cpp binary per generation
#[derive(Debug, Clone)]
pub struct LlamaCliBackend {
    config: LlamaCliConfig,
}

impl Default for LlamaCliBackend {
    fn default() -> Self {
        Self {
            config: LlamaCliConfig::default(),
        }
    }
}

impl LlamaCliBackend {
    /// Create a backend from a validated configuration
    pub fn new(config: LlamaCliConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self { config })
    }

    pub fn config(&self) -> &LlamaCliConfig {
        &self.config
    }

    /// Command-line arguments for one request, binary excluded
    pub fn command_args(&self, request: &GenerationRequest) -> Vec<String> {
        let sampling = &self.config.sampling;
        let mut args = vec![
            "--model".to_string(),
            request.model().to_string(),
            "--temp".to_string(),
            sampling.temperature.to_string(),
            "--top-p".to_string(),
            sampling.top_p.to_string(),
            "--n-predict".to_string(),
            sampling.max_tokens.to_string(),
            "--prompt".to_string(),
            request.prompt().to_string(),
        ];

        if let Some(system) = request.system_prompt() {
            args.push("--system".to_string());
            args.push(system.to_string());
        }

        if request.model().to_lowercase().contains("-instruct") {
            args.push("--instruct".to_string());
        }

        if let Some(layers) = self.config.gpu_layers {
            args.push("--n-gpu-layers".to_string());
            args.push(layers.to_string());
        }

        args
    }
}

#[async_trait]
impl GenerationBackend for LlamaCliBackend {
    fn name(&self) -> &'static str {
        "llama-cli"
    }

    async fn generate(&self, request: &GenerationRequest) -> BackendOutcome {
        let args = self.command_args(request);
        debug!(
            "Spawning {} for model {} (prompt length={})",
            self.config.binary,
            request.model(),
            request.prompt().len()
        );

        let output = Command::new(&self.config.binary)
            .args(&args)
            .stdin(Stdio::null())
            .kill_on_drop(true)
            .output()
            .await;

        let output = match output {
            Ok(output) => output,
            Err(e) => {
                warn!("Failed to spawn {}: {}", self.config.binary, e);
                return BackendOutcome::failed(format!(
                    "failed to spawn {}: {}",
                    self.config.binary, e
                ));
            }
        };

        let stdout = String::from_utf8_lossy(&output.stdout).trim().to_string();
        let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();

        if stdout.is_empty() {
            warn!("[LLM Error] stderr: {}", truncate_string(&stderr, 512));
            return BackendOutcome::Failed {
                reason: format!("no output on stdout ({})", output.status),
                diagnostics: stderr,
            };
        }

        BackendOutcome::Completed {
            text: stdout,
            diagnostics: stderr,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request(model: &str) -> GenerationRequest {
        GenerationRequest::new("What is (3^2 + 4^2)?", model).unwrap()
    }

    #[test]
    fn test_command_args_basic() {
        let backend = LlamaCliBackend::default();
        let args = backend.command_args(&request("models/qwen.gguf"));
        assert_eq!(
            args,
            vec![
                "--model",
                "models/qwen.gguf",
                "--temp",
                "0",
                "--top-p",
                "1",
                "--n-predict",
                "256",
                "--prompt",
                "What is (3^2 + 4^2)?",
            ]
        );
    }

    #[test]
    fn test_command_args_system_instruct_and_gpu() {
        let backend = LlamaCliBackend::new(LlamaCliConfig {
            gpu_layers: Some(10),
            ..LlamaCliConfig::default()
        })
        .unwrap();
        let req = request("models/Mistral-7B-Instruct.gguf").with_system_prompt("Only JSON.");
        let args = backend.command_args(&req);

        let system_at = args.iter().position(|a| a == "--system").unwrap();
        assert_eq!(args[system_at + 1], "Only JSON.");
        assert!(args.contains(&"--instruct".to_string()));
        let layers_at = args.iter().position(|a| a == "--n-gpu-layers").unwrap();
        assert_eq!(args[layers_at + 1], "10");
    }

    #[test]
    fn test_rejects_empty_binary() {
        let config = LlamaCliConfig {
            binary: " ".into(),
            ..LlamaCliConfig::default()
        };
        assert!(LlamaCliBackend::new(config).is_err());
    }

    #[tokio::test]
    async fn test_missing_binary_is_a_failed_outcome() {
        let backend = LlamaCliBackend::new(LlamaCliConfig {
            binary: "/nonexistent/llama-cli-for-tests".into(),
            ..LlamaCliConfig::default()
        })
        .unwrap();

        let outcome = backend.generate(&request("m.gguf")).await;
        assert!(outcome.is_failed());
        assert!(outcome.failure_reason().unwrap().contains("failed to spawn"));
        assert_eq!(outcome.raw_text(), "");
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_stdout_becomes_completed_text() {
        // echo prints its arguments, which include the prompt
        let backend = LlamaCliBackend::new(LlamaCliConfig {
            binary: "echo".into(),
            ..LlamaCliConfig::default()
        })
        .unwrap();

        let outcome = backend.generate(&request("m.gguf")).await;
        assert!(!outcome.is_failed());
        assert!(outcome.raw_text().contains("What is (3^2 + 4^2)?"));
        assert!(outcome.raw_text().starts_with("--model m.gguf"));
    }
}
