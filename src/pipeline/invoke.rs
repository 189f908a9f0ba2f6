//! Model invocation: one prompt in, one raw reply out.
//!
//! The pipeline only sees the [`ModelBackend`] capability. Two backends ship
//! with the crate:
//!
//! * [`CommandBackend`] spawns a fresh process per call (by default
//!   `ollama run <model>`), pipes the prompt to its stdin and buffers stdout.
//! * [`ProviderBackend`] calls an in-process `edgequake_llm` provider.
//!
//! There is no retry and no timeout here. A failed call is returned as an
//! [`InvocationError`] and the orchestrator decides what to do with it.

use crate::config::ExtractionConfig;
use crate::error::{ExtractError, InvocationError};
use crate::output::Hints;
use crate::pipeline::reconcile::{reconcile, Reconciled};
use crate::prompts::build_prompt;
use async_trait::async_trait;
use edgequake_llm::{ChatMessage, CompletionOptions, LLMProvider, ProviderFactory};
use std::fmt;
use std::process::Stdio;
use std::sync::Arc;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;
use tracing::debug;

/// Sampling temperature used by [`ProviderBackend`].
pub const PROVIDER_TEMPERATURE: f32 = 0.1;
/// Completion budget used by [`ProviderBackend`]; a filled-in record is
/// well under this.
pub const PROVIDER_MAX_TOKENS: usize = 1024;

/// Anything that can answer a prompt with text.
#[async_trait]
pub trait ModelBackend: Send + Sync {
    /// Send `prompt` and return the model's complete reply.
    async fn invoke(&self, prompt: &str) -> Result<String, InvocationError>;
}

/// Runs an external program per invocation.
///
/// The prompt is written to stdin, stdin is closed, and the call resolves
/// when the process exits. Exit status 0 yields trimmed stdout; anything
/// else yields [`InvocationError::NonZeroExit`] carrying stderr.
#[derive(Debug, Clone)]
pub struct CommandBackend {
    program: String,
    args: Vec<String>,
}

impl CommandBackend {
    pub fn new<I, S>(program: impl Into<String>, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            program: program.into(),
            args: args.into_iter().map(Into::into).collect(),
        }
    }

    /// `<command> run <model>`, the Ollama CLI convention.
    pub fn ollama(command: &str, model: &str) -> Self {
        Self::new(command, ["run", model])
    }

    pub fn from_config(config: &ExtractionConfig) -> Self {
        Self::ollama(&config.model_command, &config.model_id)
    }

    pub fn program(&self) -> &str {
        &self.program
    }

    pub fn args(&self) -> &[String] {
        &self.args
    }
}

#[async_trait]
impl ModelBackend for CommandBackend {
    async fn invoke(&self, prompt: &str) -> Result<String, InvocationError> {
        let io_error = |source: std::io::Error| InvocationError::Io {
            program: self.program.clone(),
            source,
        };

        let mut child = Command::new(&self.program)
            .args(&self.args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|source| InvocationError::Spawn {
                program: self.program.clone(),
                source,
            })?;

        let mut stdin = child.stdin.take().ok_or_else(|| {
            io_error(std::io::Error::new(
                std::io::ErrorKind::BrokenPipe,
                "stdin was not captured",
            ))
        })?;

        // Feed stdin while draining stdout/stderr so a chatty child cannot
        // block on a full pipe before it has read the whole prompt.
        let feed = async move {
            stdin.write_all(prompt.as_bytes()).await?;
            stdin.shutdown().await
        };
        let (fed, output) = tokio::join!(feed, child.wait_with_output());
        let output = output.map_err(io_error)?;

        if !output.status.success() {
            return Err(InvocationError::NonZeroExit {
                program: self.program.clone(),
                code: output.status.code(),
                stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
            });
        }
        // A runner may exit 0 without reading all of stdin; its reply stands.
        match fed {
            Err(e) if e.kind() == std::io::ErrorKind::BrokenPipe => {
                debug!("{} closed stdin early; keeping its output", self.program);
            }
            other => other.map_err(io_error)?,
        }

        let reply = String::from_utf8_lossy(&output.stdout).trim().to_string();
        debug!("{} replied with {} chars", self.program, reply.len());
        Ok(reply)
    }
}

/// Sends each prompt as a single user message to an `edgequake_llm` provider.
pub struct ProviderBackend {
    provider: Arc<dyn LLMProvider>,
}

impl ProviderBackend {
    pub fn new(provider: Arc<dyn LLMProvider>) -> Self {
        Self { provider }
    }

    /// Build a provider by name (e.g. `"openai"`, `"ollama"`) and model.
    /// API keys are read from the environment by the factory.
    pub fn from_name(provider: &str, model: &str) -> Result<Self, ExtractError> {
        let llm = ProviderFactory::create_llm_provider(provider, model).map_err(|e| {
            ExtractError::ProviderNotConfigured {
                provider: provider.to_string(),
                hint: format!("{e}"),
            }
        })?;
        Ok(Self::new(llm))
    }
}

impl fmt::Debug for ProviderBackend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProviderBackend")
            .field("provider", &"<dyn LLMProvider>")
            .finish()
    }
}

#[async_trait]
impl ModelBackend for ProviderBackend {
    async fn invoke(&self, prompt: &str) -> Result<String, InvocationError> {
        let messages = vec![ChatMessage::user(prompt)];
        let options = build_options();
        let response = self
            .provider
            .chat(&messages, Some(&options))
            .await
            .map_err(|e| InvocationError::Provider {
                message: e.to_string(),
            })?;
        debug!(
            "Provider replied: {} input tokens, {} output tokens",
            response.prompt_tokens, response.completion_tokens
        );
        Ok(response.content.trim().to_string())
    }
}

fn build_options() -> CompletionOptions {
    CompletionOptions {
        temperature: Some(PROVIDER_TEMPERATURE),
        max_tokens: Some(PROVIDER_MAX_TOKENS),
        ..Default::default()
    }
}

/// The backend a run will use: the configured one, else a [`CommandBackend`].
pub fn resolve_backend(config: &ExtractionConfig) -> Arc<dyn ModelBackend> {
    match &config.backend {
        Some(backend) => Arc::clone(backend),
        None => Arc::new(CommandBackend::from_config(config)),
    }
}

/// Prompt the model with one chunk and reconcile its reply.
pub async fn extract_chunk(
    backend: &dyn ModelBackend,
    chunk: &str,
    hints: &Hints,
    max_prompt_chars: usize,
) -> Result<Reconciled, InvocationError> {
    let prompt = build_prompt(chunk, hints, max_prompt_chars);
    let reply = backend.invoke(&prompt).await?;
    Ok(reconcile(&reply))
}
