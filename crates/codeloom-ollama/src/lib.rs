//! Ollama implementation of codeloom's [`CompletionBackend`] capability.
//!
//! Talks to a local Ollama server over its non-streaming `/api/generate`
//! endpoint with a blocking HTTP client. Responses are expected to follow a
//! simple convention the prompt spells out: one `FILE: <path>` header per
//! edited file, each followed by the full replacement content in a fenced
//! code block. Free text before the first header is surfaced as notes.

mod retry;

pub use retry::RetryPolicy;

use codeloom::backend::{CompletionBackend, GenerationRequest, ProposedChange};
use codeloom::error::{LoomError, Result};
use std::collections::BTreeMap;
use std::time::Duration;
use tracing::{debug, warn};

pub const DEFAULT_OLLAMA_URL: &str = "http://localhost:11434";

/// Blocking client for an Ollama server.
pub struct OllamaBackend {
    client: reqwest::blocking::Client,
    base_url: String,
    retry: RetryPolicy,
}

impl OllamaBackend {
    /// Create a backend for the given server URL. No connectivity check is
    /// made here; an unreachable server surfaces on the first generate call.
    pub fn new(base_url: impl Into<String>) -> Self {
        let client = reqwest::blocking::Client::builder()
            .connect_timeout(Duration::from_secs(5))
            .timeout(Duration::from_secs(300)) // model inference is slow
            .build()
            .unwrap_or_else(|_| reqwest::blocking::Client::new());
        OllamaBackend {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            retry: RetryPolicy::default(),
        }
    }

    pub fn with_retry_policy(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn send_with_retry(&self, body: &serde_json::Value) -> Result<reqwest::blocking::Response> {
        let url = format!("{}/api/generate", self.base_url);
        let mut attempt = 1;
        loop {
            match self.client.post(&url).json(body).send() {
                Ok(response) => return Ok(response),
                Err(e) if retry::is_transient(&e) && attempt < self.retry.max_attempts => {
                    let delay = self.retry.delay_for(attempt);
                    warn!(
                        attempt,
                        max = self.retry.max_attempts,
                        delay_ms = delay.as_millis() as u64,
                        error = %e,
                        "request failed, retrying"
                    );
                    std::thread::sleep(delay);
                    attempt += 1;
                }
                Err(e) => return Err(LoomError::Generation(e.to_string())),
            }
        }
    }
}

impl CompletionBackend for OllamaBackend {
    fn generate(&self, request: &GenerationRequest) -> Result<ProposedChange> {
        let prompt = build_prompt(request);
        let size = prompt.len();
        if size > request.max_request_bytes {
            return Err(LoomError::ContextTooLarge {
                size,
                limit: request.max_request_bytes,
            });
        }

        let body = serde_json::json!({
            "model": request.model,
            "prompt": prompt,
            "stream": false,
            "temperature": request.temperature,
        });

        debug!(model = %request.model, bytes = size, "sending generate request");
        let response = self.send_with_retry(&body)?;

        let status = response.status();
        let text = response
            .text()
            .map_err(|e| LoomError::Generation(e.to_string()))?;
        if !status.is_success() {
            return Err(LoomError::Generation(format!(
                "server returned {status}: {}",
                text.trim()
            )));
        }

        let value: serde_json::Value = serde_json::from_str(&text)
            .map_err(|e| LoomError::ResponseParse(format!("invalid JSON body: {e}")))?;
        let answer = value
            .get("response")
            .and_then(|v| v.as_str())
            .ok_or_else(|| {
                LoomError::ResponseParse("body has no 'response' string field".to_string())
            })?;

        parse_response(answer)
    }
}

/// Assemble the full prompt: context file blocks, the operator request, and
/// the output convention the parser expects.
fn build_prompt(request: &GenerationRequest) -> String {
    let mut prompt = String::new();
    prompt.push_str(
        "You are a coding assistant. Apply the requested change to the project files below.\n\n",
    );
    for (path, content) in &request.context {
        prompt.push_str("File: ");
        prompt.push_str(path);
        prompt.push('\n');
        prompt.push_str(content);
        if !content.ends_with('\n') {
            prompt.push('\n');
        }
        prompt.push('\n');
    }
    prompt.push_str("Request: ");
    prompt.push_str(&request.prompt);
    prompt.push_str("\n\n");
    prompt.push_str(
        "For every file you change, output its complete new content as:\n\
         FILE: <path>\n\
         ```\n\
         <content>\n\
         ```\n\
         You may write a short explanation before the first FILE: line. \
         Do not output partial files or diffs.\n",
    );
    prompt
}

/// Parse the model's answer into file sections plus optional leading notes.
fn parse_response(text: &str) -> Result<ProposedChange> {
    let mut sections = text.split("FILE:");
    let head = sections.next().unwrap_or("").trim();
    let notes = if head.is_empty() {
        None
    } else {
        Some(head.to_string())
    };

    let mut files = BTreeMap::new();
    for section in sections {
        let mut lines = section.lines();
        let Some(name_line) = lines.next() else {
            continue;
        };
        let path = name_line.trim();
        if path.is_empty() {
            continue;
        }

        let mut content = String::new();
        let mut in_fence = false;
        for line in lines {
            if line.trim_start().starts_with("```") {
                if in_fence {
                    break;
                }
                // Opening fence; any language tag on this line is dropped.
                in_fence = true;
                continue;
            }
            if in_fence {
                content.push_str(line);
                content.push('\n');
            }
        }
        if !in_fence {
            // Header with no code block: malformed section, skip it.
            continue;
        }
        files.insert(path.to_string(), content);
    }

    if files.is_empty() {
        return Err(LoomError::ResponseParse(
            "no file sections found in model output".to_string(),
        ));
    }
    Ok(ProposedChange { files, notes })
}
