use crate::error::Result;
use std::collections::BTreeMap;

/// Everything the backend needs to propose a change: the operator prompt,
/// the context snapshot in insertion order, and the model parameters.
#[derive(Debug, Clone)]
pub struct GenerationRequest {
    pub prompt: String,

    /// Ordered (path, content) pairs from the context snapshot.
    pub context: Vec<(String, String)>,

    pub model: String,
    pub temperature: f64,

    /// Fail fast with `ContextTooLarge` before any network I/O if the
    /// built request exceeds this many bytes.
    pub max_request_bytes: usize,
}

/// A structured proposal parsed from the backend's response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProposedChange {
    /// Path → full replacement content.
    pub files: BTreeMap<String, String>,

    /// Free-text explanation preceding the file sections, if any.
    pub notes: Option<String>,
}

/// Capability interface over the text-generation service.
///
/// Production implementation lives in `codeloom-ollama`; tests use a
/// deterministic fake.
pub trait CompletionBackend {
    fn generate(&self, request: &GenerationRequest) -> Result<ProposedChange>;
}
