use serde::Serialize;

use gptoolkit_client::CompletionRequest;
use gptoolkit_db::ParameterRecord;

/// A candidate prompt with its perplexity against the user text.
#[derive(Debug, Clone, Serialize)]
pub struct ScoredCandidate {
    pub prompt_text: String,
    pub engine_name: String,
    /// `None` when the prompt text has no tokens to score
    pub perplexity: Option<f64>,
}

/// Everything decided before the completion API is called.
#[derive(Debug, Clone, Serialize)]
pub struct CompletionPlan {
    /// Request that will be sent upstream
    pub request: CompletionRequest,
    /// Winning parameter set
    pub selected: ParameterRecord,
    /// Perplexity of the winning prompt
    pub perplexity: Option<f64>,
    /// Every candidate in store order
    pub candidates: Vec<ScoredCandidate>,
}

/// Result of a dispatched completion.
#[derive(Debug, Clone, Serialize)]
pub struct Completion {
    /// First choice's text, verbatim
    pub text: String,
    pub engine: String,
    /// Composed prompt that was sent
    pub prompt: String,
    pub perplexity: Option<f64>,
    pub duration_secs: f64,
}
