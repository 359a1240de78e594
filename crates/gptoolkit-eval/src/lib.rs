//! # gptoolkit-eval
//!
//! Text scoring used to rank stored prompts against user input.
//!
//! The only metric is a unigram [perplexity] of one text under the token
//! distribution of another. Lower scores mean the generated text is closer to
//! the reference; the value is a ranking key, not a calibrated probability.

mod perplexity;

pub use perplexity::{perplexity, PerplexityError, ReferenceDistribution, OOV_PROBABILITY};
