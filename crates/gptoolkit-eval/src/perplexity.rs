use std::collections::HashMap;

use tracing::trace;

/// Probability assigned to generated tokens that never occur in the reference.
pub const OOV_PROBABILITY: f64 = 1e-10;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PerplexityError {
    #[error("Generated text contains no tokens")]
    EmptyGenerated,

    #[error("Reference text contains no tokens")]
    EmptyReference,
}

/// Unigram token distribution of a reference text.
///
/// Building the frequency table once lets many candidates be scored against
/// the same reference without re-tokenizing it.
#[derive(Debug, Clone)]
pub struct ReferenceDistribution<'a> {
    counts: HashMap<&'a str, usize>,
    total: usize,
}

impl<'a> ReferenceDistribution<'a> {
    /// Tokenize `reference` on whitespace and count each token.
    pub fn new(reference: &'a str) -> Result<Self, PerplexityError> {
        let mut counts: HashMap<&'a str, usize> = HashMap::new();
        let mut total = 0;

        for token in reference.split_whitespace() {
            *counts.entry(token).or_insert(0) += 1;
            total += 1;
        }

        if total == 0 {
            return Err(PerplexityError::EmptyReference);
        }

        Ok(Self { counts, total })
    }

    /// Number of tokens in the reference text.
    pub fn token_count(&self) -> usize {
        self.total
    }

    /// Relative frequency of `token`, or [`OOV_PROBABILITY`] if it is absent.
    pub fn probability(&self, token: &str) -> f64 {
        match self.counts.get(token) {
            Some(&count) => count as f64 / self.total as f64,
            None => OOV_PROBABILITY,
        }
    }

    /// Perplexity of `generated` under this distribution.
    ///
    /// `2^(-(1/N) * sum(log2 p(token)))` over the N whitespace tokens of
    /// `generated`.
    pub fn perplexity(&self, generated: &str) -> Result<f64, PerplexityError> {
        let mut log_sum = 0.0;
        let mut n = 0usize;

        for token in generated.split_whitespace() {
            log_sum += self.probability(token).log2();
            n += 1;
        }

        if n == 0 {
            return Err(PerplexityError::EmptyGenerated);
        }

        let entropy = -log_sum / n as f64;
        let score = entropy.exp2();
        trace!(tokens = n, entropy, score, "Computed perplexity");
        Ok(score)
    }
}

/// Perplexity of `generated` using `reference` as the token distribution.
///
/// Both texts are split on whitespace. Generated tokens missing from the
/// reference get [`OOV_PROBABILITY`]. Texts without any token are rejected
/// instead of dividing by zero.
pub fn perplexity(generated: &str, reference: &str) -> Result<f64, PerplexityError> {
    ReferenceDistribution::new(reference)?.perplexity(generated)
}
