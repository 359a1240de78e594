use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info, warn};

use gptoolkit_client::{CompletionClient, CompletionRequest};
use gptoolkit_db::{Database, ParameterRecord};
use gptoolkit_eval::ReferenceDistribution;
use gptoolkit_logging::{LogEvent, Logger};

use crate::error::DispatchError;
use crate::outcome::{Completion, CompletionPlan, ScoredCandidate};
use crate::policy::MatchPolicy;

/// Picks the best stored prompt for some user text and forwards the composed
/// request to a completion backend.
pub struct Dispatcher<'a> {
    db: &'a Database,
    client: &'a dyn CompletionClient,
    logger: Arc<Logger>,
    policy: MatchPolicy,
}

impl<'a> Dispatcher<'a> {
    pub fn new(db: &'a Database, client: &'a dyn CompletionClient, logger: Arc<Logger>) -> Self {
        Self {
            db,
            client,
            logger,
            policy: MatchPolicy::default(),
        }
    }

    pub fn with_policy(mut self, policy: MatchPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Select a prompt and build the upstream request without sending it.
    ///
    /// Candidates are ranked by the perplexity of their prompt text under the
    /// token distribution of `user_text`; the lowest score wins and ties keep
    /// the earliest stored row. Prompts without tokens rank last.
    ///
    /// Blank `user_text` fails with [`DispatchError::EmptyInput`] before the
    /// store is queried, so it wins over [`DispatchError::NotFound`] even when
    /// no use case matches.
    pub fn plan(
        &self,
        user_text: &str,
        use_case_name: &str,
    ) -> Result<CompletionPlan, DispatchError> {
        self.logger.log(&LogEvent::CompletionStarted {
            use_case: use_case_name.to_string(),
            input_preview: Logger::truncate(user_text, 80),
        });

        let reference =
            ReferenceDistribution::new(user_text).map_err(|_| DispatchError::EmptyInput)?;

        let filter = self.policy.filter(user_text, use_case_name);
        let records = self.db.parameters().query(&filter)?;

        self.logger.log(&LogEvent::CandidatesFound {
            use_case: use_case_name.to_string(),
            count: records.len(),
        });

        if records.is_empty() {
            return Err(DispatchError::NotFound {
                user_text: user_text.to_string(),
                use_case_name: use_case_name.to_string(),
            });
        }

        let mut candidates = Vec::with_capacity(records.len());
        let mut best: Option<(usize, f64)> = None;

        for (index, record) in records.iter().enumerate() {
            let score = reference.perplexity(&record.prompt_text).ok();
            let rank = score.unwrap_or(f64::INFINITY);

            debug!(
                index,
                engine = %record.engine_name,
                perplexity = rank,
                "Scored candidate prompt"
            );
            self.logger.log(&LogEvent::CandidateScored {
                prompt_preview: Logger::truncate(&record.prompt_text, 60),
                engine: record.engine_name.clone(),
                perplexity: rank,
            });

            match best {
                Some((_, best_rank)) if rank.total_cmp(&best_rank).is_ge() => {}
                _ => best = Some((index, rank)),
            }

            candidates.push(ScoredCandidate {
                prompt_text: record.prompt_text.clone(),
                engine_name: record.engine_name.clone(),
                perplexity: score,
            });
        }

        // records is non-empty, so a best index always exists
        let (best_index, _) = best.unwrap_or((0, f64::INFINITY));
        let selected = records[best_index].clone();
        let perplexity = candidates[best_index].perplexity;

        let request = Self::build_request(&selected, user_text);

        self.logger.log(&LogEvent::PromptSelected {
            prompt_preview: Logger::truncate(&selected.prompt_text, 60),
            engine: selected.engine_name.clone(),
            perplexity: perplexity.unwrap_or(f64::INFINITY),
            max_tokens: selected.max_tokens,
            temperature: selected.temperature,
        });

        Ok(CompletionPlan {
            request,
            selected,
            perplexity,
            candidates,
        })
    }

    /// Select a prompt, send the composed request and return the first
    /// choice's text.
    pub async fn complete(
        &self,
        user_text: &str,
        use_case_name: &str,
    ) -> Result<Completion, DispatchError> {
        let plan = self.plan(user_text, use_case_name).inspect_err(|e| {
            self.logger.log(&LogEvent::ErrorEncountered {
                error: e.to_string(),
            })
        })?;

        self.send(plan).await.inspect_err(|e| {
            warn!(error = %e, "Completion failed");
            self.logger.log(&LogEvent::ErrorEncountered {
                error: e.to_string(),
            })
        })
    }

    /// Send a previously built plan.
    pub async fn send(&self, plan: CompletionPlan) -> Result<Completion, DispatchError> {
        info!(
            client = self.client.name(),
            engine = %plan.request.engine,
            "Dispatching completion"
        );

        let started = Instant::now();
        let response = self.client.complete(&plan.request).await?;
        let duration_secs = started.elapsed().as_secs_f64();

        let text = response
            .first_text()
            .ok_or(DispatchError::EmptyResponse)?
            .to_string();

        self.logger.log(&LogEvent::CompletionReceived {
            engine: plan.request.engine.clone(),
            chars: text.chars().count(),
            duration_secs,
        });

        Ok(Completion {
            text,
            engine: plan.request.engine,
            prompt: plan.request.prompt,
            perplexity: plan.perplexity,
            duration_secs,
        })
    }

    /// Stored prompt text followed immediately by the user text.
    fn build_request(selected: &ParameterRecord, user_text: &str) -> CompletionRequest {
        let prompt = format!("{}{}", selected.prompt_text, user_text);
        let request = CompletionRequest::new(
            selected.engine_name.clone(),
            prompt,
            selected.max_tokens,
            selected.temperature,
        );

        if selected.api_key.is_empty() {
            request
        } else {
            request.with_api_key(selected.api_key.clone())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(prompt_text: &str, api_key: &str) -> ParameterRecord {
        ParameterRecord {
            prompt_text: prompt_text.to_string(),
            engine_name: "text-davinci-003".to_string(),
            api_key: api_key.to_string(),
            use_case_name: "summarization".to_string(),
            use_case_description: String::new(),
            max_tokens: 100,
            temperature: 0.3,
        }
    }

    #[test]
    fn test_build_request_concatenates_verbatim() {
        let request = Dispatcher::build_request(&record("Summarize:", ""), "text");
        assert_eq!(request.prompt, "Summarize:text");
        assert_eq!(request.api_key, None);
    }

    #[test]
    fn test_build_request_attaches_row_key() {
        let request = Dispatcher::build_request(&record("Q: ", "sk-row"), "why?");
        assert_eq!(request.prompt, "Q: why?");
        assert_eq!(request.api_key.as_deref(), Some("sk-row"));
        assert_eq!(request.max_tokens, 100);
        assert_eq!(request.temperature, 0.3);
    }
}
