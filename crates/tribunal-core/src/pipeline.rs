//! Pipeline orchestration: preprocess, fan out to the four reviewers, join,
//! arbitrate.
//!
//! Stage ordering is strict. The preprocessor must reach its terminal record
//! before any reviewer starts; the four reviewers then run concurrently with
//! no shared mutable state (each owns its copy of the record and a bus
//! handle); the arbiter runs only after the join barrier has collected every
//! reviewer's terminal verdict.

use crate::arbiter::Arbiter;
use crate::config::PipelineConfig;
use crate::model::{FinalVerdict, ReviewVerdict, ReviewerId};
use crate::preprocess::Preprocessor;
use crate::providers::llm::{LlmClient, OpenAiClient};
use crate::review::Reviewer;
use crate::stream::StreamBus;
use serde_json::json;
use std::collections::BTreeMap;
use std::sync::Arc;
use tokio::task::JoinSet;

pub struct Pipeline {
    client: Arc<dyn LlmClient>,
    cfg: PipelineConfig,
}

impl Pipeline {
    pub fn new(client: Arc<dyn LlmClient>, cfg: PipelineConfig) -> Self {
        Self { client, cfg }
    }

    /// Pipeline over an OpenAI-compatible endpoint configured from the
    /// environment.
    pub fn from_env() -> Self {
        let cfg = PipelineConfig::from_env();
        let client = Arc::new(OpenAiClient::new(&cfg.base_url, &cfg.api_key));
        Self::new(client, cfg)
    }

    /// Score one submission. Individual stage failures degrade to stage
    /// defaults; this never fails and never panics the caller.
    pub async fn score(&self, content: &str) -> FinalVerdict {
        self.run(content, &StreamBus::sink(), None).await
    }

    /// Score while publishing progress on `bus` (`splitter`,
    /// `reviewer:<id>`, `chairman` channels plus `done_*` terminals).
    pub async fn score_streaming(&self, content: &str, bus: &StreamBus) -> FinalVerdict {
        self.run(content, bus, None).await
    }

    /// Full entry: optional reference top-10 context enables diversity
    /// calibration in the arbiter.
    pub async fn run(
        &self,
        content: &str,
        bus: &StreamBus,
        top10_context: Option<&str>,
    ) -> FinalVerdict {
        let preprocessor = Preprocessor::new(self.client.clone(), self.cfg.clone());
        let record = if bus.is_active() {
            preprocessor.run_streaming(content, bus).await
        } else {
            preprocessor.run(content).await
        };
        tracing::debug!(degenerate = record.is_degenerate(), "preprocessing complete");

        let mut join_set = JoinSet::new();
        for id in ReviewerId::ALL {
            let reviewer = Reviewer::new(id, self.client.clone(), self.cfg.clone());
            let record = record.clone();
            let bus = bus.clone();
            join_set.spawn(async move {
                if bus.is_active() {
                    reviewer.evaluate_streaming(&record, &bus).await
                } else {
                    reviewer.evaluate(&record).await
                }
            });
        }

        let mut verdicts: BTreeMap<ReviewerId, ReviewVerdict> = BTreeMap::new();
        while let Some(res) = join_set.join_next().await {
            match res {
                Ok(verdict) => match verdict.reviewer() {
                    Some(id) => {
                        verdicts.insert(id, verdict);
                    }
                    None => {
                        tracing::warn!(tag = %verdict.expert, "unrecognized reviewer tag at join barrier");
                    }
                },
                Err(err) => {
                    // The reviewer task itself died; its verdict is simply
                    // absent and aggregation renormalizes.
                    tracing::warn!(error = %err, "reviewer task failed to join");
                }
            }
        }
        tracing::debug!(reviewers = verdicts.len(), "join barrier complete");

        let arbiter = Arbiter::new(self.client.clone(), self.cfg.clone());
        if bus.is_active() {
            arbiter.decide_streaming(&verdicts, top10_context, bus).await
        } else {
            arbiter.decide(&verdicts, top10_context).await
        }
    }
}

/// Entry-point degrade rule: errors become a JSON body, not a transport
/// failure.
pub fn error_body(err: &anyhow::Error) -> serde_json::Value {
    json!({"error": err.to_string()})
}
