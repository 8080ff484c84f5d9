//! Study protocol designer.
//!
//! Turns a gap analysis into a concrete study protocol, with a
//! methodological review standing between the creative draft and the
//! final text.

use log::warn;
use std::sync::Arc;

use colloquy_llm::GenerativeClient;

use crate::protocol::{critique_passes, self_correct};

const CONTEXT_LIMIT: usize = 20_000;

const DESIGNER_SYSTEM: &str = "You are a senior methodologist who designs rigorous, \
feasible study protocols. You write complete protocols with objective, design, \
population, intervention, outcomes, and analysis plan sections.";

const REVIEWER_SYSTEM: &str = "You are a sceptical methodological reviewer on an \
institutional review board. You check protocols for internal consistency, feasibility, \
and ethics, and you answer with either the single word PASS or the word REJECT \
followed by your concrete objections.";

/// Designs study protocols from accumulated research gaps.
pub struct ProtocolDesigner {
    llm: Arc<dyn GenerativeClient>,
}

impl ProtocolDesigner {
    pub fn new(llm: Arc<dyn GenerativeClient>) -> Self {
        Self { llm }
    }

    /// Draft a protocol addressing the given gap analysis, review it, and
    /// refine once if the review rejects. An unusable draft yields an
    /// empty string.
    pub async fn design_study(&self, context: &str) -> String {
        let context: String = context.chars().take(CONTEXT_LIMIT).collect();
        let llm = self.llm.clone();

        let attempt = self_correct(
            || {
                let llm = llm.clone();
                let prompt = format!(
                    "Design a complete study protocol that addresses the most \
                     important gap in the research summary below.\n\n\
                     RESEARCH SUMMARY:\n{context}"
                );
                async move {
                    match llm.generate(DESIGNER_SYSTEM, &prompt, 0.7).await {
                        Ok(text) => Some(text),
                        Err(err) => {
                            warn!("protocol draft failed: {err}");
                            None
                        }
                    }
                }
            },
            |draft| {
                let llm = llm.clone();
                let prompt = format!(
                    "Review the study protocol below for internal consistency, \
                     feasibility, and ethics. Respond with exactly PASS if it is \
                     acceptable, or REJECT followed by your objections.\n\n\
                     PROTOCOL:\n{draft}"
                );
                async move {
                    match llm.generate(REVIEWER_SYSTEM, &prompt, 0.0).await {
                        Ok(text) => Some(text),
                        Err(err) => {
                            warn!("protocol review failed: {err}");
                            None
                        }
                    }
                }
            },
            |draft, critique| {
                let llm = llm.clone();
                let prompt = format!(
                    "Your protocol was rejected in review. Produce a corrected \
                     protocol that resolves every objection while keeping the same \
                     research question.\n\nPREVIOUS PROTOCOL:\n{draft}\n\n\
                     REVIEW OBJECTIONS:\n{critique}"
                );
                async move {
                    match llm.generate(DESIGNER_SYSTEM, &prompt, 0.7).await {
                        Ok(text) => Some(text),
                        Err(err) => {
                            warn!("protocol refinement failed: {err}");
                            None
                        }
                    }
                }
            },
            critique_passes,
        )
        .await;

        attempt.final_output.unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::ProtocolDesigner;
    use colloquy_test_utils::{FailingClient, ScriptedClient};
    use pretty_assertions::assert_eq;
    use std::sync::Arc;

    #[tokio::test]
    async fn accepted_draft_is_returned_unchanged() {
        let client = Arc::new(ScriptedClient::new(vec![
            "Protocol: randomized crossover trial.".to_string(),
            "PASS".to_string(),
        ]));
        let designer = ProtocolDesigner::new(client.clone());

        let protocol = designer.design_study("gap: no crossover trials").await;
        assert_eq!(protocol, "Protocol: randomized crossover trial.");
        assert_eq!(client.call_count(), 2);
    }

    #[tokio::test]
    async fn rejected_draft_is_refined_once() {
        let client = Arc::new(ScriptedClient::new(vec![
            "Protocol: vague design.".to_string(),
            "REJECT: no control arm".to_string(),
            "Protocol: parallel-arm trial with placebo control.".to_string(),
        ]));
        let designer = ProtocolDesigner::new(client.clone());

        let protocol = designer.design_study("gap").await;
        assert_eq!(protocol, "Protocol: parallel-arm trial with placebo control.");
        assert_eq!(client.call_count(), 3);
    }

    #[tokio::test]
    async fn review_temperatures_split_creative_and_deterministic() {
        let client = Arc::new(ScriptedClient::new(vec![
            "draft".to_string(),
            "PASS".to_string(),
        ]));
        let designer = ProtocolDesigner::new(client.clone());
        designer.design_study("gap").await;

        let calls = client.calls.lock();
        assert_eq!(calls[0].temperature, 0.7);
        assert_eq!(calls[1].temperature, 0.0);
    }

    #[tokio::test]
    async fn model_failure_yields_empty_protocol() {
        let designer = ProtocolDesigner::new(Arc::new(FailingClient));
        assert_eq!(designer.design_study("gap").await, "");
    }
}
