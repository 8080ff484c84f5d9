//! Structured claim extraction with a self-audit pass and deterministic
//! severity enforcement.
//!
//! The model proposes claims as JSON; a second model pass audits them
//! against a checklist; a final rule pass overrides `gap_severity`
//! wherever study design settles the answer, regardless of what the model
//! wrote.

use log::{debug, warn};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::Arc;

use colloquy_llm::GenerativeClient;

use crate::extract::extract_json_list;
use crate::protocol::{critique_passes, self_correct};

const SOURCE_LIMIT: usize = 30_000;

const EXTRACTOR_SYSTEM: &str = "You are a meticulous research analyst. You extract \
discrete scientific claims from papers as structured JSON. You never invent claims \
that are not in the text.";

const AUDITOR_SYSTEM: &str = "You are a quality auditor for extracted research claims. \
You check claims against the source text and a fixed checklist, and you answer with \
either the single word PASS or a short list of concrete failures.";

/// Epistemic assessment attached to each extracted claim.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EpistemicCheck {
    #[serde(default)]
    pub verification_status: String,
    #[serde(default)]
    pub gap_severity: String,
    #[serde(default)]
    pub reasoning: String,
}

/// Typed view of one extracted claim. Extraction itself works on raw
/// [`Value`]s so a malformed field degrades that field, not the claim.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Claim {
    #[serde(default)]
    pub claim_summary: String,
    #[serde(default)]
    pub claim_type: String,
    #[serde(default)]
    pub study_design: String,
    #[serde(default)]
    pub measurement_method: String,
    #[serde(default)]
    pub population: String,
    #[serde(default)]
    pub study_title: String,
    #[serde(default)]
    pub study_citation: String,
    #[serde(default)]
    pub authors: Vec<String>,
    #[serde(default)]
    pub epistemic_check: EpistemicCheck,
}

impl Claim {
    /// Convert a raw claim, tolerating missing or mistyped fields.
    pub fn from_value(value: &Value) -> Option<Claim> {
        if !value.is_object() {
            return None;
        }
        serde_json::from_value(value.clone()).ok()
    }
}

/// Force `gap_severity` where claim type, study design, and measurement
/// method determine it. First matching rule wins; matching is
/// case-insensitive substring.
pub fn enforce_severity(claim: &mut Value) {
    let claim_type = field_lower(claim, "claim_type");
    let study_design = field_lower(claim, "study_design");
    let measurement = field_lower(claim, "measurement_method");

    let forced = if claim_type.contains("behavioral") && measurement.contains("self-reported") {
        Some("High")
    } else if claim_summary_lower(claim).contains("associat") && study_design.contains("observational")
    {
        Some("Low")
    } else if claim_type.contains("causal") && study_design.contains("observational") {
        Some("High")
    } else if study_design.contains("rct") || study_design.contains("random") {
        Some("Low")
    } else {
        None
    };

    if let Some(severity) = forced {
        let Some(object) = claim.as_object_mut() else {
            return;
        };
        let check = object
            .entry("epistemic_check")
            .or_insert_with(|| Value::Object(serde_json::Map::new()));
        if !check.is_object() {
            *check = Value::Object(serde_json::Map::new());
        }
        if let Some(check) = check.as_object_mut() {
            check.insert("gap_severity".to_string(), Value::String(severity.to_string()));
        }
    }
}

fn field_lower(claim: &Value, field: &str) -> String {
    claim
        .get(field)
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_lowercase()
}

fn claim_summary_lower(claim: &Value) -> String {
    field_lower(claim, "claim_summary")
}

/// Extracts audited claims from paper text.
pub struct ClaimExtractor {
    llm: Arc<dyn GenerativeClient>,
}

impl ClaimExtractor {
    pub fn new(llm: Arc<dyn GenerativeClient>) -> Self {
        Self { llm }
    }

    /// Run the full extract, audit, refine, enforce pipeline over one
    /// source text. Returns raw claim objects ready for the knowledge
    /// graph; failures at any step degrade to an empty list.
    pub async fn extract_claims(&self, source: &str) -> Vec<Value> {
        let source = truncate_chars(source, SOURCE_LIMIT);
        let llm = self.llm.clone();

        let attempt = self_correct(
            || {
                let llm = llm.clone();
                let prompt = draft_prompt(&source);
                async move {
                    match llm.generate(EXTRACTOR_SYSTEM, &prompt, 0.0).await {
                        Ok(text) => {
                            let items = extract_json_list(&text);
                            if items.is_empty() {
                                None
                            } else {
                                serde_json::to_string(&Value::Array(items)).ok()
                            }
                        }
                        Err(err) => {
                            warn!("claim draft failed: {err}");
                            None
                        }
                    }
                }
            },
            |draft| {
                let llm = llm.clone();
                let prompt = audit_prompt(&source, &draft);
                async move {
                    match llm.generate(AUDITOR_SYSTEM, &prompt, 0.0).await {
                        Ok(text) => Some(text),
                        Err(err) => {
                            warn!("claim audit failed: {err}");
                            None
                        }
                    }
                }
            },
            |draft, critique| {
                let llm = llm.clone();
                let prompt = refine_prompt(&source, &draft, &critique);
                async move {
                    match llm.generate(EXTRACTOR_SYSTEM, &prompt, 0.0).await {
                        Ok(text) => {
                            let items = extract_json_list(&text);
                            serde_json::to_string(&Value::Array(items)).ok()
                        }
                        Err(err) => {
                            warn!("claim refinement failed: {err}");
                            None
                        }
                    }
                }
            },
            critique_passes,
        )
        .await;

        let final_json = match attempt.final_output {
            Some(text) => text,
            None => return Vec::new(),
        };

        let mut claims = match serde_json::from_str::<Value>(&final_json) {
            Ok(Value::Array(items)) => items,
            _ => extract_json_list(&final_json),
        };
        claims.retain(Value::is_object);
        for claim in &mut claims {
            enforce_severity(claim);
        }
        debug!("extracted {} claims", claims.len());
        claims
    }
}

fn truncate_chars(text: &str, limit: usize) -> String {
    text.chars().take(limit).collect()
}

fn draft_prompt(source: &str) -> String {
    format!(
        "Extract every discrete scientific claim from the paper below as a JSON list.\n\
         Each claim object must have these fields: claim_summary, claim_type \
         (Causal, Associational, Behavioral, or Descriptive), study_design, \
         measurement_method, population, study_title, study_citation, authors (list), \
         and epistemic_check with verification_status, gap_severity (High or Low), \
         and reasoning.\n\nPAPER:\n{source}\n\nRespond with the JSON list only."
    )
}

fn audit_prompt(source: &str, draft: &str) -> String {
    format!(
        "Audit the extracted claims against the source paper.\n\nCHECKLIST:\n\
         1. Each claim's study_design is consistent with the paper (a randomized \
         trial must not be labeled observational and vice versa).\n\
         2. gap_severity has no false positives: associational claims from \
         observational studies are Low severity.\n\
         3. gap_severity has no false negatives: causal claims from observational \
         studies are High severity.\n\
         4. No claim presents the paper's framing as settled when the paper itself \
         hedges.\n\
         5. Narrative fields (claim_summary, population, measurement_method) are \
         present and non-empty.\n\
         6. The output is valid JSON.\n\n\
         SOURCE:\n{source}\n\nEXTRACTED CLAIMS:\n{draft}\n\n\
         If every item passes, respond with exactly PASS. Otherwise list the \
         concrete failures."
    )
}

fn refine_prompt(source: &str, draft: &str, critique: &str) -> String {
    format!(
        "Your previous claim extraction failed an audit. Produce a corrected JSON \
         list with the same required fields, fixing every listed failure.\n\n\
         SOURCE:\n{source}\n\nPREVIOUS EXTRACTION:\n{draft}\n\n\
         AUDIT FAILURES:\n{critique}\n\nRespond with the corrected JSON list only."
    )
}

#[cfg(test)]
mod tests {
    use super::{Claim, ClaimExtractor, enforce_severity};
    use colloquy_test_utils::ScriptedClient;
    use pretty_assertions::assert_eq;
    use serde_json::json;
    use std::sync::Arc;

    #[test]
    fn causal_observational_is_forced_high() {
        let mut claim = json!({
            "claim_summary": "Sodium causes hypertension",
            "claim_type": "Causal",
            "study_design": "Observational cohort",
            "epistemic_check": {"gap_severity": "Low"}
        });
        enforce_severity(&mut claim);
        assert_eq!(claim["epistemic_check"]["gap_severity"], json!("High"));
    }

    #[test]
    fn associational_observational_is_forced_low() {
        let mut claim = json!({
            "claim_summary": "Sodium intake is associated with blood pressure",
            "claim_type": "Associational",
            "study_design": "Observational",
            "epistemic_check": {"gap_severity": "High"}
        });
        enforce_severity(&mut claim);
        assert_eq!(claim["epistemic_check"]["gap_severity"], json!("Low"));
    }

    #[test]
    fn behavioral_self_reported_takes_precedence() {
        // Rule order matters: behavioral plus self-reported wins even when
        // the design is randomized.
        let mut claim = json!({
            "claim_summary": "Participants reduced salt use",
            "claim_type": "Behavioral",
            "study_design": "RCT",
            "measurement_method": "Self-reported diary",
            "epistemic_check": {"gap_severity": "Low"}
        });
        enforce_severity(&mut claim);
        assert_eq!(claim["epistemic_check"]["gap_severity"], json!("High"));
    }

    #[test]
    fn randomized_design_is_forced_low() {
        let mut claim = json!({
            "claim_summary": "Treatment lowered blood pressure",
            "claim_type": "Causal",
            "study_design": "Randomized controlled trial",
            "measurement_method": "Clinic measurement"
        });
        enforce_severity(&mut claim);
        assert_eq!(claim["epistemic_check"]["gap_severity"], json!("Low"));
    }

    #[test]
    fn unmatched_claims_are_left_alone() {
        let mut claim = json!({
            "claim_summary": "The cohort was large",
            "claim_type": "Descriptive",
            "study_design": "Survey",
            "epistemic_check": {"gap_severity": "Medium"}
        });
        enforce_severity(&mut claim);
        assert_eq!(claim["epistemic_check"]["gap_severity"], json!("Medium"));
    }

    #[test]
    fn typed_view_tolerates_missing_fields() {
        let claim = Claim::from_value(&json!({"claim_summary": "only a summary"})).unwrap();
        assert_eq!(claim.claim_summary, "only a summary");
        assert_eq!(claim.authors, Vec::<String>::new());
        assert!(Claim::from_value(&json!("not an object")).is_none());
    }

    #[tokio::test]
    async fn passing_audit_makes_two_model_calls() {
        let draft = json!([{
            "claim_summary": "Sodium causes hypertension",
            "claim_type": "Causal",
            "study_design": "Observational"
        }])
        .to_string();
        let client = Arc::new(ScriptedClient::new(vec![draft, "PASS".to_string()]));
        let extractor = ClaimExtractor::new(client.clone());

        let claims = extractor.extract_claims("paper text").await;
        assert_eq!(client.call_count(), 2);
        assert_eq!(claims.len(), 1);
        // Severity enforcement runs even on accepted drafts.
        assert_eq!(claims[0]["epistemic_check"]["gap_severity"], json!("High"));
    }

    #[tokio::test]
    async fn failing_audit_makes_three_model_calls_and_keeps_the_refinement() {
        let draft = json!([{"claim_summary": "draft claim"}]).to_string();
        let refined = json!([{"claim_summary": "refined claim"}]).to_string();
        let client = Arc::new(ScriptedClient::new(vec![
            draft,
            "FAIL: missing population".to_string(),
            refined,
        ]));
        let extractor = ClaimExtractor::new(client.clone());

        let claims = extractor.extract_claims("paper text").await;
        assert_eq!(client.call_count(), 3);
        assert_eq!(claims.len(), 1);
        assert_eq!(claims[0]["claim_summary"], json!("refined claim"));
    }

    #[tokio::test]
    async fn unusable_draft_yields_no_claims() {
        let client = Arc::new(ScriptedClient::new(vec!["no json here".to_string()]));
        let extractor = ClaimExtractor::new(client.clone());
        let claims = extractor.extract_claims("paper text").await;
        assert!(claims.is_empty());
        // Draft produced "[]" which is empty, so no audit ran.
        assert_eq!(client.call_count(), 1);
    }
}
