//! The researcher agent: paper perception, reflection, and gated
//! discussion.

use chrono::{DateTime, Utc};
use log::{debug, info, warn};
use regex::Regex;
use serde_json::{Value, json};
use std::sync::Arc;

use colloquy_llm::GenerativeClient;
use colloquy_memory::{MemoryRecord, MemoryStream};

use crate::citation::{Citation, Paper, reference_entry};
use crate::claims::ClaimExtractor;
use crate::state::StateStore;
use crate::verdict::{VerificationVerdict, parse_verdict};

/// State keys shared by all agents.
pub const BIBLIOGRAPHY_KEY: &str = "bibliography";
pub const KNOWLEDGE_GRAPH_KEY: &str = "knowledge_graph";
pub const DISCUSSIONS_KEY: &str = "discussions";

/// Result of one pairwise discussion that produced output.
#[derive(Debug, Clone)]
pub struct DiscussionOutcome {
    pub transcript: String,
    pub joint_statement: String,
    pub verdict: VerificationVerdict,
}

/// One research agent with a persona, a private memory stream, and a
/// handle on the shared state documents.
pub struct Researcher {
    name: String,
    persona: String,
    topic: String,
    llm: Arc<dyn GenerativeClient>,
    memory: MemoryStream,
    state: Arc<dyn StateStore>,
    claims: Option<ClaimExtractor>,
}

impl Researcher {
    pub fn new(
        name: impl Into<String>,
        persona: impl Into<String>,
        topic: impl Into<String>,
        llm: Arc<dyn GenerativeClient>,
        memory: MemoryStream,
        state: Arc<dyn StateStore>,
    ) -> Self {
        Self {
            name: name.into(),
            persona: persona.into(),
            topic: topic.into(),
            llm,
            memory,
            state,
            claims: None,
        }
    }

    /// Enable structured claim extraction during perception.
    pub fn with_claim_extraction(mut self) -> Self {
        self.claims = Some(ClaimExtractor::new(self.llm.clone()));
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn memory(&self) -> &MemoryStream {
        &self.memory
    }

    fn persona_system(&self) -> String {
        format!(
            "You are {}, a researcher studying {}. {}",
            self.name, self.topic, self.persona
        )
    }

    /// Read one paper: gate on relevance, summarize, update the shared
    /// bibliography, store the summary and supporting quotes as memories,
    /// and extract claims when enabled.
    pub async fn perceive_paper(&self, paper: &Paper, time: DateTime<Utc>) {
        if paper.title.trim().is_empty() {
            debug!("[{}] skipping untitled paper", self.name);
            return;
        }

        if !self.is_relevant(paper).await {
            info!("[{}] skipping off-topic paper: {}", self.name, paper.title);
            return;
        }

        let perception = self.summarize(paper).await;
        let (summary, quotes) = parse_perception(&perception);
        if summary.is_empty() {
            warn!("[{}] no usable summary for: {}", self.name, paper.title);
            return;
        }

        let citation = Citation::from_paper(paper);
        self.update_bibliography(paper, &citation).await;

        let memory_text = format!(
            "[{citation}] Read paper '{}': {summary}",
            paper.title
        );
        self.memory.add_memory(&memory_text, time).await;
        for quote in &quotes {
            let quote_text = format!("[{citation}] Quote: \"{quote}\"");
            self.memory.add_memory(&quote_text, time).await;
        }

        if let Some(extractor) = &self.claims {
            self.extract_and_graph(extractor, paper, &citation).await;
        }
    }

    async fn is_relevant(&self, paper: &Paper) -> bool {
        let prompt = format!(
            "Is the following paper relevant to research on {}? Answer YES or NO.\n\n\
             Title: {}\nAbstract: {}",
            self.topic, paper.title, paper.abstract_text
        );
        let answer = match self.llm.generate(&self.persona_system(), &prompt, 0.0).await {
            Ok(text) => text,
            Err(err) => {
                warn!("[{}] relevance check failed, assuming relevant: {err}", self.name);
                String::new()
            }
        };
        // Only an unambiguous NO filters the paper out.
        let upper = answer.to_uppercase();
        !(upper.contains("NO") && !upper.contains("YES"))
    }

    async fn summarize(&self, paper: &Paper) -> String {
        let prompt = format!(
            "Read the paper below and respond in exactly this layout:\n\
             Summary: <2-3 sentences on findings relevant to {}>\n\
             Quotes: <up to 3 short verbatim quotes, each in double quotes>\n\
             Themes: <comma-separated themes>\n\n\
             Title: {}\nAbstract: {}\n\n{}",
            self.topic,
            paper.title,
            paper.abstract_text,
            paper.sections_text()
        );
        match self.llm.generate(&self.persona_system(), &prompt, 0.7).await {
            Ok(text) => text,
            Err(err) => {
                warn!("[{}] summarization failed: {err}", self.name);
                String::new()
            }
        }
    }

    /// Update-or-append this paper in the shared bibliography, keeping
    /// entry numbers sequential.
    async fn update_bibliography(&self, paper: &Paper, citation: &Citation) {
        let citation_text = citation.to_string();
        let reference = reference_entry(paper);
        let result = self
            .state
            .update(
                BIBLIOGRAPHY_KEY,
                Box::new(move |current| {
                    let mut entries = match current {
                        Value::Array(entries) => entries,
                        _ => Vec::new(),
                    };
                    let existing = entries.iter_mut().find(|entry| {
                        entry.get("citation").and_then(Value::as_str) == Some(&citation_text)
                    });
                    match existing {
                        Some(entry) => {
                            entry["reference"] = json!(reference);
                        }
                        None => entries.push(json!({
                            "number": 0,
                            "citation": citation_text,
                            "reference": reference,
                        })),
                    }
                    for (i, entry) in entries.iter_mut().enumerate() {
                        entry["number"] = json!(i + 1);
                    }
                    Value::Array(entries)
                }),
            )
            .await;
        if let Err(err) = result {
            warn!("[{}] bibliography update failed: {err}", self.name);
        }
    }

    async fn extract_and_graph(
        &self,
        extractor: &ClaimExtractor,
        paper: &Paper,
        citation: &Citation,
    ) {
        let analysis_text = format!(
            "### STUDY IDENTIFICATION ###\nTitle: {}\nCitation: {}\n\n\
             ### ABSTRACT ###\n{}\n\n{}",
            paper.title,
            citation,
            paper.abstract_text,
            paper.sections_text()
        );
        let mut claims = extractor.extract_claims(&analysis_text).await;
        if claims.is_empty() {
            return;
        }
        // Provenance comes from the paper record, never from the model.
        for claim in &mut claims {
            if let Some(object) = claim.as_object_mut() {
                object.insert("study_title".to_string(), json!(paper.title));
                object.insert("study_citation".to_string(), json!(citation.to_string()));
            }
        }

        let name = self.name.clone();
        let result = self
            .state
            .update(
                KNOWLEDGE_GRAPH_KEY,
                Box::new(move |current| {
                    let mut graph = match current {
                        Value::Array(graph) => graph,
                        _ => Vec::new(),
                    };
                    for claim in claims {
                        let title = claim_key(&claim, "study_title");
                        let summary = claim_key(&claim, "claim_summary");
                        let duplicate = graph.iter().any(|existing| {
                            claim_key(existing, "study_title") == title
                                && claim_key(existing, "claim_summary") == summary
                        });
                        if !duplicate {
                            graph.push(claim);
                        } else {
                            debug!("[{name}] dropping duplicate claim: {summary}");
                        }
                    }
                    Value::Array(graph)
                }),
            )
            .await;
        if let Err(err) = result {
            warn!("[{}] knowledge graph update failed: {err}", self.name);
        }
    }

    /// Synthesize an insight from recent plus semantically related
    /// memories. Returns the insight text, or an empty string when there
    /// was nothing to reflect on.
    pub async fn reflect(&self, time: DateTime<Utc>) -> String {
        let recent = self.memory.get_recent(5);
        if recent.is_empty() {
            debug!("[{}] nothing to reflect on", self.name);
            return String::new();
        }

        let seed = joined_descriptions(&recent);
        let related: Vec<MemoryRecord> = self
            .memory
            .retrieve(&seed, time, 10)
            .await
            .into_iter()
            .filter(|record| !recent.iter().any(|r| r.description == record.description))
            .take(3)
            .collect();

        let mut context = joined_descriptions(&recent);
        if !related.is_empty() {
            context.push('\n');
            context.push_str(&joined_descriptions(&related));
        }

        let prompt = format!(
            "Based on your recent observations below, state one non-obvious \
             insight about {} in 1-2 sentences.\n\nOBSERVATIONS:\n{context}",
            self.topic
        );
        let insight = match self.llm.generate(&self.persona_system(), &prompt, 0.7).await {
            Ok(text) => text.trim().to_string(),
            Err(err) => {
                warn!("[{}] reflection failed: {err}", self.name);
                String::new()
            }
        };
        if insight.is_empty() {
            return String::new();
        }

        self.memory
            .add_memory(&format!("Reflection: {insight}"), time)
            .await;
        insight
    }

    /// Hold a structured discussion with another agent. The joint
    /// statement is fact-checked against both agents' memories before
    /// anything is committed: unsupported statements are discarded,
    /// unevidenced ones labeled.
    pub async fn discuss_with(
        &self,
        other: &Researcher,
        time: DateTime<Utc>,
        my_reflection: &str,
        their_reflection: &str,
    ) -> Option<DiscussionOutcome> {
        let my_recent = self.memory.get_recent(5);
        let their_recent = other.memory.get_recent(5);
        if my_recent.is_empty()
            && their_recent.is_empty()
            && my_reflection.is_empty()
            && their_reflection.is_empty()
        {
            debug!("[{}] no material for discussion with {}", self.name, other.name);
            return None;
        }

        let seed = format!(
            "{}\n{}",
            joined_descriptions(&my_recent),
            joined_descriptions(&their_recent)
        );
        let mut my_context = self.discussion_context(&my_recent, &seed, time).await;
        if !my_reflection.is_empty() {
            my_context = format!("Reflection: {my_reflection}\n{my_context}");
        }
        let mut their_context = other.discussion_context(&their_recent, &seed, time).await;
        if !their_reflection.is_empty() {
            their_context = format!("Reflection: {their_reflection}\n{their_context}");
        }

        let opening_prompt = format!(
            "You are discussing {} with {}. Based on your observations below, \
             state your current position in 2-3 sentences.\n\n\
             YOUR OBSERVATIONS:\n{my_context}",
            self.topic, other.name
        );
        let opening = self
            .generate_or_empty(&self.persona_system(), &opening_prompt, 0.7)
            .await;
        if opening.is_empty() {
            return None;
        }

        let rebuttal_prompt = format!(
            "{} has stated this position:\n{opening}\n\n\
             Based on your own observations below, critique or extend it in \
             2-3 sentences.\n\nYOUR OBSERVATIONS:\n{their_context}",
            self.name
        );
        let rebuttal = self
            .generate_or_empty(&other.persona_system(), &rebuttal_prompt, 0.7)
            .await;

        let resolution_prompt = format!(
            "Two researchers discussed {}.\n\n{} said:\n{opening}\n\n{} said:\n{rebuttal}\n\n\
             Write a resolution ending with a single line starting with \
             'Joint Statement:' that both would endorse.",
            self.topic, self.name, other.name
        );
        let resolution = self
            .generate_or_empty(&self.persona_system(), &resolution_prompt, 0.7)
            .await;

        let transcript = format!(
            "{}: {opening}\n{}: {rebuttal}\n{resolution}",
            self.name, other.name
        );
        let joint_statement = resolution
            .split("Joint Statement:")
            .nth(1)
            .map(|rest| rest.trim().to_string())
            .unwrap_or_else(|| resolution.trim().to_string());
        if joint_statement.is_empty() {
            return None;
        }

        let verdict = self
            .fact_check(&joint_statement, &my_context, &their_context)
            .await;
        info!(
            "[{}] discussion with {} fact-checked as {}",
            self.name,
            other.name,
            verdict.status.as_str()
        );

        if verdict.should_commit() {
            // The full resolution text is what both agents remember; the
            // extracted joint statement only feeds the gate and the log.
            let memory_text = format!(
                "{}Discussion ({} vs {}): {}",
                verdict.memory_prefix(),
                self.name,
                other.name,
                resolution.trim()
            );
            self.memory.add_memory(&memory_text, time).await;
            other.memory.add_memory(&memory_text, time).await;
            self.record_discussion(other, &transcript, &joint_statement, &verdict, time)
                .await;
        } else {
            info!("[{}] discarding unsupported joint statement", self.name);
        }

        Some(DiscussionOutcome {
            transcript,
            joint_statement,
            verdict,
        })
    }

    /// Recent memories plus up to 3 semantically related older ones.
    async fn discussion_context(
        &self,
        recent: &[MemoryRecord],
        seed: &str,
        time: DateTime<Utc>,
    ) -> String {
        let related: Vec<MemoryRecord> = self
            .memory
            .retrieve(seed, time, 10)
            .await
            .into_iter()
            .filter(|record| !recent.iter().any(|r| r.description == record.description))
            .take(3)
            .collect();
        let mut context = joined_descriptions(recent);
        if !related.is_empty() {
            context.push('\n');
            context.push_str(&joined_descriptions(&related));
        }
        context
    }

    async fn fact_check(
        &self,
        joint_statement: &str,
        my_context: &str,
        their_context: &str,
    ) -> VerificationVerdict {
        let prompt = format!(
            "Fact-check the joint statement against the evidence base below. \
             Respond in exactly this layout:\n\
             Status: VERIFIED or VERIFIED_SYNTHESIS or HYPOTHESIS or UNSUPPORTED\n\
             Evidence: <the verbatim supporting quotes, or empty if none>\n\n\
             JOINT STATEMENT:\n{joint_statement}\n\n\
             EVIDENCE BASE:\n{my_context}\n{their_context}"
        );
        let system = "You are a strict fact-checker. You only mark a statement \
                      VERIFIED when the evidence base contains direct support for it.";
        match self.llm.generate(system, &prompt, 0.0).await {
            Ok(text) => parse_verdict(&text),
            Err(err) => {
                warn!("[{}] fact check failed: {err}", self.name);
                parse_verdict("")
            }
        }
    }

    async fn record_discussion(
        &self,
        other: &Researcher,
        transcript: &str,
        joint_statement: &str,
        verdict: &VerificationVerdict,
        time: DateTime<Utc>,
    ) {
        let entry = json!({
            "date": time.to_rfc3339(),
            "participants": [self.name, other.name],
            "full_transcript": transcript,
            "joint_statement": joint_statement,
            "fact_check_status": verdict.status.as_str(),
        });
        let result = self
            .state
            .update(
                DISCUSSIONS_KEY,
                Box::new(move |current| {
                    let mut log = match current {
                        Value::Array(log) => log,
                        _ => Vec::new(),
                    };
                    log.push(entry);
                    Value::Array(log)
                }),
            )
            .await;
        if let Err(err) = result {
            warn!("[{}] discussion log update failed: {err}", self.name);
        }
    }

    /// Summarize the open gaps this agent has accumulated. Large memory
    /// sets are condensed chunk by chunk before the final synthesis.
    pub async fn gap_analysis(&self, time: DateTime<Utc>) -> String {
        let query = format!("limitations gaps missing research {}", self.topic);
        let memories = self.memory.retrieve(&query, time, 50).await;
        if memories.is_empty() {
            return String::new();
        }

        let context = if memories.len() > 10 {
            let mut condensed = Vec::new();
            for chunk in memories.chunks(10) {
                let prompt = format!(
                    "Condense the research observations below into the 2-3 most \
                     important open gaps.\n\n{}",
                    joined_descriptions(chunk)
                );
                let summary = self
                    .generate_or_empty(&self.persona_system(), &prompt, 0.0)
                    .await;
                if !summary.is_empty() {
                    condensed.push(summary);
                }
            }
            condensed.join("\n")
        } else {
            joined_descriptions(&memories)
        };

        let prompt = format!(
            "Based on the observations below, write a gap analysis for research \
             on {}: what is missing, contradictory, or methodologically weak.\n\n\
             OBSERVATIONS:\n{context}",
            self.topic
        );
        self.generate_or_empty(&self.persona_system(), &prompt, 0.7)
            .await
    }

    async fn generate_or_empty(&self, system: &str, prompt: &str, temperature: f32) -> String {
        match self.llm.generate(system, prompt, temperature).await {
            Ok(text) => text.trim().to_string(),
            Err(err) => {
                warn!("[{}] generation failed: {err}", self.name);
                String::new()
            }
        }
    }
}

fn joined_descriptions(records: &[MemoryRecord]) -> String {
    records
        .iter()
        .map(|record| format!("- {}", record.description))
        .collect::<Vec<_>>()
        .join("\n")
}

fn claim_key(claim: &Value, field: &str) -> String {
    claim
        .get(field)
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_lowercase()
}

/// Split a perception response into its summary and verbatim quotes.
/// Everything after `Themes:` is dropped; quotes are taken from double
/// quotes when present, otherwise from bulleted lines.
fn parse_perception(text: &str) -> (String, Vec<String>) {
    let before_themes = text.split("Themes:").next().unwrap_or(text);
    let mut parts = before_themes.splitn(2, "Quotes:");
    let summary_part = parts.next().unwrap_or("").trim();
    let summary = summary_part
        .strip_prefix("Summary:")
        .unwrap_or(summary_part)
        .trim()
        .to_string();
    let quotes_part = parts.next().unwrap_or("");

    let quote_re = Regex::new("\"([^\"]+)\"").unwrap();
    let mut quotes: Vec<String> = quote_re
        .captures_iter(quotes_part)
        .map(|captures| captures[1].to_string())
        .collect();
    if quotes.is_empty() {
        quotes = quotes_part
            .lines()
            .map(|line| {
                line.trim()
                    .trim_start_matches(['-', '*', '[', ']'])
                    .trim()
                    .to_string()
            })
            .collect();
    }
    quotes.retain(|quote| {
        quote.len() > 2 && !quote.to_lowercase().contains("not directly related")
    });
    (summary, quotes)
}

#[cfg(test)]
mod tests {
    use super::parse_perception;
    use pretty_assertions::assert_eq;

    #[test]
    fn layout_with_quotes_and_themes() {
        let text = "Summary: Sodium reduction lowered blood pressure.\n\
                    Quotes: \"BP fell by 5 mmHg\" and \"effects persisted at 6 months\"\n\
                    Themes: sodium, hypertension";
        let (summary, quotes) = parse_perception(text);
        assert_eq!(summary, "Sodium reduction lowered blood pressure.");
        assert_eq!(quotes, vec!["BP fell by 5 mmHg", "effects persisted at 6 months"]);
    }

    #[test]
    fn summary_only_response() {
        let (summary, quotes) = parse_perception("Summary: A plain finding.");
        assert_eq!(summary, "A plain finding.");
        assert!(quotes.is_empty());
    }

    #[test]
    fn bulleted_quotes_without_double_quotes() {
        let text = "Summary: Finding.\nQuotes:\n- first quoted line\n- second quoted line";
        let (_, quotes) = parse_perception(text);
        assert_eq!(quotes, vec!["first quoted line", "second quoted line"]);
    }

    #[test]
    fn irrelevant_quote_markers_are_dropped() {
        let text = "Summary: Finding.\nQuotes: \"Not directly related to the topic\"";
        let (_, quotes) = parse_perception(text);
        assert!(quotes.is_empty());
    }

    #[test]
    fn unlabeled_response_is_all_summary() {
        let (summary, quotes) = parse_perception("Just some prose without labels.");
        assert_eq!(summary, "Just some prose without labels.");
        assert!(quotes.is_empty());
    }
}
