//! Evidentiary gate: parsing fact-check verdicts and deciding whether a
//! joint statement may be committed to memory.
//!
//! The verifier model is asked to answer in a `Status:` / `Evidence:`
//! layout. Parsing is forgiving about formatting but strict about
//! substance: a verified status with missing, trivial, or self-referential
//! evidence is downgraded to unsupported before anything reaches a memory
//! stream.

/// Outcome categories for a fact-checked statement.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VerificationStatus {
    /// Directly supported by quoted source material.
    Verified,
    /// Supported as a synthesis across sources.
    VerifiedSynthesis,
    /// Plausible but not evidenced; committed with a warning label.
    Hypothesis,
    /// Not supported; must not be committed.
    Unsupported,
    /// The verifier said something unrecognizable.
    Unknown,
}

impl VerificationStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            VerificationStatus::Verified => "VERIFIED",
            VerificationStatus::VerifiedSynthesis => "VERIFIED_SYNTHESIS",
            VerificationStatus::Hypothesis => "HYPOTHESIS",
            VerificationStatus::Unsupported => "UNSUPPORTED",
            VerificationStatus::Unknown => "UNKNOWN",
        }
    }
}

/// A parsed fact-check verdict.
#[derive(Debug, Clone, PartialEq)]
pub struct VerificationVerdict {
    pub status: VerificationStatus,
    pub evidence: String,
}

impl VerificationVerdict {
    /// Whether the gated statement may be written to memory at all.
    pub fn should_commit(&self) -> bool {
        self.status != VerificationStatus::Unsupported
    }

    /// Label prepended to the memory text for unevidenced statements.
    pub fn memory_prefix(&self) -> &'static str {
        match self.status {
            VerificationStatus::Hypothesis => "[HYPOTHESIS] ",
            _ => "",
        }
    }
}

/// Parse a verifier response into a verdict.
pub fn parse_verdict(text: &str) -> VerificationVerdict {
    let mut raw_status: Option<String> = None;
    let mut evidence_lines: Vec<String> = Vec::new();
    let mut capturing = false;

    for line in text.lines() {
        let trimmed = line.trim();
        if let Some(rest) = strip_label(trimmed, "Status:") {
            let cleaned = rest
                .trim()
                .to_uppercase()
                .replace(['[', ']', '.'], "")
                .trim()
                .to_string();
            raw_status = Some(cleaned);
            capturing = false;
        } else if let Some(rest) = strip_label(trimmed, "Evidence:") {
            capturing = true;
            let rest = rest.trim();
            if !rest.is_empty() {
                evidence_lines.push(rest.to_string());
            }
        } else if capturing {
            evidence_lines.push(line.to_string());
        }
    }

    let raw_status = raw_status.unwrap_or_else(|| fallback_status(text));
    let evidence = evidence_lines.join("\n").trim().to_string();

    // A pipe in the status means the model echoed the answer template
    // instead of choosing; treat as an unevidenced guess.
    let status = if raw_status.contains('|') {
        VerificationStatus::Hypothesis
    } else if raw_status.starts_with("VERIFIED") && raw_status.contains("SYNTHESIS") {
        VerificationStatus::VerifiedSynthesis
    } else if raw_status.starts_with("VERIFIED") {
        VerificationStatus::Verified
    } else if raw_status.contains("UNSUPPORTED") {
        VerificationStatus::Unsupported
    } else if raw_status.contains("HYPOTHESIS") {
        VerificationStatus::Hypothesis
    } else {
        VerificationStatus::Unknown
    };

    let status = apply_evidence_safeguards(status, &evidence);
    VerificationVerdict { status, evidence }
}

fn strip_label<'a>(line: &'a str, label: &str) -> Option<&'a str> {
    let lower = line.to_lowercase();
    if lower.starts_with(&label.to_lowercase()) {
        Some(&line[label.len()..])
    } else {
        None
    }
}

/// When no `Status:` line exists, look for a bare keyword anywhere in the
/// response. Longer tokens are matched first so VERIFIED does not shadow
/// VERIFIED_SYNTHESIS.
fn fallback_status(text: &str) -> String {
    let upper = text.to_uppercase();
    for keyword in ["VERIFIED_SYNTHESIS", "VERIFIED", "UNSUPPORTED", "HYPOTHESIS"] {
        if upper.contains(keyword) {
            return keyword.to_string();
        }
    }
    String::new()
}

/// Downgrade verified statuses whose evidence could not actually support
/// them. Evidence that points back at reflections or discussions is
/// circular: the agent would be citing its own prior conclusions.
fn apply_evidence_safeguards(
    status: VerificationStatus,
    evidence: &str,
) -> VerificationStatus {
    if !matches!(
        status,
        VerificationStatus::Verified | VerificationStatus::VerifiedSynthesis
    ) {
        return status;
    }
    let trimmed = evidence.trim();
    let lower = trimmed.to_lowercase();
    if trimmed.is_empty() || trimmed.len() < 10 || lower.ends_with("quotes:") {
        return VerificationStatus::Unsupported;
    }
    if lower.starts_with("reflection:")
        || lower.starts_with("discussion:")
        || lower.contains("based on the provided observations")
    {
        return VerificationStatus::Unsupported;
    }
    status
}
