//! Draft/audit/refine self-correction for generative tasks.
//!
//! Several content generators share the same shape: produce a draft, have
//! the model audit it against a checklist, and refine once if the audit
//! objects. The state machine is implemented here exactly once and
//! parameterized by the three steps plus a pass predicate, bounding every
//! task at three model calls.

use log::{debug, warn};
use std::future::Future;

/// Token an audit emits when the draft needs no correction.
pub const PASS_TOKEN: &str = "PASS";

/// Default pass predicate: the critique contains the pass token.
pub fn critique_passes(critique: &str) -> bool {
    critique.contains(PASS_TOKEN)
}

/// Where a generation attempt ended up.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AttemptStatus {
    /// The draft step produced nothing usable; no audit ran.
    Drafted,
    /// Audited but not yet resolved (internal transition).
    Audited,
    /// The draft passed the audit and is final.
    Accepted,
    /// The audit objected; the single refinement is final.
    Refined,
}

/// Outcome of one protocol invocation. `final_output` is defined exactly
/// once; `None` means the caller should substitute its declared empty
/// value.
#[derive(Debug, Clone, PartialEq)]
pub struct GenerationAttempt {
    /// First model output, possibly empty.
    pub draft: String,
    /// Audit critique, when one was produced.
    pub critique: Option<String>,
    /// Terminal status.
    pub status: AttemptStatus,
    /// Final output; the draft if accepted, else the refined text.
    pub final_output: Option<String>,
}

/// Run the draft → audit → conditional-refine state machine.
///
/// Refinement happens at most once and is never re-audited: the refined
/// output is final regardless of its own quality. An empty or failed audit
/// is treated as a pass so a usable draft is not discarded just because
/// the secondary check was unavailable.
pub async fn self_correct<D, FD, A, FA, R, FR, P>(
    draft_fn: D,
    audit_fn: A,
    refine_fn: R,
    is_pass: P,
) -> GenerationAttempt
where
    D: FnOnce() -> FD,
    FD: Future<Output = Option<String>>,
    A: FnOnce(String) -> FA,
    FA: Future<Output = Option<String>>,
    R: FnOnce(String, String) -> FR,
    FR: Future<Output = Option<String>>,
    P: Fn(&str) -> bool,
{
    let draft = draft_fn().await.unwrap_or_default();
    if draft.trim().is_empty() {
        warn!("draft step produced no output, yielding empty result");
        return GenerationAttempt {
            draft,
            critique: None,
            status: AttemptStatus::Drafted,
            final_output: None,
        };
    }

    let critique = audit_fn(draft.clone()).await.filter(|c| !c.trim().is_empty());
    let Some(critique) = critique else {
        debug!("audit unavailable, accepting draft");
        return GenerationAttempt {
            final_output: Some(draft.clone()),
            draft,
            critique: None,
            status: AttemptStatus::Accepted,
        };
    };

    if is_pass(&critique) {
        return GenerationAttempt {
            final_output: Some(draft.clone()),
            draft,
            critique: Some(critique),
            status: AttemptStatus::Accepted,
        };
    }

    debug!("audit objected, refining once: {critique}");
    let refined = refine_fn(draft.clone(), critique.clone())
        .await
        .unwrap_or_default();
    GenerationAttempt {
        draft,
        critique: Some(critique),
        status: AttemptStatus::Refined,
        final_output: Some(refined),
    }
}

#[cfg(test)]
mod tests {
    use super::{AttemptStatus, critique_passes, self_correct};
    use pretty_assertions::assert_eq;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[tokio::test]
    async fn passing_audit_accepts_the_draft_without_refining() {
        let refines = AtomicUsize::new(0);
        let attempt = self_correct(
            || async { Some("draft text".to_string()) },
            |_draft| async { Some("PASS".to_string()) },
            |_draft, _critique| async {
                refines.fetch_add(1, Ordering::SeqCst);
                Some("never".to_string())
            },
            critique_passes,
        )
        .await;

        assert_eq!(attempt.status, AttemptStatus::Accepted);
        assert_eq!(attempt.final_output.as_deref(), Some("draft text"));
        assert_eq!(refines.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn failing_audit_refines_exactly_once() {
        let refines = AtomicUsize::new(0);
        let refines = &refines;
        let attempt = self_correct(
            || async { Some("flawed draft".to_string()) },
            |_draft| async { Some("FAIL: inconsistent design field".to_string()) },
            |draft, critique| async move {
                refines.fetch_add(1, Ordering::SeqCst);
                assert_eq!(draft, "flawed draft");
                assert!(critique.starts_with("FAIL"));
                // Still flawed; accepted unconditionally anyway.
                Some("refined but imperfect".to_string())
            },
            critique_passes,
        )
        .await;

        assert_eq!(attempt.status, AttemptStatus::Refined);
        assert_eq!(attempt.final_output.as_deref(), Some("refined but imperfect"));
        assert_eq!(refines.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn empty_draft_short_circuits() {
        let audits = AtomicUsize::new(0);
        let attempt = self_correct(
            || async { None },
            |_draft| async {
                audits.fetch_add(1, Ordering::SeqCst);
                Some("PASS".to_string())
            },
            |_draft, _critique| async { None },
            critique_passes,
        )
        .await;

        assert_eq!(attempt.status, AttemptStatus::Drafted);
        assert_eq!(attempt.final_output, None);
        assert_eq!(audits.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn missing_audit_fails_open() {
        let attempt = self_correct(
            || async { Some("usable draft".to_string()) },
            |_draft| async { None },
            |_draft, _critique| async { Some("never".to_string()) },
            critique_passes,
        )
        .await;

        assert_eq!(attempt.status, AttemptStatus::Accepted);
        assert_eq!(attempt.final_output.as_deref(), Some("usable draft"));
    }
}
