use dashmap::DashMap;

/// A user decision on a pending tool call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ApprovalDecision {
    Approved,
    Rejected { reason: String },
}

/// In-flight approval decisions keyed by `call_id`.
///
/// Written by whatever surface collects the user's decision (chat reaction,
/// REPL prompt); read once by the turn loop when it resumes. Thread-safe.
#[derive(Default)]
pub struct ApprovalCache {
    decisions: DashMap<String, ApprovalDecision>,
}

impl ApprovalCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn approve(&self, call_id: &str) {
        self.decisions
            .insert(call_id.to_string(), ApprovalDecision::Approved);
    }

    pub fn reject(&self, call_id: &str, reason: impl Into<String>) {
        self.decisions.insert(
            call_id.to_string(),
            ApprovalDecision::Rejected {
                reason: reason.into(),
            },
        );
    }

    /// Consume the decision for a call, if one was recorded.
    pub fn take(&self, call_id: &str) -> Option<ApprovalDecision> {
        self.decisions.remove(call_id).map(|(_, d)| d)
    }
}
