use serde::{Deserialize, Serialize};

use super::state::SessionState;

/// Inputs accepted as approval, compared after trimming and lowercasing
pub const ACCEPT_TOKENS: [&str; 5] = ["approve", "yes", "ok", "good", "accept"];

pub const FEEDBACK_PROMPT: &str = "Please provide feedback: Type 'approve'/'yes' to accept, \
or provide specific feedback for revision";

pub const NO_FEEDBACK_PROVIDED: &str = "No feedback provided. Please revise.";

/// What a suspended session shows to its reviewer
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SuspendPayload {
    pub current_draft: String,
    pub prompt: String,
}

impl SuspendPayload {
    pub fn for_state(state: &SessionState) -> Self {
        Self {
            current_draft: state.draft_content.clone(),
            prompt: FEEDBACK_PROMPT.to_string(),
        }
    }
}

/// Reviewer decision derived from a resume value
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FeedbackDecision {
    Approved,
    Revise { feedback: String },
    Missing,
}

impl FeedbackDecision {
    pub fn from_input(input: &str) -> Self {
        let normalized = input.trim().to_lowercase();
        if normalized.is_empty() {
            FeedbackDecision::Missing
        } else if ACCEPT_TOKENS.contains(&normalized.as_str()) {
            FeedbackDecision::Approved
        } else {
            FeedbackDecision::Revise {
                feedback: input.to_string(),
            }
        }
    }

    pub fn is_approval(&self) -> bool {
        matches!(self, FeedbackDecision::Approved)
    }

    /// Merge the decision into the session. Messages and draft stay untouched.
    pub fn apply(&self, state: &mut SessionState) {
        match self {
            FeedbackDecision::Approved => {
                state.approved = true;
                state.feedback.clear();
            }
            FeedbackDecision::Revise { feedback } => {
                state.approved = false;
                state.feedback = feedback.clone();
            }
            FeedbackDecision::Missing => {
                state.approved = false;
                state.feedback = NO_FEEDBACK_PROVIDED.to_string();
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accept_tokens_ignore_case_and_whitespace() {
        for input in ["Approve", " yes ", "OK", "good\n", "\tACCEPT"] {
            assert_eq!(FeedbackDecision::from_input(input), FeedbackDecision::Approved, "{input:?}");
        }
    }

    #[test]
    fn other_text_keeps_raw_input() {
        let decision = FeedbackDecision::from_input("  Make it shorter ");
        assert_eq!(
            decision,
            FeedbackDecision::Revise {
                feedback: "  Make it shorter ".to_string()
            }
        );
        // token must match the whole input
        assert!(!FeedbackDecision::from_input("yes but shorter").is_approval());
    }

    #[test]
    fn empty_input_requests_generic_revision() {
        let mut state = SessionState::new("post");
        FeedbackDecision::from_input("   ").apply(&mut state);
        assert!(!state.approved);
        assert_eq!(state.feedback, NO_FEEDBACK_PROVIDED);
    }

    #[test]
    fn approval_clears_feedback_and_keeps_draft() {
        let mut state = SessionState::new("post");
        state.draft_content = "Draft".to_string();
        state.feedback = "old feedback".to_string();
        let messages_before = state.messages.clone();

        FeedbackDecision::Approved.apply(&mut state);

        assert!(state.approved);
        assert!(state.feedback.is_empty());
        assert_eq!(state.draft_content, "Draft");
        assert_eq!(state.messages, messages_before);
    }

    #[test]
    fn payload_carries_draft_and_prompt() {
        let mut state = SessionState::new("post");
        state.draft_content = "Draft v1".to_string();
        let payload = SuspendPayload::for_state(&state);
        assert_eq!(payload.current_draft, "Draft v1");
        assert!(payload.prompt.starts_with("Please provide feedback"));
    }
}
