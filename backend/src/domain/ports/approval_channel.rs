//! Port abstraction for operator approval of schema changes.
//!
//! Approval blocks until the channel answers. Channels used outside an
//! interactive session must decline rather than approve.

use std::collections::VecDeque;
use std::sync::Mutex;

use tracing::warn;

/// Driven port asking an operator a yes/no question.
#[cfg_attr(test, mockall::automock)]
pub trait ApprovalChannel: Send + Sync {
    /// Ask `question` and block until answered; `true` means approved.
    fn ask(&self, question: &str) -> bool;
}

/// Channel for unattended runs; declines every question.
#[derive(Debug, Clone, Copy, Default)]
pub struct NonInteractiveApprovalChannel;

impl ApprovalChannel for NonInteractiveApprovalChannel {
    fn ask(&self, question: &str) -> bool {
        warn!(question, "approval requested without an operator; declining");
        false
    }
}

/// Channel that approves everything; only wired when the operator opts in.
#[derive(Debug, Clone, Copy, Default)]
pub struct PreApprovedChannel;

impl ApprovalChannel for PreApprovedChannel {
    fn ask(&self, question: &str) -> bool {
        warn!(question, "approval granted in advance by the operator");
        true
    }
}

/// Channel replaying canned answers in order.
///
/// Once the answers run out every further question is declined. Questions
/// are recorded so tests can assert on the wording.
#[derive(Debug, Default)]
pub struct ScriptedApprovalChannel {
    answers: Mutex<VecDeque<bool>>,
    questions: Mutex<Vec<String>>,
}

impl ScriptedApprovalChannel {
    /// Channel replaying `answers`.
    pub fn new(answers: impl IntoIterator<Item = bool>) -> Self {
        Self {
            answers: Mutex::new(answers.into_iter().collect()),
            questions: Mutex::new(Vec::new()),
        }
    }

    /// Questions asked so far.
    pub fn questions(&self) -> Vec<String> {
        self.questions
            .lock()
            .map(|questions| questions.clone())
            .unwrap_or_default()
    }
}

impl ApprovalChannel for ScriptedApprovalChannel {
    fn ask(&self, question: &str) -> bool {
        if let Ok(mut questions) = self.questions.lock() {
            questions.push(question.to_owned());
        }
        self.answers
            .lock()
            .ok()
            .and_then(|mut answers| answers.pop_front())
            .unwrap_or(false)
    }
}
