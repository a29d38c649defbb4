//! Operator prompt on the controlling terminal.

use std::io::{self, BufRead, IsTerminal, Write};

use tracing::warn;

use crate::domain::ports::ApprovalChannel;

/// Asks on stderr and reads the answer from stdin.
///
/// Only `y` or `yes` (any case) approve. When stdin is not a terminal, or
/// reading fails, the question is declined.
#[derive(Debug, Clone, Copy, Default)]
pub struct ConsoleApprovalChannel;

impl ApprovalChannel for ConsoleApprovalChannel {
    fn ask(&self, question: &str) -> bool {
        let stdin = io::stdin();
        if !stdin.is_terminal() {
            warn!(question, "stdin is not a terminal; declining");
            return false;
        }

        let mut stderr = io::stderr().lock();
        if let Err(error) = write!(stderr, "{question}").and_then(|()| stderr.flush()) {
            warn!(%error, "failed to write approval prompt; declining");
            return false;
        }

        let mut answer = String::new();
        match stdin.lock().read_line(&mut answer) {
            Ok(_) => is_affirmative(&answer),
            Err(error) => {
                warn!(%error, "failed to read approval answer; declining");
                false
            }
        }
    }
}

pub(crate) fn is_affirmative(answer: &str) -> bool {
    matches!(answer.trim().to_ascii_lowercase().as_str(), "y" | "yes")
}

#[cfg(test)]
mod tests {
    use rstest::rstest;

    use super::*;

    #[rstest]
    #[case("y\n", true)]
    #[case("YES\r\n", true)]
    #[case("  yes  ", true)]
    #[case("n\n", false)]
    #[case("", false)]
    #[case("yep", false)]
    fn only_y_or_yes_approve(#[case] answer: &str, #[case] expected: bool) {
        assert_eq!(is_affirmative(answer), expected);
    }
}
