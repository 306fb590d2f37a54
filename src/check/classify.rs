//! Verdict classification.

use crate::course::StudyStatus;

/// Map verifier output to a placeholder status.
///
/// Only output that is byte-for-byte equal to `sentinel` counts as solved.
/// Surrounding whitespace, a trailing newline or a different case all fail.
pub fn classify(output: &str, sentinel: &str) -> StudyStatus {
    if output == sentinel {
        StudyStatus::Solved
    } else {
        StudyStatus::Failed
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::TEST_OK;

    #[test]
    fn test_exact_sentinel() {
        assert_eq!(classify("OK", TEST_OK), StudyStatus::Solved);
    }

    #[test]
    fn test_everything_else_fails() {
        for output in ["", "OK\n", " OK", "ok", "OKAY", "Traceback (most recent call last)"] {
            assert_eq!(classify(output, TEST_OK), StudyStatus::Failed, "{output:?}");
        }
    }
}
