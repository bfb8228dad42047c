//! Completion marker detection.

/// Literal the external tool prints once it judges the task finished.
pub const COMPLETION_MARKER: &str = "<promise>COMPLETE</promise>";

/// True iff `output` contains the exact completion marker (case and whitespace sensitive).
pub fn is_complete(output: &str) -> bool {
    output.contains(COMPLETION_MARKER)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn detects_marker_anywhere_in_output() {
        assert!(is_complete(COMPLETION_MARKER));
        assert!(is_complete(
            "updated progress.txt\nall stories pass\n<promise>COMPLETE</promise>\n"
        ));
        assert!(is_complete("prefix<promise>COMPLETE</promise>suffix"));
    }

    #[test]
    fn rejects_near_matches() {
        assert!(!is_complete(""));
        assert!(!is_complete("<promise>complete</promise>"));
        assert!(!is_complete("<PROMISE>COMPLETE</PROMISE>"));
        assert!(!is_complete("<promise> COMPLETE </promise>"));
        assert!(!is_complete("<promise>COMPLETE"));
        assert!(!is_complete("COMPLETE"));
    }
}
