//! DNS-label sanitization for counter-set and inventory identifiers.

/// Longest label the API server accepts.
const MAX_LABEL_LEN: usize = 63;

/// Coerce `input` into a DNS-1123 label: lowercase, runs of anything outside
/// `[a-z0-9]` collapse to a single `-`, leading/trailing `-` trimmed, an
/// empty result becomes `gpu`, and the output is capped at 63 characters and
/// re-trimmed.
pub fn sanitize_dns_label(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    let mut pending_sep = false;
    for ch in input.chars() {
        let ch = ch.to_ascii_lowercase();
        if ch.is_ascii_lowercase() || ch.is_ascii_digit() {
            if pending_sep && !out.is_empty() {
                out.push('-');
            }
            pending_sep = false;
            out.push(ch);
        } else {
            pending_sep = true;
        }
    }
    if out.is_empty() {
        return "gpu".to_string();
    }
    if out.len() > MAX_LABEL_LEN {
        out.truncate(MAX_LABEL_LEN);
        while out.ends_with('-') {
            out.pop();
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_passthrough() {
        assert_eq!(sanitize_dns_label("a100-node-3"), "a100-node-3");
    }

    #[test]
    fn test_lowercases() {
        assert_eq!(sanitize_dns_label("GPU-A100"), "gpu-a100");
    }

    #[test]
    fn test_separator_runs_collapse() {
        assert_eq!(sanitize_dns_label("0000:3b:00.0"), "0000-3b-00-0");
        assert_eq!(sanitize_dns_label("a..__--b"), "a-b");
    }

    #[test]
    fn test_trims_leading_trailing_separators() {
        assert_eq!(sanitize_dns_label("--abc--"), "abc");
        assert_eq!(sanitize_dns_label(".a."), "a");
    }

    #[test]
    fn test_empty_and_all_separator_yield_gpu() {
        assert_eq!(sanitize_dns_label(""), "gpu");
        assert_eq!(sanitize_dns_label("---...___"), "gpu");
    }

    #[test]
    fn test_caps_at_63_and_retrims() {
        let long = "a".repeat(62) + "-b";
        let out = sanitize_dns_label(&long);
        assert_eq!(out.len(), 62);
        assert!(!out.ends_with('-'));
    }

    proptest! {
        #[test]
        fn prop_output_is_valid_dns_label(input in ".{0,200}") {
            let out = sanitize_dns_label(&input);
            prop_assert!(out.len() <= 63);
            prop_assert!(!out.is_empty());
            prop_assert!(out.chars().all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-'));
            prop_assert!(!out.starts_with('-'));
            prop_assert!(!out.ends_with('-'));
        }
    }
}
