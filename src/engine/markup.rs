use std::sync::LazyLock;

use regex::Regex;

const STRONG_OPEN: &str = "<strong>";
const STRONG_CLOSE: &str = "</strong>";

static BOLD: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\*\*(.*?)\*\*").expect("bold pattern is valid"));

/// Turn `**span**` pairs into `<strong>` tags. Safe to reapply: converted text
/// contains no `**` pairs left to wrap.
pub fn embolden(text: &str) -> String {
    BOLD.replace_all(text, "<strong>$1</strong>").into_owned()
}

/// A run of text sharing one emphasis state.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Run<'a> {
    pub text: &'a str,
    pub strong: bool,
}

/// Split stored message markup into plain and strong runs for rendering.
/// Unbalanced tags are treated as plain text.
pub fn runs(text: &str) -> Vec<Run<'_>> {
    let mut out = Vec::new();
    let mut rest = text;
    while let Some(open) = rest.find(STRONG_OPEN) {
        let after_open = &rest[open + STRONG_OPEN.len()..];
        let Some(close) = after_open.find(STRONG_CLOSE) else {
            break;
        };
        if open > 0 {
            out.push(Run { text: &rest[..open], strong: false });
        }
        if close > 0 {
            out.push(Run { text: &after_open[..close], strong: true });
        }
        rest = &after_open[close + STRONG_CLOSE.len()..];
    }
    if !rest.is_empty() {
        out.push(Run { text: rest, strong: false });
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_embolden_pairs() {
        assert_eq!(
            embolden("my **chest** hurts **a lot**"),
            "my <strong>chest</strong> hurts <strong>a lot</strong>"
        );
    }

    #[test]
    fn test_embolden_is_idempotent() {
        let once = embolden("**Hb** 9.1 g/dL");
        assert_eq!(embolden(&once), once);
    }

    #[test]
    fn test_unmatched_asterisks_wait_for_their_pair() {
        let partial = embolden("**WBC");
        assert_eq!(partial, "**WBC");
        assert_eq!(embolden(&format!("{partial} 12k**")), "<strong>WBC 12k</strong>");
    }

    #[test]
    fn test_bold_does_not_span_lines() {
        assert_eq!(embolden("**a\nb**"), "**a\nb**");
    }

    #[test]
    fn test_runs_split_on_strong_tags() {
        let parsed = runs("BP <strong>90/60</strong>, HR 120");
        assert_eq!(
            parsed,
            vec![
                Run { text: "BP ", strong: false },
                Run { text: "90/60", strong: true },
                Run { text: ", HR 120", strong: false },
            ]
        );
    }

    #[test]
    fn test_runs_leave_unclosed_tag_as_plain() {
        let parsed = runs("a <strong>b");
        assert_eq!(parsed, vec![Run { text: "a <strong>b", strong: false }]);
    }
}
