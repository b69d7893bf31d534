//! Deterministic sentence splitter.
//!
//! Splits on a literal `.` with two protections: a dot adjacent to another
//! dot is part of an ellipsis run and never splits, and a dot between two
//! digits is a decimal point and never splits. Both protections need a look
//! at the neighbouring character, which the `regex` crate cannot express
//! without lookbehind, so this is a single pass over the characters.

/// Split `text` into trimmed, non-empty sentence-like units.
///
/// Pure and total: empty input yields an empty vector, and no output element
/// is empty or carries leading/trailing whitespace.
pub fn split_sentences(text: &str) -> Vec<String> {
    if text.is_empty() {
        return Vec::new();
    }

    let chars: Vec<char> = text.chars().collect();
    let mut sentences = Vec::new();
    let mut current = String::new();

    for (i, &c) in chars.iter().enumerate() {
        if c != '.' {
            current.push(c);
            continue;
        }
        let prev = i.checked_sub(1).map(|p| chars[p]);
        let next = chars.get(i + 1).copied();

        let in_ellipsis = prev == Some('.') || next == Some('.');
        let in_decimal = prev.is_some_and(|p| p.is_ascii_digit())
            && next.is_some_and(|n| n.is_ascii_digit());

        if in_ellipsis || in_decimal {
            current.push(c);
        } else {
            push_trimmed(&mut sentences, &current);
            current.clear();
        }
    }
    push_trimmed(&mut sentences, &current);
    sentences
}

fn push_trimmed(out: &mut Vec<String>, piece: &str) {
    let trimmed = piece.trim();
    if !trimmed.is_empty() {
        out.push(trimmed.to_string());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn splits_plain_sentences_and_trims() {
        let got = split_sentences(
            "We propose a simple daily habit loop. First, track one measurable action. Then review weekly.",
        );
        assert_eq!(
            got,
            vec![
                "We propose a simple daily habit loop",
                "First, track one measurable action",
                "Then review weekly",
            ]
        );
    }

    #[test]
    fn empty_input_yields_empty_sequence() {
        assert!(split_sentences("").is_empty());
        assert!(split_sentences("   ").is_empty());
        assert!(split_sentences("...").is_empty());
    }

    #[test]
    fn decimal_points_are_not_split_points() {
        let got = split_sentences("Pi is 3.14159. Euler's number is 2.71828.");
        assert_eq!(got, vec!["Pi is 3.14159", "Euler's number is 2.71828"]);
    }

    #[test]
    fn ellipsis_runs_are_protected() {
        let got = split_sentences("Well... maybe. Or not.");
        assert_eq!(got, vec!["Well... maybe", "Or not"]);

        // Longer delimiter runs never yield empty elements between them.
        let got = split_sentences("a..... b. c");
        assert_eq!(got, vec!["a..... b", "c"]);
    }

    #[test]
    fn never_produces_empty_or_untrimmed_elements() {
        let inputs = [
            ".. leading.  double spaces .trailing.",
            ". . . .",
            "x.y.z",
            "1.2.3 release. done",
        ];
        for input in inputs {
            for s in split_sentences(input) {
                assert!(!s.is_empty());
                assert_eq!(s, s.trim());
            }
        }
    }
}
