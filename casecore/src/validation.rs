//! Shared validation predicates for domain types.
//!
//! This module contains validation functions used by nutype-based domain types
//! across the casecore crate.

/// Validation predicate: reject glob metacharacters.
///
/// Stream identifiers reserve `*`, `?`, `[` and `]` so that stream patterns can
/// be introduced later without escaping rules.
pub(crate) fn no_glob_metacharacters(s: &str) -> bool {
    !s.contains(['*', '?', '[', ']'])
}

/// Validation predicate: dotted command names such as `progression.remove-case`.
///
/// Segments are separated by single dots and contain lowercase ASCII letters,
/// digits or dashes.
pub(crate) fn is_dotted_command_name(s: &str) -> bool {
    s.split('.').all(|segment| {
        !segment.is_empty()
            && segment
                .chars()
                .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-')
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    /// Property: Any string without glob metacharacters passes validation.
    #[test]
    fn strings_without_metacharacters_pass_validation() {
        proptest!(|(s in "[^*?\\[\\]]*")| {
            prop_assert!(
                no_glob_metacharacters(&s),
                "String without metacharacters should pass: {:?}",
                s
            );
        });
    }

    /// Property: Any string containing at least one glob metacharacter fails validation.
    ///
    /// The metacharacter is placed at an arbitrary position (including first
    /// and last) within a string of safe characters.
    #[test]
    fn strings_with_metacharacters_fail_validation() {
        let safe_chars = "[^*?\\[\\]]*";
        let metachar = prop_oneof![Just('*'), Just('?'), Just('['), Just(']')];

        let strategy = (safe_chars, metachar, safe_chars)
            .prop_map(|(prefix, mc, suffix)| format!("{prefix}{mc}{suffix}"));

        proptest!(|(s in strategy)| {
            prop_assert!(
                !no_glob_metacharacters(&s),
                "String with metacharacter should fail: {:?}",
                s
            );
        });
    }

    #[test]
    fn dotted_command_names() {
        assert!(is_dotted_command_name("progression.command.remove-case-from-group-cases"));
        assert!(is_dotted_command_name("hearing"));
        assert!(!is_dotted_command_name("progression..command"));
        assert!(!is_dotted_command_name(".progression"));
        assert!(!is_dotted_command_name("Progression.Command"));
        assert!(!is_dotted_command_name("progression command"));
    }
}
