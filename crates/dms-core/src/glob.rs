//! Task-name wildcard matching.
//!
//! Names are flat identifiers, so there is no path-separator handling: `*`
//! matches any run of characters (including none) and `?` matches exactly
//! one. `[` is treated as a pattern marker by [`is_pattern`] but matches
//! itself literally; character classes are not supported.

const METACHARS: [char; 3] = ['*', '?', '['];

pub fn is_pattern(input: &str) -> bool {
    input.contains(METACHARS)
}

/// Iterative match with a single star bookmark. On a mismatch after a `*`,
/// the star absorbs one more character and matching resumes from there.
pub fn matches(pattern: &str, text: &str) -> bool {
    let pattern: Vec<char> = pattern.chars().collect();
    let text: Vec<char> = text.chars().collect();

    let mut p = 0;
    let mut t = 0;
    let mut star_idx: Option<usize> = None;
    let mut match_idx = 0;

    while t < text.len() {
        if p < pattern.len() && pattern[p] == '*' {
            star_idx = Some(p);
            match_idx = t;
            p += 1;
        } else if p < pattern.len() && (pattern[p] == '?' || pattern[p] == text[t]) {
            p += 1;
            t += 1;
        } else if let Some(star) = star_idx {
            p = star + 1;
            match_idx += 1;
            t = match_idx;
        } else {
            return false;
        }
    }

    while p < pattern.len() && pattern[p] == '*' {
        p += 1;
    }

    p == pattern.len()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn star_matches_everything() {
        for text in ["", "a", "prod-db", "with spaces", "ünïcode"] {
            assert!(matches("*", text), "{text}");
        }
    }

    #[test]
    fn question_mark_matches_exactly_one() {
        assert!(matches("a?c", "abc"));
        assert!(!matches("a?c", "ac"));
        assert!(!matches("a?c", "abbc"));
        assert!(matches("??", "éé"));
    }

    #[test]
    fn prefix_and_suffix_patterns() {
        assert!(matches("prod-*", "prod-db"));
        assert!(!matches("prod-*", "dev-db"));
        assert!(matches("*-database", "orders-database"));
        assert!(!matches("*-database", "orders-database-2"));
        assert!(matches("prod-*-cdc", "prod-orders-eu-cdc"));
    }

    #[test]
    fn star_backtracks_past_partial_matches() {
        assert!(matches("*ab", "aab"));
        assert!(matches("a*b*c", "axxbyybzc"));
        assert!(!matches("a*b*c", "axxbyyb"));
    }

    #[test]
    fn literal_star_in_text_still_matches_wildcard() {
        assert!(matches("a*", "a*b"));
    }

    #[test]
    fn bracket_is_literal_during_matching() {
        assert!(is_pattern("db[1]"));
        assert!(matches("db[1]", "db[1]"));
        assert!(!matches("db[1]", "db1"));
    }

    #[test]
    fn plain_names_are_not_patterns() {
        assert!(!is_pattern("prod-db"));
        assert!(is_pattern("prod-?"));
        assert!(!matches("prod-db", "prod-dbx"));
    }
}
