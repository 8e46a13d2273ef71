//! Shell-style wildcard matcher used for `cgi_pattern` and
//! `sig_exclude_pattern`. A pattern is a `|`-separated list of alternatives;
//! within an alternative `*` matches a run of non-`/` bytes, `**` matches
//! any run (including `/`), and `?` matches exactly one byte. Matching is
//! anchored at both ends of the whole input and greedy; no captures.

#[derive(Debug, Clone)]
pub struct Pattern {
    alternatives: Vec<Vec<u8>>,
}

impl Pattern {
    pub fn new(raw: &str) -> Self {
        Pattern {
            alternatives: raw.split('|').map(|s| s.as_bytes().to_vec()).collect(),
        }
    }

    pub fn matches(&self, input: &str) -> bool {
        let bytes = input.as_bytes();
        self.alternatives.iter().any(|alt| match_alt(alt, bytes))
    }
}

fn match_alt(pat: &[u8], input: &[u8]) -> bool {
    match_from(pat, input)
}

/// Recursive matcher: `*`/`**` try every possible split point, backtracking
/// on failure. Patterns in this module are short (path-segment length), so
/// the exponential worst case never matters in practice.
fn match_from(pat: &[u8], input: &[u8]) -> bool {
    match pat.first() {
        None => input.is_empty(),
        Some(b'?') => {
            if input.is_empty() {
                false
            } else {
                match_from(&pat[1..], &input[1..])
            }
        }
        Some(b'*') => {
            let (is_double, rest) = if pat.len() >= 2 && pat[1] == b'*' {
                (true, &pat[2..])
            } else {
                (false, &pat[1..])
            };
            for split in 0..=input.len() {
                if !is_double && input[..split].contains(&b'/') {
                    break;
                }
                if match_from(rest, &input[split..]) {
                    return true;
                }
            }
            false
        }
        Some(&c) => {
            if input.first() == Some(&c) {
                match_from(&pat[1..], &input[1..])
            } else {
                false
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn star_does_not_cross_slash() {
        let p = Pattern::new("/cgi-bin/*");
        assert!(p.matches("/cgi-bin/echo"));
        assert!(!p.matches("/cgi-bin/sub/echo"));
    }

    #[test]
    fn double_star_crosses_slash() {
        let p = Pattern::new("/cgi-bin/**");
        assert!(p.matches("/cgi-bin/sub/echo"));
    }

    #[test]
    fn question_mark_matches_one_char() {
        let p = Pattern::new("/a?c");
        assert!(p.matches("/abc"));
        assert!(!p.matches("/abbc"));
    }

    #[test]
    fn alternation_order_does_not_matter() {
        let a = Pattern::new("a/b|c**");
        let b = Pattern::new("c**|a/b");
        for candidate in ["a/b", "cXYZ", "c", "nope"] {
            assert_eq!(a.matches(candidate), b.matches(candidate));
        }
    }

    #[test]
    fn anchored_both_ends() {
        let p = Pattern::new("*.cgi");
        assert!(!p.matches("foo.cgi.bak"));
        assert!(p.matches("foo.cgi"));
    }
}
