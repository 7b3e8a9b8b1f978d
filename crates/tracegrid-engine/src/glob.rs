//! SQLite-style GLOB matching: `*` matches any sequence, `?` any single
//! character, `[...]` a character class (with `-` ranges and leading `^`
//! negation). Matching is case-sensitive.

#[derive(Debug, Clone, PartialEq)]
enum Token {
    Star,
    QMark,
    Literal(char),
    Class { negated: bool, ranges: Vec<(char, char)> },
}

#[derive(Debug, Clone, PartialEq)]
pub struct GlobMatcher {
    tokens: Vec<Token>,
    has_metachars: bool,
}

impl GlobMatcher {
    pub fn new(pattern: &str) -> Self {
        let tokens = tokenize(pattern);
        let has_metachars = tokens.iter().any(|t| !matches!(t, Token::Literal(_)));
        Self { tokens, has_metachars }
    }

    /// True when the pattern contains no metacharacters and therefore
    /// degenerates to a plain equality test. Callers use this to route
    /// through the interned-id fast path instead of per-row matching.
    pub fn is_equality(&self) -> bool {
        !self.has_metachars
    }

    /// The literal text of an equality-only pattern.
    pub fn as_literal(&self) -> Option<String> {
        if self.has_metachars {
            return None;
        }
        Some(
            self.tokens
                .iter()
                .map(|t| match t {
                    Token::Literal(c) => *c,
                    _ => unreachable!(),
                })
                .collect(),
        )
    }

    pub fn matches(&self, text: &str) -> bool {
        let chars: Vec<char> = text.chars().collect();
        matches_tokens(&self.tokens, &chars)
    }
}

fn tokenize(pattern: &str) -> Vec<Token> {
    let mut tokens = Vec::new();
    let mut chars = pattern.chars().peekable();
    while let Some(c) = chars.next() {
        match c {
            '*' => tokens.push(Token::Star),
            '?' => tokens.push(Token::QMark),
            '[' => {
                let mut negated = false;
                let mut ranges = Vec::new();
                if chars.peek() == Some(&'^') {
                    negated = true;
                    chars.next();
                }
                // A `]` directly after the opening bracket (or `^`) is a
                // literal member of the class, per SQLite.
                let mut first = true;
                let mut closed = false;
                while let Some(m) = chars.next() {
                    if m == ']' && !first {
                        closed = true;
                        break;
                    }
                    first = false;
                    if chars.peek() == Some(&'-') {
                        let mut ahead = chars.clone();
                        ahead.next();
                        match ahead.peek() {
                            Some(&hi) if hi != ']' => {
                                chars.next();
                                chars.next();
                                ranges.push((m, hi));
                                continue;
                            }
                            _ => {}
                        }
                    }
                    ranges.push((m, m));
                }
                if closed {
                    tokens.push(Token::Class { negated, ranges });
                } else {
                    // Unterminated class: SQLite treats the rest of the
                    // pattern as unmatched; an impossible class gets there.
                    tokens.push(Token::Class { negated: false, ranges: Vec::new() });
                }
            }
            other => tokens.push(Token::Literal(other)),
        }
    }
    tokens
}

fn token_matches(token: &Token, c: char) -> bool {
    match token {
        Token::Star => unreachable!("star handled by the backtracking loop"),
        Token::QMark => true,
        Token::Literal(l) => *l == c,
        Token::Class { negated, ranges } => {
            let inside = ranges.iter().any(|&(lo, hi)| c >= lo && c <= hi);
            inside != *negated
        }
    }
}

fn matches_tokens(pattern: &[Token], text: &[char]) -> bool {
    let mut pi = 0usize;
    let mut ti = 0usize;
    let mut star: Option<usize> = None;
    let mut star_text = 0usize;

    while ti < text.len() {
        if pi < pattern.len() {
            match &pattern[pi] {
                Token::Star => {
                    star = Some(pi);
                    pi += 1;
                    star_text = ti;
                    continue;
                }
                tok if token_matches(tok, text[ti]) => {
                    pi += 1;
                    ti += 1;
                    continue;
                }
                _ => {}
            }
        }

        if let Some(star_pos) = star {
            pi = star_pos + 1;
            star_text += 1;
            ti = star_text;
        } else {
            return false;
        }
    }

    while pi < pattern.len() && pattern[pi] == Token::Star {
        pi += 1;
    }
    pi == pattern.len()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn literal_patterns_are_equality() {
        let m = GlobMatcher::new("sched_switch");
        assert!(m.is_equality());
        assert_eq!(m.as_literal().as_deref(), Some("sched_switch"));
        assert!(m.matches("sched_switch"));
        assert!(!m.matches("sched_waking"));
        assert!(!m.matches("Sched_switch"));
    }

    #[test]
    fn star_matches_any_run() {
        let m = GlobMatcher::new("sched*");
        assert!(!m.is_equality());
        assert!(m.matches("sched_switch"));
        assert!(m.matches("sched"));
        assert!(!m.matches("xsched"));

        let m = GlobMatcher::new("*binder*");
        assert!(m.matches("binder_transaction"));
        assert!(m.matches("async_binder"));
        assert!(!m.matches("bander"));
    }

    #[test]
    fn qmark_matches_exactly_one() {
        let m = GlobMatcher::new("cpu?");
        assert!(m.matches("cpu0"));
        assert!(m.matches("cpu9"));
        assert!(!m.matches("cpu"));
        assert!(!m.matches("cpu12"));
    }

    #[test]
    fn char_classes_and_ranges() {
        let m = GlobMatcher::new("cpu[0-3]");
        assert!(m.matches("cpu0"));
        assert!(m.matches("cpu3"));
        assert!(!m.matches("cpu4"));

        let m = GlobMatcher::new("[^a]bc");
        assert!(m.matches("xbc"));
        assert!(!m.matches("abc"));

        let m = GlobMatcher::new("[]x]");
        assert!(m.matches("]"));
        assert!(m.matches("x"));
        assert!(!m.matches("y"));
    }

    #[test]
    fn backtracking_over_repeated_prefixes() {
        let m = GlobMatcher::new("*ab*ab");
        assert!(m.matches("xxabyyab"));
        assert!(m.matches("abab"));
        assert!(!m.matches("abax"));
    }

    #[test]
    fn unterminated_class_never_matches() {
        let m = GlobMatcher::new("a[bc");
        assert!(!m.matches("ab"));
        assert!(!m.matches("a[bc"));
    }
}
