use std::cmp::Ordering;

/// String comparison rules attached to a descriptor.
///
/// Case insensitive descriptors on string attributes take the collation
/// aware evaluation path, binary ones compare raw bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Collation {
    #[default]
    Binary,
    CaseInsensitive,
}

impl Collation {
    #[inline]
    pub fn is_binary(self) -> bool {
        self == Collation::Binary
    }

    pub fn cmp_str(self, a: &str, b: &str) -> Ordering {
        match self {
            Collation::Binary => a.cmp(b),
            Collation::CaseInsensitive => a
                .chars()
                .flat_map(char::to_lowercase)
                .cmp(b.chars().flat_map(char::to_lowercase)),
        }
    }

    #[inline]
    pub fn eq_str(self, a: &str, b: &str) -> bool {
        self.cmp_str(a, b) == Ordering::Equal
    }

    #[inline]
    fn eq_char(self, a: char, b: char) -> bool {
        match self {
            Collation::Binary => a == b,
            Collation::CaseInsensitive => a.to_lowercase().eq(b.to_lowercase()),
        }
    }

    /// SQL `LIKE` matching: `%` matches any sequence, `_` any single character,
    /// `escape` makes the following character literal.
    pub fn like(self, text: &str, pattern: &str, escape: char) -> bool {
        let tokens = parse_pattern(pattern, escape);
        let text: Vec<char> = text.chars().collect();

        let (mut ti, mut pi) = (0usize, 0usize);
        let mut backtrack: Option<(usize, usize)> = None;

        while ti < text.len() {
            let matched = match tokens.get(pi) {
                Some(LikeToken::AnyOne) => true,
                Some(LikeToken::Literal(c)) => self.eq_char(*c, text[ti]),
                _ => false,
            };

            if matched {
                ti += 1;
                pi += 1;
            } else if tokens.get(pi) == Some(&LikeToken::AnyMany) {
                backtrack = Some((pi, ti));
                pi += 1;
            } else if let Some((star_pi, star_ti)) = backtrack {
                pi = star_pi + 1;
                ti = star_ti + 1;
                backtrack = Some((star_pi, star_ti + 1));
            } else {
                return false;
            }
        }

        while tokens.get(pi) == Some(&LikeToken::AnyMany) {
            pi += 1;
        }
        pi == tokens.len()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum LikeToken {
    Literal(char),
    AnyOne,
    AnyMany,
}

fn parse_pattern(pattern: &str, escape: char) -> Vec<LikeToken> {
    let mut tokens = Vec::with_capacity(pattern.len());
    let mut chars = pattern.chars();
    while let Some(c) = chars.next() {
        let token = if c == escape {
            match chars.next() {
                Some(next) => LikeToken::Literal(next),
                None => LikeToken::Literal(c),
            }
        } else if c == '%' {
            // Consecutive wildcards are equivalent to one.
            if tokens.last() == Some(&LikeToken::AnyMany) {
                continue;
            }
            LikeToken::AnyMany
        } else if c == '_' {
            LikeToken::AnyOne
        } else {
            LikeToken::Literal(c)
        };
        tokens.push(token);
    }
    tokens
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn like_wildcards() {
        let c = Collation::Binary;
        assert!(c.like("abcdef", "a%f", '\\'));
        assert!(c.like("abcdef", "%cd%", '\\'));
        assert!(c.like("abc", "a_c", '\\'));
        assert!(!c.like("abc", "a_d", '\\'));
        assert!(c.like("", "%", '\\'));
        assert!(!c.like("abc", "abcd", '\\'));
        assert!(c.like("aXbXc", "%X%X%", '\\'));
    }

    #[test]
    fn like_escape() {
        let c = Collation::Binary;
        assert!(c.like("50%", "50\\%", '\\'));
        assert!(!c.like("500", "50\\%", '\\'));
        assert!(c.like("a_b", "a#_b", '#'));
        assert!(!c.like("axb", "a#_b", '#'));
    }

    #[test]
    fn case_insensitive() {
        let c = Collation::CaseInsensitive;
        assert!(c.like("HeLLo", "hel%", '\\'));
        assert!(c.eq_str("ABC", "abc"));
        assert_eq!(c.cmp_str("b", "A"), Ordering::Greater);
        assert_eq!(Collation::Binary.cmp_str("b", "A"), Ordering::Greater);
        assert_eq!(Collation::Binary.cmp_str("B", "a"), Ordering::Less);
    }
}
