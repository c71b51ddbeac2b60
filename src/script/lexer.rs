//! Tokenizer for event scripts.
//!
//! Produces uppercased tokens with their byte offsets: words
//! (`[A-Za-z0-9_.]+`), the multi-char comparators `!=` `>=` `<=`, and the
//! single-char operators `+ - * / ^ ( ) , ; : < > =`. Anything else
//! (whitespace included) separates tokens and is skipped.

/// One token of script source.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Token {
    /// Uppercased token text.
    pub text: String,
    /// Byte offset into the event source, for error reporting.
    pub pos: usize,
}

impl Token {
    fn new(text: &str, pos: usize) -> Self {
        Self { text: text.to_ascii_uppercase(), pos }
    }
}

#[inline]
fn is_word_byte(b: u8) -> bool {
    b.is_ascii_alphanumeric() || b == b'_' || b == b'.'
}

/// Tokenize one event's source text.
pub fn tokenize(source: &str) -> Vec<Token> {
    let bytes = source.as_bytes();
    let mut tokens = Vec::new();
    let mut pos = 0;

    while pos < bytes.len() {
        let b = bytes[pos];

        if is_word_byte(b) {
            let start = pos;
            while pos < bytes.len() && is_word_byte(bytes[pos]) {
                pos += 1;
            }
            tokens.push(Token::new(&source[start..pos], start));
            continue;
        }

        // Two-char comparators take precedence over their prefixes.
        if matches!(b, b'!' | b'>' | b'<') && pos + 1 < bytes.len() && bytes[pos + 1] == b'=' {
            tokens.push(Token::new(&source[pos..pos + 2], pos));
            pos += 2;
            continue;
        }

        if matches!(
            b,
            b'+' | b'-' | b'*' | b'/' | b'^' | b'(' | b')' | b',' | b';' | b':' | b'<' | b'>' | b'='
        ) {
            tokens.push(Token::new(&source[pos..pos + 1], pos));
        }

        pos += 1;
    }

    tokens
}

#[cfg(test)]
mod tests {
    use super::*;

    fn texts(src: &str) -> Vec<String> {
        tokenize(src).into_iter().map(|t| t.text).collect()
    }

    #[test]
    fn words_are_uppercased() {
        assert_eq!(texts("x pays Spot"), ["X", "PAYS", "SPOT"]);
    }

    #[test]
    fn numbers_keep_dots() {
        assert_eq!(texts("k = 101.5"), ["K", "=", "101.5"]);
    }

    #[test]
    fn multi_char_comparators_win() {
        assert_eq!(texts("a >= b <= c != d"), ["A", ">=", "B", "<=", "C", "!=", "D"]);
        assert_eq!(texts("a > = b"), ["A", ">", "=", "B"]);
    }

    #[test]
    fn operators_split_words() {
        assert_eq!(
            texts("x=max(spot-100,0)"),
            ["X", "=", "MAX", "(", "SPOT", "-", "100", ",", "0", ")"]
        );
    }

    #[test]
    fn fuzzy_eps_suffix() {
        assert_eq!(texts("spot > 100 ; 0.5"), ["SPOT", ">", "100", ";", "0.5"]);
    }

    #[test]
    fn positions_are_byte_offsets() {
        let toks = tokenize("x = 10");
        assert_eq!(toks[0].pos, 0);
        assert_eq!(toks[1].pos, 2);
        assert_eq!(toks[2].pos, 4);
    }

    #[test]
    fn unknown_bytes_are_separators() {
        assert_eq!(texts("a # b"), ["A", "B"]);
        assert_eq!(texts("x → 1"), ["X", "1"]);
    }
}
