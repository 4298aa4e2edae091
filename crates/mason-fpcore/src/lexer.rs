//! Tokenization of the FPCore S-expression surface using logos.

use logos::Logos;

#[derive(Logos, Debug, Clone, PartialEq)]
#[logos(skip r"[ \t\r\n]+")]
#[logos(skip r";[^\n]*")]
pub enum Token {
    #[token("(")]
    LParen,

    #[token(")")]
    RParen,

    #[regex(r#""([^"\\]|\\.)*""#, |lex| strip_quotes(lex.slice()))]
    Str(String),

    /// `:name`, `:pre`, `:spec`, ... — the key without the colon.
    #[regex(r":[a-zA-Z][a-zA-Z0-9_-]*", |lex| lex.slice()[1..].to_string())]
    Property(String),

    #[regex(r"[+-]?([0-9]+(\.[0-9]+)?|\.[0-9]+)([eE][+-]?[0-9]+)?", |lex| lex.slice().to_string(), priority = 3)]
    Number(String),

    /// Operator or identifier. FPCore operator names are plain symbols, so
    /// `+`, `sqrt`, `PI_2` and `x` all land here.
    #[regex(r"[a-zA-Z_~!@$%^&*+=<>.?/-][a-zA-Z0-9_~!@$%^&*+=<>.?/-]*", |lex| lex.slice().to_string())]
    Symbol(String),
}

fn strip_quotes(slice: &str) -> String {
    let inner = &slice[1..slice.len() - 1];
    let mut out = String::with_capacity(inner.len());
    let mut chars = inner.chars();
    while let Some(c) = chars.next() {
        if c == '\\' {
            if let Some(escaped) = chars.next() {
                out.push(escaped);
            }
        } else {
            out.push(c);
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lex(text: &str) -> Vec<Token> {
        Token::lexer(text).map(|t| t.expect("lex error")).collect()
    }

    #[test]
    fn lexes_simple_core() {
        let toks = lex("(FPCore (x) (asin x))");
        assert_eq!(toks.len(), 9);
        assert_eq!(toks[0], Token::LParen);
        assert_eq!(toks[1], Token::Symbol("FPCore".into()));
    }

    #[test]
    fn signed_scientific_number_is_one_token() {
        let toks = lex("-3.25565818622400915405e-01");
        assert_eq!(toks, vec![Token::Number("-3.25565818622400915405e-01".into())]);
    }

    #[test]
    fn bare_minus_is_a_symbol() {
        let toks = lex("(- x)");
        assert_eq!(toks[1], Token::Symbol("-".into()));
    }

    #[test]
    fn properties_and_strings() {
        let toks = lex(r#":name "fast asin""#);
        assert_eq!(toks[0], Token::Property("name".into()));
        assert_eq!(toks[1], Token::Str("fast asin".into()));
    }

    #[test]
    fn comments_are_skipped() {
        let toks = lex("; header\n(+ 1 2)");
        assert_eq!(toks.len(), 5);
    }
}
