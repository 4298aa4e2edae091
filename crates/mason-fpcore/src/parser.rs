//! Recursive-descent parser from FPCore tokens to interned expressions.

use logos::Logos;
use salsa::Accumulator;

use mason_core::{CompilationPhase, Diagnostic, DiagnosticSeverity, SourceFile, Span};

use crate::ast::{Constant, Expr, ExprKind, FpCore, NumberLit, Op, PropValue, Symbol};
use crate::lexer::Token;

#[derive(Debug, Clone, PartialEq, derive_more::Display, derive_more::Error)]
pub enum ParseError {
    #[display("unexpected end of input")]
    UnexpectedEof,
    #[display("unexpected token {found:?} at byte {at}")]
    UnexpectedToken { found: String, at: usize },
    #[display("unknown operator '{name}' at byte {at}")]
    UnknownOperator { name: String, at: usize },
    #[display("operator '{name}' does not take {found} arguments")]
    WrongArity { name: String, found: usize },
    #[display("unrecognized character at byte {at}")]
    UnrecognizedCharacter { at: usize },
}

impl ParseError {
    pub fn span(&self) -> Option<Span> {
        match self {
            ParseError::UnexpectedToken { at, .. }
            | ParseError::UnknownOperator { at, .. }
            | ParseError::UnrecognizedCharacter { at } => Some(Span::new(*at, *at + 1)),
            _ => None,
        }
    }
}

pub type ParseResult<T> = Result<T, ParseError>;

struct Tokens {
    toks: Vec<(Token, std::ops::Range<usize>)>,
    pos: usize,
}

impl Tokens {
    fn lex(text: &str) -> ParseResult<Self> {
        let mut toks = Vec::new();
        for (tok, span) in Token::lexer(text).spanned() {
            match tok {
                Ok(t) => toks.push((t, span)),
                Err(()) => return Err(ParseError::UnrecognizedCharacter { at: span.start }),
            }
        }
        Ok(Tokens { toks, pos: 0 })
    }

    fn peek(&self) -> Option<&Token> {
        self.toks.get(self.pos).map(|(t, _)| t)
    }

    fn next(&mut self) -> ParseResult<(Token, usize)> {
        let (tok, span) = self.toks.get(self.pos).ok_or(ParseError::UnexpectedEof)?;
        self.pos += 1;
        Ok((tok.clone(), span.start))
    }

    fn expect_lparen(&mut self) -> ParseResult<()> {
        match self.next()? {
            (Token::LParen, _) => Ok(()),
            (tok, at) => Err(unexpected(tok, at)),
        }
    }

    fn expect_rparen(&mut self) -> ParseResult<()> {
        match self.next()? {
            (Token::RParen, _) => Ok(()),
            (tok, at) => Err(unexpected(tok, at)),
        }
    }

    fn at_end(&self) -> bool {
        self.pos >= self.toks.len()
    }
}

fn unexpected(tok: Token, at: usize) -> ParseError {
    ParseError::UnexpectedToken {
        found: format!("{tok:?}"),
        at,
    }
}

/// Parse every `(FPCore ...)` form in `text`.
pub fn parse<'db>(db: &'db dyn salsa::Database, text: &str) -> ParseResult<Vec<FpCore<'db>>> {
    let mut toks = Tokens::lex(text)?;
    let mut cores = Vec::new();
    while !toks.at_end() {
        cores.push(parse_core(db, &mut toks)?);
    }
    Ok(cores)
}

/// Parse exactly one `(FPCore ...)` form.
pub fn parse_one<'db>(db: &'db dyn salsa::Database, text: &str) -> ParseResult<FpCore<'db>> {
    let mut toks = Tokens::lex(text)?;
    let core = parse_core(db, &mut toks)?;
    match toks.peek() {
        None => Ok(core),
        Some(_) => {
            let (tok, at) = toks.next()?;
            Err(unexpected(tok, at))
        }
    }
}

/// Parse a bare expression (no `FPCore` wrapper).
pub fn parse_expr<'db>(db: &'db dyn salsa::Database, text: &str) -> ParseResult<Expr<'db>> {
    let mut toks = Tokens::lex(text)?;
    let expr = parse_expr_inner(db, &mut toks)?;
    match toks.peek() {
        None => Ok(expr),
        Some(_) => {
            let (tok, at) = toks.next()?;
            Err(unexpected(tok, at))
        }
    }
}

fn parse_core<'db>(db: &'db dyn salsa::Database, toks: &mut Tokens) -> ParseResult<FpCore<'db>> {
    toks.expect_lparen()?;
    match toks.next()? {
        (Token::Symbol(s), _) if s == "FPCore" => {}
        (tok, at) => return Err(unexpected(tok, at)),
    }

    // Argument list.
    toks.expect_lparen()?;
    let mut args = Vec::new();
    loop {
        match toks.next()? {
            (Token::RParen, _) => break,
            (Token::Symbol(name), _) => args.push(Symbol::new(db, name)),
            (tok, at) => return Err(unexpected(tok, at)),
        }
    }

    // Properties, then the body expression.
    let mut properties = Vec::new();
    while let Some(Token::Property(_)) = toks.peek() {
        let (tok, _) = toks.next()?;
        let Token::Property(key) = tok else {
            unreachable!()
        };
        let value = match toks.peek() {
            Some(Token::Str(_)) => {
                let (tok, _) = toks.next()?;
                let Token::Str(text) = tok else { unreachable!() };
                PropValue::Text(text)
            }
            _ => PropValue::Expr(parse_expr_inner(db, toks)?),
        };
        properties.push((key, value));
    }

    let body = parse_expr_inner(db, toks)?;
    toks.expect_rparen()?;
    Ok(FpCore::new(db, args, properties, body))
}

fn parse_expr_inner<'db>(db: &'db dyn salsa::Database, toks: &mut Tokens) -> ParseResult<Expr<'db>> {
    match toks.next()? {
        (Token::Number(text), _) => Ok(Expr::new(db, ExprKind::Number(NumberLit::new(text)))),
        (Token::Symbol(name), _) => Ok(match Constant::from_name(&name) {
            Some(c) => Expr::constant(db, c),
            None => Expr::new(db, ExprKind::Var(Symbol::new(db, name))),
        }),
        (Token::LParen, _) => {
            let (name, at) = match toks.next()? {
                (Token::Symbol(s), at) => (s, at),
                (tok, at) => return Err(unexpected(tok, at)),
            };
            let mut operands = Vec::new();
            loop {
                match toks.peek() {
                    Some(Token::RParen) => {
                        toks.next()?;
                        break;
                    }
                    Some(_) => operands.push(parse_expr_inner(db, toks)?),
                    None => return Err(ParseError::UnexpectedEof),
                }
            }
            match Op::from_name(&name, operands.len()) {
                Some(op) => Ok(Expr::new(db, ExprKind::Op(op, operands))),
                None if Op::is_known_name(&name) => Err(ParseError::WrongArity {
                    name,
                    found: operands.len(),
                }),
                None => Err(ParseError::UnknownOperator { name, at }),
            }
        }
        (tok, at) => Err(unexpected(tok, at)),
    }
}

/// Query: parse a source file into FPCore functions, accumulating a
/// `Parsing` diagnostic (and yielding no functions) on failure.
#[salsa::tracked]
pub fn parse_source_file<'db>(
    db: &'db dyn salsa::Database,
    source: SourceFile,
) -> Vec<FpCore<'db>> {
    match parse(db, source.text(db)) {
        Ok(cores) => cores,
        Err(e) => {
            Diagnostic {
                message: format!("parse error: {e}"),
                span: e.span(),
                severity: DiagnosticSeverity::Error,
                phase: CompilationPhase::Parsing,
            }
            .accumulate(db);
            Vec::new()
        }
    }
}

/// All diagnostics emitted while parsing `source`.
pub fn parse_diagnostics(db: &dyn salsa::Database, source: SourceFile) -> Vec<Diagnostic> {
    let _ = parse_source_file(db, source);
    parse_source_file::accumulated::<Diagnostic>(db, source)
        .into_iter()
        .cloned()
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::render::to_egg_sexpr;
    use mason_core::MasonDatabaseImpl;

    #[test]
    fn parses_asin_core() {
        let db = MasonDatabaseImpl::default();
        let core = parse_one(&db, "(FPCore (x) (asin x))").unwrap();
        assert_eq!(core.args(&db).len(), 1);
        assert_eq!(to_egg_sexpr(&db, core.body(&db)), "(asin x)");
    }

    #[test]
    fn parses_negated_constant() {
        let db = MasonDatabaseImpl::default();
        let e = parse_expr(&db, "(- INFINITY)").unwrap();
        assert_eq!(to_egg_sexpr(&db, e), "(- INFINITY)");
    }

    #[test]
    fn parses_properties() {
        let db = MasonDatabaseImpl::default();
        let core = parse_one(&db, r#"(FPCore (x) :name "sun asin" :pre (fabs x) (asin x))"#).unwrap();
        assert_eq!(core.properties(&db).len(), 2);
        assert_eq!(core.display_name(&db).as_deref(), Some("sun asin"));
    }

    #[test]
    fn unknown_operator_is_an_error() {
        let db = MasonDatabaseImpl::default();
        let err = parse_expr(&db, "(frobnicate x)").unwrap_err();
        assert!(matches!(err, ParseError::UnknownOperator { .. }));
    }

    #[test]
    fn wrong_arity_is_an_error() {
        let db = MasonDatabaseImpl::default();
        let err = parse_expr(&db, "(sqrt x y)").unwrap_err();
        assert!(matches!(err, ParseError::WrongArity { found: 2, .. }));
    }

    #[test]
    fn unclosed_core_is_an_error() {
        let db = MasonDatabaseImpl::default();
        let err = parse_one(&db, "(FPCore (x) (asin x)").unwrap_err();
        assert_eq!(err, ParseError::UnexpectedEof);
    }

    #[test]
    fn parse_diagnostics_reports_failures() {
        let db = MasonDatabaseImpl::default();
        let file = SourceFile::from_path(&db, "bad.fpcore", "(FPCore (x)".to_string());
        let diags = parse_diagnostics(&db, file);
        assert_eq!(diags.len(), 1);
        assert_eq!(diags[0].phase, CompilationPhase::Parsing);
    }

    #[test]
    fn multiple_cores() {
        let db = MasonDatabaseImpl::default();
        let cores = parse(&db, "(FPCore (x) (sin x)) (FPCore (x) (cos x))").unwrap();
        assert_eq!(cores.len(), 2);
    }
}
