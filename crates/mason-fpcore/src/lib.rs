//! FPCore expression layer: parsing, interning, evaluation, and rendering
//! of the symbolic real-valued functions the synthesizer reasons about.

pub mod ast;
pub mod eval;
pub mod lexer;
pub mod parser;
pub mod render;

pub use ast::{Constant, Expr, ExprKind, FpCore, NumberLit, Op, PropValue, Symbol};
pub use eval::{EvalError, eval, eval_closed, try_int};
pub use parser::{ParseError, ParseResult, parse, parse_diagnostics, parse_expr, parse_one, parse_source_file};
