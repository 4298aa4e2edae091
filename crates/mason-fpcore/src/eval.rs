//! Constant evaluation of FPCore expressions.
//!
//! Symbolic constants are forced to `double` here and nowhere else; the
//! emitted MPFR oracle is where real arbitrary precision happens.

use std::collections::BTreeMap;

use crate::ast::{Expr, ExprKind, Op, Symbol};

#[derive(Debug, Clone, PartialEq, derive_more::Display, derive_more::Error)]
pub enum EvalError {
    #[display("unbound variable '{name}'")]
    UnboundVariable { name: String },
}

pub fn eval<'db>(
    db: &'db dyn salsa::Database,
    expr: Expr<'db>,
    bindings: &BTreeMap<Symbol<'db>, f64>,
) -> Result<f64, EvalError> {
    match expr.kind(db) {
        ExprKind::Number(n) => Ok(n.value()),
        ExprKind::Constant(c) => Ok(c.value()),
        ExprKind::Var(v) => bindings.get(v).copied().ok_or_else(|| EvalError::UnboundVariable {
            name: v.text(db).clone(),
        }),
        ExprKind::Op(op, args) => {
            let mut vals = [0.0f64; 3];
            for (slot, arg) in vals.iter_mut().zip(args.iter()) {
                *slot = eval(db, *arg, bindings)?;
            }
            Ok(apply(*op, &vals[..args.len()]))
        }
    }
}

/// Evaluate an expression with no free variables (interval bounds, periods,
/// reduction probes).
pub fn eval_closed<'db>(db: &'db dyn salsa::Database, expr: Expr<'db>) -> Result<f64, EvalError> {
    eval(db, expr, &BTreeMap::new())
}

/// The value of `expr` if it is closed, finite, and integral.
pub fn try_int<'db>(db: &'db dyn salsa::Database, expr: Expr<'db>) -> Option<i64> {
    let v = eval_closed(db, expr).ok()?;
    if v.is_finite() && v == v.trunc() && v.abs() <= 2f64.powi(53) {
        Some(v as i64)
    } else {
        None
    }
}

fn apply(op: Op, args: &[f64]) -> f64 {
    match op {
        Op::Add => args[0] + args[1],
        Op::Sub => args[0] - args[1],
        Op::Mul => args[0] * args[1],
        Op::Div => args[0] / args[1],
        Op::Neg => -args[0],
        Op::Sqrt => args[0].sqrt(),
        Op::Fabs => args[0].abs(),
        Op::Sin => args[0].sin(),
        Op::Cos => args[0].cos(),
        Op::Tan => args[0].tan(),
        Op::Asin => args[0].asin(),
        Op::Acos => args[0].acos(),
        Op::Atan => args[0].atan(),
        Op::Exp => args[0].exp(),
        Op::Log => args[0].ln(),
        Op::Pow => args[0].powf(args[1]),
        Op::Fma => args[0].mul_add(args[1], args[2]),
        Op::Floor => args[0].floor(),
        Op::Fmin => args[0].min(args[1]),
        Op::Fmax => args[0].max(args[1]),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::parse_expr;
    use mason_core::MasonDatabaseImpl;

    #[test]
    fn evaluates_half_pi_two_ways() {
        let db = MasonDatabaseImpl::default();
        let a = parse_expr(&db, "(/ PI 2)").unwrap();
        let b = parse_expr(&db, "PI_2").unwrap();
        assert_eq!(eval_closed(&db, a).unwrap(), eval_closed(&db, b).unwrap());
    }

    #[test]
    fn evaluates_negated_infinity() {
        let db = MasonDatabaseImpl::default();
        let e = parse_expr(&db, "(- INFINITY)").unwrap();
        assert_eq!(eval_closed(&db, e).unwrap(), f64::NEG_INFINITY);
    }

    #[test]
    fn unbound_variable_errors() {
        let db = MasonDatabaseImpl::default();
        let e = parse_expr(&db, "(+ x 1)").unwrap();
        assert!(matches!(
            eval_closed(&db, e),
            Err(EvalError::UnboundVariable { .. })
        ));
    }

    #[test]
    fn bindings_are_used() {
        let db = MasonDatabaseImpl::default();
        let e = parse_expr(&db, "(sqrt (/ (- 1 x) 2))").unwrap();
        let x = Symbol::new(&db, "x".to_string());
        let mut bindings = BTreeMap::new();
        bindings.insert(x, 0.5);
        assert_eq!(eval(&db, e, &bindings).unwrap(), 0.5);
    }

    #[test]
    fn integral_detection() {
        let db = MasonDatabaseImpl::default();
        let two = parse_expr(&db, "(- 3 1)").unwrap();
        assert_eq!(try_int(&db, two), Some(2));
        let pi = parse_expr(&db, "PI").unwrap();
        assert_eq!(try_int(&db, pi), None);
    }
}
