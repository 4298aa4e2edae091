//! Pure textual renderings of expressions for external tools.

use crate::ast::{Constant, Expr, ExprKind, FpCore, Op, PropValue};

/// Infix C using `math.h`/libm names.
pub fn to_libm_c<'db>(db: &'db dyn salsa::Database, expr: Expr<'db>) -> String {
    match expr.kind(db) {
        ExprKind::Number(n) => n.text().to_string(),
        ExprKind::Constant(c) => match c {
            Constant::Pi => "M_PI".to_string(),
            Constant::HalfPi => "M_PI_2".to_string(),
            Constant::E => "M_E".to_string(),
            Constant::Infinity => "INFINITY".to_string(),
        },
        ExprKind::Var(v) => v.text(db).clone(),
        ExprKind::Op(op, args) => {
            let a: Vec<String> = args.iter().map(|e| to_libm_c(db, *e)).collect();
            match op {
                Op::Add => format!("({} + {})", a[0], a[1]),
                Op::Sub => format!("({} - {})", a[0], a[1]),
                Op::Mul => format!("({} * {})", a[0], a[1]),
                Op::Div => format!("({} / {})", a[0], a[1]),
                Op::Neg => format!("(-{})", a[0]),
                Op::Pow => format!("pow({}, {})", a[0], a[1]),
                Op::Fma => format!("fma({}, {}, {})", a[0], a[1], a[2]),
                Op::Fmin => format!("fmin({}, {})", a[0], a[1]),
                Op::Fmax => format!("fmax({}, {})", a[0], a[1]),
                _ => format!("{}({})", op.fpcore_name(), a[0]),
            }
        }
    }
}

/// Sollya syntax, for polynomial-tuning scripts.
pub fn to_sollya<'db>(db: &'db dyn salsa::Database, expr: Expr<'db>) -> String {
    match expr.kind(db) {
        ExprKind::Number(n) => n.text().to_string(),
        ExprKind::Constant(c) => match c {
            Constant::Pi => "pi".to_string(),
            Constant::HalfPi => "(pi / 2)".to_string(),
            Constant::E => "exp(1)".to_string(),
            Constant::Infinity => "infty".to_string(),
        },
        ExprKind::Var(v) => v.text(db).clone(),
        ExprKind::Op(op, args) => {
            let a: Vec<String> = args.iter().map(|e| to_sollya(db, *e)).collect();
            match op {
                Op::Add => format!("({} + {})", a[0], a[1]),
                Op::Sub => format!("({} - {})", a[0], a[1]),
                Op::Mul => format!("({} * {})", a[0], a[1]),
                Op::Div => format!("({} / {})", a[0], a[1]),
                Op::Neg => format!("(-{})", a[0]),
                Op::Pow => format!("({} ^ {})", a[0], a[1]),
                Op::Fma => format!("({} * {} + {})", a[0], a[1], a[2]),
                Op::Fabs => format!("abs({})", a[0]),
                Op::Fmin => format!("min({}, {})", a[0], a[1]),
                Op::Fmax => format!("max({}, {})", a[0], a[1]),
                _ => format!("{}({})", op.fpcore_name(), a[0]),
            }
        }
    }
}

/// Wolfram language syntax.
pub fn to_wolfram<'db>(db: &'db dyn salsa::Database, expr: Expr<'db>) -> String {
    match expr.kind(db) {
        ExprKind::Number(n) => n.text().to_string(),
        ExprKind::Constant(c) => match c {
            Constant::Pi => "Pi".to_string(),
            Constant::HalfPi => "(Pi / 2)".to_string(),
            Constant::E => "E".to_string(),
            Constant::Infinity => "Infinity".to_string(),
        },
        ExprKind::Var(v) => v.text(db).clone(),
        ExprKind::Op(op, args) => {
            let a: Vec<String> = args.iter().map(|e| to_wolfram(db, *e)).collect();
            match op {
                Op::Add => format!("({} + {})", a[0], a[1]),
                Op::Sub => format!("({} - {})", a[0], a[1]),
                Op::Mul => format!("({} * {})", a[0], a[1]),
                Op::Div => format!("({} / {})", a[0], a[1]),
                Op::Neg => format!("(-{})", a[0]),
                Op::Pow => format!("Power[{}, {}]", a[0], a[1]),
                Op::Fma => format!("({} * {} + {})", a[0], a[1], a[2]),
                Op::Sqrt => format!("Sqrt[{}]", a[0]),
                Op::Fabs => format!("Abs[{}]", a[0]),
                Op::Sin => format!("Sin[{}]", a[0]),
                Op::Cos => format!("Cos[{}]", a[0]),
                Op::Tan => format!("Tan[{}]", a[0]),
                Op::Asin => format!("ArcSin[{}]", a[0]),
                Op::Acos => format!("ArcCos[{}]", a[0]),
                Op::Atan => format!("ArcTan[{}]", a[0]),
                Op::Exp => format!("Exp[{}]", a[0]),
                Op::Log => format!("Log[{}]", a[0]),
                Op::Floor => format!("Floor[{}]", a[0]),
                Op::Fmin => format!("Min[{}, {}]", a[0], a[1]),
                Op::Fmax => format!("Max[{}, {}]", a[0], a[1]),
            }
        }
    }
}

/// Inline HTML for reports.
pub fn to_html<'db>(db: &'db dyn salsa::Database, expr: Expr<'db>) -> String {
    match expr.kind(db) {
        ExprKind::Number(n) => n.text().to_string(),
        ExprKind::Constant(c) => match c {
            Constant::Pi => "&pi;".to_string(),
            Constant::HalfPi => "&pi;/2".to_string(),
            Constant::E => "e".to_string(),
            Constant::Infinity => "&infin;".to_string(),
        },
        ExprKind::Var(v) => v.text(db).clone(),
        ExprKind::Op(op, args) => {
            let a: Vec<String> = args.iter().map(|e| to_html(db, *e)).collect();
            match op {
                Op::Add => format!("({} + {})", a[0], a[1]),
                Op::Sub => format!("({} &minus; {})", a[0], a[1]),
                Op::Mul => format!("({} &middot; {})", a[0], a[1]),
                Op::Div => format!("({} / {})", a[0], a[1]),
                Op::Neg => format!("(&minus;{})", a[0]),
                Op::Pow => format!("{}<sup>{}</sup>", a[0], a[1]),
                Op::Fma => format!("({} &middot; {} + {})", a[0], a[1], a[2]),
                Op::Fabs => format!("|{}|", a[0]),
                Op::Fmin => format!("min({}, {})", a[0], a[1]),
                Op::Fmax => format!("max({}, {})", a[0], a[1]),
                _ => format!("{}({})", op.fpcore_name(), a[0]),
            }
        }
    }
}

/// Prefix s-expression, as consumed by egg-style term rewriters. This is
/// also the FPCore serialization of the expression.
pub fn to_egg_sexpr<'db>(db: &'db dyn salsa::Database, expr: Expr<'db>) -> String {
    match expr.kind(db) {
        ExprKind::Number(n) => n.text().to_string(),
        ExprKind::Constant(c) => match c {
            Constant::Pi => "PI".to_string(),
            Constant::HalfPi => "PI_2".to_string(),
            Constant::E => "E".to_string(),
            Constant::Infinity => "INFINITY".to_string(),
        },
        ExprKind::Var(v) => v.text(db).clone(),
        ExprKind::Op(op, args) => {
            let a: Vec<String> = args.iter().map(|e| to_egg_sexpr(db, *e)).collect();
            format!("({} {})", op.fpcore_name(), a.join(" "))
        }
    }
}

/// FPCore serialization of a whole function.
pub fn fpcore_to_sexpr<'db>(db: &'db dyn salsa::Database, core: FpCore<'db>) -> String {
    let args: Vec<String> = core.args(db).iter().map(|s| s.text(db).clone()).collect();
    let mut props = String::new();
    for (key, value) in core.properties(db) {
        match value {
            PropValue::Text(text) => props.push_str(&format!(" :{key} \"{text}\"")),
            PropValue::Expr(e) => props.push_str(&format!(" :{key} {}", to_egg_sexpr(db, *e))),
        }
    }
    format!(
        "(FPCore ({}){} {})",
        args.join(" "),
        props,
        to_egg_sexpr(db, core.body(db))
    )
}

/// Emits an expression as a sequence of MPFR statements.
///
/// Every sub-expression lands in a fresh `mpfr_t` temporary; the caller
/// wraps the emitted declarations/statements in a function and clears the
/// temporaries afterwards.
pub struct MpfrEmitter {
    precision: u32,
    temps: Vec<String>,
    code: Vec<String>,
}

impl MpfrEmitter {
    pub fn new(precision: u32) -> Self {
        MpfrEmitter {
            precision,
            temps: Vec::new(),
            code: Vec::new(),
        }
    }

    fn fresh(&mut self) -> String {
        let name = format!("t{}", self.temps.len());
        self.temps.push(name.clone());
        name
    }

    /// Emit code computing `expr`; free variables must already name
    /// initialized `mpfr_t` values. Returns the temporary holding the
    /// result.
    pub fn emit<'db>(&mut self, db: &'db dyn salsa::Database, expr: Expr<'db>) -> String {
        match expr.kind(db) {
            ExprKind::Number(n) => {
                let t = self.fresh();
                self.code
                    .push(format!("mpfr_set_str({t}, \"{}\", 10, MPFR_RNDN);", n.text()));
                t
            }
            ExprKind::Constant(c) => {
                let t = self.fresh();
                match c {
                    Constant::Pi => self.code.push(format!("mpfr_const_pi({t}, MPFR_RNDN);")),
                    Constant::HalfPi => {
                        self.code.push(format!("mpfr_const_pi({t}, MPFR_RNDN);"));
                        self.code
                            .push(format!("mpfr_div_ui({t}, {t}, 2, MPFR_RNDN);"));
                    }
                    Constant::E => {
                        self.code.push(format!("mpfr_set_ui({t}, 1, MPFR_RNDN);"));
                        self.code.push(format!("mpfr_exp({t}, {t}, MPFR_RNDN);"));
                    }
                    Constant::Infinity => self.code.push(format!("mpfr_set_inf({t}, 1);")),
                }
                t
            }
            ExprKind::Var(v) => v.text(db).clone(),
            ExprKind::Op(op, args) => {
                let a: Vec<String> = args.iter().map(|e| self.emit(db, *e)).collect();
                let t = self.fresh();
                let stmt = match op {
                    Op::Add => format!("mpfr_add({t}, {}, {}, MPFR_RNDN);", a[0], a[1]),
                    Op::Sub => format!("mpfr_sub({t}, {}, {}, MPFR_RNDN);", a[0], a[1]),
                    Op::Mul => format!("mpfr_mul({t}, {}, {}, MPFR_RNDN);", a[0], a[1]),
                    Op::Div => format!("mpfr_div({t}, {}, {}, MPFR_RNDN);", a[0], a[1]),
                    Op::Neg => format!("mpfr_neg({t}, {}, MPFR_RNDN);", a[0]),
                    Op::Sqrt => format!("mpfr_sqrt({t}, {}, MPFR_RNDN);", a[0]),
                    Op::Fabs => format!("mpfr_abs({t}, {}, MPFR_RNDN);", a[0]),
                    Op::Sin => format!("mpfr_sin({t}, {}, MPFR_RNDN);", a[0]),
                    Op::Cos => format!("mpfr_cos({t}, {}, MPFR_RNDN);", a[0]),
                    Op::Tan => format!("mpfr_tan({t}, {}, MPFR_RNDN);", a[0]),
                    Op::Asin => format!("mpfr_asin({t}, {}, MPFR_RNDN);", a[0]),
                    Op::Acos => format!("mpfr_acos({t}, {}, MPFR_RNDN);", a[0]),
                    Op::Atan => format!("mpfr_atan({t}, {}, MPFR_RNDN);", a[0]),
                    Op::Exp => format!("mpfr_exp({t}, {}, MPFR_RNDN);", a[0]),
                    Op::Log => format!("mpfr_log({t}, {}, MPFR_RNDN);", a[0]),
                    Op::Pow => format!("mpfr_pow({t}, {}, {}, MPFR_RNDN);", a[0], a[1]),
                    Op::Fma => format!(
                        "mpfr_fma({t}, {}, {}, {}, MPFR_RNDN);",
                        a[0], a[1], a[2]
                    ),
                    Op::Floor => format!("mpfr_floor({t}, {});", a[0]),
                    Op::Fmin => format!("mpfr_min({t}, {}, {}, MPFR_RNDN);", a[0], a[1]),
                    Op::Fmax => format!("mpfr_max({t}, {}, {}, MPFR_RNDN);", a[0], a[1]),
                };
                self.code.push(stmt);
                t
            }
        }
    }

    /// `mpfr_t t0, t1, ...;` declaration plus per-temp init statements.
    pub fn declarations(&self) -> Vec<String> {
        if self.temps.is_empty() {
            return Vec::new();
        }
        let mut lines = vec![format!("mpfr_t {};", self.temps.join(", "))];
        for t in &self.temps {
            lines.push(format!("mpfr_init2({t}, {});", self.precision));
        }
        lines
    }

    pub fn code(&self) -> &[String] {
        &self.code
    }

    pub fn clears(&self) -> Vec<String> {
        self.temps
            .iter()
            .map(|t| format!("mpfr_clear({t});"))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::parse_expr;
    use mason_core::MasonDatabaseImpl;

    #[test]
    fn libm_rendering() {
        let db = MasonDatabaseImpl::default();
        let e = parse_expr(&db, "(- (/ PI 2) (* 2 y))").unwrap();
        assert_eq!(to_libm_c(&db, e), "((M_PI / 2) - (2 * y))");
    }

    #[test]
    fn coefficient_text_is_preserved() {
        let db = MasonDatabaseImpl::default();
        let e = parse_expr(&db, "1.66666666666666657415e-01").unwrap();
        assert_eq!(to_libm_c(&db, e), "1.66666666666666657415e-01");
    }

    #[test]
    fn wolfram_rendering() {
        let db = MasonDatabaseImpl::default();
        let e = parse_expr(&db, "(asin (sqrt x))").unwrap();
        assert_eq!(to_wolfram(&db, e), "ArcSin[Sqrt[x]]");
    }

    #[test]
    fn sexpr_round_trips_through_parser() {
        let db = MasonDatabaseImpl::default();
        let e = parse_expr(&db, "(sqrt (/ (- 1 x) 2))").unwrap();
        let text = to_egg_sexpr(&db, e);
        assert_eq!(parse_expr(&db, &text).unwrap(), e);
    }

    #[test]
    fn mpfr_emission_produces_asin_call() {
        let db = MasonDatabaseImpl::default();
        let e = parse_expr(&db, "(asin x)").unwrap();
        let mut emitter = MpfrEmitter::new(256);
        let out = emitter.emit(&db, e);
        assert_eq!(out, "t0");
        assert_eq!(emitter.code(), &["mpfr_asin(t0, x, MPFR_RNDN);".to_string()]);
    }
}
