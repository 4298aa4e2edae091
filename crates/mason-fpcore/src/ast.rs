//! Interned FPCore expressions.
//!
//! Expressions are salsa-interned handles: structurally identical
//! expressions intern to the same id, which makes substitution cheap and
//! lets the rest of the system compare functions and bounds by handle.

/// Interned symbol for variables and argument names.
#[salsa::interned(debug)]
#[derive(Ord, PartialOrd)]
pub struct Symbol<'db> {
    #[returns(ref)]
    pub text: String,
}

/// Named mathematical constants, kept symbolic until evaluation forces them.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, salsa::Update)]
pub enum Constant {
    Pi,
    HalfPi,
    E,
    Infinity,
}

impl Constant {
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "PI" => Some(Constant::Pi),
            "PI_2" => Some(Constant::HalfPi),
            "E" => Some(Constant::E),
            "INFINITY" => Some(Constant::Infinity),
            _ => None,
        }
    }

    pub fn value(self) -> f64 {
        match self {
            Constant::Pi => std::f64::consts::PI,
            Constant::HalfPi => std::f64::consts::FRAC_PI_2,
            Constant::E => std::f64::consts::E,
            Constant::Infinity => f64::INFINITY,
        }
    }
}

/// FPCore operations the synthesizer understands.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, salsa::Update)]
pub enum Op {
    Add,
    Sub,
    Mul,
    Div,
    Neg,
    Sqrt,
    Fabs,
    Sin,
    Cos,
    Tan,
    Asin,
    Acos,
    Atan,
    Exp,
    Log,
    Pow,
    Fma,
    Floor,
    Fmin,
    Fmax,
}

impl Op {
    /// Resolve an FPCore operator symbol, given how many arguments follow.
    /// `-` is subtraction with two arguments and negation with one.
    pub fn from_name(name: &str, argc: usize) -> Option<Self> {
        match (name, argc) {
            ("+", 2) => Some(Op::Add),
            ("-", 2) => Some(Op::Sub),
            ("-", 1) => Some(Op::Neg),
            ("*", 2) => Some(Op::Mul),
            ("/", 2) => Some(Op::Div),
            ("sqrt", 1) => Some(Op::Sqrt),
            ("fabs", 1) => Some(Op::Fabs),
            ("sin", 1) => Some(Op::Sin),
            ("cos", 1) => Some(Op::Cos),
            ("tan", 1) => Some(Op::Tan),
            ("asin", 1) => Some(Op::Asin),
            ("acos", 1) => Some(Op::Acos),
            ("atan", 1) => Some(Op::Atan),
            ("exp", 1) => Some(Op::Exp),
            ("log", 1) => Some(Op::Log),
            ("pow", 2) => Some(Op::Pow),
            ("fma", 3) => Some(Op::Fma),
            ("floor", 1) => Some(Op::Floor),
            ("fmin", 2) => Some(Op::Fmin),
            ("fmax", 2) => Some(Op::Fmax),
            _ => None,
        }
    }

    /// Whether `name` is an operator for *some* arity (for error reporting).
    pub fn is_known_name(name: &str) -> bool {
        matches!(
            name,
            "+" | "-" | "*" | "/" | "sqrt" | "fabs" | "sin" | "cos" | "tan" | "asin" | "acos"
                | "atan" | "exp" | "log" | "pow" | "fma" | "floor" | "fmin" | "fmax"
        )
    }

    pub fn arity(self) -> usize {
        match self {
            Op::Neg | Op::Sqrt | Op::Fabs | Op::Sin | Op::Cos | Op::Tan | Op::Asin | Op::Acos
            | Op::Atan | Op::Exp | Op::Log | Op::Floor => 1,
            Op::Add | Op::Sub | Op::Mul | Op::Div | Op::Pow | Op::Fmin | Op::Fmax => 2,
            Op::Fma => 3,
        }
    }

    pub fn fpcore_name(self) -> &'static str {
        match self {
            Op::Add => "+",
            Op::Sub | Op::Neg => "-",
            Op::Mul => "*",
            Op::Div => "/",
            Op::Sqrt => "sqrt",
            Op::Fabs => "fabs",
            Op::Sin => "sin",
            Op::Cos => "cos",
            Op::Tan => "tan",
            Op::Asin => "asin",
            Op::Acos => "acos",
            Op::Atan => "atan",
            Op::Exp => "exp",
            Op::Log => "log",
            Op::Pow => "pow",
            Op::Fma => "fma",
            Op::Floor => "floor",
            Op::Fmin => "fmin",
            Op::Fmax => "fmax",
        }
    }
}

/// A numeric literal, kept as source text so emission reproduces
/// coefficients digit-for-digit.
#[derive(Clone, Debug, PartialEq, Eq, Hash, salsa::Update)]
pub struct NumberLit {
    text: String,
}

impl NumberLit {
    pub fn new(text: impl Into<String>) -> Self {
        NumberLit { text: text.into() }
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn value(&self) -> f64 {
        self.text.parse().unwrap_or(f64::NAN)
    }

    pub fn as_integer(&self) -> Option<i64> {
        if let Ok(n) = self.text.parse::<i64>() {
            return Some(n);
        }
        let v = self.value();
        if v.is_finite() && v == v.trunc() && v.abs() <= 2f64.powi(53) {
            Some(v as i64)
        } else {
            None
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Hash, salsa::Update)]
pub enum ExprKind<'db> {
    Number(NumberLit),
    Constant(Constant),
    Var(Symbol<'db>),
    Op(Op, Vec<Expr<'db>>),
}

#[salsa::interned(debug)]
pub struct Expr<'db> {
    #[returns(ref)]
    pub kind: ExprKind<'db>,
}

impl<'db> Expr<'db> {
    pub fn number(db: &'db dyn salsa::Database, text: impl Into<String>) -> Self {
        Expr::new(db, ExprKind::Number(NumberLit::new(text)))
    }

    pub fn integer(db: &'db dyn salsa::Database, value: i64) -> Self {
        Expr::number(db, value.to_string())
    }

    /// Shortest round-tripping literal for a finite value; infinities map to
    /// the symbolic constant.
    pub fn from_f64(db: &'db dyn salsa::Database, value: f64) -> Self {
        if value.is_infinite() {
            let inf = Expr::constant(db, Constant::Infinity);
            return if value > 0.0 { inf } else { Expr::neg(db, inf) };
        }
        if value == value.trunc() && value.abs() <= 2f64.powi(53) {
            return Expr::integer(db, value as i64);
        }
        Expr::number(db, format!("{value:?}"))
    }

    pub fn constant(db: &'db dyn salsa::Database, c: Constant) -> Self {
        Expr::new(db, ExprKind::Constant(c))
    }

    pub fn var(db: &'db dyn salsa::Database, name: &str) -> Self {
        Expr::new(db, ExprKind::Var(Symbol::new(db, name.to_string())))
    }

    pub fn op(db: &'db dyn salsa::Database, op: Op, args: Vec<Expr<'db>>) -> Self {
        debug_assert_eq!(op.arity(), args.len());
        Expr::new(db, ExprKind::Op(op, args))
    }

    pub fn add(db: &'db dyn salsa::Database, a: Expr<'db>, b: Expr<'db>) -> Self {
        Expr::op(db, Op::Add, vec![a, b])
    }

    pub fn sub(db: &'db dyn salsa::Database, a: Expr<'db>, b: Expr<'db>) -> Self {
        Expr::op(db, Op::Sub, vec![a, b])
    }

    pub fn mul(db: &'db dyn salsa::Database, a: Expr<'db>, b: Expr<'db>) -> Self {
        Expr::op(db, Op::Mul, vec![a, b])
    }

    pub fn neg(db: &'db dyn salsa::Database, a: Expr<'db>) -> Self {
        Expr::op(db, Op::Neg, vec![a])
    }

    pub fn contains_var(self, db: &'db dyn salsa::Database, var: Symbol<'db>) -> bool {
        match self.kind(db) {
            ExprKind::Var(v) => *v == var,
            ExprKind::Op(_, args) => args.iter().any(|a| a.contains_var(db, var)),
            _ => false,
        }
    }

    /// Replace every occurrence of `var` with `replacement`, returning a new
    /// handle. Untouched subtrees re-intern to themselves.
    pub fn substitute(
        self,
        db: &'db dyn salsa::Database,
        var: Symbol<'db>,
        replacement: Expr<'db>,
    ) -> Expr<'db> {
        match self.kind(db) {
            ExprKind::Var(v) if *v == var => replacement,
            ExprKind::Op(op, args) => {
                let new_args = args
                    .iter()
                    .map(|a| a.substitute(db, var, replacement))
                    .collect();
                Expr::new(db, ExprKind::Op(*op, new_args))
            }
            _ => self,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Hash, salsa::Update)]
pub enum PropValue<'db> {
    Text(String),
    Expr(Expr<'db>),
}

/// An FPCore function: argument list, properties, body.
#[salsa::interned(debug)]
pub struct FpCore<'db> {
    #[returns(ref)]
    pub args: Vec<Symbol<'db>>,
    #[returns(ref)]
    pub properties: Vec<(String, PropValue<'db>)>,
    pub body: Expr<'db>,
}

impl<'db> FpCore<'db> {
    /// The body with the first argument renamed to the canonical `x`.
    ///
    /// Two functions describe the same mathematics iff their canonical
    /// bodies intern to the same handle; identity tables and multi-branch
    /// constructions key on this.
    pub fn canonical_body(self, db: &'db dyn salsa::Database) -> Expr<'db> {
        let args = self.args(db);
        match args.first() {
            Some(&arg) => self.body(db).substitute(db, arg, Expr::var(db, "x")),
            None => self.body(db),
        }
    }

    /// The `:name` property, if present.
    pub fn display_name(self, db: &'db dyn salsa::Database) -> Option<String> {
        self.properties(db).iter().find_map(|(key, value)| {
            if key == "name"
                && let PropValue::Text(text) = value
            {
                Some(text.clone())
            } else {
                None
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mason_core::MasonDatabaseImpl;

    #[test]
    fn interning_is_structural() {
        let db = MasonDatabaseImpl::default();
        let a = Expr::var(&db, "x");
        let b = Expr::var(&db, "x");
        assert_eq!(a, b);
        let s1 = Expr::add(&db, a, Expr::integer(&db, 1));
        let s2 = Expr::add(&db, b, Expr::integer(&db, 1));
        assert_eq!(s1, s2);
    }

    #[test]
    fn substitute_replaces_all_occurrences() {
        let db = MasonDatabaseImpl::default();
        let x = Symbol::new(&db, "x".to_string());
        let e = Expr::add(&db, Expr::var(&db, "x"), Expr::var(&db, "x"));
        let r = e.substitute(&db, x, Expr::integer(&db, 2));
        let expected = Expr::add(&db, Expr::integer(&db, 2), Expr::integer(&db, 2));
        assert_eq!(r, expected);
    }

    #[test]
    fn number_integer_detection() {
        assert_eq!(NumberLit::new("42").as_integer(), Some(42));
        assert_eq!(NumberLit::new("1e2").as_integer(), Some(100));
        assert_eq!(NumberLit::new("0.5").as_integer(), None);
    }
}
