//! Externally-supplied algebraic identity facts.
//!
//! The identity miner (an equality-saturation pass) runs outside this
//! system; its output arrives here as a read-only table keyed by the
//! canonical function body. The table is threaded explicitly into checking
//! and synthesis, and is safe to share across concurrent constructions.

use std::collections::HashMap;

use serde::Deserialize;

use mason_fpcore::render::to_egg_sexpr;
use mason_fpcore::{Constant, Expr, FpCore, Op, eval_closed, parse_expr, parse_one};

/// Absolute tolerance used when matching registered points against domain
/// edges. Fixed rather than relative, so very large or very small domains
/// may misclassify; kept as-is deliberately.
pub const EDGE_TOLERANCE: f64 = 1e-16;

/// One known identity of a function `f`.
#[derive(Clone, Debug)]
pub enum Identity<'db> {
    /// `f(2p - x) = recon[y := f(x)]` at the point `p`.
    Mirror {
        point: Expr<'db>,
        point_val: f64,
        reconstruction: Expr<'db>,
    },
    /// `f(x) = recon[y := f(g(x))]` for a reduction `g` in `x` and a
    /// reconstruction in `y`.
    Inflection {
        reduction: Expr<'db>,
        reconstruction: Expr<'db>,
    },
    /// `f(x + p) = f(x)`.
    Periodic { period: Expr<'db>, period_val: f64 },
}

#[derive(Debug, Default)]
pub struct IdentityTable<'db> {
    map: HashMap<Expr<'db>, Vec<Identity<'db>>>,
}

#[derive(Debug, derive_more::Display, derive_more::Error)]
pub enum IdentityLoadError {
    #[display("malformed identity file: {_0}")]
    Json(#[error(not(source))] String),
    #[display("bad expression in identity file: {_0}")]
    Expression(#[error(not(source))] String),
    #[display("identity value does not evaluate: {_0}")]
    Evaluation(#[error(not(source))] String),
}

impl<'db> IdentityTable<'db> {
    pub fn new() -> Self {
        Self::default()
    }

    fn push(&mut self, db: &'db dyn salsa::Database, function: FpCore<'db>, id: Identity<'db>) {
        self.map
            .entry(function.canonical_body(db))
            .or_default()
            .push(id);
    }

    pub fn add_mirror(
        &mut self,
        db: &'db dyn salsa::Database,
        function: FpCore<'db>,
        point: Expr<'db>,
        reconstruction: Expr<'db>,
    ) -> Result<(), IdentityLoadError> {
        let point_val = eval_closed(db, point)
            .map_err(|e| IdentityLoadError::Evaluation(e.to_string()))?;
        self.push(
            db,
            function,
            Identity::Mirror {
                point,
                point_val,
                reconstruction,
            },
        );
        Ok(())
    }

    pub fn add_inflection(
        &mut self,
        db: &'db dyn salsa::Database,
        function: FpCore<'db>,
        reduction: Expr<'db>,
        reconstruction: Expr<'db>,
    ) {
        self.push(
            db,
            function,
            Identity::Inflection {
                reduction,
                reconstruction,
            },
        );
    }

    pub fn add_periodic(
        &mut self,
        db: &'db dyn salsa::Database,
        function: FpCore<'db>,
        period: Expr<'db>,
    ) -> Result<(), IdentityLoadError> {
        let period_val = eval_closed(db, period)
            .map_err(|e| IdentityLoadError::Evaluation(e.to_string()))?;
        self.push(db, function, Identity::Periodic { period, period_val });
        Ok(())
    }

    fn entries(&self, db: &'db dyn salsa::Database, function: FpCore<'db>) -> &[Identity<'db>] {
        self.map
            .get(&function.canonical_body(db))
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    /// Registered mirror points of `function`, in registration order.
    pub fn mirror_points(&self, db: &'db dyn salsa::Database, function: FpCore<'db>) -> Vec<f64> {
        self.entries(db, function)
            .iter()
            .filter_map(|id| match id {
                Identity::Mirror { point_val, .. } => Some(*point_val),
                _ => None,
            })
            .collect()
    }

    /// Reconstructions of mirror identities registered at `point`.
    pub fn mirrors_at(
        &self,
        db: &'db dyn salsa::Database,
        function: FpCore<'db>,
        point: f64,
    ) -> Vec<Expr<'db>> {
        self.entries(db, function)
            .iter()
            .filter_map(|id| match id {
                Identity::Mirror {
                    point_val,
                    reconstruction,
                    ..
                } if (point_val - point).abs() < EDGE_TOLERANCE => Some(*reconstruction),
                _ => None,
            })
            .collect()
    }

    pub fn inflections(
        &self,
        db: &'db dyn salsa::Database,
        function: FpCore<'db>,
    ) -> Vec<(Expr<'db>, Expr<'db>)> {
        self.entries(db, function)
            .iter()
            .filter_map(|id| match id {
                Identity::Inflection {
                    reduction,
                    reconstruction,
                } => Some((*reduction, *reconstruction)),
                _ => None,
            })
            .collect()
    }

    pub fn period(
        &self,
        db: &'db dyn salsa::Database,
        function: FpCore<'db>,
    ) -> Option<(Expr<'db>, f64)> {
        self.entries(db, function).iter().find_map(|id| match id {
            Identity::Periodic { period, period_val } => Some((*period, *period_val)),
            _ => None,
        })
    }

    /// Identities of the usual suspects, enough for the worked examples.
    pub fn builtin(db: &'db dyn salsa::Database) -> Self {
        let mut table = Self::new();
        let x = Expr::var(db, "x");
        let y = Expr::var(db, "y");
        let zero = Expr::integer(db, 0);
        let pi = Expr::constant(db, Constant::Pi);
        let half_pi = Expr::constant(db, Constant::HalfPi);
        let two_pi = Expr::mul(db, Expr::integer(db, 2), pi);

        let x_sym = mason_fpcore::Symbol::new(db, "x".to_string());
        let core = |body: Expr<'db>| {
            let no_props: Vec<(String, mason_fpcore::PropValue<'db>)> = Vec::new();
            FpCore::new(db, vec![x_sym], no_props, body)
        };

        // asin: odd symmetry at zero, and the half-angle inflection that
        // moves the upper range onto [0, 1/2].
        let asin = core(Expr::op(db, Op::Asin, vec![x]));
        table.push(
            db,
            asin,
            Identity::Mirror {
                point: zero,
                point_val: 0.0,
                reconstruction: Expr::neg(db, y),
            },
        );
        let one = Expr::integer(db, 1);
        let two = Expr::integer(db, 2);
        let reduction = Expr::op(
            db,
            Op::Sqrt,
            vec![Expr::op(db, Op::Div, vec![Expr::sub(db, one, x), two])],
        );
        let reconstruction = Expr::sub(db, half_pi, Expr::mul(db, two, y));
        table.push(
            db,
            asin,
            Identity::Inflection {
                reduction,
                reconstruction,
            },
        );

        // sin: odd at zero, even about pi/2, 2*pi periodic.
        let sin = core(Expr::op(db, Op::Sin, vec![x]));
        table.push(
            db,
            sin,
            Identity::Mirror {
                point: zero,
                point_val: 0.0,
                reconstruction: Expr::neg(db, y),
            },
        );
        table.push(
            db,
            sin,
            Identity::Mirror {
                point: half_pi,
                point_val: std::f64::consts::FRAC_PI_2,
                reconstruction: y,
            },
        );
        table.push(
            db,
            sin,
            Identity::Periodic {
                period: two_pi,
                period_val: 2.0 * std::f64::consts::PI,
            },
        );

        // cos: even at zero, 2*pi periodic.
        let cos = core(Expr::op(db, Op::Cos, vec![x]));
        table.push(
            db,
            cos,
            Identity::Mirror {
                point: zero,
                point_val: 0.0,
                reconstruction: y,
            },
        );
        table.push(
            db,
            cos,
            Identity::Periodic {
                period: two_pi,
                period_val: 2.0 * std::f64::consts::PI,
            },
        );

        table
    }

    /// Load a table from the JSON interchange format produced by the
    /// identity miner. Expressions appear as FPCore strings.
    pub fn load_json(
        db: &'db dyn salsa::Database,
        text: &str,
    ) -> Result<Self, IdentityLoadError> {
        let file: IdentityFile =
            serde_json::from_str(text).map_err(|e| IdentityLoadError::Json(e.to_string()))?;
        let mut table = Self::new();
        for entry in file.functions {
            let function = parse_one(db, &entry.fpcore)
                .map_err(|e| IdentityLoadError::Expression(format!("{}: {e}", entry.fpcore)))?;
            for id in entry.identities {
                match id {
                    IdentityEntry::Mirror {
                        point,
                        reconstruction,
                    } => {
                        let point = parse_identity_expr(db, &point)?;
                        let reconstruction = parse_identity_expr(db, &reconstruction)?;
                        table.add_mirror(db, function, point, reconstruction)?;
                    }
                    IdentityEntry::Inflection {
                        reduction,
                        reconstruction,
                    } => {
                        let reduction = parse_identity_expr(db, &reduction)?;
                        let reconstruction = parse_identity_expr(db, &reconstruction)?;
                        table.add_inflection(db, function, reduction, reconstruction);
                    }
                    IdentityEntry::Periodic { period } => {
                        let period = parse_identity_expr(db, &period)?;
                        table.add_periodic(db, function, period)?;
                    }
                }
            }
        }
        Ok(table)
    }

    pub fn describe(&self, db: &'db dyn salsa::Database) -> String {
        let mut lines: Vec<String> = Vec::new();
        for (body, ids) in &self.map {
            lines.push(format!("{}: {} identities", to_egg_sexpr(db, *body), ids.len()));
        }
        lines.sort();
        lines.join("\n")
    }
}

fn parse_identity_expr<'db>(
    db: &'db dyn salsa::Database,
    text: &str,
) -> Result<Expr<'db>, IdentityLoadError> {
    parse_expr(db, text).map_err(|e| IdentityLoadError::Expression(format!("{text}: {e}")))
}

#[derive(Deserialize)]
struct IdentityFile {
    functions: Vec<IdentityFileEntry>,
}

#[derive(Deserialize)]
struct IdentityFileEntry {
    fpcore: String,
    identities: Vec<IdentityEntry>,
}

#[derive(Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
enum IdentityEntry {
    Mirror {
        point: String,
        reconstruction: String,
    },
    Inflection {
        reduction: String,
        reconstruction: String,
    },
    Periodic {
        period: String,
    },
}

#[cfg(test)]
mod tests {
    use super::*;
    use mason_core::MasonDatabaseImpl;

    #[test]
    fn unknown_functions_have_no_identities() {
        let db = MasonDatabaseImpl::default();
        let table = IdentityTable::builtin(&db);
        let exp = parse_one(&db, "(FPCore (x) (exp x))").unwrap();
        assert!(table.mirror_points(&db, exp).is_empty());
        assert!(table.period(&db, exp).is_none());
    }

    #[test]
    fn lookup_is_keyed_by_canonical_body() {
        let db = MasonDatabaseImpl::default();
        let table = IdentityTable::builtin(&db);
        // Different argument name, same mathematics.
        let asin_t = parse_one(&db, "(FPCore (t) (asin t))").unwrap();
        assert_eq!(table.mirror_points(&db, asin_t), vec![0.0]);
    }

    #[test]
    fn mirrors_at_uses_the_edge_tolerance() {
        let db = MasonDatabaseImpl::default();
        let table = IdentityTable::builtin(&db);
        let asin = parse_one(&db, "(FPCore (x) (asin x))").unwrap();
        assert_eq!(table.mirrors_at(&db, asin, 0.0).len(), 1);
        assert_eq!(table.mirrors_at(&db, asin, 1e-17).len(), 1);
        assert!(table.mirrors_at(&db, asin, 0.5).is_empty());
    }

    #[test]
    fn loads_json_tables() {
        let db = MasonDatabaseImpl::default();
        let table = IdentityTable::load_json(
            &db,
            r#"{
                "functions": [
                    {
                        "fpcore": "(FPCore (x) (sin x))",
                        "identities": [
                            {"kind": "mirror", "point": "PI_2", "reconstruction": "y"},
                            {"kind": "periodic", "period": "(* 2 PI)"}
                        ]
                    }
                ]
            }"#,
        )
        .unwrap();
        let sin = parse_one(&db, "(FPCore (x) (sin x))").unwrap();
        assert_eq!(table.mirror_points(&db, sin), vec![std::f64::consts::FRAC_PI_2]);
        let (_, period) = table.period(&db, sin).unwrap();
        assert_eq!(period, 2.0 * std::f64::consts::PI);
    }

    #[test]
    fn rejects_malformed_json() {
        let db = MasonDatabaseImpl::default();
        assert!(matches!(
            IdentityTable::load_json(&db, "{"),
            Err(IdentityLoadError::Json(_))
        ));
    }
}
