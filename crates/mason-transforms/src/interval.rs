//! Closed real intervals over exact symbolic bounds.
//!
//! Bounds stay symbolic (`PI_2`, `(- 1 1e-9)`, ...) so nothing is lost
//! until a comparison forces them; the forced `f64` values are cached at
//! construction, since the ordering invariant has to evaluate both bounds
//! anyway.

use mason_fpcore::render::to_libm_c;
use mason_fpcore::{Expr, eval_closed, parse_expr, try_int};

use crate::errors::{CheckError, CheckResult};

#[derive(Clone, Debug)]
pub struct Interval<'db> {
    inf: Expr<'db>,
    sup: Expr<'db>,
    inf_val: f64,
    sup_val: f64,
}

impl PartialEq for Interval<'_> {
    fn eq(&self, other: &Self) -> bool {
        self.inf == other.inf && self.sup == other.sup
    }
}

impl<'db> Interval<'db> {
    /// Build an interval, canonicalizing integral bounds to integer
    /// literals. Fails with a domain error when a bound does not evaluate
    /// or the bounds are out of order.
    pub fn new(db: &'db dyn salsa::Database, inf: Expr<'db>, sup: Expr<'db>) -> CheckResult<Self> {
        let inf = canonicalize(db, inf);
        let sup = canonicalize(db, sup);
        let inf_val = force(db, inf)?;
        let sup_val = force(db, sup)?;
        if !(inf_val <= sup_val) {
            return Err(CheckError::domain(format!(
                "interval bounds out of order: [{}, {}]",
                to_libm_c(db, inf),
                to_libm_c(db, sup)
            )));
        }
        Ok(Interval {
            inf,
            sup,
            inf_val,
            sup_val,
        })
    }

    /// Parse both bounds as FPCore expressions.
    pub fn parse(db: &'db dyn salsa::Database, inf: &str, sup: &str) -> CheckResult<Self> {
        let inf = parse_expr(db, inf).map_err(|e| CheckError::domain(format!("bad bound '{inf}': {e}")))?;
        let sup = parse_expr(db, sup).map_err(|e| CheckError::domain(format!("bad bound '{sup}': {e}")))?;
        Self::new(db, inf, sup)
    }

    pub fn of_f64(db: &'db dyn salsa::Database, inf: f64, sup: f64) -> CheckResult<Self> {
        Self::new(db, Expr::from_f64(db, inf), Expr::from_f64(db, sup))
    }

    fn from_parts(inf: Expr<'db>, sup: Expr<'db>, inf_val: f64, sup_val: f64) -> Self {
        debug_assert!(inf_val <= sup_val);
        Interval {
            inf,
            sup,
            inf_val,
            sup_val,
        }
    }

    pub fn inf(&self) -> Expr<'db> {
        self.inf
    }

    pub fn sup(&self) -> Expr<'db> {
        self.sup
    }

    pub fn inf_val(&self) -> f64 {
        self.inf_val
    }

    pub fn sup_val(&self) -> f64 {
        self.sup_val
    }

    pub fn width(&self, db: &'db dyn salsa::Database) -> Expr<'db> {
        Expr::sub(db, self.sup, self.inf)
    }

    pub fn width_val(&self) -> f64 {
        self.sup_val - self.inf_val
    }

    pub fn is_finite(&self) -> bool {
        self.inf_val.is_finite() && self.sup_val.is_finite()
    }

    /// The interval of `|x|` for `x` in `self`.
    ///
    /// An entirely negative interval collapses to the point `[-sup, -sup]`:
    /// the extreme magnitude survives but the width is discarded. Callers
    /// that need more than the extreme must not rely on this case.
    pub fn abs(&self, db: &'db dyn salsa::Database) -> Interval<'db> {
        if self.inf_val >= 0.0 {
            return self.clone();
        }
        if self.sup_val >= 0.0 {
            let neg_inf = canonicalize(db, Expr::neg(db, self.inf));
            let (sup, sup_val) = if -self.inf_val > self.sup_val {
                (neg_inf, -self.inf_val)
            } else {
                (self.sup, self.sup_val)
            };
            return Interval::from_parts(Expr::integer(db, 0), sup, 0.0, sup_val);
        }
        let m = canonicalize(db, Expr::neg(db, self.sup));
        Interval::from_parts(m, m, -self.sup_val, -self.sup_val)
    }

    /// Closed-interval membership of a plain point.
    pub fn contains(&self, x: f64) -> bool {
        self.inf_val <= x && x <= self.sup_val
    }

    /// Conservative containment of a point that carries rounding
    /// uncertainty `[lo, hi]`: true only when the whole uncertainty range
    /// fits.
    pub fn contains_interval(&self, lo: f64, hi: f64) -> bool {
        self.inf_val <= lo && hi <= self.sup_val
    }

    pub fn contains_domain(&self, other: &Interval<'db>) -> bool {
        self.contains_interval(other.inf_val, other.sup_val)
    }

    /// Translate by `k` times this interval's own width.
    pub fn shift(&self, db: &'db dyn salsa::Database, k: f64) -> CheckResult<Interval<'db>> {
        let by = Expr::mul(db, Expr::from_f64(db, k), self.width(db));
        Interval::new(db, Expr::add(db, self.inf, by), Expr::add(db, self.sup, by))
    }

    /// Partition into ordered sub-intervals of width at most `period`,
    /// starting at `inf`.
    pub fn split(&self, db: &'db dyn salsa::Database, period: f64) -> CheckResult<Vec<Interval<'db>>> {
        self.aligned_split(db, period, self.inf_val)
    }

    /// Partition into ordered sub-intervals of width at most `period`, with
    /// piece boundaries pinned to the lattice `edge + k * period` so that
    /// splits of different sub-ranges of a periodic domain line up. A
    /// zero-width leading piece is dropped.
    pub fn aligned_split(
        &self,
        db: &'db dyn salsa::Database,
        period: f64,
        edge: f64,
    ) -> CheckResult<Vec<Interval<'db>>> {
        if !(period > 0.0) {
            return Err(CheckError::domain(format!("split period must be positive, got {period}")));
        }
        if !(self.inf_val <= edge && edge <= self.sup_val) {
            return Err(CheckError::domain(format!(
                "split edge {edge} outside {}",
                self.describe(db)
            )));
        }

        let mut pieces = Vec::new();
        let k = ((edge - self.inf_val) / period).floor();
        let first_sup = (edge - k * period).min(self.sup_val);
        if first_sup - self.inf_val != 0.0 {
            pieces.push(Interval::from_parts(
                self.inf,
                self.bound_expr(db, first_sup),
                self.inf_val,
                first_sup,
            ));
        }

        let start = first_sup;
        let mut sup = first_sup;
        let mut i = 0u32;
        while sup < self.sup_val {
            let lo = start + f64::from(i) * period;
            sup = (start + f64::from(i + 1) * period).min(self.sup_val);
            pieces.push(Interval::from_parts(
                self.bound_expr(db, lo),
                self.bound_expr(db, sup),
                lo,
                sup,
            ));
            i += 1;
        }

        Ok(pieces)
    }

    /// Reuse the symbolic bound when a split boundary lands exactly on it.
    fn bound_expr(&self, db: &'db dyn salsa::Database, v: f64) -> Expr<'db> {
        if v == self.inf_val {
            self.inf
        } else if v == self.sup_val {
            self.sup
        } else {
            Expr::from_f64(db, v)
        }
    }

    pub fn describe(&self, db: &'db dyn salsa::Database) -> String {
        format!("[{}, {}]", to_libm_c(db, self.inf), to_libm_c(db, self.sup))
    }
}

fn canonicalize<'db>(db: &'db dyn salsa::Database, e: Expr<'db>) -> Expr<'db> {
    match try_int(db, e) {
        Some(n) => Expr::integer(db, n),
        None => e,
    }
}

fn force<'db>(db: &'db dyn salsa::Database, e: Expr<'db>) -> CheckResult<f64> {
    let v = eval_closed(db, e)
        .map_err(|err| CheckError::domain(format!("bound does not evaluate: {err}")))?;
    if v.is_nan() {
        return Err(CheckError::domain(format!(
            "bound evaluates to NaN: {}",
            to_libm_c(db, e)
        )));
    }
    Ok(v)
}
