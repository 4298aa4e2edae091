//! Bottom-up type checking of construction trees.
//!
//! `type_check` is the single soundness gate. It validates each node's
//! input kind and transform-specific precondition, resolves the domain the
//! node is proven on, and returns a `Typed` tree. Lowering is defined only
//! on `Typed`, so an unchecked construction cannot reach code generation.

use std::collections::BTreeMap;
use std::sync::Arc;

use tracing::debug;

use mason_core::split_residual;
use mason_fpcore::render::to_egg_sexpr;
use mason_fpcore::{Constant, Expr, FpCore, Symbol, eval, eval_closed};

use crate::errors::{CheckError, CheckResult};
use crate::identities::{EDGE_TOLERANCE, IdentityTable};
use crate::interval::Interval;
use crate::node::Node;
use crate::numerics::solve_preimage;
use crate::types::OutType;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Scheme {
    Horner,
    Estrin,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Side {
    Left,
    Right,
}

/// Fixed approximation data carried by a source leaf.
#[derive(Clone, Debug)]
pub enum PolyData<'db> {
    Single {
        exponents: Vec<u32>,
        coefficients: Vec<Expr<'db>>,
    },
    Rational {
        combiner: FpCore<'db>,
        p_exponents: Vec<u32>,
        p_coefficients: Vec<Expr<'db>>,
        q_exponents: Vec<u32>,
        q_coefficients: Vec<Expr<'db>>,
    },
}

/// A construction that passed `type_check`, with every node's resolved
/// result type and the transform data lowering needs.
#[derive(Debug)]
pub struct Typed<'db> {
    pub out_type: OutType<'db>,
    pub kind: TypedKind<'db>,
}

#[derive(Debug)]
pub enum TypedKind<'db> {
    Source {
        poly: PolyData<'db>,
    },
    Polynomial {
        poly: PolyData<'db>,
        scheme: Scheme,
        split: u32,
    },
    Narrow {
        inner: Box<Typed<'db>>,
    },
    Mirror {
        inner: Box<Typed<'db>>,
        side: Side,
        point: f64,
        reconstruction: Expr<'db>,
    },
    Inflection {
        inner: Box<Typed<'db>>,
        side: Side,
        reduction: Expr<'db>,
        reconstruction: Expr<'db>,
        use_dd: bool,
    },
    TransformOut {
        inner: Box<Typed<'db>>,
        expr: Expr<'db>,
    },
    SplitDomain {
        branches: Vec<(Interval<'db>, Typed<'db>)>,
    },
    Periodic {
        inner: Box<Typed<'db>>,
        period: f64,
        bits_per: u32,
        entries: u32,
    },
}

pub fn type_check<'db>(
    db: &'db dyn salsa::Database,
    table: &IdentityTable<'db>,
    node: &Node<'db>,
) -> CheckResult<Typed<'db>> {
    match node {
        Node::FixedPolynomial {
            function,
            domain,
            exponents,
            coefficients,
        } => {
            check_terms("FixedPolynomial", exponents, coefficients)?;
            Ok(Typed {
                out_type: OutType::Poly {
                    function: *function,
                    domain: domain.clone(),
                },
                kind: TypedKind::Source {
                    poly: PolyData::Single {
                        exponents: exponents.clone(),
                        coefficients: coefficients.clone(),
                    },
                },
            })
        }
        Node::FixedMultiPolynomial {
            function,
            domain,
            combiner,
            p_exponents,
            p_coefficients,
            q_exponents,
            q_coefficients,
        } => {
            check_terms("FixedMultiPolynomial", p_exponents, p_coefficients)?;
            check_terms("FixedMultiPolynomial", q_exponents, q_coefficients)?;
            if combiner.args(db).len() != 3 {
                return Err(CheckError::precondition(format!(
                    "FixedMultiPolynomial combiner must take (x p q), takes {} arguments",
                    combiner.args(db).len()
                )));
            }
            Ok(Typed {
                out_type: OutType::Poly {
                    function: *function,
                    domain: domain.clone(),
                },
                kind: TypedKind::Source {
                    poly: PolyData::Rational {
                        combiner: *combiner,
                        p_exponents: p_exponents.clone(),
                        p_coefficients: p_coefficients.clone(),
                        q_exponents: q_exponents.clone(),
                        q_coefficients: q_coefficients.clone(),
                    },
                },
            })
        }
        Node::Horner { inner, split } => scheme_check(db, table, inner, Scheme::Horner, *split),
        Node::Estrin { inner, split } => scheme_check(db, table, inner, Scheme::Estrin, *split),
        Node::Narrow { inner, target } => {
            let t = type_check(db, table, inner)?;
            let (function, domain) = expect_impl("Narrow", &t)?;
            if !domain.contains_domain(target) {
                return Err(CheckError::domain(format!(
                    "Narrow target {} is not contained in the proven domain {}",
                    target.describe(db),
                    domain.describe(db)
                )));
            }
            Ok(Typed {
                out_type: OutType::Impl {
                    function,
                    domain: target.clone(),
                },
                kind: TypedKind::Narrow { inner: Box::new(t) },
            })
        }
        Node::MirrorLeft { inner } => mirror_check(db, table, inner, Side::Left),
        Node::MirrorRight { inner } => mirror_check(db, table, inner, Side::Right),
        Node::InflectionLeft {
            inner,
            reduction,
            reconstruction,
            use_dd,
        } => inflection_check(db, table, inner, Side::Left, *reduction, *reconstruction, *use_dd),
        Node::InflectionRight {
            inner,
            reduction,
            reconstruction,
            use_dd,
        } => inflection_check(db, table, inner, Side::Right, *reduction, *reconstruction, *use_dd),
        Node::TransformOut { inner, expr } => {
            let t = type_check(db, table, inner)?;
            let (function, domain) = expect_impl("TransformOut", &t)?;
            let y = Symbol::new(db, "y".to_string());
            if !expr.contains_var(db, y) {
                return Err(CheckError::precondition(format!(
                    "TransformOut expression must reference y: {}",
                    to_egg_sexpr(db, *expr)
                )));
            }
            let new_body = expr.substitute(db, y, function.body(db));
            let no_props: Vec<(String, mason_fpcore::PropValue<'db>)> = Vec::new();
            let new_function = FpCore::new(db, function.args(db).clone(), no_props, new_body);
            let domain = domain.clone();
            Ok(Typed {
                out_type: OutType::Impl {
                    function: new_function,
                    domain,
                },
                kind: TypedKind::TransformOut {
                    inner: Box::new(t),
                    expr: *expr,
                },
            })
        }
        Node::SplitDomain { branches } => split_check(db, table, branches),
        Node::Periodic {
            inner,
            period,
            bits_per,
            entries,
        } => periodic_check(db, table, inner, *period, *bits_per, *entries),
        Node::Hole { goal } => Err(CheckError::incomplete(format!(
            "unfilled hole with goal {}",
            goal.describe(db)
        ))),
    }
}

fn expect_impl<'a, 'db>(
    context: &'static str,
    t: &'a Typed<'db>,
) -> CheckResult<(FpCore<'db>, &'a Interval<'db>)> {
    match &t.out_type {
        OutType::Impl { function, domain } => Ok((*function, domain)),
        OutType::Poly { .. } => Err(CheckError::type_mismatch(context, "Impl", "Poly")),
    }
}

fn check_terms(
    context: &'static str,
    exponents: &[u32],
    coefficients: &[Expr<'_>],
) -> CheckResult<()> {
    if exponents.is_empty() {
        return Err(CheckError::precondition(format!("{context} needs at least one term")));
    }
    if exponents.len() != coefficients.len() {
        return Err(CheckError::precondition(format!(
            "{context} has {} exponents but {} coefficients",
            exponents.len(),
            coefficients.len()
        )));
    }
    if !exponents.windows(2).all(|w| w[0] < w[1]) {
        return Err(CheckError::precondition(format!(
            "{context} exponents must be strictly increasing"
        )));
    }
    Ok(())
}

fn scheme_check<'db>(
    db: &'db dyn salsa::Database,
    table: &IdentityTable<'db>,
    inner: &Node<'db>,
    scheme: Scheme,
    split: u32,
) -> CheckResult<Typed<'db>> {
    let context = match scheme {
        Scheme::Horner => "Horner",
        Scheme::Estrin => "Estrin",
    };
    let t = type_check(db, table, inner)?;
    let Typed { out_type, kind } = t;
    let found = out_type.kind_name();
    let OutType::Poly { function, domain } = out_type else {
        return Err(CheckError::type_mismatch(context, "Poly", found));
    };
    let TypedKind::Source { poly } = kind else {
        return Err(CheckError::type_mismatch(context, "Poly", "a transformed result"));
    };
    Ok(Typed {
        out_type: OutType::Impl { function, domain },
        kind: TypedKind::Polynomial { poly, scheme, split },
    })
}

fn mirror_check<'db>(
    db: &'db dyn salsa::Database,
    table: &IdentityTable<'db>,
    inner: &Node<'db>,
    side: Side,
) -> CheckResult<Typed<'db>> {
    let context = match side {
        Side::Left => "MirrorLeft",
        Side::Right => "MirrorRight",
    };
    let t = type_check(db, table, inner)?;
    let (function, domain) = expect_impl(context, &t)?;
    let point = match side {
        Side::Right => domain.sup_val(),
        Side::Left => domain.inf_val(),
    };
    let mut recons = table.mirrors_at(db, function, point);
    if recons.is_empty() {
        return Err(CheckError::precondition(format!(
            "{context} requires that {} is mirrored about x = {point}; proven domain {}",
            to_egg_sexpr(db, function.canonical_body(db)),
            domain.describe(db)
        )));
    }
    let reconstruction = recons.swap_remove(0);
    debug!(context, point, "mirror identity found");

    let width = domain.width(db);
    let new_domain = match side {
        Side::Right => Interval::new(db, domain.inf(), Expr::add(db, domain.sup(), width))?,
        Side::Left => Interval::new(db, Expr::sub(db, domain.inf(), width), domain.sup())?,
    };
    Ok(Typed {
        out_type: OutType::Impl {
            function,
            domain: new_domain,
        },
        kind: TypedKind::Mirror {
            inner: Box::new(t),
            side,
            point,
            reconstruction,
        },
    })
}

fn inflection_check<'db>(
    db: &'db dyn salsa::Database,
    table: &IdentityTable<'db>,
    inner: &Node<'db>,
    side: Side,
    reduction: Expr<'db>,
    reconstruction: Expr<'db>,
    use_dd: bool,
) -> CheckResult<Typed<'db>> {
    let context = match side {
        Side::Left => "InflectionLeft",
        Side::Right => "InflectionRight",
    };
    let t = type_check(db, table, inner)?;
    let (function, domain) = expect_impl(context, &t)?;

    let x = Symbol::new(db, "x".to_string());
    let y = Symbol::new(db, "y".to_string());
    if !reduction.contains_var(db, x) {
        return Err(CheckError::precondition(format!(
            "{context} reduction must be a substitution of x: {}",
            to_egg_sexpr(db, reduction)
        )));
    }
    if !reconstruction.contains_var(db, y) {
        return Err(CheckError::precondition(format!(
            "{context} reconstruction must be a substitution of y: {}",
            to_egg_sexpr(db, reconstruction)
        )));
    }

    let g = |v: f64| {
        let mut bindings = BTreeMap::new();
        bindings.insert(x, v);
        eval(db, reduction, &bindings).ok().filter(|r| !r.is_nan())
    };

    // The seam is the edge shared with the inner domain; the far edge is
    // the numeric preimage of the inner domain's opposite end under the
    // reduction.
    let (seam, dir, far_target) = match side {
        Side::Right => (domain.sup_val(), 1.0, domain.inf_val()),
        Side::Left => (domain.inf_val(), -1.0, domain.sup_val()),
    };
    let seam_image = g(seam).ok_or_else(|| {
        CheckError::precondition(format!(
            "{context} reduction is undefined at the seam x = {seam}"
        ))
    })?;
    if !domain.contains(seam_image) {
        return Err(CheckError::precondition(format!(
            "{context} reduction maps the seam {seam} to {seam_image}, outside the proven domain {}",
            domain.describe(db)
        )));
    }
    let edge = solve_preimage(g, seam, dir, far_target).ok_or_else(|| {
        CheckError::precondition(format!(
            "{context} reduction never reaches the far edge {far_target} of {}",
            domain.describe(db)
        ))
    })?;
    debug!(context, seam, edge, "reduction preimage located");

    let new_domain = match side {
        Side::Right => Interval::new(db, domain.sup(), Expr::from_f64(db, edge))?,
        Side::Left => Interval::new(db, Expr::from_f64(db, edge), domain.sup())?,
    };
    Ok(Typed {
        out_type: OutType::Impl {
            function,
            domain: new_domain,
        },
        kind: TypedKind::Inflection {
            inner: Box::new(t),
            side,
            reduction,
            reconstruction,
            use_dd,
        },
    })
}

fn split_check<'db>(
    db: &'db dyn salsa::Database,
    table: &IdentityTable<'db>,
    branches: &[(Interval<'db>, Arc<Node<'db>>)],
) -> CheckResult<Typed<'db>> {
    if branches.is_empty() {
        return Err(CheckError::precondition("SplitDomain requires at least one branch"));
    }
    let mut checked: Vec<(Interval<'db>, Typed<'db>)> = Vec::new();
    for (key, node) in branches {
        let t = type_check(db, table, node)?;
        let (_, domain) = expect_impl("SplitDomain", &t)?;
        if !domain.contains_domain(key) {
            return Err(CheckError::domain(format!(
                "SplitDomain branch proves {} but is asked to cover {}",
                domain.describe(db),
                key.describe(db)
            )));
        }
        checked.push((key.clone(), t));
    }

    let first_body = checked[0].1.out_type.function().canonical_body(db);
    for (_, t) in &checked {
        if t.out_type.function().canonical_body(db) != first_body {
            return Err(CheckError::precondition(
                "SplitDomain branches implement different functions",
            ));
        }
    }

    checked.sort_by(|a, b| a.0.inf_val().total_cmp(&b.0.inf_val()));
    for pair in checked.windows(2) {
        let (lo, hi) = (&pair[0].0, &pair[1].0);
        if lo.sup_val() != hi.inf_val() {
            return Err(CheckError::precondition(format!(
                "SplitDomain branches {} and {} do not tile: sub-domains must share edges with no gaps or overlaps",
                lo.describe(db),
                hi.describe(db)
            )));
        }
    }

    let union = Interval::new(
        db,
        checked[0].0.inf(),
        checked[checked.len() - 1].0.sup(),
    )?;
    let function = checked[0].1.out_type.function();
    Ok(Typed {
        out_type: OutType::Impl {
            function,
            domain: union,
        },
        kind: TypedKind::SplitDomain { branches: checked },
    })
}

fn periodic_check<'db>(
    db: &'db dyn salsa::Database,
    table: &IdentityTable<'db>,
    inner: &Node<'db>,
    period: Expr<'db>,
    bits_per: u32,
    entries: u32,
) -> CheckResult<Typed<'db>> {
    let t = type_check(db, table, inner)?;
    let (function, domain) = expect_impl("Periodic", &t)?;

    let period_val = eval_closed(db, period)
        .map_err(|e| CheckError::precondition(format!("Periodic period does not evaluate: {e}")))?;
    if !period_val.is_finite() || !(period_val > 0.0) {
        return Err(CheckError::precondition(format!(
            "Periodic period must be positive and finite, got {period_val}"
        )));
    }
    let Some((_, registered)) = table.period(db, function) else {
        return Err(CheckError::precondition(format!(
            "no periodic identity registered for {}",
            to_egg_sexpr(db, function.canonical_body(db))
        )));
    };
    if (registered - period_val).abs() >= EDGE_TOLERANCE {
        return Err(CheckError::precondition(format!(
            "period {period_val} does not match the registered period {registered}"
        )));
    }
    if !domain.contains_interval(0.0, period_val) {
        return Err(CheckError::precondition(format!(
            "Periodic needs an implementation covering [0, {period_val}], got {}",
            domain.describe(db)
        )));
    }
    if bits_per == 0 || entries == 0 {
        return Err(CheckError::precondition(
            "Cody-Waite decomposition needs at least one limb of at least one bit",
        ));
    }
    if split_residual(period_val, bits_per, entries) != 0.0 {
        return Err(CheckError::precondition(format!(
            "period {period_val} does not decompose losslessly into {entries} limbs of {bits_per} bits"
        )));
    }

    let inf = Expr::constant(db, Constant::Infinity);
    let new_domain = Interval::new(db, Expr::neg(db, inf), inf)?;
    Ok(Typed {
        out_type: OutType::Impl {
            function,
            domain: new_domain,
        },
        kind: TypedKind::Periodic {
            inner: Box::new(t),
            period: period_val,
            bits_per,
            entries,
        },
    })
}
