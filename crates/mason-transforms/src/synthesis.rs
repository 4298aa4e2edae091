//! Goal-directed enumeration of candidate constructions.
//!
//! Each transform can propose partially-built trees for a goal type: a
//! fresh instance of itself wrapping a hole for the sub-goal it would need.
//! The proposals are a cheap geometric filter, not a proof; every candidate
//! must still pass `type_check` once its holes are filled. Ranking and
//! search control belong to the caller, which can simply stop consuming.

use std::collections::BTreeMap;
use std::sync::Arc;

use tracing::debug;

use mason_fpcore::{Expr, Symbol, eval};

use crate::check::Side;
use crate::identities::{EDGE_TOLERANCE, IdentityTable};
use crate::interval::Interval;
use crate::node::Node;
use crate::types::OutType;

/// Cody–Waite defaults for synthesized periodic reductions.
const DEFAULT_BITS_PER: u32 = 30;
const DEFAULT_ENTRIES: u32 = 3;

/// Every candidate any transform proposes for `goal`.
pub fn candidates<'db>(
    db: &'db dyn salsa::Database,
    table: &IdentityTable<'db>,
    goal: &OutType<'db>,
) -> Vec<Arc<Node<'db>>> {
    let mut out = Vec::new();
    out.extend(horner_candidates(goal));
    out.extend(estrin_candidates(goal));
    out.extend(mirror_candidates(db, table, goal, Side::Right));
    out.extend(mirror_candidates(db, table, goal, Side::Left));
    out.extend(inflection_candidates(db, table, goal));
    out.extend(periodic_candidates(db, table, goal));
    out
}

/// A Horner evaluation can realize any `Impl` goal, given a polynomial for
/// the same function and domain.
pub fn horner_candidates<'db>(goal: &OutType<'db>) -> Vec<Arc<Node<'db>>> {
    let OutType::Impl { function, domain } = goal else {
        return Vec::new();
    };
    vec![Node::horner(
        Node::hole(OutType::Poly {
            function: *function,
            domain: domain.clone(),
        }),
        0,
    )]
}

/// Estrin evaluation is only proposed for finite domains.
pub fn estrin_candidates<'db>(goal: &OutType<'db>) -> Vec<Arc<Node<'db>>> {
    let OutType::Impl { function, domain } = goal else {
        return Vec::new();
    };
    if !domain.is_finite() {
        return Vec::new();
    }
    vec![Node::estrin(
        Node::hole(OutType::Poly {
            function: *function,
            domain: domain.clone(),
        }),
        0,
    )]
}

/// Mirror candidates: for each registered mirror point inside the goal
/// domain, the sub-goal is the half of the goal on the proven side of the
/// point. Four geometric cases decide whether doubling lands exactly on
/// the goal, falls short, gains nothing, or overshoots and needs a
/// narrowing wrapper; a doubly-infinite goal accepts every point.
pub fn mirror_candidates<'db>(
    db: &'db dyn salsa::Database,
    table: &IdentityTable<'db>,
    goal: &OutType<'db>,
    side: Side,
) -> Vec<Arc<Node<'db>>> {
    let OutType::Impl { function, domain } = goal else {
        return Vec::new();
    };
    let wrap = |hole: Arc<Node<'db>>| match side {
        Side::Right => Node::mirror_right(hole),
        Side::Left => Node::mirror_left(hole),
    };

    let mut out = Vec::new();
    for point in table.mirror_points(db, *function) {
        if !domain.contains(point) {
            continue;
        }
        let in_domain = match side {
            Side::Right => Interval::new(db, domain.inf(), Expr::from_f64(db, point)),
            Side::Left => Interval::new(db, Expr::from_f64(db, point), domain.sup()),
        };
        let Ok(in_domain) = in_domain else { continue };
        let in_goal = OutType::Impl {
            function: *function,
            domain: in_domain.clone(),
        };

        if domain.inf_val() == f64::NEG_INFINITY && domain.sup_val() == f64::INFINITY {
            out.push(wrap(Node::hole(in_goal)));
            continue;
        }

        let (reached, target) = match side {
            Side::Right => (point + in_domain.width_val(), domain.sup_val()),
            Side::Left => (point - in_domain.width_val(), domain.inf_val()),
        };
        if (reached - target).abs() < EDGE_TOLERANCE {
            out.push(wrap(Node::hole(in_goal)));
            continue;
        }
        let falls_short = match side {
            Side::Right => reached < target,
            Side::Left => reached > target,
        };
        if falls_short {
            continue;
        }
        if (point - target).abs() < EDGE_TOLERANCE {
            // Mirroring at the far edge reproduces the goal domain itself.
            continue;
        }
        out.push(Node::narrow(wrap(Node::hole(in_goal)), domain.clone()));
    }
    out
}

/// Inflection candidates from registered identities. The rightward
/// sub-goal is the image of the goal under the reduction; the leftward
/// sub-goal runs from the reduction's fixed point to the goal's upper
/// edge.
pub fn inflection_candidates<'db>(
    db: &'db dyn salsa::Database,
    table: &IdentityTable<'db>,
    goal: &OutType<'db>,
) -> Vec<Arc<Node<'db>>> {
    let OutType::Impl { function, domain } = goal else {
        return Vec::new();
    };
    if !domain.is_finite() {
        return Vec::new();
    }
    let x = Symbol::new(db, "x".to_string());

    let mut out = Vec::new();
    for (reduction, reconstruction) in table.inflections(db, *function) {
        let g = |v: f64| {
            let mut bindings = BTreeMap::new();
            bindings.insert(x, v);
            eval(db, reduction, &bindings).ok().filter(|r| r.is_finite())
        };

        if let (Some(a), Some(b)) = (g(domain.sup_val()), g(domain.inf_val())) {
            let (lo, hi) = if a <= b { (a, b) } else { (b, a) };
            if let Ok(sub) = Interval::of_f64(db, lo, hi) {
                out.push(Node::inflection_right(
                    Node::hole(OutType::Impl {
                        function: *function,
                        domain: sub,
                    }),
                    reduction,
                    reconstruction,
                    false,
                ));
            }
        }

        if let Some(fix) = crate::numerics::bisect_root(
            |v| g(v).map(|r| r - v),
            domain.inf_val(),
            domain.sup_val(),
        ) && let Ok(sub) = Interval::new(db, Expr::from_f64(db, fix), domain.sup())
        {
            out.push(Node::inflection_left(
                Node::hole(OutType::Impl {
                    function: *function,
                    domain: sub,
                }),
                reduction,
                reconstruction,
            ));
        }
    }
    out
}

/// A registered period narrower than the goal domain admits Cody–Waite
/// range reduction down to a single aligned period.
pub fn periodic_candidates<'db>(
    db: &'db dyn salsa::Database,
    table: &IdentityTable<'db>,
    goal: &OutType<'db>,
) -> Vec<Arc<Node<'db>>> {
    let OutType::Impl { function, domain } = goal else {
        return Vec::new();
    };
    let Some((period, period_val)) = table.period(db, *function) else {
        return Vec::new();
    };
    if domain.width_val() <= period_val {
        return Vec::new();
    }
    let Ok(sub) = Interval::new(db, Expr::integer(db, 0), period) else {
        return Vec::new();
    };
    vec![Node::periodic(
        Node::hole(OutType::Impl {
            function: *function,
            domain: sub,
        }),
        period,
        DEFAULT_BITS_PER,
        DEFAULT_ENTRIES,
    )]
}

/// Depth-limited expansion: repeatedly substitute candidates for the first
/// hole. Trees whose first hole has no candidates (e.g. polynomial goals,
/// which are external tuning work) are yielded as-is.
pub fn expand<'db>(
    db: &'db dyn salsa::Database,
    table: &IdentityTable<'db>,
    root: &Arc<Node<'db>>,
    depth: u32,
) -> Vec<Arc<Node<'db>>> {
    let Some(hole) = root.first_hole() else {
        return vec![root.clone()];
    };
    if depth == 0 {
        return vec![root.clone()];
    }
    let Node::Hole { goal } = &*hole else {
        return vec![root.clone()];
    };
    let cands = candidates(db, table, goal);
    debug!(candidates = cands.len(), goal = %goal.describe(db), "expanding hole");
    if cands.is_empty() {
        return vec![root.clone()];
    }
    let mut out = Vec::new();
    for cand in cands {
        let new_root = root.replace(&hole, &cand);
        out.extend(expand(db, table, &new_root, depth - 1));
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use mason_core::MasonDatabaseImpl;
    use mason_fpcore::parse_one;

    fn impl_goal<'db>(
        db: &'db MasonDatabaseImpl,
        body: &str,
        lo: &str,
        hi: &str,
    ) -> OutType<'db> {
        OutType::Impl {
            function: parse_one(db, body).unwrap(),
            domain: Interval::parse(db, lo, hi).unwrap(),
        }
    }

    #[test]
    fn mirror_right_on_an_infinite_goal_halves_it() {
        let db = MasonDatabaseImpl::default();
        let table = IdentityTable::builtin(&db);
        let goal = impl_goal(&db, "(FPCore (x) (asin x))", "(- INFINITY)", "INFINITY");
        let cands = mirror_candidates(&db, &table, &goal, Side::Right);
        assert_eq!(cands.len(), 1);
        let Node::MirrorRight { inner } = &*cands[0] else {
            panic!("expected a mirror candidate");
        };
        let Node::Hole { goal: sub } = &**inner else {
            panic!("expected a hole under the mirror");
        };
        assert_eq!(sub.domain().inf_val(), f64::NEG_INFINITY);
        assert_eq!(sub.domain().sup_val(), 0.0);
    }

    #[test]
    fn no_identities_means_no_mirror_candidates() {
        let db = MasonDatabaseImpl::default();
        let table = IdentityTable::new();
        let goal = impl_goal(&db, "(FPCore (x) (asin x))", "(- INFINITY)", "INFINITY");
        assert!(mirror_candidates(&db, &table, &goal, Side::Right).is_empty());
    }

    #[test]
    fn mirror_exact_match_needs_no_narrowing() {
        let db = MasonDatabaseImpl::default();
        let table = IdentityTable::builtin(&db);
        let goal = impl_goal(&db, "(FPCore (x) (asin x))", "-1", "1");
        let cands = mirror_candidates(&db, &table, &goal, Side::Right);
        assert_eq!(cands.len(), 1);
        assert!(matches!(&*cands[0], Node::MirrorRight { .. }));
    }

    #[test]
    fn mirror_overshoot_is_wrapped_in_narrow() {
        let db = MasonDatabaseImpl::default();
        let table = IdentityTable::builtin(&db);
        let goal = impl_goal(&db, "(FPCore (x) (asin x))", "-2", "1");
        let cands = mirror_candidates(&db, &table, &goal, Side::Right);
        assert_eq!(cands.len(), 1);
        let Node::Narrow { inner, target } = &*cands[0] else {
            panic!("expected narrowing");
        };
        assert_eq!(target.inf_val(), -2.0);
        assert_eq!(target.sup_val(), 1.0);
        assert!(matches!(&**inner, Node::MirrorRight { .. }));
    }

    #[test]
    fn mirror_falling_short_is_not_proposed() {
        let db = MasonDatabaseImpl::default();
        let table = IdentityTable::builtin(&db);
        let goal = impl_goal(&db, "(FPCore (x) (asin x))", "-1", "3");
        assert!(mirror_candidates(&db, &table, &goal, Side::Right).is_empty());
    }

    #[test]
    fn mirror_at_the_goal_edge_gains_nothing() {
        let db = MasonDatabaseImpl::default();
        let table = IdentityTable::builtin(&db);
        let goal = impl_goal(&db, "(FPCore (x) (asin x))", "-1", "0");
        assert!(mirror_candidates(&db, &table, &goal, Side::Right).is_empty());
    }

    #[test]
    fn estrin_skips_infinite_domains() {
        let db = MasonDatabaseImpl::default();
        let goal = impl_goal(&db, "(FPCore (x) (asin x))", "(- INFINITY)", "INFINITY");
        assert!(estrin_candidates(&goal).is_empty());
        assert_eq!(horner_candidates(&goal).len(), 1);
    }

    #[test]
    fn periodic_candidate_reduces_to_one_period() {
        let db = MasonDatabaseImpl::default();
        let table = IdentityTable::builtin(&db);
        let goal = impl_goal(&db, "(FPCore (x) (sin x))", "-1e10", "1e10");
        let cands = periodic_candidates(&db, &table, &goal);
        assert_eq!(cands.len(), 1);
        let Node::Periodic { inner, .. } = &*cands[0] else {
            panic!("expected a periodic candidate");
        };
        let Node::Hole { goal: sub } = &**inner else {
            panic!("expected a hole under the reduction");
        };
        assert_eq!(sub.domain().inf_val(), 0.0);
        assert_eq!(sub.domain().sup_val(), 2.0 * std::f64::consts::PI);
    }

    #[test]
    fn inflection_candidates_cover_both_sides() {
        let db = MasonDatabaseImpl::default();
        let table = IdentityTable::builtin(&db);
        let goal = impl_goal(&db, "(FPCore (x) (asin x))", "0.5", "1");
        let cands = inflection_candidates(&db, &table, &goal);
        assert!(
            cands
                .iter()
                .any(|c| matches!(&**c, Node::InflectionRight { .. }))
        );
        // The rightward sub-goal is the image of [0.5, 1] under the
        // half-angle reduction, i.e. [0, 0.5].
        let right = cands
            .iter()
            .find_map(|c| match &**c {
                Node::InflectionRight { inner, .. } => match &**inner {
                    Node::Hole { goal } => Some(goal.domain().clone()),
                    _ => None,
                },
                _ => None,
            })
            .unwrap();
        assert_eq!(right.inf_val(), 0.0);
        assert_eq!(right.sup_val(), 0.5);
    }

    #[test]
    fn expansion_leaves_polynomial_goals_as_holes() {
        let db = MasonDatabaseImpl::default();
        let table = IdentityTable::builtin(&db);
        let goal = impl_goal(&db, "(FPCore (x) (asin x))", "-1", "1");
        let trees = expand(&db, &table, &Node::hole(goal), 2);
        assert!(!trees.is_empty());
        // Expansion proposes both direct evaluation and the mirrored shape.
        assert!(trees.iter().any(|t| t.describe(&db).contains("Horner")));
        assert!(trees.iter().any(|t| t.describe(&db).contains("MirrorRight")));
    }
}
