//! Construction trees.
//!
//! A construction is a tree of `Node`s rooted at the implementation being
//! built. Children are `Arc`-shared so synthesis can rewrite one subtree
//! and keep every untouched branch, and so candidate trees produced from
//! the same goal share structure.

use std::sync::Arc;

use mason_fpcore::render::to_egg_sexpr;
use mason_fpcore::{Expr, FpCore};

use crate::interval::Interval;
use crate::types::OutType;

#[derive(Clone, Debug)]
pub enum Node<'db> {
    /// Leaf holding fixed polynomial data: exponent/coefficient pairs of an
    /// approximation of `function` on `domain`.
    FixedPolynomial {
        function: FpCore<'db>,
        domain: Interval<'db>,
        exponents: Vec<u32>,
        coefficients: Vec<Expr<'db>>,
    },

    /// Leaf holding a rational approximation: two fixed polynomials `p` and
    /// `q` combined by a three-argument function of `x`, `p`, `q`.
    FixedMultiPolynomial {
        function: FpCore<'db>,
        domain: Interval<'db>,
        combiner: FpCore<'db>,
        p_exponents: Vec<u32>,
        p_coefficients: Vec<Expr<'db>>,
        q_exponents: Vec<u32>,
        q_coefficients: Vec<Expr<'db>>,
    },

    /// Evaluate a polynomial with a sequential multiply-add chain.
    Horner { inner: Arc<Node<'db>>, split: u32 },

    /// Evaluate a polynomial with a parallel-prefix schedule.
    Estrin { inner: Arc<Node<'db>>, split: u32 },

    /// Restrict a proven implementation to a contained sub-domain. Type
    /// level only; generates no code.
    Narrow {
        inner: Arc<Node<'db>>,
        target: Interval<'db>,
    },

    /// Double the domain leftward across a registered mirror identity at
    /// the left edge.
    MirrorLeft { inner: Arc<Node<'db>> },

    /// Double the domain rightward across a registered mirror identity at
    /// the right edge.
    MirrorRight { inner: Arc<Node<'db>> },

    /// Extend the domain leftward through a supplied input reduction (in
    /// `x`) and output reconstruction (in `y`).
    InflectionLeft {
        inner: Arc<Node<'db>>,
        reduction: Expr<'db>,
        reconstruction: Expr<'db>,
        use_dd: bool,
    },

    /// Extend the domain rightward through a supplied input reduction and
    /// output reconstruction.
    InflectionRight {
        inner: Arc<Node<'db>>,
        reduction: Expr<'db>,
        reconstruction: Expr<'db>,
        use_dd: bool,
    },

    /// Post-compose an algebraic output substitution: the result proves
    /// `expr` with `y` bound to the inner function.
    TransformOut {
        inner: Arc<Node<'db>>,
        expr: Expr<'db>,
    },

    /// Dispatch between implementations of the same function on adjacent
    /// sub-domains.
    SplitDomain {
        branches: Vec<(Interval<'db>, Arc<Node<'db>>)>,
    },

    /// Extend a one-period implementation to the whole real line via
    /// Cody–Waite range reduction.
    Periodic {
        inner: Arc<Node<'db>>,
        period: Expr<'db>,
        bits_per: u32,
        entries: u32,
    },

    /// An unfilled synthesis goal. Never lowers to code.
    Hole { goal: OutType<'db> },
}

impl<'db> Node<'db> {
    pub fn fixed_polynomial(
        function: FpCore<'db>,
        domain: Interval<'db>,
        exponents: Vec<u32>,
        coefficients: Vec<Expr<'db>>,
    ) -> Arc<Self> {
        Arc::new(Node::FixedPolynomial {
            function,
            domain,
            exponents,
            coefficients,
        })
    }

    #[allow(clippy::too_many_arguments)]
    pub fn fixed_multi_polynomial(
        function: FpCore<'db>,
        domain: Interval<'db>,
        combiner: FpCore<'db>,
        p_exponents: Vec<u32>,
        p_coefficients: Vec<Expr<'db>>,
        q_exponents: Vec<u32>,
        q_coefficients: Vec<Expr<'db>>,
    ) -> Arc<Self> {
        Arc::new(Node::FixedMultiPolynomial {
            function,
            domain,
            combiner,
            p_exponents,
            p_coefficients,
            q_exponents,
            q_coefficients,
        })
    }

    pub fn horner(inner: Arc<Node<'db>>, split: u32) -> Arc<Self> {
        Arc::new(Node::Horner { inner, split })
    }

    pub fn estrin(inner: Arc<Node<'db>>, split: u32) -> Arc<Self> {
        Arc::new(Node::Estrin { inner, split })
    }

    pub fn narrow(inner: Arc<Node<'db>>, target: Interval<'db>) -> Arc<Self> {
        Arc::new(Node::Narrow { inner, target })
    }

    pub fn mirror_left(inner: Arc<Node<'db>>) -> Arc<Self> {
        Arc::new(Node::MirrorLeft { inner })
    }

    pub fn mirror_right(inner: Arc<Node<'db>>) -> Arc<Self> {
        Arc::new(Node::MirrorRight { inner })
    }

    pub fn inflection_left(
        inner: Arc<Node<'db>>,
        reduction: Expr<'db>,
        reconstruction: Expr<'db>,
    ) -> Arc<Self> {
        Arc::new(Node::InflectionLeft {
            inner,
            reduction,
            reconstruction,
            use_dd: false,
        })
    }

    pub fn inflection_right(
        inner: Arc<Node<'db>>,
        reduction: Expr<'db>,
        reconstruction: Expr<'db>,
        use_dd: bool,
    ) -> Arc<Self> {
        Arc::new(Node::InflectionRight {
            inner,
            reduction,
            reconstruction,
            use_dd,
        })
    }

    pub fn transform_out(inner: Arc<Node<'db>>, expr: Expr<'db>) -> Arc<Self> {
        Arc::new(Node::TransformOut { inner, expr })
    }

    pub fn split_domain(branches: Vec<(Interval<'db>, Arc<Node<'db>>)>) -> Arc<Self> {
        Arc::new(Node::SplitDomain { branches })
    }

    pub fn periodic(inner: Arc<Node<'db>>, period: Expr<'db>, bits_per: u32, entries: u32) -> Arc<Self> {
        Arc::new(Node::Periodic {
            inner,
            period,
            bits_per,
            entries,
        })
    }

    pub fn hole(goal: OutType<'db>) -> Arc<Self> {
        Arc::new(Node::Hole { goal })
    }

    /// Substitute `replacement` for the subtree `search` (matched by node
    /// identity), sharing every untouched branch with `self`.
    pub fn replace(
        self: &Arc<Self>,
        search: &Arc<Node<'db>>,
        replacement: &Arc<Node<'db>>,
    ) -> Arc<Node<'db>> {
        if Arc::ptr_eq(self, search) {
            return replacement.clone();
        }
        let rebuilt = match &**self {
            Node::Horner { inner, split } => {
                let new = inner.replace(search, replacement);
                if Arc::ptr_eq(&new, inner) {
                    return self.clone();
                }
                Node::Horner {
                    inner: new,
                    split: *split,
                }
            }
            Node::Estrin { inner, split } => {
                let new = inner.replace(search, replacement);
                if Arc::ptr_eq(&new, inner) {
                    return self.clone();
                }
                Node::Estrin {
                    inner: new,
                    split: *split,
                }
            }
            Node::Narrow { inner, target } => {
                let new = inner.replace(search, replacement);
                if Arc::ptr_eq(&new, inner) {
                    return self.clone();
                }
                Node::Narrow {
                    inner: new,
                    target: target.clone(),
                }
            }
            Node::MirrorLeft { inner } => {
                let new = inner.replace(search, replacement);
                if Arc::ptr_eq(&new, inner) {
                    return self.clone();
                }
                Node::MirrorLeft { inner: new }
            }
            Node::MirrorRight { inner } => {
                let new = inner.replace(search, replacement);
                if Arc::ptr_eq(&new, inner) {
                    return self.clone();
                }
                Node::MirrorRight { inner: new }
            }
            Node::InflectionLeft {
                inner,
                reduction,
                reconstruction,
                use_dd,
            } => {
                let new = inner.replace(search, replacement);
                if Arc::ptr_eq(&new, inner) {
                    return self.clone();
                }
                Node::InflectionLeft {
                    inner: new,
                    reduction: *reduction,
                    reconstruction: *reconstruction,
                    use_dd: *use_dd,
                }
            }
            Node::InflectionRight {
                inner,
                reduction,
                reconstruction,
                use_dd,
            } => {
                let new = inner.replace(search, replacement);
                if Arc::ptr_eq(&new, inner) {
                    return self.clone();
                }
                Node::InflectionRight {
                    inner: new,
                    reduction: *reduction,
                    reconstruction: *reconstruction,
                    use_dd: *use_dd,
                }
            }
            Node::TransformOut { inner, expr } => {
                let new = inner.replace(search, replacement);
                if Arc::ptr_eq(&new, inner) {
                    return self.clone();
                }
                Node::TransformOut {
                    inner: new,
                    expr: *expr,
                }
            }
            Node::Periodic {
                inner,
                period,
                bits_per,
                entries,
            } => {
                let new = inner.replace(search, replacement);
                if Arc::ptr_eq(&new, inner) {
                    return self.clone();
                }
                Node::Periodic {
                    inner: new,
                    period: *period,
                    bits_per: *bits_per,
                    entries: *entries,
                }
            }
            Node::SplitDomain { branches } => {
                let mut changed = false;
                let new_branches: Vec<_> = branches
                    .iter()
                    .map(|(domain, node)| {
                        let new = node.replace(search, replacement);
                        if !Arc::ptr_eq(&new, node) {
                            changed = true;
                        }
                        (domain.clone(), new)
                    })
                    .collect();
                if !changed {
                    return self.clone();
                }
                Node::SplitDomain {
                    branches: new_branches,
                }
            }
            Node::FixedPolynomial { .. }
            | Node::FixedMultiPolynomial { .. }
            | Node::Hole { .. } => return self.clone(),
        };
        Arc::new(rebuilt)
    }

    /// First unfilled hole in depth-first order, if any.
    pub fn first_hole(self: &Arc<Self>) -> Option<Arc<Node<'db>>> {
        match &**self {
            Node::Hole { .. } => Some(self.clone()),
            Node::Horner { inner, .. }
            | Node::Estrin { inner, .. }
            | Node::Narrow { inner, .. }
            | Node::MirrorLeft { inner }
            | Node::MirrorRight { inner }
            | Node::InflectionLeft { inner, .. }
            | Node::InflectionRight { inner, .. }
            | Node::TransformOut { inner, .. }
            | Node::Periodic { inner, .. } => inner.first_hole(),
            Node::SplitDomain { branches } => {
                branches.iter().find_map(|(_, node)| node.first_hole())
            }
            Node::FixedPolynomial { .. } | Node::FixedMultiPolynomial { .. } => None,
        }
    }

    pub fn has_holes(self: &Arc<Self>) -> bool {
        self.first_hole().is_some()
    }

    /// Human-readable rendering of the construction shape.
    pub fn describe(&self, db: &'db dyn salsa::Database) -> String {
        match self {
            Node::FixedPolynomial {
                function, domain, ..
            } => format!(
                "(FixedPolynomial {} {})",
                to_egg_sexpr(db, function.canonical_body(db)),
                domain.describe(db)
            ),
            Node::FixedMultiPolynomial {
                function, domain, ..
            } => format!(
                "(FixedMultiPolynomial {} {})",
                to_egg_sexpr(db, function.canonical_body(db)),
                domain.describe(db)
            ),
            Node::Horner { inner, split } => format!("(Horner {} {})", split, inner.describe(db)),
            Node::Estrin { inner, split } => format!("(Estrin {} {})", split, inner.describe(db)),
            Node::Narrow { inner, target } => {
                format!("(Narrow {} {})", target.describe(db), inner.describe(db))
            }
            Node::MirrorLeft { inner } => format!("(MirrorLeft {})", inner.describe(db)),
            Node::MirrorRight { inner } => format!("(MirrorRight {})", inner.describe(db)),
            Node::InflectionLeft {
                inner,
                reduction,
                reconstruction,
                ..
            } => format!(
                "(InflectionLeft {} {} {})",
                to_egg_sexpr(db, *reduction),
                to_egg_sexpr(db, *reconstruction),
                inner.describe(db)
            ),
            Node::InflectionRight {
                inner,
                reduction,
                reconstruction,
                ..
            } => format!(
                "(InflectionRight {} {} {})",
                to_egg_sexpr(db, *reduction),
                to_egg_sexpr(db, *reconstruction),
                inner.describe(db)
            ),
            Node::TransformOut { inner, expr } => format!(
                "(TransformOut {} {})",
                to_egg_sexpr(db, *expr),
                inner.describe(db)
            ),
            Node::SplitDomain { branches } => {
                let parts: Vec<String> = branches
                    .iter()
                    .map(|(domain, node)| format!("[{} {}]", domain.describe(db), node.describe(db)))
                    .collect();
                format!("(SplitDomain {})", parts.join(" "))
            }
            Node::Periodic { inner, period, .. } => format!(
                "(Periodic {} {})",
                to_egg_sexpr(db, *period),
                inner.describe(db)
            ),
            Node::Hole { goal } => format!("(Hole {})", goal.describe(db)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::interval::Interval;
    use mason_core::MasonDatabaseImpl;
    use mason_fpcore::{Expr, parse_one};

    #[test]
    fn replace_swaps_exactly_the_identified_subtree() {
        let db = MasonDatabaseImpl::default();
        let asin = parse_one(&db, "(FPCore (x) (asin x))").unwrap();
        let d = Interval::parse(&db, "0", "1").unwrap();
        let goal = OutType::Poly {
            function: asin,
            domain: d.clone(),
        };
        let hole = Node::hole(goal);
        let tree = Node::mirror_right(Node::horner(hole.clone(), 0));

        let filled = Node::fixed_polynomial(
            asin,
            d,
            vec![1],
            vec![Expr::integer(&db, 1)],
        );
        let new_tree = tree.replace(&hole, &filled);

        assert!(tree.has_holes());
        assert!(!new_tree.has_holes());
        // Untouched trees come back identically.
        let other = Node::hole(OutType::Poly {
            function: asin,
            domain: Interval::parse(&db, "0", "2").unwrap(),
        });
        assert!(Arc::ptr_eq(&tree.replace(&other, &filled), &tree));
    }

    #[test]
    fn first_hole_is_depth_first() {
        let db = MasonDatabaseImpl::default();
        let asin = parse_one(&db, "(FPCore (x) (asin x))").unwrap();
        let d = Interval::parse(&db, "0", "1").unwrap();
        let h1 = Node::hole(OutType::Impl {
            function: asin,
            domain: d.clone(),
        });
        let h2 = Node::hole(OutType::Impl {
            function: asin,
            domain: d.clone(),
        });
        let tree = Node::split_domain(vec![
            (d.clone(), h1.clone()),
            (d.clone(), h2),
        ]);
        let found = tree.first_hole().unwrap();
        assert!(Arc::ptr_eq(&found, &h1));
    }
}
