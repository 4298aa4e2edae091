//! Result kinds a construction node can prove.

use mason_fpcore::FpCore;
use mason_fpcore::render::to_egg_sexpr;

use crate::interval::Interval;

/// What a node's generated code is proven to compute.
///
/// `Poly` is strictly an intermediate artifact (a closed-form approximation
/// usable only by an evaluation scheme); `Impl` is the deliverable kind.
#[derive(Clone, Debug, PartialEq)]
pub enum OutType<'db> {
    Poly {
        function: FpCore<'db>,
        domain: Interval<'db>,
    },
    Impl {
        function: FpCore<'db>,
        domain: Interval<'db>,
    },
}

impl<'db> OutType<'db> {
    pub fn function(&self) -> FpCore<'db> {
        match self {
            OutType::Poly { function, .. } | OutType::Impl { function, .. } => *function,
        }
    }

    pub fn domain(&self) -> &Interval<'db> {
        match self {
            OutType::Poly { domain, .. } | OutType::Impl { domain, .. } => domain,
        }
    }

    pub fn kind_name(&self) -> &'static str {
        match self {
            OutType::Poly { .. } => "Poly",
            OutType::Impl { .. } => "Impl",
        }
    }

    pub fn is_impl(&self) -> bool {
        matches!(self, OutType::Impl { .. })
    }

    pub fn describe(&self, db: &'db dyn salsa::Database) -> String {
        format!(
            "({} {} {})",
            self.kind_name(),
            to_egg_sexpr(db, self.function().canonical_body(db)),
            self.domain().describe(db)
        )
    }
}
