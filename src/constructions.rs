//! Built-in worked constructions.

use std::sync::Arc;

use mason_fpcore::{Expr, parse_expr, parse_one};
use mason_transforms::interval::Interval;
use mason_transforms::{CheckError, CheckResult, Node};

/// An asin implementation over [-1, 1] in the classic fdlibm shape:
/// a linear approximation below 2^-27 where asin(x) rounds to x, a
/// rational polynomial on [cutoff, 1/2], and the half-angle identity
/// `asin(x) = pi/2 - 2*asin(sqrt((1-x)/2))` folding [1/2, 1] onto the
/// polynomial's range, all reflected onto [-1, 0] by oddness.
pub fn asin_construction<'db>(db: &'db dyn salsa::Database) -> CheckResult<Arc<Node<'db>>> {
    let asin = parse_one(db, "(FPCore (x) (asin x))")
        .map_err(|e| CheckError::precondition(format!("builtin construction failed to parse: {e}")))?;
    let combiner = parse_one(db, "(FPCore (x p q) (+ x (/ p q)))")
        .map_err(|e| CheckError::precondition(format!("builtin construction failed to parse: {e}")))?;
    let expr = |text: &str| {
        parse_expr(db, text).map_err(|e| {
            CheckError::precondition(format!("builtin construction failed to parse: {e}"))
        })
    };

    let linear_cutoff = "7.450580596923828125e-9";

    let p_exponents = vec![3, 5, 7, 9, 11, 13];
    let p_coefficients = vec![
        expr("1.66666666666666657415e-01")?,
        expr("-3.25565818622400915405e-01")?,
        expr("2.01212532134862925881e-01")?,
        expr("-4.00555345006794114027e-02")?,
        expr("7.91534994289814532176e-04")?,
        expr("3.47933107596021167570e-05")?,
    ];
    let q_exponents = vec![0, 2, 4, 6, 8];
    let q_coefficients = vec![
        expr("1")?,
        expr("-2.40339491173441421878e+00")?,
        expr("2.02094576023350569471e+00")?,
        expr("-6.88283971605453293030e-01")?,
        expr("7.70381505559019352791e-02")?,
    ];

    let rational = |domain: Interval<'db>| {
        Node::fixed_multi_polynomial(
            asin,
            domain,
            combiner,
            p_exponents.clone(),
            p_coefficients.clone(),
            q_exponents.clone(),
            q_coefficients.clone(),
        )
    };

    // asin(x) rounds to x below the cutoff.
    let linear = Node::horner(
        Node::fixed_polynomial(
            asin,
            Interval::parse(db, "0", linear_cutoff)?,
            vec![1],
            vec![Expr::integer(db, 1)],
        ),
        0,
    );

    let core_domain = Interval::parse(db, "0", "0.5")?;
    let core = Node::horner(rational(core_domain.clone()), 0);

    let upper = Node::inflection_right(
        Node::estrin(rational(core_domain), 0),
        expr("(sqrt (/ (- 1 x) 2))")?,
        expr("(- (/ PI 2) (* 2 y))")?,
        true,
    );

    let positive = Node::split_domain(vec![
        (Interval::parse(db, "0", linear_cutoff)?, linear),
        (Interval::parse(db, linear_cutoff, "0.5")?, core),
        (Interval::parse(db, "0.5", "1")?, upper),
    ]);

    Ok(Node::inflection_left(
        positive,
        expr("(- x)")?,
        expr("(- y)")?,
    ))
}
