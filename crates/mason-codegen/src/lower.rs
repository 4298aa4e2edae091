//! Lowering checked constructions into block sequences.
//!
//! A bottom-up fold: each transform first lowers its input, then wires its
//! own blocks onto the names the input exposed. Names come from one
//! generator per construction, so the emitted sequence is single
//! assignment by construction (and re-validated at the boundary).

use mason_core::{NameGen, NumericFormat};
use mason_fpcore::{Expr, FpCore, Symbol};
use mason_transforms::interval::Interval;
use mason_transforms::{OutType, PolyData, Side, Typed, TypedKind};
use tracing::debug;

use crate::blocks::{Block, CaseArm};
use crate::errors::{CodegenError, CodegenResult};
use crate::validate::validate;

/// A fully lowered construction, plus the resolved signature the code
/// assembler needs for headers and harnesses.
#[derive(Debug)]
pub struct Lowered<'db> {
    pub blocks: Vec<Block<'db>>,
    /// The construction's single entry parameter.
    pub entry: String,
    /// The name carrying the final result.
    pub result: String,
    pub function: FpCore<'db>,
    pub domain: Interval<'db>,
}

pub fn lower<'db>(db: &'db dyn salsa::Database, typed: &Typed<'db>) -> CodegenResult<Lowered<'db>> {
    let OutType::Impl { function, domain } = &typed.out_type else {
        return Err(CodegenError::NotAnImplementation {
            kind: typed.out_type.kind_name().to_string(),
        });
    };
    let mut names = NameGen::new();
    let (blocks, entry, result) = lower_node(db, typed, &mut names)?;
    validate(&blocks, &entry)?;
    debug!(blocks = blocks.len(), entry = %entry, result = %result, "construction lowered");
    Ok(Lowered {
        blocks,
        entry,
        result,
        function: *function,
        domain: domain.clone(),
    })
}

type Seq<'db> = (Vec<Block<'db>>, String, String);

fn lower_node<'db>(
    db: &'db dyn salsa::Database,
    typed: &Typed<'db>,
    names: &mut NameGen,
) -> CodegenResult<Seq<'db>> {
    match &typed.kind {
        TypedKind::Source { .. } => Err(CodegenError::NotAnImplementation {
            kind: "Poly".to_string(),
        }),

        TypedKind::Polynomial { poly, scheme, split } => {
            let x = names.fresh("in");
            match poly {
                PolyData::Single {
                    exponents,
                    coefficients,
                } => {
                    let out = names.fresh("out");
                    let block = Block::Polynomial {
                        format: NumericFormat::Fp64,
                        in_names: vec![x.clone()],
                        out_names: vec![out.clone()],
                        scheme: *scheme,
                        exponents: exponents.clone(),
                        coefficients: coefficients.clone(),
                        split: *split,
                    };
                    Ok((vec![block], x, out))
                }
                PolyData::Rational {
                    combiner,
                    p_exponents,
                    p_coefficients,
                    q_exponents,
                    q_coefficients,
                } => {
                    let p = names.fresh("p");
                    let q = names.fresh("q");
                    let out = names.fresh("out");
                    let p_block = Block::Polynomial {
                        format: NumericFormat::Fp64,
                        in_names: vec![x.clone()],
                        out_names: vec![p.clone()],
                        scheme: *scheme,
                        exponents: p_exponents.clone(),
                        coefficients: p_coefficients.clone(),
                        split: *split,
                    };
                    let q_block = Block::Polynomial {
                        format: NumericFormat::Fp64,
                        in_names: vec![x.clone()],
                        out_names: vec![q.clone()],
                        scheme: *scheme,
                        exponents: q_exponents.clone(),
                        coefficients: q_coefficients.clone(),
                        split: *split,
                    };
                    let args = combiner.args(db);
                    let expr = combiner
                        .body(db)
                        .substitute(db, args[0], Expr::var(db, &x))
                        .substitute(db, args[1], Expr::var(db, &p))
                        .substitute(db, args[2], Expr::var(db, &q));
                    let combine = Block::Assign {
                        format: NumericFormat::Fp64,
                        in_names: vec![x.clone(), p, q],
                        out_names: vec![out.clone()],
                        expr,
                    };
                    Ok((vec![p_block, q_block, combine], x, out))
                }
            }
        }

        // Purely type level; the inner code is already correct on the
        // narrower domain.
        TypedKind::Narrow { inner } => lower_node(db, inner, names),

        TypedKind::Mirror {
            inner,
            side,
            point,
            reconstruction,
        } => {
            let (inner_blocks, inner_in, inner_out) = lower_node(db, inner, names)?;
            let x = names.fresh("in");
            let out = names.fresh("recons");

            let xe = Expr::var(db, &x);
            let reflected = Expr::sub(db, Expr::from_f64(db, 2.0 * point), xe);
            let (reduce_true, reduce_false) = match side {
                Side::Right => (xe, reflected),
                Side::Left => (reflected, xe),
            };
            let reduce = Block::IfLess {
                format: NumericFormat::Fp64,
                in_names: vec![x.clone()],
                out_names: vec![inner_in],
                bound: *point,
                on_true: reduce_true,
                on_false: reduce_false,
            };

            let y = Symbol::new(db, "y".to_string());
            let ye = Expr::var(db, &inner_out);
            let s = reconstruction.substitute(db, y, ye);
            let (recons_true, recons_false) = match side {
                Side::Right => (ye, s),
                Side::Left => (s, ye),
            };
            let recons = Block::IfLess {
                format: NumericFormat::Fp64,
                in_names: vec![x.clone(), inner_out],
                out_names: vec![out.clone()],
                bound: *point,
                on_true: recons_true,
                on_false: recons_false,
            };

            let mut blocks = vec![reduce];
            blocks.extend(inner_blocks);
            blocks.push(recons);
            Ok((blocks, x, out))
        }

        TypedKind::Inflection {
            inner,
            side,
            reduction,
            reconstruction,
            use_dd,
        } => {
            let seam = inner.out_type.domain().inf_val();
            let (inner_blocks, inner_in, inner_out) = lower_node(db, inner, names)?;
            let x = names.fresh("in");
            let out = names.fresh("recons");
            let x_sym = Symbol::new(db, "x".to_string());
            let y_sym = Symbol::new(db, "y".to_string());
            let xe = Expr::var(db, &x);
            let ye = Expr::var(db, &inner_out);
            let reduced = reduction.substitute(db, x_sym, xe);
            let reconstructed = reconstruction.substitute(db, y_sym, ye);
            let recons_format = if *use_dd {
                NumericFormat::DoubleDouble
            } else {
                NumericFormat::Fp64
            };

            let (reduce, recons) = match side {
                // The whole claimed domain maps through the reduction.
                Side::Right => (
                    Block::Assign {
                        format: NumericFormat::Fp64,
                        in_names: vec![x.clone()],
                        out_names: vec![inner_in],
                        expr: reduced,
                    },
                    Block::Assign {
                        format: recons_format,
                        in_names: vec![inner_out.clone()],
                        out_names: vec![out.clone()],
                        expr: reconstructed,
                    },
                ),
                // Only the extension left of the seam is reduced; the
                // proven side passes through.
                Side::Left => (
                    Block::IfLess {
                        format: NumericFormat::Fp64,
                        in_names: vec![x.clone()],
                        out_names: vec![inner_in],
                        bound: seam,
                        on_true: reduced,
                        on_false: xe,
                    },
                    Block::IfLess {
                        format: recons_format,
                        in_names: vec![x.clone(), inner_out.clone()],
                        out_names: vec![out.clone()],
                        bound: seam,
                        on_true: reconstructed,
                        on_false: ye,
                    },
                ),
            };

            let mut blocks = vec![reduce];
            blocks.extend(inner_blocks);
            blocks.push(recons);
            Ok((blocks, x, out))
        }

        TypedKind::TransformOut { inner, expr } => {
            let (mut blocks, inner_in, inner_out) = lower_node(db, inner, names)?;
            let out = names.fresh("t_out");
            let y = Symbol::new(db, "y".to_string());
            let e = expr.substitute(db, y, Expr::var(db, &inner_out));
            blocks.push(Block::Assign {
                format: NumericFormat::Fp64,
                in_names: vec![inner_out],
                out_names: vec![out.clone()],
                expr: e,
            });
            Ok((blocks, inner_in, out))
        }

        TypedKind::SplitDomain { branches } => {
            let x = names.fresh("in");
            let out = names.fresh("out");
            let mut arms = Vec::new();
            for (key, branch) in branches {
                let (body, body_in, body_out) = lower_node(db, branch, names)?;
                arms.push(CaseArm {
                    lo: key.inf_val(),
                    hi: key.sup_val(),
                    body,
                    body_in,
                    body_out,
                });
            }
            let case = Block::Case {
                format: NumericFormat::Fp64,
                in_names: vec![x.clone()],
                out_names: vec![out.clone()],
                arms,
            };
            Ok((vec![case], x, out))
        }

        TypedKind::Periodic {
            inner,
            period,
            bits_per,
            entries,
        } => {
            let (inner_blocks, inner_in, inner_out) = lower_node(db, inner, names)?;
            let x = names.fresh("in");
            let k = names.fresh("k");
            let reduce = Block::CodyWaite {
                format: NumericFormat::Fp64,
                in_names: vec![x.clone()],
                out_names: vec![inner_in, k],
                period: *period,
                bits_per: *bits_per,
                entries: *entries,
            };
            let mut blocks = vec![reduce];
            blocks.extend(inner_blocks);
            Ok((blocks, x, inner_out))
        }
    }
}
