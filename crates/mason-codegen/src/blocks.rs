//! Typed emission blocks.
//!
//! A block is one unit of lowered code with named inputs and outputs; the
//! name lists are the wiring contract between consecutive blocks. Every
//! variant renders itself to C lines independently.

use mason_core::{NumericFormat, c_literal, split_constant};
use mason_fpcore::render::to_libm_c;
use mason_fpcore::{Constant, Expr, ExprKind, Op};
use mason_transforms::Scheme;

/// `f64::consts::PI + PI_LO` is the next 53 bits of pi; halving both stays
/// exact, which covers the reconstruction constants the catalogue emits.
const PI_LO: f64 = 1.2246467991473532e-16;

#[derive(Debug)]
pub enum Block<'db> {
    /// `out = in < bound ? on_true : on_false`. Extra inputs may be
    /// referenced by the arm expressions.
    IfLess {
        format: NumericFormat,
        in_names: Vec<String>,
        out_names: Vec<String>,
        bound: f64,
        on_true: Expr<'db>,
        on_false: Expr<'db>,
    },

    /// Fixed exponent/coefficient evaluation under a Horner or Estrin
    /// schedule. `split` partitions the terms into `split + 1` chains to
    /// shorten the serial dependency depth.
    Polynomial {
        format: NumericFormat,
        in_names: Vec<String>,
        out_names: Vec<String>,
        scheme: Scheme,
        exponents: Vec<u32>,
        coefficients: Vec<Expr<'db>>,
        split: u32,
    },

    /// `out = expr`, where `expr` references the input names. In
    /// double-double format, linear expressions around a known constant
    /// are emitted in compensated form.
    Assign {
        format: NumericFormat,
        in_names: Vec<String>,
        out_names: Vec<String>,
        expr: Expr<'db>,
    },

    /// Cody–Waite range reduction: out names are the reduced remainder and
    /// the integer quotient.
    CodyWaite {
        format: NumericFormat,
        in_names: Vec<String>,
        out_names: Vec<String>,
        period: f64,
        bits_per: u32,
        entries: u32,
    },

    /// Domain-membership dispatch across adjacent sub-domains. Arm bodies
    /// are nested block sequences evaluated only when selected.
    Case {
        format: NumericFormat,
        in_names: Vec<String>,
        out_names: Vec<String>,
        arms: Vec<CaseArm<'db>>,
    },
}

#[derive(Debug)]
pub struct CaseArm<'db> {
    pub lo: f64,
    pub hi: f64,
    pub body: Vec<Block<'db>>,
    pub body_in: String,
    pub body_out: String,
}

impl<'db> Block<'db> {
    pub fn format(&self) -> NumericFormat {
        match self {
            Block::IfLess { format, .. }
            | Block::Polynomial { format, .. }
            | Block::Assign { format, .. }
            | Block::CodyWaite { format, .. }
            | Block::Case { format, .. } => *format,
        }
    }

    pub fn in_names(&self) -> &[String] {
        match self {
            Block::IfLess { in_names, .. }
            | Block::Polynomial { in_names, .. }
            | Block::Assign { in_names, .. }
            | Block::CodyWaite { in_names, .. }
            | Block::Case { in_names, .. } => in_names,
        }
    }

    pub fn out_names(&self) -> &[String] {
        match self {
            Block::IfLess { out_names, .. }
            | Block::Polynomial { out_names, .. }
            | Block::Assign { out_names, .. }
            | Block::CodyWaite { out_names, .. }
            | Block::Case { out_names, .. } => out_names,
        }
    }

    pub fn to_c(&self, db: &'db dyn salsa::Database) -> Vec<String> {
        match self {
            Block::IfLess {
                format,
                in_names,
                out_names,
                bound,
                on_true,
                on_false,
            } => {
                vec![format!(
                    "{} {} = {} < {} ? {} : {};",
                    format.c_type(),
                    out_names[0],
                    in_names[0],
                    c_literal(*bound),
                    to_libm_c(db, *on_true),
                    to_libm_c(db, *on_false)
                )]
            }
            Block::Polynomial {
                format,
                in_names,
                out_names,
                scheme,
                exponents,
                coefficients,
                split,
            } => render_polynomial(
                db,
                *format,
                &in_names[0],
                &out_names[0],
                *scheme,
                exponents,
                coefficients,
                *split,
            ),
            Block::Assign {
                format,
                out_names,
                expr,
                ..
            } => {
                if format.is_extended()
                    && let Some(line) = render_compensated(db, format.c_type(), &out_names[0], *expr)
                {
                    return vec![line];
                }
                vec![format!(
                    "{} {} = {};",
                    format.c_type(),
                    out_names[0],
                    to_libm_c(db, *expr)
                )]
            }
            Block::CodyWaite {
                format,
                in_names,
                out_names,
                period,
                bits_per,
                entries,
            } => {
                let r = &out_names[0];
                let k = &out_names[1];
                let limbs: Vec<String> = split_constant(*period, *bits_per, *entries)
                    .iter()
                    .map(|l| c_literal(*l))
                    .collect();
                let ty = format.c_type();
                vec![
                    format!("{ty} {r}_inv_period = {};", c_literal(1.0 / *period)),
                    format!("{ty} {r}_period[{}] = {{{}}};", limbs.len(), limbs.join(", ")),
                    format!("int {k};"),
                    format!(
                        "{ty} {r} = cody_waite_reduce({}, {r}_inv_period, {}, {r}_period, &{k});",
                        in_names[0],
                        limbs.len()
                    ),
                ]
            }
            Block::Case {
                format,
                in_names,
                out_names,
                arms,
            } => {
                let x = &in_names[0];
                let out = &out_names[0];
                let ty = format.c_type();
                let mut lines = vec![format!("{ty} {out};")];
                let last = arms.len() - 1;
                for (i, arm) in arms.iter().enumerate() {
                    let open = if i == 0 {
                        format!("if ({x} <= {}) {{", c_literal(arm.hi))
                    } else if i == last {
                        "else {".to_string()
                    } else {
                        format!("else if ({x} <= {}) {{", c_literal(arm.hi))
                    };
                    lines.push(open);
                    lines.push(format!("    {ty} {} = {x};", arm.body_in));
                    for block in &arm.body {
                        for line in block.to_c(db) {
                            lines.push(format!("    {line}"));
                        }
                    }
                    lines.push(format!("    {out} = {};", arm.body_out));
                    lines.push("}".to_string());
                }
                lines
            }
        }
    }
}

/// Repeated-multiplication chain for a small power: `x`, `(x * x)`, ...
fn pow_chain(x: &str, n: u32) -> String {
    let mut s = x.to_string();
    for _ in 1..n {
        s = format!("({s} * {x})");
    }
    s
}

fn gcd(a: u32, b: u32) -> u32 {
    if b == 0 { a } else { gcd(b, a % b) }
}

/// Dense coefficient layout in powers of `x^step`, with `None` for the
/// missing terms.
pub(crate) fn dense_slots<'db>(
    exponents: &[u32],
    coefficients: &[Expr<'db>],
) -> (u32, u32, Vec<Option<Expr<'db>>>) {
    let base = exponents[0];
    let step = exponents
        .windows(2)
        .fold(0, |g, w| gcd(g, w[1] - w[0]));
    if step == 0 {
        return (base, 0, vec![Some(coefficients[0])]);
    }
    let len = ((exponents[exponents.len() - 1] - base) / step + 1) as usize;
    let mut slots = vec![None; len];
    for (e, c) in exponents.iter().zip(coefficients) {
        slots[((e - base) / step) as usize] = Some(*c);
    }
    (base, step, slots)
}

fn slot_text<'db>(db: &'db dyn salsa::Database, slot: &Option<Expr<'db>>) -> String {
    match slot {
        Some(e) => to_libm_c(db, *e),
        None => "0.0".to_string(),
    }
}

#[allow(clippy::too_many_arguments)]
fn render_polynomial<'db>(
    db: &'db dyn salsa::Database,
    format: NumericFormat,
    x: &str,
    out: &str,
    scheme: Scheme,
    exponents: &[u32],
    coefficients: &[Expr<'db>],
    split: u32,
) -> Vec<String> {
    let mut lines = Vec::new();
    let chunk_count = ((split + 1) as usize).clamp(1, exponents.len());
    let per = exponents.len().div_ceil(chunk_count);

    let mut chunk_exprs = Vec::new();
    for (ci, range_start) in (0..exponents.len()).step_by(per).enumerate() {
        let range = range_start..(range_start + per).min(exponents.len());
        let prefix = format!("{out}_c{ci}");
        chunk_exprs.push(render_chunk(
            db,
            &mut lines,
            &prefix,
            x,
            scheme,
            &exponents[range.clone()],
            &coefficients[range],
        ));
    }

    let sum = chunk_exprs
        .into_iter()
        .reduce(|a, b| format!("({a} + {b})"))
        .unwrap_or_default();
    lines.push(format!("{} {out} = {sum};", format.c_type()));
    lines
}

fn render_chunk<'db>(
    db: &'db dyn salsa::Database,
    lines: &mut Vec<String>,
    prefix: &str,
    x: &str,
    scheme: Scheme,
    exponents: &[u32],
    coefficients: &[Expr<'db>],
) -> String {
    let (base, step, slots) = dense_slots(exponents, coefficients);

    if step == 0 {
        let coef = slot_text(db, &slots[0]);
        return if base == 0 {
            coef
        } else {
            format!("({} * {coef})", pow_chain(x, base))
        };
    }

    let t = if step == 1 {
        x.to_string()
    } else {
        let name = format!("{prefix}_t");
        lines.push(format!("double {name} = {};", pow_chain(x, step)));
        name
    };

    let acc = match scheme {
        Scheme::Horner => horner_expr(db, &slots, &t),
        Scheme::Estrin => estrin_expr(db, lines, prefix, &slots, &t),
    };

    if base == 0 {
        acc
    } else {
        let b = format!("{prefix}_b");
        lines.push(format!("double {b} = {};", pow_chain(x, base)));
        format!("({b} * {acc})")
    }
}

fn horner_expr<'db>(db: &'db dyn salsa::Database, slots: &[Option<Expr<'db>>], t: &str) -> String {
    let mut acc = slot_text(db, &slots[slots.len() - 1]);
    for slot in slots[..slots.len() - 1].iter().rev() {
        acc = format!("({} + ({t} * {acc}))", slot_text(db, slot));
    }
    acc
}

fn estrin_expr<'db>(
    db: &'db dyn salsa::Database,
    lines: &mut Vec<String>,
    prefix: &str,
    slots: &[Option<Expr<'db>>],
    t: &str,
) -> String {
    use std::collections::BTreeMap;

    let mut powers: BTreeMap<usize, String> = BTreeMap::new();
    powers.insert(1, t.to_string());
    let mut p = 2;
    while p < slots.len() {
        let prev = powers[&(p / 2)].clone();
        let name = format!("{prefix}_t{p}");
        lines.push(format!("double {name} = ({prev} * {prev});"));
        powers.insert(p, name);
        p *= 2;
    }
    estrin_build(db, slots, &powers)
}

fn estrin_build<'db>(
    db: &'db dyn salsa::Database,
    slots: &[Option<Expr<'db>>],
    powers: &std::collections::BTreeMap<usize, String>,
) -> String {
    let n = slots.len();
    if n == 1 {
        return slot_text(db, &slots[0]);
    }
    // Largest power of two strictly below n.
    let p = 1usize << (usize::BITS - 1 - (n - 1).leading_zeros());
    let lo = estrin_build(db, &slots[..p], powers);
    let hi = estrin_build(db, &slots[p..], powers);
    format!("({lo} + ({} * {hi}))", powers[&p])
}

/// Compensated rendering of `c + r` / `c - r` where `c` is a constant with
/// a known hi/lo split. Returns `None` when the expression doesn't have
/// that shape, in which case the caller falls back to plain rendering.
fn render_compensated<'db>(
    db: &'db dyn salsa::Database,
    ty: &str,
    out: &str,
    expr: Expr<'db>,
) -> Option<String> {
    let ExprKind::Op(op, args) = expr.kind(db) else {
        return None;
    };
    let (hi, lo) = constant_hi_lo(db, args[0])?;
    let rest = to_libm_c(db, args[1]);
    match op {
        Op::Sub => Some(format!(
            "{ty} {out} = {} - ({rest} - {});",
            c_literal(hi),
            c_literal(lo)
        )),
        Op::Add => Some(format!(
            "{ty} {out} = {} + ({rest} + {});",
            c_literal(hi),
            c_literal(lo)
        )),
        _ => None,
    }
}

/// Hi/lo double-double value of a constant expression, for constants built
/// from pi by exact power-of-two scaling.
fn constant_hi_lo<'db>(db: &'db dyn salsa::Database, expr: Expr<'db>) -> Option<(f64, f64)> {
    match expr.kind(db) {
        ExprKind::Constant(Constant::Pi) => Some((std::f64::consts::PI, PI_LO)),
        ExprKind::Constant(Constant::HalfPi) => {
            Some((std::f64::consts::FRAC_PI_2, PI_LO / 2.0))
        }
        ExprKind::Op(Op::Div, args) => {
            let (hi, lo) = constant_hi_lo(db, args[0])?;
            let d = mason_fpcore::eval_closed(db, args[1]).ok()?;
            exact_pow2(d).then(|| (hi / d, lo / d))
        }
        ExprKind::Op(Op::Mul, args) => {
            let (hi, lo) = constant_hi_lo(db, args[1])?;
            let m = mason_fpcore::eval_closed(db, args[0]).ok()?;
            exact_pow2(m).then(|| (hi * m, lo * m))
        }
        _ => None,
    }
}

fn exact_pow2(v: f64) -> bool {
    v.is_finite() && v != 0.0 && v.abs().log2().fract() == 0.0
}
