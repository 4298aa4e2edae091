//! Root location for reduction preimages.
//!
//! Reductions are arbitrary expressions, so out-domain edges are found
//! numerically: grow a bracket away from the seam, bisect, then prefer a
//! snapped (short-literal) candidate when it reproduces the target at
//! least as well. The snap is what lets `(- x)` over `[0, 1]` come back
//! with an exact `-1` edge instead of an adjacent float.

/// Find `x` on the `dir` side of `start` with `g(x) = target`.
///
/// `g` returns `None` where it is undefined; leaving its domain counts as
/// crossing for bracketing purposes.
pub(crate) fn solve_preimage<F>(g: F, start: f64, dir: f64, target: f64) -> Option<f64>
where
    F: Fn(f64) -> Option<f64>,
{
    let residual = |x: f64| g(x).map(|v| v - target).filter(|v| v.is_finite());

    let r0 = residual(start)?;
    if r0 == 0.0 {
        return Some(start);
    }
    let sign0 = r0 > 0.0;

    // Grow a bracket until the residual flips sign, hits zero, or g leaves
    // its domain.
    let mut w = 2f64.powi(-20) * start.abs().max(1.0);
    let mut hi = None;
    for _ in 0..80 {
        let probe = start + dir * w;
        match residual(probe) {
            Some(r) if r != 0.0 && (r > 0.0) == sign0 => w *= 2.0,
            _ => {
                hi = Some(probe);
                break;
            }
        }
    }
    let mut hi = hi?;
    if residual(hi) == Some(0.0) {
        return Some(hi);
    }

    let mut lo = start;
    for _ in 0..200 {
        let mid = 0.5 * (lo + hi);
        if mid == lo || mid == hi {
            break;
        }
        match residual(mid) {
            Some(r) if r != 0.0 && (r > 0.0) == sign0 => lo = mid,
            _ => hi = mid,
        }
    }

    best_candidate(&residual, target, &[snap(hi), snap(lo), hi, lo])
}

/// Find a root of `h` between `lo` and `hi` (used for fixed points of
/// involutive reductions). Requires a sign change across the bracket.
pub(crate) fn bisect_root<F>(h: F, mut lo: f64, mut hi: f64) -> Option<f64>
where
    F: Fn(f64) -> Option<f64>,
{
    let rl = h(lo)?;
    if rl == 0.0 {
        return Some(lo);
    }
    let rh = h(hi)?;
    if rh == 0.0 {
        return Some(hi);
    }
    if (rl > 0.0) == (rh > 0.0) {
        return None;
    }
    let sign_lo = rl > 0.0;
    for _ in 0..200 {
        let mid = 0.5 * (lo + hi);
        if mid == lo || mid == hi {
            break;
        }
        match h(mid) {
            Some(r) if r == 0.0 => return Some(mid),
            Some(r) if (r > 0.0) == sign_lo => lo = mid,
            _ => hi = mid,
        }
    }
    best_candidate(&|x| h(x), 0.0, &[snap(lo), snap(hi), lo, hi])
}

fn best_candidate<F>(residual: &F, target: f64, candidates: &[f64]) -> Option<f64>
where
    F: Fn(f64) -> Option<f64>,
{
    let mut best: Option<(f64, f64)> = None;
    for &c in candidates {
        if let Some(r) = residual(c) {
            let score = r.abs();
            if best.is_none_or(|(_, s)| score < s) {
                best = Some((c, score));
            }
        }
    }
    let (c, score) = best?;
    if score <= 1e-6 * (1.0 + target.abs()) {
        Some(c)
    } else {
        None
    }
}

/// Round to 12 significant decimal digits.
fn snap(x: f64) -> f64 {
    if x == 0.0 || !x.is_finite() {
        return x;
    }
    let exp = x.abs().log10().floor() as i32;
    let scale = 10f64.powi(11 - exp);
    (x * scale).round() / scale
}
