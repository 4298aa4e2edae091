//! Numeric formats generated code can be lowered at.

/// The working precision of an emission block.
///
/// Both formats are stored in C `double` variables; `DoubleDouble` marks a
/// block whose rendering must use compensated (hi/lo) sequences so the
/// result carries roughly twice the significand.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum NumericFormat {
    Fp64,
    DoubleDouble,
}

impl NumericFormat {
    pub fn c_type(self) -> &'static str {
        "double"
    }

    pub fn is_extended(self) -> bool {
        matches!(self, NumericFormat::DoubleDouble)
    }
}

/// Format an `f64` as a C double literal.
///
/// Integral values keep a trailing `.0` so the literal stays typed as a
/// double; non-finite values map to the `math.h` macros.
pub fn c_literal(x: f64) -> String {
    if x.is_nan() {
        return "NAN".to_string();
    }
    if x.is_infinite() {
        return if x > 0.0 { "INFINITY" } else { "-INFINITY" }.to_string();
    }
    if x == x.trunc() && x.abs() < 1e16 {
        format!("{:.1}", x)
    } else {
        format!("{:?}", x)
    }
}

/// Decompose `value` into `entries` limbs of at most `bits` significand
/// bits each, high part first.
///
/// Each truncation clears low mantissa bits, so `value - limb` is exact
/// and the limbs sum back to `value` whenever `entries * bits >= 53`.
/// Multiplying a limb by a small integer is then exact too, which is what
/// a Cody–Waite reduction needs from its constant table.
pub fn split_constant(value: f64, bits: u32, entries: u32) -> Vec<f64> {
    let mut rest = value;
    let mut limbs = Vec::with_capacity(entries as usize);
    for _ in 0..entries {
        let limb = truncate_significand(rest, bits);
        limbs.push(limb);
        rest -= limb;
    }
    limbs
}

/// What `split_constant` fails to represent; zero for a lossless split.
pub fn split_residual(value: f64, bits: u32, entries: u32) -> f64 {
    value - split_constant(value, bits, entries).iter().sum::<f64>()
}

fn truncate_significand(x: f64, bits: u32) -> f64 {
    if x == 0.0 || !x.is_finite() {
        return x;
    }
    let keep = u64::from(bits.clamp(1, 53)) - 1;
    let drop = 52 - keep.min(52);
    let mask = !((1u64 << drop) - 1);
    f64::from_bits(x.to_bits() & mask)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn split_two_pi_is_lossless() {
        let two_pi = 2.0 * std::f64::consts::PI;
        let limbs = split_constant(two_pi, 30, 3);
        assert_eq!(limbs.len(), 3);
        assert_eq!(limbs.iter().sum::<f64>(), two_pi);
        assert_eq!(split_residual(two_pi, 30, 3), 0.0);
        // High limb carries the leading bits.
        assert!(limbs[0] > limbs[1].abs());
    }

    #[test]
    fn too_few_limbs_leave_a_residual() {
        assert_ne!(split_residual(std::f64::consts::PI, 10, 2), 0.0);
    }

    #[test]
    fn literal_integral_keeps_decimal_point() {
        assert_eq!(c_literal(1.0), "1.0");
        assert_eq!(c_literal(-2.0), "-2.0");
    }

    #[test]
    fn literal_fractional_round_trips() {
        assert_eq!(c_literal(0.5), "0.5");
        assert_eq!(c_literal(7.450580596923828e-9), "7.450580596923828e-9");
    }

    #[test]
    fn literal_non_finite() {
        assert_eq!(c_literal(f64::INFINITY), "INFINITY");
        assert_eq!(c_literal(f64::NEG_INFINITY), "-INFINITY");
    }
}
