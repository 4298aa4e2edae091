//! Assembly of lowered constructions into C translation units.
//!
//! Produces the generated function, an MPFR oracle with the same
//! signature shape, a shared header, and the error/timing measurement
//! drivers parameterized by test sub-domains.

use mason_core::c_literal;
use mason_fpcore::render::MpfrEmitter;
use mason_fpcore::{Expr, FpCore};

use crate::blocks::Block;
use crate::lower::Lowered;

/// The generated implementation: `(signature, definition lines)`.
pub fn generate_c<'db>(
    db: &'db dyn salsa::Database,
    lowered: &Lowered<'db>,
    name: &str,
) -> (String, Vec<String>) {
    let sig = format!("double {name}(double {});", lowered.entry);
    let mut lines = vec![format!("double {name}(double {}) {{", lowered.entry)];
    for block in &lowered.blocks {
        for line in block.to_c(db) {
            lines.push(format!("    {line}"));
        }
    }
    lines.push(format!("    return {};", lowered.result));
    lines.push("}".to_string());
    (sig, lines)
}

/// An arbitrary-precision oracle for the same function, evaluated through
/// MPFR and rounded once at the end.
pub fn generate_mpfr_c<'db>(
    db: &'db dyn salsa::Database,
    function: FpCore<'db>,
    name: &str,
) -> (String, Vec<String>) {
    let sig = format!("int {name}(double x, double* out);");

    let body = match function.args(db).first() {
        Some(&arg) => function.body(db).substitute(db, arg, Expr::var(db, "arg")),
        None => function.body(db),
    };
    let mut emitter = MpfrEmitter::new(256);
    let result = emitter.emit(db, body);

    let mut lines = vec![
        format!("int {name}(double x, double* out) {{"),
        "    mpfr_t arg;".to_string(),
        "    mpfr_init2(arg, 256);".to_string(),
        "    mpfr_set_d(arg, x, MPFR_RNDN);".to_string(),
    ];
    for line in emitter.declarations() {
        lines.push(format!("    {line}"));
    }
    for line in emitter.code() {
        lines.push(format!("    {line}"));
    }
    lines.push(format!("    *out = mpfr_get_d({result}, MPFR_RNDN);"));
    for line in emitter.clears() {
        lines.push(format!("    {line}"));
    }
    lines.push("    mpfr_clear(arg);".to_string());
    lines.push("    return 0;".to_string());
    lines.push("}".to_string());
    (sig, lines)
}

pub fn assemble_header(signatures: &[String]) -> Vec<String> {
    let mut lines = vec![
        "#ifndef FUNCS_H".to_string(),
        "#define FUNCS_H".to_string(),
        String::new(),
        "#include <math.h>".to_string(),
        "#include <mpfr.h>".to_string(),
        String::new(),
    ];
    lines.extend(signatures.iter().cloned());
    lines.push(String::new());
    lines.push("#endif".to_string());
    lines
}

/// One translation unit holding every function definition.
pub fn assemble_functions(bodies: &[Vec<String>], header: &str, with_helpers: bool) -> Vec<String> {
    let mut lines = vec![
        format!("#include \"{header}\""),
        "#include <math.h>".to_string(),
        "#include <mpfr.h>".to_string(),
        String::new(),
    ];
    if with_helpers {
        lines.extend(cody_waite_helper());
        lines.push(String::new());
    }
    for body in bodies {
        lines.extend(body.iter().cloned());
        lines.push(String::new());
    }
    lines
}

/// Whether any block in the sequence (case arms included) performs a
/// Cody–Waite reduction and therefore needs the shared helper.
pub fn needs_cody_waite(blocks: &[Block<'_>]) -> bool {
    blocks.iter().any(|b| match b {
        Block::CodyWaite { .. } => true,
        Block::Case { arms, .. } => arms.iter().any(|arm| needs_cody_waite(&arm.body)),
        _ => false,
    })
}

fn cody_waite_helper() -> Vec<String> {
    [
        "static double cody_waite_reduce(double x, double inv_p, int n,",
        "                                const double* p, int* k) {",
        "    double kd = floor(x * inv_p);",
        "    double r = x;",
        "    for (int i = 0; i < n; i++) {",
        "        r -= kd * p[i];",
        "    }",
        "    *k = (int)kd;",
        "    return r;",
        "}",
    ]
    .iter()
    .map(|s| s.to_string())
    .collect()
}

/// Driver that measures worst absolute error of each test implementation
/// against the oracle over each sub-domain.
pub fn assemble_error_main(
    name: &str,
    oracle: &str,
    tests: &[String],
    generators: &[String],
    header: &str,
    domains: &[(f64, f64)],
) -> Vec<String> {
    let mut lines = vec![format!("/* error measurement for {name} */")];
    for generator in generators {
        lines.push(format!("/* generated by: {generator} */"));
    }
    lines.extend([
        format!("#include \"{header}\""),
        "#include <math.h>".to_string(),
        "#include <stdio.h>".to_string(),
        String::new(),
        "#define SAMPLES 65536".to_string(),
        String::new(),
        "static double max_abs_error(int (*oracle)(double, double*),".to_string(),
        "                            double (*test)(double),".to_string(),
        "                            double lo, double hi) {".to_string(),
        "    double worst = 0.0;".to_string(),
        "    for (int i = 0; i < SAMPLES; i++) {".to_string(),
        "        double x = lo + (hi - lo) * ((double)i / (SAMPLES - 1));".to_string(),
        "        double expected;".to_string(),
        "        oracle(x, &expected);".to_string(),
        "        double err = fabs(test(x) - expected);".to_string(),
        "        if (err > worst) {".to_string(),
        "            worst = err;".to_string(),
        "        }".to_string(),
        "    }".to_string(),
        "    return worst;".to_string(),
        "}".to_string(),
        String::new(),
        "int main(void) {".to_string(),
        "    printf(\"function\\tdomain\\tmax_abs_error\\n\");".to_string(),
    ]);
    for test in tests {
        for (lo, hi) in domains {
            lines.push(format!(
                "    printf(\"{test}\\t[{lo}, {hi}]\\t%.17e\\n\", max_abs_error({oracle}, {test}, {}, {}));",
                c_literal(*lo),
                c_literal(*hi)
            ));
        }
    }
    lines.push("    return 0;".to_string());
    lines.push("}".to_string());
    lines
}

/// Driver that times each test implementation over each sub-domain.
pub fn assemble_timing_main(
    name: &str,
    tests: &[String],
    header: &str,
    domains: &[(f64, f64)],
) -> Vec<String> {
    let mut lines = vec![
        format!("/* timing measurement for {name} */"),
        format!("#include \"{header}\""),
        "#include <stdio.h>".to_string(),
        "#include <time.h>".to_string(),
        String::new(),
        "#define ITERS 1000000".to_string(),
        String::new(),
        "static double ns_per_call(double (*test)(double), double lo, double hi) {".to_string(),
        "    struct timespec start, end;".to_string(),
        "    volatile double sink = 0.0;".to_string(),
        "    clock_gettime(CLOCK_MONOTONIC, &start);".to_string(),
        "    for (int i = 0; i < ITERS; i++) {".to_string(),
        "        double x = lo + (hi - lo) * ((double)i / (ITERS - 1));".to_string(),
        "        sink += test(x);".to_string(),
        "    }".to_string(),
        "    clock_gettime(CLOCK_MONOTONIC, &end);".to_string(),
        "    (void)sink;".to_string(),
        "    double ns = (end.tv_sec - start.tv_sec) * 1e9".to_string(),
        "              + (end.tv_nsec - start.tv_nsec);".to_string(),
        "    return ns / ITERS;".to_string(),
        "}".to_string(),
        String::new(),
        "int main(void) {".to_string(),
        "    printf(\"function\\tdomain\\tns_per_call\\n\");".to_string(),
    ];
    for test in tests {
        for (lo, hi) in domains {
            lines.push(format!(
                "    printf(\"{test}\\t[{lo}, {hi}]\\t%.2f\\n\", ns_per_call({test}, {}, {}));",
                c_literal(*lo),
                c_literal(*hi)
            ));
        }
    }
    lines.push("    return 0;".to_string());
    lines.push("}".to_string());
    lines
}
