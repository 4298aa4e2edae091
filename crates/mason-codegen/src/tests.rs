//! Tests for block lowering and rendering.

use mason_core::{MasonDatabaseImpl, NumericFormat};
use mason_fpcore::{Expr, eval_closed, parse_expr, parse_one};
use mason_transforms::interval::Interval;
use mason_transforms::{IdentityTable, Node, type_check};

use crate::blocks::{Block, dense_slots};
use crate::errors::CodegenError;
use crate::{assemble, lower, validate};

fn poly_node<'db>(
    db: &'db MasonDatabaseImpl,
    exponents: Vec<u32>,
    coefficients: &[&str],
) -> std::sync::Arc<Node<'db>> {
    let sin = parse_one(db, "(FPCore (x) (sin x))").unwrap();
    let domain = Interval::parse(db, "0", "1").unwrap();
    let coefficients = coefficients
        .iter()
        .map(|c| parse_expr(db, c).unwrap())
        .collect();
    Node::fixed_polynomial(sin, domain, exponents, coefficients)
}

fn render<'db>(db: &'db MasonDatabaseImpl, node: &Node<'db>) -> (crate::Lowered<'db>, String) {
    let table = IdentityTable::new();
    let typed = type_check(db, &table, node).unwrap();
    let lowered = lower(db, &typed).unwrap();
    let text = lowered
        .blocks
        .iter()
        .flat_map(|b| b.to_c(db))
        .collect::<Vec<_>>()
        .join("\n");
    (lowered, text)
}

#[test]
fn horner_schedule() {
    let db = MasonDatabaseImpl::default();
    let node = Node::horner(poly_node(&db, vec![1, 3, 5], &["1", "0.25", "0.125"]), 0);
    let (_, text) = render(&db, &node);
    insta::assert_snapshot!("horner_schedule", text);
}

#[test]
fn estrin_schedule() {
    let db = MasonDatabaseImpl::default();
    let node = Node::estrin(poly_node(&db, vec![1, 3, 5], &["1", "0.25", "0.125"]), 0);
    let (_, text) = render(&db, &node);
    insta::assert_snapshot!("estrin_schedule", text);
}

#[test]
fn trivial_polynomial_renders_identically_under_both_schemes() {
    let db = MasonDatabaseImpl::default();
    let horner = Node::horner(poly_node(&db, vec![1], &["1"]), 0);
    let estrin = Node::estrin(poly_node(&db, vec![1], &["1"]), 0);
    let (_, h) = render(&db, &horner);
    let (_, e) = render(&db, &estrin);
    assert_eq!(h, e);
}

// Test-side mirrors of the two evaluation schedules, driven by the same
// dense layout the renderer uses. Equivalence here is what makes the two
// emitted orderings interchangeable up to rounding.
fn eval_horner(slots: &[Option<f64>], t: f64) -> f64 {
    let mut acc = slots[slots.len() - 1].unwrap_or(0.0);
    for slot in slots[..slots.len() - 1].iter().rev() {
        acc = slot.unwrap_or(0.0) + t * acc;
    }
    acc
}

fn eval_estrin(slots: &[Option<f64>], t: f64) -> f64 {
    let n = slots.len();
    if n == 1 {
        return slots[0].unwrap_or(0.0);
    }
    let p = 1usize << (usize::BITS - 1 - (n - 1).leading_zeros());
    eval_estrin(&slots[..p], t) + t.powi(p as i32) * eval_estrin(&slots[p..], t)
}

#[test]
fn schedules_agree_with_the_direct_sum() {
    let db = MasonDatabaseImpl::default();
    let exponents = vec![1u32, 3, 5, 7, 9, 11, 13];
    let texts = [
        "1",
        "0.1666666666666477004",
        "0.07500000000417969548",
        "0.04464285678140855751",
        "0.03038196065035564039",
        "0.0223717279703189581",
        "0.01736009463784134871",
    ];
    let coefficients: Vec<Expr> = texts.iter().map(|c| parse_expr(&db, c).unwrap()).collect();
    let values: Vec<f64> = coefficients
        .iter()
        .map(|c| eval_closed(&db, *c).unwrap())
        .collect();

    let (base, step, slots) = dense_slots(&exponents, &coefficients);
    assert_eq!((base, step), (1, 2));
    let slot_values: Vec<Option<f64>> = slots
        .iter()
        .map(|s| s.map(|e| eval_closed(&db, e).unwrap()))
        .collect();

    for i in 0..20 {
        let x = -0.5 + 0.05 * i as f64;
        let direct: f64 = exponents
            .iter()
            .zip(&values)
            .map(|(e, c)| c * x.powi(*e as i32))
            .sum();
        let t = x.powi(step as i32);
        let factor = x.powi(base as i32);
        let horner = factor * eval_horner(&slot_values, t);
        let estrin = factor * eval_estrin(&slot_values, t);
        assert!((horner - direct).abs() <= 1e-12 * direct.abs().max(1.0));
        assert!((estrin - direct).abs() <= 1e-12 * direct.abs().max(1.0));
        assert!((horner - estrin).abs() <= 1e-12 * direct.abs().max(1.0));
    }
}

#[test]
fn split_shortens_the_serial_chain() {
    let db = MasonDatabaseImpl::default();
    let node = Node::horner(
        poly_node(&db, vec![1, 3, 5, 7], &["1", "0.5", "0.25", "0.125"]),
        1,
    );
    let (_, text) = render(&db, &node);
    // Two chunks, summed at the end.
    assert!(text.contains("_c0"));
    assert!(text.contains("_c1"));
}

#[test]
fn mirror_lowering_wires_the_inner_names() {
    let db = MasonDatabaseImpl::default();
    let sin = parse_one(&db, "(FPCore (x) (sin x))").unwrap();
    let mut table = IdentityTable::new();
    table
        .add_mirror(
            &db,
            sin,
            parse_expr(&db, "0.5").unwrap(),
            parse_expr(&db, "(- y)").unwrap(),
        )
        .unwrap();
    let inner = Node::horner(
        Node::fixed_polynomial(
            sin,
            Interval::parse(&db, "0", "0.5").unwrap(),
            vec![1],
            vec![Expr::integer(&db, 1)],
        ),
        0,
    );
    let node = Node::mirror_right(inner);
    let typed = type_check(&db, &table, &node).unwrap();
    let lowered = lower(&db, &typed).unwrap();

    // Reduction block feeds the polynomial's input by name.
    assert_eq!(lowered.blocks[0].out_names(), lowered.blocks[1].in_names());
    assert!(validate(&lowered.blocks, &lowered.entry).is_ok());

    let last = lowered.blocks.last().unwrap();
    assert_eq!(last.out_names(), std::slice::from_ref(&lowered.result));
}

#[test]
fn split_domain_lowers_to_a_case_cascade() {
    let db = MasonDatabaseImpl::default();
    let table = IdentityTable::new();
    let lo = Node::horner(poly_node(&db, vec![1], &["1"]), 0);
    let hi = Node::horner(poly_node(&db, vec![0, 1], &["0.1", "1"]), 0);
    let node = Node::split_domain(vec![
        (Interval::parse(&db, "0", "0.5").unwrap(), lo),
        (Interval::parse(&db, "0.5", "1").unwrap(), hi),
    ]);
    let typed = type_check(&db, &table, &node).unwrap();
    let lowered = lower(&db, &typed).unwrap();
    assert_eq!(lowered.blocks.len(), 1);

    let text = lowered.blocks[0].to_c(&db).join("\n");
    assert!(text.contains("if ("));
    assert!(text.contains("else {"));
    assert!(validate(&lowered.blocks, &lowered.entry).is_ok());
}

#[test]
fn periodic_lowering_emits_a_reduction() {
    let db = MasonDatabaseImpl::default();
    let table = IdentityTable::builtin(&db);
    let sin = parse_one(&db, "(FPCore (x) (sin x))").unwrap();
    let inner = Node::horner(
        Node::fixed_polynomial(
            sin,
            Interval::parse(&db, "0", "6.5").unwrap(),
            vec![1],
            vec![Expr::integer(&db, 1)],
        ),
        0,
    );
    let node = Node::periodic(inner, parse_expr(&db, "(* 2 PI)").unwrap(), 30, 3);
    let typed = type_check(&db, &table, &node).unwrap();
    let lowered = lower(&db, &typed).unwrap();

    assert!(assemble::needs_cody_waite(&lowered.blocks));
    let text = lowered.blocks[0].to_c(&db).join("\n");
    assert!(text.contains("cody_waite_reduce("));
    assert!(text.contains("_period[3]"));
}

#[test]
fn compensated_reconstruction_splits_the_constant() {
    let db = MasonDatabaseImpl::default();
    let expr = parse_expr(&db, "(- (/ PI 2) (* 2 inner))").unwrap();
    let block = Block::Assign {
        format: NumericFormat::DoubleDouble,
        in_names: vec!["inner".to_string()],
        out_names: vec!["recons".to_string()],
        expr,
    };
    assert_eq!(
        block.to_c(&db),
        vec![
            "double recons = 1.5707963267948966 - ((2 * inner) - 6.123233995736766e-17);"
                .to_string()
        ]
    );
}

#[test]
fn non_linear_extended_assignments_fall_back_to_plain() {
    let db = MasonDatabaseImpl::default();
    let expr = parse_expr(&db, "(sqrt y)").unwrap();
    let block = Block::Assign {
        format: NumericFormat::DoubleDouble,
        in_names: vec!["y".to_string()],
        out_names: vec!["r".to_string()],
        expr,
    };
    assert_eq!(block.to_c(&db), vec!["double r = sqrt(y);".to_string()]);
}

#[test]
fn validation_rejects_forward_references() {
    let db = MasonDatabaseImpl::default();
    let ghost = parse_expr(&db, "ghost").unwrap();
    let blocks = vec![Block::Assign {
        format: NumericFormat::Fp64,
        in_names: vec!["ghost".to_string()],
        out_names: vec!["a".to_string()],
        expr: ghost,
    }];
    let err = validate(&blocks, "in_0").unwrap_err();
    assert!(matches!(err, CodegenError::UnboundName { .. }));
}

#[test]
fn validation_rejects_redeclaration() {
    let db = MasonDatabaseImpl::default();
    let one = parse_expr(&db, "1").unwrap();
    let mk = |out: &str| Block::Assign {
        format: NumericFormat::Fp64,
        in_names: vec![],
        out_names: vec![out.to_string()],
        expr: one,
    };
    let err = validate(&[mk("a"), mk("a")], "in_0").unwrap_err();
    assert!(matches!(err, CodegenError::DuplicateName { .. }));
}

#[test]
fn generated_function_has_the_requested_signature() {
    let db = MasonDatabaseImpl::default();
    let node = Node::horner(poly_node(&db, vec![1], &["1"]), 0);
    let table = IdentityTable::new();
    let typed = type_check(&db, &table, &node).unwrap();
    let lowered = lower(&db, &typed).unwrap();
    let (sig, lines) = assemble::generate_c(&db, &lowered, "mason_sin");
    assert_eq!(sig, format!("double mason_sin(double {});", lowered.entry));
    assert_eq!(lines[0], format!("double mason_sin(double {}) {{", lowered.entry));
    assert_eq!(lines[lines.len() - 2], format!("    return {};", lowered.result));
    assert_eq!(lines[lines.len() - 1], "}");
}

#[test]
fn mpfr_oracle_uses_the_arbitrary_precision_calls() {
    let db = MasonDatabaseImpl::default();
    let asin = parse_one(&db, "(FPCore (x) (asin x))").unwrap();
    let (sig, lines) = assemble::generate_mpfr_c(&db, asin, "oracle_asin");
    assert_eq!(sig, "int oracle_asin(double x, double* out);");
    assert!(lines.iter().any(|l| l.contains("mpfr_asin(t0, arg, MPFR_RNDN);")));
    assert!(lines.iter().any(|l| l.contains("mpfr_get_d")));
}

#[test]
fn header_lists_every_signature() {
    let sigs = vec![
        "double a(double x);".to_string(),
        "int b(double x, double* out);".to_string(),
    ];
    let header = assemble::assemble_header(&sigs);
    assert_eq!(header[0], "#ifndef FUNCS_H");
    assert!(header.contains(&sigs[0]));
    assert!(header.contains(&sigs[1]));
    assert_eq!(header.last().unwrap(), "#endif");
}

#[test]
fn bare_polynomials_cannot_be_lowered() {
    let db = MasonDatabaseImpl::default();
    let table = IdentityTable::new();
    let node = poly_node(&db, vec![1], &["1"]);
    let typed = type_check(&db, &table, &node).unwrap();
    let err = lower(&db, &typed).unwrap_err();
    assert!(matches!(err, CodegenError::NotAnImplementation { .. }));
}
