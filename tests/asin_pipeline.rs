//! End-to-end test of the worked asin construction: a linear tail, a
//! rational polynomial core, the half-angle fold for the upper range, and
//! an odd reflection onto the negative axis.

use mason::constructions::asin_construction;
use mason::pipeline::{PipelineError, compile, write_artifacts};
use mason_codegen::{generate_c, lower, validate};
use mason_core::MasonDatabaseImpl;
use mason_fpcore::render::to_egg_sexpr;
use mason_fpcore::{Expr, parse_one};
use mason_transforms::interval::Interval;
use mason_transforms::{IdentityTable, Node, type_check};

#[test]
fn checks_to_an_implementation_over_the_full_domain() {
    let db = MasonDatabaseImpl::default();
    let table = IdentityTable::builtin(&db);
    let node = asin_construction(&db).unwrap();
    let typed = type_check(&db, &table, &node).unwrap();
    assert!(typed.out_type.is_impl());
    assert_eq!(
        to_egg_sexpr(&db, typed.out_type.function().canonical_body(&db)),
        "(asin x)"
    );
    assert_eq!(typed.out_type.domain().inf_val(), -1.0);
    assert_eq!(typed.out_type.domain().sup_val(), 1.0);
}

#[test]
fn lowering_has_no_forward_references() {
    let db = MasonDatabaseImpl::default();
    let table = IdentityTable::builtin(&db);
    let node = asin_construction(&db).unwrap();
    let typed = type_check(&db, &table, &node).unwrap();
    let lowered = lower(&db, &typed).unwrap();
    assert!(validate(&lowered.blocks, &lowered.entry).is_ok());
}

#[test]
fn generated_c_keeps_the_published_coefficients() {
    let db = MasonDatabaseImpl::default();
    let table = IdentityTable::builtin(&db);
    let node = asin_construction(&db).unwrap();
    let typed = type_check(&db, &table, &node).unwrap();
    let lowered = lower(&db, &typed).unwrap();
    let (sig, lines) = generate_c(&db, &lowered, "mason_asin");
    let text = lines.join("\n");

    assert!(sig.starts_with("double mason_asin(double "));
    // Coefficients are emitted digit for digit.
    assert!(text.contains("1.66666666666666657415e-01"));
    assert!(text.contains("-2.40339491173441421878e+00"));
    // The half-angle reduction and its compensated reconstruction.
    assert!(text.contains("sqrt("));
    assert!(text.contains("1.5707963267948966 - ("));
    assert!(text.contains("6.123233995736766e-17"));
    // Sub-domain dispatch lowers to a conditional cascade.
    assert!(text.contains("else {"));
}

#[test]
fn artifacts_are_written_to_disk() {
    let db = MasonDatabaseImpl::default();
    let table = IdentityTable::builtin(&db);
    let node = asin_construction(&db).unwrap();
    let artifacts = compile(
        &db,
        &table,
        &node,
        "mason_asin",
        &[(-1.0, 1.0), (0.0, 1.0)],
    )
    .unwrap();

    let dir = tempfile::tempdir().unwrap();
    let written = write_artifacts(&artifacts, dir.path()).unwrap();
    assert_eq!(written.len(), 4);
    for path in &written {
        assert!(path.exists());
    }

    let header = std::fs::read_to_string(dir.path().join("funcs.h")).unwrap();
    assert!(header.contains("double mason_asin(double "));
    assert!(header.contains("int mason_asin_oracle(double x, double* out);"));

    let funcs = std::fs::read_to_string(dir.path().join("funcs.c")).unwrap();
    assert!(funcs.contains("mpfr_asin"));

    let error_main = std::fs::read_to_string(dir.path().join("error_main.c")).unwrap();
    assert!(error_main.contains("max_abs_error(mason_asin_oracle, mason_asin"));
}

#[test]
fn failed_constructions_surface_the_check_error() {
    let db = MasonDatabaseImpl::default();
    let table = IdentityTable::new();
    let sin = parse_one(&db, "(FPCore (x) (sin x))").unwrap();
    // Narrow beyond the proven domain is unsound and must be rejected.
    let inner = Node::horner(
        Node::fixed_polynomial(
            sin,
            Interval::parse(&db, "0", "1").unwrap(),
            vec![1],
            vec![Expr::integer(&db, 1)],
        ),
        0,
    );
    let node = Node::narrow(inner, Interval::parse(&db, "0", "2").unwrap());
    let err = compile(&db, &table, &node, "bad", &[(0.0, 1.0)]).unwrap_err();
    assert!(matches!(err, PipelineError::Check(_)));
}
