//! mason CLI entry point.

mod cli;

use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;
use tracing::debug;
use tracing_subscriber::EnvFilter;

use cli::{Cli, Command, RenderFormat};
use mason::constructions::asin_construction;
use mason::pipeline::{compile, write_artifacts};
use mason_core::{Db, MasonDatabaseImpl};
use mason_fpcore::render::{fpcore_to_sexpr, to_html, to_libm_c, to_sollya, to_wolfram};
use mason_fpcore::{FpCore, parse_diagnostics, parse_source_file};
use mason_transforms::interval::Interval;
use mason_transforms::{IdentityTable, Node, OutType, expand};

fn main() -> ExitCode {
    let cli = Cli::parse();

    let filter = EnvFilter::try_new(&cli.verbosity).unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    match cli.command {
        Command::Render { file, format } => render_file(file, format),
        Command::Demo { out } => demo(out),
        Command::Synth {
            file,
            inf,
            sup,
            depth,
            identities,
        } => synth(file, inf, sup, depth, identities),
    }
}

fn load_cores(db: &MasonDatabaseImpl, file: PathBuf) -> Result<Vec<FpCore<'_>>, ExitCode> {
    let source = match db.input(file) {
        Ok(source) => source,
        Err(e) => {
            eprintln!("error reading input: {e}");
            return Err(ExitCode::FAILURE);
        }
    };
    let cores = parse_source_file(db, source);
    let diagnostics = parse_diagnostics(db, source);
    if !diagnostics.is_empty() {
        for diag in &diagnostics {
            eprintln!("[{:?}] {}: {}", diag.phase, diag.severity, diag.message);
        }
        return Err(ExitCode::FAILURE);
    }
    if cores.is_empty() {
        eprintln!("no FPCore forms found");
        return Err(ExitCode::FAILURE);
    }
    Ok(cores)
}

fn render_file(file: PathBuf, format: RenderFormat) -> ExitCode {
    let db = MasonDatabaseImpl::default();
    let cores = match load_cores(&db, file) {
        Ok(cores) => cores,
        Err(code) => return code,
    };
    for core in cores {
        let body = core.body(&db);
        match format {
            RenderFormat::Libm => println!("{}", to_libm_c(&db, body)),
            RenderFormat::Sollya => println!("{}", to_sollya(&db, body)),
            RenderFormat::Wolfram => println!("{}", to_wolfram(&db, body)),
            RenderFormat::Html => println!("{}", to_html(&db, body)),
            RenderFormat::Egg => println!("{}", fpcore_to_sexpr(&db, core)),
            RenderFormat::Mpfr => {
                let name = core
                    .display_name(&db)
                    .unwrap_or_else(|| "oracle".to_string())
                    .replace(|c: char| !c.is_ascii_alphanumeric(), "_");
                let (_, lines) = mason_codegen::generate_mpfr_c(&db, core, &name);
                println!("{}", lines.join("\n"));
            }
        }
    }
    ExitCode::SUCCESS
}

fn demo(out: PathBuf) -> ExitCode {
    let db = MasonDatabaseImpl::default();
    let table = IdentityTable::builtin(&db);
    let construction = match asin_construction(&db) {
        Ok(node) => node,
        Err(e) => {
            eprintln!("{e}");
            return ExitCode::FAILURE;
        }
    };
    println!("{}", construction.describe(&db));

    let domains = [(-1.0, 1.0), (0.0, 1.0), (0.4375, 0.5625)];
    let artifacts = match compile(&db, &table, &construction, "mason_asin", &domains) {
        Ok(artifacts) => artifacts,
        Err(e) => {
            eprintln!("{e}");
            return ExitCode::FAILURE;
        }
    };
    match write_artifacts(&artifacts, &out) {
        Ok(paths) => {
            for path in paths {
                println!("wrote {}", path.display());
            }
            ExitCode::SUCCESS
        }
        Err(e) => {
            eprintln!("error writing artifacts: {e}");
            ExitCode::FAILURE
        }
    }
}

fn synth(
    file: PathBuf,
    inf: String,
    sup: String,
    depth: u32,
    identities: Option<PathBuf>,
) -> ExitCode {
    let db = MasonDatabaseImpl::default();
    let cores = match load_cores(&db, file) {
        Ok(cores) => cores,
        Err(code) => return code,
    };
    let function = cores[0];

    let table = match identities {
        None => IdentityTable::builtin(&db),
        Some(path) => {
            let text = match std::fs::read_to_string(&path) {
                Ok(text) => text,
                Err(e) => {
                    eprintln!("error reading identity table: {e}");
                    return ExitCode::FAILURE;
                }
            };
            match IdentityTable::load_json(&db, &text) {
                Ok(table) => table,
                Err(e) => {
                    eprintln!("{e}");
                    return ExitCode::FAILURE;
                }
            }
        }
    };

    debug!(identities = %table.describe(&db), "identity table loaded");

    let domain = match Interval::parse(&db, &inf, &sup) {
        Ok(domain) => domain,
        Err(e) => {
            eprintln!("{e}");
            return ExitCode::FAILURE;
        }
    };
    let goal = OutType::Impl { function, domain };
    let trees = expand(&db, &table, &Node::hole(goal), depth);
    if trees.len() == 1 && trees[0].first_hole().is_some() {
        eprintln!("no transform can realize this goal with the known identities");
    }
    for tree in trees {
        println!("{}", tree.describe(&db));
    }
    ExitCode::SUCCESS
}
