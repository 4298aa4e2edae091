//! Command-line interface for the mason synthesizer.

use std::path::PathBuf;

use clap::{Parser, Subcommand, ValueEnum};

#[derive(Parser)]
#[command(name = "mason")]
#[command(about = "Synthesizes domain-verified C implementations of scalar math functions", long_about = None)]
pub struct Cli {
    /// Logging verbosity (error, warn, info, debug, trace).
    #[arg(short, long, global = true, default_value = "warn")]
    pub verbosity: String,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand)]
pub enum Command {
    /// Parse an FPCore file and render it into an external textual form.
    Render {
        file: PathBuf,
        #[arg(short, long, value_enum, default_value = "libm")]
        format: RenderFormat,
    },

    /// Build the built-in asin construction and write its C artifacts.
    Demo {
        /// Output directory for the generated sources.
        #[arg(short, long, default_value = "generated")]
        out: PathBuf,
    },

    /// Enumerate candidate construction skeletons for a target function
    /// over a domain.
    Synth {
        file: PathBuf,
        /// Lower domain bound, as an FPCore expression.
        #[arg(long, allow_hyphen_values = true)]
        inf: String,
        /// Upper domain bound, as an FPCore expression.
        #[arg(long, allow_hyphen_values = true)]
        sup: String,
        /// How many holes to fill transitively before reporting.
        #[arg(long, default_value_t = 2)]
        depth: u32,
        /// JSON identity table; defaults to the built-in table.
        #[arg(long)]
        identities: Option<PathBuf>,
    },
}

#[derive(Clone, Copy, Debug, ValueEnum)]
pub enum RenderFormat {
    Libm,
    Mpfr,
    Sollya,
    Wolfram,
    Html,
    Egg,
}
