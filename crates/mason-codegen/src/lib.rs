//! Block IR and C assembly for checked constructions.

pub mod assemble;
pub mod blocks;
pub mod errors;
pub mod lower;
pub mod validate;

#[cfg(test)]
mod tests;

pub use assemble::{
    assemble_error_main, assemble_functions, assemble_header, assemble_timing_main, generate_c,
    generate_mpfr_c, needs_cody_waite,
};
pub use blocks::{Block, CaseArm};
pub use errors::{CodegenError, CodegenResult};
pub use lower::{Lowered, lower};
pub use validate::validate;
