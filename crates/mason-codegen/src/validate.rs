//! Single-assignment validation of lowered block sequences.
//!
//! Every name a block consumes must have been declared by a strictly
//! earlier block or be the construction's entry parameter, and no name is
//! ever declared twice. Case arm bodies see the enclosing scope but leak
//! nothing out except through the case's own outputs.

use std::collections::HashSet;

use crate::blocks::Block;
use crate::errors::{CodegenError, CodegenResult};

pub fn validate(blocks: &[Block<'_>], entry: &str) -> CodegenResult<()> {
    let mut scope: HashSet<String> = HashSet::new();
    scope.insert(entry.to_string());
    validate_sequence(blocks, &mut scope)
}

fn validate_sequence(blocks: &[Block<'_>], scope: &mut HashSet<String>) -> CodegenResult<()> {
    for (index, block) in blocks.iter().enumerate() {
        for name in block.in_names() {
            if !scope.contains(name) {
                return Err(CodegenError::UnboundName {
                    index,
                    name: name.clone(),
                });
            }
        }
        if let Block::Case { arms, .. } = block {
            for arm in arms {
                let mut inner = scope.clone();
                if !inner.insert(arm.body_in.clone()) {
                    return Err(CodegenError::DuplicateName {
                        name: arm.body_in.clone(),
                    });
                }
                validate_sequence(&arm.body, &mut inner)?;
                if !inner.contains(&arm.body_out) {
                    return Err(CodegenError::MissingArmResult {
                        name: arm.body_out.clone(),
                    });
                }
            }
        }
        for name in block.out_names() {
            if !scope.insert(name.clone()) {
                return Err(CodegenError::DuplicateName { name: name.clone() });
            }
        }
    }
    Ok(())
}
