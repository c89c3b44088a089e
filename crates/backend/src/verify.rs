//! Structural checks over emitted IR text, used by the test suite and the
//! driver's `verify` subcommand: block termination, branch-target
//! resolution, register numbering, stack save/restore pairing and phi
//! shape.

use std::collections::HashSet;

use anyhow::{anyhow, Result};

/// Verify the structural invariants of an emitted module.
///
/// - every label block ends in exactly one terminator, and nothing follows
///   a terminator inside a block;
/// - every branch target is defined within its function;
/// - `%.N` definitions are unique and strictly increasing per function;
/// - every stack-save key has a matching restore in the same function;
/// - every `phi` carries exactly two incoming edges.
pub fn verify_ir(ir: &str) -> Result<()> {
    let mut in_func = false;
    let mut saw_term = false;
    let mut have_block = false;

    let mut label_defs: HashSet<String> = HashSet::new();
    let mut branch_targets: Vec<String> = Vec::new();
    let mut defined_regs: HashSet<usize> = HashSet::new();
    let mut last_reg: Option<usize> = None;
    let mut saved_keys: HashSet<String> = HashSet::new();
    let mut restored_keys: HashSet<String> = HashSet::new();

    for raw in ir.lines() {
        let line = raw.trim();
        if line.is_empty() {
            continue;
        }
        if let Some(rest) = line.strip_prefix("; <label>:") {
            // Comment-style labels from the runtime stubs still define
            // branch targets and open a fresh block.
            if let Some(name) = rest.split(':').next() {
                label_defs.insert(name.to_string());
            }
            have_block = true;
            saw_term = false;
            continue;
        }
        if line.starts_with(';') {
            continue;
        }

        if line.starts_with("define ") {
            in_func = true;
            saw_term = false;
            have_block = true;
            label_defs.clear();
            branch_targets.clear();
            defined_regs.clear();
            last_reg = None;
            saved_keys.clear();
            restored_keys.clear();
            continue;
        }

        if line == "}" {
            if !saw_term {
                return Err(anyhow!("function ends without a terminator"));
            }
            for target in &branch_targets {
                if !label_defs.contains(target) {
                    return Err(anyhow!("undefined label: {}", target));
                }
            }
            for key in &saved_keys {
                if !restored_keys.contains(key) {
                    return Err(anyhow!("stack save without restore: %dyn.{}", key));
                }
            }
            in_func = false;
            have_block = false;
            continue;
        }

        if !in_func {
            continue;
        }

        if line.ends_with(':') && !line.contains(' ') {
            let name = line.trim_end_matches(':').to_string();
            if have_block && !saw_term {
                return Err(anyhow!("missing terminator before label: {}", name));
            }
            label_defs.insert(name);
            have_block = true;
            saw_term = false;
            continue;
        }

        if saw_term {
            return Err(anyhow!("instruction after terminator: {}", line));
        }

        if let Some(reg) = parse_register_def(line) {
            if !defined_regs.insert(reg) {
                return Err(anyhow!("register %.{} defined twice", reg));
            }
            if let Some(prev) = last_reg {
                if reg <= prev {
                    return Err(anyhow!(
                        "register numbering not monotone: %.{} after %.{}",
                        reg,
                        prev
                    ));
                }
            }
            last_reg = Some(reg);
        }

        if let Some(key) = stack_key(line) {
            if line.starts_with("store ") {
                saved_keys.insert(key);
            } else if line.contains("= load i8*") {
                restored_keys.insert(key);
            }
        }

        if line.contains(" = phi ") {
            let edges = line.matches('[').count();
            if edges != 2 {
                return Err(anyhow!("phi with {} incoming edges: {}", edges, line));
            }
        }

        if line.starts_with("ret ") || line == "unreachable" {
            saw_term = true;
            continue;
        }
        if line.starts_with("br ") {
            let mut rest = line;
            while let Some(pos) = rest.find("label %") {
                rest = &rest[pos + "label %".len()..];
                let target: String = rest
                    .chars()
                    .take_while(|c| !c.is_whitespace() && *c != ',')
                    .collect();
                if !target.is_empty() {
                    branch_targets.push(target);
                }
            }
            saw_term = true;
            continue;
        }
    }

    for target in &branch_targets {
        if !label_defs.contains(target) {
            return Err(anyhow!("undefined label: {}", target));
        }
    }
    Ok(())
}

/// `%.N = ...` on the left-hand side of an instruction.
fn parse_register_def(line: &str) -> Option<usize> {
    let rest = line.strip_prefix("%.")?;
    let digits: String = rest.chars().take_while(|c| c.is_ascii_digit()).collect();
    let tail = &rest[digits.len()..];
    if digits.is_empty() || !tail.starts_with(" = ") {
        return None;
    }
    digits.parse().ok()
}

/// Key of a stack save or restore touching `i8** %dyn.K`.
fn stack_key(line: &str) -> Option<String> {
    let pos = line.find("i8** %dyn.")?;
    let rest = &line[pos + "i8** %dyn.".len()..];
    let key: String = rest
        .chars()
        .take_while(|c| *c == '-' || c.is_ascii_digit())
        .collect();
    if key.is_empty() {
        None
    } else {
        Some(key)
    }
}
