//! State canonicalization
//!
//! The canonical form is a text rendering of everything that makes two
//! contexts the same state. Maps are ordered, so the rendering of equal
//! contexts is byte-identical.

use std::fmt::Write;

use sha2::{Digest, Sha256};

use super::context::ExecutionContext;

/// Deterministic text encoding of a context
pub fn canonical_form(ctx: &ExecutionContext) -> String {
    let mut out = String::new();

    match ctx.current {
        Some(id) => {
            let _ = write!(out, "cmd={}", id);
        }
        None => out.push_str("cmd=terminated"),
    }

    out.push_str(";calls=[");
    for (i, id) in ctx.invocations.iter().enumerate() {
        if i > 0 {
            out.push(',');
        }
        let _ = write!(out, "{}", id);
    }
    out.push(']');

    let _ = write!(out, ";nonatomic={}", ctx.non_atomic_active);

    out.push_str(";frames=[");
    for (i, frame) in ctx.bindings.frames().iter().enumerate() {
        if i > 0 {
            out.push(',');
        }
        let _ = write!(out, "{}{{", frame.kind());
        write_bindings(&mut out, frame.vars().iter());
        out.push('}');
    }
    out.push(']');

    out.push_str(";initial={");
    write_bindings(&mut out, ctx.initial.iter());
    out.push('}');

    let _ = write!(out, ";time={};power={}", ctx.elapsed_time, ctx.total_power);

    out.push_str(";obs={");
    for (i, (time, observation)) in ctx.observations.iter().enumerate() {
        if i > 0 {
            out.push(',');
        }
        let _ = write!(out, "{}:({};[", time, observation.power);
        for (j, value) in observation.values.iter().enumerate() {
            if j > 0 {
                out.push(',');
            }
            let _ = write!(out, "{}", value);
        }
        out.push_str("])");
    }
    out.push('}');

    out
}

/// SHA-256 of the canonical form, as lowercase hex
pub fn canonical_hash(ctx: &ExecutionContext) -> String {
    hash_form(&canonical_form(ctx))
}

/// Hash an already rendered canonical form
pub fn hash_form(form: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(form.as_bytes());
    format!("{:x}", hasher.finalize())
}

fn write_bindings<'a>(
    out: &mut String,
    bindings: impl Iterator<Item = (&'a String, &'a crate::rational::Rational)>,
) {
    for (i, (name, value)) in bindings.enumerate() {
        if i > 0 {
            out.push(',');
        }
        let _ = write!(out, "{}={}", name, value);
    }
}
