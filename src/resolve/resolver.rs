//! Cross-file reference resolution.
//!
//! Given a file's IR and the batch's pre-scan map, rewrite every call to a
//! target file path. Resolution priority, first match wins:
//!
//! 1. inferred receiver type found in the map → its first defining file
//! 2. short name defined in the current file → the current file
//! 3. exactly one definition in the map → that file
//! 4. several definitions, and the caller imports a module whose path
//!    suffix matches one → that one
//! 5. short name in the map at all → the first defining file
//! 6. fallback → the current file (the edge is still emitted; readers detect
//!    unresolved calls by a self-target with no such local definition)
//!
//! Base classes use the same rules, except an unresolved base yields no
//! edge at all.

use std::path::{Path, PathBuf};

use crate::ir::{CallIr, FileIr};
use crate::resolve::SymbolMap;

pub struct Resolver<'a> {
    symbols: &'a SymbolMap,
}

impl<'a> Resolver<'a> {
    pub fn new(symbols: &'a SymbolMap) -> Self {
        Self { symbols }
    }

    /// Target file of a call site. Deterministic for a fixed map.
    pub fn resolve_call(&self, ir: &FileIr, call: &CallIr) -> PathBuf {
        // Rule 1: receiver type known and defined somewhere.
        if let Some(receiver) = &call.receiver_type {
            if let Some(file) = self.symbols.first_file(receiver) {
                return file.to_path_buf();
            }
        }

        let short = head_segment(&call.full_name);

        // Rule 2: defined in the current file.
        if ir.defines(short) {
            return ir.file_path.clone();
        }

        match self.symbols.files_for(short) {
            // Rule 3: unambiguous.
            Some([only]) => only.clone(),
            // Rules 4 and 5: ambiguous.
            Some(candidates) => self
                .import_disambiguated(ir, candidates)
                .unwrap_or_else(|| candidates[0].clone()),
            // Rule 6: fallback to the caller's own file.
            None => ir.file_path.clone(),
        }
    }

    /// Target file of a base-class or interface name. `None` drops the edge.
    pub fn resolve_base(&self, ir: &FileIr, base: &str) -> Option<PathBuf> {
        let short = head_segment(base);
        if ir.defines(short) {
            return Some(ir.file_path.clone());
        }
        match self.symbols.files_for(short)? {
            [only] => Some(only.clone()),
            candidates => Some(
                self.import_disambiguated(ir, candidates)
                    .unwrap_or_else(|| candidates[0].clone()),
            ),
        }
    }

    /// Rule 4: pick the candidate whose path suffix matches one of the
    /// caller's imports (`a.b.c` matches `.../a/b/c.<ext>`).
    fn import_disambiguated(&self, ir: &FileIr, candidates: &[PathBuf]) -> Option<PathBuf> {
        for import in &ir.imports {
            let suffix = import.full_name.trim_end_matches(".*").replace('.', "/");
            if suffix.is_empty() {
                continue;
            }
            for candidate in candidates {
                if path_matches_suffix(candidate, &suffix) {
                    return Some(candidate.clone());
                }
            }
        }
        None
    }
}

/// Head segment of a dotted/qualified name: `obj.method` → `obj`,
/// `helper` → `helper`.
fn head_segment(full_name: &str) -> &str {
    full_name.split(['.']).next().unwrap_or(full_name)
}

/// Whether a candidate path, extension stripped, ends with the import's
/// slash-separated suffix.
fn path_matches_suffix(candidate: &Path, suffix: &str) -> bool {
    let stem = candidate.with_extension("");
    let normalized = stem.to_string_lossy().replace('\\', "/");
    normalized.ends_with(suffix)
}
