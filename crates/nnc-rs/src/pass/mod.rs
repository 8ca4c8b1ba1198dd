//! Module-pass interface shared by graph transformations.

use crate::ir::graph::Module;

/// Outcome reported to the pass manager by a module pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PassOutcome {
    /// The pass ran to completion without observable IR changes.
    Unchanged,
    /// The pass changed the IR.
    Changed,
    /// The pass could not run; the module was left untouched.
    Failure,
}

impl PassOutcome {
    pub fn is_failure(self) -> bool {
        matches!(self, PassOutcome::Failure)
    }
}

/// Canonical interface implemented by passes that operate on one module.
pub trait ModulePass {
    fn name(&self) -> &'static str;
    fn run(&mut self, module: &mut Module) -> PassOutcome;
}

/// Per-pass diagnostics are printed when `NNC_PASS_STATS` is set.
pub fn pass_stats_enabled() -> bool {
    std::env::var("NNC_PASS_STATS").is_ok()
}

pub(crate) fn log_pass_stats(name: &str, outcome: PassOutcome, detail: &str) {
    println!("[pass] pass={name} outcome={outcome:?} {detail}");
}
