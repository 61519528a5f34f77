#![forbid(unsafe_code)]
//! Types describing the execution plan the policy evaluator (C8) and decision
//! assembler (C9) hand back to the plugin facade (C10) on an `ALLOW` verdict.
//! Actually spawning the target process is outside this crate's scope; this module
//! only carries the *decision*, not the execution machinery that would act on it.

/// How the target process's file-creation mask should be set up, derived from the
/// `umask` and `umask_override` Defaults settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Umask {
    /// `umask` is `0777`: leave the caller's umask untouched.
    Preserve,
    /// `umask_override` is set: replace the caller's umask outright.
    Override(u16),
    /// The default: widen the caller's umask to be at least as restrictive as this.
    Extend(u16),
}
