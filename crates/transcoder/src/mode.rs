/// Whether a run mutates the filesystem or only reports what it would do.
///
/// Every operation that renames, deletes or spawns the encoder takes the mode
/// explicitly instead of guessing from a flag at the call site.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ExecutionMode {
    /// Simulate every decision; touch nothing.
    #[default]
    DryRun,
    /// Invoke the encoder, rename outputs, delete sources.
    Commit,
}

impl ExecutionMode {
    /// Map the `--commit` flag onto a mode
    pub fn from_commit_flag(commit: bool) -> Self {
        if commit {
            ExecutionMode::Commit
        } else {
            ExecutionMode::DryRun
        }
    }

    pub fn is_commit(self) -> bool {
        self == ExecutionMode::Commit
    }

    pub fn is_dry_run(self) -> bool {
        self == ExecutionMode::DryRun
    }
}
