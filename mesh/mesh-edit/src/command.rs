//! The undoable command protocol.
//!
//! A [`Command`] is a reversible edit against a mesh and its controller
//! registry. Commands are state machines: constructed clear, `doit` moves
//! them to done (first execution may capture undo data), `undoit` moves
//! them back. Re-running a done command or un-running a clear one is a
//! harmless no-op that reports success.

use mesh_control::ControlSet;
use mesh_subdiv::SubdivMesh;

/// Execution state of a command.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CmdState {
    /// Never executed.
    #[default]
    Clear,
    /// Executed; effects are live.
    Done,
    /// Executed and then reversed.
    Undone,
}

/// Everything a command may touch: the mesh and the controller registry.
#[derive(Debug)]
pub struct EditCtx<'a> {
    /// The subdivision mesh under edit.
    pub mesh: &'a mut SubdivMesh,
    /// Controllers over the mesh.
    pub controls: &'a mut ControlSet,
}

impl<'a> EditCtx<'a> {
    /// Bundles a mesh and controller registry for command execution.
    pub fn new(mesh: &'a mut SubdivMesh, controls: &'a mut ControlSet) -> Self {
        Self { mesh, controls }
    }
}

/// A reversible edit.
///
/// `doit` returns false when the edit does not apply (nothing was
/// changed); `undoit` returns false when undo data is missing or stale.
pub trait Command {
    /// Applies (or re-applies) the edit. No-op returning true when already
    /// done.
    fn doit(&mut self, ctx: &mut EditCtx<'_>) -> bool;

    /// Reverses the edit. No-op returning true when not currently done.
    fn undoit(&mut self, ctx: &mut EditCtx<'_>) -> bool;

    /// Current execution state.
    fn state(&self) -> CmdState;
}

/// Runs a list of commands as one edit.
///
/// `doit` stops at the first failing sub-command and reports failure;
/// already-applied sub-commands stay applied (callers treat a partial
/// failure as a broken edit, not something to roll back silently).
/// `undoit` reverses the applied prefix in reverse order.
#[derive(Default)]
pub struct MultiCmd {
    cmds: Vec<Box<dyn Command>>,
    state: CmdState,
    applied: usize,
}

impl std::fmt::Debug for MultiCmd {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MultiCmd")
            .field("len", &self.cmds.len())
            .field("state", &self.state)
            .field("applied", &self.applied)
            .finish()
    }
}

impl MultiCmd {
    /// Creates an empty command list.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a sub-command.
    pub fn push(&mut self, cmd: Box<dyn Command>) {
        self.cmds.push(cmd);
    }

    /// Number of sub-commands.
    #[must_use]
    pub fn len(&self) -> usize {
        self.cmds.len()
    }

    /// True when the list is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.cmds.is_empty()
    }
}

impl Command for MultiCmd {
    fn doit(&mut self, ctx: &mut EditCtx<'_>) -> bool {
        if self.state == CmdState::Done {
            return true;
        }
        for (i, cmd) in self.cmds.iter_mut().enumerate() {
            if !cmd.doit(ctx) {
                tracing::warn!(failed = i, total = self.cmds.len(), "multi command stopped");
                self.applied = i;
                self.state = CmdState::Done;
                return false;
            }
        }
        self.applied = self.cmds.len();
        self.state = CmdState::Done;
        true
    }

    fn undoit(&mut self, ctx: &mut EditCtx<'_>) -> bool {
        if self.state != CmdState::Done {
            return true;
        }
        let mut ok = true;
        for cmd in self.cmds[..self.applied].iter_mut().rev() {
            ok &= cmd.undoit(ctx);
        }
        self.state = CmdState::Undone;
        ok
    }

    fn state(&self) -> CmdState {
        self.state
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use mesh_subdiv::Point3;

    #[derive(Debug, Default)]
    struct CountCmd {
        state: CmdState,
        runs: usize,
    }

    impl Command for CountCmd {
        fn doit(&mut self, _ctx: &mut EditCtx<'_>) -> bool {
            if self.state == CmdState::Done {
                return true;
            }
            self.runs += 1;
            self.state = CmdState::Done;
            true
        }

        fn undoit(&mut self, _ctx: &mut EditCtx<'_>) -> bool {
            if self.state != CmdState::Done {
                return true;
            }
            self.state = CmdState::Undone;
            true
        }

        fn state(&self) -> CmdState {
            self.state
        }
    }

    #[test]
    fn test_multi_cmd_runs_and_reverses() {
        let mut mesh = SubdivMesh::new();
        let _ = mesh.add_vert(Point3::origin());
        let mut controls = ControlSet::new();
        let mut ctx = EditCtx::new(&mut mesh, &mut controls);

        let mut multi = MultiCmd::new();
        multi.push(Box::new(CountCmd::default()));
        multi.push(Box::new(CountCmd::default()));
        assert_eq!(multi.state(), CmdState::Clear);
        assert!(multi.doit(&mut ctx));
        assert_eq!(multi.state(), CmdState::Done);
        // re-running is a no-op
        assert!(multi.doit(&mut ctx));
        assert!(multi.undoit(&mut ctx));
        assert_eq!(multi.state(), CmdState::Undone);
        // undoing twice is a no-op
        assert!(multi.undoit(&mut ctx));
    }
}
