//! Seam joining.
//!
//! [`JoinSeamCmd`] merges one vertex chain onto another: every face and
//! edge referencing the old chain is redirected to the corresponding new
//! chain element, and subdivision parents of old-chain vertices are
//! repointed. Old-chain elements are left in the mesh, dangling, so undo
//! can put every reference back.
//!
//! The merge runs in a fixed phase order: faces by vertex, then non-chain
//! edges by vertex, then faces by chain edge, then reparenting. All
//! sub-commands are built from the pristine pre-merge topology before any
//! of them executes.

use hashbrown::HashSet;
use tracing::info;

use mesh_subdiv::{SimplexId, SubdivMesh, VertId};

use crate::command::{CmdState, Command, EditCtx, MultiCmd};
use crate::error::{EditError, EditResult};
use crate::primitives::{RedefEdgeCmd, RedefFaceECmd, RedefFaceVCmd, ReparentCmd};

/// Merges the `old` chain onto the `new` chain.
///
/// Both chains must have equal length and matching topology: either both
/// closed, or both open and already sharing their endpoint vertices. The
/// interior of the old chain ends up unreferenced by any face or edge.
#[derive(Debug)]
pub struct JoinSeamCmd {
    old: Vec<VertId>,
    new: Vec<VertId>,
    closed: bool,
    cmds: MultiCmd,
    built: bool,
    state: CmdState,
}

impl JoinSeamCmd {
    /// Validates chain topology and constructs the command. No mesh
    /// mutation happens here.
    ///
    /// # Errors
    /// [`EditError::ChainMismatch`], [`EditError::NotAChain`],
    /// [`EditError::MixedChainTypes`], or
    /// [`EditError::OpenChainEndpoints`].
    pub fn new(mesh: &SubdivMesh, old: Vec<VertId>, new: Vec<VertId>) -> EditResult<Self> {
        if old.len() != new.len() {
            return Err(EditError::ChainMismatch(old.len(), new.len()));
        }
        if !mesh.forms_chain(&old) || !mesh.forms_chain(&new) {
            return Err(EditError::NotAChain);
        }
        let old_closed = mesh.forms_closed_chain(&old);
        let new_closed = mesh.forms_closed_chain(&new);
        if old_closed != new_closed {
            return Err(EditError::MixedChainTypes);
        }
        if !old_closed {
            let last = old.len() - 1;
            if old[0] != new[0] || old[last] != new[last] {
                return Err(EditError::OpenChainEndpoints);
            }
        }
        Ok(Self {
            old,
            new,
            closed: old_closed,
            cmds: MultiCmd::new(),
            built: false,
            state: CmdState::Clear,
        })
    }

    /// Interior vertex indices: everything for closed chains, endpoints
    /// excluded for open ones (they are already shared).
    fn interior(&self) -> std::ops::Range<usize> {
        if self.closed {
            0..self.old.len()
        } else {
            1..self.old.len() - 1
        }
    }

    fn build(&mut self, mesh: &SubdivMesh) -> bool {
        let Ok(old_edges) = mesh.chain_edges(&self.old, self.closed) else {
            return false;
        };
        let Ok(new_edges) = mesh.chain_edges(&self.new, self.closed) else {
            return false;
        };
        let old_edge_set: HashSet<_> = old_edges.iter().copied().collect();

        // faces by vertex
        for i in self.interior() {
            for f in mesh.faces_around_vert(self.old[i]) {
                self.cmds
                    .push(Box::new(RedefFaceVCmd::new(f, self.old[i], self.new[i])));
            }
        }
        // non-chain edges by vertex
        for i in self.interior() {
            let Ok(vert) = mesh.vert(self.old[i]) else {
                return false;
            };
            for &e in vert.edges() {
                if !old_edge_set.contains(&e) {
                    self.cmds
                        .push(Box::new(RedefEdgeCmd::new(e, self.old[i], self.new[i])));
                }
            }
        }
        // faces by chain edge
        for (&oe, &ne) in old_edges.iter().zip(&new_edges) {
            let Ok(edge) = mesh.edge(oe) else {
                return false;
            };
            for f in edge.faces().into_iter().flatten() {
                self.cmds.push(Box::new(RedefFaceECmd::new(f, oe, ne)));
            }
        }
        // subdivision parents now generate the new chain
        for i in self.interior() {
            let parent = mesh.vert(self.old[i]).ok().and_then(|v| v.parent());
            match parent {
                Some(p @ (SimplexId::Vert(_) | SimplexId::Edge(_))) => {
                    self.cmds.push(Box::new(ReparentCmd::new(p, self.new[i])));
                }
                _ => {}
            }
        }
        info!(
            verts = self.old.len(),
            closed = self.closed,
            steps = self.cmds.len(),
            "seam join planned"
        );
        true
    }
}

impl Command for JoinSeamCmd {
    fn doit(&mut self, ctx: &mut EditCtx<'_>) -> bool {
        if self.state == CmdState::Done {
            return true;
        }
        if !self.built {
            if !self.build(ctx.mesh) {
                return false;
            }
            self.built = true;
        }
        let ok = self.cmds.doit(ctx);
        self.state = CmdState::Done;
        ok
    }

    fn undoit(&mut self, ctx: &mut EditCtx<'_>) -> bool {
        if self.state != CmdState::Done {
            return true;
        }
        let ok = self.cmds.undoit(ctx);
        self.state = CmdState::Undone;
        ok
    }

    fn state(&self) -> CmdState {
        self.state
    }
}
