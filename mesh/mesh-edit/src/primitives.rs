//! Atomic reversible edits.
//!
//! Each primitive swaps one reference or scalar and can put it back. The
//! redefinition commands are deliberately lightweight: swapping a face
//! corner does not touch the face's edges, and swapping an edge slot does
//! not touch corners. Seam joining composes them in a fixed order instead.

use nalgebra::Point3;

use mesh_subdiv::{EdgeId, FaceId, SimplexId, VertId};

use crate::command::{CmdState, Command, EditCtx};

/// Redirects a parent simplex's child pointer to another vertex.
///
/// The displaced child pointer is captured at first execution so undo can
/// restore it.
#[derive(Debug)]
pub struct ReparentCmd {
    parent: SimplexId,
    new_child: VertId,
    old_child: Option<VertId>,
    captured: bool,
    state: CmdState,
}

impl ReparentCmd {
    /// Repoints `parent`'s subdivision child at `new_child`.
    #[must_use]
    pub fn new(parent: SimplexId, new_child: VertId) -> Self {
        Self {
            parent,
            new_child,
            old_child: None,
            captured: false,
            state: CmdState::Clear,
        }
    }
}

impl Command for ReparentCmd {
    fn doit(&mut self, ctx: &mut EditCtx<'_>) -> bool {
        if self.state == CmdState::Done {
            return true;
        }
        if !self.captured {
            self.old_child = match self.parent {
                SimplexId::Vert(p) => ctx.mesh.vert(p).ok().and_then(|v| v.child()),
                SimplexId::Edge(p) => ctx.mesh.edge(p).ok().and_then(|e| e.child_vert()),
                SimplexId::Face(_) => return false,
            };
            self.captured = true;
        }
        if !ctx.mesh.set_child_of(self.parent, self.new_child) {
            return false;
        }
        self.state = CmdState::Done;
        true
    }

    fn undoit(&mut self, ctx: &mut EditCtx<'_>) -> bool {
        if self.state != CmdState::Done {
            return true;
        }
        let ok = match self.old_child {
            Some(old) => ctx.mesh.set_child_of(self.parent, old),
            // no way to null a child pointer through the command; leave it
            None => true,
        };
        self.state = CmdState::Undone;
        ok
    }

    fn state(&self) -> CmdState {
        self.state
    }
}

/// Swaps one corner vertex of a face. Edges are left alone.
#[derive(Debug)]
pub struct RedefFaceVCmd {
    face: FaceId,
    old: VertId,
    new: VertId,
    state: CmdState,
}

impl RedefFaceVCmd {
    /// Replaces corner `old` of `face` with `new`.
    #[must_use]
    pub fn new(face: FaceId, old: VertId, new: VertId) -> Self {
        Self {
            face,
            old,
            new,
            state: CmdState::Clear,
        }
    }
}

impl Command for RedefFaceVCmd {
    fn doit(&mut self, ctx: &mut EditCtx<'_>) -> bool {
        if self.state == CmdState::Done {
            return true;
        }
        if !ctx.mesh.redef_face_vert(self.face, self.old, self.new) {
            return false;
        }
        self.state = CmdState::Done;
        true
    }

    fn undoit(&mut self, ctx: &mut EditCtx<'_>) -> bool {
        if self.state != CmdState::Done {
            return true;
        }
        let ok = ctx.mesh.redef_face_vert(self.face, self.new, self.old);
        self.state = CmdState::Undone;
        ok
    }

    fn state(&self) -> CmdState {
        self.state
    }
}

/// Swaps one edge slot of a face, moving the face between the edges'
/// adjacency lists.
#[derive(Debug)]
pub struct RedefFaceECmd {
    face: FaceId,
    old: EdgeId,
    new: EdgeId,
    state: CmdState,
}

impl RedefFaceECmd {
    /// Replaces edge `old` of `face` with `new`.
    #[must_use]
    pub fn new(face: FaceId, old: EdgeId, new: EdgeId) -> Self {
        Self {
            face,
            old,
            new,
            state: CmdState::Clear,
        }
    }
}

impl Command for RedefFaceECmd {
    fn doit(&mut self, ctx: &mut EditCtx<'_>) -> bool {
        if self.state == CmdState::Done {
            return true;
        }
        if !ctx.mesh.redef_face_edge(self.face, self.old, self.new) {
            return false;
        }
        self.state = CmdState::Done;
        true
    }

    fn undoit(&mut self, ctx: &mut EditCtx<'_>) -> bool {
        if self.state != CmdState::Done {
            return true;
        }
        let ok = ctx.mesh.redef_face_edge(self.face, self.new, self.old);
        self.state = CmdState::Undone;
        ok
    }

    fn state(&self) -> CmdState {
        self.state
    }
}

/// Swaps one endpoint of an edge, updating vertex adjacency on both sides.
#[derive(Debug)]
pub struct RedefEdgeCmd {
    edge: EdgeId,
    old: VertId,
    new: VertId,
    state: CmdState,
}

impl RedefEdgeCmd {
    /// Replaces endpoint `old` of `edge` with `new`.
    #[must_use]
    pub fn new(edge: EdgeId, old: VertId, new: VertId) -> Self {
        Self {
            edge,
            old,
            new,
            state: CmdState::Clear,
        }
    }
}

impl Command for RedefEdgeCmd {
    fn doit(&mut self, ctx: &mut EditCtx<'_>) -> bool {
        if self.state == CmdState::Done {
            return true;
        }
        if !ctx.mesh.redef_edge_vert(self.edge, self.old, self.new) {
            return false;
        }
        self.state = CmdState::Done;
        true
    }

    fn undoit(&mut self, ctx: &mut EditCtx<'_>) -> bool {
        if self.state != CmdState::Done {
            return true;
        }
        let ok = ctx.mesh.redef_edge_vert(self.edge, self.new, self.old);
        self.state = CmdState::Undone;
        ok
    }

    fn state(&self) -> CmdState {
        self.state
    }
}

/// Moves a vertex to an absolute position, routing through the boss meme.
///
/// The old position is captured at first execution, so undo restores the
/// exact prior location.
#[derive(Debug)]
pub struct MoveVertCmd {
    vert: VertId,
    target: Point3<f64>,
    old_loc: Option<Point3<f64>>,
    state: CmdState,
}

impl MoveVertCmd {
    /// Moves `vert` to `target`.
    #[must_use]
    pub fn new(vert: VertId, target: Point3<f64>) -> Self {
        Self {
            vert,
            target,
            old_loc: None,
            state: CmdState::Clear,
        }
    }
}

impl Command for MoveVertCmd {
    fn doit(&mut self, ctx: &mut EditCtx<'_>) -> bool {
        if self.state == CmdState::Done {
            return true;
        }
        if self.old_loc.is_none() {
            let Ok(vert) = ctx.mesh.vert(self.vert) else {
                return false;
            };
            self.old_loc = Some(vert.loc());
        }
        if !ctx.controls.move_vert(ctx.mesh, self.vert, self.target) {
            return false;
        }
        self.state = CmdState::Done;
        true
    }

    fn undoit(&mut self, ctx: &mut EditCtx<'_>) -> bool {
        if self.state != CmdState::Done {
            return true;
        }
        let ok = match self.old_loc {
            Some(old) => ctx.controls.move_vert(ctx.mesh, self.vert, old),
            None => false,
        };
        self.state = CmdState::Undone;
        ok
    }

    fn state(&self) -> CmdState {
        self.state
    }
}

/// Raises the crease sharpness of an edge; undo lowers it again.
///
/// Edges already permanently sharp (`u16::MAX`) are left untouched in both
/// directions.
#[derive(Debug)]
pub struct CreaseIncCmd {
    edge: EdgeId,
    amount: u16,
    was_permanent: bool,
    state: CmdState,
}

impl CreaseIncCmd {
    /// Adds `amount` sharpness generations to `edge`.
    #[must_use]
    pub fn new(edge: EdgeId, amount: u16) -> Self {
        Self {
            edge,
            amount,
            was_permanent: false,
            state: CmdState::Clear,
        }
    }
}

impl Command for CreaseIncCmd {
    fn doit(&mut self, ctx: &mut EditCtx<'_>) -> bool {
        if self.state == CmdState::Done {
            return true;
        }
        let Ok(edge) = ctx.mesh.edge(self.edge) else {
            return false;
        };
        self.was_permanent = edge.crease() == u16::MAX;
        if ctx.mesh.inc_crease(self.edge, self.amount).is_err() {
            return false;
        }
        self.state = CmdState::Done;
        true
    }

    fn undoit(&mut self, ctx: &mut EditCtx<'_>) -> bool {
        if self.state != CmdState::Done {
            return true;
        }
        let ok = self.was_permanent || ctx.mesh.dec_crease(self.edge, self.amount).is_ok();
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
    use approx::assert_relative_eq;
    use mesh_control::ControlSet;
    use mesh_subdiv::SubdivMesh;

    fn triangle() -> (SubdivMesh, [VertId; 3], FaceId) {
        let mut mesh = SubdivMesh::new();
        let a = mesh.add_vert(Point3::new(0.0, 0.0, 0.0));
        let b = mesh.add_vert(Point3::new(1.0, 0.0, 0.0));
        let c = mesh.add_vert(Point3::new(0.0, 1.0, 0.0));
        let f = mesh.add_face([a, b, c]).unwrap();
        (mesh, [a, b, c], f)
    }

    #[test]
    fn test_move_vert_round_trip() {
        let (mut mesh, [a, _, _], _) = triangle();
        let mut controls = ControlSet::new();
        let mut ctx = EditCtx::new(&mut mesh, &mut controls);

        let target = Point3::new(0.3, 0.4, 0.5);
        let mut cmd = MoveVertCmd::new(a, target);
        assert!(cmd.doit(&mut ctx));
        assert_relative_eq!(ctx.mesh.vert(a).unwrap().loc(), target);
        assert!(cmd.undoit(&mut ctx));
        assert_relative_eq!(ctx.mesh.vert(a).unwrap().loc(), Point3::origin());
        // redo lands back on the target
        assert!(cmd.doit(&mut ctx));
        assert_relative_eq!(ctx.mesh.vert(a).unwrap().loc(), target);
    }

    #[test]
    fn test_redef_edge_failure_leaves_mesh_alone() {
        let (mut mesh, [a, b, c], _) = triangle();
        let d = mesh.add_vert(Point3::new(2.0, 0.0, 0.0));
        let e = mesh.lookup_edge(a, b).unwrap();
        let mut controls = ControlSet::new();
        let mut ctx = EditCtx::new(&mut mesh, &mut controls);

        // c is not an endpoint of e, so the swap must fail untouched
        let mut cmd = RedefEdgeCmd::new(e, c, d);
        assert!(!cmd.doit(&mut ctx));
        assert_eq!(cmd.state(), CmdState::Clear);
        assert_eq!(ctx.mesh.edge(e).unwrap().verts(), [a, b]);
    }

    #[test]
    fn test_redef_face_vert_swaps_corner_only() {
        let (mut mesh, [a, b, c], f) = triangle();
        let d = mesh.add_vert(Point3::new(2.0, 0.0, 0.0));
        let ab = mesh.lookup_edge(a, b).unwrap();
        let mut controls = ControlSet::new();
        let mut ctx = EditCtx::new(&mut mesh, &mut controls);

        let mut cmd = RedefFaceVCmd::new(f, b, d);
        assert!(cmd.doit(&mut ctx));
        assert_eq!(ctx.mesh.face(f).unwrap().verts(), [a, d, c]);
        // edges are untouched by the corner swap
        assert!(ctx.mesh.face(f).unwrap().contains_edge(ab));
        assert!(cmd.undoit(&mut ctx));
        assert_eq!(ctx.mesh.face(f).unwrap().verts(), [a, b, c]);
    }

    #[test]
    fn test_crease_inc_round_trip() {
        let (mut mesh, [a, b, _], _) = triangle();
        let e = mesh.lookup_edge(a, b).unwrap();
        let mut controls = ControlSet::new();
        let mut ctx = EditCtx::new(&mut mesh, &mut controls);

        let mut cmd = CreaseIncCmd::new(e, 3);
        assert!(cmd.doit(&mut ctx));
        assert_eq!(ctx.mesh.edge(e).unwrap().crease(), 3);
        assert!(cmd.undoit(&mut ctx));
        assert_eq!(ctx.mesh.edge(e).unwrap().crease(), 0);
    }

    #[test]
    fn test_crease_inc_preserves_permanent() {
        let (mut mesh, [a, b, _], _) = triangle();
        let e = mesh.lookup_edge(a, b).unwrap();
        mesh.set_crease(e, u16::MAX).unwrap();
        let mut controls = ControlSet::new();
        let mut ctx = EditCtx::new(&mut mesh, &mut controls);

        let mut cmd = CreaseIncCmd::new(e, 2);
        assert!(cmd.doit(&mut ctx));
        assert_eq!(ctx.mesh.edge(e).unwrap().crease(), u16::MAX);
        assert!(cmd.undoit(&mut ctx));
        assert_eq!(ctx.mesh.edge(e).unwrap().crease(), u16::MAX);
    }

    #[test]
    fn test_reparent_restores_old_child() {
        let (mut mesh, [a, b, _], _) = triangle();
        let ca = mesh.allocate_subdiv_vert(a).unwrap();
        let cb = mesh.allocate_subdiv_vert(b).unwrap();
        let mut controls = ControlSet::new();
        let mut ctx = EditCtx::new(&mut mesh, &mut controls);

        let mut cmd = ReparentCmd::new(SimplexId::Vert(a), cb);
        assert!(cmd.doit(&mut ctx));
        assert_eq!(ctx.mesh.vert(a).unwrap().child(), Some(cb));
        assert!(cmd.undoit(&mut ctx));
        assert_eq!(ctx.mesh.vert(a).unwrap().child(), Some(ca));
    }
}
