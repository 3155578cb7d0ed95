//! Vertex fitting and offset sculpting.
//!
//! Both commands work parent-level-first so child corrections land on a
//! settled base: [`FitVertsCmd`] walks each vertex's ancestor chain before
//! fitting the vertex itself, and [`SubdivOffsetCmd`] applies requests in
//! ascending level order. Control-level vertices (no parent) move
//! directly; everything else absorbs the correction as a scalar detail
//! offset along the subdivision normal.
//!
//! Old and new states are captured on the first run, so undo and redo
//! replay exact values rather than recomputing.

use nalgebra::Point3;
use tracing::debug;

use mesh_subdiv::{SimplexId, SubdivMesh, SubdivResult, VertId};

use crate::command::{CmdState, Command, EditCtx};
use crate::error::{EditError, EditResult};

#[derive(Debug, Clone, Copy)]
struct FitRecord {
    vert: VertId,
    old_loc: Point3<f64>,
    old_offset: f64,
    new_loc: Point3<f64>,
    new_offset: f64,
    control: bool,
}

fn apply_record(mesh: &mut SubdivMesh, rec: &FitRecord, forward: bool) -> bool {
    let ok = if rec.control {
        let loc = if forward { rec.new_loc } else { rec.old_loc };
        mesh.set_loc(rec.vert, loc).is_ok()
    } else {
        let off = if forward { rec.new_offset } else { rec.old_offset };
        mesh.set_offset(rec.vert, off).is_ok()
    };
    ok
}

/// Moves vertices to world-space targets, fitting ancestors first.
///
/// For each vertex, vertex-type ancestors are fitted toward the target
/// from the top of the hierarchy down, so the smooth base under the vertex
/// settles before its own offset is chosen. Control vertices take the
/// direct-move path and land on their target exactly.
#[derive(Debug)]
pub struct FitVertsCmd {
    verts: Vec<VertId>,
    targets: Vec<Point3<f64>>,
    records: Vec<FitRecord>,
    built: bool,
    state: CmdState,
}

impl FitVertsCmd {
    /// Pairs each vertex with its target.
    ///
    /// # Errors
    /// [`EditError::ListLengthMismatch`] when the lists disagree.
    pub fn new(verts: Vec<VertId>, targets: Vec<Point3<f64>>) -> EditResult<Self> {
        if verts.len() != targets.len() {
            return Err(EditError::ListLengthMismatch {
                verts: verts.len(),
                targets: targets.len(),
            });
        }
        Ok(Self {
            verts,
            targets,
            records: Vec::new(),
            built: false,
            state: CmdState::Clear,
        })
    }

    /// Fits `v`'s vertex ancestors first, then `v` itself, recording each
    /// step.
    fn fit_chain(
        &mut self,
        mesh: &mut SubdivMesh,
        v: VertId,
        target: Point3<f64>,
    ) -> SubdivResult<()> {
        let parent = mesh.vert(v)?.parent();
        if let Some(SimplexId::Vert(p)) = parent {
            self.fit_chain(mesh, p, target)?;
            // settle the smooth base before choosing this vertex's offset
            mesh.update();
        }
        let vert = mesh.vert(v)?;
        let old_loc = vert.loc();
        let old_offset = vert.offset();
        let new_loc = mesh.fit_subdiv_offset(v, target)?;
        let new_offset = mesh.vert(v)?.offset();
        self.records.push(FitRecord {
            vert: v,
            old_loc,
            old_offset,
            new_loc,
            new_offset,
            control: parent.is_none(),
        });
        Ok(())
    }
}

impl Command for FitVertsCmd {
    fn doit(&mut self, ctx: &mut EditCtx<'_>) -> bool {
        if self.state == CmdState::Done {
            return true;
        }
        if self.built {
            for i in 0..self.records.len() {
                let rec = self.records[i];
                if !apply_record(ctx.mesh, &rec, true) {
                    return false;
                }
            }
        } else {
            self.records.clear();
            let pairs: Vec<(VertId, Point3<f64>)> = self
                .verts
                .iter()
                .copied()
                .zip(self.targets.iter().copied())
                .collect();
            for (v, t) in pairs {
                if self.fit_chain(ctx.mesh, v, t).is_err() {
                    debug!(vert = ?v, "fit skipped a dead vertex");
                    return false;
                }
            }
            self.built = true;
        }
        ctx.mesh.update();
        self.state = CmdState::Done;
        true
    }

    fn undoit(&mut self, ctx: &mut EditCtx<'_>) -> bool {
        if self.state != CmdState::Done {
            return true;
        }
        let mut ok = true;
        for i in (0..self.records.len()).rev() {
            let rec = self.records[i];
            ok &= apply_record(ctx.mesh, &rec, false);
        }
        ctx.mesh.update();
        self.state = CmdState::Undone;
        ok
    }

    fn state(&self) -> CmdState {
        self.state
    }
}

/// Applies scalar offset deltas along subdivision normals.
///
/// Requests are sorted by level so parent corrections apply before child
/// ones. Each non-control request is corrected for base drift: the part of
/// the requested displacement already delivered by earlier (parent-level)
/// moves is subtracted before the delta is accumulated into the vertex's
/// offset. Control vertices move directly along their own normal.
#[derive(Debug)]
pub struct SubdivOffsetCmd {
    verts: Vec<VertId>,
    offsets: Vec<f64>,
    records: Vec<FitRecord>,
    built: bool,
    state: CmdState,
}

impl SubdivOffsetCmd {
    /// Pairs each vertex with its offset delta.
    ///
    /// # Errors
    /// [`EditError::ListLengthMismatch`] when the lists disagree.
    pub fn new(verts: Vec<VertId>, offsets: Vec<f64>) -> EditResult<Self> {
        if verts.len() != offsets.len() {
            return Err(EditError::ListLengthMismatch {
                verts: verts.len(),
                targets: offsets.len(),
            });
        }
        Ok(Self {
            verts,
            offsets,
            records: Vec::new(),
            built: false,
            state: CmdState::Clear,
        })
    }

    fn build(&mut self, mesh: &mut SubdivMesh) -> bool {
        self.records.clear();
        // parents before children
        let mut order: Vec<usize> = (0..self.verts.len()).collect();
        order.sort_by_key(|&i| self.verts[i].level());

        // bases as they were before any request ran
        let mut old_bases = vec![None; self.verts.len()];
        for &i in &order {
            let v = self.verts[i];
            match mesh.vert(v) {
                Ok(vert) if vert.parent().is_some() => {
                    let Ok(base) = mesh.smooth_loc_from_parent(v) else {
                        return false;
                    };
                    old_bases[i] = Some(base);
                }
                Ok(_) => {}
                Err(_) => return false,
            }
        }

        for &i in &order {
            let v = self.verts[i];
            let Ok(vert) = mesh.vert(v) else {
                return false;
            };
            let old_loc = vert.loc();
            let old_offset = vert.offset();
            if let Some(old_base) = old_bases[i] {
                // earlier moves may have shifted the base under this vertex
                mesh.update();
                let Ok(new_base) = mesh.smooth_loc_from_parent(v) else {
                    return false;
                };
                let n = mesh.parent_normal(v);
                let drift = (new_base - old_base).dot(&n);
                let delta = self.offsets[i] - drift;
                if mesh.add_offset(v, delta).is_err() {
                    return false;
                }
                let Ok(vert) = mesh.vert(v) else {
                    return false;
                };
                self.records.push(FitRecord {
                    vert: v,
                    old_loc,
                    old_offset,
                    new_loc: vert.loc(),
                    new_offset: vert.offset(),
                    control: false,
                });
            } else {
                let n = mesh.vert_normal(v);
                let new_loc = old_loc + n * self.offsets[i];
                if mesh.set_loc(v, new_loc).is_err() {
                    return false;
                }
                self.records.push(FitRecord {
                    vert: v,
                    old_loc,
                    old_offset,
                    new_loc,
                    new_offset: old_offset,
                    control: true,
                });
            }
        }
        true
    }
}

impl Command for SubdivOffsetCmd {
    fn doit(&mut self, ctx: &mut EditCtx<'_>) -> bool {
        if self.state == CmdState::Done {
            return true;
        }
        if self.built {
            for i in 0..self.records.len() {
                let rec = self.records[i];
                if !apply_record(ctx.mesh, &rec, true) {
                    return false;
                }
            }
        } else {
            if !self.build(ctx.mesh) {
                return false;
            }
            self.built = true;
        }
        ctx.mesh.update();
        self.state = CmdState::Done;
        true
    }

    fn undoit(&mut self, ctx: &mut EditCtx<'_>) -> bool {
        if self.state != CmdState::Done {
            return true;
        }
        let mut ok = true;
        for i in (0..self.records.len()).rev() {
            let rec = self.records[i];
            ok &= apply_record(ctx.mesh, &rec, false);
        }
        ctx.mesh.update();
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
    use mesh_subdiv::FaceId;

    fn subdivided_triangle() -> (SubdivMesh, [VertId; 3], FaceId) {
        let mut mesh = SubdivMesh::new();
        let a = mesh.add_vert(Point3::new(0.0, 0.0, 0.0));
        let b = mesh.add_vert(Point3::new(1.0, 0.0, 0.0));
        let c = mesh.add_vert(Point3::new(0.0, 1.0, 0.0));
        let f = mesh.add_face([a, b, c]).unwrap();
        mesh.allocate_subdiv_face(f).unwrap();
        mesh.update();
        (mesh, [a, b, c], f)
    }

    #[test]
    fn test_fit_control_vert_lands_exactly() {
        let mut mesh = SubdivMesh::new();
        let a = mesh.add_vert(Point3::origin());
        let mut controls = ControlSet::new();
        let mut ctx = EditCtx::new(&mut mesh, &mut controls);

        let target = Point3::new(1.0, 2.0, 3.0);
        let mut cmd = FitVertsCmd::new(vec![a], vec![target]).unwrap();
        assert!(cmd.doit(&mut ctx));
        assert_relative_eq!(ctx.mesh.vert(a).unwrap().loc(), target);
        assert!(cmd.undoit(&mut ctx));
        assert_relative_eq!(ctx.mesh.vert(a).unwrap().loc(), Point3::origin());
        assert!(cmd.doit(&mut ctx));
        assert_relative_eq!(ctx.mesh.vert(a).unwrap().loc(), target);
    }

    #[test]
    fn test_fit_subdiv_vert_reaches_target_on_normal() {
        let (mut mesh, [a, b, _], _) = subdivided_triangle();
        let e = mesh.lookup_edge(a, b).unwrap();
        let m = mesh.edge(e).unwrap().child_vert().unwrap();
        let base = mesh.vert(m).unwrap().loc();
        let mut controls = ControlSet::new();
        let mut ctx = EditCtx::new(&mut mesh, &mut controls);

        // target directly off the surface along z
        let target = Point3::new(base.x, base.y, 0.25);
        let mut cmd = FitVertsCmd::new(vec![m], vec![target]).unwrap();
        assert!(cmd.doit(&mut ctx));
        assert_relative_eq!(ctx.mesh.vert(m).unwrap().loc(), target, epsilon = 1e-12);
        assert_relative_eq!(ctx.mesh.vert(m).unwrap().offset().abs(), 0.25, epsilon = 1e-12);

        assert!(cmd.undoit(&mut ctx));
        assert_relative_eq!(ctx.mesh.vert(m).unwrap().loc(), base, epsilon = 1e-12);
        assert_relative_eq!(ctx.mesh.vert(m).unwrap().offset(), 0.0);
    }

    #[test]
    fn test_fit_rejects_mismatched_lists() {
        let v = VertId::new(0, 0);
        assert!(matches!(
            FitVertsCmd::new(vec![v], vec![]),
            Err(EditError::ListLengthMismatch { verts: 1, targets: 0 })
        ));
    }

    #[test]
    fn test_offset_control_vert_moves_along_normal() {
        let mut mesh = SubdivMesh::new();
        let a = mesh.add_vert(Point3::new(0.0, 0.0, 0.0));
        let b = mesh.add_vert(Point3::new(1.0, 0.0, 0.0));
        let c = mesh.add_vert(Point3::new(0.0, 1.0, 0.0));
        mesh.add_face([a, b, c]).unwrap();
        let mut controls = ControlSet::new();
        let mut ctx = EditCtx::new(&mut mesh, &mut controls);

        let mut cmd = SubdivOffsetCmd::new(vec![a], vec![0.5]).unwrap();
        assert!(cmd.doit(&mut ctx));
        // flat triangle wound counterclockwise: normal is +z
        assert_relative_eq!(
            ctx.mesh.vert(a).unwrap().loc(),
            Point3::new(0.0, 0.0, 0.5),
            epsilon = 1e-12
        );
        assert!(cmd.undoit(&mut ctx));
        assert_relative_eq!(ctx.mesh.vert(a).unwrap().loc(), Point3::origin());
    }

    #[test]
    fn test_offset_subdiv_vert_accumulates() {
        let (mut mesh, [a, b, _], _) = subdivided_triangle();
        let e = mesh.lookup_edge(a, b).unwrap();
        let m = mesh.edge(e).unwrap().child_vert().unwrap();
        mesh.set_offset(m, 0.1).unwrap();
        let mut controls = ControlSet::new();
        let mut ctx = EditCtx::new(&mut mesh, &mut controls);

        let mut cmd = SubdivOffsetCmd::new(vec![m], vec![0.3]).unwrap();
        assert!(cmd.doit(&mut ctx));
        assert_relative_eq!(ctx.mesh.vert(m).unwrap().offset(), 0.4, epsilon = 1e-12);
        assert!(cmd.undoit(&mut ctx));
        assert_relative_eq!(ctx.mesh.vert(m).unwrap().offset(), 0.1, epsilon = 1e-12);
        // redo replays the captured values
        assert!(cmd.doit(&mut ctx));
        assert_relative_eq!(ctx.mesh.vert(m).unwrap().offset(), 0.4, epsilon = 1e-12);
    }
}
