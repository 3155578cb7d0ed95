//! Save/restore records for controllers.
//!
//! A [`ControllerRecord`] is the flat, index-based form of one controller:
//! shape, level, resolution depth, and parallel vertex/parameter lists.
//! Records reference mesh vertices by `(level, index)` pairs so they stay
//! meaningful across sessions; restoring validates the pairs against the
//! live mesh before touching the registry.

use mesh_subdiv::{SubdivMesh, VertId};

use crate::error::{ControlError, ControlResult};
use crate::map::MapParam;
use crate::set::{ControlSet, ControllerId, ShapeKind};

/// Flat form of one controller, suitable for serialization.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ControllerRecord {
    /// Controller shape.
    pub shape: ShapeKind,
    /// Mesh level the controller operates on.
    pub level: u16,
    /// Requested resolution depth.
    pub res_level: u16,
    /// Managed vertices as `(level, index)` pairs, in strip order.
    pub verts: Vec<(u16, u32)>,
    /// Map parameters, parallel to `verts`.
    pub params: Vec<MapParam>,
}

impl ControllerRecord {
    /// Captures a controller's state as a record.
    ///
    /// # Errors
    /// [`ControlError::UnknownController`] for stale ids.
    pub fn capture(set: &ControlSet, cid: ControllerId) -> ControlResult<Self> {
        let ctrl = set.controller(cid)?;
        let verts: Vec<(u16, u32)> = ctrl
            .verts()
            .iter()
            .map(|v| (v.level(), v.index()))
            .collect();
        let params: Vec<MapParam> = ctrl
            .verts()
            .iter()
            .map(|&v| ctrl.vmeme(v).map_or(MapParam::None, |m| m.param()))
            .collect();
        Ok(Self {
            shape: ctrl.shape(),
            level: ctrl.level(),
            res_level: ctrl.res_level(),
            verts,
            params,
        })
    }

    /// Resolves the record's vertex pairs against a live mesh.
    ///
    /// # Errors
    /// [`ControlError::RecordListMismatch`] when the parallel lists
    /// disagree; [`ControlError::RecordMismatch`] naming the first pair
    /// that is not alive.
    pub fn resolve(&self, mesh: &SubdivMesh) -> ControlResult<Vec<VertId>> {
        if self.verts.len() != self.params.len() {
            return Err(ControlError::RecordListMismatch {
                verts: self.verts.len(),
                params: self.params.len(),
            });
        }
        let mut out = Vec::with_capacity(self.verts.len());
        for (i, &(level, index)) in self.verts.iter().enumerate() {
            let v = VertId::new(level, index);
            if !mesh.is_alive(v.into()) {
                return Err(ControlError::RecordMismatch(i));
            }
            out.push(v);
        }
        Ok(out)
    }

    /// Rebuilds a controller from this record: registers it, attaches a
    /// meme per vertex, and takes charge of the strip's connecting edges.
    /// The resolution chain is not rebuilt here; call
    /// [`ControlSet::set_res_level`] afterwards.
    ///
    /// # Errors
    /// Any error from [`ControllerRecord::resolve`].
    pub fn restore(
        &self,
        set: &mut ControlSet,
        mesh: &SubdivMesh,
        map: Box<dyn crate::map::GeometryMap>,
    ) -> ControlResult<ControllerId> {
        let verts = self.resolve(mesh)?;
        let cid = set.add_controller(self.shape, self.level, map);
        for (&v, &param) in verts.iter().zip(&self.params) {
            set.attach_vert(cid, v, param, mesh)?;
        }
        for pair in verts.windows(2) {
            if let Some(e) = mesh.lookup_edge(pair[0], pair[1]) {
                set.attach_edge(cid, e, mesh)?;
            }
        }
        Ok(cid)
    }
}

/// Captures every controller in the registry, in id order.
#[must_use]
pub fn capture_all(set: &ControlSet) -> Vec<ControllerRecord> {
    set.controller_ids()
        .into_iter()
        .filter_map(|cid| ControllerRecord::capture(set, cid).ok())
        .collect()
}
