//! The subdivision mesh: per-level arenas plus the refinement machinery.
//!
//! Faces refine 1-to-4 (three corner children and a center child), edges gain
//! a subdivision vertex and two child edges, vertices gain a child vertex.
//! Allocation and deletion are idempotent and tracked with explicit bits.
//! Child positions follow the Loop scheme, then stored scalar offsets are
//! applied along the parent normal. Geometry changes enter a per-level dirty
//! list and are pushed down the hierarchy by [`SubdivMesh::update`].

use nalgebra::{Point3, Vector3};
use tracing::debug;

use crate::elements::{dec_sharpness, Edge, Face, Vert};
use crate::error::{SubdivError, SubdivResult};
use crate::events::MeshEvent;
use crate::id::{EdgeId, FaceId, SimplexId, VertId};

#[derive(Debug, Default)]
struct LevelMesh {
    verts: Vec<Option<Vert>>,
    edges: Vec<Option<Edge>>,
    faces: Vec<Option<Face>>,
    dirty: Vec<VertId>,
}

/// A triangle mesh with a hierarchy of subdivision levels.
///
/// Level 0 is the control mesh. Finer levels are created on demand as
/// elements allocate their subdivision children.
#[derive(Debug)]
pub struct SubdivMesh {
    levels: Vec<LevelMesh>,
    events: Vec<MeshEvent>,
}

impl Default for SubdivMesh {
    fn default() -> Self {
        Self::new()
    }
}

impl SubdivMesh {
    /// Creates an empty mesh with a single (control) level.
    #[must_use]
    pub fn new() -> Self {
        Self {
            levels: vec![LevelMesh::default()],
            events: Vec::new(),
        }
    }

    /// Number of levels currently in the hierarchy.
    #[must_use]
    pub fn level_count(&self) -> usize {
        self.levels.len()
    }

    fn ensure_level(&mut self, level: u16) {
        while self.levels.len() <= level as usize {
            self.levels.push(LevelMesh::default());
        }
    }

    // ---- element access ----

    pub(crate) fn get_vert(&self, id: VertId) -> Option<&Vert> {
        self.levels
            .get(id.level() as usize)?
            .verts
            .get(id.index() as usize)?
            .as_ref()
    }

    pub(crate) fn get_vert_mut(&mut self, id: VertId) -> Option<&mut Vert> {
        self.levels
            .get_mut(id.level() as usize)?
            .verts
            .get_mut(id.index() as usize)?
            .as_mut()
    }

    pub(crate) fn get_edge(&self, id: EdgeId) -> Option<&Edge> {
        self.levels
            .get(id.level() as usize)?
            .edges
            .get(id.index() as usize)?
            .as_ref()
    }

    pub(crate) fn get_edge_mut(&mut self, id: EdgeId) -> Option<&mut Edge> {
        self.levels
            .get_mut(id.level() as usize)?
            .edges
            .get_mut(id.index() as usize)?
            .as_mut()
    }

    pub(crate) fn get_face(&self, id: FaceId) -> Option<&Face> {
        self.levels
            .get(id.level() as usize)?
            .faces
            .get(id.index() as usize)?
            .as_ref()
    }

    pub(crate) fn get_face_mut(&mut self, id: FaceId) -> Option<&mut Face> {
        self.levels
            .get_mut(id.level() as usize)?
            .faces
            .get_mut(id.index() as usize)?
            .as_mut()
    }

    /// Looks up a vertex.
    ///
    /// # Errors
    /// [`SubdivError::DeadSimplex`] if the handle is dead.
    pub fn vert(&self, id: VertId) -> SubdivResult<&Vert> {
        self.get_vert(id)
            .ok_or(SubdivError::DeadSimplex(SimplexId::Vert(id)))
    }

    /// Looks up an edge.
    ///
    /// # Errors
    /// [`SubdivError::DeadSimplex`] if the handle is dead.
    pub fn edge(&self, id: EdgeId) -> SubdivResult<&Edge> {
        self.get_edge(id)
            .ok_or(SubdivError::DeadSimplex(SimplexId::Edge(id)))
    }

    /// Looks up a face.
    ///
    /// # Errors
    /// [`SubdivError::DeadSimplex`] if the handle is dead.
    pub fn face(&self, id: FaceId) -> SubdivResult<&Face> {
        self.get_face(id)
            .ok_or(SubdivError::DeadSimplex(SimplexId::Face(id)))
    }

    /// True if the handle names a live simplex.
    #[must_use]
    pub fn is_alive(&self, id: SimplexId) -> bool {
        match id {
            SimplexId::Vert(v) => self.get_vert(v).is_some(),
            SimplexId::Edge(e) => self.get_edge(e).is_some(),
            SimplexId::Face(f) => self.get_face(f).is_some(),
        }
    }

    /// Live vertex handles at a level.
    #[must_use]
    pub fn verts_at(&self, level: u16) -> Vec<VertId> {
        let Some(lm) = self.levels.get(level as usize) else {
            return Vec::new();
        };
        lm.verts
            .iter()
            .enumerate()
            .filter(|(_, s)| s.is_some())
            .map(|(i, _)| VertId::new(level, i as u32))
            .collect()
    }

    /// Live edge handles at a level.
    #[must_use]
    pub fn edges_at(&self, level: u16) -> Vec<EdgeId> {
        let Some(lm) = self.levels.get(level as usize) else {
            return Vec::new();
        };
        lm.edges
            .iter()
            .enumerate()
            .filter(|(_, s)| s.is_some())
            .map(|(i, _)| EdgeId::new(level, i as u32))
            .collect()
    }

    /// Live face handles at a level.
    #[must_use]
    pub fn faces_at(&self, level: u16) -> Vec<FaceId> {
        let Some(lm) = self.levels.get(level as usize) else {
            return Vec::new();
        };
        lm.faces
            .iter()
            .enumerate()
            .filter(|(_, s)| s.is_some())
            .map(|(i, _)| FaceId::new(level, i as u32))
            .collect()
    }

    // ---- construction ----

    /// Adds a vertex to the control mesh.
    pub fn add_vert(&mut self, loc: Point3<f64>) -> VertId {
        self.push_vert(0, Vert::new(loc))
    }

    fn push_vert(&mut self, level: u16, v: Vert) -> VertId {
        self.ensure_level(level);
        let lm = &mut self.levels[level as usize];
        lm.verts.push(Some(v));
        VertId::new(level, (lm.verts.len() - 1) as u32)
    }

    /// Adds an edge between two live vertices at the same level, or returns
    /// the existing one.
    ///
    /// # Errors
    /// Fails on dead endpoints, a repeated vertex, or a level mismatch.
    pub fn add_edge(&mut self, a: VertId, b: VertId) -> SubdivResult<EdgeId> {
        if a == b {
            return Err(SubdivError::Degenerate(a));
        }
        if a.level() != b.level() {
            return Err(SubdivError::LevelMismatch(a.level(), b.level()));
        }
        self.vert(a)?;
        self.vert(b)?;
        if let Some(e) = self.lookup_edge(a, b) {
            return Ok(e);
        }
        let level = a.level();
        let lm = &mut self.levels[level as usize];
        lm.edges.push(Some(Edge::new(a, b)));
        let id = EdgeId::new(level, (lm.edges.len() - 1) as u32);
        if let Some(v) = self.get_vert_mut(a) {
            v.edges.push(id);
        }
        if let Some(v) = self.get_vert_mut(b) {
            v.edges.push(id);
        }
        Ok(id)
    }

    /// Adds a triangular face over three live vertices, creating any missing
    /// edges. The face attaches to each edge's first free slot.
    ///
    /// # Errors
    /// Fails on dead or repeated vertices or a level mismatch.
    pub fn add_face(&mut self, v: [VertId; 3]) -> SubdivResult<FaceId> {
        if v[0] == v[1] || v[1] == v[2] || v[0] == v[2] {
            return Err(SubdivError::Degenerate(v[0]));
        }
        let e = [
            self.add_edge(v[0], v[1])?,
            self.add_edge(v[1], v[2])?,
            self.add_edge(v[2], v[0])?,
        ];
        let level = v[0].level();
        let lm = &mut self.levels[level as usize];
        lm.faces.push(Some(Face {
            v,
            e,
            parent: None,
            subdiv_allocated: false,
        }));
        let id = FaceId::new(level, (lm.faces.len() - 1) as u32);
        for eid in e {
            if let Some(edge) = self.get_edge_mut(eid) {
                if let Some(slot) = edge.f.iter_mut().find(|s| s.is_none()) {
                    *slot = Some(id);
                }
            }
        }
        Ok(id)
    }

    // ---- adjacency queries ----

    /// The edge joining two vertices, if one exists.
    #[must_use]
    pub fn lookup_edge(&self, a: VertId, b: VertId) -> Option<EdgeId> {
        let va = self.get_vert(a)?;
        va.edges
            .iter()
            .copied()
            .find(|&e| self.get_edge(e).is_some_and(|edge| edge.contains(b)))
    }

    /// The face spanning three vertices, if one exists.
    #[must_use]
    pub fn lookup_face(&self, a: VertId, b: VertId, c: VertId) -> Option<FaceId> {
        let e = self.lookup_edge(a, b)?;
        self.get_edge(e)?
            .f
            .iter()
            .flatten()
            .copied()
            .find(|&f| self.get_face(f).is_some_and(|face| face.contains_vert(c)))
    }

    /// All faces incident on a vertex, in adjacency order, without repeats.
    #[must_use]
    pub fn faces_around_vert(&self, v: VertId) -> Vec<FaceId> {
        let mut out = Vec::new();
        let Some(vert) = self.get_vert(v) else {
            return out;
        };
        for &e in &vert.edges {
            let Some(edge) = self.get_edge(e) else {
                continue;
            };
            for f in edge.f.iter().flatten() {
                if !out.contains(f) {
                    out.push(*f);
                }
            }
        }
        out
    }

    /// Length of an edge, or 0 when dead.
    #[must_use]
    pub fn edge_len(&self, e: EdgeId) -> f64 {
        let Some(edge) = self.get_edge(e) else {
            return 0.0;
        };
        match (self.get_vert(edge.v[0]), self.get_vert(edge.v[1])) {
            (Some(a), Some(b)) => (b.loc - a.loc).norm(),
            _ => 0.0,
        }
    }

    /// Mean length of the edges around a vertex, or 0 when isolated.
    #[must_use]
    pub fn avg_adjacent_edge_len(&self, v: VertId) -> f64 {
        let Some(vert) = self.get_vert(v) else {
            return 0.0;
        };
        if vert.edges.is_empty() {
            return 0.0;
        }
        let sum: f64 = vert.edges.iter().map(|&e| self.edge_len(e)).sum();
        sum / vert.edges.len() as f64
    }

    /// Ancestor vertex `rel_level` levels up, following vertex parents only.
    #[must_use]
    pub fn parent_vert(&self, v: VertId, rel_level: u16) -> Option<VertId> {
        let mut cur = v;
        for _ in 0..rel_level {
            match self.get_vert(cur)?.parent {
                Some(SimplexId::Vert(p)) => cur = p,
                _ => return None,
            }
        }
        Some(cur)
    }

    // ---- normals ----

    /// Area-weighted unit normal of a face; zero for degenerate faces.
    #[must_use]
    pub fn face_normal(&self, f: FaceId) -> Vector3<f64> {
        let Some(face) = self.get_face(f) else {
            return Vector3::zeros();
        };
        let locs: Option<Vec<Point3<f64>>> = face
            .v
            .iter()
            .map(|&v| self.get_vert(v).map(|vert| vert.loc))
            .collect();
        let Some(locs) = locs else {
            return Vector3::zeros();
        };
        let n = (locs[1] - locs[0]).cross(&(locs[2] - locs[0]));
        n.try_normalize(f64::EPSILON).unwrap_or_else(Vector3::zeros)
    }

    /// Unit normal at a vertex: normalized sum of incident face normals.
    #[must_use]
    pub fn vert_normal(&self, v: VertId) -> Vector3<f64> {
        let sum: Vector3<f64> = self
            .faces_around_vert(v)
            .iter()
            .map(|&f| self.face_normal(f))
            .sum();
        sum.try_normalize(f64::EPSILON)
            .unwrap_or_else(Vector3::zeros)
    }

    /// Unit normal at an edge: normalized sum of its face normals.
    #[must_use]
    pub fn edge_normal(&self, e: EdgeId) -> Vector3<f64> {
        let Some(edge) = self.get_edge(e) else {
            return Vector3::zeros();
        };
        let sum: Vector3<f64> = edge.f.iter().flatten().map(|&f| self.face_normal(f)).sum();
        sum.try_normalize(f64::EPSILON)
            .unwrap_or_else(Vector3::zeros)
    }

    /// Normal of the parent simplex that generated `v`; the vertex's own
    /// normal when `v` has no parent.
    #[must_use]
    pub fn parent_normal(&self, v: VertId) -> Vector3<f64> {
        match self.get_vert(v).and_then(|vert| vert.parent) {
            Some(SimplexId::Vert(p)) => self.vert_normal(p),
            Some(SimplexId::Edge(p)) => self.edge_normal(p),
            Some(SimplexId::Face(_)) | None => self.vert_normal(v),
        }
    }

    // ---- dirty list & geometry ----

    fn mark_dirty(&mut self, id: VertId) {
        let Some(lm) = self.levels.get_mut(id.level() as usize) else {
            return;
        };
        let Some(Some(v)) = lm.verts.get_mut(id.index() as usize) else {
            return;
        };
        if v.dirty {
            return;
        }
        v.dirty = true;
        lm.dirty.push(id);
    }

    /// Moves a vertex and queues its dependents for subdivision update.
    ///
    /// # Errors
    /// [`SubdivError::DeadSimplex`] if the handle is dead.
    pub fn set_loc(&mut self, v: VertId, loc: Point3<f64>) -> SubdivResult<()> {
        let vert = self
            .get_vert_mut(v)
            .ok_or(SubdivError::DeadSimplex(SimplexId::Vert(v)))?;
        vert.loc = loc;
        let edges = vert.edges.clone();
        self.events.push(MeshEvent::VertMoved(v));
        self.mark_dirty(v);
        // Neighbor verts feed this vertex's ring into their children's masks.
        for e in edges {
            if let Some(o) = self.get_edge(e).and_then(|edge| edge.other_vert(v)) {
                self.mark_dirty(o);
            }
        }
        Ok(())
    }

    // ---- subdivision allocation ----

    /// Allocates the subdivision vertex of `v`. Idempotent.
    ///
    /// # Errors
    /// [`SubdivError::DeadSimplex`] if the handle is dead.
    pub fn allocate_subdiv_vert(&mut self, v: VertId) -> SubdivResult<VertId> {
        let vert = self.vert(v)?;
        if let Some(c) = vert.child {
            return Ok(c);
        }
        let loc = vert.loc;
        let corner = vert.corner;
        let mut child = Vert::new(loc);
        child.parent = Some(SimplexId::Vert(v));
        child.corner = dec_sharpness(corner);
        let cid = self.push_vert(v.level() + 1, child);
        if let Some(vert) = self.get_vert_mut(v) {
            vert.child = Some(cid);
            vert.subdiv_allocated = true;
        }
        self.mark_dirty(v);
        self.events.push(MeshEvent::SubdivAllocated(SimplexId::Vert(v)));
        Ok(cid)
    }

    /// Allocates the subdivision vertex and two child edges of `e`,
    /// returning the subdivision vertex. Idempotent.
    ///
    /// # Errors
    /// [`SubdivError::DeadSimplex`] if the edge or an endpoint is dead.
    pub fn allocate_subdiv_edge(&mut self, e: EdgeId) -> SubdivResult<VertId> {
        let edge = self.edge(e)?;
        if edge.subdiv_allocated {
            if let Some(m) = edge.child_vert {
                return Ok(m);
            }
        }
        let [a, b] = edge.v;
        let weak = edge.weak;
        let crease = edge.crease;
        let ca = self.allocate_subdiv_vert(a)?;
        let cb = self.allocate_subdiv_vert(b)?;
        let mid = nalgebra::center(&self.vert(a)?.loc, &self.vert(b)?.loc);
        let mut mv = Vert::new(mid);
        mv.parent = Some(SimplexId::Edge(e));
        let m = self.push_vert(e.level() + 1, mv);
        for pair in [[ca, m], [m, cb]] {
            let ce = self.add_edge(pair[0], pair[1])?;
            if let Some(child) = self.get_edge_mut(ce) {
                child.parent = Some(SimplexId::Edge(e));
                child.crease = dec_sharpness(crease);
                child.weak = weak;
            }
        }
        if let Some(edge) = self.get_edge_mut(e) {
            edge.child_vert = Some(m);
            edge.subdiv_allocated = true;
        }
        self.mark_dirty(a);
        self.mark_dirty(b);
        self.events.push(MeshEvent::SubdivAllocated(SimplexId::Edge(e)));
        Ok(m)
    }

    /// Allocates the four child faces of `f` (and everything beneath its
    /// vertices and edges). Idempotent.
    ///
    /// The three corner children take the corners in order; the center child
    /// is wound from the midpoint of edge slot 1 and claims the three
    /// interior edges.
    ///
    /// # Errors
    /// [`SubdivError::DeadSimplex`] if the face or a boundary element is dead.
    pub fn allocate_subdiv_face(&mut self, f: FaceId) -> SubdivResult<()> {
        let face = self.face(f)?;
        if face.subdiv_allocated {
            return Ok(());
        }
        let v = face.v;
        let e = face.e;
        let m = [
            self.allocate_subdiv_edge(e[0])?,
            self.allocate_subdiv_edge(e[1])?,
            self.allocate_subdiv_edge(e[2])?,
        ];
        let mut cv = [m[0]; 3];
        for (k, &vk) in v.iter().enumerate() {
            cv[k] = self
                .vert(vk)?
                .child
                .ok_or(SubdivError::DeadSimplex(SimplexId::Vert(vk)))?;
        }
        // interior edges, claimed by the center child
        for pair in [[m[1], m[2]], [m[2], m[0]], [m[0], m[1]]] {
            let ie = self.add_edge(pair[0], pair[1])?;
            if let Some(edge) = self.get_edge_mut(ie) {
                edge.parent = Some(SimplexId::Face(f));
            }
        }
        let children = [
            [cv[0], m[0], m[2]],
            [m[0], cv[1], m[1]],
            [m[2], m[1], cv[2]],
            [m[1], m[2], m[0]],
        ];
        for tri in children {
            let cf = self.add_face(tri)?;
            if let Some(cface) = self.get_face_mut(cf) {
                cface.parent = Some(f);
            }
        }
        if let Some(face) = self.get_face_mut(f) {
            face.subdiv_allocated = true;
        }
        for vk in v {
            self.mark_dirty(vk);
        }
        self.events.push(MeshEvent::SubdivAllocated(SimplexId::Face(f)));
        debug!(face = ?f, "allocated subdivision children");
        Ok(())
    }

    /// The four children of a subdivided face: three corner children in
    /// corner order, then the center child.
    ///
    /// # Errors
    /// [`SubdivError::NotSubdivided`] if the children are not all present.
    pub fn child_faces(&self, f: FaceId) -> SubdivResult<[FaceId; 4]> {
        let face = self.face(f)?;
        if !face.subdiv_allocated {
            return Err(SubdivError::NotSubdivided(f));
        }
        let mut cv = [None; 3];
        let mut m = [None; 3];
        for k in 0..3 {
            cv[k] = self.vert(face.v[k])?.child;
            m[k] = self.edge(face.e[k])?.child_vert;
        }
        let (cv, m) = match (cv, m) {
            ([Some(a), Some(b), Some(c)], [Some(p), Some(q), Some(r)]) => ([a, b, c], [p, q, r]),
            _ => return Err(SubdivError::NotSubdivided(f)),
        };
        let lookups = [
            self.lookup_face(cv[0], m[0], m[2]),
            self.lookup_face(m[0], cv[1], m[1]),
            self.lookup_face(m[2], m[1], cv[2]),
            self.lookup_face(m[1], m[2], m[0]),
        ];
        match lookups {
            [Some(a), Some(b), Some(c), Some(d)] => Ok([a, b, c, d]),
            _ => Err(SubdivError::NotSubdivided(f)),
        }
    }

    // ---- subdivision deletion ----

    /// Deletes the subdivision children of `v` (recursively). Idempotent.
    ///
    /// # Errors
    /// Propagates arena errors from the cascade; a dead `v` is an error.
    pub fn delete_subdiv_vert(&mut self, v: VertId) -> SubdivResult<()> {
        let vert = self.vert(v)?;
        let Some(child) = vert.child else {
            return Ok(());
        };
        let edges = vert.edges.clone();
        for e in edges {
            if self.get_edge(e).is_some_and(|edge| edge.subdiv_allocated) {
                self.delete_subdiv_edge(e)?;
            }
        }
        self.remove_vert(child)?;
        if let Some(vert) = self.get_vert_mut(v) {
            vert.child = None;
            vert.subdiv_allocated = false;
        }
        Ok(())
    }

    /// Deletes the subdivision elements of `e` (recursively). Idempotent.
    /// Child faces of adjacent faces are torn down first.
    ///
    /// # Errors
    /// Propagates arena errors from the cascade; a dead `e` is an error.
    pub fn delete_subdiv_edge(&mut self, e: EdgeId) -> SubdivResult<()> {
        let edge = self.edge(e)?;
        if !edge.subdiv_allocated {
            return Ok(());
        }
        let faces: Vec<FaceId> = edge.f.iter().flatten().copied().collect();
        for f in faces {
            if self.get_face(f).is_some_and(|face| face.subdiv_allocated) {
                self.delete_subdiv_face(f)?;
            }
        }
        if let Some(m) = self.get_edge(e).and_then(|edge| edge.child_vert) {
            self.remove_vert(m)?;
        }
        if let Some(edge) = self.get_edge_mut(e) {
            edge.child_vert = None;
            edge.subdiv_allocated = false;
        }
        Ok(())
    }

    /// Deletes the four child faces and three interior edges of `f`
    /// (recursively). Idempotent. The corner vertices are re-queued so a
    /// later re-allocation recomputes child geometry.
    ///
    /// # Errors
    /// Propagates arena errors from the cascade; a dead `f` is an error.
    pub fn delete_subdiv_face(&mut self, f: FaceId) -> SubdivResult<()> {
        let face = self.face(f)?;
        if !face.subdiv_allocated {
            return Ok(());
        }
        let v = face.v;
        if let Ok(children) = self.child_faces(f) {
            for cf in children {
                self.remove_face(cf)?;
            }
        }
        // interior edges, if still present
        let mids: Vec<VertId> = {
            let face = self.face(f)?;
            face.e
                .iter()
                .filter_map(|&e| self.get_edge(e).and_then(|edge| edge.child_vert))
                .collect()
        };
        if mids.len() == 3 {
            for pair in [[mids[0], mids[1]], [mids[1], mids[2]], [mids[2], mids[0]]] {
                if let Some(ie) = self.lookup_edge(pair[0], pair[1]) {
                    self.remove_edge(ie)?;
                }
            }
        }
        if let Some(face) = self.get_face_mut(f) {
            face.subdiv_allocated = false;
        }
        for vk in v {
            self.mark_dirty(vk);
        }
        debug!(face = ?f, "deleted subdivision children");
        Ok(())
    }

    // ---- removal ----

    /// Removes a face and its entire subdivision subtree. Idempotent.
    ///
    /// # Errors
    /// Propagates arena errors from the cascade.
    pub fn remove_face(&mut self, f: FaceId) -> SubdivResult<()> {
        let Some(face) = self.get_face(f) else {
            return Ok(());
        };
        let v = face.v;
        let e = face.e;
        let parent = face.parent;
        if face.subdiv_allocated {
            self.delete_subdiv_face(f)?;
        }
        for eid in e {
            if let Some(edge) = self.get_edge_mut(eid) {
                for slot in &mut edge.f {
                    if *slot == Some(f) {
                        *slot = None;
                    }
                }
            }
        }
        if let Some(p) = parent {
            if let Some(pface) = self.get_face_mut(p) {
                pface.subdiv_allocated = false;
            }
        }
        self.levels[f.level() as usize].faces[f.index() as usize] = None;
        self.events.push(MeshEvent::SimplexDeleted(SimplexId::Face(f)));
        for vk in v {
            self.mark_dirty(vk);
        }
        Ok(())
    }

    /// Removes an edge, its adjacent faces, and its subdivision subtree.
    /// Idempotent.
    ///
    /// # Errors
    /// Propagates arena errors from the cascade.
    pub fn remove_edge(&mut self, e: EdgeId) -> SubdivResult<()> {
        let Some(edge) = self.get_edge(e) else {
            return Ok(());
        };
        let v = edge.v;
        let parent = edge.parent;
        let faces: Vec<FaceId> = edge.f.iter().flatten().copied().collect();
        for f in faces {
            self.remove_face(f)?;
        }
        if self.get_edge(e).is_some_and(|edge| edge.subdiv_allocated) {
            self.delete_subdiv_edge(e)?;
        }
        for vk in v {
            if let Some(vert) = self.get_vert_mut(vk) {
                vert.edges.retain(|&x| x != e);
            }
            self.mark_dirty(vk);
        }
        match parent {
            Some(SimplexId::Edge(p)) => {
                if let Some(pedge) = self.get_edge_mut(p) {
                    pedge.subdiv_allocated = false;
                }
            }
            Some(SimplexId::Face(p)) => {
                if let Some(pface) = self.get_face_mut(p) {
                    pface.subdiv_allocated = false;
                }
            }
            _ => {}
        }
        self.levels[e.level() as usize].edges[e.index() as usize] = None;
        self.events.push(MeshEvent::SimplexDeleted(SimplexId::Edge(e)));
        Ok(())
    }

    /// Removes a vertex, its adjacent edges and faces, and its subdivision
    /// subtree. Idempotent.
    ///
    /// # Errors
    /// Propagates arena errors from the cascade.
    pub fn remove_vert(&mut self, v: VertId) -> SubdivResult<()> {
        let Some(vert) = self.get_vert(v) else {
            return Ok(());
        };
        let edges = vert.edges.clone();
        let child = vert.child;
        let parent = vert.parent;
        for e in edges {
            self.remove_edge(e)?;
        }
        if let Some(c) = child {
            self.remove_vert(c)?;
        }
        match parent {
            Some(SimplexId::Vert(p)) => {
                if let Some(pv) = self.get_vert_mut(p) {
                    if pv.child == Some(v) {
                        pv.child = None;
                        pv.subdiv_allocated = false;
                    }
                }
            }
            Some(SimplexId::Edge(p)) => {
                if let Some(pe) = self.get_edge_mut(p) {
                    if pe.child_vert == Some(v) {
                        pe.child_vert = None;
                        pe.subdiv_allocated = false;
                    }
                }
            }
            _ => {}
        }
        self.levels[v.level() as usize].verts[v.index() as usize] = None;
        self.events.push(MeshEvent::SimplexDeleted(SimplexId::Vert(v)));
        Ok(())
    }

    // ---- Loop geometry ----

    fn vert_mask_loc(&self, p: VertId) -> SubdivResult<Point3<f64>> {
        let vert = self.vert(p)?;
        if vert.corner > 0 {
            return Ok(vert.loc);
        }
        let mut ring_sum = Vector3::zeros();
        let mut sharp = Vec::new();
        let mut n = 0usize;
        for &e in &vert.edges {
            let edge = self.edge(e)?;
            let Some(o) = edge.other_vert(p) else {
                continue;
            };
            let oloc = self.vert(o)?.loc;
            if edge.crease > 0 || edge.is_boundary() {
                sharp.push(oloc);
            }
            ring_sum += oloc.coords;
            n += 1;
        }
        if n == 0 {
            return Ok(vert.loc);
        }
        match sharp.len() {
            2 => {
                // crease/boundary rule
                let c = (sharp[0].coords + sharp[1].coords) * 0.125;
                Ok(Point3::from(vert.loc.coords * 0.75 + c))
            }
            x if x > 2 => Ok(vert.loc),
            // darts (one sharp edge) smooth like interior vertices
            _ => {
                let beta = if n == 3 {
                    3.0 / 16.0
                } else {
                    3.0 / (8.0 * n as f64)
                };
                let w = 1.0 - n as f64 * beta;
                Ok(Point3::from(vert.loc.coords * w + ring_sum * beta))
            }
        }
    }

    fn edge_mask_loc(&self, p: EdgeId) -> SubdivResult<Point3<f64>> {
        let edge = self.edge(p)?;
        let a = self.vert(edge.v[0])?.loc;
        let b = self.vert(edge.v[1])?.loc;
        if edge.crease > 0 || edge.is_boundary() {
            return Ok(nalgebra::center(&a, &b));
        }
        let mut opp = Vector3::zeros();
        for f in edge.f.iter().flatten() {
            let face = self.face(*f)?;
            for &v in &face.v {
                if !edge.contains(v) {
                    opp += self.vert(v)?.loc.coords;
                }
            }
        }
        Ok(Point3::from((a.coords + b.coords) * 0.375 + opp * 0.125))
    }

    /// The Loop-smoothed position of `v` computed from its parent's level.
    /// Control vertices return their own position.
    ///
    /// # Errors
    /// [`SubdivError::DeadSimplex`] if the handle or an ancestor is dead.
    pub fn smooth_loc_from_parent(&self, v: VertId) -> SubdivResult<Point3<f64>> {
        let vert = self.vert(v)?;
        match vert.parent {
            Some(SimplexId::Vert(p)) => self.vert_mask_loc(p),
            Some(SimplexId::Edge(p)) => self.edge_mask_loc(p),
            Some(SimplexId::Face(_)) | None => Ok(vert.loc),
        }
    }

    /// Smoothed position plus the stored detail offset along the parent
    /// normal.
    ///
    /// # Errors
    /// [`SubdivError::DeadSimplex`] if the handle or an ancestor is dead.
    pub fn detail_loc_from_parent(&self, v: VertId) -> SubdivResult<Point3<f64>> {
        let base = self.smooth_loc_from_parent(v)?;
        let off = self.vert(v)?.offset;
        if off == 0.0 {
            return Ok(base);
        }
        Ok(base + self.parent_normal(v) * off)
    }

    // ---- update pass ----

    fn refresh_vert(&mut self, c: VertId) {
        let Ok(target) = self.detail_loc_from_parent(c) else {
            return;
        };
        let Some(vert) = self.get_vert_mut(c) else {
            return;
        };
        if vert.loc == target {
            return;
        }
        vert.loc = target;
        self.mark_dirty(c);
    }

    fn refresh_children_of(&mut self, v: VertId) {
        let Some(vert) = self.get_vert(v) else {
            return;
        };
        let child = vert.child;
        let edges = vert.edges.clone();
        if let Some(c) = child {
            self.refresh_vert(c);
        }
        for e in edges {
            if let Some(m) = self.get_edge(e).and_then(|edge| edge.child_vert) {
                self.refresh_vert(m);
            }
        }
        // children of the opposite edges: their masks read this vertex
        for f in self.faces_around_vert(v) {
            let Some(face) = self.get_face(f) else {
                continue;
            };
            let opposite: Vec<EdgeId> = face
                .e
                .iter()
                .copied()
                .filter(|&e| !self.get_edge(e).is_some_and(|edge| edge.contains(v)))
                .collect();
            for e in opposite {
                if let Some(m) = self.get_edge(e).and_then(|edge| edge.child_vert) {
                    self.refresh_vert(m);
                }
            }
        }
    }

    /// Processes the dirty list of one level, recomputing child positions.
    /// Children that move are queued at the next level.
    pub fn update_level(&mut self, level: u16) {
        let Some(lm) = self.levels.get_mut(level as usize) else {
            return;
        };
        let dirty = std::mem::take(&mut lm.dirty);
        for v in dirty {
            if let Some(vert) = self.get_vert_mut(v) {
                vert.dirty = false;
            } else {
                continue;
            }
            self.refresh_children_of(v);
        }
    }

    /// Pushes all pending geometry changes down the hierarchy, coarsest
    /// level first.
    pub fn update(&mut self) {
        for level in 0..self.levels.len() as u16 {
            self.update_level(level);
        }
    }

    // ---- detail offsets ----

    /// Sets the detail offset of `v` and repositions it.
    ///
    /// Offsets only apply to vertices with a parent; on a control vertex the
    /// value is stored but the position is unchanged.
    ///
    /// # Errors
    /// [`SubdivError::DeadSimplex`] if the handle is dead.
    pub fn set_offset(&mut self, v: VertId, offset: f64) -> SubdivResult<()> {
        let vert = self
            .get_vert_mut(v)
            .ok_or(SubdivError::DeadSimplex(SimplexId::Vert(v)))?;
        vert.offset = offset;
        if vert.parent.is_some() {
            let loc = self.detail_loc_from_parent(v)?;
            self.set_loc(v, loc)?;
        }
        Ok(())
    }

    /// Adds to the detail offset of `v`.
    ///
    /// # Errors
    /// [`SubdivError::DeadSimplex`] if the handle is dead.
    pub fn add_offset(&mut self, v: VertId, delta: f64) -> SubdivResult<()> {
        let cur = self.vert(v)?.offset;
        self.set_offset(v, cur + delta)
    }

    /// Chooses the detail offset that brings `v` as close as possible to
    /// `target`, and applies it. Control vertices move to `target` exactly.
    /// Returns the resulting position.
    ///
    /// # Errors
    /// [`SubdivError::DeadSimplex`] if the handle is dead.
    pub fn fit_subdiv_offset(&mut self, v: VertId, target: Point3<f64>) -> SubdivResult<Point3<f64>> {
        if self.vert(v)?.parent.is_none() {
            self.set_loc(v, target)?;
            return Ok(target);
        }
        let base = self.smooth_loc_from_parent(v)?;
        let n = self.parent_normal(v);
        let off = (target - base).dot(&n);
        if let Some(vert) = self.get_vert_mut(v) {
            vert.offset = off;
        }
        let loc = base + n * off;
        self.set_loc(v, loc)?;
        Ok(loc)
    }

    // ---- sharpness & weak edges ----

    /// Sets the crease sharpness of an edge.
    ///
    /// # Errors
    /// [`SubdivError::DeadSimplex`] if the handle is dead.
    pub fn set_crease(&mut self, e: EdgeId, crease: u16) -> SubdivResult<()> {
        let edge = self
            .get_edge_mut(e)
            .ok_or(SubdivError::DeadSimplex(SimplexId::Edge(e)))?;
        edge.crease = crease;
        let v = edge.v;
        for vk in v {
            self.mark_dirty(vk);
        }
        Ok(())
    }

    /// Raises the crease sharpness of an edge, saturating below permanent.
    ///
    /// # Errors
    /// [`SubdivError::DeadSimplex`] if the handle is dead.
    pub fn inc_crease(&mut self, e: EdgeId, amount: u16) -> SubdivResult<()> {
        let cur = self.edge(e)?.crease;
        if cur == u16::MAX {
            return Ok(());
        }
        self.set_crease(e, cur.saturating_add(amount))
    }

    /// Lowers the crease sharpness of an edge.
    ///
    /// # Errors
    /// [`SubdivError::DeadSimplex`] if the handle is dead.
    pub fn dec_crease(&mut self, e: EdgeId, amount: u16) -> SubdivResult<()> {
        let cur = self.edge(e)?.crease;
        self.set_crease(e, cur.saturating_sub(amount))
    }

    /// Sets the corner sharpness of a vertex.
    ///
    /// # Errors
    /// [`SubdivError::DeadSimplex`] if the handle is dead.
    pub fn set_corner(&mut self, v: VertId, corner: u16) -> SubdivResult<()> {
        self.get_vert_mut(v)
            .ok_or(SubdivError::DeadSimplex(SimplexId::Vert(v)))?
            .corner = corner;
        self.mark_dirty(v);
        Ok(())
    }

    /// Marks an edge as a weak (quad-diagonal) edge.
    ///
    /// # Errors
    /// [`SubdivError::DeadSimplex`] if the handle is dead.
    pub fn set_weak(&mut self, e: EdgeId, weak: bool) -> SubdivResult<()> {
        self.get_edge_mut(e)
            .ok_or(SubdivError::DeadSimplex(SimplexId::Edge(e)))?
            .weak = weak;
        Ok(())
    }

    // ---- lightweight redefinition ----

    /// Replaces one corner vertex of a face without touching its edges.
    /// Returns false (and changes nothing) unless `old` is a corner of a
    /// live face and `new` is live.
    pub fn redef_face_vert(&mut self, f: FaceId, old: VertId, new: VertId) -> bool {
        if self.get_vert(new).is_none() {
            return false;
        }
        let Some(face) = self.get_face(f) else {
            return false;
        };
        let Some(k) = face.v.iter().position(|&x| x == old) else {
            return false;
        };
        if let Some(face) = self.get_face_mut(f) {
            face.v[k] = new;
        }
        true
    }

    /// Replaces one edge slot of a face, moving the face between the edges'
    /// adjacency slots. Returns false (and changes nothing) unless `old` is
    /// in the face and `new` has room.
    pub fn redef_face_edge(&mut self, f: FaceId, old: EdgeId, new: EdgeId) -> bool {
        let Some(face) = self.get_face(f) else {
            return false;
        };
        let Some(k) = face.e.iter().position(|&x| x == old) else {
            return false;
        };
        let Some(nedge) = self.get_edge(new) else {
            return false;
        };
        if !nedge.f.contains(&Some(f)) && !nedge.f.contains(&None) {
            return false;
        }
        if let Some(oedge) = self.get_edge_mut(old) {
            for slot in &mut oedge.f {
                if *slot == Some(f) {
                    *slot = None;
                }
            }
        }
        if let Some(nedge) = self.get_edge_mut(new) {
            if !nedge.f.contains(&Some(f)) {
                if let Some(slot) = nedge.f.iter_mut().find(|s| s.is_none()) {
                    *slot = Some(f);
                }
            }
        }
        if let Some(face) = self.get_face_mut(f) {
            face.e[k] = new;
        }
        true
    }

    /// Replaces one endpoint of an edge, updating vertex adjacency lists.
    /// Returns false (and changes nothing) unless `old` is an endpoint and
    /// the result is non-degenerate.
    pub fn redef_edge_vert(&mut self, e: EdgeId, old: VertId, new: VertId) -> bool {
        if self.get_vert(new).is_none() {
            return false;
        }
        let Some(edge) = self.get_edge(e) else {
            return false;
        };
        let Some(k) = edge.v.iter().position(|&x| x == old) else {
            return false;
        };
        if edge.v[1 - k] == new {
            return false;
        }
        if let Some(vold) = self.get_vert_mut(old) {
            vold.edges.retain(|&x| x != e);
        }
        if let Some(edge) = self.get_edge_mut(e) {
            edge.v[k] = new;
        }
        if let Some(vnew) = self.get_vert_mut(new) {
            vnew.edges.push(e);
        }
        true
    }

    /// Points the subdivision-child slot of a vertex or edge at `child`.
    /// Used when seam joining identifies one vertex with another. Returns
    /// false for faces or dead parents.
    pub fn set_child_of(&mut self, parent: SimplexId, child: VertId) -> bool {
        match parent {
            SimplexId::Vert(p) => {
                if let Some(v) = self.get_vert_mut(p) {
                    v.child = Some(child);
                    return true;
                }
                false
            }
            SimplexId::Edge(p) => {
                if let Some(e) = self.get_edge_mut(p) {
                    e.child_vert = Some(child);
                    return true;
                }
                false
            }
            SimplexId::Face(_) => false,
        }
    }

    // ---- chains ----

    /// True if consecutive vertices are all joined by edges.
    #[must_use]
    pub fn forms_chain(&self, verts: &[VertId]) -> bool {
        verts.len() >= 2
            && verts
                .windows(2)
                .all(|w| self.lookup_edge(w[0], w[1]).is_some())
    }

    /// True if the vertices form a chain that closes back on itself.
    #[must_use]
    pub fn forms_closed_chain(&self, verts: &[VertId]) -> bool {
        verts.len() >= 3
            && self.forms_chain(verts)
            && self
                .lookup_edge(verts[verts.len() - 1], verts[0])
                .is_some()
    }

    /// The edges joining consecutive chain vertices (plus the wraparound
    /// edge when `closed`).
    ///
    /// # Errors
    /// [`SubdivError::MissingEdge`] where the chain is broken.
    pub fn chain_edges(&self, verts: &[VertId], closed: bool) -> SubdivResult<Vec<EdgeId>> {
        let mut out = Vec::new();
        for w in verts.windows(2) {
            out.push(
                self.lookup_edge(w[0], w[1])
                    .ok_or(SubdivError::MissingEdge(w[0], w[1]))?,
            );
        }
        if closed && verts.len() >= 2 {
            let (a, b) = (verts[verts.len() - 1], verts[0]);
            out.push(self.lookup_edge(a, b).ok_or(SubdivError::MissingEdge(a, b))?);
        }
        Ok(out)
    }

    /// The chain of subdivision vertices generated beneath a vertex chain,
    /// `rel_level` levels down. `None` if any child is missing.
    #[must_use]
    pub fn subdiv_chain(&self, verts: &[VertId], rel_level: u16) -> Option<Vec<VertId>> {
        if rel_level == 0 {
            return Some(verts.to_vec());
        }
        let mut next = Vec::with_capacity(verts.len() * 2);
        for (i, &v) in verts.iter().enumerate() {
            next.push(self.get_vert(v)?.child?);
            if i + 1 < verts.len() {
                let e = self.lookup_edge(v, verts[i + 1])?;
                next.push(self.get_edge(e)?.child_vert?);
            }
        }
        self.subdiv_chain(&next, rel_level - 1)
    }

    // ---- orientation ----

    /// Reverses the winding of a face and, recursively, of its children.
    ///
    /// # Errors
    /// [`SubdivError::DeadSimplex`] if the face is dead or an edge lookup
    /// fails after the swap.
    pub fn reverse_face(&mut self, f: FaceId) -> SubdivResult<()> {
        let children = self.child_faces(f).ok();
        let face = self.face(f)?;
        let v = [face.v[0], face.v[2], face.v[1]];
        let mut e = [face.e[0]; 3];
        for k in 0..3 {
            e[k] = self
                .lookup_edge(v[k], v[(k + 1) % 3])
                .ok_or(SubdivError::DeadSimplex(SimplexId::Face(f)))?;
        }
        if let Some(face) = self.get_face_mut(f) {
            face.v = v;
            face.e = e;
        }
        if let Some(children) = children {
            for cf in children {
                self.reverse_face(cf)?;
            }
        }
        Ok(())
    }

    // ---- events ----

    /// Drains and returns all recorded events.
    #[must_use]
    pub fn take_events(&mut self) -> Vec<MeshEvent> {
        std::mem::take(&mut self.events)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn make_triangle() -> (SubdivMesh, [VertId; 3], FaceId) {
        let mut mesh = SubdivMesh::new();
        let a = mesh.add_vert(Point3::new(0.0, 0.0, 0.0));
        let b = mesh.add_vert(Point3::new(1.0, 0.0, 0.0));
        let c = mesh.add_vert(Point3::new(0.0, 1.0, 0.0));
        let f = mesh.add_face([a, b, c]).unwrap();
        (mesh, [a, b, c], f)
    }

    #[test]
    fn test_add_edge_dedup() {
        let mut mesh = SubdivMesh::new();
        let a = mesh.add_vert(Point3::origin());
        let b = mesh.add_vert(Point3::new(1.0, 0.0, 0.0));
        let e1 = mesh.add_edge(a, b).unwrap();
        let e2 = mesh.add_edge(b, a).unwrap();
        assert_eq!(e1, e2);
        assert!(mesh.add_edge(a, a).is_err());
    }

    #[test]
    fn test_face_subdivision_counts() {
        let (mut mesh, _, f) = make_triangle();
        mesh.allocate_subdiv_face(f).unwrap();
        assert_eq!(mesh.level_count(), 2);
        assert_eq!(mesh.verts_at(1).len(), 6);
        assert_eq!(mesh.edges_at(1).len(), 9);
        assert_eq!(mesh.faces_at(1).len(), 4);
        let children = mesh.child_faces(f).unwrap();
        assert_eq!(children.len(), 4);
    }

    #[test]
    fn test_allocation_is_idempotent() {
        let (mut mesh, _, f) = make_triangle();
        mesh.allocate_subdiv_face(f).unwrap();
        let before = mesh.verts_at(1).len();
        mesh.allocate_subdiv_face(f).unwrap();
        assert_eq!(mesh.verts_at(1).len(), before);
    }

    #[test]
    fn test_delete_then_reallocate() {
        let (mut mesh, _, f) = make_triangle();
        mesh.allocate_subdiv_face(f).unwrap();
        mesh.delete_subdiv_face(f).unwrap();
        assert_eq!(mesh.faces_at(1).len(), 0);
        assert!(!mesh.face(f).unwrap().is_subdivided());
        mesh.allocate_subdiv_face(f).unwrap();
        assert_eq!(mesh.faces_at(1).len(), 4);
        assert_eq!(mesh.verts_at(1).len(), 6);
        assert_eq!(mesh.edges_at(1).len(), 9);
    }

    #[test]
    fn test_boundary_edge_children_at_midpoints() {
        let (mut mesh, [_, b, c], f) = make_triangle();
        mesh.allocate_subdiv_face(f).unwrap();
        mesh.update();
        // all three edges are boundary, so their children sit at midpoints
        let e = mesh.lookup_edge(b, c).unwrap();
        let m = mesh.edge(e).unwrap().child_vert().unwrap();
        assert_relative_eq!(mesh.vert(m).unwrap().loc(), Point3::new(0.5, 0.5, 0.0));
        // the center child face is spanned by the three edge midpoints
        let center = mesh.child_faces(f).unwrap()[3];
        let [m1, m2, m0] = mesh.face(center).unwrap().verts();
        assert_relative_eq!(mesh.vert(m1).unwrap().loc(), Point3::new(0.5, 0.5, 0.0));
        assert_relative_eq!(mesh.vert(m2).unwrap().loc(), Point3::new(0.0, 0.5, 0.0));
        assert_relative_eq!(mesh.vert(m0).unwrap().loc(), Point3::new(0.5, 0.0, 0.0));
    }

    #[test]
    fn test_boundary_vert_child_crease_rule() {
        let (mut mesh, [a, b, c], f) = make_triangle();
        mesh.allocate_subdiv_face(f).unwrap();
        mesh.update();
        // two boundary edges at each corner: 0.75 v + 0.125 (n1 + n2)
        let ca = mesh.vert(a).unwrap().child().unwrap();
        let expect = Point3::from(
            mesh.vert(a).unwrap().loc().coords * 0.75
                + (mesh.vert(b).unwrap().loc().coords + mesh.vert(c).unwrap().loc().coords)
                    * 0.125,
        );
        assert_relative_eq!(mesh.vert(ca).unwrap().loc(), expect);
    }

    #[test]
    fn test_corner_vertex_pins_child() {
        let (mut mesh, [a, _, _], f) = make_triangle();
        mesh.set_corner(a, 1).unwrap();
        mesh.allocate_subdiv_face(f).unwrap();
        mesh.update();
        let ca = mesh.vert(a).unwrap().child().unwrap();
        assert_relative_eq!(mesh.vert(ca).unwrap().loc(), mesh.vert(a).unwrap().loc());
    }

    #[test]
    fn test_crease_sharpness_decrements() {
        let (mut mesh, [a, b, _], f) = make_triangle();
        let e = mesh.lookup_edge(a, b).unwrap();
        mesh.set_crease(e, 3).unwrap();
        mesh.allocate_subdiv_face(f).unwrap();
        let m = mesh.edge(e).unwrap().child_vert().unwrap();
        let ca = mesh.vert(a).unwrap().child().unwrap();
        let child_edge = mesh.lookup_edge(ca, m).unwrap();
        assert_eq!(mesh.edge(child_edge).unwrap().crease(), 2);
    }

    #[test]
    fn test_remove_vert_cascades() {
        let (mut mesh, [a, _, _], f) = make_triangle();
        mesh.allocate_subdiv_face(f).unwrap();
        mesh.remove_vert(a).unwrap();
        assert!(mesh.vert(a).is_err());
        assert!(mesh.face(f).is_err());
        assert_eq!(mesh.faces_at(1).len(), 0);
        assert_eq!(mesh.verts_at(0).len(), 2);
        let events = mesh.take_events();
        assert!(events
            .iter()
            .any(|e| *e == MeshEvent::SimplexDeleted(SimplexId::Vert(a))));
    }

    #[test]
    fn test_fit_subdiv_offset_reaches_target_along_normal() {
        let (mut mesh, [a, b, _], f) = make_triangle();
        mesh.allocate_subdiv_face(f).unwrap();
        mesh.update();
        let e = mesh.lookup_edge(a, b).unwrap();
        let m = mesh.edge(e).unwrap().child_vert().unwrap();
        let base = mesh.smooth_loc_from_parent(m).unwrap();
        let n = mesh.parent_normal(m);
        let target = base + n * 0.25;
        let got = mesh.fit_subdiv_offset(m, target).unwrap();
        assert_relative_eq!(got, target, epsilon = 1e-12);
        assert_relative_eq!(mesh.vert(m).unwrap().offset(), 0.25, epsilon = 1e-12);
        // update must not fight the fitted offset
        mesh.update();
        assert_relative_eq!(mesh.vert(m).unwrap().loc(), target, epsilon = 1e-12);
    }

    #[test]
    fn test_fit_control_vert_moves_exactly() {
        let (mut mesh, [a, _, _], _) = make_triangle();
        let target = Point3::new(3.0, -1.0, 2.0);
        let got = mesh.fit_subdiv_offset(a, target).unwrap();
        assert_relative_eq!(got, target);
        assert_relative_eq!(mesh.vert(a).unwrap().loc(), target);
    }

    #[test]
    fn test_subdiv_chain_extraction() {
        let (mut mesh, [a, b, _], f) = make_triangle();
        mesh.allocate_subdiv_face(f).unwrap();
        let chain = mesh.subdiv_chain(&[a, b], 1).unwrap();
        assert_eq!(chain.len(), 3);
        assert_eq!(chain[0], mesh.vert(a).unwrap().child().unwrap());
        let e = mesh.lookup_edge(a, b).unwrap();
        assert_eq!(chain[1], mesh.edge(e).unwrap().child_vert().unwrap());
        // two levels down: 5 verts
        mesh.allocate_subdiv_face(mesh.child_faces(f).unwrap()[0])
            .unwrap();
        // only one child face subdivided; full chain needs both end edges
        assert!(mesh.subdiv_chain(&[a, b], 2).is_none());
    }

    #[test]
    fn test_redef_edge_vert_rejects_missing_old() {
        let (mut mesh, [a, b, c], _) = make_triangle();
        let extra = mesh.add_vert(Point3::new(2.0, 2.0, 0.0));
        let e = mesh.lookup_edge(a, b).unwrap();
        assert!(!mesh.redef_edge_vert(e, extra, c));
        assert_eq!(mesh.edge(e).unwrap().verts(), [a, b]);
    }

    #[test]
    fn test_reverse_face_recurses() {
        let (mut mesh, [a, b, c], f) = make_triangle();
        mesh.allocate_subdiv_face(f).unwrap();
        mesh.reverse_face(f).unwrap();
        assert_eq!(mesh.face(f).unwrap().verts(), [a, c, b]);
        let children = mesh.child_faces(f).ok();
        assert!(children.is_some());
    }

    #[test]
    fn test_forms_chain_queries() {
        let (mesh, [a, b, c], _) = make_triangle();
        assert!(mesh.forms_chain(&[a, b, c]));
        assert!(mesh.forms_closed_chain(&[a, b, c]));
        assert!(!mesh.forms_closed_chain(&[a, b]));
    }
}
