//! The controller registry and per-simplex ownership slots.
//!
//! A [`Controller`] manages a connected piece of the mesh at one level:
//! a point, a curve strip, or a surface region. Its claim on each simplex is
//! a meme; the [`ControlSet`] arbitrates which controller is boss of each
//! simplex. Only the boss writes positions. Ownership changes are explicit:
//! [`ControlSet::take_charge`] always wins, and the previous boss is
//! notified (its meme wakes up and its child memes are demoted).

use hashbrown::HashMap;
use nalgebra::{Point3, Vector3};
use tracing::debug;

use mesh_subdiv::{EdgeId, FaceId, MeshEvent, SimplexId, SubdivMesh, VertId};

use crate::error::{ControlError, ControlResult};
use crate::map::GeometryMap;
use crate::map::MapParam;
use crate::meme::{EdgeMeme, FaceMeme, VertMeme, BOSS_TRACK_FACTOR};

/// Damping applied when relaxing a vertex toward its neighborhood centroid.
const RELAX_FACTOR: f64 = 0.5;

/// Registry handle for a controller.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ControllerId(u32);

impl ControllerId {
    /// Builds a handle from its raw value.
    #[inline]
    #[must_use]
    pub const fn from_raw(raw: u32) -> Self {
        Self(raw)
    }

    /// The raw value.
    #[inline]
    #[must_use]
    pub const fn raw(self) -> u32 {
        self.0
    }
}

/// The closed set of controller shapes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum ShapeKind {
    /// Controls a single vertex.
    Point,
    /// Controls a vertex strip along edges.
    Curve,
    /// Controls a region of faces.
    Surface,
}

/// One controller: shape tag, meme tables, resolution chain links, and the
/// injected geometry map.
#[derive(Debug)]
pub struct Controller {
    shape: ShapeKind,
    level: u16,
    res_level: u16,
    verts: Vec<VertId>,
    vmemes: HashMap<VertId, VertMeme>,
    ememes: HashMap<EdgeId, EdgeMeme>,
    fmemes: HashMap<FaceId, FaceMeme>,
    parent: Option<ControllerId>,
    child: Option<ControllerId>,
    map: Box<dyn GeometryMap>,
}

impl Controller {
    /// The controller's shape.
    #[inline]
    #[must_use]
    pub fn shape(&self) -> ShapeKind {
        self.shape
    }

    /// Mesh level this controller operates on.
    #[inline]
    #[must_use]
    pub fn level(&self) -> u16 {
        self.level
    }

    /// Requested resolution depth below this controller.
    #[inline]
    #[must_use]
    pub fn res_level(&self) -> u16 {
        self.res_level
    }

    /// Managed vertices, in strip order.
    #[inline]
    #[must_use]
    pub fn verts(&self) -> &[VertId] {
        &self.verts
    }

    /// Parent controller one level up the resolution chain.
    #[inline]
    #[must_use]
    pub fn parent(&self) -> Option<ControllerId> {
        self.parent
    }

    /// Child controller one level down the resolution chain.
    #[inline]
    #[must_use]
    pub fn child(&self) -> Option<ControllerId> {
        self.child
    }

    /// This controller's meme on a vertex, if any.
    #[must_use]
    pub fn vmeme(&self, v: VertId) -> Option<&VertMeme> {
        self.vmemes.get(&v)
    }

    /// True if this controller has a meme on the edge.
    #[must_use]
    pub fn has_ememe(&self, e: EdgeId) -> bool {
        self.ememes.contains_key(&e)
    }

    /// True if this controller has a meme on the face.
    #[must_use]
    pub fn has_fmeme(&self, f: FaceId) -> bool {
        self.fmemes.contains_key(&f)
    }

    /// The injected geometry map.
    #[must_use]
    pub fn map(&self) -> &dyn GeometryMap {
        self.map.as_ref()
    }
}

/// Ownership state of one simplex: the boss (if any) plus all watchers.
#[derive(Debug, Clone, Default)]
pub struct SimplexSlot {
    boss: Option<ControllerId>,
    watchers: Vec<ControllerId>,
}

impl SimplexSlot {
    /// The current boss.
    #[inline]
    #[must_use]
    pub fn boss(&self) -> Option<ControllerId> {
        self.boss
    }

    /// All controllers holding a meme on the simplex.
    #[inline]
    #[must_use]
    pub fn watchers(&self) -> &[ControllerId] {
        &self.watchers
    }
}

/// Owned registry of controllers and per-simplex ownership slots.
///
/// Passed explicitly wherever it is needed; there is no process-wide
/// instance.
#[derive(Debug, Default)]
pub struct ControlSet {
    controllers: HashMap<ControllerId, Controller>,
    slots: HashMap<SimplexId, SimplexSlot>,
    next: u32,
    suppress: bool,
}

fn child_simplices(mesh: &SubdivMesh, s: SimplexId) -> Vec<SimplexId> {
    match s {
        SimplexId::Vert(v) => mesh
            .vert(v)
            .ok()
            .and_then(|vert| vert.child())
            .map(|c| vec![SimplexId::Vert(c)])
            .unwrap_or_default(),
        SimplexId::Edge(e) => {
            let Ok(edge) = mesh.edge(e) else {
                return Vec::new();
            };
            let Some(m) = edge.child_vert() else {
                return Vec::new();
            };
            let mut out = vec![SimplexId::Vert(m)];
            for v in edge.verts() {
                if let Some(ce) = mesh
                    .vert(v)
                    .ok()
                    .and_then(|vert| vert.child())
                    .and_then(|cv| mesh.lookup_edge(cv, m))
                {
                    out.push(SimplexId::Edge(ce));
                }
            }
            out
        }
        SimplexId::Face(f) => {
            let Ok(children) = mesh.child_faces(f) else {
                return Vec::new();
            };
            let mut out: Vec<SimplexId> = children.iter().map(|&c| SimplexId::Face(c)).collect();
            if let Ok(center) = mesh.face(children[3]) {
                out.extend(center.edges().iter().map(|&e| SimplexId::Edge(e)));
            }
            out
        }
    }
}

impl ControlSet {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a controller with the given shape, mesh level, and map.
    pub fn add_controller(
        &mut self,
        shape: ShapeKind,
        level: u16,
        map: Box<dyn GeometryMap>,
    ) -> ControllerId {
        let id = ControllerId(self.next);
        self.next += 1;
        self.controllers.insert(
            id,
            Controller {
                shape,
                level,
                res_level: 0,
                verts: Vec::new(),
                vmemes: HashMap::new(),
                ememes: HashMap::new(),
                fmemes: HashMap::new(),
                parent: None,
                child: None,
                map,
            },
        );
        id
    }

    /// Looks up a controller.
    ///
    /// # Errors
    /// [`ControlError::UnknownController`] for stale ids.
    pub fn controller(&self, cid: ControllerId) -> ControlResult<&Controller> {
        self.controllers
            .get(&cid)
            .ok_or(ControlError::UnknownController(cid))
    }

    /// All registered controller ids.
    #[must_use]
    pub fn controller_ids(&self) -> Vec<ControllerId> {
        let mut ids: Vec<ControllerId> = self.controllers.keys().copied().collect();
        ids.sort_unstable();
        ids
    }

    /// The ownership slot of a simplex, if any controller holds a stake.
    #[must_use]
    pub fn slot(&self, s: SimplexId) -> Option<&SimplexSlot> {
        self.slots.get(&s)
    }

    /// The boss of a simplex.
    #[must_use]
    pub fn boss_of(&self, s: SimplexId) -> Option<ControllerId> {
        self.slots.get(&s).and_then(SimplexSlot::boss)
    }

    /// True if `cid` is the boss of `s`.
    #[must_use]
    pub fn is_boss(&self, cid: ControllerId, s: SimplexId) -> bool {
        self.boss_of(s) == Some(cid)
    }

    /// When notifications are suppressed, subdivision events pumped from the
    /// mesh do not generate child memes.
    pub fn suppress_notifications(&mut self, suppress: bool) {
        self.suppress = suppress;
    }

    // ---- ownership ----

    /// Makes `cid` the boss of `s`. The last call wins; a previous boss is
    /// demoted, its meme woken, and its child memes recursively lose boss
    /// status.
    pub fn take_charge(&mut self, cid: ControllerId, s: SimplexId, mesh: &SubdivMesh) {
        let slot = self.slots.entry(s).or_default();
        if !slot.watchers.contains(&cid) {
            slot.watchers.push(cid);
        }
        let prev = slot.boss.replace(cid);
        if let Some(p) = prev {
            if p != cid {
                debug!(simplex = ?s, old = ?p, new = ?cid, "boss demoted");
                self.demote_chain(p, s, mesh);
            }
        }
    }

    /// Registers `cid` as a watcher of `s` without claiming boss-ship.
    pub fn watch(&mut self, cid: ControllerId, s: SimplexId) {
        let slot = self.slots.entry(s).or_default();
        if !slot.watchers.contains(&cid) {
            slot.watchers.push(cid);
        }
    }

    fn demote_chain(&mut self, loser: ControllerId, s: SimplexId, mesh: &SubdivMesh) {
        if let SimplexId::Vert(v) = s {
            if let Some(m) = self
                .controllers
                .get_mut(&loser)
                .and_then(|c| c.vmemes.get_mut(&v))
            {
                m.set_hot();
            }
        }
        let Some(child_cid) = self.controllers.get(&loser).and_then(|c| c.child) else {
            return;
        };
        for cs in child_simplices(mesh, s) {
            let held = self
                .slots
                .get(&cs)
                .is_some_and(|slot| slot.boss == Some(child_cid));
            if held {
                if let Some(slot) = self.slots.get_mut(&cs) {
                    slot.boss = None;
                }
                self.demote_chain(child_cid, cs, mesh);
            }
        }
    }

    fn release_slot(&mut self, cid: ControllerId, s: SimplexId) -> bool {
        let mut was_boss = false;
        let mut empty = false;
        match self.slots.get_mut(&s) {
            Some(slot) => {
                slot.watchers.retain(|&w| w != cid);
                if slot.boss == Some(cid) {
                    slot.boss = None;
                    was_boss = true;
                }
                empty = slot.boss.is_none() && slot.watchers.is_empty();
            }
            None => return false,
        }
        if empty {
            self.slots.remove(&s);
        }
        was_boss
    }

    // ---- meme attachment ----

    fn insert_vmeme(&mut self, cid: ControllerId, v: VertId, param: MapParam, sterile: bool) {
        let Some(ctrl) = self.controllers.get_mut(&cid) else {
            return;
        };
        let meme = ctrl.vmemes.entry(v).or_insert_with(|| VertMeme::new(param));
        meme.param = param;
        meme.sterile = sterile;
        if !ctrl.verts.contains(&v) {
            ctrl.verts.push(v);
        }
    }

    /// Attaches a vertex meme and takes charge of the vertex.
    ///
    /// # Errors
    /// [`ControlError::UnknownController`] for stale ids.
    pub fn attach_vert(
        &mut self,
        cid: ControllerId,
        v: VertId,
        param: MapParam,
        mesh: &SubdivMesh,
    ) -> ControlResult<()> {
        self.controller(cid)?;
        self.insert_vmeme(cid, v, param, false);
        self.take_charge(cid, SimplexId::Vert(v), mesh);
        Ok(())
    }

    /// Attaches an edge meme and takes charge of the edge.
    ///
    /// # Errors
    /// [`ControlError::UnknownController`] for stale ids.
    pub fn attach_edge(
        &mut self,
        cid: ControllerId,
        e: EdgeId,
        mesh: &SubdivMesh,
    ) -> ControlResult<()> {
        self.controller(cid)?;
        if let Some(ctrl) = self.controllers.get_mut(&cid) {
            ctrl.ememes.entry(e).or_insert_with(EdgeMeme::new);
        }
        self.take_charge(cid, SimplexId::Edge(e), mesh);
        Ok(())
    }

    /// Attaches a face meme and takes charge of the face.
    ///
    /// # Errors
    /// [`ControlError::UnknownController`] for stale ids.
    pub fn attach_face(
        &mut self,
        cid: ControllerId,
        f: FaceId,
        mesh: &SubdivMesh,
    ) -> ControlResult<()> {
        self.controller(cid)?;
        if let Some(ctrl) = self.controllers.get_mut(&cid) {
            ctrl.fmemes.entry(f).or_insert_with(FaceMeme::new);
        }
        self.take_charge(cid, SimplexId::Face(f), mesh);
        Ok(())
    }

    /// Marks a vertex meme sterile (or fertile again).
    pub fn set_sterile(&mut self, cid: ControllerId, v: VertId, sterile: bool) -> bool {
        match self
            .controllers
            .get_mut(&cid)
            .and_then(|c| c.vmemes.get_mut(&v))
        {
            Some(m) => {
                m.sterile = sterile;
                true
            }
            None => false,
        }
    }

    /// Pins (or unpins) a vertex meme, excluding it from relaxation.
    pub fn set_pinned(&mut self, cid: ControllerId, v: VertId, pinned: bool) -> bool {
        match self
            .controllers
            .get_mut(&cid)
            .and_then(|c| c.vmemes.get_mut(&v))
        {
            Some(m) => {
                m.pinned = pinned;
                true
            }
            None => false,
        }
    }

    // ---- updates ----

    /// Recomputes one meme's candidate and applies it when allowed.
    ///
    /// The candidate comes from the controller's map; a map failure is
    /// silent (the vertex keeps its last good position and `false` is
    /// returned). The position is written only when `cid` is boss of the
    /// vertex or its candidate tracks the boss's ([`Self::tracks_boss`]),
    /// and the displacement exceeds `thresh` times the local average edge
    /// length.
    pub fn do_update(
        &mut self,
        cid: ControllerId,
        v: VertId,
        thresh: f64,
        mesh: &mut SubdivMesh,
    ) -> bool {
        let is_boss = self.is_boss(cid, SimplexId::Vert(v));
        let Some(ctrl) = self.controllers.get_mut(&cid) else {
            return false;
        };
        let Some(meme) = ctrl.vmemes.get_mut(&v) else {
            return false;
        };
        let Some(cand) = ctrl.map.map(&meme.param) else {
            debug!(vert = ?v, "map computation failed; keeping last position");
            return false;
        };
        meme.update = Some(cand);
        if !is_boss && !self.tracks_boss(cid, v, mesh) {
            return false;
        }
        let Ok(vert) = mesh.vert(v) else {
            return false;
        };
        let cur = vert.loc();
        let scale = mesh.avg_adjacent_edge_len(v);
        if (cand - cur).norm() > thresh * scale {
            if mesh.set_loc(v, cand).is_err() {
                return false;
            }
            if let Some(m) = self
                .controllers
                .get_mut(&cid)
                .and_then(|c| c.vmemes.get_mut(&v))
            {
                m.set_hot();
            }
            true
        } else {
            false
        }
    }

    /// True when `cid`'s meme on `v` agrees with the boss's candidate
    /// within [`BOSS_TRACK_FACTOR`] of the local average edge length.
    /// The boss trivially tracks itself.
    #[must_use]
    pub fn tracks_boss(&self, cid: ControllerId, v: VertId, mesh: &SubdivMesh) -> bool {
        let Some(boss) = self.boss_of(SimplexId::Vert(v)) else {
            return false;
        };
        if boss == cid {
            return true;
        }
        let mine = self
            .controllers
            .get(&cid)
            .and_then(|c| c.vmemes.get(&v))
            .and_then(VertMeme::update);
        let theirs = self
            .controllers
            .get(&boss)
            .and_then(|c| c.vmemes.get(&v))
            .and_then(VertMeme::update);
        match (mine, theirs) {
            (Some(a), Some(b)) => {
                (a - b).norm() <= BOSS_TRACK_FACTOR * mesh.avg_adjacent_edge_len(v)
            }
            _ => false,
        }
    }

    /// Recomputes every vertex of a controller and pushes the results down
    /// the hierarchy. Returns how many vertices moved.
    pub fn recompute(&mut self, cid: ControllerId, mesh: &mut SubdivMesh) -> usize {
        let Some(ctrl) = self.controllers.get(&cid) else {
            return 0;
        };
        let verts = ctrl.verts.clone();
        let mut moved = 0;
        for v in verts {
            if self.do_update(cid, v, 0.0, mesh) {
                moved += 1;
            }
        }
        mesh.update();
        moved
    }

    /// Moves a vertex, routing through the boss meme when one exists so the
    /// owning controller sees the new position as its own update.
    pub fn move_vert(&mut self, mesh: &mut SubdivMesh, v: VertId, loc: Point3<f64>) -> bool {
        if let Some(boss) = self.boss_of(SimplexId::Vert(v)) {
            if let Some(meme) = self
                .controllers
                .get_mut(&boss)
                .and_then(|c| c.vmemes.get_mut(&v))
            {
                meme.update = Some(loc);
                meme.set_hot();
            }
        }
        mesh.set_loc(v, loc).is_ok()
    }

    /// One relaxation step: warm, unpinned boss memes drift toward their
    /// neighborhood centroid; memes that stop moving grow cold. Returns how
    /// many vertices moved.
    pub fn tick(&mut self, cid: ControllerId, mesh: &mut SubdivMesh) -> usize {
        let Some(ctrl) = self.controllers.get(&cid) else {
            return 0;
        };
        let verts = ctrl.verts.clone();
        let mut moved = 0;
        for v in verts {
            if !self.is_boss(cid, SimplexId::Vert(v)) {
                continue;
            }
            let skip = match self.controllers.get(&cid).and_then(|c| c.vmemes.get(&v)) {
                Some(m) => m.pinned || m.is_cold(),
                None => true,
            };
            if skip {
                continue;
            }
            let (cur, edges) = match mesh.vert(v) {
                Ok(vert) => (vert.loc(), vert.edges().to_vec()),
                Err(_) => continue,
            };
            let mut sum = Vector3::zeros();
            let mut n = 0usize;
            for e in edges {
                if let Some(o) = mesh.edge(e).ok().and_then(|edge| edge.other_vert(v)) {
                    if let Ok(ov) = mesh.vert(o) {
                        sum += ov.loc().coords;
                        n += 1;
                    }
                }
            }
            if n == 0 {
                continue;
            }
            let centroid = Point3::from(sum / n as f64);
            let target = cur + (centroid - cur) * RELAX_FACTOR;
            let scale = mesh.avg_adjacent_edge_len(v).max(f64::EPSILON);
            if (target - cur).norm() <= 1e-9 * scale {
                if let Some(m) = self
                    .controllers
                    .get_mut(&cid)
                    .and_then(|c| c.vmemes.get_mut(&v))
                {
                    m.grow_cold();
                }
            } else if mesh.set_loc(v, target).is_ok() {
                if let Some(m) = self
                    .controllers
                    .get_mut(&cid)
                    .and_then(|c| c.vmemes.get_mut(&v))
                {
                    m.set_hot();
                }
                moved += 1;
            }
        }
        moved
    }

    // ---- event pump ----

    /// Drains the mesh's event queue and dispatches to memes: moved
    /// vertices wake their watchers, deleted simplices drop their slots and
    /// memes, and fresh subdivision children receive propagated memes
    /// (unless notifications are suppressed).
    pub fn pump(&mut self, mesh: &mut SubdivMesh) {
        let events = mesh.take_events();
        for ev in events {
            match ev {
                MeshEvent::VertMoved(v) => {
                    let watchers = self
                        .slots
                        .get(&SimplexId::Vert(v))
                        .map(|sl| sl.watchers.clone())
                        .unwrap_or_default();
                    for w in watchers {
                        if let Some(m) = self
                            .controllers
                            .get_mut(&w)
                            .and_then(|c| c.vmemes.get_mut(&v))
                        {
                            m.set_hot();
                        }
                    }
                }
                MeshEvent::SimplexDeleted(s) => {
                    let Some(slot) = self.slots.remove(&s) else {
                        continue;
                    };
                    for w in slot.watchers {
                        let Some(ctrl) = self.controllers.get_mut(&w) else {
                            continue;
                        };
                        match s {
                            SimplexId::Vert(v) => {
                                ctrl.vmemes.remove(&v);
                                ctrl.verts.retain(|&x| x != v);
                            }
                            SimplexId::Edge(e) => {
                                ctrl.ememes.remove(&e);
                            }
                            SimplexId::Face(f) => {
                                ctrl.fmemes.remove(&f);
                            }
                        }
                    }
                }
                MeshEvent::SubdivAllocated(s) => {
                    if self.suppress {
                        continue;
                    }
                    self.gen_subdiv_memes(s, mesh);
                }
            }
        }
    }

    // ---- subdivision meme propagation ----

    fn gen_subdiv_memes(&mut self, s: SimplexId, mesh: &SubdivMesh) {
        let Some(slot) = self.slots.get(&s) else {
            return;
        };
        let watchers = slot.watchers.clone();
        let boss = slot.boss;
        for w in watchers {
            self.gen_child_memes(w, boss == Some(w), s, mesh);
        }
    }

    fn gen_child_memes(
        &mut self,
        cid: ControllerId,
        is_boss: bool,
        s: SimplexId,
        mesh: &SubdivMesh,
    ) {
        let Some(ctrl) = self.controllers.get(&cid) else {
            return;
        };
        let Some(child_cid) = ctrl.child else {
            return;
        };
        match s {
            SimplexId::Vert(p) => {
                let Some(c) = mesh.vert(p).ok().and_then(|vert| vert.child()) else {
                    return;
                };
                let Some(m) = ctrl.vmemes.get(&p) else {
                    return;
                };
                // the vertex child copies its parent's parameter
                let param = m.param;
                let potent = !m.sterile;
                self.insert_vmeme(child_cid, c, param, !potent);
                if is_boss && potent {
                    self.take_charge(child_cid, SimplexId::Vert(c), mesh);
                } else {
                    self.watch(child_cid, SimplexId::Vert(c));
                }
            }
            SimplexId::Edge(p) => {
                let Ok(edge) = mesh.edge(p) else {
                    return;
                };
                let Some(m) = edge.child_vert() else {
                    return;
                };
                // 2-way mix across strong edges; 4-way across the quad when
                // the edge is a weak diagonal
                let mut contributors = vec![edge.verts()[0], edge.verts()[1]];
                if edge.is_weak() {
                    for f in edge.faces().iter().flatten() {
                        if let Ok(face) = mesh.face(*f) {
                            for v in face.verts() {
                                if !edge.contains(v) {
                                    contributors.push(v);
                                }
                            }
                        }
                    }
                }
                let mut params = Vec::with_capacity(contributors.len());
                let mut potent = !ctrl.ememes.get(&p).is_some_and(|em| em.sterile);
                for v in &contributors {
                    let Some(vm) = ctrl.vmemes.get(v) else {
                        return;
                    };
                    params.push(vm.param);
                    potent &= !vm.sterile;
                }
                let Some(param) = ctrl.map.child_param(&params) else {
                    return;
                };
                let child_edges: Vec<EdgeId> = edge
                    .verts()
                    .iter()
                    .filter_map(|&v| mesh.vert(v).ok().and_then(|vert| vert.child()))
                    .filter_map(|cv| mesh.lookup_edge(cv, m))
                    .collect();
                self.insert_vmeme(child_cid, m, param, !potent);
                for &ce in &child_edges {
                    if let Some(cc) = self.controllers.get_mut(&child_cid) {
                        let meme = cc.ememes.entry(ce).or_insert_with(EdgeMeme::new);
                        meme.sterile = !potent;
                    }
                }
                if is_boss && potent {
                    self.take_charge(child_cid, SimplexId::Vert(m), mesh);
                    for ce in child_edges {
                        self.take_charge(child_cid, SimplexId::Edge(ce), mesh);
                    }
                } else {
                    self.watch(child_cid, SimplexId::Vert(m));
                    for ce in child_edges {
                        self.watch(child_cid, SimplexId::Edge(ce));
                    }
                }
            }
            SimplexId::Face(p) => {
                let Ok(children) = mesh.child_faces(p) else {
                    return;
                };
                let potent = !ctrl.fmemes.get(&p).is_some_and(|fm| fm.sterile);
                let interior: Vec<EdgeId> = mesh
                    .face(children[3])
                    .map(|center| center.edges().to_vec())
                    .unwrap_or_default();
                for cf in children {
                    if let Some(cc) = self.controllers.get_mut(&child_cid) {
                        let meme = cc.fmemes.entry(cf).or_insert_with(FaceMeme::new);
                        meme.sterile = !potent;
                    }
                    if is_boss && potent {
                        self.take_charge(child_cid, SimplexId::Face(cf), mesh);
                    } else {
                        self.watch(child_cid, SimplexId::Face(cf));
                    }
                }
                for ie in interior {
                    if let Some(cc) = self.controllers.get_mut(&child_cid) {
                        let meme = cc.ememes.entry(ie).or_insert_with(EdgeMeme::new);
                        meme.sterile = !potent;
                    }
                    if is_boss && potent {
                        self.take_charge(child_cid, SimplexId::Edge(ie), mesh);
                    } else {
                        self.watch(child_cid, SimplexId::Edge(ie));
                    }
                }
            }
        }
    }

    // ---- resolution chain ----

    /// Sets how many subdivision levels this controller manages beneath
    /// itself.
    ///
    /// Point controllers store the scalar only. Curve and surface
    /// controllers produce a child controller chain on demand (allocating
    /// subdivision elements beneath owned simplices and propagating memes);
    /// shrinking to 0 releases the chain.
    ///
    /// # Errors
    /// [`ControlError::UnknownController`] for stale ids; mesh errors from
    /// element allocation.
    pub fn set_res_level(
        &mut self,
        cid: ControllerId,
        r: u16,
        mesh: &mut SubdivMesh,
    ) -> ControlResult<()> {
        let ctrl = self
            .controllers
            .get_mut(&cid)
            .ok_or(ControlError::UnknownController(cid))?;
        ctrl.res_level = r;
        let shape = ctrl.shape;
        let child = ctrl.child;
        if shape == ShapeKind::Point {
            return Ok(());
        }
        if r == 0 {
            if let Some(c) = child {
                self.remove_controller(c, false, mesh);
                if let Some(ctrl) = self.controllers.get_mut(&cid) {
                    ctrl.child = None;
                }
            }
            return Ok(());
        }
        let child = match child {
            Some(c) => c,
            None => self.produce_child(cid, mesh)?,
        };
        self.set_res_level(child, r - 1, mesh)
    }

    fn produce_child(
        &mut self,
        cid: ControllerId,
        mesh: &mut SubdivMesh,
    ) -> ControlResult<ControllerId> {
        let ctrl = self.controller(cid)?;
        let shape = ctrl.shape;
        let level = ctrl.level;
        let map = ctrl.map.boxed_clone();
        let strip = ctrl.verts.clone();
        let faces: Vec<FaceId> = ctrl.fmemes.keys().copied().collect();
        let edges: Vec<EdgeId> = ctrl.ememes.keys().copied().collect();
        let verts: Vec<VertId> = ctrl.vmemes.keys().copied().collect();

        let child_cid = self.add_controller(shape, level + 1, map);
        if let Some(c) = self.controllers.get_mut(&cid) {
            c.child = Some(child_cid);
        }
        if let Some(c) = self.controllers.get_mut(&child_cid) {
            c.parent = Some(cid);
        }
        debug!(parent = ?cid, child = ?child_cid, level, "produced child controller");

        for f in faces {
            mesh.allocate_subdiv_face(f)?;
        }
        for e in edges {
            mesh.allocate_subdiv_edge(e)?;
        }
        for v in verts {
            mesh.allocate_subdiv_vert(v)?;
        }
        // memes propagate while draining the allocation events
        self.pump(mesh);

        // order the child strip along the subdivision chain when one exists
        if let Some(chain) = mesh.subdiv_chain(&strip, 1) {
            if let Some(c) = self.controllers.get_mut(&child_cid) {
                let extras: Vec<VertId> = c
                    .verts
                    .iter()
                    .copied()
                    .filter(|v| !chain.contains(v))
                    .collect();
                let mut ordered: Vec<VertId> = chain
                    .into_iter()
                    .filter(|v| c.vmemes.contains_key(v))
                    .collect();
                ordered.extend(extras);
                c.verts = ordered;
            }
        }
        mesh.update();
        Ok(child_cid)
    }

    // ---- teardown ----

    /// Removes a controller chain from the registry, releasing memes and
    /// ownership slots but leaving the mesh untouched. Idempotent.
    pub fn release_controller(&mut self, cid: ControllerId, mesh: &mut SubdivMesh) {
        self.remove_controller(cid, false, mesh);
    }

    /// Tears down a controller chain and the mesh elements it owns:
    /// children first, then every simplex this controller is boss of is
    /// removed from the mesh (cascading through its subdivision subtree).
    /// Idempotent.
    pub fn delete_elements(&mut self, cid: ControllerId, mesh: &mut SubdivMesh) {
        self.remove_controller(cid, true, mesh);
    }

    fn remove_controller(&mut self, cid: ControllerId, delete_mesh: bool, mesh: &mut SubdivMesh) {
        if let Some(c) = self.controllers.get(&cid).and_then(|c| c.child) {
            self.remove_controller(c, delete_mesh, mesh);
        }
        let Some(ctrl) = self.controllers.remove(&cid) else {
            return;
        };
        let mut owned_verts = Vec::new();
        let mut owned_edges = Vec::new();
        let mut owned_faces = Vec::new();
        for &v in ctrl.vmemes.keys() {
            if self.release_slot(cid, SimplexId::Vert(v)) {
                owned_verts.push(v);
            }
        }
        for &e in ctrl.ememes.keys() {
            if self.release_slot(cid, SimplexId::Edge(e)) {
                owned_edges.push(e);
            }
        }
        for &f in ctrl.fmemes.keys() {
            if self.release_slot(cid, SimplexId::Face(f)) {
                owned_faces.push(f);
            }
        }
        if delete_mesh {
            debug!(controller = ?cid, verts = owned_verts.len(), "deleting owned elements");
            for f in owned_faces {
                let _ = mesh.remove_face(f);
            }
            for e in owned_edges {
                let _ = mesh.remove_edge(e);
            }
            for v in owned_verts {
                let _ = mesh.remove_vert(v);
            }
            self.pump(mesh);
        }
        if let Some(p) = ctrl.parent {
            if let Some(pc) = self.controllers.get_mut(&p) {
                if pc.child == Some(cid) {
                    pc.child = None;
                }
            }
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::map::{FixedPointMap, PolylineMap};
    use approx::assert_relative_eq;

    fn triangle_mesh() -> (SubdivMesh, [VertId; 3], FaceId) {
        let mut mesh = SubdivMesh::new();
        let a = mesh.add_vert(Point3::new(0.0, 0.0, 0.0));
        let b = mesh.add_vert(Point3::new(1.0, 0.0, 0.0));
        let c = mesh.add_vert(Point3::new(0.0, 1.0, 0.0));
        let f = mesh.add_face([a, b, c]).unwrap();
        (mesh, [a, b, c], f)
    }

    fn point_ctrl(set: &mut ControlSet, loc: Point3<f64>) -> ControllerId {
        set.add_controller(ShapeKind::Point, 0, Box::new(FixedPointMap { loc }))
    }

    #[test]
    fn test_single_boss_last_call_wins() {
        let (mesh, [a, _, _], _) = triangle_mesh();
        let mut set = ControlSet::new();
        let c1 = point_ctrl(&mut set, Point3::origin());
        let c2 = point_ctrl(&mut set, Point3::origin());
        set.attach_vert(c1, a, MapParam::None, &mesh).unwrap();
        set.attach_vert(c2, a, MapParam::None, &mesh).unwrap();
        assert_eq!(set.boss_of(SimplexId::Vert(a)), Some(c2));
        // both still watch
        assert_eq!(set.slot(SimplexId::Vert(a)).unwrap().watchers().len(), 2);
        // the demoted controller can take charge back
        set.take_charge(c1, SimplexId::Vert(a), &mesh);
        assert_eq!(set.boss_of(SimplexId::Vert(a)), Some(c1));
    }

    #[test]
    fn test_do_update_threshold_semantics() {
        let (mut mesh, [a, _, _], _) = triangle_mesh();
        let target = Point3::new(0.5, 0.5, 1.0);
        let mut set = ControlSet::new();
        let c = point_ctrl(&mut set, target);
        set.attach_vert(c, a, MapParam::None, &mesh).unwrap();

        // an infinite threshold never moves anything
        assert!(!set.do_update(c, a, f64::INFINITY, &mut mesh));
        assert_relative_eq!(mesh.vert(a).unwrap().loc(), Point3::origin());
        // but the candidate was still computed and cached
        assert_relative_eq!(
            set.controller(c).unwrap().vmeme(a).unwrap().update().unwrap(),
            target
        );

        // zero threshold applies the move exactly
        assert!(set.do_update(c, a, 0.0, &mut mesh));
        assert_relative_eq!(mesh.vert(a).unwrap().loc(), target);

        // once in place, no further motion
        assert!(!set.do_update(c, a, 0.0, &mut mesh));
    }

    #[test]
    fn test_disagreeing_non_boss_never_writes() {
        let (mut mesh, [a, _, _], _) = triangle_mesh();
        let mut set = ControlSet::new();
        let c1 = point_ctrl(&mut set, Point3::new(5.0, 0.0, 0.0));
        let c2 = point_ctrl(&mut set, Point3::new(-5.0, 0.0, 0.0));
        set.attach_vert(c1, a, MapParam::None, &mesh).unwrap();
        set.attach_vert(c2, a, MapParam::None, &mesh).unwrap();
        // c2 is boss; c1's update computes but does not write
        assert!(!set.do_update(c1, a, 0.0, &mut mesh));
        assert_relative_eq!(mesh.vert(a).unwrap().loc(), Point3::origin());
        assert!(set.do_update(c2, a, 0.0, &mut mesh));
        assert_relative_eq!(mesh.vert(a).unwrap().loc(), Point3::new(-5.0, 0.0, 0.0));
        // c1 disagrees with the boss, so it is not boss-like
        assert!(!set.tracks_boss(c1, a, &mesh));
        assert!(set.tracks_boss(c2, a, &mesh));
        // and its do_update still did not touch the vertex
        assert!(!set.do_update(c1, a, 0.0, &mut mesh));
        assert_relative_eq!(mesh.vert(a).unwrap().loc(), Point3::new(-5.0, 0.0, 0.0));
    }

    #[test]
    fn test_boss_like_meme_applies_update() {
        let (mut mesh, [a, _, _], _) = triangle_mesh();
        let near = Point3::new(0.5, 0.5, 1e-6);
        let target = Point3::new(0.5, 0.5, 0.0);
        let mut set = ControlSet::new();
        let c1 = point_ctrl(&mut set, near);
        let c2 = point_ctrl(&mut set, target);
        set.attach_vert(c1, a, MapParam::None, &mesh).unwrap();
        set.attach_vert(c2, a, MapParam::None, &mesh).unwrap();
        // c2 is boss and moves the vertex to its own candidate
        assert!(set.do_update(c2, a, 0.0, &mut mesh));
        assert_relative_eq!(mesh.vert(a).unwrap().loc(), target);
        // c1's candidate sits within the tracking band of the boss's, so
        // it is allowed to apply its (nearly identical) position
        assert!(set.do_update(c1, a, 0.0, &mut mesh));
        assert!(set.tracks_boss(c1, a, &mesh));
        assert_relative_eq!(mesh.vert(a).unwrap().loc(), near);
        // the boss is unchanged
        assert_eq!(set.boss_of(SimplexId::Vert(a)), Some(c2));
    }

    #[test]
    fn test_map_failure_is_silent() {
        let (mut mesh, [a, _, _], _) = triangle_mesh();
        let mut set = ControlSet::new();
        // polyline map fed a parameter kind it cannot use
        let c = set.add_controller(
            ShapeKind::Curve,
            0,
            Box::new(PolylineMap {
                pts: vec![Point3::origin(), Point3::new(1.0, 0.0, 0.0)],
            }),
        );
        set.attach_vert(c, a, MapParam::None, &mesh).unwrap();
        let before = mesh.vert(a).unwrap().loc();
        assert!(!set.do_update(c, a, 0.0, &mut mesh));
        assert_relative_eq!(mesh.vert(a).unwrap().loc(), before);
        assert!(set.controller(c).unwrap().vmeme(a).unwrap().update().is_none());
    }

    #[test]
    fn test_pump_removes_memes_of_dead_simplices() {
        let (mut mesh, [a, _, _], _) = triangle_mesh();
        let mut set = ControlSet::new();
        let c = point_ctrl(&mut set, Point3::origin());
        set.attach_vert(c, a, MapParam::None, &mesh).unwrap();
        mesh.remove_vert(a).unwrap();
        set.pump(&mut mesh);
        assert!(set.slot(SimplexId::Vert(a)).is_none());
        assert!(set.controller(c).unwrap().vmeme(a).is_none());
        assert!(set.controller(c).unwrap().verts().is_empty());
    }

    #[test]
    fn test_curve_res_level_builds_and_releases_chain() {
        let (mut mesh, [a, b, c], f) = triangle_mesh();
        let mut set = ControlSet::new();
        let curve = set.add_controller(
            ShapeKind::Curve,
            0,
            Box::new(PolylineMap {
                pts: vec![Point3::origin(), Point3::new(1.0, 0.0, 0.0)],
            }),
        );
        set.attach_vert(curve, a, MapParam::T(0.0), &mesh).unwrap();
        set.attach_vert(curve, b, MapParam::T(1.0), &mesh).unwrap();
        let e = mesh.lookup_edge(a, b).unwrap();
        set.attach_edge(curve, e, &mesh).unwrap();
        let _ = (c, f);

        set.set_res_level(curve, 1, &mut mesh).unwrap();
        let child = set.controller(curve).unwrap().child().unwrap();
        assert_eq!(set.controller(child).unwrap().level(), 1);
        // subdiv vertex of the managed edge got a meme with the mixed param
        let m = mesh.edge(e).unwrap().child_vert().unwrap();
        let meme = set.controller(child).unwrap().vmeme(m).unwrap();
        assert_eq!(meme.param(), MapParam::T(0.5));
        assert_eq!(set.boss_of(SimplexId::Vert(m)), Some(child));
        // strip runs child(a), mid, child(b)
        assert_eq!(set.controller(child).unwrap().verts().len(), 3);

        set.set_res_level(curve, 0, &mut mesh).unwrap();
        assert!(set.controller(curve).unwrap().child().is_none());
        assert!(set.controller(child).is_err());
        assert!(set.boss_of(SimplexId::Vert(m)).is_none());
    }

    #[test]
    fn test_point_res_level_is_scalar_only() {
        let (mut mesh, [a, _, _], _) = triangle_mesh();
        let mut set = ControlSet::new();
        let c = point_ctrl(&mut set, Point3::origin());
        set.attach_vert(c, a, MapParam::None, &mesh).unwrap();
        set.set_res_level(c, 3, &mut mesh).unwrap();
        assert_eq!(set.controller(c).unwrap().res_level(), 3);
        assert!(set.controller(c).unwrap().child().is_none());
    }

    #[test]
    fn test_delete_elements_removes_owned_verts() {
        let (mut mesh, [a, _, _], _) = triangle_mesh();
        let mut set = ControlSet::new();
        let c = point_ctrl(&mut set, Point3::origin());
        set.attach_vert(c, a, MapParam::None, &mesh).unwrap();
        set.delete_elements(c, &mut mesh);
        assert!(mesh.vert(a).is_err());
        assert!(set.controller(c).is_err());
        // idempotent
        set.delete_elements(c, &mut mesh);
    }

    #[test]
    fn test_sterile_parent_yields_demoted_child_meme() {
        let (mut mesh, [a, b, _], _) = triangle_mesh();
        let mut set = ControlSet::new();
        let curve = set.add_controller(
            ShapeKind::Curve,
            0,
            Box::new(PolylineMap {
                pts: vec![Point3::origin(), Point3::new(1.0, 0.0, 0.0)],
            }),
        );
        set.attach_vert(curve, a, MapParam::T(0.0), &mesh).unwrap();
        set.attach_vert(curve, b, MapParam::T(1.0), &mesh).unwrap();
        let e = mesh.lookup_edge(a, b).unwrap();
        set.attach_edge(curve, e, &mesh).unwrap();
        set.set_sterile(curve, a, true);

        set.set_res_level(curve, 1, &mut mesh).unwrap();
        let child = set.controller(curve).unwrap().child().unwrap();
        let m = mesh.edge(e).unwrap().child_vert().unwrap();
        // the child meme exists but is sterile and unbossed
        let meme = set.controller(child).unwrap().vmeme(m).unwrap();
        assert!(meme.is_sterile());
        assert_ne!(set.boss_of(SimplexId::Vert(m)), Some(child));
    }

    #[test]
    fn test_suppressed_notifications_skip_propagation() {
        let (mut mesh, [a, b, _], _) = triangle_mesh();
        let mut set = ControlSet::new();
        let curve = set.add_controller(
            ShapeKind::Curve,
            0,
            Box::new(PolylineMap {
                pts: vec![Point3::origin(), Point3::new(1.0, 0.0, 0.0)],
            }),
        );
        set.attach_vert(curve, a, MapParam::T(0.0), &mesh).unwrap();
        set.attach_vert(curve, b, MapParam::T(1.0), &mesh).unwrap();
        let e = mesh.lookup_edge(a, b).unwrap();
        set.attach_edge(curve, e, &mesh).unwrap();

        // allocate with notifications off
        set.suppress_notifications(true);
        mesh.allocate_subdiv_edge(e).unwrap();
        set.pump(&mut mesh);
        let m = mesh.edge(e).unwrap().child_vert().unwrap();
        assert!(set.slot(SimplexId::Vert(m)).is_none());
        set.suppress_notifications(false);
    }

    #[test]
    fn test_tick_grows_cold_on_converged_strip() {
        let (mut mesh, [a, _, _], _) = triangle_mesh();
        // isolated vertex with no neighbors never relaxes
        let mut set = ControlSet::new();
        let c = point_ctrl(&mut set, Point3::origin());
        set.attach_vert(c, a, MapParam::None, &mesh).unwrap();
        // a has neighbors, so it moves toward the centroid at first
        let moved = set.tick(c, &mut mesh);
        assert_eq!(moved, 1);
        // pinned memes sit still
        set.set_pinned(c, a, true);
        assert_eq!(set.tick(c, &mut mesh), 0);
    }
}
