//! Simplex records stored in the per-level arenas.
//!
//! Records carry topology, hierarchy links (parent one level up, child one
//! level down), and the scalar detail offset applied along the parent normal.
//! Sharpness values (`crease` on edges, `corner` on vertices) decrement by
//! one per generated level; `u16::MAX` means permanently sharp.

use nalgebra::Point3;

use crate::id::{EdgeId, FaceId, SimplexId, VertId};

/// A vertex of the subdivision hierarchy.
#[derive(Debug, Clone)]
pub struct Vert {
    pub(crate) loc: Point3<f64>,
    pub(crate) edges: Vec<EdgeId>,
    pub(crate) parent: Option<SimplexId>,
    pub(crate) child: Option<VertId>,
    pub(crate) offset: f64,
    pub(crate) corner: u16,
    pub(crate) subdiv_allocated: bool,
    pub(crate) dirty: bool,
}

impl Vert {
    pub(crate) fn new(loc: Point3<f64>) -> Self {
        Self {
            loc,
            edges: Vec::new(),
            parent: None,
            child: None,
            offset: 0.0,
            corner: 0,
            subdiv_allocated: false,
            dirty: false,
        }
    }

    /// Current position.
    #[inline]
    #[must_use]
    pub fn loc(&self) -> Point3<f64> {
        self.loc
    }

    /// Adjacent edges.
    #[inline]
    #[must_use]
    pub fn edges(&self) -> &[EdgeId] {
        &self.edges
    }

    /// Number of adjacent edges.
    #[inline]
    #[must_use]
    pub fn valence(&self) -> usize {
        self.edges.len()
    }

    /// The vertex or edge one level up that generated this vertex.
    /// `None` for control-mesh vertices.
    #[inline]
    #[must_use]
    pub fn parent(&self) -> Option<SimplexId> {
        self.parent
    }

    /// Subdivision vertex one level down, if allocated.
    #[inline]
    #[must_use]
    pub fn child(&self) -> Option<VertId> {
        self.child
    }

    /// Scalar detail offset along the parent normal.
    #[inline]
    #[must_use]
    pub fn offset(&self) -> f64 {
        self.offset
    }

    /// Corner sharpness. Zero means smooth.
    #[inline]
    #[must_use]
    pub fn corner(&self) -> u16 {
        self.corner
    }
}

/// An edge of the subdivision hierarchy.
#[derive(Debug, Clone)]
pub struct Edge {
    pub(crate) v: [VertId; 2],
    pub(crate) f: [Option<FaceId>; 2],
    pub(crate) weak: bool,
    pub(crate) crease: u16,
    pub(crate) parent: Option<SimplexId>,
    pub(crate) child_vert: Option<VertId>,
    pub(crate) subdiv_allocated: bool,
}

impl Edge {
    pub(crate) fn new(a: VertId, b: VertId) -> Self {
        Self {
            v: [a, b],
            f: [None, None],
            weak: false,
            crease: 0,
            parent: None,
            child_vert: None,
            subdiv_allocated: false,
        }
    }

    /// Endpoint vertices.
    #[inline]
    #[must_use]
    pub fn verts(&self) -> [VertId; 2] {
        self.v
    }

    /// Adjacent face slots.
    #[inline]
    #[must_use]
    pub fn faces(&self) -> [Option<FaceId>; 2] {
        self.f
    }

    /// Number of adjacent faces (0, 1, or 2).
    #[must_use]
    pub fn face_count(&self) -> usize {
        self.f.iter().filter(|s| s.is_some()).count()
    }

    /// True if fewer than two faces are attached.
    #[must_use]
    pub fn is_boundary(&self) -> bool {
        self.face_count() < 2
    }

    /// True for quad-diagonal edges that do not bound the quad layout.
    #[inline]
    #[must_use]
    pub fn is_weak(&self) -> bool {
        self.weak
    }

    /// Variable-sharpness crease value. Zero means smooth.
    #[inline]
    #[must_use]
    pub fn crease(&self) -> u16 {
        self.crease
    }

    /// The edge or face one level up that generated this edge.
    #[inline]
    #[must_use]
    pub fn parent(&self) -> Option<SimplexId> {
        self.parent
    }

    /// The vertex this edge generated at the next level, if allocated.
    #[inline]
    #[must_use]
    pub fn child_vert(&self) -> Option<VertId> {
        self.child_vert
    }

    /// True if `v` is one of the endpoints.
    #[must_use]
    pub fn contains(&self, v: VertId) -> bool {
        self.v[0] == v || self.v[1] == v
    }

    /// The endpoint opposite `v`, if `v` is an endpoint.
    #[must_use]
    pub fn other_vert(&self, v: VertId) -> Option<VertId> {
        if self.v[0] == v {
            Some(self.v[1])
        } else if self.v[1] == v {
            Some(self.v[0])
        } else {
            None
        }
    }
}

/// A triangular face of the subdivision hierarchy.
///
/// Edge slot `k` joins vertex `k` to vertex `(k + 1) % 3`.
#[derive(Debug, Clone)]
pub struct Face {
    pub(crate) v: [VertId; 3],
    pub(crate) e: [EdgeId; 3],
    pub(crate) parent: Option<FaceId>,
    pub(crate) subdiv_allocated: bool,
}

impl Face {
    /// Corner vertices in winding order.
    #[inline]
    #[must_use]
    pub fn verts(&self) -> [VertId; 3] {
        self.v
    }

    /// Boundary edges; slot `k` joins `verts()[k]` to `verts()[(k + 1) % 3]`.
    #[inline]
    #[must_use]
    pub fn edges(&self) -> [EdgeId; 3] {
        self.e
    }

    /// The face one level up that generated this face.
    #[inline]
    #[must_use]
    pub fn parent(&self) -> Option<FaceId> {
        self.parent
    }

    /// True once the four subdivision children exist.
    #[inline]
    #[must_use]
    pub fn is_subdivided(&self) -> bool {
        self.subdiv_allocated
    }

    /// True if `v` is a corner of this face.
    #[must_use]
    pub fn contains_vert(&self, v: VertId) -> bool {
        self.v.contains(&v)
    }

    /// True if `e` is a boundary edge of this face.
    #[must_use]
    pub fn contains_edge(&self, e: EdgeId) -> bool {
        self.e.contains(&e)
    }

    /// The corner not touched by edge slot `k`.
    #[must_use]
    pub fn opposite_vert(&self, k: usize) -> VertId {
        self.v[(k + 2) % 3]
    }
}

/// Decrements a sharpness value one generation, keeping `u16::MAX` pinned.
pub(crate) fn dec_sharpness(s: u16) -> u16 {
    if s == u16::MAX {
        s
    } else {
        s.saturating_sub(1)
    }
}
