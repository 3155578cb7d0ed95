//! Stable handles for simplices in the subdivision hierarchy.
//!
//! A handle is a `(level, index)` pair into per-level arenas. Freed slots are
//! never reused within a session, so a stale handle can only ever name a dead
//! slot, never a different element.

/// Handle to a vertex.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct VertId {
    level: u16,
    index: u32,
}

/// Handle to an edge.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct EdgeId {
    level: u16,
    index: u32,
}

/// Handle to a face.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct FaceId {
    level: u16,
    index: u32,
}

macro_rules! impl_id {
    ($name:ident) => {
        impl $name {
            /// Creates a handle from a subdivision level and arena index.
            #[inline]
            #[must_use]
            pub const fn new(level: u16, index: u32) -> Self {
                Self { level, index }
            }

            /// Subdivision level this handle points into (0 = control mesh).
            #[inline]
            #[must_use]
            pub const fn level(self) -> u16 {
                self.level
            }

            /// Arena index within the level.
            #[inline]
            #[must_use]
            pub const fn index(self) -> u32 {
                self.index
            }
        }
    };
}

impl_id!(VertId);
impl_id!(EdgeId);
impl_id!(FaceId);

/// Handle to any simplex (vertex, edge, or face).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum SimplexId {
    /// A vertex.
    Vert(VertId),
    /// An edge.
    Edge(EdgeId),
    /// A face.
    Face(FaceId),
}

impl SimplexId {
    /// Subdivision level of the referenced simplex.
    #[must_use]
    pub const fn level(self) -> u16 {
        match self {
            Self::Vert(v) => v.level(),
            Self::Edge(e) => e.level(),
            Self::Face(f) => f.level(),
        }
    }

    /// Returns the vertex handle if this is a vertex.
    #[must_use]
    pub const fn as_vert(self) -> Option<VertId> {
        match self {
            Self::Vert(v) => Some(v),
            _ => None,
        }
    }

    /// Returns the edge handle if this is an edge.
    #[must_use]
    pub const fn as_edge(self) -> Option<EdgeId> {
        match self {
            Self::Edge(e) => Some(e),
            _ => None,
        }
    }

    /// Returns the face handle if this is a face.
    #[must_use]
    pub const fn as_face(self) -> Option<FaceId> {
        match self {
            Self::Face(f) => Some(f),
            _ => None,
        }
    }
}

impl From<VertId> for SimplexId {
    fn from(v: VertId) -> Self {
        Self::Vert(v)
    }
}

impl From<EdgeId> for SimplexId {
    fn from(e: EdgeId) -> Self {
        Self::Edge(e)
    }
}

impl From<FaceId> for SimplexId {
    fn from(f: FaceId) -> Self {
        Self::Face(f)
    }
}
