//! Structural change notifications.
//!
//! The mesh records events as it mutates; interested layers drain them with
//! [`SubdivMesh::take_events`](crate::SubdivMesh::take_events) at well-defined
//! points. Single-threaded, so delivery order matches mutation order.

use crate::id::{SimplexId, VertId};

/// A structural or geometric change recorded by the mesh.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MeshEvent {
    /// A vertex position was set explicitly.
    VertMoved(VertId),
    /// A simplex was removed; its handle is dead.
    SimplexDeleted(SimplexId),
    /// The named simplex allocated its subdivision children.
    SubdivAllocated(SimplexId),
}
