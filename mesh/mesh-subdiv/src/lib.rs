//! Loop subdivision hierarchy with stable handles.
//!
//! This crate provides the storage layer for multiresolution triangle
//! meshes:
//!
//! - **Simplex hierarchy**: faces refine 1-to-4, edges gain subdivision
//!   vertices, all tracked with idempotent allocate/delete and explicit
//!   validity bits
//! - **Barycentric mapping**: exact coordinate transport between levels via
//!   fixed per-child matrices
//! - **Detail offsets**: scalar displacements along parent normals, fitted
//!   from world-space targets and replayed on every update
//!
//! Handles are `(level, index)` pairs; freed slots are never reused, so a
//! stale handle reports [`SubdivError::DeadSimplex`] instead of aliasing.
//!
//! # Examples
//!
//! ```
//! use mesh_subdiv::{Point3, SubdivMesh};
//!
//! let mut mesh = SubdivMesh::new();
//! let a = mesh.add_vert(Point3::new(0.0, 0.0, 0.0));
//! let b = mesh.add_vert(Point3::new(1.0, 0.0, 0.0));
//! let c = mesh.add_vert(Point3::new(0.0, 1.0, 0.0));
//! let f = mesh.add_face([a, b, c])?;
//!
//! // one refinement: 4 child faces, 6 child verts
//! mesh.allocate_subdiv_face(f)?;
//! mesh.update();
//! assert_eq!(mesh.faces_at(1).len(), 4);
//! assert_eq!(mesh.verts_at(1).len(), 6);
//! # Ok::<(), mesh_subdiv::SubdivError>(())
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]
#![allow(clippy::cast_possible_truncation)]
#![allow(clippy::cast_precision_loss)]
#![allow(clippy::missing_panics_doc)]

mod bary;
mod elements;
mod error;
mod events;
mod id;
mod mesh;

pub use bary::BaryCoord;
pub use elements::{Edge, Face, Vert};
pub use error::{SubdivError, SubdivResult};
pub use events::MeshEvent;
pub use id::{EdgeId, FaceId, SimplexId, VertId};
pub use mesh::SubdivMesh;

// Re-export nalgebra types for convenience
pub use nalgebra::{Matrix3, Point3, Vector3};
