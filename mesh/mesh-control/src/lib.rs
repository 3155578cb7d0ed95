//! Controllers and memes over the subdivision hierarchy.
//!
//! Each connected piece of a model (a point, a curve strip, a surface
//! region) is managed by a [`Controller`] at one mesh level. A controller's
//! stake in an individual simplex is a *meme*; the [`ControlSet`] registry
//! arbitrates which controller is the boss of each simplex, and only the
//! boss writes positions. Geometry comes from an injected [`GeometryMap`]
//! strategy, so the same controller machinery serves fixed points,
//! polylines, and surface patches.
//!
//! Mesh changes flow back through the event pump: controllers react to
//! moved vertices, dropped simplices, and freshly allocated subdivision
//! children by waking, discarding, or propagating memes.
//!
//! # Examples
//!
//! ```
//! use mesh_control::{ControlSet, FixedPointMap, MapParam, ShapeKind};
//! use mesh_subdiv::{Point3, SubdivMesh};
//!
//! let mut mesh = SubdivMesh::new();
//! let a = mesh.add_vert(Point3::origin());
//! let b = mesh.add_vert(Point3::new(1.0, 0.0, 0.0));
//! let c = mesh.add_vert(Point3::new(0.0, 1.0, 0.0));
//! mesh.add_face([a, b, c])?;
//!
//! let mut set = ControlSet::new();
//! let target = Point3::new(0.0, 0.0, 1.0);
//! let ctrl = set.add_controller(ShapeKind::Point, 0, Box::new(FixedPointMap { loc: target }));
//! set.attach_vert(ctrl, a, MapParam::None, &mesh)?;
//!
//! set.do_update(ctrl, a, 0.0, &mut mesh);
//! assert_eq!(mesh.vert(a)?.loc(), target);
//! # Ok::<(), mesh_control::ControlError>(())
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]
#![allow(clippy::cast_precision_loss)]
#![allow(clippy::missing_panics_doc)]
#![allow(clippy::module_name_repetitions)]

mod error;
mod map;
mod meme;
mod persist;
mod set;

pub use error::{ControlError, ControlResult};
pub use map::{average_params, FixedPointMap, GeometryMap, MapParam, PlaneMap, PolylineMap};
pub use meme::{EdgeMeme, FaceMeme, VertMeme, BOSS_TRACK_FACTOR, MAX_COLD_COUNT};
pub use persist::{capture_all, ControllerRecord};
pub use set::{ControlSet, Controller, ControllerId, ShapeKind, SimplexSlot};
