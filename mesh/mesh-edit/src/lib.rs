//! Undoable editing commands for subdivision control meshes.
//!
//! Every mutation is a [`Command`] with `doit`/`undoit` and an explicit
//! state, so an application-level undo stack can compose, replay, and
//! reverse edits without knowing their internals. Atomic primitives swap
//! one reference at a time (a face corner, an edge slot, an edge
//! endpoint, a child pointer); the composites build phase-ordered lists
//! of primitives on first execution and replay them afterwards:
//!
//! - [`JoinSeamCmd`] merges one vertex chain onto another, leaving the old
//!   chain dangling for undo
//! - [`FitVertsCmd`] drives vertices to world-space targets,
//!   ancestor-first, absorbing residuals into detail offsets
//! - [`SubdivOffsetCmd`] sculpts scalar offsets along subdivision normals,
//!   correcting child requests for base drift
//!
//! # Examples
//!
//! ```
//! use mesh_control::ControlSet;
//! use mesh_edit::{Command, EditCtx, MoveVertCmd};
//! use mesh_subdiv::{Point3, SubdivMesh};
//!
//! let mut mesh = SubdivMesh::new();
//! let v = mesh.add_vert(Point3::origin());
//! let mut controls = ControlSet::new();
//! let mut ctx = EditCtx::new(&mut mesh, &mut controls);
//!
//! let mut cmd = MoveVertCmd::new(v, Point3::new(1.0, 0.0, 0.0));
//! assert!(cmd.doit(&mut ctx));
//! assert!(cmd.undoit(&mut ctx));
//! assert_eq!(mesh.vert(v)?.loc(), Point3::origin());
//! # Ok::<(), mesh_subdiv::SubdivError>(())
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]
#![allow(clippy::missing_panics_doc)]
#![allow(clippy::module_name_repetitions)]

mod command;
mod error;
mod fit;
mod primitives;
mod seam;

pub use command::{CmdState, Command, EditCtx, MultiCmd};
pub use error::{EditError, EditResult};
pub use fit::{FitVertsCmd, SubdivOffsetCmd};
pub use primitives::{
    CreaseIncCmd, MoveVertCmd, RedefEdgeCmd, RedefFaceECmd, RedefFaceVCmd, ReparentCmd,
};
pub use seam::JoinSeamCmd;
