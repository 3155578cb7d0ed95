//! Error types for the control layer.

use thiserror::Error;

use crate::set::ControllerId;

/// Errors that can occur in controller and meme operations.
#[derive(Debug, Error)]
pub enum ControlError {
    /// A controller id was not in the registry.
    #[error("Unknown controller {0:?}")]
    UnknownController(ControllerId),

    /// A persisted record referenced simplices that no longer exist.
    #[error("Record names a dead simplex at position {0}")]
    RecordMismatch(usize),

    /// A record's parallel lists disagree in length.
    #[error("Record lists not equal: {verts} verts vs. {params} params")]
    RecordListMismatch {
        /// Vertex handle count.
        verts: usize,
        /// Map parameter count.
        params: usize,
    },

    /// An underlying mesh operation failed.
    #[error(transparent)]
    Mesh(#[from] mesh_subdiv::SubdivError),
}

/// Result type for control-layer operations.
pub type ControlResult<T> = std::result::Result<T, ControlError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = ControlError::UnknownController(ControllerId::from_raw(3));
        assert!(format!("{err}").contains("3"));

        let err = ControlError::RecordListMismatch { verts: 4, params: 2 };
        let display = format!("{err}");
        assert!(display.contains("4"));
        assert!(display.contains("2"));
    }
}
