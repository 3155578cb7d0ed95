//! Error types for subdivision hierarchy operations.

use thiserror::Error;

use crate::id::{FaceId, SimplexId, VertId};

/// Errors that can occur while operating on a subdivision mesh.
#[derive(Debug, Error)]
pub enum SubdivError {
    /// A barycentric coordinate component was negative.
    #[error("Barycentric component {component} is negative: {value}")]
    InvalidCoordinate {
        /// Index of the offending component (0..3).
        component: usize,
        /// The negative value.
        value: f64,
    },

    /// A handle referenced a deleted or never-allocated slot.
    #[error("Simplex {0:?} is dead or out of bounds")]
    DeadSimplex(SimplexId),

    /// A face at the control level has no parent to map coordinates into.
    #[error("Face {0:?} has no parent")]
    NoParent(FaceId),

    /// A face has not allocated its subdivision children.
    #[error("Face {0:?} has no subdivision children")]
    NotSubdivided(FaceId),

    /// An edge or face would be degenerate (repeated vertices).
    #[error("Degenerate simplex: repeated vertex {0:?}")]
    Degenerate(VertId),

    /// Two consecutive chain vertices are not joined by an edge.
    #[error("No edge joins {0:?} and {1:?}")]
    MissingEdge(VertId, VertId),

    /// Simplices from different levels were combined.
    #[error("Level mismatch: {0} vs. {1}")]
    LevelMismatch(u16, u16),
}

/// Result type for subdivision operations.
pub type SubdivResult<T> = std::result::Result<T, SubdivError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = SubdivError::InvalidCoordinate {
            component: 1,
            value: -0.25,
        };
        let display = format!("{err}");
        assert!(display.contains("1"));
        assert!(display.contains("-0.25"));

        let err = SubdivError::MissingEdge(VertId::new(0, 1), VertId::new(0, 2));
        assert!(format!("{err}").contains("edge"));

        let err = SubdivError::NoParent(FaceId::new(0, 0));
        assert!(format!("{err}").contains("parent"));
    }
}
