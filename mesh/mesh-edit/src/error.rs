//! Error types for the command layer.

use thiserror::Error;

/// Errors raised while constructing or validating edit commands.
#[derive(Debug, Error)]
pub enum EditError {
    /// Two seam chains differ in vertex count.
    #[error("Seam chains differ in length: {0} vs. {1}")]
    ChainMismatch(usize, usize),

    /// One seam chain is closed and the other open.
    #[error("Seam chains mix closed and open topology")]
    MixedChainTypes,

    /// Open seam chains must already share both endpoint vertices.
    #[error("Open seam chains do not share endpoints")]
    OpenChainEndpoints,

    /// Parallel vertex and target lists disagree in length.
    #[error("List lengths not equal: {verts} verts vs. {targets} targets")]
    ListLengthMismatch {
        /// Vertex count.
        verts: usize,
        /// Target position count.
        targets: usize,
    },

    /// A sequence of vertices is not connected by edges.
    #[error("Vertices do not form a chain")]
    NotAChain,
}

/// Result type for command-layer operations.
pub type EditResult<T> = std::result::Result<T, EditError>;
