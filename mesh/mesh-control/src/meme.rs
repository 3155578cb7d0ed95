//! Per-simplex meme records.
//!
//! A meme is one controller's stake in one simplex. At most one meme per
//! simplex is the boss (arbitrated by the
//! [`ControlSet`](crate::ControlSet)); the rest watch. Vertex memes carry
//! the map parameter and a hot/cold counter: a meme that keeps failing to
//! move goes cold and drops out of relaxation until something wakes it.

use nalgebra::Point3;

use crate::map::MapParam;

/// Cold counter ceiling; a meme at this count sits out relaxation ticks.
pub const MAX_COLD_COUNT: u8 = 8;

/// A non-boss meme counts as boss-like when its candidate agrees with the
/// boss's within this fraction of the local average edge length.
pub const BOSS_TRACK_FACTOR: f64 = 0.1;

/// A controller's stake in a vertex.
#[derive(Debug, Clone)]
pub struct VertMeme {
    pub(crate) param: MapParam,
    pub(crate) update: Option<Point3<f64>>,
    pub(crate) sterile: bool,
    pub(crate) pinned: bool,
    pub(crate) cold_count: u8,
}

impl VertMeme {
    pub(crate) fn new(param: MapParam) -> Self {
        Self {
            param,
            update: None,
            sterile: false,
            pinned: false,
            cold_count: 0,
        }
    }

    /// The map parameter.
    #[inline]
    #[must_use]
    pub fn param(&self) -> MapParam {
        self.param
    }

    /// Last computed candidate position, if any computation succeeded.
    #[inline]
    #[must_use]
    pub fn update(&self) -> Option<Point3<f64>> {
        self.update
    }

    /// A sterile meme never propagates to subdivision children.
    #[inline]
    #[must_use]
    pub fn is_sterile(&self) -> bool {
        self.sterile
    }

    /// A pinned meme is excluded from relaxation.
    #[inline]
    #[must_use]
    pub fn is_pinned(&self) -> bool {
        self.pinned
    }

    /// True once the cold counter has reached [`MAX_COLD_COUNT`].
    #[inline]
    #[must_use]
    pub fn is_cold(&self) -> bool {
        self.cold_count >= MAX_COLD_COUNT
    }

    /// Current cold count.
    #[inline]
    #[must_use]
    pub fn cold_count(&self) -> u8 {
        self.cold_count
    }

    pub(crate) fn set_hot(&mut self) {
        self.cold_count = 0;
    }

    pub(crate) fn grow_cold(&mut self) {
        self.cold_count = (self.cold_count + 1).min(MAX_COLD_COUNT);
    }
}

/// A controller's stake in an edge.
#[derive(Debug, Clone)]
pub struct EdgeMeme {
    pub(crate) sterile: bool,
}

impl EdgeMeme {
    pub(crate) fn new() -> Self {
        Self { sterile: false }
    }

    /// A sterile meme never propagates to subdivision children.
    #[inline]
    #[must_use]
    pub fn is_sterile(&self) -> bool {
        self.sterile
    }
}

/// A controller's stake in a face.
#[derive(Debug, Clone)]
pub struct FaceMeme {
    pub(crate) sterile: bool,
}

impl FaceMeme {
    pub(crate) fn new() -> Self {
        Self { sterile: false }
    }

    /// A sterile meme never propagates to subdivision children.
    #[inline]
    #[must_use]
    pub fn is_sterile(&self) -> bool {
        self.sterile
    }
}
