//! Barycentric coordinate mapping between subdivision levels.
//!
//! A point on a face is a weight triple over the face's corners. Because the
//! four children of a face tile it in a fixed pattern, mapping a triple one
//! level down (or up) is a constant 3x3 matrix per child. The child matrices
//! here assume the vertex orderings produced by
//! [`SubdivMesh::allocate_subdiv_face`](crate::SubdivMesh::allocate_subdiv_face):
//! corner child `k` is `[cv_k, m_k, m_(k+2)]` and the center child is
//! `[m_1, m_2, m_0]`, where `cv` are corner children and `m` are edge
//! midpoints.

use nalgebra::{Matrix3, Vector3};

use crate::error::{SubdivError, SubdivResult};
use crate::id::FaceId;
use crate::mesh::SubdivMesh;

/// Barycentric weights over a face's three corners. Components sum to 1.
pub type BaryCoord = Vector3<f64>;

/// Child-to-parent maps, indexed corner children 0..3 then center.
/// Column `j` is the parent-space coordinate of child corner `j`.
const CHILD_TO_PARENT: [Matrix3<f64>; 4] = [
    Matrix3::new(
        1.0, 0.5, 0.5, //
        0.0, 0.5, 0.0, //
        0.0, 0.0, 0.5,
    ),
    Matrix3::new(
        0.5, 0.0, 0.0, //
        0.5, 1.0, 0.5, //
        0.0, 0.0, 0.5,
    ),
    Matrix3::new(
        0.5, 0.0, 0.0, //
        0.0, 0.5, 0.0, //
        0.5, 0.5, 1.0,
    ),
    Matrix3::new(
        0.0, 0.5, 0.5, //
        0.5, 0.0, 0.5, //
        0.5, 0.5, 0.0,
    ),
];

/// Parent-to-child maps: exact inverses of [`CHILD_TO_PARENT`].
const PARENT_TO_CHILD: [Matrix3<f64>; 4] = [
    Matrix3::new(
        1.0, -1.0, -1.0, //
        0.0, 2.0, 0.0, //
        0.0, 0.0, 2.0,
    ),
    Matrix3::new(
        2.0, 0.0, 0.0, //
        -1.0, 1.0, -1.0, //
        0.0, 0.0, 2.0,
    ),
    Matrix3::new(
        2.0, 0.0, 0.0, //
        0.0, 2.0, 0.0, //
        -1.0, -1.0, 1.0,
    ),
    Matrix3::new(
        -1.0, 1.0, 1.0, //
        1.0, -1.0, 1.0, //
        1.0, 1.0, -1.0,
    ),
];

fn validate(bc: BaryCoord) -> SubdivResult<()> {
    for (component, &value) in bc.iter().enumerate() {
        if value < 0.0 {
            return Err(SubdivError::InvalidCoordinate { component, value });
        }
    }
    Ok(())
}

/// Which child a parent-space coordinate falls in: a corner child when that
/// corner's weight reaches 0.5, the center child otherwise.
fn classify(bc: BaryCoord) -> usize {
    if bc.x >= 0.5 {
        0
    } else if bc.y >= 0.5 {
        1
    } else if bc.z >= 0.5 {
        2
    } else {
        3
    }
}

impl SubdivMesh {
    /// Maps a coordinate on `f` one level down, returning the child face it
    /// lands in and the coordinate over that child.
    ///
    /// # Errors
    /// [`SubdivError::InvalidCoordinate`] on a negative component,
    /// [`SubdivError::NotSubdivided`] when `f` has no children.
    pub fn child_bc(&self, f: FaceId, bc: BaryCoord) -> SubdivResult<(FaceId, BaryCoord)> {
        validate(bc)?;
        let children = self.child_faces(f)?;
        let k = classify(bc);
        Ok((children[k], PARENT_TO_CHILD[k] * bc))
    }

    /// Maps a coordinate on `f` one level up, returning the parent face and
    /// the coordinate over it.
    ///
    /// # Errors
    /// [`SubdivError::InvalidCoordinate`] on a negative component,
    /// [`SubdivError::NoParent`] for control-level faces.
    pub fn parent_bc(&self, f: FaceId, bc: BaryCoord) -> SubdivResult<(FaceId, BaryCoord)> {
        validate(bc)?;
        let parent = self.face(f)?.parent().ok_or(SubdivError::NoParent(f))?;
        let children = self.child_faces(parent)?;
        let k = children
            .iter()
            .position(|&c| c == f)
            .ok_or(SubdivError::NotSubdivided(parent))?;
        Ok((parent, CHILD_TO_PARENT[k] * bc))
    }

    /// Walks a coordinate toward `level`, stopping early where the hierarchy
    /// ends: at the control mesh going up, at the deepest allocated child
    /// going down. Returns the face and coordinate actually reached.
    ///
    /// # Errors
    /// [`SubdivError::InvalidCoordinate`] on a negative component.
    pub fn bc_to_level(
        &self,
        f: FaceId,
        bc: BaryCoord,
        level: u16,
    ) -> SubdivResult<(FaceId, BaryCoord)> {
        validate(bc)?;
        let mut cur = (f, bc);
        while cur.0.level() > level {
            match self.parent_bc(cur.0, cur.1) {
                Ok(up) => cur = up,
                Err(SubdivError::NoParent(_)) => break,
                Err(e) => return Err(e),
            }
        }
        while cur.0.level() < level {
            match self.child_bc(cur.0, cur.1) {
                Ok(down) => cur = down,
                Err(SubdivError::NotSubdivided(_)) => break,
                Err(e) => return Err(e),
            }
        }
        Ok(cur)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use nalgebra::Point3;

    #[test]
    fn test_matrices_are_mutual_inverses() {
        for k in 0..4 {
            let prod = PARENT_TO_CHILD[k] * CHILD_TO_PARENT[k];
            assert_relative_eq!(prod, Matrix3::identity(), epsilon = 1e-15);
        }
    }

    #[test]
    fn test_matrices_preserve_weight_sum() {
        let bc = BaryCoord::new(0.2, 0.3, 0.5);
        for k in 0..4 {
            let down = PARENT_TO_CHILD[k] * bc;
            assert_relative_eq!(down.sum(), 1.0, epsilon = 1e-15);
            let up = CHILD_TO_PARENT[k] * bc;
            assert_relative_eq!(up.sum(), 1.0, epsilon = 1e-15);
        }
    }

    #[test]
    fn test_classify_children() {
        assert_eq!(classify(BaryCoord::new(1.0, 0.0, 0.0)), 0);
        assert_eq!(classify(BaryCoord::new(0.1, 0.6, 0.3)), 1);
        assert_eq!(classify(BaryCoord::new(0.2, 0.2, 0.6)), 2);
        let third = 1.0 / 3.0;
        assert_eq!(classify(BaryCoord::new(third, third, third)), 3);
    }

    fn subdivided_triangle() -> (SubdivMesh, FaceId) {
        let mut mesh = SubdivMesh::new();
        let a = mesh.add_vert(Point3::new(0.0, 0.0, 0.0));
        let b = mesh.add_vert(Point3::new(1.0, 0.0, 0.0));
        let c = mesh.add_vert(Point3::new(0.0, 1.0, 0.0));
        let f = mesh.add_face([a, b, c]).unwrap();
        mesh.allocate_subdiv_face(f).unwrap();
        (mesh, f)
    }

    #[test]
    fn test_round_trip_identity() {
        let (mesh, f) = subdivided_triangle();
        for bc in [
            BaryCoord::new(0.7, 0.2, 0.1),
            BaryCoord::new(0.1, 0.8, 0.1),
            BaryCoord::new(0.05, 0.15, 0.8),
            BaryCoord::new(0.3, 0.3, 0.4),
        ] {
            let (child, down) = mesh.child_bc(f, bc).unwrap();
            let (parent, up) = mesh.parent_bc(child, down).unwrap();
            assert_eq!(parent, f);
            assert_relative_eq!(up, bc, epsilon = 1e-14);
        }
    }

    #[test]
    fn test_negative_component_rejected() {
        let (mesh, f) = subdivided_triangle();
        let err = mesh.child_bc(f, BaryCoord::new(1.2, -0.1, -0.1));
        assert!(matches!(
            err,
            Err(SubdivError::InvalidCoordinate { component: 1, .. })
        ));
    }

    #[test]
    fn test_unsubdivided_face_rejected() {
        let mut mesh = SubdivMesh::new();
        let a = mesh.add_vert(Point3::new(0.0, 0.0, 0.0));
        let b = mesh.add_vert(Point3::new(1.0, 0.0, 0.0));
        let c = mesh.add_vert(Point3::new(0.0, 1.0, 0.0));
        let f = mesh.add_face([a, b, c]).unwrap();
        let err = mesh.child_bc(f, BaryCoord::new(1.0, 0.0, 0.0));
        assert!(matches!(err, Err(SubdivError::NotSubdivided(_))));
    }

    #[test]
    fn test_bc_to_level_stops_at_deepest_allocated() {
        let (mesh, f) = subdivided_triangle();
        let bc = BaryCoord::new(0.9, 0.05, 0.05);
        // level 5 is unreachable; the walk stops at level 1
        let (reached, down) = mesh.bc_to_level(f, bc, 5).unwrap();
        assert_eq!(reached.level(), 1);
        // and walking back up restores the original coordinate
        let (top, up) = mesh.bc_to_level(reached, down, 0).unwrap();
        assert_eq!(top, f);
        assert_relative_eq!(up, bc, epsilon = 1e-14);
    }
}
