//! Geometry providers for memes.
//!
//! A [`GeometryMap`] turns a per-meme parameter into a target position.
//! Controllers inject one strategy object; memes carry only the parameter.
//! The [`GeometryMap::child_param`] hook decides how parameters propagate to
//! subdivision children; the default is no propagation, which leaves child
//! simplices unmanaged.

use std::fmt;

use nalgebra::{Matrix4, Point3, Vector3};

/// Per-meme map parameter.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum MapParam {
    /// No parameter; the map decides on its own (points).
    None,
    /// Arc parameter along a curve, in `[0, 1]`.
    T(f64),
    /// Surface parameter pair.
    Uv(f64, f64),
}

/// Strategy object computing target positions for a controller's memes.
pub trait GeometryMap: fmt::Debug {
    /// Target position for a parameter. `None` reports a computation
    /// failure; callers keep the last good position and stay silent.
    fn map(&self, param: &MapParam) -> Option<Point3<f64>>;

    /// True if [`GeometryMap::transform`] is meaningful for this map.
    fn can_transform(&self) -> bool {
        false
    }

    /// Applies an affine transform to the map itself. Returns false when
    /// unsupported.
    fn transform(&mut self, _xf: &Matrix4<f64>) -> bool {
        false
    }

    /// Mixes contributor parameters into a parameter for a subdivision
    /// child. `None` suppresses child meme generation.
    fn child_param(&self, contributors: &[MapParam]) -> Option<MapParam> {
        let _ = contributors;
        None
    }

    /// Clones the map behind a fresh box. Child controllers share the
    /// parent's geometry this way.
    fn boxed_clone(&self) -> Box<dyn GeometryMap>;
}

/// Averages contributor parameters of one kind; mixed kinds yield `None`.
#[must_use]
pub fn average_params(contributors: &[MapParam]) -> Option<MapParam> {
    if contributors.is_empty() {
        return None;
    }
    let n = contributors.len() as f64;
    if contributors.iter().all(|p| matches!(p, MapParam::T(_))) {
        let sum: f64 = contributors
            .iter()
            .map(|p| if let MapParam::T(t) = p { *t } else { 0.0 })
            .sum();
        return Some(MapParam::T(sum / n));
    }
    if contributors.iter().all(|p| matches!(p, MapParam::Uv(_, _))) {
        let (mut su, mut sv) = (0.0, 0.0);
        for p in contributors {
            if let MapParam::Uv(u, v) = p {
                su += u;
                sv += v;
            }
        }
        return Some(MapParam::Uv(su / n, sv / n));
    }
    None
}

/// Map for point controllers: every meme targets one location.
#[derive(Debug, Clone)]
pub struct FixedPointMap {
    /// The target location.
    pub loc: Point3<f64>,
}

impl GeometryMap for FixedPointMap {
    fn map(&self, _param: &MapParam) -> Option<Point3<f64>> {
        Some(self.loc)
    }

    fn can_transform(&self) -> bool {
        true
    }

    fn transform(&mut self, xf: &Matrix4<f64>) -> bool {
        self.loc = xf.transform_point(&self.loc);
        true
    }

    fn boxed_clone(&self) -> Box<dyn GeometryMap> {
        Box::new(self.clone())
    }
}

/// Map for curve controllers: linear interpolation along a polyline,
/// parameterized over `[0, 1]`.
#[derive(Debug, Clone)]
pub struct PolylineMap {
    /// Polyline points; at least two for a usable map.
    pub pts: Vec<Point3<f64>>,
}

impl GeometryMap for PolylineMap {
    fn map(&self, param: &MapParam) -> Option<Point3<f64>> {
        let MapParam::T(t) = param else {
            return None;
        };
        if self.pts.len() < 2 || !t.is_finite() {
            return None;
        }
        let t = t.clamp(0.0, 1.0);
        let scaled = t * (self.pts.len() - 1) as f64;
        let seg = (scaled.floor() as usize).min(self.pts.len() - 2);
        let frac = scaled - seg as f64;
        Some(self.pts[seg] + (self.pts[seg + 1] - self.pts[seg]) * frac)
    }

    fn can_transform(&self) -> bool {
        true
    }

    fn transform(&mut self, xf: &Matrix4<f64>) -> bool {
        for p in &mut self.pts {
            *p = xf.transform_point(p);
        }
        true
    }

    fn child_param(&self, contributors: &[MapParam]) -> Option<MapParam> {
        average_params(contributors)
    }

    fn boxed_clone(&self) -> Box<dyn GeometryMap> {
        Box::new(self.clone())
    }
}

/// Map for surface controllers: an affine patch spanned by two axes.
#[derive(Debug, Clone)]
pub struct PlaneMap {
    /// Patch origin.
    pub origin: Point3<f64>,
    /// First axis.
    pub u: Vector3<f64>,
    /// Second axis.
    pub v: Vector3<f64>,
}

impl GeometryMap for PlaneMap {
    fn map(&self, param: &MapParam) -> Option<Point3<f64>> {
        let MapParam::Uv(a, b) = param else {
            return None;
        };
        if !(a.is_finite() && b.is_finite()) {
            return None;
        }
        Some(self.origin + self.u * *a + self.v * *b)
    }

    fn can_transform(&self) -> bool {
        true
    }

    fn transform(&mut self, xf: &Matrix4<f64>) -> bool {
        self.origin = xf.transform_point(&self.origin);
        self.u = xf.transform_vector(&self.u);
        self.v = xf.transform_vector(&self.v);
        true
    }

    fn child_param(&self, contributors: &[MapParam]) -> Option<MapParam> {
        average_params(contributors)
    }

    fn boxed_clone(&self) -> Box<dyn GeometryMap> {
        Box::new(self.clone())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_average_params() {
        let avg = average_params(&[MapParam::T(0.0), MapParam::T(1.0)]).unwrap();
        assert_eq!(avg, MapParam::T(0.5));

        let avg = average_params(&[MapParam::Uv(0.0, 1.0), MapParam::Uv(1.0, 0.0)]).unwrap();
        assert_eq!(avg, MapParam::Uv(0.5, 0.5));

        assert!(average_params(&[MapParam::T(0.5), MapParam::Uv(0.0, 0.0)]).is_none());
        assert!(average_params(&[]).is_none());
    }

    #[test]
    fn test_polyline_map() {
        let map = PolylineMap {
            pts: vec![
                Point3::new(0.0, 0.0, 0.0),
                Point3::new(1.0, 0.0, 0.0),
                Point3::new(1.0, 1.0, 0.0),
            ],
        };
        assert_relative_eq!(
            map.map(&MapParam::T(0.5)).unwrap(),
            Point3::new(1.0, 0.0, 0.0)
        );
        assert_relative_eq!(
            map.map(&MapParam::T(0.75)).unwrap(),
            Point3::new(1.0, 0.5, 0.0)
        );
        // wrong parameter kind is a silent failure
        assert!(map.map(&MapParam::Uv(0.0, 0.0)).is_none());
        assert!(map.map(&MapParam::T(f64::NAN)).is_none());
    }

    #[test]
    fn test_plane_map_transform() {
        let mut map = PlaneMap {
            origin: Point3::origin(),
            u: Vector3::x(),
            v: Vector3::y(),
        };
        let xf = Matrix4::new_translation(&Vector3::new(0.0, 0.0, 2.0));
        assert!(map.transform(&xf));
        assert_relative_eq!(
            map.map(&MapParam::Uv(1.0, 1.0)).unwrap(),
            Point3::new(1.0, 1.0, 2.0)
        );
    }
}
