/// A triangular face, as indices into a point list.
pub type Face = [usize; 3];

/// A geometry object supplied to a registration run.
///
/// The kind is resolved once, when the caller constructs the value: either a
/// bare point set, or a surface whose points are connected by triangular
/// faces. Point-to-surface matching needs faces on at least one side, so the
/// registration driver inspects the kind via [`Geometry::has_faces`] instead
/// of probing at query time.
#[derive(Debug, Clone)]
pub enum Geometry {
    /// An unstructured set of 3D points.
    Points(Vec<[f64; 3]>),
    /// A triangulated surface.
    Surface {
        /// The surface vertices.
        points: Vec<[f64; 3]>,
        /// Triangles, each indexing into `points`.
        faces: Vec<Face>,
    },
}

impl Geometry {
    /// Get the number of points.
    #[inline]
    pub fn len(&self) -> usize {
        self.points().len()
    }

    /// Check if the geometry has no points.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.points().is_empty()
    }

    /// Get as reference the points of the geometry.
    pub fn points(&self) -> &[[f64; 3]] {
        match self {
            Self::Points(points) => points,
            Self::Surface { points, .. } => points,
        }
    }

    /// Get as reference the faces of the geometry, if it is a surface.
    pub fn faces(&self) -> Option<&[Face]> {
        match self {
            Self::Points(_) => None,
            Self::Surface { faces, .. } => Some(faces),
        }
    }

    /// Whether the geometry carries at least one face.
    pub fn has_faces(&self) -> bool {
        self.faces().is_some_and(|faces| !faces.is_empty())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_points_geometry() {
        let geometry = Geometry::Points(vec![[0.0, 0.0, 0.0], [1.0, 0.0, 0.0]]);
        assert_eq!(geometry.len(), 2);
        assert!(!geometry.is_empty());
        assert!(geometry.faces().is_none());
        assert!(!geometry.has_faces());
    }

    #[test]
    fn test_surface_geometry() {
        let geometry = Geometry::Surface {
            points: vec![[0.0, 0.0, 0.0], [1.0, 0.0, 0.0], [0.0, 1.0, 0.0]],
            faces: vec![[0, 1, 2]],
        };
        assert_eq!(geometry.len(), 3);
        assert!(geometry.has_faces());
        assert_eq!(geometry.faces(), Some([[0, 1, 2]].as_slice()));
    }

    #[test]
    fn test_surface_without_faces_has_none() {
        let geometry = Geometry::Surface {
            points: vec![[0.0, 0.0, 0.0], [1.0, 0.0, 0.0], [0.0, 1.0, 0.0]],
            faces: vec![],
        };
        assert!(!geometry.has_faces());
    }
}
