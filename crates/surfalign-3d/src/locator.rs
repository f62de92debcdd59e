use kiddo::immutable::float::kdtree::ImmutableKdTree;
use kiddo::SquaredEuclidean;
use nalgebra::Point3;

use crate::geometry::{Face, Geometry};

/// Errors produced when building a [`SurfaceLocator`].
#[derive(thiserror::Error, Debug)]
pub enum LocatorError {
    /// The geometry has fewer than 3 points.
    #[error("surface has fewer than 3 points")]
    TooFewPoints,

    /// The geometry carries no faces, so there is no surface to query.
    #[error("surface has no faces")]
    NoFaces,

    /// A face references a point index outside the point list.
    #[error("face {face} references point {index} which is out of bounds")]
    FaceOutOfBounds {
        /// Index of the offending face.
        face: usize,
        /// The out-of-bounds point index.
        index: usize,
    },
}

/// Result of a closest-point query against a [`SurfaceLocator`].
#[derive(Debug, Clone, Copy)]
pub struct ClosestPoint {
    /// The closest point on the surface.
    pub point: [f64; 3],
    /// Index of the face the closest point lies on.
    pub face: usize,
    /// Squared distance from the query point.
    pub dist_sq: f64,
}

/// Faces per leaf of the bounding-box tree.
const MAX_LEAF_FACES: usize = 4;

#[derive(Debug, Clone, Copy)]
struct Aabb {
    min: [f64; 3],
    max: [f64; 3],
}

impl Aabb {
    fn from_triangle(v0: &Point3<f64>, v1: &Point3<f64>, v2: &Point3<f64>) -> Self {
        let mut min = [0.0; 3];
        let mut max = [0.0; 3];
        for axis in 0..3 {
            min[axis] = v0[axis].min(v1[axis]).min(v2[axis]);
            max[axis] = v0[axis].max(v1[axis]).max(v2[axis]);
        }
        Self { min, max }
    }

    fn expand(&mut self, other: &Self) {
        for axis in 0..3 {
            self.min[axis] = self.min[axis].min(other.min[axis]);
            self.max[axis] = self.max[axis].max(other.max[axis]);
        }
    }

    fn center(&self, axis: usize) -> f64 {
        (self.min[axis] + self.max[axis]) * 0.5
    }

    fn longest_axis(&self) -> usize {
        let dx = self.max[0] - self.min[0];
        let dy = self.max[1] - self.min[1];
        let dz = self.max[2] - self.min[2];
        if dx >= dy && dx >= dz {
            0
        } else if dy >= dz {
            1
        } else {
            2
        }
    }

    /// Squared distance from a point to the box, zero if the point is inside.
    fn dist_sq_to_point(&self, point: &Point3<f64>) -> f64 {
        let mut dist_sq = 0.0;
        for axis in 0..3 {
            let d = (self.min[axis] - point[axis]).max(0.0).max(point[axis] - self.max[axis]);
            dist_sq += d * d;
        }
        dist_sq
    }
}

#[derive(Debug)]
enum Node {
    Leaf {
        bbox: Aabb,
        faces: Vec<u32>,
    },
    Internal {
        bbox: Aabb,
        left: Box<Node>,
        right: Box<Node>,
    },
}

impl Node {
    fn bbox(&self) -> &Aabb {
        match self {
            Self::Leaf { bbox, .. } | Self::Internal { bbox, .. } => bbox,
        }
    }
}

/// Compute the closest point on a triangle to a query point.
///
/// Voronoi-region walk from "Real-Time Collision Detection" (Ericson):
/// classify the query against the vertex and edge regions of the triangle,
/// and fall through to the interior barycentric case.
pub fn closest_point_on_triangle(
    point: &Point3<f64>,
    v0: &Point3<f64>,
    v1: &Point3<f64>,
    v2: &Point3<f64>,
) -> Point3<f64> {
    let ab = v1 - v0;
    let ac = v2 - v0;

    let ap = point - v0;
    let d1 = ab.dot(&ap);
    let d2 = ac.dot(&ap);
    if d1 <= 0.0 && d2 <= 0.0 {
        return *v0;
    }

    let bp = point - v1;
    let d3 = ab.dot(&bp);
    let d4 = ac.dot(&bp);
    if d3 >= 0.0 && d4 <= d3 {
        return *v1;
    }

    let vc = d1 * d4 - d3 * d2;
    if vc <= 0.0 && d1 >= 0.0 && d3 <= 0.0 {
        let v = d1 / (d1 - d3);
        return v0 + ab * v;
    }

    let cp = point - v2;
    let d5 = ab.dot(&cp);
    let d6 = ac.dot(&cp);
    if d6 >= 0.0 && d5 <= d6 {
        return *v2;
    }

    let vb = d5 * d2 - d1 * d6;
    if vb <= 0.0 && d2 >= 0.0 && d6 <= 0.0 {
        let w = d2 / (d2 - d6);
        return v0 + ac * w;
    }

    let va = d3 * d6 - d5 * d4;
    if va <= 0.0 && (d4 - d3) >= 0.0 && (d5 - d6) >= 0.0 {
        let w = (d4 - d3) / ((d4 - d3) + (d5 - d6));
        return v1 + (v2 - v1) * w;
    }

    let denom = 1.0 / (va + vb + vc);
    let v = vb * denom;
    let w = vc * denom;
    v0 + ab * v + ac * w
}

/// Spatial index answering nearest-point queries against a triangulated
/// surface.
///
/// A bounding-box tree over the faces (median split on the longest axis)
/// gives better-than-linear pruning; a kd-tree over the referenced vertices
/// supplies a tight initial bound so most branches prune on the first
/// comparison. Built once per target assignment and rebuilt whenever the
/// target is replaced.
pub struct SurfaceLocator {
    points: Vec<Point3<f64>>,
    faces: Vec<Face>,
    root: Node,
    vertex_tree: ImmutableKdTree<f64, u32, 3, 32>,
    // face incident to each kd-tree entry, for seeding the search
    seed_faces: Vec<u32>,
}

impl SurfaceLocator {
    /// Build the locator over a geometry.
    ///
    /// Requires at least 3 points and at least one face with in-bounds
    /// indices; all failures are fatal configuration errors.
    pub fn build(geometry: &Geometry) -> Result<Self, LocatorError> {
        let points = geometry.points();
        if points.len() < 3 {
            return Err(LocatorError::TooFewPoints);
        }
        let faces = match geometry.faces() {
            Some(faces) if !faces.is_empty() => faces,
            _ => return Err(LocatorError::NoFaces),
        };
        for (face_idx, face) in faces.iter().enumerate() {
            for &index in face {
                if index >= points.len() {
                    return Err(LocatorError::FaceOutOfBounds {
                        face: face_idx,
                        index,
                    });
                }
            }
        }

        let points: Vec<Point3<f64>> = points.iter().map(|p| Point3::from(*p)).collect();

        // one incident face per referenced vertex, for kd-tree seeding
        let mut incident: Vec<Option<u32>> = vec![None; points.len()];
        for (face_idx, face) in faces.iter().enumerate() {
            for &index in face {
                incident[index].get_or_insert(face_idx as u32);
            }
        }
        let mut seed_coords = Vec::new();
        let mut seed_faces = Vec::new();
        for (index, face_idx) in incident.iter().enumerate() {
            if let Some(face_idx) = face_idx {
                seed_coords.push([points[index].x, points[index].y, points[index].z]);
                seed_faces.push(*face_idx);
            }
        }
        let vertex_tree = ImmutableKdTree::new_from_slice(&seed_coords);

        // per-face bounds, then a median-split tree over them
        let bounds: Vec<Aabb> = faces
            .iter()
            .map(|face| {
                Aabb::from_triangle(&points[face[0]], &points[face[1]], &points[face[2]])
            })
            .collect();
        let mut order: Vec<u32> = (0..faces.len() as u32).collect();
        let root = Self::build_node(&bounds, &mut order);

        Ok(Self {
            points,
            faces: faces.to_vec(),
            root,
            vertex_tree,
            seed_faces,
        })
    }

    fn build_node(bounds: &[Aabb], order: &mut [u32]) -> Node {
        let mut bbox = bounds[order[0] as usize];
        for &face_idx in order.iter().skip(1) {
            bbox.expand(&bounds[face_idx as usize]);
        }

        if order.len() <= MAX_LEAF_FACES {
            return Node::Leaf {
                bbox,
                faces: order.to_vec(),
            };
        }

        let axis = bbox.longest_axis();
        let mid = order.len() / 2;
        order.select_nth_unstable_by(mid, |&a, &b| {
            let ca = bounds[a as usize].center(axis);
            let cb = bounds[b as usize].center(axis);
            ca.partial_cmp(&cb).unwrap_or(std::cmp::Ordering::Equal)
        });
        let (left, right) = order.split_at_mut(mid);

        Node::Internal {
            bbox,
            left: Box::new(Self::build_node(bounds, left)),
            right: Box::new(Self::build_node(bounds, right)),
        }
    }

    /// Number of faces indexed by the locator.
    pub fn num_faces(&self) -> usize {
        self.faces.len()
    }

    /// Find the closest point on the surface to a query point.
    pub fn find_closest_point(&self, query: &[f64; 3]) -> ClosestPoint {
        let q = Point3::from(*query);

        // seed the search with the face incident to the nearest vertex
        let nearest = self.vertex_tree.nearest_one::<SquaredEuclidean>(query);
        let seed_face = self.seed_faces[nearest.item as usize] as usize;
        let (point, dist_sq) = self.closest_on_face(seed_face, &q);
        let mut best = ClosestPoint {
            point: [point.x, point.y, point.z],
            face: seed_face,
            dist_sq,
        };

        self.search(&self.root, &q, &mut best);
        best
    }

    fn closest_on_face(&self, face_idx: usize, query: &Point3<f64>) -> (Point3<f64>, f64) {
        let face = &self.faces[face_idx];
        let closest = closest_point_on_triangle(
            query,
            &self.points[face[0]],
            &self.points[face[1]],
            &self.points[face[2]],
        );
        let dist_sq = (closest - query).norm_squared();
        (closest, dist_sq)
    }

    fn search(&self, node: &Node, query: &Point3<f64>, best: &mut ClosestPoint) {
        if node.bbox().dist_sq_to_point(query) >= best.dist_sq {
            return;
        }
        match node {
            Node::Leaf { faces, .. } => {
                for &face_idx in faces {
                    let (point, dist_sq) = self.closest_on_face(face_idx as usize, query);
                    if dist_sq < best.dist_sq {
                        *best = ClosestPoint {
                            point: [point.x, point.y, point.z],
                            face: face_idx as usize,
                            dist_sq,
                        };
                    }
                }
            }
            Node::Internal { left, right, .. } => {
                // descend into the nearer child first so the bound tightens early
                let left_dist = left.bbox().dist_sq_to_point(query);
                let right_dist = right.bbox().dist_sq_to_point(query);
                if left_dist <= right_dist {
                    self.search(left, query, best);
                    self.search(right, query, best);
                } else {
                    self.search(right, query, best);
                    self.search(left, query, best);
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn unit_box_surface() -> Geometry {
        let points = vec![
            [0.0, 0.0, 0.0],
            [1.0, 0.0, 0.0],
            [1.0, 1.0, 0.0],
            [0.0, 1.0, 0.0],
            [0.0, 0.0, 1.0],
            [1.0, 0.0, 1.0],
            [1.0, 1.0, 1.0],
            [0.0, 1.0, 1.0],
        ];
        let faces = vec![
            [0, 1, 2],
            [0, 2, 3],
            [4, 6, 5],
            [4, 7, 6],
            [0, 5, 1],
            [0, 4, 5],
            [2, 7, 3],
            [2, 6, 7],
            [0, 3, 7],
            [0, 7, 4],
            [1, 5, 6],
            [1, 6, 2],
        ];
        Geometry::Surface { points, faces }
    }

    #[test]
    fn test_closest_point_on_triangle_regions() {
        let v0 = Point3::new(0.0, 0.0, 0.0);
        let v1 = Point3::new(10.0, 0.0, 0.0);
        let v2 = Point3::new(5.0, 10.0, 0.0);

        // interior projects straight down onto the plane
        let closest = closest_point_on_triangle(&Point3::new(5.0, 3.0, 5.0), &v0, &v1, &v2);
        assert_relative_eq!(closest.z, 0.0, epsilon = 1e-12);
        assert_relative_eq!(closest.x, 5.0, epsilon = 1e-12);
        assert_relative_eq!(closest.y, 3.0, epsilon = 1e-12);

        // vertex region
        let closest = closest_point_on_triangle(&Point3::new(-5.0, -5.0, 0.0), &v0, &v1, &v2);
        assert_relative_eq!(closest.x, 0.0, epsilon = 1e-12);
        assert_relative_eq!(closest.y, 0.0, epsilon = 1e-12);

        // edge region of v0-v1
        let closest = closest_point_on_triangle(&Point3::new(5.0, -5.0, 0.0), &v0, &v1, &v2);
        assert_relative_eq!(closest.y, 0.0, epsilon = 1e-12);
        assert_relative_eq!(closest.x, 5.0, epsilon = 1e-12);
    }

    #[test]
    fn test_locator_requires_three_points() {
        let geometry = Geometry::Surface {
            points: vec![[0.0, 0.0, 0.0], [1.0, 0.0, 0.0]],
            faces: vec![[0, 1, 0]],
        };
        assert!(matches!(
            SurfaceLocator::build(&geometry),
            Err(LocatorError::TooFewPoints)
        ));
    }

    #[test]
    fn test_locator_requires_faces() {
        let geometry = Geometry::Points(vec![[0.0; 3], [1.0, 0.0, 0.0], [0.0, 1.0, 0.0]]);
        assert!(matches!(
            SurfaceLocator::build(&geometry),
            Err(LocatorError::NoFaces)
        ));
    }

    #[test]
    fn test_locator_rejects_out_of_bounds_face() {
        let geometry = Geometry::Surface {
            points: vec![[0.0; 3], [1.0, 0.0, 0.0], [0.0, 1.0, 0.0]],
            faces: vec![[0, 1, 3]],
        };
        assert!(matches!(
            SurfaceLocator::build(&geometry),
            Err(LocatorError::FaceOutOfBounds { face: 0, index: 3 })
        ));
    }

    #[test]
    fn test_locator_on_vertex_query() -> Result<(), LocatorError> {
        let locator = SurfaceLocator::build(&unit_box_surface())?;
        let closest = locator.find_closest_point(&[0.0, 0.0, 0.0]);
        assert_relative_eq!(closest.dist_sq, 0.0, epsilon = 1e-24);
        Ok(())
    }

    #[test]
    fn test_locator_outside_query() -> Result<(), LocatorError> {
        let locator = SurfaceLocator::build(&unit_box_surface())?;
        // straight above the top face centre
        let closest = locator.find_closest_point(&[0.5, 0.5, 3.0]);
        assert_relative_eq!(closest.dist_sq, 4.0, epsilon = 1e-12);
        assert_relative_eq!(closest.point[2], 1.0, epsilon = 1e-12);
        Ok(())
    }

    #[test]
    fn test_locator_matches_brute_force() -> Result<(), LocatorError> {
        let geometry = unit_box_surface();
        let locator = SurfaceLocator::build(&geometry)?;

        let queries = [
            [0.5, 0.5, 0.5],
            [-1.0, 0.2, 0.7],
            [2.0, 2.0, 2.0],
            [0.9, -0.3, 1.4],
            [0.1, 0.1, -2.0],
        ];
        let points: Vec<Point3<f64>> =
            geometry.points().iter().map(|p| Point3::from(*p)).collect();
        let faces = geometry.faces().expect("surface");

        for query in &queries {
            let q = Point3::from(*query);
            let mut brute = f64::MAX;
            for face in faces {
                let closest = closest_point_on_triangle(
                    &q,
                    &points[face[0]],
                    &points[face[1]],
                    &points[face[2]],
                );
                brute = brute.min((closest - q).norm_squared());
            }
            let result = locator.find_closest_point(query);
            assert_relative_eq!(result.dist_sq, brute, epsilon = 1e-12);
        }
        Ok(())
    }
}
