use crate::mesh::Mesh;
use crate::point::Point3;
use crate::ray::{Hit, Ray};
use crate::vector::Axis;

use std::f32;
use std::mem;

/// Axis Aligned Bounding Box
#[derive(Debug, Clone)]
pub struct Aabb {
    pub min: Point3,
    pub max: Point3,
}

impl Aabb {
    pub fn new(min: Point3, max: Point3) -> Aabb {
        Aabb { min, max }
    }

    /// An inverted box that any union will overwrite.
    pub fn empty() -> Aabb {
        Aabb {
            min: Point3::new(f32::MAX, f32::MAX, f32::MAX),
            max: Point3::new(-f32::MAX, -f32::MAX, -f32::MAX),
        }
    }

    pub fn expand_point(&mut self, p: &Point3) {
        self.min = Point3::min(self.min, *p);
        self.max = Point3::max(self.max, *p);
    }

    pub fn expand_box(&mut self, other: &Aabb) {
        self.min = Point3::min(self.min, other.min);
        self.max = Point3::max(self.max, other.max);
    }

    pub fn union(box1: &Aabb, box2: &Aabb) -> Aabb {
        Aabb {
            min: Point3::min(box1.min, box2.min),
            max: Point3::max(box1.max, box2.max),
        }
    }

    pub fn center(&self) -> Point3 {
        Point3::new(
            self.min.x() * 0.5_f32 + self.max.x() * 0.5_f32,
            self.min.y() * 0.5_f32 + self.max.y() * 0.5_f32,
            self.min.z() * 0.5_f32 + self.max.z() * 0.5_f32,
        )
    }

    pub fn largest_axis(&self) -> Axis {
        let diagonal = self.max - self.min;
        if diagonal.x() > diagonal.y() && diagonal.x() > diagonal.z() {
            Axis::X
        } else if diagonal.y() > diagonal.z() {
            Axis::Y
        } else {
            Axis::Z
        }
    }

    pub fn surface_area(&self) -> f32 {
        let diagonal = self.max - self.min;
        if diagonal.x() < 0.0_f32 || diagonal.y() < 0.0_f32 || diagonal.z() < 0.0_f32 {
            return 0.0_f32;
        }
        2_f32
            * (diagonal.x() * diagonal.y()
                + diagonal.x() * diagonal.z()
                + diagonal.y() * diagonal.z())
    }

    /// Slab test. Yields the parametric range over which the ray is
    /// inside the box; the lower end is clamped to zero when the ray
    /// starts inside.
    pub fn intersect(&self, r: &Ray) -> Option<(f32, f32)> {
        let mut t_min = 0.0_f32;
        let mut t_max = f32::INFINITY;

        for &axis in &[Axis::X, Axis::Y, Axis::Z] {
            let origin = r.origin[axis];
            let dir = r.direction[axis];
            if dir == 0.0_f32 {
                // Parallel to the slab: inside or nothing.
                if origin < self.min[axis] || origin > self.max[axis] {
                    return None;
                }
            } else {
                let inv = 1.0_f32 / dir;
                let mut t0 = (self.min[axis] - origin) * inv;
                let mut t1 = (self.max[axis] - origin) * inv;
                if t0 > t1 {
                    mem::swap(&mut t0, &mut t1);
                }
                if t0 > t_min {
                    t_min = t0;
                }
                if t1 < t_max {
                    t_max = t1;
                }
                if t_max < t_min {
                    return None;
                }
            }
        }

        Some((t_min, t_max))
    }
}

/// How an inner node picks its split plane.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum SplitMethod {
    /// Bucketed surface-area heuristic (the default).
    Sah,
    /// Split at the midpoint of the centroid bounds.
    Middle,
    /// Split at the median centroid.
    EqualCounts,
}

const N_BUCKETS: usize = 12;

pub const TARGET_LEAF_SIZE: usize = 10;
pub const MAX_TREE_DEPTH: usize = 100;

// Children of an inner node are stored contiguously starting at
// `first_child`; leaves own a contiguous range of the permuted face
// index array. Nodes are addressed by index, never by pointer.
enum Node {
    Inner {
        bbox: Aabb,
        first_child: usize,
    },
    Leaf {
        bbox: Aabb,
        first_face: usize,
        count: usize,
    },
}

impl Node {
    fn bbox(&self) -> &Aabb {
        match self {
            Node::Inner { bbox, .. } => bbox,
            Node::Leaf { bbox, .. } => bbox,
        }
    }
}

/// Bounding volume hierarchy over the faces of one mesh, built once at
/// mesh activation and immutable afterwards.
pub struct Bvh {
    nodes: Vec<Node>,
    faces: Vec<u32>,
}

impl Bvh {
    pub fn build(mesh: &Mesh, target_leaf_size: usize, max_depth: usize, split: SplitMethod) -> Bvh {
        let nb_faces = mesh.nb_faces();
        let mut bvh = Bvh {
            nodes: Vec::new(),
            faces: (0..nb_faces as u32).collect(),
        };
        if nb_faces == 0 {
            return bvh;
        }

        let centroids: Vec<Point3> = (0..nb_faces)
            .map(|f| mesh.face_bounding_box(f as u32).center())
            .collect();

        bvh.nodes.push(Node::Leaf {
            bbox: Aabb::empty(),
            first_face: 0,
            count: 0,
        });
        bvh.build_node(
            mesh,
            &centroids,
            0,
            0,
            nb_faces,
            0,
            target_leaf_size,
            max_depth,
            split,
        );
        log::debug!(
            "built BVH: {} faces, {} nodes",
            nb_faces,
            bvh.nodes.len()
        );
        bvh
    }

    fn build_node(
        &mut self,
        mesh: &Mesh,
        centroids: &[Point3],
        node_id: usize,
        start: usize,
        end: usize,
        depth: usize,
        target_leaf_size: usize,
        max_depth: usize,
        split: SplitMethod,
    ) {
        let count = end - start;

        let mut bbox = Aabb::empty();
        for &f in &self.faces[start..end] {
            bbox.expand_box(&mesh.face_bounding_box(f));
        }

        if count <= target_leaf_size || depth == max_depth {
            self.nodes[node_id] = Node::Leaf {
                bbox,
                first_face: start,
                count,
            };
            return;
        }

        let mut centroid_bounds = Aabb::empty();
        for &f in &self.faces[start..end] {
            centroid_bounds.expand_point(&centroids[f as usize]);
        }
        let axis = centroid_bounds.largest_axis();

        // All centroids coincide: nothing to split over.
        if centroid_bounds.max[axis] == centroid_bounds.min[axis] {
            self.nodes[node_id] = Node::Leaf {
                bbox,
                first_face: start,
                count,
            };
            return;
        }

        let mid = match split {
            SplitMethod::Sah => {
                match self.split_sah(mesh, centroids, start, end, axis, &centroid_bounds, &bbox) {
                    Some(mid) => mid,
                    None => {
                        // The heuristic judged every split more expensive
                        // than scanning the faces directly.
                        self.nodes[node_id] = Node::Leaf {
                            bbox,
                            first_face: start,
                            count,
                        };
                        return;
                    }
                }
            }
            SplitMethod::Middle => {
                let split_value = centroid_bounds.center()[axis];
                self.partition(centroids, start, end, axis, split_value)
            }
            SplitMethod::EqualCounts => self.split_equal_counts(centroids, start, end, axis),
        };

        // A one-sided partition can still happen with clustered
        // centroids; the median split always makes progress.
        let mid = if mid == start || mid == end {
            self.split_equal_counts(centroids, start, end, axis)
        } else {
            mid
        };

        let first_child = self.nodes.len();
        for _ in 0..2 {
            self.nodes.push(Node::Leaf {
                bbox: Aabb::empty(),
                first_face: 0,
                count: 0,
            });
        }
        self.nodes[node_id] = Node::Inner { bbox, first_child };

        self.build_node(
            mesh,
            centroids,
            first_child,
            start,
            mid,
            depth + 1,
            target_leaf_size,
            max_depth,
            split,
        );
        self.build_node(
            mesh,
            centroids,
            first_child + 1,
            mid,
            end,
            depth + 1,
            target_leaf_size,
            max_depth,
            split,
        );
    }

    /// Bucketed SAH split. Returns the partition point, or `None` when
    /// making a leaf is estimated to be cheaper than any split.
    fn split_sah(
        &mut self,
        mesh: &Mesh,
        centroids: &[Point3],
        start: usize,
        end: usize,
        axis: Axis,
        centroid_bounds: &Aabb,
        total_bounds: &Aabb,
    ) -> Option<usize> {
        let count = end - start;
        let lo = centroid_bounds.min[axis];
        let extent = centroid_bounds.max[axis] - lo;

        let mut bucket_counts = [0_usize; N_BUCKETS];
        let mut bucket_bounds: Vec<Aabb> = (0..N_BUCKETS).map(|_| Aabb::empty()).collect();
        for &f in &self.faces[start..end] {
            let b = Self::bucket_of(centroids[f as usize][axis], lo, extent);
            bucket_counts[b] += 1;
            bucket_bounds[b].expand_box(&mesh.face_bounding_box(f));
        }

        // Cost of splitting between bucket i and i + 1:
        //   1 + (countA * sa(A) + countB * sa(B)) / sa(N)
        let total_area = total_bounds.surface_area();
        let mut min_cost = f32::MAX;
        let mut min_cost_bucket = 0;
        for i in 0..N_BUCKETS - 1 {
            let mut bounds_a = Aabb::empty();
            let mut bounds_b = Aabb::empty();
            let mut count_a = 0;
            let mut count_b = 0;
            for j in 0..=i {
                bounds_a.expand_box(&bucket_bounds[j]);
                count_a += bucket_counts[j];
            }
            for j in i + 1..N_BUCKETS {
                bounds_b.expand_box(&bucket_bounds[j]);
                count_b += bucket_counts[j];
            }
            if count_a == 0 || count_b == 0 {
                continue;
            }
            let cost = 1.0_f32
                + (count_a as f32 * bounds_a.surface_area()
                    + count_b as f32 * bounds_b.surface_area())
                    / total_area;
            if cost < min_cost {
                min_cost = cost;
                min_cost_bucket = i;
            }
        }

        // Compare against the cost of iterating the faces in a leaf.
        if min_cost >= count as f32 {
            return None;
        }

        let boundary = min_cost_bucket;
        let mid = {
            let faces = &mut self.faces[start..end];
            let mut i = 0;
            let mut j = faces.len();
            while i < j {
                if Self::bucket_of(centroids[faces[i] as usize][axis], lo, extent) <= boundary {
                    i += 1;
                } else {
                    j -= 1;
                    faces.swap(i, j);
                }
            }
            start + i
        };
        Some(mid)
    }

    fn bucket_of(value: f32, lo: f32, extent: f32) -> usize {
        let b = (N_BUCKETS as f32 * (value - lo) / extent) as usize;
        b.min(N_BUCKETS - 1)
    }

    /// Partition the face range in place around a split coordinate.
    fn partition(
        &mut self,
        centroids: &[Point3],
        start: usize,
        end: usize,
        axis: Axis,
        split_value: f32,
    ) -> usize {
        let faces = &mut self.faces[start..end];
        let mut i = 0;
        let mut j = faces.len();
        while i < j {
            if centroids[faces[i] as usize][axis] < split_value {
                i += 1;
            } else {
                j -= 1;
                faces.swap(i, j);
            }
        }
        start + i
    }

    fn split_equal_counts(
        &mut self,
        centroids: &[Point3],
        start: usize,
        end: usize,
        axis: Axis,
    ) -> usize {
        let faces = &mut self.faces[start..end];
        faces.sort_unstable_by(|a, b| {
            let ca = centroids[*a as usize][axis];
            let cb = centroids[*b as usize][axis];
            ca.partial_cmp(&cb).unwrap_or(std::cmp::Ordering::Equal)
        });
        start + faces.len() / 2
    }

    /// Find the nearest face intersection closer than the incoming
    /// `hit.t`, descending front to back and pruning subtrees whose
    /// entry distance already exceeds the best hit.
    pub fn intersect(&self, mesh: &Mesh, ray: &Ray, hit: &mut Hit) -> bool {
        if self.nodes.is_empty() {
            return false;
        }
        match self.nodes[0].bbox().intersect(ray) {
            Some((t_min, _)) if t_min < hit.t => self.intersect_node(0, mesh, ray, hit),
            _ => false,
        }
    }

    fn intersect_node(&self, node_id: usize, mesh: &Mesh, ray: &Ray, hit: &mut Hit) -> bool {
        match &self.nodes[node_id] {
            Node::Leaf {
                first_face, count, ..
            } => {
                let mut found = false;
                for i in *first_face..*first_face + *count {
                    if mesh.intersect_face(ray, hit, self.faces[i]) {
                        found = true;
                        if ray.shadow {
                            return true;
                        }
                    }
                }
                found
            }
            Node::Inner { first_child, .. } => {
                let left = *first_child;
                let right = *first_child + 1;

                let hit_left = self.nodes[left].bbox().intersect(ray);
                let hit_right = self.nodes[right].bbox().intersect(ray);

                let (near, near_t, far, far_t) = match (hit_left, hit_right) {
                    (Some((tl, _)), Some((tr, _))) => {
                        if tl <= tr {
                            (left, tl, Some(right), tr)
                        } else {
                            (right, tr, Some(left), tl)
                        }
                    }
                    (Some((tl, _)), None) => (left, tl, None, 0.0_f32),
                    (None, Some((tr, _))) => (right, tr, None, 0.0_f32),
                    (None, None) => return false,
                };

                let mut found = false;
                if near_t < hit.t {
                    found = self.intersect_node(near, mesh, ray, hit);
                    if found && ray.shadow {
                        return true;
                    }
                }
                if let Some(far) = far {
                    if far_t < hit.t {
                        found |= self.intersect_node(far, mesh, ray, hit);
                    }
                }
                found
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::vector::Vector3;

    #[test]
    fn slab_test_hits_and_misses() {
        let b = Aabb::new(Point3::new(-1.0, -1.0, -1.0), Point3::new(1.0, 1.0, 1.0));

        let r = Ray::new(Point3::new(0.0, 0.0, -5.0), Vector3::new(0.0, 0.0, 1.0));
        let (t_min, t_max) = b.intersect(&r).unwrap();
        assert!((t_min - 4.0).abs() < 1e-5);
        assert!((t_max - 6.0).abs() < 1e-5);

        let miss = Ray::new(Point3::new(0.0, 3.0, -5.0), Vector3::new(0.0, 0.0, 1.0));
        assert!(b.intersect(&miss).is_none());

        // Behind the origin
        let behind = Ray::new(Point3::new(0.0, 0.0, 5.0), Vector3::new(0.0, 0.0, 1.0));
        assert!(b.intersect(&behind).is_none());
    }

    #[test]
    fn slab_test_clamps_interior_origin() {
        let b = Aabb::new(Point3::new(-1.0, -1.0, -1.0), Point3::new(1.0, 1.0, 1.0));
        let r = Ray::new(Point3::origin(), Vector3::new(0.0, 0.0, 1.0));
        let (t_min, t_max) = b.intersect(&r).unwrap();
        assert_eq!(t_min, 0.0);
        assert!((t_max - 1.0).abs() < 1e-5);
    }

    #[test]
    fn parallel_ray_inside_slab() {
        let b = Aabb::new(Point3::new(-1.0, -1.0, 0.0), Point3::new(1.0, 1.0, 4.0));
        let inside = Ray::new(Point3::new(0.5, 0.0, -2.0), Vector3::new(0.0, 0.0, 1.0));
        assert!(b.intersect(&inside).is_some());
        let outside = Ray::new(Point3::new(2.0, 0.0, -2.0), Vector3::new(0.0, 0.0, 1.0));
        assert!(b.intersect(&outside).is_none());
    }

    #[test]
    fn union_and_surface_area() {
        let mut b = Aabb::empty();
        assert_eq!(b.surface_area(), 0.0);
        b.expand_point(&Point3::origin());
        b.expand_point(&Point3::new(2.0, 1.0, 3.0));
        assert!((b.surface_area() - 2.0 * (2.0 + 6.0 + 3.0)).abs() < 1e-5);
        assert_eq!(b.largest_axis(), Axis::Z);
    }
}
