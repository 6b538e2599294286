use crate::math::{Color, Point3, Ray};
use std::cmp::Ordering;
use std::collections::BinaryHeap;

/// Which estimate a deposited photon feeds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PhotonKind {
    Indirect,
    Caustic,
}

/// A photon in flight or at rest: the ray it travelled on (with its medium),
/// the distance covered so far, and — once deposited — a world position and
/// RGB intensity.
#[derive(Debug, Clone)]
pub struct Photon {
    pub ray: Ray,
    pub travelled_distance: f64,
    pub kind: PhotonKind,
    pub position: Point3,
    pub intensity: Color,
}

impl Photon {
    pub fn emitted(ray: Ray, kind: PhotonKind, intensity: Color) -> Self {
        Self {
            ray,
            travelled_distance: 0.0,
            kind,
            position: Point3::zero(),
            intensity,
        }
    }
}

struct KdNode {
    photon: Photon,
    axis: usize,
    left: Option<Box<KdNode>>,
    right: Option<Box<KdNode>>,
}

/// Balanced k-d tree over deposited photons, built once after tracing and
/// queried read-only by every worker. Axes cycle with depth; each node is the
/// median of its range along the current axis, ties falling left.
pub struct PhotonKdTree {
    root: Option<Box<KdNode>>,
    size: usize,
}

impl PhotonKdTree {
    pub fn build(photons: Vec<Photon>) -> Self {
        let size = photons.len();
        let root = Self::build_node(photons, 0);
        Self { root, size }
    }

    pub fn len(&self) -> usize {
        self.size
    }

    pub fn is_empty(&self) -> bool {
        self.size == 0
    }

    fn build_node(mut photons: Vec<Photon>, depth: usize) -> Option<Box<KdNode>> {
        if photons.is_empty() {
            return None;
        }

        let axis = depth % 3;
        photons.sort_by(|a, b| a.position[axis].total_cmp(&b.position[axis]));

        let median = photons.len() / 2;
        let right: Vec<Photon> = photons.split_off(median + 1);
        let photon = photons.pop().unwrap();
        let left = photons;

        Some(Box::new(KdNode {
            photon,
            axis,
            left: Self::build_node(left, depth + 1),
            right: Self::build_node(right, depth + 1),
        }))
    }

    /// The k photons nearest to `query`, ordered nearest to farthest. The
    /// search carries a bounded max-heap keyed by squared distance and only
    /// descends into the far half-space when the splitting-plane gap could
    /// still beat the current worst neighbor.
    pub fn nearest(&self, query: Point3, k: usize) -> Vec<Photon> {
        if k == 0 {
            return Vec::new();
        }
        let mut heap: BinaryHeap<Neighbor> = BinaryHeap::with_capacity(k + 1);
        Self::search(&self.root, query, k, &mut heap);

        let mut neighbors = heap.into_sorted_vec();
        neighbors.truncate(k);
        neighbors.into_iter().map(|neighbor| neighbor.photon).collect()
    }

    fn search(
        node: &Option<Box<KdNode>>,
        query: Point3,
        k: usize,
        heap: &mut BinaryHeap<Neighbor>,
    ) {
        let Some(node) = node else {
            return;
        };

        let distance_squared = query.distance_squared(node.photon.position);
        if heap.len() < k {
            heap.push(Neighbor {
                distance_squared,
                photon: node.photon.clone(),
            });
        } else if distance_squared < heap.peek().map_or(f64::INFINITY, |worst| worst.distance_squared)
        {
            heap.pop();
            heap.push(Neighbor {
                distance_squared,
                photon: node.photon.clone(),
            });
        }

        let axis_gap = query[node.axis] - node.photon.position[node.axis];
        let (near, far) = if axis_gap < 0.0 {
            (&node.left, &node.right)
        } else {
            (&node.right, &node.left)
        };

        Self::search(near, query, k, heap);

        let worst = heap.peek().map_or(f64::INFINITY, |worst| worst.distance_squared);
        if heap.len() < k || axis_gap * axis_gap < worst {
            Self::search(far, query, k, heap);
        }
    }
}

/// Max-heap entry: the greatest squared distance sits on top, so the worst
/// neighbor is the one evicted.
struct Neighbor {
    distance_squared: f64,
    photon: Photon,
}

impl PartialEq for Neighbor {
    fn eq(&self, other: &Self) -> bool {
        self.distance_squared == other.distance_squared
    }
}

impl Eq for Neighbor {}

impl PartialOrd for Neighbor {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Neighbor {
    fn cmp(&self, other: &Self) -> Ordering {
        self.distance_squared.total_cmp(&other.distance_squared)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::math::Vec3;
    use rand::rngs::SmallRng;
    use rand::{Rng, SeedableRng};

    fn photon_at(position: Point3) -> Photon {
        Photon {
            ray: Ray::new(position, Vec3::unit_y()),
            travelled_distance: 0.0,
            kind: PhotonKind::Caustic,
            position,
            intensity: Color::ones(),
        }
    }

    fn brute_force_nearest(photons: &[Photon], query: Point3, k: usize) -> Vec<f64> {
        let mut distances: Vec<f64> = photons
            .iter()
            .map(|photon| query.distance_squared(photon.position))
            .collect();
        distances.sort_by(f64::total_cmp);
        distances.truncate(k);
        distances
    }

    #[test]
    fn knn_matches_brute_force() {
        let mut rng = SmallRng::seed_from_u64(42);
        let photons: Vec<Photon> = (0..500)
            .map(|_| {
                photon_at(Point3::new(
                    rng.gen_range(-10.0..10.0),
                    rng.gen_range(-10.0..10.0),
                    rng.gen_range(-10.0..10.0),
                ))
            })
            .collect();

        let tree = PhotonKdTree::build(photons.clone());
        for _ in 0..25 {
            let query = Point3::new(
                rng.gen_range(-12.0..12.0),
                rng.gen_range(-12.0..12.0),
                rng.gen_range(-12.0..12.0),
            );
            for k in [1, 7, 60, 150] {
                let expected = brute_force_nearest(&photons, query, k);
                let found = tree.nearest(query, k);
                assert_eq!(found.len(), expected.len());
                for (photon, expected_d2) in found.iter().zip(&expected) {
                    let d2 = query.distance_squared(photon.position);
                    assert!(
                        (d2 - expected_d2).abs() < 1e-9,
                        "k={k}: {d2} vs {expected_d2}"
                    );
                }
            }
        }
    }

    #[test]
    fn nearest_is_sorted_by_distance() {
        let photons: Vec<Photon> = (0..50)
            .map(|i| photon_at(Point3::new(i as f64, 0.0, 0.0)))
            .collect();
        let tree = PhotonKdTree::build(photons);
        let found = tree.nearest(Point3::new(20.2, 0.0, 0.0), 5);
        let distances: Vec<f64> = found
            .iter()
            .map(|photon| photon.position.distance(Point3::new(20.2, 0.0, 0.0)))
            .collect();
        for pair in distances.windows(2) {
            assert!(pair[0] <= pair[1]);
        }
        assert!((found[0].position.x - 20.0).abs() < 1e-12);
    }

    #[test]
    fn asking_for_more_than_stored_returns_all() {
        let photons: Vec<Photon> = (0..3)
            .map(|i| photon_at(Point3::new(i as f64, 0.0, 0.0)))
            .collect();
        let tree = PhotonKdTree::build(photons);
        assert_eq!(tree.len(), 3);
        assert_eq!(tree.nearest(Point3::zero(), 10).len(), 3);
    }

    #[test]
    fn empty_tree_returns_nothing() {
        let tree = PhotonKdTree::build(Vec::new());
        assert!(tree.is_empty());
        assert!(tree.nearest(Point3::zero(), 5).is_empty());
    }
}
