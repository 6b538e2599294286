use crate::config::{RenderSettings, SplitMethod};
use crate::math::{Aabb, Point3, Ray};
use crate::primitive::{Interaction, Primitive, PrimitiveRef, RaySlabs};
use crate::scene::Scene;

/// How a traversal consumes candidate hits.
#[derive(Debug, Clone, Copy)]
pub enum TraversalMode {
    /// Track the minimum distance, return the closest hit.
    Closest,
    /// Return the first hit no farther than the bound (shadow-style query).
    FirstWithinDistance(f64),
    /// Like `FirstWithinDistance`, but fully transparent surfaces do not count.
    FirstNonTransparentWithinDistance(f64),
}

/// Per-primitive build inputs: world bounds and centroid, carrying the index
/// into the pre-build primitive array.
struct PrimitiveInfo {
    index: usize,
    aabb: Aabb,
    centroid: Point3,
}

impl PrimitiveInfo {
    fn new(index: usize, aabb: Aabb) -> Self {
        Self {
            index,
            aabb,
            centroid: aabb.min * 0.5 + aabb.max * 0.5,
        }
    }
}

/// Build-time tree node. The tree only lives long enough to be flattened;
/// after that the linear array is the sole representation.
enum BuildNode {
    Leaf {
        aabb: Aabb,
        first_primitive: usize,
        count: usize,
    },
    Internal {
        aabb: Aabb,
        axis: usize,
        children: Box<[BuildNode; 2]>,
    },
}

impl BuildNode {
    fn aabb(&self) -> Aabb {
        match self {
            BuildNode::Leaf { aabb, .. } | BuildNode::Internal { aabb, .. } => *aabb,
        }
    }
}

/// Flattened node in DFS pre-order. The left child of an internal node is
/// always the next array slot; only the right child's offset is stored.
#[derive(Debug, Clone, Copy)]
pub struct LinearNode {
    pub aabb: Aabb,
    /// First-primitive index for leaves, second-child offset for internals.
    pub offset: usize,
    /// Number of primitives in a leaf; 0 marks an internal node.
    pub primitive_count: u16,
    /// Split axis, used to order children front-to-back along the ray.
    pub split_axis: u8,
}

/// Bounding volume hierarchy over the scene's bounded primitives. Building
/// reorders the scene's primitive array so each leaf's primitives are
/// contiguous; traversal then walks the flattened nodes with an explicit
/// stack. Unbounded planes are folded into every query after the BVH exits.
pub struct Bvh {
    nodes: Vec<LinearNode>,
}

const TRAVERSAL_STACK_SIZE: usize = 64;

impl Bvh {
    /// Builds the hierarchy and swaps the scene's primitives for the
    /// leaf-ordered array. An empty scene yields an empty node list and every
    /// traversal reports a miss.
    pub fn build(scene: &mut Scene, settings: &RenderSettings) -> Self {
        if scene.primitives.is_empty() {
            return Self { nodes: Vec::new() };
        }

        let mut info: Vec<PrimitiveInfo> = scene
            .primitives
            .iter()
            .enumerate()
            .map(|(index, primitive)| PrimitiveInfo::new(index, primitive.world_aabb()))
            .collect();

        let mut ordered_indices = Vec::with_capacity(scene.primitives.len());
        let mut total_nodes = 0usize;
        let root = Self::build_node(&mut info, settings, &mut total_nodes, &mut ordered_indices);

        // Reorder the primitives to match leaf emission order.
        let mut slots: Vec<Option<Primitive>> = scene.primitives.drain(..).map(Some).collect();
        scene.primitives = ordered_indices
            .iter()
            .map(|&index| slots[index].take().unwrap())
            .collect();

        let mut nodes = Vec::with_capacity(total_nodes);
        Self::flatten(&root, &mut nodes);
        debug_assert_eq!(nodes.len(), total_nodes);

        Self { nodes }
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    /// Total surface area of all leaf bounds — the quantity the SAH minimizes,
    /// exposed for build-quality comparisons.
    pub fn leaf_surface_area(&self) -> f64 {
        self.nodes
            .iter()
            .filter(|node| node.primitive_count > 0)
            .map(|node| node.aabb.surface_area())
            .sum()
    }

    fn build_node(
        info: &mut [PrimitiveInfo],
        settings: &RenderSettings,
        total_nodes: &mut usize,
        ordered: &mut Vec<usize>,
    ) -> BuildNode {
        *total_nodes += 1;

        let mut aabb = Aabb::empty();
        for primitive in info.iter() {
            aabb = Aabb::union(&aabb, &primitive.aabb);
        }

        let count = info.len();
        let make_leaf = |info: &[PrimitiveInfo], ordered: &mut Vec<usize>| {
            let first_primitive = ordered.len();
            ordered.extend(info.iter().map(|primitive| primitive.index));
            BuildNode::Leaf {
                aabb,
                first_primitive,
                count,
            }
        };

        if count == 1 {
            return make_leaf(info, ordered);
        }

        let mut centroid_aabb = Aabb::empty();
        for primitive in info.iter() {
            centroid_aabb = Aabb::union_point(&centroid_aabb, primitive.centroid);
        }
        let axis = centroid_aabb.longest_axis();

        // All centroids coincide along the split axis: splitting cannot make
        // progress, so the degenerate cluster becomes a leaf.
        if centroid_aabb.max[axis] == centroid_aabb.min[axis] {
            return make_leaf(info, ordered);
        }

        let mid = match settings.split_method {
            SplitMethod::Middle => {
                let midpoint = (centroid_aabb.min[axis] + centroid_aabb.max[axis]) / 2.0;
                let mid = partition_in_place(info, |primitive| {
                    primitive.centroid[axis] < midpoint
                });
                if mid == 0 || mid == count {
                    Self::split_equal_counts(info, axis)
                } else {
                    mid
                }
            }
            SplitMethod::EqualCounts => Self::split_equal_counts(info, axis),
            SplitMethod::Sah => {
                if count <= 4 {
                    Self::split_equal_counts(info, axis)
                } else {
                    match Self::split_sah(info, axis, &aabb, &centroid_aabb, settings.sah_buckets) {
                        Some(mid) => mid,
                        None => return make_leaf(info, ordered),
                    }
                }
            }
        };

        let (left_info, right_info) = info.split_at_mut(mid);
        let left = Self::build_node(left_info, settings, total_nodes, ordered);
        let right = Self::build_node(right_info, settings, total_nodes, ordered);
        BuildNode::Internal {
            aabb: Aabb::union(&left.aabb(), &right.aabb()),
            axis,
            children: Box::new([left, right]),
        }
    }

    /// Median split: everything left of the midpoint index has a smaller
    /// centroid along the axis than everything right of it.
    fn split_equal_counts(info: &mut [PrimitiveInfo], axis: usize) -> usize {
        let mid = info.len() / 2;
        info.select_nth_unstable_by(mid, |a, b| {
            a.centroid[axis].total_cmp(&b.centroid[axis])
        });
        mid
    }

    /// Bucketed surface-area-heuristic sweep. Returns the partition index,
    /// or `None` when keeping the whole range as a leaf is cheaper than the
    /// best split.
    fn split_sah(
        info: &mut [PrimitiveInfo],
        axis: usize,
        aabb: &Aabb,
        centroid_aabb: &Aabb,
        bucket_count: usize,
    ) -> Option<usize> {
        let bucket_of = |centroid: Point3| -> usize {
            let scaled = bucket_count as f64 * centroid_aabb.offset(centroid)[axis];
            (scaled as usize).min(bucket_count - 1)
        };

        let mut bucket_counts = vec![0usize; bucket_count];
        let mut bucket_bounds = vec![Aabb::empty(); bucket_count];
        for primitive in info.iter() {
            let bucket = bucket_of(primitive.centroid);
            bucket_counts[bucket] += 1;
            bucket_bounds[bucket] = Aabb::union(&bucket_bounds[bucket], &primitive.aabb);
        }

        // Cost of splitting after each bucket boundary: constant traversal
        // overhead plus area-weighted child intersection counts.
        let total_area = aabb.surface_area();
        let mut best_cost = f64::INFINITY;
        let mut best_bucket = 0;
        for split in 0..bucket_count - 1 {
            let mut left_aabb = Aabb::empty();
            let mut right_aabb = Aabb::empty();
            let mut left_count = 0usize;
            let mut right_count = 0usize;
            for bucket in 0..=split {
                left_aabb = Aabb::union(&left_aabb, &bucket_bounds[bucket]);
                left_count += bucket_counts[bucket];
            }
            for bucket in split + 1..bucket_count {
                right_aabb = Aabb::union(&right_aabb, &bucket_bounds[bucket]);
                right_count += bucket_counts[bucket];
            }
            let cost = 0.125
                + (left_count as f64 * left_aabb.surface_area()
                    + right_count as f64 * right_aabb.surface_area())
                    / total_area;
            if cost < best_cost {
                best_cost = cost;
                best_bucket = split;
            }
        }

        let leaf_cost = info.len() as f64;
        if best_cost < leaf_cost {
            let mid = partition_in_place(info, |primitive| {
                bucket_of(primitive.centroid) <= best_bucket
            });
            Some(mid)
        } else {
            None
        }
    }

    /// DFS pre-order flattening: a node's left child lands directly after it,
    /// the right child's index is patched in once its subtree is written.
    fn flatten(node: &BuildNode, nodes: &mut Vec<LinearNode>) -> usize {
        let current = nodes.len();
        match node {
            BuildNode::Leaf {
                aabb,
                first_primitive,
                count,
            } => {
                nodes.push(LinearNode {
                    aabb: *aabb,
                    offset: *first_primitive,
                    primitive_count: *count as u16,
                    split_axis: 0,
                });
            }
            BuildNode::Internal {
                aabb,
                axis,
                children,
            } => {
                nodes.push(LinearNode {
                    aabb: *aabb,
                    offset: 0,
                    primitive_count: 0,
                    split_axis: *axis as u8,
                });
                Self::flatten(&children[0], nodes);
                let second_child = Self::flatten(&children[1], nodes);
                nodes[current].offset = second_child;
            }
        }
        current
    }

    /// Closest hit over the whole scene.
    pub fn intersect(&self, scene: &Scene, ray: &Ray) -> Interaction {
        self.traverse(scene, ray, TraversalMode::Closest)
    }

    /// First hit within `max_distance`, in traversal order.
    pub fn intersect_within(&self, scene: &Scene, ray: &Ray, max_distance: f64) -> Interaction {
        self.traverse(scene, ray, TraversalMode::FirstWithinDistance(max_distance))
    }

    /// First non-transparent hit within `max_distance` — the occlusion query.
    pub fn intersect_opaque_within(
        &self,
        scene: &Scene,
        ray: &Ray,
        max_distance: f64,
    ) -> Interaction {
        self.traverse(
            scene,
            ray,
            TraversalMode::FirstNonTransparentWithinDistance(max_distance),
        )
    }

    fn traverse(&self, scene: &Scene, ray: &Ray, mode: TraversalMode) -> Interaction {
        let mut closest = Interaction::none();
        let slabs = RaySlabs::new(ray);

        let mut stack = [0usize; TRAVERSAL_STACK_SIZE];
        let mut stack_top = 0usize;
        let mut current = 0usize;

        while !self.nodes.is_empty() {
            let node = &self.nodes[current];

            if node
                .aabb
                .hit_precomputed(ray, slabs.reciprocals, slabs.is_negative)
            {
                if node.primitive_count > 0 {
                    for i in 0..node.primitive_count as usize {
                        let index = node.offset + i;
                        let mut tentative = Interaction::none();
                        scene.primitives[index].intersect(ray, &scene.textures, &mut tentative);
                        if !tentative.hit {
                            continue;
                        }
                        tentative.primitive = PrimitiveRef::Object(index);

                        match mode {
                            TraversalMode::FirstNonTransparentWithinDistance(max_distance) => {
                                if tentative.distance <= max_distance
                                    && scene.materials[tentative.material].transparency < 1.0
                                {
                                    return tentative;
                                }
                            }
                            TraversalMode::FirstWithinDistance(max_distance) => {
                                if tentative.distance <= max_distance {
                                    return tentative;
                                }
                            }
                            TraversalMode::Closest => {
                                if tentative.distance < closest.distance {
                                    closest = tentative;
                                }
                            }
                        }
                    }

                    if stack_top == 0 {
                        break;
                    }
                    stack_top -= 1;
                    current = stack[stack_top];
                } else {
                    // Descend into the child the ray reaches first; the
                    // sibling waits on the stack.
                    if slabs.is_negative[node.split_axis as usize] != 0 {
                        stack[stack_top] = current + 1;
                        current = node.offset;
                    } else {
                        stack[stack_top] = node.offset;
                        current += 1;
                    }
                    stack_top += 1;
                }
            } else {
                if stack_top == 0 {
                    break;
                }
                stack_top -= 1;
                current = stack[stack_top];
            }
        }

        // Infinite planes live outside the hierarchy; fold them in under the
        // same mode semantics.
        for (index, plane) in scene.planes.iter().enumerate() {
            let mut tentative = Interaction::none();
            plane.intersect(ray, &scene.textures, &mut tentative);
            if !tentative.hit {
                continue;
            }
            tentative.primitive = PrimitiveRef::Plane(index);

            match mode {
                TraversalMode::FirstNonTransparentWithinDistance(max_distance) => {
                    if tentative.distance <= max_distance
                        && scene.materials[tentative.material].transparency < 1.0
                    {
                        return tentative;
                    }
                }
                TraversalMode::FirstWithinDistance(max_distance) => {
                    if tentative.distance <= max_distance {
                        return tentative;
                    }
                }
                TraversalMode::Closest => {
                    if tentative.distance <= closest.distance {
                        closest = tentative;
                    }
                }
            }
        }

        closest
    }
}

/// Stable-enough in-place partition: returns the index of the first element
/// for which the predicate is false.
fn partition_in_place<T>(items: &mut [T], mut predicate: impl FnMut(&T) -> bool) -> usize {
    let mut split = 0;
    for i in 0..items.len() {
        if predicate(&items[i]) {
            items.swap(split, i);
            split += 1;
        }
    }
    split
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::material::Material;
    use crate::math::{Mat4, Vec3};
    use crate::primitive::Shape;
    use rand::rngs::SmallRng;
    use rand::{Rng, SeedableRng};

    fn sphere_at(center: Point3, radius: f64, material: usize) -> Primitive {
        let transform = Mat4::translation(center) * Mat4::scaling(Vec3::splat(radius));
        Primitive::new(Shape::Sphere, transform, material)
    }

    fn random_sphere_scene(count: usize, seed: u64) -> Scene {
        let mut scene = Scene::new();
        scene.add_material(Material::default());
        let mut rng = SmallRng::seed_from_u64(seed);
        for _ in 0..count {
            // Box-Muller gives the Gaussian cluster the SAH comparison wants.
            let gaussian = |rng: &mut SmallRng| {
                let u1: f64 = rng.gen_range(1e-9..1.0);
                let u2: f64 = rng.gen_range(0.0..1.0);
                (-2.0 * u1.ln()).sqrt() * (std::f64::consts::TAU * u2).cos()
            };
            let center = Point3::new(
                gaussian(&mut rng) * 5.0,
                gaussian(&mut rng) * 5.0,
                gaussian(&mut rng) * 5.0,
            );
            scene.add_primitive(sphere_at(center, rng.gen_range(0.05..0.3), 0));
        }
        scene
    }

    fn brute_force_closest(scene: &Scene, ray: &Ray) -> Interaction {
        let mut closest = Interaction::none();
        for (index, primitive) in scene.primitives.iter().enumerate() {
            let mut tentative = Interaction::none();
            primitive.intersect(ray, &scene.textures, &mut tentative);
            if tentative.hit && tentative.distance < closest.distance {
                tentative.primitive = PrimitiveRef::Object(index);
                closest = tentative;
            }
        }
        for (index, plane) in scene.planes.iter().enumerate() {
            let mut tentative = Interaction::none();
            plane.intersect(ray, &scene.textures, &mut tentative);
            if tentative.hit && tentative.distance < closest.distance {
                tentative.primitive = PrimitiveRef::Plane(index);
                closest = tentative;
            }
        }
        closest
    }

    #[test]
    fn empty_scene_always_misses() {
        let mut scene = Scene::new();
        scene.add_material(Material::default());
        let bvh = Bvh::build(&mut scene, &RenderSettings::default());
        let hit = bvh.intersect(&scene, &Ray::new(Point3::zero(), Vec3::unit_z()));
        assert!(!hit.hit);
        assert_eq!(bvh.node_count(), 0);
    }

    #[test]
    fn closest_matches_brute_force_for_all_heuristics() {
        for split_method in [SplitMethod::Sah, SplitMethod::Middle, SplitMethod::EqualCounts] {
            let mut scene = random_sphere_scene(200, 11);
            let settings = RenderSettings {
                split_method,
                ..RenderSettings::default()
            };
            let bvh = Bvh::build(&mut scene, &settings);

            let mut rng = SmallRng::seed_from_u64(99);
            for _ in 0..200 {
                let origin = Point3::new(
                    rng.gen_range(-20.0..20.0),
                    rng.gen_range(-20.0..20.0),
                    rng.gen_range(-20.0..20.0),
                );
                let direction = Vec3::random_unit_vector(&mut rng);
                let ray = Ray::new(origin, direction);

                let expected = brute_force_closest(&scene, &ray);
                let actual = bvh.intersect(&scene, &ray);
                assert_eq!(expected.hit, actual.hit, "{split_method:?}");
                if expected.hit {
                    assert!(
                        (expected.distance - actual.distance).abs() < 1e-9,
                        "{split_method:?}: {} vs {}",
                        expected.distance,
                        actual.distance
                    );
                }
            }
        }
    }

    #[test]
    fn sah_beats_equal_counts_on_leaf_area() {
        // Gaussian sphere cloud: compare total leaf surface area.
        let settings_sah = RenderSettings {
            split_method: SplitMethod::Sah,
            ..RenderSettings::default()
        };
        let settings_equal = RenderSettings {
            split_method: SplitMethod::EqualCounts,
            ..RenderSettings::default()
        };

        let mut scene_sah = random_sphere_scene(1000, 7);
        let sah = Bvh::build(&mut scene_sah, &settings_sah);

        let mut scene_equal = random_sphere_scene(1000, 7);
        let equal = Bvh::build(&mut scene_equal, &settings_equal);

        assert!(sah.leaf_surface_area() <= equal.leaf_surface_area());
    }

    #[test]
    fn planes_fold_into_closest_mode() {
        let mut scene = Scene::new();
        scene.add_material(Material::default());
        scene.add_primitive(sphere_at(Point3::new(0.0, 5.0, 0.0), 1.0, 0));
        scene.add_primitive(Primitive::new(Shape::Plane, Mat4::identity(), 0));
        let bvh = Bvh::build(&mut scene, &RenderSettings::default());

        // Straight down: the plane is closer than the sphere is reachable.
        let ray = Ray::new(Point3::new(0.0, 2.0, 0.0), Vec3::new(0.0, -1.0, 0.0));
        let hit = bvh.intersect(&scene, &ray);
        assert!(hit.hit);
        assert!(matches!(hit.primitive, PrimitiveRef::Plane(0)));
        assert!((hit.distance - 2.0).abs() < 1e-9);
    }

    #[test]
    fn within_distance_mode_honors_bound() {
        let mut scene = Scene::new();
        scene.add_material(Material::default());
        scene.add_primitive(sphere_at(Point3::new(0.0, 0.0, 5.0), 1.0, 0));
        let bvh = Bvh::build(&mut scene, &RenderSettings::default());

        let ray = Ray::new(Point3::zero(), Vec3::unit_z());
        assert!(bvh.intersect_within(&scene, &ray, 10.0).hit);
        assert!(!bvh.intersect_within(&scene, &ray, 2.0).hit);
    }

    #[test]
    fn opaque_mode_skips_fully_transparent_surfaces() {
        let mut scene = Scene::new();
        scene.add_material(Material {
            transparency: 1.0,
            ..Material::default()
        });
        scene.add_material(Material::default());
        scene.add_primitive(sphere_at(Point3::new(0.0, 0.0, 3.0), 1.0, 0));
        scene.add_primitive(sphere_at(Point3::new(0.0, 0.0, 8.0), 1.0, 1));
        let bvh = Bvh::build(&mut scene, &RenderSettings::default());

        let ray = Ray::new(Point3::zero(), Vec3::unit_z());
        let hit = bvh.intersect_opaque_within(&scene, &ray, 20.0);
        assert!(hit.hit);
        assert_eq!(hit.material, 1);
    }

    #[test]
    fn build_orders_primitives_contiguously() {
        let mut scene = random_sphere_scene(64, 3);
        let bvh = Bvh::build(&mut scene, &RenderSettings::default());
        assert_eq!(scene.primitives.len(), 64);
        assert!(bvh.node_count() >= 1);
        // Every ray must still find its target after the reorder.
        let ray = Ray::new(Point3::new(0.0, 0.0, -50.0), Vec3::unit_z());
        let expected = brute_force_closest(&scene, &ray);
        let actual = bvh.intersect(&scene, &ray);
        assert_eq!(expected.hit, actual.hit);
    }
}
