use crate::material::MaterialId;
use crate::math::{slab_precompute, Aabb, Mat4, Point3, Ray, Vec2, Vec3};
use crate::scene::Entity;
use crate::texture::Texture;

pub type TextureId = usize;

/// Which arena a hit primitive lives in: the BVH-ordered object array or the
/// unbounded plane list kept outside the hierarchy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PrimitiveRef {
    Object(usize),
    Plane(usize),
}

const EPSILON: f64 = 1e-6;

/// The record produced by an intersection query: where the ray met the
/// surface, the (possibly normal-mapped) world normal, UV coordinates, and
/// handles back into the scene arenas.
#[derive(Debug, Clone, Copy)]
pub struct Interaction {
    pub hit: bool,
    pub point: Point3,
    pub normal: Vec3,
    pub uv: Vec2,
    pub distance: f64,
    pub primitive: PrimitiveRef,
    pub material: MaterialId,
}

impl Interaction {
    pub const fn none() -> Self {
        Self {
            hit: false,
            point: Point3::zero(),
            normal: Vec3::zero(),
            uv: Vec2::zero(),
            distance: f64::INFINITY,
            primitive: PrimitiveRef::Object(0),
            material: 0,
        }
    }
}

impl Default for Interaction {
    fn default() -> Self {
        Self::none()
    }
}

/// One triangle corner: object-space position plus the attributes the mesh
/// pipeline accumulated for it.
#[derive(Debug, Clone, Copy)]
pub struct TriangleVertex {
    pub position: Point3,
    pub uv: Option<Vec2>,
    pub normal: Vec3,
    pub tangent: Vec3,
    pub bitangent: Vec3,
}

/// Precomputed triangle data: the face cross product and its inverse squared
/// length drive the barycentric test without per-ray divisions.
#[derive(Debug, Clone)]
pub struct TriangleData {
    pub vertices: [TriangleVertex; 3],
    face_cross: Vec3,
    inv_denominator: f64,
    normal: Vec3,
    pub smooth_shading: bool,
}

impl TriangleData {
    pub fn new(vertices: [TriangleVertex; 3], smooth_shading: bool) -> Self {
        let face_cross = (vertices[1].position - vertices[0].position)
            .cross(vertices[2].position - vertices[0].position);
        let len_sq = face_cross.length_squared();
        // Zero-area triangles keep a harmless denominator; the barycentric
        // test then rejects every ray instead of dividing by zero.
        let inv_denominator = if len_sq > 0.0 { 1.0 / len_sq } else { 0.0 };
        let normal = if len_sq > 0.0 {
            face_cross / len_sq.sqrt()
        } else {
            Vec3::unit_y()
        };
        Self {
            vertices,
            face_cross,
            inv_denominator,
            normal,
            smooth_shading,
        }
    }
}

/// Geometric variant of a primitive. Everything shared (transform, AABBs,
/// material and texture handles) lives on `Primitive`; the enum carries only
/// per-shape data. Enum dispatch keeps the BVH leaf loop over a contiguous
/// primitive array without virtual calls.
#[derive(Debug, Clone)]
pub enum Shape {
    /// Unit sphere at the local origin.
    Sphere,
    /// Infinite plane y = 0 with normal +y.
    Plane,
    /// Unit disk in the y = 0 plane.
    Disk,
    /// Infinite plane alternating two materials on integer tiles.
    Chessboard { even: MaterialId, odd: MaterialId },
    /// Unit cone: apex at the origin, axis +y, y ∈ [0, 1].
    Cone,
    Triangle(TriangleData),
}

/// A positioned, intersectable scene object.
pub struct Primitive {
    pub entity: Entity,
    /// Transpose of the inverse transform: pushes local normals to world space.
    normal_matrix: Mat4,
    local_aabb: Aabb,
    world_aabb: Aabb,
    pub material: MaterialId,
    pub albedo_texture: Option<TextureId>,
    pub normal_map: Option<TextureId>,
    /// Ambient-occlusion / roughness / metallic texture (R = roughness,
    /// G = metallic, B = occlusion).
    pub aorm_texture: Option<TextureId>,
    pub shape: Shape,
}

impl Primitive {
    pub fn new(shape: Shape, transform: Mat4, material: MaterialId) -> Self {
        Self::with_textures(shape, transform, material, None, None, None)
    }

    pub fn with_textures(
        shape: Shape,
        transform: Mat4,
        material: MaterialId,
        albedo_texture: Option<TextureId>,
        normal_map: Option<TextureId>,
        aorm_texture: Option<TextureId>,
    ) -> Self {
        let entity = Entity::new(transform);
        let normal_matrix = entity.inverse.transpose();
        let local_aabb = Self::local_bounds(&shape);
        let world_aabb = Self::world_bounds(&shape, &entity.transform, local_aabb);
        Self {
            entity,
            normal_matrix,
            local_aabb,
            world_aabb,
            material,
            albedo_texture,
            normal_map,
            aorm_texture,
            shape,
        }
    }

    fn local_bounds(shape: &Shape) -> Aabb {
        match shape {
            Shape::Sphere => Aabb::new(Point3::splat(-1.0), Point3::splat(1.0)),
            Shape::Plane | Shape::Chessboard { .. } => Aabb::new(
                Point3::splat(f64::NEG_INFINITY),
                Point3::splat(f64::INFINITY),
            ),
            Shape::Disk => Aabb::new(Point3::new(-1.0, 0.0, -1.0), Point3::new(1.0, 0.0, 1.0)),
            Shape::Cone => Aabb::new(Point3::new(-1.0, 0.0, -1.0), Point3::new(1.0, 1.0, 1.0)),
            Shape::Triangle(data) => {
                let mut aabb = Aabb::empty();
                for vertex in &data.vertices {
                    aabb = Aabb::union_point(&aabb, vertex.position);
                }
                aabb
            }
        }
    }

    /// World bounds enclose every transformed corner of the local box, so the
    /// enclosure invariant survives rotations. Triangles transform their
    /// actual vertices for a tighter fit.
    fn world_bounds(shape: &Shape, transform: &Mat4, local: Aabb) -> Aabb {
        match shape {
            Shape::Plane | Shape::Chessboard { .. } => local,
            Shape::Triangle(data) => {
                let mut aabb = Aabb::empty();
                for vertex in &data.vertices {
                    aabb = Aabb::union_point(&aabb, transform.transform_point(vertex.position));
                }
                aabb
            }
            _ => {
                let mut aabb = Aabb::empty();
                for ix in 0..2 {
                    for iy in 0..2 {
                        for iz in 0..2 {
                            let corner = Point3::new(
                                if ix == 0 { local.min.x } else { local.max.x },
                                if iy == 0 { local.min.y } else { local.max.y },
                                if iz == 0 { local.min.z } else { local.max.z },
                            );
                            aabb = Aabb::union_point(&aabb, transform.transform_point(corner));
                        }
                    }
                }
                aabb
            }
        }
    }

    pub fn local_aabb(&self) -> Aabb {
        self.local_aabb
    }

    pub fn world_aabb(&self) -> Aabb {
        self.world_aabb
    }

    pub fn centroid(&self) -> Point3 {
        self.world_aabb.min * 0.5 + self.world_aabb.max * 0.5
    }

    /// Planes (and chessboards) have infinite bounds and live outside the BVH.
    pub fn is_unbounded(&self) -> bool {
        !self.world_aabb.min.x.is_finite() || !self.world_aabb.max.x.is_finite()
    }

    fn localize_ray(&self, ray: &Ray) -> Ray {
        let direction = self.entity.inverse.transform_vector(ray.direction).normalized();
        let origin = self.entity.inverse.transform_point(ray.origin);
        Ray::in_medium(origin, direction, ray.medium_ior)
    }

    /// Pushes a local-space hit back to world space: point through the
    /// transform, normal through the normal matrix, distance recomputed from
    /// the world-space ray origin.
    fn delocalize(&self, interaction: &mut Interaction, world_ray_origin: Point3) {
        interaction.point = self.entity.transform.transform_point(interaction.point);
        interaction.normal = self
            .normal_matrix
            .transform_vector(interaction.normal)
            .normalized();
        interaction.distance = world_ray_origin.distance(interaction.point);
    }

    /// Intersects the primitive with a world-space ray, filling `interaction`
    /// on a hit. The texture arena is threaded in for normal mapping.
    pub fn intersect(&self, ray: &Ray, textures: &[Texture], interaction: &mut Interaction) {
        match &self.shape {
            Shape::Sphere => self.intersect_sphere(ray, textures, interaction),
            Shape::Plane => self.intersect_plane(ray, self.material, interaction),
            Shape::Chessboard { even, odd } => self.intersect_chessboard(ray, *even, *odd, interaction),
            Shape::Disk => self.intersect_disk(ray, interaction),
            Shape::Cone => self.intersect_cone(ray, interaction),
            Shape::Triangle(data) => self.intersect_triangle(ray, data, textures, interaction),
        }
    }

    fn intersect_sphere(&self, ray: &Ray, textures: &[Texture], interaction: &mut Interaction) {
        let local_ray = self.localize_ray(ray);

        // Projection of the center-to-origin vector onto the direction gives
        // the closest-approach parameter; the perpendicular distance decides
        // hit or miss against the unit radius.
        let c = -local_ray.origin;
        let a = c.dot(local_ray.direction);
        let d_sq = c.length_squared() - a * a;
        if d_sq > 1.0 || a < -1.0 {
            return;
        }
        let d = d_sq.max(0.0).sqrt();

        let point = if (d - 1.0).abs() < EPSILON {
            local_ray.at(a)
        } else {
            let b = (1.0 - d_sq).sqrt();
            let first = local_ray.at(a - b);
            let second = local_ray.at(a + b);
            let first_in_front = local_ray.direction.dot(first - local_ray.origin) > 0.0;
            let second_in_front = local_ray.direction.dot(second - local_ray.origin) > 0.0;
            match (first_in_front, second_in_front) {
                (true, true) => {
                    if local_ray.origin.distance(first) < local_ray.origin.distance(second) {
                        first
                    } else {
                        second
                    }
                }
                (true, false) => first,
                (false, true) => second,
                (false, false) => return,
            }
        };

        let azimuthal = point.y.atan2(point.x);
        let polar = point.z.clamp(-1.0, 1.0).acos();
        let uv = Vec2::new(
            azimuthal / (2.0 * std::f64::consts::PI) + 0.5,
            polar / std::f64::consts::PI,
        );

        let mut normal = point;
        if let Some(map) = self.normal_map {
            // First-order UV derivative gives the tangent; the map perturbs
            // the normal in this tangent-space basis.
            let tangent = Vec3::new(-point.y, point.x, 0.0);
            if !tangent.near_zero() {
                let bitangent = normal.cross(tangent).normalized();
                let sampled = textures[map].sample(uv);
                let perturbed = Vec3::new(
                    2.0 * sampled.x - 1.0,
                    2.0 * sampled.y - 1.0,
                    2.0 * sampled.z - 1.0,
                );
                normal = (tangent * perturbed.x + bitangent * perturbed.y + normal * perturbed.z)
                    .normalized();
            }
        }

        interaction.hit = true;
        interaction.point = point;
        interaction.normal = normal;
        interaction.uv = uv;
        interaction.material = self.material;
        self.delocalize(interaction, ray.origin);
    }

    fn intersect_plane(&self, ray: &Ray, material: MaterialId, interaction: &mut Interaction) {
        let local_ray = self.localize_ray(ray);
        let normal = Vec3::unit_y();

        let dot_normal_ray = local_ray.direction.dot(normal);
        if dot_normal_ray.abs() < EPSILON {
            return;
        }

        let lambda = normal.dot(-local_ray.origin) / dot_normal_ray;
        if lambda < EPSILON {
            return;
        }

        interaction.hit = true;
        interaction.normal = normal;
        interaction.point = local_ray.at(lambda);
        interaction.uv = Vec2::zero();
        interaction.material = material;
        self.delocalize(interaction, ray.origin);
    }

    fn intersect_chessboard(
        &self,
        ray: &Ray,
        even: MaterialId,
        odd: MaterialId,
        interaction: &mut Interaction,
    ) {
        let local_ray = self.localize_ray(ray);
        let normal = Vec3::unit_y();

        let dot_normal_ray = local_ray.direction.dot(normal);
        if dot_normal_ray.abs() < EPSILON {
            return;
        }
        let lambda = normal.dot(-local_ray.origin) / dot_normal_ray;
        if lambda < EPSILON {
            return;
        }

        let point = local_ray.at(lambda);
        let unit_x = point.x.floor() as i64;
        let unit_z = point.z.floor() as i64;
        let material = if (unit_x + unit_z).rem_euclid(2) == 0 {
            even
        } else {
            odd
        };

        interaction.hit = true;
        interaction.normal = normal;
        interaction.point = point;
        interaction.uv = Vec2::zero();
        interaction.material = material;
        self.delocalize(interaction, ray.origin);
    }

    fn intersect_disk(&self, ray: &Ray, interaction: &mut Interaction) {
        let local_ray = self.localize_ray(ray);
        let normal = Vec3::unit_y();

        let dot_normal_ray = local_ray.direction.dot(normal);
        if dot_normal_ray.abs() < EPSILON {
            return;
        }
        let lambda = normal.dot(-local_ray.origin) / dot_normal_ray;
        let point = local_ray.at(lambda);
        if lambda < EPSILON || point.length() > 1.0 {
            return;
        }

        interaction.hit = true;
        interaction.normal = normal;
        interaction.point = point;
        interaction.uv = Vec2::zero();
        interaction.material = self.material;
        self.delocalize(interaction, ray.origin);
    }

    fn intersect_cone(&self, ray: &Ray, interaction: &mut Interaction) {
        let local_ray = self.localize_ray(ray);
        let (o, d) = (local_ray.origin, local_ray.direction);

        // x² + z² = y² restricted to y ∈ [0, 1].
        let a = d.x * d.x + d.z * d.z - d.y * d.y;
        let b = 2.0 * (o.x * d.x + o.z * d.z - o.y * d.y);
        let c = o.x * o.x + o.z * o.z - o.y * o.y;

        let radicand = b * b - 4.0 * a * c;
        if radicand < 0.0 {
            return;
        }

        let lambda = if radicand == 0.0 {
            let lambda = -b / (2.0 * a);
            if lambda < 0.0 {
                return;
            }
            lambda
        } else {
            let sqrt_radicand = radicand.sqrt();
            let lambda_1 = (-b + sqrt_radicand) / (2.0 * a);
            let lambda_2 = (-b - sqrt_radicand) / (2.0 * a);
            match (lambda_1.min(lambda_2), lambda_1.max(lambda_2)) {
                (near, _) if near >= 0.0 => near,
                (_, far) if far >= 0.0 => far,
                _ => return,
            }
        };

        let point = local_ray.at(lambda);
        let height = point.dot(Vec3::unit_y());
        if !(0.0..=1.0).contains(&height) {
            return;
        }

        let normal = Vec3::new(2.0 * point.x, -2.0 * point.y, 2.0 * point.z).normalized();

        interaction.hit = true;
        interaction.normal = normal;
        interaction.point = point;
        interaction.uv = Vec2::zero();
        interaction.material = self.material;
        self.delocalize(interaction, ray.origin);
    }

    fn intersect_triangle(
        &self,
        ray: &Ray,
        data: &TriangleData,
        textures: &[Texture],
        interaction: &mut Interaction,
    ) {
        let local_ray = self.localize_ray(ray);
        let vertices = &data.vertices;

        let dot_normal_ray = local_ray.direction.dot(data.normal);
        if dot_normal_ray.abs() < EPSILON {
            return;
        }

        let lambda = data.normal.dot(vertices[0].position - local_ray.origin) / dot_normal_ray;
        if lambda < 0.0 {
            return;
        }
        let point = local_ray.at(lambda);

        // Barycentric weights from sub-triangle cross products against the
        // precomputed face cross product; slightly negative weights within
        // -ε are accepted to keep shared edges watertight.
        let mut barycentric = [0.0f64; 3];
        for i in 0..3 {
            let cross = (vertices[(i + 1) % 3].position - point)
                .cross(vertices[(i + 2) % 3].position - point);
            barycentric[i] = data.face_cross.dot(cross) * data.inv_denominator;
            if barycentric[i] < -EPSILON {
                return;
            }
        }

        let uv = if vertices[0].uv.is_some() {
            let mut uv = Vec2::zero();
            for i in 0..3 {
                uv += vertices[i].uv.unwrap_or(Vec2::zero()) * barycentric[i];
            }
            uv
        } else {
            Vec2::zero()
        };

        let mut normal = data.normal;
        if data.smooth_shading {
            if let Some(map) = self.normal_map {
                // Per-hit TBN from the barycentric-interpolated frame.
                let mut tangent = Vec3::zero();
                let mut bitangent = Vec3::zero();
                let mut smooth_normal = Vec3::zero();
                for i in 0..3 {
                    tangent += vertices[i].tangent * barycentric[i];
                    bitangent += vertices[i].bitangent * barycentric[i];
                    smooth_normal += vertices[i].normal * barycentric[i];
                }
                let sampled = textures[map].sample(uv);
                let perturbed = Vec3::new(
                    2.0 * sampled.x - 1.0,
                    2.0 * sampled.y - 1.0,
                    2.0 * sampled.z - 1.0,
                );
                normal = (tangent * perturbed.x
                    + bitangent * perturbed.y
                    + smooth_normal * perturbed.z)
                    .normalized();
            } else {
                let mut smooth_normal = Vec3::zero();
                for i in 0..3 {
                    smooth_normal += vertices[i].normal * barycentric[i];
                }
                normal = smooth_normal.normalized();
            }
        }

        interaction.hit = true;
        interaction.normal = normal;
        interaction.uv = uv;
        interaction.point = point;
        interaction.material = self.material;
        self.delocalize(interaction, ray.origin);
    }

    /// Surface tangent for the anisotropic GGX lobe. Each shape picks the
    /// frame its parameterization implies.
    pub fn compute_tangent(&self, normal: Vec3, surface_point: Point3) -> Vec3 {
        match &self.shape {
            Shape::Sphere | Shape::Cone => {
                // Gram-Schmidt of the y axis against the normal, with the x
                // axis as fallback near the poles.
                let reference = if normal.y.abs() > 0.99 {
                    Vec3::unit_x()
                } else {
                    Vec3::unit_y()
                };
                (reference - normal * reference.dot(normal)).normalized()
            }
            Shape::Plane | Shape::Chessboard { .. } => {
                let local = self.entity.inverse.transform_point(surface_point);
                if local.near_zero() {
                    Vec3::unit_x()
                } else {
                    local.normalized()
                }
            }
            Shape::Disk => {
                let radial = self.entity.world_origin - surface_point;
                if radial.near_zero() {
                    Vec3::unit_x()
                } else {
                    radial.normalized()
                }
            }
            Shape::Triangle(_) => {
                let extent = self.world_aabb.diagonal();
                let tangent = Vec3::new(0.0, extent.y, extent.z);
                if tangent.near_zero() {
                    Vec3::unit_x()
                } else {
                    tangent.normalized()
                }
            }
        }
    }

    /// Diffuse color at a hit: the albedo texture when bound, else the
    /// material (which may synthesize marble from the surface point).
    pub fn diffuse_at(
        &self,
        uv: Vec2,
        surface_point: Point3,
        textures: &[Texture],
        material: &crate::material::Material,
        perlin: &crate::perlin::Perlin,
    ) -> crate::math::Color {
        match self.albedo_texture {
            Some(id) => textures[id].sample(uv),
            None => material.diffuse_at(surface_point, perlin),
        }
    }

    /// Roughness from the R channel of the AO-R-M texture, else the material.
    pub fn roughness_at(
        &self,
        uv: Vec2,
        textures: &[Texture],
        material: &crate::material::Material,
    ) -> f64 {
        match self.aorm_texture {
            Some(id) => textures[id].sample(uv).x,
            None => material.roughness,
        }
    }

    /// Metallic from the G channel of the AO-R-M texture.
    pub fn metallic_at(
        &self,
        uv: Vec2,
        textures: &[Texture],
        material: &crate::material::Material,
    ) -> f64 {
        match self.aorm_texture {
            Some(id) => textures[id].sample(uv).y,
            None => material.roughness,
        }
    }

    /// Ambient occlusion from the B channel of the AO-R-M texture, else 1.
    pub fn ambient_occlusion_at(&self, uv: Vec2, textures: &[Texture]) -> f64 {
        match self.aorm_texture {
            Some(id) => textures[id].sample(uv).z,
            None => 1.0,
        }
    }
}

/// Shared precomputation for one ray against many AABBs.
pub struct RaySlabs {
    pub reciprocals: Vec3,
    pub is_negative: [usize; 3],
}

impl RaySlabs {
    pub fn new(ray: &Ray) -> Self {
        let (reciprocals, is_negative) = slab_precompute(ray);
        Self {
            reciprocals,
            is_negative,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::math::Mat4;

    fn unit_sphere() -> Primitive {
        Primitive::new(Shape::Sphere, Mat4::identity(), 0)
    }

    #[test]
    fn sphere_frontal_hit() {
        // Hit point, normal, distance, and UV of a head-on ray.
        let sphere = unit_sphere();
        let ray = Ray::new(Point3::new(0.0, 0.0, -2.0), Vec3::unit_z());
        let mut interaction = Interaction::none();
        sphere.intersect(&ray, &[], &mut interaction);

        assert!(interaction.hit);
        assert!((interaction.point - Point3::new(0.0, 0.0, -1.0)).near_zero());
        assert!((interaction.normal - Vec3::new(0.0, 0.0, -1.0)).near_zero());
        assert!((interaction.distance - 1.0).abs() < 1e-9);
        assert!((interaction.uv.x - 0.5).abs() < 1e-9);
        assert!((interaction.uv.y - 1.0).abs() < 1e-9);
    }

    #[test]
    fn sphere_behind_ray_misses() {
        let sphere = unit_sphere();
        let ray = Ray::new(Point3::new(0.0, 0.0, 3.0), Vec3::unit_z());
        let mut interaction = Interaction::none();
        sphere.intersect(&ray, &[], &mut interaction);
        assert!(!interaction.hit);
    }

    #[test]
    fn sphere_interior_origin_hits_far_side() {
        let sphere = unit_sphere();
        let ray = Ray::new(Point3::zero(), Vec3::unit_x());
        let mut interaction = Interaction::none();
        sphere.intersect(&ray, &[], &mut interaction);
        assert!(interaction.hit);
        assert!((interaction.point - Point3::new(1.0, 0.0, 0.0)).near_zero());
    }

    #[test]
    fn scaled_sphere_world_aabb_encloses_surface() {
        let transform = Mat4::translation(Vec3::new(2.0, 0.0, 0.0))
            * Mat4::rotation_z(0.8)
            * Mat4::scaling(Vec3::new(2.0, 1.0, 1.0));
        let sphere = Primitive::new(Shape::Sphere, transform, 0);
        assert_eq!(
            sphere.local_aabb(),
            Aabb::new(Point3::splat(-1.0), Point3::splat(1.0))
        );
        let aabb = sphere.world_aabb();

        // Sample the local unit sphere and check every transformed point.
        for i in 0..16 {
            for j in 0..8 {
                let azimuthal = i as f64 / 16.0 * std::f64::consts::TAU;
                let polar = j as f64 / 8.0 * std::f64::consts::PI;
                let local = Point3::new(
                    polar.sin() * azimuthal.cos(),
                    polar.sin() * azimuthal.sin(),
                    polar.cos(),
                );
                let world = transform.transform_point(local);
                assert!(
                    world.x >= aabb.min.x - 1e-9 && world.x <= aabb.max.x + 1e-9,
                    "x escaped"
                );
                assert!(world.y >= aabb.min.y - 1e-9 && world.y <= aabb.max.y + 1e-9);
                assert!(world.z >= aabb.min.z - 1e-9 && world.z <= aabb.max.z + 1e-9);
            }
        }
    }

    #[test]
    fn plane_rejects_parallel_rays() {
        let plane = Primitive::new(Shape::Plane, Mat4::identity(), 0);
        let ray = Ray::new(Point3::new(0.0, 1.0, 0.0), Vec3::unit_x());
        let mut interaction = Interaction::none();
        plane.intersect(&ray, &[], &mut interaction);
        assert!(!interaction.hit);
    }

    #[test]
    fn plane_hit_from_above() {
        let plane = Primitive::new(Shape::Plane, Mat4::identity(), 3);
        let ray = Ray::new(
            Point3::new(0.5, 2.0, 0.0),
            Vec3::new(0.0, -1.0, 0.0),
        );
        let mut interaction = Interaction::none();
        plane.intersect(&ray, &[], &mut interaction);
        assert!(interaction.hit);
        assert_eq!(interaction.material, 3);
        assert!((interaction.distance - 2.0).abs() < 1e-9);
        assert!(plane.is_unbounded());
    }

    #[test]
    fn disk_limits_plane_to_unit_radius() {
        let disk = Primitive::new(Shape::Disk, Mat4::identity(), 0);
        let down = Vec3::new(0.0, -1.0, 0.0);
        let mut hit = Interaction::none();
        disk.intersect(&Ray::new(Point3::new(0.5, 1.0, 0.0), down), &[], &mut hit);
        assert!(hit.hit);
        let mut miss = Interaction::none();
        disk.intersect(&Ray::new(Point3::new(1.5, 1.0, 0.0), down), &[], &mut miss);
        assert!(!miss.hit);
    }

    #[test]
    fn chessboard_alternates_materials() {
        let board = Primitive::new(Shape::Chessboard { even: 10, odd: 20 }, Mat4::identity(), 10);
        let down = Vec3::new(0.0, -1.0, 0.0);

        let mut even = Interaction::none();
        board.intersect(&Ray::new(Point3::new(0.5, 1.0, 0.5), down), &[], &mut even);
        assert_eq!(even.material, 10);

        let mut odd = Interaction::none();
        board.intersect(&Ray::new(Point3::new(1.5, 1.0, 0.5), down), &[], &mut odd);
        assert_eq!(odd.material, 20);

        // Negative tiles keep the parity pattern continuous across the origin.
        let mut negative = Interaction::none();
        board.intersect(&Ray::new(Point3::new(-0.5, 1.0, 0.5), down), &[], &mut negative);
        assert_eq!(negative.material, 20);
    }

    #[test]
    fn cone_hit_inside_height_range() {
        let cone = Primitive::new(Shape::Cone, Mat4::identity(), 0);
        let ray = Ray::new(Point3::new(-2.0, 0.5, 0.0), Vec3::unit_x());
        let mut interaction = Interaction::none();
        cone.intersect(&ray, &[], &mut interaction);
        assert!(interaction.hit);
        assert!((interaction.point.x + 0.5).abs() < 1e-9);
        // Surface normal points away from the axis and down the slope.
        assert!(interaction.normal.x < 0.0 && interaction.normal.y < 0.0);
    }

    #[test]
    fn cone_rejects_above_apex_range() {
        let cone = Primitive::new(Shape::Cone, Mat4::identity(), 0);
        let ray = Ray::new(Point3::new(-5.0, 1.5, 0.0), Vec3::unit_x());
        let mut interaction = Interaction::none();
        cone.intersect(&ray, &[], &mut interaction);
        assert!(!interaction.hit);
    }

    fn flat_triangle() -> TriangleData {
        let vertex = |x: f64, y: f64| TriangleVertex {
            position: Point3::new(x, y, 0.0),
            uv: Some(Vec2::new(x, y)),
            normal: Vec3::unit_z(),
            tangent: Vec3::unit_x(),
            bitangent: Vec3::unit_y(),
        };
        TriangleData::new([vertex(0.0, 0.0), vertex(1.0, 0.0), vertex(0.0, 1.0)], false)
    }

    #[test]
    fn triangle_barycentric_containment() {
        let triangle = Primitive::new(Shape::Triangle(flat_triangle()), Mat4::identity(), 0);
        let backward = Vec3::new(0.0, 0.0, -1.0);

        let mut inside = Interaction::none();
        triangle.intersect(
            &Ray::new(Point3::new(0.25, 0.25, 1.0), backward),
            &[],
            &mut inside,
        );
        assert!(inside.hit);
        assert!((inside.uv.x - 0.25).abs() < 1e-9);

        let mut outside = Interaction::none();
        triangle.intersect(
            &Ray::new(Point3::new(0.9, 0.9, 1.0), backward),
            &[],
            &mut outside,
        );
        assert!(!outside.hit);
    }

    #[test]
    fn degenerate_triangle_never_hits() {
        let vertex = |x: f64| TriangleVertex {
            position: Point3::new(x, 0.0, 0.0),
            uv: None,
            normal: Vec3::unit_z(),
            tangent: Vec3::unit_x(),
            bitangent: Vec3::unit_y(),
        };
        let data = TriangleData::new([vertex(0.0), vertex(1.0), vertex(2.0)], false);
        let triangle = Primitive::new(Shape::Triangle(data), Mat4::identity(), 0);
        let mut interaction = Interaction::none();
        triangle.intersect(
            &Ray::new(Point3::new(0.5, 0.0, 1.0), Vec3::new(0.0, 0.0, -1.0)),
            &[],
            &mut interaction,
        );
        assert!(!interaction.hit);
    }

    #[test]
    fn aorm_texture_feeds_roughness_metallic_and_occlusion() {
        use crate::material::Material;
        use crate::texture::Texture;

        // One texel: R = roughness, G = metallic, B = ambient occlusion.
        let aorm = Texture::from_raw(1, 1, 3, vec![51, 102, 204]).unwrap();
        let textures = vec![aorm];
        let material = Material {
            roughness: 0.5,
            ..Material::default()
        };

        let textured = Primitive::with_textures(
            Shape::Sphere,
            Mat4::identity(),
            0,
            None,
            None,
            Some(0),
        );
        let uv = Vec2::new(0.5, 0.5);
        assert!((textured.roughness_at(uv, &textures, &material) - 0.2).abs() < 1e-9);
        assert!((textured.metallic_at(uv, &textures, &material) - 0.4).abs() < 1e-9);
        assert!((textured.ambient_occlusion_at(uv, &textures) - 0.8).abs() < 1e-9);

        // Without the texture, material values (or full occlusion) apply.
        let bare = unit_sphere();
        assert_eq!(bare.roughness_at(uv, &textures, &material), 0.5);
        assert_eq!(bare.ambient_occlusion_at(uv, &textures), 1.0);
    }

    #[test]
    fn tangent_is_orthogonal_to_normal() {
        let sphere = unit_sphere();
        let normal = Vec3::new(1.0, 0.3, -0.2).normalized();
        let tangent = sphere.compute_tangent(normal, normal);
        assert!(tangent.dot(normal).abs() < 1e-9);
        assert!((tangent.length() - 1.0).abs() < 1e-9);
    }
}
