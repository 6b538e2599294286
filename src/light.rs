use crate::bvh::Bvh;
use crate::config::RenderSettings;
use crate::math::{random_in_disk, Color, Mat4, Point3, Ray, Vec3};
use crate::scene::{Entity, Scene};

/// Occlusion test shared by every light kind: a shadow ray from the light
/// origin toward the surface point, accepted as occluded if any non-transparent
/// surface sits strictly between the two (ε backs the target off the surface
/// so the receiver never shadows itself).
fn is_occluded(
    light_origin: Point3,
    surface_point: Point3,
    scene: &Scene,
    bvh: &Bvh,
    settings: &RenderSettings,
) -> bool {
    if !settings.use_occlusion {
        return false;
    }

    let direction = (surface_point - light_origin).normalized();
    let light_ray = Ray::new(light_origin, direction);

    const EPSILON: f64 = 1e-3;
    let distance = light_origin.distance(surface_point - direction * EPSILON);

    let tentative = bvh.intersect_opaque_within(scene, &light_ray, distance);
    tentative.hit && tentative.distance <= distance
}

/// Inverse-square falloff, flattened inside one unit of distance so close
/// lights do not blow out.
fn attenuation(light_origin: Point3, surface_point: Point3, settings: &RenderSettings) -> f64 {
    if !settings.use_light_attenuation {
        return 1.0;
    }
    let distance = (surface_point - light_origin).length();
    1.0 / distance.max(1.0).powi(2)
}

// ─── Point Light ────────────────────────────────────────────────────────────

/// An isotropic emitter at the transform origin.
pub struct PointLight {
    pub entity: Entity,
    pub intensity: Color,
}

impl PointLight {
    pub fn new(transform: Mat4, intensity: Color) -> Self {
        Self {
            entity: Entity::new(transform),
            intensity,
        }
    }

    /// Radiance arriving at a surface point, folding occlusion and distance
    /// attenuation.
    pub fn radiance(
        &self,
        surface_point: Point3,
        scene: &Scene,
        bvh: &Bvh,
        settings: &RenderSettings,
    ) -> Color {
        if is_occluded(self.entity.world_origin, surface_point, scene, bvh, settings) {
            return Color::zero();
        }
        self.intensity * attenuation(self.entity.world_origin, surface_point, settings)
    }
}

// ─── Directional Spot ───────────────────────────────────────────────────────

/// Angular falloff of a spot: a hard cone cutoff, or a Gaussian lobe in
/// cos(angle) about the axis.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SpotFalloff {
    Hard,
    Gaussian,
}

/// A directional spot light: local axis +y, cone aperture stored in cosine
/// form, world-space frame cached at construction for photon emission.
pub struct Spot {
    pub entity: Entity,
    pub intensity: Color,
    /// cos of the half-aperture; radiance is zero outside the cone.
    pub cos_aperture: f64,
    pub falloff: SpotFalloff,

    pub world_normal: Vec3,
    pub world_tangent: Vec3,
    pub world_bitangent: Vec3,
}

impl Spot {
    pub fn new(transform: Mat4, intensity: Color, aperture_degrees: f64) -> Self {
        Self::with_falloff(transform, intensity, aperture_degrees, SpotFalloff::Hard)
    }

    pub fn gaussian(transform: Mat4, intensity: Color, aperture_degrees: f64) -> Self {
        Self::with_falloff(transform, intensity, aperture_degrees, SpotFalloff::Gaussian)
    }

    fn with_falloff(
        transform: Mat4,
        intensity: Color,
        aperture_degrees: f64,
        falloff: SpotFalloff,
    ) -> Self {
        let entity = Entity::new(transform);
        let world_normal = transform.transform_vector(Vec3::unit_y());
        let world_tangent = transform.transform_vector(Vec3::unit_x());
        let world_bitangent = transform.transform_vector(Vec3::unit_z());
        Self {
            entity,
            intensity,
            cos_aperture: aperture_degrees.to_radians().cos(),
            falloff,
            world_normal,
            world_tangent,
            world_bitangent,
        }
    }

    pub fn radiance(
        &self,
        surface_point: Point3,
        scene: &Scene,
        bvh: &Bvh,
        settings: &RenderSettings,
    ) -> Color {
        if is_occluded(self.entity.world_origin, surface_point, scene, bvh, settings) {
            return Color::zero();
        }

        // The cone test runs in light-local space against the +y axis.
        let local_point = self.entity.inverse.transform_point(surface_point);
        if local_point.near_zero() {
            return Color::zero();
        }
        let dot_light_surface = local_point.normalized().dot(Vec3::unit_y());
        if dot_light_surface < 0.0 || dot_light_surface < self.cos_aperture {
            return Color::zero();
        }

        let attenuation = attenuation(self.entity.world_origin, surface_point, settings);
        match self.falloff {
            SpotFalloff::Hard => self.intensity * dot_light_surface * attenuation,
            SpotFalloff::Gaussian => {
                const MEAN: f64 = 1.0;
                const VARIANCE: f64 = 0.2;
                let coefficient =
                    (-(dot_light_surface - MEAN).powi(2) / (2.0 * VARIANCE)).exp();
                self.intensity * coefficient * attenuation
            }
        }
    }
}

// ─── Area Light ─────────────────────────────────────────────────────────────

/// Samples an area light into `count` sub-spots scattered on a disk in the
/// light's local xz plane, each carrying an equal share of the intensity.
/// The caller merges the spots into the scene, optionally together with an
/// emissive disk primitive standing in for the fixture itself.
pub fn sample_area_light(
    transform: Mat4,
    intensity: Color,
    aperture_degrees: f64,
    disk_radius: f64,
    count: u32,
    rng: &mut dyn rand::RngCore,
) -> Vec<Spot> {
    let share = intensity / count as f64;
    (0..count)
        .map(|_| {
            let offset = random_in_disk(rng, disk_radius);
            let sample_transform =
                transform * Mat4::translation(Vec3::new(offset.x, 0.0, offset.y));
            Spot::new(sample_transform, share, aperture_degrees)
        })
        .collect()
}
