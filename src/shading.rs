use crate::bvh::Bvh;
use crate::config::RenderSettings;
use crate::math::{Color, Ray, Vec3};
use crate::perlin::Perlin;
use crate::photon::PhotonKdTree;
use crate::primitive::Interaction;
use crate::scene::Scene;

/// The photon maps built before rendering; `None` when the corresponding
/// pass is disabled or produced no photons.
#[derive(Default)]
pub struct PhotonMaps {
    pub indirect: Option<PhotonKdTree>,
    pub caustic: Option<PhotonKdTree>,
}

/// Everything shading needs to evaluate a surface point, borrowed immutably
/// so workers can share one context across threads.
pub struct ShadingContext<'a> {
    pub scene: &'a Scene,
    pub bvh: &'a Bvh,
    pub settings: &'a RenderSettings,
    pub perlin: &'a Perlin,
    pub photon_maps: &'a PhotonMaps,
}

/// Value of the GGX δ-spike for perfectly smooth surfaces. Large enough that
/// the clamped specular weight saturates whenever the half vector aligns with
/// the normal.
const SMOOTH_SPIKE: f64 = 1e4;
const SPIKE_TOLERANCE: f64 = 1e-3;

/// Trowbridge-Reitz (GGX) microfacet distribution. Roughness 0 collapses to
/// a spike at H·N = 1.
pub fn isotropic_ggx(roughness: f64, dot_half_normal: f64) -> f64 {
    if roughness == 0.0 {
        return if (1.0 - dot_half_normal).abs() <= SPIKE_TOLERANCE {
            SMOOTH_SPIKE
        } else {
            0.0
        };
    }

    let roughness_squared = roughness * roughness;
    let dot_squared = dot_half_normal * dot_half_normal;
    let denominator = dot_squared * (roughness_squared - 1.0) + 1.0;
    roughness_squared / (std::f64::consts::PI * denominator * denominator)
}

/// Anisotropic GGX with independent roughness along the tangent and
/// bitangent axes.
pub fn anisotropic_ggx(
    tangent_roughness: f64,
    bitangent_roughness: f64,
    tangent: Vec3,
    bitangent: Vec3,
    half_vector: Vec3,
    dot_half_normal: f64,
) -> f64 {
    let dot_tangent_half = tangent.dot(half_vector);
    let dot_bitangent_half = bitangent.dot(half_vector);

    let shape = dot_tangent_half * dot_tangent_half / (tangent_roughness * tangent_roughness)
        + dot_bitangent_half * dot_bitangent_half / (bitangent_roughness * bitangent_roughness)
        + dot_half_normal * dot_half_normal;
    let distribution = 1.0 / (shape * shape);

    let normalization = 1.0 / (std::f64::consts::PI * tangent_roughness * bitangent_roughness);
    normalization * distribution
}

/// Cook-Torrance reflected radiance for one light direction: microfacet
/// distribution × geometric attenuation × Schlick Fresnel, with the leftover
/// weight going to the diffuse lobe. `incoming` points surface→light,
/// `outgoing` surface→viewer.
pub fn reflected_intensity(
    light_intensity: Color,
    incoming: Vec3,
    interaction: &Interaction,
    outgoing: Vec3,
    ctx: &ShadingContext,
) -> Color {
    const EPSILON: f64 = 1e-6;

    if light_intensity.x <= EPSILON && light_intensity.y <= EPSILON && light_intensity.z <= EPSILON
    {
        return Color::zero();
    }

    let normal = interaction.normal;
    let half_sum = incoming + outgoing;
    if half_sum.near_zero() {
        return Color::zero();
    }
    let half_vector = half_sum.normalized();

    let dot_normal_light = incoming.dot(normal);
    // Lights never illuminate the back side of a surface.
    if dot_normal_light < 0.0 {
        return Color::zero();
    }
    let dot_view_normal = outgoing.dot(normal);
    let dot_half_normal = half_vector.dot(normal);
    let dot_half_view = half_vector.dot(outgoing);

    let primitive = ctx.scene.primitive(interaction.primitive);
    let material = &ctx.scene.materials[interaction.material];
    let roughness = primitive.roughness_at(interaction.uv, &ctx.scene.textures, material);

    let distribution = if material.anisotropy != 0.0 {
        let tangent = primitive.compute_tangent(normal, interaction.point);
        let bitangent = normal.cross(tangent).normalized();
        let tangent_roughness = (roughness * (1.0 + material.anisotropy)).clamp(0.1, 1.0);
        let bitangent_roughness = (roughness * (1.0 - material.anisotropy)).clamp(0.1, 1.0);
        anisotropic_ggx(
            tangent_roughness,
            bitangent_roughness,
            tangent,
            bitangent,
            half_vector,
            dot_half_normal,
        )
    } else {
        isotropic_ggx(roughness, dot_half_normal)
    };

    let geometric = (2.0 * dot_half_normal * dot_view_normal / dot_half_view)
        .min(2.0 * dot_half_normal * dot_normal_light / dot_half_view)
        .min(1.0);

    let f0 = ((material.refractivity - 1.0) / (material.refractivity + 1.0)).powi(2);
    let fresnel = f0 + (1.0 - f0) * (1.0 - dot_half_view).powi(5);

    // max/min also flush a NaN from a degenerate denominator to zero.
    let specular_weight = (distribution * geometric * fresnel
        / (4.0 * dot_normal_light * dot_view_normal))
        .max(0.0)
        .min(1.0);
    let diffuse_weight = 1.0 - specular_weight;

    let diffuse = primitive.diffuse_at(
        interaction.uv,
        interaction.point,
        &ctx.scene.textures,
        material,
        ctx.perlin,
    );
    let specular = material.specular_at(interaction.point);

    light_intensity
        .hadamard(diffuse * diffuse_weight + specular * specular_weight)
        * dot_normal_light
}

/// Full surface intensity at an interaction point: emission, ambient with
/// occlusion, the direct sum over all lights, and the photon-map estimates.
pub fn surface_intensity(interaction: &Interaction, ray: &Ray, ctx: &ShadingContext) -> Color {
    let material = &ctx.scene.materials[interaction.material];
    let primitive = ctx.scene.primitive(interaction.primitive);

    let mut intensity = material.emission;

    let ambient_occlusion =
        primitive.ambient_occlusion_at(interaction.uv, &ctx.scene.textures);
    intensity += material
        .ambient
        .hadamard(ctx.settings.ambient_light)
        * ambient_occlusion;

    let outgoing = -ray.direction;

    let mut direct = Color::zero();
    for light in &ctx.scene.point_lights {
        let radiance = light.radiance(interaction.point, ctx.scene, ctx.bvh, ctx.settings);
        let incoming = (light.entity.world_origin - interaction.point).normalized();
        direct += reflected_intensity(radiance, incoming, interaction, outgoing, ctx);
    }
    for spot in &ctx.scene.spots {
        let radiance = spot.radiance(interaction.point, ctx.scene, ctx.bvh, ctx.settings);
        let incoming = (spot.entity.world_origin - interaction.point).normalized();
        direct += reflected_intensity(radiance, incoming, interaction, outgoing, ctx);
    }
    intensity += direct;

    if ctx.settings.use_photon_mapping {
        if ctx.settings.use_indirect_lighting {
            if let Some(map) = &ctx.photon_maps.indirect {
                let indirect = gather_indirect(interaction, outgoing, map, ctx);
                // Blend by relative magnitude so strong direct light keeps
                // the noisier estimate in check.
                let direct_magnitude = direct.length();
                let indirect_magnitude = indirect.length();
                if indirect_magnitude + direct_magnitude > 0.0 {
                    let blend = (indirect_magnitude / (indirect_magnitude + direct_magnitude))
                        .clamp(0.0, 1.0);
                    intensity += indirect * blend;
                }
            }
        }

        if ctx.settings.use_caustics {
            if let Some(map) = &ctx.photon_maps.caustic {
                intensity += gather_caustics(interaction, outgoing, map, ctx);
            }
        }
    }

    intensity
}

/// Indirect estimate: 150 nearest photons, Gaussian kernel in distance,
/// each photon pushed through the BRDF with its own incoming direction.
fn gather_indirect(
    interaction: &Interaction,
    outgoing: Vec3,
    map: &PhotonKdTree,
    ctx: &ShadingContext,
) -> Color {
    const MAX_PHOTONS: usize = 150;
    const KERNEL_SIGMA: f64 = 0.2;

    let nearest = map.nearest(interaction.point, MAX_PHOTONS);
    if nearest.is_empty() {
        return Color::zero();
    }
    let normalization = 1.0 / nearest.len() as f64;

    let mut indirect = Color::zero();
    for photon in &nearest {
        let distance = photon.position.distance(interaction.point);
        let weight =
            (-(distance * distance) / (2.0 * KERNEL_SIGMA * KERNEL_SIGMA)).exp();

        let contribution = reflected_intensity(
            photon.intensity,
            -photon.ray.direction,
            interaction,
            outgoing,
            ctx,
        ) * weight;
        indirect += contribution * normalization;
    }
    indirect
}

/// Caustic estimate: 60 nearest photons inside the max-distance disc, cone
/// kernel from Jensen's filtering constants, density normalization capped to
/// keep isolated photon clusters from spiking.
fn gather_caustics(
    interaction: &Interaction,
    outgoing: Vec3,
    map: &PhotonKdTree,
    ctx: &ShadingContext,
) -> Color {
    const MAX_PHOTONS: usize = 60;
    const ALPHA: f64 = 0.918;
    const BETA: f64 = 1.953;

    let nearest = map.nearest(interaction.point, MAX_PHOTONS);
    if nearest.is_empty() {
        return Color::zero();
    }

    let mut sphere_radius = 0.0f64;
    for photon in &nearest {
        sphere_radius = sphere_radius.max(photon.position.distance(interaction.point));
    }

    let sphere_area = std::f64::consts::PI * sphere_radius * sphere_radius;
    let normalization = (1.0 / sphere_area).min(80.0);

    let mut caustic = Color::zero();
    for photon in &nearest {
        let distance_squared = photon.position.distance_squared(interaction.point);
        let weight = if sphere_radius > 0.0 {
            ALPHA
                * (1.0
                    - (1.0 - (-BETA * distance_squared / (2.0 * sphere_radius * sphere_radius)).exp())
                        / (1.0 - (-BETA).exp()))
        } else {
            ALPHA
        };

        caustic += reflected_intensity(
            photon.intensity,
            -photon.ray.direction,
            interaction,
            outgoing,
            ctx,
        ) * weight
            * normalization;
    }
    caustic
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::material::Material;
    use crate::math::{Mat4, Point3, Vec2};
    use crate::primitive::{Primitive, PrimitiveRef, Shape};

    fn mirror_scene() -> Scene {
        let mut scene = Scene::new();
        scene.add_material(Material {
            specular: Color::ones(),
            diffuse: Color::zero(),
            roughness: 0.0,
            ..Material::default()
        });
        scene.add_primitive(Primitive::new(Shape::Sphere, Mat4::identity(), 0));
        scene
    }

    fn interaction_on(normal: Vec3) -> Interaction {
        Interaction {
            hit: true,
            point: Point3::zero(),
            normal,
            uv: Vec2::zero(),
            distance: 1.0,
            primitive: PrimitiveRef::Object(0),
            material: 0,
        }
    }

    #[test]
    fn ggx_integrates_roughness_into_lobe_width() {
        // Rougher surfaces spread the lobe: peak value drops.
        let smooth_peak = isotropic_ggx(0.1, 1.0);
        let rough_peak = isotropic_ggx(0.9, 1.0);
        assert!(smooth_peak > rough_peak);
        // Off-peak the rough surface wins.
        assert!(isotropic_ggx(0.9, 0.5) > isotropic_ggx(0.1, 0.5));
    }

    #[test]
    fn ggx_zero_roughness_is_a_spike() {
        assert_eq!(isotropic_ggx(0.0, 1.0), SMOOTH_SPIKE);
        assert_eq!(isotropic_ggx(0.0, 0.7), 0.0);
    }

    #[test]
    fn mirror_specular_dominates_along_reflection() {
        // View a smooth mirror along its reflection direction.
        let mut scene = mirror_scene();
        let settings = RenderSettings::default();
        let bvh = Bvh::build(&mut scene, &settings);
        let perlin = Perlin::new();
        let maps = PhotonMaps::default();
        let ctx = ShadingContext {
            scene: &scene,
            bvh: &bvh,
            settings: &settings,
            perlin: &perlin,
            photon_maps: &maps,
        };

        let interaction = interaction_on(Vec3::unit_z());
        let angle = 20f64.to_radians();
        let incoming = Vec3::new(angle.sin(), 0.0, angle.cos());
        let outgoing = Vec3::new(-angle.sin(), 0.0, angle.cos());

        let along = reflected_intensity(Color::ones(), incoming, &interaction, outgoing, &ctx);
        let specular_weight = along.x / incoming.dot(interaction.normal);
        assert!(specular_weight >= 0.9, "specular weight {specular_weight}");

        // 90° away from the reflection lobe the specular share collapses.
        let off_angle = (-70f64).to_radians();
        let outgoing_off = Vec3::new(off_angle.sin(), 0.0, off_angle.cos());
        let off = reflected_intensity(Color::ones(), incoming, &interaction, outgoing_off, &ctx);
        assert!(off.x.abs() < 1e-6, "off-lobe intensity {}", off.x);
    }

    #[test]
    fn backside_light_contributes_nothing() {
        let mut scene = mirror_scene();
        let settings = RenderSettings::default();
        let bvh = Bvh::build(&mut scene, &settings);
        let perlin = Perlin::new();
        let maps = PhotonMaps::default();
        let ctx = ShadingContext {
            scene: &scene,
            bvh: &bvh,
            settings: &settings,
            perlin: &perlin,
            photon_maps: &maps,
        };

        let interaction = interaction_on(Vec3::unit_z());
        let incoming = Vec3::new(0.0, 0.0, -1.0);
        let outgoing = Vec3::unit_z();
        let result = reflected_intensity(Color::ones(), incoming, &interaction, outgoing, &ctx);
        assert!(result.near_zero());
    }

    #[test]
    fn schlick_fresnel_partition_is_exact() {
        // F + (1 - F) = 1 per channel for any F in [0, 1].
        for i in 0..=10 {
            let f = i as f64 / 10.0;
            assert!((f + (1.0 - f) - 1.0).abs() < 1e-15);
        }
    }

    #[test]
    fn emission_always_reaches_the_surface_sum() {
        let mut scene = Scene::new();
        scene.add_material(Material {
            emission: Color::new(0.25, 0.5, 0.75),
            ..Material::default()
        });
        scene.add_primitive(Primitive::new(Shape::Sphere, Mat4::identity(), 0));
        let settings = RenderSettings::default();
        let bvh = Bvh::build(&mut scene, &settings);
        let perlin = Perlin::new();
        let maps = PhotonMaps::default();
        let ctx = ShadingContext {
            scene: &scene,
            bvh: &bvh,
            settings: &settings,
            perlin: &perlin,
            photon_maps: &maps,
        };

        let interaction = interaction_on(Vec3::unit_z());
        let ray = Ray::new(Point3::new(0.0, 0.0, 5.0), Vec3::new(0.0, 0.0, -1.0));
        let intensity = surface_intensity(&interaction, &ray, &ctx);
        assert!((intensity - Color::new(0.25, 0.5, 0.75)).near_zero());
    }
}
