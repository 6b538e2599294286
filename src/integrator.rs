use crate::math::{random_in_disk, Color, Ray, Vec3};
use crate::photon::{Photon, PhotonKind};
use crate::shading::{self, ShadingContext};
use rand::rngs::SmallRng;

/// Offset applied along every spawned ray to escape the originating surface.
const SELF_INTERSECTION_EPSILON: f64 = 1e-4;

/// Materials below this reflectivity/refractivity never spawn secondary rays.
const SECONDARY_RAY_THRESHOLD: f64 = 5e-2;

/// Fresnel-split branches below this weight are pruned.
const RAY_BRANCH_CUTOFF: f64 = 1e-2;
const PHOTON_BRANCH_CUTOFF: f64 = 1e-3;

/// Schlick's approximation of the Fresnel reflection coefficient at an
/// interface between two media, clamped to [0, 1].
pub(crate) fn schlick_coefficient(cos_incident: f64, ior_from: f64, ior_to: f64) -> f64 {
    let f0 = ((ior_from - ior_to) / (ior_from + ior_to)).powi(2);
    (f0 + (1.0 - f0) * (1.0 - cos_incident).powi(5)).clamp(0.0, 1.0)
}

/// Deposited-photon buckets filled by the photon tracer before the k-d trees
/// are built.
#[derive(Default)]
pub struct PhotonSinks {
    pub indirect: Vec<Photon>,
    pub caustic: Vec<Photon>,
}

/// The recursive integrator. Borrows the frozen scene through a
/// `ShadingContext` and owns no state of its own, so one instance serves
/// every worker thread.
pub struct Tracer<'a> {
    pub ctx: ShadingContext<'a>,
}

impl<'a> Tracer<'a> {
    pub fn new(ctx: ShadingContext<'a>) -> Self {
        Self { ctx }
    }

    /// Radiance arriving along `ray`, evaluated by recursive descent over the
    /// reflection, refraction, volumetric, and surface components.
    pub fn trace_ray(&self, ray: &Ray, depth: u32, rng: &mut SmallRng) -> Color {
        let settings = self.ctx.settings;
        if depth >= settings.max_ray_depth {
            if settings.log_max_depth_reached {
                eprintln!("max ray depth reached");
            }
            return Color::zero();
        }

        let interaction = self.ctx.bvh.intersect(self.ctx.scene, ray);
        if !interaction.hit {
            return Color::zero();
        }

        let material = &self.ctx.scene.materials[interaction.material];
        let incident = ray.direction;

        // VOLUMETRIC TRANSPORT
        if material.is_volumetric() {
            let continuation = Ray::in_medium(
                interaction.point + incident * SELF_INTERSECTION_EPSILON,
                incident,
                ray.medium_ior,
            );

            // Leaving the medium: pass straight through the boundary.
            if incident.dot(interaction.normal) > 0.0 {
                return self.trace_ray(&continuation, depth + 1, rng);
            }

            // Entering: the chance of an interaction grows with the optical
            // depth to the next surface.
            let next = self.ctx.bvh.intersect(self.ctx.scene, &continuation);
            let interaction_probability = 1.0 - (-next.distance * material.density).exp();

            let volume = shading::surface_intensity(&interaction, ray, &self.ctx)
                * interaction_probability;
            let wrapped =
                self.trace_ray(&continuation, depth + 1, rng) * (1.0 - interaction_probability);
            return volume + wrapped;
        }

        // REFLECTION
        let mut reflective = Color::zero();
        if material.reflectivity > SECONDARY_RAY_THRESHOLD {
            let reflected_direction = incident.reflect(interaction.normal);

            if material.glossiness == 1.0 {
                let reflected_ray = Ray::in_medium(
                    interaction.point + reflected_direction * SELF_INTERSECTION_EPSILON,
                    reflected_direction,
                    ray.medium_ior,
                );
                reflective = self.trace_ray(&reflected_ray, depth + 1, rng);
            } else {
                // Rough mirror: average a fan of directions perturbed within
                // a disk whose radius grows as glossiness drops.
                let disk_radius = 0.2 * (1.0 - material.glossiness);
                for _ in 0..settings.rough_surface_samples {
                    let perturbation = random_in_disk(rng, disk_radius);
                    let direction = (reflected_direction
                        + Vec3::new(perturbation.x, perturbation.y, 0.0))
                    .normalized();
                    let sample_ray = Ray::in_medium(
                        interaction.point + direction * SELF_INTERSECTION_EPSILON,
                        direction,
                        ray.medium_ior,
                    );
                    reflective += self.trace_ray(&sample_ray, depth + 1, rng);
                }
                reflective /= settings.rough_surface_samples as f64;
            }

            reflective *= material.reflectivity;
            reflective *= material.reflection_filter;
        }

        // REFRACTION
        let mut refractive = Color::zero();
        if material.refractivity > SECONDARY_RAY_THRESHOLD {
            let dot_incident_normal = interaction.normal.dot(incident);

            // Orient the boundary: leaving returns to air, entering adopts
            // the material's index.
            let ior_from = ray.medium_ior;
            let (ior_to, oriented_normal) = if dot_incident_normal > 0.0 {
                (1.0, -interaction.normal)
            } else {
                (material.refraction_index, interaction.normal)
            };

            if ior_from == ior_to {
                let continuation = Ray::in_medium(
                    interaction.point + incident * SELF_INTERSECTION_EPSILON,
                    incident,
                    ior_to,
                );
                refractive = self.trace_ray(&continuation, depth + 1, rng);
            } else {
                let refracted_direction =
                    incident.refract(oriented_normal, ior_from / ior_to);
                let reflected_direction = incident.reflect(oriented_normal);
                let reflected_ray = Ray::in_medium(
                    interaction.point + reflected_direction * SELF_INTERSECTION_EPSILON,
                    reflected_direction,
                    ior_from,
                );

                if settings.use_fresnel {
                    match refracted_direction {
                        Some(refracted_direction) => {
                            let reflection_coefficient = schlick_coefficient(
                                dot_incident_normal.abs(),
                                ior_from,
                                ior_to,
                            );
                            let refraction_coefficient = 1.0 - reflection_coefficient;

                            let refracted_ray = Ray::in_medium(
                                interaction.point
                                    + refracted_direction * SELF_INTERSECTION_EPSILON,
                                refracted_direction,
                                ior_to,
                            );

                            if reflection_coefficient > RAY_BRANCH_CUTOFF {
                                refractive += self.trace_ray(&reflected_ray, depth + 1, rng)
                                    * reflection_coefficient;
                            }
                            if refraction_coefficient > RAY_BRANCH_CUTOFF {
                                refractive += self.trace_ray(&refracted_ray, depth + 1, rng)
                                    * refraction_coefficient;
                            }
                        }
                        // Total internal reflection collapses to the mirror branch.
                        None => {
                            refractive = self.trace_ray(&reflected_ray, depth + 1, rng);
                        }
                    }
                } else {
                    match refracted_direction {
                        Some(refracted_direction) => {
                            let refracted_ray = Ray::in_medium(
                                interaction.point
                                    + refracted_direction * SELF_INTERSECTION_EPSILON,
                                refracted_direction,
                                ior_to,
                            );
                            refractive = self.trace_ray(&refracted_ray, depth + 1, rng);
                        }
                        None => {
                            refractive = self.trace_ray(&reflected_ray, depth + 1, rng);
                        }
                    }
                }
            }

            refractive *= material.refractivity;
            refractive *= material.transmission_filter;
        }

        // SURFACE
        let surface = shading::surface_intensity(&interaction, ray, &self.ctx)
            * material.surface_coefficient();

        let total = surface + reflective + refractive;
        if total.is_nan() {
            return Color::zero();
        }
        total
    }

    /// Traces a photon through the scene, depositing it on diffuse surfaces
    /// and spawning refracted/reflected successors at specular boundaries.
    pub fn trace_photon(&self, photon: &Photon, depth: u32, sinks: &mut PhotonSinks) {
        let settings = self.ctx.settings;
        if depth >= settings.max_photon_depth {
            return;
        }

        let interaction = self.ctx.bvh.intersect(self.ctx.scene, &photon.ray);
        if !interaction.hit {
            return;
        }

        let material = &self.ctx.scene.materials[interaction.material];
        let incident = photon.ray.direction;
        let travelled = photon.travelled_distance + interaction.distance;

        // REFRACTION: photons crossing a refractive boundary become caustic
        // carriers.
        if material.refractivity > SECONDARY_RAY_THRESHOLD {
            let dot_incident_normal = interaction.normal.dot(incident);

            let ior_from = photon.ray.medium_ior;
            let (ior_to, oriented_normal) = if dot_incident_normal > 0.0 {
                (1.0, -interaction.normal)
            } else {
                (material.refraction_index, interaction.normal)
            };

            if ior_from == ior_to {
                let continuation = Photon {
                    ray: Ray::in_medium(
                        interaction.point + incident * SELF_INTERSECTION_EPSILON,
                        incident,
                        ior_to,
                    ),
                    travelled_distance: travelled,
                    kind: PhotonKind::Caustic,
                    position: photon.position,
                    intensity: photon.intensity * material.refractivity,
                };
                self.trace_photon(&continuation, depth + 1, sinks);
            } else {
                let refracted_direction =
                    incident.refract(oriented_normal, ior_from / ior_to);
                let reflected_direction = incident.reflect(oriented_normal);

                let spawn = |direction: Vec3, medium: f64, intensity: Color| Photon {
                    ray: Ray::in_medium(
                        interaction.point + direction * SELF_INTERSECTION_EPSILON,
                        direction,
                        medium,
                    ),
                    travelled_distance: travelled,
                    kind: PhotonKind::Caustic,
                    position: photon.position,
                    intensity,
                };

                if settings.use_fresnel {
                    match refracted_direction {
                        Some(refracted_direction) => {
                            let reflection_coefficient = schlick_coefficient(
                                dot_incident_normal.abs(),
                                ior_from,
                                ior_to,
                            );
                            let refraction_coefficient = 1.0 - reflection_coefficient;

                            if refraction_coefficient > PHOTON_BRANCH_CUTOFF {
                                let refracted = spawn(
                                    refracted_direction,
                                    ior_to,
                                    photon.intensity * refraction_coefficient,
                                );
                                self.trace_photon(&refracted, depth + 1, sinks);
                            }
                            if reflection_coefficient > PHOTON_BRANCH_CUTOFF {
                                let reflected = spawn(
                                    reflected_direction,
                                    ior_from,
                                    photon.intensity * reflection_coefficient,
                                );
                                self.trace_photon(&reflected, depth + 1, sinks);
                            }
                        }
                        None => {
                            let reflected = spawn(
                                reflected_direction,
                                ior_from,
                                photon.intensity * material.refractivity,
                            );
                            self.trace_photon(&reflected, depth + 1, sinks);
                        }
                    }
                } else {
                    match refracted_direction {
                        Some(refracted_direction) => {
                            let refracted = spawn(
                                refracted_direction,
                                ior_to,
                                photon.intensity * material.refractivity,
                            );
                            self.trace_photon(&refracted, depth + 1, sinks);
                        }
                        None => {
                            let reflected = spawn(
                                reflected_direction,
                                ior_from,
                                photon.intensity * material.refractivity,
                            );
                            self.trace_photon(&reflected, depth + 1, sinks);
                        }
                    }
                }
            }
        }

        // DEPOSIT on the diffuse share of the surface. Specular-only
        // materials store nothing and spawn no bounce photon.
        let surface_coefficient = material.surface_coefficient();
        if surface_coefficient < 1e-2 {
            return;
        }

        let deposited = Photon {
            ray: photon.ray,
            travelled_distance: travelled,
            kind: photon.kind,
            position: interaction.point,
            intensity: photon.intensity * surface_coefficient,
        };
        match deposited.kind {
            PhotonKind::Indirect => {
                if settings.use_indirect_lighting {
                    sinks.indirect.push(deposited);
                }
            }
            PhotonKind::Caustic => {
                if settings.use_caustics {
                    sinks.caustic.push(deposited);
                }
            }
        }

        // BOUNCE: mirror the incident direction and carry whatever the BRDF
        // reflects onward as indirect illumination.
        let outgoing = incident.reflect(interaction.normal);
        let reflected_intensity = shading::reflected_intensity(
            photon.intensity,
            -incident,
            &interaction,
            -outgoing,
            &self.ctx,
        );

        let bounced = Photon {
            ray: Ray::in_medium(
                interaction.point + outgoing * SELF_INTERSECTION_EPSILON,
                outgoing,
                photon.ray.medium_ior,
            ),
            travelled_distance: travelled,
            kind: PhotonKind::Indirect,
            position: photon.position,
            intensity: reflected_intensity,
        };
        self.trace_photon(&bounced, depth + 1, sinks);
    }

    /// Caustic photon emission: every specular primitive is showered from
    /// every spot light with a polar grid of photons aimed at its bounding
    /// volume.
    pub fn emit_caustic_photons(&self, sinks: &mut PhotonSinks) {
        const POLAR_INCREMENT: usize = 10;
        const RADIUS_SAMPLES: usize = 10;
        const PHOTON_COUNT: usize = (360 / POLAR_INCREMENT) * RADIUS_SAMPLES;

        for primitive in &self.ctx.scene.primitives {
            let material = &self.ctx.scene.materials[primitive.material];
            if material.refractivity <= 0.0 && material.reflectivity <= 0.0 {
                continue;
            }

            for spot in &self.ctx.scene.spots {
                let starting_vector = primitive.entity.world_origin - spot.entity.world_origin;
                let axis = (spot.entity.world_origin - primitive.entity.world_origin).normalized();

                // Gram-Schmidt frame perpendicular to the light-primitive
                // axis; fall back to +z when the axis runs along +x.
                let mut reference = Vec3::unit_x();
                if axis.dot(reference).abs() > 0.99 {
                    reference = Vec3::unit_z();
                }
                let tangent = (reference - axis * reference.dot(axis)).normalized();
                let bitangent = axis.cross(tangent).normalized();

                let half_extent = primitive.world_aabb().diagonal().max_component() / 2.0;
                let sweep_radius = 1.25 * half_extent;

                for radius_step in 1..=RADIUS_SAMPLES {
                    let radius = radius_step as f64 / RADIUS_SAMPLES as f64;
                    for polar in (0..360).step_by(POLAR_INCREMENT) {
                        let polar_radians = (polar as f64).to_radians();
                        let perturbation = tangent
                            * (radius * polar_radians.cos() * sweep_radius)
                            + bitangent * (radius * polar_radians.sin() * sweep_radius);

                        let direction = (starting_vector + perturbation).normalized();
                        let intensity = spot.intensity / PHOTON_COUNT as f64;

                        let ray = Ray::new(
                            spot.entity.world_origin
                                + spot.world_normal * SELF_INTERSECTION_EPSILON,
                            direction,
                        );
                        let photon = Photon::emitted(ray, PhotonKind::Indirect, intensity);
                        self.trace_photon(&photon, 0, sinks);
                    }
                }
            }
        }
    }

    /// Indirect photon emission: uniform hemisphere sampling about each
    /// spot's axis, each photon carrying an equal share of the intensity.
    pub fn emit_indirect_photons(
        &self,
        samples_per_light: u32,
        rng: &mut SmallRng,
        sinks: &mut PhotonSinks,
    ) {
        for spot in &self.ctx.scene.spots {
            let share = spot.intensity / samples_per_light as f64;
            for _ in 0..samples_per_light {
                let mut direction = Vec3::random_unit_vector(rng);
                if direction.dot(spot.world_normal) < 0.0 {
                    direction = -direction;
                }

                let ray = Ray::new(
                    spot.entity.world_origin + spot.world_normal * SELF_INTERSECTION_EPSILON,
                    direction,
                );
                let photon = Photon::emitted(ray, PhotonKind::Indirect, share);
                self.trace_photon(&photon, 0, sinks);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bvh::Bvh;
    use crate::config::RenderSettings;
    use crate::material::{Material, MaterialKind};
    use crate::math::{Mat4, Point3};
    use crate::perlin::Perlin;
    use crate::primitive::{Primitive, Shape};
    use crate::scene::Scene;
    use crate::shading::PhotonMaps;
    use rand::SeedableRng;

    struct Fixture {
        scene: Scene,
        bvh: Bvh,
        settings: RenderSettings,
        perlin: Perlin,
        maps: PhotonMaps,
    }

    impl Fixture {
        fn new(mut scene: Scene, settings: RenderSettings) -> Self {
            let bvh = Bvh::build(&mut scene, &settings);
            Self {
                scene,
                bvh,
                settings,
                perlin: Perlin::new(),
                maps: PhotonMaps::default(),
            }
        }

        fn tracer(&self) -> Tracer<'_> {
            Tracer::new(ShadingContext {
                scene: &self.scene,
                bvh: &self.bvh,
                settings: &self.settings,
                perlin: &self.perlin,
                photon_maps: &self.maps,
            })
        }
    }

    #[test]
    fn miss_returns_black() {
        let mut scene = Scene::new();
        scene.add_material(Material::default());
        let fixture = Fixture::new(scene, RenderSettings::default());
        let tracer = fixture.tracer();
        let mut rng = SmallRng::seed_from_u64(0);
        let color = tracer.trace_ray(&Ray::new(Point3::zero(), Vec3::unit_z()), 0, &mut rng);
        assert!(color.near_zero());
    }

    #[test]
    fn recursion_depth_is_bounded() {
        // Two facing mirrors: the bounce chain must terminate at max depth.
        let mut scene = Scene::new();
        scene.add_material(Material {
            reflectivity: 1.0,
            ..Material::default()
        });
        scene.add_primitive(Primitive::new(
            Shape::Sphere,
            Mat4::translation(Vec3::new(0.0, 0.0, 3.0)),
            0,
        ));
        scene.add_primitive(Primitive::new(
            Shape::Sphere,
            Mat4::translation(Vec3::new(0.0, 0.0, -3.0)),
            0,
        ));
        let fixture = Fixture::new(scene, RenderSettings::default());
        let tracer = fixture.tracer();
        let mut rng = SmallRng::seed_from_u64(0);
        let color = tracer.trace_ray(&Ray::new(Point3::zero(), Vec3::unit_z()), 0, &mut rng);
        assert!(!color.is_nan());
    }

    #[test]
    fn spawned_rays_escape_their_surface() {
        // An ε-offset reflection ray must not re-hit the mirror at distance ~0.
        let mut scene = Scene::new();
        scene.add_material(Material::default());
        scene.add_primitive(Primitive::new(Shape::Sphere, Mat4::identity(), 0));
        let fixture = Fixture::new(scene, RenderSettings::default());

        let ray = Ray::new(Point3::new(0.0, 0.0, -3.0), Vec3::unit_z());
        let hit = fixture.bvh.intersect(&fixture.scene, &ray);
        assert!(hit.hit);

        let reflected_direction = ray.direction.reflect(hit.normal);
        let reflected = Ray::new(
            hit.point + reflected_direction * SELF_INTERSECTION_EPSILON,
            reflected_direction,
        );
        let second = fixture.bvh.intersect(&fixture.scene, &reflected);
        assert!(
            !second.hit || second.distance > SELF_INTERSECTION_EPSILON,
            "reflected ray re-intersected its own surface at {}",
            second.distance
        );
    }

    #[test]
    fn fresnel_split_conserves_energy() {
        for cos in [0.05, 0.3, 0.7, 1.0] {
            let reflection = schlick_coefficient(cos, 1.0, 1.5);
            assert!((0.0..=1.0).contains(&reflection));
            let refraction = 1.0 - reflection;
            assert!((reflection + refraction - 1.0).abs() < 1e-15);
        }
    }

    #[test]
    fn volumetric_medium_blends_with_background() {
        let mut scene = Scene::new();
        let fog = scene.add_material(Material {
            kind: MaterialKind::Volumetric,
            density: 0.5,
            emission: Color::ones(),
            ..Material::default()
        });
        scene.add_primitive(Primitive::new(
            Shape::Sphere,
            Mat4::translation(Vec3::new(0.0, 0.0, 3.0)),
            fog,
        ));
        let fixture = Fixture::new(scene, RenderSettings::default());
        let tracer = fixture.tracer();
        let mut rng = SmallRng::seed_from_u64(0);

        let color = tracer.trace_ray(&Ray::new(Point3::zero(), Vec3::unit_z()), 0, &mut rng);
        // Some of the emission survives, but the black background dilutes it.
        assert!(color.x > 0.0 && color.x < 1.0);
    }

    fn caustic_scene() -> Scene {
        let mut scene = Scene::new();
        let glass = scene.add_material(Material {
            refractivity: 1.0,
            refraction_index: 1.5,
            ..Material::default()
        });
        let grey = scene.add_material(Material {
            diffuse: Color::splat(0.5),
            ..Material::default()
        });
        scene.add_primitive(Primitive::new(Shape::Sphere, Mat4::identity(), glass));
        scene.add_primitive(Primitive::new(
            Shape::Plane,
            Mat4::translation(Vec3::new(0.0, -2.0, 0.0)),
            grey,
        ));
        // Spot above the sphere, aimed straight down.
        scene.add_spot(crate::light::Spot::new(
            Mat4::translation(Vec3::new(0.0, 5.0, 0.0)) * Mat4::rotation_x(std::f64::consts::PI),
            Color::ones(),
            45.0,
        ));
        scene
    }

    #[test]
    fn caustic_photons_land_under_the_refractive_sphere() {
        // Photons focused through glass must reach the floor plane.
        let settings = RenderSettings {
            use_photon_mapping: true,
            use_caustics: true,
            ..RenderSettings::default()
        };
        let fixture = Fixture::new(caustic_scene(), settings);
        let tracer = fixture.tracer();

        let mut sinks = PhotonSinks::default();
        tracer.emit_caustic_photons(&mut sinks);

        assert!(!sinks.caustic.is_empty(), "no caustic photons deposited");
        let on_floor = sinks
            .caustic
            .iter()
            .filter(|photon| {
                (photon.position.y + 2.0).abs() < 1e-6
                    && (photon.position.x * photon.position.x
                        + photon.position.z * photon.position.z)
                        .sqrt()
                        < 2.5
            })
            .count();
        assert!(on_floor > 0, "no caustic photons in the ring under the sphere");
    }

    #[test]
    fn photon_depth_is_capped() {
        let settings = RenderSettings {
            use_photon_mapping: true,
            use_caustics: true,
            use_indirect_lighting: true,
            ..RenderSettings::default()
        };
        let fixture = Fixture::new(caustic_scene(), settings);
        let tracer = fixture.tracer();

        let mut sinks = PhotonSinks::default();
        let photon = Photon::emitted(
            Ray::new(Point3::new(0.0, 5.0, 0.0), Vec3::new(0.0, -1.0, 0.0)),
            PhotonKind::Indirect,
            Color::ones(),
        );
        // Already at the cap: nothing may be deposited.
        tracer.trace_photon(&photon, fixture.settings.max_photon_depth, &mut sinks);
        assert!(sinks.indirect.is_empty() && sinks.caustic.is_empty());
    }

    #[test]
    fn mirror_photons_are_not_deposited() {
        let mut scene = Scene::new();
        scene.add_material(Material {
            reflectivity: 1.0,
            ..Material::default()
        });
        scene.add_primitive(Primitive::new(Shape::Sphere, Mat4::identity(), 0));
        let settings = RenderSettings {
            use_photon_mapping: true,
            use_caustics: true,
            use_indirect_lighting: true,
            ..RenderSettings::default()
        };
        let fixture = Fixture::new(scene, settings);
        let tracer = fixture.tracer();

        let mut sinks = PhotonSinks::default();
        let photon = Photon::emitted(
            Ray::new(Point3::new(0.0, 0.0, -3.0), Vec3::unit_z()),
            PhotonKind::Indirect,
            Color::ones(),
        );
        tracer.trace_photon(&photon, 0, &mut sinks);
        assert!(sinks.indirect.is_empty());
    }

    #[test]
    fn indirect_emission_respects_hemisphere() {
        let mut scene = Scene::new();
        let grey = scene.add_material(Material {
            diffuse: Color::splat(0.5),
            ..Material::default()
        });
        scene.add_primitive(Primitive::new(
            Shape::Sphere,
            Mat4::translation(Vec3::new(0.0, -3.0, 0.0)),
            grey,
        ));
        scene.add_spot(crate::light::Spot::new(
            Mat4::rotation_x(std::f64::consts::PI),
            Color::ones(),
            90.0,
        ));
        let settings = RenderSettings {
            use_photon_mapping: true,
            use_indirect_lighting: true,
            ..RenderSettings::default()
        };
        let fixture = Fixture::new(scene, settings);
        let tracer = fixture.tracer();

        let mut sinks = PhotonSinks::default();
        let mut rng = SmallRng::seed_from_u64(1);
        tracer.emit_indirect_photons(500, &mut rng, &mut sinks);
        // The downward hemisphere covers the sphere below the light.
        assert!(!sinks.indirect.is_empty());
    }
}
