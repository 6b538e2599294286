use crate::camera::Camera;
use crate::config::RenderSettings;
use crate::film::Film;
use crate::integrator::Tracer;
use crate::math::{Color, Vec3};
use crossterm::style::{self, Stylize};
use rand::rngs::SmallRng;
use rand::SeedableRng;
use rayon::prelude::*;
use std::io::{self, Write};
use std::sync::atomic::{AtomicU32, Ordering};

// ─── Render Statistics ──────────────────────────────────────────────────────

/// Aggregate statistics collected during the rendering pass for diagnostic output.
pub struct RenderStats {
    pub total_rays: u64,
    pub elapsed_secs: f64,
    pub width: u32,
    pub height: u32,
    pub samples_per_pixel: u32,
}

impl RenderStats {
    pub fn mrays_per_sec(&self) -> f64 {
        self.total_rays as f64 / self.elapsed_secs / 1e6
    }

    pub fn print_summary(&self) {
        let bar_width = 30;
        let fill = "━".repeat(bar_width);
        eprintln!("  {fill}");
        eprintln!("  Time:     {:.2}s", self.elapsed_secs);
        eprintln!("  Rays:     {:.2}M total", self.total_rays as f64 / 1e6);
        eprintln!("  Speed:    {:.2} Mrays/s", self.mrays_per_sec());
        eprintln!(
            "  Image:    {}×{} @ {} spp",
            self.width, self.height, self.samples_per_pixel
        );
        eprintln!("  {fill}");
    }
}

// ─── Progress Reporter ──────────────────────────────────────────────────────

/// A Unicode progress bar over completed image rows, safe to tick from any
/// worker thread. Percent-change detection keeps stderr traffic low.
struct ProgressBar {
    total: u32,
    done: AtomicU32,
    last_pct: AtomicU32,
    enabled: bool,
}

impl ProgressBar {
    fn new(total: u32, enabled: bool) -> Self {
        Self {
            total,
            done: AtomicU32::new(0),
            last_pct: AtomicU32::new(0),
            enabled,
        }
    }

    fn tick(&self) {
        if !self.enabled {
            return;
        }
        let done = self.done.fetch_add(1, Ordering::Relaxed) + 1;
        let pct = done * 100 / self.total;
        if pct != self.last_pct.swap(pct, Ordering::Relaxed) {
            let bar_width = 24;
            let filled = (pct as usize * bar_width) / 100;
            let empty = bar_width - filled;
            let bar = format!("{}{}", "█".repeat(filled), "░".repeat(empty));
            eprint!("\r  Rendering: │{bar}│ {pct:3}%   ");
        }
    }

    fn finish(&self, elapsed_secs: f64) {
        if !self.enabled {
            return;
        }
        let bar = "█".repeat(24);
        eprintln!("\r  Rendering: │{bar}│ 100%  {elapsed_secs:.2}s       ");
    }
}

// ─── Frame Renderer ─────────────────────────────────────────────────────────

/// Renders one camera's view into a fresh HDR film.
///
/// Rows are distributed across the rayon worker pool; each worker owns a
/// `SmallRng` seeded from the settings seed and its row index, so a fixed
/// seed reproduces the frame bit-for-bit regardless of scheduling. Film rows
/// are disjoint slices, so no synchronization guards the writes.
pub fn render(tracer: &Tracer, camera: &Camera, settings: &RenderSettings) -> (Film, RenderStats) {
    let width = camera.width;
    let height = camera.height;
    let mut film = Film::new(width, height);

    let pixel_size = camera.pixel_size();
    let (top_left_x, top_left_y) = camera.top_left();

    let progress = ProgressBar::new(height, settings.print_progress);
    let start = std::time::Instant::now();

    film.pixels
        .par_chunks_mut(width as usize)
        .enumerate()
        .for_each(|(row, pixels)| {
            let mut rng = SmallRng::seed_from_u64(settings.seed ^ (row as u64).wrapping_mul(0x9e37_79b9));
            let j = row as u32;

            for (i, pixel) in pixels.iter_mut().enumerate() {
                let i = i as u32;

                let color = if settings.use_antialiasing {
                    let subdivisions = settings.aa_subdivisions;
                    let increment = pixel_size / subdivisions as f64;
                    let mut accumulated = Color::zero();
                    for delta_x in 0..subdivisions {
                        for delta_y in 0..subdivisions {
                            let direction = Vec3::new(
                                top_left_x + i as f64 * pixel_size + increment * delta_x as f64,
                                top_left_y - j as f64 * pixel_size - increment * delta_y as f64,
                                1.0,
                            )
                            .normalized();
                            accumulated += sample_direction(tracer, camera, settings, direction, &mut rng);
                        }
                    }
                    accumulated / (subdivisions * subdivisions) as f64
                } else {
                    let direction = Vec3::new(
                        top_left_x + i as f64 * pixel_size + pixel_size / 2.0,
                        top_left_y - j as f64 * pixel_size - pixel_size / 2.0,
                        1.0,
                    )
                    .normalized();
                    sample_direction(tracer, camera, settings, direction, &mut rng)
                };

                *pixel = color;
            }
            progress.tick();
        });

    let elapsed = start.elapsed().as_secs_f64();
    progress.finish(elapsed);

    let samples_per_pixel = primary_samples(settings, camera);
    let stats = RenderStats {
        total_rays: width as u64 * height as u64 * samples_per_pixel as u64,
        elapsed_secs: elapsed,
        width,
        height,
        samples_per_pixel,
    };

    (film, stats)
}

/// Averages the camera rays (1 for a pinhole, `dof_samples` for a lens) for
/// one pixel-plane direction.
fn sample_direction(
    tracer: &Tracer,
    camera: &Camera,
    settings: &RenderSettings,
    direction: Vec3,
    rng: &mut SmallRng,
) -> Color {
    let rays = camera.rays_for_direction(direction, settings, rng);
    let count = rays.len();
    let mut color = Color::zero();
    for ray in rays {
        color += tracer.trace_ray(&ray, 0, rng);
    }
    color / count as f64
}

fn primary_samples(settings: &RenderSettings, camera: &Camera) -> u32 {
    let aa = if settings.use_antialiasing {
        settings.aa_subdivisions * settings.aa_subdivisions
    } else {
        1
    };
    let dof = if settings.use_depth_of_field && camera.aperture > 0.0 {
        settings.dof_samples
    } else {
        1
    };
    aa * dof
}

// ─── Terminal Preview ───────────────────────────────────────────────────────

/// Prints a post-processed film to the terminal using half-block characters
/// (▀) with separate foreground/background colors, packing two image rows
/// into each text row.
pub fn preview_film(film: &Film) {
    let stdout = io::stdout();
    let mut out = io::BufWriter::new(stdout.lock());

    let rows = film.height / 2;
    for row in 0..rows {
        for x in 0..film.width {
            let (tr, tg, tb) = film.get(x, row * 2).to_rgb8();
            let (br, bg, bb) = film.get(x, row * 2 + 1).to_rgb8();
            let _ = write!(
                out,
                "{}",
                "▀".with(style::Color::Rgb {
                    r: tr,
                    g: tg,
                    b: tb
                })
                .on(style::Color::Rgb {
                    r: br,
                    g: bg,
                    b: bb
                })
            );
        }
        let _ = writeln!(out);
    }
    let _ = out.flush();
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bvh::Bvh;
    use crate::config::RenderSettings;
    use crate::material::Material;
    use crate::math::{Mat4, Point3};
    use crate::perlin::Perlin;
    use crate::primitive::{Primitive, Shape};
    use crate::scene::Scene;
    use crate::shading::{PhotonMaps, ShadingContext};
    use crate::light::PointLight;

    /// One red diffuse sphere, one point light, one head-on camera.
    fn red_sphere_scene(width: u32, height: u32) -> (Scene, RenderSettings) {
        let mut scene = Scene::new();
        let red = scene.add_material(Material {
            diffuse: Color::new(0.9, 0.1, 0.1),
            specular: Color::splat(0.2),
            roughness: 0.8,
            ..Material::default()
        });
        scene.add_primitive(Primitive::new(Shape::Sphere, Mat4::identity(), red));
        scene.add_point_light(PointLight::new(
            Mat4::translation(Point3::new(2.0, 3.0, -4.0)),
            Color::splat(20.0),
        ));
        scene.add_camera(Camera::new(
            Mat4::translation(Point3::new(0.0, 0.0, -4.0)),
            "test",
            width,
            height,
            45.0,
        ));

        let settings = RenderSettings {
            print_progress: false,
            ..RenderSettings::default()
        };
        (scene, settings)
    }

    fn render_once(width: u32, height: u32) -> Film {
        let (mut scene, settings) = red_sphere_scene(width, height);
        let bvh = Bvh::build(&mut scene, &settings);
        let perlin = Perlin::new();
        let maps = PhotonMaps::default();
        let tracer = Tracer::new(ShadingContext {
            scene: &scene,
            bvh: &bvh,
            settings: &settings,
            perlin: &perlin,
            photon_maps: &maps,
        });
        let camera = &scene.cameras[0];
        let (film, stats) = render(&tracer, camera, &settings);
        assert_eq!(stats.total_rays, width as u64 * height as u64);
        film
    }

    #[test]
    fn fixed_seed_renders_are_bit_identical() {
        // Same seed, same scene, same pixels.
        let first = render_once(16, 16);
        let second = render_once(16, 16);
        for (a, b) in first.pixels.iter().zip(&second.pixels) {
            assert_eq!(a, b);
        }
    }

    #[test]
    fn center_pixel_sees_the_lit_sphere() {
        // The sphere fills the image center and reads red.
        let film = render_once(4, 4);
        let center = film.get(2, 2);
        assert!(center.x > 0.0, "sphere not visible: {center}");
        assert!(center.x > center.y && center.x > center.z, "not red: {center}");
        // Corner rays miss everything and stay black.
        let corner = film.get(0, 0);
        assert!(corner.near_zero(), "corner unexpectedly lit: {corner}");
    }

    #[test]
    fn stats_count_antialiasing_samples() {
        let (mut scene, mut settings) = red_sphere_scene(4, 4);
        settings.use_antialiasing = true;
        let bvh = Bvh::build(&mut scene, &settings);
        let perlin = Perlin::new();
        let maps = PhotonMaps::default();
        let tracer = Tracer::new(ShadingContext {
            scene: &scene,
            bvh: &bvh,
            settings: &settings,
            perlin: &perlin,
            photon_maps: &maps,
        });
        let (_, stats) = render(&tracer, &scene.cameras[0], &settings);
        assert_eq!(stats.samples_per_pixel, 4);
        assert_eq!(stats.total_rays, 4 * 4 * 4);
    }
}
