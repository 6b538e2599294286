use crate::math::{Color, Point3};
use crate::perlin::Perlin;

/// Index into the scene's material arena. Primitives and interactions carry
/// handles rather than references, so the scene stays a plain owned value.
pub type MaterialId = usize;

/// Solid surfaces shade through the BRDF; volumetric ones participate in
/// probabilistic in-scattering along the ray.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum MaterialKind {
    #[default]
    Solid,
    Volumetric,
}

/// Procedural diffuse override. `Plain` reads the constant diffuse color;
/// `Marble` synthesizes veins from octave Perlin noise at the surface point.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub enum MaterialFinish {
    #[default]
    Plain,
    Marble { veins: Color, filling: Color },
}

/// The full material parameter bundle. Materials are immutable once the scene
/// is frozen; everything here is plain data shared across worker threads.
#[derive(Debug, Clone, PartialEq)]
pub struct Material {
    /// Self-illuminance added unconditionally to the surface intensity.
    pub emission: Color,
    pub ambient: Color,
    pub diffuse: Color,
    pub specular: Color,

    /// Fraction of incoming light sent down the mirror path, in [0, 1].
    pub reflectivity: f64,
    /// 1 is a perfect mirror; lower values scatter the reflection lobe.
    pub glossiness: f64,
    /// Fraction of incoming light sent down the refraction path, in [0, 1].
    pub refractivity: f64,
    pub refraction_index: f64,
    /// Transmission without bending; fully transparent surfaces do not occlude.
    pub transparency: f64,
    pub transmission_filter: Color,
    pub reflection_filter: Color,

    pub roughness: f64,
    /// Skews the GGX lobe along the tangent (+) or bitangent (−), in [−1, 1].
    pub anisotropy: f64,
    /// Legacy Blinn-Phong exponent, kept for scene compatibility.
    pub shininess: f64,

    /// Participation density for volumetric transport.
    pub density: f64,

    pub kind: MaterialKind,
    pub finish: MaterialFinish,
}

impl Default for Material {
    fn default() -> Self {
        Self {
            emission: Color::zero(),
            ambient: Color::ones(),
            diffuse: Color::zero(),
            specular: Color::zero(),
            reflectivity: 0.0,
            glossiness: 1.0,
            refractivity: 0.0,
            refraction_index: 1.0,
            transparency: 0.0,
            transmission_filter: Color::ones(),
            reflection_filter: Color::ones(),
            roughness: 1.0,
            anisotropy: 0.0,
            shininess: 0.0,
            density: 0.0,
            kind: MaterialKind::Solid,
            finish: MaterialFinish::Plain,
        }
    }
}

impl Material {
    /// Diffuse color at a world-space surface point, honoring the procedural
    /// finish. The Perlin table is threaded in by the caller.
    pub fn diffuse_at(&self, surface_point: Point3, perlin: &Perlin) -> Color {
        match self.finish {
            MaterialFinish::Plain => self.diffuse,
            MaterialFinish::Marble { veins, filling } => {
                let noise = perlin.octave_noise(
                    surface_point.x,
                    surface_point.y,
                    surface_point.z,
                    6,
                );

                const VEINS_SCALE: f64 = 0.01;
                let marble = (VEINS_SCALE * surface_point.y + noise).sin();
                // Remap to [0, 1], then sharpen so only narrow bands read as veins.
                let marble = ((marble + 1.0) * 0.5).powf(15.0);

                filling.smooth_lerp(veins, marble)
            }
        }
    }

    pub fn specular_at(&self, _surface_point: Point3) -> Color {
        self.specular
    }

    /// Weight left for the diffuse/surface term after the mirror and
    /// refraction paths take their share.
    #[inline]
    pub fn surface_coefficient(&self) -> f64 {
        (1.0 - self.refractivity - self.reflectivity).max(0.0)
    }

    pub fn is_volumetric(&self) -> bool {
        self.kind == MaterialKind::Volumetric
    }
}
