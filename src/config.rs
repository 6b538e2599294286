use crate::math::Color;
use clap::ValueEnum;

/// BVH split heuristic selection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum SplitMethod {
    /// Surface area heuristic with bucketed sweep.
    Sah,
    /// Partition around the centroid-axis midpoint.
    Middle,
    /// Median split along the widest centroid axis.
    EqualCounts,
}

/// Tone mapping operator selection — exactly one operator is applied per image.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum ToneMapOperator {
    /// L / Lmax.
    Linear,
    /// 0.8 · L^0.85.
    Power,
    /// log(L + 1) / log(Lmax + 1).
    Logarithmic,
    /// ACES filmic curve (Narkowicz 2015 approximation).
    Aces,
    /// Reinhard extended with Lmax white point.
    ExtendedReinhard,
}

/// Process-wide render settings. Built once, frozen, and passed by shared
/// reference to every subsystem — no global mutable state.
#[derive(Debug, Clone)]
pub struct RenderSettings {
    // Ray tracing
    pub max_ray_depth: u32,
    pub use_antialiasing: bool,
    pub aa_subdivisions: u32,
    pub use_fresnel: bool,
    pub rough_surface_samples: u32,

    // Camera
    pub use_depth_of_field: bool,
    pub dof_samples: u32,

    // Lighting
    pub use_occlusion: bool,
    pub use_light_attenuation: bool,
    pub ambient_light: Color,
    pub area_light_samples: u32,

    // Photon mapping
    pub use_photon_mapping: bool,
    pub use_indirect_lighting: bool,
    pub use_caustics: bool,
    pub max_photon_depth: u32,
    /// Hemisphere samples per spot when indirect photon emission is enabled.
    pub indirect_photon_samples: u32,

    // Acceleration
    pub split_method: SplitMethod,
    pub sah_buckets: usize,

    // Post-processing
    pub use_tone_mapping: bool,
    pub tone_map_operator: ToneMapOperator,
    pub use_gamma_correction: bool,
    pub gamma: f64,

    // Diagnostics
    pub log_max_depth_reached: bool,
    pub print_progress: bool,

    /// Base seed for the per-worker PRNGs; a fixed seed makes two runs of the
    /// same scene bit-identical.
    pub seed: u64,
}

impl Default for RenderSettings {
    fn default() -> Self {
        Self {
            max_ray_depth: 5,
            use_antialiasing: false,
            aa_subdivisions: 2,
            use_fresnel: true,
            rough_surface_samples: 25,

            use_depth_of_field: false,
            dof_samples: 15,

            use_occlusion: true,
            use_light_attenuation: true,
            ambient_light: Color::zero(),
            area_light_samples: 250,

            use_photon_mapping: false,
            use_indirect_lighting: false,
            use_caustics: true,
            max_photon_depth: 3,
            indirect_photon_samples: 2000,

            split_method: SplitMethod::Sah,
            sah_buckets: 12,

            use_tone_mapping: true,
            tone_map_operator: ToneMapOperator::ExtendedReinhard,
            use_gamma_correction: true,
            gamma: 1.0 / 2.2,

            log_max_depth_reached: false,
            print_progress: true,

            seed: 0x5eed_cafe,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_documented_constants() {
        let s = RenderSettings::default();
        assert_eq!(s.max_ray_depth, 5);
        assert_eq!(s.max_photon_depth, 3);
        assert_eq!(s.aa_subdivisions, 2);
        assert_eq!(s.dof_samples, 15);
        assert_eq!(s.area_light_samples, 250);
        assert_eq!(s.rough_surface_samples, 25);
        assert_eq!(s.sah_buckets, 12);
        assert!((s.gamma - 1.0 / 2.2).abs() < 1e-12);
    }
}
