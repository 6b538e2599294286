use crate::config::{RenderSettings, ToneMapOperator};
use crate::math::Color;
use std::io::{self, Write};
use std::path::Path;

const MAX_PPM_VALUE: f64 = 255.0;

const RED_LUMINANCE: f64 = 0.2125;
const GREEN_LUMINANCE: f64 = 0.7154;
const BLUE_LUMINANCE: f64 = 0.0721;

/// The HDR accumulation buffer for one camera. Pixels are written unbounded
/// during rendering; `post_process` compresses them into [0, 1] for output.
pub struct Film {
    pub width: u32,
    pub height: u32,
    pub pixels: Vec<Color>,
}

impl Film {
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            pixels: vec![Color::zero(); (width * height) as usize],
        }
    }

    #[inline]
    pub fn set(&mut self, x: u32, y: u32, color: Color) {
        self.pixels[(y * self.width + x) as usize] = color;
    }

    #[inline]
    pub fn get(&self, x: u32, y: u32) -> Color {
        self.pixels[(y * self.width + x) as usize]
    }

    /// The post-processing pipeline, in order: tone mapping (one operator),
    /// RGB clamp, gamma correction. Each stage toggles independently.
    pub fn post_process(&mut self, settings: &RenderSettings) {
        if settings.use_tone_mapping {
            self.apply_tone_mapping(settings.tone_map_operator);
        }

        for pixel in &mut self.pixels {
            *pixel = pixel.saturate();
        }

        if settings.use_gamma_correction {
            let gamma = settings.gamma;
            for pixel in &mut self.pixels {
                *pixel = Color::new(
                    pixel.x.powf(gamma),
                    pixel.y.powf(gamma),
                    pixel.z.powf(gamma),
                );
            }
        }
    }

    /// Applies the selected operator through the luminance channel: the
    /// per-pixel coefficient L_out / (L_in + ε) scales all three channels,
    /// each capped at 1.
    fn apply_tone_mapping(&mut self, operator: ToneMapOperator) {
        let input_luminance: Vec<f64> = self
            .pixels
            .iter()
            .map(|pixel| {
                RED_LUMINANCE * pixel.x + GREEN_LUMINANCE * pixel.y + BLUE_LUMINANCE * pixel.z
            })
            .collect();

        let max_luminance = input_luminance.iter().cloned().fold(0.0, f64::max);
        if max_luminance == 0.0 {
            eprintln!("max luminance in scene is zero, skipping tone mapping");
            return;
        }

        for (pixel, &luminance) in self.pixels.iter_mut().zip(&input_luminance) {
            let output = tone_map(operator, luminance, max_luminance);
            let coefficient = output / (luminance + 1e-6);
            *pixel = Color::new(
                (pixel.x * coefficient).min(1.0),
                (pixel.y * coefficient).min(1.0),
                (pixel.z * coefficient).min(1.0),
            );
        }
    }

    /// Writes the film as plain (P3) PPM with one rounded 8-bit triple per
    /// pixel. Callers run `post_process` first; out-of-range values are
    /// clamped here regardless so the file stays valid.
    pub fn write_ppm(&self, path: impl AsRef<Path>) -> io::Result<()> {
        let mut file = io::BufWriter::new(std::fs::File::create(path)?);
        writeln!(file, "P3")?;
        writeln!(file, "{} {}", self.width, self.height)?;
        writeln!(file, "{}", MAX_PPM_VALUE as u32)?;
        for y in 0..self.height {
            for x in 0..self.width {
                let c = self.get(x, y).saturate();
                write!(
                    file,
                    "{} {} {} ",
                    (c.x * MAX_PPM_VALUE).round() as u32,
                    (c.y * MAX_PPM_VALUE).round() as u32,
                    (c.z * MAX_PPM_VALUE).round() as u32,
                )?;
            }
            writeln!(file)?;
        }
        file.flush()
    }
}

/// One tone mapping operator applied to a single luminance value.
pub fn tone_map(operator: ToneMapOperator, luminance: f64, max_luminance: f64) -> f64 {
    match operator {
        ToneMapOperator::Linear => luminance / max_luminance,
        ToneMapOperator::Power => 0.8 * luminance.powf(0.85),
        ToneMapOperator::Logarithmic => (luminance + 1.0).ln() / (max_luminance + 1.0).ln(),
        ToneMapOperator::Aces => {
            const A: f64 = 2.51;
            const B: f64 = 0.03;
            const C: f64 = 2.43;
            const D: f64 = 0.59;
            const E: f64 = 0.14;
            (luminance * (A * luminance + B)) / (luminance * (C * luminance + D) + E)
        }
        ToneMapOperator::ExtendedReinhard => {
            luminance * (1.0 + luminance / (max_luminance * max_luminance)) / (1.0 + luminance)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::math::Vec2;
    use crate::texture::Texture;

    const OPERATORS: [ToneMapOperator; 5] = [
        ToneMapOperator::Linear,
        ToneMapOperator::Power,
        ToneMapOperator::Logarithmic,
        ToneMapOperator::Aces,
        ToneMapOperator::ExtendedReinhard,
    ];

    #[test]
    fn tone_map_operators_are_monotone_and_fix_zero() {
        // Every operator maps L ≥ 0 monotonically and 0 → 0.
        for operator in OPERATORS {
            assert_eq!(tone_map(operator, 0.0, 4.0), 0.0);
            let mut previous = 0.0;
            for step in 1..=100 {
                let luminance = step as f64 * 0.1;
                let output = tone_map(operator, luminance, 10.0);
                assert!(
                    output >= previous - 1e-12,
                    "{operator:?} decreased at L={luminance}"
                );
                previous = output;
            }
        }
    }

    #[test]
    fn disabled_tone_mapping_leaves_ldr_values_unchanged() {
        // With tone mapping off and inputs in [0,1], post-processing
        // reduces to clamp + gamma.
        let settings = RenderSettings {
            use_tone_mapping: false,
            use_gamma_correction: false,
            ..RenderSettings::default()
        };
        let mut film = Film::new(2, 1);
        film.set(0, 0, Color::new(0.25, 0.5, 0.75));
        film.set(1, 0, Color::new(1.5, -0.5, 0.5));
        film.post_process(&settings);
        assert_eq!(film.get(0, 0), Color::new(0.25, 0.5, 0.75));
        // The out-of-range pixel only gets clamped.
        assert_eq!(film.get(1, 0), Color::new(1.0, 0.0, 0.5));
    }

    #[test]
    fn gamma_correction_lifts_midtones() {
        let settings = RenderSettings {
            use_tone_mapping: false,
            use_gamma_correction: true,
            ..RenderSettings::default()
        };
        let mut film = Film::new(1, 1);
        film.set(0, 0, Color::splat(0.5));
        film.post_process(&settings);
        let expected = 0.5f64.powf(1.0 / 2.2);
        assert!((film.get(0, 0).x - expected).abs() < 1e-12);
    }

    #[test]
    fn all_black_film_survives_tone_mapping() {
        let settings = RenderSettings::default();
        let mut film = Film::new(4, 4);
        film.post_process(&settings);
        assert!(film.pixels.iter().all(|pixel| pixel.near_zero()));
    }

    #[test]
    fn tone_mapped_channels_never_exceed_one() {
        for operator in OPERATORS {
            let settings = RenderSettings {
                use_tone_mapping: true,
                tone_map_operator: operator,
                use_gamma_correction: false,
                ..RenderSettings::default()
            };
            let mut film = Film::new(2, 2);
            film.set(0, 0, Color::new(8.0, 2.0, 0.5));
            film.set(1, 0, Color::splat(0.01));
            film.set(0, 1, Color::new(0.0, 100.0, 0.0));
            film.post_process(&settings);
            for pixel in &film.pixels {
                assert!(pixel.max_component() <= 1.0 + 1e-12, "{operator:?}");
                assert!(pixel.x >= 0.0 && pixel.y >= 0.0 && pixel.z >= 0.0);
            }
        }
    }

    #[test]
    fn ppm_round_trip_recovers_quantized_values() {
        // Writing then reading recovers round(v·255) per channel.
        let mut film = Film::new(3, 2);
        let values = [
            Color::new(0.0, 0.5, 1.0),
            Color::new(0.1, 0.2, 0.3),
            Color::new(0.9, 0.8, 0.7),
            Color::new(0.33, 0.66, 0.99),
            Color::new(1.0, 0.0, 0.0),
            Color::new(0.004, 0.996, 0.5),
        ];
        for (index, value) in values.iter().enumerate() {
            film.set(index as u32 % 3, index as u32 / 3, *value);
        }

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("roundtrip.ppm");
        film.write_ppm(&path).unwrap();

        let texture = Texture::load_ppm(&path).unwrap();
        assert_eq!(texture.width(), 3);
        assert_eq!(texture.height(), 2);
        for (index, value) in values.iter().enumerate() {
            let x = index % 3;
            let y = index / 3;
            let uv = Vec2::new(
                (x as f64 + 0.5) / 3.0,
                (y as f64 + 0.5) / 2.0,
            );
            let sampled = texture.sample(uv);
            for channel in 0..3 {
                let expected = (value[channel] * 255.0).round();
                let recovered = (sampled[channel] * 255.0).round();
                assert_eq!(expected, recovered, "pixel {index} channel {channel}");
            }
        }
    }
}
