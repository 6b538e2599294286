use crate::math::{Color, Vec2};
use std::fs;
use std::path::Path;
use thiserror::Error;

/// Failures while bringing a texture into the scene. These never abort a
/// render: the caller reports them on stderr and drops the asset.
#[derive(Debug, Error)]
pub enum TextureError {
    #[error("failed to read {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("unsupported texture format in {path} (expected P3/P6 PPM)")]
    UnsupportedFormat { path: String },
    #[error("truncated or malformed texture data in {path}")]
    Malformed { path: String },
    #[error("texture has {channels} channels, need at least 3")]
    TooFewChannels { channels: usize },
}

/// A decoded 2-D RGB sampler. Pixel data arrives pre-decoded as interleaved
/// bytes (any external decoder can feed this); values are mapped from
/// [0, 255] to [0, 1] at sampling time and UV lookups clamp to texel space.
#[derive(Debug)]
pub struct Texture {
    width: usize,
    height: usize,
    channels: usize,
    data: Vec<u8>,
}

impl Texture {
    /// Wraps pre-decoded interleaved pixel bytes. This is the inbound
    /// interface for external image decoders.
    pub fn from_raw(
        width: usize,
        height: usize,
        channels: usize,
        data: Vec<u8>,
    ) -> Result<Self, TextureError> {
        if channels < 3 {
            return Err(TextureError::TooFewChannels { channels });
        }
        if data.len() < width * height * channels {
            return Err(TextureError::Malformed {
                path: "<raw>".into(),
            });
        }
        Ok(Self {
            width,
            height,
            channels,
            data,
        })
    }

    /// Loads a plain (P3) or binary (P6) PPM file. PPM is the one format the
    /// renderer both reads and writes; everything else belongs to an external
    /// decoder feeding `from_raw`.
    pub fn load_ppm(path: impl AsRef<Path>) -> Result<Self, TextureError> {
        let path_str = path.as_ref().display().to_string();
        let bytes = fs::read(&path).map_err(|source| TextureError::Io {
            path: path_str.clone(),
            source,
        })?;
        Self::decode_ppm(&bytes, &path_str)
    }

    fn decode_ppm(bytes: &[u8], path: &str) -> Result<Self, TextureError> {
        let malformed = || TextureError::Malformed { path: path.into() };

        let binary = if bytes.starts_with(b"P6") {
            true
        } else if bytes.starts_with(b"P3") {
            false
        } else {
            return Err(TextureError::UnsupportedFormat { path: path.into() });
        };

        // Header: magic, width, height, maxval — whitespace separated, with
        // '#' comment lines allowed.
        let mut cursor = 2;
        let mut header = [0usize; 3];
        let mut filled = 0;
        while filled < 3 {
            while cursor < bytes.len() && (bytes[cursor].is_ascii_whitespace()) {
                cursor += 1;
            }
            if bytes.get(cursor) == Some(&b'#') {
                while cursor < bytes.len() && bytes[cursor] != b'\n' {
                    cursor += 1;
                }
                continue;
            }
            let start = cursor;
            while cursor < bytes.len() && !bytes[cursor].is_ascii_whitespace() {
                cursor += 1;
            }
            let token = std::str::from_utf8(&bytes[start..cursor]).map_err(|_| malformed())?;
            header[filled] = token.parse().map_err(|_| malformed())?;
            filled += 1;
        }
        let (width, height, max_value) = (header[0], header[1], header[2]);
        if max_value == 0 || max_value > 255 {
            return Err(malformed());
        }

        let expected = width * height * 3;
        let data = if binary {
            // Exactly one whitespace byte separates the header from the raster.
            cursor += 1;
            let raster = bytes.get(cursor..cursor + expected).ok_or_else(malformed)?;
            raster.to_vec()
        } else {
            let body = std::str::from_utf8(&bytes[cursor..]).map_err(|_| malformed())?;
            let values: Result<Vec<u8>, _> = body
                .split_ascii_whitespace()
                .map(|t| t.parse::<u8>())
                .collect();
            let values = values.map_err(|_| malformed())?;
            if values.len() < expected {
                return Err(malformed());
            }
            values
        };

        Self::from_raw(width, height, 3, data)
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn height(&self) -> usize {
        self.height
    }

    /// Samples the texture at UV coordinates in [0,1]². Coordinates are scaled
    /// to texel space and clamped, so out-of-range UVs repeat the border texel.
    pub fn sample(&self, uv: Vec2) -> Color {
        let w = ((uv.x * self.width as f64).floor() as isize)
            .clamp(0, self.width as isize - 1) as usize;
        let h = ((uv.y * self.height as f64).floor() as isize)
            .clamp(0, self.height as isize - 1) as usize;

        let index = (h * self.width + w) * self.channels;
        Color::new(
            self.data[index] as f64 / 255.0,
            self.data[index + 1] as f64 / 255.0,
            self.data[index + 2] as f64 / 255.0,
        )
    }
}
