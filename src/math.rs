use rand::Rng;
use std::fmt;
use std::ops::{Add, AddAssign, Div, DivAssign, Index, Mul, MulAssign, Neg, Sub};

/// A 3-component vector used for positions, directions, and colors in the ray tracer.
///
/// This type implements all standard arithmetic operations with operator overloading,
/// and provides geometric utilities (dot product, cross product, reflection, refraction)
/// needed for physically-based light transport simulation.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Vec3 {
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

pub type Point3 = Vec3;
pub type Color = Vec3;

impl Vec3 {
    #[inline(always)]
    pub const fn new(x: f64, y: f64, z: f64) -> Self {
        Self { x, y, z }
    }

    #[inline(always)]
    pub const fn splat(v: f64) -> Self {
        Self::new(v, v, v)
    }

    #[inline(always)]
    pub const fn zero() -> Self {
        Self::new(0.0, 0.0, 0.0)
    }

    #[inline(always)]
    pub const fn ones() -> Self {
        Self::new(1.0, 1.0, 1.0)
    }

    #[inline(always)]
    pub const fn unit_x() -> Self {
        Self::new(1.0, 0.0, 0.0)
    }

    #[inline(always)]
    pub const fn unit_y() -> Self {
        Self::new(0.0, 1.0, 0.0)
    }

    #[inline(always)]
    pub const fn unit_z() -> Self {
        Self::new(0.0, 0.0, 1.0)
    }

    /// Squared Euclidean length — avoids the sqrt for performance-critical paths
    /// such as BVH traversal and photon gathering.
    #[inline(always)]
    pub fn length_squared(self) -> f64 {
        self.x * self.x + self.y * self.y + self.z * self.z
    }

    #[inline(always)]
    pub fn length(self) -> f64 {
        self.length_squared().sqrt()
    }

    #[inline(always)]
    pub fn distance(self, other: Self) -> f64 {
        (self - other).length()
    }

    #[inline(always)]
    pub fn distance_squared(self, other: Self) -> f64 {
        (self - other).length_squared()
    }

    /// Returns the unit vector. Panics on zero-length vectors in debug mode.
    #[inline(always)]
    pub fn normalized(self) -> Self {
        let len = self.length();
        debug_assert!(len > 1e-12, "Attempted to normalize a zero-length vector");
        self / len
    }

    /// The standard Euclidean inner product, fundamental to all geometric queries
    /// in the ray tracer (projection, angle computation, shading).
    #[inline(always)]
    pub fn dot(self, rhs: Self) -> f64 {
        self.x * rhs.x + self.y * rhs.y + self.z * rhs.z
    }

    /// Cross product — used for constructing orthonormal tangent frames and
    /// triangle face normals.
    #[inline(always)]
    pub fn cross(self, rhs: Self) -> Self {
        Self::new(
            self.y * rhs.z - self.z * rhs.y,
            self.z * rhs.x - self.x * rhs.z,
            self.x * rhs.y - self.y * rhs.x,
        )
    }

    /// Specular reflection of `self` about the surface normal `n`.
    /// Implements the GLSL `reflect` formula: I - 2·dot(I, N)·N
    #[inline(always)]
    pub fn reflect(self, normal: Self) -> Self {
        self - normal * 2.0 * self.dot(normal)
    }

    /// Snell's law refraction. Returns `None` for total internal reflection (TIR)
    /// when the discriminant is negative, which occurs at grazing angles when
    /// transitioning from a denser to a rarer medium (η > 1).
    #[inline]
    pub fn refract(self, normal: Self, eta_ratio: f64) -> Option<Self> {
        let cos_theta = (-self).dot(normal).min(1.0);
        let r_perp = (self + normal * cos_theta) * eta_ratio;
        let discriminant = 1.0 - r_perp.length_squared();
        if discriminant < 0.0 {
            return None;
        }
        let r_parallel = normal * -(discriminant.sqrt());
        Some(r_perp + r_parallel)
    }

    /// Component-wise (Hadamard) product — used for color modulation where each
    /// channel is attenuated independently by the surface albedo or a filter.
    #[inline(always)]
    pub fn hadamard(self, rhs: Self) -> Self {
        Self::new(self.x * rhs.x, self.y * rhs.y, self.z * rhs.z)
    }

    /// Component-wise linear interpolation: self·(1-t) + other·t
    #[inline(always)]
    pub fn lerp(self, other: Self, t: f64) -> Self {
        self * (1.0 - t) + other * t
    }

    /// Interpolation with the quintic fade applied to the weight. Marble veins
    /// and Perlin noise both want the smoothed blend.
    #[inline(always)]
    pub fn smooth_lerp(self, other: Self, t: f64) -> Self {
        self.lerp(other, fade(t))
    }

    /// Clamps each component to [0, 1] — used before quantizing HDR radiance values
    /// to 8-bit output.
    #[inline(always)]
    pub fn saturate(self) -> Self {
        Self::new(
            self.x.clamp(0.0, 1.0),
            self.y.clamp(0.0, 1.0),
            self.z.clamp(0.0, 1.0),
        )
    }

    #[inline(always)]
    pub fn max_component(self) -> f64 {
        self.x.max(self.y).max(self.z)
    }

    #[inline(always)]
    pub fn is_nan(self) -> bool {
        self.x.is_nan() || self.y.is_nan() || self.z.is_nan()
    }

    /// Checks if the vector is near-zero in all components, used to avoid
    /// degenerate directions that would produce NaN in subsequent math.
    #[inline(always)]
    pub fn near_zero(self) -> bool {
        const EPS: f64 = 1e-8;
        self.x.abs() < EPS && self.y.abs() < EPS && self.z.abs() < EPS
    }

    /// Converts a [0,1] color to an 8-bit RGB triple for terminal preview output.
    pub fn to_rgb8(self) -> (u8, u8, u8) {
        let c = self.saturate();
        (
            (c.x * 255.999) as u8,
            (c.y * 255.999) as u8,
            (c.z * 255.999) as u8,
        )
    }

    /// Generates a uniformly distributed random point inside the unit sphere
    /// via rejection sampling.
    pub fn random_in_unit_sphere(rng: &mut dyn rand::RngCore) -> Self {
        loop {
            let v = Self::new(
                rng.gen_range(-1.0..1.0),
                rng.gen_range(-1.0..1.0),
                rng.gen_range(-1.0..1.0),
            );
            if v.length_squared() < 1.0 {
                return v;
            }
        }
    }

    /// Generates a random unit vector via rejection sampling on the unit sphere.
    pub fn random_unit_vector(rng: &mut dyn rand::RngCore) -> Self {
        Self::random_in_unit_sphere(rng).normalized()
    }
}

/// Random point on a disk of the given radius in the z=0 plane — used for
/// thin-lens depth of field, glossy reflection scattering, and area-light
/// sample placement.
pub fn random_in_disk(rng: &mut dyn rand::RngCore, radius: f64) -> Vec2 {
    loop {
        let v = Vec2::new(rng.gen_range(-1.0..1.0), rng.gen_range(-1.0..1.0));
        if v.length_squared() < 1.0 {
            return v * radius;
        }
    }
}

/// Quintic fade 6t⁵ − 15t⁴ + 10t³, zero first and second derivative at both ends.
#[inline(always)]
pub fn fade(t: f64) -> f64 {
    t * t * t * (t * (t * 6.0 - 15.0) + 10.0)
}

#[inline(always)]
pub fn lerp(a: f64, b: f64, t: f64) -> f64 {
    a + t * (b - a)
}

impl fmt::Display for Vec3 {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({:.3}, {:.3}, {:.3})", self.x, self.y, self.z)
    }
}

impl Neg for Vec3 {
    type Output = Self;
    #[inline(always)]
    fn neg(self) -> Self {
        Self::new(-self.x, -self.y, -self.z)
    }
}

impl Add for Vec3 {
    type Output = Self;
    #[inline(always)]
    fn add(self, rhs: Self) -> Self {
        Self::new(self.x + rhs.x, self.y + rhs.y, self.z + rhs.z)
    }
}

impl AddAssign for Vec3 {
    #[inline(always)]
    fn add_assign(&mut self, rhs: Self) {
        self.x += rhs.x;
        self.y += rhs.y;
        self.z += rhs.z;
    }
}

impl Sub for Vec3 {
    type Output = Self;
    #[inline(always)]
    fn sub(self, rhs: Self) -> Self {
        Self::new(self.x - rhs.x, self.y - rhs.y, self.z - rhs.z)
    }
}

impl Mul<f64> for Vec3 {
    type Output = Self;
    #[inline(always)]
    fn mul(self, t: f64) -> Self {
        Self::new(self.x * t, self.y * t, self.z * t)
    }
}

impl Mul<Vec3> for f64 {
    type Output = Vec3;
    #[inline(always)]
    fn mul(self, v: Vec3) -> Vec3 {
        v * self
    }
}

impl MulAssign<f64> for Vec3 {
    #[inline(always)]
    fn mul_assign(&mut self, t: f64) {
        self.x *= t;
        self.y *= t;
        self.z *= t;
    }
}

impl MulAssign<Vec3> for Vec3 {
    #[inline(always)]
    fn mul_assign(&mut self, rhs: Vec3) {
        self.x *= rhs.x;
        self.y *= rhs.y;
        self.z *= rhs.z;
    }
}

impl Div<f64> for Vec3 {
    type Output = Self;
    #[inline(always)]
    fn div(self, t: f64) -> Self {
        let inv = 1.0 / t;
        Self::new(self.x * inv, self.y * inv, self.z * inv)
    }
}

impl DivAssign<f64> for Vec3 {
    #[inline(always)]
    fn div_assign(&mut self, t: f64) {
        let inv = 1.0 / t;
        self.x *= inv;
        self.y *= inv;
        self.z *= inv;
    }
}

impl Index<usize> for Vec3 {
    type Output = f64;
    fn index(&self, i: usize) -> &f64 {
        match i {
            0 => &self.x,
            1 => &self.y,
            2 => &self.z,
            _ => panic!("Vec3 index out of bounds: {i}"),
        }
    }
}

// ─── Vec2 ───────────────────────────────────────────────────────────────────

/// A 2-component vector for UV coordinates, lens offsets, and resolutions.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Vec2 {
    pub x: f64,
    pub y: f64,
}

impl Vec2 {
    #[inline(always)]
    pub const fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    #[inline(always)]
    pub const fn zero() -> Self {
        Self::new(0.0, 0.0)
    }

    #[inline(always)]
    pub fn length_squared(self) -> f64 {
        self.x * self.x + self.y * self.y
    }
}

impl Add for Vec2 {
    type Output = Self;
    #[inline(always)]
    fn add(self, rhs: Self) -> Self {
        Self::new(self.x + rhs.x, self.y + rhs.y)
    }
}

impl AddAssign for Vec2 {
    #[inline(always)]
    fn add_assign(&mut self, rhs: Self) {
        self.x += rhs.x;
        self.y += rhs.y;
    }
}

impl Sub for Vec2 {
    type Output = Self;
    #[inline(always)]
    fn sub(self, rhs: Self) -> Self {
        Self::new(self.x - rhs.x, self.y - rhs.y)
    }
}

impl Mul<f64> for Vec2 {
    type Output = Self;
    #[inline(always)]
    fn mul(self, t: f64) -> Self {
        Self::new(self.x * t, self.y * t)
    }
}

impl Mul<Vec2> for f64 {
    type Output = Vec2;
    #[inline(always)]
    fn mul(self, v: Vec2) -> Vec2 {
        v * self
    }
}

// ─── 4×4 Transform Matrix ───────────────────────────────────────────────────

/// A column-major 4×4 transform matrix. Every positioned entity in the scene
/// (primitive, light, camera) carries one of these together with its inverse,
/// so rays are intersected in object space and results pushed back to world
/// space through the inverse-transpose for normals.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Mat4 {
    /// cols[c][r]: column-major storage, matching the usual graphics convention.
    pub cols: [[f64; 4]; 4],
}

impl Mat4 {
    pub const fn identity() -> Self {
        Self {
            cols: [
                [1.0, 0.0, 0.0, 0.0],
                [0.0, 1.0, 0.0, 0.0],
                [0.0, 0.0, 1.0, 0.0],
                [0.0, 0.0, 0.0, 1.0],
            ],
        }
    }

    pub fn translation(t: Vec3) -> Self {
        let mut m = Self::identity();
        m.cols[3] = [t.x, t.y, t.z, 1.0];
        m
    }

    pub fn scaling(s: Vec3) -> Self {
        let mut m = Self::identity();
        m.cols[0][0] = s.x;
        m.cols[1][1] = s.y;
        m.cols[2][2] = s.z;
        m
    }

    pub fn rotation_x(radians: f64) -> Self {
        let (s, c) = radians.sin_cos();
        let mut m = Self::identity();
        m.cols[1][1] = c;
        m.cols[1][2] = s;
        m.cols[2][1] = -s;
        m.cols[2][2] = c;
        m
    }

    pub fn rotation_y(radians: f64) -> Self {
        let (s, c) = radians.sin_cos();
        let mut m = Self::identity();
        m.cols[0][0] = c;
        m.cols[0][2] = -s;
        m.cols[2][0] = s;
        m.cols[2][2] = c;
        m
    }

    pub fn rotation_z(radians: f64) -> Self {
        let (s, c) = radians.sin_cos();
        let mut m = Self::identity();
        m.cols[0][0] = c;
        m.cols[0][1] = s;
        m.cols[1][0] = -s;
        m.cols[1][1] = c;
        m
    }

    /// Transforms a point (homogeneous w = 1).
    #[inline]
    pub fn transform_point(&self, p: Point3) -> Point3 {
        let c = &self.cols;
        Point3::new(
            c[0][0] * p.x + c[1][0] * p.y + c[2][0] * p.z + c[3][0],
            c[0][1] * p.x + c[1][1] * p.y + c[2][1] * p.z + c[3][1],
            c[0][2] * p.x + c[1][2] * p.y + c[2][2] * p.z + c[3][2],
        )
    }

    /// Transforms a direction (homogeneous w = 0), ignoring translation.
    #[inline]
    pub fn transform_vector(&self, v: Vec3) -> Vec3 {
        let c = &self.cols;
        Vec3::new(
            c[0][0] * v.x + c[1][0] * v.y + c[2][0] * v.z,
            c[0][1] * v.x + c[1][1] * v.y + c[2][1] * v.z,
            c[0][2] * v.x + c[1][2] * v.y + c[2][2] * v.z,
        )
    }

    pub fn transpose(&self) -> Self {
        let mut out = Self::identity();
        for c in 0..4 {
            for r in 0..4 {
                out.cols[c][r] = self.cols[r][c];
            }
        }
        out
    }

    /// General 4×4 inverse via cofactor expansion. Scene transforms are
    /// affine and well-conditioned; a singular matrix falls back to identity
    /// with a stderr diagnostic rather than poisoning the render with NaN.
    pub fn inverse(&self) -> Self {
        let m = &self.cols;

        let s0 = m[0][0] * m[1][1] - m[1][0] * m[0][1];
        let s1 = m[0][0] * m[2][1] - m[2][0] * m[0][1];
        let s2 = m[0][0] * m[3][1] - m[3][0] * m[0][1];
        let s3 = m[1][0] * m[2][1] - m[2][0] * m[1][1];
        let s4 = m[1][0] * m[3][1] - m[3][0] * m[1][1];
        let s5 = m[2][0] * m[3][1] - m[3][0] * m[2][1];

        let c5 = m[2][2] * m[3][3] - m[3][2] * m[2][3];
        let c4 = m[1][2] * m[3][3] - m[3][2] * m[1][3];
        let c3 = m[1][2] * m[2][3] - m[2][2] * m[1][3];
        let c2 = m[0][2] * m[3][3] - m[3][2] * m[0][3];
        let c1 = m[0][2] * m[2][3] - m[2][2] * m[0][3];
        let c0 = m[0][2] * m[1][3] - m[1][2] * m[0][3];

        let det = s0 * c5 - s1 * c4 + s2 * c3 + s3 * c2 - s4 * c1 + s5 * c0;
        if det.abs() < 1e-12 {
            eprintln!("warning: singular transform, using identity inverse");
            return Self::identity();
        }
        let inv_det = 1.0 / det;

        let mut out = Self::identity();
        out.cols[0][0] = (m[1][1] * c5 - m[2][1] * c4 + m[3][1] * c3) * inv_det;
        out.cols[1][0] = (-m[1][0] * c5 + m[2][0] * c4 - m[3][0] * c3) * inv_det;
        out.cols[2][0] = (m[1][3] * s5 - m[2][3] * s4 + m[3][3] * s3) * inv_det;
        out.cols[3][0] = (-m[1][2] * s5 + m[2][2] * s4 - m[3][2] * s3) * inv_det;

        out.cols[0][1] = (-m[0][1] * c5 + m[2][1] * c2 - m[3][1] * c1) * inv_det;
        out.cols[1][1] = (m[0][0] * c5 - m[2][0] * c2 + m[3][0] * c1) * inv_det;
        out.cols[2][1] = (-m[0][3] * s5 + m[2][3] * s2 - m[3][3] * s1) * inv_det;
        out.cols[3][1] = (m[0][2] * s5 - m[2][2] * s2 + m[3][2] * s1) * inv_det;

        out.cols[0][2] = (m[0][1] * c4 - m[1][1] * c2 + m[3][1] * c0) * inv_det;
        out.cols[1][2] = (-m[0][0] * c4 + m[1][0] * c2 - m[3][0] * c0) * inv_det;
        out.cols[2][2] = (m[0][3] * s4 - m[1][3] * s2 + m[3][3] * s0) * inv_det;
        out.cols[3][2] = (-m[0][2] * s4 + m[1][2] * s2 - m[3][2] * s0) * inv_det;

        out.cols[0][3] = (-m[0][1] * c3 + m[1][1] * c1 - m[2][1] * c0) * inv_det;
        out.cols[1][3] = (m[0][0] * c3 - m[1][0] * c1 + m[2][0] * c0) * inv_det;
        out.cols[2][3] = (-m[0][3] * s3 + m[1][3] * s1 - m[2][3] * s0) * inv_det;
        out.cols[3][3] = (m[0][2] * s3 - m[1][2] * s1 + m[2][2] * s0) * inv_det;

        out
    }
}

impl Mul for Mat4 {
    type Output = Self;
    fn mul(self, rhs: Self) -> Self {
        let mut out = Self::identity();
        for c in 0..4 {
            for r in 0..4 {
                let mut sum = 0.0;
                for k in 0..4 {
                    sum += self.cols[k][r] * rhs.cols[c][k];
                }
                out.cols[c][r] = sum;
            }
        }
        out
    }
}

// ─── Ray ────────────────────────────────────────────────────────────────────

/// A parametric ray R(t) = origin + t · direction. Rays additionally remember
/// the refractive index of the medium they travel through, so refraction at
/// an interface knows both sides of the boundary.
#[derive(Debug, Clone, Copy)]
pub struct Ray {
    pub origin: Point3,
    pub direction: Vec3,
    pub medium_ior: f64,
}

impl Ray {
    #[inline(always)]
    pub const fn new(origin: Point3, direction: Vec3) -> Self {
        Self {
            origin,
            direction,
            medium_ior: 1.0,
        }
    }

    #[inline(always)]
    pub const fn in_medium(origin: Point3, direction: Vec3, medium_ior: f64) -> Self {
        Self {
            origin,
            direction,
            medium_ior,
        }
    }

    /// Evaluates the ray at parameter t. Positive t gives points ahead of the origin.
    #[inline(always)]
    pub fn at(self, t: f64) -> Point3 {
        self.origin + self.direction * t
    }
}

// ─── Axis-Aligned Bounding Box ──────────────────────────────────────────────

/// An axis-aligned bounding box (AABB), the bounding volume used by the BVH.
/// Intersection is tested via the slab method; direction components that are
/// exactly zero produce signed infinities in the reciprocals and fall out of
/// the interval arithmetic without a special case.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Aabb {
    pub min: Point3,
    pub max: Point3,
}

impl Aabb {
    pub const fn new(min: Point3, max: Point3) -> Self {
        Self { min, max }
    }

    /// The inverted-empty box: unioning anything into it yields that thing.
    pub const fn empty() -> Self {
        Self {
            min: Point3::splat(f64::INFINITY),
            max: Point3::splat(f64::NEG_INFINITY),
        }
    }

    #[inline(always)]
    fn corner(&self, index: usize) -> &Point3 {
        if index == 0 {
            &self.min
        } else {
            &self.max
        }
    }

    /// Slab-method ray-AABB test with precomputed reciprocals and sign flags,
    /// the form consumed by the BVH traversal inner loop. A ray starting inside
    /// the box still reports a hit (`max_t ≥ 0`).
    pub fn hit_precomputed(&self, ray: &Ray, reciprocals: Vec3, is_negative: [usize; 3]) -> bool {
        let mut t_min = (self.corner(is_negative[0]).x - ray.origin.x) * reciprocals.x;
        let mut t_max = (self.corner(1 - is_negative[0]).x - ray.origin.x) * reciprocals.x;

        let t_min_y = (self.corner(is_negative[1]).y - ray.origin.y) * reciprocals.y;
        let t_max_y = (self.corner(1 - is_negative[1]).y - ray.origin.y) * reciprocals.y;
        if t_min > t_max_y || t_min_y > t_max {
            return false;
        }
        t_min = t_min.max(t_min_y);
        t_max = t_max.min(t_max_y);

        let t_min_z = (self.corner(is_negative[2]).z - ray.origin.z) * reciprocals.z;
        let t_max_z = (self.corner(1 - is_negative[2]).z - ray.origin.z) * reciprocals.z;
        if t_min > t_max_z || t_min_z > t_max {
            return false;
        }
        t_max = t_max.min(t_max_z);

        t_max >= 0.0
    }

    /// Convenience form that derives reciprocals itself.
    pub fn hit(&self, ray: &Ray) -> bool {
        let (reciprocals, is_negative) = slab_precompute(ray);
        self.hit_precomputed(ray, reciprocals, is_negative)
    }

    /// Slab test returning the entry point and entry distance. A ray whose
    /// origin lies inside the box reports distance 0 at its own origin.
    pub fn hit_entry(&self, ray: &Ray) -> Option<(Point3, f64)> {
        let (reciprocals, is_negative) = slab_precompute(ray);

        let mut t_min = (self.corner(is_negative[0]).x - ray.origin.x) * reciprocals.x;
        let mut t_max = (self.corner(1 - is_negative[0]).x - ray.origin.x) * reciprocals.x;

        let t_min_y = (self.corner(is_negative[1]).y - ray.origin.y) * reciprocals.y;
        let t_max_y = (self.corner(1 - is_negative[1]).y - ray.origin.y) * reciprocals.y;
        if t_min > t_max_y || t_min_y > t_max {
            return None;
        }
        t_min = t_min.max(t_min_y);
        t_max = t_max.min(t_max_y);

        let t_min_z = (self.corner(is_negative[2]).z - ray.origin.z) * reciprocals.z;
        let t_max_z = (self.corner(1 - is_negative[2]).z - ray.origin.z) * reciprocals.z;
        if t_min > t_max_z || t_min_z > t_max {
            return None;
        }
        t_min = t_min.max(t_min_z);
        t_max = t_max.min(t_max_z);

        if t_max < 0.0 {
            return None;
        }
        if t_min < 0.0 {
            Some((ray.origin, 0.0))
        } else {
            Some((ray.at(t_min), t_min))
        }
    }

    /// Computes the union of two AABBs — used during BVH construction to find
    /// the bounding volume of a set of child nodes.
    pub fn union(a: &Aabb, b: &Aabb) -> Aabb {
        let min = Point3::new(
            a.min.x.min(b.min.x),
            a.min.y.min(b.min.y),
            a.min.z.min(b.min.z),
        );
        let max = Point3::new(
            a.max.x.max(b.max.x),
            a.max.y.max(b.max.y),
            a.max.z.max(b.max.z),
        );
        Aabb::new(min, max)
    }

    /// Grows the box to include a point — used when bounding primitive centroids.
    pub fn union_point(a: &Aabb, p: Point3) -> Aabb {
        let min = Point3::new(a.min.x.min(p.x), a.min.y.min(p.y), a.min.z.min(p.z));
        let max = Point3::new(a.max.x.max(p.x), a.max.y.max(p.y), a.max.z.max(p.z));
        Aabb::new(min, max)
    }

    #[inline(always)]
    pub fn diagonal(&self) -> Vec3 {
        self.max - self.min
    }

    pub fn surface_area(&self) -> f64 {
        let d = self.diagonal();
        2.0 * (d.x * d.y + d.x * d.z + d.y * d.z)
    }

    /// Returns the index of the longest axis (0=x, 1=y, 2=z) — the split
    /// dimension during top-down BVH construction.
    pub fn longest_axis(&self) -> usize {
        let d = self.diagonal();
        if d.x > d.y && d.x > d.z {
            0
        } else if d.y > d.z {
            1
        } else {
            2
        }
    }

    /// Normalized [0,1] offset of a point within the box along each axis.
    /// Degenerate axes (zero extent) leave the raw difference untouched.
    pub fn offset(&self, p: Point3) -> Vec3 {
        let mut o = p - self.min;
        if self.max.x > self.min.x {
            o.x /= self.max.x - self.min.x;
        }
        if self.max.y > self.min.y {
            o.y /= self.max.y - self.min.y;
        }
        if self.max.z > self.min.z {
            o.z /= self.max.z - self.min.z;
        }
        o
    }
}

/// Precomputes the direction reciprocals and sign flags shared by every slab
/// test along a single ray.
#[inline(always)]
pub fn slab_precompute(ray: &Ray) -> (Vec3, [usize; 3]) {
    let reciprocals = Vec3::new(
        1.0 / ray.direction.x,
        1.0 / ray.direction.y,
        1.0 / ray.direction.z,
    );
    let is_negative = [
        (reciprocals.x < 0.0) as usize,
        (reciprocals.y < 0.0) as usize,
        (reciprocals.z < 0.0) as usize,
    ];
    (reciprocals, is_negative)
}
