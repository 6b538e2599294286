use crate::config::RenderSettings;
use crate::math::{random_in_disk, Mat4, Point3, Ray, Vec3};
use crate::scene::Entity;

/// A camera positioned by a transform, shooting rays through a virtual pixel
/// plane at local z = 1. The vertical axis is mapped top-down so pixel (0, 0)
/// lands in the image's top-left corner.
///
/// With a focal distance and aperture set, primary rays are jittered across
/// a thin lens: the origin moves on the aperture disk while the direction is
/// re-aimed at the focal point, producing depth of field.
pub struct Camera {
    pub entity: Entity,
    pub name: String,
    pub width: u32,
    pub height: u32,
    pub fov_degrees: f64,
    pub focal_distance: f64,
    pub aperture: f64,
}

impl Camera {
    pub fn new(transform: Mat4, name: impl Into<String>, width: u32, height: u32, fov: f64) -> Self {
        Self {
            entity: Entity::new(transform),
            name: name.into(),
            width,
            height,
            fov_degrees: fov,
            focal_distance: 0.0,
            aperture: 0.0,
        }
    }

    pub fn with_lens(
        transform: Mat4,
        name: impl Into<String>,
        width: u32,
        height: u32,
        fov: f64,
        focal_distance: f64,
        aperture: f64,
    ) -> Self {
        let mut camera = Self::new(transform, name, width, height, fov);
        camera.focal_distance = focal_distance;
        camera.aperture = aperture;
        camera
    }

    /// Side length of one pixel on the local z = 1 plane.
    pub fn pixel_size(&self) -> f64 {
        2.0 * (self.fov_degrees.to_radians() / 2.0).tan() / self.width as f64
    }

    /// Local-space x of the image's left edge and y of its top edge.
    pub fn top_left(&self) -> (f64, f64) {
        let pixel_size = self.pixel_size();
        (
            -(pixel_size * self.width as f64) / 2.0,
            (pixel_size * self.height as f64) / 2.0,
        )
    }

    /// Pushes a camera-local ray into world space: direction with w = 0,
    /// origin with w = 1, direction renormalized.
    pub fn globalize(&self, local_ray: Ray) -> Ray {
        Ray::in_medium(
            self.entity.transform.transform_point(local_ray.origin),
            self.entity
                .transform
                .transform_vector(local_ray.direction)
                .normalized(),
            local_ray.medium_ior,
        )
    }

    /// A pinhole primary ray through the given local direction.
    pub fn pinhole_ray(&self, local_direction: Vec3) -> Ray {
        self.globalize(Ray::new(Point3::zero(), local_direction))
    }

    /// One thin-lens sample: origin jittered on the aperture disk, direction
    /// re-aimed at the focal point along the pixel direction.
    pub fn lens_ray(&self, local_direction: Vec3, rng: &mut dyn rand::RngCore) -> Ray {
        let focal_point = local_direction / local_direction.z * self.focal_distance;
        let lens_offset = random_in_disk(rng, self.aperture);
        let origin = Point3::new(lens_offset.x, lens_offset.y, 0.0);
        let direction = (focal_point - origin).normalized();
        self.globalize(Ray::new(origin, direction))
    }

    /// Rays to average for one pixel sample direction, honoring the
    /// depth-of-field setting.
    pub fn rays_for_direction(
        &self,
        local_direction: Vec3,
        settings: &RenderSettings,
        rng: &mut dyn rand::RngCore,
    ) -> Vec<Ray> {
        if settings.use_depth_of_field && self.aperture > 0.0 {
            (0..settings.dof_samples)
                .map(|_| self.lens_ray(local_direction, rng))
                .collect()
        } else {
            vec![self.pinhole_ray(local_direction)]
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::SmallRng;
    use rand::SeedableRng;

    #[test]
    fn pixel_grid_spans_the_field_of_view() {
        let camera = Camera::new(Mat4::identity(), "test", 100, 50, 90.0);
        let pixel_size = camera.pixel_size();
        // 90° vertical FOV at z = 1 spans [-1, 1]: 100 pixels of size 0.02.
        assert!((pixel_size - 0.02).abs() < 1e-12);
        let (left, top) = camera.top_left();
        assert!((left + 1.0).abs() < 1e-12);
        assert!((top - 0.5).abs() < 1e-12);
    }

    #[test]
    fn pinhole_rays_originate_at_the_camera() {
        let transform = Mat4::translation(Vec3::new(1.0, 2.0, 3.0));
        let camera = Camera::new(transform, "test", 64, 64, 60.0);
        let ray = camera.pinhole_ray(Vec3::unit_z());
        assert!((ray.origin - Point3::new(1.0, 2.0, 3.0)).near_zero());
        assert!((ray.direction - Vec3::unit_z()).near_zero());
        assert!((ray.direction.length() - 1.0).abs() < 1e-12);
    }

    #[test]
    fn rotated_camera_rotates_its_rays() {
        let transform = Mat4::rotation_y(std::f64::consts::FRAC_PI_2);
        let camera = Camera::new(transform, "test", 64, 64, 60.0);
        let ray = camera.pinhole_ray(Vec3::unit_z());
        assert!((ray.direction - Vec3::unit_x()).length() < 1e-9);
    }

    #[test]
    fn lens_rays_converge_at_the_focal_plane() {
        let camera = Camera::with_lens(Mat4::identity(), "dof", 64, 64, 60.0, 5.0, 0.3);
        let mut rng = SmallRng::seed_from_u64(9);
        let direction = Vec3::new(0.1, -0.05, 1.0);
        let focal_point = direction / direction.z * 5.0;

        for _ in 0..20 {
            let ray = camera.lens_ray(direction, &mut rng);
            // Each jittered ray passes through the shared focal point.
            let t = (focal_point.z - ray.origin.z) / ray.direction.z;
            let reached = ray.at(t);
            assert!((reached - focal_point).length() < 1e-9);
            // Origins stay on the aperture disk.
            assert!(ray.origin.length() <= 0.3 + 1e-9);
        }
    }

    #[test]
    fn pinhole_fallback_without_depth_of_field() {
        let camera = Camera::with_lens(Mat4::identity(), "dof", 64, 64, 60.0, 5.0, 0.3);
        let settings = RenderSettings::default();
        let mut rng = SmallRng::seed_from_u64(1);
        let rays = camera.rays_for_direction(Vec3::unit_z(), &settings, &mut rng);
        assert_eq!(rays.len(), 1);

        let dof_settings = RenderSettings {
            use_depth_of_field: true,
            ..RenderSettings::default()
        };
        let rays = camera.rays_for_direction(Vec3::unit_z(), &dof_settings, &mut rng);
        assert_eq!(rays.len(), dof_settings.dof_samples as usize);
    }
}
