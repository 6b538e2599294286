use crate::camera::Camera;
use crate::light::{PointLight, Spot};
use crate::material::{Material, MaterialId};
use crate::math::{Mat4, Point3};
use crate::primitive::{Primitive, PrimitiveRef, Shape, TextureId};
use crate::texture::Texture;

/// The positional base shared by primitives, lights, and cameras: a
/// local→world transform, its inverse, and the world-space position of the
/// local origin.
#[derive(Debug, Clone, Copy)]
pub struct Entity {
    pub transform: Mat4,
    pub inverse: Mat4,
    pub world_origin: Point3,
}

impl Entity {
    pub fn new(transform: Mat4) -> Self {
        let inverse = transform.inverse();
        let world_origin = transform.transform_point(Point3::zero());
        Self {
            transform,
            inverse,
            world_origin,
        }
    }
}

/// The owned scene value: arenas for materials and textures, the primitive
/// containers, lights, and cameras. Built single-threaded, then frozen —
/// everything downstream (BVH, photon maps, workers) borrows it immutably.
///
/// Bounded primitives go into `primitives` (the BVH's domain); infinite
/// planes go into `planes` and are folded into every traversal separately.
#[derive(Default)]
pub struct Scene {
    pub materials: Vec<Material>,
    pub textures: Vec<Texture>,
    pub primitives: Vec<Primitive>,
    pub planes: Vec<Primitive>,
    pub point_lights: Vec<PointLight>,
    pub spots: Vec<Spot>,
    pub cameras: Vec<Camera>,
}

impl Scene {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_material(&mut self, material: Material) -> MaterialId {
        self.materials.push(material);
        self.materials.len() - 1
    }

    pub fn add_texture(&mut self, texture: Texture) -> TextureId {
        self.textures.push(texture);
        self.textures.len() - 1
    }

    /// Routes the primitive by boundedness: infinite shapes cannot live in
    /// the BVH and go to the plane list instead.
    pub fn add_primitive(&mut self, primitive: Primitive) {
        if primitive.is_unbounded() {
            self.planes.push(primitive);
        } else {
            self.primitives.push(primitive);
        }
    }

    /// A cone spawns its base disk on construction, translated one unit up
    /// the local axis so it caps the wide end.
    pub fn add_cone(&mut self, transform: Mat4, material: MaterialId, albedo: Option<TextureId>) {
        self.add_primitive(Primitive::with_textures(
            Shape::Cone,
            transform,
            material,
            albedo,
            None,
            None,
        ));
        let base_transform = transform * Mat4::translation(Point3::new(0.0, 1.0, 0.0));
        self.add_primitive(Primitive::with_textures(
            Shape::Disk,
            base_transform,
            material,
            albedo,
            None,
            None,
        ));
    }

    pub fn add_point_light(&mut self, light: PointLight) {
        self.point_lights.push(light);
    }

    pub fn add_spot(&mut self, spot: Spot) {
        self.spots.push(spot);
    }

    pub fn add_camera(&mut self, camera: Camera) {
        self.cameras.push(camera);
    }

    /// Resolves an interaction's primitive handle against the right arena.
    pub fn primitive(&self, reference: PrimitiveRef) -> &Primitive {
        match reference {
            PrimitiveRef::Object(index) => &self.primitives[index],
            PrimitiveRef::Plane(index) => &self.planes[index],
        }
    }

    /// Clears every container between frames; arenas are rebuilt from scratch
    /// for the next scene definition.
    pub fn clear(&mut self) {
        self.materials.clear();
        self.textures.clear();
        self.primitives.clear();
        self.planes.clear();
        self.point_lights.clear();
        self.spots.clear();
        self.cameras.clear();
    }
}
