use crate::camera::Camera;
use crate::config::RenderSettings;
use crate::light::{sample_area_light, PointLight, Spot};
use crate::material::{Material, MaterialFinish, MaterialKind};
use crate::math::{Color, Mat4, Point3, Vec2, Vec3};
use crate::mesh::{self, Face, FaceCorner, MeshData};
use crate::primitive::{Primitive, Shape};
use crate::scene::Scene;
use rand::rngs::SmallRng;
use rand::{Rng, SeedableRng};

/// A complete scene description: geometry, lights, cameras, and the render
/// settings the preset was tuned for.
pub struct SceneDescription {
    pub name: &'static str,
    pub scene: Scene,
    pub settings: RenderSettings,
}

/// Available built-in scene presets.
#[derive(Debug, Clone, Copy, clap::ValueEnum)]
pub enum ScenePreset {
    /// Hero spheres (glass, marble, mirror) over a chessboard plane.
    Showcase,
    /// A refractive sphere focusing a spot light into a caustic on the floor.
    Caustics,
    /// A closed box with an area light sampled into sub-spots.
    Cornell,
    /// Every primitive and material kind in one frame.
    Gallery,
    /// Hundreds of random spheres to exercise the BVH.
    Stress,
}

impl ScenePreset {
    pub fn build(self, width: u32, height: u32) -> SceneDescription {
        match self {
            ScenePreset::Showcase => build_showcase(width, height),
            ScenePreset::Caustics => build_caustics(width, height),
            ScenePreset::Cornell => build_cornell(width, height),
            ScenePreset::Gallery => build_gallery(width, height),
            ScenePreset::Stress => build_stress(width, height),
        }
    }
}

fn grey_diffuse() -> Material {
    Material {
        diffuse: Color::splat(0.6),
        specular: Color::splat(0.1),
        roughness: 0.9,
        ..Material::default()
    }
}

fn mirror() -> Material {
    Material {
        specular: Color::ones(),
        reflectivity: 0.95,
        roughness: 0.0,
        ..Material::default()
    }
}

fn glass() -> Material {
    Material {
        specular: Color::splat(0.4),
        refractivity: 0.95,
        refraction_index: 1.5,
        roughness: 0.0,
        ..Material::default()
    }
}

fn build_showcase(width: u32, height: u32) -> SceneDescription {
    let mut scene = Scene::new();

    let board_light = scene.add_material(Material {
        diffuse: Color::splat(0.85),
        roughness: 0.9,
        ..Material::default()
    });
    let board_dark = scene.add_material(Material {
        diffuse: Color::splat(0.05),
        specular: Color::splat(0.8),
        reflectivity: 0.4,
        roughness: 0.1,
        ..Material::default()
    });
    scene.add_primitive(Primitive::new(
        Shape::Chessboard {
            even: board_light,
            odd: board_dark,
        },
        Mat4::identity(),
        board_light,
    ));

    let glass = scene.add_material(glass());
    scene.add_primitive(Primitive::new(
        Shape::Sphere,
        Mat4::translation(Vec3::new(0.0, 1.0, 4.0)),
        glass,
    ));

    let marble = scene.add_material(Material {
        specular: Color::splat(0.3),
        roughness: 0.4,
        finish: MaterialFinish::Marble {
            veins: Color::new(0.2, 0.15, 0.1),
            filling: Color::new(0.9, 0.85, 0.8),
        },
        ..Material::default()
    });
    scene.add_primitive(Primitive::new(
        Shape::Sphere,
        Mat4::translation(Vec3::new(-2.5, 1.0, 5.5)),
        marble,
    ));

    let mirror = scene.add_material(mirror());
    scene.add_primitive(Primitive::new(
        Shape::Sphere,
        Mat4::translation(Vec3::new(2.5, 1.0, 5.5)),
        mirror,
    ));

    scene.add_point_light(PointLight::new(
        Mat4::translation(Vec3::new(0.0, 6.0, 0.0)),
        Color::splat(40.0),
    ));
    scene.add_spot(Spot::new(
        Mat4::translation(Vec3::new(-4.0, 6.0, 4.0)) * Mat4::rotation_x(std::f64::consts::PI),
        Color::splat(25.0),
        50.0,
    ));

    scene.add_camera(Camera::new(
        Mat4::translation(Vec3::new(0.0, 2.0, -2.0)),
        "showcase",
        width,
        height,
        60.0,
    ));

    SceneDescription {
        name: "showcase",
        scene,
        settings: RenderSettings {
            use_antialiasing: true,
            ..RenderSettings::default()
        },
    }
}

fn build_caustics(width: u32, height: u32) -> SceneDescription {
    let mut scene = Scene::new();

    let floor = scene.add_material(grey_diffuse());
    scene.add_primitive(Primitive::new(
        Shape::Plane,
        Mat4::translation(Vec3::new(0.0, -1.0, 0.0)),
        floor,
    ));

    let glass = scene.add_material(glass());
    scene.add_primitive(Primitive::new(
        Shape::Sphere,
        Mat4::translation(Vec3::new(0.0, 1.0, 5.0)),
        glass,
    ));

    scene.add_spot(Spot::new(
        Mat4::translation(Vec3::new(0.0, 7.0, 5.0)) * Mat4::rotation_x(std::f64::consts::PI),
        Color::splat(60.0),
        40.0,
    ));

    scene.add_camera(Camera::new(
        Mat4::translation(Vec3::new(0.0, 2.0, -2.0)),
        "caustics",
        width,
        height,
        55.0,
    ));

    SceneDescription {
        name: "caustics",
        scene,
        settings: RenderSettings {
            use_photon_mapping: true,
            use_caustics: true,
            ..RenderSettings::default()
        },
    }
}

fn build_cornell(width: u32, height: u32) -> SceneDescription {
    let mut scene = Scene::new();
    let mut rng = SmallRng::seed_from_u64(0xa1ea);

    let white = scene.add_material(Material {
        diffuse: Color::splat(0.8),
        roughness: 0.9,
        ..Material::default()
    });
    let red = scene.add_material(Material {
        diffuse: Color::new(0.75, 0.1, 0.1),
        roughness: 0.9,
        ..Material::default()
    });
    let green = scene.add_material(Material {
        diffuse: Color::new(0.1, 0.75, 0.1),
        roughness: 0.9,
        ..Material::default()
    });

    // Floor, ceiling, back wall, and the two colored side walls. Every wall
    // is the unit plane rotated so its +y normal faces the interior.
    scene.add_primitive(Primitive::new(Shape::Plane, Mat4::identity(), white));
    scene.add_primitive(Primitive::new(
        Shape::Plane,
        Mat4::translation(Vec3::new(0.0, 5.0, 0.0)) * Mat4::rotation_x(std::f64::consts::PI),
        white,
    ));
    scene.add_primitive(Primitive::new(
        Shape::Plane,
        Mat4::translation(Vec3::new(0.0, 0.0, 8.0))
            * Mat4::rotation_x(-std::f64::consts::FRAC_PI_2),
        white,
    ));
    scene.add_primitive(Primitive::new(
        Shape::Plane,
        Mat4::translation(Vec3::new(-3.0, 0.0, 0.0))
            * Mat4::rotation_z(-std::f64::consts::FRAC_PI_2),
        red,
    ));
    scene.add_primitive(Primitive::new(
        Shape::Plane,
        Mat4::translation(Vec3::new(3.0, 0.0, 0.0))
            * Mat4::rotation_z(std::f64::consts::FRAC_PI_2),
        green,
    ));

    let mirror = scene.add_material(mirror());
    scene.add_primitive(Primitive::new(
        Shape::Sphere,
        Mat4::translation(Vec3::new(-1.2, 1.0, 6.0)),
        mirror,
    ));
    let glass = scene.add_material(glass());
    scene.add_primitive(Primitive::new(
        Shape::Sphere,
        Mat4::translation(Vec3::new(1.3, 1.0, 4.5)),
        glass,
    ));

    // Area light at the ceiling: disk-sampled sub-spots plus an emissive
    // disk primitive standing in for the fixture.
    let settings = RenderSettings {
        use_antialiasing: true,
        ..RenderSettings::default()
    };
    let fixture_transform = Mat4::translation(Vec3::new(0.0, 4.99, 5.5))
        * Mat4::rotation_x(std::f64::consts::PI);
    for spot in sample_area_light(
        fixture_transform,
        Color::splat(45.0),
        80.0,
        0.8,
        settings.area_light_samples,
        &mut rng,
    ) {
        scene.add_spot(spot);
    }
    let fixture = scene.add_material(Material {
        emission: Color::ones(),
        transparency: 1.0,
        ..Material::default()
    });
    scene.add_primitive(Primitive::new(
        Shape::Disk,
        fixture_transform * Mat4::scaling(Vec3::new(0.8, 1.0, 0.8)),
        fixture,
    ));

    scene.add_camera(Camera::new(
        Mat4::translation(Vec3::new(0.0, 2.5, -1.5)),
        "cornell",
        width,
        height,
        55.0,
    ));

    SceneDescription {
        name: "cornell",
        scene,
        settings,
    }
}

fn build_gallery(width: u32, height: u32) -> SceneDescription {
    let mut scene = Scene::new();

    let floor = scene.add_material(grey_diffuse());
    scene.add_primitive(Primitive::new(Shape::Plane, Mat4::identity(), floor));

    let copper = scene.add_material(Material {
        diffuse: Color::new(0.7, 0.3, 0.15),
        specular: Color::new(0.9, 0.6, 0.4),
        roughness: 0.3,
        anisotropy: 0.6,
        ..Material::default()
    });
    scene.add_primitive(Primitive::new(
        Shape::Sphere,
        Mat4::translation(Vec3::new(-3.0, 1.0, 6.0)),
        copper,
    ));

    let jade = scene.add_material(Material {
        diffuse: Color::new(0.2, 0.6, 0.4),
        specular: Color::splat(0.3),
        roughness: 0.5,
        ..Material::default()
    });
    scene.add_cone(
        Mat4::translation(Vec3::new(0.0, 1.5, 6.5)) * Mat4::rotation_z(std::f64::consts::PI)
            * Mat4::scaling(Vec3::new(1.0, 1.5, 1.0)),
        jade,
        None,
    );

    let fog = scene.add_material(Material {
        kind: MaterialKind::Volumetric,
        density: 0.35,
        diffuse: Color::splat(0.9),
        emission: Color::splat(0.08),
        ..Material::default()
    });
    scene.add_primitive(Primitive::new(
        Shape::Sphere,
        Mat4::translation(Vec3::new(3.2, 1.2, 7.0)) * Mat4::scaling(Vec3::splat(1.2)),
        fog,
    ));

    // A small mesh pyramid runs the triangle pipeline end to end.
    let gold = scene.add_material(Material {
        diffuse: Color::new(0.8, 0.65, 0.2),
        specular: Color::new(1.0, 0.85, 0.4),
        roughness: 0.35,
        ..Material::default()
    });
    let pyramid = pyramid_mesh();
    if let Err(error) = mesh::add_mesh(
        &mut scene,
        &pyramid,
        Mat4::translation(Vec3::new(0.5, 0.0, 4.0)),
        gold,
        None,
        None,
        None,
    ) {
        eprintln!("failed to add pyramid mesh: {error}");
    }

    scene.add_point_light(PointLight::new(
        Mat4::translation(Vec3::new(0.0, 7.0, 2.0)),
        Color::splat(60.0),
    ));
    scene.add_spot(Spot::gaussian(
        Mat4::translation(Vec3::new(4.0, 6.0, 6.0)) * Mat4::rotation_x(std::f64::consts::PI),
        Color::splat(30.0),
        60.0,
    ));

    scene.add_camera(Camera::with_lens(
        Mat4::translation(Vec3::new(0.0, 2.2, -2.0)),
        "gallery",
        width,
        height,
        60.0,
        8.0,
        0.12,
    ));

    SceneDescription {
        name: "gallery",
        scene,
        settings: RenderSettings::default(),
    }
}

fn build_stress(width: u32, height: u32) -> SceneDescription {
    let mut scene = Scene::new();
    let mut rng = SmallRng::seed_from_u64(0x57e5);

    let floor = scene.add_material(grey_diffuse());
    scene.add_primitive(Primitive::new(Shape::Plane, Mat4::identity(), floor));

    for _ in 0..400 {
        let albedo = Color::new(
            rng.gen_range(0.1..0.9),
            rng.gen_range(0.1..0.9),
            rng.gen_range(0.1..0.9),
        );
        let material = scene.add_material(Material {
            diffuse: albedo,
            specular: Color::splat(rng.gen_range(0.0..0.5)),
            roughness: rng.gen_range(0.2..1.0),
            reflectivity: if rng.gen_bool(0.2) {
                rng.gen_range(0.2..0.8)
            } else {
                0.0
            },
            ..Material::default()
        });
        let radius = rng.gen_range(0.1..0.5);
        let center = Point3::new(
            rng.gen_range(-8.0..8.0),
            radius,
            rng.gen_range(2.0..18.0),
        );
        scene.add_primitive(Primitive::new(
            Shape::Sphere,
            Mat4::translation(center) * Mat4::scaling(Vec3::splat(radius)),
            material,
        ));
    }

    scene.add_point_light(PointLight::new(
        Mat4::translation(Vec3::new(0.0, 10.0, 5.0)),
        Color::splat(120.0),
    ));

    scene.add_camera(Camera::new(
        Mat4::translation(Vec3::new(0.0, 3.0, -4.0)),
        "stress",
        width,
        height,
        65.0,
    ));

    SceneDescription {
        name: "stress",
        scene,
        settings: RenderSettings::default(),
    }
}

/// Four-sided pyramid with UVs, fed through the mesh attribute pipeline.
fn pyramid_mesh() -> MeshData {
    let corner = |position: usize, uv: usize| FaceCorner {
        position,
        uv: Some(uv),
        normal: None,
    };
    let face = |a: FaceCorner, b: FaceCorner, c: FaceCorner| Face {
        corners: [a, b, c],
        smooth: false,
        material: "pyramid".into(),
    };
    MeshData {
        positions: vec![
            Point3::new(-1.0, 0.0, -1.0),
            Point3::new(1.0, 0.0, -1.0),
            Point3::new(1.0, 0.0, 1.0),
            Point3::new(-1.0, 0.0, 1.0),
            Point3::new(0.0, 1.6, 0.0),
        ],
        normals: vec![],
        uvs: vec![
            Vec2::new(0.0, 0.0),
            Vec2::new(1.0, 0.0),
            Vec2::new(1.0, 1.0),
            Vec2::new(0.0, 1.0),
            Vec2::new(0.5, 0.5),
        ],
        faces: vec![
            face(corner(0, 0), corner(4, 4), corner(1, 1)),
            face(corner(1, 1), corner(4, 4), corner(2, 2)),
            face(corner(2, 2), corner(4, 4), corner(3, 3)),
            face(corner(3, 3), corner(4, 4), corner(0, 0)),
        ],
    }
}
