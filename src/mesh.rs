use crate::material::MaterialId;
use crate::math::{Mat4, Point3, Vec2, Vec3};
use crate::primitive::{Primitive, Shape, TextureId, TriangleData, TriangleVertex};
use crate::scene::Scene;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum MeshError {
    #[error("face references vertex {index} but the mesh has {count} positions")]
    PositionOutOfRange { index: usize, count: usize },
    #[error("face references uv {index} but the mesh has {count} uvs")]
    UvOutOfRange { index: usize, count: usize },
    #[error("face references normal {index} but the mesh has {count} normals")]
    NormalOutOfRange { index: usize, count: usize },
}

/// One corner of a face: indices into the mesh's attribute arrays.
#[derive(Debug, Clone, Copy)]
pub struct FaceCorner {
    pub position: usize,
    pub uv: Option<usize>,
    pub normal: Option<usize>,
}

#[derive(Debug, Clone)]
pub struct Face {
    pub corners: [FaceCorner; 3],
    pub smooth: bool,
    pub material: String,
}

/// Pre-parsed mesh data as an external loader hands it over: attribute
/// arrays plus faces indexing into them. The crate never parses mesh file
/// formats itself.
#[derive(Debug, Clone, Default)]
pub struct MeshData {
    pub positions: Vec<Point3>,
    pub normals: Vec<Vec3>,
    pub uvs: Vec<Vec2>,
    pub faces: Vec<Face>,
}

/// Per-vertex accumulators for the attribute pass.
#[derive(Clone, Copy)]
struct VertexBasis {
    normal: Vec3,
    tangent: Vec3,
    bitangent: Vec3,
}

/// Turns mesh data into renderable triangles: face frames are derived from
/// position and UV deltas, missing vertex normals are accumulated from face
/// normals, and per-vertex tangent frames are accumulated and
/// Gram-Schmidt-orthogonalized against the normal. Degenerate faces are
/// skipped with a stderr diagnostic.
pub fn build_triangles(mesh: &MeshData) -> Result<Vec<TriangleData>, MeshError> {
    for face in &mesh.faces {
        for corner in &face.corners {
            if corner.position >= mesh.positions.len() {
                return Err(MeshError::PositionOutOfRange {
                    index: corner.position,
                    count: mesh.positions.len(),
                });
            }
            if let Some(uv) = corner.uv {
                if uv >= mesh.uvs.len() {
                    return Err(MeshError::UvOutOfRange {
                        index: uv,
                        count: mesh.uvs.len(),
                    });
                }
            }
            if let Some(normal) = corner.normal {
                if normal >= mesh.normals.len() {
                    return Err(MeshError::NormalOutOfRange {
                        index: normal,
                        count: mesh.normals.len(),
                    });
                }
            }
        }
    }

    let mut accumulators = vec![
        VertexBasis {
            normal: Vec3::zero(),
            tangent: Vec3::zero(),
            bitangent: Vec3::zero(),
        };
        mesh.positions.len()
    ];

    // First pass: face frames, accumulated onto the shared vertices.
    let mut face_valid = Vec::with_capacity(mesh.faces.len());
    let mut degenerate = 0usize;
    for face in &mesh.faces {
        let p0 = mesh.positions[face.corners[0].position];
        let p1 = mesh.positions[face.corners[1].position];
        let p2 = mesh.positions[face.corners[2].position];

        let edge1 = p1 - p0;
        let edge2 = p2 - p0;
        let cross = edge1.cross(edge2);
        if cross.near_zero() {
            degenerate += 1;
            face_valid.push(false);
            continue;
        }
        let face_normal = cross.normalized();

        // Tangent frame from the UV parameterization; faces without UVs (or
        // with a collapsed UV mapping) fall back to an edge-aligned frame.
        let (face_tangent, face_bitangent) = match (
            face.corners[0].uv,
            face.corners[1].uv,
            face.corners[2].uv,
        ) {
            (Some(uv0), Some(uv1), Some(uv2)) => {
                let delta_uv1 = mesh.uvs[uv1] - mesh.uvs[uv0];
                let delta_uv2 = mesh.uvs[uv2] - mesh.uvs[uv0];
                let determinant = delta_uv1.x * delta_uv2.y - delta_uv2.x * delta_uv1.y;
                if determinant.abs() < 1e-12 {
                    (edge1.normalized(), face_normal.cross(edge1.normalized()))
                } else {
                    let inv = 1.0 / determinant;
                    let tangent = (edge1 * delta_uv2.y - edge2 * delta_uv1.y) * inv;
                    let bitangent = (edge2 * delta_uv1.x - edge1 * delta_uv2.x) * inv;
                    (tangent, bitangent)
                }
            }
            _ => (edge1.normalized(), face_normal.cross(edge1.normalized())),
        };

        for corner in &face.corners {
            let accumulator = &mut accumulators[corner.position];
            accumulator.normal += face_normal;
            accumulator.tangent += face_tangent;
            accumulator.bitangent += face_bitangent;
        }
        face_valid.push(true);
    }
    if degenerate > 0 {
        eprintln!("skipped {degenerate} degenerate mesh face(s)");
    }

    // Second pass: finalize per-vertex frames.
    let vertex_bases: Vec<VertexBasis> = accumulators
        .into_iter()
        .map(|accumulator| {
            let normal = if accumulator.normal.near_zero() {
                Vec3::unit_y()
            } else {
                accumulator.normal.normalized()
            };
            // Gram-Schmidt the accumulated tangent against the normal.
            let raw_tangent = accumulator.tangent - normal * normal.dot(accumulator.tangent);
            let tangent = if raw_tangent.near_zero() {
                let reference = if normal.y.abs() > 0.99 {
                    Vec3::unit_x()
                } else {
                    Vec3::unit_y()
                };
                (reference - normal * reference.dot(normal)).normalized()
            } else {
                raw_tangent.normalized()
            };
            let bitangent = normal.cross(tangent).normalized();
            VertexBasis {
                normal,
                tangent,
                bitangent,
            }
        })
        .collect();

    // Third pass: emit triangles with resolved attributes.
    let mut triangles = Vec::with_capacity(mesh.faces.len());
    for (face, valid) in mesh.faces.iter().zip(&face_valid) {
        if !valid {
            continue;
        }
        let vertices = face.corners.map(|corner| {
            let basis = vertex_bases[corner.position];
            TriangleVertex {
                position: mesh.positions[corner.position],
                uv: corner.uv.map(|index| mesh.uvs[index]),
                normal: corner
                    .normal
                    .map(|index| mesh.normals[index])
                    .unwrap_or(basis.normal),
                tangent: basis.tangent,
                bitangent: basis.bitangent,
            }
        });
        triangles.push(TriangleData::new(vertices, face.smooth));
    }

    Ok(triangles)
}

/// Builds the mesh's triangles and inserts them into the scene under one
/// transform and material.
pub fn add_mesh(
    scene: &mut Scene,
    mesh: &MeshData,
    transform: Mat4,
    material: MaterialId,
    albedo: Option<TextureId>,
    normal_map: Option<TextureId>,
    aorm: Option<TextureId>,
) -> Result<usize, MeshError> {
    let triangles = build_triangles(mesh)?;
    let count = triangles.len();
    for triangle in triangles {
        scene.add_primitive(Primitive::with_textures(
            Shape::Triangle(triangle),
            transform,
            material,
            albedo,
            normal_map,
            aorm,
        ));
    }
    Ok(count)
}
