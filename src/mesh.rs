use crate::bsdf::SyncBsdf;
use crate::bvh::{Aabb, Bvh, SplitMethod, MAX_TREE_DEPTH, TARGET_LEAF_SIZE};
use crate::dpdf::DiscretePdf;
use crate::error::{Error, Result};
use crate::frame::Frame;
use crate::point::Point3;
use crate::ray::{Hit, Ray};
use crate::shape::{Shape, ShapeSample};
use crate::transform::Transform;
use crate::vector::{Point2, Vector3};
use crate::warp;

use std::collections::HashMap;
use std::fs;
use std::io;
use std::path::Path;
use std::sync::Arc;
use wavefront_obj::obj;

#[cfg(feature = "count-intersections")]
pub mod stats {
    use std::sync::atomic::{AtomicU64, Ordering};

    /// Number of ray/face tests since the last reset. Only compiled
    /// into profiling builds.
    pub static FACE_INTERSECTIONS: AtomicU64 = AtomicU64::new(0);

    pub fn face_intersection_count() -> u64 {
        FACE_INTERSECTIONS.load(Ordering::Relaxed)
    }

    pub fn reset_face_intersection_count() {
        FACE_INTERSECTIONS.store(0, Ordering::Relaxed);
    }
}

#[derive(Debug, Clone, Copy)]
pub struct Vertex {
    pub position: Point3,
    pub normal: Vector3,
    pub texcoord: Point2,
}

impl Vertex {
    pub fn at(position: Point3) -> Vertex {
        Vertex {
            position,
            normal: Vector3::zero(),
            texcoord: Point2::zero(),
        }
    }
}

/// Indexed triangle mesh with a per-face area distribution for light
/// sampling and a BVH over its faces.
pub struct Mesh {
    vertices: Vec<Vertex>,
    faces: Vec<[u32; 3]>,
    aabb: Aabb,
    area: f32,
    face_pdf: DiscretePdf,
    bvh: Option<Bvh>,
    transform: Transform,
    bsdf: Arc<SyncBsdf>,
    area_light: Option<usize>,
}

impl Mesh {
    pub fn new(
        vertices: Vec<Vertex>,
        faces: Vec<[u32; 3]>,
        transform: Transform,
        bsdf: Arc<SyncBsdf>,
    ) -> Result<Mesh> {
        if faces.is_empty() {
            return Err(Error::Geometry(String::from(
                "A mesh needs at least one face.",
            )));
        }
        for face in &faces {
            for &index in face {
                if index as usize >= vertices.len() {
                    return Err(Error::Geometry(format!(
                        "Mesh has {} vertices but a face references index {}.",
                        vertices.len(),
                        index
                    )));
                }
            }
        }

        let mut aabb = Aabb::empty();
        for v in &vertices {
            aabb.expand_point(&v.position);
        }

        let mut mesh = Mesh {
            vertices,
            faces,
            aabb,
            area: 0.0_f32,
            face_pdf: DiscretePdf::with_capacity(0),
            bvh: None,
            transform,
            bsdf,
            area_light: None,
        };

        // Light sampling distributes samples by world-space face area.
        let mut face_pdf = DiscretePdf::with_capacity(mesh.faces.len());
        for face_id in 0..mesh.faces.len() {
            let [v0, v1, v2] = mesh.face_vertices(face_id as u32);
            let p0 = mesh.transform.point(&v0.position);
            let p1 = mesh.transform.point(&v1.position);
            let p2 = mesh.transform.point(&v2.position);
            face_pdf.append(0.5_f32 * (p1 - p0).cross(p2 - p0).length());
        }
        mesh.area = face_pdf.normalize();
        mesh.face_pdf = face_pdf;

        let bvh = Bvh::build(&mesh, TARGET_LEAF_SIZE, MAX_TREE_DEPTH, SplitMethod::Sah);
        mesh.bvh = Some(bvh);
        Ok(mesh)
    }

    pub fn load(
        path: &Path,
        unitize: bool,
        transform: Transform,
        bsdf: Arc<SyncBsdf>,
    ) -> Result<Mesh> {
        let extension = path
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.to_ascii_lowercase())
            .unwrap_or_default();
        let content = fs::read_to_string(path)?;
        let (mut vertices, faces) = match extension.as_str() {
            "obj" => parse_obj(&content)?,
            "off" => parse_off(&content)?,
            other => {
                return Err(Error::Io(io::Error::new(
                    io::ErrorKind::InvalidInput,
                    format!("Unsupported mesh extension '{}' for {}.", other, path.display()),
                )))
            }
        };
        if unitize {
            make_unitary(&mut vertices);
        }
        log::info!(
            "loaded mesh {}: {} vertices, {} faces",
            path.display(),
            vertices.len(),
            faces.len()
        );
        Mesh::new(vertices, faces, transform, bsdf)
    }

    pub fn nb_faces(&self) -> usize {
        self.faces.len()
    }

    fn face_vertices(&self, face_id: u32) -> [&Vertex; 3] {
        let [i0, i1, i2] = self.faces[face_id as usize];
        [
            &self.vertices[i0 as usize],
            &self.vertices[i1 as usize],
            &self.vertices[i2 as usize],
        ]
    }

    pub fn face_bounding_box(&self, face_id: u32) -> Aabb {
        let [v0, v1, v2] = self.face_vertices(face_id);
        let mut bbox = Aabb::empty();
        bbox.expand_point(&v0.position);
        bbox.expand_point(&v1.position);
        bbox.expand_point(&v2.position);
        bbox
    }

    /// Cramer's-rule solution of `[-d, e1, e2] (t, u, v)^T = o - p0`.
    /// Accepts the hit when it is in front of the ray, inside the
    /// barycentric triangle, and closer than the current `hit.t`.
    pub fn intersect_face(&self, ray: &Ray, hit: &mut Hit, face_id: u32) -> bool {
        #[cfg(feature = "count-intersections")]
        stats::FACE_INTERSECTIONS.fetch_add(1, std::sync::atomic::Ordering::Relaxed);

        let [v0, v1, v2] = self.face_vertices(face_id);

        let edge1 = v1.position - v0.position;
        let edge2 = v2.position - v0.position;
        let p_vec = ray.direction.cross(edge2);
        let determinant = edge1.dot(p_vec);
        if determinant == 0.0_f32 {
            // Ray parallel to the triangle plane.
            return false;
        }

        let inverse_determinant = 1.0_f32 / determinant;
        let t_vec = ray.origin - v0.position;
        let u = t_vec.dot(p_vec) * inverse_determinant;
        if u < 0.0_f32 || u > 1.0_f32 {
            return false;
        }

        let q_vec = t_vec.cross(edge1);
        let v = ray.direction.dot(q_vec) * inverse_determinant;
        if v < 0.0_f32 || u + v > 1.0_f32 {
            return false;
        }

        let t = edge2.dot(q_vec) * inverse_determinant;
        if t <= 0.0_f32 || t >= hit.t {
            return false;
        }

        hit.t = t;
        hit.face = Some(face_id);
        if ray.shadow {
            return true;
        }

        let w = 1.0_f32 - u - v;
        let normal = v0.normal * w + v1.normal * u + v2.normal * v;
        hit.local_frame = Frame::from_normal(normal.normalized());
        hit.uv = Point2::new(
            v0.texcoord.x() * w + v1.texcoord.x() * u + v2.texcoord.x() * v,
            v0.texcoord.y() * w + v1.texcoord.y() * u + v2.texcoord.y() * v,
        );
        true
    }

    fn intersect_brute_force(&self, ray: &Ray, hit: &mut Hit) -> bool {
        match self.aabb.intersect(ray) {
            Some((t_min, _)) if t_min < hit.t => {}
            _ => return false,
        }
        let mut found = false;
        for face_id in 0..self.faces.len() as u32 {
            if self.intersect_face(ray, hit, face_id) {
                found = true;
                if ray.shadow {
                    return true;
                }
            }
        }
        found
    }
}

impl Shape for Mesh {
    fn intersect(&self, ray: &Ray, hit: &mut Hit) -> bool {
        match &self.bvh {
            Some(bvh) => bvh.intersect(self, ray, hit),
            None => self.intersect_brute_force(ray, hit),
        }
    }

    fn bounding_box(&self) -> Aabb {
        self.transform.aabb(&self.aabb)
    }

    fn area(&self) -> f32 {
        self.area
    }

    fn sample(&self, sample: Point2) -> Result<ShapeSample> {
        let mut u = sample.x();
        let face_id = self.face_pdf.sample_reuse(&mut u) as u32;
        let b = warp::square_to_uniform_triangle(Point2::new(u, sample.y()));

        let [v0, v1, v2] = self.face_vertices(face_id);
        let w = 1.0_f32 - b.x() - b.y();
        let local = Point3::origin()
            + (v0.position.to_vector() * b.x()
                + v1.position.to_vector() * b.y()
                + v2.position.to_vector() * w);
        let normal = v0.normal * b.x() + v1.normal * b.y() + v2.normal * w;

        Ok(ShapeSample {
            p: self.transform.point(&local),
            n: self.transform.normal(&normal).normalized(),
            pdf: 1.0_f32 / self.area,
        })
    }

    fn transform(&self) -> &Transform {
        &self.transform
    }

    fn bsdf(&self) -> &Arc<SyncBsdf> {
        &self.bsdf
    }

    fn area_light(&self) -> Option<usize> {
        self.area_light
    }

    fn set_area_light(&mut self, light: usize) {
        self.area_light = Some(light);
    }
}

/// Area-weighted vertex normals for meshes that come without them.
fn compute_normals(vertices: &mut Vec<Vertex>, faces: &[[u32; 3]]) {
    for v in vertices.iter_mut() {
        v.normal = Vector3::zero();
    }
    for face in faces {
        let p0 = vertices[face[0] as usize].position;
        let p1 = vertices[face[1] as usize].position;
        let p2 = vertices[face[2] as usize].position;
        // Cross product length carries the face area weighting.
        let n = (p1 - p0).cross(p2 - p0);
        for &index in face {
            vertices[index as usize].normal = vertices[index as usize].normal + n;
        }
    }
    for v in vertices.iter_mut() {
        let len = v.normal.length();
        if len > 0.0_f32 {
            v.normal = v.normal / len;
        } else {
            v.normal = Vector3::new(0.0_f32, 0.0_f32, 1.0_f32);
        }
    }
}

/// Recenters the vertices and scales the longest extent to one.
fn make_unitary(vertices: &mut Vec<Vertex>) {
    let mut bbox = Aabb::empty();
    for v in vertices.iter() {
        bbox.expand_point(&v.position);
    }
    let center = bbox.center();
    let extent = bbox.max - bbox.min;
    let m = extent.x().max(extent.y()).max(extent.z());
    if m <= 0.0_f32 {
        return;
    }
    for v in vertices.iter_mut() {
        v.position = Point3::origin() + (v.position - center) / m;
    }
}

fn parse_obj(content: &str) -> Result<(Vec<Vertex>, Vec<[u32; 3]>)> {
    let obj_set = obj::parse(content.to_string())?;

    let mut vertices: Vec<Vertex> = Vec::new();
    let mut faces: Vec<[u32; 3]> = Vec::new();
    let mut needs_normals = false;

    for object in &obj_set.objects {
        // OBJ indexes positions, texcoords and normals independently;
        // unify them into one vertex stream per distinct triple.
        let mut remap: HashMap<(usize, Option<usize>, Option<usize>), u32> = HashMap::new();

        let mut resolve = |key: (usize, Option<usize>, Option<usize>),
                           vertices: &mut Vec<Vertex>|
         -> u32 {
            if let Some(&index) = remap.get(&key) {
                return index;
            }
            let (v_index, t_index, n_index) = key;
            let position = object.vertices[v_index];
            let mut vertex = Vertex::at(Point3::new(
                position.x as f32,
                position.y as f32,
                position.z as f32,
            ));
            if let Some(t) = t_index {
                let tv = object.tex_vertices[t];
                vertex.texcoord = Point2::new(tv.u as f32, tv.v as f32);
            }
            if let Some(n) = n_index {
                let nv = object.normals[n];
                vertex.normal = Vector3::new(nv.x as f32, nv.y as f32, nv.z as f32);
            }
            let index = vertices.len() as u32;
            vertices.push(vertex);
            remap.insert(key, index);
            index
        };

        for geometry in &object.geometry {
            for shape in &geometry.shapes {
                match &shape.primitive {
                    obj::Primitive::Triangle(a, b, c) => {
                        let (a, b, c) = (*a, *b, *c);
                        if a.2.is_none() || b.2.is_none() || c.2.is_none() {
                            needs_normals = true;
                        }
                        faces.push([
                            resolve(a, &mut vertices),
                            resolve(b, &mut vertices),
                            resolve(c, &mut vertices),
                        ]);
                    }
                    _ => {
                        return Err(Error::Geometry(format!(
                            "Only triangles are allowed in meshes, but object {} has another primitive type.",
                            object.name
                        )))
                    }
                }
            }
        }
    }

    if needs_normals {
        compute_normals(&mut vertices, &faces);
    }
    Ok((vertices, faces))
}

/// ASCII OFF: a header line, vertex/face/edge counts, vertex
/// positions, then faces as `3 i0 i1 i2`. `#` starts a comment.
fn parse_off(content: &str) -> Result<(Vec<Vertex>, Vec<[u32; 3]>)> {
    fn bad(what: &str) -> Error {
        Error::Geometry(format!("Malformed OFF file: {}.", what))
    }

    fn take_usize(tokens: &mut std::vec::IntoIter<&str>, what: &str) -> Result<usize> {
        tokens
            .next()
            .and_then(|t| t.parse::<usize>().ok())
            .ok_or_else(|| bad(what))
    }

    fn take_f32(tokens: &mut std::vec::IntoIter<&str>) -> Result<f32> {
        tokens
            .next()
            .and_then(|t| t.parse::<f32>().ok())
            .ok_or_else(|| bad("vertex coordinate"))
    }

    let tokens: Vec<&str> = content
        .lines()
        .map(|line| line.split('#').next().unwrap_or(""))
        .flat_map(|line| line.split_whitespace())
        .collect();
    let mut tokens = tokens.into_iter();

    if tokens.next() != Some("OFF") {
        return Err(bad("missing OFF header"));
    }

    let nb_vertices = take_usize(&mut tokens, "vertex count")?;
    let nb_faces = take_usize(&mut tokens, "face count")?;
    let _nb_edges = take_usize(&mut tokens, "edge count")?;

    let mut vertices = Vec::with_capacity(nb_vertices);
    for _ in 0..nb_vertices {
        let x = take_f32(&mut tokens)?;
        let y = take_f32(&mut tokens)?;
        let z = take_f32(&mut tokens)?;
        vertices.push(Vertex::at(Point3::new(x, y, z)));
    }

    let mut faces = Vec::with_capacity(nb_faces);
    for _ in 0..nb_faces {
        let arity = take_usize(&mut tokens, "face arity")?;
        if arity != 3 {
            return Err(bad("only triangular faces are supported"));
        }
        let i0 = take_usize(&mut tokens, "face index")?;
        let i1 = take_usize(&mut tokens, "face index")?;
        let i2 = take_usize(&mut tokens, "face index")?;
        faces.push([i0 as u32, i1 as u32, i2 as u32]);
    }

    compute_normals(&mut vertices, &faces);
    Ok((vertices, faces))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bsdf::Diffuse;
    use rand::Rng;
    use rand_pcg::Pcg32;

    fn bsdf() -> Arc<SyncBsdf> {
        Arc::new(Diffuse::default_grey())
    }

    fn single_triangle() -> Mesh {
        let vertices = vec![
            Vertex {
                position: Point3::new(0.0, 0.0, 0.0),
                normal: Vector3::new(0.0, 0.0, 1.0),
                texcoord: Point2::new(0.0, 0.0),
            },
            Vertex {
                position: Point3::new(1.0, 0.0, 0.0),
                normal: Vector3::new(0.0, 0.0, 1.0),
                texcoord: Point2::new(1.0, 0.0),
            },
            Vertex {
                position: Point3::new(0.0, 1.0, 0.0),
                normal: Vector3::new(0.0, 0.0, 1.0),
                texcoord: Point2::new(0.0, 1.0),
            },
        ];
        Mesh::new(vertices, vec![[0, 1, 2]], Transform::identity(), bsdf()).unwrap()
    }

    /// Deterministic triangle soup inside the unit cube.
    fn random_soup(nb_faces: usize, seed: u64) -> Mesh {
        let mut rng = Pcg32::new(seed, 0xda3e_39cb_94b9_5bdb);
        let mut vertices = Vec::new();
        let mut faces = Vec::new();
        for f in 0..nb_faces {
            let base = Point3::new(rng.gen::<f32>(), rng.gen::<f32>(), rng.gen::<f32>());
            for _ in 0..3 {
                let jitter = Vector3::new(
                    rng.gen::<f32>() * 0.2 - 0.1,
                    rng.gen::<f32>() * 0.2 - 0.1,
                    rng.gen::<f32>() * 0.2 - 0.1,
                );
                vertices.push(Vertex::at(base + jitter));
            }
            let i = (f * 3) as u32;
            faces.push([i, i + 1, i + 2]);
        }
        compute_normals(&mut vertices, &faces);
        Mesh::new(vertices, faces, Transform::identity(), bsdf()).unwrap()
    }

    #[test]
    fn triangle_barycentric_interpolation() {
        let mesh = single_triangle();
        let ray = Ray::new(Point3::new(0.25, 0.25, 2.0), Vector3::new(0.0, 0.0, -1.0));
        let mut hit = Hit::none();
        assert!(mesh.intersect(&ray, &mut hit));
        assert!((hit.t - 2.0).abs() < 1e-4);
        assert_eq!(hit.face, Some(0));
        assert!((hit.uv.x() - 0.25).abs() < 1e-5);
        assert!((hit.uv.y() - 0.25).abs() < 1e-5);
        assert!((hit.local_frame.n.z() - 1.0).abs() < 1e-5);
    }

    #[test]
    fn triangle_rejects_outside_and_behind() {
        let mesh = single_triangle();
        let mut hit = Hit::none();
        let outside = Ray::new(Point3::new(0.9, 0.9, 2.0), Vector3::new(0.0, 0.0, -1.0));
        assert!(!mesh.intersect(&outside, &mut hit));
        let behind = Ray::new(Point3::new(0.25, 0.25, -1.0), Vector3::new(0.0, 0.0, -1.0));
        assert!(!mesh.intersect(&behind, &mut hit));
    }

    #[test]
    fn bvh_matches_brute_force() {
        let mesh = random_soup(300, 7);
        let mut rng = Pcg32::new(1234, 5678);
        let mut hits = 0;
        for _ in 0..1000 {
            let origin = Point3::new(
                rng.gen::<f32>() * 4.0 - 1.5,
                rng.gen::<f32>() * 4.0 - 1.5,
                rng.gen::<f32>() * 4.0 - 1.5,
            );
            let target = Point3::new(rng.gen::<f32>(), rng.gen::<f32>(), rng.gen::<f32>());
            let ray = Ray::new(origin, (target - origin).normalized());

            let mut bvh_hit = Hit::none();
            let bvh_found = mesh.intersect(&ray, &mut bvh_hit);

            let mut brute_hit = Hit::none();
            let brute_found = mesh.intersect_brute_force(&ray, &mut brute_hit);

            assert_eq!(bvh_found, brute_found);
            if bvh_found {
                hits += 1;
                assert!(
                    (bvh_hit.t - brute_hit.t).abs() < 1e-4,
                    "t mismatch: {} vs {}",
                    bvh_hit.t,
                    brute_hit.t
                );
                assert_eq!(bvh_hit.face, brute_hit.face);
            }
        }
        // The soup fills the unit cube; most rays should connect.
        assert!(hits > 500, "only {} rays hit", hits);
    }

    #[test]
    fn identical_centroids_still_build_and_intersect() {
        // Many copies of the same triangle collapse every split.
        let mut vertices = Vec::new();
        let mut faces = Vec::new();
        for f in 0..64_u32 {
            vertices.push(Vertex::at(Point3::new(0.0, 0.0, 0.0)));
            vertices.push(Vertex::at(Point3::new(1.0, 0.0, 0.0)));
            vertices.push(Vertex::at(Point3::new(0.0, 1.0, 0.0)));
            faces.push([f * 3, f * 3 + 1, f * 3 + 2]);
        }
        compute_normals(&mut vertices, &faces);
        let mesh = Mesh::new(vertices, faces, Transform::identity(), bsdf()).unwrap();
        let ray = Ray::new(Point3::new(0.25, 0.25, 1.0), Vector3::new(0.0, 0.0, -1.0));
        let mut hit = Hit::none();
        assert!(mesh.intersect(&ray, &mut hit));
        assert!((hit.t - 1.0).abs() < 1e-4);
    }

    #[test]
    fn face_pdf_normalizes_to_the_total_area() {
        let mesh = single_triangle();
        assert!((mesh.area() - 0.5).abs() < 1e-5);
        let s = mesh.sample(Point2::new(0.4, 0.6)).unwrap();
        assert!((s.pdf - 2.0).abs() < 1e-4);
        // Sampled points stay on the triangle plane.
        assert!(s.p.z().abs() < 1e-5);
        assert!(s.p.x() >= 0.0 && s.p.y() >= 0.0 && s.p.x() + s.p.y() <= 1.0 + 1e-4);
    }

    #[test]
    fn off_parser_reads_a_tetrahedron() {
        let off = "OFF\n4 4 6\n0 0 0\n1 0 0\n0 1 0\n0 0 1\n3 0 2 1\n3 0 1 3\n3 0 3 2\n3 1 2 3\n";
        let (vertices, faces) = parse_off(off).unwrap();
        assert_eq!(vertices.len(), 4);
        assert_eq!(faces.len(), 4);
        // Normals were synthesized and normalized.
        for v in &vertices {
            assert!((v.normal.length() - 1.0).abs() < 1e-4);
        }
    }

    #[test]
    fn off_parser_rejects_garbage() {
        assert!(parse_off("NOT_OFF\n").is_err());
        assert!(parse_off("OFF\n1 1 0\n0 0 0\n4 0 0 0 0\n").is_err());
    }

    #[test]
    fn make_unitary_fits_the_unit_box() {
        let mut vertices = vec![
            Vertex::at(Point3::new(-4.0, 0.0, 0.0)),
            Vertex::at(Point3::new(4.0, 2.0, 0.0)),
            Vertex::at(Point3::new(0.0, -2.0, 8.0)),
        ];
        make_unitary(&mut vertices);
        let mut bbox = Aabb::empty();
        for v in &vertices {
            bbox.expand_point(&v.position);
        }
        let extent = bbox.max - bbox.min;
        let m = extent.x().max(extent.y()).max(extent.z());
        assert!((m - 1.0).abs() < 1e-5);
    }

    #[test]
    fn mesh_validates_face_indices() {
        let vertices = vec![Vertex::at(Point3::origin())];
        assert!(Mesh::new(
            vertices,
            vec![[0, 1, 2]],
            Transform::identity(),
            bsdf()
        )
        .is_err());
    }
}
