use crate::bvh::Aabb;
use crate::matrix::Matrix4;
use crate::point::Point3;
use crate::ray::Ray;
use crate::vector::Vector3;

use serde::Deserialize;
use std::convert::TryFrom;

// Note on usage of Transforms: shapes intersect in their own local
// space. The scene converts world rays into shape space through the
// cached inverse and converts accepted hits back out through the
// forward matrix; normals go through the inverse transpose so that
// they stay perpendicular under non-uniform scaling.
#[derive(Debug, Clone)]
#[derive(Deserialize)]
#[serde(try_from = "TransformDescription")]
pub struct Transform {
    matrix: Matrix4,
    inverse: Matrix4,
    normal_matrix: Matrix4,
}

impl Transform {
    pub fn new(matrix: Matrix4) -> Result<Transform, &'static str> {
        let inverse = matrix.inverse()?;
        let normal_matrix = inverse.transposed();
        Ok(Transform {
            matrix,
            inverse,
            normal_matrix,
        })
    }

    pub fn identity() -> Transform {
        Transform {
            matrix: Matrix4::identity(),
            inverse: Matrix4::identity(),
            normal_matrix: Matrix4::identity(),
        }
    }

    pub fn point(&self, p: &Point3) -> Point3 {
        &self.matrix * *p
    }

    pub fn vector(&self, v: &Vector3) -> Vector3 {
        &self.matrix * *v
    }

    pub fn normal(&self, n: &Vector3) -> Vector3 {
        &self.normal_matrix * *n
    }

    pub fn inv_point(&self, p: &Point3) -> Point3 {
        &self.inverse * *p
    }

    pub fn inv_vector(&self, v: &Vector3) -> Vector3 {
        &self.inverse * *v
    }

    /// World ray into shape-local space. The direction is deliberately
    /// left unnormalized so that parametric distances stay comparable
    /// on both sides of the mapping.
    pub fn inv_ray(&self, r: &Ray) -> Ray {
        Ray {
            origin: self.inv_point(&r.origin),
            direction: self.inv_vector(&r.direction),
            depth: r.depth,
            shadow: r.shadow,
        }
    }

    /// Transformed axis-aligned box: the box of the eight transformed
    /// corners.
    pub fn aabb(&self, b: &Aabb) -> Aabb {
        let mut out = Aabb::empty();
        for i in 0..8 {
            let corner = Point3::new(
                if i & 1 == 0 { b.min.x() } else { b.max.x() },
                if i & 2 == 0 { b.min.y() } else { b.max.y() },
                if i & 4 == 0 { b.min.z() } else { b.max.z() },
            );
            out.expand_point(&self.point(&corner));
        }
        out
    }
}

// Scene files may give either a translate/rotate/scale record
// (rotations in degrees, applied x then y then z) or a full row-major
// 4x4 matrix as 16 values.
#[derive(Deserialize)]
#[serde(untagged)]
enum TransformDescription {
    Matrix(Vec<f32>),
    Trs {
        translate: Option<Vector3>,
        rotate: Option<Vector3>,
        scale: Option<Vector3>,
    },
}

impl TryFrom<TransformDescription> for Transform {
    type Error = String;

    fn try_from(desc: TransformDescription) -> Result<Self, Self::Error> {
        let matrix = match desc {
            TransformDescription::Matrix(values) => {
                if values.len() != 16 {
                    return Err(format!(
                        "A matrix transform requires 16 values, got {}.",
                        values.len()
                    ));
                }
                let mut rows = [[0_f32; 4]; 4];
                for (i, v) in values.into_iter().enumerate() {
                    rows[i / 4][i % 4] = v;
                }
                Matrix4::from_rows(rows)
            }
            TransformDescription::Trs {
                translate,
                rotate,
                scale,
            } => {
                let translate = translate.unwrap_or_else(Vector3::zero);
                let rotate = rotate.unwrap_or_else(Vector3::zero);
                let scale = scale.unwrap_or_else(Vector3::ones);
                Matrix4::translation(&translate)
                    * Matrix4::rotation_x(rotate.x().to_radians())
                    * Matrix4::rotation_y(rotate.y().to_radians())
                    * Matrix4::rotation_z(rotate.z().to_radians())
                    * Matrix4::scale(&scale)
            }
        };
        Transform::new(matrix).map_err(|e| format!("Invalid transform: {}", e))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normals_stay_perpendicular_under_nonuniform_scale() {
        let t = Transform::new(Matrix4::scale(&Vector3::new(2.0, 1.0, 1.0))).unwrap();
        // A 45 degree surface in the xz plane.
        let tangent = Vector3::new(1.0, 0.0, 1.0);
        let normal = Vector3::new(1.0, 0.0, -1.0).normalized();
        let world_tangent = t.vector(&tangent);
        let world_normal = t.normal(&normal);
        assert!(world_tangent.dot(world_normal).abs() < 1e-5);
    }

    #[test]
    fn inv_ray_round_trips_points() {
        let t = Transform::new(
            Matrix4::translation(&Vector3::new(3.0, 0.0, -1.0)) * Matrix4::rotation_z(1.1),
        )
        .unwrap();
        let r = Ray::new(Point3::new(1.0, 2.0, 3.0), Vector3::new(0.0, 0.0, 1.0));
        let local = t.inv_ray(&r);
        let back = t.point(&local.at(2.5));
        let expect = r.at(2.5);
        assert!((back.x() - expect.x()).abs() < 1e-4);
        assert!((back.y() - expect.y()).abs() < 1e-4);
        assert!((back.z() - expect.z()).abs() < 1e-4);
    }

    #[test]
    fn deserializes_trs_and_matrix_forms() {
        let trs: Transform =
            serde_json::from_str(r#"{"translate": [1.0, 2.0, 3.0], "rotate": [0.0, 90.0, 0.0]}"#)
                .unwrap();
        let p = trs.point(&Point3::origin());
        assert!((p.x() - 1.0).abs() < 1e-5);

        let m: Transform = serde_json::from_str(
            "[1.0, 0.0, 0.0, 5.0, 0.0, 1.0, 0.0, 0.0, 0.0, 0.0, 1.0, 0.0, 0.0, 0.0, 0.0, 1.0]",
        )
        .unwrap();
        assert!((m.point(&Point3::origin()).x() - 5.0).abs() < 1e-5);
    }
}
