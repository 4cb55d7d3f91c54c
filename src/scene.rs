use crate::bsdf::{Dielectric, Diffuse, Mirror, Phong, SyncBsdf};
use crate::bvh::Aabb;
use crate::camera::{Camera, CameraDescription};
use crate::color::Color3;
use crate::error::{Error, Result};
use crate::frame::Frame;
use crate::integrator::Integrator;
use crate::light::{
    AreaLight, DirectionalLight, InfiniteLight, LightSample, PointLight, SyncLight,
};
use crate::mesh::Mesh;
use crate::point::Point3;
use crate::ray::{Hit, Ray};
use crate::resources::Resources;
use crate::sampler::{Independent, Sampler};
use crate::shape::{Disk, Quad, Sphere, SyncShape};
use crate::texture::{LightProbe, Texture, TextureDescription};
use crate::transform::Transform;
use crate::utils::EPSILON;
use crate::vector::{Point2, Vector3};

use serde::Deserialize;
use std::fs;
use std::path::Path;
use std::sync::Arc;

/// Owns every entity participating in a render: the camera, the
/// integrator, the sampler prototype, the shape table and the light
/// table. Shapes and area lights reference each other by index into
/// these tables.
pub struct Scene {
    camera: Camera,
    integrator: Box<dyn Integrator>,
    sampler: Box<dyn Sampler>,
    shapes: Vec<Box<SyncShape>>,
    lights: Vec<Box<SyncLight>>,
    env_light: Option<usize>,
    background: Color3,
}

impl Scene {
    pub fn new(
        camera: Camera,
        integrator: Box<dyn Integrator>,
        sampler: Box<dyn Sampler>,
        shapes: Vec<Box<SyncShape>>,
        lights: Vec<Box<SyncLight>>,
        env_light: Option<usize>,
        background: Color3,
    ) -> Scene {
        Scene {
            camera,
            integrator,
            sampler,
            shapes,
            lights,
            env_light,
            background,
        }
    }

    pub fn camera(&self) -> &Camera {
        &self.camera
    }

    pub fn integrator(&self) -> &dyn Integrator {
        self.integrator.as_ref()
    }

    pub fn sampler(&self) -> &dyn Sampler {
        self.sampler.as_ref()
    }

    pub fn shapes(&self) -> &[Box<SyncShape>] {
        &self.shapes
    }

    pub fn lights(&self) -> &[Box<SyncLight>] {
        &self.lights
    }

    /// Color seen by rays that leave the scene.
    pub fn background_color(&self, direction: Vector3) -> Color3 {
        match self.env_light {
            Some(index) => self.lights[index].intensity(direction),
            None => self.background,
        }
    }

    /// World-space nearest-hit query across all shapes. The ray
    /// direction must be unit length so the recorded `t` doubles as
    /// the world-space distance.
    ///
    /// Each shape intersects in its own local space; the incoming best
    /// hit bounds the local query, and an accepted local hit is
    /// converted back and compared in world space. Returns whether
    /// `hit` was improved.
    pub fn intersect(&self, ray: &Ray, hit: &mut Hit) -> bool {
        let mut found = false;
        for (index, shape) in self.shapes.iter().enumerate() {
            let transform = shape.transform();
            let local_ray = transform.inv_ray(ray);

            let mut local_hit = Hit::none();
            if hit.found_intersection() {
                // An affine map preserves the ray parameter (the local
                // direction is deliberately not renormalized), so the
                // best world-space t bounds the local query directly.
                local_hit.t = hit.t;
            }

            if !shape.intersect(&local_ray, &mut local_hit) {
                continue;
            }

            let world_pos = transform.point(&local_ray.at(local_hit.t));
            let t_world = (world_pos - ray.origin).length();
            if !hit.found_intersection() || t_world < hit.t {
                hit.t = t_world;
                hit.shape = Some(index);
                hit.face = local_hit.face;
                found = true;
                if !ray.shadow {
                    hit.uv = local_hit.uv;
                    hit.local_frame = Frame::new(
                        transform.vector(&local_hit.local_frame.s).normalized(),
                        transform.vector(&local_hit.local_frame.t).normalized(),
                        transform.normal(&local_hit.local_frame.n).normalized(),
                    );
                }
            }
        }
        found
    }

    /// Shadow query for a sampled light direction: is anything solid
    /// strictly between the (offset) surface point and the light?
    /// A hit on the sampled light's own shape does not occlude.
    pub fn occluded(
        &self,
        pos: &Point3,
        normal: &Vector3,
        light_sample: &LightSample,
        light_shape: Option<usize>,
    ) -> bool {
        let shadow_ray = Ray::shadow_ray(*pos + *normal * EPSILON, light_sample.wi);
        let mut shadow_hit = Hit::none();
        if light_sample.dist.is_finite() {
            // Bound the search so blockers at or beyond the light are
            // never even found.
            shadow_hit.t = light_sample.dist - EPSILON;
        }
        self.intersect(&shadow_ray, &mut shadow_hit) && shadow_hit.shape != light_shape
    }
}

// ---------------------------------------------------------------------------
// Scene description (JSON)
// ---------------------------------------------------------------------------

#[derive(Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
struct SceneDescription {
    background: Option<Color3>,
    camera: CameraDescription,
    integrator: Option<Box<dyn Integrator>>,
    sampler: Option<Box<dyn Sampler>>,
    #[serde(default)]
    shapes: Vec<ShapeDescription>,
    #[serde(default)]
    lights: Vec<LightDescription>,
}

#[derive(Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
enum ShapeDescription {
    #[serde(rename_all = "camelCase")]
    Mesh {
        filename: String,
        #[serde(default)]
        unitize: bool,
        to_world: Option<Transform>,
        bsdf: Option<BsdfDescription>,
        area_light: Option<AreaLightDescription>,
    },
    #[serde(rename_all = "camelCase")]
    Sphere {
        radius: Option<f32>,
        to_world: Option<Transform>,
        bsdf: Option<BsdfDescription>,
        area_light: Option<AreaLightDescription>,
    },
    #[serde(rename_all = "camelCase")]
    Quad {
        size: Option<Point2>,
        to_world: Option<Transform>,
        bsdf: Option<BsdfDescription>,
        area_light: Option<AreaLightDescription>,
    },
    #[serde(rename_all = "camelCase")]
    Disk {
        radius: Option<f32>,
        to_world: Option<Transform>,
        bsdf: Option<BsdfDescription>,
        area_light: Option<AreaLightDescription>,
    },
}

#[derive(Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
enum BsdfDescription {
    #[serde(rename_all = "camelCase")]
    Diffuse {
        albedo: Option<Color3>,
        #[serde(flatten)]
        texture: TextureDescription,
    },
    #[serde(rename_all = "camelCase")]
    Mirror {
        albedo: Option<Color3>,
        #[serde(flatten)]
        texture: TextureDescription,
    },
    #[serde(rename_all = "camelCase")]
    Dielectric {
        #[serde(rename = "intIOR")]
        int_ior: Option<f32>,
        #[serde(rename = "extIOR")]
        ext_ior: Option<f32>,
        albedo: Option<Color3>,
        #[serde(flatten)]
        texture: TextureDescription,
    },
    #[serde(rename_all = "camelCase")]
    Phong {
        kd: Option<Color3>,
        ks: Option<Color3>,
        exponent: Option<f32>,
        #[serde(flatten)]
        texture: TextureDescription,
    },
    #[serde(rename_all = "camelCase")]
    Microfacet {
        alpha: Option<f32>,
        #[serde(rename = "intIOR")]
        int_ior: Option<f32>,
        #[serde(rename = "extIOR")]
        ext_ior: Option<f32>,
        kd: Option<Color3>,
    },
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct AreaLightDescription {
    radiance: Option<Color3>,
    two_sided: Option<bool>,
}

#[derive(Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
enum LightDescription {
    #[serde(rename_all = "camelCase")]
    PointLight {
        radiance: Option<Color3>,
        to_world: Option<Transform>,
    },
    #[serde(rename_all = "camelCase")]
    DirectionalLight {
        radiance: Option<Color3>,
        direction: Option<Vector3>,
        to_world: Option<Transform>,
    },
    #[serde(rename_all = "camelCase")]
    InfiniteLight {
        texture: Option<String>,
        to_world: Option<Transform>,
    },
}

pub fn load_from_file(path: &Path, resources: &mut Resources) -> Result<Scene> {
    let content = fs::read_to_string(path)?;
    let scene_dir = path.parent().unwrap_or_else(|| Path::new("/"));
    load(&content, scene_dir, resources)
}

/// Deserializes a JSON scene specification into a ready-to-render
/// scene. Paths inside the file resolve relative to `scene_dir`.
pub fn load(data: &str, scene_dir: &Path, resources: &mut Resources) -> Result<Scene> {
    let desc: SceneDescription = serde_json::from_str(data)?;

    let camera = Camera::new(desc.camera)?;
    let integrator = desc
        .integrator
        .ok_or_else(|| Error::Config(String::from("No integrator was specified.")))?;
    // A missing sampler falls back to one independent sample per pixel.
    let sampler = desc
        .sampler
        .unwrap_or_else(|| Box::new(Independent::new(1)));

    let mut shapes: Vec<Box<SyncShape>> = Vec::new();
    let mut lights: Vec<Box<SyncLight>> = Vec::new();

    for shape_desc in desc.shapes {
        let (mut shape, area_light) = build_shape(shape_desc, scene_dir, resources)?;
        if let Some(area_light) = area_light {
            if !shape.can_sample_area() {
                return Err(Error::Config(String::from(
                    "An area light cannot be attached to a shape without finite area.",
                )));
            }
            // Wire the cycle through indices: the shape points at the
            // light and the light points back at the shape.
            shape.set_area_light(lights.len());
            lights.push(Box::new(AreaLight::new(
                area_light.radiance.unwrap_or_else(Color3::white),
                area_light.two_sided.unwrap_or(false),
                shapes.len(),
            )));
        }
        shapes.push(shape);
    }

    let mut env_light = None;
    for light_desc in desc.lights {
        match light_desc {
            LightDescription::PointLight { radiance, to_world } => {
                lights.push(Box::new(PointLight::new(
                    radiance.unwrap_or_else(Color3::white),
                    &to_world.unwrap_or_else(Transform::identity),
                )));
            }
            LightDescription::DirectionalLight {
                radiance,
                direction,
                to_world,
            } => {
                lights.push(Box::new(DirectionalLight::new(
                    radiance.unwrap_or_else(Color3::white),
                    direction.unwrap_or_else(|| Vector3::new(1.0_f32, 0.0_f32, 0.0_f32)),
                    &to_world.unwrap_or_else(Transform::identity),
                )));
            }
            LightDescription::InfiniteLight { texture, to_world } => {
                if env_light.is_some() {
                    return Err(Error::Config(String::from(
                        "There can only be one environment light per scene.",
                    )));
                }
                let probe = match texture {
                    Some(path) => {
                        LightProbe::new(resources.load_bitmap(&scene_dir.join(path))?)
                    }
                    None => LightProbe::constant(Color3::black()),
                };
                env_light = Some(lights.len());
                lights.push(Box::new(InfiniteLight::new(
                    probe,
                    to_world.unwrap_or_else(Transform::identity),
                )));
            }
        }
    }

    if !shapes.is_empty() {
        let mut bounds = Aabb::empty();
        for shape in &shapes {
            bounds.expand_box(&shape.bounding_box());
        }
        log::debug!(
            "scene bounds: ({:.3}, {:.3}, {:.3}) to ({:.3}, {:.3}, {:.3})",
            bounds.min.x(),
            bounds.min.y(),
            bounds.min.z(),
            bounds.max.x(),
            bounds.max.y(),
            bounds.max.z()
        );
    }

    let (width, height) = camera.output_size();
    log::info!(
        "scene: {}x{} pixels, {} spp, {} shapes, {} lights{}",
        width,
        height,
        sampler.sample_count(),
        shapes.len(),
        lights.len(),
        if env_light.is_some() {
            ", environment map"
        } else {
            ""
        }
    );

    Ok(Scene::new(
        camera,
        integrator,
        sampler,
        shapes,
        lights,
        env_light,
        desc.background.unwrap_or_else(Color3::black),
    ))
}

fn build_shape(
    desc: ShapeDescription,
    scene_dir: &Path,
    resources: &mut Resources,
) -> Result<(Box<SyncShape>, Option<AreaLightDescription>)> {
    Ok(match desc {
        ShapeDescription::Mesh {
            filename,
            unitize,
            to_world,
            bsdf,
            area_light,
        } => {
            let bsdf = build_bsdf(bsdf, scene_dir, resources)?;
            let mesh = Mesh::load(
                &scene_dir.join(filename),
                unitize,
                to_world.unwrap_or_else(Transform::identity),
                bsdf,
            )?;
            (Box::new(mesh), area_light)
        }
        ShapeDescription::Sphere {
            radius,
            to_world,
            bsdf,
            area_light,
        } => (
            Box::new(Sphere::new(
                radius.unwrap_or(1.0_f32),
                to_world.unwrap_or_else(Transform::identity),
                build_bsdf(bsdf, scene_dir, resources)?,
            )),
            area_light,
        ),
        ShapeDescription::Quad {
            size,
            to_world,
            bsdf,
            area_light,
        } => (
            Box::new(Quad::new(
                size,
                to_world.unwrap_or_else(Transform::identity),
                build_bsdf(bsdf, scene_dir, resources)?,
            )),
            area_light,
        ),
        ShapeDescription::Disk {
            radius,
            to_world,
            bsdf,
            area_light,
        } => (
            Box::new(Disk::new(
                radius.unwrap_or(1.0_f32),
                to_world.unwrap_or_else(Transform::identity),
                build_bsdf(bsdf, scene_dir, resources)?,
            )),
            area_light,
        ),
    })
}

fn build_bsdf(
    desc: Option<BsdfDescription>,
    scene_dir: &Path,
    resources: &mut Resources,
) -> Result<Arc<SyncBsdf>> {
    let desc = match desc {
        Some(desc) => desc,
        // Shapes declared without a material get a neutral diffuse.
        None => return Ok(Arc::new(Diffuse::default_grey())),
    };

    Ok(match desc {
        BsdfDescription::Diffuse { albedo, texture } => {
            let albedo = albedo.unwrap_or_else(|| Color3::grey(0.5_f32));
            Arc::new(Diffuse::new(Texture::from_description(
                albedo, &texture, scene_dir, resources,
            )?))
        }
        BsdfDescription::Mirror { albedo, texture } => {
            let albedo = albedo.unwrap_or_else(Color3::white);
            Arc::new(Mirror::new(Texture::from_description(
                albedo, &texture, scene_dir, resources,
            )?))
        }
        BsdfDescription::Dielectric {
            int_ior,
            ext_ior,
            albedo,
            texture,
        } => {
            let albedo = albedo.unwrap_or_else(Color3::white);
            Arc::new(Dielectric::new(
                // Default: BK7 borosilicate glass in air.
                int_ior.unwrap_or(1.5046_f32),
                ext_ior.unwrap_or(1.000_277_f32),
                Texture::from_description(albedo, &texture, scene_dir, resources)?,
            ))
        }
        BsdfDescription::Phong {
            kd,
            ks,
            exponent,
            texture,
        } => {
            let kd = kd.unwrap_or_else(|| Color3::grey(0.5_f32));
            let ks = ks.unwrap_or_else(|| Color3::grey(0.5_f32));
            Arc::new(Phong::new(
                kd,
                Texture::from_description(kd, &texture, scene_dir, resources)?,
                ks,
                exponent.unwrap_or(0.1_f32),
            ))
        }
        BsdfDescription::Microfacet { .. } => {
            return Err(Error::Unimplemented("microfacet"));
        }
    })
}
