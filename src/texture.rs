use crate::bitmap::Bitmap;
use crate::color::Color3;
use crate::error::{Error, Result};
use crate::resources::Resources;
use crate::utils::{clamp, INV_PI, INV_TWOPI};
use crate::vector::{Point2, Vector3};

use serde::Deserialize;
use std::f32::consts::PI;
use std::path::Path;
use std::sync::Arc;

/// How a bitmap combines with the material albedo.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum TextureMode {
    /// Bitmap value multiplied by the albedo.
    Modulate,
    /// Bitmap value alone; the albedo is ignored.
    Replace,
}

/// Texture properties shared by every material description in a scene
/// file. All fields are optional; a material without a `texture` path
/// is a plain constant color.
#[derive(Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct TextureDescription {
    pub texture: Option<String>,
    pub scale: Option<Point2>,
    pub mode: Option<i32>,
    pub filter: Option<bool>,
}

/// Constant albedo, optionally modulated or replaced by a tiled,
/// bilinearly filtered bitmap.
pub struct Texture {
    albedo: Color3,
    bitmap: Option<Arc<Bitmap>>,
    scale: Point2,
    filter: bool,
}

impl Texture {
    pub fn constant(albedo: Color3) -> Texture {
        Texture {
            albedo,
            bitmap: None,
            scale: Point2::new(1.0_f32, 1.0_f32),
            filter: true,
        }
    }

    pub fn from_description(
        albedo: Color3,
        desc: &TextureDescription,
        scene_dir: &Path,
        resources: &mut Resources,
    ) -> Result<Texture> {
        let path = match &desc.texture {
            Some(p) => p,
            None => return Ok(Texture::constant(albedo)),
        };
        let bitmap = resources.load_bitmap(&scene_dir.join(path))?;
        let mode = match desc.mode.unwrap_or(0) {
            0 => TextureMode::Modulate,
            1 => TextureMode::Replace,
            other => {
                return Err(Error::Config(format!(
                    "Unknown texture mode {} for {} (0 = modulate, 1 = replace).",
                    other, path
                )))
            }
        };
        Ok(Texture {
            albedo: match mode {
                TextureMode::Modulate => albedo,
                TextureMode::Replace => Color3::white(),
            },
            bitmap: Some(bitmap),
            scale: desc.scale.unwrap_or_else(|| Point2::new(1.0_f32, 1.0_f32)),
            filter: desc.filter.unwrap_or(true),
        })
    }

    pub fn look_up(&self, uv: Point2) -> Color3 {
        let bitmap = match &self.bitmap {
            Some(b) => b,
            None => return self.albedo,
        };

        let width = bitmap.width();
        let height = bitmap.height();

        // Tile, then wrap into [0, 1) by dropping the integer part.
        let wrap = |v: f32| v - v.floor();
        let fx = wrap(uv.x() / self.scale.x()) * (width - 1) as f32;
        let fy = wrap(uv.y() / self.scale.y()) * (height - 1) as f32;
        let x = fx as usize;
        let y = fy as usize;

        // Sub-pixel bitmaps cannot be interpolated.
        if width < 2 || height < 2 {
            return bitmap.get(x.min(width - 1), y.min(height - 1)) * self.albedo;
        }

        if !self.filter || x >= width - 1 || y >= height - 1 {
            return bitmap.get(x, y) * self.albedo;
        }

        bilerp(
            fx - x as f32,
            fy - y as f32,
            bitmap.get(x, y),
            bitmap.get(x + 1, y),
            bitmap.get(x, y + 1),
            bitmap.get(x + 1, y + 1),
        ) * self.albedo
    }
}

fn lerp_color(t: f32, a: Color3, b: Color3) -> Color3 {
    a * (1.0_f32 - t) + b * t
}

fn bilerp(tx: f32, ty: f32, c00: Color3, c10: Color3, c01: Color3, c11: Color3) -> Color3 {
    lerp_color(ty, lerp_color(tx, c00, c10), lerp_color(tx, c01, c11))
}

/// Environment map sampled by direction through an equirectangular
/// projection: `u = phi / 2pi`, `v = theta / pi` with `theta` measured
/// from the +Y pole and `phi = atan2(x, z)`.
pub struct LightProbe {
    background: Color3,
    bitmap: Option<Arc<Bitmap>>,
}

impl LightProbe {
    pub fn constant(background: Color3) -> LightProbe {
        LightProbe {
            background,
            bitmap: None,
        }
    }

    pub fn new(bitmap: Arc<Bitmap>) -> LightProbe {
        LightProbe {
            background: Color3::black(),
            bitmap: Some(bitmap),
        }
    }

    pub fn intensity_uv(&self, uv: Point2) -> Color3 {
        let bitmap = match &self.bitmap {
            Some(b) => b,
            None => return self.background,
        };
        let width = bitmap.width();
        let height = bitmap.height();

        // Clamped rather than wrapped: v = 1 is the south pole, not a
        // wrap back to the north.
        let fx = clamp(uv.x(), 0.0_f32, 1.0_f32) * (width - 1) as f32;
        let fy = clamp(uv.y(), 0.0_f32, 1.0_f32) * (height - 1) as f32;
        let x = fx as usize;
        let y = fy as usize;

        if x >= width - 1 || y >= height - 1 || width < 2 || height < 2 {
            return bitmap.get(x.min(width - 1), y.min(height - 1));
        }
        bilerp(
            fx - x as f32,
            fy - y as f32,
            bitmap.get(x, y),
            bitmap.get(x + 1, y),
            bitmap.get(x, y + 1),
            bitmap.get(x + 1, y + 1),
        )
    }

    pub fn intensity(&self, direction: Vector3) -> Color3 {
        let d = direction.normalized();
        let mut phi = d.x().atan2(d.z());
        if phi < 0.0_f32 {
            phi += 2.0_f32 * PI;
        }
        let theta = clamp(d.y(), -1.0_f32, 1.0_f32).acos();
        self.intensity_uv(Point2::new(phi * INV_TWOPI, theta * INV_PI))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn checker_2x2() -> Arc<Bitmap> {
        let mut bm = Bitmap::new(2, 2);
        bm.set(0, 0, Color3::new(1.0, 0.0, 0.0));
        bm.set(1, 0, Color3::new(0.0, 1.0, 0.0));
        bm.set(0, 1, Color3::new(0.0, 0.0, 1.0));
        bm.set(1, 1, Color3::new(1.0, 1.0, 1.0));
        Arc::new(bm)
    }

    fn bitmap_texture(albedo: Color3, filter: bool) -> Texture {
        Texture {
            albedo,
            bitmap: Some(checker_2x2()),
            scale: Point2::new(1.0, 1.0),
            filter,
        }
    }

    #[test]
    fn constant_texture_ignores_uv() {
        let t = Texture::constant(Color3::new(0.25, 0.5, 0.75));
        assert_eq!(t.look_up(Point2::new(0.1, 0.9)), Color3::new(0.25, 0.5, 0.75));
        assert_eq!(t.look_up(Point2::new(-3.0, 7.5)), Color3::new(0.25, 0.5, 0.75));
    }

    #[test]
    fn bilinear_center_averages_the_corners() {
        let t = bitmap_texture(Color3::white(), true);
        // uv (0.5, 0.5) lands exactly between the four texels.
        let c = t.look_up(Point2::new(0.5, 0.5));
        assert!((c.r() - 0.5).abs() < 1e-5);
        assert!((c.g() - 0.5).abs() < 1e-5);
        assert!((c.b() - 0.5).abs() < 1e-5);
    }

    #[test]
    fn modulate_multiplies_by_albedo() {
        let t = bitmap_texture(Color3::grey(0.5), true);
        let c = t.look_up(Point2::new(0.0, 0.0));
        assert!((c.r() - 0.5).abs() < 1e-5);
        assert!(c.g().abs() < 1e-5);
    }

    #[test]
    fn nearest_lookup_when_filtering_is_off() {
        let t = bitmap_texture(Color3::white(), false);
        let c = t.look_up(Point2::new(0.25, 0.25));
        assert_eq!(c, Color3::new(1.0, 0.0, 0.0));
    }

    #[test]
    fn uv_wraps_by_fractional_part() {
        let t = bitmap_texture(Color3::white(), false);
        assert_eq!(
            t.look_up(Point2::new(2.25, -0.75)),
            t.look_up(Point2::new(0.25, 0.25))
        );
    }

    #[test]
    fn probe_poles_read_first_and_last_rows() {
        let probe = LightProbe::new(checker_2x2());
        let north = probe.intensity(Vector3::new(0.0, 1.0, 0.0));
        let south = probe.intensity(Vector3::new(0.0, -1.0, 0.0));
        // theta = 0 reads row 0, theta = pi reads the last row.
        assert_eq!(north, Color3::new(1.0, 0.0, 0.0));
        assert_eq!(south, Color3::new(0.0, 0.0, 1.0));
    }

    #[test]
    fn probe_without_bitmap_returns_background() {
        let probe = LightProbe::constant(Color3::grey(0.3));
        assert_eq!(
            probe.intensity(Vector3::new(0.2, -0.5, 0.8)),
            Color3::grey(0.3)
        );
    }
}
