use crate::error::{Error, Result};
use crate::matrix::Matrix4;
use crate::point::Point3;
use crate::ray::Ray;
use crate::rfilter::{GaussianFilter, ReconstructionFilter};
use crate::transform::Transform;
use crate::vector::{Point2, Vector3};

use serde::Deserialize;

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CameraDescription {
	pub fov: f32,
	#[serde(default = "CameraDescription::default_near_clip")]
	pub near_clip: f32,
	#[serde(default = "CameraDescription::default_far_clip")]
	pub far_clip: f32,
	#[serde(default = "CameraDescription::default_width")]
	pub width: u32,
	#[serde(default = "CameraDescription::default_height")]
	pub height: u32,
	pub to_world: Option<Transform>,
	pub rfilter: Option<Box<dyn ReconstructionFilter>>,
}

impl CameraDescription {
	fn default_near_clip() -> f32 {
		1e-4_f32
	}
	fn default_far_clip() -> f32 {
		1e4_f32
	}
	fn default_width() -> u32 {
		1280
	}
	fn default_height() -> u32 {
		720
	}
}

/// Perspective pinhole camera. Importance-samples one ray per film
/// sample through the cached screen-space-to-camera-space mapping.
pub struct Camera {
	output_size: (u32, u32),
	inv_output_size: (f32, f32),
	sample_to_camera: Matrix4,
	camera_to_world: Transform,
	rfilter: Box<dyn ReconstructionFilter>,
}

impl Camera {
	pub fn new(desc: CameraDescription) -> Result<Camera> {
		if desc.fov <= 0.0_f32 || desc.fov >= 180.0_f32 {
			return Err(Error::Config(format!(
				"Camera field of view must be in (0, 180), got {}.",
				desc.fov
			)));
		}
		if desc.width == 0 || desc.height == 0 {
			return Err(Error::Config(String::from(
				"Camera output size must be non-zero.",
			)));
		}
		if desc.far_clip <= desc.near_clip {
			return Err(Error::Config(String::from(
				"Camera far clip must exceed the near clip.",
			)));
		}

		let aspect = desc.width as f32 / desc.height as f32;
		let recip = 1.0_f32 / (desc.far_clip - desc.near_clip);
		let cot = 1.0_f32 / (desc.fov.to_radians() / 2.0_f32).tan();

		let perspective = Matrix4::from_rows([
			[cot, 0.0_f32, 0.0_f32, 0.0_f32],
			[0.0_f32, cot, 0.0_f32, 0.0_f32],
			[
				0.0_f32,
				0.0_f32,
				desc.far_clip * recip,
				-desc.near_clip * desc.far_clip * recip,
			],
			[0.0_f32, 0.0_f32, 1.0_f32, 0.0_f32],
		]);

		// Image-plane pixels to the perspective frustum, inverted once.
		let screen = Matrix4::scale(&Vector3::new(-0.5_f32, -0.5_f32 * aspect, 1.0_f32))
			* Matrix4::translation(&Vector3::new(-1.0_f32, -1.0_f32 / aspect, 0.0_f32))
			* perspective;
		let sample_to_camera = screen
			.inverse()
			.map_err(|e| Error::Config(format!("Degenerate camera projection: {}", e)))?;

		Ok(Camera {
			output_size: (desc.width, desc.height),
			inv_output_size: (1.0_f32 / desc.width as f32, 1.0_f32 / desc.height as f32),
			sample_to_camera,
			camera_to_world: desc.to_world.unwrap_or_else(Transform::identity),
			rfilter: desc
				.rfilter
				.unwrap_or_else(|| Box::new(GaussianFilter::default())),
		})
	}

	pub fn output_size(&self) -> (u32, u32) {
		self.output_size
	}

	pub fn rfilter(&self) -> &dyn ReconstructionFilter {
		self.rfilter.as_ref()
	}

	/// Generate the camera ray through a film position given in
	/// fractional pixel coordinates.
	pub fn sample_ray(&self, sample_position: Point2) -> Ray {
		let near_p = self.sample_to_camera.transform_homogeneous(Point3::new(
			sample_position.x() * self.inv_output_size.0,
			sample_position.y() * self.inv_output_size.1,
			0.0_f32,
		));
		let d = near_p.to_vector().normalized();

		Ray::new(
			self.camera_to_world.point(&Point3::origin()),
			self.camera_to_world.vector(&d).normalized(),
		)
	}
}
