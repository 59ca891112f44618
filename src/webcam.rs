use rscam::Camera;

use crate::errors::*;
use crate::fallwatch::Fallwatch;
use crate::frame::{Frame, FrameSource};
use crate::{info, warn, tags};

pub struct Webcam {
	camera: Camera,
	resolution: (u32, u32),
}

impl Webcam {
	pub fn open(n: &Fallwatch) -> Result<Self> {
		info!("opening camera", tags![
			("webcam_device", &n.config.webcam_device),
			("webcam_interval", &format!("{:?}", &n.config.webcam_interval)),
			("webcam_resolution", &format!("{:?}", &n.config.webcam_resolution))
		]);
		let mut camera = Camera::new(&n.config.webcam_device)?;
		let config = rscam::Config{
			interval: n.config.webcam_interval,
			resolution: n.config.webcam_resolution,
			format: b"YUYV",
			nbuffers: 2,
			field: rscam::FIELD_NONE,
		};

		camera.start(&config)?;

		// Check it's working
		for _ in 0..3 {
			camera.capture()?;
		}

		info!("capture started");
		Ok(Self{
			camera: camera,
			resolution: n.config.webcam_resolution,
		})
	}
}

impl FrameSource for Webcam {
	// Blocks until the driver hands us a buffer
	fn capture(&mut self) -> Result<Option<Frame>> {
		let raw = self.camera.capture()?;
		let (width, height) = self.resolution;

		if raw.len() < Frame::expected_len(width, height) {
			warn!("short frame from camera", tags![
				("len", &raw.len().to_string())
			]);
			return Ok(None);
		}

		Ok(Some(Frame{
			data: raw[..].to_vec(),
			width: width,
			height: height,
			timestamp: raw.get_timestamp(),
		}))
	}
}
