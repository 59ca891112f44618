use std::fs::{self, File};
use std::io::{self, BufWriter};
use std::path::Path;

use image::{ExtendedColorType, ImageEncoder};
use image::codecs::jpeg::JpegEncoder;

use crate::errors::*;
use crate::frame::Frame;

pub trait Snapshot {
	fn save_frame(&self, path: &Path, frame: &Frame) -> Result<()>;
}

pub struct JpegSnapshot {
	quality: u8,
}

impl Default for JpegSnapshot {
	fn default() -> Self {
		Self{quality: 90}
	}
}

impl Snapshot for JpegSnapshot {
	fn save_frame(&self, path: &Path, frame: &Frame) -> Result<()> {
		if !frame.is_complete() {
			return Err(Box::new(io::Error::new(io::ErrorKind::InvalidData,
				"incomplete frame")));
		}

		if let Some(dir) = path.parent() {
			if !dir.as_os_str().is_empty() {
				fs::create_dir_all(dir)?;
			}
		}

		let output = BufWriter::new(File::create(path)?);
		let encoder = JpegEncoder::new_with_quality(output, self.quality);
		encoder.write_image(&frame.to_rgb(), frame.width, frame.height,
			ExtendedColorType::Rgb8)?;
		Ok(())
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn writes_a_readable_jpeg() {
		let dir = std::env::temp_dir()
			.join(format!("fallwatch-snapshot-{}", std::process::id()));
		let path = dir.join("nested").join("fall.jpg");
		let frame = Frame{
			data: [90u8, 128, 90, 128].repeat(16 * 8 / 2),
			width: 16,
			height: 8,
			timestamp: 0,
		};

		JpegSnapshot::default().save_frame(&path, &frame).unwrap();

		let img = image::open(&path).unwrap();
		assert_eq!((img.width(), img.height()), (16, 8));
		fs::remove_dir_all(&dir).unwrap();
	}

	#[test]
	fn refuses_incomplete_frames() {
		let path = std::env::temp_dir().join("fallwatch-never-written.jpg");
		let frame = Frame{data: vec![0; 3], width: 16, height: 8, timestamp: 0};
		assert!(JpegSnapshot::default().save_frame(&path, &frame).is_err());
		assert!(!path.exists());
	}
}
