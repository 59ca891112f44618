use crate::errors::*;
use crate::pose::BoundingBox;

// Overlay colour (0, 75, 255) in YUV
const OVERLAY_YUV: (u8, u8, u8) = (73, 230, 76);
const OVERLAY_LINE_WIDTH: u32 = 3;

// Frame is a single YUYV 4:2:2 image. Every pair of
// horizontal pixels shares one U and one V sample.
#[derive(Clone, Debug)]
pub struct Frame {
	pub data: Vec<u8>,
	pub width: u32,
	pub height: u32,
	pub timestamp: u64,
}

pub trait FrameSource {
	// Ok(None) means the source had nothing for us this time
	fn capture(&mut self) -> Result<Option<Frame>>;
}

impl Frame {
	pub fn expected_len(width: u32, height: u32) -> usize {
		width as usize * height as usize * 2
	}

	pub fn is_complete(&self) -> bool {
		self.width > 0 && self.height > 0 && self.width % 2 == 0
			&& self.data.len() >= Frame::expected_len(self.width, self.height)
	}

	pub fn to_rgb(&self) -> Vec<u8> {
		let mut rgb = Vec::with_capacity(self.width as usize * self.height as usize * 3);
		let len = Frame::expected_len(self.width, self.height).min(self.data.len());

		for chunk in self.data[..len].chunks_exact(4) {
			let (y0, u, y1, v) = (chunk[0], chunk[1], chunk[2], chunk[3]);
			rgb.extend_from_slice(&yuv_to_rgb(y0, u, v));
			rgb.extend_from_slice(&yuv_to_rgb(y1, u, v));
		}
		rgb
	}

	// Outline bbox on the frame. Corners are normalised
	// and clamped so any box the model reports is drawable.
	pub fn draw_rect(&mut self, bbox: &BoundingBox) {
		if !self.is_complete() {
			return;
		}
		let (w, h) = (self.width, self.height);
		let clamp = |v: f32, max: u32| (v.max(0.0) as u32).min(max - 1);

		let x0 = clamp(bbox.left.min(bbox.right), w);
		let x1 = clamp(bbox.left.max(bbox.right), w);
		let y0 = clamp(bbox.top.min(bbox.bottom), h);
		let y1 = clamp(bbox.top.max(bbox.bottom), h);

		let lw = OVERLAY_LINE_WIDTH;
		for y in y0..=y1 {
			for x in x0..=x1 {
				let on_edge = x < x0 + lw || x + lw > x1
					|| y < y0 + lw || y + lw > y1;
				if on_edge {
					self.set_pixel(x, y, OVERLAY_YUV);
				}
			}
		}
	}

	fn set_pixel(&mut self, x: u32, y: u32, (luma, u, v): (u8, u8, u8)) {
		let row = y as usize * self.width as usize * 2;
		let pair = row + (x as usize / 2) * 4;
		self.data[pair + (x as usize % 2) * 2] = luma;
		self.data[pair + 1] = u;
		self.data[pair + 3] = v;
	}
}

fn yuv_to_rgb(y: u8, u: u8, v: u8) -> [u8; 3] {
	let y = y as f32;
	let u = u as f32 - 128.0;
	let v = v as f32 - 128.0;

	let r = y + 1.402 * v;
	let g = y - 0.344_136 * u - 0.714_136 * v;
	let b = y + 1.772 * u;

	[clamp_u8(r), clamp_u8(g), clamp_u8(b)]
}

fn clamp_u8(x: f32) -> u8 {
	x.round().max(0.0).min(255.0) as u8
}

#[cfg(test)]
mod tests {
	use super::*;

	fn grey(width: u32, height: u32) -> Frame {
		let mut data = Vec::with_capacity(Frame::expected_len(width, height));
		for _ in 0..(width * height / 2) {
			data.extend_from_slice(&[100, 128, 100, 128]);
		}
		Frame{data: data, width: width, height: height, timestamp: 0}
	}

	fn luma(frame: &Frame, x: u32, y: u32) -> u8 {
		frame.data[(y * frame.width * 2 + x * 2) as usize]
	}

	#[test]
	fn neutral_chroma_is_grey() {
		let rgb = grey(4, 2).to_rgb();
		assert_eq!(rgb.len(), 4 * 2 * 3);
		assert!(rgb.iter().all(|&c| c == 100));
	}

	#[test]
	fn rect_outline_leaves_interior_alone() {
		let mut frame = grey(32, 32);
		// Reversed corners, as some models report them
		frame.draw_rect(&BoundingBox{left: 20.0, top: 4.0, right: 4.0, bottom: 20.0});

		assert_eq!(luma(&frame, 4, 4), OVERLAY_YUV.0);
		assert_eq!(luma(&frame, 20, 12), OVERLAY_YUV.0);
		assert_eq!(luma(&frame, 12, 12), 100);
		assert_eq!(luma(&frame, 0, 0), 100);
		assert_eq!(luma(&frame, 30, 30), 100);
	}

	#[test]
	fn rect_is_clamped_to_frame() {
		let mut frame = grey(8, 8);
		frame.draw_rect(&BoundingBox{left: -50.0, top: -50.0, right: 500.0, bottom: 500.0});
		assert_eq!(luma(&frame, 0, 0), OVERLAY_YUV.0);
		assert_eq!(luma(&frame, 7, 7), OVERLAY_YUV.0);
	}

	#[test]
	fn odd_width_frame_is_ignored() {
		let mut frame = Frame{data: vec![0; Frame::expected_len(7, 3)], width: 7, height: 3, timestamp: 0};
		assert!(!frame.is_complete());
		frame.draw_rect(&BoundingBox{left: 0.0, top: 0.0, right: 6.0, bottom: 2.0});
		assert!(frame.data.iter().all(|&b| b == 0));
	}

	#[test]
	fn short_frame_is_ignored() {
		let mut frame = Frame{data: vec![0; 10], width: 8, height: 8, timestamp: 0};
		assert!(!frame.is_complete());
		frame.draw_rect(&BoundingBox{left: 0.0, top: 0.0, right: 4.0, bottom: 4.0});
		assert_eq!(frame.data, vec![0; 10]);
	}
}
