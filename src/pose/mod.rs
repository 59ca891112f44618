use serde::{Serialize, Deserialize};

use crate::errors::*;
use crate::frame::Frame;

pub mod oracle;

#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq)]
pub struct Keypoint {
	pub id: u32,
	pub x: f32,
	pub y: f32,
}

// Corners as reported by the pose model. No ordering is
// guaranteed between left/right or top/bottom.
#[derive(Serialize, Deserialize, Clone, Copy, Debug, Default, PartialEq)]
pub struct BoundingBox {
	pub left: f32,
	pub top: f32,
	pub right: f32,
	pub bottom: f32,
}

// One detected person in one frame. Keypoints keep the order
// the model emitted them in.
#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq)]
pub struct PoseObservation {
	pub keypoints: Vec<Keypoint>,
	#[serde(flatten)]
	pub bounding_box: BoundingBox,
}

pub trait PoseOracle {
	fn estimate(&mut self, frame: &Frame) -> Result<Vec<PoseObservation>>;
}
