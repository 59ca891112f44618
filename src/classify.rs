// Single-frame fall heuristic.
//
// A standing person has their hips roughly midway between
// shoulders and ankles in image y. Lying down collapses those
// vertical gaps toward zero and makes the silhouette wider
// than it is tall. A pose is "fallen" only when both hold.

use crate::pose::{BoundingBox, PoseObservation};

pub const HIPS: [u32; 2] = [11, 12];
pub const SHOULDERS: [u32; 2] = [5, 6];
pub const ANKLES: [u32; 2] = [15, 16];

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct RatioCheck {
	pub wide: bool,
	// Box to draw on the frame. None for a degenerate box.
	pub overlay: Option<BoundingBox>,
}

// If a group member appears twice the later keypoint
// overwrites the earlier one.
pub fn posture_collapsed(pose: &PoseObservation, keypoint_threshold: f32) -> bool {
	if pose.keypoints.is_empty() {
		return false;
	}

	let mut hip_y = None;
	let mut shoulder_y = None;
	let mut ankle_y = None;

	for keypoint in pose.keypoints.iter() {
		if HIPS.contains(&keypoint.id) {
			hip_y = Some(keypoint.y);
		} else if SHOULDERS.contains(&keypoint.id) {
			shoulder_y = Some(keypoint.y);
		} else if ANKLES.contains(&keypoint.id) {
			ankle_y = Some(keypoint.y);
		}
	}

	if let (Some(hip), Some(shoulder)) = (hip_y, shoulder_y) {
		if (hip - shoulder).abs() < keypoint_threshold {
			return true;
		}
	}

	if let (Some(hip), Some(ankle)) = (hip_y, ankle_y) {
		if (hip - ankle).abs() < keypoint_threshold {
			return true;
		}
	}

	false
}

// width = left - right, height = top - bottom. These are signed
// on purpose and match the coordinate convention of the pose
// model; do not swap them for abs().
pub fn aspect_ratio(pose: &PoseObservation) -> RatioCheck {
	let bbox = pose.bounding_box;

	// Corners are whole pixels
	let left = bbox.left as i64;
	let top = bbox.top as i64;
	let right = bbox.right as i64;
	let bottom = bbox.bottom as i64;

	let width = left - right;
	let height = top - bottom;

	if height == 0 {
		return RatioCheck{wide: false, overlay: None};
	}

	let proportion = width as f64 / height as f64;
	RatioCheck{
		wide: proportion > 1.0,
		overlay: Some(bbox),
	}
}

// Callers wanting the overlay take it from aspect_ratio() first
pub fn classify(pose: &PoseObservation, keypoint_threshold: f32) -> bool {
	aspect_ratio(pose).wide && posture_collapsed(pose, keypoint_threshold)
}
