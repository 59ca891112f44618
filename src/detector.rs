use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread::sleep;
use std::time::{Duration, Instant};

use chrono::Local;

use crate::classify;
use crate::debounce::Debouncer;
use crate::dispatch::{AlertEvent, Channels, Dispatcher, NotificationOutcome};
use crate::errors::*;
use crate::fallwatch::Fallwatch;
use crate::frame::FrameSource;
use crate::pose::PoseOracle;
use crate::snapshot::Snapshot;
use crate::{info, warn, error, tags};

const NO_FRAME_BACKOFF: Duration = Duration::from_millis(20);
const ERROR_BACKOFF: Duration = Duration::from_secs(1);

#[derive(Debug, PartialEq)]
pub enum Tick {
	NoFrame,
	Clear,
	Suppressed,
	Alerted(Vec<NotificationOutcome>),
}

// Detector is the single-threaded glue: one frame in, at most
// one alert out, per tick.
pub struct Detector<F: FrameSource, O: PoseOracle, S: Snapshot> {
	n: Arc<Fallwatch>,
	source: F,
	oracle: O,
	snapshot: S,
	debouncer: Debouncer,
	dispatcher: Dispatcher,
	channels: Channels,
}

impl<F: FrameSource, O: PoseOracle, S: Snapshot> Detector<F, O, S> {
	pub fn new(n: Arc<Fallwatch>,
			   source: F,
			   oracle: O,
			   snapshot: S,
			   dispatcher: Dispatcher) -> Self {
		let debouncer = Debouncer::new(n.config.alert_cooldown());
		let channels = Channels::from_config(&n.config);

		Self{
			n: n,
			source: source,
			oracle: oracle,
			snapshot: snapshot,
			debouncer: debouncer,
			dispatcher: dispatcher,
			channels: channels,
		}
	}

	pub fn tick(&mut self, now: Instant) -> Result<Tick> {
		let mut frame = match self.source.capture()? {
			Some(frame) => frame,
			None => return Ok(Tick::NoFrame),
		};

		let poses = self.oracle.estimate(&frame)?;
		let threshold = self.n.config.keypoint_threshold;

		// First fallen pose wins; the ones before it still
		// get their box drawn.
		let mut verdict = false;
		for pose in poses.iter() {
			if let Some(ref bbox) = classify::aspect_ratio(pose).overlay {
				frame.draw_rect(bbox);
			}
			if classify::classify(pose, threshold) {
				info!("person potentially fallen", tags![
					("frame_ts", &frame.timestamp.to_string()),
					("poses", &poses.len().to_string())
				]);
				verdict = true;
				break;
			}
		}

		if !self.debouncer.should_alert(verdict, now) {
			if verdict {
				info!("alert suppressed by cooldown");
				return Ok(Tick::Suppressed);
			}
			return Ok(Tick::Clear);
		}

		let event = AlertEvent::new(Local::now(),
			&self.n.config.frame_output_prefix,
			&self.n.config.subject_name);

		// Still dispatch without a snapshot; the channels report
		// the missing file themselves.
		if let Err(e) = self.snapshot.save_frame(&event.frame_path, &frame) {
			error!("couldn't save snapshot", tags![
				("path", &event.frame_path.display().to_string()),
				("error", &e.to_string())
			]);
		}

		let outcomes = self.dispatcher.dispatch(&event, &self.channels);
		let failed = outcomes.iter().filter(|o| !o.succeeded).count();
		warn!("fall alert dispatched", tags![
			("subject", &event.subject_name),
			("snapshot", &event.frame_path.display().to_string()),
			("channels", &outcomes.len().to_string()),
			("failed", &failed.to_string())
		]);

		Ok(Tick::Alerted(outcomes))
	}

	pub fn run(&mut self, running: &AtomicBool) {
		while running.load(Ordering::SeqCst) {
			match self.tick(Instant::now()) {
				Ok(Tick::NoFrame) => sleep(NO_FRAME_BACKOFF),
				Ok(_) => {},
				Err(e) => {
					error!("detection iteration failed", tags![
						("error", &e.to_string())
					]);
					sleep(ERROR_BACKOFF);
				},
			}
		}
		info!("shutdown complete");
	}
}
