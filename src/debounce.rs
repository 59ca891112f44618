use std::time::{Duration, Instant};

#[derive(Copy, Clone, PartialEq, Debug)]
pub enum State {
	Idle,
	Cooling,
}

// Debouncer turns the per-frame verdicts into alerts spaced at
// least `cooldown` apart. There is no timer; Cooling -> Idle is
// noticed lazily on the next positive verdict, so the resolution
// is one frame period.
pub struct Debouncer {
	cooldown: Duration,
	last_alert: Option<Instant>,
}

impl Debouncer {
	pub fn new(cooldown: Duration) -> Self {
		Self{
			cooldown: cooldown,
			last_alert: None,
		}
	}

	pub fn state(&self, now: Instant) -> State {
		match self.last_alert {
			Some(last) if now.saturating_duration_since(last) < self.cooldown => State::Cooling,
			_ => State::Idle,
		}
	}

	pub fn should_alert(&mut self, verdict: bool, now: Instant) -> bool {
		if !verdict {
			return false;
		}

		if self.state(now) == State::Cooling {
			return false;
		}

		self.last_alert = Some(now);
		true
	}
}
