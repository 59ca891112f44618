use std::fs;
use std::path::Path;
use std::time::Duration;

use serde::{Serialize, Deserialize};

use crate::errors::*;

#[derive(Serialize, Deserialize, Clone, Debug)]
#[serde(rename_all = "camelCase")]
pub struct EmailConfig {
	pub smtp_server: String,
	pub smtp_port: u16,
	pub user: String,
	pub password: String,
	pub recipients: Vec<String>,
}

#[derive(Serialize, Deserialize, Clone, Debug)]
#[serde(rename_all = "camelCase")]
pub struct TelegramConfig {
	// Already embeds the bot token, e.g.
	// https://api.telegram.org/bot<token>
	pub base_api_url: String,
	pub chat_id: String,
}

#[derive(Serialize, Deserialize, Clone, Debug)]
#[serde(rename_all = "camelCase", default)]
pub struct Config {
	pub pid_file: String,
	pub webcam_device: String,
	pub webcam_interval: (u32, u32),
	pub webcam_resolution: (u32, u32),
	pub oracle_socket_path: String,
	pub oracle_timeout: u64,
	pub keypoint_threshold: f32,
	pub alert_cooldown: u64,
	pub frame_output_prefix: String,
	pub subject_name: String,
	pub notify_timeout: u64,
	// Templates, see render()
	pub alert_subject: String,
	pub alert_body: String,
	pub email: Option<EmailConfig>,
	pub telegram: Option<TelegramConfig>,
}

impl Default for Config {
	fn default() -> Self {
		Self{
			pid_file: "/tmp/fallwatch.pid".to_string(),
			webcam_device: "/dev/video0".to_string(),
			webcam_interval: (1, 30),
			webcam_resolution: (640, 480),
			oracle_socket_path: "/tmp/posenet.sock".to_string(),
			oracle_timeout: 5,
			keypoint_threshold: 20.0,
			alert_cooldown: 60,
			frame_output_prefix: "output/fall_image".to_string(),
			subject_name: "the supervised person".to_string(),
			notify_timeout: 30,
			alert_subject: "Fall alert: {name}".to_string(),
			alert_body: "{name} may have fallen at {timestamp}. \
				The captured frame is attached.".to_string(),
			email: None,
			telegram: None,
		}
	}
}

impl Config {
	pub fn from_json(raw: &str) -> Result<Self> {
		let config: Config = serde_json::from_str(raw)?;
		config.validate()?;
		Ok(config)
	}

	fn validate(&self) -> Result<()> {
		let (w, h) = self.webcam_resolution;
		let threshold_ok = self.keypoint_threshold.is_finite()
			&& self.keypoint_threshold > 0.0;

		// YUYV packs pixels in pairs
		let resolution_ok = w > 0 && h > 0 && w % 2 == 0;
		let timeouts_ok = self.oracle_timeout > 0 && self.notify_timeout > 0;

		if !resolution_ok || !threshold_ok || !timeouts_ok {
			return Err(Error::new(ErrorType::InvalidConfig));
		}
		Ok(())
	}

	pub fn alert_cooldown(&self) -> Duration {
		Duration::from_secs(self.alert_cooldown)
	}

	pub fn oracle_timeout(&self) -> Duration {
		Duration::from_secs(self.oracle_timeout)
	}

	pub fn notify_timeout(&self) -> Duration {
		Duration::from_secs(self.notify_timeout)
	}
}

// Substitute {name} and {timestamp} in a message template.
pub fn render(template: &str, name: &str, timestamp: &str) -> String {
	template
		.replace("{name}", name)
		.replace("{timestamp}", timestamp)
}

// Fallwatch is the immutable config passed
// into every component that needs it.
pub struct Fallwatch {
	pub config: Config,
}

impl Fallwatch {
	pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
		let raw = fs::read_to_string(path)?;
		Ok(Self{
			config: Config::from_json(&raw)?,
		})
	}
}
