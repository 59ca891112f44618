use std::fmt;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Local};

use crate::errors::*;
use crate::fallwatch::{Config, render};
use crate::{info, error, tags};

pub mod email;
pub mod telegram;

pub trait Mailer {
	fn send_mail(&self,
				 to: &str,
				 subject: &str,
				 body: &str,
				 attachment: &[u8],
				 attachment_name: &str) -> Result<()>;
}

pub trait ChatBot {
	fn send_photo(&self,
				  chat_id: &str,
				  caption: &str,
				  photo: &[u8],
				  photo_name: &str) -> Result<()>;
}

pub struct AlertEvent {
	pub timestamp: DateTime<Local>,
	pub frame_path: PathBuf,
	pub subject_name: String,
}

impl AlertEvent {
	pub fn new(timestamp: DateTime<Local>, output_prefix: &str, subject_name: &str) -> Self {
		Self{
			frame_path: snapshot_path(output_prefix, &timestamp),
			timestamp: timestamp,
			subject_name: subject_name.to_string(),
		}
	}

	fn display_time(&self) -> String {
		self.timestamp.format("%Y-%m-%d %H:%M:%S").to_string()
	}
}

// {prefix}_{timestamp}.jpg, with no characters that need quoting
pub fn snapshot_path(output_prefix: &str, timestamp: &DateTime<Local>) -> PathBuf {
	PathBuf::from(format!("{}_{}.jpg",
		output_prefix,
		timestamp.format("%Y-%m-%dT%H-%M-%S%.3f")))
}

#[derive(Clone, Debug, PartialEq)]
pub enum Channel {
	Email(String),
	Telegram(String),
}

impl fmt::Display for Channel {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self {
			Channel::Email(to) => write!(f, "email:{}", to),
			Channel::Telegram(chat_id) => write!(f, "telegram:{}", chat_id),
		}
	}
}

#[derive(Clone, Debug, PartialEq)]
pub struct NotificationOutcome {
	pub channel: Channel,
	pub succeeded: bool,
	pub error_detail: Option<String>,
}

impl NotificationOutcome {
	fn from_result(channel: Channel, result: Result<()>) -> Self {
		let outcome = match result {
			Ok(()) => Self{channel: channel, succeeded: true, error_detail: None},
			Err(e) => Self{channel: channel, succeeded: false, error_detail: Some(e.to_string())},
		};
		outcome.log();
		outcome
	}

	fn log(&self) {
		let channel = self.channel.to_string();
		match self.error_detail {
			None => {
				info!("notification sent", tags![
					("channel", &channel)
				]);
			},
			Some(ref detail) => {
				error!("notification failed", tags![
					("channel", &channel),
					("error", detail)
				]);
			},
		}
	}
}

#[derive(Clone, Debug, Default)]
pub struct Channels {
	pub email_recipients: Vec<String>,
	pub telegram_chat_id: Option<String>,
}

impl Channels {
	pub fn from_config(config: &Config) -> Self {
		Self{
			email_recipients: config.email.as_ref()
				.map(|e| e.recipients.clone())
				.unwrap_or_default(),
			telegram_chat_id: config.telegram.as_ref()
				.map(|t| t.chat_id.clone()),
		}
	}
}

// Dispatcher fans one alert out over every configured channel.
// Each recipient and each channel is its own failure domain;
// nothing here returns an error or short circuits.
pub struct Dispatcher {
	mailer: Option<Box<dyn Mailer>>,
	bot: Option<Box<dyn ChatBot>>,
	subject_template: String,
	body_template: String,
}

impl Dispatcher {
	pub fn new(mailer: Option<Box<dyn Mailer>>,
			   bot: Option<Box<dyn ChatBot>>,
			   subject_template: &str,
			   body_template: &str) -> Self {
		Self{
			mailer: mailer,
			bot: bot,
			subject_template: subject_template.to_string(),
			body_template: body_template.to_string(),
		}
	}

	// Builds the real transports for whichever channels are configured
	pub fn from_config(config: &Config) -> Result<Self> {
		let timeout = config.notify_timeout();

		let mailer: Option<Box<dyn Mailer>> = match config.email {
			Some(ref e) => Some(Box::new(email::SmtpMailer::new(e, timeout)?)),
			None => None,
		};
		let bot: Option<Box<dyn ChatBot>> = match config.telegram {
			Some(ref t) => Some(Box::new(telegram::TelegramBot::new(t, timeout)?)),
			None => None,
		};

		Ok(Dispatcher::new(mailer, bot, &config.alert_subject, &config.alert_body))
	}

	pub fn dispatch(&self, event: &AlertEvent, channels: &Channels)
		-> Vec<NotificationOutcome> {

		let when = event.display_time();
		let subject = render(&self.subject_template, &event.subject_name, &when);
		let body = render(&self.body_template, &event.subject_name, &when);
		let photo_name = event.frame_path.file_name()
			.map(|n| n.to_string_lossy().into_owned())
			.unwrap_or_else(|| "snapshot.jpg".to_string());

		// Read once, every channel sends the same bytes
		let snapshot = read_snapshot(&event.frame_path);

		let mut outcomes = Vec::with_capacity(channels.email_recipients.len() + 1);

		for recipient in channels.email_recipients.iter() {
			let result: Result<()> = match (&self.mailer, &snapshot) {
				(None, _) => Err("email transport not configured".into()),
				(_, Err(detail)) => Err(detail.clone().into()),
				(Some(mailer), Ok(bytes)) => {
					mailer.send_mail(recipient, &subject, &body, bytes, &photo_name)
				},
			};
			outcomes.push(NotificationOutcome::from_result(
				Channel::Email(recipient.clone()), result));
		}

		if let Some(ref chat_id) = channels.telegram_chat_id {
			let result: Result<()> = match (&self.bot, &snapshot) {
				(None, _) => Err("chat bot not configured".into()),
				(_, Err(detail)) => Err(detail.clone().into()),
				(Some(bot), Ok(bytes)) => {
					bot.send_photo(chat_id, &body, bytes, &photo_name)
				},
			};
			outcomes.push(NotificationOutcome::from_result(
				Channel::Telegram(chat_id.clone()), result));
		}

		outcomes
	}
}

fn read_snapshot(path: &Path) -> std::result::Result<Vec<u8>, String> {
	match fs::read(path) {
		Ok(bytes) => Ok(bytes),
		Err(ref e) if e.kind() == io::ErrorKind::NotFound => {
			Err(format!("{}: {}", Error::new(ErrorType::SnapshotMissing), path.display()))
		},
		Err(e) => Err(format!("couldn't read snapshot {}: {}", path.display(), e)),
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use std::cell::RefCell;
	use std::rc::Rc;
	use chrono::TimeZone;

	type Log = Rc<RefCell<Vec<String>>>;

	struct FakeMailer {
		sent: Log,
		fail_for: Option<String>,
	}

	impl Mailer for FakeMailer {
		fn send_mail(&self, to: &str, subject: &str, _body: &str,
					 attachment: &[u8], name: &str) -> Result<()> {
			self.sent.borrow_mut().push(format!("{}|{}|{}|{}", to, subject, attachment.len(), name));
			if self.fail_for.as_deref() == Some(to) {
				return Err(Box::new(io::Error::new(io::ErrorKind::ConnectionReset, "smtp reset")));
			}
			Ok(())
		}
	}

	struct FakeBot {
		sent: Log,
		status: Option<u16>,
	}

	impl ChatBot for FakeBot {
		fn send_photo(&self, chat_id: &str, caption: &str,
					  photo: &[u8], _name: &str) -> Result<()> {
			self.sent.borrow_mut().push(format!("{}|{}|{}", chat_id, caption, photo.len()));
			match self.status {
				Some(code) => Err(Error::new(ErrorType::HttpStatus(code))),
				None => Ok(()),
			}
		}
	}

	// Removes the snapshot file when the test is done with it
	struct RemoveOnDrop(PathBuf);

	impl Drop for RemoveOnDrop {
		fn drop(&mut self) {
			let _ = fs::remove_file(&self.0);
		}
	}

	fn event_with_snapshot(name: &str, contents: Option<&[u8]>) -> (AlertEvent, RemoveOnDrop) {
		let prefix = std::env::temp_dir()
			.join(format!("fallwatch-dispatch-{}-{}", name, std::process::id()));
		let ts = Local.with_ymd_and_hms(2024, 3, 1, 8, 30, 0).unwrap();
		let event = AlertEvent::new(ts, &prefix.to_string_lossy(), "Maria");
		match contents {
			Some(bytes) => fs::write(&event.frame_path, bytes).unwrap(),
			None => { let _ = fs::remove_file(&event.frame_path); },
		}
		let cleanup = RemoveOnDrop(event.frame_path.clone());
		(event, cleanup)
	}

	fn dispatcher(mail: &Log, bot: &Log, fail_for: Option<&str>, status: Option<u16>) -> Dispatcher {
		Dispatcher::new(
			Some(Box::new(FakeMailer{sent: mail.clone(), fail_for: fail_for.map(String::from)}) as Box<dyn Mailer>),
			Some(Box::new(FakeBot{sent: bot.clone(), status: status}) as Box<dyn ChatBot>),
			"Fall alert: {name}",
			"{name} may have fallen at {timestamp}")
	}

	fn channels(recipients: &[&str], chat: Option<&str>) -> Channels {
		Channels{
			email_recipients: recipients.iter().map(|r| r.to_string()).collect(),
			telegram_chat_id: chat.map(String::from),
		}
	}

	#[test]
	fn staged_snapshots_do_not_outlive_the_test() {
		let path = {
			let (event, _cleanup) = event_with_snapshot("cleanup", Some(b"jpeg"));
			assert!(event.frame_path.exists());
			event.frame_path.clone()
		};
		assert!(!path.exists());
	}

	#[test]
	fn snapshot_path_is_timestamped() {
		let ts = Local.with_ymd_and_hms(2024, 3, 1, 8, 30, 5).unwrap();
		assert_eq!(snapshot_path("output/fall_image", &ts),
			PathBuf::from("output/fall_image_2024-03-01T08-30-05.000.jpg"));
	}

	#[test]
	fn failed_recipient_does_not_stop_the_rest() {
		let (mail, bot) = (Log::default(), Log::default());
		let (event, _cleanup) = event_with_snapshot("isolation", Some(b"jpeg"));
		let d = dispatcher(&mail, &bot, Some("b@example.com"), None);

		let outcomes = d.dispatch(&event,
			&channels(&["a@example.com", "b@example.com", "c@example.com"], None));

		assert_eq!(mail.borrow().len(), 3);
		assert_eq!(outcomes.len(), 3);
		assert_eq!(outcomes.iter().filter(|o| !o.succeeded).count(), 1);
		assert_eq!(outcomes[1].channel, Channel::Email("b@example.com".to_string()));
		assert_eq!(outcomes[1].error_detail.as_deref(), Some("smtp reset"));
		assert!(bot.borrow().is_empty());
	}

	#[test]
	fn recipients_keep_their_order_and_get_the_snapshot() {
		let (mail, bot) = (Log::default(), Log::default());
		let (event, _cleanup) = event_with_snapshot("order", Some(b"12345"));
		let d = dispatcher(&mail, &bot, None, None);

		d.dispatch(&event, &channels(&["z@example.com", "a@example.com"], None));

		let sent = mail.borrow();
		assert!(sent[0].starts_with("z@example.com|Fall alert: Maria|5|"));
		assert!(sent[1].starts_with("a@example.com|"));
		assert!(sent[0].ends_with(".jpg"));
	}

	#[test]
	fn bot_failure_leaves_email_alone() {
		let (mail, bot) = (Log::default(), Log::default());
		let (event, _cleanup) = event_with_snapshot("botdown", Some(b"jpeg"));
		let d = dispatcher(&mail, &bot, None, Some(502));

		let outcomes = d.dispatch(&event, &channels(&["a@example.com"], Some("-100")));

		assert_eq!(outcomes.len(), 2);
		assert!(outcomes[0].succeeded);
		assert!(!outcomes[1].succeeded);
		assert_eq!(outcomes[1].error_detail.as_deref(), Some("http_status_502"));
		assert_eq!(bot.borrow()[0], "-100|Maria may have fallen at 2024-03-01 08:30:00|4");
	}

	#[test]
	fn email_failure_leaves_bot_alone() {
		let (mail, bot) = (Log::default(), Log::default());
		let (event, _cleanup) = event_with_snapshot("maildown", Some(b"jpeg"));
		let d = dispatcher(&mail, &bot, Some("a@example.com"), None);

		let outcomes = d.dispatch(&event, &channels(&["a@example.com"], Some("-100")));

		assert!(!outcomes[0].succeeded);
		assert!(outcomes[1].succeeded);
		assert_eq!(bot.borrow().len(), 1);
	}

	#[test]
	fn missing_snapshot_fails_every_channel_without_sending() {
		let (mail, bot) = (Log::default(), Log::default());
		let (event, _cleanup) = event_with_snapshot("missing", None);
		let d = dispatcher(&mail, &bot, None, None);

		let outcomes = d.dispatch(&event, &channels(&["a@example.com"], Some("-100")));

		assert_eq!(outcomes.len(), 2);
		for outcome in outcomes.iter() {
			assert!(!outcome.succeeded);
			assert!(outcome.error_detail.as_ref().unwrap().starts_with("snapshot_missing: "));
		}
		assert!(mail.borrow().is_empty());
		assert!(bot.borrow().is_empty());
	}

	#[test]
	fn unconfigured_channels_are_skipped() {
		let (mail, bot) = (Log::default(), Log::default());
		let (event, _cleanup) = event_with_snapshot("none", Some(b"jpeg"));
		let d = dispatcher(&mail, &bot, None, None);

		assert!(d.dispatch(&event, &Channels::default()).is_empty());
	}

	#[test]
	fn recipients_without_transport_are_reported() {
		let (event, _cleanup) = event_with_snapshot("notransport", Some(b"jpeg"));
		let d = Dispatcher::new(None, None, "s", "b");

		let outcomes = d.dispatch(&event, &channels(&["a@example.com"], Some("-1")));
		assert_eq!(outcomes.len(), 2);
		assert!(outcomes.iter().all(|o| !o.succeeded));
	}
}
