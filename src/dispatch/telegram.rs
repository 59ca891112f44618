use std::time::Duration;

use reqwest::blocking::Client;
use reqwest::blocking::multipart::{Form, Part};

use crate::errors::*;
use crate::fallwatch::TelegramConfig;
use crate::{info, tags};

use super::ChatBot;

pub struct TelegramBot {
	client: Client,
	send_photo_url: String,
}

impl TelegramBot {
	pub fn new(config: &TelegramConfig, timeout: Duration) -> Result<Self> {
		let client = Client::builder()
			.timeout(timeout)
			.build()?;

		// Don't log the url, it carries the bot token
		info!("configuring telegram", tags![
			("chat_id", &config.chat_id)
		]);

		Ok(Self{
			client: client,
			send_photo_url: send_photo_url(&config.base_api_url),
		})
	}
}

pub fn send_photo_url(base_api_url: &str) -> String {
	format!("{}/sendPhoto", base_api_url.trim_end_matches('/'))
}

impl ChatBot for TelegramBot {
	fn send_photo(&self,
				  chat_id: &str,
				  caption: &str,
				  photo: &[u8],
				  photo_name: &str) -> Result<()> {
		let part = Part::bytes(photo.to_vec())
			.file_name(photo_name.to_string())
			.mime_str("image/jpeg")?;

		let form = Form::new()
			.text("chat_id", chat_id.to_string())
			.text("caption", caption.to_string())
			.part("photo", part);

		let response = self.client
			.post(&self.send_photo_url)
			.multipart(form)
			.send()?;

		let status = response.status();
		if !status.is_success() {
			return Err(Error::new(ErrorType::HttpStatus(status.as_u16())));
		}
		Ok(())
	}
}
