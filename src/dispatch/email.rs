use std::time::Duration;

use lettre::message::header::{ContentDisposition, ContentId, ContentType};
use lettre::message::{Mailbox, MultiPart, SinglePart};
use lettre::transport::smtp::authentication::Credentials;
use lettre::{Message, SmtpTransport, Transport};

use crate::errors::*;
use crate::fallwatch::EmailConfig;
use crate::{info, tags};

use super::Mailer;

const IMAGE_CONTENT_ID: &str = "image1";

pub struct SmtpMailer {
	from: Mailbox,
	transport: SmtpTransport,
}

impl SmtpMailer {
	// STARTTLS on the configured port, then login. The timeout
	// bounds every network step of a send.
	pub fn new(config: &EmailConfig, timeout: Duration) -> Result<Self> {
		info!("configuring smtp", tags![
			("server", &config.smtp_server),
			("port", &config.smtp_port.to_string()),
			("recipients", &config.recipients.len().to_string())
		]);

		let transport = SmtpTransport::starttls_relay(&config.smtp_server)?
			.port(config.smtp_port)
			.credentials(Credentials::new(
				config.user.clone(), config.password.clone()))
			.timeout(Some(timeout))
			.build();

		Ok(Self{
			from: config.user.parse()?,
			transport: transport,
		})
	}
}

pub fn build_message(from: &Mailbox,
					 to: &str,
					 subject: &str,
					 body: &str,
					 attachment: &[u8],
					 attachment_name: &str) -> Result<Message> {
	// Inline, but named so clients show the file rather than the cid
	let image = SinglePart::builder()
		.header(ContentType::parse(mime_for(attachment_name))?)
		.header(ContentDisposition::inline_with_name(attachment_name))
		.header(ContentId::from(format!("<{}>", IMAGE_CONTENT_ID)))
		.body(attachment.to_vec());

	let message = Message::builder()
		.from(from.clone())
		.to(to.parse()?)
		.subject(subject)
		.multipart(MultiPart::mixed()
			.singlepart(SinglePart::plain(body.to_string()))
			.singlepart(image))?;

	Ok(message)
}

fn mime_for(name: &str) -> &'static str {
	let lower = name.to_ascii_lowercase();
	if lower.ends_with(".png") {
		"image/png"
	} else {
		"image/jpeg"
	}
}

impl Mailer for SmtpMailer {
	fn send_mail(&self,
				 to: &str,
				 subject: &str,
				 body: &str,
				 attachment: &[u8],
				 attachment_name: &str) -> Result<()> {
		let message = build_message(&self.from, to, subject, body,
			attachment, attachment_name)?;
		self.transport.send(&message)?;
		Ok(())
	}
}
