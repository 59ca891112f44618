// Client side of the pose-estimation service. The model runs in
// its own process; we hand it raw frames over a Unix socket and
// read back the poses it found.
//
// Every message starts with a ten byte header:
//   version (u8, always 0)
//   msg_type (u8)
//   msg_len (u32 le) - length of the body that follows
//   msg_id (u32 le) - replies echo the id of their request

use std::fs::{File, OpenOptions};
use std::io::{self, Read, Write};
use std::os::unix::net::UnixStream;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::errors::*;
use crate::frame::Frame;
use crate::{info, warn, error, tags};

use super::{PoseObservation, PoseOracle};

const VERSION: u8 = 0;
const HEADER_LEN: usize = 10;

// Pose JSON for a handful of people is a few KiB
pub const MAX_BODY_LEN: u32 = 4 * 1024 * 1024;

// Replies to older requests we are willing to skip per call
const MAX_STALE_REPLIES: usize = 8;

#[derive(Copy, Clone, PartialEq, Debug)]
enum MsgType {
	Hello,
	Frame,
	Poses,
	Shutdown,
}

impl MsgType {
	// Client messages are lowercase, service messages uppercase
	fn to_byte(self) -> u8 {
		match self {
			MsgType::Hello => b'a',
			MsgType::Frame => b'f',
			MsgType::Shutdown => b'z',
			// We never send poses
			MsgType::Poses => unreachable!(),
		}
	}

	fn from_byte(b: u8) -> Result<Self> {
		match b {
			b'A' => Ok(MsgType::Hello),
			b'P' => Ok(MsgType::Poses),
			b'Z' => Ok(MsgType::Shutdown),
			_ => Err(Error::new(ErrorType::OracleProtocol)),
		}
	}
}

struct Header {
	msg_type: MsgType,
	msg_len: u32,
	msg_id: u32,
}

impl Header {
	fn from_raw(raw: &[u8; HEADER_LEN]) -> Result<Self> {
		if raw[0] != VERSION {
			return Err(Error::new(ErrorType::OracleProtocol));
		}

		let msg_type = MsgType::from_byte(raw[1])?;
		let msg_len = u32::from_le_bytes([raw[2], raw[3], raw[4], raw[5]]);
		let msg_id = u32::from_le_bytes([raw[6], raw[7], raw[8], raw[9]]);

		if msg_len > MAX_BODY_LEN {
			return Err(Error::new(ErrorType::OracleProtocol));
		}

		Ok(Self{
			msg_type: msg_type,
			msg_len: msg_len,
			msg_id: msg_id,
		})
	}

	fn to_raw(&self) -> [u8; HEADER_LEN] {
		let mut raw = [0; HEADER_LEN];
		raw[0] = VERSION;
		raw[1] = self.msg_type.to_byte();
		raw[2..6].copy_from_slice(&self.msg_len.to_le_bytes());
		raw[6..10].copy_from_slice(&self.msg_id.to_le_bytes());
		raw
	}
}

// A SocketOracle is single use after a failed exchange: once a
// read times out or the framing goes wrong we no longer know where
// the next header starts, so every later call fails fast.
pub struct SocketOracle<S: Read + Write> {
	stream: S,
	broken: bool,
	write_buffer: Vec<u8>,
	read_body_buf: Vec<u8>,

	// Random number file/buffer
	rand_file: File,
	rand_buf: [u8; 4],
}

impl SocketOracle<UnixStream> {
	pub fn connect<P: AsRef<Path>>(path: P, timeout: Duration) -> Result<Self> {
		info!("connecting to pose service", tags![
			("path", &path.as_ref().display().to_string())
		]);
		let stream = UnixStream::connect(path)?;
		stream.set_read_timeout(Some(timeout))?;
		stream.set_write_timeout(Some(timeout))?;
		SocketOracle::handshake(stream)
	}
}

impl<S: Read + Write> SocketOracle<S> {
	pub fn handshake(stream: S) -> Result<Self> {
		let rand_file = OpenOptions::new()
			.read(true)
			.open("/dev/urandom")?;

		let mut oracle = Self{
			stream: stream,
			broken: false,
			write_buffer: Vec::with_capacity(1024),
			read_body_buf: Vec::with_capacity(1024),
			rand_file: rand_file,
			rand_buf: [0; 4],
		};

		let header = oracle.exchange(MsgType::Hello, &[], MsgType::Hello)?;
		info!("pose service hello", tags![
			("msg_id", &header.msg_id.to_string())
		]);
		Ok(oracle)
	}

	pub fn is_broken(&self) -> bool {
		self.broken
	}

	fn new_msg_id(&mut self) -> Result<u32> {
		self.rand_file.read_exact(&mut self.rand_buf)?;
		Ok(u32::from_le_bytes(self.rand_buf))
	}

	fn write_msg(&mut self, msg_type: MsgType, body: &[u8]) -> Result<u32> {
		let header = Header{
			msg_type: msg_type,
			msg_len: body.len() as u32,
			msg_id: self.new_msg_id()?,
		};

		self.write_buffer.clear();
		self.write_buffer.extend_from_slice(&header.to_raw());
		self.write_buffer.extend_from_slice(body);
		self.stream.write_all(&self.write_buffer)?;
		self.stream.flush()?;
		Ok(header.msg_id)
	}

	// Reads one message, leaving its body in read_body_buf
	fn read_msg(&mut self) -> Result<Header> {
		let mut raw = [0; HEADER_LEN];
		read_or_closed(&mut self.stream, &mut raw)?;
		let header = Header::from_raw(&raw)?;

		if header.msg_type == MsgType::Shutdown {
			return Err(Error::new(ErrorType::OracleClosed));
		}

		self.read_body_buf.resize(header.msg_len as usize, 0);
		read_or_closed(&mut self.stream, &mut self.read_body_buf)?;
		Ok(header)
	}

	// Sends a request and waits for the reply carrying its id.
	// Replies to earlier requests are dropped.
	fn exchange(&mut self, msg_type: MsgType, body: &[u8], reply_type: MsgType)
		-> Result<Header> {
		if self.broken {
			return Err(Error::new(ErrorType::OracleClosed));
		}

		let result = self.try_exchange(msg_type, body, reply_type);
		if result.is_err() {
			self.broken = true;
		}
		result
	}

	fn try_exchange(&mut self, msg_type: MsgType, body: &[u8], reply_type: MsgType)
		-> Result<Header> {
		let msg_id = self.write_msg(msg_type, body)?;

		for _ in 0..=MAX_STALE_REPLIES {
			let header = self.read_msg()?;
			if header.msg_id != msg_id {
				warn!("discarding stale pose service reply", tags![
					("msg_id", &header.msg_id.to_string()),
					("expected", &msg_id.to_string())
				]);
				continue;
			}

			if header.msg_type != reply_type {
				return Err(Error::new(ErrorType::OracleProtocol));
			}
			return Ok(header);
		}

		Err(Error::new(ErrorType::OracleProtocol))
	}
}

fn read_or_closed<R: Read>(stream: &mut R, buf: &mut [u8]) -> Result<()> {
	match stream.read_exact(buf) {
		Ok(()) => Ok(()),
		Err(ref e) if e.kind() == io::ErrorKind::UnexpectedEof => {
			Err(Error::new(ErrorType::OracleClosed))
		},
		Err(e) => Err(e.into()),
	}
}

impl<S: Read + Write> PoseOracle for SocketOracle<S> {
	fn estimate(&mut self, frame: &Frame) -> Result<Vec<PoseObservation>> {
		let mut body = Vec::with_capacity(8 + frame.data.len());
		body.extend_from_slice(&frame.width.to_le_bytes());
		body.extend_from_slice(&frame.height.to_le_bytes());
		body.extend_from_slice(&frame.data);

		self.exchange(MsgType::Frame, &body, MsgType::Poses)?;

		let poses = serde_json::from_slice(&self.read_body_buf)?;
		Ok(poses)
	}
}

impl<S: Read + Write> Drop for SocketOracle<S> {
	fn drop(&mut self) {
		if let Err(e) = self.write_msg(MsgType::Shutdown, &[]) {
			error!("couldn't send shutdown to pose service", tags![
				("error", &e.to_string())
			]);
		}
	}
}

// ReconnectingOracle replaces a failed connection with a fresh
// one on the next frame, so one slow reply can't leave the
// stream out of step for the rest of the process.
pub struct ReconnectingOracle {
	path: PathBuf,
	timeout: Duration,
	inner: Option<SocketOracle<UnixStream>>,
}

impl ReconnectingOracle {
	pub fn connect<P: AsRef<Path>>(path: P, timeout: Duration) -> Result<Self> {
		let inner = SocketOracle::connect(&path, timeout)?;
		Ok(Self{
			path: path.as_ref().to_path_buf(),
			timeout: timeout,
			inner: Some(inner),
		})
	}
}

impl PoseOracle for ReconnectingOracle {
	fn estimate(&mut self, frame: &Frame) -> Result<Vec<PoseObservation>> {
		let mut oracle = match self.inner.take() {
			Some(oracle) => oracle,
			None => SocketOracle::connect(&self.path, self.timeout)?,
		};

		let result = oracle.estimate(frame);
		if oracle.is_broken() {
			warn!("dropping pose service connection", tags![
				("path", &self.path.display().to_string())
			]);
		} else {
			self.inner = Some(oracle);
		}
		result
	}
}
