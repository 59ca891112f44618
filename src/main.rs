use std::env;
use std::fs::{OpenOptions, remove_file};
use std::io::Write;
use std::process;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use libc;

mod errors;
use errors::*;
mod ltsv;
mod fallwatch;
use fallwatch::Fallwatch;
mod frame;
mod pose;
use pose::oracle::ReconnectingOracle;
mod classify;
mod debounce;
mod dispatch;
use dispatch::Dispatcher;
mod snapshot;
use snapshot::JpegSnapshot;
mod webcam;
use webcam::Webcam;
mod detector;
use detector::Detector;

const DEFAULT_CONFIG: &str = "/etc/fallwatch.json";

struct PidFile{
	path: String,
}

impl PidFile {
	fn new(path: &str) -> Result<Self> {
		let pid = unsafe {
			libc::getpid()
		};

		info!("creating pidfile", tags![
			("path", path)
		]);
		let mut file = OpenOptions::new()
			.create_new(true)
			.write(true)
			.open(path)?;

		file.write_all(format!("{}", pid).as_bytes())?;
		Ok(Self{path: path.to_string()})
	}
}

impl Drop for PidFile {
	fn drop(&mut self) {
		// Try to delete the pidfile
		// log an error if we can't.
		if let Err(e) = remove_file(&self.path) {
			error!("couldn't delete pidfile", tags![
				("error", &e.to_string())
			]);
		}
	}
}

fn run() -> Result<()> {
	let config_path = env::args().nth(1)
		.unwrap_or_else(|| DEFAULT_CONFIG.to_string());

	info!("fallwatch started", tags![
		("config", &config_path)
	]);
	let n = Arc::new(Fallwatch::load(&config_path)?);
	let _pidfile = PidFile::new(&n.config.pid_file)?;

	// Ctrl-C handler
	let running = Arc::new(AtomicBool::new(true));
	let r = running.clone();

	ctrlc::set_handler(move || {
		info!("received ctrlc - closing");
		r.store(false, Ordering::SeqCst);
	})?;

	let camera = Webcam::open(&n)?;
	let oracle = ReconnectingOracle::connect(&n.config.oracle_socket_path,
		n.config.oracle_timeout())?;
	let dispatcher = Dispatcher::from_config(&n.config)?;

	let mut detector = Detector::new(n.clone(), camera, oracle,
		JpegSnapshot::default(), dispatcher);

	// Runs until ctrl-c; one frame per iteration
	detector.run(&running);

	Ok(())
}

fn main() {
	if let Err(e) = run() {
		error!("something went wrong", tags![
			("error", &e.to_string())
		]);
		process::exit(1);
	}
}
