// Key value logging macros

use std::thread;

use chrono::{SecondsFormat, Utc};

pub type Tags<'a> = Vec<(&'static str, &'a str)>;

// The tags macro is essentially the same as vec![]
// Where the elements are of type (&'static str, &str)

#[macro_export]
macro_rules! tags {
	($($x:expr),*) => {
		vec![
			$($x),*
		]
	};
}

#[macro_export]
macro_rules! info {
	// A Single Expression
	($msg:expr) => {
		$crate::ltsv::log("info", $msg, $crate::ltsv::Tags::new());
	};
	// An expression with tags
	($msg:expr, $kvs:expr) => {
		$crate::ltsv::log("info", $msg, $kvs);
	};
}

#[macro_export]
macro_rules! warn {
	($msg:expr) => {
		$crate::ltsv::log("warn", $msg, $crate::ltsv::Tags::new());
	};
	($msg:expr, $kvs:expr) => {
		$crate::ltsv::log("warn", $msg, $kvs);
	};
}

#[macro_export]
macro_rules! error {
	($msg:expr) => {
		$crate::ltsv::log("error", $msg, $crate::ltsv::Tags::new());
	};
	($msg:expr, $kvs:expr) => {
		$crate::ltsv::log("error", $msg, $kvs);
	};
}

fn ltsv_encode(buf: &mut String, key: &str, value: &str) {
	for c in key.chars() {
		push_escaped(buf, c);
	}

	buf.push('=');

	for c in value.chars() {
		push_escaped(buf, c);
	}
}

fn push_escaped(buf: &mut String, c: char) {
	match c {
		'\n' => buf.push_str("\\n"),
		'\t' => buf.push_str("\\t"),
		'\\' | '=' => {
			buf.push('\\');
			buf.push(c);
		},
		_ => buf.push(c),
	}
}

pub fn format_line(ts: &str,
				   thread: &str,
				   level: &str,
				   msg: &str,
				   tags: &[(&str, &str)]) -> String {
	let mut log_line = String::with_capacity(256);
	ltsv_encode(&mut log_line, "ts", ts);

	log_line.push('\t');
	ltsv_encode(&mut log_line, "thread", thread);

	log_line.push('\t');
	ltsv_encode(&mut log_line, "level", level);

	log_line.push('\t');
	ltsv_encode(&mut log_line, "msg", msg);

	for (key, value) in tags.iter() {
		log_line.push('\t');
		ltsv_encode(&mut log_line, key, value);
	}
	log_line
}

pub fn log(level: &'static str,
		   msg: &str,
		   tags: Tags) {
	let ts = Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true);
	let current = thread::current();
	let name = current.name().unwrap_or("unnamed");

	println!("{}", format_line(&ts, name, level, msg, &tags));
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn fixed_fields_come_first() {
		let line = format_line("t0", "main", "info", "fall detected",
			&[("subject", "grandma")]);
		assert_eq!(line,
			"ts=t0\tthread=main\tlevel=info\tmsg=fall detected\tsubject=grandma");
	}

	#[test]
	fn separators_are_escaped() {
		let line = format_line("t0", "main", "error", "a=b",
			&[("error", "line1\nline2\tx\\y")]);
		assert!(line.contains("msg=a\\=b"));
		assert!(line.contains("error=line1\\nline2\\tx\\\\y"));
		assert_eq!(line.split('\t').count(), 5);
	}
}
