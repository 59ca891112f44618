use std::fmt;

#[derive(Copy, Clone, PartialEq, Debug)]
pub enum ErrorType{
	InvalidConfig,
	OracleProtocol,
	OracleClosed,
	SnapshotMissing,
	HttpStatus(u16),
}

pub struct Error{
	pub error_type: ErrorType,
}

impl Error {
	pub fn new(error_type: ErrorType) -> Box<Self> {
		Box::new(Self{error_type: error_type})
	}

	fn format(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		use ErrorType::*;
		match self.error_type {
			InvalidConfig => write!(f, "invalid_config"),
			OracleProtocol => write!(f, "oracle_protocol"),
			OracleClosed => write!(f, "oracle_closed"),
			SnapshotMissing => write!(f, "snapshot_missing"),
			HttpStatus(code) => write!(f, "http_status_{}", code),
		}
	}
}

impl fmt::Display for Error {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		self.format(f)
	}
}

impl fmt::Debug for Error {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		self.format(f)
	}
}

impl std::error::Error for Error{}

pub type Result<T> = std::result::Result<T, Box<dyn std::error::Error>>;

// Recover our own ErrorType from a boxed error, if it is one.
#[allow(dead_code)]
pub fn error_type(e: &(dyn std::error::Error + 'static)) -> Option<ErrorType> {
	e.downcast_ref::<Error>().map(|e| e.error_type)
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn display_names() {
		assert_eq!(Error::new(ErrorType::OracleClosed).to_string(), "oracle_closed");
		assert_eq!(Error::new(ErrorType::HttpStatus(502)).to_string(), "http_status_502");
	}

	#[test]
	fn recovers_error_type_from_box() {
		let e: Box<dyn std::error::Error> = Error::new(ErrorType::SnapshotMissing);
		assert_eq!(error_type(e.as_ref()), Some(ErrorType::SnapshotMissing));

		let io: Box<dyn std::error::Error> = Box::new(
			std::io::Error::new(std::io::ErrorKind::Other, "boom"));
		assert_eq!(error_type(io.as_ref()), None);
	}
}
