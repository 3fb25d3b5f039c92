#![forbid(unsafe_code)]

pub mod secret {
	use std::fmt;

	/// Wrapper that redacts in logs.
	#[derive(Clone)]
	pub struct SecretString(String);

	impl SecretString {
		pub fn new(s: impl Into<String>) -> Self {
			Self(s.into())
		}

		/// Access the inner secret string.
		pub fn expose(&self) -> &str {
			&self.0
		}
	}

	impl fmt::Debug for SecretString {
		fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
			f.write_str("SecretString(<redacted>)")
		}
	}

	impl fmt::Display for SecretString {
		fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
			f.write_str("<redacted>")
		}
	}

	#[cfg(test)]
	mod tests {
		use super::*;

		#[test]
		fn debug_and_display_redact() {
			let s = SecretString::new("hunter2");
			assert_eq!(format!("{s:?}"), "SecretString(<redacted>)");
			assert_eq!(s.to_string(), "<redacted>");
			assert_eq!(s.expose(), "hunter2");
		}
	}
}

pub mod time {
	use std::time::{Duration, SystemTime, UNIX_EPOCH};

	/// Current Unix time in milliseconds.
	#[inline]
	pub fn unix_ms_now() -> i64 {
		SystemTime::now()
			.duration_since(UNIX_EPOCH)
			.unwrap_or(Duration::from_secs(0))
			.as_millis() as i64
	}

	/// Current Unix time in seconds.
	#[inline]
	pub fn unix_secs_now() -> u64 {
		SystemTime::now()
			.duration_since(UNIX_EPOCH)
			.unwrap_or(Duration::from_secs(0))
			.as_secs()
	}
}
