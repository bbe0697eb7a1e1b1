//! This module implements features common to the image-building tool.

pub mod util;

use std::fmt;
use std::process::exit;

/// Writes an error to stderr, then exits with a non-zero status.
pub fn error<M: fmt::Display>(bin: &str, msg: M) -> ! {
	eprintln!("{bin}: error: {msg}");
	exit(1);
}
