//! This module implements utility functions.

use std::fmt;
use std::mem::size_of;
use std::slice;

/// Divides `n` by `d`, rounding the result up instead of truncating.
pub fn ceil_division(n: u32, d: u32) -> u32 {
	n / d + ((n % d != 0) as u32)
}

/// Reinterprets a value as a byte slice.
///
/// The caller must ensure `T` has a stable, well-defined memory layout (`#[repr(C)]` or
/// `#[repr(C, packed)]`); this is intended for on-disk record structures only.
pub fn reinterpret<T>(val: &T) -> &[u8] {
	unsafe { slice::from_raw_parts(val as *const T as *const u8, size_of::<T>()) }
}

/// Performs the log2 operatin on the given integer.
///
/// If the result is undefined, the function returns None.
pub fn log2(n: u64) -> Option<u64> {
	let num_bits = (size_of::<u64>() * 8) as u64;

	let n = num_bits - n.leading_zeros() as u64;
	if n > 0 {
		Some(n - 1)
	} else {
		None
	}
}

/// Structure representing a number of bytes.
pub struct ByteSize(pub u64);

impl fmt::Display for ByteSize {
	fn fmt(&self, fmt: &mut fmt::Formatter<'_>) -> fmt::Result {
		let mut order = log2(self.0).unwrap_or(0) / log2(1024).unwrap();

		let suffix = match order {
			0 => "bytes",
			1 => "KiB",
			2 => "MiB",
			3 => "GiB",
			4 => "TiB",

			_ => {
				order = 0;
				"bytes"
			}
		};

		let unit = 1024usize.pow(order as u32);
		let nbr = self.0 / unit as u64;

		write!(fmt, "{} {}", nbr, suffix)
	}
}
