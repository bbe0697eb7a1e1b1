//! Error taxonomy for image construction.

use std::fmt;
use std::io;
use std::path::PathBuf;

/// Everything that can go wrong while staging or writing an image.
#[derive(Debug)]
pub enum BuildError {
	/// The inode table is full; no more files or directories can be created.
	InodeTableFull,
	/// The block area has no free block left to allocate.
	BlockAreaFull,
	/// A regular file's contents don't fit in the remaining block budget.
	FileTooLarge { path: PathBuf, size: u64 },
	/// A path component is empty or is `.`/`..`. Overlong components are truncated rather
	/// than rejected, so they never reach this variant.
	InvalidName { name: String },
	/// Two entries under the same parent directory share a name.
	DuplicateEntry { parent: String, name: String },
	/// A path component names something that isn't a directory.
	NotADirectory { path: PathBuf },
	/// Reading from or walking the host source tree failed.
	HostIo { path: PathBuf, source: io::Error },
	/// Writing the output image failed.
	OutputIo(io::Error),
}

impl fmt::Display for BuildError {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self {
			Self::InodeTableFull => write!(f, "inode table is full"),
			Self::BlockAreaFull => write!(f, "block area is full"),
			Self::FileTooLarge { path, size } => {
				write!(f, "{}: {size} bytes exceeds the available block capacity", path.display())
			}
			Self::InvalidName { name } => write!(f, "invalid path component: {name:?}"),
			Self::DuplicateEntry { parent, name } => {
				write!(f, "{parent}: an entry named {name:?} already exists")
			}
			Self::NotADirectory { path } => write!(f, "{}: not a directory", path.display()),
			Self::HostIo { path, source } => write!(f, "{}: {source}", path.display()),
			Self::OutputIo(source) => write!(f, "failed to write image: {source}"),
		}
	}
}

impl std::error::Error for BuildError {
	fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
		match self {
			Self::HostIo { source, .. } => Some(source),
			Self::OutputIo(source) => Some(source),
			_ => None,
		}
	}
}

#[cfg(test)]
mod test {
	use super::*;

	#[test]
	fn display_includes_offending_name() {
		let err = BuildError::DuplicateEntry {
			parent: "/".to_string(),
			name: "init".to_string(),
		};
		assert!(format!("{err}").contains("init"));
	}

	#[test]
	fn display_includes_path_for_host_io() {
		let err = BuildError::HostIo {
			path: PathBuf::from("rom/init"),
			source: io::Error::new(io::ErrorKind::NotFound, "no such file"),
		};
		assert!(format!("{err}").contains("rom/init"));
	}
}
