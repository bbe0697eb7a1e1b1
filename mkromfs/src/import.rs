//! Walking a host directory tree into a [`Builder`]'s staging area.

use crate::builder::Builder;
use crate::config::FS_BLK_SIZE;
use crate::error::BuildError;
use crate::layout::{FileType, BLOCK_HEADER_SIZE};
use std::fs;
use std::path::{Path, PathBuf};
use utils::util::ceil_division;

/// Splits a slash-separated image path into its non-empty components, in order.
///
/// Leading/trailing/doubled slashes collapse away, matching how the original C's path
/// splitter treated `/a//b/` as `["a", "b"]`.
pub fn split_path(path: &str) -> Vec<&str> {
	path.split('/').filter(|c| !c.is_empty()).collect()
}

/// Ensures every directory named by `components` exists under `parent_ino`, creating the
/// ones that don't, and returns the inode number of the final directory.
///
/// Fails with [`BuildError::NotADirectory`] if a component already names something other
/// than a directory — e.g. importing `/bin/sh/extra` after `/bin/sh` was already created
/// as a regular file.
fn mkdir_p(builder: &mut Builder, mut parent_ino: u32, components: &[&str]) -> Result<u32, BuildError> {
	let mut path_so_far = String::new();
	for &name in components {
		path_so_far.push('/');
		path_so_far.push_str(name);
		parent_ino = match builder.search(parent_ino, name) {
			Some(ino) if builder.is_directory(ino) => ino,
			Some(_) => return Err(BuildError::NotADirectory { path: PathBuf::from(&path_so_far) }),
			None => builder.add(parent_ino, name, FileType::Directory)?,
		};
	}
	Ok(parent_ino)
}

/// Creates a regular file at `image_path` (relative to the image root) with `contents`.
pub fn create_file(builder: &mut Builder, image_path: &str, contents: &[u8]) -> Result<u32, BuildError> {
	let mut components = split_path(image_path);
	let name = components.pop().ok_or_else(|| BuildError::InvalidName {
		name: image_path.to_string(),
	})?;

	let root_ino = builder.root_ino();
	let dir_ino = mkdir_p(builder, root_ino, &components)?;
	let ino = builder.add(dir_ino, name, FileType::Regular)?;
	builder.write_file(ino, contents)?;
	Ok(ino)
}

/// Imports a single host file's contents into the image at `image_path`.
///
/// Checked against the block budget before anything is staged: the original importer only
/// discovered an oversized file when `alloc_block` ran out mid-write, leaving a partially
/// written file in the image. Failing up front keeps every build either fully staged or
/// untouched.
pub fn import_file(builder: &mut Builder, host_path: &Path, image_path: &str) -> Result<u32, BuildError> {
	let contents = fs::read(host_path).map_err(|source| BuildError::HostIo {
		path: host_path.to_path_buf(),
		source,
	})?;

	let payload_per_block = (FS_BLK_SIZE - BLOCK_HEADER_SIZE) as u32;
	let needed_blocks = ceil_division(contents.len() as u32, payload_per_block);
	if needed_blocks > builder.available_blocks() {
		return Err(BuildError::FileTooLarge {
			path: host_path.to_path_buf(),
			size: contents.len() as u64,
		});
	}

	create_file(builder, image_path, &contents)
}

/// Recursively imports every file and subdirectory under `host_dir` into the image rooted
/// at `image_prefix`.
///
/// Host directory entries are sorted by name before being visited, so two runs against an
/// unchanged source tree always produce byte-identical images regardless of the host
/// filesystem's own directory-enumeration order.
pub fn import_dir(builder: &mut Builder, host_dir: &Path, image_prefix: &str) -> Result<(), BuildError> {
	let mut entries: Vec<PathBuf> = fs::read_dir(host_dir)
		.map_err(|source| BuildError::HostIo {
			path: host_dir.to_path_buf(),
			source,
		})?
		.filter_map(|e| e.ok())
		.map(|e| e.path())
		.collect();
	entries.sort();

	for host_path in entries {
		let Some(name) = host_path.file_name().and_then(|n| n.to_str()) else {
			continue;
		};
		// "." and ".." never appear in `read_dir`'s output; `.gitkeep` is a host-tree
		// placeholder for otherwise-empty directories and carries no content worth importing.
		if name == ".gitkeep" {
			continue;
		}

		let image_path = format!("{}/{name}", image_prefix.trim_end_matches('/'));
		let metadata = fs::symlink_metadata(&host_path).map_err(|source| BuildError::HostIo {
			path: host_path.clone(),
			source,
		})?;

		if metadata.is_dir() {
			let components = split_path(&image_path);
			let root_ino = builder.root_ino();
			mkdir_p(builder, root_ino, &components)?;
			import_dir(builder, &host_path, &image_path)?;
		} else if metadata.is_file() {
			import_file(builder, &host_path, &image_path)?;
		}
		// Symlinks, devices, and other special files have no representation in the image
		// format and are silently skipped, matching the original importer's behavior.
	}

	Ok(())
}
