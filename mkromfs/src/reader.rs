//! Read-only parser for an emitted image, working from raw bytes alone.
//!
//! This has no counterpart in the original embedded build — there the only reader is the
//! in-kernel VFS, which is out of scope here. It exists purely so the properties this
//! builder promises (round-trip, packing, no orphaned blocks) can be checked against the
//! bytes actually written, the way a real consumer of the image would read it: by offset,
//! never by reusing the builder's own staging state.

use crate::config::FS_BLK_SIZE;
use crate::layout::{BlockHeader, FileType, RawDentry, RawInode, SuperBlock, BLOCK_HEADER_SIZE, DENTRY_SIZE, INODE_SIZE, SB_SIZE};
use std::fmt;
use std::mem::size_of;

/// Copies a record out of a byte slice into freshly zeroed, properly aligned storage.
///
/// `bytes` comes from a `Vec<u8>`/`&[u8]` with no alignment guarantee beyond 1, so casting
/// `bytes.as_ptr()` straight to `*const T` and dereferencing it would construct an
/// unaligned reference - undefined behavior, even though it happens to work in practice on
/// allocators that over-align. Copying into an owned, correctly aligned `T` instead mirrors
/// how the teacher's own on-disk reader fills an aligned struct via `read_exact` before
/// reinterpreting it, rather than reinterpreting the source buffer in place.
fn read_struct<T: Copy>(bytes: &[u8]) -> T {
	debug_assert_eq!(bytes.len(), size_of::<T>());
	// SAFETY: `T` is plain old data (no references, no enums with invalid bit patterns),
	// so the all-zero value is valid, and `bytes` is at least `size_of::<T>()` long.
	unsafe {
		let mut val: T = std::mem::zeroed();
		std::ptr::copy_nonoverlapping(bytes.as_ptr(), &mut val as *mut T as *mut u8, size_of::<T>());
		val
	}
}

#[derive(Debug)]
pub enum ReadError {
	/// The byte buffer is too short to hold even a super block.
	Truncated,
	/// An offset field pointed outside the buffer.
	OffsetOutOfRange(u32),
	/// An inode number is beyond the super block's declared inode count.
	NoSuchInode(u32),
}

impl fmt::Display for ReadError {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self {
			Self::Truncated => write!(f, "image is too short to contain a super block"),
			Self::OffsetOutOfRange(off) => write!(f, "offset {off} lies outside the image"),
			Self::NoSuchInode(ino) => write!(f, "no such inode: {ino}"),
		}
	}
}

impl std::error::Error for ReadError {}

/// A parsed, borrowed view over an image's bytes.
pub struct Image<'a> {
	bytes: &'a [u8],
	super_block: SuperBlock,
}

impl<'a> Image<'a> {
	pub fn parse(bytes: &'a [u8]) -> Result<Self, ReadError> {
		if bytes.len() < SB_SIZE {
			return Err(ReadError::Truncated);
		}
		let super_block = read_struct::<SuperBlock>(&bytes[..SB_SIZE]);
		Ok(Self { bytes, super_block })
	}

	pub fn super_block(&self) -> &SuperBlock {
		&self.super_block
	}

	fn at(&self, off: u32, len: usize) -> Result<&[u8], ReadError> {
		let start = off as usize;
		let end = start.checked_add(len).ok_or(ReadError::OffsetOutOfRange(off))?;
		self.bytes.get(start..end).ok_or(ReadError::OffsetOutOfRange(off))
	}

	pub fn inode(&self, ino: u32) -> Result<RawInode, ReadError> {
		if ino >= self.super_block.s_inode_cnt {
			return Err(ReadError::NoSuchInode(ino));
		}
		let off = self.super_block.s_ino_addr as u32 + ino * INODE_SIZE as u32;
		let slice = self.at(off, INODE_SIZE)?;
		Ok(read_struct(slice))
	}

	fn dentry_at(&self, off: u32) -> Result<RawDentry, ReadError> {
		let slice = self.at(off, DENTRY_SIZE)?;
		Ok(read_struct(slice))
	}

	/// Lists the immediate children of a directory inode as `(name, inode number)` pairs,
	/// walking its `i_dentry` list exactly as a kernel reader would: by following `next`
	/// offsets until the list head's own offset is seen again.
	pub fn dentries(&self, dir_ino: u32) -> Result<Vec<(String, u32)>, ReadError> {
		let dir = self.inode(dir_ino)?;
		let head_off = self.super_block.s_ino_addr as u32 + dir_ino * INODE_SIZE as u32 + i_dentry_field_offset();

		let mut out = Vec::new();
		let mut cursor = dir.i_dentry.next;
		let mut guard = 0usize;
		while cursor != head_off {
			guard += 1;
			if guard > self.super_block.s_blk_cnt as usize * (FS_BLK_SIZE / DENTRY_SIZE) + 1 {
				// A malformed or cyclic list would otherwise loop forever; bail instead.
				break;
			}
			let list_node_off = cursor;
			let dentry_off = list_node_off - d_list_field_offset();
			let dentry = self.dentry_at(dentry_off)?;
			out.push((dentry.name().to_string(), dentry.d_inode));
			cursor = dentry.d_list.next;
		}
		Ok(out)
	}

	/// Reads a regular file's full contents by walking its block chain.
	pub fn file_contents(&self, file_ino: u32) -> Result<Vec<u8>, ReadError> {
		let inode = self.inode(file_ino)?;
		let mut out = Vec::with_capacity(inode.i_size as usize);
		let mut block_off = inode.i_data;
		let mut remaining = inode.i_size as usize;

		while remaining > 0 {
			if block_off == 0 {
				break;
			}
			let block = self.at(block_off, FS_BLK_SIZE)?;
			let header: BlockHeader = read_struct(&block[..BLOCK_HEADER_SIZE]);
			let payload = &block[BLOCK_HEADER_SIZE..];
			let take = remaining.min(payload.len());
			out.extend_from_slice(&payload[..take]);
			remaining -= take;
			block_off = header.b_next;
		}

		Ok(out)
	}

	pub fn is_directory(&self, ino: u32) -> Result<bool, ReadError> {
		Ok(self.inode(ino)?.mode == FileType::Directory as u8)
	}
}

/// Byte offset of `i_dentry` within [`RawInode`]. Computed the same way the builder's
/// `list.rs` recovers a dentry's address from its embedded list node, just specialized to
/// this one field and kept local to the reader, which never touches `Regions`.
fn i_dentry_field_offset() -> u32 {
	std::mem::offset_of!(RawInode, i_dentry) as u32
}

/// Byte offset of `d_list` within [`RawDentry`].
fn d_list_field_offset() -> u32 {
	std::mem::offset_of!(RawDentry, d_list) as u32
}
