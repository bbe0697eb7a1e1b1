//! On-disk record layouts.
//!
//! Every structure here is `#[repr(C)]` with the exact field order and
//! reserved padding fields of the wire contract: a kernel reading the
//! emitted image must see identical bytes regardless of which toolchain
//! produced them.

use crate::config::NAME_MAX;
use std::mem::size_of;

/// File-type tag stored in an inode's `mode` field.
#[repr(u8)]
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FileType {
	Regular = 3,
	Directory = 4,
}

/// A node of the intrusive circular doubly-linked list. Both `i_dentry` (embedded in a
/// directory inode) and `d_list` (embedded in a dentry) are one of these; `next`/`prev` are
/// image-relative byte offsets, never pointers.
#[repr(C)]
#[derive(Clone, Copy, Debug, Default)]
pub struct ListHead {
	pub next: u32,
	pub prev: u32,
}

/// The super block: one record, written first in the image.
#[repr(C)]
#[derive(Clone, Copy, Debug)]
pub struct SuperBlock {
	/// Read-only flag. Always `1` for an image produced by this builder.
	pub s_rd_only: u8,
	/// Number of blocks allocated so far.
	pub s_blk_cnt: u32,
	/// Number of inodes allocated so far.
	pub s_inode_cnt: u32,
	/// Start offset of the super block (always 0).
	pub s_sb_addr: u64,
	/// Start offset of the inode table.
	pub s_ino_addr: u64,
	/// Start offset of the block area.
	pub s_blk_addr: u64,
}

/// A fixed-size inode record.
#[repr(C)]
#[derive(Clone, Copy, Debug)]
pub struct RawInode {
	/// File-type tag, one of [`FileType`]'s discriminants.
	pub mode: u8,
	/// Device number; always 0, this builder never emits device nodes.
	pub rdev: u8,
	/// Whether the file is loaded into the rootfs; always 0 at build time.
	pub sync: u8,
	/// Inode number, equal to this record's index in the inode table.
	pub i_ino: u32,
	/// Inode number of the parent directory. 0 (root) has no parent.
	pub i_parent: u32,
	/// File descriptor number; always 0, meaningful only at runtime.
	pub i_fd: u32,
	/// File size in bytes (regular files) or `dentry_count * sizeof(dentry)` (directories).
	pub i_size: u32,
	/// Number of blocks used: the block chain length (files) or dentry block count (dirs).
	pub i_blocks: u32,
	/// Offset of the first block (regular file) or first dentry (directory). 0 if empty.
	pub i_data: u32,
	pub reserved1: u32,
	/// List head of this directory's dentries. Meaningless for regular files.
	pub i_dentry: ListHead,
	pub reserved2: [u32; 2],
}

/// A fixed-size directory entry record. Dentries live packed end-to-end inside block storage.
#[repr(C)]
#[derive(Clone, Copy)]
pub struct RawDentry {
	/// Null-terminated file name, truncated and terminated to fit `NAME_MAX`.
	pub d_name: [u8; NAME_MAX],
	/// Inode number of the named file.
	pub d_inode: u32,
	/// Inode number of the owning directory.
	pub d_parent: u32,
	/// List node linking this dentry into its directory's `i_dentry` list.
	pub d_list: ListHead,
	pub reserved: [u32; 2],
}

/// The 8-byte prefix of every block belonging to a regular file's block chain.
#[repr(C)]
#[derive(Clone, Copy, Debug)]
pub struct BlockHeader {
	/// Offset of the next block in the chain, or 0 to terminate it.
	pub b_next: u32,
	pub reserved: u32,
}

/// Size in bytes of the super block region.
pub const SB_SIZE: usize = size_of::<SuperBlock>();
/// Size in bytes of a single inode record.
pub const INODE_SIZE: usize = size_of::<RawInode>();
/// Size in bytes of a single dentry record.
pub const DENTRY_SIZE: usize = size_of::<RawDentry>();
/// Size in bytes of a block header.
pub const BLOCK_HEADER_SIZE: usize = size_of::<BlockHeader>();

impl RawDentry {
	/// Returns the name as a `&str`, stopping at the first nul byte.
	pub fn name(&self) -> &str {
		let end = self
			.d_name
			.iter()
			.position(|&b| b == 0)
			.unwrap_or(self.d_name.len());
		std::str::from_utf8(&self.d_name[..end]).unwrap_or("")
	}
}
