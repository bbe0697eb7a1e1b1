//! Writing the three concatenated regions of a finished image to disk.

use crate::builder::Builder;
use crate::config::{FS_BLK_CNT, FS_BLK_SIZE, INODE_MAX};
use crate::error::BuildError;
use crate::layout::{RawInode, SuperBlock, INODE_SIZE, SB_SIZE};
use std::fs::File;
use std::io::Write;
use std::path::Path;
use utils::util::reinterpret;

/// Assembles the super block for a builder's current state.
///
/// The three region start offsets are fixed by `INODE_MAX`/`FS_BLK_CNT`, not by how many
/// inodes or blocks are actually in use: every offset already staged into the inode table
/// and block area (by way of [`crate::offset::Regions`]) was computed against this same
/// fixed layout, so the serialized regions must match it exactly or every offset field in
/// the image would resolve to the wrong byte.
///
/// Built from zeroed storage, not a bare struct literal: `#[repr(C)]` leaves the padding
/// between `s_rd_only` and `s_blk_cnt`, and after `s_inode_cnt`, uninitialized, and a stack
/// literal doesn't zero it. Those bytes still get written into the image, so leaving them
/// uninitialized would make the emitted super block depend on stack garbage instead of
/// being the same on every run — the same reason the inode table is zeroed up front in
/// `Builder::new` rather than filled in as a bare literal per slot.
fn super_block_for(builder: &Builder) -> SuperBlock {
	let inode_table_size = (INODE_MAX * INODE_SIZE) as u64;
	// SAFETY: `SuperBlock` is plain old data (no references, no enums) - the all-zero bit
	// pattern is valid for every field.
	let mut sb: SuperBlock = unsafe { std::mem::zeroed() };
	sb.s_rd_only = 1;
	sb.s_blk_cnt = builder.block_count();
	sb.s_inode_cnt = builder.inode_count();
	sb.s_sb_addr = 0;
	sb.s_ino_addr = SB_SIZE as u64;
	sb.s_blk_addr = SB_SIZE as u64 + inode_table_size;
	sb
}

/// Writes `builder`'s staged image to `path`: super block, then the full `INODE_MAX`-slot
/// inode table, then the full `FS_BLK_CNT`-block block area, in that order, with no gaps.
/// Unused inode slots and blocks are zero-initialized. Fails (and leaves no partial file
/// behind if the failure happens before the first byte is written) on any I/O error.
pub fn write_image(builder: &Builder, path: &Path) -> Result<(), BuildError> {
	let inodes: &[RawInode; INODE_MAX] = builder.all_inodes();
	let blocks: &[[u8; FS_BLK_SIZE]; FS_BLK_CNT] = builder.all_blocks();

	let sb = super_block_for(builder);

	let mut file = File::create(path).map_err(BuildError::OutputIo)?;
	write_all(&mut file, reinterpret(&sb))?;
	for inode in inodes.iter() {
		write_all(&mut file, reinterpret(inode))?;
	}
	for block in blocks.iter() {
		write_all(&mut file, block)?;
	}
	file.flush().map_err(BuildError::OutputIo)?;
	Ok(())
}

fn write_all(file: &mut File, buf: &[u8]) -> Result<(), BuildError> {
	file.write_all(buf).map_err(BuildError::OutputIo)
}
