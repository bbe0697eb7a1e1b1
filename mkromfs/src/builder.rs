//! Staging area for an in-progress image: an inode table and a block area held as plain
//! owned arrays, mutated in place as files and directories are added.
//!
//! Nothing here is global or thread-local — the whole of the image under construction
//! lives in one `Builder` value, and every method that needs to translate between staging
//! addresses and on-disk offsets goes through its `regions` field.

use crate::config::{FS_BLK_CNT, FS_BLK_SIZE, INODE_MAX, NAME_MAX};
use crate::error::BuildError;
use crate::layout::{BlockHeader, FileType, ListHead, RawDentry, RawInode, BLOCK_HEADER_SIZE, DENTRY_SIZE};
use crate::list::{dentry_of_list_node, init_list_head, iter_list, list_add_tail, list_empty};
use crate::offset::Regions;

/// Inode number of the root directory. Always valid; it is allocated by [`Builder::new`].
pub const ROOT_INO: u32 = 0;

pub struct Builder {
	inodes: Box<[RawInode; INODE_MAX]>,
	blocks: Box<[[u8; FS_BLK_SIZE]; FS_BLK_CNT]>,
	regions: Regions,
	next_inode: u32,
	next_block: u32,
	verbose: bool,
}

impl Builder {
	pub fn new(verbose: bool) -> Self {
		// SAFETY: an all-zero `RawInode`/block array is a valid bit pattern for every field
		// (no enums, no references); this mirrors the zeroing `mkfs/src/ext2.rs` relies on
		// before filling in individual fields by hand.
		let inodes: Box<[RawInode; INODE_MAX]> = unsafe { Box::new(std::mem::zeroed()) };
		let blocks: Box<[[u8; FS_BLK_SIZE]; FS_BLK_CNT]> = Box::new([[0u8; FS_BLK_SIZE]; FS_BLK_CNT]);

		let regions = Regions::new(
			inodes.as_ptr() as *const u8,
			INODE_MAX * std::mem::size_of::<RawInode>(),
			blocks.as_ptr() as *const u8,
			FS_BLK_CNT * FS_BLK_SIZE,
		);

		let mut builder = Self {
			inodes,
			blocks,
			regions,
			next_inode: 0,
			next_block: 0,
			verbose,
		};

		builder.init_inode(ROOT_INO, ROOT_INO, FileType::Directory);
		builder.next_inode = 1;
		builder
	}

	pub fn root_ino(&self) -> u32 {
		ROOT_INO
	}

	pub fn inode_count(&self) -> u32 {
		self.next_inode
	}

	pub fn block_count(&self) -> u32 {
		self.next_block
	}

	/// Blocks still available for allocation.
	pub fn available_blocks(&self) -> u32 {
		FS_BLK_CNT as u32 - self.next_block
	}

	/// The inode table, truncated to the slots actually allocated.
	pub fn inodes(&self) -> &[RawInode] {
		&self.inodes[..self.next_inode as usize]
	}

	/// The block area, truncated to the blocks actually allocated.
	pub fn blocks(&self) -> &[[u8; FS_BLK_SIZE]] {
		&self.blocks[..self.next_block as usize]
	}

	/// The full fixed-size inode table (`INODE_MAX` slots, unused ones zeroed), the way it
	/// must be serialized: the block region's start offset is fixed at `SB_SIZE +
	/// INODE_MAX*INODE_SIZE` regardless of how many inodes are actually in use, and every
	/// offset already staged into the image assumes that fixed layout.
	pub fn all_inodes(&self) -> &[RawInode; INODE_MAX] {
		&self.inodes
	}

	/// The full fixed-size block area (`FS_BLK_CNT` blocks, unused ones zeroed).
	pub fn all_blocks(&self) -> &[[u8; FS_BLK_SIZE]; FS_BLK_CNT] {
		&self.blocks
	}

	pub fn inode(&self, ino: u32) -> &RawInode {
		&self.inodes[ino as usize]
	}

	/// Whether `ino` names a directory.
	pub fn is_directory(&self, ino: u32) -> bool {
		self.inodes[ino as usize].mode == FileType::Directory as u8
	}

	fn log(&self, msg: impl AsRef<str>) {
		if self.verbose {
			eprintln!("{}", msg.as_ref());
		}
	}

	/// Populates inode slot `ino`'s fields. Does not touch `next_inode`; the caller commits
	/// the slot by incrementing it only once every other fallible step has succeeded.
	///
	/// `i_dentry` is only initialized for directories — a regular file's list head is left
	/// zeroed, matching the original importer, which never touches `i_dentry` outside the
	/// `S_IFDIR` branch of `fs_add_file`.
	fn init_inode(&mut self, ino: u32, parent: u32, file_type: FileType) {
		let inode = &mut self.inodes[ino as usize];
		inode.mode = file_type as u8;
		inode.rdev = 0;
		inode.sync = 0;
		inode.i_ino = ino;
		inode.i_parent = parent;
		inode.i_fd = 0;
		inode.i_size = 0;
		inode.i_blocks = 0;
		inode.i_data = 0;
		inode.reserved1 = 0;
		inode.reserved2 = [0; 2];
		if file_type == FileType::Directory {
			unsafe { init_list_head(&mut inode.i_dentry as *mut ListHead, &self.regions) };
		}
	}

	/// Allocates a fresh zeroed block and returns its image-relative offset. Stamps no
	/// header: whether the block needs one (a regular file's data block does; a
	/// directory's dentry block does not) is the caller's decision.
	fn alloc_block(&mut self) -> Result<u32, BuildError> {
		if self.next_block as usize >= FS_BLK_CNT {
			return Err(BuildError::BlockAreaFull);
		}
		let idx = self.next_block;
		self.next_block += 1;

		let block = &mut self.blocks[idx as usize];
		block.fill(0);

		Ok(self.regions.ptr_to_off(block.as_ptr() as *const u8))
	}

	fn blocks_base(&self) -> usize {
		self.blocks.as_ptr() as usize
	}

	/// Validates a single path component: non-empty and not `.`/`..`.
	///
	/// A component that is too long to fit `d_name` is not rejected here: per the on-disk
	/// contract, it is copied with truncation at `NAME_MAX - 1` bytes instead, the same way
	/// the original importer's `strncpy` silently truncates rather than failing the build.
	pub fn validate_name(name: &str) -> Result<(), BuildError> {
		if name.is_empty() || name == "." || name == ".." {
			return Err(BuildError::InvalidName { name: name.to_string() });
		}
		Ok(())
	}

	/// Looks up `name` as an immediate child of `parent_ino`, returning its inode number.
	pub fn search(&self, parent_ino: u32, name: &str) -> Option<u32> {
		let head = &self.inodes[parent_ino as usize].i_dentry as *const ListHead;
		unsafe {
			if list_empty(head, &self.regions) {
				return None;
			}
			for node in iter_list(head, &self.regions) {
				let dentry = dentry_of_list_node(node);
				if (*dentry).name() == name {
					return Some((*dentry).d_inode);
				}
			}
		}
		None
	}

	/// Creates `name` under `parent_ino` as a file of `file_type`, returning its new inode
	/// number. Fails if the name is invalid, already taken, or capacity has run out.
	///
	/// Nothing about the new inode is committed (`next_inode` is not advanced, and the
	/// slot it will occupy is left untouched) until dentry storage for it has actually
	/// been allocated and written: a directory that is out of dentry blocks must fail
	/// without leaving behind an inode unreachable from any directory listing.
	pub fn add(&mut self, parent_ino: u32, name: &str, file_type: FileType) -> Result<u32, BuildError> {
		Self::validate_name(name)?;
		if self.search(parent_ino, name).is_some() {
			return Err(BuildError::DuplicateEntry {
				parent: format!("inode {parent_ino}"),
				name: name.to_string(),
			});
		}
		if self.next_inode as usize >= INODE_MAX {
			return Err(BuildError::InodeTableFull);
		}

		let child_ino = self.next_inode;
		let (dentry_ptr, directory_was_empty) = self.alloc_dentry_slot(parent_ino)?;

		let mut d_name = [0u8; NAME_MAX];
		let truncated = &name.as_bytes()[..name.len().min(NAME_MAX - 1)];
		d_name[..truncated.len()].copy_from_slice(truncated);
		unsafe {
			dentry_ptr.write(RawDentry {
				d_name,
				d_inode: child_ino,
				d_parent: parent_ino,
				d_list: ListHead::default(),
				reserved: [0; 2],
			});
		}

		// Every fallible step (capacity checks, dentry block allocation) is behind us;
		// commit the inode slot.
		self.init_inode(child_ino, parent_ino, file_type);
		self.next_inode += 1;

		if directory_was_empty {
			self.inodes[parent_ino as usize].i_data = self.regions.ptr_to_off(dentry_ptr as *const u8);
		}
		let head = &self.inodes[parent_ino as usize].i_dentry as *const ListHead as *mut ListHead;
		unsafe {
			let list_node = &mut (*dentry_ptr).d_list as *mut ListHead;
			list_add_tail(list_node, head, &self.regions);
		}

		let parent = &mut self.inodes[parent_ino as usize];
		parent.i_size += DENTRY_SIZE as u32;
		let dentry_count = parent.i_size as usize / DENTRY_SIZE;
		let dentries_per_block = FS_BLK_SIZE / DENTRY_SIZE;
		parent.i_blocks = utils::util::ceil_division(dentry_count as u32, dentries_per_block as u32);

		self.log(format!("add: inode {child_ino} ({name}) under inode {parent_ino}"));
		Ok(child_ino)
	}

	/// Reserves storage for one new dentry under `parent_ino`: reuses room at the tail of
	/// the most recently allocated block when there is any, and never splits a dentry
	/// across two blocks. Dentry blocks carry no block header — unlike a regular file's
	/// data blocks, dentries start at offset 0 of the block and the list threads itself
	/// through each dentry's own `d_list`, not through a block-to-block chain.
	///
	/// Returns the address to write the new dentry at, and whether `parent_ino`'s dentry
	/// list was empty before this call (so the caller can decide whether to point the
	/// directory's `i_data` at it).
	fn alloc_dentry_slot(&mut self, parent_ino: u32) -> Result<(*mut RawDentry, bool), BuildError> {
		let head = &self.inodes[parent_ino as usize].i_dentry as *const ListHead;
		let was_empty = unsafe { list_empty(head, &self.regions) };

		if was_empty {
			let block_off = self.alloc_block()?;
			let block_ptr = self.regions.off_to_ptr(block_off);
			self.inodes[parent_ino as usize].i_blocks += 1;
			Ok((block_ptr as *mut RawDentry, true))
		} else {
			let tail_off = unsafe { (*head).prev };
			let tail_node = self.regions.off_to_ptr(tail_off) as *mut ListHead;
			let tail_dentry = unsafe { dentry_of_list_node(tail_node) };

			let blocks_base = self.blocks_base();
			let tail_addr = tail_dentry as usize;
			let block_index = (tail_addr - blocks_base) / FS_BLK_SIZE;
			let block_start = blocks_base + block_index * FS_BLK_SIZE;
			let candidate_end = (tail_addr + DENTRY_SIZE) - block_start + DENTRY_SIZE;

			if candidate_end <= FS_BLK_SIZE {
				Ok((unsafe { tail_dentry.add(1) }, false))
			} else {
				let new_block_off = self.alloc_block()?;
				let new_block_ptr = self.regions.off_to_ptr(new_block_off);
				self.inodes[parent_ino as usize].i_blocks += 1;
				Ok((new_block_ptr as *mut RawDentry, false))
			}
		}
	}

	/// Appends `contents` to `file_ino`'s block chain, allocating as many blocks as
	/// needed. `file_ino` must currently be empty (this builder never appends to a file
	/// more than once).
	pub fn write_file(&mut self, file_ino: u32, contents: &[u8]) -> Result<(), BuildError> {
		debug_assert_eq!(self.inodes[file_ino as usize].i_blocks, 0);

		if contents.is_empty() {
			let file = &mut self.inodes[file_ino as usize];
			file.i_size = 0;
			file.i_data = 0;
			return Ok(());
		}

		let payload_per_block = FS_BLK_SIZE - BLOCK_HEADER_SIZE;
		let mut written = 0usize;
		let mut prev_header: Option<*mut BlockHeader> = None;
		let mut first_block_off = 0u32;

		while written < contents.len() {
			let block_off = self.alloc_block()?;
			if first_block_off == 0 {
				first_block_off = block_off;
			}
			let block_ptr = self.regions.off_to_ptr(block_off);
			let header = block_ptr as *mut BlockHeader;
			// SAFETY: `block_ptr` is `FS_BLK_SIZE` bytes, at least `BLOCK_HEADER_SIZE`.
			unsafe { header.write(BlockHeader { b_next: 0, reserved: 0 }) };

			if let Some(prev) = prev_header {
				unsafe { (*prev).b_next = block_off };
			}
			prev_header = Some(header);

			let chunk_len = (contents.len() - written).min(payload_per_block);
			let payload_ptr = unsafe { block_ptr.add(BLOCK_HEADER_SIZE) };
			unsafe {
				std::ptr::copy_nonoverlapping(contents[written..written + chunk_len].as_ptr(), payload_ptr, chunk_len);
			}
			written += chunk_len;

			self.inodes[file_ino as usize].i_blocks += 1;
			if written >= contents.len() {
				break;
			}
		}

		let file = &mut self.inodes[file_ino as usize];
		file.i_size = contents.len() as u32;
		file.i_data = first_block_off;
		Ok(())
	}
}

#[cfg(test)]
mod test {
	use super::*;

	#[test]
	fn root_is_an_empty_directory() {
		let builder = Builder::new(false);
		assert_eq!(builder.root_ino(), 0);
		assert_eq!(builder.inode_count(), 1);
		assert_eq!(builder.search(builder.root_ino(), "anything"), None);
	}

	#[test]
	fn add_then_search_round_trips() {
		let mut builder = Builder::new(false);
		let ino = builder.add(builder.root_ino(), "init", FileType::Regular).unwrap();
		assert_eq!(builder.search(builder.root_ino(), "init"), Some(ino));
	}

	#[test]
	fn duplicate_name_is_rejected() {
		let mut builder = Builder::new(false);
		builder.add(builder.root_ino(), "init", FileType::Regular).unwrap();
		let err = builder.add(builder.root_ino(), "init", FileType::Regular).unwrap_err();
		assert!(matches!(err, BuildError::DuplicateEntry { .. }));
	}

	#[test]
	fn invalid_names_are_rejected() {
		let mut builder = Builder::new(false);
		assert!(matches!(
			builder.add(builder.root_ino(), "", FileType::Regular),
			Err(BuildError::InvalidName { .. })
		));
		assert!(matches!(
			builder.add(builder.root_ino(), "..", FileType::Regular),
			Err(BuildError::InvalidName { .. })
		));
	}

	#[test]
	fn overlong_name_is_truncated_not_rejected() {
		let mut builder = Builder::new(false);
		let long_name = "x".repeat(NAME_MAX + 10);
		let ino = builder.add(builder.root_ino(), &long_name, FileType::Regular).unwrap();

		let head = &builder.inode(builder.root_ino()).i_dentry as *const ListHead;
		let stored_name = unsafe {
			let node = iter_list(head, &builder.regions).next().unwrap();
			(*dentry_of_list_node(node)).name().to_string()
		};
		assert_eq!(stored_name.len(), NAME_MAX - 1);
		assert!(long_name.starts_with(&stored_name));
		assert_eq!(builder.inode(ino).i_ino, ino);
	}

	#[test]
	fn many_entries_span_multiple_dentry_blocks() {
		let mut builder = Builder::new(false);
		// Dentry blocks carry no block header; dentries start at offset 0.
		let per_block = FS_BLK_SIZE / DENTRY_SIZE;
		for i in 0..per_block * 2 + 3 {
			let name = format!("f{i}");
			builder.add(builder.root_ino(), &name, FileType::Regular).unwrap();
		}
		assert!(builder.inode(builder.root_ino()).i_blocks >= 3);

		for i in 0..per_block * 2 + 3 {
			let name = format!("f{i}");
			assert!(builder.search(builder.root_ino(), &name).is_some(), "missing {name}");
		}
	}

	#[test]
	fn write_file_chains_multiple_blocks() {
		let mut builder = Builder::new(false);
		let ino = builder.add(builder.root_ino(), "big", FileType::Regular).unwrap();
		let payload = vec![0xAB; FS_BLK_SIZE * 2 + 10];
		builder.write_file(ino, &payload).unwrap();
		let inode = builder.inode(ino);
		assert_eq!(inode.i_size as usize, payload.len());
		assert_eq!(inode.i_blocks, 3);
	}

	#[test]
	fn write_empty_file_allocates_no_blocks() {
		let mut builder = Builder::new(false);
		let blocks_before = builder.block_count();
		let ino = builder.add(builder.root_ino(), "empty", FileType::Regular).unwrap();
		builder.write_file(ino, &[]).unwrap();
		assert_eq!(builder.inode(ino).i_size, 0);
		assert_eq!(builder.inode(ino).i_blocks, 0);
		assert_eq!(builder.inode(ino).i_data, 0);
		assert_eq!(builder.block_count(), blocks_before);
	}

	#[test]
	fn regular_file_leaves_i_dentry_zeroed() {
		let mut builder = Builder::new(false);
		let ino = builder.add(builder.root_ino(), "init", FileType::Regular).unwrap();
		let inode = builder.inode(ino);
		assert_eq!(inode.i_dentry.next, 0);
		assert_eq!(inode.i_dentry.prev, 0);
	}

	#[test]
	fn first_dentry_of_a_block_starts_at_offset_zero() {
		let mut builder = Builder::new(false);
		builder.add(builder.root_ino(), "init", FileType::Regular).unwrap();

		let root = builder.inode(builder.root_ino());
		let block_index = root.i_data / FS_BLK_SIZE as u32;
		let block_start_off = block_index * FS_BLK_SIZE as u32;
		assert_eq!(root.i_data, block_start_off, "dentry blocks carry no header");
	}

	#[test]
	fn add_does_not_commit_an_inode_when_the_block_pool_is_exhausted() {
		let mut builder = Builder::new(false);
		// Simulate an exhausted block pool directly rather than looping `add` thousands of
		// times to drain it for real: root is still empty, so the very first dentry it
		// needs requires a fresh block, which must now fail.
		builder.next_block = FS_BLK_CNT as u32;

		let inode_count_before = builder.inode_count();
		let err = builder.add(builder.root_ino(), "unreachable", FileType::Regular).unwrap_err();
		assert!(matches!(err, BuildError::BlockAreaFull));
		assert_eq!(builder.inode_count(), inode_count_before);
		assert_eq!(builder.search(builder.root_ino(), "unreachable"), None);
	}
}
