//! Compile-time capacity and path configuration for the image builder.
//!
//! These mirror the `kconfig.h` knobs of the originating embedded build: a
//! handful of constants fixed at compile time rather than read from a
//! runtime configuration file, since the image they describe is itself
//! baked into firmware.

/// Maximum length of a file or directory name, including the terminating nul.
pub const NAME_MAX: usize = 32;

/// Maximum number of inodes the image can hold (slot 0 is always the root).
pub const INODE_MAX: usize = 128;

/// Size in bytes of a single block.
pub const FS_BLK_SIZE: usize = 512;

/// Number of blocks in the block area.
pub const FS_BLK_CNT: usize = 1024;

/// Host directory that is walked to build the image.
pub const HOST_INPUT_DIR: &str = "rom/";

/// Prefix prepended to every imported path inside the image.
pub const ROMFS_OUTPUT_DIR: &str = "/";

/// Name of the output image file.
pub const OUTPUT_BIN: &str = "romfs.bin";
