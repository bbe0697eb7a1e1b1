//! Command-line entry point.
//!
//! ```text
//! mkromfs [-v] [INPUT_DIR] [OUTPUT_FILE]
//! ```
//!
//! `INPUT_DIR` defaults to `rom/` and `OUTPUT_FILE` to `romfs.bin`, matching the
//! originating build's fixed paths.

use mkromfs::builder::Builder;
use mkromfs::config::{HOST_INPUT_DIR, OUTPUT_BIN};
use mkromfs::import::import_dir;
use mkromfs::serialize::write_image;
use std::path::PathBuf;
use std::process::exit;
use utils::error;
use utils::util::ByteSize;

const BIN: &str = "mkromfs";

fn usage() -> ! {
	eprintln!("usage: {BIN} [-v] [input-dir] [output-file]");
	exit(1);
}

struct Args {
	verbose: bool,
	input_dir: PathBuf,
	output_file: PathBuf,
}

fn parse_args() -> Args {
	let mut verbose = false;
	let mut positional = Vec::new();

	for arg in std::env::args().skip(1) {
		match arg.as_str() {
			"-v" | "--verbose" => verbose = true,
			"-h" | "--help" => usage(),
			_ if arg.starts_with('-') => {
				eprintln!("{BIN}: unrecognized option: {arg}");
				usage();
			}
			_ => positional.push(arg),
		}
	}

	if positional.len() > 2 {
		usage();
	}

	let input_dir = positional.first().map(PathBuf::from).unwrap_or_else(|| PathBuf::from(HOST_INPUT_DIR));
	let output_file = positional.get(1).map(PathBuf::from).unwrap_or_else(|| PathBuf::from(OUTPUT_BIN));

	Args {
		verbose,
		input_dir,
		output_file,
	}
}

fn run(args: &Args) -> Result<(), mkromfs::error::BuildError> {
	let mut builder = Builder::new(args.verbose);

	if args.input_dir.is_dir() {
		import_dir(&mut builder, &args.input_dir, "/")?;
	} else if args.verbose {
		eprintln!("{BIN}: {} does not exist, emitting an empty image", args.input_dir.display());
	}

	write_image(&builder, &args.output_file)?;

	if args.verbose {
		let size: u64 = std::fs::metadata(&args.output_file).map(|m| m.len()).unwrap_or(0);
		eprintln!(
			"{BIN}: wrote {} ({} inodes, {} blocks) to {}",
			ByteSize(size),
			builder.inode_count(),
			builder.block_count(),
			args.output_file.display()
		);
	}

	Ok(())
}

fn main() {
	let args = parse_args();
	run(&args).unwrap_or_else(|e| error(BIN, e));
}
