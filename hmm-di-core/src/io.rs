use std::fs::{self, File};
use std::io::{self, BufRead, BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};

use tempfile::NamedTempFile;

/// Reads a UTF-8 text file line by line.
///
/// Line terminators (`\n` / `\r\n`) are removed, everything else is kept
/// verbatim: trailing spaces are significant in training records.
pub(crate) fn read_lines<P: AsRef<Path>>(filename: P) -> io::Result<Vec<String>> {
	BufReader::new(File::open(filename)?).lines().collect()
}

/// Writes `bytes` to `path` through a temporary file in the same directory,
/// so a crash never leaves a half-written model behind.
pub(crate) fn write_atomic<P: AsRef<Path>>(path: P, bytes: &[u8]) -> io::Result<()> {
	let path = path.as_ref();
	let parent = match path.parent() {
		Some(p) if !p.as_os_str().is_empty() => p,
		_ => Path::new("."),
	};
	fs::create_dir_all(parent)?;

	let temp_file = NamedTempFile::new_in(parent)?;
	{
		let mut writer = BufWriter::new(temp_file.as_file());
		writer.write_all(bytes)?;
		writer.flush()?;
	}
	temp_file.persist(path).map_err(|e| e.error)?;
	Ok(())
}

/// Builds a sibling path of `input_path` with another extension.
///
/// Example:
/// `models/tok.mdl` + `"bin"` → `models/tok.bin`
pub(crate) fn build_output_path<P: AsRef<Path>>(
	input_path: P,
	output_extension: &str,
) -> io::Result<PathBuf> {
	let input_path = input_path.as_ref();

	let parent = input_path.parent().unwrap_or_else(|| Path::new("."));
	let file_stem = input_path
		.file_stem()
		.ok_or_else(|| io::Error::new(io::ErrorKind::InvalidInput, "Input path has no filename"))?;

	let mut output = PathBuf::from(parent);
	output.push(file_stem);
	output.set_extension(output_extension);

	Ok(output)
}
