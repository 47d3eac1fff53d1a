//! Reading and writing `.mscz` archives.
//!
//! An `.mscz` file is a zip archive whose `.mscx` member holds the score.
//! Conversion rewrites that member through a [`Pipeline`] and copies every
//! other member (thumbnails, audio settings, `META-INF/container.xml`) as is.

use crate::error::Result;
use crate::pipeline::Pipeline;
use std::collections::HashSet;
use std::ffi::OsStr;
use std::io::{Cursor, Read, Seek, Write};
use std::path::{Path, PathBuf};
use zip::write::FileOptions;
use zip::{ZipArchive, ZipWriter};

pub const ARCHIVE_EXTENSION: &str = "mscz";
pub const SCORE_EXTENSION: &str = "mscx";

pub fn is_score_member(name: &str) -> bool {
    Path::new(name).extension() == Some(OsStr::new(SCORE_EXTENSION))
}

/// Route one archive member: score members go through the pipeline,
/// everything else comes back untouched.
pub fn process_member(name: &str, content: Vec<u8>, pipeline: &Pipeline) -> Result<Vec<u8>> {
    if is_score_member(name) {
        log::debug!("rewriting {} with {}", name, pipeline.name());
        pipeline.process(&content)
    } else {
        log::debug!("passing through {}", name);
        Ok(content)
    }
}

/// Convert every member of the archive in `reader` into a new archive on `writer`.
pub fn convert_archive<R, W>(reader: R, writer: W, pipeline: &Pipeline) -> Result<W>
where
    R: Read + Seek,
    W: Write + Seek,
{
    let mut source = ZipArchive::new(reader)?;
    let mut target = ZipWriter::new(writer);
    for i in 0..source.len() {
        let mut member = source.by_index(i)?;
        let name = member.name().to_string();
        let mut options = FileOptions::default()
            .compression_method(member.compression())
            .last_modified_time(member.last_modified());
        if let Some(mode) = member.unix_mode() {
            options = options.unix_permissions(mode);
        }
        if member.is_dir() {
            target.add_directory(name, options)?;
            continue;
        }
        let mut content = Vec::new();
        member.read_to_end(&mut content)?;
        let content = process_member(&name, content, pipeline)?;
        target.start_file(name, options)?;
        target.write_all(&content)?;
    }
    Ok(target.finish()?)
}

/// Convert an archive held in memory.
pub fn convert_bytes(input: &[u8], pipeline: &Pipeline) -> Result<Vec<u8>> {
    let output = convert_archive(Cursor::new(input), Cursor::new(Vec::new()), pipeline)?;
    Ok(output.into_inner())
}

/// Convert `src` into `dst`. Nothing is written unless the whole pipeline succeeds.
pub fn convert_file(src: &Path, dst: &Path, pipeline: &Pipeline) -> Result<()> {
    let input = std::fs::read(src)?;
    let output = convert_bytes(&input, pipeline)?;
    std::fs::write(dst, output)?;
    Ok(())
}

/// True when `path` is itself the output of an earlier conversion.
pub fn is_converted(path: &Path, marker: &str) -> bool {
    path.file_stem()
        .and_then(OsStr::to_str)
        .is_some_and(|stem| stem.ends_with(marker))
}

/// `<stem> - <tag> <marker>.<ext>`, next to the input or in `output_dir`.
pub fn output_path(src: &Path, tag: &str, marker: &str, output_dir: Option<&Path>) -> PathBuf {
    let stem = src.file_stem().map(OsStr::to_string_lossy).unwrap_or_default();
    let extension = src
        .extension()
        .map(OsStr::to_string_lossy)
        .unwrap_or_else(|| ARCHIVE_EXTENSION.into());
    let file_name = format!("{} - {} {}.{}", stem, tag, marker, extension);
    match output_dir {
        Some(dir) => dir.join(file_name),
        None => src.with_file_name(file_name),
    }
}

/// Expand directories into the `.mscz` files directly inside them.
///
/// A file reached twice (named directly and through its directory, or through
/// two spellings of the same path) is listed once, at its first position.
pub fn discover(inputs: &[PathBuf]) -> Result<Vec<PathBuf>> {
    let mut found = Vec::new();
    for input in inputs {
        if input.is_dir() {
            let mut entries = Vec::new();
            for entry in std::fs::read_dir(input)? {
                let path = entry?.path();
                if path.is_file() && path.extension() == Some(OsStr::new(ARCHIVE_EXTENSION)) {
                    entries.push(path);
                }
            }
            entries.sort();
            found.extend(entries);
        } else {
            found.push(input.clone());
        }
    }
    let mut seen = HashSet::new();
    found.retain(|path| seen.insert(path.canonicalize().unwrap_or_else(|_| path.clone())));
    Ok(found)
}

/// Destinations claimed by more than one output, in first-claim order.
pub fn colliding_outputs<'a, I>(outputs: I) -> Vec<PathBuf>
where
    I: IntoIterator<Item = &'a Path>,
{
    let mut claimed = HashSet::new();
    let mut collisions = Vec::new();
    for output in outputs {
        if !claimed.insert(output) && !collisions.iter().any(|c: &PathBuf| c == output) {
            collisions.push(output.to_path_buf());
        }
    }
    collisions
}
