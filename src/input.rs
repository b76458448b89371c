use std::{
    fs,
    io,
    path::{Path, PathBuf},
    time::SystemTime,
};

use log::{info, warn};
use thiserror::Error;



///
/// Errors which may occur when locating or loading a listing.
///
#[derive(Error, Debug)]
pub enum InputError
{
        #[error("std::fs raised this error: {0:?}")]
        IoErr(#[from] io::Error),

        #[error("Cannot find a .S file to analyse in '{0}'")]
        NoSourceInDir(PathBuf),

        #[error("Cannot specify both a source file and a directory")]
        ConflictingSource,

        #[error("No source file specified")]
        NoSource,
}


///
/// Reads a disassembly listing (`avr-objdump -S` output) into lines.
///
/// Interleaved source can carry any encoding; bytes that aren't UTF-8 are
/// replaced rather than rejected.
///
pub fn read_lines(path: &Path) -> Result<Vec<String>, InputError>
{
    let bytes = fs::read(path)?;
    let text = String::from_utf8_lossy(&bytes);
    let lines: Vec<String> = text.lines().map(str::to_string).collect();
    info!("read {} lines from {:?}", lines.len(), path);
    Ok(lines)
}

///
/// The most recently created `.S` file in `dir`. Platforms without creation
/// times fall back to the modification time.
///
pub fn newest_source_in(dir: &Path) -> Result<PathBuf, InputError>
{
    let mut newest: Option<(SystemTime, PathBuf)> = None;

    for entry in fs::read_dir(dir)?
    {
        let path = entry?.path();
        let is_listing = path
            .extension()
            .map(|ext| ext.eq_ignore_ascii_case("s"))
            .unwrap_or(false);
        if !is_listing || !path.is_file()
        {
            continue;
        }

        let meta = fs::metadata(&path)?;
        let stamp = match meta.created().or_else(|_| meta.modified())
        {
            Ok(stamp) => stamp,
            Err(e)    =>
            {
                warn!("no timestamp for {:?}: {}", path, e);
                SystemTime::UNIX_EPOCH
            }
        };

        if newest.as_ref().map_or(true, |(best, _)| stamp > *best)
        {
            newest = Some((stamp, path));
        }
    }

    newest
        .map(|(_, path)| path)
        .ok_or_else(|| InputError::NoSourceInDir(dir.to_path_buf()))
}

/// Picks the listing from an explicit file or a directory, not both.
pub fn select_source(file: Option<PathBuf>, dir: Option<PathBuf>) -> Result<PathBuf, InputError>
{
    match (file, dir)
    {
        (Some(_), Some(_))  => Err(InputError::ConflictingSource),
        (Some(file), None)  => Ok(file),
        (None, Some(dir))   => newest_source_in(&dir),
        (None, None)        => Err(InputError::NoSource),
    }
}

/// `dir/blink.S` becomes `dir/blink_maxStacks.txt`.
pub fn default_output_path(source: &Path) -> PathBuf
{
    let stem = source
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();
    source.with_file_name(format!("{}_maxStacks.txt", stem))
}
