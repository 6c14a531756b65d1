use crate::error::{Result, ThumbnailError};
use crate::formats::resolve_extension;
use std::fs;
use std::path::{Path, PathBuf};

/// What the source argument points at
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceKind {
    File,
    Directory,
}

/// Canonicalizes the source and classifies it. Anything that is neither a
/// regular file nor a directory (sockets, fifos, devices) is rejected.
pub fn resolve_source(path: &Path) -> Result<(PathBuf, SourceKind)> {
    if !path.exists() {
        return Err(ThumbnailError::SourceNotFound(path.to_path_buf()));
    }

    let canonical = path
        .canonicalize()
        .map_err(|_| ThumbnailError::SourceNotFound(path.to_path_buf()))?;
    let file_type = fs::metadata(&canonical)?.file_type();

    let kind = if file_type.is_file() {
        SourceKind::File
    } else if file_type.is_dir() {
        SourceKind::Directory
    } else {
        return Err(ThumbnailError::UnsupportedSourceType(canonical));
    };

    Ok((canonical, kind))
}

/// Makes `path` absolute against the current directory without requiring it to exist.
pub fn absolute_path(path: &Path) -> Result<PathBuf> {
    if path.is_absolute() {
        Ok(path.to_path_buf())
    } else {
        Ok(std::env::current_dir()?.join(path))
    }
}

/// Output path for file mode: an existing directory receives
/// `<stem><extension>`, anything else is taken as the output file itself.
pub fn resolve_file_output(
    source: &Path,
    output: &Path,
    ext_override: Option<&str>,
) -> Result<PathBuf> {
    let output = absolute_path(output)?;
    if !output.is_dir() {
        return Ok(output);
    }

    let stem = source
        .file_stem()
        .ok_or_else(|| ThumbnailError::InvalidFileName(source.to_path_buf()))?;
    let mut file_name = stem.to_os_string();
    file_name.push(resolve_extension(source, ext_override));
    Ok(output.join(file_name))
}

/// Creates the output directory (and its parents) for directory mode.
pub fn prepare_output_dir(output: &Path) -> Result<PathBuf> {
    let output = absolute_path(output)?;
    fs::create_dir_all(&output).map_err(|source| ThumbnailError::DirectoryCreationFailed {
        path: output.clone(),
        source,
    })?;
    Ok(output.canonicalize()?)
}
