//! Locating the firmware image produced by the build.

use {
    crate::error::{Error, Result},
    log::{debug, trace},
    std::{
        fs,
        path::{Path, PathBuf},
        time::SystemTime,
    },
};

/// Newest `*<target>.bin` file in `dir`.
///
/// Builds leave one image per version in the output directory
/// (`inav_1.9.0_SPRACINGF3.bin`, `inav_1.9.1_SPRACINGF3.bin`, ...), so the
/// most recently modified candidate is the one just built.
pub fn locate_binary(dir: &Path, target: &str) -> Result<PathBuf> {
    let mut best: Option<(SystemTime, PathBuf)> = None;

    for entry in fs::read_dir(dir)? {
        let entry = entry?;
        let path = entry.path();
        if !is_candidate(&path, target) {
            continue;
        }
        let modified = entry
            .metadata()?
            .modified()?;
        trace!("Candidate {} ({modified:?})", path.display());
        if best
            .as_ref()
            .is_none_or(|(newest, _)| *newest < modified)
        {
            best = Some((modified, path));
        }
    }

    let (_, path) = best.ok_or_else(|| Error::BinaryNotFound {
        target: target.to_string(),
        dir: dir.to_path_buf(),
    })?;
    debug!("Using binary {}", path.display());
    Ok(path)
}

fn is_candidate(path: &Path, target: &str) -> bool {
    let is_bin = path
        .extension()
        .is_some_and(|ext| ext == "bin");
    is_bin
        && path
            .file_stem()
            .and_then(|stem| stem.to_str())
            .is_some_and(|stem| stem.ends_with(target))
}
