use crate::downloader::{self, Downloader};
use crate::error::FetchError;
use std::fs;
use std::path::{Path, PathBuf};

/// Download and extract `asset_name` at `version` of `repo` into
/// `<backend_root>/<version>/`, verifying `expected_exe` is present before the
/// directory is considered installed.
///
/// Extraction happens in a `<version>.partial/` sibling which is renamed into
/// place only once the expected executable has been confirmed; a prior
/// partial directory left over from an interrupted install is removed before
/// starting. On success, sibling directories under `backend_root` whose name
/// is neither `version` nor the partial marker are removed.
pub async fn install_from_github(
    downloader: &Downloader,
    repo: &str,
    asset_name: &str,
    version: &str,
    backend_root: &Path,
    expected_exe: &str,
    mut progress_cb: impl FnMut(u64, u64) + Send,
) -> Result<PathBuf, FetchError> {
    let dest = backend_root.join(version);
    if dest.join(expected_exe).is_file() {
        return Ok(dest);
    }

    let partial = backend_root.join(format!("{version}.partial"));
    if partial.exists() {
        fs::remove_dir_all(&partial)?;
    }

    let bytes = downloader
        .download(repo, asset_name, version, &mut progress_cb)
        .await?;

    if let Err(e) = downloader::extract(asset_name, &bytes, &partial) {
        let _ = fs::remove_dir_all(&partial);
        return Err(e);
    }

    if !partial.join(expected_exe).is_file() {
        let dir = partial.clone();
        let _ = fs::remove_dir_all(&partial);
        return Err(FetchError::ExecutableMissing {
            asset: asset_name.to_string(),
            dir,
            exe: expected_exe.to_string(),
        });
    }

    fs::rename(&partial, &dest)?;
    remove_sibling_versions(backend_root, version);

    Ok(dest)
}

fn remove_sibling_versions(backend_root: &Path, keep: &str) {
    let Ok(entries) = fs::read_dir(backend_root) else {
        return;
    };
    for entry in entries.flatten() {
        let name = entry.file_name();
        let Some(name) = name.to_str() else { continue };
        if name == keep || name.ends_with(".partial") {
            continue;
        }
        if entry.path().is_dir() {
            if let Err(e) = fs::remove_dir_all(entry.path()) {
                tracing::warn!(dir = ?entry.path(), error = %e, "failed to remove stale backend version");
            }
        }
    }
}

/// Find the version directory currently installed under `backend_root`, i.e.
/// the (sole, by the directory invariant) non-`.partial` subdirectory
/// containing `expected_exe`.
pub fn installed_version(backend_root: &Path, expected_exe: &str) -> Option<String> {
    let entries = fs::read_dir(backend_root).ok()?;
    for entry in entries.flatten() {
        let name = entry.file_name();
        let Some(name) = name.to_str() else { continue };
        if name.ends_with(".partial") {
            continue;
        }
        if entry.path().join(expected_exe).is_file() {
            return Some(name.to_string());
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn installed_version_picks_dir_containing_exe() {
        let root = std::env::temp_dir().join(format!(
            "lemon_fetch_test_{}",
            std::process::id()
        ));
        let v = root.join("1.2.3");
        fs::create_dir_all(&v).unwrap();
        fs::write(v.join("engine"), b"").unwrap();
        fs::create_dir_all(root.join("1.2.3.partial")).unwrap();

        assert_eq!(
            installed_version(&root, "engine"),
            Some("1.2.3".to_string())
        );

        fs::remove_dir_all(&root).ok();
    }

    #[test]
    fn installed_version_none_when_exe_missing() {
        let root = std::env::temp_dir().join(format!(
            "lemon_fetch_test_empty_{}",
            std::process::id()
        ));
        fs::create_dir_all(root.join("1.0.0")).unwrap();

        assert_eq!(installed_version(&root, "engine"), None);

        fs::remove_dir_all(&root).ok();
    }
}
