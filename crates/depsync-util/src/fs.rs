use std::fs::{self, File};
use std::io::{self, Write};
use std::path::{Path, PathBuf};

/// Sibling temp path used while replacing `path`.
fn temp_path_for(path: &Path) -> PathBuf {
    let parent = path.parent().unwrap_or(Path::new("."));
    parent.join(format!(
        ".{}.depsync-tmp.{}",
        path.file_name().and_then(|n| n.to_str()).unwrap_or("file"),
        std::process::id()
    ))
}

/// Atomically replace a file's contents by writing a sibling temp file then renaming.
///
/// Readers observe either the old contents or the new contents, never a
/// partially written file.
///
/// # Errors
/// Returns an error if the write or rename fails. The temp file is removed on failure.
pub fn atomic_write(path: &Path, bytes: &[u8]) -> io::Result<()> {
    let temp_path = temp_path_for(path);

    let written = (|| {
        let mut file = File::create(&temp_path)?;
        file.write_all(bytes)?;
        file.sync_all()
    })();
    if let Err(e) = written {
        let _ = fs::remove_file(&temp_path);
        return Err(e);
    }

    match fs::rename(&temp_path, path) {
        Ok(()) => Ok(()),
        Err(e) => {
            // Windows refuses to rename over an existing file.
            if cfg!(windows) {
                let copied = fs::copy(&temp_path, path).map(|_| ());
                let _ = fs::remove_file(&temp_path);
                copied
            } else {
                let _ = fs::remove_file(&temp_path);
                Err(e)
            }
        }
    }
}
