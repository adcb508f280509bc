//! Where ticketmatch stores its own data (config).
//!
//! The corpus snapshot lives wherever it was built; we only remember its path here.

use std::path::PathBuf;

/// Returns the directory where ticketmatch stores its config.
/// On Linux: `~/.local/share/ticketmatch/`.
/// Creates the directory if it doesn't exist; returns `None` if we can't determine the path.
pub fn app_data_dir() -> Option<PathBuf> {
    let dir = directories::ProjectDirs::from("app", "Ticketmatch", "ticketmatch")?
        .data_local_dir()
        .to_path_buf();
    std::fs::create_dir_all(&dir).ok()?;
    Some(dir)
}
