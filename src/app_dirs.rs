use directories::ProjectDirs;
use std::path::{Path, PathBuf};

/// Centralized application directory resolution
pub struct AppDirs;

impl AppDirs {
    pub fn config_path() -> Option<PathBuf> {
        ProjectDirs::from("", "", "pentrace").map(|proj_dirs| proj_dirs.config_dir().join("config.json"))
    }

    /// `dir` followed by every ancestor up to the filesystem root.
    pub fn ancestors(dir: &Path) -> Vec<PathBuf> {
        dir.ancestors().map(Path::to_path_buf).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ancestors_end_at_root() {
        let roots = AppDirs::ancestors(Path::new("/a/b/c"));
        assert_eq!(
            roots,
            vec![
                PathBuf::from("/a/b/c"),
                PathBuf::from("/a/b"),
                PathBuf::from("/a"),
                PathBuf::from("/"),
            ]
        );
    }
}
