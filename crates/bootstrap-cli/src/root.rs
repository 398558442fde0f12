use anyhow::Context;
use bootstrap_core::paths;
use std::path::{Component, Path, PathBuf};

/// Resolve the project root.
///
/// Priority:
/// 1. `--root` flag / `BOOTSTRAP_ROOT` env var (passed in as `explicit`)
/// 2. Walk upward from `cwd` looking for `.env.example` or `requirements.txt`
/// 3. Walk upward from `cwd` looking for `.git/`
/// 4. Fall back to `cwd`
///
/// The result is absolute: child processes run with their own working
/// directory, so a relative root would resolve differently inside them.
pub fn resolve_root(explicit: Option<&Path>) -> anyhow::Result<PathBuf> {
    let cwd = std::env::current_dir().context("failed to read the current directory")?;
    Ok(match explicit {
        Some(p) => absolute_from(&cwd, p),
        None => resolve_from(&cwd),
    })
}

/// `path` made absolute against `cwd`, with `.` components dropped.
fn absolute_from(cwd: &Path, path: &Path) -> PathBuf {
    cwd.join(path)
        .components()
        .filter(|c| !matches!(c, Component::CurDir))
        .collect()
}

fn resolve_from(cwd: &Path) -> PathBuf {
    let is_project = |dir: &Path| {
        dir.join(paths::CONFIG_TEMPLATE).is_file() || dir.join(paths::MANIFEST_FILE).is_file()
    };
    if let Some(dir) = cwd.ancestors().find(|d| is_project(*d)) {
        return dir.to_path_buf();
    }
    if let Some(dir) = cwd.ancestors().find(|d| d.join(".git").is_dir()) {
        return dir.to_path_buf();
    }
    cwd.to_path_buf()
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn explicit_root_wins() {
        let dir = TempDir::new().unwrap();
        let result = resolve_root(Some(dir.path())).unwrap();
        assert_eq!(result, dir.path());
    }

    #[cfg(unix)]
    #[test]
    fn relative_explicit_root_is_made_absolute() {
        let cwd = Path::new("/work/tutorials");
        assert_eq!(
            absolute_from(cwd, Path::new("proj")),
            PathBuf::from("/work/tutorials/proj")
        );
        assert_eq!(
            absolute_from(cwd, Path::new("./proj")),
            PathBuf::from("/work/tutorials/proj")
        );
        assert_eq!(
            absolute_from(cwd, Path::new("/elsewhere")),
            PathBuf::from("/elsewhere")
        );
    }

    #[test]
    fn finds_manifest_above_cwd() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join("requirements.txt"), "galileo\n").unwrap();
        let deep = dir.path().join("getting_started/rag");
        std::fs::create_dir_all(&deep).unwrap();

        assert_eq!(resolve_from(&deep), dir.path());
    }

    #[test]
    fn project_files_beat_git_dir() {
        let dir = TempDir::new().unwrap();
        std::fs::create_dir_all(dir.path().join(".git")).unwrap();
        let tutorial = dir.path().join("tutorial");
        std::fs::create_dir_all(&tutorial).unwrap();
        std::fs::write(tutorial.join(".env.example"), "").unwrap();

        assert_eq!(resolve_from(&tutorial), tutorial);
    }

    #[test]
    fn falls_back_to_git_dir() {
        let dir = TempDir::new().unwrap();
        std::fs::create_dir_all(dir.path().join(".git")).unwrap();
        let sub = dir.path().join("docs");
        std::fs::create_dir_all(&sub).unwrap();

        assert_eq!(resolve_from(&sub), dir.path());
    }
}
