//! Recursive discovery of supported image files.

use std::path::{Path, PathBuf};

use crate::detect::is_supported;
use crate::error::DiscoverError;

/// Walk `dir` recursively and return every file with a supported image
/// extension. The returned order is whatever the filesystem yields; call
/// [`sort_for_processing`] before use.
pub fn find_image_files(dir: &Path) -> Result<Vec<PathBuf>, DiscoverError> {
    let mut found = Vec::new();
    walk(dir, &mut found)?;
    Ok(found)
}

fn walk(dir: &Path, found: &mut Vec<PathBuf>) -> Result<(), DiscoverError> {
    let read_err = |source| DiscoverError::ReadDir {
        path: dir.to_path_buf(),
        source,
    };
    for entry in std::fs::read_dir(dir).map_err(read_err)? {
        let entry = entry.map_err(read_err)?;
        let file_type = entry.file_type().map_err(read_err)?;
        let path = entry.path();
        if file_type.is_dir() {
            walk(&path, found)?;
        } else if is_supported(&path) {
            found.push(path);
        }
    }
    Ok(())
}

/// Order paths by their full path string, byte-wise. This is the processing
/// and page order of a run.
pub fn sort_for_processing(paths: &mut [PathBuf]) {
    paths.sort_by(|a, b| a.to_string_lossy().as_bytes().cmp(b.to_string_lossy().as_bytes()));
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn finds_supported_files_recursively() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path();
        std::fs::create_dir_all(root.join("nested/deeper")).unwrap();
        std::fs::write(root.join("a.JPG"), b"x").unwrap();
        std::fs::write(root.join("b.png"), b"x").unwrap();
        std::fs::write(root.join("notes.txt"), b"x").unwrap();
        std::fs::write(root.join("nested/c.Tif"), b"x").unwrap();
        std::fs::write(root.join("nested/deeper/d.webp"), b"x").unwrap();
        std::fs::write(root.join("nested/deeper/e.svg"), b"x").unwrap();

        let mut found = find_image_files(root).unwrap();
        sort_for_processing(&mut found);
        let rel: Vec<String> = found
            .iter()
            .map(|p| p.strip_prefix(root).unwrap().to_string_lossy().replace('\\', "/"))
            .collect();
        assert_eq!(rel, vec!["a.JPG", "b.png", "nested/c.Tif", "nested/deeper/d.webp"]);
    }

    #[test]
    fn missing_directory_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = find_image_files(&dir.path().join("missing")).unwrap_err();
        assert!(matches!(err, DiscoverError::ReadDir { .. }));
    }

    #[test]
    fn sort_is_bytewise_on_full_path() {
        let mut paths = vec![
            PathBuf::from("img/b.png"),
            PathBuf::from("img/B.png"),
            PathBuf::from("img/a/z.png"),
            PathBuf::from("img/a.png"),
            PathBuf::from("img/10.png"),
            PathBuf::from("img/2.png"),
        ];
        sort_for_processing(&mut paths);
        let got: Vec<_> = paths.iter().map(|p| p.to_string_lossy().into_owned()).collect();
        assert_eq!(
            got,
            vec!["img/10.png", "img/2.png", "img/B.png", "img/a.png", "img/a/z.png", "img/b.png"]
        );
    }
}
