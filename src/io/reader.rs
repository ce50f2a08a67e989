//! File reading utilities, including the path-containment and
//! extension checks backing the File Reader tool (§4.4).

use std::fs::File;
use std::io::Read;
use std::path::{Path, PathBuf};

use crate::error::{IoError, Result};

/// Maximum file size to read into memory (1GB).
const MAX_FILE_SIZE: u64 = 1024 * 1024 * 1024;

/// A file opened for reading, with its size cached.
///
/// # Examples
///
/// ```no_run
/// use mission_rs::io::FileReader;
///
/// let reader = FileReader::open("notes.md").unwrap();
/// let content = reader.read_to_string().unwrap();
/// ```
pub struct FileReader {
    /// File handle.
    file: File,
    /// File size in bytes.
    size: u64,
    /// File path for error messages.
    path: String,
}

impl FileReader {
    /// Opens a file for reading.
    ///
    /// # Errors
    ///
    /// Returns an error if the file doesn't exist, can't be opened, or
    /// exceeds the maximum readable size.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path_ref = path.as_ref();
        let path_str = path_ref.to_string_lossy().to_string();

        if !path_ref.exists() {
            return Err(IoError::FileNotFound { path: path_str }.into());
        }

        let file = File::open(path_ref).map_err(|e| IoError::ReadFailed {
            path: path_str.clone(),
            reason: e.to_string(),
        })?;

        let metadata = file.metadata().map_err(|e| IoError::ReadFailed {
            path: path_str.clone(),
            reason: e.to_string(),
        })?;

        let size = metadata.len();

        if size > MAX_FILE_SIZE {
            return Err(IoError::ReadFailed {
                path: path_str,
                reason: format!("file too large: {size} bytes (max: {MAX_FILE_SIZE} bytes)"),
            }
            .into());
        }

        Ok(Self {
            file,
            size,
            path: path_str,
        })
    }

    /// Returns the file size in bytes.
    #[must_use]
    pub const fn size(&self) -> u64 {
        self.size
    }

    /// Returns the file path.
    #[must_use]
    pub fn path(&self) -> &str {
        &self.path
    }

    /// Reads the file content as a string.
    ///
    /// # Errors
    ///
    /// Returns an error if reading fails or content is not valid UTF-8.
    pub fn read_to_string(&self) -> Result<String> {
        let bytes = self.read_to_bytes()?;
        String::from_utf8(bytes).map_err(|e| {
            IoError::ReadFailed {
                path: self.path.clone(),
                reason: format!("invalid UTF-8: {e}"),
            }
            .into()
        })
    }

    /// Reads the file content as bytes.
    ///
    /// # Errors
    ///
    /// Returns an error if reading fails.
    #[allow(clippy::cast_possible_truncation)]
    pub fn read_to_bytes(&self) -> Result<Vec<u8>> {
        let mut file = &self.file;
        let mut buffer = Vec::with_capacity(self.size as usize);
        file.read_to_end(&mut buffer)
            .map_err(|e| IoError::ReadFailed {
                path: self.path.clone(),
                reason: e.to_string(),
            })?;
        Ok(buffer)
    }
}

/// Reads a file to string.
///
/// # Errors
///
/// Returns an error if the file cannot be read or is not valid UTF-8.
///
/// # Examples
///
/// ```no_run
/// use mission_rs::io::read_file;
///
/// let content = read_file("example.txt").unwrap();
/// ```
pub fn read_file<P: AsRef<Path>>(path: P) -> Result<String> {
    FileReader::open(path)?.read_to_string()
}

/// Writes content to a file, creating parent directories if needed.
///
/// # Errors
///
/// Returns an error if directory creation or file writing fails.
pub fn write_file<P: AsRef<Path>>(path: P, content: &str) -> Result<()> {
    let path_ref = path.as_ref();
    let path_str = path_ref.to_string_lossy().to_string();

    if let Some(parent) = path_ref.parent()
        && !parent.exists()
    {
        std::fs::create_dir_all(parent).map_err(|e| IoError::DirectoryFailed {
            path: parent.to_string_lossy().to_string(),
            reason: e.to_string(),
        })?;
    }

    std::fs::write(path_ref, content).map_err(|e| IoError::WriteFailed {
        path: path_str,
        reason: e.to_string(),
    })?;

    Ok(())
}

/// Writes chunks to individual files in a directory.
///
/// # Errors
///
/// Returns an error if directory creation or file writing fails.
pub fn write_chunks<'a, P, I>(out_dir: P, chunks: I, prefix: &str) -> Result<Vec<String>>
where
    P: AsRef<Path>,
    I: Iterator<Item = (usize, &'a str)>,
{
    let out_path = out_dir.as_ref();
    let out_str = out_path.to_string_lossy().to_string();

    if !out_path.exists() {
        std::fs::create_dir_all(out_path).map_err(|e| IoError::DirectoryFailed {
            path: out_str.clone(),
            reason: e.to_string(),
        })?;
    }

    let mut paths = Vec::new();

    for (index, content) in chunks {
        let filename = format!("{prefix}_{index:04}.txt");
        let file_path = out_path.join(&filename);
        let file_str = file_path.to_string_lossy().to_string();

        std::fs::write(&file_path, content).map_err(|e| IoError::WriteFailed {
            path: file_str.clone(),
            reason: e.to_string(),
        })?;

        paths.push(file_str);
    }

    Ok(paths)
}

/// Validates that `path`'s containing directory lies within
/// `allowed_base`, backing the File Reader tool's path-containment
/// check (§4.4).
///
/// Symlinks are traversed when resolving the containing directory (so a
/// symlinked subdirectory inside the allowed base is accepted), but only
/// the *containing directory* is canonicalized and checked — the final
/// path component is not required to exist or be resolved, matching the
/// spec's "symlinks traversed but only the link's containing directory
/// is validated".
///
/// # Errors
///
/// Returns [`IoError::PathTraversal`] if the containing directory cannot
/// be resolved or resolves outside `allowed_base`.
pub fn validate_containment(path: &Path, allowed_base: &Path) -> Result<PathBuf> {
    let path_str = path.to_string_lossy().to_string();

    let parent = path
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."));

    let canonical_parent = parent
        .canonicalize()
        .map_err(|_| IoError::PathTraversal { path: path_str.clone() })?;
    let canonical_base = allowed_base
        .canonicalize()
        .map_err(|_| IoError::PathTraversal { path: path_str.clone() })?;

    if !canonical_parent.starts_with(&canonical_base) {
        return Err(IoError::PathTraversal { path: path_str }.into());
    }

    Ok(path.to_path_buf())
}

/// Validates that `path`'s extension is one of `allowed` (case-insensitive,
/// without leading dots), backing the File Reader tool's extension guard.
///
/// # Errors
///
/// Returns [`IoError::UnsupportedExtension`] if the extension is missing
/// or not in `allowed`.
pub fn validate_extension(path: &Path, allowed: &[&str]) -> Result<()> {
    let ext = path.extension().and_then(|e| e.to_str()).unwrap_or("");
    if allowed.iter().any(|a| a.eq_ignore_ascii_case(ext)) {
        Ok(())
    } else {
        Err(IoError::UnsupportedExtension {
            path: path.to_string_lossy().to_string(),
        }
        .into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_read_small_file() {
        let temp_dir = TempDir::new().unwrap();
        let file_path = temp_dir.path().join("small.txt");
        std::fs::write(&file_path, "Hello, world!").unwrap();

        let content = read_file(&file_path).unwrap();
        assert_eq!(content, "Hello, world!");
    }

    #[test]
    fn test_read_nonexistent_file() {
        let result = read_file("/nonexistent/path/file.txt");
        assert!(result.is_err());
    }

    #[test]
    fn test_file_reader_size() {
        let temp_dir = TempDir::new().unwrap();
        let file_path = temp_dir.path().join("test.txt");
        std::fs::write(&file_path, "Hello").unwrap();

        let reader = FileReader::open(&file_path).unwrap();
        assert_eq!(reader.size(), 5);
    }

    #[test]
    fn test_file_reader_path() {
        let temp_dir = TempDir::new().unwrap();
        let file_path = temp_dir.path().join("test.txt");
        std::fs::write(&file_path, "Hello").unwrap();

        let reader = FileReader::open(&file_path).unwrap();
        assert!(reader.path().contains("test.txt"));
    }

    #[test]
    fn test_write_file() {
        let temp_dir = TempDir::new().unwrap();
        let file_path = temp_dir.path().join("subdir/output.txt");

        write_file(&file_path, "Test content").unwrap();

        let content = std::fs::read_to_string(&file_path).unwrap();
        assert_eq!(content, "Test content");
    }

    #[test]
    fn test_write_chunks() {
        let temp_dir = TempDir::new().unwrap();
        let out_dir = temp_dir.path().join("chunks");

        let chunks = vec![(0, "First chunk"), (1, "Second chunk")];
        let paths = write_chunks(&out_dir, chunks.into_iter(), "chunk").unwrap();

        assert_eq!(paths.len(), 2);

        let content0 = std::fs::read_to_string(&paths[0]).unwrap();
        let content1 = std::fs::read_to_string(&paths[1]).unwrap();
        assert_eq!(content0, "First chunk");
        assert_eq!(content1, "Second chunk");
    }

    #[test]
    fn test_read_utf8_file() {
        let temp_dir = TempDir::new().unwrap();
        let file_path = temp_dir.path().join("unicode.txt");
        std::fs::write(&file_path, "Hello, 世界! 🌍").unwrap();

        let content = read_file(&file_path).unwrap();
        assert_eq!(content, "Hello, 世界! 🌍");
    }

    #[test]
    fn test_read_invalid_utf8() {
        let temp_dir = TempDir::new().unwrap();
        let file_path = temp_dir.path().join("invalid.bin");
        std::fs::write(&file_path, [0xff, 0xfe, 0x00, 0x01]).unwrap();

        let reader = FileReader::open(&file_path).unwrap();
        let result = reader.read_to_string();
        assert!(result.is_err());
    }

    #[test]
    fn test_validate_containment_allows_nested_path() {
        let temp_dir = TempDir::new().unwrap();
        let nested = temp_dir.path().join("docs");
        std::fs::create_dir_all(&nested).unwrap();
        let file_path = nested.join("report.md");
        std::fs::write(&file_path, "content").unwrap();

        let result = validate_containment(&file_path, temp_dir.path());
        assert!(result.is_ok());
    }

    #[test]
    fn test_validate_containment_rejects_escape() {
        let temp_dir = TempDir::new().unwrap();
        let base = temp_dir.path().join("sandbox");
        std::fs::create_dir_all(&base).unwrap();
        let outside = temp_dir.path().join("outside.md");
        std::fs::write(&outside, "content").unwrap();

        let result = validate_containment(&outside, &base);
        assert!(result.is_err());
    }

    #[test]
    fn test_validate_containment_follows_symlinked_directory() {
        #[cfg(unix)]
        {
            let temp_dir = TempDir::new().unwrap();
            let real_dir = temp_dir.path().join("real");
            std::fs::create_dir_all(&real_dir).unwrap();
            let link_dir = temp_dir.path().join("link");
            std::os::unix::fs::symlink(&real_dir, &link_dir).unwrap();
            let file_path = link_dir.join("doc.md");
            std::fs::write(real_dir.join("doc.md"), "content").unwrap();

            let result = validate_containment(&file_path, temp_dir.path());
            assert!(result.is_ok());
        }
    }

    #[test]
    fn test_validate_extension_accepts_markdown() {
        assert!(validate_extension(Path::new("notes.md"), &["md", "txt"]).is_ok());
    }

    #[test]
    fn test_validate_extension_rejects_unknown() {
        assert!(validate_extension(Path::new("notes.exe"), &["md", "txt"]).is_err());
    }

    #[test]
    fn test_validate_extension_rejects_missing() {
        assert!(validate_extension(Path::new("notes"), &["md"]).is_err());
    }
}
