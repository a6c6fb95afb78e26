//! Archive fixtures built on the fly

use std::io::Write;
use std::path::{Path, PathBuf};
use tempfile::TempDir;
use walkdir::WalkDir;

/// Write a stored ZIP to `path`; names ending in '/' become directory entries.
///
/// With a password every file entry is ZipCrypto-encrypted.
pub fn write_zip(path: &Path, entries: &[(&str, &[u8])], password: Option<&str>) {
    use zip::unstable::write::FileOptionsExt;

    let file = std::fs::File::create(path).unwrap();
    let mut writer = zip::ZipWriter::new(file);
    let plain = zip::write::FileOptions::default().compression_method(zip::CompressionMethod::Stored);

    for (name, content) in entries {
        if name.ends_with('/') {
            writer.add_directory(*name, plain).unwrap();
            continue;
        }
        let options = match password {
            Some(pw) => plain.with_deprecated_encryption(pw.as_bytes()),
            None => plain,
        };
        writer.start_file(*name, options).unwrap();
        writer.write_all(content).unwrap();
    }
    writer.finish().unwrap();
}

/// Bytes of a ZIP built by [`write_zip`], for nesting inside another archive
pub fn zip_bytes(entries: &[(&str, &[u8])], password: Option<&str>) -> Vec<u8> {
    let temp = TempDir::new().unwrap();
    let path = temp.path().join("nested.zip");
    write_zip(&path, entries, password);
    std::fs::read(path).unwrap()
}

/// Write a 7z archive containing the given files (relative paths)
pub fn write_7z(path: &Path, files: &[(&str, &[u8])]) {
    let source = TempDir::new().unwrap();
    for (name, content) in files {
        let file_path = source.path().join(name);
        std::fs::create_dir_all(file_path.parent().unwrap()).unwrap();
        std::fs::write(file_path, content).unwrap();
    }
    sevenz_rust::compress_to_path(source.path(), path).unwrap();
}

/// Every path below `root`, relative and sorted, directories marked with a trailing '/'
pub fn tree(root: &Path) -> Vec<String> {
    let mut entries: Vec<String> = WalkDir::new(root)
        .min_depth(1)
        .into_iter()
        .map(|e| e.unwrap())
        .map(|e| {
            let rel: PathBuf = e.path().strip_prefix(root).unwrap().to_path_buf();
            let mut s = rel.to_string_lossy().replace('\\', "/");
            if e.file_type().is_dir() {
                s.push('/');
            }
            s
        })
        .collect();
    entries.sort();
    entries
}

/// Today's quarantine folder prefix with the default date format
pub fn today() -> String {
    chrono::Local::now().format("%Y%m%d").to_string()
}
