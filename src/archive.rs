//! Packs `updated.csv` and the downloaded images into one in-memory zip.

use std::fs;
use std::io::{Cursor, Write};
use std::path::Path;

use image::ImageFormat;
use tracing::debug;
use walkdir::WalkDir;
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipWriter};

use crate::error::ArchiveError;
use crate::table::Table;

/// File name offered when the user saves the archive.
pub const ARCHIVE_NAME: &str = "results.zip";
/// Name of the rewritten table, both on disk and inside the archive.
pub const TABLE_ENTRY: &str = "updated.csv";

/// True for `.jpg`, `.jpeg`, `.png`, `.gif` and `.webp`, in any case.
pub fn is_image_file(name: &str) -> bool {
    matches!(
        ImageFormat::from_path(name),
        Ok(ImageFormat::Jpeg | ImageFormat::Png | ImageFormat::Gif | ImageFormat::WebP)
    )
}

/// Writes `updated.csv` into `dir` and returns a zip holding it (first) and
/// every image file directly inside `dir`, in name order.
pub fn build_archive(table: &Table, dir: &Path) -> Result<Vec<u8>, ArchiveError> {
    let csv_path = dir.join(TABLE_ENTRY);
    table.write_csv(&csv_path)?;
    let csv_bytes = fs::read(&csv_path).map_err(|source| ArchiveError::Io {
        path: csv_path.clone(),
        source,
    })?;

    let options = SimpleFileOptions::default().compression_method(CompressionMethod::Deflated);
    let mut zip = ZipWriter::new(Cursor::new(Vec::new()));
    zip.start_file(TABLE_ENTRY, options)?;
    zip.write_all(&csv_bytes).map_err(|source| ArchiveError::Io {
        path: csv_path,
        source,
    })?;

    for entry in WalkDir::new(dir)
        .min_depth(1)
        .max_depth(1)
        .sort_by_file_name()
    {
        let entry = entry?;
        if !entry.file_type().is_file() {
            continue;
        }
        let Some(name) = entry.file_name().to_str() else {
            continue;
        };
        if name == TABLE_ENTRY || !is_image_file(name) {
            continue;
        }

        let bytes = fs::read(entry.path()).map_err(|source| ArchiveError::Io {
            path: entry.path().to_path_buf(),
            source,
        })?;
        zip.start_file(name, options)?;
        zip.write_all(&bytes).map_err(|source| ArchiveError::Io {
            path: entry.path().to_path_buf(),
            source,
        })?;
        debug!(file = name, bytes = bytes.len(), "added to archive");
    }

    Ok(zip.finish()?.into_inner())
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::io::Read;
    use zip::ZipArchive;

    #[test]
    fn recognises_image_extensions() {
        for name in ["a.jpg", "a.JPEG", "a.png", "a.Gif", "a.webp"] {
            assert!(is_image_file(name), "{name}");
        }
        for name in ["updated.csv", "notes.txt", "a.bmp", "jpg", "a.jpg.part"] {
            assert!(!is_image_file(name), "{name}");
        }
    }

    #[test]
    fn archive_holds_table_first_then_images() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("red apple.jpg"), b"jpg-bytes").unwrap();
        fs::write(dir.path().join("Blue.PNG"), b"png-bytes").unwrap();
        fs::write(dir.path().join("notes.txt"), b"ignore me").unwrap();
        fs::create_dir(dir.path().join("nested.jpg")).unwrap();

        let mut table = Table::parse(b"description\nred apple\nblue\n").unwrap();
        table.rows[0].set_image("red apple.jpg");
        table.rows[1].set_image("Blue.PNG");

        let bytes = build_archive(&table, dir.path()).unwrap();
        let mut zip = ZipArchive::new(Cursor::new(bytes)).unwrap();
        let names: Vec<String> = (0..zip.len())
            .map(|i| zip.by_index(i).unwrap().name().to_string())
            .collect();
        assert_eq!(names, vec!["updated.csv", "Blue.PNG", "red apple.jpg"]);

        let mut csv = String::new();
        zip.by_name(TABLE_ENTRY).unwrap().read_to_string(&mut csv).unwrap();
        assert_eq!(csv, "description,image\nred apple,red apple.jpg\nblue,Blue.PNG\n");

        let mut img = Vec::new();
        zip.by_name("red apple.jpg").unwrap().read_to_end(&mut img).unwrap();
        assert_eq!(img, b"jpg-bytes");

        assert!(dir.path().join(TABLE_ENTRY).exists());
    }

    #[test]
    fn missing_dir_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let gone = dir.path().join("never-created");
        let table = Table::parse(b"description\nkite\n").unwrap();
        assert!(matches!(
            build_archive(&table, &gone),
            Err(ArchiveError::Io { .. })
        ));
    }
}
