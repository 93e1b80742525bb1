// src/repository/database.rs

//! Repository database reader
//!
//! Decodes `<repo>.db.tar.gz` style archives. Each package lives in its own
//! directory holding a `desc` file of `%FIELD%` marker lines, each followed
//! by the field's value. Only `%FILENAME%`, `%NAME%` and `%VERSION%` are
//! read.

use super::PackageRecord;
use crate::error::{Error, Result};
use flate2::read::GzDecoder;
use std::env;
use std::fs::{self, File};
use std::io::{BufReader, Read};
use std::path::Path;
use tar::Archive;
use tracing::{debug, info, warn};
use xz2::read::XzDecoder;

/// Container compression, detected from magic bytes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Compression {
    Gzip,
    Xz,
    Zstd,
    None,
}

impl Compression {
    fn detect(magic: &[u8]) -> Self {
        if magic.starts_with(&[0x1F, 0x8B]) {
            Compression::Gzip
        } else if magic.starts_with(&[0xFD, 0x37, 0x7A, 0x58, 0x5A, 0x00]) {
            Compression::Xz
        } else if magic.starts_with(&[0x28, 0xB5, 0x2F, 0xFD]) {
            Compression::Zstd
        } else {
            Compression::None
        }
    }
}

/// A recognized `desc` field
#[derive(Debug, Clone, PartialEq, Eq)]
enum DescField {
    Filename(String),
    Name(String),
    Version(String),
}

impl DescField {
    fn from_marker(marker: &str, value: &str) -> Option<Self> {
        let value = value.to_string();
        match marker {
            "%FILENAME%" => Some(DescField::Filename(value)),
            "%NAME%" => Some(DescField::Name(value)),
            "%VERSION%" => Some(DescField::Version(value)),
            _ => None,
        }
    }
}

fn is_marker(line: &str) -> bool {
    line.len() > 1 && line.starts_with('%') && line.ends_with('%')
}

/// Scan a `desc` file for the fields we care about
///
/// A field's value is the line right after its marker. Markers followed by
/// an empty line or by another marker carry no value and are skipped.
fn parse_desc(content: &str) -> Vec<DescField> {
    let lines: Vec<&str> = content.lines().map(str::trim).collect();

    lines
        .windows(2)
        .filter(|pair| !pair[1].is_empty() && !is_marker(pair[1]))
        .filter_map(|pair| DescField::from_marker(pair[0], pair[1]))
        .collect()
}

/// Assemble a record; `None` unless all three fields are present
fn record_from_fields(fields: Vec<DescField>) -> Option<PackageRecord> {
    let mut filename = None;
    let mut pkgname = None;
    let mut version = None;

    for field in fields {
        match field {
            DescField::Filename(v) => filename = Some(v),
            DescField::Name(v) => pkgname = Some(v),
            DescField::Version(v) => version = Some(v),
        }
    }

    Some(PackageRecord {
        filename: filename?,
        pkgname: pkgname?,
        version: version?,
    })
}

/// Open the database and wrap it in the right decompressor
fn open_archive(path: &Path) -> Result<Archive<Box<dyn Read>>> {
    let mut file = match File::open(path) {
        Ok(file) => file,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            return Err(Error::NotFound(path.to_path_buf()));
        }
        Err(e) => return Err(e.into()),
    };

    let mut magic = [0u8; 6];
    let read = file.read(&mut magic)?;
    if read == 0 {
        return Err(Error::ArchiveFormat {
            path: path.to_path_buf(),
            reason: "file is empty".to_string(),
        });
    }

    // Reopen rather than seek so the decoder sees the magic bytes
    let file = BufReader::new(File::open(path)?);
    let compression = Compression::detect(&magic[..read]);
    debug!("Detected {:?} compression for {}", compression, path.display());

    let reader: Box<dyn Read> = match compression {
        Compression::Gzip => Box::new(GzDecoder::new(file)),
        Compression::Xz => Box::new(XzDecoder::new(file)),
        Compression::Zstd => {
            let decoder = zstd::Decoder::new(file).map_err(|e| Error::ArchiveFormat {
                path: path.to_path_buf(),
                reason: format!("failed to create zstd decoder: {}", e),
            })?;
            Box::new(decoder)
        }
        Compression::None => Box::new(file),
    };

    Ok(Archive::new(reader))
}

/// Read a repository database into package records
///
/// The archive is unpacked into a private scratch directory that is removed
/// when this function returns, whatever the outcome. Records come back
/// ordered by package directory name. Entries missing any of the three
/// fields are dropped.
pub fn read_database(path: &Path) -> Result<Vec<PackageRecord>> {
    read_database_in(path, &env::temp_dir())
}

/// [`read_database`] with the scratch directory created under `scratch_root`
fn read_database_in(path: &Path, scratch_root: &Path) -> Result<Vec<PackageRecord>> {
    debug!("Reading repository database: {}", path.display());

    let mut archive = open_archive(path)?;
    let scratch = tempfile::Builder::new()
        .prefix("pkgsync-db-")
        .tempdir_in(scratch_root)?;

    archive
        .unpack(scratch.path())
        .map_err(|e| Error::ArchiveFormat {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;

    let mut entries = Vec::new();
    for entry in fs::read_dir(scratch.path())? {
        let entry = entry?;
        if entry.file_type()?.is_dir() {
            entries.push(entry.path());
        }
    }
    entries.sort();

    let mut records = Vec::new();
    for dir in entries {
        let desc_path = dir.join("desc");
        if !desc_path.is_file() {
            continue;
        }

        let content = fs::read(&desc_path)?;
        let content = String::from_utf8_lossy(&content);

        match record_from_fields(parse_desc(&content)) {
            Some(record) => records.push(record),
            None => debug!(
                "Skipping incomplete entry {}",
                dir.file_name().unwrap_or_default().to_string_lossy()
            ),
        }
    }

    info!(
        "Read {} package(s) from {}",
        records.len(),
        path.display()
    );
    Ok(records)
}

/// Like [`read_database`], but a missing database is an empty repository
///
/// This is the first-run case for a destination or remote that has never
/// been published. Any other failure is still returned.
pub fn read_database_or_empty(path: &Path) -> Result<Vec<PackageRecord>> {
    match read_database(path) {
        Err(Error::NotFound(missing)) => {
            warn!(
                "Database {} does not exist; treating it as empty (first run?)",
                missing.display()
            );
            Ok(Vec::new())
        }
        other => other,
    }
}
