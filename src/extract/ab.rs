//! Android backup (`.ab`) decoding
//!
//! An `.ab` file is a short text header followed by a tar stream, zlib
//! compressed when the header says so:
//!
//! ```text
//! ANDROID BACKUP\n
//! 5\n          format version
//! 1\n          1 = zlib compressed
//! none\n       encryption ("none" or "AES-256")
//! <payload>
//! ```
//!
//! Encrypted backups need the device password and are rejected.

use std::fs::File;
use std::io::{BufRead, BufReader, Read};
use std::path::{Path, PathBuf};

use flate2::read::ZlibDecoder;
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::common::BUFFER_SIZE;
use crate::error::{ToolkitError, ToolkitResult};

/// First header line of every Android backup
pub const AB_MAGIC: &str = "ANDROID BACKUP";

/// Highest format version written by current Android releases
pub const MAX_KNOWN_VERSION: u32 = 5;

/// Parsed `.ab` header
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AbHeader {
    pub version: u32,
    pub compressed: bool,
    pub encryption: String,
}

impl AbHeader {
    pub fn is_encrypted(&self) -> bool {
        !self.encryption.eq_ignore_ascii_case("none")
    }
}

/// Outcome of decoding one backup
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DecodeSummary {
    pub header: AbHeader,
    pub output_dir: PathBuf,
    pub files: usize,
    pub bytes: u64,
    /// Entries refused by the unpacker (absolute or escaping paths)
    pub skipped: usize,
}

fn read_header_line<R: BufRead>(reader: &mut R, field: &str) -> ToolkitResult<String> {
    let mut line = String::new();
    let n = reader.read_line(&mut line).map_err(|e| {
        ToolkitError::BackupFormat(format!("cannot read {} from header: {}", field, e))
    })?;
    if n == 0 {
        return Err(ToolkitError::BackupFormat(format!(
            "truncated header: missing {}",
            field
        )));
    }
    Ok(line.trim_end_matches(['\r', '\n']).to_string())
}

/// Read the header, leaving `reader` positioned at the payload
pub fn parse_header<R: BufRead>(reader: &mut R) -> ToolkitResult<AbHeader> {
    let magic = read_header_line(reader, "magic")?;
    if magic != AB_MAGIC {
        return Err(ToolkitError::BackupFormat(
            "not an Android backup (missing 'ANDROID BACKUP' magic)".to_string(),
        ));
    }

    let version_line = read_header_line(reader, "version")?;
    let version: u32 = version_line.trim().parse().map_err(|_| {
        ToolkitError::BackupFormat(format!("invalid version '{}'", version_line))
    })?;
    if version > MAX_KNOWN_VERSION {
        warn!(version, "Android backup version newer than known formats");
    }

    let compressed = match read_header_line(reader, "compression flag")?.trim() {
        "0" => false,
        "1" => true,
        other => {
            return Err(ToolkitError::BackupFormat(format!(
                "invalid compression flag '{}'",
                other
            )))
        }
    };

    let encryption = read_header_line(reader, "encryption")?.trim().to_string();

    Ok(AbHeader {
        version,
        compressed,
        encryption,
    })
}

/// Read only the header of an `.ab` file
pub fn read_header(path: &Path) -> ToolkitResult<AbHeader> {
    let mut reader = BufReader::new(File::open(path)?);
    parse_header(&mut reader)
}

/// Decode `input` into `output_dir`, creating it if needed
pub fn decode_backup(input: &Path, output_dir: &Path) -> ToolkitResult<DecodeSummary> {
    let mut reader = BufReader::with_capacity(BUFFER_SIZE, File::open(input)?);
    let header = parse_header(&mut reader)?;
    debug!(?header, input = %input.display(), "Parsed Android backup header");

    if header.is_encrypted() {
        return Err(ToolkitError::BackupFormat(format!(
            "backup is encrypted ({}); decrypting requires the device backup password",
            header.encryption
        )));
    }

    std::fs::create_dir_all(output_dir)?;

    let payload: Box<dyn Read> = if header.compressed {
        Box::new(ZlibDecoder::new(reader))
    } else {
        Box::new(reader)
    };

    let mut archive = tar::Archive::new(payload);
    archive.set_preserve_permissions(false);
    archive.set_unpack_xattrs(false);
    archive.set_overwrite(true);

    let mut files = 0usize;
    let mut bytes = 0u64;
    let mut skipped = 0usize;

    let entries = archive
        .entries()
        .map_err(|e| ToolkitError::BackupFormat(format!("invalid tar payload: {}", e)))?;
    for entry in entries {
        let mut entry =
            entry.map_err(|e| ToolkitError::BackupFormat(format!("corrupt tar entry: {}", e)))?;
        let is_file = entry.header().entry_type().is_file();
        let size = entry.header().size().unwrap_or(0);
        let path = entry
            .path()
            .map(|p| p.display().to_string())
            .unwrap_or_default();

        let unpacked = entry.unpack_in(output_dir).map_err(|e| {
            ToolkitError::BackupFormat(format!("cannot unpack '{}': {}", path, e))
        })?;
        if !unpacked {
            warn!(entry = %path, "Skipped backup entry outside the output directory");
            skipped += 1;
        } else if is_file {
            files += 1;
            bytes += size;
        }
    }

    info!(
        input = %input.display(),
        output = %output_dir.display(),
        files,
        bytes,
        "Android backup decoded"
    );

    Ok(DecodeSummary {
        header,
        output_dir: output_dir.to_path_buf(),
        files,
        bytes,
        skipped,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use flate2::write::ZlibEncoder;
    use flate2::Compression;
    use std::io::Write;
    use tempfile::TempDir;

    fn tar_payload() -> Vec<u8> {
        let mut builder = tar::Builder::new(Vec::new());
        let mut add = |path: &str, data: &[u8]| {
            let mut header = tar::Header::new_gnu();
            header.set_size(data.len() as u64);
            header.set_mode(0o644);
            header.set_cksum();
            builder.append_data(&mut header, path, data).unwrap();
        };
        add("apps/com.whatsapp/_manifest", b"manifest");
        add("apps/com.whatsapp/db/msgstore.db", b"SQLite format 3\0");
        builder.into_inner().unwrap()
    }

    fn write_backup(dir: &Path, name: &str, compressed: bool, encryption: &str) -> PathBuf {
        let mut data = format!(
            "ANDROID BACKUP\n5\n{}\n{}\n",
            if compressed { 1 } else { 0 },
            encryption
        )
        .into_bytes();
        let payload = tar_payload();
        if compressed {
            let mut encoder = ZlibEncoder::new(Vec::new(), Compression::default());
            encoder.write_all(&payload).unwrap();
            data.extend(encoder.finish().unwrap());
        } else {
            data.extend(payload);
        }
        let path = dir.join(name);
        std::fs::write(&path, data).unwrap();
        path
    }

    #[test]
    fn test_parse_header() {
        let mut input = &b"ANDROID BACKUP\n5\n1\nnone\npayload"[..];
        let header = parse_header(&mut input).unwrap();
        assert_eq!(
            header,
            AbHeader {
                version: 5,
                compressed: true,
                encryption: "none".to_string()
            }
        );
        assert!(!header.is_encrypted());
        assert_eq!(input, b"payload");
    }

    #[test]
    fn test_parse_header_errors() {
        for bad in [
            &b"PK\x03\x04"[..],
            &b"ANDROID BACKUP\n"[..],
            &b"ANDROID BACKUP\nfive\n1\nnone\n"[..],
            &b"ANDROID BACKUP\n5\n2\nnone\n"[..],
        ] {
            let mut input = bad;
            assert!(matches!(
                parse_header(&mut input),
                Err(ToolkitError::BackupFormat(_))
            ));
        }
    }

    #[test]
    fn test_decode_compressed_backup() {
        let dir = TempDir::new().unwrap();
        let ab = write_backup(dir.path(), "full_backup.ab", true, "none");
        let out = dir.path().join("decoded");

        let summary = decode_backup(&ab, &out).unwrap();
        assert_eq!(summary.files, 2);
        assert_eq!(summary.skipped, 0);
        assert_eq!(
            std::fs::read(out.join("apps/com.whatsapp/_manifest")).unwrap(),
            b"manifest"
        );
    }

    #[test]
    fn test_decode_uncompressed_backup() {
        let dir = TempDir::new().unwrap();
        let ab = write_backup(dir.path(), "app.ab", false, "none");
        let out = dir.path().join("decoded");

        let summary = decode_backup(&ab, &out).unwrap();
        assert!(!summary.header.compressed);
        assert!(out.join("apps/com.whatsapp/db/msgstore.db").exists());
    }

    #[test]
    fn test_encrypted_backup_rejected() {
        let dir = TempDir::new().unwrap();
        let ab = write_backup(dir.path(), "enc.ab", true, "AES-256");
        let out = dir.path().join("decoded");

        let err = decode_backup(&ab, &out).unwrap_err();
        assert!(err.to_string().contains("encrypted"));
        assert!(!out.exists());
        assert!(read_header(&ab).unwrap().is_encrypted());
    }
}
