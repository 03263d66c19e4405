use flate2::read::GzDecoder;
use iota_core::{IotaError, Result};
use std::fs::File;
use std::io::Read;
use std::path::Path;

fn is_gzip(path: &Path) -> bool {
    path.extension().and_then(|e| e.to_str()) == Some("gz")
}

/// Extension of the file once a trailing `.gz` is stripped, lowercased.
pub(crate) fn logical_extension(path: &Path) -> Option<String> {
    let inner = if is_gzip(path) {
        Path::new(path.file_stem()?)
    } else {
        path
    };
    inner
        .extension()
        .and_then(|e| e.to_str())
        .map(str::to_ascii_lowercase)
}

/// File name once a trailing `.gz` is stripped.
pub(crate) fn logical_file_name(path: &Path) -> Option<&str> {
    if is_gzip(path) {
        path.file_stem().and_then(|s| s.to_str())
    } else {
        path.file_name().and_then(|s| s.to_str())
    }
}

/// Read a whole file, transparently inflating `.gz` files.
pub(crate) fn read_bytes(path: &Path) -> Result<Vec<u8>> {
    if !path.exists() {
        return Err(IotaError::ModelLoad(format!(
            "File not found: {}",
            path.display()
        )));
    }

    if !is_gzip(path) {
        return std::fs::read(path)
            .map_err(|e| IotaError::ModelLoad(format!("Failed to read {}: {e}", path.display())));
    }

    let file = File::open(path)
        .map_err(|e| IotaError::ModelLoad(format!("Failed to open {}: {e}", path.display())))?;
    let mut out = Vec::new();
    GzDecoder::new(file)
        .read_to_end(&mut out)
        .map_err(|e| IotaError::ModelLoad(format!("Failed to decode gzip: {e}")))?;
    Ok(out)
}

/// Read a UTF-8 text file, transparently inflating `.gz` files.
pub(crate) fn read_text(path: &Path) -> Result<String> {
    String::from_utf8(read_bytes(path)?)
        .map_err(|e| IotaError::ModelLoad(format!("Failed to decode UTF-8: {e}")))
}
