//! Fallback SECRET_KEY persistence. When the variable is unset, a key
//! is generated once and cached in `.secret_key` next to the manifest
//! so restarts keep issued tokens valid.

use std::{fs, path::Path, path::PathBuf};

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use rand::rngs::OsRng;
use rand::RngCore;

pub(super) fn load_or_create_secret_key() -> String {
    let path = secret_file_path();
    if let Some(existing) = read_existing(&path) {
        return existing;
    }

    let fresh = generate_secret_key();
    if let Some(parent) = path.parent() {
        if let Err(err) = fs::create_dir_all(parent) {
            tracing::warn!(
                error = %err,
                path = %parent.display(),
                "Failed to create secret key directory"
            );
        }
    }

    // create_new loses the race to a concurrent writer; read theirs back.
    match fs::OpenOptions::new().write(true).create_new(true).open(&path) {
        Ok(mut file) => {
            restrict_permissions(&file, &path);
            if let Err(err) = std::io::Write::write_all(&mut file, fresh.as_bytes()) {
                tracing::warn!(
                    error = %err,
                    path = %path.display(),
                    "Failed to write secret key file"
                );
            }
            fresh
        }
        Err(err) if err.kind() == std::io::ErrorKind::AlreadyExists => {
            read_existing(&path).unwrap_or(fresh)
        }
        Err(err) => {
            tracing::warn!(
                error = %err,
                path = %path.display(),
                "Failed to create secret key file"
            );
            fresh
        }
    }
}

fn read_existing(path: &Path) -> Option<String> {
    let contents = fs::read_to_string(path).ok()?;
    let trimmed = contents.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}

#[cfg(unix)]
fn restrict_permissions(file: &fs::File, path: &Path) {
    use std::os::unix::fs::PermissionsExt;

    if let Err(err) = file.set_permissions(fs::Permissions::from_mode(0o600)) {
        tracing::warn!(
            error = %err,
            path = %path.display(),
            "Failed to set secret key file permissions"
        );
    }
}

#[cfg(not(unix))]
fn restrict_permissions(_file: &fs::File, _path: &Path) {}

fn generate_secret_key() -> String {
    let mut bytes = [0u8; 64];
    OsRng.fill_bytes(&mut bytes);
    URL_SAFE_NO_PAD.encode(bytes)
}

fn secret_file_path() -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR")).join(".secret_key")
}
