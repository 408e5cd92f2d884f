use super::{home_dir, open_immutable, pick_tokens, BrowserCookies};
use crate::error::CookieError;
use aes::cipher::{block_padding::Pkcs7, BlockDecryptMut, KeyIvInit};
use sha2::{Digest, Sha256};
use std::path::PathBuf;
use std::process::Command;

type Aes128CbcDec = cbc::Decryptor<aes::Aes128>;

const SALT: &[u8] = b"saltysalt";
const IV: [u8; 16] = [b' '; 16];
const DEFAULT_PROFILE: &str = "Default";

/// Chrome 130+ prepends SHA-256(host_key) to the plaintext from this schema version on.
const HASHED_HOST_DB_VERSION: i64 = 24;

pub fn read_cookies(profile: Option<&str>) -> Result<BrowserCookies, CookieError> {
    let profile = profile.unwrap_or(DEFAULT_PROFILE);
    let db_path = cookie_db_path(profile)?;
    let conn = open_immutable(&db_path)?;

    let version = db_version(&conn);
    let mut stmt = conn.prepare(
        "SELECT host_key, name, value, encrypted_value FROM cookies \
         WHERE name IN ('auth_token', 'ct0') \
         AND host_key IN ('.x.com', 'x.com', '.twitter.com', 'twitter.com')",
    )?;
    let raw: Vec<(String, String, String, Vec<u8>)> = stmt
        .query_map([], |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?, row.get(3)?)))?
        .collect::<Result<_, _>>()?;

    if raw.is_empty() {
        return Err(CookieError::Missing);
    }

    let needs_key = raw.iter().any(|(_, _, value, enc)| value.is_empty() && !enc.is_empty());
    let key = if needs_key {
        Some(derive_key(&safe_storage_password()?, pbkdf2_rounds()))
    } else {
        None
    };

    let mut rows = Vec::with_capacity(raw.len());
    for (host, name, value, encrypted) in raw {
        let value = match (&key, value.is_empty()) {
            (Some(key), true) => decrypt_value(
                &encrypted,
                key,
                &host,
                version >= HASHED_HOST_DB_VERSION,
            )?,
            _ => value,
        };
        rows.push((host, name, value));
    }

    let (auth_token, ct0) = pick_tokens(rows)?;
    Ok(BrowserCookies {
        auth_token,
        ct0,
        label: format!("Chrome {} profile", profile),
    })
}

fn cookie_db_path(profile: &str) -> Result<PathBuf, CookieError> {
    let base = chrome_user_data_dir()?;
    let profile_dir = base.join(profile);
    // Newer Chrome keeps the database under Network/
    for candidate in [profile_dir.join("Network").join("Cookies"), profile_dir.join("Cookies")] {
        if candidate.exists() {
            return Ok(candidate);
        }
    }
    Err(CookieError::NotFound(profile_dir.display().to_string()))
}

fn chrome_user_data_dir() -> Result<PathBuf, CookieError> {
    let home = home_dir()?;
    if cfg!(target_os = "macos") {
        Ok(home.join("Library/Application Support/Google/Chrome"))
    } else if cfg!(target_os = "linux") {
        Ok(home.join(".config/google-chrome"))
    } else {
        Err(CookieError::Unsupported("Chrome cookie decryption"))
    }
}

fn db_version(conn: &rusqlite::Connection) -> i64 {
    conn.query_row("SELECT value FROM meta WHERE key = 'version'", [], |row| {
        row.get::<_, String>(0)
    })
    .ok()
    .and_then(|v| v.parse().ok())
    .unwrap_or(0)
}

fn pbkdf2_rounds() -> u32 {
    if cfg!(target_os = "macos") {
        1003
    } else {
        1
    }
}

/// The secret Chrome encrypts cookie values with.
fn safe_storage_password() -> Result<Vec<u8>, CookieError> {
    if cfg!(target_os = "macos") {
        let output = Command::new("security")
            .args(["find-generic-password", "-w", "-s", "Chrome Safe Storage"])
            .output()?;
        if !output.status.success() {
            return Err(CookieError::Decrypt(
                "Keychain denied access to \"Chrome Safe Storage\"".to_string(),
            ));
        }
        Ok(trim_newline(output.stdout))
    } else {
        // GNOME keyring first, then the well-known fallback Chrome uses without a keyring
        let keyring = Command::new("secret-tool")
            .args(["lookup", "application", "chrome"])
            .output();
        match keyring {
            Ok(output) if output.status.success() && !output.stdout.is_empty() => {
                Ok(trim_newline(output.stdout))
            }
            _ => Ok(b"peanuts".to_vec()),
        }
    }
}

fn trim_newline(mut bytes: Vec<u8>) -> Vec<u8> {
    while matches!(bytes.last(), Some(b'\n' | b'\r')) {
        bytes.pop();
    }
    bytes
}

pub(crate) fn derive_key(password: &[u8], rounds: u32) -> [u8; 16] {
    let mut key = [0u8; 16];
    pbkdf2::pbkdf2_hmac::<sha1::Sha1>(password, SALT, rounds, &mut key);
    key
}

pub(crate) fn decrypt_value(
    encrypted: &[u8],
    key: &[u8; 16],
    host_key: &str,
    hashed_host: bool,
) -> Result<String, CookieError> {
    let payload = match encrypted.get(..3) {
        Some(b"v10") | Some(b"v11") => &encrypted[3..],
        _ => {
            return Err(CookieError::Decrypt(
                "unknown encryption version".to_string(),
            ))
        }
    };

    let mut buf = payload.to_vec();
    let cipher = Aes128CbcDec::new_from_slices(key, &IV)
        .map_err(|e| CookieError::Decrypt(e.to_string()))?;
    let plain = cipher
        .decrypt_padded_mut::<Pkcs7>(&mut buf)
        .map_err(|_| CookieError::Decrypt("bad padding (wrong key?)".to_string()))?;

    let plain = if hashed_host && plain.len() >= 32 {
        let digest = Sha256::digest(host_key.as_bytes());
        if plain[..32] == digest[..] {
            &plain[32..]
        } else {
            plain
        }
    } else {
        plain
    };

    String::from_utf8(plain.to_vec())
        .map_err(|_| CookieError::Decrypt("cookie value is not UTF-8".to_string()))
}
