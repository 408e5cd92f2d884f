use super::{home_dir, open_immutable, pick_tokens, BrowserCookies};
use crate::error::CookieError;
use std::path::{Path, PathBuf};

pub fn read_cookies(profile: Option<&str>) -> Result<BrowserCookies, CookieError> {
    let profiles_dir = profiles_dir()?;
    let profile_dir = select_profile(&profiles_dir, profile)?;
    let db_path = profile_dir.join("cookies.sqlite");
    if !db_path.exists() {
        return Err(CookieError::NotFound(db_path.display().to_string()));
    }

    let rows = read_rows(&db_path)?;
    let (auth_token, ct0) = pick_tokens(rows)?;

    let name = profile_dir
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_default();
    Ok(BrowserCookies {
        auth_token,
        ct0,
        label: format!("Firefox {} profile", name),
    })
}

fn read_rows(db_path: &Path) -> Result<Vec<(String, String, String)>, CookieError> {
    let conn = open_immutable(db_path)?;
    let mut stmt = conn.prepare(
        "SELECT host, name, value FROM moz_cookies WHERE name IN ('auth_token', 'ct0')",
    )?;
    let rows = stmt
        .query_map([], |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?)))?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(rows)
}

fn profiles_dir() -> Result<PathBuf, CookieError> {
    let home = home_dir()?;
    let dir = if cfg!(target_os = "macos") {
        home.join("Library/Application Support/Firefox/Profiles")
    } else {
        home.join(".mozilla/firefox")
    };
    if dir.is_dir() {
        Ok(dir)
    } else {
        Err(CookieError::NotFound(dir.display().to_string()))
    }
}

/// A configured name matches by substring; otherwise prefer `*.default-release`.
fn select_profile(profiles_dir: &Path, wanted: Option<&str>) -> Result<PathBuf, CookieError> {
    let mut profiles: Vec<PathBuf> = std::fs::read_dir(profiles_dir)?
        .filter_map(|entry| entry.ok())
        .map(|entry| entry.path())
        .filter(|path| path.join("cookies.sqlite").exists())
        .collect();
    profiles.sort();

    let file_name = |p: &PathBuf| {
        p.file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_default()
    };

    let chosen = match wanted {
        Some(wanted) => profiles.iter().find(|p| file_name(p).contains(wanted)),
        None => profiles
            .iter()
            .find(|p| file_name(p).contains("default-release"))
            .or_else(|| profiles.first()),
    };

    chosen.cloned().ok_or(CookieError::NoProfile("Firefox"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use rusqlite::Connection;
    use std::fs;
    use tempfile::tempdir;

    fn make_profile(root: &Path, name: &str, rows: &[(&str, &str, &str)]) -> PathBuf {
        let dir = root.join(name);
        fs::create_dir_all(&dir).unwrap();
        let conn = Connection::open(dir.join("cookies.sqlite")).unwrap();
        conn.execute_batch(
            "CREATE TABLE moz_cookies (id INTEGER PRIMARY KEY, host TEXT, name TEXT, value TEXT);",
        )
        .unwrap();
        for (host, name, value) in rows {
            conn.execute(
                "INSERT INTO moz_cookies (host, name, value) VALUES (?1, ?2, ?3)",
                [host, name, value],
            )
            .unwrap();
        }
        dir
    }

    #[test]
    fn test_prefers_default_release_profile() {
        let root = tempdir().unwrap();
        make_profile(root.path(), "aaaa.default", &[]);
        let release = make_profile(root.path(), "bbbb.default-release", &[]);
        assert_eq!(select_profile(root.path(), None).unwrap(), release);
    }

    #[test]
    fn test_named_profile_matches_substring() {
        let root = tempdir().unwrap();
        let work = make_profile(root.path(), "cccc.work", &[]);
        make_profile(root.path(), "dddd.default-release", &[]);
        assert_eq!(select_profile(root.path(), Some("work")).unwrap(), work);
        assert!(matches!(
            select_profile(root.path(), Some("missing")),
            Err(CookieError::NoProfile(_))
        ));
    }

    #[test]
    fn test_reads_tokens_from_moz_cookies() {
        let root = tempdir().unwrap();
        let dir = make_profile(
            root.path(),
            "eeee.default-release",
            &[
                (".x.com", "auth_token", "ff-auth"),
                (".x.com", "ct0", "ff-ct0"),
                (".x.com", "guest_id", "ignored"),
            ],
        );
        let rows = read_rows(&dir.join("cookies.sqlite")).unwrap();
        assert_eq!(
            pick_tokens(rows).unwrap(),
            ("ff-auth".to_string(), "ff-ct0".to_string())
        );
    }
}
