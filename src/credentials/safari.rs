//! Reader for Safari's `Cookies.binarycookies` file.
//!
//! Layout: `cook` magic, big-endian page count and page sizes, then pages.
//! Each page holds little-endian cookie offsets; each cookie record holds
//! offsets to NUL-terminated url/name/path/value strings.

use super::{home_dir, pick_tokens, BrowserCookies};
use crate::error::CookieError;
use std::path::PathBuf;

const MAGIC: &[u8; 4] = b"cook";
const PAGE_HEADER: [u8; 4] = [0x00, 0x00, 0x01, 0x00];
const RECORD_HEADER_LEN: usize = 56;

#[derive(Debug, Clone, PartialEq)]
pub struct SafariCookie {
    pub domain: String,
    pub name: String,
    pub path: String,
    pub value: String,
    /// Seconds since the Unix epoch.
    pub expires: f64,
}

/// Mac absolute time starts 2001-01-01.
const MAC_EPOCH_OFFSET: f64 = 978_307_200.0;

pub fn read_cookies() -> Result<BrowserCookies, CookieError> {
    if !cfg!(target_os = "macos") {
        return Err(CookieError::Unsupported("Safari"));
    }
    let path = cookie_file()?;
    let data = std::fs::read(&path)?;
    let cookies = parse_binary_cookies(&data)?;

    let rows = cookies
        .into_iter()
        .map(|c| (c.domain, c.name, c.value));
    let (auth_token, ct0) = pick_tokens(rows)?;
    Ok(BrowserCookies {
        auth_token,
        ct0,
        label: "Safari".to_string(),
    })
}

fn cookie_file() -> Result<PathBuf, CookieError> {
    let home = home_dir()?;
    let candidates = [
        home.join("Library/Containers/com.apple.Safari/Data/Library/Cookies/Cookies.binarycookies"),
        home.join("Library/Cookies/Cookies.binarycookies"),
    ];
    candidates
        .iter()
        .find(|p| p.exists())
        .cloned()
        .ok_or_else(|| CookieError::NotFound(candidates[0].display().to_string()))
}

fn malformed(msg: &str) -> CookieError {
    CookieError::Malformed(msg.to_string())
}

fn be_u32(data: &[u8], at: usize) -> Result<u32, CookieError> {
    at.checked_add(4)
        .and_then(|end| data.get(at..end))
        .map(|b| u32::from_be_bytes([b[0], b[1], b[2], b[3]]))
        .ok_or_else(|| malformed("truncated header"))
}

fn le_u32(data: &[u8], at: usize) -> Result<u32, CookieError> {
    at.checked_add(4)
        .and_then(|end| data.get(at..end))
        .map(|b| u32::from_le_bytes([b[0], b[1], b[2], b[3]]))
        .ok_or_else(|| malformed("truncated page"))
}

fn le_f64(data: &[u8], at: usize) -> Result<f64, CookieError> {
    data.get(at..at + 8)
        .map(|b| {
            let mut buf = [0u8; 8];
            buf.copy_from_slice(b);
            f64::from_le_bytes(buf)
        })
        .ok_or_else(|| malformed("truncated cookie record"))
}

fn c_string(record: &[u8], offset: u32) -> Result<String, CookieError> {
    let start = offset as usize;
    let rest = record
        .get(start..)
        .ok_or_else(|| malformed("string offset out of range"))?;
    let end = rest.iter().position(|b| *b == 0).unwrap_or(rest.len());
    Ok(String::from_utf8_lossy(&rest[..end]).into_owned())
}

pub fn parse_binary_cookies(data: &[u8]) -> Result<Vec<SafariCookie>, CookieError> {
    if data.get(..4) != Some(&MAGIC[..]) {
        return Err(malformed("missing 'cook' magic"));
    }

    let page_count = be_u32(data, 4)? as usize;
    let header_len = page_count
        .checked_mul(4)
        .and_then(|n| n.checked_add(8))
        .filter(|&n| n <= data.len())
        .ok_or_else(|| malformed("page count exceeds file size"))?;
    let page_sizes = (0..page_count)
        .map(|i| be_u32(data, 8 + i * 4).map(|n| n as usize))
        .collect::<Result<Vec<_>, _>>()?;

    let mut cursor = header_len;
    let mut cookies = Vec::new();
    for size in page_sizes {
        let page = cursor
            .checked_add(size)
            .and_then(|end| data.get(cursor..end))
            .ok_or_else(|| malformed("page extends past end of file"))?;
        parse_page(page, &mut cookies)?;
        cursor += size;
    }
    Ok(cookies)
}

fn parse_page(page: &[u8], out: &mut Vec<SafariCookie>) -> Result<(), CookieError> {
    if page.get(..4) != Some(&PAGE_HEADER[..]) {
        return Err(malformed("bad page header"));
    }
    let count = le_u32(page, 4)? as usize;
    let offsets_end = count.checked_mul(4).and_then(|n| n.checked_add(8));
    if !matches!(offsets_end, Some(end) if end <= page.len()) {
        return Err(malformed("cookie count exceeds page size"));
    }
    for i in 0..count {
        let offset = le_u32(page, 8 + i * 4)? as usize;
        let size = le_u32(page, offset)? as usize;
        let record = offset
            .checked_add(size)
            .and_then(|end| page.get(offset..end))
            .ok_or_else(|| malformed("cookie record extends past page"))?;
        if record.len() < RECORD_HEADER_LEN {
            return Err(malformed("cookie record too short"));
        }
        out.push(SafariCookie {
            domain: c_string(record, le_u32(record, 16)?)?,
            name: c_string(record, le_u32(record, 20)?)?,
            path: c_string(record, le_u32(record, 24)?)?,
            value: c_string(record, le_u32(record, 28)?)?,
            expires: le_f64(record, 40)? + MAC_EPOCH_OFFSET,
        });
    }
    Ok(())
}
