use regex::Regex;
use std::path::{Path, PathBuf};
use std::sync::LazyLock;

pub const DEFAULT_EXPORT_FILENAME: &str = "cable-markers.csv";

// Invalid on Windows: < > : " / \ | ? * plus control characters
static INVALID_CHARS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"[<>:"/\\|?*\x00-\x1F]"#).expect("valid regex"));

static RESERVED_NAMES: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)^(CON|PRN|AUX|NUL|COM[1-9]|LPT[1-9])$").expect("valid regex"));

/// Make a user-supplied export filename safe on every platform.
pub fn sanitize_filename(name: &str) -> String {
    let sanitized = INVALID_CHARS.replace_all(name, "_");
    let sanitized = sanitized.trim_matches(|c| c == ' ' || c == '.');

    if RESERVED_NAMES.is_match(sanitized) {
        return format!("_{sanitized}");
    }
    if sanitized.is_empty() {
        DEFAULT_EXPORT_FILENAME.to_string()
    } else {
        sanitized.to_string()
    }
}

/// Where an export lands.
///
/// An explicit `output` wins (a directory gets the default filename inside
/// it); otherwise `filename` is placed in `export_dir`. A missing `.csv`
/// extension is appended.
pub fn resolve_export_path(export_dir: &Path, filename: &str, output: Option<&Path>) -> PathBuf {
    let path = match output {
        Some(out) if out.is_dir() => out.join(DEFAULT_EXPORT_FILENAME),
        Some(out) => out.to_path_buf(),
        None => export_dir.join(sanitize_filename(filename)),
    };
    with_csv_extension(path)
}

fn with_csv_extension(path: PathBuf) -> PathBuf {
    let has_csv = path
        .extension()
        .is_some_and(|ext| ext.eq_ignore_ascii_case("csv"));
    if has_csv {
        return path;
    }
    let mut raw = path.into_os_string();
    raw.push(".csv");
    PathBuf::from(raw)
}
