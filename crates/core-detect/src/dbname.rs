//! Database file naming.

/// Make a string safe for use inside a database file name: each unsafe
/// character becomes `_`, runs collapse, edges trim, and the result is
/// lower-cased.
pub fn sanitize(part: &str) -> String {
    const UNSAFE: &[char] = &['/', '\\', ':', '*', '?', '"', '<', '>', '|', ' ', '.'];
    let mut out = String::with_capacity(part.len());
    for ch in part.chars() {
        if UNSAFE.contains(&ch) {
            if !out.ends_with('_') {
                out.push('_');
            }
        } else {
            out.push(ch.to_ascii_lowercase());
        }
    }
    out.trim_matches('_').to_string()
}

/// `<host>_<port>_<game>.db`, each part sanitized.
pub fn database_name(host: &str, port: u16, game: &str) -> String {
    format!(
        "{}_{}_{}.db",
        sanitize(host),
        sanitize(&port.to_string()),
        sanitize(game)
    )
}
