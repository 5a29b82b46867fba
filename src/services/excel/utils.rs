/// Makes a value safe to use as part of a download filename.
pub fn clean_file_stem(name: &str) -> String {
    let cleaned = name
        .trim()
        .chars()
        .map(|c| if c.is_alphanumeric() || c == '-' || c == '_' { c } else { '_' })
        .collect::<String>();

    let cleaned = cleaned.trim_matches('_');
    if cleaned.is_empty() {
        "export".to_string()
    } else {
        cleaned.to_string()
    }
}

/// `attachment` header value carrying both a plain and an RFC 5987 encoded filename.
pub fn content_disposition(filename: &str) -> String {
    let ascii: String = filename
        .chars()
        .map(|c| if c.is_ascii_graphic() && c != '"' && c != '\\' { c } else { '_' })
        .collect();
    let encoded: String = filename
        .bytes()
        .map(|b| match b {
            b'A'..=b'Z' | b'a'..=b'z' | b'0'..=b'9' | b'-' | b'_' | b'.' => (b as char).to_string(),
            _ => format!("%{:02X}", b),
        })
        .collect();

    format!("attachment; filename=\"{}\"; filename*=UTF-8''{}", ascii, encoded)
}
