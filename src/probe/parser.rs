// Field and list extraction over "name : value" pseudo-file content (e.g. /proc/cpuinfo)
// All scanning works on raw bytes and stays within the buffer

/// Value of the first line that starts with `field`
///
/// The field name must start a line (buffer start or right after '\n') and be
/// followed, on the same line, by optional spaces/tabs and a ':'. The colon
/// must be followed by a space; the value is the rest of the line after that
/// single space, copied as is.
///
/// Returns None when the field is missing, the delimiter is malformed, the
/// value isn't UTF-8, or the copy can't be allocated.
pub fn extract_field(buffer: &[u8], field: &str) -> Option<String> {
    let field = field.as_bytes();
    if field.is_empty() {
        return None;
    }

    let mut search_from = 0usize;
    let colon = loop {
        let start = search_from + find(&buffer[search_from..], field)?;
        let at_line_start = start == 0 || buffer[start - 1] == b'\n';
        let after = start + field.len();

        if at_line_start {
            // Longer field names sharing the prefix ("model" vs "model name") are skipped
            let mut p = after;
            while p < buffer.len() && (buffer[p] == b' ' || buffer[p] == b'\t') {
                p += 1;
            }
            if p < buffer.len() && buffer[p] == b':' {
                break p;
            }
        }
        search_from = after;
    };

    if colon + 1 >= buffer.len() || buffer[colon + 1] != b' ' {
        return None;
    }

    let value_start = colon + 2;
    let value_end = buffer[value_start..]
        .iter()
        .position(|&b| b == b'\n')
        .map_or(buffer.len(), |i| value_start + i);

    let raw = &buffer[value_start..value_end];
    let mut value: Vec<u8> = Vec::new();
    value.try_reserve_exact(raw.len()).ok()?;
    value.extend_from_slice(raw);
    String::from_utf8(value).ok()
}

/// True if the space/tab separated `list` has a token exactly equal to `item`
pub fn list_contains(list: Option<&str>, item: &str) -> bool {
    match list {
        Some(list) => list
            .split(|c| c == ' ' || c == '\t')
            .filter(|token| !token.is_empty())
            .any(|token| token == item),
        None => false,
    }
}

fn find(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    if needle.len() > haystack.len() {
        return None;
    }
    haystack.windows(needle.len()).position(|window| window == needle)
}
