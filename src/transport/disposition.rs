//! `Content-Disposition` file name extraction.

/// File name from a `Content-Disposition` header: `filename` wins over `filename*`.
pub fn file_name(header: &str) -> Option<String> {
    let mut plain = None;
    let mut extended = None;

    for part in header.split(';').map(str::trim) {
        let Some((key, value)) = part.split_once('=') else {
            continue;
        };
        match key.trim().to_ascii_lowercase().as_str() {
            "filename" => plain = Some(unquote(value.trim()).to_string()),
            "filename*" => extended = decode_extended(value.trim()),
            _ => {}
        }
    }

    plain.filter(|name| !name.is_empty()).or(extended)
}

fn unquote(value: &str) -> &str {
    value
        .strip_prefix('"')
        .and_then(|v| v.strip_suffix('"'))
        .unwrap_or(value)
}

/// RFC 5987 `charset'lang'percent-encoded`
fn decode_extended(value: &str) -> Option<String> {
    let encoded = match value.splitn(3, '\'').collect::<Vec<_>>().as_slice() {
        [_, _, encoded] => *encoded,
        _ => value,
    };
    let bytes = percent_decode(unquote(encoded))?;
    String::from_utf8(bytes).ok().filter(|name| !name.is_empty())
}

fn percent_decode(input: &str) -> Option<Vec<u8>> {
    let bytes = input.as_bytes();
    let mut out = Vec::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] == b'%' {
            let hex = input.get(i + 1..i + 3)?;
            out.push(u8::from_str_radix(hex, 16).ok()?);
            i += 3;
        } else {
            out.push(bytes[i]);
            i += 1;
        }
    }
    Some(out)
}
