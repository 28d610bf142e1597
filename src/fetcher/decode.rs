use crate::fetcher::errors::FetchError;
use encoding_rs::Encoding;
use regex::Regex;
use std::sync::LazyLock;

static HEADER_CHARSET_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"(?i)charset\s*=\s*["']?([^"'\s;]+)"#).unwrap());

// Matches both `<meta charset=..>` and the http-equiv content-type form.
static META_CHARSET_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"(?i)<meta\s+[^>]*?charset\s*=\s*["']?([^"'\s;/>]+)"#).unwrap());

const SNIFF_WINDOW: usize = 4096;

/// Decode a response body to UTF-8, picking the encoding from the
/// Content-Type header, then `<meta>` tags, then byte-level detection.
pub fn decode_body(
    content_type: &str,
    body: &[u8],
) -> Result<(String, &'static Encoding), FetchError> {
    let encoding = detect_encoding(content_type, body);
    let (decoded, _, had_errors) = encoding.decode(body);

    if had_errors {
        return Err(FetchError::Charset(format!(
            "body is not valid {}",
            encoding.name()
        )));
    }

    Ok((decoded.into_owned(), encoding))
}

fn detect_encoding(content_type: &str, body: &[u8]) -> &'static Encoding {
    if let Some(encoding) = label_from(&HEADER_CHARSET_REGEX, content_type) {
        return encoding;
    }

    let window = &body[..body.len().min(SNIFF_WINDOW)];
    let head = String::from_utf8_lossy(window);
    if let Some(encoding) = label_from(&META_CHARSET_REGEX, &head) {
        return encoding;
    }

    let mut detector = chardetng::EncodingDetector::new();
    detector.feed(window, false);
    detector.guess(None, true)
}

fn label_from(regex: &Regex, haystack: &str) -> Option<&'static Encoding> {
    let label = regex.captures(haystack)?.get(1)?.as_str().to_lowercase();
    Encoding::for_label(label.as_bytes())
}
