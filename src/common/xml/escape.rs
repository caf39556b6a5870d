use aho_corasick::{AhoCorasick, MatchKind};
use once_cell::sync::Lazy;
use std::borrow::Cow;

// Static initialization: automaton is built only once, thread-safe
static XML_ESCAPER: Lazy<AhoCorasick> = Lazy::new(|| {
    AhoCorasick::builder()
        .build(["&", "<", ">", "\"", "'"])
        .expect("Failed to build XML escaper")
});

// Use LeftmostLongest to ensure longer entities are matched first (e.g., &amp; instead of &lt;)
static XML_UNESCAPER: Lazy<AhoCorasick> = Lazy::new(|| {
    AhoCorasick::builder()
        .match_kind(MatchKind::LeftmostLongest)
        .build(["&amp;", "&lt;", "&gt;", "&quot;", "&apos;"])
        .expect("Failed to build XML unescaper")
});

/// Escape XML special characters.
///
/// # Examples
///
/// ```
/// use rambutan::common::xml::escape_xml;
/// assert_eq!(escape_xml("a & b"), "a &amp; b");
/// assert_eq!(escape_xml("<tag>\"hello\"</tag>"), "&lt;tag&gt;&quot;hello&quot;&lt;/tag&gt;");
/// ```
#[inline]
pub fn escape_xml(s: &str) -> String {
    XML_ESCAPER.replace_all(s, &["&amp;", "&lt;", "&gt;", "&quot;", "&apos;"])
}

/// Unescape XML special characters.
///
/// Replaces the five predefined entities as well as decimal (`&#10;`) and
/// hexadecimal (`&#xA;`) character references. Unknown or malformed
/// references are left unchanged.
///
/// # Examples
///
/// ```
/// use rambutan::common::xml::unescape_xml;
/// assert_eq!(unescape_xml("&lt;a &amp; b&gt;"), "<a & b>");
/// assert_eq!(unescape_xml("&#65;&#x42;"), "AB");
/// assert_eq!(unescape_xml("&amp;lt;"), "&lt;");
/// assert_eq!(unescape_xml("&invalid;"), "&invalid;");
/// ```
pub fn unescape_xml(s: &str) -> Cow<'_, str> {
    if memchr::memchr(b'&', s.as_bytes()).is_none() {
        return Cow::Borrowed(s);
    }

    let named = XML_UNESCAPER.replace_all(s, &["\u{0}amp;", "<", ">", "\"", "'"]);
    if !named.contains("&#") {
        return Cow::Owned(named.replace("\u{0}amp;", "&"));
    }

    let mut out = String::with_capacity(named.len());
    let mut rest = named.as_str();
    while let Some(pos) = rest.find("&#") {
        out.push_str(&rest[..pos]);
        let tail = &rest[pos + 2..];
        match tail.find(';').and_then(|end| decode_char_ref(&tail[..end]).map(|c| (c, end))) {
            Some((c, end)) => {
                out.push(c);
                rest = &tail[end + 1..];
            },
            None => {
                out.push_str("&#");
                rest = tail;
            },
        }
    }
    out.push_str(rest);

    // `&amp;` is restored last so that `&amp;#65;` stays literal text
    Cow::Owned(out.replace("\u{0}amp;", "&"))
}

fn decode_char_ref(body: &str) -> Option<char> {
    let code = if let Some(hex) = body.strip_prefix('x').or_else(|| body.strip_prefix('X')) {
        u32::from_str_radix(hex, 16).ok()?
    } else {
        atoi_simd::parse::<u32, false, false>(body.as_bytes()).ok()?
    };
    char::from_u32(code)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_escape_round_trip() {
        let raw = r#"R&D <"quoted"> 'single'"#;
        assert_eq!(unescape_xml(&escape_xml(raw)), raw);
    }

    #[test]
    fn test_unescape_borrowed_when_plain() {
        assert!(matches!(unescape_xml("plain text"), Cow::Borrowed(_)));
    }

    #[test]
    fn test_escaped_char_ref_stays_literal() {
        assert_eq!(unescape_xml("&amp;#65;"), "&#65;");
        assert_eq!(unescape_xml("&#xZZ;"), "&#xZZ;");
    }
}
