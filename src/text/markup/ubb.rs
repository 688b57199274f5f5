//! Bulletin-board markup, translated to the HTML subset before parsing.

/// Converts UBB markup to HTML.
///
/// `\[` escapes a bracket. Unknown tags are kept as literal text, and plain
/// text is HTML-escaped so it survives the second parse unchanged.
pub fn ubb_to_html(src: &str) -> String {
    let mut out = String::with_capacity(src.len() + src.len() / 4);
    let mut rest = src;

    while let Some(pos) = rest.find(['[', '\\']) {
        escape_into(&mut out, &rest[..pos]);
        rest = &rest[pos..];

        if let Some(after) = rest.strip_prefix("\\[") {
            out.push('[');
            rest = after;
            continue;
        }
        if rest.starts_with('\\') {
            out.push('\\');
            rest = &rest[1..];
            continue;
        }

        match translate_tag(rest) {
            Some((html, len)) => {
                out.push_str(&html);
                rest = &rest[len..];
            }
            None => {
                out.push('[');
                rest = &rest[1..];
            }
        }
    }

    escape_into(&mut out, rest);
    out
}

/// Translates the tag at the start of `s`, returning the HTML and the
/// number of bytes consumed.
fn translate_tag(s: &str) -> Option<(String, usize)> {
    let close = s.find(']')?;
    let inner = &s[1..close];
    let consumed = close + 1;

    if let Some(name) = inner.strip_prefix('/') {
        let html = match name.to_ascii_lowercase().as_str() {
            tag @ ("b" | "i" | "u" | "s" | "sup" | "sub") => format!("</{tag}>"),
            "color" | "size" | "font" => "</font>".to_string(),
            "url" => "</a>".to_string(),
            "align" => "</p>".to_string(),
            _ => return None,
        };
        return Some((html, consumed));
    }

    let (name, value) = match inner.split_once('=') {
        Some((name, value)) => (name.to_ascii_lowercase(), Some(value)),
        None => (inner.to_ascii_lowercase(), None),
    };

    let html = match (name.as_str(), value) {
        ("b" | "i" | "u" | "s" | "sup" | "sub", None) => format!("<{name}>"),
        ("color", Some(v)) => format!("<font color=\"{}\">", attr(v)),
        ("size", Some(v)) => format!("<font size=\"{}\">", attr(v)),
        ("font", Some(v)) => format!("<font face=\"{}\">", attr(v)),
        ("align", Some(v)) => format!("<p align=\"{}\">", attr(v)),
        ("url", Some(v)) => format!("<a href=\"{}\" target=\"_blank\">", attr(v)),
        ("url", None) => {
            let (content, len) = enclosed(&s[consumed..], "[/url]")?;
            let href = attr(content);
            let mut text = String::new();
            escape_into(&mut text, content);
            return Some((
                format!("<a href=\"{href}\" target=\"_blank\">{text}</a>"),
                consumed + len,
            ));
        }
        ("img", size) => {
            let (src, len) = enclosed(&s[consumed..], "[/img]")?;
            let mut html = format!("<img src=\"{}\"", attr(src.trim()));
            if let Some((w, h)) = size.and_then(|v| v.split_once('x')) {
                html.push_str(&format!(" width=\"{}\" height=\"{}\"", attr(w), attr(h)));
            }
            html.push_str("/>");
            return Some((html, consumed + len));
        }
        _ => return None,
    };
    Some((html, consumed))
}

/// Content up to `end_tag` and the bytes consumed including the tag.
fn enclosed<'a>(s: &'a str, end_tag: &str) -> Option<(&'a str, usize)> {
    let lower = s.to_ascii_lowercase();
    let end = lower.find(end_tag)?;
    Some((&s[..end], end + end_tag.len()))
}

fn attr(v: &str) -> String {
    let mut out = String::with_capacity(v.len());
    escape_into(&mut out, v);
    out.replace('"', "&quot;")
}

fn escape_into(out: &mut String, text: &str) {
    for ch in text.chars() {
        match ch {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            _ => out.push(ch),
        }
    }
}
