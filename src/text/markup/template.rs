use std::collections::HashMap;

/// Expands `{name=default}` and `{name}` placeholders.
///
/// Unknown names fall back to their default, or to nothing. `\{` yields a
/// literal brace and `{}` is copied through unchanged. An unterminated
/// brace stops substitution and the rest is dropped.
pub fn apply_template<S: std::hash::BuildHasher>(
    template: &str,
    vars: &HashMap<String, String, S>,
) -> String {
    let mut out = String::with_capacity(template.len());
    let mut rest = template;

    while let Some(open) = rest.find('{') {
        if open > 0 && rest.as_bytes()[open - 1] == b'\\' {
            out.push_str(&rest[..open - 1]);
            out.push('{');
            rest = &rest[open + 1..];
            continue;
        }

        out.push_str(&rest[..open]);
        rest = &rest[open..];
        let Some(close) = rest.find('}') else {
            return out;
        };
        if close == 1 {
            out.push_str("{}");
            rest = &rest[2..];
            continue;
        }

        let tag = &rest[1..close];
        let value = match tag.split_once('=') {
            Some((name, default)) => vars.get(name).map_or(default, String::as_str),
            None => vars.get(tag).map_or("", String::as_str),
        };
        out.push_str(value);
        rest = &rest[close + 1..];
    }

    out.push_str(rest);
    out
}

#[allow(clippy::unwrap_used)]
#[cfg(test)]
mod tests {
    use super::*;

    fn vars(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn substitutes_known_and_default_values() {
        let v = vars(&[("name", "Mia")]);
        assert_eq!(apply_template("Hi {name}!", &v), "Hi Mia!");
        assert_eq!(apply_template("{gold=0} gold", &v), "0 gold");
        assert_eq!(apply_template("{missing}x", &v), "x");
        assert_eq!(apply_template("{name=Bob}", &v), "Mia");
    }

    #[test]
    fn escapes_and_malformed_braces() {
        let v = vars(&[("a", "1")]);
        assert_eq!(apply_template(r"\{a} {a}", &v), "{a} 1");
        assert_eq!(apply_template("{} {a}", &v), "{} 1");
        assert_eq!(apply_template("x {a", &v), "x ");
    }
}
