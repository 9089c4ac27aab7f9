//! Literal token text to values.

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{message}")]
pub struct LiteralError {
    pub message: String,
}

fn err(message: impl Into<String>) -> LiteralError {
    LiteralError {
        message: message.into(),
    }
}

fn digits(text: &str) -> String {
    text.chars().filter(|c| *c != '_').collect()
}

pub fn parse_int_literal(text: &str) -> Result<i32, LiteralError> {
    digits(text)
        .parse::<i32>()
        .map_err(|_| err(format!("Integer literal {text} is out of range")))
}

pub fn parse_long_literal(text: &str) -> Result<i64, LiteralError> {
    let body = text
        .strip_suffix(['l', 'L'])
        .ok_or_else(|| err("Long literal is missing its L suffix"))?;
    digits(body)
        .parse::<i64>()
        .map_err(|_| err(format!("Long literal {text} is out of range")))
}

pub fn parse_float_literal(text: &str) -> Result<f32, LiteralError> {
    let body = text.strip_suffix(['f', 'F']).unwrap_or(text);
    let value = digits(body)
        .parse::<f32>()
        .map_err(|_| err(format!("Malformed float literal {text}")))?;
    if value.is_infinite() {
        return Err(err(format!("Float literal {text} is out of range")));
    }
    Ok(value)
}

pub fn parse_num_literal(text: &str) -> Result<f64, LiteralError> {
    let body = text.strip_suffix(['d', 'D']).unwrap_or(text);
    let value = digits(body)
        .parse::<f64>()
        .map_err(|_| err(format!("Malformed number literal {text}")))?;
    if value.is_infinite() {
        return Err(err(format!("Number literal {text} is out of range")));
    }
    Ok(value)
}

fn unescape(body: &str) -> Result<String, LiteralError> {
    let mut out = String::with_capacity(body.len());
    let mut chars = body.chars();
    while let Some(c) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }
        let escaped = chars.next().ok_or_else(|| err("Dangling escape"))?;
        out.push(match escaped {
            'n' => '\n',
            't' => '\t',
            'r' => '\r',
            'b' => '\u{8}',
            'f' => '\u{c}',
            '0' => '\0',
            '\\' => '\\',
            '\'' => '\'',
            '"' => '"',
            'u' => {
                let hex: String = chars.by_ref().take(4).collect();
                let code = u32::from_str_radix(&hex, 16)
                    .ok()
                    .filter(|_| hex.len() == 4)
                    .ok_or_else(|| err(format!("Malformed unicode escape \\u{hex}")))?;
                char::from_u32(code).ok_or_else(|| err(format!("Invalid unicode escape \\u{hex}")))?
            }
            other => return Err(err(format!("Unknown escape sequence \\{other}"))),
        });
    }
    Ok(out)
}

pub fn unescape_string_literal(text: &str) -> Result<String, LiteralError> {
    let body = text
        .strip_prefix('"')
        .and_then(|t| t.strip_suffix('"'))
        .ok_or_else(|| err("Invalid string literal"))?;
    unescape(body)
}

/// A `Char` is one UTF-16 code unit.
pub fn unescape_char_literal(text: &str) -> Result<u16, LiteralError> {
    let body = text
        .strip_prefix('\'')
        .and_then(|t| t.strip_suffix('\''))
        .ok_or_else(|| err("Invalid character literal"))?;
    let value = unescape(body)?;
    let mut units = value.encode_utf16();
    match (units.next(), units.next()) {
        (Some(unit), None) => Ok(unit),
        (None, _) => Err(err("Empty character literal")),
        (Some(_), Some(_)) => Err(err("Character literal must contain exactly one character")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn numbers() {
        assert_eq!(parse_int_literal("1_000"), Ok(1000));
        assert!(parse_int_literal("2147483648").is_err());
        assert_eq!(parse_long_literal("10L"), Ok(10));
        assert_eq!(parse_float_literal("1.5f"), Ok(1.5));
        assert_eq!(parse_num_literal("2e3"), Ok(2000.0));
    }

    #[test]
    fn escapes() {
        assert_eq!(unescape_string_literal(r#""a\tbA""#).unwrap(), "a\tbA");
        assert_eq!(unescape_char_literal(r"'\n'"), Ok(10));
        assert!(unescape_char_literal("''").is_err());
        assert!(unescape_string_literal(r#""\q""#).is_err());
    }
}
