//! Decoding of persisted trace payload text.
//!
//! Log rows store the structured response as free text in one of two
//! literal syntaxes:
//!
//! - **strict**: JSON text, as written by the current backend;
//! - **repr**: a language-repr-like text with single-quoted strings and the
//!   bare tokens `True`, `False` and `None`, as written by older backends.
//!
//! [`decode_strict`] and [`decode_tolerant`] are independent pure functions;
//! [`decode_payload`] composes them with [`or_fallback`].

use serde_json::{Map, Value};

/// A decoded payload object.
pub type Payload = Map<String, Value>;

/// Decode JSON text into an object. Anything other than an object fails.
pub fn decode_strict(text: &str) -> Option<Payload> {
    match serde_json::from_str::<Value>(text).ok()? {
        Value::Object(map) => Some(map),
        _ => None,
    }
}

/// Rewrite repr literal syntax into JSON, then decode strictly.
pub fn decode_tolerant(text: &str) -> Option<Payload> {
    decode_strict(&rewrite_repr_literals(text))
}

/// Try `primary`, and only if it yields nothing, `fallback`.
pub fn or_fallback<T>(
    primary: impl Fn(&str) -> Option<T>,
    fallback: impl Fn(&str) -> Option<T>,
) -> impl Fn(&str) -> Option<T> {
    move |text| primary(text).or_else(|| fallback(text))
}

/// Strict decode with tolerant fallback.
pub fn decode_payload(text: &str) -> Option<Payload> {
    or_fallback(decode_strict, decode_tolerant)(text)
}

// ---------------------------------------------------------------------------
// Repr → JSON rewrite
// ---------------------------------------------------------------------------

/// Rewrite repr literal syntax into JSON syntax.
///
/// - single-quoted strings become double-quoted, with inner `"` escaped and
///   `\'` unescaped;
/// - `\xNN` escapes become `\u00NN`, `\UNNNNNNNN` escapes become the literal
///   character;
/// - bare `True` / `False` / `None` become `true` / `false` / `null`.
///
/// Tokens inside strings are never touched. Text that is already JSON passes
/// through unchanged.
pub fn rewrite_repr_literals(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut chars = text.chars().peekable();

    while let Some(c) = chars.next() {
        match c {
            '\'' | '"' => copy_string(c, &mut chars, &mut out),
            c if c.is_ascii_alphabetic() || c == '_' => {
                let mut word = String::from(c);
                while let Some(&next) = chars.peek() {
                    if next.is_ascii_alphanumeric() || next == '_' {
                        word.push(next);
                        chars.next();
                    } else {
                        break;
                    }
                }
                out.push_str(match word.as_str() {
                    "True" => "true",
                    "False" => "false",
                    "None" => "null",
                    _ => &word,
                });
            }
            _ => out.push(c),
        }
    }

    out
}

/// Copy one string literal opened by `quote`, emitting it double-quoted.
fn copy_string<I>(quote: char, chars: &mut std::iter::Peekable<I>, out: &mut String)
where
    I: Iterator<Item = char>,
{
    out.push('"');
    while let Some(c) = chars.next() {
        match c {
            '\\' => match chars.next() {
                Some('\'') => out.push('\''),
                Some('x') => {
                    let hex: String = take_hex(chars, 2);
                    out.push_str("\\u00");
                    out.push_str(&hex);
                }
                Some('U') => {
                    let hex: String = take_hex(chars, 8);
                    match u32::from_str_radix(&hex, 16).ok().and_then(char::from_u32) {
                        Some(ch) => push_json_char(ch, out),
                        None => {
                            out.push_str("\\\\U");
                            out.push_str(&hex);
                        }
                    }
                }
                Some(other) => {
                    out.push('\\');
                    out.push(other);
                }
                None => out.push_str("\\\\"),
            },
            c if c == quote => {
                out.push('"');
                return;
            }
            '"' => out.push_str("\\\""),
            c => push_json_char(c, out),
        }
    }
    // Unterminated literal: close it so the strict decode reports the error.
    out.push('"');
}

fn take_hex<I>(chars: &mut std::iter::Peekable<I>, max: usize) -> String
where
    I: Iterator<Item = char>,
{
    let mut hex = String::with_capacity(max);
    while hex.len() < max {
        match chars.peek() {
            Some(&c) if c.is_ascii_hexdigit() => {
                hex.push(c);
                chars.next();
            }
            _ => break,
        }
    }
    while hex.len() < 2 {
        hex.insert(0, '0');
    }
    hex
}

fn push_json_char(c: char, out: &mut String) {
    match c {
        '\n' => out.push_str("\\n"),
        '\r' => out.push_str("\\r"),
        '\t' => out.push_str("\\t"),
        c if (c as u32) < 0x20 => out.push_str(&format!("\\u{:04x}", c as u32)),
        c => out.push(c),
    }
}
