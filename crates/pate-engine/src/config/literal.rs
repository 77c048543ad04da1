//! Restricted literal grammar used to persist configuration values.
//!
//! Supported values: `()`, booleans, integers, finite floats, characters,
//! strings, arrays and object maps, nested arbitrarily. Parsing evaluates the
//! text as a single expression in a raw interpreter with no packages, no
//! variables, no functions and a small operation budget, then rejects any
//! value outside the subset. Printing emits the canonical literal form, which
//! parses back to an equal value.

use crate::error::LiteralError;
use rhai::{Array, Dynamic, Engine, Map};
use std::fmt::Write as _;

const MAX_OPERATIONS: u64 = 10_000;
const MAX_EXPR_DEPTH: usize = 64;

/// Parser for stored literal text.
pub struct LiteralParser {
    engine: Engine,
}

impl Default for LiteralParser {
    fn default() -> Self {
        Self::new()
    }
}

impl LiteralParser {
    pub fn new() -> Self {
        let mut engine = Engine::new_raw();
        engine.set_strict_variables(true);
        engine.set_max_operations(MAX_OPERATIONS);
        engine.set_max_expr_depths(MAX_EXPR_DEPTH, MAX_EXPR_DEPTH);
        engine.set_allow_looping(false);
        engine.set_allow_anonymous_fn(false);
        for keyword in ["eval", "print", "debug", "Fn", "call", "curry"] {
            engine.disable_symbol(keyword);
        }
        Self { engine }
    }

    /// Parse `text` into a value of the literal subset.
    pub fn parse(&self, text: &str) -> Result<Dynamic, LiteralError> {
        let value = self
            .engine
            .eval_expression::<Dynamic>(text)
            .map_err(|e| LiteralError::Syntax(e.to_string()))?;
        ensure_literal(&value)?;
        Ok(value)
    }
}

/// Check that `value` and everything nested in it belongs to the subset.
pub fn ensure_literal(value: &Dynamic) -> Result<(), LiteralError> {
    let value = value.flatten_clone();
    if value.is_unit() || value.is_bool() || value.is_int() || value.is_char() || value.is_string() {
        Ok(())
    } else if value.is_float() {
        let f = value.as_float().map_err(|e| LiteralError::Unsupported(e.to_string()))?;
        if f.is_finite() {
            Ok(())
        } else {
            Err(LiteralError::NonFinite(f.to_string()))
        }
    } else if value.is_array() {
        value.cast::<Array>().iter().try_for_each(ensure_literal)
    } else if value.is_map() {
        value.cast::<Map>().values().try_for_each(ensure_literal)
    } else {
        Err(LiteralError::Unsupported(value.type_name().to_string()))
    }
}

/// Canonical literal text for `value`.
pub fn to_literal(value: &Dynamic) -> Result<String, LiteralError> {
    let mut out = String::new();
    write_literal(&mut out, value)?;
    Ok(out)
}

fn write_literal(out: &mut String, value: &Dynamic) -> Result<(), LiteralError> {
    let value = value.flatten_clone();
    if value.is_unit() {
        out.push_str("()");
    } else if let Ok(b) = value.as_bool() {
        out.push_str(if b { "true" } else { "false" });
    } else if let Ok(i) = value.as_int() {
        let _ = write!(out, "{i}");
    } else if let Ok(f) = value.as_float() {
        write_float(out, f)?;
    } else if let Ok(c) = value.as_char() {
        out.push('\'');
        push_escaped(out, c, '\'');
        out.push('\'');
    } else if value.is_string() {
        write_string(out, &value.to_string());
    } else if value.is_array() {
        out.push('[');
        for (i, item) in value.cast::<Array>().iter().enumerate() {
            if i > 0 {
                out.push_str(", ");
            }
            write_literal(out, item)?;
        }
        out.push(']');
    } else if value.is_map() {
        out.push_str("#{");
        for (i, (key, item)) in value.cast::<Map>().iter().enumerate() {
            if i > 0 {
                out.push_str(", ");
            }
            write_string(out, key);
            out.push_str(": ");
            write_literal(out, item)?;
        }
        out.push('}');
    } else {
        return Err(LiteralError::Unsupported(value.type_name().to_string()));
    }
    Ok(())
}

fn write_float(out: &mut String, f: rhai::FLOAT) -> Result<(), LiteralError> {
    if !f.is_finite() {
        return Err(LiteralError::NonFinite(f.to_string()));
    }
    // `{:?}` keeps full precision; the grammar needs a fraction before any exponent.
    let text = format!("{f:?}");
    match text.find('e') {
        Some(pos) if !text[..pos].contains('.') => {
            out.push_str(&text[..pos]);
            out.push_str(".0");
            out.push_str(&text[pos..]);
        }
        _ => out.push_str(&text),
    }
    Ok(())
}

fn write_string(out: &mut String, s: &str) {
    out.push('"');
    for c in s.chars() {
        push_escaped(out, c, '"');
    }
    out.push('"');
}

fn push_escaped(out: &mut String, c: char, quote: char) {
    match c {
        '\\' => out.push_str("\\\\"),
        '\n' => out.push_str("\\n"),
        '\r' => out.push_str("\\r"),
        '\t' => out.push_str("\\t"),
        c if c == quote => {
            out.push('\\');
            out.push(c);
        }
        c if c.is_control() => {
            let code = c as u32;
            if code <= 0xFF {
                let _ = write!(out, "\\x{code:02x}");
            } else {
                let _ = write!(out, "\\u{code:04x}");
            }
        }
        c => out.push(c),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(text: &str) -> Dynamic {
        LiteralParser::new().parse(text).unwrap()
    }

    #[test]
    fn test_scalars() {
        assert_eq!(parse("42").as_int().unwrap(), 42);
        assert_eq!(parse("-7").as_int().unwrap(), -7);
        assert_eq!(parse("1.5").as_float().unwrap(), 1.5);
        assert!(parse("true").as_bool().unwrap());
        assert_eq!(parse("'x'").as_char().unwrap(), 'x');
        assert_eq!(parse(r#""hello""#).to_string(), "hello");
        assert!(parse("()").is_unit());
    }

    #[test]
    fn test_collections() {
        let value = parse(r#"#{"names": ["a", "b"], "size": 2}"#);
        assert_eq!(to_literal(&value).unwrap(), r#"#{"names": ["a", "b"], "size": 2}"#);
    }

    #[test]
    fn test_printer_forms() {
        assert_eq!(to_literal(&Dynamic::from(3_i64)).unwrap(), "3");
        assert_eq!(to_literal(&Dynamic::from(2.0_f64)).unwrap(), "2.0");
        assert_eq!(to_literal(&Dynamic::from(1e-7_f64)).unwrap(), "1.0e-7");
        assert_eq!(to_literal(&Dynamic::from('\'')).unwrap(), r"'\''");
        assert_eq!(
            to_literal(&Dynamic::from("say \"hi\"\n".to_string())).unwrap(),
            r#""say \"hi\"\n""#
        );
        assert_eq!(to_literal(&Dynamic::UNIT).unwrap(), "()");
    }

    #[test]
    fn test_round_trip_text() {
        let parser = LiteralParser::new();
        for text in [
            "0",
            "-12",
            "3.25",
            "1.0e-7",
            "false",
            "'\\t'",
            r#""tab\there""#,
            r#"[1, "two", 3.0, [true, ()]]"#,
            r#"#{"a b": #{"inner": [1, 2]}, "k": "v"}"#,
        ] {
            let value = parser.parse(text).unwrap();
            let printed = to_literal(&value).unwrap();
            let reparsed = parser.parse(&printed).unwrap();
            assert_eq!(to_literal(&reparsed).unwrap(), printed, "text: {text}");
        }
    }

    #[test]
    fn test_rejects_variables_and_calls() {
        let parser = LiteralParser::new();
        assert!(matches!(parser.parse("answer"), Err(LiteralError::Syntax(_))));
        assert!(matches!(parser.parse("print(1)"), Err(LiteralError::Syntax(_))));
        assert!(matches!(parser.parse("launch(1)"), Err(LiteralError::Syntax(_))));
        assert!(matches!(parser.parse("let x = 1; x"), Err(LiteralError::Syntax(_))));
        assert!(matches!(parser.parse("[1, 2"), Err(LiteralError::Syntax(_))));
    }

    #[test]
    fn test_rejects_non_literal_values() {
        let fn_ptr = Dynamic::from(rhai::FnPtr::new("f").unwrap());
        assert!(matches!(to_literal(&fn_ptr), Err(LiteralError::Unsupported(_))));

        let nested: Array = vec![Dynamic::from(1_i64), fn_ptr];
        assert!(to_literal(&Dynamic::from(nested)).is_err());

        assert!(matches!(
            to_literal(&Dynamic::from(f64::NAN)),
            Err(LiteralError::NonFinite(_))
        ));
    }
}
