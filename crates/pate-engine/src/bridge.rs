//! 宿主与脚本之间的桥接工具
//! Host/guest bridge utilities
//!
//! Conversions between host-side strings, paths and JSON collections and the
//! interpreter's native `Dynamic` values, plus the safe-call and traceback
//! helpers used at every interpreter boundary.

use crate::error::CallbackError;
use rhai::{AST, Array, CallFnOptions, Dynamic, EvalAltResult, Map, Scope};
use std::fmt::Display;
use std::path::{Path, PathBuf};
use tracing::error;

// ============================================================================
// 值转换
// Value conversion
// ============================================================================

/// Convert a host path to a guest string.
pub fn path_to_dynamic(path: &Path) -> Dynamic {
    Dynamic::from(path.to_string_lossy().into_owned())
}

/// Convert a list of host paths to a guest array of strings.
pub fn paths_to_array(paths: &[PathBuf]) -> Array {
    paths.iter().map(|p| path_to_dynamic(p)).collect()
}

/// 将 JSON 值转换为脚本值
/// Convert a JSON value to a guest value.
///
/// Goes through the interpreter's serde support: `null` becomes `()`,
/// objects become object maps and numbers become `INT` or `FLOAT`.
pub fn json_to_dynamic(value: &serde_json::Value) -> Result<Dynamic, Box<EvalAltResult>> {
    rhai::serde::to_dynamic(value)
}

/// 将脚本值转换为 JSON 值
/// Convert a guest value to a JSON value.
///
/// Values without a JSON counterpart (proxies, function pointers, ...) are
/// rendered through their display form.
pub fn dynamic_to_json(value: &Dynamic) -> serde_json::Value {
    let value = value.flatten_clone();
    if value.is_unit() {
        serde_json::Value::Null
    } else if let Ok(b) = value.as_bool() {
        serde_json::Value::Bool(b)
    } else if let Ok(i) = value.as_int() {
        serde_json::json!(i)
    } else if let Ok(f) = value.as_float() {
        serde_json::json!(f)
    } else if let Ok(c) = value.as_char() {
        serde_json::Value::String(c.to_string())
    } else if value.is_string() {
        serde_json::Value::String(value.to_string())
    } else if value.is_array() {
        let arr = value.cast::<Array>();
        serde_json::Value::Array(arr.iter().map(dynamic_to_json).collect())
    } else if value.is_map() {
        let map = value.cast::<Map>();
        let mut json_obj = serde_json::Map::new();
        for (k, v) in map.iter() {
            json_obj.insert(k.to_string(), dynamic_to_json(v));
        }
        serde_json::Value::Object(json_obj)
    } else {
        serde_json::Value::String(value.to_string())
    }
}

// ============================================================================
// 错误报告
// Error reporting
// ============================================================================

/// Report a guest failure on the diagnostic stream.
///
/// Returns the reported text so callers can keep it in their reports.
pub fn traceback(description: &str, error: &dyn Display) -> String {
    let text = format!("{description}: {error}");
    error!("{}", text);
    text
}

// ============================================================================
// 安全调用
// Safe calls
// ============================================================================

/// Whether `ast` defines a script function `name` taking no parameters.
pub fn defines_zero_arg_fn(ast: &AST, name: &str) -> bool {
    ast.iter_functions()
        .any(|f| f.name == name && f.params.is_empty())
}

/// Call a zero-argument script function defined in `ast`.
///
/// The AST's top-level statements are not re-run. A missing function yields
/// [`CallbackError::Missing`]; a function that raises yields
/// [`CallbackError::Raised`] and is reported with a traceback.
pub fn call_zero_arg(
    engine: &rhai::Engine,
    ast: &AST,
    name: &str,
) -> Result<Dynamic, CallbackError> {
    if !defines_zero_arg_fn(ast, name) {
        return Err(CallbackError::Missing(name.to_string()));
    }

    let options = CallFnOptions::new().eval_ast(false);
    let mut scope = Scope::new();
    engine
        .call_fn_with_options::<Dynamic>(options, &mut scope, ast, name, ())
        .map_err(|err: Box<EvalAltResult>| CallbackError::Raised {
            name: name.to_string(),
            message: traceback(&format!("Call to {name}() failed"), &err),
        })
}
