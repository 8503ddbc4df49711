//! The helper functions and constants visible to generator expressions.
//! Nothing else is in scope.

use super::value::Value;
use crate::config::FuzzerConfig;
use std::fs;
use tracing::debug;

pub type EvalResult<T> = Result<T, String>;

const FUNCTIONS: &[&str] = &[
    "range", "len", "str", "upper", "lower", "reversed", "chars", "split", "lines", "read",
];

pub fn is_function(name: &str) -> bool {
    FUNCTIONS.contains(&name)
}

/// Constants of the `string` module
pub fn string_constant(name: &str) -> Option<&'static str> {
    let constant = match name {
        "ascii_lowercase" | "lowercase" => "abcdefghijklmnopqrstuvwxyz",
        "ascii_uppercase" | "uppercase" => "ABCDEFGHIJKLMNOPQRSTUVWXYZ",
        "ascii_letters" | "letters" => "abcdefghijklmnopqrstuvwxyzABCDEFGHIJKLMNOPQRSTUVWXYZ",
        "digits" => "0123456789",
        "hexdigits" => "0123456789abcdefABCDEF",
        "octdigits" => "01234567",
        "punctuation" => r##"!"#$%&'()*+,-./:;<=>?@[\]^_`{|}~"##,
        "whitespace" => " \t\n\r\x0b\x0c",
        "printable" => concat!(
            "0123456789",
            "abcdefghijklmnopqrstuvwxyzABCDEFGHIJKLMNOPQRSTUVWXYZ",
            r##"!"#$%&'()*+,-./:;<=>?@[\]^_`{|}~"##,
            " \t\n\r\x0b\x0c"
        ),
        _ => return None,
    };
    Some(constant)
}

/// Fail when a list or string would grow past the configured limit
pub fn check_len(len: usize, config: &FuzzerConfig) -> EvalResult<()> {
    if len > config.max_sequence_len {
        return Err(format!(
            "sequence of {} items exceeds the limit of {}",
            len, config.max_sequence_len
        ));
    }
    Ok(())
}

/// Fail when a helper result is longer than the configured limit
pub fn check_value(value: &Value, config: &FuzzerConfig) -> EvalResult<()> {
    match value {
        Value::Str(text) => check_len(text.chars().count(), config),
        Value::List(_) => check_len(value.item_count(), config),
        Value::Int(_) | Value::StringModule => Ok(()),
    }
}

pub fn call(name: &str, args: Vec<Value>, config: &FuzzerConfig) -> EvalResult<Value> {
    let value = dispatch(name, args, config)?;
    check_value(&value, config)?;
    Ok(value)
}

fn dispatch(name: &str, args: Vec<Value>, config: &FuzzerConfig) -> EvalResult<Value> {
    match name {
        "range" => range(&args, config),
        "len" => {
            let arg = single(name, args)?;
            let len = match &arg {
                Value::List(items) => items.len(),
                Value::Str(text) => text.chars().count(),
                other => return Err(format!("len() of {} is undefined", other.type_name())),
            };
            Ok(Value::Int(len as i64))
        }
        "str" => Ok(Value::Str(single(name, args)?.to_string())),
        "upper" => Ok(Value::Str(as_str(name, &single(name, args)?)?.to_uppercase())),
        "lower" => Ok(Value::Str(as_str(name, &single(name, args)?)?.to_lowercase())),
        "reversed" => match single(name, args)? {
            Value::List(mut items) => {
                items.reverse();
                Ok(Value::List(items))
            }
            Value::Str(text) => Ok(Value::Str(text.chars().rev().collect())),
            other => Err(format!("reversed() of {} is undefined", other.type_name())),
        },
        "chars" => {
            let arg = single(name, args)?;
            let text = as_str(name, &arg)?;
            Ok(Value::List(
                text.chars().map(|c| Value::Str(c.to_string())).collect(),
            ))
        }
        "split" => split(&args),
        "lines" => {
            let content = read_file(name, &single(name, args)?, config)?;
            let lines: Vec<Value> = content
                .lines()
                .map(str::trim)
                .filter(|line| !line.is_empty())
                .map(|line| Value::Str(line.to_string()))
                .collect();
            check_len(lines.len(), config)?;
            Ok(Value::List(lines))
        }
        "read" => {
            let content = read_file(name, &single(name, args)?, config)?;
            check_len(content.chars().count(), config)?;
            Ok(Value::Str(content))
        }
        _ => Err(format!("name '{}' is not defined", name)),
    }
}

fn single(name: &str, args: Vec<Value>) -> EvalResult<Value> {
    let count = args.len();
    let mut args = args.into_iter();
    match (args.next(), args.next()) {
        (Some(arg), None) => Ok(arg),
        _ => Err(format!("{}() takes exactly 1 argument ({} given)", name, count)),
    }
}

fn as_str<'v>(name: &str, value: &'v Value) -> EvalResult<&'v str> {
    match value {
        Value::Str(text) => Ok(text),
        other => Err(format!("{}() expects a string, not {}", name, other.type_name())),
    }
}

fn as_int(name: &str, value: &Value) -> EvalResult<i64> {
    match value {
        Value::Int(n) => Ok(*n),
        other => Err(format!("{}() expects an integer, not {}", name, other.type_name())),
    }
}

fn range(args: &[Value], config: &FuzzerConfig) -> EvalResult<Value> {
    let ints = args
        .iter()
        .map(|arg| as_int("range", arg))
        .collect::<EvalResult<Vec<_>>>()?;

    let (start, stop, step) = match ints.as_slice() {
        [stop] => (0, *stop, 1),
        [start, stop] => (*start, *stop, 1),
        [start, stop, step] => (*start, *stop, *step),
        _ => {
            return Err(format!(
                "range() takes 1 to 3 arguments ({} given)",
                ints.len()
            ))
        }
    };

    if step == 0 {
        return Err("range() step must not be zero".to_string());
    }

    // i128 keeps the length arithmetic clear of i64 overflow
    let (start, stop, step) = (start as i128, stop as i128, step as i128);
    let len = if step > 0 && start < stop {
        (stop - start + step - 1) / step
    } else if step < 0 && start > stop {
        (start - stop - step - 1) / -step
    } else {
        0
    };

    if len > config.max_sequence_len as i128 {
        return Err(format!(
            "range of {} items exceeds the limit of {}",
            len, config.max_sequence_len
        ));
    }

    Ok(Value::List(
        (0..len)
            .map(|i| Value::Int((start + i * step) as i64))
            .collect(),
    ))
}

fn split(args: &[Value]) -> EvalResult<Value> {
    let parts: Vec<Value> = match args {
        [text] => as_str("split", text)?
            .split_whitespace()
            .map(|part| Value::Str(part.to_string()))
            .collect(),
        [text, sep] => {
            let sep = as_str("split", sep)?;
            if sep.is_empty() {
                return Err("split() separator must not be empty".to_string());
            }
            as_str("split", text)?
                .split(sep)
                .map(|part| Value::Str(part.to_string()))
                .collect()
        }
        _ => {
            return Err(format!(
                "split() takes 1 or 2 arguments ({} given)",
                args.len()
            ))
        }
    };
    Ok(Value::List(parts))
}

fn read_file(name: &str, path: &Value, config: &FuzzerConfig) -> EvalResult<String> {
    let path = as_str(name, path)?;
    if !config.allow_file_access {
        return Err(format!("{}() is disabled: file access is turned off", name));
    }

    let resolved = config.resolve_path(path);
    debug!(path = %resolved.display(), "Reading generator input file");

    fs::read_to_string(&resolved)
        .map_err(|e| format!("cannot read {}: {}", resolved.display(), e))
}
