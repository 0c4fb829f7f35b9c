use crate::Value;

const TRUE_TOKENS: [&str; 5] = ["yes", "true", "t", "y", "1"];
const FALSE_TOKENS: [&str; 5] = ["no", "false", "f", "n", "0"];

/// Parses a boolean the way a human would type it on the command line.
pub fn str2bool(raw: &str) -> Result<bool, String> {
    let lowered = raw.trim().to_lowercase();
    if TRUE_TOKENS.contains(&lowered.as_str()) {
        Ok(true)
    } else if FALSE_TOKENS.contains(&lowered.as_str()) {
        Ok(false)
    } else {
        Err(format!("Boolean value expected for argument, received '{raw}'"))
    }
}

/// Turns an alias into an option string: `x` becomes `-x`, `name` becomes
/// `--name`, and anything already starting with `-` is kept.
pub(crate) fn option_string(alias: &str) -> String {
    if alias.starts_with('-') {
        alias.to_string()
    } else if alias.chars().count() == 1 {
        format!("-{alias}")
    } else {
        format!("--{alias}")
    }
}

/// The command-line spelling of a scalar value.
pub(crate) fn value_token(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// Parses a raw token into a value of the same type as `like`. Without a
/// template, integers, floats and booleans are recognised before falling
/// back to a string.
pub(crate) fn parse_scalar(raw: &str, like: Option<&Value>) -> Result<Value, String> {
    match like {
        Some(Value::String(_)) => Ok(Value::String(raw.to_string())),
        Some(Value::Integer(_)) => raw
            .parse::<i64>()
            .map(Value::Integer)
            .map_err(|e| format!("invalid integer '{raw}': {e}")),
        Some(Value::Float(_)) => raw
            .parse::<f64>()
            .map(Value::Float)
            .map_err(|e| format!("invalid float '{raw}': {e}")),
        Some(Value::Boolean(_)) => str2bool(raw).map(Value::Boolean),
        _ => Ok(infer_scalar(raw)),
    }
}

fn infer_scalar(raw: &str) -> Value {
    if let Ok(i) = raw.parse::<i64>() {
        Value::Integer(i)
    } else if let Ok(f) = raw.parse::<f64>() {
        Value::Float(f)
    } else if raw == "true" || raw == "false" {
        Value::Boolean(raw == "true")
    } else {
        Value::String(raw.to_string())
    }
}
