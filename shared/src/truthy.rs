use serde_json::Value;

/// Truthiness of a property value, used to gate conditional routes.
///
/// A missing value, `null`, `false`, `0` and the empty string are falsy.
/// Every array & object is truthy, even an empty one.
pub fn is_truthy(value: Option<&Value>) -> bool {
    match value {
        None | Some(Value::Null) => false,
        Some(Value::Bool(flag)) => *flag,
        Some(Value::Number(number)) => number.as_f64().map_or(true, |n| n != 0.0 && !n.is_nan()),
        Some(Value::String(text)) => !text.is_empty(),
        Some(Value::Array(_)) | Some(Value::Object(_)) => true,
    }
}
