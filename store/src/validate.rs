use crate::errors::{Error, Result};
use crate::model::Reading;
use serde_json::{Map, Number, Value};

const DEVICE_ID: &str = "device_id";
const NAME: &str = "name";
const TEMPERATURE: &str = "temperature";
const HUMIDITY: &str = "humidity";
const FLOW_RATE: &str = "flow_rate";
const TIMESTAMP: &str = "timestamp";

/// Decodes and validates a raw reading payload
pub fn parse_reading(payload: &[u8]) -> Result<Reading> {
    let value = serde_json::from_slice::<Value>(payload)
        .map_err(|e| Error::Validation(format!("JSON parse error: {}", e)))?;

    reading_from_value(value)
}

/// Validates a decoded JSON body and turns it into a `Reading`.
///
/// Every required field is checked before anything is returned, so a
/// rejected payload never reaches the store.
pub fn reading_from_value(value: Value) -> Result<Reading> {
    let mut fields = match value {
        Value::Object(fields) => fields,
        other => {
            return Err(Error::Validation(format!(
                "Expected a JSON object, got {}",
                json_kind(&other)
            )))
        }
    };

    let device_id = take_string(&mut fields, DEVICE_ID)?;
    if device_id.is_empty() {
        return Err(Error::Validation("Device ID cannot be empty".to_string()));
    }

    let temperature = take_number(&mut fields, TEMPERATURE)?;
    let humidity = take_number(&mut fields, HUMIDITY)?;
    let flow_rate = take_number(&mut fields, FLOW_RATE)?;
    let timestamp = take_string(&mut fields, TIMESTAMP)?;

    // A non-string name counts as no name at all.
    let name = match fields.remove(NAME) {
        Some(Value::String(name)) => Some(name),
        Some(other) => {
            fields.insert(NAME.to_string(), other);
            None
        }
        None => None,
    };

    Ok(Reading {
        device_id,
        name,
        temperature,
        humidity,
        flow_rate,
        timestamp,
        extra: fields,
    })
}

fn take_field(fields: &mut Map<String, Value>, field: &str) -> Result<Value> {
    match fields.remove(field) {
        Some(Value::Null) | None => Err(Error::Validation(format!(
            "missing required field '{}'",
            field
        ))),
        Some(value) => Ok(value),
    }
}

/// Keeps the number exactly as submitted; it only has to have an `f64` form.
fn take_number(fields: &mut Map<String, Value>, field: &str) -> Result<Number> {
    match take_field(fields, field)? {
        Value::Number(n) if n.as_f64().is_some() => Ok(n),
        other => Err(Error::Validation(format!(
            "field '{}' must be a number, got {}",
            field,
            json_kind(&other)
        ))),
    }
}

fn take_string(fields: &mut Map<String, Value>, field: &str) -> Result<String> {
    match take_field(fields, field)? {
        Value::String(s) => Ok(s),
        other => Err(Error::Validation(format!(
            "field '{}' must be a string, got {}",
            field,
            json_kind(&other)
        ))),
    }
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}
