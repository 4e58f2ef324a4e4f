// Decoding of loosely typed JSON request bodies

use crate::controller::ColorRequest;
use crate::entity::{EntityDraft, EntityId};
use crate::error::{LightError, LightResult};
use serde_json::Value;

/// Value at `key`, treating JSON null the same as an absent key
fn field<'a>(data: &'a Value, key: &str) -> Option<&'a Value> {
    data.get(key).filter(|value| !value.is_null())
}

/// Entity id from an integer or a string of digits.
pub fn entity_id(data: &Value, key: &str) -> LightResult<EntityId> {
    let value = field(data, key).ok_or_else(|| LightError::MissingField(key.to_string()))?;
    parse_id(value).ok_or_else(|| LightError::MissingField(format!("{} must be an integer", key)))
}

fn parse_id(value: &Value) -> Option<EntityId> {
    match value {
        Value::Number(n) => n.as_i64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

/// Optional parent id. Absent, null and 0 all mean "no parent".
pub fn parent_id(data: &Value) -> LightResult<Option<EntityId>> {
    match field(data, "parent_id") {
        None => Ok(None),
        Some(value) => match parse_id(value) {
            Some(0) => Ok(None),
            Some(id) => Ok(Some(id)),
            None => Err(LightError::MissingField(
                "parent_id must be an integer".to_string(),
            )),
        },
    }
}

fn address(data: &Value, key: &str) -> LightResult<usize> {
    let value = field(data, key).ok_or_else(|| LightError::MissingField(key.to_string()))?;
    value
        .as_u64()
        .and_then(|n| usize::try_from(n).ok())
        .ok_or_else(|| {
            LightError::invalid_range(format!("{} must be a non-negative integer", key))
        })
}

fn name(data: &Value) -> LightResult<String> {
    match field(data, "name") {
        Some(Value::String(name)) => Ok(name.clone()),
        Some(_) => Err(LightError::MissingField("name must be a string".to_string())),
        None => Err(LightError::MissingField("name".to_string())),
    }
}

/// Entity fields shared by create and update.
///
/// Missing fields are reported together, before any type errors.
pub fn entity_draft(data: &Value) -> LightResult<EntityDraft> {
    let missing: Vec<&str> = ["name", "start_addr", "end_addr"]
        .into_iter()
        .filter(|key| field(data, key).is_none())
        .collect();
    if !missing.is_empty() {
        return Err(LightError::MissingField(missing.join(", ")));
    }

    let mut draft = EntityDraft::new(
        name(data)?,
        address(data, "start_addr")?,
        address(data, "end_addr")?,
    );
    draft.parent_id = parent_id(data)?;
    Ok(draft)
}

/// Optional color channel or brightness as an integer.
///
/// Integer strings are accepted; anything else non-null is rejected.
fn channel(data: &Value, key: &str) -> LightResult<Option<i64>> {
    let Some(value) = field(data, key) else {
        return Ok(None);
    };
    let parsed = match value {
        Value::Number(n) => n.as_i64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    };
    parsed
        .map(Some)
        .ok_or_else(|| LightError::invalid_color(format!("{} must be an integer", key)))
}

/// Power flag: `true`/`false` or their string forms. Missing or null is off;
/// any other value counts as on.
pub fn is_on(data: &Value) -> bool {
    match field(data, "is_on") {
        None => false,
        Some(Value::Bool(on)) => *on,
        Some(Value::String(s)) => s != "false",
        Some(_) => true,
    }
}

/// Set-color request: `entity`, optional `red`, `green`, `blue`,
/// `brightness` (raw 0-255) and `is_on`.
pub fn color_request(data: &Value) -> LightResult<ColorRequest> {
    Ok(ColorRequest {
        entity_id: entity_id(data, "entity")?,
        red: channel(data, "red")?,
        green: channel(data, "green")?,
        blue: channel(data, "blue")?,
        brightness: channel(data, "brightness")?,
        is_on: is_on(data),
    })
}
