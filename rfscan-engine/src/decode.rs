use rfscan_messages::ScanFrame;
use serde_json::Value;

/// Why a scan payload could not be turned into a frame.
#[derive(Debug, thiserror::Error)]
pub enum DecodeError {
    #[error("malformed frame payload: {0}")]
    Json(#[from] serde_json::Error),

    #[error("frame field `{field}` is not a sequence")]
    NotASequence { field: &'static str },
}

/// Decode one event payload.
///
/// `Ok(None)` means the payload parsed but carries no usable frame: it is
/// falsy, not an object, or `frequencies`/`values` is missing or falsy. The
/// caller leaves the chart untouched in that case.
///
/// Sequences are taken as given. Elements that are not numbers become `NaN`
/// and the two lengths are not compared.
pub fn decode_frame(payload: &str) -> Result<Option<ScanFrame>, DecodeError> {
    let parsed: Value = serde_json::from_str(payload)?;

    let Value::Object(fields) = &parsed else {
        return Ok(None);
    };

    let frequencies = fields.get("frequencies").filter(|v| is_truthy(v));
    let values = fields.get("values").filter(|v| is_truthy(v));
    let (Some(frequencies), Some(values)) = (frequencies, values) else {
        return Ok(None);
    };

    Ok(Some(ScanFrame::new(
        to_sequence("frequencies", frequencies)?,
        to_sequence("values", values)?,
    )))
}

/// JavaScript truthiness, which is what the scan stream's producers assume.
fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().is_some_and(|f| f != 0.0 && !f.is_nan()),
        Value::String(s) => !s.is_empty(),
        Value::Array(_) | Value::Object(_) => true,
    }
}

fn to_sequence(field: &'static str, value: &Value) -> Result<Vec<f64>, DecodeError> {
    let Value::Array(items) = value else {
        return Err(DecodeError::NotASequence { field });
    };

    Ok(items
        .iter()
        .map(|item| match item {
            Value::Number(n) => n.as_f64().unwrap_or(f64::NAN),
            Value::String(s) => s.trim().parse().unwrap_or(f64::NAN),
            _ => f64::NAN,
        })
        .collect())
}
