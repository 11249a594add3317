//! Jobs: boundary validation, the job record, and its queue wire format.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map as JsonMap, Value as JsonValue};

use crate::error::{DecodeError, ValidationError, ValidationResult};
use crate::id::JobId;
use crate::operation::Operation;

/// Untyped submission input, exactly as received at the boundary.
///
/// Every field is optional so that presence and type checks happen in one
/// place ([`CalcPayload::try_from`]) instead of inside the computation.
///
/// Only a JSON object is accepted; positional (array) bodies fail to deserialize.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(from = "JsonMap<String, JsonValue>")]
pub struct RawCalcRequest {
    pub a: Option<JsonValue>,
    pub b: Option<JsonValue>,
    pub op: Option<JsonValue>,
}

impl From<JsonMap<String, JsonValue>> for RawCalcRequest {
    fn from(mut fields: JsonMap<String, JsonValue>) -> Self {
        Self {
            a: fields.remove("a"),
            b: fields.remove("b"),
            op: fields.remove("op"),
        }
    }
}

/// Validated computation input.
#[derive(Debug, Copy, Clone, PartialEq, Serialize, Deserialize)]
pub struct CalcPayload {
    pub a: f64,
    pub b: f64,
    pub op: Operation,
}

impl CalcPayload {
    pub fn new(a: f64, b: f64, op: Operation) -> Self {
        Self { a, b, op }
    }
}

impl TryFrom<RawCalcRequest> for CalcPayload {
    type Error = ValidationError;

    fn try_from(raw: RawCalcRequest) -> Result<Self, Self::Error> {
        let op = parse_operation(raw.op.as_ref())?;
        let a = coerce_number("a", raw.a.as_ref())?;
        let b = coerce_number("b", raw.b.as_ref())?;
        Ok(Self { a, b, op })
    }
}

fn parse_operation(value: Option<&JsonValue>) -> ValidationResult<Operation> {
    match value {
        None | Some(JsonValue::Null) => Err(ValidationError::MissingField("op")),
        Some(JsonValue::String(s)) => s.parse(),
        Some(other) => Err(ValidationError::UnknownOperation(other.to_string())),
    }
}

/// Numbers and numeric strings are accepted; everything else is rejected.
fn coerce_number(field: &'static str, value: Option<&JsonValue>) -> ValidationResult<f64> {
    let n = match value {
        None | Some(JsonValue::Null) => return Err(ValidationError::MissingField(field)),
        Some(JsonValue::Number(n)) => n.as_f64().ok_or_else(|| ValidationError::NotNumeric {
            field,
            value: n.to_string(),
        })?,
        Some(JsonValue::String(s)) => {
            s.trim()
                .parse::<f64>()
                .map_err(|_| ValidationError::NotNumeric {
                    field,
                    value: s.clone(),
                })?
        }
        Some(other) => {
            return Err(ValidationError::NotNumeric {
                field,
                value: other.to_string(),
            });
        }
    };

    if !n.is_finite() {
        return Err(ValidationError::NonFinite(field));
    }
    Ok(n)
}

/// One unit of submitted work. Immutable once created.
#[derive(Debug, Clone, PartialEq)]
pub struct Job {
    pub id: JobId,
    pub payload: CalcPayload,
    pub submitted_at: DateTime<Utc>,
}

/// Queue record: one job per message.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobMessage {
    pub id: JobId,
    pub a: f64,
    pub b: f64,
    pub op: Operation,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub submitted_at: Option<DateTime<Utc>>,
}

impl Job {
    /// Create a job with a freshly generated id.
    pub fn new(payload: CalcPayload) -> Self {
        Self {
            id: JobId::new(),
            payload,
            submitted_at: Utc::now(),
        }
    }

    pub fn from_parts(id: JobId, payload: CalcPayload, submitted_at: DateTime<Utc>) -> Self {
        Self {
            id,
            payload,
            submitted_at,
        }
    }

    pub fn to_message(&self) -> JobMessage {
        JobMessage {
            id: self.id,
            a: self.payload.a,
            b: self.payload.b,
            op: self.payload.op,
            submitted_at: Some(self.submitted_at),
        }
    }

    /// Serialize for the queue channel.
    pub fn encode(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(&self.to_message())
    }

    /// Decode a queue record.
    ///
    /// The id is extracted first so that a record with a usable id but bad
    /// fields can still be answered with an error outcome. Records from
    /// submitters that omit `submitted_at` get the decode time instead.
    pub fn decode(body: &str) -> Result<Job, DecodeError> {
        let value: JsonValue =
            serde_json::from_str(body).map_err(|e| DecodeError::MissingId(e.to_string()))?;

        let id = value
            .get("id")
            .and_then(JsonValue::as_str)
            .ok_or_else(|| DecodeError::MissingId("no string `id` field".to_string()))?
            .parse::<JobId>()
            .map_err(|e| DecodeError::MissingId(e.to_string()))?;

        let msg: JobMessage = serde_json::from_value(value).map_err(|e| DecodeError::Malformed {
            job_id: id,
            reason: e.to_string(),
        })?;

        Ok(Job {
            id: msg.id,
            payload: CalcPayload::new(msg.a, msg.b, msg.op),
            submitted_at: msg.submitted_at.unwrap_or_else(Utc::now),
        })
    }
}
