//! Request and response envelopes carried inside frames.
//!
//! Envelopes are msgpack maps with named fields. Decoders ignore unknown
//! fields, so the backend may add fields without breaking older clients.

use rmpv::{Value, ValueRef};

use crate::error::{FrameError, Result};

/// Schema-free msgpack value used for call params and results.
///
/// Carries every msgpack type the backend may send, including `bin`,
/// `ext` and maps with non-string keys.
pub type Payload = Value;

/// Outbound envelope: one method call on a backend module.
#[derive(Debug, Clone, PartialEq)]
pub struct CallRequest {
    /// Target module on the backend.
    pub module_id: String,
    /// Method name within the module.
    pub method: String,
    /// Caller-supplied arguments.
    pub params: Payload,
    /// Opaque session/origin tag forwarded to the backend.
    pub session_origin: String,
}

impl CallRequest {
    pub fn new(
        module_id: impl Into<String>,
        method: impl Into<String>,
        params: Payload,
        session_origin: impl Into<String>,
    ) -> Self {
        Self {
            module_id: module_id.into(),
            method: method.into(),
            params,
            session_origin: session_origin.into(),
        }
    }

    pub fn encode(&self) -> Result<Vec<u8>> {
        write_envelope(&ValueRef::Map(vec![
            (ValueRef::from("module_id"), ValueRef::from(self.module_id.as_str())),
            (ValueRef::from("method"), ValueRef::from(self.method.as_str())),
            (ValueRef::from("params"), self.params.as_ref()),
            (
                ValueRef::from("session_origin"),
                ValueRef::from(self.session_origin.as_str()),
            ),
        ]))
    }

    /// Parse a request envelope.
    ///
    /// `unified_msg_origin` is accepted for `session_origin`. A missing
    /// `module_id` is empty and missing `params` are an empty map.
    pub fn decode(bytes: &[u8]) -> Result<Self> {
        let mut request = Self::new("", "", empty_params(), "");
        let mut method = None;
        let mut origin = None;

        for (key, value) in envelope_fields(decode_payload(bytes)?, "request")? {
            match key.as_str() {
                Some("module_id") => request.module_id = text(value, "module_id")?,
                Some("method") => method = Some(text(value, "method")?),
                Some("params") => request.params = value,
                Some("session_origin" | "unified_msg_origin") => {
                    origin = Some(text(value, "session_origin")?);
                }
                _ => {}
            }
        }

        request.method = method.ok_or_else(|| missing("method"))?;
        request.session_origin = origin.ok_or_else(|| missing("session_origin"))?;
        Ok(request)
    }
}

/// Inbound envelope: the outcome of one call.
#[derive(Debug, Clone, PartialEq)]
pub struct CallResponse {
    /// Whether the backend executed the call successfully.
    pub ok: bool,
    /// Result data. `nil` and a missing field both decode as `None`.
    pub data: Option<Payload>,
    /// Human-readable failure reason; meaningful only when `ok` is false.
    pub error_message: String,
}

impl CallResponse {
    /// A successful reply carrying `data`.
    pub fn success(data: Payload) -> Self {
        Self {
            ok: true,
            data: Some(data),
            error_message: String::new(),
        }
    }

    /// A failed reply carrying `message`.
    pub fn failure(message: impl Into<String>) -> Self {
        Self {
            ok: false,
            data: None,
            error_message: message.into(),
        }
    }

    /// Split into the data on success or the error message on failure.
    pub fn into_result(self) -> std::result::Result<Option<Payload>, String> {
        if self.ok {
            Ok(self.data)
        } else {
            Err(self.error_message)
        }
    }

    pub fn encode(&self) -> Result<Vec<u8>> {
        write_envelope(&ValueRef::Map(vec![
            (ValueRef::from("ok"), ValueRef::Boolean(self.ok)),
            (
                ValueRef::from("data"),
                self.data.as_ref().map_or(ValueRef::Nil, Value::as_ref),
            ),
            (
                ValueRef::from("error_message"),
                ValueRef::from(self.error_message.as_str()),
            ),
        ]))
    }

    /// Parse a response envelope.
    ///
    /// `success` is accepted for `ok`; a missing `error_message` is empty.
    pub fn decode(bytes: &[u8]) -> Result<Self> {
        let mut ok = None;
        let mut data = None;
        let mut error_message = String::new();

        for (key, value) in envelope_fields(decode_payload(bytes)?, "response")? {
            match key.as_str() {
                Some("ok" | "success") => {
                    ok = Some(value.as_bool().ok_or_else(|| wrong_type("ok", "a bool"))?);
                }
                Some("data") => data = (!value.is_nil()).then_some(value),
                Some("error_message") if value.is_nil() => error_message.clear(),
                Some("error_message") => error_message = text(value, "error_message")?,
                _ => {}
            }
        }

        Ok(Self {
            ok: ok.ok_or_else(|| missing("ok"))?,
            data,
            error_message,
        })
    }
}

/// Encode a value as msgpack.
pub fn encode_payload(value: &Payload) -> Result<Vec<u8>> {
    write_envelope(&value.as_ref())
}

/// Parse msgpack bytes holding exactly one value.
///
/// Fails with [`FrameError::MalformedPayload`] on invalid msgpack or on
/// bytes left over after the value.
pub fn decode_payload(bytes: &[u8]) -> Result<Payload> {
    let mut rest = bytes;
    let value =
        rmpv::decode::read_value(&mut rest).map_err(|e| FrameError::MalformedPayload(e.to_string()))?;
    if !rest.is_empty() {
        return Err(FrameError::MalformedPayload(format!(
            "{} trailing byte(s) after value",
            rest.len()
        )));
    }
    Ok(value)
}

fn write_envelope(value: &ValueRef<'_>) -> Result<Vec<u8>> {
    let mut buf = Vec::new();
    rmpv::encode::write_value_ref(&mut buf, value).map_err(|e| FrameError::Encode(e.to_string()))?;
    Ok(buf)
}

fn envelope_fields(value: Payload, what: &str) -> Result<Vec<(Payload, Payload)>> {
    match value {
        Value::Map(fields) => Ok(fields),
        _ => Err(FrameError::MalformedPayload(format!("{what} envelope is not a map"))),
    }
}

fn text(value: Payload, field: &str) -> Result<String> {
    match value {
        Value::String(s) => s.into_str().ok_or_else(|| wrong_type(field, "valid UTF-8")),
        _ => Err(wrong_type(field, "a string")),
    }
}

fn missing(field: &str) -> FrameError {
    FrameError::MalformedPayload(format!("envelope has no `{field}` field"))
}

fn wrong_type(field: &str, expected: &str) -> FrameError {
    FrameError::MalformedPayload(format!("envelope field `{field}` is not {expected}"))
}

fn empty_params() -> Payload {
    Value::Map(Vec::new())
}
