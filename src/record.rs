//! Log records and the builder that produces them.
//!
//! Callers describe an event with a [`LogRequest`], which only needs the
//! fields they care about. [`RecordBuilder`] turns it into a [`LogRecord`]:
//! the payload is rendered to text, the timestamp, severity and function
//! name are stamped, defaults are filled in and the result is validated.
//! Building never touches the network.
//!
//! # Example
//!
//! ```rust
//! use mq_logger::record::{LogRequest, RecordBuilder, Severity};
//!
//! let builder = RecordBuilder::new("login", "/api/v1/login");
//! let record = builder
//!     .build(
//!         LogRequest {
//!             error_code: 7001,
//!             client_message_ru: "ok".to_string(),
//!             event_type: "auth".to_string(),
//!             ..Default::default()
//!         },
//!         Severity::Info,
//!     )
//!     .unwrap();
//!
//! assert_eq!(record.status_code, 200);
//! assert_eq!(record.api_endpoint, "/api/v1/login");
//! ```

use crate::Result;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Status code stamped on records that do not carry one.
pub const DEFAULT_STATUS_CODE: u16 = 200;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Info,
    Warning,
    Error,
    Critical,
}

impl Severity {
    pub fn as_str(&self) -> &'static str {
        match self {
            Severity::Info => "info",
            Severity::Warning => "warning",
            Severity::Error => "error",
            Severity::Critical => "critical",
        }
    }

    /// Error and critical records must carry the request payload.
    pub fn requires_payload(&self) -> bool {
        matches!(self, Severity::Error | Severity::Critical)
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Severity {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "info" => Ok(Severity::Info),
            "warn" | "warning" => Ok(Severity::Warning),
            "error" => Ok(Severity::Error),
            "critical" => Ok(Severity::Critical),
            other => Err(format!("unknown severity '{}'", other)),
        }
    }
}

/// The request body attached to a log event, in whatever form the caller
/// has it. Rendered to a single string when the record is built.
#[derive(Debug, Clone, Default, PartialEq)]
pub enum RequestPayload {
    #[default]
    Empty,
    /// Raw body, decoded as UTF-8 (invalid sequences are replaced).
    Bytes(Vec<u8>),
    Text(String),
    Structured(serde_json::Value),
}

impl RequestPayload {
    /// Captures any serializable value as a structured payload.
    ///
    /// A value with no JSON form (e.g. a map with non-string keys) fails
    /// here with [`crate::Error::Serialization`], before any record exists.
    pub fn json<T: Serialize + ?Sized>(value: &T) -> Result<Self> {
        Ok(RequestPayload::Structured(serde_json::to_value(value)?))
    }

    /// The string stored in `request_payload`. Raw bytes and text pass
    /// through, structured values become compact JSON.
    pub fn render(&self) -> Result<String> {
        Ok(match self {
            RequestPayload::Empty => String::new(),
            RequestPayload::Bytes(bytes) => String::from_utf8_lossy(bytes).into_owned(),
            RequestPayload::Text(text) => text.clone(),
            RequestPayload::Structured(value) => serde_json::to_string(value)?,
        })
    }
}

impl From<String> for RequestPayload {
    fn from(text: String) -> Self {
        RequestPayload::Text(text)
    }
}

impl From<&str> for RequestPayload {
    fn from(text: &str) -> Self {
        RequestPayload::Text(text.to_string())
    }
}

impl From<Vec<u8>> for RequestPayload {
    fn from(bytes: Vec<u8>) -> Self {
        RequestPayload::Bytes(bytes)
    }
}

impl From<&[u8]> for RequestPayload {
    fn from(bytes: &[u8]) -> Self {
        RequestPayload::Bytes(bytes.to_vec())
    }
}

impl From<serde_json::Value> for RequestPayload {
    fn from(value: serde_json::Value) -> Self {
        RequestPayload::Structured(value)
    }
}

/// What a caller supplies to log an event. Anything left at its default
/// is either filled in by [`RecordBuilder`] or omitted from the record.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LogRequest {
    pub error_code: u32,
    pub client_message_uz: String,
    pub client_message_ru: String,
    pub error_message: String,
    pub details_uz: String,
    pub details_ru: String,
    /// Falls back to the logger's endpoint when empty.
    pub api_endpoint: String,
    pub method: String,
    /// Falls back to [`DEFAULT_STATUS_CODE`] when zero.
    pub status_code: u16,
    pub request_payload: RequestPayload,
    pub event_type: String,
    pub response_data: String,
    pub merchant_api_key: String,
}

/// A fully resolved log record, as published on the log queue.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogRecord {
    pub timestamp: DateTime<Utc>,
    pub error_level: Severity,
    pub error_code: u32,
    pub client_message_uz: String,
    pub client_message_ru: String,
    pub error_message: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub details_uz: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub details_ru: String,
    pub api_endpoint: String,
    pub method: String,
    pub function_name: String,
    pub status_code: u16,
    pub request_payload: String,
    pub event_type: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub response_data: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub merchant_api_key: String,
}

impl LogRecord {
    pub fn to_json(&self) -> Result<Vec<u8>> {
        Ok(serde_json::to_vec(self)?)
    }

    pub fn from_json(body: &[u8]) -> Result<Self> {
        Ok(serde_json::from_slice(body)?)
    }

    pub fn validate(&self) -> std::result::Result<(), ValidationError> {
        if self.error_code == 0 {
            return Err(ValidationError::MissingErrorCode);
        }
        if self.client_message_uz.is_empty() && self.client_message_ru.is_empty() {
            return Err(ValidationError::MissingClientMessage);
        }
        if self.error_level.requires_payload() && self.request_payload.is_empty() {
            return Err(ValidationError::MissingRequestPayload {
                severity: self.error_level,
            });
        }
        Ok(())
    }
}

/// Why a log request was rejected.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    #[error("error_code is required")]
    MissingErrorCode,

    #[error("at least one client message (uz or ru) is required")]
    MissingClientMessage,

    #[error("request payload is required for {severity} records")]
    MissingRequestPayload { severity: Severity },
}

/// Turns [`LogRequest`]s into validated [`LogRecord`]s for one service.
#[derive(Debug, Clone)]
pub struct RecordBuilder {
    function_name: String,
    default_endpoint: String,
}

impl RecordBuilder {
    pub fn new(function_name: impl Into<String>, default_endpoint: impl Into<String>) -> Self {
        Self {
            function_name: function_name.into(),
            default_endpoint: default_endpoint.into(),
        }
    }

    pub fn function_name(&self) -> &str {
        &self.function_name
    }

    pub fn default_endpoint(&self) -> &str {
        &self.default_endpoint
    }

    /// Renders the payload, stamps the current time, applies defaults and
    /// validates.
    ///
    /// # Errors
    ///
    /// - [`crate::Error::Validation`] when a required field is missing.
    /// - [`crate::Error::Serialization`] when the payload cannot be rendered.
    ///   A [`RequestPayload::Structured`] value is already JSON, so for
    ///   caller types this error surfaces earlier, from
    ///   [`RequestPayload::json`].
    pub fn build(&self, request: LogRequest, severity: Severity) -> Result<LogRecord> {
        self.build_at(request, severity, Utc::now())
    }

    /// Same as [`RecordBuilder::build`] with an explicit timestamp.
    pub fn build_at(
        &self,
        request: LogRequest,
        severity: Severity,
        timestamp: DateTime<Utc>,
    ) -> Result<LogRecord> {
        let request_payload = request.request_payload.render()?;

        let api_endpoint = if request.api_endpoint.is_empty() {
            self.default_endpoint.clone()
        } else {
            request.api_endpoint
        };
        let status_code = if request.status_code == 0 {
            DEFAULT_STATUS_CODE
        } else {
            request.status_code
        };

        let record = LogRecord {
            timestamp,
            error_level: severity,
            error_code: request.error_code,
            client_message_uz: request.client_message_uz,
            client_message_ru: request.client_message_ru,
            error_message: request.error_message,
            details_uz: request.details_uz,
            details_ru: request.details_ru,
            api_endpoint,
            method: request.method,
            function_name: self.function_name.clone(),
            status_code,
            request_payload,
            event_type: request.event_type,
            response_data: request.response_data,
            merchant_api_key: request.merchant_api_key,
        };

        record.validate()?;
        Ok(record)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Error;
    use serde_json::json;

    const ALL_SEVERITIES: [Severity; 4] = [
        Severity::Info,
        Severity::Warning,
        Severity::Error,
        Severity::Critical,
    ];

    fn builder() -> RecordBuilder {
        RecordBuilder::new("login", "/api/v1/login")
    }

    fn minimal_request() -> LogRequest {
        LogRequest {
            error_code: 7001,
            client_message_ru: "ok".to_string(),
            event_type: "auth".to_string(),
            ..Default::default()
        }
    }

    fn validation_error(result: Result<LogRecord>) -> ValidationError {
        match result {
            Err(Error::Validation(e)) => e,
            other => panic!("expected validation error, got {:?}", other),
        }
    }

    #[test]
    fn test_defaults_applied() {
        let record = builder().build(minimal_request(), Severity::Info).unwrap();

        assert_eq!(record.status_code, 200);
        assert_eq!(record.api_endpoint, "/api/v1/login");
        assert_eq!(record.function_name, "login");
        assert_eq!(record.error_level, Severity::Info);
        assert_eq!(record.request_payload, "");
    }

    #[test]
    fn test_explicit_values_kept() {
        let request = LogRequest {
            api_endpoint: "/api/v1/orders".to_string(),
            status_code: 404,
            method: "GET".to_string(),
            ..minimal_request()
        };

        let record = builder().build(request, Severity::Warning).unwrap();
        assert_eq!(record.status_code, 404);
        assert_eq!(record.api_endpoint, "/api/v1/orders");
        assert_eq!(record.method, "GET");
    }

    #[test]
    fn test_status_code_default_only_when_zero() {
        for status in [0u16, 200, 201, 400, 500] {
            let request = LogRequest {
                status_code: status,
                ..minimal_request()
            };
            let record = builder().build(request, Severity::Info).unwrap();
            let expected = if status == 0 { 200 } else { status };
            assert_eq!(record.status_code, expected);
        }
    }

    #[test]
    fn test_zero_error_code_rejected() {
        for severity in ALL_SEVERITIES {
            let request = LogRequest {
                error_code: 0,
                request_payload: "{}".into(),
                ..minimal_request()
            };
            assert_eq!(
                validation_error(builder().build(request, severity)),
                ValidationError::MissingErrorCode
            );
        }
    }

    #[test]
    fn test_missing_client_messages_rejected() {
        for severity in ALL_SEVERITIES {
            let request = LogRequest {
                client_message_ru: String::new(),
                client_message_uz: String::new(),
                request_payload: "{}".into(),
                ..minimal_request()
            };
            assert_eq!(
                validation_error(builder().build(request, severity)),
                ValidationError::MissingClientMessage
            );
        }
    }

    #[test]
    fn test_either_client_message_suffices() {
        let uz_only = LogRequest {
            client_message_ru: String::new(),
            client_message_uz: "xato".to_string(),
            ..minimal_request()
        };
        assert!(builder().build(uz_only, Severity::Info).is_ok());
        assert!(builder().build(minimal_request(), Severity::Info).is_ok());
    }

    #[test]
    fn test_payload_required_only_for_error_and_critical() {
        for severity in ALL_SEVERITIES {
            let result = builder().build(minimal_request(), severity);
            if severity.requires_payload() {
                assert_eq!(
                    validation_error(result),
                    ValidationError::MissingRequestPayload { severity }
                );
            } else {
                assert!(result.is_ok(), "{} should not need a payload", severity);
            }
        }
    }

    #[test]
    fn test_critical_with_empty_payload() {
        let request = LogRequest {
            error_code: 4001,
            client_message_uz: "xato".to_string(),
            request_payload: "".into(),
            ..Default::default()
        };

        let err = validation_error(builder().build(request, Severity::Critical));
        assert_eq!(
            err,
            ValidationError::MissingRequestPayload {
                severity: Severity::Critical
            }
        );
        assert!(err.to_string().contains("request payload"));
    }

    #[test]
    fn test_payload_rendering() {
        assert_eq!(RequestPayload::Empty.render().unwrap(), "");
        assert_eq!(
            RequestPayload::from(b"raw body".as_slice()).render().unwrap(),
            "raw body"
        );
        assert_eq!(RequestPayload::from("text body").render().unwrap(), "text body");
        assert_eq!(
            RequestPayload::from(json!({"order_id": 17})).render().unwrap(),
            r#"{"order_id":17}"#
        );

        #[derive(Serialize)]
        struct Login<'a> {
            username: &'a str,
        }
        let payload = RequestPayload::json(&Login { username: "ali" }).unwrap();
        assert_eq!(payload.render().unwrap(), r#"{"username":"ali"}"#);
    }

    #[test]
    fn test_structured_payload_satisfies_error_level() {
        let request = LogRequest {
            request_payload: json!({"amount": 100}).into(),
            ..minimal_request()
        };
        let record = builder().build(request, Severity::Error).unwrap();
        assert_eq!(record.request_payload, r#"{"amount":100}"#);
    }

    #[test]
    fn test_unserializable_payload() {
        use std::collections::HashMap;

        // JSON object keys must be strings.
        let mut map = HashMap::new();
        map.insert((1, 2), "tuple key");

        assert!(matches!(
            RequestPayload::json(&map),
            Err(Error::Serialization(_))
        ));
    }

    #[test]
    fn test_wire_round_trip() {
        let request = LogRequest {
            details_uz: "batafsil".to_string(),
            request_payload: "{\"a\":1}".into(),
            merchant_api_key: "mk-1".to_string(),
            ..minimal_request()
        };
        let record = builder().build(request, Severity::Error).unwrap();

        let body = record.to_json().unwrap();
        let parsed = LogRecord::from_json(&body).unwrap();
        assert_eq!(parsed, record);
    }

    #[test]
    fn test_wire_field_names() {
        let record = builder().build(minimal_request(), Severity::Warning).unwrap();
        let value: serde_json::Value = serde_json::from_slice(&record.to_json().unwrap()).unwrap();

        assert_eq!(value["error_level"], "warning");
        assert_eq!(value["error_code"], 7001);
        assert_eq!(value["client_message_ru"], "ok");
        assert_eq!(value["status_code"], 200);
        assert_eq!(value["event_type"], "auth");
        assert!(value["timestamp"].is_string());
        // Optional fields are left out when empty.
        assert!(value.get("details_uz").is_none());
        assert!(value.get("response_data").is_none());
        assert!(value.get("merchant_api_key").is_none());
    }

    #[test]
    fn test_severity_parsing() {
        assert_eq!("info".parse::<Severity>().unwrap(), Severity::Info);
        assert_eq!("WARN".parse::<Severity>().unwrap(), Severity::Warning);
        assert_eq!("warning".parse::<Severity>().unwrap(), Severity::Warning);
        assert_eq!("critical".parse::<Severity>().unwrap(), Severity::Critical);
        assert!("fatal".parse::<Severity>().is_err());
        assert_eq!(Severity::Error.to_string(), "error");
    }
}
