//! Request descriptors and the request-options builder.
//!
//! A [`Request`] describes which fields and metadata a get exchange should
//! retrieve. Three forms are recognized:
//!
//! - absent (`None`): empty options, the transport's defaults
//! - [`Request::Options`]: an already-structured [`Value`], used directly
//! - [`Request::Expr`]: the textual mini-language, currently declared but
//!   unimplemented; building it always fails

use crate::error::{ClientError, ClientResult};
use crate::value::Value;

/// A user-supplied request descriptor.
#[derive(Debug, Clone, PartialEq)]
pub enum Request {
    /// Structured request options, passed through to the transport.
    Options(Value),
    /// Textual request expression (unimplemented, always rejected).
    Expr(String),
}

impl From<Value> for Request {
    fn from(options: Value) -> Self {
        Request::Options(options)
    }
}

impl From<&str> for Request {
    fn from(expr: &str) -> Self {
        Request::Expr(expr.to_string())
    }
}

/// Translate a request descriptor into the transport's options value.
pub fn build_request(request: Option<Request>) -> ClientResult<Value> {
    match request {
        None => Ok(Value::empty_struct()),
        Some(Request::Options(options)) if options.is_struct() => Ok(options),
        Some(Request::Options(_)) => Err(ClientError::BadRequest {
            message: "request options must be a structure".to_string(),
        }),
        Some(Request::Expr(_)) => Err(ClientError::RequestExprUnsupported),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn absent_request_builds_empty_options() {
        assert_eq!(build_request(None), Ok(Value::empty_struct()));
    }

    #[test]
    fn structured_options_pass_through() {
        let options = Value::structure([("field".to_string(), Value::from("value"))]);
        assert_eq!(
            build_request(Some(options.clone().into())),
            Ok(options)
        );
    }

    #[test]
    fn scalar_options_are_rejected() {
        assert!(matches!(
            build_request(Some(Request::Options(Value::from(1)))),
            Err(ClientError::BadRequest { .. })
        ));
    }

    #[test]
    fn expression_form_is_unimplemented() {
        assert_eq!(
            build_request(Some("field(value)".into())),
            Err(ClientError::RequestExprUnsupported)
        );
    }
}
