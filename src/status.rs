//! HTTP status codes.
//!
//! The pipeline only cares about the class of a status (success, client
//! error, server error), so [`Status`] is an open newtype over `u16` with
//! named constants for the codes the framework itself produces.
//!
//! ```rust
//! use ferrule::{Response, Status, StatusClass};
//!
//! let res = Response::status(Status::NO_CONTENT);
//! assert_eq!(res.status_code().class(), StatusClass::Success);
//!
//! // any registered or private code works
//! let teapot = Status::from_u16(418).unwrap();
//! assert!(teapot.is_client_error());
//! ```

use std::fmt;

/// An HTTP status code in the range `100..=999`.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq, PartialOrd, Ord)]
pub struct Status(u16);

/// The semantic group a status code belongs to.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum StatusClass {
    Informational, // 1xx
    Success,       // 2xx
    Redirection,   // 3xx
    ClientError,   // 4xx
    ServerError,   // 5xx
    Unclassified,  // 6xx..9xx, legal on the wire but meaningless
}

impl Status {
    pub const OK: Status = Status(200);
    pub const CREATED: Status = Status(201);
    pub const ACCEPTED: Status = Status(202);
    pub const NO_CONTENT: Status = Status(204);
    pub const MOVED_PERMANENTLY: Status = Status(301);
    pub const FOUND: Status = Status(302);
    pub const NOT_MODIFIED: Status = Status(304);
    pub const BAD_REQUEST: Status = Status(400);
    pub const UNAUTHORIZED: Status = Status(401);
    pub const FORBIDDEN: Status = Status(403);
    pub const NOT_FOUND: Status = Status(404);
    pub const METHOD_NOT_ALLOWED: Status = Status(405);
    pub const CONFLICT: Status = Status(409);
    pub const UNPROCESSABLE_CONTENT: Status = Status(422);
    pub const TOO_MANY_REQUESTS: Status = Status(429);
    pub const INTERNAL_SERVER_ERROR: Status = Status(500);
    pub const NOT_IMPLEMENTED: Status = Status(501);
    pub const BAD_GATEWAY: Status = Status(502);
    pub const SERVICE_UNAVAILABLE: Status = Status(503);
    pub const GATEWAY_TIMEOUT: Status = Status(504);

    /// Returns `None` for codes outside `100..=999`.
    pub const fn from_u16(code: u16) -> Option<Self> {
        if code >= 100 && code <= 999 { Some(Self(code)) } else { None }
    }

    pub const fn as_u16(self) -> u16 {
        self.0
    }

    pub const fn class(self) -> StatusClass {
        match self.0 / 100 {
            1 => StatusClass::Informational,
            2 => StatusClass::Success,
            3 => StatusClass::Redirection,
            4 => StatusClass::ClientError,
            5 => StatusClass::ServerError,
            _ => StatusClass::Unclassified,
        }
    }

    pub const fn is_success(self) -> bool {
        matches!(self.class(), StatusClass::Success)
    }

    pub const fn is_client_error(self) -> bool {
        matches!(self.class(), StatusClass::ClientError)
    }

    pub const fn is_server_error(self) -> bool {
        matches!(self.class(), StatusClass::ServerError)
    }
}

impl From<Status> for u16 {
    fn from(s: Status) -> u16 {
        s.0
    }
}

impl From<Status> for http::StatusCode {
    fn from(s: Status) -> Self {
        // Every `Status` is within the range `StatusCode` accepts.
        http::StatusCode::from_u16(s.0).unwrap_or(http::StatusCode::INTERNAL_SERVER_ERROR)
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classes_follow_the_hundreds_digit() {
        assert_eq!(Status::from_u16(101).unwrap().class(), StatusClass::Informational);
        assert_eq!(Status::OK.class(), StatusClass::Success);
        assert_eq!(Status::FOUND.class(), StatusClass::Redirection);
        assert_eq!(Status::NOT_FOUND.class(), StatusClass::ClientError);
        assert_eq!(Status::BAD_GATEWAY.class(), StatusClass::ServerError);
        assert_eq!(Status::from_u16(799).unwrap().class(), StatusClass::Unclassified);
    }

    #[test]
    fn rejects_out_of_range_codes() {
        assert!(Status::from_u16(99).is_none());
        assert!(Status::from_u16(1000).is_none());
    }

    #[test]
    fn converts_to_http_status_code() {
        let code: http::StatusCode = Status::INTERNAL_SERVER_ERROR.into();
        assert_eq!(code, http::StatusCode::INTERNAL_SERVER_ERROR);
    }
}
