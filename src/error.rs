use axum::{http::StatusCode, response::IntoResponse};
use std::fmt::Display;

pub type AppResult<T> = Result<T, AppErr>;

/* ── process / HTTP level ── */
#[derive(thiserror::Error, Debug)]
pub enum AppErr {
    #[error("Bad request: {0}")]
    Bad(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("IO: {0}")]
    Io(#[from] std::io::Error),

    #[error("Config: {0}")]
    Config(String),
}

impl IntoResponse for AppErr {
    fn into_response(self) -> axum::response::Response {
        let (code, body) = match self {
            AppErr::Bad(msg)      => (StatusCode::BAD_REQUEST, msg),
            AppErr::NotFound(msg) => (StatusCode::NOT_FOUND, msg),
            other                 => (StatusCode::INTERNAL_SERVER_ERROR, other.to_string()),
        };
        (code, body).into_response()
    }
}

pub fn bad<E: Display>(e: E) -> AppErr { AppErr::Bad(e.to_string()) }

/* ── room level: always replied to the caller, never broadcast ── */
pub type RoomResult<T> = Result<T, RoomErr>;

#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum RoomErr {
    #[error("room {0} not found")]
    RoomNotFound(String),

    #[error("room {0} is full")]
    RoomFull(String),

    #[error("only the host may do that")]
    NotAuthorized,

    #[error("song candidate is blank or was never requested")]
    InvalidCandidate,

    #[error("user {0} is not in this room")]
    UnknownMember(String),
}

impl RoomErr {
    /// Stable machine-readable tag sent alongside the message.
    pub fn kind(&self) -> &'static str {
        match self {
            RoomErr::RoomNotFound(_)  => "roomNotFound",
            RoomErr::RoomFull(_)      => "roomFull",
            RoomErr::NotAuthorized    => "notAuthorized",
            RoomErr::InvalidCandidate => "invalidCandidate",
            RoomErr::UnknownMember(_) => "unknownMember",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn room_errors_carry_kind_and_message() {
        let e = RoomErr::RoomFull("123456".into());
        assert_eq!(e.kind(), "roomFull");
        assert_eq!(e.to_string(), "room 123456 is full");
        assert_eq!(RoomErr::NotAuthorized.kind(), "notAuthorized");
    }

    #[test]
    fn app_errors_map_to_status_codes() {
        let resp = bad("nope").into_response();
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
        let resp = AppErr::NotFound("room 1".into()).into_response();
        assert_eq!(resp.status(), StatusCode::NOT_FOUND);
        let resp = AppErr::Config("PORT".into()).into_response();
        assert_eq!(resp.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }
}
