use anyhow::{anyhow, Context};
use serde_json::json;

use crate::{CommentId, FriendshipId, PostId, UserId};

#[derive(Debug, Eq, PartialEq, thiserror::Error)]
pub enum Error {
    #[error("Unknown error: {0}")]
    Unknown(String),

    #[error("Session expired")]
    SessionExpired,

    #[error("Permission denied")]
    PermissionDenied,

    #[error("Record is missing its id")]
    MissingId,

    #[error("Content cannot be empty")]
    EmptyContent,

    #[error("Comment not found: {0}")]
    CommentNotFound(CommentId),

    #[error("Post not found: {0}")]
    PostNotFound(PostId),

    #[error("User not found: {0}")]
    UserNotFound(UserId),

    #[error("Friendship not found: {0}")]
    FriendshipNotFound(FriendshipId),

    #[error("Friend request already pending with {0}")]
    FriendRequestExists(UserId),

    #[error("Username already used {0}")]
    UsernameTaken(String),
}

impl Error {
    pub fn status_code(&self) -> http::StatusCode {
        use http::StatusCode;
        match self {
            Error::Unknown(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Error::SessionExpired => StatusCode::UNAUTHORIZED,
            Error::PermissionDenied => StatusCode::FORBIDDEN,
            Error::MissingId => StatusCode::BAD_REQUEST,
            Error::EmptyContent => StatusCode::BAD_REQUEST,
            Error::CommentNotFound(_) => StatusCode::NOT_FOUND,
            Error::PostNotFound(_) => StatusCode::NOT_FOUND,
            Error::UserNotFound(_) => StatusCode::NOT_FOUND,
            Error::FriendshipNotFound(_) => StatusCode::NOT_FOUND,
            Error::FriendRequestExists(_) => StatusCode::CONFLICT,
            Error::UsernameTaken(_) => StatusCode::CONFLICT,
        }
    }

    pub fn contents(&self) -> Vec<u8> {
        serde_json::to_vec(&match self {
            Error::Unknown(msg) => json!({
                "message": msg,
                "type": "unknown",
            }),
            Error::SessionExpired => json!({
                "message": "session expired",
                "type": "session-expired",
            }),
            Error::PermissionDenied => json!({
                "message": "permission denied",
                "type": "permission-denied",
            }),
            Error::MissingId => json!({
                "message": "record is missing its id",
                "type": "missing-id",
            }),
            Error::EmptyContent => json!({
                "message": "content cannot be empty",
                "type": "empty-content",
            }),
            Error::CommentNotFound(c) => json!({
                "message": "comment not found",
                "type": "comment-not-found",
                "comment": c.0,
            }),
            Error::PostNotFound(p) => json!({
                "message": "post not found",
                "type": "post-not-found",
                "post": p.0,
            }),
            Error::UserNotFound(u) => json!({
                "message": "user not found",
                "type": "user-not-found",
                "user": u.0,
            }),
            Error::FriendshipNotFound(f) => json!({
                "message": "friendship not found",
                "type": "friendship-not-found",
                "friendship": f.0,
            }),
            Error::FriendRequestExists(u) => json!({
                "message": "a friend request is already pending",
                "type": "friend-request-exists",
                "user": u.0,
            }),
            Error::UsernameTaken(n) => json!({
                "message": "username already used",
                "type": "username-taken",
                "username": n,
            }),
        })
        .expect("serializing error contents")
    }

    pub fn parse(body: &[u8]) -> anyhow::Result<Error> {
        let data: serde_json::Value =
            serde_json::from_slice(body).context("parsing error contents")?;
        let field = |name: &'static str| {
            data.get(name)
                .and_then(|f| f.as_str())
                .map(String::from)
                .ok_or_else(|| anyhow!("error contents has no string field {name:?}"))
        };
        Ok(
            match data
                .get("type")
                .and_then(|t| t.as_str())
                .ok_or_else(|| anyhow!("error type is not a string"))?
            {
                "unknown" => Error::Unknown(String::from(
                    data.get("message")
                        .and_then(|msg| msg.as_str())
                        .unwrap_or(""),
                )),
                "session-expired" => Error::SessionExpired,
                "permission-denied" => Error::PermissionDenied,
                "missing-id" => Error::MissingId,
                "empty-content" => Error::EmptyContent,
                "comment-not-found" => Error::CommentNotFound(CommentId(field("comment")?)),
                "post-not-found" => Error::PostNotFound(PostId(field("post")?)),
                "user-not-found" => Error::UserNotFound(UserId(field("user")?)),
                "friendship-not-found" => {
                    Error::FriendshipNotFound(FriendshipId(field("friendship")?))
                }
                "friend-request-exists" => Error::FriendRequestExists(UserId(field("user")?)),
                "username-taken" => Error::UsernameTaken(field("username")?),
                _ => return Err(anyhow!("error contents has unknown type")),
            },
        )
    }
}
