mod auth;
pub use auth::{AuthToken, Credentials, RenewSession, Session};

mod backend;
pub use backend::Backend;

mod comment;
pub use comment::{Comment, CommentId, NewComment};

mod error;
pub use error::Error;

mod friend;
pub use friend::{Friendship, FriendshipId, FriendshipStatus};

mod post;
pub use post::{NewPost, Post, PostId};

mod user;
pub use user::{ProfilePatch, User, UserId};

pub use uuid::{uuid, Uuid};
pub type Time = chrono::DateTime<chrono::Utc>;

/// Identifiers are backend-assigned opaque strings; the only malformed shape
/// is an empty one.
pub fn validate_id(id: &str) -> Result<(), Error> {
    match id.is_empty() {
        true => Err(Error::MissingId),
        false => Ok(()),
    }
}

pub fn validate_content(content: &str) -> Result<(), Error> {
    match content.trim().is_empty() {
        true => Err(Error::EmptyContent),
        false => Ok(()),
    }
}
