use async_trait::async_trait;

use crate::{
    Comment, CommentId, Error, Friendship, FriendshipId, NewPost, Post, PostId, ProfilePatch,
    User, UserId,
};

/// Everything the client needs from the backing service. Implementations own
/// authentication and transport-level retries; callers only ever see
/// already-canonical records or an [`Error`].
#[async_trait]
pub trait Backend: Send + Sync {
    /// Exchanges the refresh token for a fresh access token.
    async fn renew_session(&self) -> Result<(), Error>;

    async fn whoami(&self) -> Result<User, Error>;

    /// Pages are 1-based and served newest-first.
    async fn fetch_posts(&self, page: u32, limit: u32) -> Result<Vec<Post>, Error>;
    async fn fetch_post(&self, post: PostId) -> Result<Post, Error>;
    async fn submit_post(&self, post: NewPost) -> Result<Post, Error>;

    async fn fetch_root_comments(&self, post: PostId) -> Result<Vec<Comment>, Error>;
    async fn fetch_replies(&self, comment: CommentId) -> Result<Vec<Comment>, Error>;
    async fn submit_root_comment(&self, post: PostId, content: String) -> Result<Comment, Error>;
    async fn submit_reply(&self, parent: CommentId, content: String) -> Result<Comment, Error>;
    async fn submit_edit(&self, comment: CommentId, content: String) -> Result<Comment, Error>;

    async fn fetch_user(&self, user: UserId) -> Result<User, Error>;
    async fn fetch_user_posts(&self, user: UserId) -> Result<Vec<Post>, Error>;
    async fn update_profile(&self, patch: ProfilePatch) -> Result<User, Error>;

    async fn fetch_friends(&self, user: UserId) -> Result<Vec<User>, Error>;
    /// The friendship record between the logged-in user and `user`, whatever
    /// its direction and status, if there is one.
    async fn friendship_with(&self, user: UserId) -> Result<Option<Friendship>, Error>;
    async fn fetch_friend_requests(&self) -> Result<Vec<Friendship>, Error>;
    async fn send_friend_request(&self, to: UserId) -> Result<Friendship, Error>;
    async fn accept_friend_request(&self, request: FriendshipId) -> Result<Friendship, Error>;
    async fn decline_friend_request(&self, request: FriendshipId) -> Result<(), Error>;
    async fn remove_friendship(&self, friendship: FriendshipId) -> Result<(), Error>;
}
