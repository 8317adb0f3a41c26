use klatsch_api::{
    Backend, Comment, CommentId, Error, Friendship, FriendshipId, NewPost, Post, PostId,
    ProfilePatch, User, UserId,
};

/// Wraps a [`Backend`] so an expired access token renews the session and
/// retries the call, once. Nothing else in the stack retries on expiry, so
/// a dead refresh token surfaces after exactly one renewal attempt.
pub struct AutoRefresh<B> {
    inner: B,
}

impl<B: Backend> AutoRefresh<B> {
    pub fn new(inner: B) -> AutoRefresh<B> {
        AutoRefresh { inner }
    }

    pub fn inner(&self) -> &B {
        &self.inner
    }
}

macro_rules! renew_and_retry {
    ( $this:ident . $method:ident ( $($arg:expr),* ) ) => {{
        match $this.inner.$method($($arg.clone()),*).await {
            Err(Error::SessionExpired) => {
                tracing::debug!("access token rejected, renewing the session");
                $this.inner.renew_session().await?;
                $this.inner.$method($($arg),*).await
            }
            res => res,
        }
    }};
}

#[async_trait::async_trait]
impl<B: Backend> Backend for AutoRefresh<B> {
    async fn renew_session(&self) -> Result<(), Error> {
        self.inner.renew_session().await
    }

    async fn whoami(&self) -> Result<User, Error> {
        renew_and_retry!(self.whoami())
    }

    async fn fetch_posts(&self, page: u32, limit: u32) -> Result<Vec<Post>, Error> {
        renew_and_retry!(self.fetch_posts(page, limit))
    }

    async fn fetch_post(&self, post: PostId) -> Result<Post, Error> {
        renew_and_retry!(self.fetch_post(post))
    }

    async fn submit_post(&self, post: NewPost) -> Result<Post, Error> {
        renew_and_retry!(self.submit_post(post))
    }

    async fn fetch_root_comments(&self, post: PostId) -> Result<Vec<Comment>, Error> {
        renew_and_retry!(self.fetch_root_comments(post))
    }

    async fn fetch_replies(&self, comment: CommentId) -> Result<Vec<Comment>, Error> {
        renew_and_retry!(self.fetch_replies(comment))
    }

    async fn submit_root_comment(&self, post: PostId, content: String) -> Result<Comment, Error> {
        renew_and_retry!(self.submit_root_comment(post, content))
    }

    async fn submit_reply(&self, parent: CommentId, content: String) -> Result<Comment, Error> {
        renew_and_retry!(self.submit_reply(parent, content))
    }

    async fn submit_edit(&self, comment: CommentId, content: String) -> Result<Comment, Error> {
        renew_and_retry!(self.submit_edit(comment, content))
    }

    async fn fetch_user(&self, user: UserId) -> Result<User, Error> {
        renew_and_retry!(self.fetch_user(user))
    }

    async fn fetch_user_posts(&self, user: UserId) -> Result<Vec<Post>, Error> {
        renew_and_retry!(self.fetch_user_posts(user))
    }

    async fn update_profile(&self, patch: ProfilePatch) -> Result<User, Error> {
        renew_and_retry!(self.update_profile(patch))
    }

    async fn fetch_friends(&self, user: UserId) -> Result<Vec<User>, Error> {
        renew_and_retry!(self.fetch_friends(user))
    }

    async fn friendship_with(&self, user: UserId) -> Result<Option<Friendship>, Error> {
        renew_and_retry!(self.friendship_with(user))
    }

    async fn fetch_friend_requests(&self) -> Result<Vec<Friendship>, Error> {
        renew_and_retry!(self.fetch_friend_requests())
    }

    async fn send_friend_request(&self, to: UserId) -> Result<Friendship, Error> {
        renew_and_retry!(self.send_friend_request(to))
    }

    async fn accept_friend_request(&self, request: FriendshipId) -> Result<Friendship, Error> {
        renew_and_retry!(self.accept_friend_request(request))
    }

    async fn decline_friend_request(&self, request: FriendshipId) -> Result<(), Error> {
        renew_and_retry!(self.decline_friend_request(request))
    }

    async fn remove_friendship(&self, friendship: FriendshipId) -> Result<(), Error> {
        renew_and_retry!(self.remove_friendship(friendship))
    }
}
