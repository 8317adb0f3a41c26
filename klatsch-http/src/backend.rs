use reqwest_middleware::{ClientBuilder, ClientWithMiddleware};
use reqwest_retry::{policies::ExponentialBackoff, RetryTransientMiddleware};
use tokio::sync::Mutex;

use klatsch_api::{
    AuthToken, Backend, Comment, CommentId, Credentials, Error, Friendship, FriendshipId,
    NewComment, NewPost, Post, PostId, ProfilePatch, RenewSession, Session, User, UserId,
};

/// `Backend` over the real REST service. Transient network failures are
/// retried by the middleware; expired sessions are not handled here, wrap
/// in an [`crate::AutoRefresh`] for that.
pub struct HttpBackend {
    host: String,
    client: ClientWithMiddleware,
    session: Mutex<Session>,
}

fn client() -> ClientWithMiddleware {
    let retries = ExponentialBackoff::builder().build_with_max_retries(3);
    ClientBuilder::new(reqwest::Client::new())
        .with(RetryTransientMiddleware::new_with_policy(retries))
        .build()
}

fn transport_err(e: reqwest_middleware::Error) -> Error {
    Error::Unknown(format!("reaching the server: {e}"))
}

async fn decode_error(resp: reqwest::Response) -> Error {
    let status = resp.status();
    let body = resp.bytes().await.unwrap_or_default();
    match Error::parse(&body) {
        Ok(e) => e,
        Err(_) if status == reqwest::StatusCode::UNAUTHORIZED => Error::SessionExpired,
        Err(_) => Error::Unknown(format!("server answered {status}")),
    }
}

async fn decode<R>(resp: reqwest::Response) -> Result<R, Error>
where
    R: for<'de> serde::Deserialize<'de>,
{
    match resp.status().is_success() {
        true => resp
            .json()
            .await
            .map_err(|e| Error::Unknown(format!("decoding server response: {e}"))),
        false => Err(decode_error(resp).await),
    }
}

async fn expect_ok(resp: reqwest::Response) -> Result<(), Error> {
    match resp.status().is_success() {
        true => Ok(()),
        false => Err(decode_error(resp).await),
    }
}

impl HttpBackend {
    /// Trades credentials for a session and keeps it for every later call.
    pub async fn log_in(host: String, credentials: &Credentials) -> Result<HttpBackend, Error> {
        let client = client();
        let resp = client
            .post(format!("{host}/api/auth"))
            .json(credentials)
            .send()
            .await
            .map_err(transport_err)?;
        let session = decode(resp).await?;
        Ok(HttpBackend {
            host,
            client,
            session: Mutex::new(session),
        })
    }

    /// Reuses a session obtained earlier, such as one persisted by a
    /// previous run.
    pub fn with_session(host: String, session: Session) -> HttpBackend {
        HttpBackend {
            host,
            client: client(),
            session: Mutex::new(session),
        }
    }

    pub async fn session(&self) -> Session {
        self.session.lock().await.clone()
    }

    async fn access(&self) -> AuthToken {
        self.session.lock().await.access
    }

    async fn get<R>(&self, path: &str) -> Result<R, Error>
    where
        R: for<'de> serde::Deserialize<'de>,
    {
        tracing::debug!(%path, "GET");
        let resp = self
            .client
            .get(format!("{}/api/{}", self.host, path))
            .bearer_auth(self.access().await.0)
            .send()
            .await
            .map_err(transport_err)?;
        decode(resp).await
    }

    async fn post<B, R>(&self, path: &str, body: &B) -> Result<R, Error>
    where
        B: serde::Serialize,
        R: for<'de> serde::Deserialize<'de>,
    {
        tracing::debug!(%path, "POST");
        let resp = self
            .client
            .post(format!("{}/api/{}", self.host, path))
            .bearer_auth(self.access().await.0)
            .json(body)
            .send()
            .await
            .map_err(transport_err)?;
        decode(resp).await
    }

    async fn post_empty<R>(&self, path: &str) -> Result<R, Error>
    where
        R: for<'de> serde::Deserialize<'de>,
    {
        tracing::debug!(%path, "POST");
        let resp = self
            .client
            .post(format!("{}/api/{}", self.host, path))
            .bearer_auth(self.access().await.0)
            .send()
            .await
            .map_err(transport_err)?;
        decode(resp).await
    }

    async fn post_unit(&self, path: &str) -> Result<(), Error> {
        tracing::debug!(%path, "POST");
        let resp = self
            .client
            .post(format!("{}/api/{}", self.host, path))
            .bearer_auth(self.access().await.0)
            .send()
            .await
            .map_err(transport_err)?;
        expect_ok(resp).await
    }
}

#[async_trait::async_trait]
impl Backend for HttpBackend {
    async fn renew_session(&self) -> Result<(), Error> {
        let refresh = self.session.lock().await.refresh;
        tracing::debug!("renewing session");
        let resp = self
            .client
            .post(format!("{}/api/renew-session", self.host))
            .json(&RenewSession { refresh })
            .send()
            .await
            .map_err(transport_err)?;
        let session = decode(resp).await?;
        *self.session.lock().await = session;
        Ok(())
    }

    async fn whoami(&self) -> Result<User, Error> {
        self.get("whoami").await
    }

    async fn fetch_posts(&self, page: u32, limit: u32) -> Result<Vec<Post>, Error> {
        self.get(&format!("fetch-posts?page={page}&limit={limit}"))
            .await
    }

    async fn fetch_post(&self, post: PostId) -> Result<Post, Error> {
        self.get(&format!("fetch-post/{post}")).await
    }

    async fn submit_post(&self, post: NewPost) -> Result<Post, Error> {
        self.post("submit-post", &post).await
    }

    async fn fetch_root_comments(&self, post: PostId) -> Result<Vec<Comment>, Error> {
        self.get(&format!("fetch-root-comments/{post}")).await
    }

    async fn fetch_replies(&self, comment: CommentId) -> Result<Vec<Comment>, Error> {
        self.get(&format!("fetch-replies/{comment}")).await
    }

    async fn submit_root_comment(&self, post: PostId, content: String) -> Result<Comment, Error> {
        self.post(&format!("submit-root-comment/{post}"), &NewComment { content })
            .await
    }

    async fn submit_reply(&self, parent: CommentId, content: String) -> Result<Comment, Error> {
        self.post(&format!("submit-reply/{parent}"), &NewComment { content })
            .await
    }

    async fn submit_edit(&self, comment: CommentId, content: String) -> Result<Comment, Error> {
        self.post(&format!("submit-edit/{comment}"), &NewComment { content })
            .await
    }

    async fn fetch_user(&self, user: UserId) -> Result<User, Error> {
        self.get(&format!("fetch-user/{user}")).await
    }

    async fn fetch_user_posts(&self, user: UserId) -> Result<Vec<Post>, Error> {
        self.get(&format!("fetch-user-posts/{user}")).await
    }

    async fn update_profile(&self, patch: ProfilePatch) -> Result<User, Error> {
        self.post("update-profile", &patch).await
    }

    async fn fetch_friends(&self, user: UserId) -> Result<Vec<User>, Error> {
        self.get(&format!("fetch-friends/{user}")).await
    }

    async fn friendship_with(&self, user: UserId) -> Result<Option<Friendship>, Error> {
        self.get(&format!("friendship-with/{user}")).await
    }

    async fn fetch_friend_requests(&self) -> Result<Vec<Friendship>, Error> {
        self.get("fetch-friend-requests").await
    }

    async fn send_friend_request(&self, to: UserId) -> Result<Friendship, Error> {
        self.post_empty(&format!("send-friend-request/{to}")).await
    }

    async fn accept_friend_request(&self, request: FriendshipId) -> Result<Friendship, Error> {
        self.post_empty(&format!("accept-friend-request/{request}"))
            .await
    }

    async fn decline_friend_request(&self, request: FriendshipId) -> Result<(), Error> {
        self.post_unit(&format!("decline-friend-request/{request}"))
            .await
    }

    async fn remove_friendship(&self, friendship: FriendshipId) -> Result<(), Error> {
        self.post_unit(&format!("remove-friendship/{friendship}"))
            .await
    }
}
