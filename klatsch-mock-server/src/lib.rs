use std::{
    collections::{BTreeMap, HashMap},
    sync::{Arc, Mutex},
};

use klatsch_api::{
    AuthToken, Backend, Comment, CommentId, Credentials, Error, Friendship, FriendshipId,
    FriendshipStatus, NewPost, Post, PostId, ProfilePatch, Session, Time, User, UserId, Uuid,
};

/// In-memory stand-in for the real backend service. Ids are sequential so
/// tests can name records; posts are stored newest first the way the real
/// feed endpoint returns them; comments are stored flat and only nested on
/// the way out when `nest_replies` is on.
pub struct MockServer {
    users: BTreeMap<UserId, MockUser>,
    posts: Vec<Post>,
    comments: Vec<Comment>,
    friendships: BTreeMap<FriendshipId, Friendship>,
    access_tokens: HashMap<AuthToken, UserId>,
    refresh_tokens: HashMap<AuthToken, UserId>,
    nest: bool,
    next_id: u64,
}

#[derive(Debug)]
struct MockUser {
    user: User,
    password: String,
}

impl MockServer {
    pub fn new() -> MockServer {
        MockServer {
            users: BTreeMap::new(),
            posts: Vec::new(),
            comments: Vec::new(),
            friendships: BTreeMap::new(),
            access_tokens: HashMap::new(),
            refresh_tokens: HashMap::new(),
            nest: false,
            next_id: 0,
        }
    }

    /// Makes reply-bearing endpoints return pre-nested trees instead of
    /// flat lists. Both shapes exist in the real service.
    pub fn nest_replies(&mut self, nest: bool) {
        self.nest = nest;
    }

    fn fresh_id(&mut self, prefix: &str) -> String {
        self.next_id += 1;
        format!("{prefix}{}", self.next_id)
    }

    fn now(&self) -> Time {
        chrono::Utc::now()
    }

    pub fn admin_create_user(
        &mut self,
        username: &str,
        password: &str,
        display_name: &str,
    ) -> Result<User, Error> {
        if self.users.values().any(|u| u.user.username == username) {
            return Err(Error::UsernameTaken(String::from(username)));
        }
        let user = User {
            id: UserId(self.fresh_id("u")),
            username: String::from(username),
            display_name: String::from(display_name),
            avatar: None,
            bio: None,
        };
        self.users.insert(
            user.id.clone(),
            MockUser {
                user: user.clone(),
                password: String::from(password),
            },
        );
        Ok(user)
    }

    pub fn auth(&mut self, credentials: &Credentials) -> Result<Session, Error> {
        for u in self.users.values() {
            if u.user.username == credentials.username {
                if u.password != credentials.password {
                    return Err(Error::PermissionDenied);
                }
                let user = u.user.id.clone();
                let session = Session {
                    user: user.clone(),
                    access: AuthToken(Uuid::new_v4()),
                    refresh: AuthToken(Uuid::new_v4()),
                };
                self.access_tokens.insert(session.access, user.clone());
                self.refresh_tokens.insert(session.refresh, user);
                return Ok(session);
            }
        }
        Err(Error::PermissionDenied)
    }

    pub fn renew(&mut self, refresh: AuthToken) -> Result<Session, Error> {
        let user = match self.refresh_tokens.get(&refresh) {
            Some(user) => user.clone(),
            None => return Err(Error::SessionExpired),
        };
        let access = AuthToken(Uuid::new_v4());
        self.access_tokens.insert(access, user.clone());
        Ok(Session {
            user,
            access,
            refresh,
        })
    }

    /// Invalidates one access token, leaving its refresh token alive. Lets
    /// tests drive the expiry-then-renewal path.
    pub fn expire_session(&mut self, access: AuthToken) {
        self.access_tokens.remove(&access);
    }

    /// Kills a refresh token, so renewing with it fails too.
    pub fn revoke_refresh(&mut self, refresh: AuthToken) {
        self.refresh_tokens.remove(&refresh);
    }

    fn resolve(&self, access: AuthToken) -> Result<UserId, Error> {
        match self.access_tokens.get(&access) {
            Some(user) => Ok(user.clone()),
            None => Err(Error::SessionExpired),
        }
    }

    fn insert_post(&mut self, author: UserId, title: String, content: String) -> Post {
        let post = Post {
            id: PostId(self.fresh_id("p")),
            author_id: author,
            title,
            content,
            comment_count: 0,
            timestamp: self.now(),
        };
        self.posts.insert(0, post.clone());
        post
    }

    fn insert_comment(
        &mut self,
        post: PostId,
        parent: Option<CommentId>,
        author: UserId,
        content: String,
    ) -> Comment {
        let comment = Comment {
            id: CommentId(self.fresh_id("c")),
            post_id: post.clone(),
            parent_id: parent,
            author_id: author,
            content,
            timestamp: self.now(),
            replies: Vec::new(),
        };
        self.comments.push(comment.clone());
        if let Some(p) = self.posts.iter_mut().find(|p| p.id == post) {
            p.comment_count += 1;
        }
        comment
    }

    fn with_nested_replies(&self, mut comment: Comment) -> Comment {
        comment.replies = self
            .comments
            .iter()
            .filter(|c| c.parent_id.as_ref() == Some(&comment.id))
            .map(|c| self.with_nested_replies(c.clone()))
            .collect();
        comment
    }

    fn shape(&self, comment: Comment) -> Comment {
        match self.nest {
            true => self.with_nested_replies(comment),
            false => comment,
        }
    }

    pub fn fetch_posts(&self, page: u32, limit: u32) -> Vec<Post> {
        let start = (page.saturating_sub(1) as usize) * limit as usize;
        self.posts
            .iter()
            .skip(start)
            .take(limit as usize)
            .cloned()
            .collect()
    }

    pub fn fetch_post(&self, post: &PostId) -> Result<Post, Error> {
        match self.posts.iter().find(|p| p.id == *post) {
            Some(p) => Ok(p.clone()),
            None => Err(Error::PostNotFound(post.clone())),
        }
    }

    pub fn submit_post(&mut self, author: &UserId, post: NewPost) -> Result<Post, Error> {
        post.validate()?;
        Ok(self.insert_post(author.clone(), post.title, post.content))
    }

    pub fn fetch_root_comments(&self, post: &PostId) -> Result<Vec<Comment>, Error> {
        self.fetch_post(post)?;
        Ok(self
            .comments
            .iter()
            .filter(|c| c.post_id == *post && c.parent_id.is_none())
            .map(|c| self.shape(c.clone()))
            .collect())
    }

    pub fn fetch_replies(&self, comment: &CommentId) -> Result<Vec<Comment>, Error> {
        self.find_comment(comment)?;
        Ok(self
            .comments
            .iter()
            .filter(|c| c.parent_id.as_ref() == Some(comment))
            .map(|c| self.shape(c.clone()))
            .collect())
    }

    fn find_comment(&self, comment: &CommentId) -> Result<&Comment, Error> {
        match self.comments.iter().find(|c| c.id == *comment) {
            Some(c) => Ok(c),
            None => Err(Error::CommentNotFound(comment.clone())),
        }
    }

    pub fn submit_root_comment(
        &mut self,
        author: &UserId,
        post: &PostId,
        content: String,
    ) -> Result<Comment, Error> {
        klatsch_api::validate_content(&content)?;
        self.fetch_post(post)?;
        Ok(self.insert_comment(post.clone(), None, author.clone(), content))
    }

    pub fn submit_reply(
        &mut self,
        author: &UserId,
        parent: &CommentId,
        content: String,
    ) -> Result<Comment, Error> {
        klatsch_api::validate_content(&content)?;
        let post = self.find_comment(parent)?.post_id.clone();
        Ok(self.insert_comment(post, Some(parent.clone()), author.clone(), content))
    }

    pub fn submit_edit(
        &mut self,
        author: &UserId,
        comment: &CommentId,
        content: String,
    ) -> Result<Comment, Error> {
        klatsch_api::validate_content(&content)?;
        if self.find_comment(comment)?.author_id != *author {
            return Err(Error::PermissionDenied);
        }
        // find_comment borrows immutably, look the record up again to write
        let c = self
            .comments
            .iter_mut()
            .find(|c| c.id == *comment)
            .ok_or_else(|| Error::CommentNotFound(comment.clone()))?;
        c.content = content;
        Ok(c.clone())
    }

    pub fn fetch_user(&self, user: &UserId) -> Result<User, Error> {
        match self.users.get(user) {
            Some(u) => Ok(u.user.clone()),
            None => Err(Error::UserNotFound(user.clone())),
        }
    }

    pub fn fetch_user_posts(&self, user: &UserId) -> Result<Vec<Post>, Error> {
        self.fetch_user(user)?;
        Ok(self
            .posts
            .iter()
            .filter(|p| p.author_id == *user)
            .cloned()
            .collect())
    }

    pub fn update_profile(&mut self, acting: &UserId, patch: ProfilePatch) -> Result<User, Error> {
        let u = match self.users.get_mut(acting) {
            Some(u) => u,
            None => return Err(Error::UserNotFound(acting.clone())),
        };
        if let Some(bio) = patch.bio {
            u.user.bio = Some(bio);
        }
        if let Some(avatar) = patch.avatar {
            u.user.avatar = Some(avatar);
        }
        Ok(u.user.clone())
    }

    pub fn fetch_friends(&self, user: &UserId) -> Result<Vec<User>, Error> {
        self.fetch_user(user)?;
        let mut friends = Vec::new();
        for f in self.friendships.values() {
            if f.status == FriendshipStatus::Accepted && f.involves(user) {
                if let Some(other) = f.counterpart(user).and_then(|id| self.users.get(id)) {
                    friends.push(other.user.clone());
                }
            }
        }
        Ok(friends)
    }

    pub fn friendship_with(
        &self,
        acting: &UserId,
        user: &UserId,
    ) -> Result<Option<Friendship>, Error> {
        self.fetch_user(user)?;
        Ok(self
            .friendships
            .values()
            .find(|f| f.involves(acting) && f.involves(user) && acting != user)
            .cloned())
    }

    pub fn fetch_friend_requests(&self, acting: &UserId) -> Vec<Friendship> {
        self.friendships
            .values()
            .filter(|f| f.status == FriendshipStatus::Pending && f.recipient == *acting)
            .cloned()
            .collect()
    }

    pub fn send_friend_request(
        &mut self,
        acting: &UserId,
        to: &UserId,
    ) -> Result<Friendship, Error> {
        self.fetch_user(to)?;
        if to == acting {
            return Err(Error::PermissionDenied);
        }
        if self
            .friendships
            .values()
            .any(|f| f.involves(acting) && f.involves(to))
        {
            return Err(Error::FriendRequestExists(to.clone()));
        }
        let friendship = Friendship {
            id: FriendshipId(self.fresh_id("f")),
            sender: acting.clone(),
            recipient: to.clone(),
            status: FriendshipStatus::Pending,
            timestamp: self.now(),
        };
        self.friendships
            .insert(friendship.id.clone(), friendship.clone());
        Ok(friendship)
    }

    pub fn accept_friend_request(
        &mut self,
        acting: &UserId,
        request: &FriendshipId,
    ) -> Result<Friendship, Error> {
        let f = match self.friendships.get_mut(request) {
            Some(f) => f,
            None => return Err(Error::FriendshipNotFound(request.clone())),
        };
        if f.recipient != *acting {
            return Err(Error::PermissionDenied);
        }
        f.status = FriendshipStatus::Accepted;
        Ok(f.clone())
    }

    pub fn decline_friend_request(
        &mut self,
        acting: &UserId,
        request: &FriendshipId,
    ) -> Result<(), Error> {
        match self.friendships.get(request) {
            Some(f) if f.recipient == *acting => {
                self.friendships.remove(request);
                Ok(())
            }
            Some(_) => Err(Error::PermissionDenied),
            None => Err(Error::FriendshipNotFound(request.clone())),
        }
    }

    pub fn remove_friendship(
        &mut self,
        acting: &UserId,
        friendship: &FriendshipId,
    ) -> Result<(), Error> {
        match self.friendships.get(friendship) {
            Some(f) if f.involves(acting) => {
                self.friendships.remove(friendship);
                Ok(())
            }
            Some(_) => Err(Error::PermissionDenied),
            None => Err(Error::FriendshipNotFound(friendship.clone())),
        }
    }

    /// Seeds a post without going through auth or validation.
    pub fn seed_post(&mut self, author: &UserId, title: &str, content: &str) -> Post {
        self.insert_post(author.clone(), String::from(title), String::from(content))
    }

    /// Seeds a comment without going through auth or validation.
    pub fn seed_comment(
        &mut self,
        post: &PostId,
        parent: Option<&CommentId>,
        author: &UserId,
        content: &str,
    ) -> Comment {
        self.insert_comment(
            post.clone(),
            parent.cloned(),
            author.clone(),
            String::from(content),
        )
    }
}

/// `Backend` over a shared `MockServer`. Holds a real access/refresh pair so
/// the renewal path behaves like the HTTP transport's.
pub struct MockBackend {
    server: Arc<Mutex<MockServer>>,
    session: Mutex<Session>,
}

impl MockBackend {
    pub fn log_in(
        server: Arc<Mutex<MockServer>>,
        credentials: &Credentials,
    ) -> Result<MockBackend, Error> {
        let session = server.lock().unwrap().auth(credentials)?;
        Ok(MockBackend {
            server,
            session: Mutex::new(session),
        })
    }

    pub fn session(&self) -> Session {
        self.session.lock().unwrap().clone()
    }

    fn access(&self) -> AuthToken {
        self.session.lock().unwrap().access
    }
}

#[async_trait::async_trait]
impl Backend for MockBackend {
    async fn renew_session(&self) -> Result<(), Error> {
        let refresh = self.session.lock().unwrap().refresh;
        let session = self.server.lock().unwrap().renew(refresh)?;
        *self.session.lock().unwrap() = session;
        Ok(())
    }

    async fn whoami(&self) -> Result<User, Error> {
        let server = self.server.lock().unwrap();
        let acting = server.resolve(self.access())?;
        server.fetch_user(&acting)
    }

    async fn fetch_posts(&self, page: u32, limit: u32) -> Result<Vec<Post>, Error> {
        let server = self.server.lock().unwrap();
        server.resolve(self.access())?;
        Ok(server.fetch_posts(page, limit))
    }

    async fn fetch_post(&self, post: PostId) -> Result<Post, Error> {
        let server = self.server.lock().unwrap();
        server.resolve(self.access())?;
        server.fetch_post(&post)
    }

    async fn submit_post(&self, post: NewPost) -> Result<Post, Error> {
        let mut server = self.server.lock().unwrap();
        let acting = server.resolve(self.access())?;
        server.submit_post(&acting, post)
    }

    async fn fetch_root_comments(&self, post: PostId) -> Result<Vec<Comment>, Error> {
        let server = self.server.lock().unwrap();
        server.resolve(self.access())?;
        server.fetch_root_comments(&post)
    }

    async fn fetch_replies(&self, comment: CommentId) -> Result<Vec<Comment>, Error> {
        let server = self.server.lock().unwrap();
        server.resolve(self.access())?;
        server.fetch_replies(&comment)
    }

    async fn submit_root_comment(&self, post: PostId, content: String) -> Result<Comment, Error> {
        let mut server = self.server.lock().unwrap();
        let acting = server.resolve(self.access())?;
        server.submit_root_comment(&acting, &post, content)
    }

    async fn submit_reply(&self, parent: CommentId, content: String) -> Result<Comment, Error> {
        let mut server = self.server.lock().unwrap();
        let acting = server.resolve(self.access())?;
        server.submit_reply(&acting, &parent, content)
    }

    async fn submit_edit(&self, comment: CommentId, content: String) -> Result<Comment, Error> {
        let mut server = self.server.lock().unwrap();
        let acting = server.resolve(self.access())?;
        server.submit_edit(&acting, &comment, content)
    }

    async fn fetch_user(&self, user: UserId) -> Result<User, Error> {
        let server = self.server.lock().unwrap();
        server.resolve(self.access())?;
        server.fetch_user(&user)
    }

    async fn fetch_user_posts(&self, user: UserId) -> Result<Vec<Post>, Error> {
        let server = self.server.lock().unwrap();
        server.resolve(self.access())?;
        server.fetch_user_posts(&user)
    }

    async fn update_profile(&self, patch: ProfilePatch) -> Result<User, Error> {
        let mut server = self.server.lock().unwrap();
        let acting = server.resolve(self.access())?;
        server.update_profile(&acting, patch)
    }

    async fn fetch_friends(&self, user: UserId) -> Result<Vec<User>, Error> {
        let server = self.server.lock().unwrap();
        server.resolve(self.access())?;
        server.fetch_friends(&user)
    }

    async fn friendship_with(&self, user: UserId) -> Result<Option<Friendship>, Error> {
        let server = self.server.lock().unwrap();
        let acting = server.resolve(self.access())?;
        server.friendship_with(&acting, &user)
    }

    async fn fetch_friend_requests(&self) -> Result<Vec<Friendship>, Error> {
        let server = self.server.lock().unwrap();
        let acting = server.resolve(self.access())?;
        Ok(server.fetch_friend_requests(&acting))
    }

    async fn send_friend_request(&self, to: UserId) -> Result<Friendship, Error> {
        let mut server = self.server.lock().unwrap();
        let acting = server.resolve(self.access())?;
        server.send_friend_request(&acting, &to)
    }

    async fn accept_friend_request(&self, request: FriendshipId) -> Result<Friendship, Error> {
        let mut server = self.server.lock().unwrap();
        let acting = server.resolve(self.access())?;
        server.accept_friend_request(&acting, &request)
    }

    async fn decline_friend_request(&self, request: FriendshipId) -> Result<(), Error> {
        let mut server = self.server.lock().unwrap();
        let acting = server.resolve(self.access())?;
        server.decline_friend_request(&acting, &request)
    }

    async fn remove_friendship(&self, friendship: FriendshipId) -> Result<(), Error> {
        let mut server = self.server.lock().unwrap();
        let acting = server.resolve(self.access())?;
        server.remove_friendship(&acting, &friendship)
    }
}
