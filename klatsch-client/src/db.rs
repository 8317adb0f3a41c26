use std::collections::HashMap;

use crate::api::{Post, PostId, User, UserId};
use crate::feed::Feed;
use crate::thread::CommentTree;
use crate::view::ViewState;

/// Everything the client holds between backend calls: the logged-in user,
/// a cache of every user seen so far, the feed, and one comment forest plus
/// its view state per open thread.
#[derive(Clone, Debug)]
pub struct ClientDb {
    pub me: User,
    pub feed: Feed,
    users: HashMap<UserId, User>,
    posts: HashMap<PostId, Post>,
    threads: HashMap<PostId, CommentTree>,
    views: HashMap<PostId, ViewState>,
}

impl ClientDb {
    pub fn new(me: User) -> ClientDb {
        let mut users = HashMap::new();
        users.insert(me.id.clone(), me.clone());
        ClientDb {
            me,
            feed: Feed::default(),
            users,
            posts: HashMap::new(),
            threads: HashMap::new(),
            views: HashMap::new(),
        }
    }

    pub fn add_users(&mut self, users: impl IntoIterator<Item = User>) {
        for u in users {
            if u.id == self.me.id {
                self.me = u.clone();
            }
            self.users.insert(u.id.clone(), u);
        }
    }

    pub fn user(&self, id: &UserId) -> Option<&User> {
        self.users.get(id)
    }

    /// Name to render for an author. Unknown users fall back to the raw id
    /// rather than blocking display on a lookup.
    pub fn display_name(&self, id: &UserId) -> String {
        match self.users.get(id) {
            Some(u) => u.display_name.clone(),
            None => id.0.clone(),
        }
    }

    /// Of the given author ids, the ones not in the user cache yet, each
    /// listed once.
    pub fn missing_users<'a>(&self, ids: impl IntoIterator<Item = &'a UserId>) -> Vec<UserId> {
        let mut missing = Vec::new();
        for id in ids {
            if !self.users.contains_key(id) && !missing.contains(id) {
                missing.push(id.clone());
            }
        }
        missing
    }

    /// Installs a freshly fetched thread. View state from a previous visit
    /// is kept for the nodes that still exist.
    pub fn open_thread(&mut self, post: Post, tree: CommentTree) {
        let id = post.id.clone();
        self.posts.insert(id.clone(), post);
        match self.views.get_mut(&id) {
            Some(view) => view.prune(&tree),
            None => {
                self.views.insert(id.clone(), ViewState::new());
            }
        }
        self.threads.insert(id, tree);
    }

    pub fn close_thread(&mut self, post: &PostId) {
        self.posts.remove(post);
        self.threads.remove(post);
        self.views.remove(post);
    }

    pub fn post(&self, id: &PostId) -> Option<&Post> {
        self.posts.get(id).or_else(|| self.feed.get(id))
    }

    pub fn thread(&self, post: &PostId) -> Option<&CommentTree> {
        self.threads.get(post)
    }

    pub fn thread_mut(&mut self, post: &PostId) -> Option<&mut CommentTree> {
        self.threads.get_mut(post)
    }

    pub fn view(&self, post: &PostId) -> Option<&ViewState> {
        self.views.get(post)
    }

    pub fn view_mut(&mut self, post: &PostId) -> &mut ViewState {
        self.views.entry(post.clone()).or_default()
    }

    /// Keeps the denormalized comment counts in step when a comment is
    /// created on an open post.
    pub fn note_new_comment(&mut self, post: &PostId) {
        if let Some(p) = self.posts.get_mut(post) {
            p.comment_count += 1;
        }
        self.feed.note_new_comment(post);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};

    fn user(id: &str, display_name: &str) -> User {
        User {
            id: UserId(String::from(id)),
            username: String::from(id),
            display_name: String::from(display_name),
            avatar: None,
            bio: None,
        }
    }

    fn post(id: &str) -> Post {
        Post {
            id: PostId(String::from(id)),
            author_id: UserId(String::from("u1")),
            title: String::from("title"),
            content: String::from("body"),
            comment_count: 0,
            timestamp: Utc.with_ymd_and_hms(2023, 1, 7, 9, 0, 0).unwrap(),
        }
    }

    #[test]
    fn display_name_falls_back_to_the_raw_id() {
        let mut db = ClientDb::new(user("u1", "Me"));
        db.add_users([user("u2", "Alice")]);
        assert_eq!(db.display_name(&UserId(String::from("u2"))), "Alice");
        assert_eq!(db.display_name(&UserId(String::from("u9"))), "u9");
    }

    #[test]
    fn refreshed_own_record_updates_me_too() {
        let mut db = ClientDb::new(user("u1", "Me"));
        db.add_users([user("u1", "Renamed")]);
        assert_eq!(db.me.display_name, "Renamed");
    }

    #[test]
    fn missing_users_skips_cached_and_duplicate_ids() {
        let mut db = ClientDb::new(user("u1", "Me"));
        db.add_users([user("u2", "Alice")]);
        let u = |id: &str| UserId(String::from(id));
        let ids = [u("u1"), u("u2"), u("u3"), u("u3"), u("u4")];
        assert_eq!(db.missing_users(ids.iter()), [u("u3"), u("u4")]);
    }

    #[test]
    fn reopening_a_thread_keeps_view_state_for_surviving_nodes() {
        use crate::api::{Comment, CommentId};

        let comment = |id: &str| Comment {
            id: CommentId(String::from(id)),
            post_id: PostId(String::from("p1")),
            parent_id: None,
            author_id: UserId(String::from("u1")),
            content: String::from("body"),
            timestamp: Utc.with_ymd_and_hms(2023, 1, 7, 9, 0, 0).unwrap(),
            replies: Vec::new(),
        };
        let pid = PostId(String::from("p1"));

        let mut db = ClientDb::new(user("u1", "Me"));
        let first = CommentTree::build(pid.clone(), vec![comment("c1"), comment("c2")], Vec::new())
            .unwrap();
        db.open_thread(post("p1"), first);
        db.view_mut(&pid).set_collapsed(&CommentId(String::from("c1")), true);
        db.view_mut(&pid).set_collapsed(&CommentId(String::from("c2")), true);

        // c2 was deleted server-side before the revisit
        let second = CommentTree::build(pid.clone(), vec![comment("c1")], Vec::new()).unwrap();
        db.open_thread(post("p1"), second);

        let view = db.view(&pid).unwrap();
        assert!(view.is_collapsed(&CommentId(String::from("c1"))));
        assert!(!view.is_collapsed(&CommentId(String::from("c2"))));
    }

    #[test]
    fn closing_a_thread_drops_its_state_but_not_the_feed() {
        let mut db = ClientDb::new(user("u1", "Me"));
        db.feed.prepend(post("p1"));
        let pid = PostId(String::from("p1"));
        let tree = CommentTree::build(pid.clone(), Vec::new(), Vec::new()).unwrap();
        db.open_thread(post("p1"), tree);
        assert!(db.thread(&pid).is_some());

        db.close_thread(&pid);
        assert!(db.thread(&pid).is_none());
        assert!(db.view(&pid).is_none());
        // the feed copy still answers lookups
        assert!(db.post(&pid).is_some());
    }

    #[test]
    fn new_comment_bumps_both_post_copies() {
        let mut db = ClientDb::new(user("u1", "Me"));
        db.feed.prepend(post("p1"));
        let pid = PostId(String::from("p1"));
        let tree = CommentTree::build(pid.clone(), Vec::new(), Vec::new()).unwrap();
        db.open_thread(post("p1"), tree);

        db.note_new_comment(&pid);

        assert_eq!(db.post(&pid).unwrap().comment_count, 1);
        assert_eq!(db.feed.get(&pid).unwrap().comment_count, 1);
    }
}
