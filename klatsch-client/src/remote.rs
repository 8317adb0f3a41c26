//! Glue between the stores and a [`Backend`], one function per user event.
//! Every function fetches, merges into the [`ClientDb`], and leaves the
//! stores consistent even when the backend answers out of order.

use crate::api::{
    Backend, Comment, CommentId, Error, Friendship, FriendshipId, NewPost, PostId, ProfilePatch,
    UserId,
};
use crate::db::ClientDb;
use crate::profile::ProfileView;
use crate::thread::CommentTree;

pub async fn boot(backend: &impl Backend) -> Result<ClientDb, Error> {
    let me = backend.whoami().await?;
    Ok(ClientDb::new(me))
}

fn comment_authors(comments: &[Comment], out: &mut Vec<UserId>) {
    for c in comments {
        out.push(c.author_id.clone());
        comment_authors(&c.replies, out);
    }
}

/// Pulls the user records the db does not have yet. An author whose account
/// is gone is tolerated; their comments render with the raw id.
async fn cache_authors(
    db: &mut ClientDb,
    backend: &impl Backend,
    authors: Vec<UserId>,
) -> Result<(), Error> {
    for id in db.missing_users(authors.iter()) {
        match backend.fetch_user(id.clone()).await {
            Ok(user) => db.add_users([user]),
            Err(Error::UserNotFound(_)) => {
                tracing::warn!(user = %id, "author record is gone, leaving the raw id")
            }
            Err(e) => return Err(e),
        }
    }
    Ok(())
}

/// Fetches the next feed page and returns how many posts were new. Once the
/// feed is exhausted this is a no-op.
pub async fn load_next_feed_page(
    db: &mut ClientDb,
    backend: &impl Backend,
) -> Result<usize, Error> {
    if db.feed.exhausted() {
        return Ok(0);
    }
    let page = backend
        .fetch_posts(db.feed.next_page(), db.feed.page_size())
        .await?;
    let authors = page.iter().map(|p| p.author_id.clone()).collect();
    cache_authors(db, backend, authors).await?;
    Ok(db.feed.extend_page(page))
}

pub async fn create_post(
    db: &mut ClientDb,
    backend: &impl Backend,
    post: NewPost,
) -> Result<PostId, Error> {
    post.validate()?;
    let created = backend.submit_post(post).await?;
    let id = created.id.clone();
    db.feed.prepend(created);
    Ok(id)
}

/// Fetches a post and its root comments and installs the rebuilt forest.
/// Replies under each root stay unfetched until the node is expanded, unless
/// the backend already sent them nested.
pub async fn open_thread(
    db: &mut ClientDb,
    backend: &impl Backend,
    post: PostId,
) -> Result<(), Error> {
    let record = backend.fetch_post(post.clone()).await?;
    let roots = backend.fetch_root_comments(post.clone()).await?;
    let tree = CommentTree::build(post, roots, Vec::new())?;

    let mut authors = vec![record.author_id.clone()];
    authors.extend(tree.comments().iter().map(|c| c.author_id.clone()));
    cache_authors(db, backend, authors).await?;

    db.open_thread(record, tree);
    Ok(())
}

/// First expansion of a node fetches its replies and merges them; later
/// expansions only unfold what is already there. Returns how many comments
/// the forest gained.
pub async fn expand_replies(
    db: &mut ClientDb,
    backend: &impl Backend,
    post: &PostId,
    comment: &CommentId,
) -> Result<usize, Error> {
    if db.thread(post).is_none() {
        return Err(Error::PostNotFound(post.clone()));
    }
    if db.view_mut(post).replies_fetched(comment) {
        db.view_mut(post).set_collapsed(comment, false);
        return Ok(0);
    }

    let replies = backend.fetch_replies(comment.clone()).await?;
    let mut authors = Vec::new();
    comment_authors(&replies, &mut authors);

    let tree = match db.thread_mut(post) {
        Some(tree) => tree,
        None => return Err(Error::PostNotFound(post.clone())),
    };
    let before = tree.len();
    tree.merge_fetched_replies(comment, replies)?;
    let added = tree.len() - before;

    let view = db.view_mut(post);
    view.mark_replies_fetched(comment);
    view.set_collapsed(comment, false);

    cache_authors(db, backend, authors).await?;
    Ok(added)
}

pub async fn submit_root_comment(
    db: &mut ClientDb,
    backend: &impl Backend,
    post: &PostId,
    text: &str,
) -> Result<CommentId, Error> {
    crate::api::validate_content(text)?;
    let created = backend
        .submit_root_comment(post.clone(), String::from(text))
        .await?;
    let id = created.id.clone();
    match db.thread_mut(post) {
        Some(tree) => tree.prepend_root(created)?,
        None => return Err(Error::PostNotFound(post.clone())),
    }
    db.note_new_comment(post);
    Ok(id)
}

/// Replies under `parent`. Any replies the node already has on the server
/// are fetched first so the new one does not end up hiding them.
pub async fn submit_reply(
    db: &mut ClientDb,
    backend: &impl Backend,
    post: &PostId,
    parent: &CommentId,
    text: &str,
) -> Result<CommentId, Error> {
    crate::api::validate_content(text)?;
    expand_replies(db, backend, post, parent).await?;

    let created = backend
        .submit_reply(parent.clone(), String::from(text))
        .await?;
    let id = created.id.clone();
    match db.thread_mut(post) {
        Some(tree) => tree.merge_reply(parent, created)?,
        None => return Err(Error::PostNotFound(post.clone())),
    }
    let view = db.view_mut(post);
    view.mark_replies_fetched(parent);
    view.set_collapsed(parent, false);
    db.note_new_comment(post);
    Ok(id)
}

/// Edits a comment's text; the record the server answers with is what lands
/// in the forest.
pub async fn submit_edit(
    db: &mut ClientDb,
    backend: &impl Backend,
    post: &PostId,
    comment: &CommentId,
    text: &str,
) -> Result<(), Error> {
    crate::api::validate_content(text)?;
    let updated = backend
        .submit_edit(comment.clone(), String::from(text))
        .await?;
    match db.thread_mut(post) {
        Some(tree) => {
            tree.update_content(comment, updated.content)?;
            Ok(())
        }
        None => Err(Error::PostNotFound(post.clone())),
    }
}

pub async fn open_profile(
    db: &mut ClientDb,
    backend: &impl Backend,
    user: UserId,
) -> Result<ProfileView, Error> {
    let record = backend.fetch_user(user.clone()).await?;
    let posts = backend.fetch_user_posts(user.clone()).await?;
    let friends = backend.fetch_friends(user.clone()).await?;
    let friendship = match user == db.me.id {
        true => None,
        false => backend.friendship_with(user).await?,
    };
    db.add_users(friends.iter().cloned().chain([record.clone()]));
    Ok(ProfileView {
        user: record,
        posts,
        friends,
        friendship,
    })
}

pub async fn send_friend_request(
    backend: &impl Backend,
    profile: &mut ProfileView,
) -> Result<(), Error> {
    let friendship = backend.send_friend_request(profile.user.id.clone()).await?;
    profile.apply_friendship(Some(friendship));
    Ok(())
}

/// Accepts or declines one incoming request; returns the resulting
/// friendship state for whoever is showing it.
pub async fn respond_to_request(
    backend: &impl Backend,
    request: FriendshipId,
    accept: bool,
) -> Result<Option<Friendship>, Error> {
    match accept {
        true => Ok(Some(backend.accept_friend_request(request).await?)),
        false => {
            backend.decline_friend_request(request).await?;
            Ok(None)
        }
    }
}

/// Unfriends, or withdraws a pending request; no-op when there is nothing
/// to remove.
pub async fn withdraw_friendship(
    backend: &impl Backend,
    profile: &mut ProfileView,
) -> Result<(), Error> {
    let id = match &profile.friendship {
        Some(f) => f.id.clone(),
        None => return Ok(()),
    };
    backend.remove_friendship(id).await?;
    profile.apply_friendship(None);
    Ok(())
}

pub async fn update_my_profile(
    db: &mut ClientDb,
    backend: &impl Backend,
    patch: ProfilePatch,
) -> Result<(), Error> {
    let updated = backend.update_profile(patch).await?;
    db.add_users([updated]);
    Ok(())
}

#[cfg(test)]
mod tests {
    use std::sync::{Arc, Mutex};

    use klatsch_mock_server::{MockBackend, MockServer};

    use super::*;
    use crate::api::{Credentials, User};
    use crate::profile::Relation;
    use crate::thread::CommentNode;

    fn server() -> Arc<Mutex<MockServer>> {
        Arc::new(Mutex::new(MockServer::new()))
    }

    fn create_user(
        server: &Arc<Mutex<MockServer>>,
        username: &str,
        display_name: &str,
    ) -> (User, Credentials) {
        let user = server
            .lock()
            .unwrap()
            .admin_create_user(username, "hunter2", display_name)
            .unwrap();
        let credentials = Credentials {
            username: String::from(username),
            password: String::from("hunter2"),
        };
        (user, credentials)
    }

    fn log_in(server: &Arc<Mutex<MockServer>>, credentials: &Credentials) -> MockBackend {
        MockBackend::log_in(server.clone(), credentials).unwrap()
    }

    fn child_ids(node: &CommentNode) -> Vec<String> {
        node.children.iter().map(|n| n.comment.id.0.clone()).collect()
    }

    #[tokio::test]
    async fn feed_loads_page_by_page_until_exhausted() {
        let server = server();
        let (alice, creds) = create_user(&server, "alice", "Alice");
        let (bob, _) = create_user(&server, "bob", "Bob");
        let posts: Vec<_> = (0..7)
            .map(|i| {
                server
                    .lock()
                    .unwrap()
                    .seed_post(&bob.id, &format!("post {i}"), "body")
            })
            .collect();

        let backend = log_in(&server, &creds);
        let mut db = boot(&backend).await.unwrap();
        assert_eq!(db.me.id, alice.id);

        assert_eq!(load_next_feed_page(&mut db, &backend).await.unwrap(), 5);
        assert_eq!(db.feed.next_page(), 2);
        assert!(!db.feed.exhausted());
        // newest first
        assert_eq!(db.feed.posts()[0].id, posts[6].id);
        assert_eq!(db.display_name(&bob.id), "Bob");

        assert_eq!(load_next_feed_page(&mut db, &backend).await.unwrap(), 2);
        assert!(db.feed.exhausted());
        assert_eq!(db.feed.posts().len(), 7);

        // exhausted feed stops fetching
        assert_eq!(load_next_feed_page(&mut db, &backend).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn posting_while_paging_does_not_duplicate_the_feed() {
        let server = server();
        let (_alice, creds) = create_user(&server, "alice", "Alice");
        let (bob, _) = create_user(&server, "bob", "Bob");
        for i in 0..7 {
            server
                .lock()
                .unwrap()
                .seed_post(&bob.id, &format!("post {i}"), "body");
        }

        let backend = log_in(&server, &creds);
        let mut db = boot(&backend).await.unwrap();
        load_next_feed_page(&mut db, &backend).await.unwrap();

        let mine = create_post(
            &mut db,
            &backend,
            NewPost {
                title: String::from("hot take"),
                content: String::from("tabs"),
            },
        )
        .await
        .unwrap();
        assert_eq!(db.feed.posts()[0].id, mine);
        assert_eq!(db.feed.posts().len(), 6);

        // my new post shifted one old post onto page 2
        assert_eq!(load_next_feed_page(&mut db, &backend).await.unwrap(), 2);
        assert_eq!(db.feed.posts().len(), 8);
        assert!(db.feed.exhausted());
    }

    #[tokio::test]
    async fn thread_expands_reply_by_reply() {
        let server = server();
        let (alice, creds) = create_user(&server, "alice", "Alice");
        let (bob, _) = create_user(&server, "bob", "Bob");
        let (post, c1, c1_1, c1_1_1) = {
            let mut s = server.lock().unwrap();
            let post = s.seed_post(&bob.id, "title", "body");
            let c1 = s.seed_comment(&post.id, None, &bob.id, "root");
            let c1_1 = s.seed_comment(&post.id, Some(&c1.id), &alice.id, "inner");
            let c1_1_1 = s.seed_comment(&post.id, Some(&c1_1.id), &bob.id, "deep");
            (post, c1, c1_1, c1_1_1)
        };

        let backend = log_in(&server, &creds);
        let mut db = boot(&backend).await.unwrap();
        open_thread(&mut db, &backend, post.id.clone()).await.unwrap();

        // flat wire shape: roots only until expanded
        assert_eq!(db.thread(&post.id).unwrap().len(), 1);
        assert_eq!(db.display_name(&bob.id), "Bob");

        assert_eq!(
            expand_replies(&mut db, &backend, &post.id, &c1.id).await.unwrap(),
            1
        );
        assert_eq!(
            expand_replies(&mut db, &backend, &post.id, &c1_1.id).await.unwrap(),
            1
        );
        let tree = db.thread(&post.id).unwrap();
        assert_eq!(tree.len(), 3);
        assert_eq!(child_ids(&tree.roots()[0]), [c1_1.id.0.clone()]);
        assert_eq!(child_ids(&tree.roots()[0].children[0]), [c1_1_1.id.0.clone()]);

        // second expansion does not refetch or change the forest
        let before = db.thread(&post.id).unwrap().clone();
        assert_eq!(
            expand_replies(&mut db, &backend, &post.id, &c1.id).await.unwrap(),
            0
        );
        assert_eq!(db.thread(&post.id).unwrap(), &before);
    }

    #[tokio::test]
    async fn nested_wire_shape_arrives_in_one_fetch() {
        let server = server();
        let (alice, creds) = create_user(&server, "alice", "Alice");
        let (post, c1) = {
            let mut s = server.lock().unwrap();
            let post = s.seed_post(&alice.id, "title", "body");
            let c1 = s.seed_comment(&post.id, None, &alice.id, "root");
            let c1_1 = s.seed_comment(&post.id, Some(&c1.id), &alice.id, "inner");
            s.seed_comment(&post.id, Some(&c1_1.id), &alice.id, "deep");
            s.nest_replies(true);
            (post, c1)
        };

        let backend = log_in(&server, &creds);
        let mut db = boot(&backend).await.unwrap();
        open_thread(&mut db, &backend, post.id.clone()).await.unwrap();

        let tree = db.thread(&post.id).unwrap();
        assert_eq!(tree.len(), 3);
        assert_eq!(tree.roots()[0].comment.id, c1.id);
        assert_eq!(tree.roots()[0].children[0].children.len(), 1);
    }

    #[tokio::test]
    async fn replying_pulls_existing_replies_first() {
        let server = server();
        let (_alice, creds) = create_user(&server, "alice", "Alice");
        let (bob, _) = create_user(&server, "bob", "Bob");
        let (post, c1, r1) = {
            let mut s = server.lock().unwrap();
            let post = s.seed_post(&bob.id, "title", "body");
            let c1 = s.seed_comment(&post.id, None, &bob.id, "root");
            let r1 = s.seed_comment(&post.id, Some(&c1.id), &bob.id, "earlier reply");
            (post, c1, r1)
        };

        let backend = log_in(&server, &creds);
        let mut db = boot(&backend).await.unwrap();
        open_thread(&mut db, &backend, post.id.clone()).await.unwrap();

        let mine = submit_reply(&mut db, &backend, &post.id, &c1.id, "late to the party")
            .await
            .unwrap();

        let tree = db.thread(&post.id).unwrap();
        assert_eq!(child_ids(&tree.roots()[0]), [r1.id.0.clone(), mine.0.clone()]);
        assert!(db.view(&post.id).unwrap().replies_fetched(&c1.id));
        // seeded comments already counted two
        assert_eq!(db.post(&post.id).unwrap().comment_count, 3);
    }

    #[tokio::test]
    async fn new_root_comment_lands_first() {
        let server = server();
        let (_alice, creds) = create_user(&server, "alice", "Alice");
        let (bob, _) = create_user(&server, "bob", "Bob");
        let (post, c1) = {
            let mut s = server.lock().unwrap();
            let post = s.seed_post(&bob.id, "title", "body");
            let c1 = s.seed_comment(&post.id, None, &bob.id, "first!");
            (post, c1)
        };

        let backend = log_in(&server, &creds);
        let mut db = boot(&backend).await.unwrap();
        open_thread(&mut db, &backend, post.id.clone()).await.unwrap();

        let mine = submit_root_comment(&mut db, &backend, &post.id, "second!")
            .await
            .unwrap();

        let roots: Vec<_> = db
            .thread(&post.id)
            .unwrap()
            .roots()
            .iter()
            .map(|n| n.comment.id.clone())
            .collect();
        assert_eq!(roots, [mine, c1.id]);

        assert_eq!(
            submit_root_comment(&mut db, &backend, &post.id, "   ").await,
            Err(Error::EmptyContent)
        );
    }

    #[tokio::test]
    async fn edits_are_author_only() {
        let server = server();
        let (_alice, creds) = create_user(&server, "alice", "Alice");
        let (bob, _) = create_user(&server, "bob", "Bob");
        let (post, theirs) = {
            let mut s = server.lock().unwrap();
            let post = s.seed_post(&bob.id, "title", "body");
            let theirs = s.seed_comment(&post.id, None, &bob.id, "untouchable");
            (post, theirs)
        };

        let backend = log_in(&server, &creds);
        let mut db = boot(&backend).await.unwrap();
        open_thread(&mut db, &backend, post.id.clone()).await.unwrap();

        assert_eq!(
            submit_edit(&mut db, &backend, &post.id, &theirs.id, "hijacked").await,
            Err(Error::PermissionDenied)
        );
        assert_eq!(
            db.thread(&post.id).unwrap().get(&theirs.id).unwrap().comment.content,
            "untouchable"
        );

        let mine = submit_root_comment(&mut db, &backend, &post.id, "typo hree")
            .await
            .unwrap();
        submit_edit(&mut db, &backend, &post.id, &mine, "typo here")
            .await
            .unwrap();
        assert_eq!(
            db.thread(&post.id).unwrap().get(&mine).unwrap().comment.content,
            "typo here"
        );
    }

    #[tokio::test]
    async fn friendship_lifecycle_via_profiles() {
        let server = server();
        let (alice, alice_creds) = create_user(&server, "alice", "Alice");
        let (bob, bob_creds) = create_user(&server, "bob", "Bob");

        let alice_backend = log_in(&server, &alice_creds);
        let bob_backend = log_in(&server, &bob_creds);
        let mut alice_db = boot(&alice_backend).await.unwrap();
        let mut bob_db = boot(&bob_backend).await.unwrap();

        let mut profile = open_profile(&mut alice_db, &alice_backend, bob.id.clone())
            .await
            .unwrap();
        assert_eq!(profile.relation_to(&alice.id), Relation::Stranger);

        send_friend_request(&alice_backend, &mut profile).await.unwrap();
        assert_eq!(profile.relation_to(&alice.id), Relation::RequestSent);

        let bobs_view = open_profile(&mut bob_db, &bob_backend, alice.id.clone())
            .await
            .unwrap();
        assert_eq!(bobs_view.relation_to(&bob.id), Relation::RequestReceived);

        let requests = bob_backend.fetch_friend_requests().await.unwrap();
        assert_eq!(requests.len(), 1);
        let accepted = respond_to_request(&bob_backend, requests[0].id.clone(), true)
            .await
            .unwrap();
        assert!(accepted.is_some());

        let mut profile = open_profile(&mut alice_db, &alice_backend, bob.id.clone())
            .await
            .unwrap();
        assert_eq!(profile.relation_to(&alice.id), Relation::Friends);
        assert!(profile.friends.iter().any(|u| u.id == alice.id));

        withdraw_friendship(&alice_backend, &mut profile).await.unwrap();
        assert_eq!(profile.relation_to(&alice.id), Relation::Stranger);
        let back_to_stranger = open_profile(&mut bob_db, &bob_backend, alice.id.clone())
            .await
            .unwrap();
        assert_eq!(back_to_stranger.relation_to(&bob.id), Relation::Stranger);
    }

    #[tokio::test]
    async fn declining_removes_the_request() {
        let server = server();
        let (alice, alice_creds) = create_user(&server, "alice", "Alice");
        let (bob, bob_creds) = create_user(&server, "bob", "Bob");

        let alice_backend = log_in(&server, &alice_creds);
        let bob_backend = log_in(&server, &bob_creds);
        let mut alice_db = boot(&alice_backend).await.unwrap();

        let mut profile = open_profile(&mut alice_db, &alice_backend, bob.id.clone())
            .await
            .unwrap();
        send_friend_request(&alice_backend, &mut profile).await.unwrap();

        // only the recipient may answer
        let request = profile.friendship.clone().unwrap();
        assert_eq!(
            respond_to_request(&alice_backend, request.id.clone(), true).await,
            Err(Error::PermissionDenied)
        );

        let declined = respond_to_request(&bob_backend, request.id, false)
            .await
            .unwrap();
        assert_eq!(declined, None);

        let profile = open_profile(&mut alice_db, &alice_backend, bob.id.clone())
            .await
            .unwrap();
        assert_eq!(profile.relation_to(&alice.id), Relation::Stranger);
    }

    #[tokio::test]
    async fn duplicate_and_self_requests_are_rejected() {
        let server = server();
        let (alice, alice_creds) = create_user(&server, "alice", "Alice");
        let (bob, _) = create_user(&server, "bob", "Bob");

        let backend = log_in(&server, &alice_creds);
        let mut db = boot(&backend).await.unwrap();

        let mut profile = open_profile(&mut db, &backend, bob.id.clone()).await.unwrap();
        send_friend_request(&backend, &mut profile).await.unwrap();
        assert_eq!(
            backend.send_friend_request(bob.id.clone()).await,
            Err(Error::FriendRequestExists(bob.id.clone()))
        );
        assert_eq!(
            backend.send_friend_request(alice.id.clone()).await,
            Err(Error::PermissionDenied)
        );
    }

    #[tokio::test]
    async fn profile_updates_land_in_the_user_cache() {
        let server = server();
        let (alice, creds) = create_user(&server, "alice", "Alice");

        let backend = log_in(&server, &creds);
        let mut db = boot(&backend).await.unwrap();
        assert_eq!(db.me.bio, None);

        update_my_profile(
            &mut db,
            &backend,
            ProfilePatch {
                bio: Some(String::from("resident contrarian")),
                avatar: None,
            },
        )
        .await
        .unwrap();
        assert_eq!(db.me.bio.as_deref(), Some("resident contrarian"));

        let profile = open_profile(&mut db, &backend, alice.id.clone()).await.unwrap();
        assert_eq!(profile.relation_to(&alice.id), Relation::Myself);
        assert_eq!(profile.user.bio.as_deref(), Some("resident contrarian"));
    }

    #[tokio::test]
    async fn deleted_authors_do_not_block_the_feed() {
        let server = server();
        let (_alice, creds) = create_user(&server, "alice", "Alice");
        let ghost = UserId(String::from("ghost"));
        server.lock().unwrap().seed_post(&ghost, "who wrote this", "boo");

        let backend = log_in(&server, &creds);
        let mut db = boot(&backend).await.unwrap();

        assert_eq!(load_next_feed_page(&mut db, &backend).await.unwrap(), 1);
        assert_eq!(db.display_name(&ghost), "ghost");
    }

    #[tokio::test]
    async fn stale_session_surfaces_as_session_expired() {
        let server = server();
        let (_alice, creds) = create_user(&server, "alice", "Alice");

        let backend = log_in(&server, &creds);
        let mut db = boot(&backend).await.unwrap();

        server.lock().unwrap().expire_session(backend.session().access);
        assert_eq!(
            load_next_feed_page(&mut db, &backend).await,
            Err(Error::SessionExpired)
        );
    }
}
