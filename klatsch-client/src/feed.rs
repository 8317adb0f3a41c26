use std::collections::HashSet;

use crate::api::{Post, PostId};

pub const DEFAULT_PAGE_SIZE: u32 = 5;

/// The paginated home feed. Pages are appended in server order, already-seen
/// ids are skipped (a post created while paging shifts the pages, so
/// overlaps are expected), and a short page marks the feed exhausted.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Feed {
    posts: Vec<Post>,
    seen: HashSet<PostId>,
    next_page: u32,
    page_size: u32,
    exhausted: bool,
}

impl Default for Feed {
    fn default() -> Feed {
        Feed::new(DEFAULT_PAGE_SIZE)
    }
}

impl Feed {
    pub fn new(page_size: u32) -> Feed {
        Feed {
            posts: Vec::new(),
            seen: HashSet::new(),
            next_page: 1,
            page_size,
            exhausted: false,
        }
    }

    pub fn posts(&self) -> &[Post] {
        &self.posts
    }

    pub fn get(&self, id: &PostId) -> Option<&Post> {
        self.posts.iter().find(|p| p.id == *id)
    }

    pub fn next_page(&self) -> u32 {
        self.next_page
    }

    pub fn page_size(&self) -> u32 {
        self.page_size
    }

    pub fn exhausted(&self) -> bool {
        self.exhausted
    }

    /// Appends one fetched page and advances the cursor. Returns how many of
    /// the posts were actually new.
    pub fn extend_page(&mut self, page: Vec<Post>) -> usize {
        if (page.len() as u32) < self.page_size {
            self.exhausted = true;
        }
        self.next_page += 1;
        let mut added = 0;
        for post in page {
            if self.seen.insert(post.id.clone()) {
                self.posts.push(post);
                added += 1;
            }
        }
        added
    }

    /// Puts a freshly created post first. A known id only refreshes the
    /// record in place.
    pub fn prepend(&mut self, post: Post) {
        if self.seen.insert(post.id.clone()) {
            self.posts.insert(0, post);
        } else {
            self.apply(post);
        }
    }

    /// Replaces a known post's record; unknown ids are ignored.
    pub fn apply(&mut self, post: Post) {
        if let Some(existing) = self.posts.iter_mut().find(|p| p.id == post.id) {
            *existing = post;
        }
    }

    pub fn note_new_comment(&mut self, post: &PostId) {
        if let Some(existing) = self.posts.iter_mut().find(|p| p.id == *post) {
            existing.comment_count += 1;
        }
    }
}
