mod db;
pub use db::ClientDb;

mod feed;
pub use feed::{Feed, DEFAULT_PAGE_SIZE};

mod profile;
pub use profile::{relation, ProfileView, Relation};

pub mod remote;

mod thread;
pub use thread::{CommentNode, CommentTree};

mod view;
pub use view::{NodeState, ViewState};

pub mod api {
    pub use klatsch_api::*;
}
