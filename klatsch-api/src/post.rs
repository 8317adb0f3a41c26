use crate::{Error, Time, UserId};

#[derive(Clone, Debug, Eq, Hash, Ord, PartialEq, PartialOrd, serde::Deserialize, serde::Serialize)]
pub struct PostId(pub String);

impl std::fmt::Display for PostId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Clone, Debug, Eq, PartialEq, serde::Deserialize, serde::Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Post {
    pub id: PostId,
    pub author_id: UserId,
    pub title: String,
    pub content: String,
    /// Denormalized by the backend; bumped client-side when a comment is
    /// created on an open post.
    #[serde(default)]
    pub comment_count: u64,
    pub timestamp: Time,
}

impl Post {
    pub fn validate(&self) -> Result<(), Error> {
        crate::validate_id(&self.id.0)?;
        crate::validate_id(&self.author_id.0)
    }
}

#[derive(Clone, Debug, Eq, PartialEq, serde::Deserialize, serde::Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NewPost {
    pub title: String,
    pub content: String,
}

impl NewPost {
    pub fn validate(&self) -> Result<(), Error> {
        crate::validate_content(&self.title)?;
        crate::validate_content(&self.content)
    }
}
