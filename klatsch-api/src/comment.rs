use crate::{Error, PostId, Time, UserId};

#[derive(Clone, Debug, Eq, Hash, Ord, PartialEq, PartialOrd, serde::Deserialize, serde::Serialize)]
pub struct CommentId(pub String);

impl std::fmt::Display for CommentId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// One comment as the backend serves it. Depending on the endpoint the
/// `replies` field may already carry nested children, or be absent and the
/// children fetched lazily; consumers must accept both shapes.
#[derive(Clone, Debug, Eq, PartialEq, serde::Deserialize, serde::Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Comment {
    pub id: CommentId,
    pub post_id: PostId,
    #[serde(default)]
    pub parent_id: Option<CommentId>,
    pub author_id: UserId,
    pub content: String,
    pub timestamp: Time,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub replies: Vec<Comment>,
}

impl Comment {
    /// Checks this record only; nested `replies` are validated as they are
    /// ingested.
    pub fn validate(&self) -> Result<(), Error> {
        crate::validate_id(&self.id.0)?;
        crate::validate_id(&self.post_id.0)?;
        crate::validate_id(&self.author_id.0)?;
        if let Some(parent) = &self.parent_id {
            crate::validate_id(&parent.0)?;
        }
        Ok(())
    }
}

#[derive(Clone, Debug, Eq, PartialEq, serde::Deserialize, serde::Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NewComment {
    pub content: String,
}
