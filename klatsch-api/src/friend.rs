use crate::{Time, UserId};

#[derive(Clone, Debug, Eq, Hash, Ord, PartialEq, PartialOrd, serde::Deserialize, serde::Serialize)]
pub struct FriendshipId(pub String);

impl std::fmt::Display for FriendshipId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Clone, Copy, Debug, Eq, PartialEq, serde::Deserialize, serde::Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum FriendshipStatus {
    Pending,
    Accepted,
}

#[derive(Clone, Debug, Eq, PartialEq, serde::Deserialize, serde::Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Friendship {
    pub id: FriendshipId,
    pub sender: UserId,
    pub recipient: UserId,
    pub status: FriendshipStatus,
    pub timestamp: Time,
}

impl Friendship {
    pub fn involves(&self, user: &UserId) -> bool {
        self.sender == *user || self.recipient == *user
    }

    pub fn counterpart(&self, user: &UserId) -> Option<&UserId> {
        if self.sender == *user {
            Some(&self.recipient)
        } else if self.recipient == *user {
            Some(&self.sender)
        } else {
            None
        }
    }

    /// A pending request shows up as incoming on the recipient's side only.
    pub fn is_incoming_for(&self, user: &UserId) -> bool {
        self.status == FriendshipStatus::Pending && self.recipient == *user
    }
}
