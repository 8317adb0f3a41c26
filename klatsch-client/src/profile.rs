use crate::api::{Friendship, FriendshipStatus, Post, User, UserId};

/// Where the viewer stands with the profile's owner. Drives which action the
/// profile page offers (add friend, cancel request, accept, unfriend).
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Relation {
    Myself,
    Stranger,
    RequestSent,
    RequestReceived,
    Friends,
}

pub fn relation(viewer: &UserId, subject: &UserId, friendship: Option<&Friendship>) -> Relation {
    if viewer == subject {
        return Relation::Myself;
    }
    match friendship {
        None => Relation::Stranger,
        Some(f) => match f.status {
            FriendshipStatus::Accepted => Relation::Friends,
            FriendshipStatus::Pending if f.sender == *viewer => Relation::RequestSent,
            FriendshipStatus::Pending => Relation::RequestReceived,
        },
    }
}

/// Everything one profile page shows, assembled by `remote::open_profile`.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct ProfileView {
    pub user: User,
    pub posts: Vec<Post>,
    pub friends: Vec<User>,
    pub friendship: Option<Friendship>,
}

impl ProfileView {
    pub fn relation_to(&self, viewer: &UserId) -> Relation {
        relation(viewer, &self.user.id, self.friendship.as_ref())
    }

    /// Every friendship mutation answers with the new state (or its removal);
    /// this keeps the page in sync without a refetch.
    pub fn apply_friendship(&mut self, friendship: Option<Friendship>) {
        self.friendship = friendship;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::FriendshipId;
    use chrono::{TimeZone, Utc};

    fn uid(id: &str) -> UserId {
        UserId(String::from(id))
    }

    fn friendship(sender: &str, recipient: &str, status: FriendshipStatus) -> Friendship {
        Friendship {
            id: FriendshipId(String::from("f1")),
            sender: uid(sender),
            recipient: uid(recipient),
            status,
            timestamp: Utc.with_ymd_and_hms(2023, 1, 7, 9, 0, 0).unwrap(),
        }
    }

    #[test]
    fn relation_covers_every_shape() {
        let me = uid("u1");
        let them = uid("u2");

        assert_eq!(relation(&me, &me, None), Relation::Myself);
        assert_eq!(relation(&me, &them, None), Relation::Stranger);
        assert_eq!(
            relation(&me, &them, Some(&friendship("u1", "u2", FriendshipStatus::Pending))),
            Relation::RequestSent
        );
        assert_eq!(
            relation(&me, &them, Some(&friendship("u2", "u1", FriendshipStatus::Pending))),
            Relation::RequestReceived
        );
        assert_eq!(
            relation(&me, &them, Some(&friendship("u1", "u2", FriendshipStatus::Accepted))),
            Relation::Friends
        );
        assert_eq!(
            relation(&me, &them, Some(&friendship("u2", "u1", FriendshipStatus::Accepted))),
            Relation::Friends
        );
    }

    #[test]
    fn own_profile_ignores_any_friendship_record() {
        let me = uid("u1");
        assert_eq!(
            relation(&me, &me, Some(&friendship("u1", "u1", FriendshipStatus::Pending))),
            Relation::Myself
        );
    }
}
