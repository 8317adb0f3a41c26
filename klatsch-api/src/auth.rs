use uuid::Uuid;

use crate::UserId;

#[derive(Clone, Debug, serde::Deserialize, serde::Serialize)]
pub struct Credentials {
    pub username: String,
    pub password: String,
}

#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq, serde::Deserialize, serde::Serialize)]
pub struct AuthToken(pub Uuid);

/// Issued once at login and held by the transport; the access token goes on
/// every call, the refresh token only ever reaches the renewal endpoint.
#[derive(Clone, Debug, Eq, PartialEq, serde::Deserialize, serde::Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Session {
    pub user: UserId,
    pub access: AuthToken,
    pub refresh: AuthToken,
}

#[derive(Clone, Debug, serde::Deserialize, serde::Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RenewSession {
    pub refresh: AuthToken,
}
