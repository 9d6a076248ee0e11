use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use zeroize::Zeroize;

macro_rules! id_newtype {
    ($name:ident) => {
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
        pub struct $name(pub i64);
    };
}

id_newtype!(GroupId);
id_newtype!(VoiceRoomId);

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct AccountId(pub String);

impl AccountId {
    pub fn new(identity: impl Into<String>) -> Self {
        Self(identity.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for AccountId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Operator-supplied group reference: an invite link, a public handle, or a
/// numeric id rendered as text.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct GroupRef(pub String);

const INVITE_PREFIXES: [&str; 2] = ["https://t.me/joinchat/", "https://t.me/+"];

impl GroupRef {
    pub fn new(reference: impl Into<String>) -> Self {
        Self(reference.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Invite links resolve to their hash (final path segment, leading `+`
    /// stripped); everything else is a direct reference.
    pub fn join_target(&self) -> JoinTarget<'_> {
        for prefix in INVITE_PREFIXES {
            if let Some(rest) = self.0.strip_prefix(prefix) {
                let hash = rest.rsplit('/').next().unwrap_or(rest);
                return JoinTarget::Invite(hash.trim_start_matches('+'));
            }
        }
        JoinTarget::Reference(&self.0)
    }
}

impl fmt::Display for GroupRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JoinTarget<'a> {
    Invite(&'a str),
    Reference(&'a str),
}

/// Resumable authentication state for one account. Opaque to the engine,
/// base64 at rest, wiped on drop.
#[derive(Clone, PartialEq, Eq)]
pub struct SessionToken(Vec<u8>);

impl SessionToken {
    pub fn new(bytes: impl Into<Vec<u8>>) -> Self {
        Self(bytes.into())
    }

    pub fn from_encoded(encoded: &str) -> Result<Self, base64::DecodeError> {
        use base64::{engine::general_purpose, Engine as _};
        Ok(Self(general_purpose::STANDARD.decode(encoded)?))
    }

    pub fn encoded(&self) -> String {
        use base64::{engine::general_purpose, Engine as _};
        general_purpose::STANDARD.encode(&self.0)
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }
}

impl fmt::Debug for SessionToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "SessionToken({} bytes)", self.0.len())
    }
}

impl Drop for SessionToken {
    fn drop(&mut self) {
        self.0.zeroize();
    }
}

impl Serialize for SessionToken {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.encoded())
    }
}

impl<'de> Deserialize<'de> for SessionToken {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let encoded = String::deserialize(deserializer)?;
        Self::from_encoded(&encoded).map_err(serde::de::Error::custom)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GroupEntity {
    pub id: GroupId,
    pub title: String,
}

/// One credential-store row. The whole record set is rewritten on every
/// mutation, never appended.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccountRecord {
    pub identity: AccountId,
    pub token: Option<SessionToken>,
    pub active: bool,
    pub joined_groups: Vec<GroupRef>,
}

impl AccountRecord {
    pub fn new(identity: AccountId, token: Option<SessionToken>) -> Self {
        Self {
            identity,
            token,
            active: false,
            joined_groups: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VoiceRoomMembership {
    pub group: GroupRef,
    pub voice_room: VoiceRoomId,
    pub joined_at: DateTime<Utc>,
}

/// One entry of a multi-room join request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VoiceRoomTarget {
    pub group: GroupRef,
    pub voice_room: VoiceRoomId,
    pub accounts: usize,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn joinchat_link_is_an_invite() {
        let group = GroupRef::new("https://t.me/joinchat/AbCdEf123");
        assert_eq!(group.join_target(), JoinTarget::Invite("AbCdEf123"));
    }

    #[test]
    fn plus_link_is_an_invite_without_the_plus() {
        let group = GroupRef::new("https://t.me/+XyZ987");
        assert_eq!(group.join_target(), JoinTarget::Invite("XyZ987"));
    }

    #[test]
    fn handle_and_numeric_id_are_direct_references() {
        assert_eq!(
            GroupRef::new("@somegroup").join_target(),
            JoinTarget::Reference("@somegroup")
        );
        assert_eq!(
            GroupRef::new("-1001234567890").join_target(),
            JoinTarget::Reference("-1001234567890")
        );
    }

    #[test]
    fn plain_group_url_is_a_direct_reference() {
        let group = GroupRef::new("https://t.me/somegroup");
        assert_eq!(
            group.join_target(),
            JoinTarget::Reference("https://t.me/somegroup")
        );
    }

    #[test]
    fn token_round_trips_as_base64_text() {
        let token = SessionToken::new(vec![0x01, 0xfe, 0x7a]);
        let json = serde_json::to_string(&token).unwrap();
        assert_eq!(json, "\"Af56\"");
        let back: SessionToken = serde_json::from_str(&json).unwrap();
        assert_eq!(back, token);
    }

    #[test]
    fn token_debug_never_prints_contents() {
        let token = SessionToken::new(b"very-secret".to_vec());
        let rendered = format!("{token:?}");
        assert!(!rendered.contains("very-secret"));
        assert!(rendered.contains("11 bytes"));
    }
}
