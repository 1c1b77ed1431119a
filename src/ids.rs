use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt::{Display, Formatter};
use std::str::FromStr;

/// Strongly typed call identifier backed by ULID.
///
/// Every [`Exchange`](crate::exchange::Exchange) carries one; the async
/// callback registry and the WS-Addressing `MessageID` header reuse it.
#[derive(Clone, Copy, Eq, PartialEq, Hash, Debug, PartialOrd, Ord)]
pub struct CallId(pub ulid::Ulid);

impl CallId {
    #[must_use]
    pub fn new() -> Self {
        Self(ulid::Ulid::new())
    }

    #[must_use]
    pub fn from_ulid(id: ulid::Ulid) -> Self {
        Self(id)
    }

    /// Render as a `urn:uuid:`-style message id for addressing headers.
    #[must_use]
    pub fn as_message_id(&self) -> String {
        format!("uuid:{}", uuid_like(self.0))
    }
}

fn uuid_like(id: ulid::Ulid) -> String {
    let hex = format!("{:032x}", u128::from(id));
    format!(
        "{}-{}-{}-{}-{}",
        &hex[0..8],
        &hex[8..12],
        &hex[12..16],
        &hex[16..20],
        &hex[20..32]
    )
}

impl Default for CallId {
    fn default() -> Self {
        Self::new()
    }
}

impl Display for CallId {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for CallId {
    type Err = ulid::DecodeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let id = ulid::Ulid::from_string(s)?;
        Ok(CallId(id))
    }
}

impl Serialize for CallId {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_string())
    }
}

impl<'de> Deserialize<'de> for CallId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse::<CallId>()
            .map_err(|_| serde::de::Error::custom("invalid call id"))
    }
}
