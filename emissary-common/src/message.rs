//! Outbound message and its identifier
//!
//! A [`Message`] is immutable once built. Only its [`MessageId`] takes part in
//! deduplication and status tracking; two messages with the same id are the
//! same logical request no matter what their content says.

use std::{
    fmt::{self, Display},
    ops::Deref,
    sync::Arc,
};

use serde::{Deserialize, Serialize};

/// Opaque identifier of a logical send request
///
/// Cheap to clone, so it can be used as a key in several concurrent maps at
/// once without copying the underlying string.
///
/// # Examples
///
/// ```
/// use emissary_common::MessageId;
///
/// let id = MessageId::new("email-001");
/// assert_eq!(id.as_str(), "email-001");
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
#[repr(transparent)]
pub struct MessageId(Arc<str>);

impl MessageId {
    #[must_use]
    pub fn new(s: impl Into<Arc<str>>) -> Self {
        Self(s.into())
    }

    /// Generate a fresh, lexicographically time-ordered id
    #[must_use]
    pub fn generate() -> Self {
        Self::new(ulid::Ulid::new().to_string())
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Display for MessageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for MessageId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl Deref for MessageId {
    type Target = str;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl From<String> for MessageId {
    fn from(s: String) -> Self {
        Self(Arc::from(s))
    }
}

impl From<&str> for MessageId {
    fn from(s: &str) -> Self {
        Self(Arc::from(s))
    }
}

/// An email handed to the dispatcher
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    id: MessageId,
    #[serde(alias = "to")]
    recipient: String,
    #[serde(default)]
    subject: String,
    #[serde(default)]
    body: String,
}

impl Message {
    #[must_use]
    pub fn new(
        id: impl Into<MessageId>,
        recipient: impl Into<String>,
        subject: impl Into<String>,
        body: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            recipient: recipient.into(),
            subject: subject.into(),
            body: body.into(),
        }
    }

    #[must_use]
    pub const fn id(&self) -> &MessageId {
        &self.id
    }

    #[must_use]
    pub fn recipient(&self) -> &str {
        &self.recipient
    }

    #[must_use]
    pub fn subject(&self) -> &str {
        &self.subject
    }

    #[must_use]
    pub fn body(&self) -> &str {
        &self.body
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    #[test]
    fn id_conversions() {
        let from_str: MessageId = "email-001".into();
        let from_string: MessageId = String::from("email-001").into();

        assert_eq!(from_str, from_string);
        assert_eq!(from_str.to_string(), "email-001");
        assert_eq!(from_str.len(), 9);
    }

    #[test]
    fn generated_ids_are_unique() {
        let a = MessageId::generate();
        let b = MessageId::generate();

        assert_ne!(a, b);
        assert_eq!(a.len(), 26);
    }

    #[test]
    fn message_accessors() {
        let message = Message::new(
            "email-001",
            "user@example.com",
            "testing",
            "this is a test email.",
        );

        assert_eq!(message.id().as_str(), "email-001");
        assert_eq!(message.recipient(), "user@example.com");
        assert_eq!(message.subject(), "testing");
        assert_eq!(message.body(), "this is a test email.");
    }

    #[test]
    fn message_from_ron() {
        let message: Message =
            ron::from_str(r#"(id: "email-002", to: "someone@example.org", subject: "hi")"#)
                .unwrap();

        assert_eq!(
            message,
            Message::new("email-002", "someone@example.org", "hi", "")
        );
    }
}
