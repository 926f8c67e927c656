//! The composed message handed to a transport.
//!
//! Composition (address parsing, MIME encoding) happens before a message reaches the
//! sender; delivery code treats a [`Message`] as an opaque payload and only looks at it
//! to decide whether it carries attachments and to name its recipients in log output.

use std::fmt::{self, Display, Formatter};

use serde::{Deserialize, Serialize};

/// An attachment with filename, content type and raw data.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Attachment {
    /// The filename to use in the MIME header.
    pub filename: String,
    /// The MIME content type (e.g., "application/pdf").
    pub content_type: String,
    /// The attachment data.
    pub data: Vec<u8>,
}

/// A fully composed message, ready for a transport.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    pub from: Option<String>,
    pub to: Vec<String>,
    pub reply_to: Option<String>,
    pub subject: String,
    pub body: String,
    pub html: bool,
    #[serde(default)]
    pub attachments: Vec<Attachment>,
}

impl Message {
    #[must_use]
    pub fn builder() -> MessageBuilder {
        MessageBuilder::default()
    }

    #[must_use]
    pub fn has_attachments(&self) -> bool {
        !self.attachments.is_empty()
    }

    /// Recipients joined for display, e.g. `a@example.com, b@example.com`.
    #[must_use]
    pub fn recipients(&self) -> String {
        self.to.join(", ")
    }
}

impl Display for Message {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "'{}' to [{}]", self.subject, self.recipients())
    }
}

/// Builder for [`Message`].
///
/// ```
/// use courier_common::Message;
///
/// let message = Message::builder()
///     .from("postmaster@example.com")
///     .to("recipient@example.com")
///     .subject("Hello")
///     .body("This is the message body")
///     .build();
///
/// assert!(!message.has_attachments());
/// ```
#[derive(Debug, Clone, Default)]
pub struct MessageBuilder {
    message: Message,
}

impl MessageBuilder {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the From header.
    #[must_use]
    pub fn from(mut self, email: impl Into<String>) -> Self {
        self.message.from = Some(email.into());
        self
    }

    /// Adds a recipient.
    #[must_use]
    pub fn to(mut self, email: impl Into<String>) -> Self {
        self.message.to.push(email.into());
        self
    }

    /// Adds multiple recipients.
    #[must_use]
    pub fn to_multiple(mut self, emails: &[impl AsRef<str>]) -> Self {
        self.message
            .to
            .extend(emails.iter().map(|email| email.as_ref().to_string()));
        self
    }

    #[must_use]
    pub fn reply_to(mut self, email: impl Into<String>) -> Self {
        self.message.reply_to = Some(email.into());
        self
    }

    #[must_use]
    pub fn subject(mut self, subject: impl Into<String>) -> Self {
        self.message.subject = subject.into();
        self
    }

    #[must_use]
    pub fn body(mut self, content: impl Into<String>) -> Self {
        self.message.body = content.into();
        self
    }

    /// Marks the body as HTML rather than plain text.
    #[must_use]
    pub const fn html(mut self, html: bool) -> Self {
        self.message.html = html;
        self
    }

    /// Adds an attachment from raw data.
    #[must_use]
    pub fn attachment(
        mut self,
        filename: impl Into<String>,
        content_type: impl Into<String>,
        data: impl Into<Vec<u8>>,
    ) -> Self {
        self.message.attachments.push(Attachment {
            filename: filename.into(),
            content_type: content_type.into(),
            data: data.into(),
        });
        self
    }

    #[must_use]
    pub fn build(self) -> Message {
        self.message
    }
}
