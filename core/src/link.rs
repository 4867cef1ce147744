//! Shareable ticket references.
//!
//! A ticket is addressable by a URL whose fragment carries the ticket id. The
//! same URL is the payload of any QR code presented at the door, so scanning
//! the code and following a shared link land on the same page.

use crate::types::TicketId;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Fragment route under which tickets are served.
const TICKET_ROUTE: &str = "#/ticket/";

/// Addressable URL of one ticket.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TicketLink(String);

impl TicketLink {
    /// Build the link for `ticket_id` under the storefront's public base URL.
    ///
    /// A trailing slash on the base is kept as given so `https://x.io/` and
    /// `https://x.io/app` both yield a usable hash route.
    ///
    /// # Examples
    ///
    /// ```
    /// # use boxoffice_core::link::TicketLink;
    /// # use boxoffice_core::types::TicketId;
    /// let link = TicketLink::new("https://tickets.example.com/", &TicketId::from_string("t-1"));
    /// assert_eq!(link.as_str(), "https://tickets.example.com/#/ticket/t-1");
    /// ```
    #[must_use]
    pub fn new(base_url: &str, ticket_id: &TicketId) -> Self {
        Self(format!(
            "{base_url}{TICKET_ROUTE}{}",
            urlencoding::encode(ticket_id.as_str())
        ))
    }

    /// Payload to encode into a QR code: the link itself, never the bare id.
    #[must_use]
    pub fn qr_payload(&self) -> &str {
        &self.0
    }

    /// Recover the ticket id from a link produced by [`TicketLink::new`].
    #[must_use]
    pub fn parse_ticket_id(url: &str) -> Option<TicketId> {
        let (_, encoded) = url.split_once(TICKET_ROUTE)?;
        let id = urlencoding::decode(encoded).ok()?;
        if id.is_empty() {
            return None;
        }
        Some(TicketId::from_string(id.into_owned()))
    }

    /// Borrow the URL
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for TicketLink {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}
