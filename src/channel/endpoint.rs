//! # Relay endpoint construction.
//!
//! ```text
//! <ws|wss>://<host>/<role>-tracking/<subjectId>/?token=<token>
//! ```
//!
//! The scheme follows [`RelayConfig::secure`](crate::RelayConfig) (`wss` when
//! the page origin is `https`). The relay authenticates the token query
//! parameter during the handshake; there is no secondary auth message.

use secrecy::ExposeSecret;
use url::Url;

use crate::channel::SessionIdentity;
use crate::core::RelayConfig;
use crate::error::ChannelError;

/// Builds the tracking endpoint for `identity` on `relay`.
///
/// The token is form-encoded into the query string.
pub fn tracking_url(relay: &RelayConfig, identity: &SessionIdentity) -> Result<Url, ChannelError> {
    let subject = identity.subject();
    let raw = format!(
        "{}://{}/{}-tracking/{}/",
        relay.scheme(),
        relay.host.trim_end_matches('/'),
        subject.role,
        subject.id
    );
    let mut url = Url::parse(&raw).map_err(|e| ChannelError::InvalidEndpoint {
        reason: format!("{e} ({})", relay.host),
    })?;
    url.query_pairs_mut()
        .append_pair("token", identity.token().expose_secret());
    Ok(url)
}
