use crate::config::{ServerConfig, ServerKind};
use rand::Rng;

/// Short random identifier for sessions and wire envelopes
pub fn random_id() -> String {
    hex::encode(rand::rng().random::<[u8; 8]>())
}

/// Prefixes the ICE server url with `stun:`/`turn:` when the scheme is missing
pub fn add_ice_url_scheme(config: &ServerConfig) -> String {
    if config.url.starts_with("turn:")
        || config.url.starts_with("turns:")
        || config.url.starts_with("stun:")
        || config.url.starts_with("stuns:")
    {
        config.url.clone()
    } else {
        let scheme = match config.kind {
            ServerKind::Turn => "turn:",
            ServerKind::Stun => "stun:",
        };
        format!("{}{}", scheme, config.url)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn server(kind: ServerKind, url: &str) -> ServerConfig {
        ServerConfig {
            id: "s".into(),
            kind,
            url: url.into(),
            username: None,
            credential: None,
        }
    }

    #[test]
    fn random_id_is_sixteen_hex_chars() {
        let id = random_id();
        assert_eq!(id.len(), 16);
        assert!(id.chars().all(|c| c.is_ascii_hexdigit()));
        assert_ne!(id, random_id());
    }

    #[test]
    fn scheme_is_added_only_when_missing() {
        assert_eq!(
            add_ice_url_scheme(&server(ServerKind::Stun, "stun.example.org:3478")),
            "stun:stun.example.org:3478"
        );
        assert_eq!(
            add_ice_url_scheme(&server(ServerKind::Turn, "relay.example.org:3478")),
            "turn:relay.example.org:3478"
        );
        assert_eq!(
            add_ice_url_scheme(&server(ServerKind::Turn, "turns:relay.example.org:5349")),
            "turns:relay.example.org:5349"
        );
    }
}
