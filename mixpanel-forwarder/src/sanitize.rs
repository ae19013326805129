use crate::event::Properties;

/// Keys with this prefix are reserved by Mixpanel's browser SDKs.
pub const RESERVED_PREFIX: &str = "mp_";

const TOKEN_KEY: &str = "token";

/// Strips `token` and every browser-reserved key from a property set.
pub fn sanitize(properties: Properties) -> Properties {
    sanitize_excluding(properties, &[])
}

/// Like [`sanitize`], additionally dropping every key listed in `consumed`.
pub fn sanitize_excluding(properties: Properties, consumed: &[&str]) -> Properties {
    properties
        .into_iter()
        .filter(|(key, _)| !is_stripped(key) && !consumed.contains(&key.as_str()))
        .collect()
}

fn is_stripped(key: &str) -> bool {
    key == TOKEN_KEY || key.starts_with(RESERVED_PREFIX)
}
