//!
//! src/signature.rs  Andrew Belles  Oct 16th, 2026
//!
//! Last.fm `api_sig` for signed (write) calls:
//! md5( k1 v1 k2 v2 ... secret ) over byte-wise sorted keys, `format` excluded
//!

use std::collections::BTreeMap;

/// Parameter never covered by the signature
pub const UNSIGNED_PARAM: &str = "format";

pub fn api_signature<I, K, V>(params: I, secret: &str) -> String
where
    I: IntoIterator<Item = (K, V)>,
    K: AsRef<str>,
    V: AsRef<str>,
{
    // String's Ord is byte-wise, which is what the protocol wants
    let sorted: BTreeMap<String, String> = params
        .into_iter()
        .filter(|(k, _)| k.as_ref() != UNSIGNED_PARAM)
        .map(|(k, v)| (k.as_ref().to_string(), v.as_ref().to_string()))
        .collect();

    let mut payload = String::new();
    for (key, value) in &sorted {
        payload.push_str(key);
        payload.push_str(value);
    }
    payload.push_str(secret);

    format!("{:x}", md5::compute(payload.as_bytes()))
}
