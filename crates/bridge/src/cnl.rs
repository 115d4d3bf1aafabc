//! Click'n'Load payload decoding
//!
//! Browser pages hand links to a local downloader by POSTing forms to
//! `/flash/*`. Three variants are understood:
//!
//! - `flash/add`: plain links in the `urls` field
//! - `flash/addcrypted2`: `crypted` is base64 AES-128-CBC ciphertext, the key
//!   (also used as IV) is hex returned by the JavaScript snippet in `jk`
//! - `flash/addcrypted`: `crypted` is the text of a DLC container

use aes::Aes128;
use base64::{engine::general_purpose::STANDARD, Engine as _};
use cbc::cipher::{block_padding::NoPadding, BlockDecryptMut, KeyIvInit};
use regex::Regex;
use std::collections::HashMap;
use std::sync::OnceLock;
use types::{utils::split_link_text, BridgeError, LinkSubmission, Result};
use uuid::Uuid;

type Aes128CbcDec = cbc::Decryptor<Aes128>;

/// Package name used when the page supplies neither a package nor a source
pub const DEFAULT_PACKAGE_NAME: &str = "CNL Package";

/// Body of the `flash` and `flash/check` probes
pub const PROBE_RESPONSE: &str = "JDownloader";

/// Body of the `jdcheck.js` probe
pub const JDCHECK_RESPONSE: &str = "jdownloader=true;";

pub const CROSSDOMAIN_POLICY: &str = r#"<?xml version="1.0"?>
<!DOCTYPE cross-domain-policy SYSTEM "http://www.macromedia.com/xml/dtds/cross-domain-policy.dtd">
<cross-domain-policy>
<allow-access-from domain="*" />
</cross-domain-policy>"#;

/// What a CNL request turned into
#[derive(Debug, Clone, PartialEq)]
pub enum CnlSubmission {
    Links(LinkSubmission),
    Container { filename: String, payload: Vec<u8> },
}

fn key_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r#"return ['"]([0-9a-fA-F]+)['"]"#).expect("key pattern is a valid regex")
    })
}

fn invalid(message: impl Into<String>) -> BridgeError {
    BridgeError::InvalidSubmission(message.into())
}

fn field<'a>(fields: &'a HashMap<String, String>, name: &str) -> Option<&'a str> {
    fields
        .get(name)
        .map(|v| v.trim())
        .filter(|v| !v.is_empty())
}

/// Pull the AES key out of the `jk` JavaScript snippet,
/// e.g. `function f(){ return '31323334353637383930313233343536'; }`
pub fn extract_key(jk: &str) -> Result<Vec<u8>> {
    let hex_key = key_pattern()
        .captures(jk)
        .and_then(|c| c.get(1))
        .ok_or_else(|| invalid("Could not extract key from jk"))?;

    let key = hex::decode(hex_key.as_str()).map_err(|e| invalid(format!("Invalid key hex: {}", e)))?;
    if key.len() != 16 {
        return Err(invalid(format!("Expected a 16 byte key, got {} bytes", key.len())));
    }
    Ok(key)
}

fn decode_base64(data: &str) -> Result<Vec<u8>> {
    // form decoding may have turned '+' into ' '
    let cleaned: String = data
        .trim()
        .chars()
        .filter(|c| *c != '\r' && *c != '\n')
        .map(|c| if c == ' ' { '+' } else { c })
        .collect();

    STANDARD
        .decode(cleaned)
        .map_err(|e| invalid(format!("Invalid base64 payload: {}", e)))
}

/// Decrypt an `addcrypted2` payload into its links
pub fn decrypt_links(crypted: &str, jk: &str) -> Result<Vec<String>> {
    let key = extract_key(jk)?;
    let mut buffer = decode_base64(crypted)?;
    if buffer.is_empty() || buffer.len() % 16 != 0 {
        return Err(invalid("Ciphertext is not a whole number of AES blocks"));
    }

    let decryptor = Aes128CbcDec::new_from_slices(&key, &key)
        .map_err(|e| invalid(format!("Invalid key length: {}", e)))?;
    let plaintext = decryptor
        .decrypt_padded_mut::<NoPadding>(&mut buffer)
        .map_err(|e| invalid(format!("Decryption failed: {}", e)))?;

    let links = split_link_text(&String::from_utf8_lossy(plaintext));
    if links.is_empty() {
        return Err(invalid("No links found in decrypted payload"));
    }
    Ok(links)
}

/// Package label with the `package` > `source` > default fallback
pub fn package_name(fields: &HashMap<String, String>) -> String {
    field(fields, "package")
        .or_else(|| field(fields, "source"))
        .unwrap_or(DEFAULT_PACKAGE_NAME)
        .to_string()
}

/// Interpret the form posted to `subpath` (relative to the CNL root)
pub fn parse_submission(subpath: &str, fields: &HashMap<String, String>) -> Result<CnlSubmission> {
    let action = subpath.trim_matches('/');

    let links = match action {
        "flash/add" => {
            let urls = field(fields, "urls")
                .or_else(|| field(fields, "links"))
                .ok_or_else(|| invalid("Missing urls field"))?;
            split_link_text(urls)
        }
        "flash/addcrypted2" => {
            let crypted = field(fields, "crypted").ok_or_else(|| invalid("Missing crypted field"))?;
            let jk = field(fields, "jk").ok_or_else(|| invalid("Missing jk field"))?;
            decrypt_links(crypted, jk)?
        }
        "flash/addcrypted" => {
            let crypted = field(fields, "crypted").ok_or_else(|| invalid("Missing crypted field"))?;
            return Ok(CnlSubmission::Container {
                filename: format!("cnl-{}.dlc", Uuid::new_v4()),
                payload: crypted.as_bytes().to_vec(),
            });
        }
        other => {
            return Err(BridgeError::not_found(format!("CNL endpoint {}", other)));
        }
    };

    Ok(CnlSubmission::Links(LinkSubmission {
        links,
        name: Some(package_name(fields)),
        password: field(fields, "passwords").map(str::to_string),
        source: field(fields, "source").map(str::to_string),
    }))
}
