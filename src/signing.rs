use std::fmt;

use hmac::{Hmac, Mac};
use rand::rngs::OsRng;
use rand::RngCore;
use sha2::Sha256;

use crate::error::VerificationError;
use crate::types::BotSecret;

type HmacSha256 = Hmac<Sha256>;

/// Header carrying the per-request random value.
pub const RANDOM_HEADER: &str = "X-Nextcloud-Talk-Random";

/// Header carrying the hex-encoded HMAC-SHA256 signature.
pub const SIGNATURE_HEADER: &str = "X-Nextcloud-Talk-Signature";

/// Number of random bytes in a nonce before hex encoding.
pub const NONCE_LEN: usize = 32;

/// Single-use random value mixed into the signed material.
///
/// The hex text itself (not the decoded bytes) is what gets signed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Nonce(String);

impl Nonce {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Nonce {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Generate a fresh nonce from the OS random source.
pub fn generate_nonce() -> Nonce {
    let mut bytes = [0u8; NONCE_LEN];
    OsRng.fill_bytes(&mut bytes);
    Nonce(hex::encode(bytes))
}

fn keyed_mac(secret: &[u8], nonce: &[u8], body: &[u8]) -> HmacSha256 {
    let mut mac = HmacSha256::new_from_slice(secret).expect("HMAC accepts keys of any length");
    mac.update(nonce);
    mac.update(body);
    mac
}

/// Compute the lowercase hex HMAC-SHA256 of `nonce ++ body`.
pub fn compute_signature(secret: &[u8], nonce: &[u8], body: &[u8]) -> String {
    hex::encode(keyed_mac(secret, nonce, body).finalize().into_bytes())
}

/// Verify a received signature against `nonce ++ body`.
///
/// Hex case is ignored. Anything that does not decode to a digest of the
/// right length is treated as a mismatch. The digest comparison runs in
/// constant time.
pub fn verify_signature(secret: &[u8], nonce: &[u8], body: &[u8], signature_hex: &str) -> bool {
    let Ok(signature) = hex::decode(signature_hex) else {
        return false;
    };

    keyed_mac(secret, nonce, body).verify_slice(&signature).is_ok()
}

/// A body together with the nonce and signature that authenticate it.
#[derive(Debug, Clone)]
pub struct SignedRequest {
    pub nonce: Nonce,
    pub signature: String,
    pub body: Vec<u8>,
}

impl SignedRequest {
    /// Header pairs to attach to the outgoing request.
    pub fn headers(&self) -> [(&'static str, &str); 2] {
        [
            (RANDOM_HEADER, self.nonce.as_str()),
            (SIGNATURE_HEADER, self.signature.as_str()),
        ]
    }
}

/// Sign `body` under a freshly generated nonce.
pub fn sign(secret: &BotSecret, body: impl Into<Vec<u8>>) -> SignedRequest {
    let nonce = generate_nonce();
    let body = body.into();
    let signature = compute_signature(secret.as_bytes(), nonce.as_str().as_bytes(), &body);

    SignedRequest { nonce, signature, body }
}

/// Random value and signature as found on an incoming request.
///
/// Missing headers are represented as empty strings.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ParsedSignature {
    pub random: String,
    pub signature: String,
}

/// Pull the Talk random and signature headers out of a header list.
pub fn parse_signature_headers<'a, I>(headers: I) -> ParsedSignature
where
    I: IntoIterator<Item = (&'a str, &'a str)>,
{
    let mut parsed = ParsedSignature::default();

    for (name, value) in headers {
        if name.eq_ignore_ascii_case(RANDOM_HEADER) {
            parsed.random = value.to_string();
        } else if name.eq_ignore_ascii_case(SIGNATURE_HEADER) {
            parsed.signature = value.to_string();
        }
    }

    parsed
}

/// Verify an incoming webhook request in one call.
pub fn verify_webhook_request<'a, I>(
    headers: I,
    body: &[u8],
    secret: &BotSecret,
) -> Result<(), VerificationError>
where
    I: IntoIterator<Item = (&'a str, &'a str)>,
{
    let parsed = parse_signature_headers(headers);

    if verify_signature(secret.as_bytes(), parsed.random.as_bytes(), body, &parsed.signature) {
        Ok(())
    } else {
        Err(VerificationError::InvalidSignature)
    }
}
