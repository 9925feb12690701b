//! Test harness for Nextcloud Talk bot webhooks.
//!
//! This crate provides a **signer** that posts a signed test event to a
//! webhook endpoint, and a **verifier** that checks incoming requests and
//! echoes their payload back.
//!
//! Both sides share one primitive: HMAC-SHA256 over `random ++ body`,
//! keyed by the bot secret, carried in the `X-Nextcloud-Talk-Random` and
//! `X-Nextcloud-Talk-Signature` headers.
//!
//! ## Guarantees
//! - Signatures cover the exact transmitted bytes
//! - Constant-time signature comparison
//! - A fresh random value per request
//!
//! ## Non-Guarantees
//! - Replay protection (random values are not remembered)
//! - Retries or backoff
//! - Production hardening of the echo server
//!
//! This crate is intentionally **a test tool**, not a webhook framework.

pub mod client;
pub mod config;
mod error;
pub mod server;
mod signing;
mod types;

pub use client::{DeliveryReport, WebhookClient};
pub use config::{
    ProbeConfig, SecretSource, DEFAULT_GATEWAY_PORT, DEFAULT_SERVER_PORT, DEFAULT_WEBHOOK_PATH,
    PLACEHOLDER_SECRET,
};
pub use error::{ConfigError, DeliveryError, VerificationError, WebhookError};
pub use signing::{
    compute_signature,
    generate_nonce,
    parse_signature_headers,
    sign,
    verify_signature,
    verify_webhook_request,
    Nonce,
    ParsedSignature,
    SignedRequest,
    RANDOM_HEADER,
    SIGNATURE_HEADER,
};
pub use types::{Actor, BotSecret, EchoResponse, MessageObject, TalkEvent, Target};
