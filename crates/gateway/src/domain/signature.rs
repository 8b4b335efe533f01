//! Ed25519 request signature verification.
//!
//! Discord signs every HTTP interaction request over `timestamp || body` with
//! the application's Ed25519 key. The verifier is a pure function over the raw
//! body bytes: the body is never re-serialized before checking, since any
//! round-trip through a JSON library could change byte order or whitespace and
//! break the signature.
//!
//! ## Security Notes
//!
//! - Malformed hex or a wrong-length signature must map to a rejection, never
//!   a panic or a 500; an attacker controls both headers.
//! - Timing characteristics come from the underlying Ed25519 primitive
//!   (`ed25519-dalek`), not from custom comparisons.

use ed25519_dalek::{Signature, Verifier, VerifyingKey};

use super::error::ConfigError;

/// Expected hex length of the `X-Signature-Ed25519` header (64 raw bytes).
const SIGNATURE_HEX_LEN: usize = 128;

/// Expected hex length of the application public key (32 raw bytes).
const PUBLIC_KEY_HEX_LEN: usize = 64;

/// Outcome of a signature check.
///
/// `MalformedInput` is distinguished from `Invalid` for observability only;
/// both must be answered with HTTP 401.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SignatureCheck {
    /// Signature verified against the configured public key.
    Valid,
    /// Well-formed signature that does not match the message.
    Invalid,
    /// Header was not valid hex or had the wrong length.
    MalformedInput,
}

impl SignatureCheck {
    /// True only for [`SignatureCheck::Valid`].
    pub fn is_valid(&self) -> bool {
        matches!(self, SignatureCheck::Valid)
    }
}

/// Verifies inbound request signatures against the application public key.
///
/// The key is immutable process-wide configuration, parsed once at startup;
/// the verifier is cheap to clone and safe to share across request tasks.
#[derive(Debug, Clone)]
pub struct SignatureVerifier {
    public_key: VerifyingKey,
}

impl SignatureVerifier {
    /// Parse a hex-encoded Ed25519 public key (as shown in the Discord
    /// developer portal) into a verifier.
    pub fn from_hex(public_key_hex: &str) -> Result<Self, ConfigError> {
        if public_key_hex.len() != PUBLIC_KEY_HEX_LEN {
            return Err(ConfigError::InvalidPublicKey(format!(
                "expected {} hex characters, got {}",
                PUBLIC_KEY_HEX_LEN,
                public_key_hex.len()
            )));
        }

        let mut key_bytes = [0u8; 32];
        hex::decode_to_slice(public_key_hex, &mut key_bytes)
            .map_err(|e| ConfigError::InvalidPublicKey(format!("invalid hex: {}", e)))?;

        let public_key = VerifyingKey::from_bytes(&key_bytes)
            .map_err(|e| ConfigError::InvalidPublicKey(format!("not a valid curve point: {}", e)))?;

        Ok(Self { public_key })
    }

    /// Build directly from a parsed key (test fixtures).
    pub fn from_key(public_key: VerifyingKey) -> Self {
        Self { public_key }
    }

    /// Verify an Ed25519 signature over `timestamp || body`.
    ///
    /// Pure and deterministic; never returns an error or panics. Any failure
    /// to decode the signature header is reported as `MalformedInput`.
    pub fn verify(&self, timestamp: &str, body: &[u8], signature_hex: &str) -> SignatureCheck {
        if signature_hex.len() != SIGNATURE_HEX_LEN {
            return SignatureCheck::MalformedInput;
        }

        let mut sig_bytes = [0u8; 64];
        if hex::decode_to_slice(signature_hex, &mut sig_bytes).is_err() {
            return SignatureCheck::MalformedInput;
        }
        let signature = Signature::from_bytes(&sig_bytes);

        let mut message = Vec::with_capacity(timestamp.len() + body.len());
        message.extend_from_slice(timestamp.as_bytes());
        message.extend_from_slice(body);

        match self.public_key.verify(&message, &signature) {
            Ok(()) => SignatureCheck::Valid,
            Err(_) => SignatureCheck::Invalid,
        }
    }
}
