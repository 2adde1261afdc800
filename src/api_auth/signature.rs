//! Ed25519 signature verification for challenge authentication.
//!
//! An address is the hex encoding of the caller's 32-byte Ed25519 public key,
//! so the verifying key is derived from the address itself with no lookup.
//! Signatures travel base64 encoded (standard alphabet, padded).

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use ed25519_dalek::{Signature, Verifier, VerifyingKey};

use super::challenge::Challenge;
use super::error::{AuthError, AuthErrorCode};

/// Decode a claimed address into its Ed25519 verifying key.
pub fn decode_address(address: &str) -> Result<VerifyingKey, AuthError> {
    let invalid = |reason: &str| {
        AuthError::new(
            AuthErrorCode::UnknownAddressFormat,
            format!("The address you provided is invalid: {}.", reason),
        )
    };

    if address.is_empty() {
        return Err(invalid("missing address in Authorization header"));
    }

    let bytes = hex::decode(address).map_err(|_| invalid("not hex encoded"))?;
    let pk_bytes: [u8; 32] = bytes
        .as_slice()
        .try_into()
        .map_err(|_| invalid("expected a 32-byte public key"))?;

    VerifyingKey::from_bytes(&pk_bytes).map_err(|_| invalid("not a valid Ed25519 point"))
}

/// Encode a verifying key as an address.
pub fn encode_address(key: &VerifyingKey) -> String {
    hex::encode(key.as_bytes())
}

/// Verify that `signature` over `challenge` was produced by the key behind `address`.
pub fn verify_challenge(
    challenge: &Challenge,
    address: &str,
    signature: &str,
) -> Result<(), AuthError> {
    let verifying_key = decode_address(address)?;

    let bad_signature = |reason: &str| {
        AuthError::new(
            AuthErrorCode::BadSignature,
            format!("The signature you provided is invalid: {}.", reason),
        )
    };

    if signature.is_empty() {
        return Err(bad_signature("missing signature in Authorization header"));
    }
    let sig_bytes = STANDARD
        .decode(signature)
        .map_err(|_| bad_signature("not base64 encoded"))?;

    if !verify_ed25519(verifying_key.as_bytes(), challenge.signing_bytes(), &sig_bytes) {
        return Err(AuthError::from_code(AuthErrorCode::BadSignature));
    }

    Ok(())
}

/// Verify an Ed25519 signature.
///
/// Returns `false` for any malformed key or signature instead of erroring.
pub fn verify_ed25519(public_key: &[u8], message: &[u8], signature: &[u8]) -> bool {
    let Ok(pk_bytes) = <[u8; 32]>::try_from(public_key) else {
        return false;
    };
    let Ok(sig_bytes) = <[u8; 64]>::try_from(signature) else {
        return false;
    };
    let Ok(verifying_key) = VerifyingKey::from_bytes(&pk_bytes) else {
        return false;
    };

    let sig = Signature::from_bytes(&sig_bytes);
    verifying_key.verify(message, &sig).is_ok()
}

/// Generate a keypair and the matching address (for tests).
#[cfg(test)]
pub fn generate_keypair() -> (ed25519_dalek::SigningKey, String) {
    use rand::rngs::OsRng;

    let signing_key = ed25519_dalek::SigningKey::generate(&mut OsRng);
    let address = encode_address(&signing_key.verifying_key());
    (signing_key, address)
}

/// Sign a raw challenge string and base64 encode the signature (for tests).
#[cfg(test)]
pub fn sign_challenge(signing_key: &ed25519_dalek::SigningKey, challenge: &str) -> String {
    use ed25519_dalek::Signer;

    STANDARD.encode(signing_key.sign(challenge.as_bytes()).to_bytes())
}
