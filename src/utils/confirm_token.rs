use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine as _};
use hmac::{Hmac, Mac};
use serde::{de::DeserializeOwned, Serialize};
use sha2::Sha256;
use subtle::ConstantTimeEq;

use crate::error::Result;

type HmacSha256 = Hmac<Sha256>;

/// Signs and verifies the tamper-evident tokens that carry a deferred
/// booking through the email confirmation round trip.
///
/// Token format: `base64url(payload_json) + "." + base64url(hmac_sha256)`.
/// The payload is never stored server-side; the signature is the only
/// thing standing between the emailed link and job creation.
#[derive(Clone)]
pub struct TokenSigner {
    key: Vec<u8>,
}

impl TokenSigner {
    pub fn new(secret: &str) -> Self {
        Self {
            key: secret.as_bytes().to_vec(),
        }
    }

    pub fn sign<T: Serialize>(&self, payload: &T) -> Result<String> {
        let body = serde_json::to_vec(payload)?;
        let mac = self.mac_over(&body);
        Ok(format!(
            "{}.{}",
            URL_SAFE_NO_PAD.encode(&body),
            URL_SAFE_NO_PAD.encode(mac)
        ))
    }

    /// Returns the payload only when the signature matches exactly.
    /// Every failure mode collapses to `None`; callers must not learn
    /// whether a token was malformed, forged, or truncated.
    pub fn verify<T: DeserializeOwned>(&self, token: &str) -> Option<T> {
        let (body_b64, sig_b64) = token.split_once('.')?;
        let body = URL_SAFE_NO_PAD.decode(body_b64).ok()?;
        let presented = URL_SAFE_NO_PAD.decode(sig_b64).ok()?;
        let expected = self.mac_over(&body);

        let matches: bool = expected.as_slice().ct_eq(presented.as_slice()).into();
        if !matches {
            return None;
        }
        serde_json::from_slice(&body).ok()
    }

    fn mac_over(&self, body: &[u8]) -> Vec<u8> {
        let mut mac =
            HmacSha256::new_from_slice(&self.key).expect("HMAC can take key of any size");
        mac.update(body);
        mac.finalize().into_bytes().to_vec()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;

    #[derive(Debug, PartialEq, Serialize, Deserialize)]
    struct Payload {
        email: String,
        dates: Vec<String>,
        count: i32,
    }

    fn payload() -> Payload {
        Payload {
            email: "dispatch@example.com".into(),
            dates: vec!["2025-03-10T00:00:00+00:00".into()],
            count: 2,
        }
    }

    #[test]
    fn round_trip() {
        let signer = TokenSigner::new("a-server-secret");
        let token = signer.sign(&payload()).unwrap();
        let back: Payload = signer.verify(&token).unwrap();
        assert_eq!(back, payload());
    }

    #[test]
    fn any_mutation_is_rejected() {
        let signer = TokenSigner::new("a-server-secret");
        let token = signer.sign(&payload()).unwrap();

        for i in 0..token.len() {
            if token.as_bytes()[i] == b'.' {
                continue;
            }
            let mut bytes = token.clone().into_bytes();
            bytes[i] = if bytes[i] == b'A' { b'B' } else { b'A' };
            let Ok(mutated) = String::from_utf8(bytes) else {
                continue;
            };
            if mutated == token {
                continue;
            }
            assert!(
                signer.verify::<Payload>(&mutated).is_none(),
                "mutation at byte {} verified",
                i
            );
        }
    }

    #[test]
    fn wrong_key_is_rejected() {
        let token = TokenSigner::new("secret-one").sign(&payload()).unwrap();
        assert!(TokenSigner::new("secret-two")
            .verify::<Payload>(&token)
            .is_none());
    }

    #[test]
    fn malformed_tokens_are_rejected() {
        let signer = TokenSigner::new("a-server-secret");
        assert!(signer.verify::<Payload>("").is_none());
        assert!(signer.verify::<Payload>("no-separator").is_none());
        assert!(signer.verify::<Payload>("ab.cd.ef").is_none());
        assert!(signer.verify::<Payload>("!!!.???").is_none());
    }
}
