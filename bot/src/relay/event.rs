//! Nostr keys and signed text notes.
//!
//! Event ids and signatures follow NIP-01: the id is the SHA-256 of
//! `[0, pubkey, created_at, kind, tags, content]` serialized as compact JSON,
//! and the signature is a BIP-340 Schnorr signature over the id.

use k256::schnorr::SigningKey;
use rand::Rng;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::error::KeyError;

/// Kind number of a plain text note.
pub const KIND_TEXT_NOTE: u32 = 1;

/// Hashtags attached to every note.
pub const DEFAULT_TAGS: &[&str] = &["videostr", "privacy", "stackernews", "yewtubot"];

/// A signed event ready to hand to relays.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SignedEvent {
    pub id: String,
    pub pubkey: String,
    pub created_at: i64,
    pub kind: u32,
    pub tags: Vec<Vec<String>>,
    pub content: String,
    pub sig: String,
}

/// Compute the NIP-01 event id.
pub fn event_id(
    pubkey: &str,
    created_at: i64,
    kind: u32,
    tags: &[Vec<String>],
    content: &str,
) -> [u8; 32] {
    let canonical = serde_json::json!([0, pubkey, created_at, kind, tags, content]);
    Sha256::digest(canonical.to_string().as_bytes()).into()
}

/// The bot's signing identity.
pub struct NostrKeys {
    signing_key: SigningKey,
    public_hex: String,
}

impl NostrKeys {
    /// Parse a secret key given as `nsec1...` or 64 hex characters.
    pub fn from_secret(secret: &str) -> Result<Self, KeyError> {
        let bytes = decode_key(secret, "nsec")?;
        let signing_key = SigningKey::from_bytes(&bytes).map_err(|_| KeyError::InvalidKey)?;
        let public_hex = hex::encode(signing_key.verifying_key().to_bytes());

        Ok(Self {
            signing_key,
            public_hex,
        })
    }

    /// Check the derived public key against an `npub1...` or hex key.
    pub fn verify_public(&self, expected: &str) -> Result<(), KeyError> {
        let expected = hex::encode(decode_key(expected, "npub")?);
        if expected != self.public_hex {
            return Err(KeyError::Mismatch);
        }
        Ok(())
    }

    /// X-only public key as lowercase hex.
    pub fn public_key_hex(&self) -> &str {
        &self.public_hex
    }

    /// Build and sign a text note carrying the default hashtags plus `extra_tags`.
    pub fn sign_text_note(
        &self,
        content: &str,
        extra_tags: Vec<Vec<String>>,
        created_at: i64,
    ) -> Result<SignedEvent, KeyError> {
        let tags: Vec<Vec<String>> = DEFAULT_TAGS
            .iter()
            .map(|t| vec!["t".to_string(), t.to_string()])
            .chain(extra_tags)
            .collect();

        let id = event_id(&self.public_hex, created_at, KIND_TEXT_NOTE, &tags, content);

        let aux: [u8; 32] = rand::thread_rng().gen();
        #[allow(deprecated)]
        let signature = self
            .signing_key
            .sign_prehash_with_aux_rand(&id, &aux)
            .map_err(|_| KeyError::Signing)?;

        Ok(SignedEvent {
            id: hex::encode(id),
            pubkey: self.public_hex.clone(),
            created_at,
            kind: KIND_TEXT_NOTE,
            tags,
            content: content.to_string(),
            sig: hex::encode(signature.to_bytes()),
        })
    }
}

impl std::fmt::Debug for NostrKeys {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NostrKeys")
            .field("public_hex", &self.public_hex)
            .finish_non_exhaustive()
    }
}

/// Decode a 32-byte key from NIP-19 bech32 with the given prefix, or from hex.
fn decode_key(input: &str, prefix: &'static str) -> Result<[u8; 32], KeyError> {
    let input = input.trim();

    let bytes = if input.to_ascii_lowercase().starts_with(&format!("{}1", prefix)) {
        let (hrp, data) = bech32::decode(input).map_err(|e| KeyError::Encoding(e.to_string()))?;
        let found = hrp.to_string().to_ascii_lowercase();
        if found != prefix {
            return Err(KeyError::WrongPrefix {
                expected: prefix,
                found,
            });
        }
        data
    } else {
        hex::decode(input).map_err(|e| KeyError::Encoding(e.to_string()))?
    };

    bytes.try_into().map_err(|_| KeyError::InvalidKey)
}

#[cfg(test)]
mod tests {
    use super::*;

    const NSEC: &str = "nsec1vl029mgpspedva04g90vltkh6fvh240zqtv9k0t9af8935ke9laqsnlfe5";
    const NSEC_HEX: &str = "67dea2ed018072d675f5415ecfaed7d2597555e202d85b3d65ea4e58d2d92ffa";
    const NPUB: &str = "npub10elfcs4fr0l0r8af98jlmgdh9c8tcxjvz9qkw038js35mp4dma8qzvjptg";
    const NPUB_HEX: &str = "7e7e9c42a91bfef19fa929e5fda1b72e0ebc1a4c1141673e2794234d86addf4e";

    #[test]
    fn test_decode_bech32_and_hex_agree() {
        assert_eq!(hex::encode(decode_key(NSEC, "nsec").unwrap()), NSEC_HEX);
        assert_eq!(hex::encode(decode_key(NSEC_HEX, "nsec").unwrap()), NSEC_HEX);
        assert_eq!(hex::encode(decode_key(NPUB, "npub").unwrap()), NPUB_HEX);
    }

    #[test]
    fn test_decode_rejects_garbage() {
        assert!(matches!(decode_key("not-a-key", "nsec"), Err(KeyError::Encoding(_))));
        assert!(matches!(decode_key("abcd", "nsec"), Err(KeyError::InvalidKey)));
    }

    #[test]
    fn test_public_key_derivation() {
        let keys = NostrKeys::from_secret(NSEC).unwrap();
        assert_eq!(keys.public_key_hex(), NPUB_HEX);
        assert!(keys.verify_public(NPUB).is_ok());
        assert!(keys.verify_public(NPUB_HEX).is_ok());
    }

    #[test]
    fn test_generator_public_key() {
        let secret = format!("{:0>64}", "1");
        let keys = NostrKeys::from_secret(&secret).unwrap();
        assert_eq!(
            keys.public_key_hex(),
            "79be667ef9dcbbac55a06295ce870b07029bfcdb2dce28d959f2815b16f81798"
        );
    }

    #[test]
    fn test_public_key_mismatch() {
        let keys = NostrKeys::from_secret(NSEC).unwrap();
        let other = "79be667ef9dcbbac55a06295ce870b07029bfcdb2dce28d959f2815b16f81798";
        assert!(matches!(keys.verify_public(other), Err(KeyError::Mismatch)));
    }

    #[test]
    fn test_zero_secret_is_invalid() {
        let zero = "0".repeat(64);
        assert!(matches!(NostrKeys::from_secret(&zero), Err(KeyError::InvalidKey)));
    }

    #[test]
    fn test_signed_note_shape() {
        let keys = NostrKeys::from_secret(NSEC).unwrap();
        let event = keys
            .sign_text_note(
                "hello \"relays\"\n",
                vec![vec!["r".to_string(), "https://stacker.news/items/1".to_string()]],
                1_700_000_000,
            )
            .unwrap();

        assert_eq!(event.kind, KIND_TEXT_NOTE);
        assert_eq!(event.pubkey, NPUB_HEX);
        assert_eq!(event.sig.len(), 128);
        assert_eq!(event.tags.len(), DEFAULT_TAGS.len() + 1);
        assert_eq!(event.tags[0], vec!["t".to_string(), "videostr".to_string()]);

        let expected = event_id(
            &event.pubkey,
            event.created_at,
            event.kind,
            &event.tags,
            &event.content,
        );
        assert_eq!(event.id, hex::encode(expected));
    }

    #[test]
    fn test_event_id_serialization_is_compact() {
        let canonical = serde_json::json!([0, "ab", 1, 1, Vec::<Vec<String>>::new(), "x"]);
        assert_eq!(canonical.to_string(), r#"[0,"ab",1,1,[],"x"]"#);
    }
}
