use alloy::primitives::Address;
use alloy::signers::local::PrivateKeySigner;
use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use rpc::did_pkh;
use serde::{Deserialize, Serialize};

/// Public and private parts of a secp256k1 key, base64url without padding.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Jwk {
    pub kty: String,
    pub crv: String,
    pub x: String,
    pub y: String,
    pub d: String,
}

/// Ephemeral key created for each connection. Capabilities in the signed
/// message are delegated to it.
#[derive(Clone, Debug)]
pub struct SessionKey {
    signer: PrivateKeySigner,
}

impl SessionKey {
    pub fn generate() -> Self {
        Self {
            signer: PrivateKeySigner::random(),
        }
    }

    pub fn from_signer(signer: PrivateKeySigner) -> Self {
        Self { signer }
    }

    pub fn address(&self) -> Address {
        self.signer.address()
    }

    pub fn did(&self, chain_id: u64) -> String {
        did_pkh(chain_id, &self.address())
    }

    pub fn jwk(&self) -> Jwk {
        let point = self.signer.credential().verifying_key().to_encoded_point(false);
        // Uncompressed SEC1: 0x04 || x || y
        let bytes = point.as_bytes();
        Jwk {
            kty: "EC".into(),
            crv: "secp256k1".into(),
            x: URL_SAFE_NO_PAD.encode(&bytes[1..33]),
            y: URL_SAFE_NO_PAD.encode(&bytes[33..65]),
            d: URL_SAFE_NO_PAD.encode(self.signer.to_bytes()),
        }
    }

    /// The JWK as a JSON string, the form stored in a client session.
    pub fn export(&self) -> serde_json::Result<String> {
        serde_json::to_string(&self.jwk())
    }
}

#[cfg(test)]
mod tests {
    use std::str::FromStr;

    use super::*;

    const KEY: &str = "0xac0974bec39a17e36ba4a6b4d238ff944bacb478cbed5efcae784d7bf4f2ff80";

    #[test]
    fn jwk_has_fixed_width_coordinates() {
        let key = SessionKey::generate();
        let jwk = key.jwk();
        assert_eq!(jwk.kty, "EC");
        assert_eq!(jwk.crv, "secp256k1");
        for part in [&jwk.x, &jwk.y, &jwk.d] {
            assert_eq!(part.len(), 43);
            assert!(!part.contains('='));
        }
    }

    #[test]
    fn export_is_the_jwk_json() {
        let key = SessionKey::from_signer(PrivateKeySigner::from_str(KEY).unwrap());
        let parsed: Jwk = serde_json::from_str(&key.export().unwrap()).unwrap();
        assert_eq!(parsed, key.jwk());
        assert_eq!(
            parsed.d,
            URL_SAFE_NO_PAD.encode(alloy::hex::decode(KEY).unwrap())
        );
    }

    #[test]
    fn did_uses_the_key_address() {
        let key = SessionKey::from_signer(PrivateKeySigner::from_str(KEY).unwrap());
        assert_eq!(
            key.did(1),
            "did:pkh:eip155:1:0xf39Fd6e51aad88F6F4ce6aB8827279cffFb92266"
        );
    }
}
