//! RSA payload signatures.
//!
//! A second, unrelated signing scheme: the JSON-serialized payload is
//! signed with RSASSA-PKCS1-v1_5 over SHA-256 and the signature is
//! base64-encoded without line breaks. It is never interchangeable with the
//! MD5 parameter signature in [`super::signature`].

use std::path::Path;

use base64::{engine::general_purpose::STANDARD as BASE64, Engine};
use rsa::pkcs1::DecodeRsaPrivateKey;
use rsa::pkcs1v15::SigningKey;
use rsa::pkcs8::DecodePrivateKey;
use rsa::signature::{SignatureEncoding, Signer};
use rsa::RsaPrivateKey;
use serde::Serialize;
use sha2::Sha256;

use crate::error::WechatError;

/// Signs payloads with a merchant RSA private key.
#[derive(Clone)]
pub struct RsaSigner {
    key: SigningKey<Sha256>,
}

impl std::fmt::Debug for RsaSigner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RsaSigner").finish_non_exhaustive()
    }
}

impl RsaSigner {
    pub fn new(private_key: RsaPrivateKey) -> Self {
        Self {
            key: SigningKey::<Sha256>::new(private_key),
        }
    }

    /// Parses a PEM private key, PKCS#8 first and PKCS#1 second.
    pub fn from_pem(pem: &str) -> Result<Self, WechatError> {
        let key = RsaPrivateKey::from_pkcs8_pem(pem)
            .or_else(|_| RsaPrivateKey::from_pkcs1_pem(pem))
            .map_err(|e| WechatError::Config(format!("invalid RSA private key: {e}")))?;
        Ok(Self::new(key))
    }

    /// Reads and parses a PEM private key file.
    pub fn from_pem_file(path: impl AsRef<Path>) -> Result<Self, WechatError> {
        let path = path.as_ref();
        let pem = std::fs::read_to_string(path).map_err(|e| {
            WechatError::Config(format!(
                "failed to read private key {}: {e}",
                path.display()
            ))
        })?;
        Self::from_pem(&pem)
    }

    /// Signs raw bytes, returning standard base64.
    pub fn sign(&self, message: &[u8]) -> Result<String, WechatError> {
        let signature = self
            .key
            .try_sign(message)
            .map_err(|e| WechatError::Signature(e.to_string()))?;
        Ok(BASE64.encode(signature.to_bytes()))
    }

    /// Serializes `payload` to JSON and signs the result.
    pub fn sign_json<T: Serialize + ?Sized>(&self, payload: &T) -> Result<String, WechatError> {
        let body = serde_json::to_vec(payload)?;
        self.sign(&body)
    }
}
