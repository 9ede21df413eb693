//! Payload obfuscation helpers used by individual providers

use super::{Result, ScraperError, provider::PageFetcher};
use aes::cipher::{BlockEncryptMut, KeyIvInit, block_padding::Pkcs7};
use base64::{Engine as _, engine::general_purpose::STANDARD as BASE64};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sha2::{Digest, Sha256};
use std::sync::Arc;
use tracing::debug;

type Aes256CbcEnc = cbc::Encryptor<aes::Aes256>;

/// AES-256-CBC encryption keyed from a shared passphrase.
///
/// The key is SHA-256(passphrase) and the IV is the first 16 bytes of that key.
/// Only encryption is needed: the output is an identifier the provider decrypts.
#[derive(Clone)]
pub struct CbcObfuscator {
    key: [u8; 32],
}

impl CbcObfuscator {
    pub fn new(passphrase: &str) -> Self {
        Self {
            key: Sha256::digest(passphrase.as_bytes()).into(),
        }
    }

    /// PKCS7-padded ciphertext, base64 encoded
    pub fn encrypt(&self, plaintext: &str) -> Result<String> {
        let cipher = Aes256CbcEnc::new_from_slices(&self.key, &self.key[..16])
            .map_err(|e| ScraperError::Crypto(e.to_string()))?;
        let ciphertext = cipher.encrypt_padded_vec_mut::<Pkcs7>(plaintext.as_bytes());
        Ok(BASE64.encode(ciphertext))
    }

    /// Encrypted, base64 encoded and percent-encoded for use in a URL
    pub fn encrypt_for_url(&self, plaintext: &str) -> Result<String> {
        let encoded = self.encrypt(plaintext)?;
        Ok(urlencoding::encode(&encoded).into_owned())
    }
}

impl std::fmt::Debug for CbcObfuscator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CbcObfuscator").finish_non_exhaustive()
    }
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct OracleRequest<'a> {
    encrypted_data: &'a str,
    passphrase: &'a str,
}

#[derive(Deserialize)]
struct OracleResponse {
    decrypted: String,
}

/// Remote AES-GCM decryption service.
///
/// Ciphertext is never decrypted locally: it is posted together with the
/// passphrase and the returned plaintext is parsed as a second JSON document.
#[derive(Clone)]
pub struct DecryptionOracle {
    fetcher: Arc<dyn PageFetcher>,
    endpoint: String,
    passphrase: String,
}

impl DecryptionOracle {
    pub fn new(
        fetcher: Arc<dyn PageFetcher>,
        endpoint: impl Into<String>,
        passphrase: impl Into<String>,
    ) -> Self {
        Self {
            fetcher,
            endpoint: endpoint.into(),
            passphrase: passphrase.into(),
        }
    }

    pub async fn decrypt(&self, ciphertext: &str) -> Result<Value> {
        let body = serde_json::to_value(OracleRequest {
            encrypted_data: ciphertext,
            passphrase: &self.passphrase,
        })
        .map_err(|e| ScraperError::Crypto(format!("Oracle request encoding: {e}")))?;

        let response = self.fetcher.post_json(&self.endpoint, &body).await?;

        let OracleResponse { decrypted } = serde_json::from_value(response)
            .map_err(|e| ScraperError::ParsingFailed(format!("Oracle response: {e}")))?;

        debug!("Oracle returned {} bytes of plaintext", decrypted.len());

        serde_json::from_str(&decrypted)
            .map_err(|e| ScraperError::ParsingFailed(format!("Decrypted payload: {e}")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use aes::cipher::BlockDecryptMut;
    use async_trait::async_trait;
    use parking_lot::Mutex;
    use serde_json::json;

    type Aes256CbcDec = cbc::Decryptor<aes::Aes256>;

    #[test]
    fn test_cbc_ciphertext_decrypts_with_derived_iv() {
        let obfuscator = CbcObfuscator::new("shared secret");
        let encoded = obfuscator.encrypt("27205").unwrap();

        let ciphertext = BASE64.decode(encoded).unwrap();
        assert_eq!(ciphertext.len() % 16, 0);

        let key: [u8; 32] = Sha256::digest(b"shared secret").into();
        let plaintext = Aes256CbcDec::new_from_slices(&key, &key[..16])
            .unwrap()
            .decrypt_padded_vec_mut::<Pkcs7>(&ciphertext)
            .unwrap();
        assert_eq!(plaintext, b"27205");
    }

    #[test]
    fn test_encrypt_is_deterministic() {
        let obfuscator = CbcObfuscator::new("k");
        assert_eq!(
            obfuscator.encrypt("1399").unwrap(),
            obfuscator.encrypt("1399").unwrap()
        );
        assert_ne!(
            obfuscator.encrypt("1399").unwrap(),
            CbcObfuscator::new("other").encrypt("1399").unwrap()
        );
    }

    #[test]
    fn test_url_form_has_no_reserved_characters() {
        let obfuscator = CbcObfuscator::new("passphrase");
        for id in ["1", "550", "1399:1:1", "a much longer identifier to pad"] {
            let token = obfuscator.encrypt_for_url(id).unwrap();
            assert!(!token.contains('+'));
            assert!(!token.contains('/'));
            assert!(!token.contains('='));
        }
    }

    struct CannedOracle {
        response: Value,
        seen: Mutex<Option<Value>>,
    }

    #[async_trait]
    impl PageFetcher for CannedOracle {
        async fn fetch_text(&self, url: &str, _headers: &[(&str, &str)]) -> Result<String> {
            Err(ScraperError::NotFound(url.to_string()))
        }

        async fn post_json(&self, _url: &str, body: &Value) -> Result<Value> {
            *self.seen.lock() = Some(body.clone());
            Ok(self.response.clone())
        }
    }

    #[tokio::test]
    async fn test_oracle_parses_nested_json() {
        let fetcher = Arc::new(CannedOracle {
            response: json!({ "decrypted": "{\"url\":\"https://cdn.example.com/a.m3u8\"}" }),
            seen: Mutex::new(None),
        });
        let oracle = DecryptionOracle::new(fetcher.clone(), "https://oracle.test/dec", "pw");

        let value = oracle.decrypt("CIPHERTEXT").await.unwrap();
        assert_eq!(value["url"], "https://cdn.example.com/a.m3u8");

        let sent = fetcher.seen.lock().clone().unwrap();
        assert_eq!(sent, json!({ "encryptedData": "CIPHERTEXT", "passphrase": "pw" }));
    }

    #[tokio::test]
    async fn test_oracle_malformed_response_is_an_error() {
        let fetcher = Arc::new(CannedOracle {
            response: json!({ "error": "bad key" }),
            seen: Mutex::new(None),
        });
        let oracle = DecryptionOracle::new(fetcher, "https://oracle.test/dec", "pw");

        let err = oracle.decrypt("CIPHERTEXT").await.unwrap_err();
        assert!(matches!(err, ScraperError::ParsingFailed(_)));
    }
}
