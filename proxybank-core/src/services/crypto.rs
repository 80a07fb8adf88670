//! Crypto service - sealing and opening continuation tokens
//!
//! Wire format: `base64( IV[16] || HMAC-SHA256[32] || AES-256-CBC ciphertext )`.
//! The key is SHA-256 of the server secret; the HMAC covers
//! `ciphertext || IV` and is checked in constant time before any decryption.

use std::sync::Arc;

use aes::cipher::block_padding::Pkcs7;
use aes::cipher::generic_array::GenericArray;
use aes::cipher::{BlockDecryptMut, BlockEncryptMut, KeyIvInit};
use base64::Engine;
use hmac::{Hmac, Mac};
use rand::{Rng, RngCore};
use sha2::{Digest, Sha256};

use crate::domain::result::{Error, Result};
use crate::domain::Fields;
use crate::ports::SecretStore;

type Aes256CbcEnc = cbc::Encryptor<aes::Aes256>;
type Aes256CbcDec = cbc::Decryptor<aes::Aes256>;
type HmacSha256 = Hmac<Sha256>;

const IV_LEN: usize = 16;
const MAC_LEN: usize = 32;
const BLOCK_LEN: usize = 16;

/// Length of a generated server secret
pub const SECRET_LEN: usize = 128;

/// Alphabet for generated secrets. Backslash, dollar and quotes are left
/// out so the secret can be pasted literally into config and shell files.
const SECRET_ALPHABET: &[u8] =
    b"abcdefghijklmnopqrstuvwxyzABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789,;:!?./%*#{}[]()+=-_&@|";

/// Generate a new random server secret
pub fn generate_secret() -> String {
    let mut rng = rand::thread_rng();
    (0..SECRET_LEN)
        .map(|_| SECRET_ALPHABET[rng.gen_range(0..SECRET_ALPHABET.len())] as char)
        .collect()
}

fn derive_key(secret: &str) -> [u8; 32] {
    Sha256::digest(secret.as_bytes()).into()
}

fn compute_mac(key: &[u8; 32], ciphertext: &[u8], iv: &[u8]) -> Result<HmacSha256> {
    let mut mac = <HmacSha256 as Mac>::new_from_slice(key)
        .map_err(|e| Error::Config(format!("Invalid HMAC key: {}", e)))?;
    mac.update(ciphertext);
    mac.update(iv);
    Ok(mac)
}

/// Seal plaintext under the given secret
pub fn encrypt(plaintext: &[u8], secret: &str) -> Result<String> {
    let key = derive_key(secret);

    let mut iv = [0u8; IV_LEN];
    rand::thread_rng().fill_bytes(&mut iv);

    let ciphertext = Aes256CbcEnc::new(GenericArray::from_slice(&key), GenericArray::from_slice(&iv))
        .encrypt_padded_vec_mut::<Pkcs7>(plaintext);
    let tag = compute_mac(&key, &ciphertext, &iv)?.finalize().into_bytes();

    let mut sealed = Vec::with_capacity(IV_LEN + MAC_LEN + ciphertext.len());
    sealed.extend_from_slice(&iv);
    sealed.extend_from_slice(&tag);
    sealed.extend_from_slice(&ciphertext);

    Ok(base64::engine::general_purpose::STANDARD.encode(sealed))
}

/// Open a sealed token
///
/// Any integrity failure is reported as `Error::InvalidToken`; no partial
/// plaintext is ever returned.
pub fn decrypt(sealed: &str, secret: &str) -> Result<Vec<u8>> {
    let raw = base64::engine::general_purpose::STANDARD
        .decode(sealed.trim())
        .map_err(|_| Error::InvalidToken)?;

    if raw.len() < IV_LEN + MAC_LEN + BLOCK_LEN || (raw.len() - IV_LEN - MAC_LEN) % BLOCK_LEN != 0 {
        return Err(Error::InvalidToken);
    }

    let (iv, rest) = raw.split_at(IV_LEN);
    let (tag, ciphertext) = rest.split_at(MAC_LEN);
    let key = derive_key(secret);

    compute_mac(&key, ciphertext, iv)?
        .verify_slice(tag)
        .map_err(|_| Error::InvalidToken)?;

    Aes256CbcDec::new(GenericArray::from_slice(&key), GenericArray::from_slice(iv))
        .decrypt_padded_vec_mut::<Pkcs7>(ciphertext)
        .map_err(|_| Error::InvalidToken)
}

/// Seals field bags into tokens and opens them again
///
/// Holds no state of its own; the secret is read from the store on each call.
#[derive(Clone)]
pub struct CryptoService {
    secret_store: Arc<dyn SecretStore>,
}

impl CryptoService {
    pub fn new(secret_store: Arc<dyn SecretStore>) -> Self {
        Self { secret_store }
    }

    /// Seal raw bytes
    pub fn encrypt(&self, plaintext: &[u8]) -> Result<String> {
        encrypt(plaintext, &self.secret_store.secret()?)
    }

    /// Open raw bytes
    pub fn decrypt(&self, sealed: &str) -> Result<Vec<u8>> {
        decrypt(sealed, &self.secret_store.secret()?)
    }

    /// Seal a field bag as a JSON object
    pub fn seal(&self, fields: &Fields) -> Result<String> {
        let json = serde_json::to_vec(fields)?;
        self.encrypt(&json)
    }

    /// Open a token into its field bag
    ///
    /// A plaintext that is not a JSON object is as invalid as a forged token.
    pub fn open(&self, token: &str) -> Result<Fields> {
        let plaintext = self.decrypt(token).map_err(|e| {
            tracing::debug!(kind = e.kind(), "token rejected");
            e
        })?;

        match serde_json::from_slice::<serde_json::Value>(&plaintext) {
            Ok(serde_json::Value::Object(fields)) => Ok(fields),
            _ => {
                tracing::debug!("token plaintext is not a field bag");
                Err(Error::InvalidToken)
            }
        }
    }
}
