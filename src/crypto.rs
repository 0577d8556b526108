//! Password-based encryption of cache payloads.
//!
//! Every write derives a fresh AES-256 key with PBKDF2-HMAC-SHA256 from the
//! user's encryption password and a random 128-bit salt. The same salt is
//! used as the CBC initialization vector (see [`IvPolicy`]), so the only
//! values stored next to the ciphertext are the salt and an empty auth tag.

use aes::Aes256;
use base64::{engine::general_purpose::STANDARD, Engine as _};
use cbc::cipher::{block_padding::Pkcs7, BlockDecryptMut, BlockEncryptMut, KeyIvInit};
use rand::{rngs::OsRng, RngCore};
use serde::{de::DeserializeOwned, Serialize};
use sha2::Sha256;
use zeroize::{Zeroize, ZeroizeOnDrop};

use crate::error::{Result, SyncError};

/// Size of the derived AES-256 key in bytes.
pub const KEY_SIZE: usize = 32;
/// Size of the random salt in bytes (128 bits, one AES block).
pub const SALT_SIZE: usize = 16;
/// PBKDF2 iteration count.
pub const PBKDF2_ITERATIONS: u32 = 100_000;

type Aes256CbcEnc = cbc::Encryptor<Aes256>;
type Aes256CbcDec = cbc::Decryptor<Aes256>;

/// How the cipher IV is obtained from the key-derivation salt.
///
/// The wire format has room for a single random value, so the salt doubles
/// as the IV. Changing this is a wire-format change.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum IvPolicy {
  #[default]
  SaltAsIv,
}

impl IvPolicy {
  fn iv(self, salt: &[u8; SALT_SIZE]) -> [u8; SALT_SIZE] {
    match self {
      IvPolicy::SaltAsIv => *salt,
    }
  }
}

/// Ciphertext plus the hex-encoded salt it was produced with.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncryptedPayload {
  /// Base64 (standard alphabet) AES-256-CBC ciphertext.
  pub ciphertext: String,
  /// Lowercase hex salt, transmitted as `iv`.
  pub salt: String,
}

/// Derived key material, wiped on drop.
#[derive(Zeroize, ZeroizeOnDrop)]
struct DerivedKey([u8; KEY_SIZE]);

impl DerivedKey {
  fn derive(password: &str, salt: &[u8; SALT_SIZE]) -> Self {
    let mut key = [0u8; KEY_SIZE];
    pbkdf2::pbkdf2_hmac::<Sha256>(password.as_bytes(), salt, PBKDF2_ITERATIONS, &mut key);
    Self(key)
  }
}

fn generate_salt() -> [u8; SALT_SIZE] {
  let mut salt = [0u8; SALT_SIZE];
  OsRng.fill_bytes(&mut salt);
  salt
}

/// Encrypt any serializable value under `password`.
///
/// A new salt is drawn for every call; two encryptions of the same value
/// never share a salt or a ciphertext.
pub fn encrypt<T: Serialize + ?Sized>(plaintext: &T, password: &str) -> Result<EncryptedPayload> {
  encrypt_with_policy(plaintext, password, IvPolicy::default())
}

/// Decrypt a payload produced by [`encrypt`].
///
/// A wrong password and a corrupted blob both yield
/// [`SyncError::DecryptionFailure`].
pub fn decrypt<T: DeserializeOwned>(ciphertext: &str, salt: &str, password: &str) -> Result<T> {
  decrypt_with_policy(ciphertext, salt, password, IvPolicy::default())
}

pub fn encrypt_with_policy<T: Serialize + ?Sized>(
  plaintext: &T,
  password: &str,
  policy: IvPolicy,
) -> Result<EncryptedPayload> {
  let json = serde_json::to_vec(plaintext)
    .map_err(|e| SyncError::InvalidArgument(format!("Payload is not serializable: {}", e)))?;

  let salt = generate_salt();
  let key = DerivedKey::derive(password, &salt);
  let iv = policy.iv(&salt);

  let ciphertext =
    Aes256CbcEnc::new((&key.0).into(), (&iv).into()).encrypt_padded_vec_mut::<Pkcs7>(&json);

  Ok(EncryptedPayload {
    ciphertext: STANDARD.encode(ciphertext),
    salt: hex::encode(salt),
  })
}

pub fn decrypt_with_policy<T: DeserializeOwned>(
  ciphertext: &str,
  salt: &str,
  password: &str,
  policy: IvPolicy,
) -> Result<T> {
  let salt: [u8; SALT_SIZE] = hex::decode(salt)
    .ok()
    .and_then(|bytes| bytes.try_into().ok())
    .ok_or(SyncError::DecryptionFailure)?;
  let data = STANDARD
    .decode(ciphertext)
    .map_err(|_| SyncError::DecryptionFailure)?;

  let key = DerivedKey::derive(password, &salt);
  let iv = policy.iv(&salt);

  let plaintext = Aes256CbcDec::new((&key.0).into(), (&iv).into())
    .decrypt_padded_vec_mut::<Pkcs7>(&data)
    .map_err(|_| SyncError::DecryptionFailure)?;

  serde_json::from_slice(&plaintext).map_err(|_| SyncError::DecryptionFailure)
}
