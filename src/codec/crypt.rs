use openssl::symm::{Cipher, Crypter, Mode};

use super::CodecError;

/// Encryption algorithms this build actually supports.
///
/// `twofish` is accepted by the `{encryption}` job-config enum but rejected
/// at negotiation — no crate in this dependency stack backs it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EncryptionAlgorithm {
    None,
    Aes256Gcm,
}

impl EncryptionAlgorithm {
    pub fn id(self) -> u8 {
        match self {
            EncryptionAlgorithm::None => 0,
            EncryptionAlgorithm::Aes256Gcm => 1,
        }
    }

    pub fn from_id(id: u8) -> Result<Self, CodecError> {
        match id {
            0 => Ok(EncryptionAlgorithm::None),
            1 => Ok(EncryptionAlgorithm::Aes256Gcm),
            other => Err(CodecError::UnsupportedAlgorithm(format!(
                "encryption id {}",
                other
            ))),
        }
    }

    pub fn negotiate(name: &str) -> Result<Self, CodecError> {
        match name {
            "none" => Ok(EncryptionAlgorithm::None),
            "aes" | "aes256gcm" | "aes-256-gcm" => Ok(EncryptionAlgorithm::Aes256Gcm),
            "twofish" => Err(CodecError::UnsupportedAlgorithm(name.to_string())),
            other => Err(CodecError::UnsupportedAlgorithm(other.to_string())),
        }
    }
}

pub const SALT_LEN: usize = 16;
const KEY_LEN: usize = 32;
pub const IV_LEN: usize = 12;
pub const TAG_LEN: usize = 16;

/// Derived per-archive key material. Constructed once per archive from the
/// job's password plus a freshly generated salt (stored in the archive's
/// `SALT` chunk), mirroring the teacher's `CryptConfig` role in `DataBlob`.
pub struct CryptConfig {
    key: [u8; KEY_LEN],
}

impl CryptConfig {
    /// Derive key material from password bytes and a salt via PBKDF2-HMAC-SHA256.
    pub fn derive(password: &[u8], salt: &[u8; SALT_LEN]) -> Result<Self, CodecError> {
        let mut key = [0u8; KEY_LEN];
        openssl::pkcs5::pbkdf2_hmac(
            password,
            salt,
            100_000,
            openssl::hash::MessageDigest::sha256(),
            &mut key,
        )
        .map_err(|e| CodecError::CompressFailure(format!("key derivation failed: {}", e)))?;
        Ok(Self { key })
    }

    pub fn generate_salt() -> [u8; SALT_LEN] {
        let mut salt = [0u8; SALT_LEN];
        openssl::rand::rand_bytes(&mut salt).expect("openssl RNG failure");
        salt
    }

    fn generate_iv() -> [u8; IV_LEN] {
        let mut iv = [0u8; IV_LEN];
        openssl::rand::rand_bytes(&mut iv).expect("openssl RNG failure");
        iv
    }

    /// Encrypt `plaintext`, returning `(iv, tag, ciphertext)`.
    pub fn encrypt(&self, plaintext: &[u8]) -> Result<([u8; IV_LEN], [u8; TAG_LEN], Vec<u8>), CodecError> {
        let iv = Self::generate_iv();
        let cipher = Cipher::aes_256_gcm();
        let mut crypter = Crypter::new(cipher, Mode::Encrypt, &self.key, Some(&iv))
            .map_err(|e| CodecError::CompressFailure(e.to_string()))?;

        let mut ciphertext = vec![0u8; plaintext.len() + cipher.block_size()];
        let mut count = crypter
            .update(plaintext, &mut ciphertext)
            .map_err(|e| CodecError::CompressFailure(e.to_string()))?;
        count += crypter
            .finalize(&mut ciphertext[count..])
            .map_err(|e| CodecError::CompressFailure(e.to_string()))?;
        ciphertext.truncate(count);

        let mut tag = [0u8; TAG_LEN];
        crypter
            .get_tag(&mut tag)
            .map_err(|e| CodecError::CompressFailure(e.to_string()))?;

        Ok((iv, tag, ciphertext))
    }

    /// Decrypt and authenticate. A failed authentication tag check surfaces
    /// distinctly as [`CodecError::DecryptAuthFailure`], never as silently
    /// corrupted plaintext.
    pub fn decrypt(
        &self,
        ciphertext: &[u8],
        iv: &[u8; IV_LEN],
        tag: &[u8; TAG_LEN],
    ) -> Result<Vec<u8>, CodecError> {
        let cipher = Cipher::aes_256_gcm();
        let mut crypter = Crypter::new(cipher, Mode::Decrypt, &self.key, Some(iv))
            .map_err(|_| CodecError::DecryptAuthFailure)?;
        crypter
            .set_tag(tag)
            .map_err(|_| CodecError::DecryptAuthFailure)?;

        let mut plaintext = vec![0u8; ciphertext.len() + cipher.block_size()];
        let mut count = crypter
            .update(ciphertext, &mut plaintext)
            .map_err(|_| CodecError::DecryptAuthFailure)?;
        count += crypter
            .finalize(&mut plaintext[count..])
            .map_err(|_| CodecError::DecryptAuthFailure)?;
        plaintext.truncate(count);

        Ok(plaintext)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn encrypt_decrypt_round_trips() {
        let salt = CryptConfig::generate_salt();
        let config = CryptConfig::derive(b"correct horse battery staple", &salt).unwrap();
        let plaintext = b"the archive engine never sleeps";
        let (iv, tag, ciphertext) = config.encrypt(plaintext).unwrap();
        let decrypted = config.decrypt(&ciphertext, &iv, &tag).unwrap();
        assert_eq!(decrypted, plaintext);
    }

    #[test]
    fn bit_flip_in_ciphertext_fails_auth_not_silently() {
        let salt = CryptConfig::generate_salt();
        let config = CryptConfig::derive(b"pw", &salt).unwrap();
        let (iv, tag, mut ciphertext) = config.encrypt(b"sensitive payload").unwrap();
        ciphertext[0] ^= 0x01;
        let result = config.decrypt(&ciphertext, &iv, &tag);
        assert!(matches!(result, Err(CodecError::DecryptAuthFailure)));
    }
}
