//! # Frame Ciphers
//!
//! Symmetric ciphers applied to frame payloads once a session is encrypting.
//! The cipher is a strategy: the application installs an encoder/decoder pair
//! after its key exchange, and the session engine only decides *when* to apply
//! them.
//!
//! - [`Rc4Cipher`]: stateful stream cipher, length-preserving. Kept for wire
//!   compatibility with existing clients; RC4 is broken and should not be used
//!   for new deployments.
//! - [`XChaChaCipher`]: XChaCha20-Poly1305 AEAD. Each frame carries a random
//!   24-byte nonce and a 16-byte tag.

use chacha20poly1305::aead::{Aead, KeyInit};
use chacha20poly1305::{Key, XChaCha20Poly1305, XNonce};
use rand::Rng;
use rc4::consts::{
    U1, U10, U11, U12, U13, U14, U15, U16, U17, U18, U19, U2, U20, U21, U22, U23, U24, U25,
    U26, U27, U28, U29, U3, U30, U31, U32, U4, U5, U6, U7, U8, U9,
};
use rc4::{KeyInit as _, Rc4, StreamCipher};
use zeroize::Zeroize;

use crate::error::constants::ERR_RC4_KEY_LEN;
use crate::error::{GatewayError, Result};

/// Encrypts or decrypts one direction of a session's traffic.
pub trait FrameCipher: Send {
    fn encrypt(&mut self, frame: &mut Vec<u8>) -> Result<()>;

    fn decrypt(&mut self, frame: &mut Vec<u8>) -> Result<()>;

    /// Bytes added to every encrypted frame
    fn overhead(&self) -> usize {
        0
    }
}

/// Generate a random 32-byte key
pub fn generate_key() -> [u8; 32] {
    let mut key = [0u8; 32];
    rand::rng().fill(&mut key);
    key
}

/// RC4 keystream. Encryption and decryption are the same XOR, so each
/// direction needs its own instance keyed identically on both peers.
pub struct Rc4Cipher {
    keystream: Box<dyn FnMut(&mut [u8]) + Send>,
}

/// Keystream closure for each supported key length
macro_rules! rc4_keystream {
    ($key:expr, $($len:literal => $size:ident),+ $(,)?) => {
        match $key.len() {
            $($len => {
                let mut rc4 = Rc4::<$size>::new_from_slice($key)
                    .map_err(|_| GatewayError::CipherError(ERR_RC4_KEY_LEN))?;
                Box::new(move |buf: &mut [u8]| rc4.apply_keystream(buf))
                    as Box<dyn FnMut(&mut [u8]) + Send>
            })+
            _ => return Err(GatewayError::CipherError(ERR_RC4_KEY_LEN)),
        }
    };
}

impl Rc4Cipher {
    /// Key length must be 1..=32 bytes
    pub fn new(key: &[u8]) -> Result<Self> {
        let keystream = rc4_keystream!(key,
            1 => U1, 2 => U2, 3 => U3, 4 => U4, 5 => U5, 6 => U6, 7 => U7, 8 => U8,
            9 => U9, 10 => U10, 11 => U11, 12 => U12, 13 => U13, 14 => U14, 15 => U15,
            16 => U16, 17 => U17, 18 => U18, 19 => U19, 20 => U20, 21 => U21, 22 => U22,
            23 => U23, 24 => U24, 25 => U25, 26 => U26, 27 => U27, 28 => U28, 29 => U29,
            30 => U30, 31 => U31, 32 => U32,
        );
        Ok(Self { keystream })
    }

    /// XOR the next keystream bytes into `buf`
    pub fn apply_keystream(&mut self, buf: &mut [u8]) {
        (self.keystream)(buf)
    }
}

impl FrameCipher for Rc4Cipher {
    fn encrypt(&mut self, frame: &mut Vec<u8>) -> Result<()> {
        self.apply_keystream(frame);
        Ok(())
    }

    fn decrypt(&mut self, frame: &mut Vec<u8>) -> Result<()> {
        self.apply_keystream(frame);
        Ok(())
    }
}

const XNONCE_LEN: usize = 24;
const TAG_LEN: usize = 16;

/// XChaCha20-Poly1305 frame cipher. Wire form: `nonce(24) | ciphertext | tag(16)`.
pub struct XChaChaCipher {
    cipher: XChaCha20Poly1305,
}

impl XChaChaCipher {
    pub fn new(key: &[u8; 32]) -> Self {
        Self {
            cipher: XChaCha20Poly1305::new(Key::from_slice(key)),
        }
    }
}

impl FrameCipher for XChaChaCipher {
    fn encrypt(&mut self, frame: &mut Vec<u8>) -> Result<()> {
        let mut nonce = [0u8; XNONCE_LEN];
        getrandom::fill(&mut nonce).map_err(|_| GatewayError::EncryptionFailure)?;

        let ciphertext = self
            .cipher
            .encrypt(XNonce::from_slice(&nonce), frame.as_slice())
            .map_err(|_| GatewayError::EncryptionFailure)?;

        frame.zeroize();
        frame.clear();
        frame.extend_from_slice(&nonce);
        frame.extend_from_slice(&ciphertext);
        Ok(())
    }

    fn decrypt(&mut self, frame: &mut Vec<u8>) -> Result<()> {
        if frame.len() < XNONCE_LEN + TAG_LEN {
            return Err(GatewayError::DecryptionFailure);
        }
        let (nonce, ciphertext) = frame.split_at(XNONCE_LEN);
        let plaintext = self
            .cipher
            .decrypt(XNonce::from_slice(nonce), ciphertext)
            .map_err(|_| GatewayError::DecryptionFailure)?;
        *frame = plaintext;
        Ok(())
    }

    fn overhead(&self) -> usize {
        XNONCE_LEN + TAG_LEN
    }
}
