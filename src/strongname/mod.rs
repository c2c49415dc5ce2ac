//! Strong name keys and signatures.
//!
//! A strong name key file (`.snk`, as produced by `sn -k`) is a CryptoAPI `PRIVATEKEYBLOB`
//! holding an RSA key pair. The public half goes into `Assembly.PublicKey`, prefixed by
//! the signature and hash algorithm ids; the private half signs a SHA-1 hash of the image
//! (see [`image_digest`]).
//!
//! All numbers in the blobs are little-endian, including the RSA components and the
//! signature stored in the image.

mod hash;

pub use hash::{image_digest, sign_image, verify_image};

use std::path::Path;

use log::debug;
use rsa::{traits::PublicKeyParts, BigUint, Pkcs1v15Sign, RsaPrivateKey};
use sha1::Sha1;

use crate::{
    file::{io::push_le, parser::Parser},
    Error, Result,
};

/// `bType` of a `PUBLICKEYBLOB`
const PUBLICKEYBLOB: u8 = 0x06;
/// `bType` of a `PRIVATEKEYBLOB`
const PRIVATEKEYBLOB: u8 = 0x07;
/// `CALG_RSA_SIGN`
const CALG_RSA_SIGN: u32 = 0x0000_2400;
/// `CALG_RSA_KEYX`
const CALG_RSA_KEYX: u32 = 0x0000_A400;
/// `CALG_SHA1`
const CALG_SHA1: u32 = 0x0000_8004;
/// `RSA1`
const MAGIC_PUBLIC: u32 = 0x3141_5352;
/// `RSA2`
const MAGIC_PRIVATE: u32 = 0x3241_5352;

/// An RSA key pair read from a strong name key file.
#[derive(Clone)]
pub struct StrongNameKey {
    private: RsaPrivateKey,
    public_key: Vec<u8>,
}

impl std::fmt::Debug for StrongNameKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StrongNameKey")
            .field("bits", &(self.private.size() * 8))
            .finish_non_exhaustive()
    }
}

impl StrongNameKey {
    /// Load a key pair from a `.snk` file.
    ///
    /// # Errors
    /// - [`Error::NotFound`] if the file does not exist
    /// - [`Error::InvalidKey`] if it cannot be read or holds no usable key pair
    pub fn from_file(path: &Path) -> Result<StrongNameKey> {
        if !path.exists() {
            return Err(Error::NotFound(path.to_path_buf()));
        }

        let data = std::fs::read(path).map_err(|error| {
            Error::InvalidKey(format!("{} could not be read - {error}", path.display()))
        })?;

        let key = Self::from_bytes(&data)?;
        debug!(
            "Loaded {}-bit strong name key from {}",
            key.private.size() * 8,
            path.display()
        );
        Ok(key)
    }

    /// Parse a `PRIVATEKEYBLOB`.
    ///
    /// # Errors
    /// [`Error::InvalidKey`] if the blob is truncated, holds only a public key, or does not
    /// describe a consistent RSA key.
    pub fn from_bytes(data: &[u8]) -> Result<StrongNameKey> {
        Self::parse(data).map_err(|error| match error {
            Error::InvalidKey(message) => Error::InvalidKey(message),
            other => Error::InvalidKey(other.to_string()),
        })
    }

    fn parse(data: &[u8]) -> Result<StrongNameKey> {
        let mut parser = Parser::new(data);

        let kind = parser.read_le::<u8>()?;
        let version = parser.read_le::<u8>()?;
        let _reserved = parser.read_le::<u16>()?;
        let algorithm = parser.read_le::<u32>()?;

        if kind == PUBLICKEYBLOB || algorithm == CALG_SHA1 {
            return Err(Error::InvalidKey(
                "The key file holds only a public key; delay signing is not supported".to_string(),
            ));
        }
        if kind != PRIVATEKEYBLOB || version != 2 {
            return Err(Error::InvalidKey(format!(
                "Not a private key blob (type 0x{kind:02x}, version {version})"
            )));
        }
        if algorithm != CALG_RSA_SIGN && algorithm != CALG_RSA_KEYX {
            return Err(Error::InvalidKey(format!(
                "Unsupported key algorithm 0x{algorithm:08x}"
            )));
        }

        let magic = parser.read_le::<u32>()?;
        if magic != MAGIC_PRIVATE {
            return Err(Error::InvalidKey(format!(
                "Bad RSA private key magic 0x{magic:08x}"
            )));
        }

        let bits = parser.read_le::<u32>()? as usize;
        if bits == 0 || bits % 16 != 0 {
            return Err(Error::InvalidKey(format!("Unsupported key length {bits}")));
        }
        let exponent = parser.read_le::<u32>()?;

        let full = bits / 8;
        let half = bits / 16;
        let mut component = |len: usize| -> Result<BigUint> {
            let bytes = parser.read_bytes(len)?;
            Ok(BigUint::from_bytes_le(bytes))
        };

        let modulus = component(full)?;
        let p = component(half)?;
        let q = component(half)?;
        // dp, dq and the CRT coefficient are recomputed from the primes
        component(half)?;
        component(half)?;
        component(half)?;
        let d = component(full)?;

        let private = RsaPrivateKey::from_components(
            modulus,
            BigUint::from(exponent),
            d,
            vec![p, q],
        )
        .map_err(|error| Error::InvalidKey(format!("Inconsistent RSA key - {error}")))?;
        private
            .validate()
            .map_err(|error| Error::InvalidKey(format!("Inconsistent RSA key - {error}")))?;

        let public_key = public_key_blob(&private);
        Ok(StrongNameKey {
            private,
            public_key,
        })
    }

    /// The public key as stored in `Assembly.PublicKey`.
    #[must_use]
    pub fn public_key(&self) -> &[u8] {
        &self.public_key
    }

    /// Size of a signature made with this key, in bytes.
    #[must_use]
    pub fn signature_size(&self) -> usize {
        self.private.size()
    }

    /// Sign a SHA-1 digest, returning the signature in little-endian byte order.
    ///
    /// # Errors
    /// [`Error::InvalidKey`] if the key cannot produce a signature.
    pub fn sign(&self, digest: &[u8; 20]) -> Result<Vec<u8>> {
        let mut signature = self
            .private
            .sign(Pkcs1v15Sign::new::<Sha1>(), digest)
            .map_err(|error| Error::InvalidKey(format!("Signing failed - {error}")))?;
        signature.reverse();
        Ok(signature)
    }
}

/// `Assembly.PublicKey` of a key: algorithm ids, blob size, then a `PUBLICKEYBLOB`.
fn public_key_blob(key: &RsaPrivateKey) -> Vec<u8> {
    let mut modulus = key.n().to_bytes_le();
    modulus.resize(key.size(), 0);
    let exponent = key
        .e()
        .to_bytes_le()
        .iter()
        .take(4)
        .rev()
        .fold(0u32, |value, byte| (value << 8) | u32::from(*byte));

    let mut blob = Vec::with_capacity(32 + modulus.len());
    push_le(&mut blob, CALG_RSA_SIGN);
    push_le(&mut blob, CALG_SHA1);
    push_le(&mut blob, 20 + modulus.len() as u32);

    blob.push(PUBLICKEYBLOB);
    blob.push(2);
    push_le(&mut blob, 0u16);
    push_le(&mut blob, CALG_RSA_SIGN);
    push_le(&mut blob, MAGIC_PUBLIC);
    push_le(&mut blob, (modulus.len() * 8) as u32);
    push_le(&mut blob, exponent);
    blob.extend_from_slice(&modulus);

    blob
}

/// The RSA modulus and exponent of an `Assembly.PublicKey` blob.
pub(crate) fn parse_public_key(blob: &[u8]) -> Result<rsa::RsaPublicKey> {
    let mut parser = Parser::new(blob);
    let _signature_algorithm = parser.read_le::<u32>()?;
    let _hash_algorithm = parser.read_le::<u32>()?;
    let _size = parser.read_le::<u32>()?;

    let kind = parser.read_le::<u8>()?;
    let _version = parser.read_le::<u8>()?;
    let _reserved = parser.read_le::<u16>()?;
    let _algorithm = parser.read_le::<u32>()?;
    let magic = parser.read_le::<u32>()?;
    if kind != PUBLICKEYBLOB || magic != MAGIC_PUBLIC {
        return Err(Error::InvalidKey("Not a public key blob".to_string()));
    }

    let bits = parser.read_le::<u32>()? as usize;
    let exponent = parser.read_le::<u32>()?;
    let modulus = BigUint::from_bytes_le(parser.read_bytes(bits / 8)?);

    rsa::RsaPublicKey::new(modulus, BigUint::from(exponent))
        .map_err(|error| Error::InvalidKey(format!("Unusable public key - {error}")))
}
