use std::{fmt, str::FromStr};

use crate::error::{TsumugiError, TsumugiResult};

/// Content key handed to the decrypt collaborator.
///
/// Deriving it is somebody else's job; the downloader only checks it is valid hex.
#[derive(Clone, PartialEq, Eq)]
pub struct DecryptionKey(Vec<u8>);

impl DecryptionKey {
    pub fn new(key: Vec<u8>) -> Self {
        Self(key)
    }

    pub fn from_hex(key: &str) -> TsumugiResult<Self> {
        let key = hex::decode(key.trim())?;
        if key.is_empty() {
            return Err(TsumugiError::HexDecodeError(hex::FromHexError::InvalidStringLength));
        }
        Ok(Self(key))
    }

    pub fn to_hex(&self) -> String {
        hex::encode(&self.0)
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }
}

impl FromStr for DecryptionKey {
    type Err = TsumugiError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_hex(s)
    }
}

// keep key material out of logs
impl fmt::Debug for DecryptionKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "DecryptionKey({} bytes)", self.0.len())
    }
}
