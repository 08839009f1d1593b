//! Structured-data signer for L1 actions.
//!
//! Signing is two-stage:
//! 1. The action hash (see [`crate::hash`]) becomes the `connectionId` of a
//!    phantom `Agent { source, connectionId }` message.
//! 2. That message is signed per EIP-712 under the fixed "Exchange" domain.
//!
//! Every signature is verified by recovering its address from the signing
//! hash. A mismatch aborts the action; nothing is sent.

use std::path::PathBuf;
use std::sync::Arc;

use alloy::primitives::{Address, PrimitiveSignature, B256};
use alloy::signers::local::PrivateKeySigner;
use alloy::signers::SignerSync;
use alloy::sol;
use alloy::sol_types::{eip712_domain, Eip712Domain, SolStruct};
use thiserror::Error;
use tracing::error;
use zeroize::Zeroizing;

// =============================================================================
// KeySource and KeyManager
// =============================================================================

/// Source of the private key.
#[derive(Debug, Clone)]
pub enum KeySource {
    /// Hex key in an environment variable.
    EnvVar { var_name: String },
    /// Hex key in a file (recommend 0600 permissions).
    File { path: PathBuf },
}

/// Holds the trading key.
///
/// Raw key bytes only ever live in `Zeroizing` buffers and are never logged.
pub struct KeyManager {
    signer: PrivateKeySigner,
}

impl KeyManager {
    /// Load the key and, if given, check it derives `expected_address`.
    ///
    /// # Errors
    /// Missing variable, unreadable file, bad hex, invalid key, or an
    /// address mismatch.
    pub fn load(source: &KeySource, expected_address: Option<Address>) -> Result<Self, KeyError> {
        let hex_key: Zeroizing<String> = match source {
            KeySource::EnvVar { var_name } => Zeroizing::new(
                std::env::var(var_name).map_err(|_| KeyError::EnvVarNotFound(var_name.clone()))?,
            ),
            KeySource::File { path } => Zeroizing::new(std::fs::read_to_string(path)?),
        };
        Self::from_hex(&hex_key, expected_address)
    }

    /// Parse a hex key (`0x` optional, surrounding whitespace ignored).
    pub fn from_hex(hex_key: &str, expected_address: Option<Address>) -> Result<Self, KeyError> {
        let trimmed = hex_key.trim();
        let trimmed = trimmed.strip_prefix("0x").unwrap_or(trimmed);
        let secret: Zeroizing<Vec<u8>> = Zeroizing::new(hex::decode(trimmed)?);
        Self::from_bytes(&secret, expected_address)
    }

    pub fn from_bytes(secret: &[u8], expected_address: Option<Address>) -> Result<Self, KeyError> {
        let signer = PrivateKeySigner::from_slice(secret)
            .map_err(|e| KeyError::InvalidKey(e.to_string()))?;

        if let Some(expected) = expected_address {
            let actual = signer.address();
            if actual != expected {
                return Err(KeyError::AddressMismatch { expected, actual });
            }
        }

        Ok(Self { signer })
    }

    pub fn address(&self) -> Address {
        self.signer.address()
    }

    /// Hand the key to a [`Signer`].
    pub fn into_digest_signer(self) -> Arc<dyn DigestSigner> {
        Arc::new(self.signer)
    }
}

/// Key management errors.
#[derive(Debug, Error)]
pub enum KeyError {
    #[error("Environment variable not found: {0}")]
    EnvVarNotFound(String),

    #[error("Failed to decode hex: {0}")]
    HexDecode(#[from] hex::FromHexError),

    #[error("Invalid private key: {0}")]
    InvalidKey(String),

    #[error("Address mismatch: expected {expected}, got {actual}")]
    AddressMismatch { expected: Address, actual: Address },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

// =============================================================================
// DigestSigner seam
// =============================================================================

/// Signs a 32-byte prehash. Implemented for alloy's local key signer.
pub trait DigestSigner: Send + Sync {
    fn address(&self) -> Address;

    fn sign_digest(&self, digest: &B256) -> Result<PrimitiveSignature, SignerError>;
}

impl DigestSigner for PrivateKeySigner {
    fn address(&self) -> Address {
        alloy::signers::Signer::address(self)
    }

    fn sign_digest(&self, digest: &B256) -> Result<PrimitiveSignature, SignerError> {
        self.sign_hash_sync(digest)
            .map_err(|e| SignerError::SigningFailed(e.to_string()))
    }
}

// =============================================================================
// PhantomAgent and EIP-712
// =============================================================================

pub const EIP712_DOMAIN_NAME: &str = "Exchange";
pub const EIP712_DOMAIN_VERSION: &str = "1";
pub const EIP712_CHAIN_ID: u64 = 1337;
pub const EIP712_VERIFYING_CONTRACT: Address = Address::ZERO;

sol! {
    #[derive(Debug)]
    struct Agent {
        string source;
        bytes32 connectionId;
    }
}

/// The fixed "Exchange" signing domain.
pub fn exchange_domain() -> Eip712Domain {
    eip712_domain! {
        name: EIP712_DOMAIN_NAME,
        version: EIP712_DOMAIN_VERSION,
        chain_id: EIP712_CHAIN_ID,
        verifying_contract: EIP712_VERIFYING_CONTRACT,
    }
}

/// EIP-712 wrapper around an action hash.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PhantomAgent {
    /// "a" on mainnet, "b" on testnet.
    pub source: String,
    pub connection_id: B256,
}

impl PhantomAgent {
    pub fn new(action_hash: B256, is_mainnet: bool) -> Self {
        Self {
            source: if is_mainnet { "a" } else { "b" }.to_string(),
            connection_id: action_hash,
        }
    }

    /// keccak256(0x1901 || domain_separator || struct_hash)
    pub fn signing_hash(&self) -> B256 {
        let agent = Agent {
            source: self.source.clone(),
            connectionId: self.connection_id,
        };
        agent.eip712_signing_hash(&exchange_domain())
    }
}

// =============================================================================
// Signer
// =============================================================================

#[derive(Debug, Error)]
pub enum SignerError {
    #[error("Signing failed: {0}")]
    SigningFailed(String),

    #[error("Signer address recovery failed: {0}")]
    Recovery(String),

    #[error("Recovered signer {recovered} does not match key address {expected}")]
    IntegrityMismatch { expected: Address, recovered: Address },
}

/// Phantom-agent signer with mandatory recovery self-check.
#[derive(Clone)]
pub struct Signer {
    key: Arc<dyn DigestSigner>,
    is_mainnet: bool,
}

impl Signer {
    pub fn new(key: Arc<dyn DigestSigner>, is_mainnet: bool) -> Self {
        Self { key, is_mainnet }
    }

    /// Sign `action_hash` and verify the signature recovers to our address.
    ///
    /// # Errors
    /// `SignerError::IntegrityMismatch` if the recovered address differs.
    pub fn sign_hash(&self, action_hash: B256) -> Result<PrimitiveSignature, SignerError> {
        let digest = PhantomAgent::new(action_hash, self.is_mainnet).signing_hash();

        // NOTE: Do not log signature values
        let signature = self.key.sign_digest(&digest)?;

        let recovered = signature
            .recover_address_from_prehash(&digest)
            .map_err(|e| SignerError::Recovery(e.to_string()))?;
        let expected = self.key.address();
        if recovered != expected {
            error!(%expected, %recovered, "signature does not recover to signing key");
            return Err(SignerError::IntegrityMismatch {
                expected,
                recovered,
            });
        }

        Ok(signature)
    }

    pub fn address(&self) -> Address {
        self.key.address()
    }

    pub fn is_mainnet(&self) -> bool {
        self.is_mainnet
    }
}

impl std::fmt::Debug for Signer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Signer")
            .field("address", &self.address())
            .field("is_mainnet", &self.is_mainnet)
            .finish()
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use alloy::primitives::keccak256;
    use proptest::prelude::*;

    // Well-known test keys (DO NOT use in production)
    const TEST_PRIVATE_KEY: &str =
        "0xac0974bec39a17e36ba4a6b4d238ff944bacb478cbed5efcae784d7bf4f2ff80";
    const SDK_TEST_KEY: &str = "e908f86dbb4d55ac876378565aafeabc187f6690f046459397b17d9b9a19688e";

    fn b256(hex_str: &str) -> B256 {
        B256::from_slice(&hex::decode(hex_str).unwrap())
    }

    fn signer_for(key: &str, is_mainnet: bool) -> Signer {
        Signer::new(KeyManager::from_hex(key, None).unwrap().into_digest_signer(), is_mainnet)
    }

    /// Signs with a different key than the one it reports.
    struct SwappedKeySigner {
        claimed: PrivateKeySigner,
        actual: PrivateKeySigner,
    }

    impl DigestSigner for SwappedKeySigner {
        fn address(&self) -> Address {
            DigestSigner::address(&self.claimed)
        }

        fn sign_digest(&self, digest: &B256) -> Result<PrimitiveSignature, SignerError> {
            self.actual.sign_digest(digest)
        }
    }

    #[test]
    fn test_key_manager_parses_prefix_and_whitespace() {
        let a = KeyManager::from_hex(&format!("  {TEST_PRIVATE_KEY}\n"), None).unwrap();
        let b = KeyManager::from_hex(TEST_PRIVATE_KEY.trim_start_matches("0x"), None).unwrap();
        assert_eq!(a.address(), b.address());
    }

    #[test]
    fn test_key_manager_address_mismatch() {
        let result = KeyManager::from_hex(TEST_PRIVATE_KEY, Some(Address::ZERO));
        assert!(matches!(result, Err(KeyError::AddressMismatch { .. })));
    }

    #[test]
    fn test_key_manager_rejects_bad_hex() {
        assert!(matches!(
            KeyManager::from_hex("0xnothex", None),
            Err(KeyError::HexDecode(_))
        ));
        assert!(matches!(
            KeyManager::from_hex("0x00", None),
            Err(KeyError::InvalidKey(_))
        ));
    }

    #[test]
    fn test_key_manager_env_and_file() {
        let var = "HLX_SIGNER_TEST_KEY_ENV";
        std::env::set_var(var, TEST_PRIVATE_KEY);
        let from_env = KeyManager::load(&KeySource::EnvVar { var_name: var.into() }, None).unwrap();
        std::env::remove_var(var);

        let path = std::env::temp_dir().join(format!("hlx-key-{}.txt", std::process::id()));
        std::fs::write(&path, format!("{TEST_PRIVATE_KEY}\n")).unwrap();
        let from_file = KeyManager::load(&KeySource::File { path: path.clone() }, None).unwrap();
        std::fs::remove_file(&path).unwrap();

        assert_eq!(from_env.address(), from_file.address());
        assert!(matches!(
            KeyManager::load(&KeySource::EnvVar { var_name: "HLX_DEFINITELY_UNSET".into() }, None),
            Err(KeyError::EnvVarNotFound(_))
        ));
    }

    #[test]
    fn test_phantom_agent_source() {
        let hash = B256::repeat_byte(0xab);
        assert_eq!(PhantomAgent::new(hash, true).source, "a");
        assert_eq!(PhantomAgent::new(hash, false).source, "b");
    }

    #[test]
    fn test_eip712_domain_separator_matches_manual_encoding() {
        let type_hash = keccak256(
            b"EIP712Domain(string name,string version,uint256 chainId,address verifyingContract)",
        );
        let mut data = Vec::new();
        data.extend_from_slice(type_hash.as_slice());
        data.extend_from_slice(keccak256(EIP712_DOMAIN_NAME.as_bytes()).as_slice());
        data.extend_from_slice(keccak256(EIP712_DOMAIN_VERSION.as_bytes()).as_slice());
        let mut chain_id = [0u8; 32];
        chain_id[24..].copy_from_slice(&EIP712_CHAIN_ID.to_be_bytes());
        data.extend_from_slice(&chain_id);
        data.extend_from_slice(&[0u8; 32]);

        assert_eq!(exchange_domain().hash_struct(), keccak256(&data));
    }

    #[test]
    fn test_agent_struct_hash_matches_manual_encoding() {
        let action_hash = b256("f01fa6eaca0b8cbd2afe65f8852a2e00d35eae3d19560ece9b8a28614646e849");
        let agent = Agent {
            source: "b".to_string(),
            connectionId: action_hash,
        };

        let mut data = Vec::new();
        data.extend_from_slice(keccak256(b"Agent(string source,bytes32 connectionId)").as_slice());
        data.extend_from_slice(keccak256(b"b").as_slice());
        data.extend_from_slice(action_hash.as_slice());

        assert_eq!(agent.eip712_hash_struct(), keccak256(&data));
    }

    #[test]
    fn test_testnet_signature_known_answer() {
        let signer = signer_for(TEST_PRIVATE_KEY, false);
        let hash = b256("f01fa6eaca0b8cbd2afe65f8852a2e00d35eae3d19560ece9b8a28614646e849");
        let sig = signer.sign_hash(hash).unwrap();

        assert_eq!(
            hex::encode(sig.r().to_be_bytes::<32>()),
            "a9e728f2faea4febc0b6eb9c3dbbac04b375eb3869f051030d205318425faebc"
        );
        assert_eq!(
            hex::encode(sig.s().to_be_bytes::<32>()),
            "7b21be7030bb979352b71494708b99d789266f0d0e1242a21e74905b683e4698"
        );
        assert!(!sig.v());
    }

    #[test]
    fn test_mainnet_signature_known_answer() {
        // Order {a:1, b:true, p:"2000.0", s:"3.5", r:false, Ioc}, nonce 1583838
        let hash = b256("5983a9453b8d32668daefa9310e1a81bc1f4d7da50a9ad8869a4011d12068ea0");

        let sig = signer_for(SDK_TEST_KEY, true).sign_hash(hash).unwrap();
        assert_eq!(
            hex::encode(sig.r().to_be_bytes::<32>()),
            "77957e58e70f43b6b68581f2dc42011fc384538a2e5b7bf42d5b936f19fbb673"
        );
        assert_eq!(
            hex::encode(sig.s().to_be_bytes::<32>()),
            "60721a8598727230f67080efee48c812a6a4442013fd3b0eed509171bef9f23f"
        );
        assert!(sig.v());

        let testnet = signer_for(SDK_TEST_KEY, false).sign_hash(hash).unwrap();
        assert_eq!(
            hex::encode(testnet.as_bytes()),
            "cd0925372ff1ed499e54883e9a6205ecfadec748f80ec463fe2f84f12096487763779619\
             65cb7b12414186b1ea291e95fd512722427efcbcfb3b0b2bcd4d79d01c"
        );
    }

    #[test]
    fn test_integrity_mismatch_is_fatal() {
        let claimed = PrivateKeySigner::from_slice(&[0x11; 32]).unwrap();
        let actual = PrivateKeySigner::from_slice(&[0x22; 32]).unwrap();
        let expected_addr = DigestSigner::address(&claimed);
        let actual_addr = DigestSigner::address(&actual);

        let signer = Signer::new(Arc::new(SwappedKeySigner { claimed, actual }), true);
        match signer.sign_hash(B256::repeat_byte(0x01)) {
            Err(SignerError::IntegrityMismatch {
                expected,
                recovered,
            }) => {
                assert_eq!(expected, expected_addr);
                assert_eq!(recovered, actual_addr);
            }
            other => panic!("expected integrity mismatch, got {other:?}"),
        }
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(32))]

        #[test]
        fn prop_signature_recovers_signer(key in any::<[u8; 32]>(), hash in any::<[u8; 32]>(), mainnet in any::<bool>()) {
            let Ok(local) = PrivateKeySigner::from_slice(&key) else {
                return Err(TestCaseError::reject("not a valid secp256k1 scalar"));
            };
            let address = DigestSigner::address(&local);
            let signer = Signer::new(Arc::new(local), mainnet);
            let action_hash = B256::from(hash);

            let sig = signer.sign_hash(action_hash).unwrap();
            let digest = PhantomAgent::new(action_hash, mainnet).signing_hash();
            prop_assert_eq!(sig.recover_address_from_prehash(&digest).unwrap(), address);
        }
    }
}
