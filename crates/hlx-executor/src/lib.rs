//! Order signing pipeline for hlx.
//!
//! Turns validated [`hlx_core::OrderRequest`]s into signed, exchange-ready
//! payloads and submits them.
//!
//! # Key Components
//!
//! - [`encode`]: Canonical MessagePack encoding of an [`OrderAction`]
//! - [`build_hash`]: Keccak-256 action hash over action, nonce, vault and expiry
//! - [`validate`]: Field-level payload validator that reports every violation
//! - [`Signer`]: EIP-712 phantom-agent signing with a recovery self-check
//! - [`NonceManager`] / [`NonceRegistry`]: Strictly increasing nonces per signer
//! - [`OrderSender`]: Transport seam ([`MockSender`], [`HttpSender`])
//! - [`OrderPipeline`]: build -> sign -> validate -> send

pub mod error;
pub mod hash;
pub mod http_sender;
pub mod nonce;
pub mod pipeline;
pub mod sender;
pub mod signer;
pub mod validator;
pub mod wire;

// Error types
pub use error::{EncodingError, ExecutorError, ExecutorResult};

// Encoding and hashing
pub use hash::{build_hash, SigningInput};
pub use wire::{
    encode, BuilderInfo, LimitOrderType, OrderAction, OrderTypeWire, OrderWire, TriggerOrderType,
};

// Validation
pub use validator::{validate, ValidationReport, Violation};

// Signing
pub use signer::{
    exchange_domain, DigestSigner, KeyError, KeyManager, KeySource, PhantomAgent, Signer,
    SignerError,
};

// Nonce management
pub use nonce::{Clock, NonceManager, NonceRegistry, SystemClock};

// Transport
pub use http_sender::{HttpSender, MAINNET_API_URL, TESTNET_API_URL};
pub use sender::{
    ActionSignature, BoxFuture, DynOrderSender, MockSender, OrderSender, OrderStatus, SendResult,
    SignedAction,
};

// Pipeline
pub use pipeline::{OrderPipeline, SubmitReport};
