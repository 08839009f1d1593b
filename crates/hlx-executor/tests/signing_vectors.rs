//! End-to-end signing tests against reference vectors.
//!
//! Each test walks the full chain: action -> msgpack -> action hash ->
//! phantom agent -> signature -> wire payload.

use std::sync::Arc;

use alloy::primitives::B256;
use hlx_core::Grouping;
use hlx_executor::{
    build_hash, encode, validate, ActionSignature, KeyManager, OrderAction, OrderTypeWire,
    OrderWire, PhantomAgent, SignedAction, Signer, SigningInput, TriggerOrderType,
};

const SDK_TEST_KEY: &str = "0xe908f86dbb4d55ac876378565aafeabc187f6690f046459397b17d9b9a19688e";
const SDK_NONCE: u64 = 1583838;

/// Order {a:1, b:true, p:"2000.0", s:"3.5", r:false, Ioc}
fn sdk_action() -> OrderAction {
    OrderAction::new(
        vec![OrderWire {
            asset: 1,
            is_buy: true,
            limit_px: "2000.0".to_string(),
            sz: "3.5".to_string(),
            reduce_only: false,
            order_type: OrderTypeWire::limit("Ioc"),
            cloid: None,
        }],
        Grouping::Na,
    )
}

fn sdk_signer(is_mainnet: bool) -> Signer {
    let key = KeyManager::from_hex(SDK_TEST_KEY, None).expect("valid test key");
    Signer::new(key.into_digest_signer(), is_mainnet)
}

#[test]
fn test_sdk_action_hash() {
    let hash = SigningInput::new(sdk_action(), SDK_NONCE)
        .action_hash()
        .expect("hash");
    assert_eq!(
        hex::encode(hash),
        "5983a9453b8d32668daefa9310e1a81bc1f4d7da50a9ad8869a4011d12068ea0"
    );
}

#[test]
fn test_sdk_mainnet_signature_payload() {
    let input = SigningInput::new(sdk_action(), SDK_NONCE);
    let hash = input.action_hash().expect("hash");
    let signature = sdk_signer(true).sign_hash(hash).expect("sign");

    let signed = SignedAction::new(
        input.action,
        SDK_NONCE,
        ActionSignature::from(&signature),
        None,
        None,
    );
    let payload = signed.to_value().expect("json");

    assert_eq!(
        payload["signature"]["r"],
        "0x77957e58e70f43b6b68581f2dc42011fc384538a2e5b7bf42d5b936f19fbb673"
    );
    assert_eq!(
        payload["signature"]["s"],
        "0x60721a8598727230f67080efee48c812a6a4442013fd3b0eed509171bef9f23f"
    );
    assert_eq!(payload["signature"]["v"], 28);
    assert_eq!(payload["nonce"], SDK_NONCE);
    assert!(validate(&payload).is_valid());
}

#[test]
fn test_sdk_trigger_action_hash() {
    let mut action = sdk_action();
    action.orders[0].order_type = OrderTypeWire::Trigger {
        trigger: TriggerOrderType {
            is_market: true,
            trigger_px: "2000.0".to_string(),
            tpsl: "sl".to_string(),
        },
    };

    let encoded = encode(&action).expect("encode");
    let hash = build_hash(&encoded, SDK_NONCE, None, None);
    assert_eq!(
        hex::encode(hash),
        "93c6fc867458280be8fa653623dab767b96d63c2b049d7d1800cdaddb6759d6f"
    );
}

#[test]
fn test_signature_recovers_on_both_networks() {
    let hash = B256::repeat_byte(0x5a);
    for is_mainnet in [true, false] {
        let signer = sdk_signer(is_mainnet);
        let sig = signer.sign_hash(hash).expect("sign");
        let digest = PhantomAgent::new(hash, is_mainnet).signing_hash();
        assert_eq!(
            sig.recover_address_from_prehash(&digest).expect("recover"),
            signer.address()
        );
    }
}

#[test]
fn test_signer_is_shareable() {
    let signer = Arc::new(sdk_signer(false));
    let handles: Vec<_> = (0..4u8)
        .map(|i| {
            let signer = Arc::clone(&signer);
            std::thread::spawn(move || signer.sign_hash(B256::repeat_byte(i)).is_ok())
        })
        .collect();
    assert!(handles.into_iter().all(|h| h.join().expect("thread")));
}
