//! Process-wide basket manager.
//!
//! The binary installs its handle once at startup and tears it down on
//! exit. Callers only ever get a [`BasketManagerHandle`]; the registry
//! itself stays inside the actor.

use once_cell::sync::Lazy;
use parking_lot::RwLock;
use tracing::debug;

use crate::error::{BasketError, BasketResult};
use crate::manager::BasketManagerHandle;

static MANAGER: Lazy<RwLock<Option<BasketManagerHandle>>> = Lazy::new(|| RwLock::new(None));

/// Install the process-wide manager.
///
/// # Errors
/// `BasketError::AlreadyInstalled` if a manager is installed; call
/// [`teardown`] first.
pub fn install(handle: BasketManagerHandle) -> BasketResult<()> {
    let mut slot = MANAGER.write();
    if slot.is_some() {
        return Err(BasketError::AlreadyInstalled);
    }
    *slot = Some(handle);
    debug!("global basket manager installed");
    Ok(())
}

pub fn global() -> Option<BasketManagerHandle> {
    MANAGER.read().clone()
}

/// Remove the process-wide manager and return it for shutdown.
pub fn teardown() -> Option<BasketManagerHandle> {
    let handle = MANAGER.write().take();
    if handle.is_some() {
        debug!("global basket manager removed");
    }
    handle
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::manager::{spawn_basket_manager, BasketManagerConfig};
    use hlx_core::{AssetInfo, AssetTable};
    use hlx_executor::{KeyManager, MockSender, NonceManager, OrderPipeline, Signer};
    use std::sync::Arc;

    #[tokio::test]
    async fn test_install_global_teardown() {
        let key = KeyManager::from_hex(
            "0xac0974bec39a17e36ba4a6b4d238ff944bacb478cbed5efcae784d7bf4f2ff80",
            None,
        )
        .unwrap();
        let pipeline = Arc::new(OrderPipeline::new(
            Arc::new(AssetTable::from_assets([AssetInfo::new("ETH", 4, 4)]).unwrap()),
            Signer::new(key.into_digest_signer(), false),
            Arc::new(NonceManager::with_system_clock()),
            Arc::new(MockSender::new()),
        ));
        let (handle, join) = spawn_basket_manager(pipeline, BasketManagerConfig::default());

        assert!(global().is_none());
        install(handle.clone()).unwrap();
        assert!(matches!(
            install(handle.clone()),
            Err(BasketError::AlreadyInstalled)
        ));

        let shared = global().unwrap();
        assert!(shared.get_all_baskets().await.is_empty());

        let removed = teardown().unwrap();
        assert!(global().is_none());
        assert!(teardown().is_none());

        removed.shutdown().await;
        join.await.unwrap();
    }
}
