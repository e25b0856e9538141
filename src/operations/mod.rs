//! Provisioning operation catalogue
//!
//! Every named operation the tool can run, registered in the order a fresh
//! deployment would execute them. Each one reads its inputs from the state
//! store, obtains signer-bound clients from the factory and drives one of the
//! [`crate::protocol`] step shapes.

mod manager;
mod native;
mod nft;
mod relay;

use std::sync::Arc;

use alloy::primitives::{Address, Bytes};
use futures::FutureExt;

use crate::chain::{ChainClient, ChainReader, ClientFactory};
use crate::contracts::ForgeArtifacts;
use crate::error::{OperationError, RegistryError};
use crate::protocol::{self, BindStep};
use crate::runner::{OperationKind, Registry};
use crate::state::{Role, Side, StateStore};

/// Artifact directory used when the state file names none.
const DEFAULT_ARTIFACTS_DIR: &str = "out";

/// Everything an operation may touch.
pub struct Provisioner {
    pub store: StateStore,
    pub clients: ClientFactory,
    pub artifacts: ForgeArtifacts,
}

impl Provisioner {
    pub fn new(store: StateStore, clients: ClientFactory) -> Self {
        let configured = store.state().artifacts_dir.trim();
        let dir = if configured.is_empty() {
            DEFAULT_ARTIFACTS_DIR
        } else {
            configured
        };
        let artifacts = ForgeArtifacts::new(dir);
        Self {
            store,
            clients,
            artifacts,
        }
    }

    pub(crate) fn admin(&mut self, side: Side) -> Result<Arc<dyn ChainClient>, OperationError> {
        self.clients.admin(self.store.state(), side)
    }

    pub(crate) fn relay_validators(&mut self) -> Result<Vec<Arc<dyn ChainClient>>, OperationError> {
        self.clients.relay_validators(self.store.state())
    }

    pub(crate) fn relay(&mut self) -> Result<Arc<dyn ChainClient>, OperationError> {
        self.clients.relay(self.store.state())
    }

    pub(crate) fn side_reader(
        &mut self,
        side: Side,
    ) -> Result<Arc<dyn ChainReader>, OperationError> {
        self.clients.side_reader(self.store.state(), side)
    }

    pub(crate) fn relay_reader(&mut self) -> Result<Arc<dyn ChainReader>, OperationError> {
        self.clients.relay_reader(self.store.state())
    }

    /// Deploy `code` on `side` and record the new contract as `role`.
    pub(crate) async fn deploy(
        &mut self,
        side: Side,
        role: Role,
        code: Bytes,
    ) -> Result<(), OperationError> {
        let client = self.admin(side)?;
        protocol::deploy(client.as_ref(), &mut self.store, role, code).await?;
        Ok(())
    }

    /// Run a bind step signed by the admin of `side`.
    pub(crate) async fn bind(&mut self, side: Side, step: BindStep) -> Result<(), OperationError> {
        let client = self.admin(side)?;
        protocol::bind(client.as_ref(), &step).await?;
        Ok(())
    }

    /// Submit `payload` to `target` from every relay validator.
    pub(crate) async fn submit_from_validators(
        &mut self,
        label: &str,
        target: Address,
        payload: Bytes,
    ) -> Result<(), OperationError> {
        for client in self.relay_validators()? {
            protocol::submit(client.as_ref(), label, target, payload.clone()).await?;
        }
        Ok(())
    }
}

/// Register one operation. The optional trailing argument is the side the
/// operation runs against.
macro_rules! register {
    ($registry:expr, $name:literal, $kind:ident, $op:path) => {
        $registry.register($name, OperationKind::$kind, |p| $op(p).boxed())?
    };
    ($registry:expr, $name:literal, $kind:ident, $op:path, $side:expr) => {
        $registry.register($name, OperationKind::$kind, |p| $op(p, $side).boxed())?
    };
}

/// The full operation table.
pub fn registry() -> Result<Registry<Provisioner>, RegistryError> {
    let mut r = Registry::new();

    // target chain: relay registration and genesis
    register!(r, "target-deploy-eccd", Deploy, manager::deploy_eccd, Side::Target);
    register!(r, "target-register-sidechain", Submit, relay::register_side_chain, Side::Target);
    register!(r, "target-approve-sidechain", Submit, relay::approve_side_chain, Side::Target);
    register!(r, "target-sync-target-genesis", Submit, relay::sync_side_genesis, Side::Target);
    register!(r, "target-deploy-eccm", Deploy, manager::deploy_eccm, Side::Target);
    register!(r, "target-sync-relay-genesis", Submit, relay::sync_relay_genesis, Side::Target);

    // target chain: contracts and bindings
    register!(r, "target-deploy-ccmp", Deploy, manager::deploy_ccmp, Side::Target);
    register!(r, "target-eccd-ownership", Bind, manager::eccd_ownership, Side::Target);
    register!(r, "target-eccm-ownership", Bind, manager::eccm_ownership, Side::Target);
    register!(r, "target-set-ccmp", Bind, native::target_set_ccmp);
    register!(r, "target-bind-native-asset", Bind, native::target_bind_asset);
    register!(r, "target-deploy-wrapper", Deploy, native::target_deploy_wrapper);
    register!(r, "target-wrapper-set-proxy", Bind, native::target_wrapper_set_proxy);
    register!(r, "target-deploy-nft-proxy", Deploy, nft::deploy_proxy, Side::Target);
    register!(r, "target-deploy-nft-wrapper", Deploy, nft::target_deploy_wrapper);
    register!(r, "target-deploy-nft-query", Deploy, nft::target_deploy_query);
    register!(r, "target-bind-nft-asset", Bind, nft::bind_asset, Side::Target);
    register!(r, "target-nft-ccmp", Bind, nft::set_ccmp, Side::Target);

    // source chain: relay registration and genesis
    register!(r, "source-deploy-eccd", Deploy, manager::deploy_eccd, Side::Source);
    register!(r, "source-register-sidechain", Submit, relay::register_side_chain, Side::Source);
    register!(r, "source-approve-sidechain", Submit, relay::approve_side_chain, Side::Source);
    register!(r, "source-sync-source-genesis", Submit, relay::sync_side_genesis, Side::Source);
    register!(r, "source-deploy-eccm", Deploy, manager::deploy_eccm, Side::Source);
    register!(r, "source-sync-relay-genesis", Submit, relay::sync_relay_genesis, Side::Source);

    // source chain: contracts and bindings
    register!(r, "source-deploy-ccmp", Deploy, manager::deploy_ccmp, Side::Source);
    register!(r, "source-eccd-ownership", Bind, manager::eccd_ownership, Side::Source);
    register!(r, "source-eccm-ownership", Bind, manager::eccm_ownership, Side::Source);
    register!(r, "source-deploy-native-proxy", Deploy, native::source_deploy_proxy);
    register!(r, "source-native-proxy-ccmp", Bind, native::source_proxy_ccmp);
    register!(r, "source-bind-native-proxy", Bind, native::source_bind_proxy);
    register!(r, "source-bind-native-asset", Bind, native::source_bind_asset);
    register!(r, "source-deploy-nft-proxy", Deploy, nft::deploy_proxy, Side::Source);
    register!(r, "source-bind-nft-proxy", Bind, nft::bind_proxy, Side::Source);
    register!(r, "source-bind-nft-asset", Bind, nft::bind_asset, Side::Source);
    register!(r, "source-nft-ccmp", Bind, nft::set_ccmp, Side::Source);

    // target chain: peers that only exist once the source side is deployed
    register!(r, "target-bind-native-proxy", Bind, native::target_bind_proxy);
    register!(r, "target-bind-nft-proxy", Bind, nft::bind_proxy, Side::Target);

    Ok(r)
}
