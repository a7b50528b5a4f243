//! Wallet gateway: account access, network assertion and change events.

use std::cell::RefCell;
use std::rc::Rc;
use std::time::Duration;

use serde_json::{json, Value};
use tracing::{debug, info, warn};

use crate::config::NetworkDescriptor;
use crate::error::WalletError;
use crate::types::{Address, ChainId};
use crate::wallet::provider::{
    methods, parse_accounts, parse_chain_id, EventKind, Listener, ListenerId, ProviderEvent,
    WalletProvider,
};

/// The last observed wallet session.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WalletConnection {
    pub address: Option<Address>,
    pub chain_id: Option<ChainId>,
    pub is_connected: bool,
}

/// What the gateway republishes to its subscriber after updating itself.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WalletEvent {
    AccountConnected(Address),
    AccountsCleared,
    NetworkChanged { chain_id: ChainId, name: String },
}

/// Human-readable network name, as wallets and explorers spell it.
pub fn network_name_for(chain_id: ChainId) -> &'static str {
    match chain_id.0 {
        1 => "mainnet",
        5 => "goerli",
        17_000 => "holesky",
        11_155_111 => "sepolia",
        _ => "unknown",
    }
}

#[derive(Debug, Default)]
struct WalletState {
    connection: WalletConnection,
    network_name: Option<String>,
}

impl WalletState {
    fn set_account(&mut self, address: Address) {
        self.connection.address = Some(address);
        self.connection.is_connected = true;
    }

    fn clear_account(&mut self) {
        self.connection.address = None;
        self.connection.is_connected = false;
    }

    fn set_chain(&mut self, chain_id: ChainId) -> String {
        let name = network_name_for(chain_id).to_string();
        self.connection.chain_id = Some(chain_id);
        self.network_name = Some(name.clone());
        name
    }
}

pub struct WalletGateway<P: WalletProvider> {
    provider: Option<Rc<P>>,
    network: NetworkDescriptor,
    state: Rc<RefCell<WalletState>>,
}

impl<P: WalletProvider + 'static> WalletGateway<P> {
    /// `provider` is `None` when the host has no injected wallet.
    pub fn new(provider: Option<Rc<P>>, network: NetworkDescriptor) -> Self {
        Self { provider, network, state: Rc::new(RefCell::new(WalletState::default())) }
    }

    pub fn is_installed(&self) -> bool { self.provider.is_some() }

    pub fn network(&self) -> &NetworkDescriptor { &self.network }

    pub fn connection(&self) -> WalletConnection { self.state.borrow().connection.clone() }

    pub fn address(&self) -> Option<Address> { self.state.borrow().connection.address }

    pub fn network_name(&self) -> Option<String> { self.state.borrow().network_name.clone() }

    fn provider(&self) -> Result<&Rc<P>, WalletError> {
        self.provider.as_ref().ok_or(WalletError::NotInstalled)
    }

    /// Forwards one request to the provider.
    pub async fn request(&self, method: &str, params: Value) -> Result<Value, WalletError> {
        let provider = self.provider()?;
        debug!(method, %params, "provider request");
        provider.request(method, params).await.map_err(|err| {
            debug!(method, code = err.code, message = %err.message, "provider request failed");
            WalletError::Provider(err)
        })
    }

    pub(crate) async fn pause(&self, interval: Duration) {
        if let Some(provider) = &self.provider {
            provider.pause(interval).await;
        }
    }

    /// Requests account access, then makes sure the wallet is on the
    /// required network. Returns the primary account.
    pub async fn connect(&self) -> Result<Address, WalletError> {
        let accounts = self
            .request(methods::REQUEST_ACCOUNTS, json!([]))
            .await
            .map_err(|err| match err {
                WalletError::Provider(e) if e.is_user_rejection() => WalletError::UserRejected,
                other => other,
            })?;
        let address = *parse_accounts(&accounts)?.first().ok_or(WalletError::NoAccounts)?;

        self.assert_network().await?;
        self.state.borrow_mut().set_account(address);
        info!(%address, "wallet connected");
        Ok(address)
    }

    /// Accounts the wallet already authorized, without prompting.
    pub async fn existing_accounts(&self) -> Result<Option<Address>, WalletError> {
        let accounts = parse_accounts(&self.request(methods::ACCOUNTS, json!([])).await?)?;
        let first = accounts.first().copied();
        if let Some(address) = first {
            self.state.borrow_mut().set_account(address);
        }
        Ok(first)
    }

    pub async fn chain_id(&self) -> Result<ChainId, WalletError> {
        parse_chain_id(&self.request(methods::CHAIN_ID, json!([])).await?)
    }

    /// Ensures the wallet is on the required chain, switching (and
    /// registering the chain first if the wallet does not know it).
    pub async fn assert_network(&self) -> Result<(), WalletError> {
        let current = self.chain_id().await?;
        let required = self.network.chain_id;
        if current == required {
            self.state.borrow_mut().set_chain(current);
            return Ok(());
        }

        info!(%current, %required, "switching wallet network");
        let switch_params = json!([{ "chainId": self.network.chain_id_hex() }]);
        match self.request(methods::SWITCH_CHAIN, switch_params.clone()).await {
            Ok(_) => {}
            Err(WalletError::Provider(err)) if err.is_unrecognized_chain() => {
                info!(chain = %self.network.chain_name, "registering chain with wallet");
                self.request(methods::ADD_CHAIN, json!([self.network.to_add_chain_params()]))
                    .await
                    .map_err(|e| self.switch_failure(e))?;
                self.request(methods::SWITCH_CHAIN, switch_params)
                    .await
                    .map_err(|e| self.switch_failure(e))?;
            }
            Err(err) => return Err(self.switch_failure(err)),
        }

        self.state.borrow_mut().set_chain(required);
        Ok(())
    }

    fn switch_failure(&self, err: WalletError) -> WalletError {
        warn!(error = %err, "network switch failed");
        match err {
            WalletError::Provider(e) if e.is_user_rejection() => {
                WalletError::NetworkSwitchRejected(self.network.chain_name.clone())
            }
            WalletError::NotInstalled => WalletError::NotInstalled,
            _ => WalletError::WrongNetwork(self.network.chain_name.clone()),
        }
    }

    /// Re-reads the chain and republishes its name.
    pub async fn refresh_network_name(&self) -> Result<String, WalletError> {
        let chain_id = self.chain_id().await?;
        Ok(self.state.borrow_mut().set_chain(chain_id))
    }

    /// Forgets the current session. The wallet's own authorization is
    /// untouched; providers offer no way to revoke it.
    pub fn disconnect(&self) {
        self.state.borrow_mut().clear_account();
        info!("wallet session cleared");
    }

    /// Registers account and chain listeners. Both are removed when the
    /// returned handle is dropped.
    pub fn subscribe(
        &self,
        sink: impl Fn(WalletEvent) + 'static,
    ) -> Result<WalletSubscription<P>, WalletError> {
        let provider = Rc::clone(self.provider()?);
        let sink: Rc<dyn Fn(WalletEvent)> = Rc::new(sink);

        let on_accounts: Listener = {
            let state = Rc::clone(&self.state);
            let sink = Rc::clone(&sink);
            Rc::new(move |event: &ProviderEvent| {
                let ProviderEvent::AccountsChanged(accounts) = event else { return };
                let published = match accounts.first() {
                    Some(address) => {
                        state.borrow_mut().set_account(*address);
                        WalletEvent::AccountConnected(*address)
                    }
                    None => {
                        state.borrow_mut().clear_account();
                        WalletEvent::AccountsCleared
                    }
                };
                debug!(?published, "accounts changed");
                sink(published);
            })
        };

        let on_chain: Listener = {
            let state = Rc::clone(&self.state);
            let sink = Rc::clone(&sink);
            Rc::new(move |event: &ProviderEvent| {
                let ProviderEvent::ChainChanged(chain_id) = event else { return };
                let name = state.borrow_mut().set_chain(*chain_id);
                debug!(%chain_id, %name, "chain changed");
                sink(WalletEvent::NetworkChanged { chain_id: *chain_id, name });
            })
        };

        let ids = vec![
            provider.on(EventKind::AccountsChanged, on_accounts),
            provider.on(EventKind::ChainChanged, on_chain),
        ];
        Ok(WalletSubscription { provider, ids })
    }
}

/// Live provider listeners; dropping the handle deregisters them.
pub struct WalletSubscription<P: WalletProvider> {
    provider: Rc<P>,
    ids: Vec<ListenerId>,
}

impl<P: WalletProvider> WalletSubscription<P> {
    pub fn listener_ids(&self) -> &[ListenerId] { &self.ids }
}

impl<P: WalletProvider> Drop for WalletSubscription<P> {
    fn drop(&mut self) {
        for id in self.ids.drain(..) {
            self.provider.remove_listener(id);
        }
    }
}
