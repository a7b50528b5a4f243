pub mod gateway;
pub mod provider;

pub use gateway::{network_name_for, WalletConnection, WalletEvent, WalletGateway, WalletSubscription};
pub use provider::{EventKind, Listener, ListenerId, ProviderEvent, WalletProvider};
