//! Send-side core for a Bitcoin / Lightning / Ark mobile wallet.
//!
//! Takes an arbitrary user-supplied destination string, classifies it
//! against the active network, resolves multi-method URIs, tracks the
//! amount across display units, and drives one send attempt from entry to
//! a normalized history record. Keys, signing, and the network protocols
//! live in an external wallet engine behind the [`WalletEngine`] port;
//! durable storage sits behind [`TransactionHistory`].

mod amount;
mod classify;
mod error;
mod event_bus;
mod normalize;
mod ports;
mod send;
mod unified;

pub use amount::{AmountEngine, DisplayUnit, FiatCurrency, SATS_PER_BTC};
pub use classify::{classify, Classification, MIN_SPENDABLE_MSAT};
pub use error::SendError;
pub use event_bus::EventBus;
pub use normalize::{normalize, short_destination, PaymentResultRecord, Rail, RailResult};
pub use ports::{
    ArkSendResult, Bolt11SendResult, LnAddressSendResult, OnchainSendResult, TransactionHistory,
    WalletEngine,
};
pub use send::{
    LogLevel, PaymentPreview, SendAttempt, SendEventKind, SendState, WalletConfig, WalletEvent,
};
pub use unified::{resolve_unified, SendMethod, UnifiedParseError, UnifiedPayload};
