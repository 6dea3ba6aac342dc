use async_trait::async_trait;
use serde::Serialize;

use crate::normalize::PaymentResultRecord;

/// The external wallet engine: owns keys, signs, and speaks the network
/// protocols. One dispatch operation per rail; each takes the resolved
/// destination, the amount in sats (`None` when the destination itself
/// fixes it, as a fully specified bolt11 invoice does), and an optional
/// comment carried to the payee where the rail supports one.
#[async_trait]
pub trait WalletEngine: Send + Sync {
    async fn send_onchain(
        &self,
        address: String,
        amount_sats: Option<u64>,
        comment: Option<String>,
    ) -> anyhow::Result<OnchainSendResult>;

    async fn send_bolt11(
        &self,
        invoice: String,
        amount_sats: Option<u64>,
        comment: Option<String>,
    ) -> anyhow::Result<Bolt11SendResult>;

    async fn send_lightning_address(
        &self,
        address: String,
        amount_sats: Option<u64>,
        comment: Option<String>,
    ) -> anyhow::Result<LnAddressSendResult>;

    async fn send_ark(
        &self,
        ark_id: String,
        amount_sats: Option<u64>,
        comment: Option<String>,
    ) -> anyhow::Result<ArkSendResult>;
}

/// Durable transaction history. Receives exactly one record per send that
/// reaches a successful terminal state; failed dispatches record nothing.
#[async_trait]
pub trait TransactionHistory: Send + Sync {
    async fn record(&self, record: PaymentResultRecord) -> anyhow::Result<()>;
}

#[derive(Clone, Eq, PartialEq, Serialize, Debug)]
pub struct OnchainSendResult {
    pub txid: String,
    pub amount_sats: u64,
    pub fee_sats: Option<u64>,
}

#[derive(Clone, Eq, PartialEq, Serialize, Debug)]
pub struct Bolt11SendResult {
    pub payment_hash: String,
    pub preimage: String,
    pub amount_msats: u64,
    pub fee_msats: Option<u64>,
}

/// Lightning-address sends resolve to an invoice inside the engine, which
/// does not echo the amount back.
#[derive(Clone, Eq, PartialEq, Serialize, Debug)]
pub struct LnAddressSendResult {
    pub payment_hash: Option<String>,
    pub preimage: Option<String>,
}

#[derive(Clone, Eq, PartialEq, Serialize, Debug)]
pub struct ArkSendResult {
    pub ark_txid: Option<String>,
}
