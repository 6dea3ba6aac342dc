use std::fmt::{self, Display};

use serde::Serialize;

use crate::error::SendError;
use crate::ports::{ArkSendResult, Bolt11SendResult, LnAddressSendResult, OnchainSendResult};

/// The rail a payment actually settled over.
#[derive(Clone, Copy, Eq, PartialEq, Serialize, Debug)]
pub enum Rail {
    Onchain,
    Bolt11,
    LightningAddress,
    Ark,
}

impl Display for Rail {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Rail::Onchain => write!(f, "on-chain"),
            Rail::Bolt11 => write!(f, "lightning"),
            Rail::LightningAddress => write!(f, "lightning address"),
            Rail::Ark => write!(f, "ark"),
        }
    }
}

/// The heterogeneous result shapes the engine returns, one per rail.
#[derive(Clone, Eq, PartialEq, Serialize, Debug)]
pub enum RailResult {
    Onchain(OnchainSendResult),
    Bolt11(Bolt11SendResult),
    LightningAddress(LnAddressSendResult),
    Ark(ArkSendResult),
}

impl RailResult {
    fn rail(&self) -> Rail {
        match self {
            RailResult::Onchain(_) => Rail::Onchain,
            RailResult::Bolt11(_) => Rail::Bolt11,
            RailResult::LightningAddress(_) => Rail::LightningAddress,
            RailResult::Ark(_) => Rail::Ark,
        }
    }
}

/// The canonical post-send record handed to transaction history. Created
/// only on a terminal state transition of a send attempt.
#[derive(Clone, Eq, PartialEq, Serialize, Debug)]
pub struct PaymentResultRecord {
    pub kind: Rail,
    pub amount_sats: u64,
    pub destination: String,
    pub txid: Option<String>,
    pub preimage: Option<String>,
    pub note: Option<String>,
    pub success: bool,
}

/// Maps a rail-specific engine result into the canonical record.
///
/// The rail tag and the result shape must agree; a mismatch means the
/// orchestrator dispatched one rail and the engine answered for another,
/// which is a programming error and fails hard rather than defaulting.
/// On-chain and bolt11 results echo the settled amount; ark and
/// lightning-address results do not, so those take the dispatch-time amount.
pub fn normalize(
    rail: Rail,
    result: RailResult,
    dispatched_sats: Option<u64>,
    destination: &str,
    note: Option<String>,
) -> Result<PaymentResultRecord, SendError> {
    match (rail, result) {
        (Rail::Onchain, RailResult::Onchain(res)) => Ok(PaymentResultRecord {
            kind: Rail::Onchain,
            amount_sats: res.amount_sats,
            destination: destination.to_string(),
            txid: Some(res.txid),
            preimage: None,
            note,
            success: true,
        }),
        (Rail::Bolt11, RailResult::Bolt11(res)) => Ok(PaymentResultRecord {
            kind: Rail::Bolt11,
            amount_sats: res.amount_msats / 1000,
            destination: destination.to_string(),
            txid: None,
            preimage: Some(res.preimage),
            note,
            success: true,
        }),
        (Rail::LightningAddress, RailResult::LightningAddress(res)) => {
            let amount_sats = dispatched_sats.ok_or_else(|| SendError::Normalization {
                message: "lightning-address result carries no amount and none was dispatched"
                    .to_string(),
            })?;
            Ok(PaymentResultRecord {
                kind: Rail::LightningAddress,
                amount_sats,
                destination: destination.to_string(),
                txid: None,
                preimage: res.preimage,
                note,
                success: true,
            })
        }
        (Rail::Ark, RailResult::Ark(res)) => {
            let amount_sats = dispatched_sats.ok_or_else(|| SendError::Normalization {
                message: "ark result carries no amount and none was dispatched".to_string(),
            })?;
            Ok(PaymentResultRecord {
                kind: Rail::Ark,
                amount_sats,
                destination: destination.to_string(),
                txid: res.ark_txid,
                preimage: None,
                note,
                success: true,
            })
        }
        (rail, result) => Err(SendError::Normalization {
            message: format!(
                "a {} result cannot be recorded for a {} dispatch",
                result.rail(),
                rail
            ),
        }),
    }
}

/// Elides the middle of long destinations for history rows and log lines.
pub fn short_destination(destination: &str) -> String {
    let chars: Vec<char> = destination.chars().collect();
    if chars.len() <= 20 {
        return destination.to_string();
    }
    let head: String = chars[..8].iter().collect();
    let tail: String = chars[chars.len() - 6..].iter().collect();
    format!("{head}...{tail}")
}

#[cfg(test)]
mod tests {
    use super::{normalize, short_destination, Rail, RailResult};
    use crate::error::SendError;
    use crate::ports::{ArkSendResult, Bolt11SendResult, OnchainSendResult};

    #[test]
    fn onchain_record_takes_the_echoed_amount() {
        let record = normalize(
            Rail::Onchain,
            RailResult::Onchain(OnchainSendResult {
                txid: "ab".repeat(32),
                amount_sats: 21_000,
                fee_sats: Some(180),
            }),
            Some(999),
            "1BoatSLRHtKNngkdXEeobR76b53LETtpyT",
            None,
        )
        .unwrap();

        assert_eq!(record.kind, Rail::Onchain);
        assert_eq!(record.amount_sats, 21_000);
        assert!(record.txid.is_some());
        assert!(record.success);
    }

    #[test]
    fn bolt11_record_converts_msats_and_keeps_the_preimage() {
        let record = normalize(
            Rail::Bolt11,
            RailResult::Bolt11(Bolt11SendResult {
                payment_hash: "00".repeat(32),
                preimage: "11".repeat(32),
                amount_msats: 1_500_999,
                fee_msats: Some(1_000),
            }),
            None,
            "lnbc...",
            Some("rent".to_string()),
        )
        .unwrap();

        assert_eq!(record.amount_sats, 1_500);
        assert_eq!(record.preimage.as_deref(), Some("11".repeat(32).as_str()));
        assert_eq!(record.note.as_deref(), Some("rent"));
    }

    #[test]
    fn ark_record_takes_the_dispatched_amount() {
        let record = normalize(
            Rail::Ark,
            RailResult::Ark(ArkSendResult { ark_txid: None }),
            Some(50_000),
            "02abc",
            None,
        )
        .unwrap();

        assert_eq!(record.amount_sats, 50_000);
        assert_eq!(record.txid, None);
    }

    #[test]
    fn ark_without_a_dispatched_amount_is_a_hard_failure() {
        let err = normalize(
            Rail::Ark,
            RailResult::Ark(ArkSendResult { ark_txid: None }),
            None,
            "02abc",
            None,
        )
        .unwrap_err();
        assert!(matches!(err, SendError::Normalization { .. }));
    }

    #[test]
    fn mismatched_rail_and_result_shape_fails_hard() {
        let err = normalize(
            Rail::Ark,
            RailResult::Onchain(OnchainSendResult {
                txid: "ab".repeat(32),
                amount_sats: 1,
                fee_sats: None,
            }),
            Some(1),
            "02abc",
            None,
        )
        .unwrap_err();
        assert!(matches!(err, SendError::Normalization { .. }));
    }

    #[test]
    fn short_destination_elides_the_middle() {
        assert_eq!(short_destination("02abc"), "02abc");
        let long = "lntb500u1pn89hh6pp5ma7k6drm5syvd05";
        assert_eq!(short_destination(long), "lntb500u...syvd05");
    }
}
