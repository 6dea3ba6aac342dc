use std::str::FromStr;

use bitcoin::address::NetworkUnchecked;
use bitcoin::secp256k1::PublicKey;
use bitcoin::{Address, Network};
use lightning_invoice::Bolt11Invoice;
use lnurl::lightning_address::LightningAddress;
use serde::Serialize;

use crate::unified::{self, UnifiedPayload};

/// Smallest invoice amount we will treat as spendable: 1000 msat, one sat.
pub const MIN_SPENDABLE_MSAT: u64 = 1000;

const URI_SCHEMES: [&str; 3] = ["bitcoin:", "lightning:", "ark:"];

/// What a raw destination string turned out to be. Exactly one variant per
/// input; consumers must handle every rail plus `Unrecognized`.
#[derive(Clone, Eq, PartialEq, Serialize, Debug)]
pub enum Classification {
    Onchain {
        address: String,
    },
    LightningInvoice {
        invoice: String,
        amount_sats: Option<u64>,
        amount_editable: bool,
        warning: Option<String>,
    },
    LightningAddress {
        address: String,
    },
    ArkIdentifier {
        id: String,
    },
    UnifiedMultiMethod(UnifiedPayload),
    Unrecognized {
        reason: String,
    },
}

impl Classification {
    /// The amount the destination format itself fixes, if any, in sats.
    pub fn fixed_amount_sats(&self) -> Option<u64> {
        match self {
            Classification::LightningInvoice { amount_sats, .. } => *amount_sats,
            Classification::UnifiedMultiMethod(payload) => payload.amount_sats,
            _ => None,
        }
    }

    pub fn amount_editable(&self) -> bool {
        match self {
            Classification::LightningInvoice {
                amount_editable, ..
            } => *amount_editable,
            Classification::UnifiedMultiMethod(payload) => payload.amount_sats.is_none(),
            Classification::Unrecognized { .. } => false,
            _ => true,
        }
    }

    pub fn validation_warning(&self) -> Option<&str> {
        match self {
            Classification::LightningInvoice { warning, .. } => warning.as_deref(),
            _ => None,
        }
    }

    pub fn is_unrecognized(&self) -> bool {
        matches!(self, Classification::Unrecognized { .. })
    }
}

/// Classifies a raw user-supplied destination against the active network.
///
/// Total over all strings: decode failures fall through to the next format
/// check and the worst outcome is `Unrecognized`. Pure: the same input and
/// network always classify identically. Checks are ordered because the
/// formats overlap in superficial shape.
pub fn classify(input: &str, network: Network) -> Classification {
    let trimmed = input.trim();
    if trimmed.is_empty() {
        return Classification::Unrecognized {
            reason: "empty destination".to_string(),
        };
    }

    let (scheme, rest) = strip_scheme(trimmed);

    // A query part after the path means a multi-method container. Once the
    // input is container-shaped, a parse failure is a failure of the whole
    // classification, never a partial result.
    if scheme != Some("lightning:") && scheme != Some("ark:") && rest.contains('?') {
        return match unified::resolve_unified(&format!("bitcoin:{rest}"), network) {
            Ok(payload) => Classification::UnifiedMultiMethod(payload),
            Err(e) => Classification::Unrecognized {
                reason: e.to_string(),
            },
        };
    }

    if is_lightning_address(rest) {
        return Classification::LightningAddress {
            address: rest.to_string(),
        };
    }

    if let Ok(invoice) = Bolt11Invoice::from_str(rest) {
        let (amount_sats, amount_editable, warning) =
            invoice_amount_policy(invoice.amount_milli_satoshis());
        return Classification::LightningInvoice {
            invoice: rest.to_string(),
            amount_sats,
            amount_editable,
            warning,
        };
    }

    if is_onchain_address(rest, network) {
        return Classification::Onchain {
            address: rest.to_string(),
        };
    }

    if is_ark_identifier(rest, network) {
        return Classification::ArkIdentifier {
            id: rest.to_string(),
        };
    }

    Classification::Unrecognized {
        reason: "not a recognized payment destination".to_string(),
    }
}

fn strip_scheme(input: &str) -> (Option<&'static str>, &str) {
    for scheme in URI_SCHEMES {
        if input.len() >= scheme.len() && input[..scheme.len()].eq_ignore_ascii_case(scheme) {
            let mut rest = &input[scheme.len()..];
            if let Some(stripped) = rest.strip_prefix("//") {
                rest = stripped;
            }
            return (Some(scheme), rest);
        }
    }
    (None, input)
}

/// Maps a decoded invoice amount to (fixed amount in sats, editable, warning).
/// A missing or zero amount leaves the field editable; a nonzero sub-sat
/// amount is parseable but not spendable, so it stays editable with a
/// warning; anything else locks the field to the invoice amount.
pub(crate) fn invoice_amount_policy(amount_msat: Option<u64>) -> (Option<u64>, bool, Option<String>) {
    match amount_msat {
        None | Some(0) => (None, true, None),
        Some(msat) if msat < MIN_SPENDABLE_MSAT => (
            None,
            true,
            Some(format!(
                "invoice amount of {msat} msat is below one satoshi and cannot be paid as encoded"
            )),
        ),
        Some(msat) => (Some(msat / MIN_SPENDABLE_MSAT), false, None),
    }
}

/// Whether a bolt11 string encodes a spendable fixed amount, meaning the
/// dispatch must not supply one of its own.
pub(crate) fn invoice_has_fixed_amount(input: &str) -> bool {
    match Bolt11Invoice::from_str(input) {
        Ok(invoice) => {
            let (_, amount_editable, _) = invoice_amount_policy(invoice.amount_milli_satoshis());
            !amount_editable
        }
        Err(_) => false,
    }
}

pub(crate) fn is_onchain_address(input: &str, network: Network) -> bool {
    match input.parse::<Address<NetworkUnchecked>>() {
        Ok(address) => address_valid_for(&address, network),
        Err(_) => false,
    }
}

/// Network validity with one carve-out: a signet wallet also accepts
/// regtest-formatted addresses, so the two test networks interoperate.
/// Testnet and signet already share their grammar.
pub(crate) fn address_valid_for(address: &Address<NetworkUnchecked>, network: Network) -> bool {
    address.is_valid_for_network(network)
        || (network == Network::Signet && address.is_valid_for_network(Network::Regtest))
}

/// Lightning-address grammar per lnurl, with Tor-only domains rejected as a
/// policy decision rather than a grammar one.
pub(crate) fn is_lightning_address(input: &str) -> bool {
    if LightningAddress::from_str(input).is_err() {
        return false;
    }
    match input.rsplit_once('@') {
        Some((_, domain)) => !domain.to_ascii_lowercase().ends_with(".onion"),
        None => false,
    }
}

fn is_ark_identifier(input: &str, network: Network) -> bool {
    is_ark_pubkey(input) || input.to_ascii_lowercase().starts_with(ark_hrp(network))
}

/// A bare ark identifier is a compressed secp256k1 public key in hex: 66
/// characters with an 0x02 or 0x03 prefix byte, independent of network.
pub(crate) fn is_ark_pubkey(input: &str) -> bool {
    input.len() == 66
        && (input.starts_with("02") || input.starts_with("03"))
        && PublicKey::from_str(input).is_ok()
}

fn ark_hrp(network: Network) -> &'static str {
    match network {
        Network::Bitcoin => "ark1",
        _ => "tark1",
    }
}
