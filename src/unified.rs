use std::str::FromStr;

use bip21::de::ParamKind;
use bip21::{DeserializationError, DeserializeParams, Param};
use bitcoin::address::NetworkUnchecked;
use bitcoin::Network;
use lightning_invoice::Bolt11Invoice;
use serde::Serialize;
use thiserror::Error;

use crate::classify::{address_valid_for, is_ark_pubkey};

/// A structural failure while resolving a multi-method container. The caller
/// degrades the whole classification to `Unrecognized`; a partially parsed
/// container is never returned.
#[derive(Debug, Clone, Error, Eq, PartialEq)]
pub enum UnifiedParseError {
    #[error("not a parseable payment URI")]
    Malformed,
    #[error("the on-chain address in the URI is not valid for the active network")]
    WrongNetwork,
    #[error("the ark identifier embedded in the URI is not valid")]
    BadArkParam,
    #[error("the lightning invoice embedded in the URI is not valid")]
    BadInvoiceParam,
}

/// One of the rails a unified destination can settle over.
#[derive(Clone, Copy, Eq, PartialEq, Serialize, Debug)]
pub enum SendMethod {
    Ark,
    Lightning,
    Onchain,
}

/// A resolved multi-method destination: a mandatory on-chain address plus
/// whatever alternative rails the payee embedded, and an optional amount
/// that is fixed for the whole payload.
#[derive(Clone, Eq, PartialEq, Serialize, Debug)]
pub struct UnifiedPayload {
    pub onchain_address: String,
    pub ark: Option<String>,
    pub lightning: Option<String>,
    pub amount_sats: Option<u64>,
}

impl UnifiedPayload {
    pub fn available_methods(&self) -> Vec<SendMethod> {
        let mut methods = Vec::new();
        if self.ark.is_some() {
            methods.push(SendMethod::Ark);
        }
        if self.lightning.is_some() {
            methods.push(SendMethod::Lightning);
        }
        methods.push(SendMethod::Onchain);
        methods
    }

    /// Cheapest rail first: the off-chain ledger if offered, then lightning,
    /// then the chain itself.
    pub fn default_method(&self) -> SendMethod {
        if self.ark.is_some() {
            SendMethod::Ark
        } else if self.lightning.is_some() {
            SendMethod::Lightning
        } else {
            SendMethod::Onchain
        }
    }

    pub fn destination_for(&self, method: SendMethod) -> Option<&str> {
        match method {
            SendMethod::Ark => self.ark.as_deref(),
            SendMethod::Lightning => self.lightning.as_deref(),
            SendMethod::Onchain => Some(&self.onchain_address),
        }
    }
}

/// Resolves a BIP 21 style URI into a [`UnifiedPayload`].
///
/// The path component must independently be a valid on-chain address for the
/// active network or the whole parse fails. The `amount` query value is in
/// whole coins and converts to sats; `ark` and `lightning` carry the
/// alternative-rail sub-destinations. Unrecognized query keys are ignored.
pub fn resolve_unified(uri: &str, network: Network) -> Result<UnifiedPayload, UnifiedParseError> {
    let parsed = uri
        .parse::<bip21::Uri<NetworkUnchecked, Extras>>()
        .map_err(|_| UnifiedParseError::Malformed)?;

    if !address_valid_for(&parsed.address, network) {
        return Err(UnifiedParseError::WrongNetwork);
    }
    let onchain_address = parsed.address.assume_checked().to_string();

    let amount_sats = parsed.amount.map(|amount| amount.to_sat());

    let ark = match parsed.extras.ark {
        Some(id) if is_ark_pubkey(&id) => Some(id),
        Some(_) => return Err(UnifiedParseError::BadArkParam),
        None => None,
    };

    let lightning = match parsed.extras.lightning {
        Some(raw) => {
            Bolt11Invoice::from_str(&raw).map_err(|_| UnifiedParseError::BadInvoiceParam)?;
            Some(raw)
        }
        None => None,
    };

    Ok(UnifiedPayload {
        onchain_address,
        ark,
        lightning,
        amount_sats,
    })
}

#[derive(Debug, Clone, Default)]
struct Extras {
    ark: Option<String>,
    lightning: Option<String>,
}

impl<'a> DeserializeParams<'a> for Extras {
    type DeserializationState = ExtrasState;
}

#[derive(Default)]
struct ExtrasState {
    ark: Option<String>,
    lightning: Option<String>,
}

impl<'a> bip21::de::DeserializationState<'a> for ExtrasState {
    type Value = Extras;

    fn is_param_known(&self, key: &str) -> bool {
        key == "ark" || key == "lightning"
    }

    fn deserialize_temp(
        &mut self,
        key: &str,
        value: Param<'_>,
    ) -> Result<ParamKind, <Self::Value as DeserializationError>::Error> {
        match key {
            "ark" => {
                self.ark =
                    Some(String::try_from(value).map_err(|_| UnifiedParseError::BadArkParam)?);
                Ok(ParamKind::Known)
            }
            "lightning" => {
                self.lightning =
                    Some(String::try_from(value).map_err(|_| UnifiedParseError::BadInvoiceParam)?);
                Ok(ParamKind::Known)
            }
            _ => Ok(ParamKind::Unknown),
        }
    }

    fn finalize(self) -> Result<Self::Value, <Self::Value as DeserializationError>::Error> {
        Ok(Extras {
            ark: self.ark,
            lightning: self.lightning,
        })
    }
}

impl DeserializationError for Extras {
    type Error = UnifiedParseError;
}

#[cfg(test)]
mod tests {
    use bitcoin::Network;

    use super::{resolve_unified, SendMethod, UnifiedParseError};

    const MAINNET_P2PKH: &str = "1BoatSLRHtKNngkdXEeobR76b53LETtpyT";
    const ARK_PUBKEY: &str = "0279be667ef9dcbbac55a06295ce870b07029bfcdb2dce28d959f2815b16f81798";
    // testnet URI in QR casing, carrying a bolt11 parameter and a trailing amount
    const WALLET_QR: &str = "bitcoin:TB1QQ32G6LM2XKT0U2UGASH5DC4CFT3JTPEW65PZZ5?lightning=LNTB500U1PN89HH6PP5MA7K6DRM5SYVD05NTXMGSRNM728J7EHM8KV6VC96YNLKN7G7VDYQDQQCQZRCXQR8Q7SP5HU30L0EEXKYYPQSQYEZELZWUPT62HLJ0KV2662CALGPAML50QPXQ9QXPQYSGQDKTVFXEC8H2DG2GY3C95ETAJ0QKX50XAUCU304PPFV2SQVGFHZ6RMZWJV8MC3M0LXF3GW852C5VSK0DELK0JHLYUTYZDF7QKNAMT4PQQQN24WM&amount=0.0005";

    #[test]
    fn resolves_address_amount_and_ark() {
        let uri = format!("bitcoin:{MAINNET_P2PKH}?amount=0.0005&ark={ARK_PUBKEY}");
        let payload = resolve_unified(&uri, Network::Bitcoin).unwrap();

        assert_eq!(payload.onchain_address, MAINNET_P2PKH);
        assert_eq!(payload.amount_sats, Some(50_000));
        assert_eq!(payload.ark.as_deref(), Some(ARK_PUBKEY));
        assert_eq!(payload.lightning, None);
        assert_eq!(payload.default_method(), SendMethod::Ark);
        assert_eq!(
            payload.available_methods(),
            vec![SendMethod::Ark, SendMethod::Onchain]
        );
    }

    #[test]
    fn resolves_embedded_invoice() {
        let payload = resolve_unified(WALLET_QR, Network::Testnet).unwrap();

        assert_eq!(payload.amount_sats, Some(50_000));
        assert!(payload.lightning.is_some());
        assert_eq!(payload.ark, None);
        assert_eq!(payload.default_method(), SendMethod::Lightning);
    }

    #[test]
    fn address_only_uri_defaults_to_onchain() {
        let uri = format!("bitcoin:{MAINNET_P2PKH}?unknown=1");
        let payload = resolve_unified(&uri, Network::Bitcoin).unwrap();

        assert_eq!(payload.amount_sats, None);
        assert_eq!(payload.default_method(), SendMethod::Onchain);
        assert_eq!(payload.available_methods(), vec![SendMethod::Onchain]);
        assert_eq!(
            payload.destination_for(SendMethod::Onchain),
            Some(MAINNET_P2PKH)
        );
        assert_eq!(payload.destination_for(SendMethod::Ark), None);
    }

    #[test]
    fn wrong_network_address_fails_the_parse() {
        assert_eq!(
            resolve_unified(WALLET_QR, Network::Bitcoin),
            Err(UnifiedParseError::WrongNetwork)
        );
    }

    #[test]
    fn invalid_ark_param_fails_the_parse() {
        let uri = format!("bitcoin:{MAINNET_P2PKH}?ark=deadbeef");
        assert_eq!(
            resolve_unified(&uri, Network::Bitcoin),
            Err(UnifiedParseError::BadArkParam)
        );
    }

    #[test]
    fn invalid_lightning_param_fails_the_parse() {
        let uri = format!("bitcoin:{MAINNET_P2PKH}?lightning=lnbcnotaninvoice");
        assert_eq!(
            resolve_unified(&uri, Network::Bitcoin),
            Err(UnifiedParseError::BadInvoiceParam)
        );
    }

    #[test]
    fn structural_garbage_is_malformed() {
        assert_eq!(
            resolve_unified("bitcoin:?amount=1", Network::Bitcoin),
            Err(UnifiedParseError::Malformed)
        );
        assert_eq!(
            resolve_unified("bitcoin:nonsense?amount=1", Network::Bitcoin),
            Err(UnifiedParseError::Malformed)
        );
    }
}
