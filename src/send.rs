use std::fmt::{self, Display};
use std::str::FromStr;
use std::sync::Arc;

use bitcoin::Network;
use lightning_invoice::Bolt11Invoice;
use serde::Serialize;

use crate::amount::{AmountEngine, FiatCurrency};
use crate::classify::{classify, invoice_has_fixed_amount, Classification};
use crate::error::SendError;
use crate::event_bus::EventBus;
use crate::normalize::{normalize, short_destination, PaymentResultRecord, Rail, RailResult};
use crate::ports::{TransactionHistory, WalletEngine};
use crate::unified::SendMethod;

#[derive(Clone, Copy, Debug)]
pub struct WalletConfig {
    pub network: Network,
    pub fiat_currency: FiatCurrency,
}

/// Where a send attempt is in its lifecycle. One enum, checked centrally,
/// instead of a pile of independent flags.
#[derive(Clone, Copy, Eq, PartialEq, Serialize, Debug)]
pub enum SendState {
    Idle,
    Classified,
    MethodSelection,
    Confirming,
    Dispatching,
    Succeeded,
    Failed,
}

impl Display for SendState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SendState::Idle => write!(f, "idle"),
            SendState::Classified => write!(f, "classified"),
            SendState::MethodSelection => write!(f, "method selection"),
            SendState::Confirming => write!(f, "confirming"),
            SendState::Dispatching => write!(f, "dispatching"),
            SendState::Succeeded => write!(f, "succeeded"),
            SendState::Failed => write!(f, "failed"),
        }
    }
}

#[derive(Clone, Eq, PartialEq, Serialize, Debug)]
pub enum LogLevel {
    Trace,
    Debug,
    Info,
    Warn,
    Error,
}

#[derive(Clone, Eq, PartialEq, Serialize, Debug)]
pub enum SendEventKind {
    StateChanged(SendState),
    DispatchSucceeded(PaymentResultRecord),
    DispatchFailed(String),
}

#[derive(Clone, Eq, PartialEq, Serialize, Debug)]
pub enum WalletEvent {
    Send(SendEventKind),
    Log(LogLevel, String),
}

/// What is about to be dispatched, for the confirmation sheet.
#[derive(Clone, Eq, PartialEq, Serialize, Debug)]
pub struct PaymentPreview {
    pub rail: Rail,
    pub destination: String,
    pub amount_sats: u64,
    pub fiat_text: Option<String>,
    pub payment_hash: Option<String>,
    pub network: Option<String>,
}

/// One live send attempt.
///
/// Created fresh per send screen, never persisted. Classification and every
/// state transition are synchronous; the only suspension point is
/// [`dispatch`], and once it starts the attempt is frozen until the engine
/// answers. All collaborators are injected.
///
/// [`dispatch`]: SendAttempt::dispatch
pub struct SendAttempt {
    config: WalletConfig,
    engine: Arc<dyn WalletEngine>,
    history: Arc<dyn TransactionHistory>,
    events: EventBus<WalletEvent>,
    destination: String,
    classification: Option<Classification>,
    selected_method: Option<SendMethod>,
    amount: AmountEngine,
    comment: Option<String>,
    state: SendState,
    error: Option<SendError>,
    result: Option<PaymentResultRecord>,
}

impl SendAttempt {
    pub fn new(
        config: WalletConfig,
        engine: Arc<dyn WalletEngine>,
        history: Arc<dyn TransactionHistory>,
        events: EventBus<WalletEvent>,
    ) -> Self {
        Self {
            amount: AmountEngine::new(config.fiat_currency),
            config,
            engine,
            history,
            events,
            destination: String::new(),
            classification: None,
            selected_method: None,
            comment: None,
            state: SendState::Idle,
            error: None,
            result: None,
        }
    }

    pub fn state(&self) -> SendState {
        self.state
    }

    pub fn destination(&self) -> &str {
        &self.destination
    }

    pub fn classification(&self) -> Option<&Classification> {
        self.classification.as_ref()
    }

    pub fn selected_method(&self) -> Option<SendMethod> {
        self.selected_method
    }

    pub fn amount(&self) -> &AmountEngine {
        &self.amount
    }

    pub fn error(&self) -> Option<&SendError> {
        self.error.as_ref()
    }

    pub fn result(&self) -> Option<&PaymentResultRecord> {
        self.result.as_ref()
    }

    pub fn events(&self) -> &EventBus<WalletEvent> {
        &self.events
    }

    /// Re-classifies on every destination edit. Editing is a cancellation
    /// point: from `Confirming` it discards confirmation progress, while a
    /// dispatch in flight and terminal states reject the edit.
    pub fn set_destination(&mut self, input: &str) -> Result<(), SendError> {
        match self.state {
            SendState::Dispatching => return Err(SendError::DispatchInProgress),
            SendState::Succeeded | SendState::Failed => {
                return Err(SendError::InvalidTransition {
                    from: self.state,
                    action: "edit the destination",
                })
            }
            _ => {}
        }

        let trimmed = input.trim();
        if trimmed.is_empty() {
            self.destination.clear();
            self.classification = None;
            self.selected_method = None;
            self.amount.unlock();
            self.set_state(SendState::Idle);
            return Ok(());
        }

        let classification = classify(trimmed, self.config.network);
        if let Some(warning) = classification.validation_warning() {
            self.warn(warning.to_string());
        }

        match (
            classification.fixed_amount_sats(),
            classification.amount_editable(),
        ) {
            (Some(fixed), false) => self.amount.lock(fixed),
            _ => self.amount.unlock(),
        }

        self.selected_method = match &classification {
            Classification::UnifiedMultiMethod(payload) => Some(payload.default_method()),
            _ => None,
        };
        let next = match &classification {
            Classification::UnifiedMultiMethod(payload)
                if payload.available_methods().len() > 1 =>
            {
                SendState::MethodSelection
            }
            _ => SendState::Classified,
        };

        self.destination = trimmed.to_string();
        self.classification = Some(classification);
        self.error = None;
        self.set_state(next);
        Ok(())
    }

    pub fn set_amount_text(&mut self, text: &str) -> Result<(), SendError> {
        match self.state {
            SendState::Idle | SendState::Classified | SendState::MethodSelection => {
                self.amount.set_display_text(text);
                Ok(())
            }
            SendState::Dispatching => Err(SendError::DispatchInProgress),
            from => Err(SendError::InvalidTransition {
                from,
                action: "edit the amount",
            }),
        }
    }

    pub fn toggle_unit(&mut self) -> Result<(), SendError> {
        if self.state == SendState::Dispatching {
            return Err(SendError::DispatchInProgress);
        }
        self.amount.toggle_unit();
        Ok(())
    }

    /// Updates the exchange-rate snapshot. Read-only market data, accepted
    /// in any state.
    pub fn set_rate(&mut self, fiat_per_btc: Option<u64>) {
        self.amount.set_rate(fiat_per_btc);
    }

    pub fn set_comment(&mut self, comment: Option<String>) -> Result<(), SendError> {
        if self.state == SendState::Dispatching {
            return Err(SendError::DispatchInProgress);
        }
        self.comment = comment;
        Ok(())
    }

    pub fn available_methods(&self) -> Vec<SendMethod> {
        match &self.classification {
            Some(Classification::UnifiedMultiMethod(payload)) => payload.available_methods(),
            _ => Vec::new(),
        }
    }

    /// Picks a sub-method of a multi-method destination. Explicit user
    /// action only; no network activity.
    pub fn select_method(&mut self, method: SendMethod) -> Result<(), SendError> {
        match self.state {
            SendState::Classified | SendState::MethodSelection => {}
            SendState::Dispatching => return Err(SendError::DispatchInProgress),
            from => {
                return Err(SendError::InvalidTransition {
                    from,
                    action: "select a payment method",
                })
            }
        }
        match &self.classification {
            Some(Classification::UnifiedMultiMethod(payload))
                if payload.available_methods().contains(&method) =>
            {
                self.selected_method = Some(method);
                Ok(())
            }
            _ => Err(SendError::MethodNotAvailable),
        }
    }

    /// Moves to `Confirming`. Requires a recognized destination and a
    /// positive amount; a rejection surfaces a message without changing
    /// state.
    pub fn begin_confirmation(&mut self) -> Result<(), SendError> {
        match self.state {
            SendState::Classified | SendState::MethodSelection => {}
            SendState::Dispatching => return Err(SendError::DispatchInProgress),
            from => {
                return Err(SendError::InvalidTransition {
                    from,
                    action: "confirm",
                })
            }
        }

        let recognized = self
            .classification
            .as_ref()
            .map(|classification| !classification.is_unrecognized())
            .unwrap_or(false);
        if !recognized {
            return Err(SendError::ConfirmationRejected {
                reason: "the destination is not a recognized payment format".to_string(),
            });
        }
        if self.amount.amount_sats().is_none() {
            return Err(SendError::ConfirmationRejected {
                reason: "the amount must be a positive number of sats".to_string(),
            });
        }

        self.set_state(SendState::Confirming);
        Ok(())
    }

    /// Backs out of confirmation with every field intact.
    pub fn cancel_confirmation(&mut self) -> Result<(), SendError> {
        match self.state {
            SendState::Confirming => {
                let back = match &self.classification {
                    Some(Classification::UnifiedMultiMethod(payload))
                        if payload.available_methods().len() > 1 =>
                    {
                        SendState::MethodSelection
                    }
                    _ => SendState::Classified,
                };
                self.set_state(back);
                Ok(())
            }
            SendState::Dispatching => Err(SendError::DispatchInProgress),
            from => Err(SendError::InvalidTransition {
                from,
                action: "cancel",
            }),
        }
    }

    /// The confirmation-sheet summary of what [`dispatch`] would do.
    ///
    /// [`dispatch`]: SendAttempt::dispatch
    pub fn preview(&self) -> Result<PaymentPreview, SendError> {
        if self.state != SendState::Confirming {
            return Err(SendError::InvalidTransition {
                from: self.state,
                action: "preview",
            });
        }
        let (rail, destination, _) = self.resolve_dispatch()?;
        let amount_sats = self.amount.amount_sats().ok_or_else(|| {
            SendError::ConfirmationRejected {
                reason: "the amount must be a positive number of sats".to_string(),
            }
        })?;

        let (payment_hash, network) = if rail == Rail::Bolt11 {
            match Bolt11Invoice::from_str(&destination) {
                Ok(invoice) => (
                    Some(invoice.payment_hash().to_string()),
                    Some(invoice.network().to_string()),
                ),
                Err(_) => (None, None),
            }
        } else {
            (None, None)
        };

        Ok(PaymentPreview {
            rail,
            destination,
            amount_sats,
            fiat_text: self.amount.fiat_text(),
            payment_hash,
            network,
        })
    }

    /// The single asynchronous step: exactly one rail-specific engine call.
    ///
    /// On success the normalized record is written to history before the
    /// state turns terminal; on any engine rejection nothing is recorded and
    /// the state is `Failed`. No automatic retry either way.
    pub async fn dispatch(&mut self) -> Result<PaymentResultRecord, SendError> {
        match self.state {
            SendState::Confirming => {}
            SendState::Dispatching => return Err(SendError::DispatchInProgress),
            from => {
                return Err(SendError::InvalidTransition {
                    from,
                    action: "dispatch",
                })
            }
        }

        let (rail, destination, amount_arg) = self.resolve_dispatch()?;
        let dispatched_sats = self.amount.amount_sats();
        let comment = self.comment.clone();

        self.set_state(SendState::Dispatching);
        self.info(format!(
            "dispatching {rail} payment to {}",
            short_destination(&destination)
        ));

        let outcome = match rail {
            Rail::Onchain => self
                .engine
                .send_onchain(destination.clone(), amount_arg, comment.clone())
                .await
                .map(RailResult::Onchain),
            Rail::Bolt11 => self
                .engine
                .send_bolt11(destination.clone(), amount_arg, comment.clone())
                .await
                .map(RailResult::Bolt11),
            Rail::LightningAddress => self
                .engine
                .send_lightning_address(destination.clone(), amount_arg, comment.clone())
                .await
                .map(RailResult::LightningAddress),
            Rail::Ark => self
                .engine
                .send_ark(destination.clone(), amount_arg, comment.clone())
                .await
                .map(RailResult::Ark),
        };

        let rail_result = match outcome {
            Ok(result) => result,
            Err(err) => {
                let message = dispatch_error_message(&err);
                return Err(self.fail(SendError::Dispatch { message }));
            }
        };

        let record = match normalize(rail, rail_result, dispatched_sats, &destination, comment) {
            Ok(record) => record,
            Err(err) => return Err(self.fail(err)),
        };

        // a history write failure must not fail a payment that settled
        if let Err(err) = self.history.record(record.clone()).await {
            self.error_log(format!("could not record payment in history: {err:#}"));
        }

        self.info(format!(
            "payment complete: {}",
            serde_json::to_string(&record).unwrap_or_default()
        ));
        self.result = Some(record.clone());
        self.set_state(SendState::Succeeded);
        self.events
            .publish(WalletEvent::Send(SendEventKind::DispatchSucceeded(
                record.clone(),
            )));
        Ok(record)
    }

    /// Returns a failed attempt to `Classified` with the destination and
    /// amount intact, so the user can try again without re-typing.
    pub fn retry(&mut self) -> Result<(), SendError> {
        if self.state != SendState::Failed {
            return Err(SendError::InvalidTransition {
                from: self.state,
                action: "retry",
            });
        }
        self.error = None;
        self.set_state(SendState::Classified);
        Ok(())
    }

    /// The explicit done/reset action: clears destination, classification,
    /// amount, and outcome in one step and returns to `Idle`.
    pub fn reset(&mut self) -> Result<(), SendError> {
        if self.state == SendState::Dispatching {
            return Err(SendError::DispatchInProgress);
        }
        self.destination.clear();
        self.classification = None;
        self.selected_method = None;
        self.amount.clear();
        self.comment = None;
        self.error = None;
        self.result = None;
        self.set_state(SendState::Idle);
        Ok(())
    }

    /// Resolves the rail, the destination string to hand the engine, and
    /// the amount argument (`None` when the destination fixes the amount
    /// itself, as a fully specified invoice does).
    fn resolve_dispatch(&self) -> Result<(Rail, String, Option<u64>), SendError> {
        let amount_sats =
            self.amount
                .amount_sats()
                .ok_or_else(|| SendError::ConfirmationRejected {
                    reason: "the amount must be a positive number of sats".to_string(),
                })?;
        let classification =
            self.classification
                .as_ref()
                .ok_or_else(|| SendError::ConfirmationRejected {
                    reason: "no destination has been entered".to_string(),
                })?;

        match classification {
            Classification::Onchain { address } => {
                Ok((Rail::Onchain, address.clone(), Some(amount_sats)))
            }
            Classification::LightningInvoice {
                invoice,
                amount_editable,
                ..
            } => {
                let amount_arg = if *amount_editable {
                    Some(amount_sats)
                } else {
                    None
                };
                Ok((Rail::Bolt11, invoice.clone(), amount_arg))
            }
            Classification::LightningAddress { address } => {
                Ok((Rail::LightningAddress, address.clone(), Some(amount_sats)))
            }
            Classification::ArkIdentifier { id } => {
                Ok((Rail::Ark, id.clone(), Some(amount_sats)))
            }
            Classification::UnifiedMultiMethod(payload) => {
                let method = self
                    .selected_method
                    .unwrap_or_else(|| payload.default_method());
                let destination = payload
                    .destination_for(method)
                    .ok_or(SendError::MethodNotAvailable)?
                    .to_string();
                match method {
                    SendMethod::Onchain => Ok((Rail::Onchain, destination, Some(amount_sats))),
                    SendMethod::Ark => Ok((Rail::Ark, destination, Some(amount_sats))),
                    SendMethod::Lightning => {
                        let amount_arg = if invoice_has_fixed_amount(&destination) {
                            None
                        } else {
                            Some(amount_sats)
                        };
                        Ok((Rail::Bolt11, destination, amount_arg))
                    }
                }
            }
            Classification::Unrecognized { .. } => Err(SendError::ConfirmationRejected {
                reason: "the destination is not a recognized payment format".to_string(),
            }),
        }
    }

    fn fail(&mut self, err: SendError) -> SendError {
        self.error_log(err.to_string());
        self.error = Some(err.clone());
        self.set_state(SendState::Failed);
        self.events
            .publish(WalletEvent::Send(SendEventKind::DispatchFailed(
                err.to_string(),
            )));
        err
    }

    fn set_state(&mut self, next: SendState) {
        self.state = next;
        self.events
            .publish(WalletEvent::Send(SendEventKind::StateChanged(next)));
    }

    fn info(&self, message: impl Into<String>) {
        self.events
            .publish(WalletEvent::Log(LogLevel::Info, message.into()));
    }

    fn warn(&self, message: impl Into<String>) {
        self.events
            .publish(WalletEvent::Log(LogLevel::Warn, message.into()));
    }

    fn error_log(&self, message: impl Into<String>) {
        self.events
            .publish(WalletEvent::Log(LogLevel::Error, message.into()));
    }
}

fn dispatch_error_message(err: &anyhow::Error) -> String {
    let message = err.to_string();
    if message.trim().is_empty() {
        "the payment could not be completed".to_string()
    } else {
        message
    }
}
