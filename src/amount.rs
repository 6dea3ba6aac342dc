use serde::{Deserialize, Serialize};

pub const SATS_PER_BTC: u64 = 100_000_000;

/// The two mutually exclusive units the amount field can display in.
#[derive(Clone, Copy, Eq, PartialEq, Serialize, Debug)]
pub enum DisplayUnit {
    Sats,
    Fiat,
}

#[derive(Clone, Copy, Eq, PartialEq, Serialize, Deserialize, Debug)]
pub enum FiatCurrency {
    Usd,
    Eur,
    Gbp,
    Cad,
    Chf,
    Aud,
    Jpy,
}

impl FiatCurrency {
    pub fn symbol(&self) -> &'static str {
        match self {
            FiatCurrency::Usd => "$",
            FiatCurrency::Eur => "€",
            FiatCurrency::Gbp => "£",
            FiatCurrency::Cad => "C$",
            FiatCurrency::Chf => "CHF",
            FiatCurrency::Aud => "A$",
            FiatCurrency::Jpy => "¥",
        }
    }
}

/// The user-facing amount field.
///
/// Holds the last confirmed amount in sats and re-renders the display text
/// from it on every unit toggle, so the intended spend value never changes
/// silently. The exchange rate is a nullable snapshot pushed in from the
/// market-data side; fiat entry is deferred until a rate exists. When the
/// destination format fixes an amount the field is locked and user edits are
/// ignored entirely.
#[derive(Clone, Debug)]
pub struct AmountEngine {
    raw_text: String,
    unit: DisplayUnit,
    currency: FiatCurrency,
    base_sats: Option<u64>,
    locked_sats: Option<u64>,
    btc_price: Option<u64>,
}

impl AmountEngine {
    pub fn new(currency: FiatCurrency) -> Self {
        Self {
            raw_text: String::new(),
            unit: DisplayUnit::Sats,
            currency,
            base_sats: None,
            locked_sats: None,
            btc_price: None,
        }
    }

    /// Updates the exchange-rate snapshot (whole fiat units per coin). A
    /// fiat amount typed while no rate was available converts now.
    pub fn set_rate(&mut self, fiat_per_btc: Option<u64>) {
        self.btc_price = fiat_per_btc;
        if self.unit == DisplayUnit::Fiat && self.locked_sats.is_none() && self.base_sats.is_none()
        {
            if let Some(price) = self.btc_price {
                self.base_sats = parse_fiat_to_sats(&self.raw_text, price);
            }
        }
    }

    pub fn rate(&self) -> Option<u64> {
        self.btc_price
    }

    /// Fixes the amount to a format-supplied value. Until [`unlock`] is
    /// called, edits are ignored and [`amount_sats`] returns this value
    /// regardless of the display text.
    ///
    /// [`unlock`]: AmountEngine::unlock
    /// [`amount_sats`]: AmountEngine::amount_sats
    pub fn lock(&mut self, sats: u64) {
        self.locked_sats = Some(sats);
        self.base_sats = Some(sats);
        self.raw_text = self.render(sats);
    }

    pub fn unlock(&mut self) {
        self.locked_sats = None;
    }

    pub fn is_locked(&self) -> bool {
        self.locked_sats.is_some()
    }

    pub fn clear(&mut self) {
        self.raw_text.clear();
        self.base_sats = None;
        self.locked_sats = None;
    }

    /// Records a user edit. Parses once, in the active unit, into the
    /// confirmed base amount; unparseable text just means no amount yet.
    pub fn set_display_text(&mut self, text: &str) {
        if self.locked_sats.is_some() {
            return;
        }
        self.raw_text = text.to_string();
        self.base_sats = match self.unit {
            DisplayUnit::Sats => parse_sats(text),
            DisplayUnit::Fiat => self
                .btc_price
                .and_then(|price| parse_fiat_to_sats(text, price)),
        };
    }

    /// Switches the display unit and re-renders the text from the confirmed
    /// base amount under the current rate snapshot. The conversion is
    /// one-directional per toggle: the display text is never re-parsed, so a
    /// fiat-entered value can drift by a rounding step across toggles.
    pub fn toggle_unit(&mut self) {
        self.unit = match self.unit {
            DisplayUnit::Sats => DisplayUnit::Fiat,
            DisplayUnit::Fiat => DisplayUnit::Sats,
        };
        self.raw_text = match self.effective_sats() {
            Some(sats) => self.render(sats),
            None => String::new(),
        };
    }

    /// The amount that would be dispatched, in sats. `None` until the field
    /// holds a positive value (or a lock supplies one).
    pub fn amount_sats(&self) -> Option<u64> {
        self.effective_sats().filter(|&sats| sats > 0)
    }

    pub fn display_text(&self) -> &str {
        &self.raw_text
    }

    pub fn display_unit(&self) -> DisplayUnit {
        self.unit
    }

    pub fn currency(&self) -> FiatCurrency {
        self.currency
    }

    /// The fiat rendering of the current amount, for previews. `None` when
    /// no rate snapshot or no amount is available.
    pub fn fiat_text(&self) -> Option<String> {
        let sats = self.effective_sats()?;
        let price = self.btc_price?;
        Some(format!("{}{}", self.currency.symbol(), format_fiat(sats, price)))
    }

    fn effective_sats(&self) -> Option<u64> {
        self.locked_sats.or(self.base_sats)
    }

    fn render(&self, sats: u64) -> String {
        match self.unit {
            DisplayUnit::Sats => sats.to_string(),
            DisplayUnit::Fiat => match self.btc_price {
                Some(price) => format_fiat(sats, price),
                None => String::new(),
            },
        }
    }
}

fn parse_sats(text: &str) -> Option<u64> {
    text.trim().parse::<u64>().ok()
}

fn parse_fiat_to_sats(text: &str, price: u64) -> Option<u64> {
    let value = text.trim().parse::<f64>().ok()?;
    if !value.is_finite() || value < 0.0 || price == 0 {
        return None;
    }
    Some(((value / price as f64) * SATS_PER_BTC as f64).round() as u64)
}

fn format_fiat(sats: u64, price: u64) -> String {
    format!("{:.2}", sats as f64 / SATS_PER_BTC as f64 * price as f64)
}

#[cfg(test)]
mod tests {
    use super::{AmountEngine, DisplayUnit, FiatCurrency};

    #[test]
    fn sats_entry_round_trips_exactly_through_a_toggle() {
        let mut engine = AmountEngine::new(FiatCurrency::Usd);
        engine.set_rate(Some(100_000));
        engine.set_display_text("1234");
        assert_eq!(engine.amount_sats(), Some(1234));

        engine.toggle_unit();
        assert_eq!(engine.display_unit(), DisplayUnit::Fiat);
        assert_eq!(engine.display_text(), "1.23");
        // the base amount is untouched by rendering
        assert_eq!(engine.amount_sats(), Some(1234));

        engine.toggle_unit();
        assert_eq!(engine.display_text(), "1234");
        assert_eq!(engine.amount_sats(), Some(1234));
    }

    #[test]
    fn fiat_entry_may_drift_by_a_rounding_step() {
        let mut engine = AmountEngine::new(FiatCurrency::Usd);
        engine.set_rate(Some(67_123));
        engine.toggle_unit();
        engine.set_display_text("10.00");

        // $10.00 at $67,123/coin is 14898.6... sats, confirmed as 14899
        assert_eq!(engine.amount_sats(), Some(14899));

        engine.toggle_unit();
        engine.toggle_unit();
        // re-rendered from the confirmed base, not re-parsed: within a cent
        let rendered: f64 = engine.display_text().parse().unwrap();
        assert!((rendered - 10.00).abs() < 0.01);
    }

    #[test]
    fn locked_amounts_ignore_edits() {
        let mut engine = AmountEngine::new(FiatCurrency::Usd);
        engine.lock(50_000);
        assert_eq!(engine.amount_sats(), Some(50_000));
        assert_eq!(engine.display_text(), "50000");

        engine.set_display_text("1");
        assert_eq!(engine.amount_sats(), Some(50_000));
        assert_eq!(engine.display_text(), "50000");

        engine.unlock();
        engine.set_display_text("777");
        assert_eq!(engine.amount_sats(), Some(777));
    }

    #[test]
    fn invalid_or_zero_input_yields_no_amount() {
        let mut engine = AmountEngine::new(FiatCurrency::Usd);
        engine.set_display_text("not a number");
        assert_eq!(engine.amount_sats(), None);

        engine.set_display_text("0");
        assert_eq!(engine.amount_sats(), None);

        engine.set_display_text("-5");
        assert_eq!(engine.amount_sats(), None);
    }

    #[test]
    fn fiat_entry_is_deferred_until_a_rate_arrives() {
        let mut engine = AmountEngine::new(FiatCurrency::Eur);
        engine.toggle_unit();
        engine.set_display_text("25.00");
        assert_eq!(engine.amount_sats(), None);

        engine.set_rate(Some(50_000));
        assert_eq!(engine.amount_sats(), Some(50_000));
    }

    #[test]
    fn fiat_text_for_previews() {
        let mut engine = AmountEngine::new(FiatCurrency::Usd);
        engine.set_display_text("100000");
        assert_eq!(engine.fiat_text(), None);

        engine.set_rate(Some(100_000));
        assert_eq!(engine.fiat_text().as_deref(), Some("$100.00"));
    }
}
