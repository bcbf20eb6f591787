use crate::errors::CommonError;
use chrono::{DateTime, Utc};
use std::fmt;
use std::str::FromStr;

/// Width in bytes of a currency code on the wire and in memory.
pub const CURRENCY_CODE_LEN: usize = 3;

/// A three-letter currency code such as `USD`.
///
/// Stored inline so it is `Copy` and can be used directly as a graph node.
/// Codes are normalised to upper case on construction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Currency([u8; CURRENCY_CODE_LEN]);

impl Currency {
    /// Builds a currency from raw ASCII bytes, e.g. a slice of a wire record.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, CommonError> {
        if bytes.len() != CURRENCY_CODE_LEN || !bytes.iter().all(u8::is_ascii_alphabetic) {
            return Err(CommonError::InvalidCurrency(
                String::from_utf8_lossy(bytes).into_owned(),
            ));
        }
        let mut code = [0u8; CURRENCY_CODE_LEN];
        for (slot, byte) in code.iter_mut().zip(bytes) {
            *slot = byte.to_ascii_uppercase();
        }
        Ok(Currency(code))
    }

    /// The raw code bytes.
    pub fn code(&self) -> [u8; CURRENCY_CODE_LEN] {
        self.0
    }

    pub fn as_str(&self) -> &str {
        // Construction only admits ASCII letters.
        std::str::from_utf8(&self.0).unwrap_or("???")
    }
}

impl FromStr for Currency {
    type Err = CommonError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Currency::from_bytes(s.as_bytes())
    }
}

impl fmt::Display for Currency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// An unordered pair of currencies.
///
/// `CurrencyPair::new(a, b) == CurrencyPair::new(b, a)`; the smaller code is
/// always stored first so the pair can key per-pair bookkeeping.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct CurrencyPair {
    first: Currency,
    second: Currency,
}

impl CurrencyPair {
    pub fn new(a: Currency, b: Currency) -> Self {
        if a <= b {
            CurrencyPair { first: a, second: b }
        } else {
            CurrencyPair { first: b, second: a }
        }
    }

    pub fn first(&self) -> Currency {
        self.first
    }

    pub fn second(&self) -> Currency {
        self.second
    }

    pub fn contains(&self, currency: Currency) -> bool {
        self.first == currency || self.second == currency
    }
}

impl fmt::Display for CurrencyPair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {})", self.first, self.second)
    }
}

/// A single exchange-rate observation: one unit of `from` buys `rate` units of `to`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Quote {
    pub timestamp: DateTime<Utc>,
    pub from: Currency,
    pub to: Currency,
    pub rate: f64,
}

impl Quote {
    /// Creates a validated quote.
    pub fn new(
        timestamp: DateTime<Utc>,
        from: Currency,
        to: Currency,
        rate: f64,
    ) -> Result<Self, CommonError> {
        let quote = Quote {
            timestamp,
            from,
            to,
            rate,
        };
        quote.validate()?;
        Ok(quote)
    }

    /// Checks that the rate is a positive finite number and that the quote
    /// converts between two distinct currencies.
    pub fn validate(&self) -> Result<(), CommonError> {
        if !self.rate.is_finite() || self.rate <= 0.0 {
            return Err(CommonError::InvalidRate(self.rate));
        }
        if self.from == self.to {
            return Err(CommonError::InvalidQuote(format!(
                "{} cannot be quoted against itself",
                self.from
            )));
        }
        Ok(())
    }

    pub fn pair(&self) -> CurrencyPair {
        CurrencyPair::new(self.from, self.to)
    }
}

impl fmt::Display for Quote {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} {} {} {}",
            self.timestamp.format("%Y-%m-%d %H:%M:%S%.6f"),
            self.from,
            self.to,
            self.rate
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn usd() -> Currency {
        "USD".parse().unwrap()
    }

    fn eur() -> Currency {
        "EUR".parse().unwrap()
    }

    #[test]
    fn test_currency_from_str_normalises_case() {
        let currency: Currency = "gbp".parse().unwrap();
        assert_eq!(currency.as_str(), "GBP");
        assert_eq!(format!("{}", currency), "GBP");
        assert_eq!(currency.code(), *b"GBP");
    }

    #[test]
    fn test_currency_rejects_bad_codes() {
        assert!("US".parse::<Currency>().is_err());
        assert!("USDT".parse::<Currency>().is_err());
        assert!("U$D".parse::<Currency>().is_err());
        assert_eq!(
            Currency::from_bytes(&[0xff, b'A', b'B']),
            Err(CommonError::InvalidCurrency("\u{fffd}AB".to_string()))
        );
    }

    #[test]
    fn test_currency_ordering_is_lexicographic() {
        let aud: Currency = "AUD".parse().unwrap();
        assert!(aud < eur());
        assert!(eur() < usd());
    }

    #[test]
    fn test_currency_pair_is_unordered() {
        assert_eq!(CurrencyPair::new(usd(), eur()), CurrencyPair::new(eur(), usd()));
        let pair = CurrencyPair::new(usd(), eur());
        assert_eq!(pair.first(), eur());
        assert_eq!(pair.second(), usd());
        assert!(pair.contains(usd()));
        assert_eq!(format!("{}", pair), "(EUR, USD)");
    }

    #[test]
    fn test_quote_validation() {
        let ts = Utc.with_ymd_and_hms(2020, 10, 1, 12, 0, 0).unwrap();
        assert!(Quote::new(ts, usd(), eur(), 0.9).is_ok());
        assert_eq!(
            Quote::new(ts, usd(), eur(), 0.0),
            Err(CommonError::InvalidRate(0.0))
        );
        assert!(Quote::new(ts, usd(), eur(), -0.9).is_err());
        assert!(Quote::new(ts, usd(), eur(), f64::NAN).is_err());
        assert!(Quote::new(ts, usd(), eur(), f64::INFINITY).is_err());
        assert!(matches!(
            Quote::new(ts, usd(), usd(), 1.0),
            Err(CommonError::InvalidQuote(_))
        ));
    }

    #[test]
    fn test_quote_display() {
        let ts = Utc.with_ymd_and_hms(2020, 10, 1, 12, 0, 0).unwrap()
            + chrono::Duration::microseconds(1234);
        let quote = Quote::new(ts, usd(), eur(), 0.9).unwrap();
        assert_eq!(
            format!("{}", quote),
            "2020-10-01 12:00:00.001234 USD EUR 0.9"
        );
        assert_eq!(quote.pair(), CurrencyPair::new(eur(), usd()));
    }
}
