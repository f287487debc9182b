//! Transaction records and the value types they are built from.
//!
//! A [`Transaction`] is created once by the initiator with status
//! [`TxStatus::Pending`] and thereafter mutated only through the store's
//! compare-and-set primitive. [`TxStatus::Paid`] and [`TxStatus::Failed`]
//! are terminal: no transition ever leaves them.

use std::fmt::{self, Display, Formatter};
use std::str::FromStr;
use std::sync::LazyLock;
use std::time::{Instant, SystemTime};

use rand::distr::{Alphanumeric, SampleString};
use regex::Regex;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::error::ValidationError;

/// Mozambican mobile numbers: a fixed operator prefix followed by exactly
/// seven digits.
static MSISDN_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(84|85|86|87)\d{7}$").expect("valid msisdn pattern"));

/// Number of random alphanumeric characters appended to a generated reference.
const REFERENCE_SUFFIX_LEN: usize = 4;

/// Unique identifier correlating an initiated payment with its eventual
/// confirmation.
///
/// Generated at initiation time from a configurable prefix, the current
/// millisecond timestamp, and a short random suffix. The timestamp makes
/// references monotonically distinguishable; the suffix makes concurrent
/// initiations within the same millisecond unlikely to collide. Uniqueness
/// is still enforced by the store, never assumed from generation.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Reference(String);

impl Reference {
    /// Generates a fresh reference with the given prefix.
    ///
    /// # Panics
    ///
    /// Panics if the system clock is set before the Unix epoch.
    #[must_use]
    pub fn generate(prefix: &str) -> Self {
        let millis = SystemTime::now()
            .duration_since(SystemTime::UNIX_EPOCH)
            .expect("system clock before Unix epoch")
            .as_millis();
        let suffix = Alphanumeric.sample_string(&mut rand::rng(), REFERENCE_SUFFIX_LEN);
        Self(format!("{prefix}{millis}{suffix}"))
    }

    /// Returns the reference as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<String> for Reference {
    fn from(value: String) -> Self {
        Self(value)
    }
}

impl From<&str> for Reference {
    fn from(value: &str) -> Self {
        Self(value.to_owned())
    }
}

impl Display for Reference {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A validated payer phone number.
///
/// Only numbers matching the fixed national-operator pattern (two-digit
/// prefix from the allowed set, then seven digits) are representable.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct Msisdn(String);

impl Msisdn {
    /// Parses and validates a phone number.
    ///
    /// # Errors
    ///
    /// Returns [`ValidationError`] if the number does not match the allowed
    /// operator prefixes or digit count.
    pub fn parse(raw: &str) -> Result<Self, ValidationError> {
        let trimmed = raw.trim();
        if MSISDN_RE.is_match(trimmed) {
            Ok(Self(trimmed.to_owned()))
        } else {
            Err(ValidationError::new(
                "telefone",
                "must be an 84/85/86/87 prefix followed by seven digits",
            ))
        }
    }

    /// Returns the number as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Display for Msisdn {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Mobile-money wallet operator selected by the payer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PaymentMethod {
    /// Vodacom M-Pesa.
    Mpesa,
    /// Movitel E-Mola.
    Emola,
}

impl FromStr for PaymentMethod {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "mpesa" => Ok(Self::Mpesa),
            "emola" => Ok(Self::Emola),
            other => Err(ValidationError::new(
                "metodo",
                format!("unknown payment method '{other}'"),
            )),
        }
    }
}

impl Display for PaymentMethod {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            Self::Mpesa => write!(f, "mpesa"),
            Self::Emola => write!(f, "emola"),
        }
    }
}

/// Lifecycle state of a transaction.
///
/// `Pending` is the only initial state. `Paid` and `Failed` are terminal;
/// the store's compare-and-set refuses any transition out of them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum TxStatus {
    /// Initiated, awaiting confirmation from the gateway.
    Pending,
    /// Confirmed paid. Terminal.
    Paid,
    /// Confirmed failed. Terminal.
    Failed,
}

impl TxStatus {
    /// Returns `true` for [`Self::Paid`] and [`Self::Failed`].
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Paid | Self::Failed)
    }
}

impl Display for TxStatus {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            Self::Pending => write!(f, "PENDING"),
            Self::Paid => write!(f, "PAID"),
            Self::Failed => write!(f, "FAILED"),
        }
    }
}

/// A single payment in flight or settled.
///
/// Identity fields (`reference`, `payer_name`, `phone`, `method`, `amount`)
/// are immutable after creation. `status` is mutated only through
/// [`crate::store::TransactionStore::compare_and_set_status`]; `last_polled`
/// only through [`crate::store::TransactionStore::try_begin_poll`].
#[derive(Debug, Clone)]
pub struct Transaction {
    /// Unique correlation identifier.
    pub reference: Reference,
    /// Name the payer typed into the checkout form.
    pub payer_name: String,
    /// Validated payer phone number.
    pub phone: Msisdn,
    /// Selected wallet operator.
    pub method: PaymentMethod,
    /// Amount charged, in meticais.
    pub amount: Decimal,
    /// Current lifecycle state.
    pub status: TxStatus,
    /// Monotonic creation time, used for staleness and eviction.
    pub created_at: Instant,
    /// Wall-clock creation time, for display and logging.
    pub initiated_at: SystemTime,
    /// When the poll path last queried the gateway for this record.
    pub last_polled: Option<Instant>,
}

impl Transaction {
    /// Creates a new `Pending` transaction.
    #[must_use]
    pub fn new(
        reference: Reference,
        payer_name: impl Into<String>,
        phone: Msisdn,
        method: PaymentMethod,
        amount: Decimal,
    ) -> Self {
        Self {
            reference,
            payer_name: payer_name.into(),
            phone,
            method,
            amount,
            status: TxStatus::Pending,
            created_at: Instant::now(),
            initiated_at: SystemTime::now(),
            last_polled: None,
        }
    }
}
