//! acr-schemas
//!
//! Shared domain types for the accrual reconciler: order identity, local
//! order status, statuses reported by the accrual service, and fixed-point
//! money. No IO lives here.

mod money;

use std::fmt;

use serde::{Deserialize, Serialize};

pub use money::{Micros, MoneyError, MICROS_SCALE};

// ---------------------------------------------------------------------------
// OrderNumber
// ---------------------------------------------------------------------------

/// Externally assigned order identifier: a non-empty string of ASCII digits.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct OrderNumber(String);

impl OrderNumber {
    pub fn parse(s: &str) -> Result<Self, OrderNumberError> {
        if s.is_empty() {
            return Err(OrderNumberError::Empty);
        }
        if !s.chars().all(|c| c.is_ascii_digit()) {
            return Err(OrderNumberError::NonDigit { raw: s.to_string() });
        }
        Ok(OrderNumber(s.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for OrderNumber {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl TryFrom<String> for OrderNumber {
    type Error = OrderNumberError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        OrderNumber::parse(&value)
    }
}

impl From<OrderNumber> for String {
    fn from(value: OrderNumber) -> Self {
        value.0
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OrderNumberError {
    Empty,
    NonDigit { raw: String },
}

impl fmt::Display for OrderNumberError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OrderNumberError::Empty => write!(f, "order number is empty"),
            OrderNumberError::NonDigit { raw } => {
                write!(f, "order number '{raw}' contains non-digit characters")
            }
        }
    }
}

impl std::error::Error for OrderNumberError {}

// ---------------------------------------------------------------------------
// UserId
// ---------------------------------------------------------------------------

/// Identifier of the user an order (and a balance) belongs to.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UserId(String);

impl UserId {
    pub fn new(id: impl Into<String>) -> Self {
        UserId(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

// ---------------------------------------------------------------------------
// OrderStatus (local ledger)
// ---------------------------------------------------------------------------

/// Status of an order in the local ledger.
///
/// Lifecycle: `NEW` -> `PROCESSING` -> `PROCESSED | INVALID`. Terminal
/// statuses never regress.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OrderStatus {
    New,
    Processing,
    Invalid,
    Processed,
}

impl OrderStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            OrderStatus::New => "NEW",
            OrderStatus::Processing => "PROCESSING",
            OrderStatus::Invalid => "INVALID",
            OrderStatus::Processed => "PROCESSED",
        }
    }

    pub fn parse(s: &str) -> Result<Self, UnknownOrderStatus> {
        match s {
            "NEW" => Ok(OrderStatus::New),
            "PROCESSING" => Ok(OrderStatus::Processing),
            "INVALID" => Ok(OrderStatus::Invalid),
            "PROCESSED" => Ok(OrderStatus::Processed),
            other => Err(UnknownOrderStatus(other.to_string())),
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, OrderStatus::Invalid | OrderStatus::Processed)
    }
}

impl fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnknownOrderStatus(pub String);

impl fmt::Display for UnknownOrderStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "invalid order status: {}", self.0)
    }
}

impl std::error::Error for UnknownOrderStatus {}

// ---------------------------------------------------------------------------
// OracleStatus (accrual service)
// ---------------------------------------------------------------------------

/// Status as reported by the accrual service.
///
/// Parsing never fails: anything the service invents later lands in
/// `Unrecognized` and is treated as still pending.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum OracleStatus {
    Registered,
    Processing,
    Invalid,
    Processed,
    /// The service answered 204: it has no record of the order yet.
    NotRegistered,
    Unrecognized(String),
}

impl OracleStatus {
    pub fn parse(s: &str) -> Self {
        match s {
            "REGISTERED" => OracleStatus::Registered,
            "PROCESSING" => OracleStatus::Processing,
            "INVALID" => OracleStatus::Invalid,
            "PROCESSED" => OracleStatus::Processed,
            other => OracleStatus::Unrecognized(other.to_string()),
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            OracleStatus::Registered => "REGISTERED",
            OracleStatus::Processing => "PROCESSING",
            OracleStatus::Invalid => "INVALID",
            OracleStatus::Processed => "PROCESSED",
            OracleStatus::NotRegistered => "NOT_REGISTERED",
            OracleStatus::Unrecognized(s) => s.as_str(),
        }
    }
}

impl fmt::Display for OracleStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One decoded answer from the accrual service for one order.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct OracleReport {
    pub order: OrderNumber,
    pub status: OracleStatus,
    /// Present only when the service sent an `accrual` field.
    pub accrual: Option<Micros>,
}

impl OracleReport {
    pub fn new(order: OrderNumber, status: OracleStatus, accrual: Option<Micros>) -> Self {
        Self {
            order,
            status,
            accrual,
        }
    }
}
