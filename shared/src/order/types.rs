//! Order enumerations persisted as small integers

use serde::{Deserialize, Serialize};
use std::fmt;

/// Order lifecycle state
///
/// Stored and serialized as a small integer (`created = 1` .. `cancelled = 4`)
/// so that rows written by older clients stay readable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(into = "u8", try_from = "u8")]
#[repr(u8)]
pub enum OrderState {
    Created = 1,
    Confirmed = 2,
    Delivered = 3,
    Cancelled = 4,
}

impl OrderState {
    /// Display label (`"created"`, `"confirmed"`, ...)
    pub const fn label(&self) -> &'static str {
        match self {
            OrderState::Created => "created",
            OrderState::Confirmed => "confirmed",
            OrderState::Delivered => "delivered",
            OrderState::Cancelled => "cancelled",
        }
    }

    /// Terminal states never accept another transition
    pub const fn is_terminal(&self) -> bool {
        matches!(self, OrderState::Delivered | OrderState::Cancelled)
    }
}

impl fmt::Display for OrderState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl From<OrderState> for u8 {
    #[inline]
    fn from(state: OrderState) -> Self {
        state as u8
    }
}

impl TryFrom<u8> for OrderState {
    type Error = InvalidEnumValue;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            1 => Ok(OrderState::Created),
            2 => Ok(OrderState::Confirmed),
            3 => Ok(OrderState::Delivered),
            4 => Ok(OrderState::Cancelled),
            _ => Err(InvalidEnumValue {
                kind: "order state",
                value,
            }),
        }
    }
}

/// Payment method chosen at creation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(into = "u8", try_from = "u8")]
#[repr(u8)]
pub enum PaymentType {
    Cash = 1,
    Credit = 2,
}

impl fmt::Display for PaymentType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PaymentType::Cash => f.write_str("cash"),
            PaymentType::Credit => f.write_str("credit"),
        }
    }
}

impl From<PaymentType> for u8 {
    #[inline]
    fn from(payment: PaymentType) -> Self {
        payment as u8
    }
}

impl TryFrom<u8> for PaymentType {
    type Error = InvalidEnumValue;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            1 => Ok(PaymentType::Cash),
            2 => Ok(PaymentType::Credit),
            _ => Err(InvalidEnumValue {
                kind: "payment type",
                value,
            }),
        }
    }
}

/// Unknown integer for one of the enums above
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("invalid {kind}: {value}")]
pub struct InvalidEnumValue {
    pub kind: &'static str,
    pub value: u8,
}
