//! Payment and order status enums.

use serde::{Deserialize, Serialize};

use super::patient::ParseEnumError;

/// How an order is paid for.
///
/// Only cash on sample collection is accepted today; the other methods are
/// listed so front ends can show them as coming soon.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum PaymentMethod {
    #[default]
    #[serde(rename = "cod")]
    CashOnCollection,
    Card,
    Upi,
}

impl PaymentMethod {
    /// All advertised methods, enabled or not.
    pub const ALL: [Self; 3] = [Self::CashOnCollection, Self::Card, Self::Upi];

    /// Whether orders can currently be placed with this method.
    #[must_use]
    pub const fn is_enabled(&self) -> bool {
        matches!(self, Self::CashOnCollection)
    }

    /// Display label.
    #[must_use]
    pub const fn label(&self) -> &'static str {
        match self {
            Self::CashOnCollection => "Cash on sample collection",
            Self::Card => "Credit / debit card",
            Self::Upi => "UPI",
        }
    }
}

impl std::fmt::Display for PaymentMethod {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}

impl std::str::FromStr for PaymentMethod {
    type Err = ParseEnumError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "cod" | "cash" => Ok(Self::CashOnCollection),
            "card" => Ok(Self::Card),
            "upi" => Ok(Self::Upi),
            _ => Err(ParseEnumError {
                kind: "payment method",
                value: s.to_owned(),
            }),
        }
    }
}

/// Lifecycle of a placed order as reported by the server.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum OrderStatus {
    #[default]
    Pending,
    Confirmed,
    SampleCollected,
    Completed,
    Cancelled,
    /// Any status this client does not know about yet.
    #[serde(other)]
    Unknown,
}

impl OrderStatus {
    /// Whether the order will not change any further.
    #[must_use]
    pub const fn is_final(&self) -> bool {
        matches!(self, Self::Completed | Self::Cancelled)
    }
}

impl std::fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Pending => write!(f, "pending"),
            Self::Confirmed => write!(f, "confirmed"),
            Self::SampleCollected => write!(f, "sample_collected"),
            Self::Completed => write!(f, "completed"),
            Self::Cancelled => write!(f, "cancelled"),
            Self::Unknown => write!(f, "unknown"),
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_only_cash_is_enabled() {
        let enabled: Vec<_> = PaymentMethod::ALL
            .into_iter()
            .filter(PaymentMethod::is_enabled)
            .collect();
        assert_eq!(enabled, vec![PaymentMethod::CashOnCollection]);
    }

    #[test]
    fn test_payment_method_wire_name() {
        let json = serde_json::to_string(&PaymentMethod::default()).unwrap();
        assert_eq!(json, "\"cod\"");
    }

    #[test]
    fn test_unknown_order_status_is_tolerated() {
        let status: OrderStatus = serde_json::from_str("\"on_hold\"").unwrap();
        assert_eq!(status, OrderStatus::Unknown);
        let status: OrderStatus = serde_json::from_str("\"sample_collected\"").unwrap();
        assert_eq!(status, OrderStatus::SampleCollected);
        assert!(!status.is_final());
    }
}
