//! Canonical order status codes.
//!
//! The backend stores and returns the status as a bare integer. Every code
//! outside `0..=11` is rejected at decode time, so an `Order` held in memory
//! always carries one of the twelve defined states.

use serde::{Deserialize, Serialize};

/// All states an order or subscription can occupy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
#[repr(u8)]
pub enum OrderStatus {
    /// Created, optionally paid by card, not yet submitted for approval.
    Draft = 0,
    /// Submitted, awaiting agency first approval.
    Pending = 1,
    /// Awaiting agency final approval.
    InProgress = 2,
    /// Agency-approved, awaiting TCC first approval.
    Validated = 3,
    /// Awaiting TCC final approval.
    BeingProcessed = 4,
    /// TCC-approved and processed. **Terminal.**
    Completed = 5,
    /// Awaiting IOB order execution.
    AwaitingApproval = 6,
    /// Execution in progress at the IOB.
    Ongoing = 7,
    /// Validated for less than the requested quantity.
    PartiallyValidated = 8,
    /// Validity window elapsed without completion. **Terminal.**
    Expired = 9,
    /// Failed at an approval stage. **Terminal.**
    Rejected = 10,
    /// Withdrawn by the investor or staff. **Terminal.**
    Cancelled = 11,
}

impl OrderStatus {
    pub const ALL: [OrderStatus; 12] = [
        OrderStatus::Draft,
        OrderStatus::Pending,
        OrderStatus::InProgress,
        OrderStatus::Validated,
        OrderStatus::BeingProcessed,
        OrderStatus::Completed,
        OrderStatus::AwaitingApproval,
        OrderStatus::Ongoing,
        OrderStatus::PartiallyValidated,
        OrderStatus::Expired,
        OrderStatus::Rejected,
        OrderStatus::Cancelled,
    ];

    pub fn code(self) -> u8 {
        self as u8
    }

    pub fn from_code(code: u8) -> Result<Self, UnknownStatusCode> {
        Self::ALL
            .get(code as usize)
            .copied()
            .ok_or(UnknownStatusCode(code))
    }

    /// Backend identifier, e.g. `In_Progress`.
    pub fn name(self) -> &'static str {
        match self {
            OrderStatus::Draft => "Draft",
            OrderStatus::Pending => "Pending",
            OrderStatus::InProgress => "In_Progress",
            OrderStatus::Validated => "Validated",
            OrderStatus::BeingProcessed => "Being_Processed",
            OrderStatus::Completed => "Completed",
            OrderStatus::AwaitingApproval => "Awaiting_Approval",
            OrderStatus::Ongoing => "Ongoing",
            OrderStatus::PartiallyValidated => "Partially_Validated",
            OrderStatus::Expired => "Expired",
            OrderStatus::Rejected => "Rejected",
            OrderStatus::Cancelled => "Cancelled",
        }
    }

    /// Human-readable label shown next to an order.
    pub fn label(self) -> &'static str {
        match self {
            OrderStatus::Draft => "Draft",
            OrderStatus::Pending => "Pending agency approval",
            OrderStatus::InProgress => "Pending agency final approval",
            OrderStatus::Validated => "Pending TCC approval",
            OrderStatus::BeingProcessed => "Pending TCC final approval",
            OrderStatus::Completed => "Completed",
            OrderStatus::AwaitingApproval => "Awaiting IOB execution",
            OrderStatus::Ongoing => "Execution in progress",
            OrderStatus::PartiallyValidated => "Partially validated",
            OrderStatus::Expired => "Expired",
            OrderStatus::Rejected => "Rejected",
            OrderStatus::Cancelled => "Cancelled",
        }
    }

    /// Returns `true` if no further transitions are possible.
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            OrderStatus::Completed
                | OrderStatus::Expired
                | OrderStatus::Rejected
                | OrderStatus::Cancelled
        )
    }
}

impl std::fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}({})", self.name(), self.code())
    }
}

impl TryFrom<u8> for OrderStatus {
    type Error = UnknownStatusCode;

    fn try_from(code: u8) -> Result<Self, Self::Error> {
        Self::from_code(code)
    }
}

impl From<OrderStatus> for u8 {
    fn from(s: OrderStatus) -> Self {
        s.code()
    }
}

/// A status code outside the twelve defined states.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UnknownStatusCode(pub u8);

impl std::fmt::Display for UnknownStatusCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "unknown order status code {} (expected 0..=11)", self.0)
    }
}

impl std::error::Error for UnknownStatusCode {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn codes_are_dense_and_ordered() {
        for (i, s) in OrderStatus::ALL.iter().enumerate() {
            assert_eq!(s.code() as usize, i);
            assert_eq!(OrderStatus::from_code(i as u8).unwrap(), *s);
        }
    }

    #[test]
    fn exactly_four_terminal_states() {
        let terminal: Vec<u8> = OrderStatus::ALL
            .iter()
            .filter(|s| s.is_terminal())
            .map(|s| s.code())
            .collect();
        assert_eq!(terminal, vec![5, 9, 10, 11]);
    }

    #[test]
    fn decodes_from_integer_and_rejects_unknown_codes() {
        let s: OrderStatus = serde_json::from_str("8").unwrap();
        assert_eq!(s, OrderStatus::PartiallyValidated);
        assert_eq!(serde_json::to_string(&OrderStatus::Cancelled).unwrap(), "11");

        let err = serde_json::from_str::<OrderStatus>("12").unwrap_err();
        assert!(err.to_string().contains("unknown order status code 12"));
    }

    #[test]
    fn display_carries_name_and_code() {
        assert_eq!(OrderStatus::InProgress.to_string(), "In_Progress(2)");
    }
}
