//! Checkout steps and the step watermark.

use std::fmt;

/// One step of the checkout flow, in order.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum CheckoutStep {
    #[default]
    CartReview = 1,
    PatientInfo = 2,
    AddressTime = 3,
    Payment = 4,
    Confirmation = 5,
}

impl CheckoutStep {
    /// Every step, first to last.
    pub const ALL: [Self; 5] = [
        Self::CartReview,
        Self::PatientInfo,
        Self::AddressTime,
        Self::Payment,
        Self::Confirmation,
    ];

    /// 1-based step number.
    #[must_use]
    pub const fn number(self) -> u8 {
        self as u8
    }

    /// Step with the given 1-based number.
    #[must_use]
    pub const fn from_number(n: u8) -> Option<Self> {
        match n {
            1 => Some(Self::CartReview),
            2 => Some(Self::PatientInfo),
            3 => Some(Self::AddressTime),
            4 => Some(Self::Payment),
            5 => Some(Self::Confirmation),
            _ => None,
        }
    }

    /// The following step; the last step is its own successor.
    #[must_use]
    pub const fn next(self) -> Self {
        match self {
            Self::CartReview => Self::PatientInfo,
            Self::PatientInfo => Self::AddressTime,
            Self::AddressTime => Self::Payment,
            Self::Payment | Self::Confirmation => Self::Confirmation,
        }
    }

    /// The preceding step; the first step is its own predecessor.
    #[must_use]
    pub const fn previous(self) -> Self {
        match self {
            Self::CartReview | Self::PatientInfo => Self::CartReview,
            Self::AddressTime => Self::PatientInfo,
            Self::Payment => Self::AddressTime,
            Self::Confirmation => Self::Payment,
        }
    }

    /// No forward transition leaves this step.
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Confirmation)
    }

    /// Heading shown for the step.
    #[must_use]
    pub const fn title(self) -> &'static str {
        match self {
            Self::CartReview => "Cart Review",
            Self::PatientInfo => "Patient Info",
            Self::AddressTime => "Address & Time",
            Self::Payment => "Payment",
            Self::Confirmation => "Confirmation",
        }
    }
}

impl fmt::Display for CheckoutStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}. {}", self.number(), self.title())
    }
}

/// Current step plus the highest step reached so far.
///
/// `current <= highest` always holds and `highest` never decreases until
/// [`reset`](Self::reset).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StepTracker {
    current: CheckoutStep,
    highest: CheckoutStep,
}

impl StepTracker {
    /// Start at step 1.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Current step.
    #[must_use]
    pub const fn current(&self) -> CheckoutStep {
        self.current
    }

    /// Highest step reached.
    #[must_use]
    pub const fn highest_reached(&self) -> CheckoutStep {
        self.highest
    }

    /// Move one step forward, capped at the last step.
    pub fn advance(&mut self) -> CheckoutStep {
        self.current = self.current.next();
        self.highest = self.highest.max(self.current);
        self.current
    }

    /// Move one step back, floored at the first step.
    pub fn retreat(&mut self) -> CheckoutStep {
        self.current = self.current.previous();
        self.current
    }

    /// Go to `target` if it has been reached before. Returns whether the
    /// jump happened.
    pub fn jump_to(&mut self, target: CheckoutStep) -> bool {
        if target > self.highest {
            return false;
        }
        self.current = target;
        true
    }

    /// Back to step 1 with a fresh watermark.
    pub fn reset(&mut self) {
        *self = Self::default();
    }
}
