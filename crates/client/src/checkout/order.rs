//! Order payloads and confirmations.

use medibook_core::{OrderId, PaymentMethod, Price};

use crate::api::{CartItem, Identity, OrderLine, PatientInfo, PlaceOrderRequest};

/// Shown when the server rejects an order without saying why.
pub const GENERIC_ORDER_FAILURE: &str = "Failed to place order. Please try again.";

/// Build the order body from a snapshot of the cart and patient details.
///
/// A blank patient email falls back to the account email. Placement
/// validates the email first, so only direct callers reach that fallback.
/// The total is recomputed from the snapshot lines.
pub(crate) fn build_request(
    identity: &Identity,
    patient: &PatientInfo,
    items: &[CartItem],
    payment_method: PaymentMethod,
) -> PlaceOrderRequest {
    let mut patient_info = patient.clone();
    if patient_info.email.trim().is_empty() {
        patient_info.email = identity.email.as_str().to_owned();
    }

    let cart_items: Vec<OrderLine> = items.iter().map(OrderLine::from).collect();
    let total_price = cart_items.iter().map(|line| line.price).sum();

    PlaceOrderRequest {
        user_id: identity.user_key().to_owned(),
        patient_info,
        cart_items,
        total_price,
        payment_method,
    }
}

/// What was ordered, captured when the order went through.
///
/// Independent of the live cart, which is emptied right after.
/// Only produced by a successful placement.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrderConfirmation {
    order_id: OrderId,
    user_key: String,
    patient: PatientInfo,
    lines: Vec<OrderLine>,
    total: Price,
    payment_method: PaymentMethod,
}

impl OrderConfirmation {
    pub(crate) fn new(order_id: OrderId, request: PlaceOrderRequest) -> Self {
        Self {
            order_id,
            user_key: request.user_id,
            patient: request.patient_info,
            lines: request.cart_items,
            total: request.total_price,
            payment_method: request.payment_method,
        }
    }

    #[must_use]
    pub const fn order_id(&self) -> &OrderId {
        &self.order_id
    }

    /// Owner of the cart the order was placed from.
    #[must_use]
    pub fn user_key(&self) -> &str {
        &self.user_key
    }

    #[must_use]
    pub const fn patient(&self) -> &PatientInfo {
        &self.patient
    }

    #[must_use]
    pub fn lines(&self) -> &[OrderLine] {
        &self.lines
    }

    #[must_use]
    pub const fn total(&self) -> Price {
        self.total
    }

    #[must_use]
    pub const fn payment_method(&self) -> PaymentMethod {
        self.payment_method
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::indexing_slicing)]
mod tests {
    use medibook_core::{Email, TestId, UserId};

    use super::*;
    use crate::api::DEFAULT_LAB;

    fn identity() -> Identity {
        Identity {
            id: UserId::new("u1"),
            email: Email::parse("jane@example.com").unwrap(),
            display_name: Some("Jane".into()),
            photo_url: None,
        }
    }

    fn item(id: &str, price: u64, lab: Option<&str>) -> CartItem {
        CartItem {
            test_id: TestId::new(id),
            name: format!("Test {id}"),
            lab: lab.map(str::to_owned),
            price: Some(Price::new(price)),
            category: None,
            description: None,
        }
    }

    #[test]
    fn test_total_is_sum_of_snapshot() {
        let items = [item("a", 100, None), item("b", 200, Some("Metro Labs"))];
        let request = build_request(
            &identity(),
            &PatientInfo::default(),
            &items,
            PaymentMethod::CashOnCollection,
        );
        assert_eq!(request.total_price, Price::new(300));
        assert_eq!(request.cart_items.len(), 2);
        assert_eq!(request.cart_items[0].lab, DEFAULT_LAB);
        assert_eq!(request.cart_items[1].lab, "Metro Labs");
        assert_eq!(request.cart_items[0].test_name, "Test a");
        assert_eq!(request.user_id, "jane@example.com");
    }

    #[test]
    fn test_blank_email_falls_back_to_account() {
        let patient = PatientInfo {
            email: "  ".into(),
            ..PatientInfo::default()
        };
        let request = build_request(&identity(), &patient, &[], PaymentMethod::CashOnCollection);
        assert_eq!(request.patient_info.email, "jane@example.com");

        let patient = PatientInfo {
            email: "father@example.com".into(),
            ..PatientInfo::default()
        };
        let request = build_request(&identity(), &patient, &[], PaymentMethod::CashOnCollection);
        assert_eq!(request.patient_info.email, "father@example.com");
    }

    #[test]
    fn test_confirmation_keeps_snapshot() {
        let items = [item("a", 100, None)];
        let request = build_request(
            &identity(),
            &PatientInfo::default(),
            &items,
            PaymentMethod::CashOnCollection,
        );
        let confirmation = OrderConfirmation::new(OrderId::new("ord-1"), request);
        assert_eq!(confirmation.order_id().as_str(), "ord-1");
        assert_eq!(confirmation.user_key(), "jane@example.com");
        assert_eq!(confirmation.total(), Price::new(100));
        assert_eq!(confirmation.lines().len(), 1);
    }
}
