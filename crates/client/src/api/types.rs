//! Domain and wire types for the Medibook REST API.
//!
//! Field names follow the API's camelCase JSON. Response envelopes are kept
//! private to the API client where possible; the types exported here are the
//! ones the rest of the client works with.

use chrono::{DateTime, NaiveDate, Utc};
use medibook_core::price::lenient;
use medibook_core::{
    CategoryId, Email, Gender, OrderId, OrderStatus, PaymentMethod, Price, Relation, TestId,
    TimeSlot, UserId,
};
use serde::{Deserialize, Serialize};

/// Lab name used when a test does not say which lab runs it.
pub const DEFAULT_LAB: &str = "Default Lab";

// =============================================================================
// Identity
// =============================================================================

/// The signed-in user's profile as returned by `GET /auth/me`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Identity {
    pub id: UserId,
    pub email: Email,
    #[serde(default)]
    pub display_name: Option<String>,
    #[serde(default, rename = "photoURL")]
    pub photo_url: Option<String>,
}

impl Identity {
    /// Key the cart and order endpoints use for this user.
    #[must_use]
    pub fn user_key(&self) -> &str {
        self.email.as_str()
    }

    /// Name to greet the user with.
    #[must_use]
    pub fn greeting_name(&self) -> &str {
        self.display_name
            .as_deref()
            .map(str::trim)
            .filter(|n| !n.is_empty())
            .unwrap_or_else(|| self.email.local_part())
    }
}

// =============================================================================
// Catalog
// =============================================================================

/// A browsable test category.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Category {
    pub id: CategoryId,
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
}

/// A lab test offered in the catalog.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LabTest {
    pub id: TestId,
    pub name: String,
    #[serde(default)]
    pub lab: Option<String>,
    #[serde(default, deserialize_with = "lenient::deserialize")]
    pub price: Option<Price>,
    #[serde(default)]
    pub category: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
}

impl From<LabTest> for CartItem {
    fn from(test: LabTest) -> Self {
        Self {
            test_id: test.id,
            name: test.name,
            lab: test.lab,
            price: test.price,
            category: test.category,
            description: test.description,
        }
        .normalized()
    }
}

// =============================================================================
// Cart
// =============================================================================

/// One lab test queued for purchase.
///
/// A cart holds at most one item per `test_id`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CartItem {
    pub test_id: TestId,
    #[serde(default, alias = "testName")]
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub lab: Option<String>,
    #[serde(
        default,
        deserialize_with = "lenient::deserialize",
        skip_serializing_if = "Option::is_none"
    )]
    pub price: Option<Price>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

impl CartItem {
    /// Price of the item, counting a missing price as zero.
    #[must_use]
    pub fn price_or_zero(&self) -> Price {
        self.price.unwrap_or(Price::ZERO)
    }

    /// Trim text fields and drop blank optional ones.
    #[must_use]
    pub fn normalized(self) -> Self {
        fn clean(value: Option<String>) -> Option<String> {
            value
                .map(|v| v.trim().to_owned())
                .filter(|v| !v.is_empty())
        }

        Self {
            test_id: self.test_id,
            name: self.name.trim().to_owned(),
            lab: clean(self.lab),
            price: self.price,
            category: clean(self.category),
            description: clean(self.description),
        }
    }
}

/// Sum of item prices, counting missing prices as zero.
#[must_use]
pub fn total_of(items: &[CartItem]) -> Price {
    items.iter().map(CartItem::price_or_zero).sum()
}

/// Drop repeated test ids, keeping the first occurrence.
#[must_use]
pub fn dedupe_items(items: Vec<CartItem>) -> Vec<CartItem> {
    let mut seen = std::collections::HashSet::new();
    items
        .into_iter()
        .filter(|item| seen.insert(item.test_id.clone()))
        .collect()
}

// =============================================================================
// Patient & Orders
// =============================================================================

/// Details of the person the sample is collected from.
///
/// Filled in across the patient and address steps of checkout. Blank
/// strings and `None` both mean "not provided yet".
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PatientInfo {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub relation: Option<Relation>,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub phone: String,
    #[serde(default, deserialize_with = "lenient_date")]
    pub dob: Option<NaiveDate>,
    #[serde(default)]
    pub gender: Option<Gender>,
    #[serde(default)]
    pub address: String,
    #[serde(default)]
    pub city: String,
    #[serde(default)]
    pub state: String,
    #[serde(default)]
    pub pincode: String,
    #[serde(default)]
    pub time_slot: Option<TimeSlot>,
}

/// Read a date of birth, accepting `YYYY-MM-DD` or a full timestamp and
/// treating anything else as not provided.
fn lenient_date<'de, D>(d: D) -> Result<Option<NaiveDate>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let raw = Option::<serde_json::Value>::deserialize(d)?;
    Ok(raw.as_ref().and_then(serde_json::Value::as_str).and_then(|s| {
        let s = s.trim();
        NaiveDate::parse_from_str(s, "%Y-%m-%d")
            .ok()
            .or_else(|| DateTime::parse_from_rfc3339(s).ok().map(|dt| dt.date_naive()))
    }))
}

/// A cart item as recorded on an order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderLine {
    pub test_id: TestId,
    #[serde(default)]
    pub test_name: String,
    #[serde(default)]
    pub lab: String,
    #[serde(default)]
    pub price: Price,
}

impl From<&CartItem> for OrderLine {
    fn from(item: &CartItem) -> Self {
        Self {
            test_id: item.test_id.clone(),
            test_name: item.name.clone(),
            lab: item
                .lab
                .clone()
                .unwrap_or_else(|| DEFAULT_LAB.to_string()),
            price: item.price_or_zero(),
        }
    }
}

/// A placed order as listed by `GET /orders/user`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Order {
    pub order_id: OrderId,
    #[serde(default)]
    pub patient_info: PatientInfo,
    #[serde(default)]
    pub cart_items: Vec<OrderLine>,
    #[serde(default)]
    pub total_price: Price,
    #[serde(default)]
    pub payment_method: PaymentMethod,
    #[serde(default)]
    pub status: OrderStatus,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
}

/// Body of `POST /orders/place`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PlaceOrderRequest {
    pub user_id: String,
    pub patient_info: PatientInfo,
    pub cart_items: Vec<OrderLine>,
    pub total_price: Price,
    pub payment_method: PaymentMethod,
}

// =============================================================================
// Response Envelopes
// =============================================================================

#[derive(Debug, Deserialize)]
pub(crate) struct ProfileResponse {
    #[serde(default)]
    pub success: bool,
    #[serde(default)]
    pub data: Option<Identity>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct CartResponse {
    #[serde(default)]
    pub items: Vec<CartItem>,
}

/// Envelope shared by the cart mutation endpoints.
#[derive(Debug, Default, Deserialize)]
pub(crate) struct MutationResponse {
    #[serde(default)]
    pub success: Option<bool>,
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub items: Option<Vec<CartItem>>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct PlaceOrderResponse {
    #[serde(default)]
    pub success: Option<bool>,
    #[serde(default)]
    pub order_id: Option<OrderId>,
    #[serde(default)]
    pub message: Option<String>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct OrdersResponse {
    #[serde(default)]
    pub success: Option<bool>,
    #[serde(default)]
    pub orders: Vec<Order>,
    #[serde(default)]
    pub message: Option<String>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct CategoriesResponse {
    #[serde(default)]
    pub categories: Vec<Category>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct TestsResponse {
    #[serde(default)]
    pub tests: Vec<LabTest>,
}

/// Error bodies use either `message` or `error`.
#[derive(Debug, Deserialize)]
pub(crate) struct ErrorBody {
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub error: Option<String>,
}

impl ErrorBody {
    pub fn into_message(self) -> Option<String> {
        self.message
            .or(self.error)
            .map(|m| m.trim().to_owned())
            .filter(|m| !m.is_empty())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::indexing_slicing)]
mod tests {
    use super::*;

    fn item(id: &str, price: Option<u64>) -> CartItem {
        CartItem {
            test_id: TestId::new(id),
            name: format!("Test {id}"),
            lab: None,
            price: price.map(Price::new),
            category: None,
            description: None,
        }
    }

    #[test]
    fn test_total_of_sums_prices() {
        let items = vec![item("a", Some(599)), item("b", Some(899))];
        assert_eq!(total_of(&items), Price::new(1498));
    }

    #[test]
    fn test_total_of_treats_missing_price_as_zero() {
        let items = vec![item("a", Some(599)), item("b", None)];
        assert_eq!(total_of(&items), Price::new(599));
        assert_eq!(total_of(&[]), Price::ZERO);
    }

    #[test]
    fn test_malformed_price_in_payload_does_not_fail_cart() {
        let json = r#"{"items": [
            {"testId": "a", "name": "CBC", "price": 599},
            {"testId": "b", "name": "Lipid", "price": "n/a"},
            {"testId": "c", "testName": "TSH"}
        ]}"#;
        let cart: CartResponse = serde_json::from_str(json).unwrap();
        assert_eq!(cart.items.len(), 3);
        assert_eq!(cart.items[2].name, "TSH");
        assert_eq!(total_of(&cart.items), Price::new(599));
    }

    #[test]
    fn test_dedupe_keeps_first() {
        let mut second = item("a", Some(1));
        second.name = "dup".to_string();
        let items = dedupe_items(vec![item("a", Some(599)), item("b", None), second]);
        assert_eq!(items.len(), 2);
        assert_eq!(items[0].price, Some(Price::new(599)));
    }

    #[test]
    fn test_order_line_defaults_lab_and_price() {
        let line = OrderLine::from(&item("a", None));
        assert_eq!(line.lab, DEFAULT_LAB);
        assert_eq!(line.price, Price::ZERO);
        assert_eq!(line.test_name, "Test a");
    }

    #[test]
    fn test_normalized_trims_and_drops_blanks() {
        let raw = CartItem {
            test_id: TestId::new("a"),
            name: "  CBC ".to_string(),
            lab: Some("   ".to_string()),
            price: Some(Price::new(5)),
            category: Some(" Blood ".to_string()),
            description: None,
        };
        let clean = raw.normalized();
        assert_eq!(clean.name, "CBC");
        assert_eq!(clean.lab, None);
        assert_eq!(clean.category.as_deref(), Some("Blood"));
    }

    #[test]
    fn test_identity_wire_format() {
        let json = r#"{"id": "u1", "email": "jane@example.com",
                       "displayName": "Jane", "photoURL": "https://x/y.png"}"#;
        let identity: Identity = serde_json::from_str(json).unwrap();
        assert_eq!(identity.user_key(), "jane@example.com");
        assert_eq!(identity.photo_url.as_deref(), Some("https://x/y.png"));
        assert_eq!(identity.greeting_name(), "Jane");

        let unnamed = Identity {
            display_name: Some("  ".to_string()),
            ..identity
        };
        assert_eq!(unnamed.greeting_name(), "jane");
    }

    #[test]
    fn test_place_order_request_wire_format() {
        let request = PlaceOrderRequest {
            user_id: "jane@example.com".to_string(),
            patient_info: PatientInfo {
                time_slot: Some(TimeSlot::Midday),
                ..PatientInfo::default()
            },
            cart_items: vec![OrderLine::from(&item("a", Some(100)))],
            total_price: Price::new(100),
            payment_method: PaymentMethod::CashOnCollection,
        };
        let value = serde_json::to_value(&request).unwrap();
        assert_eq!(value["userId"], "jane@example.com");
        assert_eq!(value["totalPrice"], 100);
        assert_eq!(value["paymentMethod"], "cod");
        assert_eq!(value["cartItems"][0]["testName"], "Test a");
        assert_eq!(value["patientInfo"]["timeSlot"], "12:00 PM - 02:00 PM");
    }

    #[test]
    fn test_patient_dob_is_lenient() {
        let info: PatientInfo = serde_json::from_str(r#"{"dob": "1990-04-12"}"#).unwrap();
        assert_eq!(info.dob, NaiveDate::from_ymd_opt(1990, 4, 12));
        let info: PatientInfo =
            serde_json::from_str(r#"{"dob": "1990-04-12T00:00:00.000Z"}"#).unwrap();
        assert_eq!(info.dob, NaiveDate::from_ymd_opt(1990, 4, 12));
        let info: PatientInfo = serde_json::from_str(r#"{"dob": ""}"#).unwrap();
        assert_eq!(info.dob, None);
    }
}
