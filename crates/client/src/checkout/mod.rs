//! Checkout wizard.
//!
//! Five steps, in order: cart review, patient info, address and time slot,
//! payment, confirmation.
//!
//! # Transitions
//!
//! - [`CheckoutWizard::advance`] needs a signed-in user, then the current
//!   step's fields. From the payment step it places the order and only
//!   moves on if that succeeds.
//! - [`CheckoutWizard::retreat`] always succeeds.
//! - [`CheckoutWizard::jump_to`] only reaches steps already visited.
//!
//! Once submitted, order placement runs on its own task: dropping the
//! wizard (or the future driving it) does not stop the order or the cart
//! clear that follows it.

mod order;
mod step;
pub mod validation;

pub use order::{GENERIC_ORDER_FAILURE, OrderConfirmation};
pub use step::{CheckoutStep, StepTracker};
pub use validation::Field;

use std::sync::Arc;

use medibook_core::{PaymentMethod, Price};
use thiserror::Error;
use tracing::{error, info, instrument, warn};

use crate::api::{ApiError, CartItem, LabApi, PatientInfo};
use crate::auth::AuthSession;
use crate::cart::CartSync;

/// Why the wizard refused to move on.
#[derive(Debug, Error)]
pub enum CheckoutError {
    /// Nobody is signed in. The user has been sent to sign in.
    #[error("Please sign in to continue")]
    SignInRequired,

    /// Required fields are blank.
    #[error("Please fill in: {}", validation::describe(.missing))]
    Validation {
        /// Step the missing fields belong to.
        step: CheckoutStep,
        /// Missing fields, in form order.
        missing: Vec<Field>,
    },

    /// Nothing to order.
    #[error("Your cart is empty")]
    EmptyCart,

    /// The payment method is advertised but not accepted yet.
    #[error("{} is not available yet", .0.label())]
    PaymentMethodUnavailable(PaymentMethod),

    /// Orders are placed from the payment step only.
    #[error("Orders can only be placed from the payment step")]
    NotOnPaymentStep,

    /// The server did not accept the order.
    #[error("{0}")]
    OrderRejected(String),

    /// The placement task died before reporting back.
    #[error("Order placement was interrupted")]
    Interrupted,
}

/// One checkout session.
pub struct CheckoutWizard {
    api: Arc<dyn LabApi>,
    auth: AuthSession,
    cart: CartSync,
    return_path: String,
    steps: StepTracker,
    patient: PatientInfo,
    payment_method: PaymentMethod,
    confirmation: Option<OrderConfirmation>,
}

impl CheckoutWizard {
    /// Start a checkout at step 1. `return_path` is where sign-in sends
    /// the user back to.
    #[must_use]
    pub fn new(
        api: Arc<dyn LabApi>,
        auth: AuthSession,
        cart: CartSync,
        return_path: impl Into<String>,
    ) -> Self {
        Self {
            api,
            auth,
            cart,
            return_path: return_path.into(),
            steps: StepTracker::new(),
            patient: PatientInfo::default(),
            payment_method: PaymentMethod::default(),
            confirmation: None,
        }
    }

    // =========================================================================
    // State
    // =========================================================================

    #[must_use]
    pub const fn current_step(&self) -> CheckoutStep {
        self.steps.current()
    }

    #[must_use]
    pub const fn highest_step_reached(&self) -> CheckoutStep {
        self.steps.highest_reached()
    }

    #[must_use]
    pub const fn patient(&self) -> &PatientInfo {
        &self.patient
    }

    /// Patient details for editing.
    pub const fn patient_mut(&mut self) -> &mut PatientInfo {
        &mut self.patient
    }

    #[must_use]
    pub const fn payment_method(&self) -> PaymentMethod {
        self.payment_method
    }

    /// Snapshot of the placed order, once there is one.
    #[must_use]
    pub const fn confirmation(&self) -> Option<&OrderConfirmation> {
        self.confirmation.as_ref()
    }

    /// Items under review, from the live cart.
    #[must_use]
    pub fn items(&self) -> Vec<CartItem> {
        self.cart.items()
    }

    /// Total of the live cart.
    #[must_use]
    pub fn total(&self) -> Price {
        self.cart.compute_total()
    }

    /// Fields the current step still needs.
    #[must_use]
    pub fn missing_fields(&self) -> Vec<Field> {
        validation::missing_fields(self.steps.current(), &self.patient)
    }

    // =========================================================================
    // Transitions
    // =========================================================================

    /// Move forward one step.
    ///
    /// # Errors
    ///
    /// - [`CheckoutError::SignInRequired`] when signed out; the current path
    ///   is remembered and the user is sent to sign in
    /// - [`CheckoutError::Validation`] when the step has blank fields
    /// - any [`place_order`](Self::place_order) error from the payment step
    ///
    /// The step is unchanged on error.
    #[instrument(skip(self), fields(step = self.steps.current().number()))]
    pub async fn advance(&mut self) -> Result<CheckoutStep, CheckoutError> {
        if !self.auth.is_authenticated() {
            info!("Checkout needs sign-in");
            self.auth.require_sign_in(&self.return_path);
            return Err(CheckoutError::SignInRequired);
        }

        let step = self.steps.current();
        if step.is_terminal() {
            return Ok(step);
        }

        let missing = validation::missing_fields(step, &self.patient);
        if !missing.is_empty() {
            return Err(CheckoutError::Validation { step, missing });
        }

        if step == CheckoutStep::Payment {
            self.place_order().await?;
            return Ok(self.steps.current());
        }

        Ok(self.steps.advance())
    }

    /// Move back one step, never below step 1.
    pub fn retreat(&mut self) -> CheckoutStep {
        self.steps.retreat()
    }

    /// Go to a step already reached. Returns whether the jump happened.
    ///
    /// Steps past the first also need a signed-in user.
    pub fn jump_to(&mut self, target: CheckoutStep) -> bool {
        if target > CheckoutStep::CartReview && !self.auth.is_authenticated() {
            return false;
        }
        self.steps.jump_to(target)
    }

    /// Choose how to pay.
    ///
    /// # Errors
    ///
    /// Returns [`CheckoutError::PaymentMethodUnavailable`] for methods that
    /// are not accepted yet.
    pub fn select_payment_method(&mut self, method: PaymentMethod) -> Result<(), CheckoutError> {
        if !method.is_enabled() {
            return Err(CheckoutError::PaymentMethodUnavailable(method));
        }
        self.payment_method = method;
        Ok(())
    }

    /// Start over: step 1, blank patient details, no confirmation.
    pub fn reset(&mut self) {
        self.steps.reset();
        self.patient = PatientInfo::default();
        self.payment_method = PaymentMethod::default();
        self.confirmation = None;
    }

    // =========================================================================
    // Order placement
    // =========================================================================

    /// Place the order from the payment step.
    ///
    /// Everything is re-checked first: sign-in, a non-empty cart, every
    /// patient field and the payment method. Nothing is sent if any check
    /// fails. On success the cart is cleared, the confirmation is kept and
    /// the wizard moves to the last step. On failure nothing changes.
    ///
    /// # Errors
    ///
    /// Returns a [`CheckoutError`] describing the failed check or the
    /// server's refusal.
    #[instrument(skip(self))]
    pub async fn place_order(&mut self) -> Result<&OrderConfirmation, CheckoutError> {
        if self.steps.current() != CheckoutStep::Payment {
            return Err(CheckoutError::NotOnPaymentStep);
        }
        let Some((identity, token)) = self.auth.credentials() else {
            self.auth.require_sign_in(&self.return_path);
            return Err(CheckoutError::SignInRequired);
        };

        let items = self.cart.items();
        if items.is_empty() {
            return Err(CheckoutError::EmptyCart);
        }
        if let Some((step, missing)) = validation::first_incomplete_step(&self.patient) {
            return Err(CheckoutError::Validation { step, missing });
        }
        if !self.payment_method.is_enabled() {
            return Err(CheckoutError::PaymentMethodUnavailable(self.payment_method));
        }

        let request = order::build_request(&identity, &self.patient, &items, self.payment_method);
        info!(
            items = request.cart_items.len(),
            total = %request.total_price,
            "Placing order"
        );

        let api = Arc::clone(&self.api);
        let cart = self.cart.clone();
        let placement = tokio::spawn(async move {
            let order_id = api.place_order(&token, &request).await?;
            info!(%order_id, "Order placed");
            let confirmation = OrderConfirmation::new(order_id, request);
            let cleared = cart.clear_cart(&confirmation).await;
            if !cleared.is_success() {
                warn!(?cleared, "Cart not cleared after order");
            }
            Ok::<_, ApiError>(confirmation)
        });

        match placement.await {
            Ok(Ok(confirmation)) => {
                self.steps.advance();
                Ok(&*self.confirmation.insert(confirmation))
            }
            Ok(Err(e)) if e.is_unauthorized() => {
                error!("Order placement rejected the session");
                self.auth.invalidate();
                Err(CheckoutError::SignInRequired)
            }
            Ok(Err(e)) => {
                error!(error = %e, "Order placement failed");
                let message = e.server_message().unwrap_or(GENERIC_ORDER_FAILURE);
                Err(CheckoutError::OrderRejected(message.to_owned()))
            }
            Err(e) => {
                error!(error = %e, "Order placement task failed");
                Err(CheckoutError::Interrupted)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validation_error_lists_fields() {
        let err = CheckoutError::Validation {
            step: CheckoutStep::PatientInfo,
            missing: vec![Field::Email, Field::Dob],
        };
        assert_eq!(err.to_string(), "Please fill in: email, dob");
    }

    #[test]
    fn test_unavailable_method_message() {
        let err = CheckoutError::PaymentMethodUnavailable(PaymentMethod::Card);
        assert!(err.to_string().ends_with("is not available yet"));
    }
}
