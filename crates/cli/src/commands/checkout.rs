//! Non-interactive checkout.
//!
//! Fills the patient form from flags and walks the wizard to the end. A
//! missing flag stops the walk at the step that needs it.

use chrono::NaiveDate;
use clap::Args;
use medibook_client::Medibook;
use medibook_client::checkout::CheckoutStep;
use medibook_core::{Gender, PaymentMethod, Relation, TimeSlot};

use crate::output;

/// Where sign-in returns to when checkout needs it.
const CHECKOUT_PATH: &str = "/checkout";

#[derive(Args, Debug)]
pub struct CheckoutArgs {
    /// Patient's full name
    #[arg(long)]
    name: Option<String>,

    /// Who the patient is (self, child, spouse, parent, sibling, other)
    #[arg(long)]
    relation: Option<Relation>,

    /// Patient email; defaults to the account email
    #[arg(long)]
    email: Option<String>,

    #[arg(long)]
    phone: Option<String>,

    /// Date of birth, YYYY-MM-DD
    #[arg(long)]
    dob: Option<NaiveDate>,

    /// male, female or other
    #[arg(long)]
    gender: Option<Gender>,

    /// Sample collection address
    #[arg(long)]
    address: Option<String>,

    #[arg(long)]
    city: Option<String>,

    #[arg(long)]
    state: Option<String>,

    #[arg(long)]
    pincode: Option<String>,

    /// Collection window by start hour (8, 10, 12, 14, 16) or full label
    #[arg(long)]
    slot: Option<TimeSlot>,

    /// Payment method
    #[arg(long, default_value = "cod")]
    payment: PaymentMethod,
}

/// Run checkout from cart review to confirmation.
///
/// # Errors
///
/// Returns the checkout error of the step that could not be completed.
pub async fn run(app: &Medibook, args: CheckoutArgs) -> Result<(), Box<dyn std::error::Error>> {
    app.initialize(None).await;
    let mut wizard = app.checkout(CHECKOUT_PATH);

    {
        let patient = wizard.patient_mut();
        patient.name = args.name.unwrap_or_default();
        patient.relation = args.relation;
        patient.phone = args.phone.unwrap_or_default();
        patient.dob = args.dob;
        patient.gender = args.gender;
        patient.address = args.address.unwrap_or_default();
        patient.city = args.city.unwrap_or_default();
        patient.state = args.state.unwrap_or_default();
        patient.pincode = args.pincode.unwrap_or_default();
        patient.time_slot = args.slot;
    }
    // The account email stands in for a missing one, but the patient step
    // still needs a value to pass.
    let email = args
        .email
        .or_else(|| app.auth().identity().map(|i| i.email.to_string()));
    wizard.patient_mut().email = email.unwrap_or_default();

    wizard.select_payment_method(args.payment)?;

    loop {
        let step = wizard.current_step();
        if step == CheckoutStep::CartReview {
            output::items(&wizard.items(), wizard.total());
        }
        if wizard.advance().await? == CheckoutStep::Confirmation {
            break;
        }
        output::line(&format!("{step} done"));
    }

    if let Some(confirmation) = wizard.confirmation() {
        output::line(&format!(
            "Order {} placed for {}.",
            confirmation.order_id(),
            confirmation.patient().name
        ));
        for line in confirmation.lines() {
            output::line(&format!("  {} ({})  {}", line.test_name, line.lab, line.price));
        }
        output::line(&format!(
            "Total {} - {}",
            confirmation.total(),
            confirmation.payment_method()
        ));
    }
    Ok(())
}
