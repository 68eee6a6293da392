//! Cart commands.
//!
//! Signed-in users work on their server cart. Without a session the local
//! guest cart is used instead; it is never sent to the server.

use medibook_client::Medibook;
use medibook_client::api::{CartItem, total_of};
use medibook_client::auth::AuthStatus;
use medibook_client::cart::Confirmation;
use medibook_core::TestId;

use crate::output;

/// Show the cart.
pub async fn show(app: &Medibook) {
    if app.initialize(None).await == AuthStatus::Authenticated {
        output::items(&app.cart().items(), app.cart().compute_total());
    } else {
        let items = app.cart().guest_items();
        output::line("Not signed in; showing the local cart.");
        output::items(&items, total_of(&items));
    }
}

/// Add a test from the catalog.
///
/// # Errors
///
/// Returns an error if the catalog cannot be fetched or has no such test.
pub async fn add(app: &Medibook, test_id: &str) -> Result<(), Box<dyn std::error::Error>> {
    let status = app.initialize(None).await;
    let test_id = TestId::new(test_id);
    let test = app
        .catalog()
        .find_test(&test_id)
        .await?
        .ok_or_else(|| format!("No test with id '{test_id}'"))?;
    let item = CartItem::from(test);
    let name = item.name.clone();

    if status == AuthStatus::Authenticated {
        let outcome = app.cart().add_item(item).await;
        output::mutation(&outcome, &format!("Added {name} to your cart."));
    } else {
        let outcome = app.cart().add_guest_item(item);
        output::mutation(
            &outcome,
            &format!("Added {name} to the local cart. Sign in to check out."),
        );
    }
    Ok(())
}

/// Remove a test. Needs `--yes`.
pub async fn remove(app: &Medibook, test_id: &str, yes: bool) {
    let status = app.initialize(None).await;
    let test_id = TestId::new(test_id);
    let confirmation = Confirmation::from(yes);

    let outcome = if status == AuthStatus::Authenticated {
        app.cart().remove_item(&test_id, confirmation).await
    } else {
        app.cart().remove_guest_item(&test_id, confirmation)
    };
    output::mutation(&outcome, &format!("Removed {test_id}."));
}
