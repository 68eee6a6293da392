//! Order history.

use std::time::Duration;

use medibook_client::Medibook;
use medibook_client::auth::AuthStatus;
use medibook_client::error::ClientError;

use crate::output;

/// Print order history, then optionally keep polling for changes.
///
/// # Errors
///
/// Returns an error when signed out or if the first fetch fails.
pub async fn list(
    app: &Medibook,
    watch: Option<Duration>,
) -> Result<(), Box<dyn std::error::Error>> {
    if app.initialize(None).await != AuthStatus::Authenticated {
        return Err(ClientError::NotSignedIn.into());
    }

    let orders = app.orders().refresh().await?;
    print_orders(&orders);

    let Some(period) = watch else {
        return Ok(());
    };

    let mut updates = app.orders().subscribe();
    updates.mark_unchanged();
    let _poll = app.orders().watch(period);
    output::line("Watching for changes. Press Ctrl-C to stop.");

    loop {
        tokio::select! {
            changed = updates.changed() => {
                if changed.is_err() {
                    break;
                }
                let orders = updates.borrow_and_update().clone();
                output::line("");
                print_orders(&orders);
            }
            _ = tokio::signal::ctrl_c() => break,
        }
    }
    Ok(())
}

/// Print the people tests were booked for.
///
/// # Errors
///
/// Returns an error when signed out or if the fetch fails.
pub async fn family(app: &Medibook) -> Result<(), Box<dyn std::error::Error>> {
    if app.initialize(None).await != AuthStatus::Authenticated {
        return Err(ClientError::NotSignedIn.into());
    }
    app.orders().refresh().await?;

    let members = app.orders().family_members();
    if members.is_empty() {
        output::line("No family members yet.");
    }
    for member in members {
        output::line(&format!("{:<24} {}", member.name, member.relation));
    }
    Ok(())
}

fn print_orders(orders: &[medibook_client::api::Order]) {
    if orders.is_empty() {
        output::line("No orders yet.");
    }
    for order in orders {
        output::order(order);
    }
}
