//! Terminal output.
//!
//! Results go to stdout; notices and failures go to stderr next to the
//! log lines.

#![allow(clippy::print_stdout, clippy::print_stderr)]

use medibook_client::api::{CartItem, Order};
use medibook_client::cart::{CartMutation, Notice, NoticeLevel};
use medibook_client::navigation::{Destination, NavigationEvent};
use medibook_core::Price;

pub fn line(text: &str) {
    println!("{text}");
}

pub fn failure(message: &str) {
    eprintln!("error: {message}");
}

pub fn notice(notice: &Notice) {
    match notice.level {
        NoticeLevel::Info => eprintln!("{}", notice.message),
        NoticeLevel::Error => eprintln!("error: {}", notice.message),
    }
}

/// Report a cart mutation, falling back to `done` when it has no notice.
pub fn mutation(outcome: &CartMutation, done: &str) {
    match outcome.notice() {
        Some(n) => notice(&n),
        None if matches!(outcome, CartMutation::Applied) => line(done),
        None => line("Nothing changed. Pass --yes to confirm."),
    }
}

pub fn items(items: &[CartItem], total: Price) {
    if items.is_empty() {
        line("Your cart is empty.");
        return;
    }
    for item in items {
        let price = item
            .price
            .map_or_else(|| "-".to_string(), |p| p.to_string());
        let lab = item.lab.as_deref().unwrap_or("");
        println!("  {:<12} {:<40} {:>8}  {lab}", item.test_id.as_str(), item.name, price);
    }
    println!("  {:<53} {:>8}", "Total", total.to_string());
}

pub fn order(order: &Order) {
    let placed = order
        .created_at
        .map_or_else(String::new, |at| at.format("%Y-%m-%d %H:%M").to_string());
    println!(
        "{}  {:<16} {:>8}  {:<12} {placed}",
        order.order_id.as_str(),
        order.status.to_string(),
        order.total_price.to_string(),
        order.patient_info.name
    );
    for entry in &order.cart_items {
        println!("    {} ({})", entry.test_name, entry.lab);
    }
}

/// Tell the user where the flow wants them next.
pub fn navigation(events: &[NavigationEvent]) {
    let Some(destination) = events.iter().rev().find_map(|event| match event {
        NavigationEvent::Navigate(to) => Some(to),
        NavigationEvent::Replace(_) => None,
    }) else {
        return;
    };

    match destination {
        Destination::SignIn => eprintln!("Sign in with `medibook login` to continue."),
        Destination::Provider(url) => println!("Open this link to sign in:\n  {url}"),
        Destination::Path(path) => eprintln!("Continue where you left off: {path}"),
    }
}
