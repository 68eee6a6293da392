//! Catalog listing.

use medibook_client::Medibook;
use medibook_core::CategoryId;

use crate::output;

/// List test categories.
///
/// # Errors
///
/// Returns an error if the catalog cannot be fetched.
pub async fn categories(app: &Medibook) -> Result<(), Box<dyn std::error::Error>> {
    for category in app.catalog().categories().await?.iter() {
        match &category.description {
            Some(description) => output::line(&format!(
                "{:<16} {}  - {description}",
                category.id.as_str(),
                category.name
            )),
            None => output::line(&format!("{:<16} {}", category.id.as_str(), category.name)),
        }
    }
    Ok(())
}

/// List tests, optionally for one category.
///
/// # Errors
///
/// Returns an error if the catalog cannot be fetched.
pub async fn tests(
    app: &Medibook,
    category: Option<String>,
) -> Result<(), Box<dyn std::error::Error>> {
    let category = category.map(CategoryId::new);
    let tests = app.catalog().tests(category.as_ref()).await?;
    if tests.is_empty() {
        output::line("No tests found.");
    }
    for test in tests.iter() {
        let price = test
            .price
            .map_or_else(|| "-".to_string(), |p| p.to_string());
        output::line(&format!("{:<12} {:<40} {price:>8}", test.id.as_str(), test.name));
    }
    Ok(())
}
