//! Demo data.

use gusturi_core::Price;
use gusturi_storefront::db::ProductRepository;

use crate::{CliError, connect};

/// Demo catalogue: code, name, price in bani, stock.
const PRODUCTS: &[(&str, &str, i64, i32)] = &[
    ("GR-ZAC-001", "Zacuscă de vinete tradițională 300g", 1899, 40),
    ("GR-DUL-002", "Dulceață de cireșe amare 350g", 2199, 25),
    ("GR-MIE-003", "Miere de salcâm 500g", 3499, 30),
    ("GR-BRA-004", "Brânză de burduf 400g", 4250, 12),
    ("GR-CAR-005", "Cârnați de Pleșcoi 500g", 3899, 18),
    ("GR-PAL-006", "Pălincă de prune 500ml", 6900, 10),
    ("GR-ZAK-007", "Magiun de prune Topoloveni 400g", 2450, 35),
    ("GR-CIO-008", "Cozonac cu nucă și cacao 800g", 4599, 4),
];

/// Insert the demo product catalogue, skipping codes that already exist.
pub async fn products() -> Result<(), CliError> {
    let pool = connect().await?;
    let repo = ProductRepository::new(&pool);

    let mut inserted = 0;
    for &(code, name, bani, stock) in PRODUCTS {
        let created = repo
            .insert_if_absent(code, name, Price::from_bani(bani), stock, None)
            .await
            .map_err(|e| CliError::Invalid(e.to_string()))?;
        if created {
            inserted += 1;
        }
    }

    tracing::info!(
        inserted,
        skipped = PRODUCTS.len() - inserted,
        "Product catalogue seeded"
    );
    Ok(())
}
