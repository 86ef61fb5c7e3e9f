//! Seed the catalog with products from a YAML file.
//!
//! ```yaml
//! products:
//!   - name: Desk Lamp
//!     description: Adjustable LED lamp
//!     price: "39.99"
//!     category: home
//!     brand: Lumo
//!     stock: 25
//!     featured: true
//! ```
//!
//! Every entry is validated before the database is touched.

use std::path::Path;

use serde::Deserialize;
use tracing::{error, info};

use cartwheel_api::db::ProductRepository;
use cartwheel_api::models::product::NewProduct;

use super::{CliError, connect};

/// Top-level shape of a seed file.
#[derive(Debug, Deserialize)]
pub struct SeedFile {
    pub products: Vec<NewProduct>,
}

/// Validate every product, returning `(index, name, message)` per failure.
fn validate(seed: &SeedFile) -> Vec<(usize, String, String)> {
    seed.products
        .iter()
        .enumerate()
        .filter_map(|(i, product)| {
            product
                .validate()
                .err()
                .map(|msg| (i, product.name.clone(), msg))
        })
        .collect()
}

/// Insert the products in a seed file.
///
/// # Errors
///
/// Returns `CliError` if the file cannot be read or parsed, any entry is
/// invalid, or an insert fails.
pub async fn products(file_path: &str, dry_run: bool) -> Result<(), CliError> {
    let path = Path::new(file_path);
    info!(path = %file_path, "Loading products from file");

    let content = tokio::fs::read_to_string(path)
        .await
        .map_err(|source| CliError::Io {
            path: file_path.to_owned(),
            source,
        })?;
    let seed: SeedFile = serde_yaml::from_str(&content)?;

    info!(products = seed.products.len(), "Parsed seed file");

    let errors = validate(&seed);
    if !errors.is_empty() {
        error!("Seed file validation failed:");
        for (index, name, msg) in &errors {
            error!("  - #{index} {name:?}: {msg}");
        }
        return Err(CliError::InvalidSeed(errors.len()));
    }

    if dry_run {
        info!("Dry run, nothing inserted");
        return Ok(());
    }

    let pool = connect().await?;
    let repo = ProductRepository::new(&pool);

    for product in &seed.products {
        let created = repo.create(product).await?;
        info!(id = %created.id, name = %created.name, "Product inserted");
    }

    info!("Seeding complete! {} products inserted", seed.products.len());
    Ok(())
}
