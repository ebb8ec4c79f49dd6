use anyhow::{bail, Result};

use cairn::Config;

use super::open_store;

/// Print a collection definition as pretty JSON
pub fn run_show(config: &Config, collection: &str) -> Result<()> {
    let store = open_store(config)?;

    let def = match store.find_by_identifier(collection) {
        Ok(def) => def,
        Err(e) if e.is_not_found() => {
            let known: Vec<String> = store
                .list_collections()?
                .into_iter()
                .map(|c| c.name)
                .collect();
            bail!(
                "Collection '{}' not found. Known collections: {}",
                collection,
                if known.is_empty() {
                    "(none)".to_string()
                } else {
                    known.join(", ")
                }
            );
        }
        Err(e) => return Err(e.into()),
    };

    println!("{}", serde_json::to_string_pretty(&def)?);
    Ok(())
}
