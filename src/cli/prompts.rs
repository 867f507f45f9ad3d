//! Interactive prompts used by the menu loop.

use crate::error::Result;
use crate::models::Scope;
use clap::ValueEnum;
use dialoguer::{theme::ColorfulTheme, Confirm, Input, Select};

/// Prompt for a location id.
pub fn prompt_location(prompt: &str) -> Result<i64> {
    let id = Input::<i64>::with_theme(&ColorfulTheme::default())
        .with_prompt(prompt)
        .validate_with(|id: &i64| {
            if *id > 0 {
                Ok(())
            } else {
                Err("Location ids are positive")
            }
        })
        .interact_text()?;
    Ok(id)
}

/// Prompt for the twin search scope.
pub fn prompt_scope() -> Result<Scope> {
    let scopes = Scope::value_variants();
    let labels: Vec<String> = scopes.iter().map(|s| s.to_string()).collect();
    let default = scopes
        .iter()
        .position(|s| *s == Scope::default())
        .unwrap_or(0);
    let selection = Select::with_theme(&ColorfulTheme::default())
        .with_prompt("Search scope")
        .items(&labels)
        .default(default)
        .interact()?;
    Ok(scopes[selection])
}

/// Prompt for the minimum overall similarity.
pub fn prompt_min_similarity(default: u32) -> Result<u32> {
    let value = Input::<u32>::with_theme(&ColorfulTheme::default())
        .with_prompt("Minimum similarity (0-100)")
        .default(default)
        .validate_with(|v: &u32| {
            if *v <= 100 {
                Ok(())
            } else {
                Err("Must be between 0 and 100")
            }
        })
        .interact_text()?;
    Ok(value)
}

/// Ask whether existing normals should be recomputed.
pub fn prompt_force() -> Result<bool> {
    let force = Confirm::with_theme(&ColorfulTheme::default())
        .with_prompt("Recompute normals that are already complete?")
        .default(false)
        .interact()?;
    Ok(force)
}
