use std::path::Path;

use chrono::Utc;
use sentinel_core::fallback::FallbackGenerator;

use crate::error::CliError;

pub fn run_seed(seed: Option<u64>, output_path: Option<&Path>) -> Result<(), CliError> {
    let rendered = render_dataset(seed)?;

    if let Some(path) = output_path {
        std::fs::write(path, rendered)?;
        println!("{}", path.display());
    } else {
        println!("{rendered}");
    }

    Ok(())
}

pub fn render_dataset(seed: Option<u64>) -> Result<String, CliError> {
    let mut generator = seed.map_or_else(FallbackGenerator::from_entropy, FallbackGenerator::seeded);
    let dataset = generator.dataset(Utc::now());
    Ok(serde_json::to_string_pretty(&dataset)?)
}
