use crate::cli::{build_coder, FormatsArgs};
use crate::config::Config;
use anyhow::Result;

pub fn execute(args: &FormatsArgs, config: &Config) -> Result<()> {
    let coder = build_coder(config)?;

    println!("=== Entry Formats ===\n");
    println!("Write format:  {}", coder.format());
    println!(
        "Marshal loads: {}",
        if coder.allow_marshal() { "allowed" } else { "refused" }
    );
    println!("\nDetection order:");
    for (i, format) in coder.fallback_order().iter().enumerate() {
        if args.verbose {
            println!("  {}. {:<14} {}", i + 1, format.name(), format.signature());
        } else {
            println!("  {}. {}", i + 1, format.name());
        }
    }
    Ok(())
}
