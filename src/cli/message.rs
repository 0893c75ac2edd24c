use crate::cli::inspect::render;
use crate::cli::MessageArgs;
use crate::config::Config;
use crate::serialization::json::from_json;
use crate::serialization::{FallbackSerializer, Serializer};
use crate::utils::{hex_prefix, parse_hex};
use anyhow::{bail, Context, Result};

pub fn execute(args: &MessageArgs, config: &Config) -> Result<()> {
    let serializer = FallbackSerializer::from_config(config);

    match (&args.value, &args.hex) {
        (Some(value), _) => {
            let json: serde_json::Value =
                serde_json::from_str(value).context("Value must be a JSON literal")?;
            let dumped = serializer.dump(&from_json(json))?;
            println!("{}", hex_prefix(&dumped, dumped.len()));
        }
        (None, Some(hex)) => {
            let value = serializer
                .load(&parse_hex(hex)?)
                .with_context(|| format!("Failed to load message as {}", serializer.format()))?;
            println!("Class: {}", value.class_name());
            println!("Value: {}", render(&value));
        }
        (None, None) => bail!("either a value or --hex is required"),
    }
    Ok(())
}
