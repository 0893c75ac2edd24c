use crate::cache::{Entry, SerializerWithFallback, NO_COMPRESSION};
use crate::cli::{build_coder, EncodeArgs};
use crate::config::Config;
use crate::serialization::json::from_json;
use crate::utils::hex_prefix;
use anyhow::{Context, Result};
use std::time::Duration;

pub fn execute(args: &EncodeArgs, config: &Config) -> Result<()> {
    let json: serde_json::Value =
        serde_json::from_str(&args.value).context("Value must be a JSON literal")?;

    let mut entry = Entry::new(from_json(json));
    if let Some(version) = &args.entry_version {
        entry = entry.with_version(version.as_str());
    }
    if let Some(secs) = args.expires_in.or(config.cache.default_expires_in) {
        entry = entry.with_expires_in(Duration::from_secs(secs));
    }

    let coder = match args.format {
        Some(format) => SerializerWithFallback::builder(format)
            .fallback_order(config.cache.fallback_order.clone())
            .allow_marshal(config.cache.allow_marshal)
            .coder_object_format(config.cache.coder_object_format)
            .build()
            .context("Format is not readable with the configured fallback order")?,
        None => build_coder(config)?,
    };

    let threshold = match args.compress_threshold {
        Some(threshold) => threshold,
        None if config.cache.compress => config.cache.compress_threshold,
        None => NO_COMPRESSION,
    };
    let dumped = coder.dump_compressed(&entry, threshold)?;

    println!("{}", hex_prefix(&dumped, dumped.len()));
    Ok(())
}
