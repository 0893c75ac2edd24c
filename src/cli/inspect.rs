use crate::cache::is_bare_string;
use crate::cli::{build_coder, InspectArgs};
use crate::config::Config;
use crate::serialization::json::to_json;
use crate::utils::{hex_prefix, parse_hex};
use crate::value::Value;
use anyhow::{bail, Context, Result};

pub fn execute(args: &InspectArgs, config: &Config) -> Result<()> {
    let dumped = match (&args.hex, &args.file) {
        (Some(hex), _) => parse_hex(hex)?,
        (None, Some(path)) => std::fs::read(path)
            .with_context(|| format!("Failed to read {}", path.display()))?,
        (None, None) => bail!("either --hex or --file is required"),
    };
    let coder = build_coder(config)?;

    println!("Bytes:   {}", dumped.len());
    println!("Prefix:  {}", hex_prefix(&dumped, 8));
    let detected = match coder.detect(&dumped) {
        Some(format) => format.to_string(),
        None if is_bare_string(&dumped) => "bare string".to_string(),
        None => "unrecognized".to_string(),
    };
    println!("Format:  {}", detected);

    let Some(loaded) = coder.load_metadata(&dumped)? else {
        println!("Entry:   <miss>");
        return Ok(());
    };
    match &loaded.version {
        Some(version) => match version.as_str() {
            Some(text) => println!("Version: {:?} ({})", text, version.encoding()),
            None => println!(
                "Version: {} ({})",
                hex_prefix(version.bytes(), 32),
                version.encoding()
            ),
        },
        None => println!("Version: <none>"),
    }
    match loaded.expires_at {
        Some(at) => println!(
            "Expires: {} ({})",
            at,
            if loaded.expired() { "expired" } else { "live" }
        ),
        None => println!("Expires: <never>"),
    }
    if args.metadata_only {
        return Ok(());
    }

    let value = coder.resolve(loaded.payload)?;
    println!("Class:   {}", value.class_name());
    println!("Value:   {}", render(&value));
    Ok(())
}

/// 能转为 JSON 的值以 JSON 显示，其余使用 Debug 形式
pub(crate) fn render(value: &Value) -> String {
    to_json(value)
        .map(|json| json.to_string())
        .unwrap_or_else(|_| format!("{:?}", value))
}
