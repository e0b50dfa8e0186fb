//! Output formatting for CLI results

use serde::Serialize;

use vone::error::Result;

/// Format data as pretty-printed JSON
pub fn format_json<T: Serialize + ?Sized>(data: &T) -> Result<String> {
    Ok(serde_json::to_string_pretty(data)?)
}

/// Print data to stdout as pretty JSON
pub fn print_json<T: Serialize + ?Sized>(data: &T) -> Result<()> {
    println!("{}", format_json(data)?);
    Ok(())
}
