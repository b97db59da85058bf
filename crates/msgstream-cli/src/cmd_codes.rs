/// Implementation of `msgstream codes`.
///
/// Prints the control-code table as markdown, one row per assigned code.
use anyhow::Result;
use msgstream_wire::ControlCode;

/// Run the `msgstream codes` command.
///
/// # Errors
///
/// Returns an error only if formatting fails.
pub fn run() -> Result<()> {
    let mut out = String::new();
    ControlCode::document(&mut out)?;
    print!("{out}");
    Ok(())
}
