//! Interactive entry of a single record

use std::io::{BufRead, Write};

use extacct_core::{ExtacctError, InputRecord, Result};

fn io_error(e: std::io::Error) -> ExtacctError {
    ExtacctError::input_error(format!("Console I/O failed: {}", e))
}

/// Ask for one value. Required values are asked again until non-blank.
fn ask<R: BufRead, W: Write>(
    input: &mut R,
    output: &mut W,
    label: &str,
    required: bool,
) -> Result<String> {
    loop {
        if required {
            write!(output, "{}: ", label).map_err(io_error)?;
        } else {
            write!(output, "{} (optional): ", label).map_err(io_error)?;
        }
        output.flush().map_err(io_error)?;

        let mut line = String::new();
        if input.read_line(&mut line).map_err(io_error)? == 0 {
            return Err(ExtacctError::input_error(format!(
                "Input closed while reading {}",
                label
            )));
        }

        let value = line.trim();
        if !required || !value.is_empty() {
            return Ok(value.to_string());
        }
        writeln!(output, "{} is required.", label).map_err(io_error)?;
    }
}

/// Collect one record from the console
pub fn prompt_record<R: BufRead, W: Write>(input: &mut R, output: &mut W) -> Result<InputRecord> {
    let first_name = ask(input, output, "First name", true)?;
    let last_name = ask(input, output, "Last name", true)?;
    let company_name = ask(input, output, "Company name", true)?;
    let ou_path = ask(input, output, "OU path (distinguished name)", true)?;
    let group_name = ask(input, output, "Group name", false)?;

    Ok(InputRecord::new(
        first_name,
        last_name,
        company_name,
        ou_path,
        (!group_name.is_empty()).then_some(group_name),
    ))
}
