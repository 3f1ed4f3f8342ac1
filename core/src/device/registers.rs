//! Register lists in the Strata text format: one `name address value`
//! triple per line, numbers in hex with an optional `0x` prefix.

use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::prelude::{RadarError, RadarResult};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Register {
    pub name: String,
    pub address: u32,
    pub value: u32,
}

fn parse_hex(field: &str, line: usize) -> RadarResult<u32> {
    let digits = field
        .strip_prefix("0x")
        .or_else(|| field.strip_prefix("0X"))
        .unwrap_or(field);
    u32::from_str_radix(digits, 16)
        .map_err(|err| RadarError::FileInvalid(format!("line {}: {:?} is not hex: {}", line, field, err)))
}

/// Parses register text; blank lines are skipped.
pub fn parse_registers(text: &str) -> RadarResult<Vec<Register>> {
    let mut registers = Vec::new();
    for (index, line) in text.lines().enumerate() {
        let fields: Vec<&str> = line.split_whitespace().collect();
        match fields.as_slice() {
            [] => continue,
            [name, address, value] => registers.push(Register {
                name: (*name).to_string(),
                address: parse_hex(address, index + 1)?,
                value: parse_hex(value, index + 1)?,
            }),
            _ => {
                return Err(RadarError::FileInvalid(format!(
                    "line {}: expected name, address and value",
                    index + 1
                )))
            }
        }
    }
    Ok(registers)
}

pub fn format_registers(registers: &[Register]) -> String {
    registers
        .iter()
        .map(|r| format!("{} 0x{:X} 0x{:X}\n", r.name, r.address, r.value))
        .collect()
}

pub fn load_registers<P: AsRef<Path>>(path: P) -> RadarResult<Vec<Register>> {
    let path = path.as_ref();
    let text = fs::read_to_string(path).map_err(|err| RadarError::OpeningFile(format!("{}: {}", path.display(), err)))?;
    parse_registers(&text)
}

pub fn save_registers<P: AsRef<Path>>(path: P, registers: &[Register]) -> RadarResult<()> {
    let path = path.as_ref();
    fs::write(path, format_registers(registers))
        .map_err(|err| RadarError::OpeningFile(format!("{}: {}", path.display(), err)))
}
