//! The splicer's header block and inline commands.
//!
//! Counts are fixed-width upper-case hex. Filament positions are single precision floats,
//! written as the little-endian bytes in reverse order, prefixed with `D`.
use std::io::Write;

use tracing::info;

use crate::config::GeneratorSettings;
use crate::tracker::{ExtrusionState, Ping};
use crate::{dwell, gcode_comment, Error, Result};

/// Header format 2.0
const MSF_VERSION: usize = 0x14;

pub fn float_to_hex(f: f32) -> String {
    let mut bytes = f.to_bits().to_le_bytes();
    bytes.reverse();
    format!("D{}", hex::encode_upper(bytes))
}

/// Inverse of [`float_to_hex`]. Bit-exact, NaN payloads included.
pub fn hex_to_float(s: &str) -> Result<f32> {
    let digits = s
        .strip_prefix('D')
        .ok_or_else(|| Error::Decode(s.to_string()))?;
    let decoded = hex::decode(digits).map_err(|_| Error::Decode(s.to_string()))?;
    let mut bytes: [u8; 4] = decoded
        .as_slice()
        .try_into()
        .map_err(|_| Error::Decode(s.to_string()))?;
    bytes.reverse();
    Ok(f32::from_le_bytes(bytes))
}

/// `D` followed by `value` in exactly `digits` hex digits
fn hex_field(field: &'static str, value: u64, digits: usize) -> Result<String> {
    if digits < 16 && value >> (4 * digits) != 0 {
        return Err(Error::EncodingOverflow {
            field,
            value: value as f64,
            digits,
        });
    }
    Ok(format!("D{value:0digits$X}"))
}

/// Record a ping and write the command that tells the splicer where the printer is
pub fn ping(out: &mut dyn Write, state: &mut ExtrusionState) -> Result<Ping> {
    let ping = state.record_ping();
    gcode_comment(out, "-- ping! --")?;
    dwell(out)?;
    writeln!(out, "O31 {}", float_to_hex(ping.position as f32))?;
    gcode_comment(out, "-- /ping --")?;
    Ok(ping)
}

/// Write the header for a finished run. Must come before the program body.
pub fn write_header(
    out: &mut dyn Write,
    state: &ExtrusionState,
    settings: &GeneratorSettings,
    printer_profile: &str,
) -> Result<()> {
    let splices = state.splices();

    // Build every fixed-width field first so an overflow leaves `out` untouched
    let version = hex_field("version", MSF_VERSION as u64, 4)?;
    let splice_count = hex_field("splice count", splices.len() as u64, 4)?;
    let ping_count = hex_field("ping count", state.pings().len() as u64, 4)?;
    let colors = settings
        .colors
        .iter()
        .map(|c| {
            hex_field("color", c.rgb as u64, 6)
                .map(|rgb| format!("D{}{}{}", c.kind, &rgb[1..], c.name))
        })
        .collect::<Result<Vec<_>>>()?
        .join(" ");
    let total = state.total_extruded();
    if !(0.0..=u32::MAX as f64).contains(&total) {
        return Err(Error::EncodingOverflow {
            field: "total extrusion",
            value: total,
            digits: 8,
        });
    }
    // Reported as whole millimeters
    let total_field = hex_field("total extrusion", total as u64, 8)?;

    writeln!(out, "O21 {version} ; msf version 2.0 (20 = 0x14)")?;
    writeln!(out, "O22 D{printer_profile}")?;
    writeln!(out, "O23 D0001 ; unused")?;
    writeln!(out, "O24 D0000 ; unused")?;
    writeln!(
        out,
        "O25 {colors} ; inputs: filament type + hex color + color_material"
    )?;
    writeln!(out, "O26 {splice_count} ; number of splices")?;
    writeln!(out, "O27 {ping_count} ; number of pings")?;
    writeln!(out, "O28 D0001 ; number of splice algorithms")?;
    writeln!(out, "O29 D0000 ; number of hotswaps")?;
    for splice in splices {
        writeln!(
            out,
            "O30 D{} {}",
            splice.tool,
            float_to_hex(splice.end() as f32)
        )?;
    }
    writeln!(out, "O32 D11 D0000 D0000 D0000 ; splice algorithm table")?;
    writeln!(out, "O1 D{} {total_field}", settings.job_name)?;

    write!(out, "\n\n")?;
    for splice in splices {
        writeln!(
            out,
            "; Tool: {} Location: {:.2} length {:.2}  ends {:.2} ({})",
            splice.tool,
            splice.position,
            splice.length,
            splice.end(),
            float_to_hex(splice.end() as f32)
        )?;
    }
    write!(out, "\n\n")?;

    writeln!(out, "M0")?;
    writeln!(out, "T0")?;
    writeln!(out, "M107")?;

    info!(
        "Header: {} splices, {} pings, {:.2}mm of filament",
        splices.len(),
        state.pings().len(),
        total
    );
    Ok(())
}

/// What a header and its inline pings say, read back from a finished program
#[derive(Debug, Default, Clone, PartialEq)]
pub struct DecodedProgram {
    pub splice_count: usize,
    pub ping_count: usize,
    /// Tool and end position of each splice
    pub splice_ends: Vec<(usize, f32)>,
    /// Positions carried by the inline ping commands
    pub pings: Vec<f32>,
    pub total_extruded: u32,
}

fn field<'a>(toks: &[&'a str], i: usize, line: &str) -> Result<&'a str> {
    toks.get(i)
        .copied()
        .ok_or_else(|| Error::Decode(line.to_string()))
}

fn hex_count(tok: &str) -> Result<u64> {
    let digits = tok
        .strip_prefix('D')
        .ok_or_else(|| Error::Decode(tok.to_string()))?;
    u64::from_str_radix(digits, 16).map_err(|_| Error::Decode(tok.to_string()))
}

pub fn decode_program(text: &str) -> Result<DecodedProgram> {
    let mut decoded = DecodedProgram::default();
    for line in text.lines() {
        // Drop trailing comments
        let code = line.split(';').next().unwrap_or("").trim();
        let toks: Vec<&str> = code.split_whitespace().collect();
        match toks.first().copied() {
            Some("O26") => decoded.splice_count = hex_count(field(&toks, 1, line)?)? as usize,
            Some("O27") => decoded.ping_count = hex_count(field(&toks, 1, line)?)? as usize,
            Some("O30") => {
                let tool = field(&toks, 1, line)?
                    .strip_prefix('D')
                    .and_then(|t| t.parse::<usize>().ok())
                    .ok_or_else(|| Error::Decode(line.to_string()))?;
                let end = hex_to_float(field(&toks, 2, line)?)?;
                decoded.splice_ends.push((tool, end));
            }
            Some("O31") => decoded.pings.push(hex_to_float(field(&toks, 1, line)?)?),
            Some("O1") => {
                let total = hex_count(field(&toks, 2, line)?)?;
                decoded.total_extruded =
                    u32::try_from(total).map_err(|_| Error::Decode(line.to_string()))?;
            }
            _ => {}
        }
    }
    Ok(decoded)
}
