//! Slicer configuration and generator settings.
//!
//! The slicer embeds its whole configuration as `; key = value` comments at the end of the
//! G-code it writes. Vendor settings for the splicer sit at the top of the file as
//! `; P2PP KEY = value` lines and are stored here as `P2PP_KEY`.
use std::collections::HashMap;
use std::fs::read_to_string;
use std::path::Path;

use nalgebra::geometry::Point2;
use regex::Regex;
use tracing::debug;

use crate::geometry::Rect;
use crate::{Error, Result};

/// Slicer comment that ends the header and starts the config dump
const CONFIG_START: &str = "; estimated printing time";

#[derive(Debug, Default, Clone)]
pub struct SlicerConfig {
    raw: HashMap<String, String>,
}

impl SlicerConfig {
    pub fn load(path: &Path) -> Result<Self> {
        let data = read_to_string(path)?;
        Self::parse(&data)
    }

    pub fn parse(data: &str) -> Result<Self> {
        let vendor_re = Regex::new(r";\s*P2PP\s+(\S+)\s*=\s*(\S+)")
            .map_err(|e| Error::Config(e.to_string()))?;

        let mut raw = HashMap::new();
        let mut in_dump = false;
        for line in data.lines() {
            if !in_dump {
                // Vendor settings only appear above the config dump
                if let Some(caps) = vendor_re.captures(line) {
                    raw.insert(format!("P2PP_{}", &caps[1]), caps[2].to_string());
                }
                if line.starts_with(CONFIG_START) {
                    in_dump = true;
                }
                continue;
            }
            if let Some(kv) = line.strip_prefix("; ") {
                if let Some((key, value)) = kv.split_once(" = ") {
                    raw.insert(key.to_string(), value.to_string());
                }
            }
        }
        debug!("Read {} configuration values", raw.len());
        Ok(SlicerConfig { raw })
    }

    pub fn insert(&mut self, key: &str, value: &str) {
        self.raw.insert(key.to_string(), value.to_string());
    }

    pub fn as_string(&self, key: &str) -> Result<&str> {
        self.raw
            .get(key)
            .map(String::as_str)
            .ok_or_else(|| Error::MissingKey(key.to_string()))
    }

    pub fn as_float(&self, key: &str) -> Result<f64> {
        let v = self.as_string(key)?;
        v.trim()
            .parse::<f64>()
            .map_err(|_| Error::invalid_value(key, v))
    }

    pub fn as_string_array(&self, key: &str) -> Result<Vec<&str>> {
        Ok(self.as_string(key)?.split(',').collect())
    }

    pub fn as_float_array(&self, key: &str) -> Result<Vec<f64>> {
        self.as_string_array(key)?
            .into_iter()
            .map(|tok| {
                tok.trim()
                    .parse::<f64>()
                    .map_err(|_| Error::invalid_value(key, tok))
            })
            .collect()
    }

    /// Per-extruder settings are arrays. We only print with the values for the first extruder.
    fn first_float(&self, key: &str) -> Result<f64> {
        self.as_float_array(key)?
            .first()
            .copied()
            .ok_or_else(|| Error::Config(format!("`{key}` is empty")))
    }

    fn first_string(&self, key: &str) -> Result<String> {
        match self.as_string_array(key)?.first() {
            Some(v) if !v.trim().is_empty() => Ok(v.trim().to_string()),
            _ => Err(Error::Config(format!("`{key}` is empty"))),
        }
    }

    /// Only rectangular beds are supported.
    /// `bed_shape = 0x0,250x0,250x210,0x210`
    pub fn bed_shape(&self) -> Result<Rect> {
        let shape = self.as_string("bed_shape")?;
        let corners = shape
            .split(',')
            .map(|corner| {
                let (x, y) = corner
                    .trim()
                    .split_once('x')
                    .ok_or_else(|| Error::BedShape(shape.to_string()))?;
                let x = x.parse::<f64>().map_err(|_| Error::BedShape(shape.to_string()))?;
                let y = y.parse::<f64>().map_err(|_| Error::BedShape(shape.to_string()))?;
                Ok(Point2::new(x, y))
            })
            .collect::<Result<Vec<_>>>()?;
        Rect::bounding(&corners).ok_or_else(|| Error::BedShape(shape.to_string()))
    }
}

/// Typed snapshot of everything the generator reads from the slicer
#[derive(Debug, Clone)]
pub struct PrintConfig {
    pub extrusion_width: f64,
    pub layer_height: f64,
    pub filament_diameter: f64,
    pub first_layer_bed_temperature: String,
    pub first_layer_temperature: String,
    pub retract_length: f64,
    /// mm/s, as the slicer stores it
    pub retract_speed: f64,
    pub start_gcode: String,
    pub end_gcode: String,
    pub bed: Rect,
    /// Filament length past a splice before the new color is considered clean
    pub splice_offset: f64,
    /// Filament left over after the last splice
    pub extra_end_filament: f64,
    /// Filament between pings
    pub linear_ping: f64,
    pub printer_profile: String,
}

impl PrintConfig {
    pub fn from_slicer(c: &SlicerConfig) -> Result<Self> {
        Ok(PrintConfig {
            extrusion_width: c.as_float("extrusion_width")?,
            layer_height: c.as_float("layer_height")?,
            filament_diameter: c.first_float("filament_diameter")?,
            first_layer_bed_temperature: c.first_string("first_layer_bed_temperature")?,
            first_layer_temperature: c.first_string("first_layer_temperature")?,
            retract_length: c.first_float("retract_length")?,
            retract_speed: c.first_float("retract_speed")?,
            start_gcode: c.as_string("start_gcode")?.to_string(),
            end_gcode: c.as_string("end_gcode")?.to_string(),
            bed: c.bed_shape()?,
            splice_offset: c.as_float("P2PP_SPLICEOFFSET")?,
            extra_end_filament: c.as_float("P2PP_EXTRAENDFILAMENT")?,
            linear_ping: c.as_float("P2PP_LINEARPING")?,
            printer_profile: c.as_string("P2PP_PRINTERPROFILE")?.trim().to_string(),
        })
    }

    /// Retract feed, in mm/min
    pub fn retract_feed(&self) -> f64 {
        self.retract_speed * 60.0
    }
}

/// One entry of the header color table: filament kind, color and a label
#[derive(Debug, Clone)]
pub struct ColorEntry {
    pub kind: u8,
    pub rgb: u32,
    pub name: String,
}

impl ColorEntry {
    pub fn new(kind: u8, rgb: u32, name: &str) -> Self {
        ColorEntry {
            kind,
            rgb,
            name: name.to_string(),
        }
    }
}

/// Knobs of the generator itself, as opposed to the printer
#[derive(Debug, Clone)]
pub struct GeneratorSettings {
    /// Space left around the edge of the bed, in mm
    pub margin: f64,
    /// Space between grid cells, in mm
    pub padding: f64,
    /// Nominal volume of one fill line, in mm³
    pub line_volume: f64,
    /// Filament used by the start code's priming line, in mm
    pub priming_stroke: f64,
    /// Volume of the first square, printed with the starting tool, in mm³
    pub initial_volume: f64,
    /// Volume of every square that follows a toolchange, in mm³
    pub transition_volume: f64,
    /// Length of an annotation stroke, in mm
    pub annotation_stroke: f64,
    pub travel_feed: f64,
    pub print_feed: f64,
    pub z_feed: f64,
    /// Lift after each square
    pub z_hop: f64,
    /// Tool selected by the final toolchange, which flushes the last splice
    pub sentinel_tool: usize,
    /// Start/end code lines with this prefix are for the splicer post-processor, not the printer
    pub vendor_marker: String,
    pub job_name: String,
    pub colors: Vec<ColorEntry>,
}

impl Default for GeneratorSettings {
    fn default() -> Self {
        GeneratorSettings {
            margin: 10.0,
            padding: 5.0,
            line_volume: 5.0,
            priming_stroke: 21.5,
            initial_volume: 200.0,
            transition_volume: 500.0,
            annotation_stroke: 5.0,
            travel_feed: 9000.0,
            print_feed: 4000.0,
            z_feed: 600.0,
            z_hop: 0.5,
            sentinel_tool: 5,
            vendor_marker: ";P2PP".to_string(),
            job_name: "bleedsquares".to_string(),
            colors: vec![
                ColorEntry::new(1, 0xFFFFFF, "White_PLA"),
                ColorEntry::new(1, 0x0F80FF, "DodgerBlue_PLA"),
                ColorEntry::new(1, 0xE8D89A, "Khaki_PLA"),
                ColorEntry::new(1, 0x000000, "Black_PLA"),
            ],
        }
    }
}
