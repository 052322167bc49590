//! Conversions between extruded line volume and filament length.
//!
//! Everything here is full double precision. Rounding only happens when values are written out.

use std::f64::consts::PI;

/// Cross-section (mm²) of a deposited line
pub fn line_cross_section(extrusion_width: f64, layer_height: f64) -> f64 {
    extrusion_width * layer_height
}

/// Cross-section (mm²) of the raw filament
pub fn filament_cross_section(filament_diameter: f64) -> f64 {
    PI * (filament_diameter / 2.0).powi(2)
}

/// Length (mm) of filament with cross-section `cross_section` holding `volume` mm³
pub fn length_for_volume(volume: f64, cross_section: f64) -> f64 {
    volume / cross_section
}

#[cfg(test)]
mod tests {
    use super::*;

    const EPSILON: f64 = 1e-10;

    #[test]
    fn test_line_cross_section() {
        assert!((line_cross_section(0.4, 0.2) - 0.08).abs() < EPSILON);
    }

    #[test]
    fn test_filament_cross_section() {
        // 1.75mm filament is ~2.405mm²
        let a = filament_cross_section(1.75);
        assert!((a - 2.4052818754).abs() < 1e-9);
    }

    #[test]
    fn test_deposited_length_to_filament_length() {
        // A 10mm line, 0.4 wide, 0.2 high
        let volume = 10.0 * line_cross_section(0.4, 0.2);
        let len = length_for_volume(volume, filament_cross_section(1.75));
        assert!((len * filament_cross_section(1.75) - 0.8).abs() < EPSILON);
    }
}
