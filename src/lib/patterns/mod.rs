//! Purge squares and the annotation strokes that mark where a color change lands in them.
use std::io::Write;

use nalgebra::geometry::Point2;
use nalgebra::Vector2;

use crate::config::{GeneratorSettings, PrintConfig};
use crate::filament::{filament_cross_section, length_for_volume, line_cross_section};
use crate::msf::ping;
use crate::tracker::ExtrusionState;
use crate::{absolute_e, dwell, ef, g0, g1, gcode_comment, relative_e, xef, xe, xyf, ye, yef, zf};
use crate::{Error, Result};

/// Cross-sections for the current extrusion settings, and the fill line width they give
#[derive(Debug, Clone, Copy)]
struct LineGeometry {
    line_xs: f64,
    filament_xs: f64,
    width: f64,
}

pub struct SquareEmitter<'a> {
    config: &'a PrintConfig,
    settings: &'a GeneratorSettings,
}

impl<'a> SquareEmitter<'a> {
    pub fn new(config: &'a PrintConfig, settings: &'a GeneratorSettings) -> Self {
        SquareEmitter { config, settings }
    }

    fn geometry(&self) -> Result<LineGeometry> {
        let line_xs = line_cross_section(self.config.extrusion_width, self.config.layer_height);
        let filament_xs = filament_cross_section(self.config.filament_diameter);
        if line_xs <= 0.0 || filament_xs <= 0.0 {
            return Err(Error::geometry(format!(
                "non-positive cross-section: line {line_xs:.4}mm², filament {filament_xs:.4}mm²"
            )));
        }
        // A line is one X move plus one Y step, so line_volume / line_xs is the length
        // of the pair. Take the Y step away to get the X move.
        let width =
            length_for_volume(self.settings.line_volume, line_xs) - self.config.extrusion_width;
        if width <= 0.0 {
            return Err(Error::geometry(format!("fill lines would be {width:.3}mm wide")));
        }
        Ok(LineGeometry {
            line_xs,
            filament_xs,
            width,
        })
    }

    /// Width and height of the outline of a square holding `volume` mm³
    pub fn footprint(&self, volume: f64) -> Result<Vector2<f64>> {
        let g = self.geometry()?;
        let ew = self.config.extrusion_width;
        Ok(Vector2::new(
            g.width + ew,
            ((volume / self.settings.line_volume) + 1.0) * ew,
        ))
    }

    fn ping_if_due(&self, out: &mut dyn Write, state: &mut ExtrusionState) -> Result<()> {
        if state.ping_due(self.config.linear_ping) {
            ping(out, state)?;
        }
        Ok(())
    }

    /// Print a square of about `volume` mm³ hanging down and right from `at`.
    ///
    /// Returns how far the fill moved down while the current splice was still inside the
    /// splice offset, which is where the color change shows up in the square.
    pub fn purge_square(
        &self,
        out: &mut dyn Write,
        state: &mut ExtrusionState,
        at: Point2<f64>,
        volume: f64,
    ) -> Result<f64> {
        let c = self.config;
        let s = self.settings;
        let g = self.geometry()?;
        let ystep = c.extrusion_width;

        // Split one line's volume between its X move and its Y step
        let ystep_volume = ystep * g.line_xs;
        let x_volume = s.line_volume - ystep_volume;
        let x_len = length_for_volume(x_volume, g.filament_xs);
        let y_len = length_for_volume(ystep_volume, g.filament_xs);

        let size = self.footprint(volume)?;
        let (box_width, box_height) = (size.x, size.y);

        writeln!(out)?;
        gcode_comment(
            out,
            &format!(
                "--- purge block at {:.2}, {:.2} layer height {:.2} ---",
                at.x, at.y, c.layer_height
            ),
        )?;
        writeln!(out)?;

        g0(out, xyf(at.x + box_width, at.y, s.travel_feed))?;
        g1(out, zf(c.layer_height, s.z_feed))?;

        // We arrive retracted: undo it. Not counted, it only refills the nozzle.
        absolute_e(out)?;
        dwell(out)?;
        g1(out, ef(c.retract_length, c.retract_feed()))?;
        absolute_e(out)?;

        // Outline: down the right side, across the bottom, back up the left
        let mut e = 0.0;
        let edge = |len: f64| length_for_volume(len * g.line_xs, g.filament_xs);
        self.ping_if_due(out, state)?;
        e += state.extrude(edge(box_height));
        g1(out, yef(at.y - box_height, e, s.print_feed))?;
        self.ping_if_due(out, state)?;
        e += state.extrude(edge(box_width));
        g1(out, xe(at.x, e))?;
        self.ping_if_due(out, state)?;
        e += state.extrude(edge(box_height));
        g1(out, yef(at.y, e, s.print_feed))?;

        let remaining = volume - e * g.filament_xs;

        // Zigzag fill. The budget bounds the pass count, so the last pass may overshoot the volume.
        let right = at.x + g.width + c.extrusion_width / 2.0;
        let left = at.x + c.extrusion_width / 2.0;
        let mut y = at.y;
        let mut transition_ystep = 0.0;
        let mut budget = 0.0;
        while budget < remaining {
            budget += s.line_volume * 2.0;
            for (i, x) in [right, left].into_iter().enumerate() {
                self.ping_if_due(out, state)?;
                e += state.extrude(x_len);
                if i == 0 {
                    g1(out, xef(x, e, s.print_feed))?;
                } else {
                    g1(out, xe(x, e))?;
                }

                self.ping_if_due(out, state)?;
                e += state.extrude(y_len);
                y -= ystep;
                g1(out, ye(y, e))?;

                if state.current_splice() < c.splice_offset {
                    transition_ystep += ystep;
                }
            }
        }

        // Retract and lift clear
        absolute_e(out)?;
        g1(out, ef(-c.retract_length, c.retract_feed()))?;
        g1(out, zf(c.layer_height + s.z_hop, s.z_feed))?;
        writeln!(out)?;
        gcode_comment(out, "--- end purge block ---")?;
        writeln!(out)?;

        Ok(transition_ystep)
    }

    /// Mark the color change in the square at `at`, `ystep` below its top edge, with a short
    /// stroke in from each side.
    pub fn annotate(
        &self,
        out: &mut dyn Write,
        state: &mut ExtrusionState,
        at: Point2<f64>,
        ystep: f64,
    ) -> Result<()> {
        let c = self.config;
        let s = self.settings;
        let g = self.geometry()?;
        let stroke_len = length_for_volume(g.line_xs * s.annotation_stroke, g.filament_xs);
        let y = at.y - ystep;
        let hover = c.layer_height * 2.5;
        let draw = c.layer_height * 2.0;

        gcode_comment(out, "---- annotating ----")?;
        relative_e(out)?;
        for (start, end) in [
            (at.x, at.x + s.annotation_stroke),
            (at.x + g.width, at.x + g.width - s.annotation_stroke),
        ] {
            self.ping_if_due(out, state)?;
            g1(out, zf(hover, s.z_feed))?;
            g0(out, xyf(start, y, s.travel_feed))?;
            g1(out, ef(c.retract_length, c.retract_feed()))?;
            g1(out, zf(draw, s.z_feed))?;
            g1(out, xef(end, state.extrude(stroke_len), s.print_feed))?;
            g1(out, ef(-c.retract_length, c.retract_feed()))?;
        }
        g1(out, zf(hover, s.z_feed))?;
        gcode_comment(out, "---- annotating end ----")?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::tests::sample_config;

    const EPSILON: f64 = 1e-9;

    fn scenario_config() -> PrintConfig {
        let mut c = sample_config();
        c.extrusion_width = 0.4;
        c.layer_height = 0.2;
        c.filament_diameter = 1.75;
        c
    }

    #[test]
    fn test_scenario_square() {
        let config = scenario_config();
        let settings = GeneratorSettings::default();
        let emitter = SquareEmitter::new(&config, &settings);
        let mut state = ExtrusionState::new(0);
        let mut out: Vec<u8> = Vec::new();

        let ty = emitter
            .purge_square(&mut out, &mut state, Point2::new(10.0, 290.0), 200.0)
            .unwrap();
        let height = emitter.footprint(200.0).unwrap().y;

        assert!(state.total_extruded() > 0.0);
        assert!(ty >= 0.0);
        assert!(ty <= height, "{ty} > {height}");
        assert!((state.current_splice() - state.total_extruded()).abs() < EPSILON);
    }

    #[test]
    fn test_current_splice_is_sum_of_emitted_deltas() {
        let config = scenario_config();
        let settings = GeneratorSettings::default();
        let emitter = SquareEmitter::new(&config, &settings);
        let mut state = ExtrusionState::new(0);
        let mut out: Vec<u8> = Vec::new();
        emitter
            .purge_square(&mut out, &mut state, Point2::new(10.0, 290.0), 200.0)
            .unwrap();

        // In absolute mode the last E word before the final reset is the running total
        let text = String::from_utf8(out).unwrap();
        let last_e = text
            .lines()
            .filter(|l| l.starts_with("G1 X") || l.starts_with("G1 Y"))
            .filter_map(|l| l.split_whitespace().find(|w| w.starts_with('E')))
            .last()
            .unwrap()[1..]
            .parse::<f64>()
            .unwrap();
        assert!((last_e - state.current_splice()).abs() < 1e-4);
    }

    #[test]
    fn test_footprint() {
        let config = scenario_config();
        let settings = GeneratorSettings::default();
        let emitter = SquareEmitter::new(&config, &settings);
        let size = emitter.footprint(500.0).unwrap();
        // 5mm³ / 0.08mm² = 62.5mm per line
        assert!((size.x - 62.5).abs() < EPSILON);
        assert!((size.y - 40.4).abs() < EPSILON);
    }

    #[test]
    fn test_transition_band_grows_with_splice_offset() {
        let settings = GeneratorSettings::default();
        let mut near = scenario_config();
        near.splice_offset = 5.0;
        let mut far = scenario_config();
        far.splice_offset = 15.0;

        let mut ty = Vec::new();
        for config in [&near, &far] {
            let emitter = SquareEmitter::new(config, &settings);
            let mut state = ExtrusionState::new(0);
            state.toolchange(1, config.splice_offset);
            let mut out: Vec<u8> = Vec::new();
            let at = Point2::new(10.0, 290.0);
            ty.push(emitter.purge_square(&mut out, &mut state, at, 500.0).unwrap());
        }
        assert!(ty[0] < ty[1]);
    }

    #[test]
    fn test_no_transition_band_past_offset() {
        let settings = GeneratorSettings::default();
        let mut config = scenario_config();
        config.splice_offset = 0.0;
        let emitter = SquareEmitter::new(&config, &settings);
        let mut state = ExtrusionState::new(0);
        let ty = emitter
            .purge_square(&mut Vec::<u8>::new(), &mut state, Point2::new(10.0, 290.0), 500.0)
            .unwrap();
        assert_eq!(ty, 0.0);
    }

    #[test]
    fn test_ping_follows_the_line_crossing_the_threshold() {
        let settings = GeneratorSettings::default();
        let mut config = scenario_config();
        config.linear_ping = 10.0;
        let emitter = SquareEmitter::new(&config, &settings);
        let mut state = ExtrusionState::new(0);
        state.extrude(9.999);
        let mut out: Vec<u8> = Vec::new();
        emitter
            .purge_square(&mut out, &mut state, Point2::new(10.0, 290.0), 200.0)
            .unwrap();
        let text = String::from_utf8(out).unwrap();

        // The first outline edge crosses the threshold, the ping goes out before the second
        let lines: Vec<&str> = text.lines().collect();
        let ping_at = lines.iter().position(|l| l.starts_with("O31")).unwrap();
        let extruding =
            |l: &str| (l.starts_with("G1 X") || l.starts_with("G1 Y")) && l.contains(" E");
        assert_eq!(lines[..ping_at].iter().filter(|l| extruding(**l)).count(), 1);
        assert!(lines[ping_at - 3].starts_with("G1 Y"));
        assert!(lines[ping_at + 2].starts_with("G1 X"));
        assert!(state.pings()[0].position > 10.0);
        assert!(state.pings()[0].position < 10.0 + 1.0);
        // Never more than one move past the threshold
        assert!(state.since_last_ping() < config.linear_ping + 2.1);
    }

    #[test]
    fn test_ping_between_annotation_strokes() {
        let settings = GeneratorSettings::default();
        let mut config = scenario_config();
        config.linear_ping = 10.0;
        let emitter = SquareEmitter::new(&config, &settings);
        let mut state = ExtrusionState::new(0);
        state.extrude(9.999);
        let mut out: Vec<u8> = Vec::new();
        emitter
            .annotate(&mut out, &mut state, Point2::new(10.0, 290.0), 3.2)
            .unwrap();
        let text = String::from_utf8(out).unwrap();

        let lines: Vec<&str> = text.lines().collect();
        let strokes: Vec<usize> = lines
            .iter()
            .enumerate()
            .filter(|(_, l)| l.starts_with("G1 X"))
            .map(|(i, _)| i)
            .collect();
        assert_eq!(strokes.len(), 2);
        let ping_at = lines.iter().position(|l| l.starts_with("O31")).unwrap();
        assert!(strokes[0] < ping_at && ping_at < strokes[1]);
        assert_eq!(state.pings().len(), 1);
    }

    #[test]
    fn test_annotate_counts_strokes_only() {
        let config = scenario_config();
        let settings = GeneratorSettings::default();
        let emitter = SquareEmitter::new(&config, &settings);
        let mut state = ExtrusionState::new(0);
        let mut out: Vec<u8> = Vec::new();
        emitter
            .annotate(&mut out, &mut state, Point2::new(10.0, 290.0), 3.2)
            .unwrap();
        let stroke = 0.08 * 5.0 / filament_cross_section(1.75);
        assert!((state.total_extruded() - 2.0 * stroke).abs() < EPSILON);
        let text = String::from_utf8(out).unwrap();
        assert!(text.contains("G0 X10 Y286.800 F9000"));
        assert!(text.contains("G0 X72.100 Y286.800 F9000"));
        assert_eq!(text.matches("G1 E-0.8000").count(), 2);
    }

    #[test]
    fn test_bad_geometry() {
        let mut config = scenario_config();
        config.extrusion_width = 5.0;
        let settings = GeneratorSettings::default();
        let emitter = SquareEmitter::new(&config, &settings);
        let res = emitter.purge_square(
            &mut Vec::<u8>::new(),
            &mut ExtrusionState::new(0),
            Point2::new(0.0, 0.0),
            200.0,
        );
        assert!(matches!(res, Err(Error::Geometry(_))));
    }
}
