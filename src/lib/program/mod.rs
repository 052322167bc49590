//! Puts the whole calibration program together.
//!
//! The body is generated first, into memory, because the header in front of it needs the
//! final splice and ping tables.
use std::borrow::Cow;
use std::io::Write;

use nalgebra::geometry::Point2;
use tracing::{debug, info};

use crate::config::{GeneratorSettings, PrintConfig};
use crate::layout::{anchor, GridLayout, Square};
use crate::msf::write_header;
use crate::patterns::SquareEmitter;
use crate::tracker::ExtrusionState;
use crate::{absolute_e, ef, g1, gcode_comment, Error, Result};

/// Tool printed at each step, and whether it goes in that tool's color marker.
/// Steps 1 to 12 walk every ordered pair of the four tools once. The markers for tools 1-3
/// come last, each entered from the tool before it.
const TRAVERSAL: [(usize, bool); 16] = [
    (0, true),
    (1, false),
    (2, false),
    (3, false),
    (0, false),
    (2, false),
    (1, false),
    (3, false),
    (2, false),
    (0, false),
    (3, false),
    (1, false),
    (0, false),
    (1, true),
    (2, true),
    (3, true),
];

/// One square of the traversal, printed with `to` after a change from `from`
#[derive(Debug, Clone, Copy)]
pub struct Step<'l> {
    pub from: usize,
    pub to: usize,
    pub square: &'l Square,
}

pub fn plan_traversal(layout: &GridLayout) -> Result<Vec<Step<'_>>> {
    let mut from = TRAVERSAL[0].0;
    TRAVERSAL
        .iter()
        .map(|&(to, marker)| {
            let square = if marker {
                layout.square_for(to, to)
            } else {
                layout.square_for(from, to)
            }
            .ok_or_else(|| Error::geometry(format!("no square for T{from} -> T{to}")))?;
            let step = Step { from, to, square };
            from = to;
            Ok(step)
        })
        .collect()
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RunSummary {
    pub toolchanges: usize,
    pub splices: usize,
    pub pings: usize,
    pub total_extruded: f64,
}

pub struct Program<'a> {
    config: &'a PrintConfig,
    settings: &'a GeneratorSettings,
    layout: GridLayout,
}

impl<'a> Program<'a> {
    pub fn new(config: &'a PrintConfig, settings: &'a GeneratorSettings) -> Result<Self> {
        let layout = GridLayout::plan(&config.bed, settings.margin, settings.padding)?;
        Ok(Program {
            config,
            settings,
            layout,
        })
    }

    pub fn layout(&self) -> &GridLayout {
        &self.layout
    }

    /// Write the complete program, header first. Nothing is written if generation fails.
    pub fn generate(&self, out: &mut dyn Write) -> Result<RunSummary> {
        let mut state = ExtrusionState::new(TRAVERSAL[0].0);
        let mut body: Vec<u8> = Vec::new();
        self.write_body(&mut body, &mut state)?;

        let mut header: Vec<u8> = Vec::new();
        write_header(
            &mut header,
            &state,
            self.settings,
            &self.config.printer_profile,
        )?;
        out.write_all(&header)?;
        out.write_all(&body)?;

        let summary = RunSummary {
            toolchanges: state.toolchanges(),
            splices: state.splices().len(),
            pings: state.pings().len(),
            total_extruded: state.total_extruded(),
        };
        info!(
            "Generated {} squares, {} splices, {} pings, {:.2}mm of filament",
            TRAVERSAL.len(),
            summary.splices,
            summary.pings,
            summary.total_extruded
        );
        Ok(summary)
    }

    /// Everything after the header. Leaves `state` holding the final ledgers.
    pub fn write_body(&self, out: &mut dyn Write, state: &mut ExtrusionState) -> Result<()> {
        self.start_gcode(out, state)?;
        self.walk_grid(out, state)?;
        self.end_gcode(out, state)?;
        Ok(())
    }

    /// Copy a slicer G-code block, dropping lines meant for the splicer post-processor
    fn copy_block(&self, out: &mut dyn Write, block: &str, substitute: bool) -> Result<()> {
        // The slicer stores newlines as a literal `\n`
        for line in block.split("\\n") {
            if line.starts_with(&self.settings.vendor_marker) {
                continue;
            }
            let line = if substitute && (line.contains('[') || line.contains(']')) {
                Cow::Owned(
                    line.replacen(
                        "[first_layer_bed_temperature]",
                        &self.config.first_layer_bed_temperature,
                        1,
                    )
                    .replacen(
                        "[first_layer_temperature]",
                        &self.config.first_layer_temperature,
                        1,
                    ),
                )
            } else {
                Cow::Borrowed(line)
            };
            writeln!(out, "{line}")?;
        }
        Ok(())
    }

    fn start_gcode(&self, out: &mut dyn Write, state: &mut ExtrusionState) -> Result<()> {
        writeln!(out)?;
        gcode_comment(out, "--- BEGIN start_gcode ---")?;
        writeln!(out)?;
        self.copy_block(out, &self.config.start_gcode, true)?;
        absolute_e(out)?;
        g1(
            out,
            ef(-self.config.retract_length, self.config.retract_feed()),
        )?;
        writeln!(out)?;
        gcode_comment(out, "--- END start_gcode ---")?;
        writeln!(out)?;

        // The start code's own extrusion is not parsed. Its priming line is close enough to this.
        state.extrude(self.settings.priming_stroke);
        Ok(())
    }

    fn walk_grid(&self, out: &mut dyn Write, state: &mut ExtrusionState) -> Result<()> {
        let emitter = SquareEmitter::new(self.config, self.settings);
        let cell = self.layout.cell_size();

        // A transition is annotated once the square after it is down
        let mut pending: Option<(Point2<f64>, f64)> = None;
        for (i, step) in plan_traversal(&self.layout)?.into_iter().enumerate() {
            let volume = if i == 0 {
                self.settings.initial_volume
            } else {
                state.toolchange(step.to, self.config.splice_offset);
                gcode_comment(out, &format!("toolchange T{} -> T{}", step.from, step.to))?;
                self.settings.transition_volume
            };

            let size = emitter.footprint(volume)?;
            if size.x > cell.x || size.y > cell.y {
                return Err(Error::geometry(format!(
                    "a {volume}mm³ square is {:.2} x {:.2}mm, grid cells are {:.2} x {:.2}mm",
                    size.x, size.y, cell.x, cell.y
                )));
            }

            let at = anchor(&self.layout, step.square);
            debug!(
                "Square {i}: T{} -> T{} in cell {:?}",
                step.from, step.to, step.square.cell
            );
            let ystep = emitter.purge_square(out, state, at, volume)?;

            if let Some((prev_at, prev_ystep)) = pending.take() {
                emitter.annotate(out, state, prev_at, prev_ystep)?;
            }
            if i > 0 {
                pending = Some((at, ystep));
            }
        }
        if let Some((prev_at, prev_ystep)) = pending {
            emitter.annotate(out, state, prev_at, prev_ystep)?;
        }
        Ok(())
    }

    fn end_gcode(&self, out: &mut dyn Write, state: &mut ExtrusionState) -> Result<()> {
        // The tail goes on the last splice, then a change to a tool that doesn't exist closes it
        state.extrude(self.config.extra_end_filament);
        state.toolchange(self.settings.sentinel_tool, self.config.splice_offset);

        writeln!(out)?;
        gcode_comment(out, "--- BEGIN end_gcode ---")?;
        writeln!(out)?;
        self.copy_block(out, &self.config.end_gcode, false)?;
        writeln!(out)?;
        gcode_comment(out, "--- END end_gcode ---")?;
        writeln!(out)?;
        Ok(())
    }
}
