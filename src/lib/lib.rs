use std::io::Write;

pub mod config;
mod error;
pub mod filament;
pub mod geometry;
pub mod layout;
pub mod msf;
pub mod patterns;
pub mod program;
pub mod tracker;

pub use error::{Error, Result};

pub fn gcode_comment(file: &mut dyn Write, s: &str) -> Result<()> {
    writeln!(file, "; {s}")?;
    Ok(())
}

/// Absolute extrusion mode, with the E axis zeroed
pub fn absolute_e(file: &mut dyn Write) -> Result<()> {
    writeln!(file, "M82")?;
    writeln!(file, "G92 E0")?;
    Ok(())
}

/// Relative extrusion mode, with the E axis zeroed
pub fn relative_e(file: &mut dyn Write) -> Result<()> {
    writeln!(file, "M83")?;
    writeln!(file, "G92 E0")?;
    Ok(())
}

/// Zero-length dwell. Flushes the planner so anything after it happens at a known position.
pub fn dwell(file: &mut dyn Write) -> Result<()> {
    writeln!(file, "G4 S0")?;
    Ok(())
}

trait AsGVals {
    fn as_gvals(&self, file: &mut dyn Write) -> Result<()>;
}

#[derive(Clone, Debug, Default)]
pub struct PosAndFeed {
    x: Option<f64>,
    y: Option<f64>,
    z: Option<f64>,
    e: Option<f64>,
    feed: Option<f64>,
}

pub fn xyf(x: f64, y: f64, feed: f64) -> PosAndFeed {
    PosAndFeed {
        x: Some(x),
        y: Some(y),
        feed: Some(feed),
        ..Default::default()
    }
}

pub fn xe(x: f64, e: f64) -> PosAndFeed {
    PosAndFeed {
        x: Some(x),
        e: Some(e),
        ..Default::default()
    }
}

pub fn xef(x: f64, e: f64, feed: f64) -> PosAndFeed {
    PosAndFeed {
        x: Some(x),
        e: Some(e),
        feed: Some(feed),
        ..Default::default()
    }
}

pub fn ye(y: f64, e: f64) -> PosAndFeed {
    PosAndFeed {
        y: Some(y),
        e: Some(e),
        ..Default::default()
    }
}

pub fn yef(y: f64, e: f64, feed: f64) -> PosAndFeed {
    PosAndFeed {
        y: Some(y),
        e: Some(e),
        feed: Some(feed),
        ..Default::default()
    }
}

pub fn zf(z: f64, feed: f64) -> PosAndFeed {
    PosAndFeed {
        z: Some(z),
        feed: Some(feed),
        ..Default::default()
    }
}

pub fn ef(e: f64, feed: f64) -> PosAndFeed {
    PosAndFeed {
        e: Some(e),
        feed: Some(feed),
        ..Default::default()
    }
}

impl AsGVals for PosAndFeed {
    fn as_gvals(&self, file: &mut dyn Write) -> Result<()> {
        if self.x.is_none() && self.y.is_none() && self.z.is_none() && self.e.is_none() {
            return Err(Error::IllegalMove("no axis words"));
        }
        g_val(file, "X", self.x, 3)?;
        g_val(file, "Y", self.y, 3)?;
        g_val(file, "Z", self.z, 3)?;
        g_val(file, "E", self.e, 4)?;
        g_val(file, "F", self.feed, 2)?;
        Ok(())
    }
}

/// Emit a gcode parameter value, if `ov` is `Some`.
/// To make the gcode human-friendly, numbers that round nicely are printed in their minimal form.
fn g_val(file: &mut dyn Write, name: &str, ov: Option<f64>, precision: usize) -> Result<()> {
    if let Some(v) = ov {
        if (v - v.round()).abs() < f64::EPSILON {
            write!(file, " {}{}", name, v.round())?;
        } else {
            write!(file, " {name}{v:.precision$}")?;
        }
    }
    Ok(())
}

fn g_move_linear(file: &mut dyn Write, g: &str, p: &dyn AsGVals) -> Result<()> {
    write!(file, "{g}")?;
    p.as_gvals(file)?;
    writeln!(file)?;
    Ok(())
}

/// Travel move. Never extrudes.
pub fn g0(file: &mut dyn Write, p: PosAndFeed) -> Result<()> {
    if p.e.is_some() {
        return Err(Error::IllegalMove("g0 moves must not extrude"));
    }
    g_move_linear(file, "G0", &p)
}

pub fn g1(file: &mut dyn Write, p: PosAndFeed) -> Result<()> {
    g_move_linear(file, "G1", &p)
}
