//! Filament accounting for one generation run.
//!
//! Every filament-consuming line written to the program goes through [`ExtrusionState::extrude`]
//! exactly once, in the order the lines are written. Splices and pings record positions taken
//! from these totals, so a line that skips the tracker or is counted out of order shifts every
//! position that follows it.
use tracing::debug;

/// A run of filament from one tool. `position` is where the splice sits on the filament,
/// `length` how much of the tool was used.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Splice {
    pub tool: usize,
    pub position: f64,
    pub length: f64,
}

impl Splice {
    pub fn end(&self) -> f64 {
        self.position + self.length
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Ping {
    pub position: f64,
}

#[derive(Debug, Clone, Default)]
pub struct ExtrusionState {
    total_extruded: f64,
    current_tool: usize,
    current_splice: f64,
    splice_start: f64,
    since_last_ping: f64,
    toolchanges: usize,
    splices: Vec<Splice>,
    pings: Vec<Ping>,
}

impl ExtrusionState {
    pub fn new(initial_tool: usize) -> Self {
        ExtrusionState {
            current_tool: initial_tool,
            ..Default::default()
        }
    }

    /// Account for `delta` mm of filament and hand it back, so it can go straight into the
    /// line being written
    pub fn extrude(&mut self, delta: f64) -> f64 {
        debug_assert!(delta >= 0.0, "negative extrusion {delta}");
        self.total_extruded += delta;
        self.current_splice += delta;
        self.since_last_ping += delta;
        delta
    }

    /// Close the current splice and start one for `new_tool`.
    /// `splice_offset` is added to the recorded start, matching where the splicer places it.
    pub fn toolchange(&mut self, new_tool: usize, splice_offset: f64) -> Splice {
        let splice = Splice {
            tool: self.current_tool,
            position: self.splice_start + splice_offset,
            length: self.current_splice,
        };
        debug!(
            "Toolchange T{} -> T{new_tool} at {:.2}mm, splice length {:.2}mm",
            self.current_tool, self.total_extruded, splice.length
        );
        self.splices.push(splice);
        self.current_tool = new_tool;
        self.current_splice = 0.0;
        self.splice_start = self.total_extruded;
        self.toolchanges += 1;
        splice
    }

    pub fn ping_due(&self, linear_ping: f64) -> bool {
        self.since_last_ping > linear_ping
    }

    /// Record a ping at the current position. Writing it out is up to the caller.
    pub fn record_ping(&mut self) -> Ping {
        let ping = Ping {
            position: self.total_extruded,
        };
        debug!("Ping at {:.2}mm", ping.position);
        self.pings.push(ping);
        self.since_last_ping = 0.0;
        ping
    }

    pub fn total_extruded(&self) -> f64 {
        self.total_extruded
    }

    pub fn current_tool(&self) -> usize {
        self.current_tool
    }

    pub fn current_splice(&self) -> f64 {
        self.current_splice
    }

    pub fn since_last_ping(&self) -> f64 {
        self.since_last_ping
    }

    pub fn toolchanges(&self) -> usize {
        self.toolchanges
    }

    pub fn splices(&self) -> &[Splice] {
        &self.splices
    }

    pub fn pings(&self) -> &[Ping] {
        &self.pings
    }
}
