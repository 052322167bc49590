//! Reads back the splicer header and inline pings of a generated program
use anyhow::{Context, Result};
use bleed::msf::decode_program;
use std::fs::read_to_string;
use std::path::PathBuf;
use structopt::StructOpt;
use tracing_subscriber::EnvFilter;

#[derive(Debug, StructOpt)]
#[structopt(name = "msf_dump", about = "Decodes splice and ping positions from a program")]
struct Opt {
    /// Program to read
    #[structopt(parse(from_os_str))]
    input: PathBuf,
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let opt = Opt::from_args();
    let text = read_to_string(&opt.input)
        .with_context(|| format!("Failed to read {}", opt.input.display()))?;
    let decoded = decode_program(&text)?;

    println!(
        "{} splices, {} pings, {}mm total",
        decoded.splice_count, decoded.ping_count, decoded.total_extruded
    );
    for (i, (tool, end)) in decoded.splice_ends.iter().enumerate() {
        println!("splice {i:3}: T{tool} ends at {end:.2}mm");
    }
    for (i, position) in decoded.pings.iter().enumerate() {
        println!("ping   {i:3}: {position:.2}mm");
    }
    if decoded.splice_ends.len() != decoded.splice_count {
        println!(
            "warning: header announces {} splices but lists {}",
            decoded.splice_count,
            decoded.splice_ends.len()
        );
    }
    if decoded.pings.len() != decoded.ping_count {
        println!(
            "warning: header announces {} pings but the program has {}",
            decoded.ping_count,
            decoded.pings.len()
        );
    }
    Ok(())
}
