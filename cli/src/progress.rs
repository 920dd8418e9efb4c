//! Step-style progress printing, shared across subcommands.

use std::time::Instant;

use scenery_core::prelude::Observer;

pub fn print_step(current: usize, total: usize, msg: &str) {
    println!("[{current}/{total}] {msg}");
}

/// Bridges [`scenery_core`]'s out-of-band progress reporting to stdout.
pub struct StdoutObserver;

impl Observer for StdoutObserver {
    fn on_progress(&self, message: &str) {
        println!("{message}");
    }
}

pub fn print_done(started: Instant) {
    println!("done in {:.2}s", started.elapsed().as_secs_f64());
}
