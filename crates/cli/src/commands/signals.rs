// Signal combinator demo command

use std::time::{Duration, Instant};

use anyhow::{bail, Context, Result};
use serde::Serialize;
use switchyard_core::signal::{self, Signal};

use crate::output::{print_field, OutputFormat};

#[derive(Debug, Serialize)]
pub struct SignalsReport {
    pub delays_ms: Vec<u64>,
    pub or_ms: u128,
    pub and_ms: u128,
}

fn timers(delays_ms: &[u64]) -> Vec<Signal> {
    delays_ms
        .iter()
        .map(|ms| Signal::after(Duration::from_millis(*ms)))
        .collect()
}

async fn time_until_fired(signal: Signal) -> u128 {
    let started = Instant::now();
    signal.fired().await;
    started.elapsed().as_millis()
}

pub async fn run(output: OutputFormat, delays_ms: &[u64]) -> Result<()> {
    if delays_ms.is_empty() {
        bail!("At least one delay is required");
    }

    let any = signal::or(timers(delays_ms)).context("No signals to combine")?;
    let or_ms = time_until_fired(any).await;

    let all = signal::and(timers(delays_ms)).context("No signals to combine")?;
    let and_ms = time_until_fired(all).await;

    let report = SignalsReport {
        delays_ms: delays_ms.to_vec(),
        or_ms,
        and_ms,
    };

    if output.is_text() {
        let delays: Vec<String> = report.delays_ms.iter().map(u64::to_string).collect();
        print_field("Delays", &format!("{}ms", delays.join(", ")));
        print_field("OR fired", &format!("{}ms", report.or_ms));
        print_field("AND fired", &format!("{}ms", report.and_ms));
    } else {
        output.print_value(&report)?;
    }

    Ok(())
}
