// Broadcast demo command

use anyhow::{Context, Result};
use futures::StreamExt;
use serde::Serialize;
use switchyard_core::broadcast::{Broadcaster, BroadcasterConfig};
use tracing::debug;

use crate::output::{print_table_header, print_table_row, OutputFormat};

#[derive(Debug, Serialize)]
pub struct ReceiverReport {
    pub receiver: usize,
    pub received: usize,
    pub sum: u64,
}

pub async fn run(output: OutputFormat, receivers: usize, values: u64) -> Result<()> {
    let config = BroadcasterConfig::from_env().context("Failed to read broadcaster configuration")?;
    let broadcaster = Broadcaster::with_config(config);

    let expected = usize::try_from(values).context("Too many values")?;
    let mut readers = Vec::with_capacity(receivers);
    for receiver in 0..receivers {
        let rx = broadcaster
            .listen()
            .await
            .context("Failed to create receiver")?;
        readers.push(tokio::spawn(async move {
            let received: Vec<u64> = rx.into_stream().take(expected).collect().await;
            ReceiverReport {
                receiver,
                received: received.len(),
                sum: received.iter().sum(),
            }
        }));
    }

    for value in 1..=values {
        broadcaster
            .write(value)
            .await
            .with_context(|| format!("Failed to write value {value}"))?;
    }

    // Receivers listened before the first write, so each one reads every value.
    let mut reports = Vec::with_capacity(receivers);
    for reader in readers {
        reports.push(reader.await.context("Receiver task failed")?);
    }

    broadcaster.close();
    debug!(receivers, values, "Broadcaster closed");

    if output.is_text() {
        print_table_header(&[("RECEIVER", 10), ("RECEIVED", 10), ("SUM", 12)]);
        for report in &reports {
            print_table_row(&[
                (&report.receiver.to_string(), 10),
                (&report.received.to_string(), 10),
                (&report.sum.to_string(), 12),
            ]);
        }
    } else {
        output.print_value(&serde_json::json!({ "data": reports, "total": reports.len() }))?;
    }

    Ok(())
}
