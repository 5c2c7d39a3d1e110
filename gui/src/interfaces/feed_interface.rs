use flume::{Receiver, TryRecvError};
use livetiming::core::render_driver::RenderDriver;
use livetiming::interfaces::telemetry::TelemetryBatch;

/// FeedInterface hands the telemetry batches arriving from the producer thread to the render
/// driver on the GUI thread.
#[derive(Debug)]
pub struct FeedInterface {
    pub rx: Receiver<TelemetryBatch>,
    pub no_received: u64,
    pub connected: bool,
}

impl FeedInterface {
    pub fn new(rx: Receiver<TelemetryBatch>) -> FeedInterface {
        FeedInterface {
            rx,
            no_received: 0,
            connected: true,
        }
    }

    /// update ingests every batch received since the last call at `now` (ms) and returns their
    /// number.
    pub fn update(&mut self, render_driver: &mut RenderDriver, now: f64) -> usize {
        let mut no_batches = 0;

        loop {
            match self.rx.try_recv() {
                Ok(batch) => {
                    render_driver.ingest(&batch, now);
                    no_batches += 1;
                }
                Err(TryRecvError::Empty) => break,
                Err(TryRecvError::Disconnected) => {
                    if self.connected {
                        log::info!(
                            "Telemetry feed disconnected, cars freeze at their last position"
                        );
                        self.connected = false;
                    }
                    break;
                }
            }
        }

        self.no_received += no_batches as u64;
        no_batches
    }
}
