//! Step counting.
//!
//! Raw sensor readings are cumulative since the sensor last started, while
//! the stored total survives restarts. The first reading of a run becomes
//! the offset, and every later reading is stored as
//! `reading - offset + baseline`, where the baseline is the total loaded
//! from the database (or the value of the last reset).

mod sensor;

pub use sensor::{LineSensor, StepSensor};

#[cfg(test)]
pub use sensor::mocks;

use sqlx::SqlitePool;
use tokio::sync::{broadcast, mpsc, oneshot};
use tokio::task::JoinHandle;

use crate::db;
use crate::error::{Error, Result};

/// Turns raw cumulative readings into a persistent total.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StepCounter {
    baseline: i64,
    offset: Option<i64>,
    total: i64,
}

impl StepCounter {
    pub fn new(baseline: i64) -> Self {
        Self {
            baseline,
            offset: None,
            total: baseline,
        }
    }

    /// Apply a raw reading and return the new total.
    pub fn record(&mut self, reading: i64) -> i64 {
        match self.offset {
            Some(offset) if reading >= offset => {}
            // First reading, or the sensor restarted below the offset
            _ => {
                self.baseline = self.total;
                self.offset = Some(reading);
            }
        }
        let offset = self.offset.unwrap_or(reading);
        self.total = reading - offset + self.baseline;
        self.total
    }

    /// Start counting from `value`. The next reading re-anchors the offset.
    pub fn reset(&mut self, value: i64) {
        self.baseline = value;
        self.offset = None;
        self.total = value;
    }

    pub fn total(&self) -> i64 {
        self.total
    }
}

/// Stored total, 0 when nothing has been recorded yet.
pub async fn load_total(pool: &SqlitePool) -> Result<i64> {
    Ok(db::get_step_count(pool)
        .await?
        .map_or(0, |row| row.total_steps))
}

pub async fn save_total(pool: &SqlitePool, total: i64) -> Result<()> {
    db::set_step_count(pool, total).await?;
    Ok(())
}

/// Published by the step service.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepEvent {
    /// The stored total changed
    Total(i64),
    /// The sensor has no more readings
    SensorClosed,
}

enum StepCommand {
    Reset(i64, oneshot::Sender<Result<i64>>),
    Total(oneshot::Sender<i64>),
}

/// Cloneable handle to the step service.
#[derive(Clone)]
pub struct StepHandle {
    tx: mpsc::Sender<StepCommand>,
    events: broadcast::Sender<StepEvent>,
}

impl StepHandle {
    /// Load the stored total and start counting readings from `sensor`.
    pub async fn spawn(
        pool: SqlitePool,
        sensor: Box<dyn StepSensor>,
    ) -> Result<(Self, JoinHandle<()>)> {
        let baseline = load_total(&pool).await?;
        tracing::info!(baseline, "Step counter started");

        let (tx, commands) = mpsc::channel(16);
        let (events, _) = broadcast::channel(64);
        let (readings_tx, readings) = mpsc::channel(64);

        tokio::spawn(read_sensor(sensor, readings_tx));

        let service = StepService {
            pool,
            counter: StepCounter::new(baseline),
            commands,
            readings,
            events: events.clone(),
        };
        let task = tokio::spawn(service.run());

        Ok((Self { tx, events }, task))
    }

    /// Set the total to `value` and store it immediately.
    pub async fn reset(&self, value: i64) -> Result<i64> {
        let (reply, rx) = oneshot::channel();
        self.tx
            .send(StepCommand::Reset(value, reply))
            .await
            .map_err(|_| Error::ChannelClosed)?;
        rx.await.map_err(|_| Error::ChannelClosed)?
    }

    pub async fn total(&self) -> Result<i64> {
        let (reply, rx) = oneshot::channel();
        self.tx
            .send(StepCommand::Total(reply))
            .await
            .map_err(|_| Error::ChannelClosed)?;
        rx.await.map_err(|_| Error::ChannelClosed)
    }

    pub fn subscribe(&self) -> broadcast::Receiver<StepEvent> {
        self.events.subscribe()
    }
}

async fn read_sensor(mut sensor: Box<dyn StepSensor>, readings: mpsc::Sender<i64>) {
    loop {
        match sensor.next_reading().await {
            Ok(Some(value)) => {
                if readings.send(value).await.is_err() {
                    break;
                }
            }
            Ok(None) => break,
            Err(e) => {
                tracing::warn!(error = %e, "Step sensor failed");
                break;
            }
        }
    }
    tracing::debug!("Step sensor closed");
}

struct StepService {
    pool: SqlitePool,
    counter: StepCounter,
    commands: mpsc::Receiver<StepCommand>,
    readings: mpsc::Receiver<i64>,
    events: broadcast::Sender<StepEvent>,
}

impl StepService {
    async fn run(mut self) {
        let mut sensor_open = true;

        loop {
            tokio::select! {
                command = self.commands.recv() => {
                    match command {
                        Some(StepCommand::Reset(value, reply)) => {
                            self.counter.reset(value);
                            let result = save_total(&self.pool, value).await.map(|()| value);
                            if result.is_ok() {
                                tracing::info!(total = value, "Step count reset");
                                let _ = self.events.send(StepEvent::Total(value));
                            }
                            let _ = reply.send(result);
                        }
                        Some(StepCommand::Total(reply)) => {
                            let _ = reply.send(self.counter.total());
                        }
                        None => break,
                    }
                }
                reading = self.readings.recv(), if sensor_open => {
                    match reading {
                        Some(value) => {
                            let total = self.counter.record(value);
                            if let Err(e) = save_total(&self.pool, total).await {
                                tracing::warn!(error = %e, total, "Could not store step count");
                            }
                            let _ = self.events.send(StepEvent::Total(total));
                        }
                        None => {
                            sensor_open = false;
                            let _ = self.events.send(StepEvent::SensorClosed);
                        }
                    }
                }
            }
        }
    }
}
