//! Steps command - show, reset or track the step total.

use tokio::runtime::Runtime;
use tokio::sync::broadcast::error::RecvError;

use super::{Context, StepsCommand};
use crate::steps::{self, LineSensor, StepEvent, StepHandle, StepSensor};

pub fn cmd_steps(rt: &Runtime, ctx: &Context, action: &StepsCommand) -> anyhow::Result<()> {
    rt.block_on(async {
        let pool = ctx.open_pool().await?;

        match action {
            StepsCommand::Show => {
                println!("{} steps", steps::load_total(&pool).await?);
            }
            StepsCommand::Reset { value } => {
                steps::save_total(&pool, *value).await?;
                println!("Step total set to {}", value);
            }
            StepsCommand::Track { sensor, reset } => {
                let path = sensor.as_ref().or(ctx.config.steps.sensor_path.as_ref());
                let sensor: Box<dyn StepSensor> = match path {
                    Some(path) => {
                        tracing::info!(path = %path.display(), "Reading steps from file");
                        Box::new(LineSensor::open(path).await?)
                    }
                    None => {
                        eprintln!("Reading cumulative step counts from stdin, one per line");
                        Box::new(LineSensor::stdin())
                    }
                };

                let (handle, task) = StepHandle::spawn(pool.clone(), sensor).await?;
                let mut events = handle.subscribe();

                match reset {
                    // The reset is broadcast and printed by the loop below.
                    Some(value) => {
                        handle.reset(*value).await?;
                    }
                    None => println!("{} steps", handle.total().await?),
                }

                loop {
                    let event = tokio::select! {
                        event = events.recv() => event,
                        _ = tokio::signal::ctrl_c() => break,
                    };
                    match event {
                        Ok(StepEvent::Total(total)) => println!("{} steps", total),
                        Ok(StepEvent::SensorClosed) | Err(RecvError::Closed) => break,
                        Err(RecvError::Lagged(skipped)) => {
                            tracing::debug!(skipped, "Step printer lagged");
                        }
                    }
                }

                let total = handle.total().await?;
                drop(handle);
                task.await.ok();
                println!("Final total: {} steps", total);
            }
        }

        Ok(())
    })
}
