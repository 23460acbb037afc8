//! Step sensor sources.

use async_trait::async_trait;
use std::path::Path;
use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader, Lines};

use crate::error::{Error, Result};

/// A source of cumulative step counter readings.
///
/// Readings only grow, except when the underlying counter restarts.
#[async_trait]
pub trait StepSensor: Send {
    /// Wait for the next reading. `None` once the source is exhausted.
    async fn next_reading(&mut self) -> Result<Option<i64>>;
}

/// Reads one cumulative count per line.
///
/// Blank lines are skipped, malformed and negative values are logged and
/// skipped.
pub struct LineSensor<R> {
    lines: Lines<BufReader<R>>,
    source: String,
}

impl<R: AsyncRead + Unpin + Send> LineSensor<R> {
    pub fn new(reader: R, source: impl Into<String>) -> Self {
        Self {
            lines: BufReader::new(reader).lines(),
            source: source.into(),
        }
    }
}

impl LineSensor<tokio::fs::File> {
    /// Read counts from a file or FIFO.
    pub async fn open(path: &Path) -> Result<Self> {
        let file = tokio::fs::File::open(path)
            .await
            .map_err(|_| Error::not_found(path))?;
        Ok(Self::new(file, path.display().to_string()))
    }
}

impl LineSensor<tokio::io::Stdin> {
    /// Read counts typed or piped on standard input.
    pub fn stdin() -> Self {
        Self::new(tokio::io::stdin(), "stdin")
    }
}

#[async_trait]
impl<R: AsyncRead + Unpin + Send> StepSensor for LineSensor<R> {
    async fn next_reading(&mut self) -> Result<Option<i64>> {
        while let Some(line) = self.lines.next_line().await? {
            let line = line.trim();
            if line.is_empty() {
                continue;
            }
            match line.parse::<i64>() {
                Ok(value) if value >= 0 => return Ok(Some(value)),
                _ => tracing::warn!(source = %self.source, line, "Ignoring invalid step reading"),
            }
        }
        Ok(None)
    }
}


#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_line_sensor_reads_counts() {
        let mut sensor = LineSensor::new(&b"10\n\n 12 \nabc\n-4\n15"[..], "test");

        assert_eq!(sensor.next_reading().await.unwrap(), Some(10));
        assert_eq!(sensor.next_reading().await.unwrap(), Some(12));
        assert_eq!(sensor.next_reading().await.unwrap(), Some(15));
        assert_eq!(sensor.next_reading().await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_line_sensor_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("steps.txt");
        std::fs::write(&path, "100\n101\n").unwrap();

        let mut sensor = LineSensor::open(&path).await.unwrap();

        assert_eq!(sensor.next_reading().await.unwrap(), Some(100));
        assert_eq!(sensor.next_reading().await.unwrap(), Some(101));
        assert_eq!(sensor.next_reading().await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_line_sensor_missing_file() {
        let result = LineSensor::open(Path::new("/nonexistent/steps")).await;
        assert!(matches!(result, Err(Error::NotFound(_))));
    }
}
