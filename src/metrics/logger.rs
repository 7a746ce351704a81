use super::TickReport;
use anyhow::Result;
use csv::Writer;
use std::fs::File;
use std::path::Path;

/// CSV log of tick reports, one row per tick.
pub struct MetricsLogger {
    writer: Writer<File>,
}

impl MetricsLogger {
    pub fn new(path: impl AsRef<Path>) -> Result<Self> {
        if let Some(parent) = path.as_ref().parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        let writer = Writer::from_path(path)?;
        Ok(Self { writer })
    }

    pub fn log(&mut self, report: &TickReport) -> Result<()> {
        self.writer.serialize(report)?;
        self.writer.flush()?;
        Ok(())
    }

    pub fn log_batch(&mut self, reports: &[TickReport]) -> Result<()> {
        for report in reports {
            self.writer.serialize(report)?;
        }
        self.writer.flush()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn writes_header_and_rows() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("ticks.csv");

        let mut logger = MetricsLogger::new(&path).unwrap();
        let mut report = TickReport::new(1);
        report.generated = 5;
        logger.log(&report).unwrap();
        logger.log_batch(&[TickReport::new(2), TickReport::new(3)]).unwrap();
        drop(logger);

        let content = std::fs::read_to_string(&path).unwrap();
        let lines: Vec<&str> = content.lines().collect();
        assert_eq!(
            lines[0],
            "tick,generated,delivered,forwarded,blocked,unroutable,queued,saturated_links"
        );
        assert_eq!(lines[1], "1,5,0,0,0,0,0,0");
        assert_eq!(lines.len(), 4);
    }
}
