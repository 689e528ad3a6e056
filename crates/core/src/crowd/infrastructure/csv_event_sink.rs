use std::fs::{self, File};
use std::path::{Path, PathBuf};

use crate::crowd::domain::crowd_event::CrowdEvent;
use crate::crowd::domain::event_sink::EventSink;
use crate::shared::constants::LOG_HEADER;
use crate::shared::error::CrowdError;

/// Append-only CSV crowd log: `Frame Number,Person Count`, one row per event.
///
/// Creating the sink truncates any previous log and writes the header, so
/// each session starts from a fresh file. Rows are flushed after every
/// frame so a log cut short by a crash is still readable.
pub struct CsvEventSink {
    writer: csv::Writer<File>,
    path: PathBuf,
    rows: usize,
}

impl CsvEventSink {
    pub fn create(path: &Path) -> Result<Self, CrowdError> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(|e| CrowdError::LogDir {
                path: parent.to_path_buf(),
                source: e,
            })?;
        }

        let mut writer = csv::Writer::from_path(path).map_err(|e| CrowdError::Csv {
            path: path.to_path_buf(),
            source: e,
        })?;
        writer.write_record(LOG_HEADER).map_err(|e| CrowdError::Csv {
            path: path.to_path_buf(),
            source: e,
        })?;
        writer.flush().map_err(|e| CrowdError::Csv {
            path: path.to_path_buf(),
            source: e.into(),
        })?;

        log::debug!("Initialized crowd log at {}", path.display());
        Ok(Self {
            writer,
            path: path.to_path_buf(),
            rows: 0,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Rows written so far, excluding the header.
    pub fn rows(&self) -> usize {
        self.rows
    }

    fn csv_error(&self, source: csv::Error) -> CrowdError {
        CrowdError::Csv {
            path: self.path.clone(),
            source,
        }
    }
}

impl EventSink for CsvEventSink {
    fn record(&mut self, events: &[CrowdEvent]) -> Result<(), Box<dyn std::error::Error>> {
        if events.is_empty() {
            return Ok(());
        }
        for event in events {
            let row = [
                event.frame_number.to_string(),
                event.member_count.to_string(),
            ];
            if let Err(e) = self.writer.write_record(&row) {
                return Err(self.csv_error(e).into());
            }
            self.rows += 1;
        }
        if let Err(e) = self.writer.flush() {
            return Err(self.csv_error(e.into()).into());
        }
        Ok(())
    }

    fn finish(&mut self) -> Result<(), Box<dyn std::error::Error>> {
        if let Err(e) = self.writer.flush() {
            return Err(self.csv_error(e.into()).into());
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crowd::domain::group::Group;
    use crate::shared::bounding_box::BoundingBox;
    use tempfile::TempDir;

    fn event(frame_number: u64, members: usize) -> CrowdEvent {
        let boxes = (0..members)
            .map(|i| {
                let x = i as f64 * 4.0;
                BoundingBox::new(x, 0.0, x + 10.0, 30.0).unwrap()
            })
            .collect();
        CrowdEvent::new(frame_number, Group::from_members(boxes).unwrap())
    }

    #[test]
    fn test_create_writes_header_only() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("log.csv");

        let sink = CsvEventSink::create(&path).unwrap();

        assert_eq!(sink.rows(), 0);
        assert_eq!(
            fs::read_to_string(&path).unwrap(),
            "Frame Number,Person Count\n"
        );
    }

    #[test]
    fn test_create_makes_parent_directories() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("results").join("nested").join("log.csv");

        CsvEventSink::create(&path).unwrap();

        assert!(path.exists());
    }

    #[test]
    fn test_create_truncates_previous_session() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("log.csv");
        fs::write(&path, "Frame Number,Person Count\n1,2\n3,4\n").unwrap();

        CsvEventSink::create(&path).unwrap();

        assert_eq!(
            fs::read_to_string(&path).unwrap(),
            "Frame Number,Person Count\n"
        );
    }

    #[test]
    fn test_record_appends_one_row_per_event() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("log.csv");
        let mut sink = CsvEventSink::create(&path).unwrap();

        sink.record(&[event(10, 3)]).unwrap();
        sink.record(&[]).unwrap();
        sink.record(&[event(12, 3), event(12, 2)]).unwrap();
        sink.finish().unwrap();

        assert_eq!(sink.rows(), 3);
        assert_eq!(
            fs::read_to_string(&path).unwrap(),
            "Frame Number,Person Count\n10,3\n12,3\n12,2\n"
        );
    }

    #[test]
    fn test_rows_visible_before_finish() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("log.csv");
        let mut sink = CsvEventSink::create(&path).unwrap();

        sink.record(&[event(4, 5)]).unwrap();

        let contents = fs::read_to_string(&path).unwrap();
        assert!(contents.ends_with("4,5\n"));
    }

    #[test]
    fn test_log_parses_back_with_header() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("log.csv");
        let mut sink = CsvEventSink::create(&path).unwrap();
        sink.record(&[event(10, 3), event(11, 3)]).unwrap();

        let mut reader = csv::Reader::from_path(&path).unwrap();
        let headers = reader.headers().unwrap().clone();
        assert_eq!(headers.iter().collect::<Vec<_>>(), LOG_HEADER);
        let rows: Vec<(u64, usize)> = reader.deserialize().map(|r| r.unwrap()).collect();
        assert_eq!(rows, vec![(10, 3), (11, 3)]);
    }

    #[test]
    fn test_create_in_unwritable_location_fails() {
        let tmp = TempDir::new().unwrap();
        let blocker = tmp.path().join("file");
        fs::write(&blocker, "not a directory").unwrap();

        let result = CsvEventSink::create(&blocker.join("log.csv"));
        assert!(matches!(result, Err(CrowdError::LogDir { .. })));
    }
}
