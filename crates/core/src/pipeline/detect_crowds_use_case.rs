use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;

use crate::crowd::domain::crowd_event::CrowdEvent;
use crate::crowd::domain::event_sink::EventSink;
use crate::crowd::domain::group_builder::GroupBuilder;
use crate::crowd::domain::persistence_tracker::{PersistenceTracker, TrackedGroupState};
use crate::detection::domain::detection::PersonFilter;
use crate::detection::domain::person_detector::PersonDetector;
use crate::shared::config::CrowdConfig;
use crate::shared::error::CrowdError;
use crate::shared::video_metadata::VideoMetadata;
use crate::video::domain::video_reader::VideoReader;

use super::pipeline_logger::PipelineLogger;

/// What one session saw.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct SessionSummary {
    pub frames_processed: usize,
    pub events_emitted: usize,
    pub frames_with_crowds: usize,
    /// Member count of the biggest crowd reported, 0 if none.
    pub largest_crowd: usize,
    /// Distinct group keys held by the tracker when the session ended.
    pub distinct_keys: usize,
    /// The session stopped early on request.
    pub cancelled: bool,
}

/// Runs crowd detection over a frame source.
///
/// For each frame: detect, keep persons, cluster into proximity groups,
/// update persistence counts, and hand the resulting crowd events to the
/// sink. Tracking state lives for one `execute` call.
pub struct DetectCrowdsUseCase {
    reader: Box<dyn VideoReader>,
    detector: Box<dyn PersonDetector>,
    sink: Box<dyn EventSink>,
    logger: Box<dyn PipelineLogger>,
    filter: PersonFilter,
    builder: GroupBuilder,
    tracker: PersistenceTracker,
    max_frames: Option<usize>,
    on_progress: Option<Box<dyn Fn(usize, usize) -> bool + Send>>,
    cancelled: Arc<AtomicBool>,
}

impl DetectCrowdsUseCase {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        reader: Box<dyn VideoReader>,
        detector: Box<dyn PersonDetector>,
        sink: Box<dyn EventSink>,
        logger: Box<dyn PipelineLogger>,
        config: &CrowdConfig,
        max_frames: Option<usize>,
        on_progress: Option<Box<dyn Fn(usize, usize) -> bool + Send>>,
        cancelled: Option<Arc<AtomicBool>>,
    ) -> Result<Self, CrowdError> {
        config.validate()?;
        Ok(Self {
            reader,
            detector,
            sink,
            logger,
            filter: PersonFilter::from_config(config),
            builder: GroupBuilder::from_config(config)?,
            tracker: PersistenceTracker::from_config(config)?,
            max_frames,
            on_progress,
            cancelled: cancelled.unwrap_or_else(|| Arc::new(AtomicBool::new(false))),
        })
    }

    pub fn execute(
        &mut self,
        metadata: &VideoMetadata,
    ) -> Result<SessionSummary, Box<dyn std::error::Error>> {
        let mut state = TrackedGroupState::new();
        let mut summary = SessionSummary::default();

        let limit = self.max_frames.unwrap_or(usize::MAX);
        let total_frames = metadata.total_frames.min(limit);

        self.logger.info(&format!(
            "Detecting crowds: proximity {}px, persistence {} frames, {}x{}",
            self.builder.threshold(),
            self.tracker.persistence_threshold(),
            metadata.width,
            metadata.height
        ));

        // The sink is finished and the reader closed even when a frame fails.
        let outcome =
            self.process_frames(metadata, limit, total_frames, &mut state, &mut summary);
        let finished = self.sink.finish();
        self.reader.close();
        outcome?;
        finished?;

        summary.distinct_keys = state.len();
        if summary.cancelled {
            log::warn!(
                "Session cancelled after {} frames",
                summary.frames_processed
            );
        }
        self.logger.info(&format!(
            "Processed {} frames: {} crowd events on {} frames, largest crowd {}",
            summary.frames_processed,
            summary.events_emitted,
            summary.frames_with_crowds,
            summary.largest_crowd
        ));
        self.logger.summary();

        Ok(summary)
    }

    fn process_frames(
        &mut self,
        metadata: &VideoMetadata,
        limit: usize,
        total_frames: usize,
        state: &mut TrackedGroupState,
        summary: &mut SessionSummary,
    ) -> Result<(), Box<dyn std::error::Error>> {
        for frame_result in self.reader.frames().take(limit) {
            if self.cancelled.load(Ordering::Relaxed) {
                summary.cancelled = true;
                break;
            }

            let frame = frame_result?;
            let frame_number = frame.number();

            let start = Instant::now();
            let detections = self.detector.detect(&frame)?;
            let persons = self.filter.apply(&detections);
            self.logger.timing("detect", elapsed_ms(start));

            let start = Instant::now();
            let groups = self.builder.cluster(&persons);
            self.logger.timing("cluster", elapsed_ms(start));

            let start = Instant::now();
            let crowds = self.tracker.update(&groups, state);
            self.logger.timing("track", elapsed_ms(start));

            let events = CrowdEvent::for_frame(frame_number, crowds);

            let start = Instant::now();
            self.sink.record(&events)?;
            self.logger.timing("record", elapsed_ms(start));

            self.logger.metric("persons", persons.len() as f64);
            self.logger.metric("groups", groups.len() as f64);
            self.logger.metric("crowds", events.len() as f64);
            self.logger.metric("tracked_keys", state.len() as f64);

            log::debug!(
                "Frame {frame_number}: {} detections, {} persons, {} groups, {} crowds",
                detections.len(),
                persons.len(),
                groups.len(),
                events.len()
            );
            for event in &events {
                match metadata.timestamp_secs(frame_number) {
                    Some(secs) => log::debug!(
                        "Crowd of {} at frame {frame_number} ({secs:.2}s)",
                        event.member_count
                    ),
                    None => log::debug!(
                        "Crowd of {} at frame {frame_number}",
                        event.member_count
                    ),
                }
            }

            summary.frames_processed += 1;
            summary.events_emitted += events.len();
            if !events.is_empty() {
                summary.frames_with_crowds += 1;
            }
            if let Some(largest) = events.iter().map(|e| e.member_count).max() {
                summary.largest_crowd = summary.largest_crowd.max(largest);
            }

            self.logger.progress(summary.frames_processed, total_frames);
            if let Some(ref callback) = self.on_progress {
                if !callback(summary.frames_processed, total_frames) {
                    summary.cancelled = true;
                    break;
                }
            }
        }

        Ok(())
    }
}

fn elapsed_ms(start: Instant) -> f64 {
    start.elapsed().as_secs_f64() * 1000.0
}
