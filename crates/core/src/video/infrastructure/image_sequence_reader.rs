use std::fs;
use std::path::{Path, PathBuf};

use crate::shared::constants::IMAGE_EXTENSIONS;
use crate::shared::frame::Frame;
use crate::shared::video_metadata::VideoMetadata;
use crate::video::domain::video_reader::VideoReader;

/// Reads a directory of still images as a frame sequence.
///
/// Files with a known image extension are played in file-name order. The
/// first image fixes the frame size; a later image with different
/// dimensions is an error for that frame. Sequences have no timing, so
/// `fps` is 0.
pub struct ImageSequenceReader {
    paths: Vec<PathBuf>,
    width: u32,
    height: u32,
    opened: bool,
}

impl ImageSequenceReader {
    pub fn new() -> Self {
        Self {
            paths: Vec::new(),
            width: 0,
            height: 0,
            opened: false,
        }
    }

    pub fn is_image_file(path: &Path) -> bool {
        path.extension()
            .and_then(|e| e.to_str())
            .map(|e| IMAGE_EXTENSIONS.contains(&e.to_lowercase().as_str()))
            .unwrap_or(false)
    }
}

impl Default for ImageSequenceReader {
    fn default() -> Self {
        Self::new()
    }
}

fn decode_frame(
    path: &Path,
    index: usize,
    width: u32,
    height: u32,
) -> Result<Frame, Box<dyn std::error::Error>> {
    let rgb = image::open(path)
        .map_err(|e| format!("{}: {e}", path.display()))?
        .to_rgb8();
    if rgb.dimensions() != (width, height) {
        return Err(format!(
            "{} is {}x{}, expected {width}x{height}",
            path.display(),
            rgb.width(),
            rgb.height()
        )
        .into());
    }
    Ok(Frame::new(rgb.into_raw(), width, height, 3, index))
}

impl VideoReader for ImageSequenceReader {
    fn open(&mut self, path: &Path) -> Result<VideoMetadata, Box<dyn std::error::Error>> {
        if !path.is_dir() {
            return Err(format!("Not a directory: {}", path.display()).into());
        }

        let mut paths: Vec<PathBuf> = fs::read_dir(path)?
            .filter_map(|entry| entry.ok().map(|e| e.path()))
            .filter(|p| p.is_file() && Self::is_image_file(p))
            .collect();
        paths.sort();

        let first = paths
            .first()
            .ok_or_else(|| format!("No images found in {}", path.display()))?;
        let (width, height) = image::image_dimensions(first)?;

        log::debug!(
            "Found {} images in {} ({width}x{height})",
            paths.len(),
            path.display()
        );

        let metadata = VideoMetadata {
            width,
            height,
            fps: 0.0,
            total_frames: paths.len(),
            source_path: Some(path.to_path_buf()),
        };

        self.paths = paths;
        self.width = width;
        self.height = height;
        self.opened = true;

        Ok(metadata)
    }

    fn frames(
        &mut self,
    ) -> Box<dyn Iterator<Item = Result<Frame, Box<dyn std::error::Error>>> + '_> {
        if !self.opened {
            return Box::new(std::iter::once(Err(
                "ImageSequenceReader: not opened".into()
            )));
        }

        let (width, height) = (self.width, self.height);
        Box::new(
            self.paths
                .iter()
                .enumerate()
                .map(move |(index, path)| decode_frame(path, index, width, height)),
        )
    }

    fn close(&mut self) {
        self.paths.clear();
        self.opened = false;
    }
}
