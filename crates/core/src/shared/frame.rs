use ndarray::{ArrayView3, ShapeError};

/// One decoded frame of the video source: packed RGB bytes, row-major.
///
/// The crowd logic never looks at pixels; only detectors do.
#[derive(Clone, Debug)]
pub struct Frame {
    data: Vec<u8>,
    width: u32,
    height: u32,
    channels: u8,
    index: usize,
}

impl Frame {
    pub fn new(data: Vec<u8>, width: u32, height: u32, channels: u8, index: usize) -> Self {
        debug_assert_eq!(
            data.len(),
            (width as usize) * (height as usize) * (channels as usize),
            "data length must equal width * height * channels"
        );
        Self {
            data,
            width,
            height,
            channels,
            index,
        }
    }

    pub fn data(&self) -> &[u8] {
        &self.data
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn channels(&self) -> u8 {
        self.channels
    }

    /// Zero-based position in the source stream.
    pub fn index(&self) -> usize {
        self.index
    }

    /// One-based frame number as written to the crowd log.
    pub fn number(&self) -> u64 {
        self.index as u64 + 1
    }

    /// `[height, width, channels]` view over the pixel bytes.
    pub fn as_ndarray(&self) -> Result<ArrayView3<'_, u8>, ShapeError> {
        ArrayView3::from_shape(
            (
                self.height as usize,
                self.width as usize,
                self.channels as usize,
            ),
            &self.data,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_construction_and_accessors() {
        let data = vec![0u8; 12]; // 2x2x3
        let frame = Frame::new(data.clone(), 2, 2, 3, 5);
        assert_eq!(frame.width(), 2);
        assert_eq!(frame.height(), 2);
        assert_eq!(frame.channels(), 3);
        assert_eq!(frame.index(), 5);
        assert_eq!(frame.data(), &data[..]);
    }

    #[test]
    fn test_number_is_one_based() {
        let frame = Frame::new(vec![0u8; 3], 1, 1, 3, 0);
        assert_eq!(frame.number(), 1);
        let frame = Frame::new(vec![0u8; 3], 1, 1, 3, 41);
        assert_eq!(frame.number(), 42);
    }

    #[test]
    #[should_panic(expected = "data length must equal width * height * channels")]
    fn test_mismatched_data_length_panics_in_debug() {
        Frame::new(vec![0u8; 10], 2, 2, 3, 0);
    }

    #[test]
    fn test_as_ndarray_shape_and_pixel() {
        // 2 rows x 4 cols RGB; pixel (row=1, col=0) red
        let mut data = vec![0u8; 24];
        data[12] = 255;
        let frame = Frame::new(data, 4, 2, 3, 0);
        let arr = frame.as_ndarray().unwrap();
        assert_eq!(arr.shape(), &[2, 4, 3]);
        assert_eq!(arr[[1, 0, 0]], 255);
        assert_eq!(arr[[1, 0, 1]], 0);
    }
}
