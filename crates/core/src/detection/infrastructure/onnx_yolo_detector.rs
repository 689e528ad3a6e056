/// COCO-trained YOLO object detector running on ONNX Runtime via `ort`.
///
/// Handles letterbox preprocessing, inference, output decoding for both the
/// objectness (YOLOv5-style) and anchor-free (YOLOv8-style) layouts, and
/// class-aware NMS. Returns detections of every class; the pipeline keeps
/// only persons.
use std::path::Path;

use super::execution_provider::preferred_execution_providers;
use crate::detection::domain::detection::Detection;
use crate::detection::domain::person_detector::PersonDetector;
use crate::shared::bounding_box::BoundingBox;
use crate::shared::frame::Frame;

/// Fallback model input resolution when the model doesn't specify dimensions.
const DEFAULT_INPUT_SIZE: u32 = 640;

/// NMS IoU threshold.
const NMS_IOU_THRESH: f64 = 0.45;

/// Feature count of a YOLOv5 COCO row: 4 box + 1 objectness + 80 classes.
const OBJECTNESS_FEATURES: usize = 85;

/// Row layout of the raw model output.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum OutputLayout {
    /// `[cx, cy, w, h, objectness, class scores...]`; score = obj * class.
    Objectness,
    /// `[cx, cy, w, h, class scores...]`.
    AnchorFree,
}

impl OutputLayout {
    fn from_feature_count(num_feats: usize) -> Self {
        if num_feats == OBJECTNESS_FEATURES {
            OutputLayout::Objectness
        } else {
            OutputLayout::AnchorFree
        }
    }

    /// Best `(class_id, score)` for one row, or `None` if the row is too short.
    fn best_class(self, row: &[f32]) -> Option<(u32, f64)> {
        let (class_start, objectness) = match self {
            OutputLayout::Objectness => (5, *row.get(4)? as f64),
            OutputLayout::AnchorFree => (4, 1.0),
        };
        let scores = row.get(class_start..)?;
        scores
            .iter()
            .enumerate()
            .max_by(|a, b| a.1.partial_cmp(b.1).unwrap_or(std::cmp::Ordering::Equal))
            .map(|(id, &score)| (id as u32, objectness * score as f64))
    }
}

/// YOLO detector backed by an ONNX Runtime session.
pub struct OnnxYoloDetector {
    session: ort::session::Session,
    min_confidence: f64,
    input_size: u32,
}

impl OnnxYoloDetector {
    /// Load a YOLO ONNX model.
    ///
    /// The input resolution is read from the model's NCHW input shape,
    /// falling back to 640 if it is dynamic. Rows scoring below
    /// `min_confidence` are dropped before NMS.
    pub fn new(model_path: &Path, min_confidence: f64) -> Result<Self, Box<dyn std::error::Error>> {
        let intra_threads = std::thread::available_parallelism()
            .map(|n| n.get())
            .unwrap_or(1);
        let session = ort::session::Session::builder()?
            .with_optimization_level(ort::session::builder::GraphOptimizationLevel::Level3)?
            .with_intra_threads(intra_threads)?
            .with_execution_providers(preferred_execution_providers())?
            .commit_from_file(model_path)?;

        let input_size = session
            .inputs()
            .first()
            .and_then(|input| {
                if let ort::value::ValueType::Tensor { ref shape, .. } = input.dtype() {
                    if shape.len() >= 4 && shape[2] > 0 {
                        Some(shape[2] as u32)
                    } else {
                        None
                    }
                } else {
                    None
                }
            })
            .unwrap_or(DEFAULT_INPUT_SIZE);

        log::info!(
            "Loaded detector {} (input {input_size}x{input_size})",
            model_path.display()
        );

        Ok(Self {
            session,
            min_confidence,
            input_size,
        })
    }
}

impl PersonDetector for OnnxYoloDetector {
    fn detect(&mut self, frame: &Frame) -> Result<Vec<Detection>, Box<dyn std::error::Error>> {
        let letterboxed = letterbox(frame, self.input_size)?;

        let input_value = ort::value::Tensor::from_array(letterboxed.tensor.clone())?;
        let outputs = self.session.run(ort::inputs![input_value])?;
        if outputs.len() == 0 {
            return Err("YOLO model produced no outputs".into());
        }
        let tensor = outputs[0].try_extract_array::<f32>()?;
        let shape = tensor.shape().to_vec();
        if shape.len() != 3 {
            return Err(format!("Unexpected YOLO output shape: {shape:?}").into());
        }

        // [1, features, detections] is transposed relative to [1, detections, features].
        let transposed = shape[1] < shape[2];
        let (num_dets, num_feats) = if transposed {
            (shape[2], shape[1])
        } else {
            (shape[1], shape[2])
        };
        let layout = OutputLayout::from_feature_count(num_feats);

        let data = tensor.as_slice().ok_or("Cannot get tensor slice")?;

        let mut candidates = Vec::new();
        let mut row = vec![0f32; num_feats];
        for i in 0..num_dets {
            if transposed {
                for (f, value) in row.iter_mut().enumerate() {
                    *value = data[f * num_dets + i];
                }
            } else {
                row.copy_from_slice(&data[i * num_feats..(i + 1) * num_feats]);
            }

            let Some((class_id, score)) = layout.best_class(&row) else {
                continue;
            };
            if score < self.min_confidence {
                continue;
            }

            let (x1, y1, x2, y2) = letterboxed.unmap(row[0], row[1], row[2], row[3]);
            match BoundingBox::clamped(x1, y1, x2, y2, frame.width(), frame.height()) {
                Some(bbox) => candidates.push(Detection::new(bbox, class_id, score)),
                None => log::debug!(
                    "Skipping degenerate detection ({x1:.1}, {y1:.1}, {x2:.1}, {y2:.1})"
                ),
            }
        }

        Ok(nms(candidates, NMS_IOU_THRESH))
    }
}

// ---------------------------------------------------------------------------
// Preprocessing
// ---------------------------------------------------------------------------

struct Letterboxed {
    tensor: ndarray::Array4<f32>,
    scale: f64,
    pad_x: u32,
    pad_y: u32,
}

impl Letterboxed {
    /// Maps a `(cx, cy, w, h)` box in model space back to frame `(x1, y1, x2, y2)`.
    fn unmap(&self, cx: f32, cy: f32, w: f32, h: f32) -> (f64, f64, f64, f64) {
        let (cx, cy, w, h) = (cx as f64, cy as f64, w as f64, h as f64);
        let px = self.pad_x as f64;
        let py = self.pad_y as f64;
        (
            ((cx - w / 2.0) - px) / self.scale,
            ((cy - h / 2.0) - py) / self.scale,
            ((cx + w / 2.0) - px) / self.scale,
            ((cy + h / 2.0) - py) / self.scale,
        )
    }
}

/// Letterbox-resize a frame into a `target_size` square NCHW float tensor.
///
/// Padding uses YOLO's 114 gray; resizing is nearest-neighbor.
fn letterbox(frame: &Frame, target_size: u32) -> Result<Letterboxed, Box<dyn std::error::Error>> {
    let fw = frame.width() as f64;
    let fh = frame.height() as f64;
    if fw == 0.0 || fh == 0.0 {
        return Err("Cannot letterbox an empty frame".into());
    }
    let target = target_size as f64;

    let scale = (target / fw).min(target / fh);
    let new_w = ((fw * scale).round() as u32).min(target_size);
    let new_h = ((fh * scale).round() as u32).min(target_size);
    let pad_x = (target_size - new_w) / 2;
    let pad_y = (target_size - new_h) / 2;

    let gray = 114.0f32 / 255.0;
    let mut tensor =
        ndarray::Array4::<f32>::from_elem((1, 3, target_size as usize, target_size as usize), gray);

    let src = frame.as_ndarray()?;
    let src_h = frame.height() as usize;
    let src_w = frame.width() as usize;

    for y in 0..new_h as usize {
        let src_y = ((y as f64 / scale) as usize).min(src_h - 1);
        for x in 0..new_w as usize {
            let src_x = ((x as f64 / scale) as usize).min(src_w - 1);
            let ty = pad_y as usize + y;
            let tx = pad_x as usize + x;
            for c in 0..3 {
                tensor[[0, c, ty, tx]] = src[[src_y, src_x, c]] as f32 / 255.0;
            }
        }
    }

    Ok(Letterboxed {
        tensor,
        scale,
        pad_x,
        pad_y,
    })
}

// ---------------------------------------------------------------------------
// NMS
// ---------------------------------------------------------------------------

/// Greedy per-class NMS: highest score first, suppress same-class overlaps.
fn nms(mut dets: Vec<Detection>, iou_thresh: f64) -> Vec<Detection> {
    dets.sort_by(|a, b| {
        b.confidence
            .partial_cmp(&a.confidence)
            .unwrap_or(std::cmp::Ordering::Equal)
    });

    let mut keep: Vec<Detection> = Vec::new();
    for det in dets {
        let suppressed = keep
            .iter()
            .any(|k| k.class_id == det.class_id && k.bbox.iou(&det.bbox) > iou_thresh);
        if !suppressed {
            keep.push(det);
        }
    }
    keep
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn det(x1: f64, y1: f64, x2: f64, y2: f64, class_id: u32, confidence: f64) -> Detection {
        Detection::new(
            BoundingBox::new(x1, y1, x2, y2).unwrap(),
            class_id,
            confidence,
        )
    }

    // ── Letterbox ────────────────────────────────────────────────────

    #[test]
    fn test_letterbox_preserves_aspect_ratio() {
        // 200x100 → scale 3.2, new 640x320, pad_y 160
        let frame = Frame::new(vec![128u8; 200 * 100 * 3], 200, 100, 3, 0);
        let lb = letterbox(&frame, 640).unwrap();

        assert_eq!(lb.tensor.shape(), &[1, 3, 640, 640]);
        assert_relative_eq!(lb.scale, 3.2, epsilon = 0.01);
        assert_eq!(lb.pad_x, 0);
        assert_eq!(lb.pad_y, 160);
    }

    #[test]
    fn test_letterbox_pixels_normalized_and_padded() {
        let frame = Frame::new(vec![255u8; 100 * 50 * 3], 100, 50, 3, 0);
        let lb = letterbox(&frame, 640).unwrap();

        let y = lb.pad_y as usize + 1;
        assert_relative_eq!(lb.tensor[[0, 0, y, 1]], 1.0, epsilon = 0.01);
        assert_relative_eq!(lb.tensor[[0, 0, 0, 0]], 114.0 / 255.0, epsilon = 0.01);
    }

    #[test]
    fn test_letterbox_empty_frame_errors() {
        let frame = Frame::new(Vec::new(), 0, 0, 3, 0);
        assert!(letterbox(&frame, 640).is_err());
    }

    #[test]
    fn test_unmap_inverts_letterbox() {
        // Frame 200x100 → scale 3.2, pad_y 160.
        // Frame box (10,20)-(50,60) → model center (96, 288), size 128x128.
        let frame = Frame::new(vec![0u8; 200 * 100 * 3], 200, 100, 3, 0);
        let lb = letterbox(&frame, 640).unwrap();
        let (x1, y1, x2, y2) = lb.unmap(96.0, 288.0, 128.0, 128.0);

        assert_relative_eq!(x1, 10.0, epsilon = 1e-6);
        assert_relative_eq!(y1, 20.0, epsilon = 1e-6);
        assert_relative_eq!(x2, 50.0, epsilon = 1e-6);
        assert_relative_eq!(y2, 60.0, epsilon = 1e-6);
    }

    // ── Output layouts ───────────────────────────────────────────────

    #[test]
    fn test_layout_detection_by_feature_count() {
        assert_eq!(OutputLayout::from_feature_count(85), OutputLayout::Objectness);
        assert_eq!(OutputLayout::from_feature_count(84), OutputLayout::AnchorFree);
    }

    #[test]
    fn test_anchor_free_best_class() {
        let row = [10.0, 10.0, 5.0, 5.0, 0.1, 0.7, 0.2];
        let (class_id, score) = OutputLayout::AnchorFree.best_class(&row).unwrap();
        assert_eq!(class_id, 1);
        assert_relative_eq!(score, 0.7, epsilon = 1e-6);
    }

    #[test]
    fn test_objectness_scales_class_score() {
        let row = [10.0, 10.0, 5.0, 5.0, 0.5, 0.9, 0.2];
        let (class_id, score) = OutputLayout::Objectness.best_class(&row).unwrap();
        assert_eq!(class_id, 0);
        assert_relative_eq!(score, 0.45, epsilon = 1e-6);
    }

    #[test]
    fn test_short_row_has_no_class() {
        assert!(OutputLayout::Objectness.best_class(&[1.0, 2.0, 3.0]).is_none());
        assert!(OutputLayout::AnchorFree.best_class(&[1.0, 2.0, 3.0, 4.0]).is_none());
    }

    // ── NMS ──────────────────────────────────────────────────────────

    #[test]
    fn test_nms_suppresses_overlapping_same_class() {
        let kept = nms(
            vec![
                det(0.0, 0.0, 100.0, 100.0, 0, 0.8),
                det(5.0, 5.0, 105.0, 105.0, 0, 0.9),
            ],
            0.3,
        );
        assert_eq!(kept.len(), 1);
        assert_relative_eq!(kept[0].confidence, 0.9);
    }

    #[test]
    fn test_nms_keeps_overlapping_different_classes() {
        let kept = nms(
            vec![
                det(0.0, 0.0, 100.0, 100.0, 0, 0.9),
                det(5.0, 5.0, 105.0, 105.0, 24, 0.8),
            ],
            0.3,
        );
        assert_eq!(kept.len(), 2);
    }

    #[test]
    fn test_nms_keeps_adjacent_people() {
        let kept = nms(
            vec![
                det(0.0, 0.0, 40.0, 100.0, 0, 0.9),
                det(45.0, 0.0, 85.0, 100.0, 0, 0.8),
            ],
            NMS_IOU_THRESH,
        );
        assert_eq!(kept.len(), 2);
    }

    #[test]
    fn test_nms_empty_input() {
        assert!(nms(Vec::new(), 0.3).is_empty());
    }
}
