//! Face embedding models via ONNX Runtime.
//!
//! Implements [`EmbeddingProvider`] over exported face-recognition models
//! (Facenet512, Facenet, ArcFace). Every photo goes through SCRFD detection
//! first; the most confident face is aligned (or cropped, when the detector
//! gives no landmarks) before it is embedded.

use crate::alignment::align_face;
use crate::detector::{primary_face, FaceBox, FaceDetector};
use crate::embedding::Embedding;
use crate::provider::{EmbeddingProvider, ProviderError};
use image::imageops::FilterType;
use image::RgbImage;
use ndarray::Array4;
use ort::session::Session;
use ort::value::TensorRef;
use std::collections::HashMap;
use std::path::{Path, PathBuf};

pub const DEFAULT_MODEL: &str = "Facenet512";
const DEFAULT_INTRA_THREADS: usize = 2;

/// Input tensor layout expected by a model.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TensorLayout {
    /// [1, H, W, 3], Keras exports.
    Nhwc,
    /// [1, 3, H, W], PyTorch / insightface exports.
    Nchw,
}

/// Preprocessing and output contract of one known model.
#[derive(Debug, Clone, Copy)]
pub struct ModelProfile {
    pub name: &'static str,
    pub input_size: u32,
    pub mean: f32,
    pub std: f32,
    pub layout: TensorLayout,
    pub embedding_dim: usize,
}

pub static KNOWN_MODELS: [ModelProfile; 3] = [
    ModelProfile {
        name: "Facenet512",
        input_size: 160,
        mean: 127.5,
        std: 128.0,
        layout: TensorLayout::Nhwc,
        embedding_dim: 512,
    },
    ModelProfile {
        name: "Facenet",
        input_size: 160,
        mean: 127.5,
        std: 128.0,
        layout: TensorLayout::Nhwc,
        embedding_dim: 128,
    },
    ModelProfile {
        name: "ArcFace",
        input_size: 112,
        mean: 127.5,
        std: 127.5, // symmetric, unlike Facenet
        layout: TensorLayout::Nchw,
        embedding_dim: 512,
    },
];

impl ModelProfile {
    pub fn lookup(name: &str) -> Option<&'static ModelProfile> {
        KNOWN_MODELS.iter().find(|m| m.name == name)
    }

    /// `{model_dir}/{name}.onnx`
    pub fn model_path(&self, model_dir: &Path) -> PathBuf {
        model_dir.join(format!("{}.onnx", self.name))
    }

    /// Resize an RGB image to the model's input square and normalize it
    /// into a float tensor in the model's layout.
    pub fn preprocess(&self, rgb: &RgbImage) -> Array4<f32> {
        let size = self.input_size;
        let resized = image::imageops::resize(rgb, size, size, FilterType::Triangle);
        let s = size as usize;

        let mut tensor = match self.layout {
            TensorLayout::Nhwc => Array4::<f32>::zeros((1, s, s, 3)),
            TensorLayout::Nchw => Array4::<f32>::zeros((1, 3, s, s)),
        };

        for (x, y, pixel) in resized.enumerate_pixels() {
            let (x, y) = (x as usize, y as usize);
            for c in 0..3 {
                let value = (pixel.0[c] as f32 - self.mean) / self.std;
                match self.layout {
                    TensorLayout::Nhwc => tensor[[0, y, x, c]] = value,
                    TensorLayout::Nchw => tensor[[0, c, y, x]] = value,
                }
            }
        }

        tensor
    }
}

/// One loaded model session.
pub struct FaceEmbedder {
    profile: &'static ModelProfile,
    session: Session,
}

impl FaceEmbedder {
    /// Load the ONNX model for `profile` from `model_dir`.
    pub fn load(
        profile: &'static ModelProfile,
        model_dir: &Path,
        intra_threads: usize,
    ) -> Result<Self, ProviderError> {
        let model_path = profile.model_path(model_dir);
        if !model_path.exists() {
            return Err(ProviderError::ModelNotFound(model_path.display().to_string()));
        }

        let session = Session::builder()?
            .with_intra_threads(intra_threads)?
            .commit_from_file(&model_path)?;

        tracing::info!(
            path = %model_path.display(),
            model = profile.name,
            inputs = ?session.inputs().iter().map(|i| i.name()).collect::<Vec<_>>(),
            outputs = ?session.outputs().iter().map(|o| o.name()).collect::<Vec<_>>(),
            "loaded face embedding model"
        );

        Ok(Self { profile, session })
    }

    /// Raw (unnormalized) embedding for an aligned face crop.
    pub fn embed_image(&mut self, rgb: &RgbImage) -> Result<Embedding, ProviderError> {
        let input = self.profile.preprocess(rgb);

        let outputs = self.session.run(ort::inputs![TensorRef::from_array_view(input.view())?])?;

        let (_, raw_data) = outputs[0]
            .try_extract_tensor::<f32>()
            .map_err(|e| ProviderError::InferenceFailed(format!("embedding extraction: {e}")))?;

        let values: Vec<f32> = raw_data.to_vec();
        let expected = self.profile.embedding_dim;
        if values.len() != expected {
            return Err(ProviderError::InferenceFailed(format!(
                "expected {expected}-dim embedding from {}, got {}",
                self.profile.name,
                values.len()
            )));
        }

        Ok(Embedding::with_model(values, self.profile.name))
    }
}

/// [`EmbeddingProvider`] backed by ONNX models in a directory.
///
/// The detector and each embedding model are loaded on first use and kept for
/// the provider's lifetime.
pub struct OnnxProvider {
    model_dir: PathBuf,
    intra_threads: usize,
    detector: Option<FaceDetector>,
    sessions: HashMap<&'static str, FaceEmbedder>,
}

impl OnnxProvider {
    pub fn new(model_dir: impl Into<PathBuf>) -> Self {
        Self {
            model_dir: model_dir.into(),
            intra_threads: DEFAULT_INTRA_THREADS,
            detector: None,
            sessions: HashMap::new(),
        }
    }

    pub fn with_intra_threads(mut self, threads: usize) -> Self {
        self.intra_threads = threads.max(1);
        self
    }

    fn embedder(&mut self, profile: &'static ModelProfile) -> Result<&mut FaceEmbedder, ProviderError> {
        if !self.sessions.contains_key(profile.name) {
            let embedder = FaceEmbedder::load(profile, &self.model_dir, self.intra_threads)?;
            self.sessions.insert(profile.name, embedder);
        }
        self.sessions
            .get_mut(profile.name)
            .ok_or_else(|| ProviderError::UnsupportedModel(profile.name.to_string()))
    }

    fn detector(&mut self) -> Result<&mut FaceDetector, ProviderError> {
        let detector = match self.detector.take() {
            Some(detector) => detector,
            None => FaceDetector::load(&self.model_dir, self.intra_threads)?,
        };
        Ok(self.detector.insert(detector))
    }
}

impl EmbeddingProvider for OnnxProvider {
    fn represent(&mut self, image_path: &Path, model_name: &str) -> Result<Embedding, ProviderError> {
        let profile = ModelProfile::lookup(model_name)
            .ok_or_else(|| ProviderError::UnsupportedModel(model_name.to_string()))?;
        self.embedder(profile)?;

        if !image_path.exists() {
            return Err(ProviderError::ImageNotFound(image_path.to_path_buf()));
        }
        let rgb = image::open(image_path)?.to_rgb8();

        let face = primary_face(self.detector()?.detect(&rgb)?)?;
        tracing::debug!(
            path = %image_path.display(),
            confidence = face.confidence,
            aligned = face.landmarks.is_some(),
            "face detected"
        );

        let crop = face_crop(&rgb, &face, profile.input_size)?;
        self.embedder(profile)?.embed_image(&crop)
    }
}

/// Aligned `size`×`size` face, or the bounding box clipped to the image when
/// there are no usable landmarks.
fn face_crop(rgb: &RgbImage, face: &FaceBox, size: u32) -> Result<RgbImage, ProviderError> {
    if let Some(aligned) = face.landmarks.as_ref().and_then(|lms| align_face(rgb, lms, size)) {
        return Ok(aligned);
    }

    let (w, h) = (rgb.width() as f32, rgb.height() as f32);
    let x0 = face.x.clamp(0.0, w).floor() as u32;
    let y0 = face.y.clamp(0.0, h).floor() as u32;
    let x1 = (face.x + face.width).clamp(0.0, w).ceil() as u32;
    let y1 = (face.y + face.height).clamp(0.0, h).ceil() as u32;
    if x1 <= x0 || y1 <= y0 {
        return Err(ProviderError::NoFaceDetected);
    }

    Ok(image::imageops::crop_imm(rgb, x0, y0, x1 - x0, y1 - y0).to_image())
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgb;

    fn facenet512() -> &'static ModelProfile {
        ModelProfile::lookup("Facenet512").unwrap()
    }

    fn arcface() -> &'static ModelProfile {
        ModelProfile::lookup("ArcFace").unwrap()
    }

    #[test]
    fn test_lookup_known_and_unknown() {
        assert_eq!(facenet512().embedding_dim, 512);
        assert_eq!(ModelProfile::lookup("Facenet").unwrap().embedding_dim, 128);
        assert!(ModelProfile::lookup("VGG-Face").is_none());
        assert!(ModelProfile::lookup(DEFAULT_MODEL).is_some());
    }

    #[test]
    fn test_model_path() {
        assert_eq!(
            arcface().model_path(Path::new("/models")),
            PathBuf::from("/models/ArcFace.onnx")
        );
    }

    #[test]
    fn test_preprocess_output_shape_nhwc() {
        let img = RgbImage::from_pixel(300, 200, Rgb([128, 128, 128]));
        let tensor = facenet512().preprocess(&img);
        assert_eq!(tensor.shape(), &[1, 160, 160, 3]);
    }

    #[test]
    fn test_preprocess_output_shape_nchw() {
        let img = RgbImage::from_pixel(50, 50, Rgb([0, 0, 0]));
        let tensor = arcface().preprocess(&img);
        assert_eq!(tensor.shape(), &[1, 3, 112, 112]);
    }

    #[test]
    fn test_preprocess_normalization() {
        let profile = arcface();
        let img = RgbImage::from_pixel(112, 112, Rgb([255, 128, 0]));
        let tensor = profile.preprocess(&img);

        let expected = |v: f32| (v - profile.mean) / profile.std;
        assert!((tensor[[0, 0, 10, 10]] - expected(255.0)).abs() < 1e-6);
        assert!((tensor[[0, 1, 10, 10]] - expected(128.0)).abs() < 1e-6);
        assert!((tensor[[0, 2, 10, 10]] - expected(0.0)).abs() < 1e-6);
    }

    #[test]
    fn test_preprocess_channels_in_last_axis_for_nhwc() {
        let profile = facenet512();
        let img = RgbImage::from_pixel(160, 160, Rgb([10, 20, 30]));
        let tensor = profile.preprocess(&img);
        for (c, v) in [10.0f32, 20.0, 30.0].into_iter().enumerate() {
            let got = tensor[[0, 80, 80, c]];
            let want = (v - profile.mean) / profile.std;
            assert!((got - want).abs() < 1e-6, "channel {c}: got {got}, want {want}");
        }
    }

    fn face(x: f32, y: f32, w: f32, h: f32) -> FaceBox {
        FaceBox {
            x,
            y,
            width: w,
            height: h,
            confidence: 0.9,
            landmarks: None,
        }
    }

    #[test]
    fn test_face_crop_uses_bbox_without_landmarks() {
        let img = RgbImage::from_pixel(200, 100, Rgb([1, 2, 3]));
        let crop = face_crop(&img, &face(10.0, 20.0, 50.5, 40.0), 160).unwrap();
        assert_eq!(crop.dimensions(), (51, 40));
    }

    #[test]
    fn test_face_crop_clips_to_image() {
        let img = RgbImage::new(100, 100);
        let crop = face_crop(&img, &face(-20.0, 80.0, 50.0, 50.0), 160).unwrap();
        assert_eq!(crop.dimensions(), (30, 20));
    }

    #[test]
    fn test_face_crop_outside_image_is_no_face() {
        let img = RgbImage::new(100, 100);
        let err = face_crop(&img, &face(150.0, 10.0, 20.0, 20.0), 160).unwrap_err();
        assert!(matches!(err, ProviderError::NoFaceDetected));
    }

    #[test]
    fn test_face_crop_aligns_to_model_input() {
        let img = RgbImage::from_pixel(300, 300, Rgb([90, 90, 90]));
        let mut detected = face(50.0, 50.0, 200.0, 200.0);
        detected.landmarks = Some([
            (110.0, 120.0),
            (190.0, 120.0),
            (150.0, 160.0),
            (120.0, 200.0),
            (180.0, 200.0),
        ]);
        let crop = face_crop(&img, &detected, 112).unwrap();
        assert_eq!(crop.dimensions(), (112, 112));
    }

    #[test]
    fn test_unsupported_model() {
        let mut provider = OnnxProvider::new("/nonexistent");
        let err = provider
            .represent(Path::new("/nonexistent/face.png"), "Dlib")
            .unwrap_err();
        assert!(matches!(err, ProviderError::UnsupportedModel(ref m) if m == "Dlib"));
    }

    #[test]
    fn test_missing_model_file() {
        let mut provider = OnnxProvider::new("/nonexistent/models");
        let err = provider
            .represent(Path::new("/nonexistent/face.png"), DEFAULT_MODEL)
            .unwrap_err();
        assert!(matches!(err, ProviderError::ModelNotFound(_)));
    }
}
