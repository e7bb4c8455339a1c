#[cfg(feature = "ml")]
pub mod ml_model;
pub mod inference;
pub mod pipeline;
pub mod preprocess;

#[cfg(feature = "ml")]
pub use ml_model::{LeafClassifier, LeafClassifierConfig, ARCHITECTURE};
#[cfg(feature = "ml")]
pub use inference::{export_model, BurnClassifier};
pub use inference::{load_classifier, ClassifierModel};
pub use pipeline::{argmax, ClassificationPipeline, Prediction};
pub use preprocess::{load_image_tensor, PixelTensor};
