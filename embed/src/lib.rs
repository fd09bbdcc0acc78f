//! Face embedding providers.
//!
//! A [`FaceEmbedder`] maps a decoded RGB [`Image`] to a fixed-length vector
//! so that images of the same person land close together under cosine or
//! dot-product similarity.
//!
//! - [`DeepFace`]: a DeepFace REST service (detection, alignment and one of
//!   its recognition models run server side).
//! - [`Thumbnail`]: a deterministic local embedder with no learned model.

pub mod config;
pub mod deepface;
pub mod embed;
pub mod error;
pub mod raster;
pub mod thumbnail;

pub use config::EmbedConfig;
pub use deepface::DeepFace;
pub use embed::{EmbedderInfo, FaceEmbedder, l2_normalize};
pub use error::EmbedError;
pub use raster::Image;
pub use thumbnail::Thumbnail;
