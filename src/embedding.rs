//! Local ONNX encoders via fastembed.
//!
//! [`FastembedTextEncoder`] and [`FastembedImageEncoder`] implement the core
//! encoder traits. Models are downloaded on first use from Hugging Face and
//! cached; after that, inference runs offline. fastembed's sessions need
//! `&mut self`, so each encoder serialises calls through a `Mutex`.
//!
//! Encoders are built once by [`create_encoders`] and shared behind `Arc`.
//! A model that cannot be loaded is a startup error.

use std::sync::Arc;

use anyhow::{bail, Result};
use tracing::info;

use docsift_core::embedding::{EmbeddingGenerator, ImageEncoder, TextEncoder};

use crate::config::EmbeddingConfig;

/// Known text models and their output widths.
pub fn text_model_dims(name: &str) -> Option<usize> {
    match name {
        "all-minilm-l6-v2" => Some(384),
        "bge-small-en-v1.5" => Some(384),
        "bge-base-en-v1.5" => Some(768),
        "bge-large-en-v1.5" => Some(1024),
        "nomic-embed-text-v1.5" => Some(768),
        "multilingual-e5-small" => Some(384),
        "multilingual-e5-base" => Some(768),
        _ => None,
    }
}

/// Known image models and their output widths.
pub fn image_model_dims(name: &str) -> Option<usize> {
    match name {
        "clip-vit-b-32" => Some(512),
        "resnet50" => Some(2048),
        "unicom-vit-b-16" => Some(768),
        "unicom-vit-b-32" => Some(512),
        "nomic-embed-vision-v1.5" => Some(768),
        _ => None,
    }
}

#[cfg(feature = "local-embeddings")]
mod local {
    use std::io::Cursor;
    use std::sync::Mutex;

    use anyhow::{anyhow, bail, Result};
    use fastembed::{
        EmbeddingModel, ImageEmbedding, ImageEmbeddingModel, ImageInitOptions, InitOptions,
        TextEmbedding,
    };
    use image::{DynamicImage, ImageFormat, RgbImage};

    use docsift_core::embedding::{ImageEncoder, PixelBuffer, TextEncoder};

    use crate::config::EmbeddingConfig;

    fn text_model(name: &str) -> Result<EmbeddingModel> {
        match name {
            "all-minilm-l6-v2" => Ok(EmbeddingModel::AllMiniLML6V2),
            "bge-small-en-v1.5" => Ok(EmbeddingModel::BGESmallENV15),
            "bge-base-en-v1.5" => Ok(EmbeddingModel::BGEBaseENV15),
            "bge-large-en-v1.5" => Ok(EmbeddingModel::BGELargeENV15),
            "nomic-embed-text-v1.5" => Ok(EmbeddingModel::NomicEmbedTextV15),
            "multilingual-e5-small" => Ok(EmbeddingModel::MultilingualE5Small),
            "multilingual-e5-base" => Ok(EmbeddingModel::MultilingualE5Base),
            other => bail!(
                "Unknown text model: '{}'. Supported models: \
                 all-minilm-l6-v2, bge-small-en-v1.5, bge-base-en-v1.5, bge-large-en-v1.5, \
                 nomic-embed-text-v1.5, multilingual-e5-small, multilingual-e5-base",
                other
            ),
        }
    }

    fn image_model(name: &str) -> Result<ImageEmbeddingModel> {
        match name {
            "clip-vit-b-32" => Ok(ImageEmbeddingModel::ClipVitB32),
            "resnet50" => Ok(ImageEmbeddingModel::Resnet50),
            "unicom-vit-b-16" => Ok(ImageEmbeddingModel::UnicomVitB16),
            "unicom-vit-b-32" => Ok(ImageEmbeddingModel::UnicomVitB32),
            "nomic-embed-vision-v1.5" => Ok(ImageEmbeddingModel::NomicEmbedVisionV15),
            other => bail!(
                "Unknown image model: '{}'. Supported models: \
                 clip-vit-b-32, resnet50, unicom-vit-b-16, unicom-vit-b-32, nomic-embed-vision-v1.5",
                other
            ),
        }
    }

    pub struct FastembedTextEncoder {
        name: String,
        dims: usize,
        batch_size: usize,
        model: Mutex<TextEmbedding>,
    }

    impl FastembedTextEncoder {
        pub fn new(config: &EmbeddingConfig) -> Result<Self> {
            let name = config.text_model.clone();
            let dims = super::text_model_dims(&name)
                .ok_or_else(|| anyhow!("Unknown text model: '{}'", name))?;
            let mut options =
                InitOptions::new(text_model(&name)?).with_show_download_progress(true);
            if let Some(dir) = &config.cache_dir {
                options = options.with_cache_dir(dir.clone());
            }
            let model = TextEmbedding::try_new(options)
                .map_err(|e| anyhow!("Failed to initialize text model '{}': {}", name, e))?;
            Ok(Self {
                name,
                dims,
                batch_size: config.batch_size,
                model: Mutex::new(model),
            })
        }
    }

    impl TextEncoder for FastembedTextEncoder {
        fn model_name(&self) -> &str {
            &self.name
        }

        fn dims(&self) -> usize {
            self.dims
        }

        fn embed_text(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
            let mut model = self
                .model
                .lock()
                .map_err(|_| anyhow!("text encoder lock poisoned"))?;
            model
                .embed(texts.to_vec(), Some(self.batch_size))
                .map_err(|e| anyhow!("Text embedding failed: {}", e))
        }
    }

    pub struct FastembedImageEncoder {
        name: String,
        dims: usize,
        batch_size: usize,
        model: Mutex<ImageEmbedding>,
    }

    impl FastembedImageEncoder {
        pub fn new(name: &str, config: &EmbeddingConfig) -> Result<Self> {
            let dims = super::image_model_dims(name)
                .ok_or_else(|| anyhow!("Unknown image model: '{}'", name))?;
            let mut options =
                ImageInitOptions::new(image_model(name)?).with_show_download_progress(true);
            if let Some(dir) = &config.cache_dir {
                options = options.with_cache_dir(dir.clone());
            }
            let model = ImageEmbedding::try_new(options)
                .map_err(|e| anyhow!("Failed to initialize image model '{}': {}", name, e))?;
            Ok(Self {
                name: name.to_string(),
                dims,
                batch_size: config.batch_size,
                model: Mutex::new(model),
            })
        }
    }

    /// fastembed's image API takes encoded bytes; re-encode the pixels as PNG.
    fn to_png(pixels: &PixelBuffer) -> Result<Vec<u8>> {
        let img = RgbImage::from_raw(pixels.width, pixels.height, pixels.rgb.clone())
            .ok_or_else(|| anyhow!("pixel buffer does not match its dimensions"))?;
        let mut buf = Vec::new();
        DynamicImage::ImageRgb8(img).write_to(&mut Cursor::new(&mut buf), ImageFormat::Png)?;
        Ok(buf)
    }

    impl ImageEncoder for FastembedImageEncoder {
        fn model_name(&self) -> &str {
            &self.name
        }

        fn dims(&self) -> usize {
            self.dims
        }

        fn embed_image(&self, images: &[PixelBuffer]) -> Result<Vec<Vec<f32>>> {
            let encoded = images.iter().map(to_png).collect::<Result<Vec<_>>>()?;
            let refs: Vec<&[u8]> = encoded.iter().map(|b| b.as_slice()).collect();
            let mut model = self
                .model
                .lock()
                .map_err(|_| anyhow!("image encoder lock poisoned"))?;
            model
                .embed_bytes(&refs, Some(self.batch_size))
                .map_err(|e| anyhow!("Image embedding failed: {}", e))
        }
    }
}

#[cfg(feature = "local-embeddings")]
pub use local::{FastembedImageEncoder, FastembedTextEncoder};

/// Construct the text encoder and, if configured, the image encoder.
///
/// Blocking: the first call may download model weights.
pub fn create_encoders(
    config: &EmbeddingConfig,
) -> Result<(Arc<dyn TextEncoder>, Option<Arc<dyn ImageEncoder>>)> {
    if text_model_dims(&config.text_model).is_none() {
        bail!("Unknown text model: '{}'", config.text_model);
    }
    if let Some(name) = &config.image_model {
        if image_model_dims(name).is_none() {
            bail!("Unknown image model: '{}'", name);
        }
    }
    build_encoders(config)
}

#[cfg(feature = "local-embeddings")]
fn build_encoders(
    config: &EmbeddingConfig,
) -> Result<(Arc<dyn TextEncoder>, Option<Arc<dyn ImageEncoder>>)> {
    let text: Arc<dyn TextEncoder> = Arc::new(FastembedTextEncoder::new(config)?);
    info!(model = text.model_name(), dims = text.dims(), "text encoder loaded");

    let image: Option<Arc<dyn ImageEncoder>> = match &config.image_model {
        Some(name) => {
            let enc = FastembedImageEncoder::new(name, config)?;
            info!(model = enc.model_name(), dims = enc.dims(), "image encoder loaded");
            Some(Arc::new(enc))
        }
        None => None,
    };
    Ok((text, image))
}

#[cfg(not(feature = "local-embeddings"))]
fn build_encoders(
    _config: &EmbeddingConfig,
) -> Result<(Arc<dyn TextEncoder>, Option<Arc<dyn ImageEncoder>>)> {
    info!("built without local encoders");
    bail!("Local encoders require the `local-embeddings` feature")
}

/// Load encoders off the async runtime and bundle them into a generator.
pub async fn load_generator(config: &EmbeddingConfig) -> Result<EmbeddingGenerator> {
    let cfg = config.clone();
    let (text, image) = tokio::task::spawn_blocking(move || create_encoders(&cfg)).await??;
    Ok(EmbeddingGenerator::new(text, image, config.batch_size))
}
