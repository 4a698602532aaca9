use std::collections::BTreeSet;
use std::fmt;
use std::path::Path;
use std::sync::Arc;

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use tracing::debug;

use crate::error::InputError;

#[derive(Clone)]
pub struct ImageUpload {
    name: String,
    mime: &'static str,
    bytes: Arc<Vec<u8>>,
}

impl fmt::Debug for ImageUpload {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ImageUpload")
            .field("name", &self.name)
            .field("mime", &self.mime)
            .field("len", &self.bytes.len())
            .finish()
    }
}

impl ImageUpload {
    pub fn from_bytes(
        name: impl Into<String>,
        bytes: Vec<u8>,
        max_bytes: u64,
    ) -> Result<Self, InputError> {
        let name = name.into();
        let size = bytes.len() as u64;
        if size > max_bytes {
            return Err(InputError::TooLarge {
                name,
                size,
                limit: max_bytes,
            });
        }
        let format = image::guess_format(&bytes).map_err(|_| InputError::NotAnImage {
            name: name.clone(),
        })?;
        Ok(Self {
            name,
            mime: format.to_mime_type(),
            bytes: Arc::new(bytes),
        })
    }

    pub fn from_path(path: &Path, max_bytes: u64) -> Result<Self, InputError> {
        let io_err = |source| InputError::Io {
            path: path.to_path_buf(),
            source,
        };
        let name = path
            .file_name()
            .map(|name| name.to_string_lossy().to_string())
            .unwrap_or_else(|| path.display().to_string());
        let size = std::fs::metadata(path).map_err(io_err)?.len();
        if size > max_bytes {
            return Err(InputError::TooLarge {
                name,
                size,
                limit: max_bytes,
            });
        }
        let bytes = std::fs::read(path).map_err(io_err)?;
        Self::from_bytes(name, bytes, max_bytes)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn mime(&self) -> &'static str {
        self.mime
    }

    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    pub fn data_url(&self) -> String {
        format!("data:{};base64,{}", self.mime, BASE64.encode(self.bytes.as_slice()))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct PreviewRef(String);

impl PreviewRef {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for PreviewRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Default)]
pub struct PreviewRegistry {
    live: BTreeSet<PreviewRef>,
}

impl PreviewRegistry {
    pub fn acquire(&mut self) -> PreviewRef {
        let preview = PreviewRef(format!("blob:roomcraft/{}", uuid::Uuid::new_v4()));
        self.live.insert(preview.clone());
        preview
    }

    pub fn release(&mut self, preview: &PreviewRef) -> bool {
        self.live.remove(preview)
    }

    pub fn is_live(&self, preview: &PreviewRef) -> bool {
        self.live.contains(preview)
    }

    pub fn live(&self) -> usize {
        self.live.len()
    }
}

#[derive(Debug, Clone)]
pub struct CollectedImage {
    pub upload: ImageUpload,
    pub preview: PreviewRef,
}

#[derive(Debug, Default)]
pub struct InputCollector {
    primary: Option<CollectedImage>,
    auxiliary: Vec<CollectedImage>,
    previews: PreviewRegistry,
    max_auxiliary: Option<usize>,
}

impl InputCollector {
    pub fn new(max_auxiliary: Option<usize>) -> Self {
        Self {
            max_auxiliary,
            ..Self::default()
        }
    }

    pub fn set_primary_image(&mut self, upload: ImageUpload) -> PreviewRef {
        let preview = self.previews.acquire();
        if let Some(previous) = self.primary.take() {
            self.previews.release(&previous.preview);
            debug!(replaced = previous.upload.name(), "primary image replaced");
        }
        self.primary = Some(CollectedImage {
            upload,
            preview: preview.clone(),
        });
        preview
    }

    /// Append reference images in order. A batch that would pass the cap is
    /// refused whole.
    pub fn add_auxiliary_images(
        &mut self,
        uploads: Vec<ImageUpload>,
    ) -> Result<Vec<PreviewRef>, InputError> {
        if let Some(limit) = self.max_auxiliary {
            if self.auxiliary.len() + uploads.len() > limit {
                return Err(InputError::AuxiliaryLimit {
                    limit,
                    current: self.auxiliary.len(),
                    requested: uploads.len(),
                });
            }
        }
        let mut previews = Vec::with_capacity(uploads.len());
        for upload in uploads {
            let preview = self.previews.acquire();
            previews.push(preview.clone());
            self.auxiliary.push(CollectedImage { upload, preview });
        }
        Ok(previews)
    }

    pub fn remove_auxiliary_image(&mut self, index: usize) -> Result<ImageUpload, InputError> {
        if index >= self.auxiliary.len() {
            return Err(InputError::NoSuchAuxiliary {
                index,
                len: self.auxiliary.len(),
            });
        }
        let removed = self.auxiliary.remove(index);
        self.previews.release(&removed.preview);
        Ok(removed.upload)
    }

    pub fn clear(&mut self) {
        if let Some(primary) = self.primary.take() {
            self.previews.release(&primary.preview);
        }
        for image in self.auxiliary.drain(..) {
            self.previews.release(&image.preview);
        }
    }

    pub fn has_primary(&self) -> bool {
        self.primary.is_some()
    }

    pub fn primary(&self) -> Option<&CollectedImage> {
        self.primary.as_ref()
    }

    pub fn auxiliary(&self) -> &[CollectedImage] {
        &self.auxiliary
    }

    pub fn auxiliary_names(&self) -> Vec<String> {
        self.auxiliary
            .iter()
            .map(|image| image.upload.name().to_string())
            .collect()
    }

    pub fn live_previews(&self) -> usize {
        self.previews.live()
    }

    pub fn is_preview_live(&self, preview: &PreviewRef) -> bool {
        self.previews.is_live(preview)
    }
}
