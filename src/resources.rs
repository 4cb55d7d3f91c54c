use crate::bitmap::Bitmap;
use crate::error::{Error, Result};

use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;

/// Cache of bitmaps loaded while building a scene, so a texture that
/// several materials reference is decoded once and shared.
pub struct Resources {
    loaded_bitmaps: HashMap<String, Arc<Bitmap>>,
}

impl Resources {
    pub fn new() -> Resources {
        Resources {
            loaded_bitmaps: HashMap::new(),
        }
    }

    pub fn load_bitmap(&mut self, path: &Path) -> Result<Arc<Bitmap>> {
        let absolute = path.canonicalize().map_err(|e| {
            Error::Config(format!(
                "There was a problem finding the image path {}: {}",
                path.display(),
                e
            ))
        })?;
        let key = match absolute.to_str() {
            Some(s) => String::from(s),
            None => {
                return Err(Error::Config(format!(
                    "The image path {} is not valid UTF-8.",
                    path.display()
                )))
            }
        };

        if let Some(cached) = self.loaded_bitmaps.get(&key) {
            return Ok(Arc::clone(cached));
        }

        let bitmap = Arc::new(Bitmap::load(&absolute)?);
        self.loaded_bitmaps.insert(key, Arc::clone(&bitmap));
        Ok(bitmap)
    }
}
