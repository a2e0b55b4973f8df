//! Intermediate page storage.
//!
//! Processed pages are flushed to a temporary directory between batches so
//! only one batch is ever held in memory. The directory is removed when the
//! store is dropped, on success and on failure alike.

use std::collections::BTreeMap;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use image::codecs::png::{CompressionType, FilterType as PngFilter, PngEncoder};
use image::{ExtendedColorType, ImageEncoder, RgbImage};
use tempfile::TempDir;

use crate::error::{Error, Result};

/// Pages keyed by their document index.
#[derive(Debug)]
pub struct PageStore {
    dir: TempDir,
    pages: BTreeMap<usize, PathBuf>,
}

impl PageStore {
    /// Create an empty store in a fresh temporary directory under `parent`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Io`] if the directory cannot be created.
    pub fn new_in(parent: &Path) -> Result<Self> {
        let dir = tempfile::Builder::new()
            .prefix(".pages-")
            .tempdir_in(parent)?;
        Ok(Self {
            dir,
            pages: BTreeMap::new(),
        })
    }

    /// Persist `image` as page `index`, replacing any earlier version.
    ///
    /// # Errors
    ///
    /// Returns an error if encoding or writing fails.
    pub fn put(&mut self, index: usize, image: &RgbImage) -> Result<()> {
        let path = self.dir.path().join(format!("page_{index:04}.png"));
        let mut writer = BufWriter::new(File::create(&path)?);
        PngEncoder::new_with_quality(&mut writer, CompressionType::Fast, PngFilter::Adaptive)
            .write_image(
                image.as_raw(),
                image.width(),
                image.height(),
                ExtendedColorType::Rgb8,
            )?;
        writer.flush()?;
        self.pages.insert(index, path);
        Ok(())
    }

    fn path(&self, index: usize) -> Result<&Path> {
        self.pages
            .get(&index)
            .map(PathBuf::as_path)
            .ok_or_else(|| Error::decode(format!("page {}", index + 1), "not in page store"))
    }

    /// Load page `index` back.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Decode`] if the page is missing or unreadable.
    pub fn get(&self, index: usize) -> Result<RgbImage> {
        let path = self.path(index)?;
        Ok(image::open(path)
            .map_err(|e| Error::decode(format!("stored page {}", index + 1), e))?
            .to_rgb8())
    }

    /// Stored page paths in page order.
    #[must_use]
    pub fn paths(&self) -> Vec<PathBuf> {
        self.pages.values().cloned().collect()
    }

    /// Stored page indices in ascending order.
    pub fn indices(&self) -> impl Iterator<Item = usize> + '_ {
        self.pages.keys().copied()
    }

    /// Number of stored pages.
    #[must_use]
    pub fn len(&self) -> usize {
        self.pages.len()
    }

    /// True when nothing has been stored.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.pages.is_empty()
    }

    /// The backing directory.
    #[must_use]
    pub fn dir(&self) -> &Path {
        self.dir.path()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgb;

    #[test]
    fn put_then_get_is_lossless() {
        let parent = TempDir::new().unwrap();
        let mut store = PageStore::new_in(parent.path()).unwrap();
        let page = RgbImage::from_fn(17, 9, |x, y| Rgb([x as u8, y as u8, 200]));
        store.put(3, &page).unwrap();
        assert_eq!(store.get(3).unwrap(), page);
        assert!(matches!(store.get(4), Err(Error::Decode { .. })));
    }

    #[test]
    fn indices_are_ordered_regardless_of_insert_order() {
        let parent = TempDir::new().unwrap();
        let mut store = PageStore::new_in(parent.path()).unwrap();
        let page = RgbImage::new(2, 2);
        for i in [7, 2, 5] {
            store.put(i, &page).unwrap();
        }
        assert_eq!(store.indices().collect::<Vec<_>>(), [2, 5, 7]);
        assert_eq!(store.len(), 3);
    }

    #[test]
    fn directory_is_removed_on_drop() {
        let parent = TempDir::new().unwrap();
        let dir = {
            let mut store = PageStore::new_in(parent.path()).unwrap();
            store.put(0, &RgbImage::new(4, 4)).unwrap();
            store.dir().to_path_buf()
        };
        assert!(!dir.exists());
    }
}
