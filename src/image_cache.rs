// URL-keyed image cache. Generic over the handle type so the bookkeeping stays
// testable off the browser; the canvas backend stores `HtmlImageElement`s.

use std::collections::HashMap;

#[derive(Debug, Clone, PartialEq)]
pub enum ImageEntry<H> {
    Loading,
    Ready(H),
    Failed,
}

#[derive(Debug)]
pub struct ImageCache<H> {
    entries: HashMap<String, ImageEntry<H>>,
}

impl<H> Default for ImageCache<H> {
    fn default() -> Self {
        ImageCache {
            entries: HashMap::new(),
        }
    }
}

impl<H> ImageCache<H> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Mark `url` as loading. Returns `true` only the first time a URL is
    /// requested, so each image is fetched once.
    pub fn request(&mut self, url: &str) -> bool {
        if self.entries.contains_key(url) {
            return false;
        }
        self.entries.insert(url.to_string(), ImageEntry::Loading);
        true
    }

    pub fn complete(&mut self, url: &str, handle: H) {
        self.entries.insert(url.to_string(), ImageEntry::Ready(handle));
    }

    pub fn fail(&mut self, url: &str) {
        log::warn!("Image failed to load: {url}");
        self.entries.insert(url.to_string(), ImageEntry::Failed);
    }

    pub fn get(&self, url: &str) -> Option<&H> {
        match self.entries.get(url) {
            Some(ImageEntry::Ready(handle)) => Some(handle),
            _ => None,
        }
    }

}
