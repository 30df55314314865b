use std::sync::Arc;

use fxhash::FxHashMap;
use thiserror::Error;

/// Extraction function supplied by the caller, mapping a data record to its icon.
pub type GetIcon<R> = Arc<dyn Fn(&R) -> Icon + Send + Sync>;

/// An icon image referenced by data records.
///
/// The `url` is the icon's identity: two records whose icons share a url are
/// considered to reference the same image.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Icon {
    pub url: String,
    pub width: u32,
    pub height: u32,
}

impl Icon {
    pub fn new(url: impl Into<String>, width: u32, height: u32) -> Self {
        Self {
            url: url.into(),
            width,
            height,
        }
    }
}

/// The distinct icons referenced by one data collection.
///
/// Identity-unique (first insertion wins) and insertion-ordered, so packing a
/// set is deterministic.
#[derive(Debug, Clone, Default)]
pub struct IconSet {
    icons: Vec<Icon>,
    index: FxHashMap<String, usize>,
}

impl IconSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Extracts the distinct icon set from a data collection.
    ///
    /// Icons with zero width or height are rejected here, before they can
    /// reach the packer.
    pub fn from_records<R>(records: &[R], get_icon: &GetIcon<R>) -> Result<Self, IconError> {
        let mut set = Self::new();
        for record in records {
            set.insert(get_icon(record))?;
        }
        Ok(set)
    }

    /// Inserts an icon, keeping the existing entry on duplicate identity.
    /// Returns whether the icon was newly added.
    pub fn insert(&mut self, icon: Icon) -> Result<bool, IconError> {
        if icon.width == 0 || icon.height == 0 {
            return Err(IconError::InvalidDimensions {
                url: icon.url,
                width: icon.width,
                height: icon.height,
            });
        }
        if self.index.contains_key(&icon.url) {
            return Ok(false);
        }
        self.index.insert(icon.url.clone(), self.icons.len());
        self.icons.push(icon);
        Ok(true)
    }

    pub fn get(&self, url: &str) -> Option<&Icon> {
        self.index.get(url).map(|&slot| &self.icons[slot])
    }

    pub fn contains_url(&self, url: &str) -> bool {
        self.index.contains_key(url)
    }

    /// Iterates icons in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = &Icon> {
        self.icons.iter()
    }

    pub fn urls(&self) -> impl Iterator<Item = &str> {
        self.icons.iter().map(|icon| icon.url.as_str())
    }

    pub fn len(&self) -> usize {
        self.icons.len()
    }

    pub fn is_empty(&self) -> bool {
        self.icons.is_empty()
    }

    /// True if this set references at least one identity absent from `old`.
    /// This is the manager's change-detection predicate.
    pub fn introduces_new_urls(&self, old: &IconSet) -> bool {
        self.urls().any(|url| !old.contains_url(url))
    }
}

#[derive(Debug, Error)]
pub enum IconError {
    #[error("icon {url:?} has invalid dimensions {width}x{height} (both must be nonzero)")]
    InvalidDimensions { url: String, width: u32, height: u32 },
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    /// Tests that duplicate identities keep the first inserted icon.
    #[test]
    fn test_insert_first_wins() {
        let mut set = IconSet::new();
        assert!(set.insert(Icon::new("a.png", 10, 10)).unwrap());
        assert!(!set.insert(Icon::new("a.png", 99, 99)).unwrap());

        assert_eq!(set.len(), 1);
        assert_eq!(set.get("a.png").unwrap().width, 10);
    }

    /// Tests that zero-sized icons are rejected at insertion.
    #[test]
    fn test_insert_rejects_zero_dimensions() {
        let mut set = IconSet::new();
        let result = set.insert(Icon::new("a.png", 0, 10));
        assert!(matches!(result, Err(IconError::InvalidDimensions { .. })));

        let result = set.insert(Icon::new("b.png", 10, 0));
        assert!(matches!(result, Err(IconError::InvalidDimensions { .. })));
    }

    /// Tests that iteration follows insertion order.
    #[test]
    fn test_iteration_order() {
        let mut set = IconSet::new();
        set.insert(Icon::new("c.png", 1, 1)).unwrap();
        set.insert(Icon::new("a.png", 2, 2)).unwrap();
        set.insert(Icon::new("b.png", 3, 3)).unwrap();

        let urls: Vec<_> = set.urls().collect();
        assert_eq!(urls, ["c.png", "a.png", "b.png"]);
    }

    /// Tests extraction from records, including dedup by identity.
    #[test]
    fn test_from_records_dedups() {
        let records = vec!["a.png", "b.png", "a.png"];
        let get_icon: GetIcon<&str> = Arc::new(|record| Icon::new(*record, 16, 16));

        let set = IconSet::from_records(&records, &get_icon).unwrap();
        assert_eq!(set.len(), 2);
        assert!(set.contains_url("a.png"));
        assert!(set.contains_url("b.png"));
    }

    /// Tests the change-detection predicate: subsets introduce nothing new,
    /// a previously-unseen identity does.
    #[test]
    fn test_introduces_new_urls() {
        let mut old = IconSet::new();
        old.insert(Icon::new("a.png", 1, 1)).unwrap();
        old.insert(Icon::new("b.png", 1, 1)).unwrap();

        let mut subset = IconSet::new();
        subset.insert(Icon::new("a.png", 1, 1)).unwrap();
        assert!(!subset.introduces_new_urls(&old));

        let mut superset = IconSet::new();
        superset.insert(Icon::new("a.png", 1, 1)).unwrap();
        superset.insert(Icon::new("c.png", 1, 1)).unwrap();
        assert!(superset.introduces_new_urls(&old));
    }
}
