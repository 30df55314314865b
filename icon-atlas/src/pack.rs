use fxhash::FxHashMap;
use log::warn;
use thiserror::Error;

use crate::icon::{Icon, IconSet};

/// An icon's assigned sub-rectangle inside the atlas.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PackedIcon {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

/// Where each icon lives in the atlas, keyed by identity. Frozen once
/// published for a generation; rendering code divides the rectangle by the
/// atlas dimensions to obtain UVs.
pub type IconMapping = FxHashMap<String, PackedIcon>;

/// Result of one packing run.
#[derive(Debug, Clone)]
pub struct Packing {
    pub mapping: IconMapping,
    /// Next power of two covering the packed rows. The atlas width is always
    /// the configured maximum, so renderers can rely on a stable canvas width
    /// across repackings.
    pub atlas_height: u32,
}

/// Mutable packing state threaded through the fold over the icon sequence.
/// Icons accumulate in `pending` until their row's height is known.
#[derive(Default)]
struct Shelf<'a> {
    x_offset: u32,
    y_offset: u32,
    row_height: u32,
    pending: Vec<(&'a Icon, u32)>,
}

impl Shelf<'_> {
    fn commit_row(&mut self, mapping: &mut IconMapping) {
        for (icon, x) in self.pending.drain(..) {
            mapping.insert(
                icon.url.clone(),
                PackedIcon {
                    x,
                    y: self.y_offset,
                    width: icon.width,
                    height: icon.height,
                },
            );
        }
    }
}

/// Packs icons into rows, left-to-right then top-to-bottom.
///
/// Pure and deterministic: the same insertion-ordered set and bounds always
/// produce the same mapping and height. An empty set yields an empty mapping
/// with height 1.
///
/// Known limitation: an icon wider than `max_width` is placed alone at
/// `x = 0` without splitting, so its row exceeds the atlas width. This is
/// flagged with a warning rather than rejected.
pub fn pack_icons(
    icons: &IconSet,
    max_width: u32,
    max_height: u32,
) -> Result<Packing, PackError> {
    let mut mapping = IconMapping::default();

    let mut shelf = icons.iter().try_fold(Shelf::default(), |mut shelf, icon| {
        if icon.width > max_width {
            warn!(
                "pack_icons: icon {:?} is wider than the atlas ({} > {}), its row will overflow",
                icon.url, icon.width, max_width
            );
        }

        if shelf.x_offset + icon.width > max_width {
            shelf.commit_row(&mut mapping);
            shelf.x_offset = 0;
            shelf.y_offset += shelf.row_height;
            shelf.row_height = 0;

            if shelf.y_offset > max_height {
                return Err(PackError::CapacityExceeded {
                    content_height: shelf.y_offset,
                    max_height,
                });
            }
        }

        shelf.pending.push((icon, shelf.x_offset));
        shelf.x_offset += icon.width;
        shelf.row_height = shelf.row_height.max(icon.height);
        Ok(shelf)
    })?;

    let content_height = shelf.y_offset + shelf.row_height;
    if content_height > max_height {
        return Err(PackError::CapacityExceeded {
            content_height,
            max_height,
        });
    }
    shelf.commit_row(&mut mapping);

    Ok(Packing {
        mapping,
        atlas_height: content_height.max(1).next_power_of_two(),
    })
}

#[derive(Debug, Error)]
pub enum PackError {
    #[error("packed content height {content_height} exceeds the maximum atlas height {max_height}")]
    CapacityExceeded { content_height: u32, max_height: u32 },
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn set_of(icons: &[(&str, u32, u32)]) -> IconSet {
        let mut set = IconSet::new();
        for &(url, width, height) in icons {
            set.insert(Icon::new(url, width, height)).unwrap();
        }
        set
    }

    fn rects_overlap(a: &PackedIcon, b: &PackedIcon) -> bool {
        a.x < b.x + b.width && b.x < a.x + a.width && a.y < b.y + b.height && b.y < a.y + a.height
    }

    /// Tests the canonical three-icon scenario: B does not fit beside A
    /// (100 + 200 > 256), so every icon lands in its own row, stacked by the
    /// preceding row's height.
    #[test]
    fn test_reference_scenario() {
        let icons = set_of(&[("a", 100, 50), ("b", 200, 60), ("c", 100, 40)]);
        let packing = pack_icons(&icons, 256, 768).unwrap();

        let a = packing.mapping["a"];
        let b = packing.mapping["b"];
        let c = packing.mapping["c"];

        assert_eq!((a.x, a.y), (0, 0));
        assert_eq!((b.x, b.y), (0, 50));
        assert_eq!((c.x, c.y), (0, 110));
        // Content height 150, rounded up to the next power of two.
        assert_eq!(packing.atlas_height, 256);
    }

    /// Tests that every rectangle lies inside the atlas bounds and that no
    /// two rectangles overlap.
    #[test]
    fn test_containment_and_no_overlap() {
        let icons = set_of(&[
            ("a", 64, 30),
            ("b", 128, 50),
            ("c", 60, 12),
            ("d", 200, 44),
            ("e", 16, 90),
            ("f", 100, 8),
        ]);
        let max_width = 256;
        let packing = pack_icons(&icons, max_width, 768).unwrap();

        let rects: Vec<_> = packing.mapping.values().copied().collect();
        for rect in &rects {
            assert!(rect.x + rect.width <= max_width);
            assert!(rect.y + rect.height <= packing.atlas_height);
        }
        for (i, a) in rects.iter().enumerate() {
            for b in &rects[i + 1..] {
                assert!(!rects_overlap(a, b), "{a:?} overlaps {b:?}");
            }
        }
    }

    /// Tests that repeated invocations over the same ordered set produce an
    /// identical mapping and height.
    #[test]
    fn test_deterministic() {
        let icons = set_of(&[("a", 100, 50), ("b", 200, 60), ("c", 100, 40)]);

        let first = pack_icons(&icons, 256, 768).unwrap();
        let second = pack_icons(&icons, 256, 768).unwrap();

        assert_eq!(first.mapping, second.mapping);
        assert_eq!(first.atlas_height, second.atlas_height);
    }

    /// Tests that the atlas height is a power of two covering the rows.
    #[test]
    fn test_height_is_power_of_two() {
        let icons = set_of(&[("a", 256, 100), ("b", 256, 100)]);
        let packing = pack_icons(&icons, 256, 768).unwrap();

        // Two full-width rows of 100: content height 200, rounded to 256.
        assert_eq!(packing.atlas_height, 256);
        assert!(packing.atlas_height.is_power_of_two());
    }

    /// Tests the zero-icon edge case: empty mapping, minimal height.
    #[test]
    fn test_empty_set() {
        let packing = pack_icons(&IconSet::new(), 256, 768).unwrap();
        assert!(packing.mapping.is_empty());
        assert_eq!(packing.atlas_height, 1);
    }

    /// Tests that an icon wider than the atlas is still placed, alone at
    /// x = 0 in its own row.
    #[test]
    fn test_over_wide_icon_placed_alone() {
        let icons = set_of(&[("a", 100, 40), ("wide", 300, 20), ("b", 100, 30)]);
        let packing = pack_icons(&icons, 256, 768).unwrap();

        let wide = packing.mapping["wide"];
        assert_eq!(wide.x, 0);
        assert_eq!(wide.y, 40);
        // The over-wide row overflows the canvas width; the next icon starts
        // a fresh row below it.
        let b = packing.mapping["b"];
        assert_eq!((b.x, b.y), (0, 60));
    }

    /// Tests that exceeding the maximum atlas height is reported, not
    /// silently truncated.
    #[test]
    fn test_capacity_exceeded() {
        let icons = set_of(&[("a", 256, 500), ("b", 256, 500)]);
        let result = pack_icons(&icons, 256, 768);
        assert!(matches!(result, Err(PackError::CapacityExceeded { .. })));
    }

    /// Tests that a single row taller than the cap is also rejected, even
    /// though no row advance ever runs.
    #[test]
    fn test_capacity_exceeded_single_row() {
        let icons = set_of(&[("a", 64, 800)]);
        let result = pack_icons(&icons, 256, 768);
        assert!(matches!(
            result,
            Err(PackError::CapacityExceeded {
                content_height: 800,
                max_height: 768
            })
        ));
    }
}
