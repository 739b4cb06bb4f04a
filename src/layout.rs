//! Default grant placement
//!
//! Counters, data buffer and optional wake word are packed back to back in
//! region 0, in role order, with no padding between them.

use crate::error::{DescriptorError, Result};
use crate::grant::{
    Grant, MIN_GRANT_COUNT, MIN_GRANT_COUNT_WITH_WAKE_WORD, RING_POSITION_SIZE, WAKE_WORD_SIZE,
};

/// Grants and element size produced by [`compute_default_layout`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DefaultLayout {
    pub grants: Vec<Grant>,
    pub quantum: u32,
}

impl DefaultLayout {
    /// Bytes of backing region the grants cover
    pub fn total_size(&self) -> usize {
        region_extent(&self.grants, 0)
    }
}

/// Extents of each grant, in role order
fn grant_extents(buffer_size: usize, want_wake_word: bool) -> impl Iterator<Item = usize> {
    let count = if want_wake_word {
        MIN_GRANT_COUNT_WITH_WAKE_WORD
    } else {
        MIN_GRANT_COUNT
    };
    [RING_POSITION_SIZE, RING_POSITION_SIZE, buffer_size, WAKE_WORD_SIZE]
        .into_iter()
        .take(count)
}

/// Plan the canonical layout, rejecting sizes whose offsets would not fit
/// the 32-bit offset field
pub fn try_compute_default_layout(
    buffer_size: usize,
    message_size: u32,
    want_wake_word: bool,
) -> Result<DefaultLayout> {
    let mut offset = 0usize;
    let mut grants = Vec::with_capacity(MIN_GRANT_COUNT_WITH_WAKE_WORD);

    for (i, extent) in grant_extents(buffer_size, want_wake_word).enumerate() {
        let start = u32::try_from(offset).map_err(|_| {
            DescriptorError::layout(format!(
                "grant {} starts at byte {}, offsets are limited to 32 bits",
                i, offset
            ))
        })?;
        grants.push(Grant::new(0, 0, start, extent));
        offset = offset
            .checked_add(extent)
            .ok_or_else(|| DescriptorError::layout("layout size overflows"))?;
    }

    Ok(DefaultLayout {
        grants,
        quantum: message_size,
    })
}

/// Plan the canonical layout for a ring of `buffer_size` bytes
///
/// Every grant offset must fit in a `u32`; use
/// [`try_compute_default_layout`] when the size is not trusted. Offsets
/// past that limit saturate instead of wrapping onto the counters.
pub fn compute_default_layout(
    buffer_size: usize,
    message_size: u32,
    want_wake_word: bool,
) -> DefaultLayout {
    debug_assert!(
        try_compute_default_layout(buffer_size, message_size, want_wake_word).is_ok(),
        "default layout for {} bytes does not fit 32-bit offsets",
        buffer_size
    );

    let mut offset = 0usize;
    let grants = grant_extents(buffer_size, want_wake_word)
        .map(|extent| {
            let grant = Grant::new(0, 0, u32::try_from(offset).unwrap_or(u32::MAX), extent);
            offset = offset.saturating_add(extent);
            grant
        })
        .collect();

    DefaultLayout {
        grants,
        quantum: message_size,
    }
}

/// Bytes the default layout needs for a ring of `buffer_size` bytes, `None`
/// on overflow
pub const fn required_size(buffer_size: usize, want_wake_word: bool) -> Option<usize> {
    let Some(counters) = buffer_size.checked_add(2 * RING_POSITION_SIZE) else {
        return None;
    };
    if want_wake_word {
        counters.checked_add(WAKE_WORD_SIZE)
    } else {
        Some(counters)
    }
}

/// Highest byte any grant touches in region `source_index`
///
/// Grants whose end overflows are skipped; descriptor validation rejects them.
pub fn region_extent(grants: &[Grant], source_index: u32) -> usize {
    grants
        .iter()
        .filter(|g| g.source_index == source_index)
        .filter_map(Grant::end)
        .max()
        .unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::grant::GrantRole;
    use proptest::prelude::*;

    #[test]
    fn test_layout_without_wake_word() {
        let layout = compute_default_layout(64, 4, false);
        assert_eq!(
            layout.grants,
            vec![
                Grant::new(0, 0, 0, 8),
                Grant::new(0, 0, 8, 8),
                Grant::new(0, 0, 16, 64),
            ]
        );
        assert_eq!(layout.quantum, 4);
        assert_eq!(layout.total_size(), 80);
    }

    #[test]
    fn test_layout_with_wake_word() {
        let layout = compute_default_layout(64, 4, true);
        assert_eq!(layout.grants.len(), 4);
        assert_eq!(
            layout.grants[GrantRole::WakeWord.index()],
            Grant::new(0, 0, 80, 4)
        );
        assert_eq!(Some(layout.total_size()), required_size(64, true));
    }

    #[test]
    fn test_checked_layout_matches_trusted() {
        for wake in [false, true] {
            assert_eq!(
                try_compute_default_layout(64, 4, wake).unwrap(),
                compute_default_layout(64, 4, wake)
            );
        }
    }

    #[cfg(target_pointer_width = "64")]
    #[test]
    fn test_wake_word_past_32_bit_offsets_rejected() {
        let buffer = (1usize << 32) + 8;
        assert!(matches!(
            try_compute_default_layout(buffer, 8, true),
            Err(DescriptorError::InvalidLayout { .. })
        ));

        // Without a wake word every offset still fits.
        let layout = try_compute_default_layout(buffer, 8, false).unwrap();
        assert_eq!(layout.grants[GrantRole::DataBuffer.index()].extent, buffer);
    }

    #[test]
    fn test_huge_buffer_rejected() {
        assert!(try_compute_default_layout(usize::MAX, 1, true).is_err());
        assert_eq!(required_size(usize::MAX, false), None);
        assert_eq!(required_size(usize::MAX - 16, true), None);
    }

    #[test]
    fn test_region_extent_filters_by_source() {
        let grants = [Grant::new(0, 0, 0, 8), Grant::new(0, 1, 0, 4096)];
        assert_eq!(region_extent(&grants, 0), 8);
        assert_eq!(region_extent(&grants, 1), 4096);
        assert_eq!(region_extent(&grants, 2), 0);
    }

    proptest! {
        #[test]
        fn prop_layout_is_contiguous(buffer in 0usize..1 << 20, quantum in 1u32..256, wake in any::<bool>()) {
            let layout = compute_default_layout(buffer, quantum, wake);

            prop_assert_eq!(layout.grants.len(), if wake { 4 } else { 3 });
            prop_assert_eq!(layout.grants[0].offset, 0);
            for pair in layout.grants.windows(2) {
                prop_assert_eq!(Some(pair[1].offset as usize), pair[0].end());
            }
            prop_assert!(layout.grants.iter().all(|g| g.source_index == 0 && g.flags == 0));
            prop_assert_eq!(layout.grants[GrantRole::DataBuffer.index()].extent, buffer);
            prop_assert_eq!(Some(layout.total_size()), required_size(buffer, wake));
        }
    }
}
