//! Depth emphasis for the dream list.
//!
//! Everything here is a pure function of the scroll offset, the item index and the
//! layout; nothing is cached between calls.

use crate::state::Dream;

pub const DEFAULT_ITEM_HEIGHT: f32 = 200.0;
pub const DEFAULT_VIEWPORT_HEIGHT: f32 = 600.0;

pub const MIN_SCALE: f32 = 0.85;
pub const MIN_OPACITY: f32 = 0.4;
pub const MAX_BLUR: f32 = 4.0;
const OPACITY_FLOOR: f32 = 0.2;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CollectionLayout {
    pub item_height: f32,
    pub viewport_height: f32,
}

impl Default for CollectionLayout {
    fn default() -> Self {
        Self {
            item_height: DEFAULT_ITEM_HEIGHT,
            viewport_height: DEFAULT_VIEWPORT_HEIGHT,
        }
    }
}

impl CollectionLayout {
    /// Distance at which emphasis bottoms out.
    pub fn max_distance(&self) -> f32 {
        self.viewport_height / 1.5
    }

    pub fn item_center(&self, index: usize) -> f32 {
        index as f32 * self.item_height + self.item_height / 2.0
    }

    pub fn max_scroll(&self, len: usize) -> f32 {
        (len as f32 * self.item_height - self.viewport_height).max(0.0)
    }

    pub fn clamp_scroll(&self, scroll_offset: f32, len: usize) -> f32 {
        if scroll_offset.is_nan() {
            return 0.0;
        }
        scroll_offset.clamp(0.0, self.max_scroll(len))
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Emphasis {
    pub scale: f32,
    pub opacity: f32,
    pub blur: f32,
    pub z_index: i32,
}

impl Emphasis {
    pub const FULL: Self = Self {
        scale: 1.0,
        opacity: 1.0,
        blur: 0.0,
        z_index: 100,
    };

    pub const RECEDED: Self = Self {
        scale: MIN_SCALE,
        opacity: MIN_OPACITY,
        blur: MAX_BLUR,
        z_index: 0,
    };
}

pub fn emphasis(scroll_offset: f32, index: usize, layout: &CollectionLayout) -> Emphasis {
    let viewport_center = scroll_offset + layout.viewport_height / 2.0;
    let distance = (viewport_center - layout.item_center(index)).abs();
    let max_distance = layout.max_distance();

    if distance >= max_distance {
        return Emphasis::RECEDED;
    }

    let ratio = distance / max_distance;
    Emphasis {
        scale: 1.0 - ratio * 0.15,
        opacity: (1.0 - ratio * 0.6).max(OPACITY_FLOOR),
        blur: ratio * MAX_BLUR,
        z_index: ((1.0 - ratio) * 100.0).round() as i32,
    }
}

/// Index of the item whose centre is nearest the viewport centre.
pub fn focused_index(scroll_offset: f32, len: usize, layout: &CollectionLayout) -> Option<usize> {
    if len == 0 {
        return None;
    }
    let viewport_center = scroll_offset + layout.viewport_height / 2.0;
    let raw = ((viewport_center - layout.item_height / 2.0) / layout.item_height).round();
    Some((raw.max(0.0) as usize).min(len - 1))
}

#[derive(Debug, Clone, PartialEq)]
pub struct CollectionRow<'a> {
    pub index: usize,
    pub dream: &'a Dream,
    pub emphasis: Emphasis,
}

pub fn project<'a>(
    dreams: &'a [Dream],
    scroll_offset: f32,
    layout: &CollectionLayout,
) -> Vec<CollectionRow<'a>> {
    dreams
        .iter()
        .enumerate()
        .map(|(index, dream)| CollectionRow {
            index,
            dream,
            emphasis: emphasis(scroll_offset, index, layout),
        })
        .collect()
}
