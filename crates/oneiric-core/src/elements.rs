//! Symbol frequency index derived from the dream list, and the codex categories built on it.

use std::collections::BTreeMap;

use chrono::DateTime;
use chrono::Utc;

use crate::state::Dream;

/// A symbol seen more than this many times counts as mastered.
pub const MASTERY_THRESHOLD: usize = 5;

/// Target shown in the codex hall.
pub const CODEX_SAMPLE_GOAL: usize = 365;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ElementEntry {
    pub count: usize,
    pub first_seen: DateTime<Utc>,
    pub latest_dream_id: String,
    pub latest_date: DateTime<Utc>,
    pub latest_image_url: Option<String>,
}

impl ElementEntry {
    fn new(dream: &Dream) -> Self {
        Self {
            count: 0,
            first_seen: dream.date,
            latest_dream_id: dream.id.clone(),
            latest_date: dream.date,
            latest_image_url: dream.image_url.clone(),
        }
    }

    fn observe(&mut self, dream: &Dream) {
        self.count += 1;
        if dream.date > self.latest_date {
            self.latest_dream_id = dream.id.clone();
            self.latest_date = dream.date;
            self.latest_image_url = dream.image_url.clone();
        }
        if dream.date < self.first_seen {
            self.first_seen = dream.date;
        }
    }

    pub fn is_mastered(&self) -> bool {
        self.count > MASTERY_THRESHOLD
    }
}

pub type ElementIndex = BTreeMap<String, ElementEntry>;

/// Counts every element tag and every mood across `dreams`.
///
/// Recomputed from scratch on each call. "Latest" is decided by dream date, not by list
/// position; on equal dates the first one encountered wins.
pub fn aggregate(dreams: &[Dream]) -> ElementIndex {
    let mut index = ElementIndex::new();
    for dream in dreams {
        let mood = dream
            .mood
            .as_deref()
            .map(str::trim)
            .filter(|mood| !mood.is_empty());
        let symbols = dream
            .elements
            .iter()
            .map(|element| element.trim())
            .filter(|element| !element.is_empty())
            .chain(mood);
        for symbol in symbols {
            index
                .entry(symbol.to_string())
                .or_insert_with(|| ElementEntry::new(dream))
                .observe(dream);
        }
    }
    index
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum CodexCategory {
    Living,
    Nature,
    Emotion,
    Scene,
}

pub const CODEX_CATEGORIES: [CodexCategory; 4] = [
    CodexCategory::Living,
    CodexCategory::Nature,
    CodexCategory::Emotion,
    CodexCategory::Scene,
];

impl CodexCategory {
    pub fn id(self) -> &'static str {
        match self {
            Self::Living => "living",
            Self::Nature => "nature",
            Self::Emotion => "emotion",
            Self::Scene => "scene",
        }
    }

    pub fn from_id(id: &str) -> Option<Self> {
        CODEX_CATEGORIES
            .iter()
            .copied()
            .find(|category| category.id().eq_ignore_ascii_case(id))
    }

    pub fn label(self) -> &'static str {
        match self {
            Self::Living => "生灵万物",
            Self::Nature => "自然元素",
            Self::Emotion => "核心情绪",
            Self::Scene => "经典场景",
        }
    }

    pub fn description(self) -> &'static str {
        match self {
            Self::Living => "潜意识的化身",
            Self::Nature => "环境与基调",
            Self::Emotion => "内在的波澜",
            Self::Scene => "循环的剧本",
        }
    }

    pub fn items(self) -> &'static [&'static str] {
        match self {
            Self::Living => &["猫", "狗", "蛇", "鸟", "鱼", "狼", "鹿", "老虎", "树", "花"],
            Self::Nature => &["火", "水", "雨", "雪", "太阳", "月亮", "星星", "风", "海", "山"],
            Self::Emotion => &["恐惧", "喜悦", "悲伤", "焦虑", "平静", "愤怒", "困惑", "孤独"],
            Self::Scene => &["飞翔", "坠落", "追逐", "考试", "迟到", "掉牙", "裸体", "迷路", "开车", "电梯"],
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TileState {
    Locked,
    Collected,
    Mastered,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CodexTile<'a> {
    pub name: &'static str,
    pub state: TileState,
    pub entry: Option<&'a ElementEntry>,
}

pub fn tiles(category: CodexCategory, index: &ElementIndex) -> Vec<CodexTile<'_>> {
    category
        .items()
        .iter()
        .map(|name| {
            let entry = index.get(*name);
            let state = match entry {
                None => TileState::Locked,
                Some(entry) if entry.is_mastered() => TileState::Mastered,
                Some(_) => TileState::Collected,
            };
            CodexTile { name, state, entry }
        })
        .collect()
}

/// `(collected, total)` for one category.
pub fn progress(category: CodexCategory, index: &ElementIndex) -> (usize, usize) {
    let items = category.items();
    let collected = items.iter().filter(|name| index.contains_key(**name)).count();
    (collected, items.len())
}
