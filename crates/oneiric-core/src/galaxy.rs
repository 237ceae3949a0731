//! The anonymous "resonance" constellation shown in the galaxy view.

pub const RESONANCE_STEP_MS: u64 = 1_500;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResonanceState {
    Idle,
    Sending,
    Sent,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GalaxyStar {
    pub id: &'static str,
    pub keywords: &'static [&'static str],
    pub color: &'static str,
    /// Position as a percentage of the view.
    pub x: u8,
    pub y: u8,
    pub distance: f32,
    pub location: &'static str,
}

pub const GALAXY_STARS: [GalaxyStar; 9] = [
    GalaxyStar {
        id: "g1",
        keywords: &["#考试迟到", "#焦虑", "#找不到教室"],
        color: "#ef4444",
        x: 20,
        y: 30,
        distance: 1.0,
        location: "数千公里外的北方",
    },
    GalaxyStar {
        id: "g2",
        keywords: &["#高空坠落", "#失重", "#惊醒"],
        color: "#3b82f6",
        x: 70,
        y: 60,
        distance: 0.8,
        location: "来自潮湿的南方",
    },
    GalaxyStar {
        id: "g3",
        keywords: &["#牙齿掉落", "#无力感", "#镜子"],
        color: "#a855f7",
        x: 40,
        y: 80,
        distance: 2.0,
        location: "或许就在隔壁城市",
    },
    GalaxyStar {
        id: "g4",
        keywords: &["#被追逐", "#跑不动", "#黑影"],
        color: "#10b981",
        x: 80,
        y: 20,
        distance: 3.0,
        location: "未知的海岸线",
    },
    GalaxyStar {
        id: "g5",
        keywords: &["#会飞", "#俯瞰", "#自由"],
        color: "#f59e0b",
        x: 15,
        y: 70,
        distance: 1.5,
        location: "高原之上",
    },
    GalaxyStar {
        id: "g6",
        keywords: &["#迷路", "#楼梯", "#循环"],
        color: "#6366f1",
        x: 50,
        y: 50,
        distance: 0.5,
        location: "喧嚣的都市角落",
    },
    GalaxyStar {
        id: "g7",
        keywords: &["#已故亲人", "#温暖", "#无言"],
        color: "#ec4899",
        x: 60,
        y: 15,
        distance: 2.5,
        location: "安静的山谷",
    },
    GalaxyStar {
        id: "g8",
        keywords: &["#回到学校", "#做题", "#同桌"],
        color: "#14b8a6",
        x: 85,
        y: 85,
        distance: 1.2,
        location: "久远的记忆里",
    },
    GalaxyStar {
        id: "g9",
        keywords: &["#赤身裸体", "#羞耻", "#人群"],
        color: "#f43f5e",
        x: 30,
        y: 40,
        distance: 2.8,
        location: "异国他乡",
    },
];

pub fn star(id: &str) -> Option<&'static GalaxyStar> {
    GALAXY_STARS.iter().find(|star| star.id == id)
}
