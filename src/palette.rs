use std::fmt;

use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::error::RegionError;

/// 24 位 RGB 颜色 (0xRRGGBB)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "ColorRepr", into = "u32")]
pub struct Color(u32);

/// JSON 中颜色可以写成整数 (16734003) 或十六进制字符串 ("#FF5733")
#[derive(Deserialize)]
#[serde(untagged)]
enum ColorRepr {
    Int(u32),
    Hex(String),
}

impl TryFrom<ColorRepr> for Color {
    type Error = RegionError;

    fn try_from(repr: ColorRepr) -> Result<Self, Self::Error> {
        match repr {
            ColorRepr::Int(value) => Color::new(value),
            ColorRepr::Hex(text) => Color::from_hex(&text),
        }
    }
}

impl From<Color> for u32 {
    fn from(color: Color) -> Self {
        color.0
    }
}

impl Color {
    pub const MAX: u32 = 0xFF_FFFF;

    pub fn new(value: u32) -> Result<Self, RegionError> {
        if value > Self::MAX {
            return Err(RegionError::InvalidColor(format!(
                "0x{:X} 超出 24 位范围",
                value
            )));
        }
        Ok(Color(value))
    }

    const fn rgb(value: u32) -> Self {
        Color(value & Self::MAX)
    }

    /// 解析 "#RRGGBB"、"RRGGBB" 或 "0xRRGGBB"
    pub fn from_hex(text: &str) -> Result<Self, RegionError> {
        let trimmed = text.trim();
        let digits = trimmed
            .strip_prefix('#')
            .or_else(|| trimmed.strip_prefix("0x"))
            .or_else(|| trimmed.strip_prefix("0X"))
            .unwrap_or(trimmed);

        if digits.len() != 6 {
            return Err(RegionError::InvalidColor(format!(
                "'{}' 不是 6 位十六进制颜色",
                text
            )));
        }

        u32::from_str_radix(digits, 16)
            .map(Color)
            .map_err(|e| RegionError::InvalidColor(format!("'{}': {}", text, e)))
    }

    pub fn value(&self) -> u32 {
        self.0
    }

    pub fn to_hex(&self) -> String {
        format!("#{:06X}", self.0)
    }
}

impl fmt::Display for Color {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{:06X}", self.0)
    }
}

/// 内置默认调色板，按谓词顺序取色
pub const DEFAULT_PALETTE: [Color; 9] = [
    Color::rgb(0xFF5733), // Vivid Orange
    Color::rgb(0x6A8A82), // Sage Green
    Color::rgb(0x3E4095), // Royal Blue
    Color::rgb(0xFFD700), // Gold
    Color::rgb(0x008080), // Teal
    Color::rgb(0xC73866), // Berry
    Color::rgb(0x00A86B), // Emerald Green
    Color::rgb(0x7D3C98), // Purple
    Color::rgb(0xF4A460), // Sandy Brown
];

/// 交集默认颜色 (Deep Red)，不在调色板里
pub const DEFAULT_INTERSECTION_COLOR: Color = Color::rgb(0xA93C3E);

/// 配色选项
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ColorOptions {
    /// 显式调色板；None 时使用 DEFAULT_PALETTE
    pub colors: Option<Vec<Color>>,
    /// 交集颜色；None 时使用 DEFAULT_INTERSECTION_COLOR
    /// 调色板中与之相同的颜色会被替换为随机颜色
    pub intersection_color: Option<Color>,
    /// 忽略调色板，每个谓词随机取色
    pub only_random_colors: bool,
}

/// 谓词下标 -> 颜色
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ColorMap {
    /// 第 i 个元素是谓词 i 的颜色
    pub layers: Vec<Color>,
    pub intersection: Color,
    /// 随机生成的颜色数量（追加的加上替换的）
    pub generated: usize,
}

/// 随机生成一个 24 位颜色，不与 avoid 相同
pub fn random_color<R: Rng>(rng: &mut R, avoid: Color) -> Color {
    loop {
        let color = Color(rng.random_range(0..=Color::MAX));
        if color != avoid {
            return color;
        }
    }
}

/// 为 count 个谓词分配颜色
/// 优先级：显式调色板 > 默认调色板；不足部分随机生成补齐
pub fn assign_colors<R: Rng>(
    count: usize,
    options: &ColorOptions,
    rng: &mut R,
) -> ColorMap {
    let intersection = options
        .intersection_color
        .unwrap_or(DEFAULT_INTERSECTION_COLOR);

    let mut layers: Vec<Color> = if options.only_random_colors {
        Vec::with_capacity(count)
    } else {
        match &options.colors {
            Some(colors) => colors.iter().copied().take(count).collect(),
            None => DEFAULT_PALETTE.iter().copied().take(count).collect(),
        }
    };

    // 与交集颜色相同的调色板项原位换成随机色，保持下标对应
    let mut replaced = 0;
    for color in layers.iter_mut().filter(|c| **c == intersection) {
        *color = random_color(rng, intersection);
        replaced += 1;
    }
    if replaced > 0 {
        log::warn!(
            "{} 个调色板颜色与交集颜色 {} 相同，已替换为随机颜色",
            replaced,
            intersection
        );
    }

    let generated = count - layers.len() + replaced;
    while layers.len() < count {
        layers.push(random_color(rng, intersection));
    }

    if generated > 0 {
        log::debug!("调色板不足，随机生成了 {} 个颜色", generated);
    }

    ColorMap {
        layers,
        intersection,
        generated,
    }
}
