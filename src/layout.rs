//! Fit and alignment policies, and the axis-aligned box they operate on.

use std::fmt;
use std::str::FromStr;

use crate::RivError;

/// Axis-aligned bounding box in device or artboard space.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "camelCase"))]
pub struct Aabb {
    pub min_x: f64,
    pub min_y: f64,
    pub max_x: f64,
    pub max_y: f64,
}

impl Aabb {
    /// Create a box from its four edges.
    pub fn new(min_x: f64, min_y: f64, max_x: f64, max_y: f64) -> Self {
        Self { min_x, min_y, max_x, max_y }
    }

    #[inline]
    pub fn width(&self) -> f64 {
        self.max_x - self.min_x
    }

    #[inline]
    pub fn height(&self) -> f64 {
        self.max_y - self.min_y
    }
}

/// How an artboard's bounds are scaled into the device box.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "camelCase"))]
pub enum Fit {
    Cover,
    #[default]
    Contain,
    Fill,
    FitWidth,
    FitHeight,
    None,
    ScaleDown,
}

impl Fit {
    pub const ALL: [Fit; 7] = [
        Fit::Cover,
        Fit::Contain,
        Fit::Fill,
        Fit::FitWidth,
        Fit::FitHeight,
        Fit::None,
        Fit::ScaleDown,
    ];

    /// Attribute spelling of this mode (e.g. `"fitWidth"`).
    pub fn as_str(&self) -> &'static str {
        match self {
            Fit::Cover     => "cover",
            Fit::Contain   => "contain",
            Fit::Fill      => "fill",
            Fit::FitWidth  => "fitWidth",
            Fit::FitHeight => "fitHeight",
            Fit::None      => "none",
            Fit::ScaleDown => "scaleDown",
        }
    }
}

impl FromStr for Fit {
    type Err = RivError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Fit::ALL
            .into_iter()
            .find(|fit| fit.as_str() == s.trim())
            .ok_or_else(|| RivError::config(format!("unknown fit mode {s:?}")))
    }
}

impl fmt::Display for Fit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Where the scaled artboard is anchored inside the device box.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "camelCase"))]
pub enum Alignment {
    #[default]
    Center,
    TopLeft,
    TopCenter,
    TopRight,
    CenterLeft,
    CenterRight,
    BottomLeft,
    BottomCenter,
    BottomRight,
}

impl Alignment {
    pub const ALL: [Alignment; 9] = [
        Alignment::Center,
        Alignment::TopLeft,
        Alignment::TopCenter,
        Alignment::TopRight,
        Alignment::CenterLeft,
        Alignment::CenterRight,
        Alignment::BottomLeft,
        Alignment::BottomCenter,
        Alignment::BottomRight,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Alignment::Center       => "center",
            Alignment::TopLeft      => "topLeft",
            Alignment::TopCenter    => "topCenter",
            Alignment::TopRight     => "topRight",
            Alignment::CenterLeft   => "centerLeft",
            Alignment::CenterRight  => "centerRight",
            Alignment::BottomLeft   => "bottomLeft",
            Alignment::BottomCenter => "bottomCenter",
            Alignment::BottomRight  => "bottomRight",
        }
    }

    /// Normalized anchor in `[-1, 1]` on both axes, `(0, 0)` being the center.
    pub fn anchor(&self) -> (f64, f64) {
        match self {
            Alignment::Center       => (0.0, 0.0),
            Alignment::TopLeft      => (-1.0, -1.0),
            Alignment::TopCenter    => (0.0, -1.0),
            Alignment::TopRight     => (1.0, -1.0),
            Alignment::CenterLeft   => (-1.0, 0.0),
            Alignment::CenterRight  => (1.0, 0.0),
            Alignment::BottomLeft   => (-1.0, 1.0),
            Alignment::BottomCenter => (0.0, 1.0),
            Alignment::BottomRight  => (1.0, 1.0),
        }
    }
}

impl FromStr for Alignment {
    type Err = RivError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Alignment::ALL
            .into_iter()
            .find(|alignment| alignment.as_str() == s.trim())
            .ok_or_else(|| RivError::config(format!("unknown alignment {s:?}")))
    }
}

impl fmt::Display for Alignment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
