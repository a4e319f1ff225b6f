use serde::{Deserialize, Serialize};

/// Document-wide page rotation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum Rotation {
    #[default]
    Rotate0,
    Rotate90,
    Rotate180,
    Rotate270,
}

impl Rotation {
    pub fn clockwise(self) -> Self {
        match self {
            Rotation::Rotate0 => Rotation::Rotate90,
            Rotation::Rotate90 => Rotation::Rotate180,
            Rotation::Rotate180 => Rotation::Rotate270,
            Rotation::Rotate270 => Rotation::Rotate0,
        }
    }

    pub fn counterclockwise(self) -> Self {
        match self {
            Rotation::Rotate0 => Rotation::Rotate270,
            Rotation::Rotate90 => Rotation::Rotate0,
            Rotation::Rotate180 => Rotation::Rotate90,
            Rotation::Rotate270 => Rotation::Rotate180,
        }
    }

    pub fn degrees(self) -> u16 {
        match self {
            Rotation::Rotate0 => 0,
            Rotation::Rotate90 => 90,
            Rotation::Rotate180 => 180,
            Rotation::Rotate270 => 270,
        }
    }

    /// Whether width and height trade places for layout.
    pub fn swaps_axes(self) -> bool {
        matches!(self, Rotation::Rotate90 | Rotation::Rotate270)
    }
}
