use serde::Serialize;

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct Rgb(pub u8, pub u8, pub u8);

impl Rgb {
    pub fn css_hex(self) -> String {
        format!("#{:02x}{:02x}{:02x}", self.0, self.1, self.2)
    }
}

/// Marker size in CSS pixels.
pub const MARKER_SIZE_PX: u32 = 32;
pub const MARKER_SIZE_SELECTED_PX: u32 = 44;

/// Accent shared by every layer for the selected marker.
pub const SELECTED_COLOR: Rgb = Rgb(0xdc, 0x26, 0x26);

/// How one marker looks. Pure data; the surface decides how to draw it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MarkerVisual {
    pub size_px: u32,
    pub color: Rgb,
    pub glyph: &'static str,
    /// Draw above unselected markers.
    pub raised: bool,
}

impl MarkerVisual {
    /// Standard two-state marker: layer color at rest, accent when selected.
    pub fn two_state(base: Rgb, glyph: &'static str, selected: bool) -> Self {
        if selected {
            Self {
                size_px: MARKER_SIZE_SELECTED_PX,
                color: SELECTED_COLOR,
                glyph,
                raised: true,
            }
        } else {
            Self {
                size_px: MARKER_SIZE_PX,
                color: base,
                glyph,
                raised: false,
            }
        }
    }
}
