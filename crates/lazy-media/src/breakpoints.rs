//! Viewport breakpoints for picking a responsive rendition.

use serde::Serialize;

/// A viewport-width tier and the rendition size served to it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Breakpoint {
    /// Inclusive upper bound of the tier. `None` for the catch-all tier.
    pub max_viewport: Option<u32>,
    pub width: u32,
    pub height: u32,
}

/// Ascending tiers; the last entry catches every wider viewport.
pub const BREAKPOINTS: [Breakpoint; 5] = [
    Breakpoint {
        max_viewport: Some(480),
        width: 480,
        height: 300,
    },
    Breakpoint {
        max_viewport: Some(768),
        width: 768,
        height: 400,
    },
    Breakpoint {
        max_viewport: Some(1024),
        width: 1024,
        height: 600,
    },
    Breakpoint {
        max_viewport: Some(1440),
        width: 1440,
        height: 800,
    },
    Breakpoint {
        max_viewport: None,
        width: 1920,
        height: 1080,
    },
];

impl Breakpoint {
    fn admits(&self, viewport_width: u32) -> bool {
        self.max_viewport.map_or(true, |max| viewport_width <= max)
    }
}

/// First tier (ascending) whose bound admits the viewport. Bounds are inclusive.
pub fn select(viewport_width: u32) -> Breakpoint {
    BREAKPOINTS
        .iter()
        .copied()
        .find(|bp| bp.admits(viewport_width))
        .unwrap_or(BREAKPOINTS[BREAKPOINTS.len() - 1])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_boundaries_belong_to_lower_tier() {
        assert_eq!(select(480).width, 480);
        assert_eq!(select(481).width, 768);
        assert_eq!(select(768).width, 768);
        assert_eq!(select(1024).height, 600);
        assert_eq!(select(1440).width, 1440);
        assert_eq!(select(1441).width, 1920);
    }

    #[test]
    fn test_extremes() {
        assert_eq!(select(0).width, 480);
        let widest = select(u32::MAX);
        assert_eq!((widest.width, widest.height), (1920, 1080));
    }
}
