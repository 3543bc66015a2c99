//! Reference sheet selection by substrate size

pub const LARGE_LENGTH_MM: f64 = 126.0;
pub const LARGE_WIDTH_MM: f64 = 51.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SizeClass {
    Large,
    Small,
}

/// Electrical and mechanical characteristic sheets for one size class
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SheetPair {
    pub size: SizeClass,
    pub electrical: &'static str,
    pub mechanical: &'static str,
}

impl SheetPair {
    pub const LARGE: SheetPair = SheetPair {
        size: SizeClass::Large,
        electrical: "大型品_電気特性",
        mechanical: "大型品_機械特性",
    };

    pub const SMALL: SheetPair = SheetPair {
        size: SizeClass::Small,
        electrical: "小型品_電気特性",
        mechanical: "小型品_機械特性",
    };

    /// Load order: electrical first
    pub fn names(&self) -> [&'static str; 2] {
        [self.electrical, self.mechanical]
    }
}

pub fn select_sheets(length: f64, width: f64) -> SheetPair {
    if length >= LARGE_LENGTH_MM || width >= LARGE_WIDTH_MM {
        SheetPair::LARGE
    } else {
        SheetPair::SMALL
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_boundaries_select_large() {
        assert_eq!(select_sheets(126.0, 30.0), SheetPair::LARGE);
        assert_eq!(select_sheets(50.0, 51.0), SheetPair::LARGE);
        assert_eq!(select_sheets(150.0, 60.0).size, SizeClass::Large);
    }

    #[test]
    fn test_just_below_boundaries_select_small() {
        assert_eq!(select_sheets(125.999, 50.999), SheetPair::SMALL);
        assert_eq!(
            select_sheets(60.0, 40.0).names(),
            ["小型品_電気特性", "小型品_機械特性"]
        );
    }

    #[test]
    fn test_selection_is_total() {
        for length in [0.0, 50.0, 125.0, 126.0, 500.0] {
            for width in [0.0, 30.0, 50.0, 51.0, 500.0] {
                let pair = select_sheets(length, width);
                assert!(pair == SheetPair::LARGE || pair == SheetPair::SMALL);
            }
        }
    }
}
