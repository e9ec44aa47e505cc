//! Board definition - 40 squares with properties based on world cities

use serde::{Deserialize, Serialize};

/// Color group for street properties
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ColorGroup {
    Brown,
    LightBlue,
    Pink,
    Orange,
    Red,
    Yellow,
    Green,
    DarkBlue,
}

impl ColorGroup {
    pub fn property_count(&self) -> usize {
        match self {
            ColorGroup::Brown | ColorGroup::DarkBlue => 2,
            _ => 3,
        }
    }
}

/// What kind of square this is, with the static attributes of that kind.
///
/// Ownership, mortgage and house state live in the per-game
/// [`TileState`](super::state::TileState) map; the board itself is immutable.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum SquareKind {
    Go,
    Property {
        group: ColorGroup,
        price: i64,
        /// [base, 1 house, 2, 3, 4, hotel]
        rent: [i64; 6],
        house_price: i64,
    },
    Railroad {
        price: i64,
        base_rent: i64,
    },
    Utility {
        price: i64,
    },
    Tax {
        amount: i64,
    },
    Chance,
    CommunityChest,
    JailVisiting,
    GoToJail,
    FreeParking,
}

/// A square on the board
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Square {
    pub index: u8,
    pub name: String,
    #[serde(flatten)]
    pub kind: SquareKind,
}

impl Square {
    fn go() -> Self {
        Self {
            index: 0,
            name: "START".into(),
            kind: SquareKind::Go,
        }
    }

    fn property(
        index: u8,
        name: &str,
        group: ColorGroup,
        price: i64,
        rent: [i64; 6],
        house_price: i64,
    ) -> Self {
        Self {
            index,
            name: name.into(),
            kind: SquareKind::Property {
                group,
                price,
                rent,
                house_price,
            },
        }
    }

    fn railroad(index: u8, name: &str) -> Self {
        Self {
            index,
            name: name.into(),
            kind: SquareKind::Railroad {
                price: 200,
                base_rent: 25,
            },
        }
    }

    fn utility(index: u8, name: &str) -> Self {
        Self {
            index,
            name: name.into(),
            kind: SquareKind::Utility { price: 150 },
        }
    }

    fn chance(index: u8) -> Self {
        Self {
            index,
            name: "Surprise".into(),
            kind: SquareKind::Chance,
        }
    }

    fn community_chest(index: u8) -> Self {
        Self {
            index,
            name: "Treasure".into(),
            kind: SquareKind::CommunityChest,
        }
    }

    fn tax(index: u8, name: &str, amount: i64) -> Self {
        Self {
            index,
            name: name.into(),
            kind: SquareKind::Tax { amount },
        }
    }

    fn jail_visiting() -> Self {
        Self {
            index: JAIL_POSITION,
            name: "In Prison".into(),
            kind: SquareKind::JailVisiting,
        }
    }

    fn free_parking() -> Self {
        Self {
            index: 20,
            name: "Vacation".into(),
            kind: SquareKind::FreeParking,
        }
    }

    fn go_to_jail() -> Self {
        Self {
            index: 30,
            name: "Go to prison".into(),
            kind: SquareKind::GoToJail,
        }
    }

    /// Purchase price, for purchasable squares
    pub fn price(&self) -> Option<i64> {
        match self.kind {
            SquareKind::Property { price, .. }
            | SquareKind::Railroad { price, .. }
            | SquareKind::Utility { price } => Some(price),
            _ => None,
        }
    }

    /// Mortgage value is half the purchase price
    pub fn mortgage_value(&self) -> Option<i64> {
        self.price().map(|p| p / 2)
    }

    pub fn is_purchasable(&self) -> bool {
        self.price().is_some()
    }

    pub fn color_group(&self) -> Option<ColorGroup> {
        match self.kind {
            SquareKind::Property { group, .. } => Some(group),
            _ => None,
        }
    }

    pub fn house_price(&self) -> Option<i64> {
        match self.kind {
            SquareKind::Property { house_price, .. } => Some(house_price),
            _ => None,
        }
    }
}

pub const BOARD_SIZE: u8 = 40;
pub const JAIL_POSITION: u8 = 10;
pub const GO_SALARY: i64 = 200;
pub const BAIL_AMOUNT: i64 = 50;

/// The complete game board - 40 squares based on world cities
pub static BOARD: once_cell::sync::Lazy<Vec<Square>> = once_cell::sync::Lazy::new(|| {
    use ColorGroup::*;
    vec![
        // === BOTTOM ROW (0-10) ===
        Square::go(),
        Square::property(1, "Salvador", Brown, 60, [2, 10, 30, 90, 160, 250], 50),
        Square::community_chest(2),
        Square::property(3, "Rio", Brown, 60, [4, 20, 60, 180, 320, 450], 50),
        Square::tax(4, "Income Tax", 200),
        Square::railroad(5, "TLV Airport"),
        Square::property(6, "Tel Aviv", LightBlue, 100, [6, 30, 90, 270, 400, 550], 50),
        Square::chance(7),
        Square::property(8, "Haifa", LightBlue, 100, [6, 30, 90, 270, 400, 550], 50),
        Square::property(9, "Jerusalem", LightBlue, 120, [8, 40, 100, 300, 450, 600], 50),
        Square::jail_visiting(),
        // === LEFT COLUMN (11-20) ===
        Square::property(11, "Venice", Pink, 140, [10, 50, 150, 450, 625, 750], 100),
        Square::utility(12, "Electric Company"),
        Square::property(13, "Milan", Pink, 140, [10, 50, 150, 450, 625, 750], 100),
        Square::property(14, "Rome", Pink, 160, [12, 60, 180, 500, 700, 900], 100),
        Square::railroad(15, "MUC Airport"),
        Square::property(16, "Frankfurt", Orange, 180, [14, 70, 200, 550, 750, 950], 100),
        Square::community_chest(17),
        Square::property(18, "Hamburg", Orange, 180, [14, 70, 200, 550, 750, 950], 100),
        Square::property(19, "Munich", Orange, 200, [16, 80, 220, 600, 800, 1000], 100),
        Square::free_parking(),
        // === TOP ROW (21-30) ===
        Square::property(21, "Berlin", Red, 220, [18, 90, 250, 700, 875, 1050], 150),
        Square::chance(22),
        Square::property(23, "Manchester", Red, 220, [18, 90, 250, 700, 875, 1050], 150),
        Square::property(24, "Liverpool", Red, 240, [20, 100, 300, 750, 925, 1100], 150),
        Square::railroad(25, "JFK Airport"),
        Square::property(26, "Paris", Yellow, 260, [22, 110, 330, 800, 975, 1150], 150),
        Square::property(27, "Toulouse", Yellow, 260, [22, 110, 330, 800, 975, 1150], 150),
        Square::utility(28, "Water Company"),
        Square::property(29, "Lyon", Yellow, 280, [24, 120, 360, 850, 1025, 1200], 150),
        Square::go_to_jail(),
        // === RIGHT COLUMN (31-39) ===
        Square::property(31, "Shanghai", Green, 300, [26, 130, 390, 900, 1100, 1275], 200),
        Square::property(32, "Shenzhen", Green, 300, [26, 130, 390, 900, 1100, 1275], 200),
        Square::community_chest(33),
        Square::property(34, "Beijing", Green, 320, [28, 150, 450, 1000, 1200, 1400], 200),
        Square::railroad(35, "HND Airport"),
        Square::chance(36),
        Square::property(37, "New York", DarkBlue, 350, [35, 175, 500, 1100, 1300, 1500], 200),
        Square::tax(38, "Luxury Tax", 100),
        Square::property(39, "Tokyo", DarkBlue, 400, [50, 200, 600, 1400, 1700, 2000], 200),
    ]
});

/// Get a square by index
pub fn get_square(idx: u8) -> Option<&'static Square> {
    BOARD.get(idx as usize)
}

/// Indices of all street properties in a color group
pub fn group_members(group: ColorGroup) -> Vec<u8> {
    BOARD
        .iter()
        .filter(|s| s.color_group() == Some(group))
        .map(|s| s.index)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn board_has_forty_squares() {
        assert_eq!(BOARD.len(), BOARD_SIZE as usize);
        for (i, sq) in BOARD.iter().enumerate() {
            assert_eq!(sq.index as usize, i);
        }
    }

    #[test]
    fn mortgage_value_is_half_price() {
        for sq in BOARD.iter().filter(|s| s.is_purchasable()) {
            assert_eq!(sq.mortgage_value(), sq.price().map(|p| p / 2));
        }
    }

    #[test]
    fn color_groups_are_complete() {
        use ColorGroup::*;
        for group in [Brown, LightBlue, Pink, Orange, Red, Yellow, Green, DarkBlue] {
            assert_eq!(group_members(group).len(), group.property_count());
        }
    }

    #[test]
    fn corners_are_special() {
        assert_eq!(get_square(0).unwrap().kind, SquareKind::Go);
        assert_eq!(get_square(10).unwrap().kind, SquareKind::JailVisiting);
        assert_eq!(get_square(20).unwrap().kind, SquareKind::FreeParking);
        assert_eq!(get_square(30).unwrap().kind, SquareKind::GoToJail);
    }
}
