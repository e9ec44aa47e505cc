//! Chance and Community Chest decks

use rand::seq::SliceRandom;
use rand::Rng;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeckKind {
    Chance,
    CommunityChest,
}

impl DeckKind {
    pub fn label(&self) -> &'static str {
        match self {
            DeckKind::Chance => "Surprise",
            DeckKind::CommunityChest => "Treasure",
        }
    }
}

/// Effect applied when a card is drawn
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "effect", rename_all = "snake_case")]
pub enum CardEffect {
    ReceiveMoney { amount: i64 },
    PayMoney { amount: i64 },
    /// Move directly to a square; salary is collected when the move passes GO
    MoveTo { square: u8 },
    MoveRelative { steps: i8 },
    GoToJail,
    /// Advance to the nearest railroad and pay the owner double rent
    AdvanceToNearestRailroad,
    /// Advance to the nearest utility and pay 10x a fresh dice roll
    AdvanceToNearestUtility,
    CollectFromEachPlayer { amount: i64 },
    PayEachPlayer { amount: i64 },
    StreetRepairs { per_house: i64, per_hotel: i64 },
    GetOutOfJailFree,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Card {
    pub text: String,
    pub effect: CardEffect,
}

impl Card {
    fn new(text: &str, effect: CardEffect) -> Self {
        Self {
            text: text.into(),
            effect,
        }
    }
}

/// A shuffled deck that deals from the top and cycles
#[derive(Debug, Clone)]
pub struct Deck {
    kind: DeckKind,
    cards: Vec<Card>,
    next: usize,
}

impl Deck {
    pub fn chance(rng: &mut impl Rng) -> Self {
        let mut cards = vec![
            Card::new("Advance to START. Collect salary.", CardEffect::MoveTo { square: 0 }),
            Card::new("Advance to Tokyo.", CardEffect::MoveTo { square: 39 }),
            Card::new("Advance to Venice.", CardEffect::MoveTo { square: 11 }),
            Card::new(
                "Advance to the nearest airport and pay the owner double.",
                CardEffect::AdvanceToNearestRailroad,
            ),
            Card::new(
                "Advance to the nearest utility and pay ten times your roll.",
                CardEffect::AdvanceToNearestUtility,
            ),
            Card::new("The bank pays you a dividend of $50.", CardEffect::ReceiveMoney { amount: 50 }),
            Card::new("Your loan matures. Collect $150.", CardEffect::ReceiveMoney { amount: 150 }),
            Card::new("Speeding fine. Pay $15.", CardEffect::PayMoney { amount: 15 }),
            Card::new("Go back 3 spaces.", CardEffect::MoveRelative { steps: -3 }),
            Card::new("Go directly to prison.", CardEffect::GoToJail),
            Card::new(
                "Make general repairs: $25 per house, $100 per hotel.",
                CardEffect::StreetRepairs {
                    per_house: 25,
                    per_hotel: 100,
                },
            ),
            Card::new(
                "You have been elected chairman of the board. Pay each player $50.",
                CardEffect::PayEachPlayer { amount: 50 },
            ),
            Card::new("Get out of prison free.", CardEffect::GetOutOfJailFree),
        ];
        cards.shuffle(rng);
        Self {
            kind: DeckKind::Chance,
            cards,
            next: 0,
        }
    }

    pub fn community_chest(rng: &mut impl Rng) -> Self {
        let mut cards = vec![
            Card::new("Advance to START. Collect salary.", CardEffect::MoveTo { square: 0 }),
            Card::new("Bank error in your favor. Collect $200.", CardEffect::ReceiveMoney { amount: 200 }),
            Card::new("Doctor's fee. Pay $50.", CardEffect::PayMoney { amount: 50 }),
            Card::new("From sale of stock you get $50.", CardEffect::ReceiveMoney { amount: 50 }),
            Card::new("Holiday fund matures. Collect $100.", CardEffect::ReceiveMoney { amount: 100 }),
            Card::new("Income tax refund. Collect $20.", CardEffect::ReceiveMoney { amount: 20 }),
            Card::new(
                "It is your birthday. Collect $10 from every player.",
                CardEffect::CollectFromEachPlayer { amount: 10 },
            ),
            Card::new("Hospital fees. Pay $100.", CardEffect::PayMoney { amount: 100 }),
            Card::new("School fees. Pay $50.", CardEffect::PayMoney { amount: 50 }),
            Card::new("You inherit $100.", CardEffect::ReceiveMoney { amount: 100 }),
            Card::new("Go directly to prison.", CardEffect::GoToJail),
            Card::new(
                "Street repairs: $40 per house, $115 per hotel.",
                CardEffect::StreetRepairs {
                    per_house: 40,
                    per_hotel: 115,
                },
            ),
            Card::new("Get out of prison free.", CardEffect::GetOutOfJailFree),
        ];
        cards.shuffle(rng);
        Self {
            kind: DeckKind::CommunityChest,
            cards,
            next: 0,
        }
    }

    pub fn kind(&self) -> DeckKind {
        self.kind
    }

    /// Draw the top card; the deck cycles once exhausted
    pub fn draw(&mut self) -> Card {
        let card = self.cards[self.next].clone();
        self.next = (self.next + 1) % self.cards.len();
        card
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;

    #[test]
    fn deck_cycles_through_all_cards() {
        let mut rng = rand::rngs::StdRng::seed_from_u64(7);
        let mut deck = Deck::chance(&mut rng);
        let total = deck.cards.len();
        let first = deck.draw();
        for _ in 1..total {
            deck.draw();
        }
        assert_eq!(deck.draw(), first);
    }

    #[test]
    fn both_decks_carry_a_gooj_card() {
        let mut rng = rand::rngs::StdRng::seed_from_u64(7);
        for deck in [Deck::chance(&mut rng), Deck::community_chest(&mut rng)] {
            assert!(deck
                .cards
                .iter()
                .any(|c| c.effect == CardEffect::GetOutOfJailFree));
        }
    }
}
