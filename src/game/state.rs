//! Game state types and structures

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use super::board::{self, SquareKind, BOARD};

/// Seat index within a game
pub type PlayerId = usize;

pub const STARTING_CASH: i64 = 1500;
pub const MAX_TRADE_REJECTIONS: u32 = 5;
pub const GAME_LOG_TAIL: usize = 200;

/// Overall game lifecycle status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GameStatus {
    Initializing,
    InProgress,
    Completed,
    MaxTurnsReached,
    AbortedNoWinner,
    Crashed,
}

/// Mortgaged property received through a trade or bankruptcy that must be
/// dealt with at the start of the receiver's next turn
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MortgagedTask {
    pub square_id: u8,
    pub source_trade: Option<u64>,
}

/// Player in the game
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Player {
    pub id: PlayerId,
    pub name: String,
    pub cash: i64,
    pub position: u8,
    pub owned: std::collections::BTreeSet<u8>,
    pub in_jail: bool,
    pub jail_turns_attempted: u8,
    pub gooj_chance: bool,
    pub gooj_community: bool,
    pub is_bankrupt: bool,
    pub pending_mortgaged: Vec<MortgagedTask>,
    pub ledger_account_id: String,
}

impl Player {
    pub fn new(id: PlayerId, name: String, ledger_account_id: String) -> Self {
        Self {
            id,
            name,
            cash: STARTING_CASH,
            position: 0,
            owned: Default::default(),
            in_jail: false,
            jail_turns_attempted: 0,
            gooj_chance: false,
            gooj_community: false,
            is_bankrupt: false,
            pending_mortgaged: Vec::new(),
            ledger_account_id,
        }
    }

    pub fn has_gooj_card(&self) -> bool {
        self.gooj_chance || self.gooj_community
    }

    pub fn gooj_card_count(&self) -> u8 {
        self.gooj_chance as u8 + self.gooj_community as u8
    }

    pub fn go_to_jail(&mut self) {
        self.position = board::JAIL_POSITION;
        self.in_jail = true;
        self.jail_turns_attempted = 0;
    }

    pub fn leave_jail(&mut self) {
        self.in_jail = false;
        self.jail_turns_attempted = 0;
    }

    /// Consume one card, preferring the Surprise-deck card when both are held.
    /// Returns which deck the used card came from.
    pub fn use_gooj_card(&mut self) -> Option<super::cards::DeckKind> {
        if self.gooj_chance {
            self.gooj_chance = false;
            Some(super::cards::DeckKind::Chance)
        } else if self.gooj_community {
            self.gooj_community = false;
            Some(super::cards::DeckKind::CommunityChest)
        } else {
            None
        }
    }
}

/// Per-game mutable state of a purchasable square
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TileState {
    pub owner: Option<PlayerId>,
    /// 0-4 = houses, 5 = hotel
    pub houses: u8,
    pub is_mortgaged: bool,
}

/// Auction over an unowned square
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuctionState {
    pub square_id: u8,
    pub current_bid: i64,
    pub highest_bidder: Option<PlayerId>,
    pub participants: Vec<PlayerId>,
    /// Rotation order, shrinks as bidders withdraw
    pub active_bidders: Vec<PlayerId>,
    pub current_bidder_index: usize,
}

impl AuctionState {
    pub fn new(square_id: u8, participants: Vec<PlayerId>) -> Self {
        Self {
            square_id,
            current_bid: 1,
            highest_bidder: None,
            active_bidders: participants.clone(),
            participants,
            current_bidder_index: 0,
        }
    }

    pub fn current_bidder(&self) -> Option<PlayerId> {
        self.active_bidders.get(self.current_bidder_index).copied()
    }
}

/// One side's item in a trade offer
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "item", rename_all = "snake_case")]
pub enum TradeItem {
    Money { amount: i64 },
    Property { square_id: u8 },
    GoojCard { count: u8 },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TradeStatus {
    Pending,
    Accepted,
    Rejected,
    Countered,
    Terminated,
    FailedPayment,
}

impl TradeStatus {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, TradeStatus::Pending)
    }
}

/// Trade offer between players. Offers are never deleted; they form the
/// negotiation audit trail.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TradeOffer {
    pub id: u64,
    pub proposer: PlayerId,
    pub recipient: PlayerId,
    pub offered: Vec<TradeItem>,
    pub requested: Vec<TradeItem>,
    pub status: TradeStatus,
    pub counter_of: Option<u64>,
    pub turn_proposed: u32,
    pub message: Option<String>,
    pub rejection_count: u32,
}

/// The single out-of-band decision slot. The player referenced inside is the
/// *active* player, which may differ from the current-turn player.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum PendingDecision {
    BuyOrAuction {
        player: PlayerId,
        square_id: u8,
    },
    AuctionBid {
        player: PlayerId,
        square_id: u8,
    },
    JailOptions {
        player: PlayerId,
        attempts: u8,
        can_use_card: bool,
        can_pay_bail: bool,
    },
    AssetLiquidation {
        player: PlayerId,
        debt: i64,
        creditor: Option<PlayerId>,
    },
    RespondToTrade {
        player: PlayerId,
        trade_id: u64,
    },
    ProposeAfterRejection {
        player: PlayerId,
        rejected_trade_id: u64,
        rejection_count: u32,
    },
    HandleReceivedMortgaged {
        player: PlayerId,
        square_id: u8,
    },
}

impl PendingDecision {
    /// The player entitled to act on this decision
    pub fn player(&self) -> PlayerId {
        match *self {
            PendingDecision::BuyOrAuction { player, .. }
            | PendingDecision::AuctionBid { player, .. }
            | PendingDecision::JailOptions { player, .. }
            | PendingDecision::AssetLiquidation { player, .. }
            | PendingDecision::RespondToTrade { player, .. }
            | PendingDecision::ProposeAfterRejection { player, .. }
            | PendingDecision::HandleReceivedMortgaged { player, .. } => player,
        }
    }

    pub fn kind_name(&self) -> &'static str {
        match self {
            PendingDecision::BuyOrAuction { .. } => "buy_or_auction",
            PendingDecision::AuctionBid { .. } => "auction_bid",
            PendingDecision::JailOptions { .. } => "jail_options",
            PendingDecision::AssetLiquidation { .. } => "asset_liquidation",
            PendingDecision::RespondToTrade { .. } => "respond_to_trade",
            PendingDecision::ProposeAfterRejection { .. } => "propose_new_trade_after_rejection",
            PendingDecision::HandleReceivedMortgaged { .. } => "handle_received_mortgaged",
        }
    }
}

/// Complete authoritative game state. The game worker loop is the sole writer.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GameState {
    pub game_uid: String,
    pub status: GameStatus,
    pub players: Vec<Player>,
    pub current_player_index: PlayerId,
    pub dice: (u8, u8),
    pub doubles_streak: u8,
    pub turn_count: u32,
    pub game_over: bool,
    pub winner: Option<PlayerId>,
    pub pending_decision: Option<PendingDecision>,
    pub dice_outcome_processed: bool,
    /// Set once the current-turn player has taken their movement roll;
    /// cleared on turn advance and when a doubles bonus segment is granted
    pub has_rolled_this_turn: bool,
    pub auction: Option<AuctionState>,
    pub tiles: BTreeMap<u8, TileState>,
    pub trades: BTreeMap<u64, TradeOffer>,
    pub next_trade_id: u64,
    pub log: Vec<String>,
}

impl GameState {
    pub fn new(game_uid: String, players: Vec<Player>) -> Self {
        let mut tiles = BTreeMap::new();
        for sq in BOARD.iter().filter(|s| s.is_purchasable()) {
            tiles.insert(sq.index, TileState::default());
        }
        Self {
            game_uid,
            status: GameStatus::Initializing,
            players,
            current_player_index: 0,
            dice: (0, 0),
            doubles_streak: 0,
            turn_count: 1,
            game_over: false,
            winner: None,
            pending_decision: None,
            dice_outcome_processed: true,
            has_rolled_this_turn: false,
            auction: None,
            tiles,
            trades: BTreeMap::new(),
            next_trade_id: 1,
            log: Vec::new(),
        }
    }

    pub fn player(&self, id: PlayerId) -> Option<&Player> {
        self.players.get(id)
    }

    pub fn player_mut(&mut self, id: PlayerId) -> Option<&mut Player> {
        self.players.get_mut(id)
    }

    pub fn current_player(&self) -> &Player {
        &self.players[self.current_player_index]
    }

    pub fn active_player_count(&self) -> usize {
        self.players.iter().filter(|p| !p.is_bankrupt).count()
    }

    /// Player entitled to submit the next tool call
    pub fn active_decision_player(&self) -> PlayerId {
        self.pending_decision
            .as_ref()
            .map(|d| d.player())
            .unwrap_or(self.current_player_index)
    }

    pub fn can_act(&self, player_id: PlayerId) -> bool {
        player_id < self.players.len()
            && !self.players[player_id].is_bankrupt
            && player_id == self.active_decision_player()
    }

    pub fn tile(&self, square_id: u8) -> Option<&TileState> {
        self.tiles.get(&square_id)
    }

    pub fn tile_mut(&mut self, square_id: u8) -> Option<&mut TileState> {
        self.tiles.get_mut(&square_id)
    }

    pub fn owner_of(&self, square_id: u8) -> Option<PlayerId> {
        self.tiles.get(&square_id).and_then(|t| t.owner)
    }

    /// Whether `player_id` owns every street in `group`
    pub fn owns_full_group(&self, player_id: PlayerId, group: board::ColorGroup) -> bool {
        board::group_members(group)
            .iter()
            .all(|idx| self.owner_of(*idx) == Some(player_id))
    }

    /// Whether `player_id` owns every street in `group` with none mortgaged
    pub fn owns_full_group_unmortgaged(&self, player_id: PlayerId, group: board::ColorGroup) -> bool {
        board::group_members(group).iter().all(|idx| {
            self.tile(*idx)
                .map(|t| t.owner == Some(player_id) && !t.is_mortgaged)
                .unwrap_or(false)
        })
    }

    /// Min and max house counts across a color group
    pub fn group_house_range(&self, group: board::ColorGroup) -> (u8, u8) {
        let counts: Vec<u8> = board::group_members(group)
            .iter()
            .filter_map(|idx| self.tile(*idx).map(|t| t.houses))
            .collect();
        let min = counts.iter().copied().min().unwrap_or(0);
        let max = counts.iter().copied().max().unwrap_or(0);
        (min, max)
    }

    /// Whether any street in the group of `square_id` carries houses
    pub fn group_has_houses(&self, square_id: u8) -> bool {
        let Some(group) = board::get_square(square_id).and_then(|s| s.color_group()) else {
            return false;
        };
        board::group_members(group)
            .iter()
            .any(|idx| self.tile(*idx).map(|t| t.houses > 0).unwrap_or(false))
    }

    /// Count squares of a given predicate owned by a player (railroads, utilities)
    pub fn owned_count_matching(
        &self,
        player_id: PlayerId,
        pred: impl Fn(&SquareKind) -> bool,
    ) -> usize {
        self.players[player_id]
            .owned
            .iter()
            .filter(|idx| {
                board::get_square(**idx)
                    .map(|s| pred(&s.kind))
                    .unwrap_or(false)
            })
            .count()
    }

    pub fn log(&mut self, message: String) {
        tracing::debug!(game_uid = %self.game_uid, "{message}");
        self.log.push(message);
        if self.log.len() > GAME_LOG_TAIL {
            self.log.remove(0);
        }
    }

    pub fn log_tail(&self, n: usize) -> &[String] {
        let start = self.log.len().saturating_sub(n);
        &self.log[start..]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn two_player_state() -> GameState {
        let players = vec![
            Player::new(0, "Alice".into(), "acct-0".into()),
            Player::new(1, "Bob".into(), "acct-1".into()),
        ];
        GameState::new("g-test".into(), players)
    }

    #[test]
    fn active_decision_player_follows_pending_slot() {
        let mut state = two_player_state();
        assert_eq!(state.active_decision_player(), 0);
        state.pending_decision = Some(PendingDecision::RespondToTrade {
            player: 1,
            trade_id: 1,
        });
        assert_eq!(state.active_decision_player(), 1);
        assert!(state.can_act(1));
        assert!(!state.can_act(0));
    }

    #[test]
    fn bankrupt_player_cannot_act() {
        let mut state = two_player_state();
        state.players[0].is_bankrupt = true;
        assert!(!state.can_act(0));
    }

    #[test]
    fn gooj_prefers_chance_card() {
        let mut p = Player::new(0, "Alice".into(), "acct-0".into());
        p.gooj_chance = true;
        p.gooj_community = true;
        assert_eq!(p.use_gooj_card(), Some(crate::game::cards::DeckKind::Chance));
        assert!(p.gooj_community);
        assert!(!p.gooj_chance);
    }

    #[test]
    fn group_house_range_spans_group() {
        let mut state = two_player_state();
        // Brown group is squares 1 and 3
        state.tile_mut(1).unwrap().houses = 2;
        state.tile_mut(3).unwrap().houses = 3;
        let (min, max) = state.group_house_range(board::ColorGroup::Brown);
        assert_eq!((min, max), (2, 3));
    }
}
