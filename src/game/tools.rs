//! The closed set of tools agents may invoke through the dispatcher

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ToolKind {
    RollDice,
    BuyProperty,
    PassOnBuying,
    BidOnAuction,
    PassAuctionBid,
    RollForDoubles,
    PayBail,
    UseGoojCard,
    BuildHouse,
    SellHouse,
    MortgageProperty,
    UnmortgageProperty,
    ProposeTrade,
    AcceptTrade,
    RejectTrade,
    CounterTrade,
    EndNegotiation,
    ConfirmLiquidationDone,
    PayMortgageFee,
    UnmortgageReceived,
    EndTurn,
    Resign,
    Wait,
    DoNothing,
}

impl ToolKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ToolKind::RollDice => "roll_dice",
            ToolKind::BuyProperty => "buy_property",
            ToolKind::PassOnBuying => "pass_on_buying",
            ToolKind::BidOnAuction => "bid_on_auction",
            ToolKind::PassAuctionBid => "pass_auction_bid",
            ToolKind::RollForDoubles => "roll_for_doubles",
            ToolKind::PayBail => "pay_bail",
            ToolKind::UseGoojCard => "use_gooj_card",
            ToolKind::BuildHouse => "build_house",
            ToolKind::SellHouse => "sell_house",
            ToolKind::MortgageProperty => "mortgage_property",
            ToolKind::UnmortgageProperty => "unmortgage_property",
            ToolKind::ProposeTrade => "propose_trade",
            ToolKind::AcceptTrade => "accept_trade",
            ToolKind::RejectTrade => "reject_trade",
            ToolKind::CounterTrade => "counter_trade",
            ToolKind::EndNegotiation => "end_negotiation",
            ToolKind::ConfirmLiquidationDone => "confirm_liquidation_done",
            ToolKind::PayMortgageFee => "pay_mortgage_fee",
            ToolKind::UnmortgageReceived => "unmortgage_received",
            ToolKind::EndTurn => "end_turn",
            ToolKind::Resign => "resign",
            ToolKind::Wait => "wait",
            ToolKind::DoNothing => "do_nothing",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        let tool = match name {
            "roll_dice" => ToolKind::RollDice,
            "buy_property" => ToolKind::BuyProperty,
            "pass_on_buying" => ToolKind::PassOnBuying,
            "bid_on_auction" => ToolKind::BidOnAuction,
            "pass_auction_bid" => ToolKind::PassAuctionBid,
            "roll_for_doubles" => ToolKind::RollForDoubles,
            "pay_bail" => ToolKind::PayBail,
            "use_gooj_card" => ToolKind::UseGoojCard,
            "build_house" => ToolKind::BuildHouse,
            "sell_house" => ToolKind::SellHouse,
            "mortgage_property" => ToolKind::MortgageProperty,
            "unmortgage_property" => ToolKind::UnmortgageProperty,
            "propose_trade" => ToolKind::ProposeTrade,
            "accept_trade" => ToolKind::AcceptTrade,
            "reject_trade" => ToolKind::RejectTrade,
            "counter_trade" => ToolKind::CounterTrade,
            "end_negotiation" => ToolKind::EndNegotiation,
            "confirm_liquidation_done" => ToolKind::ConfirmLiquidationDone,
            "pay_mortgage_fee" => ToolKind::PayMortgageFee,
            "unmortgage_received" => ToolKind::UnmortgageReceived,
            "end_turn" => ToolKind::EndTurn,
            "resign" => ToolKind::Resign,
            "wait" => ToolKind::Wait,
            "do_nothing" => ToolKind::DoNothing,
            _ => return None,
        };
        Some(tool)
    }

    /// Parameter schema shown to agents in the prompt
    pub fn params_hint(&self) -> &'static str {
        match self {
            ToolKind::BidOnAuction => r#"{"bid_amount": <int>}"#,
            ToolKind::BuildHouse
            | ToolKind::SellHouse
            | ToolKind::MortgageProperty
            | ToolKind::UnmortgageProperty
            | ToolKind::PayMortgageFee
            | ToolKind::UnmortgageReceived => r#"{"square_id": <int>}"#,
            ToolKind::ProposeTrade => {
                r#"{"recipient_id": <int>, "offered_property_ids": [<int>], "offered_money": <int>, "offered_gooj_cards": <int>, "requested_property_ids": [<int>], "requested_money": <int>, "requested_gooj_cards": <int>, "message": <string>}"#
            }
            ToolKind::AcceptTrade | ToolKind::RejectTrade => r#"{"trade_id": <int>}"#,
            ToolKind::CounterTrade => {
                r#"{"trade_id": <int>, "offered_property_ids": [<int>], "offered_money": <int>, "offered_gooj_cards": <int>, "requested_property_ids": [<int>], "requested_money": <int>, "requested_gooj_cards": <int>, "message": <string>}"#
            }
            _ => "{}",
        }
    }
}

impl std::fmt::Display for ToolKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn names_round_trip() {
        for tool in [
            ToolKind::RollDice,
            ToolKind::ProposeTrade,
            ToolKind::ConfirmLiquidationDone,
            ToolKind::DoNothing,
        ] {
            assert_eq!(ToolKind::from_name(tool.as_str()), Some(tool));
        }
        assert_eq!(ToolKind::from_name("unknown_tool"), None);
    }
}
