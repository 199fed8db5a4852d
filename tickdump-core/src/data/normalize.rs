//! Raw record to unified event conversion.
//!
//! Absent optional fields become zero or an empty list. No field is
//! reinterpreted: prices, sizes and timestamps are copied as delivered.

use crate::domain::{QuoteEvent, TradeEvent, UnifiedEvent};

use super::records::{QuoteRecord, TradeRecord};

/// Convert a raw endpoint record into a unified event for `symbol`.
pub trait IntoEvent {
    fn into_event(self, symbol: &str) -> UnifiedEvent;
}

impl IntoEvent for TradeRecord {
    fn into_event(self, symbol: &str) -> UnifiedEvent {
        UnifiedEvent::Trade(TradeEvent {
            symbol: symbol.to_string(),
            sip_timestamp: self.sip_timestamp,
            participant_timestamp: self.participant_timestamp,
            trf_timestamp: self.trf_timestamp.unwrap_or(0),
            sequence_number: self.sequence_number,
            trade_id: self.id,
            price: self.price,
            size: self.size,
            exchange: self.exchange,
            trf_id: self.trf_id.unwrap_or(0),
            tape: self.tape,
            conditions: self.conditions.unwrap_or_default(),
            correction: self.correction.unwrap_or(0),
        })
    }
}

impl IntoEvent for QuoteRecord {
    fn into_event(self, symbol: &str) -> UnifiedEvent {
        UnifiedEvent::Quote(QuoteEvent {
            symbol: symbol.to_string(),
            sip_timestamp: self.sip_timestamp,
            participant_timestamp: self.participant_timestamp,
            sequence_number: self.sequence_number,
            bid_exchange: self.bid_exchange,
            bid_price: self.bid_price,
            bid_size: self.bid_size,
            ask_exchange: self.ask_exchange,
            ask_price: self.ask_price,
            ask_size: self.ask_size,
            conditions: self.conditions.unwrap_or_default(),
            indicators: self.indicators.unwrap_or_default(),
            tape: self.tape,
        })
    }
}
