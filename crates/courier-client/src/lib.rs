//! Client-side chat state and reconciliation.
//!
//! [`ChatState`] is a pure state machine: the transport (WebSocket + HTTP)
//! lives outside it. Callers feed it user actions and server events on a
//! single logical thread; each call mutates the conversation and message
//! lists atomically relative to other calls.
//!
//! The interesting part is reconciliation: sends are inserted optimistically
//! before the server confirms them, and the server later echoes the
//! authoritative record back through the broadcast group — including to the
//! session that sent it. [`ChatState::apply_new_message`] merges that echo
//! into the optimistic entry in place, and de-duplicates inbound messages
//! that were delivered through more than one fan-out path.

pub mod history;
pub mod reconcile;
pub mod send;
pub mod state;

pub use history::FetchTicket;
pub use send::OutgoingSend;
pub use state::{ChatState, ConvKey, ConversationEntry, Delivery, LocalMessage, Notice};
