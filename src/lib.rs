//! thuk - Conversational expense tracking over WhatsApp
//!
//! Users log expenses, ask for summaries, split bills and manage categories
//! by chatting. Text, receipt photos and voice notes are normalized to text,
//! routed by intent to one specialized handler, and answered with a
//! locale-formatted reply.

pub mod adapters;
pub mod application;
pub mod config;
pub mod domain;
pub mod ports;
