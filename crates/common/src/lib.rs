//! Types shared between the OAuth client and the token-storage gateway.

pub mod provider;
pub mod wire;

pub use {
    provider::{CalendarProvider, UnknownProvider},
    wire::{ConnectedCalendar, StoreTokenResponse, TokenSubmission},
};
