//! Provider endpoints and calendar scopes.

pub const GOOGLE_AUTH_ENDPOINT: &str = "https://accounts.google.com/o/oauth2/v2/auth";

pub const MICROSOFT_DEFAULT_TENANT: &str = "common";

#[must_use]
pub fn microsoft_auth_endpoint(tenant: &str) -> String {
    format!("https://login.microsoftonline.com/{tenant}/oauth2/v2.0/authorize")
}

/// Google Calendar scopes.
pub mod google_scopes {
    pub const READONLY: &str = "https://www.googleapis.com/auth/calendar.readonly";
    pub const FULL: &str = "https://www.googleapis.com/auth/calendar";
    pub const EVENTS: &str = "https://www.googleapis.com/auth/calendar.events";
    pub const EVENTS_READONLY: &str = "https://www.googleapis.com/auth/calendar.events.readonly";
}

/// Microsoft Graph scopes for Outlook / Office 365 calendars.
pub mod microsoft_scopes {
    pub const CALENDARS_READ: &str = "Calendars.Read";
    pub const CALENDARS_READWRITE: &str = "Calendars.ReadWrite";
    pub const CALENDARS_READ_SHARED: &str = "Calendars.Read.Shared";
    pub const CALENDARS_READWRITE_SHARED: &str = "Calendars.ReadWrite.Shared";
    pub const OFFLINE_ACCESS: &str = "offline_access";
    pub const USER_READ: &str = "User.Read";
}

/// Scopes requested when connecting Google: read calendars, edit events.
pub const GOOGLE_CONNECT_SCOPES: &[&str] = &[google_scopes::READONLY, google_scopes::EVENTS];

/// Scopes requested when connecting Microsoft.
pub const MICROSOFT_CONNECT_SCOPES: &[&str] = &[
    microsoft_scopes::CALENDARS_READ,
    microsoft_scopes::CALENDARS_READWRITE,
    microsoft_scopes::USER_READ,
    microsoft_scopes::OFFLINE_ACCESS,
];
