pub(crate) mod reports;
pub(crate) mod roles;
pub(crate) mod stats;
pub(crate) mod telegram_bot;
