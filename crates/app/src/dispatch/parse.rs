//! Operator command parsing.

use std::str::FromStr;

use boutique::{
    pricing::{FxRate, FxRateError},
    products::{DressCode, Price},
};
use thiserror::Error;

use crate::domain::settings::data::{ContactNumber, InstagramPost};

/// A slash command sent as text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    SoldOut(DressCode),
    Hide(DressCode),
    Unhide(DressCode),
    EditPrice(DressCode, Price),
    SetRate(FxRate),
    SetContact(ContactNumber),
    AddInstagram(InstagramPost),

    /// Position from `/listinsta` or a fragment of the link.
    RemoveInstagram(String),
    ListInstagram,
    Stats,
    Help,
}

/// Command parse failures. The message is the operator-facing reply.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum CommandError {
    #[error("Usage: /soldout D-1042")]
    SoldOutUsage,

    #[error("Usage: /hide D-1042")]
    HideUsage,

    #[error("Usage: /unhide D-1042")]
    UnhideUsage,

    #[error("Usage: /editprice D-1042 15000")]
    EditPriceUsage,

    #[error("Invalid price.")]
    InvalidPrice,

    #[error("Usage: /setrate 83.5")]
    SetRateUsage,

    #[error("Rate must be between 0 and 500.")]
    RateOutOfRange,

    #[error("Usage: /setwhatsapp 919876543210")]
    SetContactUsage,

    #[error("Invalid phone number.")]
    InvalidContact,

    #[error("Usage: /addinsta https://www.instagram.com/p/ABC123/\nAlso works with /reel/ URLs.")]
    AddInstagramUsage,

    #[error("Usage: /removeinsta 1  (number from /listinsta)")]
    RemoveInstagramUsage,

    #[error("Unknown command. Send /help for available commands.")]
    Unknown,
}

impl FromStr for Command {
    type Err = CommandError;

    fn from_str(text: &str) -> Result<Self, Self::Err> {
        let text = text.trim();
        let (name, rest) = text.split_once(char::is_whitespace).unwrap_or((text, ""));
        let rest = rest.trim();

        // `/hide@shop_bot D-1` in group chats
        let name = name.split_once('@').map_or(name, |(name, _bot)| name);

        match name {
            "/soldout" => code(rest, CommandError::SoldOutUsage).map(Self::SoldOut),
            "/hide" => code(rest, CommandError::HideUsage).map(Self::Hide),
            "/unhide" => code(rest, CommandError::UnhideUsage).map(Self::Unhide),
            "/editprice" => edit_price(rest),
            "/setrate" => set_rate(rest),
            "/setwhatsapp" => set_contact(rest),
            "/addinsta" => rest
                .parse()
                .map(Self::AddInstagram)
                .map_err(|_link| CommandError::AddInstagramUsage),
            "/removeinsta" if rest.is_empty() => Err(CommandError::RemoveInstagramUsage),
            "/removeinsta" => Ok(Self::RemoveInstagram(rest.to_string())),
            "/listinsta" => Ok(Self::ListInstagram),
            "/stats" => Ok(Self::Stats),
            "/help" | "/start" => Ok(Self::Help),
            _ => Err(CommandError::Unknown),
        }
    }
}

fn code(rest: &str, usage: CommandError) -> Result<DressCode, CommandError> {
    DressCode::find_in(rest).ok_or(usage)
}

fn edit_price(rest: &str) -> Result<Command, CommandError> {
    let mut args = rest.split_whitespace();

    let (Some(code), Some(amount)) = (args.next(), args.next()) else {
        return Err(CommandError::EditPriceUsage);
    };

    let code = code
        .parse()
        .map_err(|_code| CommandError::EditPriceUsage)?;

    // "15,000" and "₹15000" are accepted
    let digits: String = amount.chars().filter(char::is_ascii_digit).collect();

    let rupees = digits
        .parse()
        .map_err(|_digits| CommandError::InvalidPrice)?;

    let price = Price::from_major(rupees).map_err(|_price| CommandError::InvalidPrice)?;

    Ok(Command::EditPrice(code, price))
}

fn set_rate(rest: &str) -> Result<Command, CommandError> {
    let Some(value) = rest.split_whitespace().next() else {
        return Err(CommandError::SetRateUsage);
    };

    match value.parse() {
        Ok(rate) => Ok(Command::SetRate(rate)),
        Err(FxRateError::Invalid) => Err(CommandError::SetRateUsage),
        Err(FxRateError::OutOfRange) => Err(CommandError::RateOutOfRange),
    }
}

fn set_contact(rest: &str) -> Result<Command, CommandError> {
    if rest.is_empty() {
        return Err(CommandError::SetContactUsage);
    }

    rest.parse()
        .map(Command::SetContact)
        .map_err(|_number| CommandError::InvalidContact)
}
