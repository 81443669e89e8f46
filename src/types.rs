//! Core data types for Engagement Metrics
//!
//! These types describe content shown to the user and the enrichment carried
//! on action events. They flow through the trackers by value.

use serde::{Deserialize, Serialize};

/// Marketplace content (saleable item, partner, post) presented to the user
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Content {
    /// Stable identifier of the content
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content_id: Option<String>,
    /// Id assigned by the ranking backend for this placement
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub insertion_id: Option<String>,
    /// Display name, used as identity when no content id is present
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
}

impl Content {
    pub fn with_id(content_id: impl Into<String>) -> Self {
        Self {
            content_id: Some(content_id.into()),
            ..Default::default()
        }
    }

    pub fn with_name(name: impl Into<String>) -> Self {
        Self {
            name: Some(name.into()),
            ..Default::default()
        }
    }

    pub fn insertion(mut self, insertion_id: impl Into<String>) -> Self {
        self.insertion_id = Some(insertion_id.into());
        self
    }

    /// Identity used to recognize this content across snapshots.
    ///
    /// Content id wins; name is the fallback. Content with neither has no
    /// identity and cannot be tracked for impressions.
    pub fn identity(&self) -> Option<ContentIdentity> {
        if let Some(id) = &self.content_id {
            return Some(ContentIdentity::Id(id.clone()));
        }
        self.name.clone().map(ContentIdentity::Name)
    }
}

/// Normalized identity of a piece of content.
///
/// An id and a name never compare equal, even with the same text.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ContentIdentity {
    Id(String),
    Name(String),
}

impl std::fmt::Display for ContentIdentity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ContentIdentity::Id(id) => write!(f, "id:{id}"),
            ContentIdentity::Name(name) => write!(f, "name:{name}"),
        }
    }
}

/// One entry of a "currently visible" snapshot
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VisibleContent {
    pub content: Content,
    /// Row/column index path at the time of visibility. Enrichment only.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub position: Option<Vec<u32>>,
}

impl VisibleContent {
    pub fn new(content: Content) -> Self {
        Self {
            content,
            position: None,
        }
    }

    pub fn at(content: Content, position: Vec<u32>) -> Self {
        Self {
            content,
            position: Some(position),
        }
    }
}

impl From<Content> for VisibleContent {
    fn from(content: Content) -> Self {
        Self::new(content)
    }
}

/// Origin of the content presented in a collection.
///
/// Content served by the ranking backend is expected to carry insertion ids;
/// client-assembled content is expected not to.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ImpressionSourceType {
    #[default]
    Unknown,
    /// Served by the ranking/delivery backend
    Delivery,
    /// Assembled by the client or a backend that is not ranking-aware
    ClientBackend,
}

impl ImpressionSourceType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ImpressionSourceType::Unknown => "unknown",
            ImpressionSourceType::Delivery => "delivery",
            ImpressionSourceType::ClientBackend => "client_backend",
        }
    }
}

/// Semantic type of an action event
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActionType {
    #[default]
    Unknown,
    /// Action that doesn't correspond to any of the below. Needs a name.
    Custom,
    /// Navigating to details about content
    Navigate,
    AddToCart,
    RemoveFromCart,
    Checkout,
    Purchase,
    Share,
    Like,
    Unlike,
    Comment,
    MakeOffer,
    AskQuestion,
    AnswerQuestion,
    CompleteSignIn,
    CompleteSignUp,
}

impl ActionType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ActionType::Unknown => "unknown",
            ActionType::Custom => "custom",
            ActionType::Navigate => "navigate",
            ActionType::AddToCart => "add_to_cart",
            ActionType::RemoveFromCart => "remove_from_cart",
            ActionType::Checkout => "checkout",
            ActionType::Purchase => "purchase",
            ActionType::Share => "share",
            ActionType::Like => "like",
            ActionType::Unlike => "unlike",
            ActionType::Comment => "comment",
            ActionType::MakeOffer => "make_offer",
            ActionType::AskQuestion => "ask_question",
            ActionType::AnswerQuestion => "answer_question",
            ActionType::CompleteSignIn => "complete_sign_in",
            ActionType::CompleteSignUp => "complete_sign_up",
        }
    }
}

/// ISO 4217 currency codes accepted on cart prices
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum CurrencyCode {
    #[default]
    #[serde(rename = "unknown")]
    Unknown,
    Usd,
    Eur,
    Jpy,
    Gbp,
    Aud,
    Cad,
    Chf,
    Cny,
    Hkd,
    Nzd,
    Sek,
    Krw,
    Sgd,
    Nok,
    Mxn,
    Inr,
    Rub,
    Zar,
    Try,
    Brl,
}

/// Money amount in millionths of the currency unit
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Money {
    pub currency_code: CurrencyCode,
    pub amount_micros: i64,
}

/// Item of content in a shopping cart
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CartContent {
    pub content: Content,
    pub quantity: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub price_per_unit: Option<Money>,
}

/// Shopping cart for checkout or purchase actions
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Cart {
    pub contents: Vec<CartContent>,
}

impl Cart {
    /// Total price of all priced lines, in micros.
    ///
    /// `None` when the cart mixes currencies or has no priced lines.
    pub fn total_micros(&self) -> Option<(CurrencyCode, i64)> {
        let mut total: Option<(CurrencyCode, i64)> = None;
        for line in &self.contents {
            let Some(price) = &line.price_per_unit else {
                continue;
            };
            let line_total = price.amount_micros.saturating_mul(i64::from(line.quantity));
            total = match total {
                None => Some((price.currency_code, line_total)),
                Some((code, sum)) if code == price.currency_code => {
                    Some((code, sum.saturating_add(line_total)))
                }
                Some(_) => return None,
            };
        }
        total
    }
}
