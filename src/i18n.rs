//! Request language selection and the handful of user-facing strings the
//! service produces itself.

use axum::{
    async_trait,
    extract::FromRequestParts,
    http::{header::ACCEPT_LANGUAGE, request::Parts},
};
use serde::Serialize;
use std::convert::Infallible;

use crate::entities::order::OrderStatus;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Language {
    #[default]
    En,
    Ar,
}

impl Language {
    pub fn code(&self) -> &'static str {
        match self {
            Language::En => "en",
            Language::Ar => "ar",
        }
    }

    /// Matches a language tag such as `ar`, `ar-EG` or `en_US`.
    pub fn from_tag(tag: &str) -> Option<Self> {
        let primary = tag
            .trim()
            .split(|c| c == '-' || c == '_')
            .next()
            .unwrap_or_default()
            .to_ascii_lowercase();
        match primary.as_str() {
            "en" => Some(Language::En),
            "ar" => Some(Language::Ar),
            _ => None,
        }
    }

    /// Picks the highest-weighted supported language from an `Accept-Language` value.
    pub fn from_accept_language(header: &str) -> Option<Self> {
        let mut best: Option<(Language, f32)> = None;
        for part in header.split(',') {
            let mut pieces = part.split(';');
            let tag = pieces.next().unwrap_or_default();
            let weight = pieces
                .find_map(|p| p.trim().strip_prefix("q="))
                .and_then(|q| q.parse::<f32>().ok())
                .unwrap_or(1.0);
            if let Some(lang) = Language::from_tag(tag) {
                if weight > 0.0 && best.map_or(true, |(_, w)| weight > w) {
                    best = Some((lang, weight));
                }
            }
        }
        best.map(|(lang, _)| lang)
    }

    /// `?lang=` wins over `Accept-Language`; English otherwise.
    pub fn resolve(query_lang: Option<&str>, accept_language: Option<&str>) -> Self {
        query_lang
            .and_then(Language::from_tag)
            .or_else(|| accept_language.and_then(Language::from_accept_language))
            .unwrap_or_default()
    }
}

#[async_trait]
impl<S> FromRequestParts<S> for Language
where
    S: Send + Sync,
{
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let query_lang = parts.uri.query().and_then(|query| {
            query.split('&').find_map(|pair| {
                let (key, value) = pair.split_once('=')?;
                (key == "lang").then_some(value)
            })
        });
        let accept = parts
            .headers
            .get(ACCEPT_LANGUAGE)
            .and_then(|v| v.to_str().ok());
        Ok(Language::resolve(query_lang, accept))
    }
}

/// Chooses the translated field for `lang`, falling back to the base value.
pub fn pick<'a>(lang: Language, base: &'a str, en: Option<&'a str>, ar: Option<&'a str>) -> &'a str {
    let translated = match lang {
        Language::En => en,
        Language::Ar => ar,
    };
    translated.filter(|s| !s.trim().is_empty()).unwrap_or(base)
}

pub fn status_label(lang: Language, status: OrderStatus) -> &'static str {
    match (lang, status) {
        (Language::En, OrderStatus::Pending) => "Pending",
        (Language::En, OrderStatus::Confirmed) => "Confirmed",
        (Language::En, OrderStatus::Shipped) => "Shipped",
        (Language::En, OrderStatus::Delivered) => "Delivered",
        (Language::En, OrderStatus::Cancelled) => "Cancelled",
        (Language::Ar, OrderStatus::Pending) => "قيد الانتظار",
        (Language::Ar, OrderStatus::Confirmed) => "تم التأكيد",
        (Language::Ar, OrderStatus::Shipped) => "تم الشحن",
        (Language::Ar, OrderStatus::Delivered) => "تم التوصيل",
        (Language::Ar, OrderStatus::Cancelled) => "ملغي",
    }
}

pub fn cart_empty(lang: Language) -> &'static str {
    match lang {
        Language::En => "Your cart is empty.",
        Language::Ar => "سلة التسوق فارغة.",
    }
}

pub fn invalid_status(lang: Language) -> &'static str {
    match lang {
        Language::En => "Invalid status.",
        Language::Ar => "حالة غير صالحة.",
    }
}

pub fn out_of_stock(lang: Language, product: &str) -> String {
    match lang {
        Language::En => format!("{product} is out of stock."),
        Language::Ar => format!("{product} غير متوفر في المخزون."),
    }
}

pub fn order_status_updated(lang: Language, order_number: &str, status: OrderStatus) -> String {
    match lang {
        Language::En => format!("Order #{order_number} updated to {}.", status.as_str()),
        Language::Ar => format!("تم تحديث الطلب #{order_number} إلى {}.", status.as_str()),
    }
}
