//! Natural-language command parsing.
//!
//! [`parse`] maps a free-text command such as `add product guitar lessons
//! for $19.99` to a typed [`Action`]. Triggers are matched against the
//! lower-cased text in a fixed priority order and the first hit wins.
//! Free-text values (titles, URLs, file names) are extracted from the
//! trimmed original so their case survives.

use crate::error::{Result, SiteError};
use crate::theme::{is_safe_url, unsafe_video_url, VideoTheme};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::sync::OnceLock;

pub const DEFAULT_PRODUCT_NAME: &str = "AI Generated Product";
pub const DEFAULT_PRODUCT_PRICE: &str = "9.99";
pub const DEFAULT_PRODUCT_CATEGORY: &str = "general";
pub const DEFAULT_POST_TOPIC: &str = "ai technology";
pub const DEFAULT_PAGE_NAME: &str = "ai generated page";
pub const DEFAULT_COUPON_AMOUNT: &str = "10";

const PRODUCT_CATEGORIES: &[&str] = &[
    "avatar", "overlay", "music", "tools", "digital", "course", "template",
];

const DEPLOYABLE_EXTENSIONS: &[&str] = &[".php", ".css", ".js", ".html", ".json", ".txt"];

// ---------------------------------------------------------------------------
// Action
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DiscountType {
    Percent,
    FixedCart,
}

impl DiscountType {
    pub fn as_str(&self) -> &'static str {
        match self {
            DiscountType::Percent => "percent",
            DiscountType::FixedCart => "fixed_cart",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum NavChange {
    Add { title: String, url: String },
    Remove { id: u64 },
}

/// One dispatcher operation with everything needed to execute it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum Action {
    AddProduct {
        name: String,
        price: String,
        category: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        description: Option<String>,
    },
    AddCustomer {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        email: Option<String>,
        first_name: String,
        last_name: String,
    },
    CreatePost {
        topic: String,
        title: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        content: Option<String>,
    },
    CreatePage {
        title: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        content: Option<String>,
    },
    UpdateNavigation {
        change: NavChange,
    },
    ChangeBackground {
        theme: VideoTheme,
        video_url: String,
    },
    ChangeColors {
        primary: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        secondary: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        accent: Option<String>,
    },
    UpdateHomepage {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        title: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        subtitle: Option<String>,
    },
    UpdateField {
        field: String,
        value: String,
    },
    ListMedia,
    CreateCoupon {
        code: String,
        discount_type: DiscountType,
        amount: String,
    },
    ListOrders,
    Deploy {
        #[serde(default)]
        files: Vec<String>,
    },
    TriggerWebhook {
        event: String,
        #[serde(default, skip_serializing_if = "serde_json::Value::is_null")]
        data: serde_json::Value,
    },
    Status,
}

impl Action {
    pub fn name(&self) -> &'static str {
        match self {
            Action::AddProduct { .. } => "add_product",
            Action::AddCustomer { .. } => "add_customer",
            Action::CreatePost { .. } => "create_post",
            Action::CreatePage { .. } => "create_page",
            Action::UpdateNavigation { .. } => "update_navigation",
            Action::ChangeBackground { .. } => "change_background",
            Action::ChangeColors { .. } => "change_colors",
            Action::UpdateHomepage { .. } => "update_homepage",
            Action::UpdateField { .. } => "update_field",
            Action::ListMedia => "list_media",
            Action::CreateCoupon { .. } => "create_coupon",
            Action::ListOrders => "list_orders",
            Action::Deploy { .. } => "deploy",
            Action::TriggerWebhook { .. } => "trigger_webhook",
            Action::Status => "status",
        }
    }

    pub fn post(topic: &str) -> Self {
        Action::CreatePost {
            topic: topic.to_string(),
            title: format!("AI Insights: {}", title_case(topic)),
            content: None,
        }
    }
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

/// Upper-case the first letter of every word, lower-case the rest.
pub fn title_case(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut start = true;
    for c in s.chars() {
        if c.is_alphabetic() {
            if start {
                out.extend(c.to_uppercase());
            } else {
                out.extend(c.to_lowercase());
            }
            start = false;
        } else {
            out.push(c);
            start = true;
        }
    }
    out
}

fn invalid(action: &str, reason: impl Into<String>) -> SiteError {
    SiteError::InvalidParameter {
        action: action.to_string(),
        reason: reason.into(),
    }
}

fn has_any(text: &str, needles: &[&str]) -> bool {
    needles.iter().any(|n| text.contains(n))
}

fn has_word(text: &str, words: &[&str]) -> bool {
    text.split_whitespace()
        .map(|w| w.trim_matches(|c: char| !c.is_alphanumeric() && c != '.'))
        .map(|w| w.trim_end_matches('.'))
        .any(|w| words.contains(&w))
}

macro_rules! regex {
    ($name:ident, $pat:expr) => {
        fn $name() -> &'static Regex {
            static RE: OnceLock<Regex> = OnceLock::new();
            RE.get_or_init(|| Regex::new($pat).unwrap())
        }
    };
}

regex!(product_for_re, r"(?i)(?:add|create) product (.+?) for \$?([0-9.]+)");
regex!(product_suffix_re, r"(?i)(?:add|create) (.+?) product");
regex!(email_re, r"(?i)email ([a-z0-9._%+-]+@[a-z0-9.-]+\.[a-z]{2,})");
regex!(name_re, r"(?i)name (.+?)(?: email| for|$)");
regex!(post_re, r"(?i)(?:create|add) post (?:about |on )?(.+)");
regex!(page_re, r"(?i)(?:create|add) page (.+)");
regex!(nav_id_re, r"(\d+)");
regex!(
    nav_add_re,
    r"(?i)(?:menu item|link) (.+?)(?: (?:to|linking to|at) (\S+))?$"
);
regex!(mp4_re, r"(?i)https?://\S+\.mp4");
regex!(hex_re, r"#(?:[0-9a-fA-F]{6}|[0-9a-fA-F]{3})\b");
regex!(
    subtitle_re,
    r#"(?i)subtitle (?:to )?"?(.+?)"?$"#
);
regex!(
    title_re,
    r#"(?i)\btitle (?:to )?"?(.+?)"?(?: and (?:the )?subtitle\b.*)?$"#
);
regex!(field_re, r"(?i)(?:update|set) field ([a-z_]+) to (.+)");
regex!(coupon_re, r"(?i)coupon (?:code )?([a-z0-9]+)");
regex!(percent_re, r"(\d+)(?:%| percent)");
regex!(dollar_re, r"\$(\d+)");
regex!(
    webhook_re,
    r"(?i)\bwebhook (?:for |event )?([a-z0-9][a-z0-9_.-]*)(?: with (.+))?$"
);

// ---------------------------------------------------------------------------
// parse
// ---------------------------------------------------------------------------

type Matcher = fn(&str, &str) -> Option<Result<Action>>;

/// Matchers in priority order. Each gets `(lower, original)` and returns
/// `None` when its trigger words are absent.
const MATCHERS: &[Matcher] = &[
    match_webhook,
    match_product,
    match_customer,
    match_post,
    match_page,
    match_navigation,
    match_background,
    match_colors,
    match_homepage,
    match_field,
    match_media,
    match_coupon,
    match_orders,
    match_deploy,
    match_status,
];

pub fn parse(text: &str) -> Result<Action> {
    let original = text.trim();
    let lower = original.to_lowercase();
    for matcher in MATCHERS {
        if let Some(result) = matcher(&lower, original) {
            return result;
        }
    }
    Err(SiteError::UnrecognizedCommand(original.to_string()))
}

fn match_webhook(lower: &str, original: &str) -> Option<Result<Action>> {
    if !has_word(lower, &["webhook"]) {
        return None;
    }
    Some(match webhook_re().captures(original) {
        Some(caps) => Ok(Action::TriggerWebhook {
            event: caps[1].to_lowercase(),
            data: caps
                .get(2)
                .map(|m| serde_json::json!({ "message": m.as_str().trim() }))
                .unwrap_or(serde_json::Value::Null),
        }),
        None => Err(invalid(
            "trigger_webhook",
            "name the event, e.g. 'trigger webhook order_sync'",
        )),
    })
}

fn match_product(lower: &str, original: &str) -> Option<Result<Action>> {
    let explicit = has_any(lower, &["add product", "create product"]);
    let suffix = product_suffix_re().captures(original).filter(|caps| {
        let first = caps[1].split_whitespace().next().unwrap_or("").to_lowercase();
        !["post", "page", "customer", "coupon", "menu", "link"].contains(&first.as_str())
    });
    if !explicit && suffix.is_none() {
        return None;
    }

    let (name, price) = match product_for_re().captures(original) {
        Some(caps) => (caps[1].trim().to_string(), caps[2].to_string()),
        None => match suffix {
            Some(caps) if !caps[1].trim().eq_ignore_ascii_case("product") => {
                (caps[1].trim().to_string(), DEFAULT_PRODUCT_PRICE.to_string())
            }
            _ => (
                DEFAULT_PRODUCT_NAME.to_string(),
                DEFAULT_PRODUCT_PRICE.to_string(),
            ),
        },
    };
    if price.parse::<f64>().is_err() {
        return Some(Err(invalid("add_product", format!("'{price}' is not a price"))));
    }

    let category = PRODUCT_CATEGORIES
        .iter()
        .find(|c| lower.contains(*c))
        .copied()
        .unwrap_or(DEFAULT_PRODUCT_CATEGORY)
        .to_string();

    Some(Ok(Action::AddProduct {
        name,
        price,
        category,
        description: None,
    }))
}

fn match_customer(lower: &str, original: &str) -> Option<Result<Action>> {
    if !has_any(lower, &["add customer", "create customer"]) {
        return None;
    }
    let email = email_re().captures(original).map(|c| c[1].to_string());
    let (first_name, last_name) = match name_re().captures(original) {
        Some(caps) => {
            let full = caps[1].trim();
            match full.split_once(' ') {
                Some((first, last)) => (first.to_string(), last.trim().to_string()),
                None => (full.to_string(), "Customer".to_string()),
            }
        }
        None => ("AI".to_string(), "Customer".to_string()),
    };
    Some(Ok(Action::AddCustomer {
        email,
        first_name,
        last_name,
    }))
}

fn match_post(lower: &str, original: &str) -> Option<Result<Action>> {
    if !has_any(lower, &["create post", "add post"]) {
        return None;
    }
    let topic = post_re()
        .captures(original)
        .map(|c| c[1].trim().to_string())
        .filter(|t| !t.is_empty())
        .unwrap_or_else(|| DEFAULT_POST_TOPIC.to_string());
    Some(Ok(Action::post(&topic)))
}

fn match_page(lower: &str, original: &str) -> Option<Result<Action>> {
    if !has_any(lower, &["create page", "add page"]) {
        return None;
    }
    let name = page_re()
        .captures(original)
        .map(|c| c[1].trim().to_string())
        .filter(|t| !t.is_empty())
        .unwrap_or_else(|| DEFAULT_PAGE_NAME.to_string());
    Some(Ok(Action::CreatePage {
        title: title_case(&name),
        content: None,
    }))
}

fn match_navigation(lower: &str, original: &str) -> Option<Result<Action>> {
    if !has_any(lower, &["menu", "navigation"]) {
        return None;
    }
    if has_any(lower, &["remove", "delete"]) {
        return Some(match nav_id_re().captures(lower) {
            Some(caps) => caps[1]
                .parse::<u64>()
                .map(|id| Action::UpdateNavigation {
                    change: NavChange::Remove { id },
                })
                .map_err(|e| invalid("update_navigation", e.to_string())),
            None => Err(invalid(
                "update_navigation",
                "menu item id required for removal, e.g. 'remove menu item 12'",
            )),
        });
    }
    if lower.contains("add") {
        if let Some(caps) = nav_add_re().captures(original) {
            let title = caps[1].trim().trim_matches('"').to_string();
            let url = caps
                .get(2)
                .map(|m| m.as_str().to_string())
                .unwrap_or_else(|| "#".to_string());
            return Some(Ok(Action::UpdateNavigation {
                change: NavChange::Add { title, url },
            }));
        }
    }
    Some(Err(invalid(
        "update_navigation",
        "try 'add menu item <title> to <url>' or 'remove menu item <id>'",
    )))
}

fn match_background(lower: &str, original: &str) -> Option<Result<Action>> {
    if !has_any(lower, &["background", "video"]) {
        return None;
    }
    let theme = VideoTheme::find_in(lower).unwrap_or(VideoTheme::Space);
    let video_url = match mp4_re().find(original) {
        Some(m) if !is_safe_url(m.as_str()) => {
            return Some(Err(unsafe_video_url("change_background", m.as_str())))
        }
        Some(m) => m.as_str().to_string(),
        None => theme.url().to_string(),
    };
    Some(Ok(Action::ChangeBackground { theme, video_url }))
}

fn match_colors(lower: &str, _original: &str) -> Option<Result<Action>> {
    if !(has_any(lower, &["color", "colour"]) || has_word(lower, &["style", "styles"])) {
        return None;
    }
    let mut codes = hex_re().find_iter(lower).map(|m| m.as_str().to_string());
    let Some(primary) = codes.next() else {
        return Some(Err(invalid(
            "change_colors",
            "no hex color codes found, e.g. 'change colors to #ff6b35 #1a1a2e'",
        )));
    };
    Some(Ok(Action::ChangeColors {
        primary,
        secondary: codes.next(),
        accent: codes.next(),
    }))
}

fn match_homepage(lower: &str, original: &str) -> Option<Result<Action>> {
    if !has_any(lower, &["headline", "hero", "homepage"]) {
        return None;
    }
    let subtitle = subtitle_re()
        .captures(original)
        .map(|c| c[1].trim().to_string());
    let title = title_re().captures(original).map(|c| c[1].trim().to_string());
    if title.is_none() && subtitle.is_none() {
        return Some(Err(invalid(
            "update_homepage",
            "say 'set homepage title to <text>' or 'set hero subtitle to <text>'",
        )));
    }
    Some(Ok(Action::UpdateHomepage { title, subtitle }))
}

fn match_field(lower: &str, original: &str) -> Option<Result<Action>> {
    if !lower.contains("field") {
        return None;
    }
    Some(match field_re().captures(original) {
        Some(caps) => Ok(Action::UpdateField {
            field: caps[1].to_lowercase(),
            value: caps[2].trim().to_string(),
        }),
        None => Err(invalid(
            "update_field",
            "usage: 'update field <name> to <value>'",
        )),
    })
}

fn match_media(lower: &str, _original: &str) -> Option<Result<Action>> {
    has_any(lower, &["upload", "media"]).then_some(Ok(Action::ListMedia))
}

fn match_coupon(lower: &str, _original: &str) -> Option<Result<Action>> {
    if !has_any(lower, &["coupon", "discount"]) {
        return None;
    }
    let code = coupon_re()
        .captures(lower)
        .map(|c| c[1].to_uppercase())
        .unwrap_or_else(|| format!("AI{}", chrono::Local::now().format("%Y%m%d")));
    let (discount_type, amount) = if let Some(caps) = percent_re().captures(lower) {
        (DiscountType::Percent, caps[1].to_string())
    } else if let Some(caps) = dollar_re().captures(lower) {
        (DiscountType::FixedCart, caps[1].to_string())
    } else {
        (DiscountType::Percent, DEFAULT_COUPON_AMOUNT.to_string())
    };
    Some(Ok(Action::CreateCoupon {
        code,
        discount_type,
        amount,
    }))
}

fn match_orders(lower: &str, _original: &str) -> Option<Result<Action>> {
    if !lower.contains("order") {
        return None;
    }
    if has_any(lower, &["view orders", "list orders", "show orders"]) {
        Some(Ok(Action::ListOrders))
    } else {
        Some(Err(invalid(
            "list_orders",
            "only 'view orders', 'list orders' or 'show orders' is supported",
        )))
    }
}

fn match_deploy(lower: &str, original: &str) -> Option<Result<Action>> {
    if !has_any(lower, &["deploy", "go live"]) {
        return None;
    }
    let files = original
        .split(|c: char| c.is_whitespace() || c == ',')
        .map(|t| {
            t.trim_start_matches(|c: char| matches!(c, '"' | '\''))
                .trim_end_matches(|c: char| matches!(c, '"' | '\'' | ';' | '.' | '!' | '?'))
        })
        .filter(|t| {
            let t = t.to_lowercase();
            DEPLOYABLE_EXTENSIONS.iter().any(|ext| t.ends_with(ext))
        })
        .map(str::to_string)
        .collect();
    Some(Ok(Action::Deploy { files }))
}

fn match_status(lower: &str, _original: &str) -> Option<Result<Action>> {
    has_any(lower, &["status", "analytics"]).then_some(Ok(Action::Status))
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn webhook_with_event_and_message() {
        assert_eq!(
            parse("trigger webhook order_sync with nightly run").unwrap(),
            Action::TriggerWebhook {
                event: "order_sync".into(),
                data: serde_json::json!({ "message": "nightly run" }),
            }
        );
        assert_eq!(
            parse("send webhook for Product_Export").unwrap(),
            Action::TriggerWebhook {
                event: "product_export".into(),
                data: serde_json::Value::Null,
            }
        );
    }

    #[test]
    fn webhook_without_event_is_invalid() {
        assert!(matches!(
            parse("trigger the webhook"),
            Err(SiteError::InvalidParameter { .. })
        ));
    }

    #[test]
    fn product_with_price() {
        let action = parse("Add product guitar lessons for $19.99").unwrap();
        assert_eq!(
            action,
            Action::AddProduct {
                name: "guitar lessons".into(),
                price: "19.99".into(),
                category: "general".into(),
                description: None,
            }
        );
    }

    #[test]
    fn product_category_and_suffix_form() {
        match parse("create premium avatar product").unwrap() {
            Action::AddProduct {
                name,
                price,
                category,
                ..
            } => {
                assert_eq!(name, "premium avatar");
                assert_eq!(price, DEFAULT_PRODUCT_PRICE);
                assert_eq!(category, "avatar");
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn post_about_products_stays_a_post() {
        assert_eq!(
            parse("create post about product design").unwrap().name(),
            "create_post"
        );
    }

    #[test]
    fn product_beats_color() {
        let action = parse("create product color pack for 5").unwrap();
        assert_eq!(action.name(), "add_product");
    }

    #[test]
    fn customer_name_and_email() {
        let action =
            parse("add customer name Jane Doe email jane.doe@example.com").unwrap();
        assert_eq!(
            action,
            Action::AddCustomer {
                email: Some("jane.doe@example.com".into()),
                first_name: "Jane".into(),
                last_name: "Doe".into(),
            }
        );
    }

    #[test]
    fn customer_defaults() {
        match parse("create customer").unwrap() {
            Action::AddCustomer {
                email,
                first_name,
                last_name,
            } => {
                assert!(email.is_none());
                assert_eq!((first_name.as_str(), last_name.as_str()), ("AI", "Customer"));
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn post_topic() {
        match parse("create post about machine learning").unwrap() {
            Action::CreatePost { topic, title, content } => {
                assert_eq!(topic, "machine learning");
                assert_eq!(title, "AI Insights: Machine Learning");
                assert!(content.is_none());
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn page_title_cased() {
        assert_eq!(
            parse("add page our team").unwrap(),
            Action::CreatePage {
                title: "Our Team".into(),
                content: None,
            }
        );
    }

    #[test]
    fn navigation_add_and_remove() {
        assert_eq!(
            parse("add menu item Shop to https://example.com/shop").unwrap(),
            Action::UpdateNavigation {
                change: NavChange::Add {
                    title: "Shop".into(),
                    url: "https://example.com/shop".into(),
                },
            }
        );
        assert_eq!(
            parse("remove menu item 42").unwrap(),
            Action::UpdateNavigation {
                change: NavChange::Remove { id: 42 },
            }
        );
        assert!(matches!(
            parse("remove navigation entry"),
            Err(SiteError::InvalidParameter { .. })
        ));
    }

    #[test]
    fn background_url_with_markup_is_rejected() {
        let err = parse(r#"change background to https://x.io/"><?php/**/system($_GET[1]);?>.mp4"#)
            .unwrap_err();
        assert!(matches!(
            err,
            SiteError::InvalidParameter { action, .. } if action == "change_background"
        ));
    }

    #[test]
    fn background_theme_and_explicit_url() {
        assert_eq!(
            parse("change background to ocean").unwrap(),
            Action::ChangeBackground {
                theme: VideoTheme::Ocean,
                video_url: VideoTheme::Ocean.url().into(),
            }
        );
        match parse("set background video https://cdn.example.com/Clip.mp4").unwrap() {
            Action::ChangeBackground { theme, video_url } => {
                assert_eq!(theme, VideoTheme::Space);
                assert_eq!(video_url, "https://cdn.example.com/Clip.mp4");
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn colors_in_order() {
        assert_eq!(
            parse("change colors to #FF6B35 #1a1a2e #fff").unwrap(),
            Action::ChangeColors {
                primary: "#ff6b35".into(),
                secondary: Some("#1a1a2e".into()),
                accent: Some("#fff".into()),
            }
        );
        assert!(matches!(
            parse("change the color scheme"),
            Err(SiteError::InvalidParameter { .. })
        ));
    }

    #[test]
    fn homepage_title_and_subtitle() {
        assert_eq!(
            parse(r#"set homepage title to "Welcome Home""#).unwrap(),
            Action::UpdateHomepage {
                title: Some("Welcome Home".into()),
                subtitle: None,
            }
        );
        assert_eq!(
            parse("update hero subtitle to Live Music Every Night").unwrap(),
            Action::UpdateHomepage {
                title: None,
                subtitle: Some("Live Music Every Night".into()),
            }
        );
    }

    #[test]
    fn field_update() {
        assert_eq!(
            parse("update field site_tagline to Stream smarter").unwrap(),
            Action::UpdateField {
                field: "site_tagline".into(),
                value: "Stream smarter".into(),
            }
        );
        assert!(matches!(
            parse("custom field please"),
            Err(SiteError::InvalidParameter { .. })
        ));
    }

    #[test]
    fn coupon_code_and_amounts() {
        assert_eq!(
            parse("create coupon code save20 for 20% off").unwrap(),
            Action::CreateCoupon {
                code: "SAVE20".into(),
                discount_type: DiscountType::Percent,
                amount: "20".into(),
            }
        );
        match parse("make a discount worth $5").unwrap() {
            Action::CreateCoupon {
                code,
                discount_type,
                amount,
            } => {
                assert!(code.starts_with("AI"));
                assert_eq!(discount_type, DiscountType::FixedCart);
                assert_eq!(amount, "5");
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn orders_need_explicit_verb() {
        assert_eq!(parse("show orders").unwrap(), Action::ListOrders);
        assert!(matches!(
            parse("cancel order 7"),
            Err(SiteError::InvalidParameter { .. })
        ));
    }

    #[test]
    fn deploy_files_keep_case() {
        assert_eq!(
            parse("deploy style.css, Header.php and notes").unwrap(),
            Action::Deploy {
                files: vec!["style.css".into(), "Header.php".into()],
            }
        );
        assert_eq!(
            parse("go live").unwrap(),
            Action::Deploy { files: vec![] }
        );
    }

    #[test]
    fn deploy_ignores_trailing_punctuation() {
        assert_eq!(
            parse("deploy style.css and functions.php.").unwrap(),
            Action::Deploy {
                files: vec!["style.css".into(), "functions.php".into()],
            }
        );
        assert_eq!(
            parse("please deploy 'header.php'!").unwrap(),
            Action::Deploy {
                files: vec!["header.php".into()],
            }
        );
    }

    #[test]
    fn media_and_status() {
        assert_eq!(parse("show media library").unwrap(), Action::ListMedia);
        assert_eq!(parse("site status").unwrap(), Action::Status);
    }

    #[test]
    fn unrecognized_is_error() {
        let err = parse("make me a sandwich").unwrap_err();
        assert!(matches!(err, SiteError::UnrecognizedCommand(ref c) if c == "make me a sandwich"));
    }

    #[test]
    fn action_serializes_with_name_tag() {
        let value = serde_json::to_value(parse("list orders").unwrap()).unwrap();
        assert_eq!(value, serde_json::json!({"action": "list_orders"}));
        let value = serde_json::to_value(parse("remove menu item 3").unwrap()).unwrap();
        assert_eq!(value["action"], "update_navigation");
        assert_eq!(value["change"]["op"], "remove");
    }

    #[test]
    fn title_case_words() {
        assert_eq!(title_case("ai generated page"), "Ai Generated Page");
        assert_eq!(title_case("rock-n-roll"), "Rock-N-Roll");
    }
}
