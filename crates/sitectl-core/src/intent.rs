//! LLM-assisted command interpretation over the OpenAI Chat Completions API.
//!
//! The model answers with an [`Intent`] (`{action, parameters, confidence,
//! explanation}`) which [`Intent::into_action`] turns into the same typed
//! [`Action`] the text parser produces.

use crate::command::{self, Action, DiscountType, NavChange};
use crate::config::{AiConfig, Secrets};
use crate::error::{Result, SiteError};
use crate::theme::{is_safe_url, unsafe_video_url, VideoTheme};
use reqwest::blocking::Client;
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::time::Duration;
use tracing::{debug, info};

const REQUEST_TIMEOUT: Duration = Duration::from_secs(60);

const SYSTEM_PROMPT: &str = "You are a website management assistant for a WordPress/WooCommerce site. Respond only with valid JSON.";

const ACTIONS_PROMPT: &str = r#"Available actions and their parameters:

1. change_background_video: video_theme ("space", "ocean", "city", "nature", "gaming", "music"), video_url (direct .mp4 URL)
2. update_homepage_content: section ("hero"), title, content (hero subtitle text)
3. add_product: name, price (USD), description, category ("avatar", "overlay", "music", "tools", "digital", "course", "template")
4. change_theme_colors: primary_color, secondary_color, accent_color (hex codes)
5. create_blog_post: title, content, category
6. create_page: title, content
7. add_customer: email, first_name, last_name
8. update_navigation: action ("add" or "remove"), menu_item ({title, url} to add, {id} to remove)
9. update_field: field, value
10. create_coupon: code, discount_type ("percent" or "fixed_cart"), amount
11. list_orders, list_media, status: no parameters
12. deploy_changes: files (list of theme file names)
13. trigger_webhook: event (webhook action name), data (object sent with it)

Respond with JSON only in this format:
{
    "action": "action_name",
    "parameters": {"param1": "value1"},
    "confidence": 0.95,
    "explanation": "Brief explanation of what will be done"
}"#;

// ---------------------------------------------------------------------------
// Intent
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Intent {
    pub action: String,
    #[serde(default)]
    pub parameters: Map<String, Value>,
    #[serde(default = "default_confidence")]
    pub confidence: f64,
    #[serde(default)]
    pub explanation: String,
}

fn default_confidence() -> f64 {
    0.5
}

/// Parse the model's message content, tolerating a surrounding ``` fence.
pub fn parse_intent(content: &str) -> Result<Intent> {
    let body = strip_fence(content.trim());
    serde_json::from_str(body).map_err(|e| SiteError::AiResponse {
        reason: e.to_string(),
        raw: content.to_string(),
    })
}

fn strip_fence(text: &str) -> &str {
    let Some(rest) = text.strip_prefix("```") else {
        return text;
    };
    // Drop the info string (`json`) on the opening line.
    let rest = match rest.find('\n') {
        Some(i) => &rest[i + 1..],
        None => rest,
    };
    rest.trim_end().strip_suffix("```").unwrap_or(rest).trim()
}

impl Intent {
    /// Reject the intent when the model is less sure than `minimum`.
    pub fn ensure_confidence(&self, minimum: f64) -> Result<()> {
        if self.confidence < minimum {
            return Err(SiteError::LowConfidence {
                confidence: self.confidence,
                minimum,
            });
        }
        Ok(())
    }

    fn text(&self, key: &str) -> Option<String> {
        param_text(self.parameters.get(key)?)
    }

    fn text_or(&self, key: &str, default: &str) -> String {
        self.text(key).unwrap_or_else(|| default.to_string())
    }

    fn invalid(&self, reason: &str) -> SiteError {
        SiteError::InvalidParameter {
            action: self.action.clone(),
            reason: reason.to_string(),
        }
    }

    pub fn into_action(self) -> Result<Action> {
        let action = match self.action.as_str() {
            "change_background_video" => {
                let theme = self
                    .text("video_theme")
                    .and_then(|t| VideoTheme::parse(&t.to_lowercase()))
                    .unwrap_or(VideoTheme::Space);
                let video_url = self
                    .text("video_url")
                    .unwrap_or_else(|| theme.url().to_string());
                if !is_safe_url(&video_url) {
                    return Err(unsafe_video_url(&self.action, &video_url));
                }
                Action::ChangeBackground { theme, video_url }
            }
            "update_homepage_content" => {
                let title = self.text("title");
                let subtitle = self.text("content").or_else(|| self.text("subtitle"));
                if title.is_none() && subtitle.is_none() {
                    return Err(self.invalid("title or content required"));
                }
                Action::UpdateHomepage { title, subtitle }
            }
            "add_product" => {
                let price = self.text_or("price", command::DEFAULT_PRODUCT_PRICE);
                let price = price.trim_start_matches('$').to_string();
                if price.parse::<f64>().is_err() {
                    return Err(self.invalid("price is not a number"));
                }
                Action::AddProduct {
                    name: self.text_or("name", "New Product"),
                    price,
                    category: self.text_or("category", "digital").to_lowercase(),
                    description: self.text("description"),
                }
            }
            "change_theme_colors" => Action::ChangeColors {
                primary: self.text_or("primary_color", "#007cba"),
                secondary: self.text("secondary_color"),
                accent: self.text("accent_color"),
            },
            "create_blog_post" | "create_post" => {
                let title = self.text_or("title", "New Blog Post");
                Action::CreatePost {
                    topic: self.text("topic").unwrap_or_else(|| title.clone()),
                    title,
                    content: self.text("content"),
                }
            }
            "create_page" => Action::CreatePage {
                title: command::title_case(&self.text_or("title", command::DEFAULT_PAGE_NAME)),
                content: self.text("content"),
            },
            "add_customer" => {
                let (first, last) = match (self.text("first_name"), self.text("name")) {
                    (Some(first), _) => (first, self.text("last_name")),
                    (None, Some(full)) => match full.split_once(' ') {
                        Some((f, l)) => (f.to_string(), Some(l.trim().to_string())),
                        None => (full, None),
                    },
                    (None, None) => ("AI".to_string(), None),
                };
                Action::AddCustomer {
                    email: self.text("email"),
                    first_name: first,
                    last_name: last.unwrap_or_else(|| "Customer".to_string()),
                }
            }
            "update_navigation" => {
                let item = match self.parameters.get("menu_item") {
                    Some(Value::Object(map)) => map.clone(),
                    _ => self.parameters.clone(),
                };
                let get = |k: &str| item.get(k).and_then(param_text);
                let op = self.text_or("action", "add").to_lowercase();
                let change = match op.as_str() {
                    "add" => NavChange::Add {
                        title: get("title").unwrap_or_else(|| "New Menu Item".to_string()),
                        url: get("url").unwrap_or_else(|| "#".to_string()),
                    },
                    "remove" | "delete" => {
                        let id = get("id")
                            .and_then(|id| id.parse::<u64>().ok())
                            .ok_or_else(|| self.invalid("menu item id required for removal"))?;
                        NavChange::Remove { id }
                    }
                    other => {
                        return Err(self.invalid(&format!("unsupported navigation action '{other}'")))
                    }
                };
                Action::UpdateNavigation { change }
            }
            "update_field" => {
                let field = self
                    .text("field")
                    .or_else(|| self.text("field_name"))
                    .ok_or_else(|| self.invalid("field name required"))?;
                let value = self
                    .text("value")
                    .ok_or_else(|| self.invalid("field value required"))?;
                Action::UpdateField {
                    field: field.to_lowercase(),
                    value,
                }
            }
            "create_coupon" => {
                let discount_type = match self.text("discount_type").as_deref() {
                    Some("fixed_cart") | Some("fixed") => DiscountType::FixedCart,
                    _ => DiscountType::Percent,
                };
                Action::CreateCoupon {
                    code: self
                        .text("code")
                        .map(|c| c.to_uppercase())
                        .unwrap_or_else(|| format!("AI{}", chrono::Local::now().format("%Y%m%d"))),
                    discount_type,
                    amount: self.text_or("amount", command::DEFAULT_COUPON_AMOUNT),
                }
            }
            "list_orders" => Action::ListOrders,
            "list_media" => Action::ListMedia,
            "status" => Action::Status,
            "trigger_webhook" | "send_webhook" => Action::TriggerWebhook {
                event: self
                    .text("event")
                    .ok_or_else(|| self.invalid("webhook event required"))?
                    .to_lowercase(),
                data: self.parameters.get("data").cloned().unwrap_or(Value::Null),
            },
            "deploy_changes" | "deploy" => {
                let files = match self.parameters.get("files") {
                    Some(Value::Array(items)) => items.iter().filter_map(param_text).collect(),
                    Some(other) => param_text(other)
                        .map(|s| {
                            s.split(',')
                                .map(|f| f.trim().to_string())
                                .filter(|f| !f.is_empty())
                                .collect()
                        })
                        .unwrap_or_default(),
                    None => Vec::new(),
                };
                Action::Deploy { files }
            }
            other => return Err(SiteError::UnknownAction(other.to_string())),
        };
        Ok(action)
    }
}

fn param_text(value: &Value) -> Option<String> {
    let text = match value {
        Value::String(s) => s.trim().to_string(),
        Value::Number(n) => n.to_string(),
        Value::Bool(b) => b.to_string(),
        _ => return None,
    };
    (!text.is_empty()).then_some(text)
}

// ---------------------------------------------------------------------------
// Chat Completions wire types
// ---------------------------------------------------------------------------

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    max_tokens: u32,
    temperature: f32,
}

#[derive(Debug, Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: MessageResponse,
}

#[derive(Debug, Deserialize)]
struct MessageResponse {
    content: Option<String>,
}

// ---------------------------------------------------------------------------
// IntentClient
// ---------------------------------------------------------------------------

pub struct IntentClient {
    http: Client,
    base_url: String,
    api_key: SecretString,
    model: String,
    max_tokens: u32,
    temperature: f32,
}

impl IntentClient {
    pub fn new(
        base_url: impl Into<String>,
        api_key: SecretString,
        model: impl Into<String>,
        max_tokens: u32,
        temperature: f32,
    ) -> Result<Self> {
        let http = Client::builder().timeout(REQUEST_TIMEOUT).build()?;
        Ok(Self {
            http,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_key,
            model: model.into(),
            max_tokens,
            temperature,
        })
    }

    pub fn from_config(config: &AiConfig, secrets: &Secrets) -> Result<Self> {
        Self::new(
            config.base_url.clone(),
            secrets.require_openai_api_key()?.clone(),
            config.model.clone(),
            config.max_tokens,
            config.temperature,
        )
    }

    pub fn interpret(&self, command: &str) -> Result<Intent> {
        let prompt = format!("Convert this user command into one website action.\n\nCommand: \"{command}\"\n\n{ACTIONS_PROMPT}");
        let request = ChatRequest {
            model: &self.model,
            messages: vec![
                ChatMessage {
                    role: "system",
                    content: SYSTEM_PROMPT,
                },
                ChatMessage {
                    role: "user",
                    content: &prompt,
                },
            ],
            max_tokens: self.max_tokens,
            temperature: self.temperature,
        };

        let url = format!("{}/chat/completions", self.base_url);
        debug!(%url, model = %self.model, "requesting intent");
        let resp = self
            .http
            .post(&url)
            .bearer_auth(self.api_key.expose_secret())
            .json(&request)
            .send()?;

        let status = resp.status().as_u16();
        let body = resp.text()?;
        if !(200..300).contains(&status) {
            return Err(SiteError::Http { status, body });
        }

        let parsed: ChatResponse = serde_json::from_str(&body).map_err(|e| SiteError::AiResponse {
            reason: format!("unexpected completion shape: {e}"),
            raw: body.clone(),
        })?;
        let content = parsed
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .ok_or_else(|| SiteError::AiResponse {
                reason: "completion has no message content".to_string(),
                raw: body.clone(),
            })?;

        let intent = parse_intent(&content)?;
        info!(action = %intent.action, confidence = intent.confidence, "intent received");
        Ok(intent)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
