//! Blocking client for the WordPress, WooCommerce, ACF and WP Webhooks
//! REST APIs.
//!
//! Every authenticated call uses HTTP Basic with the configured user and an
//! Application Password. Only 200 and 201 count as success; anything else
//! surfaces as [`SiteError::Http`] with the (truncated) response body.
//! Idempotent GETs retry transient failures; writes are sent once.

use crate::config::{Config, Secrets};
use crate::error::{Result, SiteError};
use reqwest::blocking::{Client, RequestBuilder, Response};
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::time::Duration;
use tracing::{debug, info, warn};

const MAX_ERROR_BODY: usize = 500;
const DEFAULT_BACKOFF: Duration = Duration::from_millis(500);
const WEBHOOK_SOURCE: &str = "sitectl";

// ---------------------------------------------------------------------------
// Endpoint
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Endpoint {
    Posts,
    Pages,
    Media,
    MenuItems,
    Navigation,
    GlobalStyles,
    Blocks,
    Categories,
    UsersMe,
    Products,
    Orders,
    Coupons,
    Customers,
    AcfOptions,
    Webhooks,
}

impl Endpoint {
    pub fn path(&self) -> &'static str {
        match self {
            Endpoint::Posts => "/wp-json/wp/v2/posts",
            Endpoint::Pages => "/wp-json/wp/v2/pages",
            Endpoint::Media => "/wp-json/wp/v2/media",
            Endpoint::MenuItems => "/wp-json/wp/v2/menu-items",
            Endpoint::Navigation => "/wp-json/wp/v2/navigation",
            Endpoint::GlobalStyles => "/wp-json/wp/v2/global-styles",
            Endpoint::Blocks => "/wp-json/wp/v2/blocks",
            Endpoint::Categories => "/wp-json/wp/v2/categories",
            Endpoint::UsersMe => "/wp-json/wp/v2/users/me",
            Endpoint::Products => "/wp-json/wc/v3/products",
            Endpoint::Orders => "/wp-json/wc/v3/orders",
            Endpoint::Coupons => "/wp-json/wc/v3/coupons",
            Endpoint::Customers => "/wp-json/wc/v3/customers",
            Endpoint::AcfOptions => "/wp-json/acf/v3/options",
            Endpoint::Webhooks => "/wp-json/wp-webhooks/v1/",
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Endpoint::Posts => "posts",
            Endpoint::Pages => "pages",
            Endpoint::Media => "media",
            Endpoint::MenuItems => "menu_items",
            Endpoint::Navigation => "navigation",
            Endpoint::GlobalStyles => "global_styles",
            Endpoint::Blocks => "patterns",
            Endpoint::Categories => "categories",
            Endpoint::UsersMe => "users_me",
            Endpoint::Products => "products",
            Endpoint::Orders => "orders",
            Endpoint::Coupons => "coupons",
            Endpoint::Customers => "customers",
            Endpoint::AcfOptions => "acf_options",
            Endpoint::Webhooks => "webhooks",
        }
    }

    /// Endpoints checked by [`WpClient::site_status`].
    pub fn status_endpoints() -> &'static [Endpoint] {
        &[
            Endpoint::Posts,
            Endpoint::Pages,
            Endpoint::Media,
            Endpoint::MenuItems,
            Endpoint::Navigation,
            Endpoint::GlobalStyles,
            Endpoint::Blocks,
            Endpoint::Products,
            Endpoint::Orders,
            Endpoint::Coupons,
            Endpoint::Customers,
            Endpoint::Webhooks,
            Endpoint::AcfOptions,
        ]
    }
}

// ---------------------------------------------------------------------------
// Request bodies
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct MetaEntry {
    pub key: String,
    pub value: String,
}

impl MetaEntry {
    pub fn new(key: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            value: value.into(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TermRef {
    pub name: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct ProductDraft {
    pub name: String,
    #[serde(rename = "type")]
    pub product_type: String,
    pub regular_price: String,
    pub description: String,
    pub short_description: String,
    pub status: String,
    pub catalog_visibility: String,
    pub categories: Vec<TermRef>,
    pub tags: Vec<TermRef>,
    pub meta_data: Vec<MetaEntry>,
}

#[derive(Debug, Clone, Serialize)]
pub struct CustomerDraft {
    pub email: String,
    pub first_name: String,
    pub last_name: String,
    pub username: String,
    pub meta_data: Vec<MetaEntry>,
}

/// Body shared by posts and pages.
#[derive(Debug, Clone, Serialize)]
pub struct PostDraft {
    pub title: String,
    pub content: String,
    pub status: String,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub categories: Vec<u64>,
    pub meta: BTreeMap<String, String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct CouponDraft {
    pub code: String,
    pub discount_type: String,
    pub amount: String,
    pub description: String,
    pub individual_use: bool,
    pub usage_limit: u32,
    pub usage_limit_per_user: u32,
    pub meta_data: Vec<MetaEntry>,
}

#[derive(Debug, Clone, Serialize)]
pub struct MenuItemDraft {
    pub title: String,
    pub url: String,
    pub status: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub menus: Option<u64>,
}

// ---------------------------------------------------------------------------
// Responses
// ---------------------------------------------------------------------------

/// The fields sitectl reads back from a created object.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
pub struct Created {
    pub id: u64,
    #[serde(default)]
    pub link: Option<String>,
    #[serde(default)]
    pub permalink: Option<String>,
}

impl Created {
    /// Public URL: WooCommerce calls it `permalink`, core WordPress `link`.
    pub fn url(&self) -> Option<&str> {
        self.permalink.as_deref().or(self.link.as_deref())
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct WpUser {
    pub id: u64,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub slug: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct SiteStatus {
    pub tested: usize,
    pub available: usize,
    pub success_rate: f64,
    pub details: BTreeMap<String, String>,
}

impl SiteStatus {
    /// Record one check; `Ok` counts as available.
    pub fn record(&mut self, name: &str, outcome: std::result::Result<String, String>) {
        self.tested += 1;
        let detail = match outcome {
            Ok(detail) => {
                self.available += 1;
                detail
            }
            Err(reason) => format!("error: {reason}"),
        };
        self.details.insert(name.to_string(), detail);
        self.success_rate = self.available as f64 / self.tested as f64 * 100.0;
    }
}

// ---------------------------------------------------------------------------
// WpClient
// ---------------------------------------------------------------------------

pub struct WpClient {
    http: Client,
    site_url: String,
    user: String,
    app_password: Option<SecretString>,
    retries: u32,
    backoff: Duration,
}

impl WpClient {
    pub fn new(
        site_url: impl Into<String>,
        user: impl Into<String>,
        app_password: Option<SecretString>,
        timeout: Duration,
        retries: u32,
    ) -> Result<Self> {
        let http = Client::builder()
            .timeout(timeout)
            .user_agent(concat!("sitectl/", env!("CARGO_PKG_VERSION")))
            .build()?;
        Ok(Self {
            http,
            site_url: site_url.into().trim_end_matches('/').to_string(),
            user: user.into(),
            app_password,
            retries,
            backoff: DEFAULT_BACKOFF,
        })
    }

    pub fn from_config(config: &Config, secrets: &Secrets) -> Result<Self> {
        Self::new(
            config.site_url(),
            config.wordpress.user.clone(),
            secrets.wp_app_password.clone(),
            config.wordpress.timeout(),
            config.wordpress.retries,
        )
    }

    /// Base delay between retries; doubles on each attempt.
    pub fn with_backoff(mut self, backoff: Duration) -> Self {
        self.backoff = backoff;
        self
    }

    pub fn site_url(&self) -> &str {
        &self.site_url
    }

    pub fn url(&self, path: &str) -> String {
        format!("{}{}", self.site_url, path)
    }

    fn authed(&self, req: RequestBuilder) -> Result<RequestBuilder> {
        let password = self.app_password.as_ref().ok_or_else(|| {
            SiteError::MissingSetting(format!(
                "{} is not set",
                crate::config::ENV_WP_APP_PASSWORD
            ))
        })?;
        Ok(req.basic_auth(&self.user, Some(password.expose_secret())))
    }

    fn read(resp: Response) -> Result<Value> {
        let status = resp.status().as_u16();
        let body = resp.text()?;
        if status != 200 && status != 201 {
            let mut body = body;
            if body.len() > MAX_ERROR_BODY {
                let mut cut = MAX_ERROR_BODY;
                while !body.is_char_boundary(cut) {
                    cut -= 1;
                }
                body.truncate(cut);
            }
            return Err(SiteError::Http { status, body });
        }
        if body.trim().is_empty() {
            return Ok(Value::Null);
        }
        Ok(serde_json::from_str(&body)?)
    }

    fn with_retry<F>(&self, what: &str, mut attempt_once: F) -> Result<Value>
    where
        F: FnMut() -> Result<Value>,
    {
        let mut attempt = 0u32;
        loop {
            match attempt_once() {
                Err(e) if e.is_transient() && attempt < self.retries => {
                    let delay = self.backoff * 2u32.saturating_pow(attempt);
                    warn!(%what, attempt = attempt + 1, ?delay, "transient failure, retrying: {e}");
                    std::thread::sleep(delay);
                    attempt += 1;
                }
                other => return other,
            }
        }
    }

    // -----------------------------------------------------------------------
    // Raw verbs
    // -----------------------------------------------------------------------

    pub fn get(&self, path: &str) -> Result<Value> {
        self.get_with_query(path, &[])
    }

    pub fn get_with_query(&self, path: &str, query: &[(&str, String)]) -> Result<Value> {
        let url = self.url(path);
        debug!(%url, "GET");
        self.with_retry(&url, || {
            let req = self.authed(self.http.get(&url).query(query))?;
            Self::read(req.send()?)
        })
    }

    pub fn post<B: Serialize + ?Sized>(&self, path: &str, body: &B) -> Result<Value> {
        let url = self.url(path);
        debug!(%url, "POST");
        let req = self.authed(self.http.post(&url).json(body))?;
        Self::read(req.send()?)
    }

    pub fn delete(&self, path: &str, query: &[(&str, String)]) -> Result<Value> {
        let url = self.url(path);
        debug!(%url, "DELETE");
        let req = self.authed(self.http.delete(&url).query(query))?;
        Self::read(req.send()?)
    }

    /// Unauthenticated GET; returns only the status code.
    pub fn check_endpoint(&self, path: &str) -> Result<u16> {
        let resp = self.http.get(self.url(path)).send()?;
        Ok(resp.status().as_u16())
    }

    fn create<B: Serialize>(&self, endpoint: Endpoint, body: &B) -> Result<Created> {
        let value = self.post(endpoint.path(), body)?;
        Ok(serde_json::from_value(value)?)
    }

    // -----------------------------------------------------------------------
    // Typed operations
    // -----------------------------------------------------------------------

    pub fn current_user(&self) -> Result<WpUser> {
        let value = self.get(Endpoint::UsersMe.path())?;
        Ok(serde_json::from_value(value)?)
    }

    pub fn create_product(&self, draft: &ProductDraft) -> Result<Created> {
        info!(name = %draft.name, price = %draft.regular_price, "creating product");
        self.create(Endpoint::Products, draft)
    }

    pub fn create_customer(&self, draft: &CustomerDraft) -> Result<Created> {
        info!(email = %draft.email, "creating customer");
        self.create(Endpoint::Customers, draft)
    }

    pub fn create_post(&self, draft: &PostDraft) -> Result<Created> {
        info!(title = %draft.title, "creating post");
        self.create(Endpoint::Posts, draft)
    }

    pub fn create_page(&self, draft: &PostDraft) -> Result<Created> {
        info!(title = %draft.title, "creating page");
        self.create(Endpoint::Pages, draft)
    }

    pub fn create_coupon(&self, draft: &CouponDraft) -> Result<Created> {
        info!(code = %draft.code, "creating coupon");
        self.create(Endpoint::Coupons, draft)
    }

    pub fn create_menu_item(&self, draft: &MenuItemDraft) -> Result<Created> {
        info!(title = %draft.title, url = %draft.url, "creating menu item");
        self.create(Endpoint::MenuItems, draft)
    }

    pub fn delete_menu_item(&self, id: u64) -> Result<()> {
        info!(id, "deleting menu item");
        let path = format!("{}/{id}", Endpoint::MenuItems.path());
        self.delete(&path, &[("force", "true".to_string())])?;
        Ok(())
    }

    pub fn update_acf_options(&self, fields: &BTreeMap<String, String>) -> Result<Value> {
        info!(fields = fields.len(), "updating ACF options");
        self.post(Endpoint::AcfOptions.path(), &serde_json::json!({ "fields": fields }))
    }

    pub fn list_orders(&self, per_page: u32) -> Result<Vec<Value>> {
        let value = self
            .get_with_query(Endpoint::Orders.path(), &[("per_page", per_page.to_string())])?;
        Ok(serde_json::from_value(value)?)
    }

    pub fn list_media(&self, per_page: u32) -> Result<Vec<Value>> {
        let value = self
            .get_with_query(Endpoint::Media.path(), &[("per_page", per_page.to_string())])?;
        Ok(serde_json::from_value(value)?)
    }

    /// Find a category by name (first search hit) or create it.
    pub fn get_or_create_category(&self, name: &str) -> Result<u64> {
        let found = self
            .get_with_query(Endpoint::Categories.path(), &[("search", name.to_string())])?;
        if let Some(id) = found
            .as_array()
            .and_then(|arr| arr.first())
            .and_then(|c| c.get("id"))
            .and_then(Value::as_u64)
        {
            return Ok(id);
        }
        let created = self.create(
            Endpoint::Categories,
            &serde_json::json!({
                "name": name,
                "description": format!("Category created by sitectl for: {name}"),
            }),
        )?;
        Ok(created.id)
    }

    /// Fire a WP Webhooks action. The shared secret, when configured, travels
    /// in the body the receiving snippet checks.
    pub fn trigger_webhook(
        &self,
        event: &str,
        data: &Value,
        secret: Option<&SecretString>,
    ) -> Result<()> {
        let path = format!("{}action/{event}", Endpoint::Webhooks.path());
        let mut body = serde_json::json!({
            "action": event,
            "data": data,
            "timestamp": chrono::Utc::now().to_rfc3339(),
            "source": WEBHOOK_SOURCE,
        });
        if let Some(secret) = secret {
            body["secret"] = Value::String(secret.expose_secret().clone());
        }
        self.post(&path, &body)?;
        info!(%event, "webhook triggered");
        Ok(())
    }

    /// Check each REST endpoint without credentials. 401 means the route
    /// exists but wants auth, so it counts as available.
    pub fn site_status(&self) -> SiteStatus {
        let mut status = SiteStatus {
            tested: 0,
            available: 0,
            success_rate: 0.0,
            details: BTreeMap::new(),
        };
        for endpoint in Endpoint::status_endpoints() {
            let outcome = match self.check_endpoint(endpoint.path()) {
                Ok(200 | 201 | 401) => Ok("available".to_string()),
                Ok(code) => Err(code.to_string()),
                Err(e) => {
                    debug!(endpoint = endpoint.name(), "endpoint check failed: {e}");
                    Err("unreachable".to_string())
                }
            };
            status.record(endpoint.name(), outcome);
        }
        status
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use mockito::Matcher;

    fn client(server: &mockito::Server) -> WpClient {
        WpClient::new(
            server.url(),
            "admin",
            Some(SecretString::new("app pass".to_string())),
            Duration::from_secs(5),
            2,
        )
        .unwrap()
        .with_backoff(Duration::ZERO)
    }

    fn product() -> ProductDraft {
        ProductDraft {
            name: "guitar lessons".into(),
            product_type: "simple".into(),
            regular_price: "19.99".into(),
            description: "<p>lessons</p>".into(),
            short_description: "Premium music product".into(),
            status: "publish".into(),
            catalog_visibility: "visible".into(),
            categories: vec![TermRef {
                name: "Music".into(),
            }],
            tags: vec![],
            meta_data: vec![MetaEntry::new("_created_by_ai", "sitectl")],
        }
    }

    #[test]
    fn create_product_posts_with_basic_auth() {
        let mut server = mockito::Server::new();
        let m = server
            .mock("POST", "/wp-json/wc/v3/products")
            .match_header("authorization", Matcher::Regex("^Basic ".into()))
            .match_body(Matcher::PartialJson(serde_json::json!({
                "name": "guitar lessons",
                "type": "simple",
                "regular_price": "19.99",
                "categories": [{"name": "Music"}],
            })))
            .with_status(201)
            .with_body(r#"{"id": 42, "permalink": "https://example.com/product/guitar-lessons"}"#)
            .create();

        let created = client(&server).create_product(&product()).unwrap();
        m.assert();
        assert_eq!(created.id, 42);
        assert_eq!(
            created.url(),
            Some("https://example.com/product/guitar-lessons")
        );
    }

    #[test]
    fn non_success_status_is_http_error() {
        let mut server = mockito::Server::new();
        server
            .mock("POST", "/wp-json/wc/v3/products")
            .with_status(401)
            .with_body(r#"{"code":"woocommerce_rest_cannot_create"}"#)
            .create();

        let err = client(&server).create_product(&product()).unwrap_err();
        match err {
            SiteError::Http { status, body } => {
                assert_eq!(status, 401);
                assert!(body.contains("cannot_create"));
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn missing_app_password_fails_before_request() {
        let server = mockito::Server::new();
        let c = WpClient::new(server.url(), "admin", None, Duration::from_secs(5), 0).unwrap();
        let err = c.current_user().unwrap_err();
        assert!(matches!(err, SiteError::MissingSetting(_)));
    }

    #[test]
    fn get_retries_server_errors() {
        let mut server = mockito::Server::new();
        let failing = server
            .mock("GET", "/wp-json/wp/v2/users/me")
            .with_status(503)
            .expect(3)
            .create();

        let err = client(&server).current_user().unwrap_err();
        failing.assert();
        assert!(err.is_transient());
    }

    #[test]
    fn post_is_not_retried() {
        let mut server = mockito::Server::new();
        let m = server
            .mock("POST", "/wp-json/wp/v2/posts")
            .with_status(502)
            .expect(1)
            .create();

        let draft = PostDraft {
            title: "t".into(),
            content: "c".into(),
            status: "publish".into(),
            categories: vec![1],
            meta: BTreeMap::new(),
        };
        assert!(client(&server).create_post(&draft).is_err());
        m.assert();
    }

    #[test]
    fn category_lookup_reuses_existing() {
        let mut server = mockito::Server::new();
        server
            .mock("GET", "/wp-json/wp/v2/categories")
            .match_query(Matcher::UrlEncoded("search".into(), "music".into()))
            .with_status(200)
            .with_body(r#"[{"id": 7, "name": "Music"}]"#)
            .create();
        let create = server
            .mock("POST", "/wp-json/wp/v2/categories")
            .expect(0)
            .create();

        assert_eq!(client(&server).get_or_create_category("music").unwrap(), 7);
        create.assert();
    }

    #[test]
    fn category_created_when_missing() {
        let mut server = mockito::Server::new();
        server
            .mock("GET", "/wp-json/wp/v2/categories")
            .match_query(Matcher::Any)
            .with_status(200)
            .with_body("[]")
            .create();
        server
            .mock("POST", "/wp-json/wp/v2/categories")
            .match_body(Matcher::PartialJson(serde_json::json!({"name": "gaming"})))
            .with_status(201)
            .with_body(r#"{"id": 11}"#)
            .create();

        assert_eq!(client(&server).get_or_create_category("gaming").unwrap(), 11);
    }

    #[test]
    fn delete_menu_item_forces() {
        let mut server = mockito::Server::new();
        let m = server
            .mock("DELETE", "/wp-json/wp/v2/menu-items/12")
            .match_query(Matcher::UrlEncoded("force".into(), "true".into()))
            .with_status(200)
            .with_body(r#"{"deleted": true}"#)
            .create();

        client(&server).delete_menu_item(12).unwrap();
        m.assert();
    }

    #[test]
    fn webhook_carries_secret() {
        let mut server = mockito::Server::new();
        let m = server
            .mock("POST", "/wp-json/wp-webhooks/v1/action/product_create")
            .match_body(Matcher::PartialJson(serde_json::json!({
                "action": "product_create",
                "secret": "s3cret",
                "data": {"product_id": 42},
            })))
            .with_status(200)
            .with_body("{}")
            .create();

        let secret = SecretString::new("s3cret".to_string());
        client(&server)
            .trigger_webhook(
                "product_create",
                &serde_json::json!({"product_id": 42}),
                Some(&secret),
            )
            .unwrap();
        m.assert();
    }

    #[test]
    fn site_status_counts_unauthorized_as_available() {
        let mut server = mockito::Server::new();
        server
            .mock("GET", Matcher::Regex("^/wp-json/wc/".into()))
            .with_status(401)
            .expect_at_least(1)
            .create();
        server
            .mock("GET", "/wp-json/wp/v2/posts")
            .with_status(200)
            .with_body("[]")
            .create();
        server
            .mock("GET", Matcher::Any)
            .with_status(404)
            .expect_at_least(1)
            .create();

        let status = client(&server).site_status();
        assert_eq!(status.tested, Endpoint::status_endpoints().len());
        // posts + four WooCommerce routes
        assert_eq!(status.available, 5);
        assert_eq!(status.details["products"], "available");
        assert_eq!(status.details["pages"], "error: 404");
        assert!(status.success_rate > 0.0 && status.success_rate < 100.0);
    }

    #[test]
    fn extra_checks_update_the_rate() {
        let mut status = SiteStatus {
            tested: 1,
            available: 1,
            success_rate: 100.0,
            details: BTreeMap::new(),
        };
        status.record("sftp", Err("connection refused".into()));
        assert_eq!(status.tested, 2);
        assert_eq!(status.available, 1);
        assert_eq!(status.success_rate, 50.0);
        assert_eq!(status.details["sftp"], "error: connection refused");
    }
}
