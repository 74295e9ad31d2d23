//! Executes a parsed [`Action`] against the site.
//!
//! Content actions go through the REST client; theme actions rewrite a
//! local template and push it through the [`FileDeployer`].

use crate::command::{title_case, Action, DiscountType, NavChange};
use crate::deploy::FileDeployer;
use crate::error::{Result, SiteError};
use crate::theme::{self, ThemeWorkspace, HOMEPAGE_TEMPLATE, STYLESHEET};
use crate::wp::{
    CouponDraft, CustomerDraft, MenuItemDraft, MetaEntry, PostDraft, ProductDraft, TermRef,
    WpClient,
};
use chrono::{Local, Utc};
use secrecy::SecretString;
use serde::Serialize;
use serde_json::{json, Value};
use std::collections::BTreeMap;
use tracing::{info, warn};

const CREATED_BY: &str = "sitectl";
const POST_CATEGORY: &str = "AI Insights";
const LIST_LIMIT: u32 = 10;
const LIST_PREVIEW: usize = 5;

/// What an executed action reports back.
#[derive(Debug, Clone, Serialize)]
pub struct Outcome {
    pub action: String,
    pub message: String,
    pub data: Value,
}

impl Outcome {
    fn new(action: &Action, message: impl Into<String>, data: Value) -> Self {
        Self {
            action: action.name().to_string(),
            message: message.into(),
            data,
        }
    }
}

pub struct Dispatcher<'a> {
    wp: &'a WpClient,
    theme: ThemeWorkspace,
    deployer: &'a mut dyn FileDeployer,
    default_files: Vec<String>,
    webhook_secret: Option<SecretString>,
}

impl<'a> Dispatcher<'a> {
    pub fn new(
        wp: &'a WpClient,
        theme: ThemeWorkspace,
        deployer: &'a mut dyn FileDeployer,
        default_files: Vec<String>,
    ) -> Self {
        Self {
            wp,
            theme,
            deployer,
            default_files,
            webhook_secret: None,
        }
    }

    pub fn with_webhook_secret(mut self, secret: Option<SecretString>) -> Self {
        self.webhook_secret = secret;
        self
    }

    pub fn execute(&mut self, action: &Action) -> Result<Outcome> {
        self.execute_for("", action)
    }

    /// Execute `action`, recording `command` on created objects.
    pub fn execute_for(&mut self, command: &str, action: &Action) -> Result<Outcome> {
        info!(action = action.name(), "executing");
        match action {
            Action::AddProduct {
                name,
                price,
                category,
                description,
            } => self.add_product(action, command, name, price, category, description.as_deref()),
            Action::AddCustomer {
                email,
                first_name,
                last_name,
            } => self.add_customer(action, email.as_deref(), first_name, last_name),
            Action::CreatePost {
                topic,
                title,
                content,
            } => self.create_post(action, command, topic, title, content.as_deref()),
            Action::CreatePage { title, content } => {
                self.create_page(action, command, title, content.as_deref())
            }
            Action::UpdateNavigation { change } => self.update_navigation(action, change),
            Action::ChangeBackground { theme, video_url } => {
                let html = self.theme.read(HOMEPAGE_TEMPLATE)?;
                let html = theme::set_background_video(&html, video_url)?;
                let remote = self.rewrite_and_deploy(HOMEPAGE_TEMPLATE, &html)?;
                Ok(Outcome::new(
                    action,
                    format!("Background changed to {theme} video"),
                    json!({ "theme": theme, "video_url": video_url, "remote": remote }),
                ))
            }
            Action::ChangeColors {
                primary,
                secondary,
                accent,
            } => {
                let mut vars = vec![("primary-color", primary.as_str())];
                if let Some(c) = secondary {
                    vars.push(("secondary-color", c.as_str()));
                }
                if let Some(c) = accent {
                    vars.push(("accent-color", c.as_str()));
                }
                let css = self.theme.read(STYLESHEET)?;
                let css = theme::set_css_variables(&css, &vars)?;
                let remote = self.rewrite_and_deploy(STYLESHEET, &css)?;
                let colors: BTreeMap<&str, &str> = vars.iter().copied().collect();
                Ok(Outcome::new(
                    action,
                    format!("Theme colors updated (primary {primary})"),
                    json!({ "colors": colors, "remote": remote }),
                ))
            }
            Action::UpdateHomepage { title, subtitle } => {
                if title.is_none() && subtitle.is_none() {
                    return Err(SiteError::InvalidParameter {
                        action: action.name().to_string(),
                        reason: "nothing to change; give a title or a subtitle".to_string(),
                    });
                }
                let mut html = self.theme.read(HOMEPAGE_TEMPLATE)?;
                if let Some(t) = title {
                    html = theme::set_hero_title(&html, t)?;
                }
                if let Some(s) = subtitle {
                    html = theme::set_hero_subtitle(&html, s)?;
                }
                let remote = self.rewrite_and_deploy(HOMEPAGE_TEMPLATE, &html)?;
                Ok(Outcome::new(
                    action,
                    "Homepage content updated",
                    json!({ "title": title, "subtitle": subtitle, "remote": remote }),
                ))
            }
            Action::UpdateField { field, value } => {
                let fields = BTreeMap::from([(field.clone(), value.clone())]);
                let response = self.wp.update_acf_options(&fields)?;
                Ok(Outcome::new(
                    action,
                    format!("Field '{field}' set to '{value}'"),
                    json!({ "field": field, "value": value, "response": response }),
                ))
            }
            Action::ListMedia => {
                let items = self.wp.list_media(LIST_LIMIT)?;
                let preview: Vec<Value> = items
                    .iter()
                    .take(LIST_PREVIEW)
                    .map(|m| {
                        json!({
                            "id": m.get("id"),
                            "title": m.pointer("/title/rendered"),
                            "url": m.get("source_url"),
                        })
                    })
                    .collect();
                Ok(Outcome::new(
                    action,
                    format!("Found {} media items", items.len()),
                    json!({ "count": items.len(), "items": preview }),
                ))
            }
            Action::CreateCoupon {
                code,
                discount_type,
                amount,
            } => self.create_coupon(action, command, code, *discount_type, amount),
            Action::ListOrders => {
                let orders = self.wp.list_orders(LIST_LIMIT)?;
                let preview: Vec<Value> = orders
                    .iter()
                    .take(LIST_PREVIEW)
                    .map(|o| {
                        json!({
                            "id": o.get("id"),
                            "status": o.get("status"),
                            "total": o.get("total"),
                        })
                    })
                    .collect();
                Ok(Outcome::new(
                    action,
                    format!("Found {} orders", orders.len()),
                    json!({ "count": orders.len(), "orders": preview }),
                ))
            }
            Action::Deploy { files } => {
                let files = if files.is_empty() {
                    &self.default_files
                } else {
                    files
                };
                let report = self.deployer.deploy_files(files);
                if !report.is_success() {
                    return Err(SiteError::DeployFailed(report.failed_files().join(", ")));
                }
                Ok(Outcome::new(
                    action,
                    format!("Deployed {} files", report.deployed.len()),
                    serde_json::to_value(&report)?,
                ))
            }
            Action::TriggerWebhook { event, data } => {
                self.wp
                    .trigger_webhook(event, data, self.webhook_secret.as_ref())?;
                Ok(Outcome::new(
                    action,
                    format!("Webhook {event} triggered"),
                    json!({ "event": event }),
                ))
            }
            Action::Status => {
                let status = self.wp.site_status();
                Ok(Outcome::new(
                    action,
                    format!(
                        "{}/{} endpoints available ({:.1}%)",
                        status.available, status.tested, status.success_rate
                    ),
                    serde_json::to_value(&status)?,
                ))
            }
        }
    }

    fn rewrite_and_deploy(&mut self, file: &str, content: &str) -> Result<String> {
        self.theme.write(file, content)?;
        self.deployer.deploy_file(file)
    }

    fn meta(command: &str) -> Vec<MetaEntry> {
        let mut meta = vec![
            MetaEntry::new("_created_by_ai", CREATED_BY),
            MetaEntry::new("_creation_date", Utc::now().to_rfc3339()),
        ];
        if !command.is_empty() {
            meta.push(MetaEntry::new("_ai_command", command));
        }
        meta
    }

    fn meta_map(command: &str) -> BTreeMap<String, String> {
        Self::meta(command)
            .into_iter()
            .map(|m| (m.key, m.value))
            .collect()
    }

    fn add_product(
        &mut self,
        action: &Action,
        command: &str,
        name: &str,
        price: &str,
        category: &str,
        description: Option<&str>,
    ) -> Result<Outcome> {
        let draft = ProductDraft {
            name: name.to_string(),
            product_type: "simple".to_string(),
            regular_price: price.to_string(),
            description: description.map(str::to_string).unwrap_or_else(|| {
                format!("<p>AI-generated product: <strong>{name}</strong></p>")
            }),
            short_description: format!("Premium {category} product - {name}"),
            status: "publish".to_string(),
            catalog_visibility: "visible".to_string(),
            categories: vec![TermRef {
                name: title_case(category),
            }],
            tags: vec![TermRef {
                name: "AI Generated".to_string(),
            }],
            meta_data: Self::meta(command),
        };
        let created = self.wp.create_product(&draft)?;

        let event = json!({ "id": created.id, "name": name, "price": price });
        if let Err(e) = self
            .wp
            .trigger_webhook("product_create", &event, self.webhook_secret.as_ref())
        {
            warn!("product_create webhook failed: {e}");
        }

        Ok(Outcome::new(
            action,
            format!("Product \"{name}\" created for ${price}"),
            json!({ "id": created.id, "url": created.url(), "category": category }),
        ))
    }

    fn add_customer(
        &mut self,
        action: &Action,
        email: Option<&str>,
        first_name: &str,
        last_name: &str,
    ) -> Result<Outcome> {
        let stamp = Local::now().format("%Y%m%d_%H%M%S").to_string();
        let email = match email {
            Some(e) => e.to_string(),
            None => format!("customer_{stamp}@{}", site_host(self.wp.site_url())),
        };
        let draft = CustomerDraft {
            email: email.clone(),
            first_name: first_name.to_string(),
            last_name: last_name.to_string(),
            username: format!("ai_customer_{stamp}"),
            meta_data: Self::meta(""),
        };
        let created = self.wp.create_customer(&draft)?;
        Ok(Outcome::new(
            action,
            format!("Customer \"{first_name} {last_name}\" created"),
            json!({ "id": created.id, "email": email }),
        ))
    }

    fn create_post(
        &mut self,
        action: &Action,
        command: &str,
        topic: &str,
        title: &str,
        content: Option<&str>,
    ) -> Result<Outcome> {
        let categories = match self.wp.get_or_create_category(POST_CATEGORY) {
            Ok(id) => vec![id],
            Err(e) => {
                warn!("post category lookup failed, posting uncategorised: {e}");
                Vec::new()
            }
        };
        let draft = PostDraft {
            title: title.to_string(),
            content: content
                .map(str::to_string)
                .unwrap_or_else(|| post_body(topic)),
            status: "publish".to_string(),
            categories,
            meta: Self::meta_map(command),
        };
        let created = self.wp.create_post(&draft)?;
        Ok(Outcome::new(
            action,
            format!("Blog post about \"{topic}\" created"),
            json!({ "id": created.id, "url": created.url(), "topic": topic }),
        ))
    }

    fn create_page(
        &mut self,
        action: &Action,
        command: &str,
        title: &str,
        content: Option<&str>,
    ) -> Result<Outcome> {
        let mut meta = Self::meta_map(command);
        meta.insert("_wp_page_template".to_string(), "default".to_string());
        let draft = PostDraft {
            title: title.to_string(),
            content: content
                .map(str::to_string)
                .unwrap_or_else(|| page_body(title)),
            status: "publish".to_string(),
            categories: Vec::new(),
            meta,
        };
        let created = self.wp.create_page(&draft)?;
        Ok(Outcome::new(
            action,
            format!("Page \"{title}\" created"),
            json!({ "id": created.id, "url": created.url() }),
        ))
    }

    fn update_navigation(&mut self, action: &Action, change: &NavChange) -> Result<Outcome> {
        match change {
            NavChange::Add { title, url } => {
                let created = self.wp.create_menu_item(&MenuItemDraft {
                    title: title.clone(),
                    url: url.clone(),
                    status: "publish".to_string(),
                    menus: None,
                })?;
                Ok(Outcome::new(
                    action,
                    format!("Menu item \"{title}\" added"),
                    json!({ "id": created.id, "title": title, "url": url }),
                ))
            }
            NavChange::Remove { id } => {
                self.wp.delete_menu_item(*id)?;
                Ok(Outcome::new(
                    action,
                    format!("Menu item {id} removed"),
                    json!({ "id": id }),
                ))
            }
        }
    }

    fn create_coupon(
        &mut self,
        action: &Action,
        command: &str,
        code: &str,
        discount_type: DiscountType,
        amount: &str,
    ) -> Result<Outcome> {
        let description = if command.is_empty() {
            "Coupon created by sitectl".to_string()
        } else {
            format!("Coupon created by sitectl for: {command}")
        };
        let created = self.wp.create_coupon(&CouponDraft {
            code: code.to_string(),
            discount_type: discount_type.as_str().to_string(),
            amount: amount.to_string(),
            description,
            individual_use: false,
            usage_limit: 100,
            usage_limit_per_user: 1,
            meta_data: Self::meta(""),
        })?;
        let discount = match discount_type {
            DiscountType::Percent => format!("{amount}%"),
            DiscountType::FixedCart => format!("${amount}"),
        };
        Ok(Outcome::new(
            action,
            format!("Coupon \"{code}\" created - {discount} off"),
            json!({ "id": created.id, "code": code, "discount": discount }),
        ))
    }
}

fn site_host(site_url: &str) -> &str {
    let rest = site_url
        .split_once("://")
        .map(|(_, rest)| rest)
        .unwrap_or(site_url);
    rest.split(['/', ':']).next().unwrap_or(rest)
}

fn post_body(topic: &str) -> String {
    let heading = title_case(topic);
    let created = Local::now().format("%B %d, %Y at %I:%M %p");
    format!(
        r#"<h2>Welcome to {heading}</h2>
<p>This post about <strong>{topic}</strong> was created from a site command.</p>

<h3>Key Features</h3>
<ul>
    <li>AI-powered content generation</li>
    <li>Command-driven website management</li>
    <li>Real-time deployment</li>
    <li>WordPress integration</li>
</ul>

<p><em>Generated automatically on {created}.</em></p>
"#
    )
}

fn page_body(title: &str) -> String {
    format!(
        r#"<div class="ai-generated-page">
    <h1>{title}</h1>
    <p class="lead">Welcome to {title}.</p>
    <div class="row">
        <div class="col-md-8">
            <h2>About This Page</h2>
            <p>This page was created from a site command.</p>
        </div>
        <div class="col-md-4">
            <div class="card">
                <div class="card-body">
                    <h5 class="card-title">Need Help?</h5>
                    <a href="/contact" class="btn btn-primary">Get in Touch</a>
                </div>
            </div>
        </div>
    </div>
</div>
"#
    )
}
