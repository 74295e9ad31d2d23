use crate::error::{Result, SiteError};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::OnceLock;

pub const HOMEPAGE_TEMPLATE: &str = "page-home.php";
pub const STYLESHEET: &str = "style.css";

// ---------------------------------------------------------------------------
// VideoTheme
// ---------------------------------------------------------------------------

/// Stock background videos selectable by keyword.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VideoTheme {
    Space,
    Ocean,
    City,
    Nature,
    Gaming,
    Music,
}

impl VideoTheme {
    pub const ALL: [VideoTheme; 6] = [
        VideoTheme::Space,
        VideoTheme::Ocean,
        VideoTheme::City,
        VideoTheme::Nature,
        VideoTheme::Gaming,
        VideoTheme::Music,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            VideoTheme::Space => "space",
            VideoTheme::Ocean => "ocean",
            VideoTheme::City => "city",
            VideoTheme::Nature => "nature",
            VideoTheme::Gaming => "gaming",
            VideoTheme::Music => "music",
        }
    }

    pub fn url(&self) -> &'static str {
        match self {
            VideoTheme::Space => "https://cdn.pixabay.com/vimeo/459567622/space-47668.mp4",
            VideoTheme::Ocean => "https://cdn.pixabay.com/vimeo/459567531/ocean-47667.mp4",
            VideoTheme::City => "https://cdn.pixabay.com/vimeo/459567642/city-47669.mp4",
            VideoTheme::Nature => "https://cdn.pixabay.com/vimeo/459567652/nature-47670.mp4",
            VideoTheme::Gaming => "https://cdn.pixabay.com/vimeo/459567662/gaming-47671.mp4",
            VideoTheme::Music => "https://cdn.pixabay.com/vimeo/459567672/music-47672.mp4",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|t| t.as_str() == s)
    }

    /// First theme keyword contained in `text`.
    pub fn find_in(text: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|t| text.contains(t.as_str()))
    }
}

impl std::fmt::Display for VideoTheme {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// ThemeWorkspace
// ---------------------------------------------------------------------------

/// The local checkout of the WordPress theme.
#[derive(Debug, Clone)]
pub struct ThemeWorkspace {
    dir: PathBuf,
}

impl ThemeWorkspace {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn path(&self, file: &str) -> PathBuf {
        self.dir.join(file)
    }

    pub fn read(&self, file: &str) -> Result<String> {
        let path = self.path(file);
        if !path.is_file() {
            return Err(SiteError::ThemeFileNotFound(path.display().to_string()));
        }
        Ok(std::fs::read_to_string(path)?)
    }

    pub fn write(&self, file: &str, content: &str) -> Result<()> {
        crate::io::atomic_write(&self.path(file), content.as_bytes())
    }
}

// ---------------------------------------------------------------------------
// Template rewrites
// ---------------------------------------------------------------------------

static VIDEO_BLOCK_RE: OnceLock<Regex> = OnceLock::new();
static SOURCE_SRC_RE: OnceLock<Regex> = OnceLock::new();
static HERO_TITLE_RE: OnceLock<Regex> = OnceLock::new();
static HERO_SUBTITLE_RE: OnceLock<Regex> = OnceLock::new();
static SAFE_URL_RE: OnceLock<Regex> = OnceLock::new();

fn video_block_re() -> &'static Regex {
    VIDEO_BLOCK_RE.get_or_init(|| {
        Regex::new(r#"(?is)<video\b[^>]*\bclass="[^"]*\bvideo-background\b[^"]*"[^>]*>.*?</video>"#)
            .unwrap()
    })
}

fn source_src_re() -> &'static Regex {
    SOURCE_SRC_RE.get_or_init(|| Regex::new(r#"(?is)(<source\b[^>]*?\bsrc=")([^"]*)(")"#).unwrap())
}

fn hero_title_re() -> &'static Regex {
    HERO_TITLE_RE.get_or_init(|| {
        Regex::new(r#"(?is)(<h1\b[^>]*\bclass="[^"]*\bhero-title\b[^"]*"[^>]*>)(.*?)(</h1>)"#)
            .unwrap()
    })
}

fn hero_subtitle_re() -> &'static Regex {
    HERO_SUBTITLE_RE.get_or_init(|| {
        Regex::new(r#"(?is)(<p\b[^>]*\bclass="[^"]*\bhero-subtitle\b[^"]*"[^>]*>)(.*?)(</p>)"#)
            .unwrap()
    })
}

/// An http(s) URL that can sit inside a quoted HTML attribute as-is.
pub fn is_safe_url(url: &str) -> bool {
    SAFE_URL_RE
        .get_or_init(|| Regex::new(r#"^(?i)https?://[^\s"'<>`\\]+$"#).unwrap())
        .is_match(url)
}

/// Error for a video URL [`is_safe_url`] rejects.
pub fn unsafe_video_url(action: &str, url: &str) -> SiteError {
    SiteError::InvalidParameter {
        action: action.to_string(),
        reason: format!("video URL must be a plain http(s) URL: {url}"),
    }
}

fn escape_html(text: &str) -> String {
    text.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
}

fn marker_missing(marker: &str) -> SiteError {
    SiteError::TemplateMarker {
        file: HOMEPAGE_TEMPLATE.to_string(),
        marker: marker.to_string(),
    }
}

/// Point the first `<source>` of the background `<video>` at `url`.
pub fn set_background_video(html: &str, url: &str) -> Result<String> {
    if !is_safe_url(url) {
        return Err(unsafe_video_url("change_background", url));
    }
    let block = video_block_re()
        .find(html)
        .ok_or_else(|| marker_missing(r#"<video class="video-background">"#))?;
    let inner = block.as_str();
    if !source_src_re().is_match(inner) {
        return Err(marker_missing("<source src=\"...\"> inside the background video"));
    }
    let rewritten = source_src_re().replacen(inner, 1, |caps: &regex::Captures| {
        format!("{}{}{}", &caps[1], url, &caps[3])
    });

    let mut out = String::with_capacity(html.len() + url.len());
    out.push_str(&html[..block.start()]);
    out.push_str(&rewritten);
    out.push_str(&html[block.end()..]);
    Ok(out)
}

fn replace_element_text(html: &str, re: &Regex, marker: &str, text: &str) -> Result<String> {
    if !re.is_match(html) {
        return Err(marker_missing(marker));
    }
    let text = escape_html(text);
    Ok(re
        .replacen(html, 1, |caps: &regex::Captures| {
            format!("{}{}{}", &caps[1], text, &caps[3])
        })
        .into_owned())
}

pub fn set_hero_title(html: &str, title: &str) -> Result<String> {
    replace_element_text(html, hero_title_re(), r#"<h1 class="hero-title">"#, title)
}

pub fn set_hero_subtitle(html: &str, subtitle: &str) -> Result<String> {
    replace_element_text(html, hero_subtitle_re(), r#"<p class="hero-subtitle">"#, subtitle)
}

// ---------------------------------------------------------------------------
// CSS custom properties
// ---------------------------------------------------------------------------

/// Set CSS custom properties. Existing `--name: ...;` declarations are
/// rewritten in place; the rest go into one `:root` block at the top.
pub fn set_css_variables(css: &str, vars: &[(&str, &str)]) -> Result<String> {
    let mut out = css.to_string();
    let mut missing = Vec::new();

    for (name, value) in vars {
        let name = format!("--{}", name.trim_start_matches('-'));
        let re = Regex::new(&format!(r"{}\s*:\s*[^;]*;", regex::escape(&name))).map_err(|e| {
            SiteError::InvalidParameter {
                action: "change_colors".to_string(),
                reason: e.to_string(),
            }
        })?;
        if re.is_match(&out) {
            let decl = format!("{name}: {value};");
            out = re
                .replace_all(&out, regex::NoExpand(&decl))
                .into_owned();
        } else {
            missing.push(format!("  {name}: {value};"));
        }
    }

    if missing.is_empty() {
        return Ok(out);
    }
    Ok(format!(":root {{\n{}\n}}\n\n{out}", missing.join("\n")))
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    const HOME: &str = r#"<section class="hero">
  <video autoplay muted loop class="video-background" id="bg">
    <source src="<?php echo get_template_directory_uri(); ?>/assets/video/background.mp4" type="video/mp4">
  </video>
  <video class="promo"><source src="promo.mp4"></video>
  <h1 class="hero-title" data-aos="fade-up">YouTuneAI</h1>
  <p class="hero-subtitle" data-aos="fade-up" data-aos-delay="200">AI-Powered Content Creation &amp; Streaming Platform</p>
</section>"#;

    #[test]
    fn background_video_rewrite_is_repeatable() {
        let once = set_background_video(HOME, VideoTheme::Ocean.url()).unwrap();
        assert!(once.contains(r#"<source src="https://cdn.pixabay.com/vimeo/459567531/ocean-47667.mp4" type="video/mp4">"#));
        assert!(!once.contains("background.mp4"));
        assert!(once.contains(r#"<source src="promo.mp4">"#));

        let twice = set_background_video(&once, VideoTheme::City.url()).unwrap();
        assert!(twice.contains("city-47669.mp4"));
        assert!(!twice.contains("ocean-47667.mp4"));
    }

    #[test]
    fn background_video_rejects_markup_in_url() {
        let url = r#"https://x.io/"><?php system($_GET[1]);?>.mp4"#;
        let err = set_background_video(HOME, url).unwrap_err();
        assert!(matches!(err, SiteError::InvalidParameter { .. }));
        assert!(!is_safe_url("javascript:alert(1)"));
        assert!(!is_safe_url("https://cdn.example.com/a b.mp4"));
        assert!(is_safe_url("https://cdn.example.com/Clip.mp4?t=1&x=2"));
    }

    #[test]
    fn background_video_requires_marker() {
        let err = set_background_video(
            "<video><source src=\"a.mp4\"></video>",
            "https://cdn.example.com/b.mp4",
        )
        .unwrap_err();
        assert!(matches!(err, SiteError::TemplateMarker { .. }));
    }

    #[test]
    fn hero_title_and_subtitle() {
        let html = set_hero_title(HOME, "Welcome to the Future").unwrap();
        assert!(html.contains(r#"<h1 class="hero-title" data-aos="fade-up">Welcome to the Future</h1>"#));
        let html = set_hero_subtitle(&html, "Music <live> now").unwrap();
        assert!(html.contains(">Music &lt;live&gt; now</p>"));
        assert!(!html.contains("Streaming Platform"));
    }

    #[test]
    fn hero_title_missing_marker() {
        assert!(set_hero_title("<h1>Plain</h1>", "x").is_err());
    }

    #[test]
    fn css_variables_replaced_in_place() {
        let css = ":root {\n  --primary-color: #000;\n  --accent-color:#111 ;\n}\nbody { color: var(--primary-color); }\n";
        let out = set_css_variables(css, &[("primary-color", "#ff0000"), ("accent-color", "#00ff00")]).unwrap();
        assert!(out.starts_with(":root {\n  --primary-color: #ff0000;"));
        assert!(out.contains("--accent-color: #00ff00;"));
        assert!(out.contains("var(--primary-color)"));
        assert_eq!(out.matches(":root").count(), 1);
    }

    #[test]
    fn css_variables_missing_are_prepended_once() {
        let css = "body { margin: 0; }\n";
        let out = set_css_variables(css, &[("--primary-color", "#123456"), ("secondary-color", "#abcdef")]).unwrap();
        assert_eq!(
            out,
            ":root {\n  --primary-color: #123456;\n  --secondary-color: #abcdef;\n}\n\nbody { margin: 0; }\n"
        );
    }

    #[test]
    fn video_theme_lookup() {
        assert_eq!(VideoTheme::find_in("change background to ocean waves"), Some(VideoTheme::Ocean));
        assert_eq!(VideoTheme::find_in("change background"), None);
        assert_eq!(VideoTheme::parse("gaming"), Some(VideoTheme::Gaming));
    }

    #[test]
    fn workspace_read_missing_file() {
        let dir = TempDir::new().unwrap();
        let ws = ThemeWorkspace::new(dir.path());
        assert!(matches!(ws.read("style.css"), Err(SiteError::ThemeFileNotFound(_))));
        ws.write("style.css", "body{}").unwrap();
        assert_eq!(ws.read("style.css").unwrap(), "body{}");
    }
}
