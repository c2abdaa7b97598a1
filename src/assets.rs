//! The script bundle served for `?_debug_bar=js`.
//!
//! DESIGN
//! ======
//! One JavaScript response carries everything the client needs. CSS is
//! minified and injected through a `<style>` element that copies the nonce
//! of the script that loaded it, so the bundle itself stays cacheable and
//! nonce-free. Every JS source runs in its own IIFE.
//!
//! Custom files are read once at construction; a missing file is a
//! configuration error, not a per-request one.

use std::path::Path;
use std::sync::LazyLock;

use regex::Regex;
use serde_json::Value;

use crate::config::BarConfig;
use crate::error::BarError;
use crate::loader::encode_payload;

const BAR_CSS: &str = include_str!("../assets/bar.css");
const BAR_JS: &str = include_str!("../assets/bar.js");

static CSS_COMMENT: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?s)/\*.*?\*/").expect("valid regex"));
static CSS_SPACE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\s+").expect("valid regex"));
static CSS_PUNCT_SPACE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\s*([{};:,>])\s*").expect("valid regex"));

/// Strip comments and insignificant whitespace.
#[must_use]
pub fn minify_css(css: &str) -> String {
    let css = CSS_COMMENT.replace_all(css, "");
    let css = CSS_SPACE.replace_all(&css, " ");
    let css = CSS_PUNCT_SPACE.replace_all(&css, "$1");
    css.replace(";}", "}").trim().to_owned()
}

#[derive(Debug, Clone)]
pub struct AssetBundle {
    script: String,
}

impl AssetBundle {
    /// Built-in assets followed by the configured custom files.
    pub fn load(config: &BarConfig) -> Result<Self, BarError> {
        let mut css = vec![BAR_CSS.to_owned()];
        for path in &config.custom_css_files {
            css.push(read_lossy(path)?);
        }
        let mut js = vec![BAR_JS.to_owned()];
        for path in &config.custom_js_files {
            js.push(read_lossy(path)?);
        }
        Ok(Self::from_sources(&css, &js))
    }

    #[must_use]
    pub fn from_sources(css: &[String], js: &[String]) -> Self {
        let mut script = String::new();

        let styles = css.iter().map(|s| minify_css(s)).collect::<Vec<_>>().join("\n");
        if !styles.is_empty() {
            script.push_str("(function(){\n");
            script.push_str("var s=document.currentScript,el=document.createElement('style');\n");
            script.push_str("if(s){el.setAttribute('nonce',s.nonce||s.getAttribute('nonce')||'');}\n");
            script.push_str("el.className='debug-bar-style';\n");
            script.push_str(&format!("el.textContent={};\n", encode_payload(&Value::String(styles))));
            script.push_str("document.head.appendChild(el);\n");
            script.push_str("})();\n");
        }

        for source in js {
            script.push_str("(function(){\n");
            script.push_str(source);
            if !source.ends_with('\n') {
                script.push('\n');
            }
            script.push_str("})();\n");
        }

        Self { script }
    }

    /// The complete JavaScript response body.
    #[must_use]
    pub fn script(&self) -> &str {
        &self.script
    }
}

fn read_lossy(path: &Path) -> Result<String, BarError> {
    let bytes = std::fs::read(path).map_err(|source| BarError::Asset { path: path.to_path_buf(), source })?;
    Ok(String::from_utf8_lossy(&bytes).into_owned())
}

#[cfg(test)]
#[path = "assets_test.rs"]
mod tests;
