//! Page-change notifications sent when the user switches form pages.

use std::sync::OnceLock;

use log::{debug, info};
use regex::Regex;

use crate::config::RemoteConfig;
use crate::dom::Element;
use crate::error::Result;
use crate::evaluator::resolve_url;

/// Target of a page navigation link.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageLink {
    pub page: String,
    pub item: Option<String>,
    pub item_id: Option<String>,
}

fn page_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| match Regex::new(r"#p(.*?)(?:#p|$)") {
        Ok(re) => re,
        Err(e) => unreachable!("page pattern is valid: {}", e),
    })
}

impl PageLink {
    /// Read a link of the form `<a href="#p3" formbar-item=".." formbar-itemid="..">`.
    pub fn from_element(el: &Element) -> Option<Self> {
        let href = el.attr("href")?;
        let page = page_pattern().captures(href)?.get(1)?.as_str().to_string();
        Some(PageLink {
            page,
            item: el.attr("formbar-item").map(str::to_string),
            item_id: el.attr("formbar-itemid").map(str::to_string),
        })
    }
}

/// Fire-and-forget client for the page-change endpoint.
#[derive(Debug, Clone)]
pub struct PageNotifier {
    client: reqwest::Client,
    base_url: Option<reqwest::Url>,
    path: String,
}

impl PageNotifier {
    pub fn new(client: reqwest::Client, base_url: Option<&str>, path: &str) -> Result<Self> {
        let base_url = base_url.map(|raw| resolve_url(None, raw)).transpose()?;
        Ok(PageNotifier {
            client,
            base_url,
            path: path.to_string(),
        })
    }

    /// Notifier for `remote.page_change_path` under `remote.base_url`.
    pub fn from_config(client: reqwest::Client, remote: &RemoteConfig) -> Result<Self> {
        Self::new(client, remote.base_url.as_deref(), &remote.page_change_path)
    }

    /// `<path>?page=..&item=..&itemid=..`; absent attributes are sent empty.
    pub fn request_url(&self, link: &PageLink) -> Result<reqwest::Url> {
        let mut url = resolve_url(self.base_url.as_ref(), &self.path)?;
        url.query_pairs_mut()
            .append_pair("page", &link.page)
            .append_pair("item", link.item.as_deref().unwrap_or_default())
            .append_pair("itemid", link.item_id.as_deref().unwrap_or_default());
        Ok(url)
    }

    /// Spawn the request on the current runtime; the response is ignored.
    pub fn notify(&self, link: &PageLink) -> Result<tokio::task::JoinHandle<()>> {
        let url = self.request_url(link)?;
        info!("page changed to {}", link.page);
        let client = self.client.clone();
        Ok(tokio::spawn(async move {
            if let Err(err) = client.get(url).send().await {
                debug!("page-change notification failed: {}", err);
            }
        }))
    }
}
