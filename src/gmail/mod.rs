use anyhow::{Context, Result, anyhow, bail};
use reqwest::blocking::Client;
use serde::Deserialize;

use crate::extract::MimePart;
use crate::pipeline::Fetch;

const GMAIL_API: &str = "https://gmail.googleapis.com";

/// Minimal blocking client for the Gmail REST API, scoped to what the
/// pipeline needs: label lookup, paginated listing, full-message fetch.
pub struct GmailClient {
    http: Client,
    access_token: String,
    base_url: String,
}

#[derive(Debug, Deserialize)]
struct LabelList {
    labels: Option<Vec<Label>>,
}

#[derive(Debug, Deserialize)]
pub struct Label {
    pub id: String,
    pub name: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct MessagePage {
    messages: Option<Vec<MessageRef>>,
    next_page_token: Option<String>,
}

#[derive(Debug, Deserialize)]
struct MessageRef {
    id: String,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Message {
    pub id: String,
    pub payload: Option<MimePart>,
}

impl GmailClient {
    pub fn new(access_token: impl Into<String>) -> Self {
        Self::with_base_url(access_token, GMAIL_API)
    }

    /// Point the client somewhere else (tests use a local mock server).
    pub fn with_base_url(access_token: impl Into<String>, base_url: impl Into<String>) -> Self {
        Self {
            http: Client::new(),
            access_token: access_token.into(),
            base_url: base_url.into(),
        }
    }

    fn get_json<T: serde::de::DeserializeOwned>(
        &self,
        path: &str,
        query: &[(&str, &str)],
    ) -> Result<T> {
        let url = format!("{}{}", self.base_url, path);
        let resp = self
            .http
            .get(&url)
            .query(query)
            .bearer_auth(&self.access_token)
            .send()
            .with_context(|| format!("GET {url}"))?;
        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().unwrap_or_default();
            bail!("GET {url} failed: {status} ({body})");
        }
        resp.json()
            .with_context(|| format!("decoding response of GET {url}"))
    }

    /// Map a human-readable label name to its opaque id. A missing label is
    /// fatal: nothing can be listed without one.
    pub fn resolve_label(&self, name: &str) -> Result<String> {
        let list: LabelList = self.get_json("/gmail/v1/users/me/labels", &[])?;
        list.labels
            .unwrap_or_default()
            .into_iter()
            .find(|l| l.name == name)
            .map(|l| l.id)
            .ok_or_else(|| anyhow!("Label '{name}' not found"))
    }

    /// Lazy id sequence over all messages carrying the label, following
    /// `nextPageToken` until the listing is exhausted.
    pub fn messages(&self, label_id: &str) -> MessageIds<'_> {
        MessageIds {
            client: self,
            label_id: label_id.to_string(),
            buffered: Vec::new(),
            next_page_token: None,
            first_page_pending: true,
            done: false,
        }
    }

    fn list_page(&self, label_id: &str, page_token: Option<&str>) -> Result<MessagePage> {
        let mut query = vec![("labelIds", label_id)];
        if let Some(tok) = page_token {
            query.push(("pageToken", tok));
        }
        self.get_json("/gmail/v1/users/me/messages", &query)
    }

    pub fn get_message(&self, id: &str) -> Result<Message> {
        self.get_json(
            &format!("/gmail/v1/users/me/messages/{id}"),
            &[("format", "full")],
        )
    }
}

impl Fetch for GmailClient {
    fn fetch(&self, id: &str) -> Result<Message> {
        self.get_message(id)
    }
}

/// Iterator over message ids, page order then in-page order. A listing
/// failure is yielded once as `Err` and ends the sequence.
pub struct MessageIds<'a> {
    client: &'a GmailClient,
    label_id: String,
    // current page, reversed so pop() yields in-page order
    buffered: Vec<String>,
    next_page_token: Option<String>,
    first_page_pending: bool,
    done: bool,
}

impl Iterator for MessageIds<'_> {
    type Item = Result<String>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            if let Some(id) = self.buffered.pop() {
                return Some(Ok(id));
            }
            if self.done {
                return None;
            }
            if !self.first_page_pending && self.next_page_token.is_none() {
                self.done = true;
                return None;
            }

            let page = match self
                .client
                .list_page(&self.label_id, self.next_page_token.as_deref())
            {
                Ok(p) => p,
                Err(e) => {
                    self.done = true;
                    return Some(Err(e));
                }
            };
            self.first_page_pending = false;
            self.next_page_token = page.next_page_token;

            let mut ids: Vec<String> = page
                .messages
                .unwrap_or_default()
                .into_iter()
                .map(|m| m.id)
                .collect();
            ids.reverse();
            self.buffered = ids;
        }
    }
}
