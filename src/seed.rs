// ABOUTME: Load-generating client that drives a running wikisync server over HTTP.
// ABOUTME: Seeds "Red" pages, then walks each through Yellow and Blue to deletion.

use anyhow::{Context, Result, bail};
use serde::Deserialize;
use serde_json::json;
use wikisync_core::Page;

/// What the seeder does next to a page with a given title.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Step {
    Retitle(&'static str),
    Delete,
}

/// Red pages turn Yellow, Yellow turn Blue, and anything else is deleted.
pub fn next_step(title: &str) -> Step {
    match title {
        "Red" => Step::Retitle("Yellow"),
        "Yellow" => Step::Retitle("Blue"),
        _ => Step::Delete,
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct Envelope {
    status: String,
    #[serde(default)]
    error_message: Option<String>,
}

pub struct Seeder {
    client: reqwest::Client,
    base_url: String,
}

impl Seeder {
    pub fn new(base_url: &str) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    /// Reset the server, insert `pages` pages, then advance them until none remain.
    /// Returns the number of mutations issued.
    pub async fn run(&self, pages: usize) -> Result<usize> {
        self.expect_success(self.client.get(self.url("/reset")).send().await?)
            .await
            .context("reset failed")?;

        let mut mutations = 0;
        for i in 0..pages {
            self.post("/post/", json!({ "Title": "Red", "Body": format!("#{i}") }))
                .await?;
            mutations += 1;
        }
        tracing::info!(pages, "seeded pages");

        let mut cursor = 0usize;
        loop {
            let live: Vec<Page> = self
                .client
                .get(self.url("/get/"))
                .send()
                .await?
                .error_for_status()?
                .json()
                .await
                .context("listing pages")?;
            if live.is_empty() {
                break;
            }

            let page = &live[cursor % live.len()];
            cursor += 1;
            match next_step(&page.title) {
                Step::Retitle(title) => {
                    self.post(
                        &format!("/post/{}", page.key),
                        json!({ "Title": title, "Body": page.body }),
                    )
                    .await?;
                }
                Step::Delete => {
                    let resp = self
                        .client
                        .get(self.url(&format!("/delete/{}", page.key)))
                        .send()
                        .await?;
                    self.expect_success(resp).await?;
                }
            }
            mutations += 1;
        }

        tracing::info!(mutations, "seeding finished");
        Ok(mutations)
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    async fn post(&self, path: &str, body: serde_json::Value) -> Result<()> {
        let resp = self.client.post(self.url(path)).json(&body).send().await?;
        self.expect_success(resp).await
    }

    async fn expect_success(&self, resp: reqwest::Response) -> Result<()> {
        let envelope: Envelope = resp.json().await.context("decoding status envelope")?;
        if envelope.status != "success" {
            bail!(
                "server returned {}: {}",
                envelope.status,
                envelope.error_message.unwrap_or_default()
            );
        }
        Ok(())
    }
}
