//! Common test utilities for coub-archive integration tests

use async_trait::async_trait;
use coub_archive::{CoubAsset, Encoder, RenderPlan};
use serde_json::{Value, json};
use std::path::Path;
use std::sync::Mutex;
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

/// Encoder that writes the video URL into the destination file
#[derive(Default)]
pub struct UrlEncoder {
    /// Every (permalink, plan) pair this encoder was asked to write
    pub writes: Mutex<Vec<(String, RenderPlan)>>,
}

#[async_trait]
impl Encoder for UrlEncoder {
    async fn write(
        &self,
        asset: &CoubAsset,
        plan: &RenderPlan,
        dest: &Path,
    ) -> coub_archive::Result<()> {
        self.writes
            .lock()
            .unwrap()
            .push((asset.permalink.clone(), plan.clone()));
        tokio::fs::write(dest, asset.video_url.as_bytes()).await?;
        Ok(())
    }

    fn name(&self) -> &'static str {
        "url"
    }
}

/// Timeline record as the platform returns it
pub fn coub_json(permalink: &str, created_at: &str, has_sound: bool) -> Value {
    json!({
        "id": permalink.len(),
        "type": "Coub::Simple",
        "permalink": permalink,
        "title": format!("coub {}", permalink),
        "created_at": created_at,
        "has_sound": has_sound,
    })
}

/// Mount one timeline page for `user`
pub async fn mount_timeline_page(
    server: &MockServer,
    user: &str,
    page: u32,
    total_pages: u32,
    coubs: Vec<Value>,
) {
    Mock::given(method("GET"))
        .and(path(format!("/api/v2/timeline/channel/{}", user)))
        .and(query_param("page", page.to_string()))
        .and(query_param("per_page", "25"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "page": page,
            "total_pages": total_pages,
            "per_page": 25,
            "coubs": coubs,
        })))
        .mount(server)
        .await;
}

/// Mount the per-coub details endpoint
pub async fn mount_coub_details(server: &MockServer, permalink: &str, with_audio: bool) {
    let mut html5 = json!({
        "video": { "high": { "url": format!("https://cdn.example/{}.mp4", permalink) } }
    });
    if with_audio {
        html5["audio"] = json!({ "high": { "url": format!("https://cdn.example/{}.mp3", permalink) } });
    }
    Mock::given(method("GET"))
        .and(path(format!("/api/v2/coubs/{}", permalink)))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(json!({ "file_versions": { "html5": html5 } })),
        )
        .mount(server)
        .await;
}
