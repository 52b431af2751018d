use std::time::Duration;

use reqwest::header::RETRY_AFTER;
use reqwest_middleware::ClientWithMiddleware;
use serde::Deserialize;

use crate::{
    auth::CredentialProvider,
    yt::{HostError, PlaylistHost, VideoInfo},
};

/// YouTube Data API v3 client. Every call is authenticated with a bearer
/// token freshly obtained from the credential provider, which handles
/// caching and silent refresh.
pub struct YouTubeClient<P: CredentialProvider> {
    client: ClientWithMiddleware,
    credentials: P,
    base_url: String,
}

impl<P: CredentialProvider> YouTubeClient<P> {
    const PAGE_SIZE: &'static str = "50";

    pub fn new(credentials: P) -> anyhow::Result<Self> {
        Ok(Self {
            client: crate::http::retrying_client(Duration::from_secs(30))?,
            credentials,
            base_url: "https://www.googleapis.com/youtube/v3".into(),
        })
    }

    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = url.into();
        self
    }

    async fn check(resp: reqwest::Response) -> Result<reqwest::Response, HostError> {
        let status = resp.status();
        if status.is_success() {
            return Ok(resp);
        }

        let retry_after = resp
            .headers()
            .get(RETRY_AFTER)
            .and_then(|v| v.to_str().ok())
            .and_then(|s| s.parse::<u64>().ok())
            .map(Duration::from_secs);
        let status = status.as_u16();
        let message = resp.text().await.unwrap_or_default();

        match status {
            401 => Err(HostError::Auth(message)),
            429 => Err(HostError::RateLimited { retry_after }),
            403 if message.contains("quotaExceeded") || message.contains("rateLimitExceeded") => {
                Err(HostError::RateLimited { retry_after })
            }
            403 => Err(HostError::Auth(message)),
            status => Err(HostError::Api { status, message }),
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PlaylistListResponse {
    #[serde(default)]
    items: Vec<PlaylistResource>,
    next_page_token: Option<String>,
}

#[derive(Debug, Deserialize)]
struct PlaylistResource {
    id: String,
    snippet: PlaylistSnippet,
}

#[derive(Debug, Deserialize)]
struct PlaylistSnippet {
    title: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PlaylistItemListResponse {
    #[serde(default)]
    items: Vec<PlaylistItemResource>,
    next_page_token: Option<String>,
}

#[derive(Debug, Deserialize)]
struct PlaylistItemResource {
    snippet: PlaylistItemSnippet,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PlaylistItemSnippet {
    resource_id: ResourceId,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ResourceId {
    video_id: String,
}

#[derive(Debug, Deserialize)]
struct VideoListResponse {
    #[serde(default)]
    items: Vec<VideoResource>,
}

#[derive(Debug, Deserialize)]
struct VideoResource {
    snippet: VideoSnippet,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct VideoSnippet {
    category_id: String,
}

impl<P: CredentialProvider + Send + Sync> PlaylistHost for YouTubeClient<P> {
    async fn find_playlist(&self, title: &str) -> Result<Option<String>, HostError> {
        let token = self.credentials.obtain().await?;
        let mut page_token: Option<String> = None;

        loop {
            let mut request = self
                .client
                .get(format!("{}/playlists", self.base_url))
                .bearer_auth(&token)
                .query(&[
                    ("part", "snippet"),
                    ("mine", "true"),
                    ("maxResults", Self::PAGE_SIZE),
                ]);
            if let Some(ref page) = page_token {
                request = request.query(&[("pageToken", page.as_str())]);
            }

            let resp = request
                .send()
                .await
                .inspect_err(|e| tracing::error!(error = %e, "Failed to list playlists"))?;
            let page = Self::check(resp).await?.json::<PlaylistListResponse>().await?;

            if let Some(found) = page.items.iter().find(|p| p.snippet.title == title) {
                return Ok(Some(found.id.clone()));
            }
            match page.next_page_token {
                Some(next) => page_token = Some(next),
                None => return Ok(None),
            }
        }
    }

    async fn create_playlist(&self, title: &str) -> Result<String, HostError> {
        let token = self.credentials.obtain().await?;
        let body = serde_json::json!({
            "snippet": {
                "title": title,
                "description": "Weekly playlist generated by playlist-pulse",
            },
            "status": { "privacyStatus": "public" },
        });

        let resp = self
            .client
            .post(format!("{}/playlists", self.base_url))
            .bearer_auth(&token)
            .query(&[("part", "snippet,status")])
            .json(&body)
            .send()
            .await
            .inspect_err(|e| tracing::error!(error = %e, "Failed to create playlist"))?;

        #[derive(Debug, Deserialize)]
        struct Created {
            id: String,
        }

        let created = Self::check(resp).await?.json::<Created>().await?;
        Ok(created.id)
    }

    async fn playlist_items(&self, playlist_id: &str) -> Result<Vec<String>, HostError> {
        let token = self.credentials.obtain().await?;
        let mut video_ids = Vec::new();
        let mut page_token: Option<String> = None;

        loop {
            let mut request = self
                .client
                .get(format!("{}/playlistItems", self.base_url))
                .bearer_auth(&token)
                .query(&[
                    ("part", "snippet"),
                    ("playlistId", playlist_id),
                    ("maxResults", Self::PAGE_SIZE),
                ]);
            if let Some(ref page) = page_token {
                request = request.query(&[("pageToken", page.as_str())]);
            }

            let resp = request
                .send()
                .await
                .inspect_err(|e| tracing::error!(error = %e, "Failed to list playlist items"))?;
            let page = Self::check(resp)
                .await?
                .json::<PlaylistItemListResponse>()
                .await?;

            video_ids.extend(page.items.into_iter().map(|i| i.snippet.resource_id.video_id));
            match page.next_page_token {
                Some(next) => page_token = Some(next),
                None => return Ok(video_ids),
            }
        }
    }

    async fn insert_item(&self, playlist_id: &str, video_id: &str) -> Result<(), HostError> {
        let token = self.credentials.obtain().await?;
        let body = serde_json::json!({
            "snippet": {
                "playlistId": playlist_id,
                "resourceId": { "kind": "youtube#video", "videoId": video_id },
            },
        });

        let resp = self
            .client
            .post(format!("{}/playlistItems", self.base_url))
            .bearer_auth(&token)
            .query(&[("part", "snippet")])
            .json(&body)
            .send()
            .await
            .inspect_err(|e| tracing::error!(error = %e, "Failed to insert playlist item"))?;

        match Self::check(resp).await {
            // YouTube reports a deleted or never-existing video on insert as 404
            Err(HostError::Api { status: 404, .. }) => {
                Err(HostError::InvalidVideo(video_id.to_string()))
            }
            Err(e) => Err(e),
            Ok(_) => Ok(()),
        }
    }

    async fn lookup_video(&self, video_id: &str) -> Result<Option<VideoInfo>, HostError> {
        let token = self.credentials.obtain().await?;
        let resp = self
            .client
            .get(format!("{}/videos", self.base_url))
            .bearer_auth(&token)
            .query(&[("part", "snippet"), ("id", video_id)])
            .send()
            .await
            .inspect_err(|e| tracing::error!(error = %e, "Failed to look up video"))?;

        let listing = Self::check(resp).await?.json::<VideoListResponse>().await?;
        Ok(listing.items.into_iter().next().map(|v| VideoInfo {
            category_id: v.snippet.category_id,
        }))
    }
}
