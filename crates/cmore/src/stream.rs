use std::sync::Arc;

use reqwest::header::AUTHORIZATION;
use serde::Deserialize;
use tracing::debug;

use crate::config::Config;
use crate::error::{CmoreError, Result};
use crate::session::SessionManager;
use crate::transport::Transport;

/// Media formats the playback layer can handle when the backend offers
/// alternatives.
const ALLOWED_FORMATS: [&str; 2] = ["ism", "mpd"];
const PLAYBACK_PROTOCOL: &str = "VUDASH";

/// Normalized result of a stream resolution. Created fresh per call, never
/// persisted.
#[derive(Debug, Clone, PartialEq)]
pub struct StreamDescriptor {
    /// Playable manifest URL. Unset when a DRM-protected list payload
    /// offered no allowed format; that gap comes from the backend and is
    /// surfaced as-is rather than raised.
    pub mpd_url: Option<String>,
    pub drm_protected: bool,
    /// License-acquisition URL, present only for DRM-protected streams.
    pub license_url: Option<String>,
    /// DRM scheme identifier, present only for DRM-protected streams.
    pub drm_type: Option<String>,
}

#[derive(Debug, Deserialize)]
struct PlayDocument {
    playback: Playback,
}

#[derive(Debug, Deserialize)]
struct Playback {
    #[serde(rename = "drmProtected")]
    drm_protected: bool,
    items: PlaybackItems,
}

#[derive(Debug, Deserialize)]
struct PlaybackItems {
    item: ItemPayload,
}

/// The backend serializes one playable item as a bare object and several as
/// a list; both shapes land in the same union at the parse boundary.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum ItemPayload {
    One(PlaybackItem),
    Many(Vec<PlaybackItem>),
}

impl ItemPayload {
    /// Pick the playable item: a bare object is taken as-is, a list yields
    /// the first entry in an allowed media format.
    fn select(&self) -> Option<&PlaybackItem> {
        match self {
            ItemPayload::One(item) => Some(item),
            ItemPayload::Many(items) => items
                .iter()
                .find(|item| ALLOWED_FORMATS.contains(&item.media_format.as_str())),
        }
    }
}

#[derive(Debug, Deserialize)]
struct PlaybackItem {
    #[serde(rename = "mediaFormat", default)]
    media_format: String,
    url: String,
    license: Option<PlaybackLicense>,
}

/// License block of a playable item. The play document is a JSON rendering
/// of an XML element, hence the `@` field names.
#[derive(Debug, Deserialize)]
struct PlaybackLicense {
    #[serde(rename = "@uri")]
    uri: String,
    #[serde(rename = "@name")]
    name: String,
}

/// Resolves a playback descriptor for an asset id.
pub struct StreamResolver {
    transport: Transport,
    config: Arc<Config>,
    session: SessionManager,
}

impl StreamResolver {
    pub(crate) fn new(transport: Transport, config: Arc<Config>, session: SessionManager) -> Self {
        Self {
            transport,
            config,
            session,
        }
    }

    /// Fetch and normalize the stream descriptor for `video_id`.
    pub async fn get_stream(&self, video_id: &str) -> Result<StreamDescriptor> {
        let url = format!(
            "{}api/tve_web/asset/{}/play.json",
            self.config.links.vimond_rest_api, video_id
        );
        let credentials = self.session.get_credentials().await?;
        let request = self
            .transport
            .get(&url)
            .query(&[("protocol", PLAYBACK_PROTOCOL)])
            .header(
                AUTHORIZATION,
                format!("Bearer {}", credentials.vimond_token.unwrap_or_default()),
            );
        let body = self.transport.execute(request).await?;
        let descriptor = parse_stream(&body)?;
        debug!(video_id, drm = descriptor.drm_protected, "stream resolved");
        Ok(descriptor)
    }
}

fn parse_stream(body: &str) -> Result<StreamDescriptor> {
    let playback = serde_json::from_str::<PlayDocument>(body)?.playback;

    let mut descriptor = StreamDescriptor {
        mpd_url: None,
        drm_protected: playback.drm_protected,
        license_url: None,
        drm_type: None,
    };

    let Some(item) = playback.items.item.select() else {
        // A DRM-protected list can offer no allowed format; the descriptor
        // is returned with its URL fields empty in that case.
        return Ok(descriptor);
    };

    descriptor.mpd_url = Some(item.url.clone());
    if descriptor.drm_protected {
        let license = item
            .license
            .as_ref()
            .ok_or_else(|| CmoreError::payload("license missing from DRM-protected item"))?;
        descriptor.license_url = Some(license.uri.clone());
        descriptor.drm_type = Some(license.name.clone());
    }
    Ok(descriptor)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn list_payload_selects_first_allowed_format() {
        let body = r#"{"playback":{"drmProtected":false,"items":{"item":[
            {"mediaFormat":"hls","url":"a"},
            {"mediaFormat":"mpd","url":"b"},
            {"mediaFormat":"ism","url":"c"}
        ]}}}"#;

        let descriptor = parse_stream(body).unwrap();
        assert_eq!(descriptor.mpd_url.as_deref(), Some("b"));
        assert!(!descriptor.drm_protected);
        assert_eq!(descriptor.license_url, None);
        assert_eq!(descriptor.drm_type, None);
    }

    #[test]
    fn single_object_is_used_without_format_filtering() {
        let body = r#"{"playback":{"drmProtected":true,"items":{"item":
            {"mediaFormat":"hls","url":"manifest","license":{"@uri":"https://lic.example","@name":"widevine"}}
        }}}"#;

        let descriptor = parse_stream(body).unwrap();
        assert_eq!(descriptor.mpd_url.as_deref(), Some("manifest"));
        assert!(descriptor.drm_protected);
        assert_eq!(descriptor.license_url.as_deref(), Some("https://lic.example"));
        assert_eq!(descriptor.drm_type.as_deref(), Some("widevine"));
    }

    #[test]
    fn drm_list_without_allowed_format_yields_empty_fields() {
        let body = r#"{"playback":{"drmProtected":true,"items":{"item":[
            {"mediaFormat":"hls","url":"a"}
        ]}}}"#;

        let descriptor = parse_stream(body).unwrap();
        assert!(descriptor.drm_protected);
        assert_eq!(descriptor.mpd_url, None);
        assert_eq!(descriptor.license_url, None);
        assert_eq!(descriptor.drm_type, None);
    }

    #[test]
    fn drm_item_without_license_block_is_an_error() {
        let body = r#"{"playback":{"drmProtected":true,"items":{"item":
            {"mediaFormat":"mpd","url":"manifest"}
        }}}"#;

        assert!(matches!(
            parse_stream(body),
            Err(CmoreError::UnexpectedPayload(_))
        ));
    }

    #[test]
    fn license_fields_are_ignored_without_drm() {
        let body = r#"{"playback":{"drmProtected":false,"items":{"item":[
            {"mediaFormat":"mpd","url":"b","license":{"@uri":"u","@name":"n"}}
        ]}}}"#;

        let descriptor = parse_stream(body).unwrap();
        assert_eq!(descriptor.mpd_url.as_deref(), Some("b"));
        assert_eq!(descriptor.license_url, None);
    }
}
