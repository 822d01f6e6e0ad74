//! Track resolver
//!
//! Normalizes provider payloads into [`CanonicalTrack`]s. Two payload shapes
//! are understood:
//! - direct-media payloads (JioSaavn mirror) with several quality URLs
//! - opaque-URI payloads (Spotify Web API) that only carry a `spotify:` URI
//!
//! Both implement [`TrackPayload`], so the selection rules live in one place.

use crate::error::{PlaybackError, Result};
use crate::types::{CanonicalTrack, MediaRef};
use serde::{Deserialize, Serialize};

/// Artist name used when the payload declares none
pub const UNKNOWN_ARTIST: &str = "Unknown Artist";

/// Title used when the payload declares none
pub const UNKNOWN_TITLE: &str = "Unknown Title";

/// A declared artwork image
#[derive(Debug, Clone, PartialEq)]
pub struct ArtworkCandidate {
    pub url: String,
    /// Pixel area, if the payload declares dimensions
    pub pixels: Option<u64>,
}

/// A declared direct media URL
#[derive(Debug, Clone, PartialEq)]
pub struct MediaCandidate {
    pub url: String,
    /// Bitrate in kbps, if the payload declares it
    pub bitrate_kbps: Option<u32>,
}

/// Capability view over a raw track payload
///
/// Payloads with direct media URLs override [`TrackPayload::direct_media`];
/// payloads with an opaque play URI override [`TrackPayload::opaque_uri`].
pub trait TrackPayload {
    fn track_id(&self) -> Option<&str>;
    fn title(&self) -> Option<&str>;
    fn artist_names(&self) -> Vec<String>;
    fn artwork(&self) -> Vec<ArtworkCandidate>;
    fn duration_ms(&self) -> Option<u64>;

    fn direct_media(&self) -> Vec<MediaCandidate> {
        Vec::new()
    }

    fn opaque_uri(&self) -> Option<&str> {
        None
    }
}

// =============================================================================
// Direct-media payload (JioSaavn mirror)
// =============================================================================

/// `{quality, url}` entry used for both images and download links
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct QualityUrl {
    #[serde(default)]
    pub quality: String,
    #[serde(default)]
    pub url: String,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct NamedRef {
    #[serde(default)]
    pub name: String,
}

/// Artist field: either a structured list or a preformatted string
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(untagged)]
pub enum SaavnArtists {
    Listed {
        #[serde(default)]
        primary: Vec<NamedRef>,
    },
    Text(String),
}

/// Numbers sometimes arrive as strings in this API
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(untagged)]
pub enum Lenient {
    Number(f64),
    Text(String),
}

impl Lenient {
    fn as_f64(&self) -> Option<f64> {
        match self {
            Lenient::Number(n) => Some(*n),
            Lenient::Text(s) => s.trim().parse().ok(),
        }
    }
}

/// Song payload exposing multiple-quality direct media URLs
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DirectMediaTrack {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
    /// Duration in seconds
    #[serde(default)]
    pub duration: Option<Lenient>,
    #[serde(default)]
    pub artists: Option<SaavnArtists>,
    #[serde(default)]
    pub primary_artists: Option<String>,
    #[serde(default)]
    pub image: Vec<QualityUrl>,
    #[serde(default)]
    pub download_url: Vec<QualityUrl>,
}

impl TrackPayload for DirectMediaTrack {
    fn track_id(&self) -> Option<&str> {
        self.id.as_deref()
    }

    fn title(&self) -> Option<&str> {
        self.name.as_deref()
    }

    fn artist_names(&self) -> Vec<String> {
        match &self.artists {
            Some(SaavnArtists::Listed { primary }) if !primary.is_empty() => {
                primary.iter().map(|a| a.name.clone()).collect()
            }
            Some(SaavnArtists::Text(text)) => split_artist_text(text),
            _ => self
                .primary_artists
                .as_deref()
                .map(split_artist_text)
                .unwrap_or_default(),
        }
    }

    fn artwork(&self) -> Vec<ArtworkCandidate> {
        self.image
            .iter()
            .map(|img| ArtworkCandidate {
                url: img.url.clone(),
                pixels: parse_dimensions(&img.quality),
            })
            .collect()
    }

    fn duration_ms(&self) -> Option<u64> {
        self.duration
            .as_ref()
            .and_then(Lenient::as_f64)
            .filter(|secs| *secs >= 0.0)
            .map(|secs| (secs * 1000.0).round() as u64)
    }

    fn direct_media(&self) -> Vec<MediaCandidate> {
        self.download_url
            .iter()
            .map(|d| MediaCandidate {
                url: d.url.clone(),
                bitrate_kbps: parse_bitrate(&d.quality),
            })
            .collect()
    }
}

// =============================================================================
// Opaque-URI payload (Spotify Web API)
// =============================================================================

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct SpotifyImage {
    pub url: String,
    #[serde(default)]
    pub width: Option<u64>,
    #[serde(default)]
    pub height: Option<u64>,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct SpotifyAlbumRef {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub images: Vec<SpotifyImage>,
}

/// Track payload exposing only an opaque provider URI
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct OpaqueUriTrack {
    pub uri: String,
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub duration_ms: Option<u64>,
    #[serde(default)]
    pub artists: Vec<NamedRef>,
    #[serde(default)]
    pub album: Option<SpotifyAlbumRef>,
}

impl TrackPayload for OpaqueUriTrack {
    fn track_id(&self) -> Option<&str> {
        self.id.as_deref()
    }

    fn title(&self) -> Option<&str> {
        self.name.as_deref()
    }

    fn artist_names(&self) -> Vec<String> {
        self.artists.iter().map(|a| a.name.clone()).collect()
    }

    fn artwork(&self) -> Vec<ArtworkCandidate> {
        self.album
            .iter()
            .flat_map(|album| album.images.iter())
            .map(|img| ArtworkCandidate {
                url: img.url.clone(),
                pixels: img
                    .width
                    .zip(img.height)
                    .map(|(w, h)| w.saturating_mul(h)),
            })
            .collect()
    }

    fn duration_ms(&self) -> Option<u64> {
        self.duration_ms
    }

    fn opaque_uri(&self) -> Option<&str> {
        Some(self.uri.as_str())
    }
}

// =============================================================================
// Untagged wrapper
// =============================================================================

/// Any raw track payload the catalog can return
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(untagged)]
pub enum RawTrack {
    OpaqueUri(OpaqueUriTrack),
    DirectMedia(DirectMediaTrack),
}

impl RawTrack {
    fn payload(&self) -> &dyn TrackPayload {
        match self {
            RawTrack::OpaqueUri(t) => t,
            RawTrack::DirectMedia(t) => t,
        }
    }
}

impl TrackPayload for RawTrack {
    fn track_id(&self) -> Option<&str> {
        self.payload().track_id()
    }

    fn title(&self) -> Option<&str> {
        self.payload().title()
    }

    fn artist_names(&self) -> Vec<String> {
        self.payload().artist_names()
    }

    fn artwork(&self) -> Vec<ArtworkCandidate> {
        self.payload().artwork()
    }

    fn duration_ms(&self) -> Option<u64> {
        self.payload().duration_ms()
    }

    fn direct_media(&self) -> Vec<MediaCandidate> {
        self.payload().direct_media()
    }

    fn opaque_uri(&self) -> Option<&str> {
        self.payload().opaque_uri()
    }
}

// =============================================================================
// Resolution
// =============================================================================

/// Resolve a payload into a canonical track
///
/// Fails only when there is nothing to play. Missing optional fields get
/// defaults (`"Unknown Artist"`, no artwork).
pub fn resolve<P: TrackPayload + ?Sized>(payload: &P) -> Result<CanonicalTrack> {
    let media_ref = select_media(payload).ok_or_else(|| {
        PlaybackError::MalformedTrack(format!(
            "track {} has neither a media URL nor a play URI",
            payload.track_id().unwrap_or("<unknown>")
        ))
    })?;

    let id = payload
        .track_id()
        .filter(|id| !id.is_empty())
        .map(str::to_string)
        .unwrap_or_else(|| media_ref.as_str().to_string());

    let title = payload
        .title()
        .map(decode_entities)
        .filter(|t| !t.trim().is_empty())
        .unwrap_or_else(|| UNKNOWN_TITLE.to_string());

    let mut artist_names: Vec<String> = payload
        .artist_names()
        .iter()
        .map(|name| decode_entities(name))
        .filter(|name| !name.trim().is_empty())
        .collect();
    if artist_names.is_empty() {
        artist_names.push(UNKNOWN_ARTIST.to_string());
    }

    Ok(CanonicalTrack {
        id,
        title,
        artist_names,
        artwork_url: select_artwork(&payload.artwork()),
        media_ref,
        duration_ms: payload.duration_ms().unwrap_or(0),
    })
}

/// Resolve a JSON value of either known shape
pub fn resolve_value(value: &serde_json::Value) -> Result<CanonicalTrack> {
    let raw: RawTrack = serde_json::from_value(value.clone())
        .map_err(|e| PlaybackError::MalformedTrack(e.to_string()))?;
    resolve(&raw)
}

/// Resolve a list, skipping entries that cannot be played
pub fn resolve_all<'a, P, I>(payloads: I) -> Vec<CanonicalTrack>
where
    P: TrackPayload + 'a,
    I: IntoIterator<Item = &'a P>,
{
    payloads
        .into_iter()
        .filter_map(|payload| match resolve(payload) {
            Ok(track) => Some(track),
            Err(e) => {
                tracing::warn!(error = %e, "Skipping unplayable track");
                None
            }
        })
        .collect()
}

fn select_media<P: TrackPayload + ?Sized>(payload: &P) -> Option<MediaRef> {
    let candidates: Vec<MediaCandidate> = payload
        .direct_media()
        .into_iter()
        .filter(|c| !c.url.trim().is_empty())
        .collect();

    let best = candidates
        .iter()
        .filter(|c| c.bitrate_kbps.is_some())
        .max_by_key(|c| c.bitrate_kbps)
        .or_else(|| candidates.first());

    if let Some(best) = best {
        return Some(MediaRef::Url(upgrade_scheme(&best.url)));
    }

    payload
        .opaque_uri()
        .filter(|uri| !uri.trim().is_empty())
        .map(|uri| MediaRef::Uri(uri.to_string()))
}

fn select_artwork(candidates: &[ArtworkCandidate]) -> Option<String> {
    let usable: Vec<&ArtworkCandidate> =
        candidates.iter().filter(|c| !c.url.trim().is_empty()).collect();

    usable
        .iter()
        .filter(|c| c.pixels.is_some())
        .max_by_key(|c| c.pixels)
        .or_else(|| usable.first())
        .map(|c| upgrade_scheme(&c.url))
}

/// "320kbps" -> 320
fn parse_bitrate(quality: &str) -> Option<u32> {
    let digits: String = quality
        .trim()
        .chars()
        .take_while(|c| c.is_ascii_digit())
        .collect();
    digits.parse().ok()
}

/// "500x500" -> 250000
fn parse_dimensions(quality: &str) -> Option<u64> {
    let (w, h) = quality.trim().split_once(['x', 'X'])?;
    let (w, h) = (w.trim().parse::<u64>().ok()?, h.trim().parse::<u64>().ok()?);
    Some(w.saturating_mul(h))
}

fn split_artist_text(text: &str) -> Vec<String> {
    text.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

fn upgrade_scheme(url: &str) -> String {
    match url.strip_prefix("http://") {
        Some(rest) => format!("https://{rest}"),
        None => url.to_string(),
    }
}

fn decode_entities(text: &str) -> String {
    text.replace("&quot;", "\"")
        .replace("&#039;", "'")
        .replace("&#39;", "'")
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&amp;", "&")
}
