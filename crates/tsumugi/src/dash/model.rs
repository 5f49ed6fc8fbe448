//! Typed view of the parts of an MPD manifest the downloader reads.
//!
//! Numeric attributes are kept as text: a malformed `bandwidth` must not reject the whole
//! manifest, and template timing is only validated when a plan actually needs it.

use serde::Deserialize;

use super::duration::parse_xs_duration;
use crate::error::{TsumugiError, TsumugiResult};

#[derive(Debug, Default, Deserialize, Clone)]
#[serde(rename = "MPD", default)]
pub struct Manifest {
    #[serde(rename = "@type")]
    pub mpd_type: Option<String>,
    #[serde(rename = "@mediaPresentationDuration")]
    pub media_presentation_duration: Option<String>,
    #[serde(rename = "BaseURL")]
    pub base_url: Option<String>,
    #[serde(rename = "Period")]
    pub periods: Vec<Period>,
}

#[derive(Debug, Default, Deserialize, Clone)]
#[serde(default)]
pub struct Period {
    #[serde(rename = "@id")]
    pub id: Option<String>,
    #[serde(rename = "AdaptationSet")]
    pub adaptations: Vec<AdaptationSet>,
}

#[derive(Debug, Default, Deserialize, Clone)]
#[serde(default)]
pub struct AdaptationSet {
    #[serde(rename = "@id")]
    pub id: Option<String>,
    // eg "audio", "video"
    #[serde(rename = "@contentType")]
    pub content_type: Option<String>,
    #[serde(rename = "@mimeType")]
    pub mime_type: Option<String>,
    #[serde(rename = "SegmentTemplate")]
    pub segment_template: Option<SegmentTemplate>,
    #[serde(rename = "ContentProtection")]
    pub content_protection: Vec<ContentProtection>,
    #[serde(rename = "Representation")]
    pub representations: Vec<Representation>,
}

#[derive(Debug, Default, Deserialize, Clone)]
#[serde(default)]
pub struct Representation {
    #[serde(rename = "@id")]
    pub id: Option<String>,
    #[serde(rename = "@bandwidth")]
    pub bandwidth: Option<String>,
    /// An RFC6381 string (eg. "mp4a.40.2")
    #[serde(rename = "@codecs")]
    pub codecs: Option<String>,
    #[serde(rename = "@audioSamplingRate")]
    pub audio_sampling_rate: Option<String>,
    #[serde(rename = "@mimeType")]
    pub mime_type: Option<String>,
    #[serde(rename = "BaseURL")]
    pub base_url: Option<String>,
    #[serde(rename = "SegmentBase")]
    pub segment_base: Option<SegmentBase>,
    #[serde(rename = "SegmentTemplate")]
    pub segment_template: Option<SegmentTemplate>,
}

#[derive(Debug, Default, Deserialize, Clone)]
#[serde(default)]
pub struct SegmentTemplate {
    #[serde(rename = "@duration")]
    pub duration: Option<String>,
    #[serde(rename = "@timescale")]
    pub timescale: Option<String>,
    #[serde(rename = "@initialization")]
    pub initialization: Option<String>,
    #[serde(rename = "@media")]
    pub media: Option<String>,
    #[serde(rename = "@startNumber")]
    pub start_number: Option<String>,
}

/// Single-file addressing: the index (`sidx`) and the init segment are byte ranges of the
/// Representation's BaseURL.
#[derive(Debug, Default, Deserialize, Clone)]
#[serde(default)]
pub struct SegmentBase {
    #[serde(rename = "@indexRange")]
    pub index_range: Option<String>,
    #[serde(rename = "Initialization")]
    pub initialization: Option<Initialization>,
}

#[derive(Debug, Default, Deserialize, Clone)]
#[serde(default)]
pub struct Initialization {
    #[serde(rename = "@range")]
    pub range: Option<String>,
}

#[derive(Debug, Default, Deserialize, Clone)]
#[serde(default)]
pub struct ContentProtection {
    #[serde(rename = "@schemeIdUri")]
    pub scheme_id_uri: Option<String>,
    #[serde(rename = "@value")]
    pub value: Option<String>,
    // the DRM key identifier, `cenc:default_KID` in the manifest
    #[serde(rename = "@cenc:default_KID", alias = "@default_KID")]
    pub default_kid: Option<String>,
}

impl Manifest {
    /// Parse an MPD manifest, provided as an XML string.
    pub fn parse(xml: &str) -> TsumugiResult<Self> {
        quick_xml::de::from_str(xml).map_err(|e| TsumugiError::ManifestParse(e.to_string()))
    }

    /// `MPD@type="dynamic"`, a live presentation. Absent means static.
    pub fn is_dynamic(&self) -> bool {
        self.mpd_type.as_deref().map(str::trim) == Some("dynamic")
    }

    /// The only Period this downloader handles.
    pub fn period(&self) -> Option<&Period> {
        if self.periods.len() > 1 {
            tracing::warn!(
                "MPD contains {} periods, only the first one will be downloaded.",
                self.periods.len()
            );
        }
        self.periods.first()
    }

    pub fn adaptations(&self) -> &[AdaptationSet] {
        self.period()
            .map(|p| p.adaptations.as_slice())
            .unwrap_or_default()
    }

    /// Total presentation duration in seconds.
    pub fn duration_secs(&self) -> TsumugiResult<f64> {
        let duration = self
            .media_presentation_duration
            .as_deref()
            .ok_or_else(|| TsumugiError::InvalidDuration("missing".to_string()))?;
        Ok(parse_xs_duration(duration)?.as_secs_f64())
    }
}

impl AdaptationSet {
    /// `default_KID` of the first ContentProtection descriptor.
    pub fn default_kid(&self) -> Option<&str> {
        self.content_protection
            .first()
            .and_then(|cp| non_empty(&cp.default_kid))
    }
}

impl Representation {
    /// Parsed bandwidth, `None` if it is absent or malformed.
    pub fn bandwidth(&self) -> Option<u64> {
        self.bandwidth.as_deref()?.trim().parse().ok()
    }

    pub fn id(&self) -> &str {
        self.id.as_deref().unwrap_or_default()
    }
}

/// Treat an empty attribute the same as an absent one.
pub(crate) fn non_empty(value: &Option<String>) -> Option<&str> {
    value.as_deref().filter(|v| !v.is_empty())
}
