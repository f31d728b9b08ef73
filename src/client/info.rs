//! Subreddit `about` payloads and their classification

use crate::state::Classification;
use crate::storage::{is_user_profile_name, SubredditMetadata};
use scraper::Html;
use serde::Deserialize;
use serde_json::Value;

/// Typed view of the `data` object of `/r/{name}/about`
///
/// Every field is optional because the API omits or nulls them freely.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct SubredditInfo {
    pub display_name: Option<String>,
    pub title: Option<String>,
    pub public_description: Option<String>,
    pub subscribers: Option<i64>,
    pub active_user_count: Option<i64>,
    pub over18: Option<bool>,
    pub subreddit_type: Option<String>,
    pub quarantine: Option<bool>,
    pub created_utc: Option<f64>,
    pub community_icon: Option<String>,
    pub primary_color: Option<String>,
    pub advertiser_category: Option<String>,
    pub submission_type: Option<String>,
    pub allow_images: Option<bool>,
    pub allow_videos: Option<bool>,
    pub allow_galleries: Option<bool>,
    pub allow_videogifs: Option<bool>,
    pub allow_polls: Option<bool>,
    pub link_flair_enabled: Option<bool>,
    pub spoilers_enabled: Option<bool>,
    pub wls: Option<i64>,
    pub lang: Option<String>,
}

impl SubredditInfo {
    /// Extracts the info from a full `about` payload
    pub fn from_payload(payload: &Value) -> Result<Self, String> {
        let data = payload
            .get("data")
            .ok_or_else(|| "payload has no data object".to_string())?;
        let mut info: SubredditInfo =
            serde_json::from_value(data.clone()).map_err(|e| e.to_string())?;
        info.public_description = info
            .public_description
            .map(|text| decode_html_entities(&text));
        Ok(info)
    }

    /// Quarantine wins over type; `private` wins over everything else
    pub fn classify(&self) -> Classification {
        if self.quarantine.unwrap_or(false) {
            Classification::Quarantined
        } else if self.subreddit_type.as_deref() == Some("private") {
            Classification::Private
        } else {
            Classification::Active
        }
    }

    pub fn is_user_profile(&self) -> bool {
        self.subreddit_type.as_deref() == Some("user")
    }
}

impl From<&SubredditInfo> for SubredditMetadata {
    fn from(info: &SubredditInfo) -> Self {
        SubredditMetadata {
            title: info.title.clone(),
            description: info.public_description.clone(),
            subscribers: info.subscribers,
            active_users: info.active_user_count,
            over_18: info.over18.unwrap_or(false),
            subreddit_type: info.subreddit_type.clone(),
            created_utc: info.created_utc.map(|t| t as i64),
            icon_url: info.community_icon.clone().filter(|s| !s.is_empty()),
            primary_color: info.primary_color.clone().filter(|s| !s.is_empty()),
            advertiser_category: info.advertiser_category.clone(),
            submission_type: info.submission_type.clone(),
            allow_images: info.allow_images.unwrap_or(true),
            allow_videos: info.allow_videos.unwrap_or(true),
            allow_galleries: info.allow_galleries.unwrap_or(false),
            allow_videogifs: info.allow_videogifs.unwrap_or(false),
            allow_polls: info.allow_polls.unwrap_or(false),
            link_flair_enabled: info.link_flair_enabled.unwrap_or(false),
            spoilers_enabled: info.spoilers_enabled.unwrap_or(false),
            whitelist_status: info.wls,
            language: info.lang.clone(),
        }
    }
}

/// Result of one metadata fetch
///
/// `info` is present only for classifications that came from a payload.
#[derive(Debug, Clone)]
pub struct FetchOutcome {
    pub info: Option<SubredditInfo>,
    pub classification: Classification,
    pub is_user_profile: bool,
    /// What went wrong, for `Classification::Error`
    pub error: Option<String>,
}

impl FetchOutcome {
    pub fn classified(name: &str, classification: Classification) -> Self {
        Self {
            info: None,
            classification,
            is_user_profile: is_user_profile_name(name),
            error: None,
        }
    }

    pub fn failed(name: &str, error: impl Into<String>) -> Self {
        Self {
            info: None,
            classification: Classification::Error,
            is_user_profile: is_user_profile_name(name),
            error: Some(error.into()),
        }
    }

    pub fn from_payload(name: &str, payload: &Value) -> Self {
        match SubredditInfo::from_payload(payload) {
            Ok(info) => Self {
                classification: info.classify(),
                is_user_profile: info.is_user_profile() || is_user_profile_name(name),
                info: Some(info),
                error: None,
            },
            Err(e) => Self::failed(name, format!("Unexpected payload: {}", e)),
        }
    }
}

/// Decodes HTML character references (`&amp;`, `&#39;` ...) in API text
pub fn decode_html_entities(text: &str) -> String {
    if !text.contains('&') {
        return text.to_string();
    }
    let fragment = Html::parse_fragment(text);
    fragment.root_element().text().collect()
}
