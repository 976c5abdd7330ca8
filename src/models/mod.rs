pub mod catalog;
mod identifiers;
pub mod playback_target;

pub use catalog::{CatalogLookup, StaticCatalog};
pub use identifiers::{ItemId, ShowId};
pub use playback_target::{PlaybackContent, PlaybackTarget, TargetIdentity};

use serde::{Deserialize, Serialize};

/// A single quality variant of a playable item
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MediaSource {
    pub quality: String,
    pub url: String,
}

impl MediaSource {
    pub fn new(quality: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            quality: quality.into(),
            url: url.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Movie {
    pub id: ItemId,
    pub title: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub poster_path: String,
    #[serde(default)]
    pub backdrop_path: String,
    #[serde(default)]
    pub video_sources: Vec<MediaSource>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub subtitle_url: Option<String>,
    #[serde(default)]
    pub genres: Vec<String>,
    #[serde(default)]
    pub rating: f32,
    #[serde(default)]
    pub release_year: u32,
}

impl Movie {
    pub fn new(id: impl Into<ItemId>, title: impl Into<String>, sources: Vec<MediaSource>) -> Self {
        Self {
            id: id.into(),
            title: title.into(),
            description: String::new(),
            poster_path: String::new(),
            backdrop_path: String::new(),
            video_sources: sources,
            subtitle_url: None,
            genres: Vec::new(),
            rating: 0.0,
            release_year: 0,
        }
    }

    pub fn with_subtitles(mut self, url: impl Into<String>) -> Self {
        self.subtitle_url = Some(url.into());
        self
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Episode {
    pub id: ItemId,
    pub episode_number: u32,
    pub title: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub thumbnail_path: String,
    #[serde(default)]
    pub video_sources: Vec<MediaSource>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub subtitle_url: Option<String>,
    /// Runtime in minutes
    #[serde(default)]
    pub duration_minutes: u32,
}

impl Episode {
    pub fn new(
        id: impl Into<ItemId>,
        episode_number: u32,
        title: impl Into<String>,
        sources: Vec<MediaSource>,
    ) -> Self {
        Self {
            id: id.into(),
            episode_number,
            title: title.into(),
            description: String::new(),
            thumbnail_path: String::new(),
            video_sources: sources,
            subtitle_url: None,
            duration_minutes: 0,
        }
    }

    pub fn with_subtitles(mut self, url: impl Into<String>) -> Self {
        self.subtitle_url = Some(url.into());
        self
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Season {
    pub season_number: u32,
    pub episodes: Vec<Episode>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TvShow {
    pub id: ShowId,
    pub title: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub poster_path: String,
    #[serde(default)]
    pub backdrop_path: String,
    #[serde(default)]
    pub genres: Vec<String>,
    #[serde(default)]
    pub rating: f32,
    #[serde(default)]
    pub release_year: u32,
    #[serde(default)]
    pub seasons: Vec<Season>,
}

impl TvShow {
    pub fn new(id: impl Into<ShowId>, title: impl Into<String>, seasons: Vec<Season>) -> Self {
        Self {
            id: id.into(),
            title: title.into(),
            description: String::new(),
            poster_path: String::new(),
            backdrop_path: String::new(),
            genres: Vec::new(),
            rating: 0.0,
            release_year: 0,
            seasons,
        }
    }

    /// The season that contains the given episode
    pub fn season_of(&self, episode_id: ItemId) -> Option<&Season> {
        self.seasons
            .iter()
            .find(|season| season.episodes.iter().any(|e| e.id == episode_id))
    }
}

/// A movie or an episode: anything that owns media sources and can be
/// played or captured for offline use.
#[derive(Debug, Clone, PartialEq)]
pub enum PlayableItem {
    Movie(Movie),
    Episode(Episode),
}

impl PlayableItem {
    pub fn id(&self) -> ItemId {
        match self {
            PlayableItem::Movie(movie) => movie.id,
            PlayableItem::Episode(episode) => episode.id,
        }
    }

    pub fn video_sources(&self) -> &[MediaSource] {
        match self {
            PlayableItem::Movie(movie) => &movie.video_sources,
            PlayableItem::Episode(episode) => &episode.video_sources,
        }
    }

    /// Name shown for an in-flight download
    pub fn display_name(&self, show_title: &str) -> String {
        match self {
            PlayableItem::Movie(movie) => movie.title.clone(),
            PlayableItem::Episode(episode) => format!("{}: {}", show_title, episode.title),
        }
    }
}

impl From<Movie> for PlayableItem {
    fn from(movie: Movie) -> Self {
        PlayableItem::Movie(movie)
    }
}

impl From<Episode> for PlayableItem {
    fn from(episode: Episode) -> Self {
        PlayableItem::Episode(episode)
    }
}

/// Metadata persisted next to a downloaded payload. Episodes carry their
/// show title so they can be traced back to the catalog later.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum DownloadedContent {
    Movie(Movie),
    Episode { episode: Episode, show_title: String },
}

impl DownloadedContent {
    pub fn from_item(item: PlayableItem, show_title: &str) -> Self {
        match item {
            PlayableItem::Movie(movie) => DownloadedContent::Movie(movie),
            PlayableItem::Episode(episode) => DownloadedContent::Episode {
                episode,
                show_title: show_title.to_string(),
            },
        }
    }

    pub fn id(&self) -> ItemId {
        match self {
            DownloadedContent::Movie(movie) => movie.id,
            DownloadedContent::Episode { episode, .. } => episode.id,
        }
    }

    pub fn video_sources(&self) -> &[MediaSource] {
        match self {
            DownloadedContent::Movie(movie) => &movie.video_sources,
            DownloadedContent::Episode { episode, .. } => &episode.video_sources,
        }
    }

    pub fn display_name(&self) -> String {
        match self {
            DownloadedContent::Movie(movie) => movie.title.clone(),
            DownloadedContent::Episode {
                episode,
                show_title,
            } => format!("{}: {}", show_title, episode.title),
        }
    }
}
