use super::{Episode, ItemId, MediaSource, Movie, Season, ShowId, TvShow};
use crate::storage::BlobHandle;

/// What is being played
#[derive(Debug, Clone, PartialEq)]
pub enum PlaybackContent {
    Movie(Movie),
    Episode { show: TvShow, episode: Episode },
}

/// Identity used to decide whether a new target replaces the current one
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TargetIdentity {
    Movie {
        id: ItemId,
        blob_url: Option<String>,
    },
    Episode {
        show: ShowId,
        episode: ItemId,
        blob_url: Option<String>,
    },
}

/// A movie or (show, episode) assigned to the player, optionally backed by a
/// locally downloaded payload that overrides network sources.
#[derive(Debug, Clone, PartialEq)]
pub struct PlaybackTarget {
    content: PlaybackContent,
    blob: Option<BlobHandle>,
}

impl PlaybackTarget {
    pub fn movie(movie: Movie) -> Self {
        Self {
            content: PlaybackContent::Movie(movie),
            blob: None,
        }
    }

    pub fn episode(show: TvShow, episode: Episode) -> Self {
        Self {
            content: PlaybackContent::Episode { show, episode },
            blob: None,
        }
    }

    /// Play from a downloaded payload instead of the network
    pub fn with_blob(mut self, blob: BlobHandle) -> Self {
        self.blob = Some(blob);
        self
    }

    pub fn content(&self) -> &PlaybackContent {
        &self.content
    }

    pub fn blob(&self) -> Option<&BlobHandle> {
        self.blob.as_ref()
    }

    pub fn is_offline(&self) -> bool {
        self.blob.is_some()
    }

    pub fn identity(&self) -> TargetIdentity {
        let blob_url = self.blob.as_ref().map(|b| b.url().to_string());
        match &self.content {
            PlaybackContent::Movie(movie) => TargetIdentity::Movie {
                id: movie.id,
                blob_url,
            },
            PlaybackContent::Episode { show, episode } => TargetIdentity::Episode {
                show: show.id,
                episode: episode.id,
                blob_url,
            },
        }
    }

    /// Movie title, or the show title for episodes
    pub fn title(&self) -> &str {
        match &self.content {
            PlaybackContent::Movie(movie) => &movie.title,
            PlaybackContent::Episode { show, .. } => &show.title,
        }
    }

    /// `S1:E2 "Title"` for episodes
    pub fn episode_label(&self) -> Option<String> {
        match &self.content {
            PlaybackContent::Movie(_) => None,
            PlaybackContent::Episode { episode, .. } => {
                let season = self
                    .season()
                    .map(|s| s.season_number.to_string())
                    .unwrap_or_else(|| "?".to_string());
                Some(format!(
                    "S{}:E{} \"{}\"",
                    season, episode.episode_number, episode.title
                ))
            }
        }
    }

    pub fn video_sources(&self) -> &[MediaSource] {
        match &self.content {
            PlaybackContent::Movie(movie) => &movie.video_sources,
            PlaybackContent::Episode { episode, .. } => &episode.video_sources,
        }
    }

    pub fn subtitle_url(&self) -> Option<&str> {
        match &self.content {
            PlaybackContent::Movie(movie) => movie.subtitle_url.as_deref(),
            PlaybackContent::Episode { episode, .. } => episode.subtitle_url.as_deref(),
        }
    }

    pub fn source_for(&self, quality: &str) -> Option<&MediaSource> {
        self.video_sources().iter().find(|s| s.quality == quality)
    }

    /// URL the element should load for the given quality. A downloaded
    /// payload always wins over network sources.
    pub fn resolve_url(&self, quality: Option<&str>) -> Option<String> {
        if let Some(blob) = &self.blob {
            return Some(blob.url().to_string());
        }
        quality
            .and_then(|q| self.source_for(q))
            .or_else(|| self.video_sources().first())
            .map(|s| s.url.clone())
    }

    pub fn season(&self) -> Option<&Season> {
        match &self.content {
            PlaybackContent::Movie(_) => None,
            PlaybackContent::Episode { show, episode } => show.season_of(episode.id),
        }
    }

    fn next_episode(&self) -> Option<&Episode> {
        let PlaybackContent::Episode { episode, .. } = &self.content else {
            return None;
        };
        let season = self.season()?;
        let index = season.episodes.iter().position(|e| e.id == episode.id)?;
        season.episodes.get(index + 1)
    }

    /// True when another episode follows in the same season. Offline
    /// playback never chains.
    pub fn has_next(&self) -> bool {
        !self.is_offline() && self.next_episode().is_some()
    }

    /// Network target for the following episode of the season
    pub fn next_target(&self) -> Option<PlaybackTarget> {
        if self.is_offline() {
            return None;
        }
        let PlaybackContent::Episode { show, .. } = &self.content else {
            return None;
        };
        let next = self.next_episode()?.clone();
        Some(PlaybackTarget::episode(show.clone(), next))
    }
}
