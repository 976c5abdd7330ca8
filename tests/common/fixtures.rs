use thelden::models::{Episode, MediaSource, Movie, PlayableItem, Season, TvShow};

pub fn heat() -> Movie {
    Movie::new(
        1,
        "Heat",
        vec![
            MediaSource::new("720p", "https://cdn.test/heat-720.mp4"),
            MediaSource::new("1080p", "https://cdn.test/heat-1080.mp4"),
        ],
    )
}

pub fn movie(id: u64, url: &str) -> PlayableItem {
    Movie::new(id, format!("Movie {}", id), vec![MediaSource::new("720p", url)]).into()
}

/// Two seasons; season one has three episodes with subtitles
pub fn dark() -> TvShow {
    let episode = |id: u64, number: u32, title: &str| {
        Episode::new(
            id,
            number,
            title,
            vec![MediaSource::new("720p", format!("https://cdn.test/dark-{}.mp4", id))],
        )
        .with_subtitles(format!("https://cdn.test/dark-{}.vtt", id))
    };

    TvShow::new(
        100,
        "Dark",
        vec![
            Season {
                season_number: 1,
                episodes: vec![
                    episode(101, 1, "Secrets"),
                    episode(102, 2, "Lies"),
                    episode(103, 3, "Past and Present"),
                ],
            },
            Season {
                season_number: 2,
                episodes: vec![episode(201, 1, "Beginnings and Endings")],
            },
        ],
    )
}

pub fn dark_episode(id: u64) -> Episode {
    dark()
        .seasons
        .into_iter()
        .flat_map(|season| season.episodes)
        .find(|episode| episode.id.get() == id)
        .expect("unknown episode")
}
