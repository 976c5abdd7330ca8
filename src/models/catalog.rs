use super::{ShowId, TvShow};

/// Read-only access to catalog shows, used to trace downloaded episodes back
/// to their show for season/episode context.
pub trait CatalogLookup: Send + Sync {
    fn find_show_by_title(&self, title: &str) -> Option<TvShow>;
    fn find_show_by_id(&self, id: ShowId) -> Option<TvShow>;
}

/// Catalog backed by an in-memory list of shows
#[derive(Debug, Clone, Default)]
pub struct StaticCatalog {
    shows: Vec<TvShow>,
}

impl StaticCatalog {
    pub fn new(shows: Vec<TvShow>) -> Self {
        Self { shows }
    }
}

impl CatalogLookup for StaticCatalog {
    fn find_show_by_title(&self, title: &str) -> Option<TvShow> {
        self.shows.iter().find(|show| show.title == title).cloned()
    }

    fn find_show_by_id(&self, id: ShowId) -> Option<TvShow> {
        self.shows.iter().find(|show| show.id == id).cloned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn catalog() -> StaticCatalog {
        StaticCatalog::new(vec![
            TvShow::new(10, "Dark", vec![]),
            TvShow::new(20, "Severance", vec![]),
        ])
    }

    #[test]
    fn test_find_show_by_id() {
        let catalog = catalog();

        let show = catalog.find_show_by_id(ShowId::new(20)).unwrap();
        assert_eq!(show.title, "Severance");
        assert!(catalog.find_show_by_id(ShowId::new(30)).is_none());
        assert!(StaticCatalog::default().find_show_by_id(ShowId::new(10)).is_none());
    }

    #[test]
    fn test_find_show_by_title_is_exact() {
        let catalog = catalog();

        assert_eq!(catalog.find_show_by_title("Dark").unwrap().id, ShowId::new(10));
        assert!(catalog.find_show_by_title("dark").is_none());
    }
}
