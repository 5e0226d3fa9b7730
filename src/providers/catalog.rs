//! Track provider backed by a built-in catalog of well-known hits.
//!
//! Stands in for the third-party music metadata service: each call samples
//! a fresh shuffled subset, so two games rarely share a track order.

use futures::future::{self, BoxFuture};
use rand::seq::SliceRandom;

use crate::providers::{ProviderError, TrackProvider};
use crate::state::game::TrackTruth;

/// Track provider drawing from a fixed in-process catalog.
#[derive(Debug, Clone)]
pub struct CatalogTrackProvider {
    catalog: Vec<TrackTruth>,
}

impl Default for CatalogTrackProvider {
    fn default() -> Self {
        Self {
            catalog: builtin_catalog(),
        }
    }
}

impl CatalogTrackProvider {
    /// Provider over the built-in catalog.
    pub fn new() -> Self {
        Self::default()
    }

    /// Provider over a caller-supplied catalog (used by tests to pin the
    /// ground truth).
    pub fn with_catalog(catalog: Vec<TrackTruth>) -> Self {
        Self { catalog }
    }
}

impl TrackProvider for CatalogTrackProvider {
    fn fetch_rounds(&self, count: u32) -> BoxFuture<'static, Result<Vec<TrackTruth>, ProviderError>> {
        let result = if count as usize > self.catalog.len() {
            // Fewer tracks than rounds fails creation outright instead of
            // silently shortening the game.
            Err(ProviderError::tracks(format!(
                "requested {count} rounds but only {} tracks are available",
                self.catalog.len()
            )))
        } else {
            let mut tracks = self.catalog.clone();
            tracks.shuffle(&mut rand::rng());
            tracks.truncate(count as usize);
            Ok(tracks)
        };

        Box::pin(future::ready(result))
    }
}

fn track(id: &str, title: &str, artist: &str, year: i32) -> TrackTruth {
    TrackTruth {
        track_id: id.to_string(),
        title: title.to_string(),
        artist: artist.to_string(),
        year,
        preview_url: Some(format!("https://cdn.example.org/previews/{id}.mp3")),
        cover_url: Some(format!("https://cdn.example.org/covers/{id}.jpg")),
    }
}

/// Hits spanning several decades so year guesses stay interesting.
fn builtin_catalog() -> Vec<TrackTruth> {
    vec![
        track("bohemian-rhapsody", "Bohemian Rhapsody", "Queen", 1975),
        track("billie-jean", "Billie Jean", "Michael Jackson", 1983),
        track("like-a-prayer", "Like a Prayer", "Madonna", 1989),
        track("smells-like-teen-spirit", "Smells Like Teen Spirit", "Nirvana", 1991),
        track("wonderwall", "Wonderwall", "Oasis", 1995),
        track("hey-ya", "Hey Ya!", "OutKast", 2003),
        track("rolling-in-the-deep", "Rolling in the Deep", "Adele", 2010),
        track("get-lucky", "Get Lucky", "Daft Punk", 2013),
        track("uptown-funk", "Uptown Funk", "Mark Ronson", 2014),
        track("blinding-lights", "Blinding Lights", "The Weeknd", 2019),
        track("superstition", "Superstition", "Stevie Wonder", 1972),
        track("dancing-queen", "Dancing Queen", "ABBA", 1976),
        track("sweet-child-o-mine", "Sweet Child o' Mine", "Guns N' Roses", 1987),
        track("lose-yourself", "Lose Yourself", "Eminem", 2002),
        track("seven-nation-army", "Seven Nation Army", "The White Stripes", 2003),
        track("bad-guy", "bad guy", "Billie Eilish", 2019),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn fetches_the_requested_number_of_distinct_tracks() {
        let provider = CatalogTrackProvider::new();
        let tracks = provider.fetch_rounds(10).await.unwrap();

        assert_eq!(tracks.len(), 10);
        let mut ids: Vec<_> = tracks.iter().map(|t| t.track_id.clone()).collect();
        ids.sort();
        ids.dedup();
        assert_eq!(ids.len(), 10);
    }

    #[tokio::test]
    async fn exhausted_catalog_fails_instead_of_shortening() {
        let provider = CatalogTrackProvider::with_catalog(vec![track("only", "Only", "One", 2000)]);
        let err = provider.fetch_rounds(3).await.unwrap_err();
        assert_eq!(err.collaborator, "tracks");
    }
}
