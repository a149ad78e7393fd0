//! Parsing helpers for release titles and library paths.

use once_cell::sync::Lazy;
use regex_lite::Regex;

static EPISODE_MARKER: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)\bS(\d{1,2})(?:E(\d{1,3}))?\b").expect("episode marker pattern is valid")
});

static YEAR: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^(19|20)\d{2}$").expect("year pattern is valid"));

/// Tokens that end the title part of a release or directory name.
const QUALITY_TOKENS: &[&str] = &[
    "480p", "576p", "720p", "1080p", "2160p", "4k", "uhd", "bluray", "blu-ray", "bdrip", "brrip",
    "web", "web-dl", "webrip", "hdtv", "dvdrip", "remux", "x264", "x265", "h264", "h265", "hevc",
];

/// Season and optional episode number found in a release title or file name.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EpisodeMarker {
    pub season: u32,
    /// `None` for season packs (`S01` without an episode).
    pub episode: Option<u32>,
}

/// Find the first `SxxEyy` or `Sxx` marker, case-insensitively.
pub fn parse_episode_marker(title: &str) -> Option<EpisodeMarker> {
    let caps = EPISODE_MARKER.captures(title)?;
    let season = caps.get(1)?.as_str().parse().ok()?;
    let episode = match caps.get(2) {
        Some(m) => Some(m.as_str().parse().ok()?),
        None => None,
    };
    Some(EpisodeMarker { season, episode })
}

/// Derive a metadata search term from a movie directory or file name.
///
/// `The.Matrix.1999.1080p.BluRay` and `The Matrix (1999)` both yield
/// `The Matrix`.
pub fn search_term_from_path(path: &str) -> String {
    let name = path
        .trim_end_matches('/')
        .rsplit('/')
        .next()
        .unwrap_or(path);

    let normalized: String = name
        .chars()
        .map(|c| match c {
            '.' | '_' | '(' | ')' | '[' | ']' => ' ',
            c => c,
        })
        .collect();

    let mut words = Vec::new();
    for word in normalized.split_whitespace() {
        let lower = word.to_ascii_lowercase();
        // Keep a leading year: it is the title ("1917", "2012").
        if !words.is_empty() && YEAR.is_match(word) {
            break;
        }
        if QUALITY_TOKENS.contains(&lower.as_str()) {
            break;
        }
        words.push(word);
    }

    words.join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_episode_marker() {
        assert_eq!(
            parse_episode_marker("Breaking.Bad.S01E05.720p.HDTV"),
            Some(EpisodeMarker {
                season: 1,
                episode: Some(5)
            })
        );
        assert_eq!(
            parse_episode_marker("breaking bad s2e10"),
            Some(EpisodeMarker {
                season: 2,
                episode: Some(10)
            })
        );
    }

    #[test]
    fn test_season_pack_marker() {
        assert_eq!(
            parse_episode_marker("Breaking.Bad.S03.1080p.BluRay"),
            Some(EpisodeMarker {
                season: 3,
                episode: None
            })
        );
    }

    #[test]
    fn test_no_marker() {
        assert_eq!(parse_episode_marker("The.Matrix.1999.1080p"), None);
        // Not a standalone token.
        assert_eq!(parse_episode_marker("Show.S2000.Special"), None);
        assert_eq!(parse_episode_marker("Episodes01"), None);
    }

    #[test]
    fn test_search_term_from_path() {
        assert_eq!(search_term_from_path("The.Matrix.1999.1080p.BluRay"), "The Matrix");
        assert_eq!(search_term_from_path("The Matrix (1999)"), "The Matrix");
        assert_eq!(search_term_from_path("movies/Heat_1995/"), "Heat");
        assert_eq!(search_term_from_path("1917 (2019)"), "1917");
        assert_eq!(search_term_from_path("Alien.2160p.UHD"), "Alien");
    }
}
