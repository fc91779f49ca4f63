use crate::providers::{Candidate, MediaLocator, MediaResolver, SearchProvider};
use crate::session::Session;
use crate::utils::format_timestamp;
use crate::{describe, PipelineError, Stage};

/// Trimmed, non-empty search term
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchQuery(String);

impl SearchQuery {
    pub fn new(raw: &str) -> Option<Self> {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            None
        } else {
            Some(Self(trimmed.to_string()))
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// Use the given term, or ask for one
pub fn read_query(
    session: &mut dyn Session,
    given: Option<String>,
) -> Result<SearchQuery, PipelineError> {
    let raw = match given {
        Some(raw) => raw,
        None => session.read_query().map_err(|e| PipelineError::Session {
            stage: Stage::Search,
            reason: describe(&e),
        })?,
    };

    SearchQuery::new(&raw)
        .ok_or_else(|| PipelineError::SearchProvider("search term is empty".to_string()))
}

/// Query the provider, keeping at most `limit` candidates in rank order
pub async fn search(
    provider: &dyn SearchProvider,
    query: &SearchQuery,
    limit: usize,
) -> Result<Vec<Candidate>, PipelineError> {
    tracing::info!("Searching for '{}'", query.as_str());

    let mut candidates = provider
        .search(query.as_str(), limit)
        .await
        .map_err(|e| PipelineError::SearchProvider(describe(&e)))?;
    candidates.truncate(limit);

    tracing::debug!("Search returned {} candidates", candidates.len());
    Ok(candidates)
}

/// `Channel: <author> | Title: <title> (<m:ss>)`
pub fn render_candidate(candidate: &Candidate) -> String {
    let timestamp = candidate
        .duration
        .map(format_timestamp)
        .unwrap_or_else(|| "live".to_string());
    format!(
        "Channel: {} | Title: {} ({})",
        candidate.author, candidate.title, timestamp
    )
}

/// Offer the candidates for selection. An empty list is never shown.
pub fn select<'a>(
    session: &mut dyn Session,
    candidates: &'a [Candidate],
) -> Result<Option<&'a Candidate>, PipelineError> {
    if candidates.is_empty() {
        return Ok(None);
    }

    let items: Vec<String> = candidates.iter().map(render_candidate).collect();
    let choice = session.select(&items).map_err(|e| PipelineError::Session {
        stage: Stage::Search,
        reason: describe(&e),
    })?;

    Ok(choice.and_then(|index| candidates.get(index)))
}

/// Resolve the chosen candidate. There is no fallback to another candidate.
pub async fn resolve(
    resolver: &dyn MediaResolver,
    candidate: &Candidate,
) -> Result<MediaLocator, PipelineError> {
    tracing::info!("Resolving '{}' ({})", candidate.title, candidate.id);

    let mut locator = resolver
        .resolve(&candidate.id)
        .await
        .map_err(|e| PipelineError::Resolution(describe(&e)))?;

    if locator.title.trim().is_empty() {
        locator.title = candidate.title.clone();
    }

    tracing::debug!(
        "Resolved '{}' with {} variants",
        locator.title,
        locator.variants.len()
    );
    Ok(locator)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::providers::{MockMediaResolver, MockSearchProvider};
    use crate::session::ScriptedSession;

    fn candidates(count: usize) -> Vec<Candidate> {
        (0..count)
            .map(|i| Candidate {
                id: format!("id{}", i),
                title: format!("Song {}", i),
                author: "Channel".to_string(),
                duration: Some(125),
            })
            .collect()
    }

    #[test]
    fn test_query_is_trimmed_and_rejected_when_empty() {
        let mut session = ScriptedSession::new();
        let query = read_query(&mut session, Some("  lofi beats ".to_string())).unwrap();
        assert_eq!(query.as_str(), "lofi beats");

        let err = read_query(&mut session, Some("   ".to_string())).unwrap_err();
        assert_eq!(err.stage(), Stage::Search);
    }

    #[test]
    fn test_query_is_prompted_when_not_given() {
        let mut session = ScriptedSession::new().with_query("lofi beats");
        let query = read_query(&mut session, None).unwrap();
        assert_eq!(query.as_str(), "lofi beats");
    }

    #[tokio::test]
    async fn test_search_caps_results() {
        let mut provider = MockSearchProvider::new();
        provider
            .expect_search()
            .withf(|query, limit| query == "lofi beats" && *limit == 3)
            .times(1)
            .returning(|_, _| Ok(candidates(5)));

        let query = SearchQuery::new("lofi beats").unwrap();
        let found = search(&provider, &query, 3).await.unwrap();
        assert_eq!(found.len(), 3);
        assert_eq!(found[2].id, "id2");
    }

    #[tokio::test]
    async fn test_search_failure_is_provider_error() {
        let mut provider = MockSearchProvider::new();
        provider
            .expect_search()
            .returning(|_, _| Err(anyhow::anyhow!("network unreachable")));

        let query = SearchQuery::new("lofi").unwrap();
        let err = search(&provider, &query, 10).await.unwrap_err();
        assert!(matches!(err, PipelineError::SearchProvider(ref m) if m.contains("unreachable")));
    }

    #[test]
    fn test_empty_candidates_never_reach_the_ui() {
        let mut session = ScriptedSession::new();
        assert_eq!(select(&mut session, &[]).unwrap(), None);
        assert!(session.offered.is_empty());
    }

    #[test]
    fn test_select_by_position() {
        let list = candidates(5);
        let mut session = ScriptedSession::new().with_selection(Some(2));
        let chosen = select(&mut session, &list).unwrap().unwrap();
        assert_eq!(chosen.id, "id2");
        assert_eq!(session.offered[0][2], "Channel: Channel | Title: Song 2 (2:05)");
    }

    #[test]
    fn test_cancelled_or_out_of_range_selection() {
        let list = candidates(2);
        let mut session = ScriptedSession::new()
            .with_selection(None)
            .with_selection(Some(7));
        assert_eq!(select(&mut session, &list).unwrap(), None);
        assert_eq!(select(&mut session, &list).unwrap(), None);
    }

    #[tokio::test]
    async fn test_resolution_failure_is_resolution_error() {
        let mut resolver = MockMediaResolver::new();
        resolver
            .expect_resolve()
            .returning(|_| Err(anyhow::anyhow!("Video unavailable")));

        let err = resolve(&resolver, &candidates(1)[0]).await.unwrap_err();
        assert!(matches!(err, PipelineError::Resolution(ref m) if m.contains("unavailable")));
    }

    #[tokio::test]
    async fn test_resolution_falls_back_to_candidate_title() {
        let mut resolver = MockMediaResolver::new();
        resolver.expect_resolve().returning(|_| {
            Ok(MediaLocator {
                title: " ".to_string(),
                variants: Vec::new(),
            })
        });

        let locator = resolve(&resolver, &candidates(1)[0]).await.unwrap();
        assert_eq!(locator.title, "Song 0");
    }
}
