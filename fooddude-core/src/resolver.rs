//! Resolves a normalized query to a food record or a list to choose from.

use crate::index::{FoodIndex, IndexError, MANUAL_SEARCH_LIMIT, VOICE_SEARCH_LIMIT};
use crate::models::FoodRecord;

/// Outcome of resolving a query.
#[derive(Debug, Clone, PartialEq)]
pub enum Resolution {
    /// The top result is confident enough to log without asking.
    AutoMatch(FoodRecord),
    /// The user has to pick one of these.
    Candidates(Vec<FoodRecord>),
    /// Nothing matched at any relaxation level.
    NoMatch,
}

/// Resolves queries against a [`FoodIndex`].
///
/// The auto-commit rule is deliberately permissive and may be tuned:
/// - several tokens: commit when any token appears in the top result's name;
/// - one token: commit an exact name match, or the top result when it is the
///   only result containing the token. Several containing results tie and
///   are returned as candidates.
pub struct Resolver<'a, I: FoodIndex + ?Sized> {
    index: &'a I,
    limit: usize,
}

impl<'a, I: FoodIndex + ?Sized> Resolver<'a, I> {
    /// A resolver with the voice result limit.
    pub fn new(index: &'a I) -> Self {
        Self {
            index,
            limit: VOICE_SEARCH_LIMIT,
        }
    }

    pub fn with_limit(mut self, limit: usize) -> Self {
        self.limit = limit;
        self
    }

    /// Plain manual search: no relaxation, no auto-commit.
    pub async fn search(&self, query: &str) -> Result<Vec<FoodRecord>, IndexError> {
        self.index.search(query, MANUAL_SEARCH_LIMIT).await
    }

    pub async fn resolve(&self, query: &str) -> Result<Resolution, IndexError> {
        let tokens: Vec<&str> = query.split_whitespace().collect();
        if tokens.is_empty() {
            return Ok(Resolution::NoMatch);
        }

        let mut results = Vec::new();
        let mut tried: Vec<String> = Vec::with_capacity(3);
        for attempt in relaxation_levels(&tokens) {
            if tried.contains(&attempt) {
                continue;
            }
            results = self.index.search(&attempt, self.limit).await?;
            tracing::debug!("resolve {:?}: {} result(s)", attempt, results.len());
            if !results.is_empty() {
                break;
            }
            tried.push(attempt);
        }

        if results.is_empty() {
            return Ok(Resolution::NoMatch);
        }

        Ok(match pick_auto_match(&tokens, &results) {
            Some(i) => Resolution::AutoMatch(results.swap_remove(i)),
            None => Resolution::Candidates(results),
        })
    }
}

/// Full query, then the last two tokens, then the last token.
fn relaxation_levels(tokens: &[&str]) -> Vec<String> {
    let mut levels = vec![tokens.join(" ")];
    if tokens.len() >= 2 {
        levels.push(tokens[tokens.len() - 2..].join(" "));
    }
    levels.push(tokens[tokens.len() - 1].to_string());
    levels
}

fn pick_auto_match(tokens: &[&str], results: &[FoodRecord]) -> Option<usize> {
    let names: Vec<String> = results.iter().map(|r| r.name.to_lowercase()).collect();

    if let [token] = tokens {
        let token = token.to_lowercase();
        if let Some(exact) = names.iter().position(|n| n.trim() == token) {
            return Some(exact);
        }
        let containing = names.iter().filter(|n| n.contains(&token)).count();
        return (names[0].contains(&token) && containing == 1).then_some(0);
    }

    tokens
        .iter()
        .any(|t| names[0].contains(&t.to_lowercase()))
        .then_some(0)
}
