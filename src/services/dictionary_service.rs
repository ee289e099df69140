//! Word validation against an external dictionary, with an in-process cache.
//!
//! Lookups are cached by normalized word, both positive and negative. When the
//! upstream service cannot be reached at all the word is accepted without a
//! definition and the verdict is not cached, so a healthy dictionary gets to
//! re-judge the word later.

use dashmap::DashMap;
use futures::future::BoxFuture;
use serde::Deserialize;
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, warn};

use crate::{config::DictionaryConfig, state::session::normalize_word};

/// Verdict of a dictionary lookup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WordLookup {
    /// The word exists.
    Valid {
        /// Short definition, when the dictionary provided one.
        definition: Option<String>,
        /// IPA transcription, when the dictionary provided one.
        phonetic: Option<String>,
    },
    /// The dictionary rejected the word.
    Invalid {
        /// Why the word was rejected.
        reason: String,
    },
}

/// Raw answer from a word definer backend.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Definition {
    /// Whether the dictionary knows the word.
    pub found: bool,
    /// Short definition, when one exists.
    pub definition: Option<String>,
    /// IPA transcription, when one exists.
    pub phonetic: Option<String>,
}

/// Failure talking to a word definer backend.
#[derive(Debug, Error)]
pub enum DefinerError {
    /// Transport-level failure (timeout, DNS, connection refused).
    #[error("dictionary request failed: {0}")]
    Transport(#[from] reqwest::Error),
    /// The backend answered with something we could not interpret.
    #[error("unexpected dictionary response: status {status}")]
    UnexpectedStatus {
        /// HTTP status of the response.
        status: u16,
    },
}

/// Source of word definitions.
pub trait WordDefiner: Send + Sync {
    /// Look the word up; `found == false` means the word does not exist.
    fn define<'a>(&'a self, word: &'a str) -> BoxFuture<'a, Result<Definition, DefinerError>>;
}

/// Subset of the dictionaryapi.dev entry payload we care about.
#[derive(Debug, Deserialize)]
struct DictionaryApiEntry {
    #[serde(default)]
    phonetic: Option<String>,
    #[serde(default)]
    meanings: Vec<DictionaryApiMeaning>,
}

#[derive(Debug, Deserialize)]
struct DictionaryApiMeaning {
    #[serde(default)]
    definitions: Vec<DictionaryApiDefinition>,
}

#[derive(Debug, Deserialize)]
struct DictionaryApiDefinition {
    definition: String,
}

/// [`WordDefiner`] backed by the free dictionaryapi.dev HTTP API.
pub struct HttpWordDefiner {
    client: reqwest::Client,
    endpoint: String,
}

impl HttpWordDefiner {
    /// Build the HTTP client with the configured per-request timeout.
    pub fn new(config: &DictionaryConfig) -> Self {
        let client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_millis(config.timeout_ms))
            .build()
            .unwrap_or_else(|_| reqwest::Client::new());
        HttpWordDefiner {
            client,
            endpoint: config.endpoint.trim_end_matches('/').to_string(),
        }
    }
}

impl WordDefiner for HttpWordDefiner {
    fn define<'a>(&'a self, word: &'a str) -> BoxFuture<'a, Result<Definition, DefinerError>> {
        Box::pin(async move {
            let url = format!("{}/{}", self.endpoint, word);
            let response = self.client.get(&url).send().await?;
            match response.status() {
                status if status.is_success() => {
                    let entries: Vec<DictionaryApiEntry> = response.json().await?;
                    let definition = entries
                        .iter()
                        .flat_map(|entry| &entry.meanings)
                        .flat_map(|meaning| &meaning.definitions)
                        .next()
                        .map(|d| d.definition.clone());
                    let phonetic = entries.iter().find_map(|entry| entry.phonetic.clone());
                    Ok(Definition {
                        found: true,
                        definition,
                        phonetic,
                    })
                }
                status if status.as_u16() == 404 => Ok(Definition {
                    found: false,
                    definition: None,
                    phonetic: None,
                }),
                status => Err(DefinerError::UnexpectedStatus {
                    status: status.as_u16(),
                }),
            }
        })
    }
}

/// Caching front for a [`WordDefiner`].
pub struct DictionaryService {
    definer: Arc<dyn WordDefiner>,
    cache: DashMap<String, WordLookup>,
}

impl DictionaryService {
    /// Wrap a definer with an empty cache.
    pub fn new(definer: Arc<dyn WordDefiner>) -> Self {
        DictionaryService {
            definer,
            cache: DashMap::new(),
        }
    }

    /// Validate a word, consulting the cache before the definer.
    pub async fn lookup(&self, word: &str) -> WordLookup {
        let normalized = normalize_word(word);
        if let Some(cached) = self.cache.get(&normalized) {
            debug!(word = %normalized, "dictionary cache hit");
            return cached.clone();
        }

        match self.definer.define(&normalized).await {
            Ok(Definition {
                found: true,
                definition,
                phonetic,
            }) => {
                let verdict = WordLookup::Valid {
                    definition,
                    phonetic,
                };
                self.cache.insert(normalized, verdict.clone());
                verdict
            }
            Ok(Definition { found: false, .. }) => {
                let verdict = WordLookup::Invalid {
                    reason: "not found in the dictionary".to_string(),
                };
                self.cache.insert(normalized, verdict.clone());
                verdict
            }
            Err(err) => {
                // Fail open, but do not poison the cache with the fallback.
                warn!(word = %normalized, error = %err, "dictionary unavailable, accepting word");
                WordLookup::Valid {
                    definition: None,
                    phonetic: None,
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct ScriptedDefiner {
        calls: AtomicUsize,
        outcome: fn() -> Result<Definition, DefinerError>,
    }

    impl ScriptedDefiner {
        fn new(outcome: fn() -> Result<Definition, DefinerError>) -> Arc<Self> {
            Arc::new(ScriptedDefiner {
                calls: AtomicUsize::new(0),
                outcome,
            })
        }
    }

    impl WordDefiner for ScriptedDefiner {
        fn define<'a>(&'a self, _word: &'a str) -> BoxFuture<'a, Result<Definition, DefinerError>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let result = (self.outcome)();
            Box::pin(async move { result })
        }
    }

    #[tokio::test]
    async fn positive_verdicts_are_cached() {
        let definer = ScriptedDefiner::new(|| {
            Ok(Definition {
                found: true,
                definition: Some("a large striped cat".to_string()),
                phonetic: Some("/ˈtaɪɡə/".to_string()),
            })
        });
        let service = DictionaryService::new(definer.clone());

        let first = service.lookup("Tiger").await;
        let second = service.lookup("tiger ").await;
        assert!(matches!(
            first,
            WordLookup::Valid {
                phonetic: Some(_),
                ..
            }
        ));
        assert_eq!(first, second);
        assert_eq!(definer.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn unknown_words_are_negatively_cached() {
        let definer = ScriptedDefiner::new(|| {
            Ok(Definition {
                found: false,
                definition: None,
                phonetic: None,
            })
        });
        let service = DictionaryService::new(definer.clone());

        assert!(matches!(
            service.lookup("zzzz").await,
            WordLookup::Invalid { .. }
        ));
        assert!(matches!(
            service.lookup("zzzz").await,
            WordLookup::Invalid { .. }
        ));
        assert_eq!(definer.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn transport_failures_accept_without_caching() {
        let definer = ScriptedDefiner::new(|| Err(DefinerError::UnexpectedStatus { status: 502 }));
        let service = DictionaryService::new(definer.clone());

        assert_eq!(
            service.lookup("plant").await,
            WordLookup::Valid {
                definition: None,
                phonetic: None,
            }
        );
        // Not cached: the definer is asked again on the next lookup.
        assert_eq!(
            service.lookup("plant").await,
            WordLookup::Valid {
                definition: None,
                phonetic: None,
            }
        );
        assert_eq!(definer.calls.load(Ordering::SeqCst), 2);
    }
}
