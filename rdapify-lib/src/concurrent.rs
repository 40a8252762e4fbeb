//! Bounded-parallel batch lookups.

use crate::client::RdapClient;
use crate::error::RdapError;
use crate::types::{QueryType, RdapResponse};
use futures::stream::{self, Stream, StreamExt};
use std::pin::Pin;

/// One finished lookup: input position, input text and outcome.
pub type IndexedLookup = (usize, String, Result<RdapResponse, RdapError>);

/// Look up `inputs` with at most `concurrency` requests in flight, yielding
/// results as they complete (not in input order).
pub fn lookup_stream<'a>(
    client: &'a RdapClient,
    inputs: &'a [String],
    hint: Option<QueryType>,
    concurrency: usize,
) -> Pin<Box<dyn Stream<Item = IndexedLookup> + Send + 'a>> {
    let stream = stream::iter(inputs.iter().enumerate())
        .map(move |(index, input)| async move {
            let result = client.lookup_as(input, hint).await;
            (index, input.clone(), result)
        })
        .buffer_unordered(concurrency.clamp(1, 100));

    Box::pin(stream)
}

/// Run every lookup and return `(input, result)` pairs in input order.
pub async fn lookup_concurrently(
    client: &RdapClient,
    inputs: &[String],
    hint: Option<QueryType>,
    concurrency: usize,
) -> Vec<(String, Result<RdapResponse, RdapError>)> {
    let mut results: Vec<IndexedLookup> = lookup_stream(client, inputs, hint, concurrency)
        .collect()
        .await;
    results.sort_by_key(|(index, _, _)| *index);
    results
        .into_iter()
        .map(|(_, input, result)| (input, result))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::ClientConfig;

    fn offline_client() -> RdapClient {
        RdapClient::with_config(ClientConfig::default().with_offline(true)).unwrap()
    }

    #[tokio::test]
    async fn test_stream_yields_every_input() {
        let client = offline_client();
        let inputs: Vec<String> = (1..=25).map(|n| format!("AS{}", n)).collect();

        let mut seen: Vec<usize> = lookup_stream(&client, &inputs, None, 4)
            .map(|(index, _, result)| {
                assert!(matches!(result, Err(RdapError::OfflineMiss { .. })));
                index
            })
            .collect()
            .await;
        seen.sort_unstable();
        assert_eq!(seen, (0..25).collect::<Vec<_>>());
    }

    #[tokio::test]
    async fn test_hint_applies_to_every_input() {
        let client = offline_client();
        let inputs = vec!["15169".to_string(), "example.com".to_string()];

        let results = lookup_concurrently(&client, &inputs, Some(QueryType::Domain), 2).await;
        assert!(matches!(results[0].1, Err(RdapError::InvalidQuery { .. })));
        assert!(matches!(results[1].1, Err(RdapError::OfflineMiss { .. })));
    }

    #[test]
    fn test_empty_input() {
        let client = offline_client();
        let results = tokio_test::block_on(lookup_concurrently(&client, &[], None, 10));
        assert!(results.is_empty());
    }
}
