use std::collections::{HashMap, HashSet};

use crate::cancel::CancelToken;
use crate::error::Error;

use super::client::Client;
use super::types::WorkItem;

/// Server-imposed cap on ids per batch-read call.
pub const MAX_BATCH_SIZE: usize = 200;

/// Fetch work items by id, preserving the caller's ordering.
///
/// Duplicate ids collapse to their first occurrence. Ids are sent in chunks
/// of at most [`MAX_BATCH_SIZE`], strictly one chunk at a time, and each
/// chunk's results are reordered to match its input order. Ids the server
/// does not return are silently omitted. The first failing chunk aborts the
/// whole call; nothing fetched so far is returned.
pub async fn fetch_work_items(
    client: &Client,
    ids: &[i64],
    fields: &[String],
    cancel: &CancelToken,
) -> Result<Vec<WorkItem>, Error> {
    let mut seen = HashSet::new();
    let unique: Vec<i64> = ids.iter().copied().filter(|id| seen.insert(*id)).collect();

    let mut items = Vec::with_capacity(unique.len());
    for chunk in unique.chunks(MAX_BATCH_SIZE) {
        let fetched = client.work_items_batch(chunk, fields, cancel).await?;
        let mut by_id: HashMap<i64, WorkItem> =
            fetched.into_iter().map(|item| (item.id, item)).collect();
        for id in chunk {
            if let Some(item) = by_id.remove(id) {
                items.push(item);
            }
        }
    }
    Ok(items)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use crate::api::testutil::MockTransport;
    use crate::api::transport::Transport;

    fn mock_client(transport: &Arc<MockTransport>) -> Client {
        Client::with_transport(
            "https://tfs.example.com",
            "P",
            transport.clone() as Arc<dyn Transport>,
        )
    }

    fn items_json(ids: &[i64]) -> String {
        let items: Vec<String> = ids
            .iter()
            .map(|id| format!(r#"{{"id":{id},"fields":{{}},"url":"u{id}"}}"#))
            .collect();
        format!("[{}]", items.join(","))
    }

    fn request_ids(transport: &MockTransport, index: usize) -> Vec<i64> {
        let body = transport.request(index).body.expect("batch body");
        let value: serde_json::Value = serde_json::from_slice(&body).expect("json body");
        value["ids"]
            .as_array()
            .expect("ids array")
            .iter()
            .map(|id| id.as_i64().expect("id"))
            .collect()
    }

    #[tokio::test]
    async fn dedupes_to_first_occurrence_and_keeps_order() {
        let transport = Arc::new(MockTransport::new());
        // server answers out of order
        transport.push_json(&items_json(&[3, 1, 5]));
        let client = mock_client(&transport);

        let items = fetch_work_items(&client, &[5, 1, 5, 3], &[], &CancelToken::new())
            .await
            .expect("fetch");
        let got: Vec<i64> = items.iter().map(|item| item.id).collect();
        assert_eq!(got, vec![5, 1, 3]);
        assert_eq!(transport.request_count(), 1);
        assert_eq!(request_ids(&transport, 0), vec![5, 1, 3]);
    }

    #[tokio::test]
    async fn missing_ids_are_omitted_without_error() {
        let transport = Arc::new(MockTransport::new());
        transport.push_json(&items_json(&[2]));
        let client = mock_client(&transport);

        let items = fetch_work_items(&client, &[9, 2, 4], &[], &CancelToken::new())
            .await
            .expect("fetch");
        let got: Vec<i64> = items.iter().map(|item| item.id).collect();
        assert_eq!(got, vec![2]);
    }

    #[tokio::test]
    async fn splits_into_sequential_chunks_of_at_most_200() {
        let ids: Vec<i64> = (1..=250).collect();
        let transport = Arc::new(MockTransport::new());
        transport.push_json(&items_json(&ids[..200]));
        transport.push_json(&items_json(&ids[200..]));
        let client = mock_client(&transport);

        let items = fetch_work_items(&client, &ids, &[], &CancelToken::new())
            .await
            .expect("fetch");
        assert_eq!(items.len(), 250);
        assert_eq!(transport.request_count(), 2);
        assert_eq!(request_ids(&transport, 0).len(), 200);
        assert_eq!(request_ids(&transport, 1), (201..=250).collect::<Vec<i64>>());
        let got: Vec<i64> = items.iter().map(|item| item.id).collect();
        assert_eq!(got, ids);
    }

    #[tokio::test]
    async fn a_failing_chunk_discards_earlier_results() {
        let ids: Vec<i64> = (1..=201).collect();
        let transport = Arc::new(MockTransport::new());
        transport.push_json(&items_json(&ids[..200]));
        transport.push_error(Error::Http {
            status: 400,
            body: "bad batch".into(),
        });
        let client = mock_client(&transport);

        let err = fetch_work_items(&client, &ids, &[], &CancelToken::new())
            .await
            .expect_err("second chunk fails");
        assert_eq!(err.code(), "http_error");
        assert_eq!(transport.request_count(), 2);
    }

    #[tokio::test]
    async fn empty_input_makes_no_calls() {
        let transport = Arc::new(MockTransport::new());
        let client = mock_client(&transport);
        let items = fetch_work_items(&client, &[], &[], &CancelToken::new())
            .await
            .expect("fetch");
        assert!(items.is_empty());
        assert_eq!(transport.request_count(), 0);
    }
}
