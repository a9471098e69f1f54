//! Happy-path pipeline tests: batching, upload-key reuse, completion
//! ordering, and retries around the signing service.

#[cfg(test)]
mod tests {
    use std::sync::atomic::Ordering;
    use std::sync::Arc;

    use blobflow_core::{BytesSource, CancelToken, TransferConfig, TransferError};
    use parking_lot::Mutex;

    use crate::{count_events, test_client, Event, EventLog, StubSigner, StubTransport, MIB};

    fn stubs(object_size: u64) -> (EventLog, Arc<StubSigner>, Arc<StubTransport>) {
        let log: EventLog = Arc::new(Mutex::new(Vec::new()));
        let signer = Arc::new(StubSigner::new(log.clone(), object_size));
        let transport = Arc::new(StubTransport::new(log.clone()));
        (log, signer, transport)
    }

    #[tokio::test]
    async fn test_should_reuse_upload_key_across_batches() {
        // 21 MiB over 5 MiB chunks: parts of 5/5/5/5/1 MiB. Batch size 2
        // forces three signed URL batches.
        let (log, signer, transport) = stubs(21 * MIB as u64);
        let config = TransferConfig::builder()
            .batch_size(2)
            .resiliency(crate::fast_resiliency())
            .build();
        let client = test_client(signer.clone(), transport, config);

        let descriptor = client
            .upload(
                "bucket",
                "large.bin",
                BytesSource::new(vec![7u8; 21 * MIB]),
                serde_json::Map::new(),
                &CancelToken::new(),
            )
            .await
            .expect("upload succeeds");

        assert_eq!(descriptor.size, 21 * MIB as u64);

        let batches: Vec<_> = log
            .lock()
            .iter()
            .filter_map(|e| match e {
                Event::Batch {
                    first_part,
                    parts,
                    upload_key,
                } => Some((*first_part, *parts, upload_key.clone())),
                _ => None,
            })
            .collect();
        assert_eq!(
            batches,
            vec![
                (1, 2, None),
                (3, 2, Some("stub-key".to_owned())),
                (5, 1, Some("stub-key".to_owned())),
            ],
            "first batch mints the key, later ones reuse it"
        );
    }

    #[tokio::test]
    async fn test_should_complete_exactly_once_after_last_part() {
        let (log, signer, transport) = stubs(12 * MIB as u64);
        let client = test_client(
            signer.clone(),
            transport,
            TransferConfig::builder()
                .resiliency(crate::fast_resiliency())
                .build(),
        );

        client
            .upload(
                "bucket",
                "obj.bin",
                BytesSource::new(vec![1u8; 12 * MIB]),
                serde_json::Map::new(),
                &CancelToken::new(),
            )
            .await
            .expect("upload succeeds");

        let events = log.lock().clone();
        assert_eq!(
            events.iter().filter(|e| **e == Event::Complete).count(),
            1,
            "completion fires exactly once"
        );
        assert_eq!(
            events.last(),
            Some(&Event::Complete),
            "completion is the final remote interaction"
        );

        let put_parts: Vec<u32> = events
            .iter()
            .filter_map(|e| match e {
                Event::Put { part, .. } => Some(*part),
                _ => None,
            })
            .collect();
        assert_eq!(put_parts, vec![1, 2, 3], "each part stored exactly once");
    }

    #[tokio::test]
    async fn test_should_upload_zero_byte_object() {
        let (log, signer, transport) = stubs(0);
        let client = test_client(
            signer,
            transport,
            TransferConfig::builder()
                .resiliency(crate::fast_resiliency())
                .build(),
        );

        let descriptor = client
            .upload(
                "bucket",
                "empty.bin",
                BytesSource::new(Vec::new()),
                serde_json::Map::new(),
                &CancelToken::new(),
            )
            .await
            .expect("upload succeeds");

        assert_eq!(descriptor.size, 0);
        assert_eq!(
            count_events(&log, |e| matches!(e, Event::Put { bytes: 0, .. })),
            1,
            "a single zero-length part is still transmitted"
        );
    }

    #[tokio::test]
    async fn test_should_retry_transient_batch_failures() {
        let (_log, signer, transport) = stubs(5 * MIB as u64);
        signer.fail_batches.store(2, Ordering::SeqCst);

        let client = test_client(
            signer.clone(),
            transport,
            TransferConfig::builder()
                .resiliency(crate::fast_resiliency())
                .build(),
        );

        client
            .upload(
                "bucket",
                "obj.bin",
                BytesSource::new(vec![0u8; 5 * MIB]),
                serde_json::Map::new(),
                &CancelToken::new(),
            )
            .await
            .expect("two 503s fit inside the retry budget of three");

        assert_eq!(signer.batch_calls(), 3, "two failures plus the success");
    }

    #[tokio::test]
    async fn test_should_retry_transient_completion_failure() {
        let (log, signer, transport) = stubs(5 * MIB as u64);
        signer.fail_completions.store(1, Ordering::SeqCst);

        let client = test_client(
            signer.clone(),
            transport,
            TransferConfig::builder()
                .resiliency(crate::fast_resiliency())
                .build(),
        );

        client
            .upload(
                "bucket",
                "obj.bin",
                BytesSource::new(vec![0u8; 5 * MIB]),
                serde_json::Map::new(),
                &CancelToken::new(),
            )
            .await
            .expect("upload succeeds after a completion retry");

        assert_eq!(signer.completion_calls(), 2);
        assert_eq!(
            count_events(&log, |e| *e == Event::Complete),
            1,
            "only the accepted completion is recorded"
        );
    }

    #[tokio::test]
    async fn test_should_fail_on_size_mismatch_at_completion() {
        // Service reports a size that disagrees with the plan.
        let (_log, signer, transport) = stubs(1);
        let client = test_client(
            signer,
            transport,
            TransferConfig::builder()
                .resiliency(crate::fast_resiliency())
                .build(),
        );

        let err = client
            .upload(
                "bucket",
                "obj.bin",
                BytesSource::new(vec![0u8; 5 * MIB]),
                serde_json::Map::new(),
                &CancelToken::new(),
            )
            .await
            .expect_err("size mismatch must fail the transfer");
        assert!(matches!(err, TransferError::ProtocolInvariant(_)));
    }
}
