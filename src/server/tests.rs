//! Unit tests for the server layer: write payloads, block round-trips,
//! fingerprint caching, and error mapping.

mod payload_tests {
    use crate::error::DualNativeError;
    use crate::model::ContentBlock;
    use crate::server::handlers::{InsertPayload, InsertPosition};
    use serde_json::json;

    #[test]
    fn defaults_to_append() {
        let payload =
            InsertPayload::parse(&json!({"block": {"type": "paragraph", "text": "x"}})).unwrap();
        assert_eq!(payload.position, InsertPosition::Append);
        assert_eq!(payload.blocks.len(), 1);
        assert_eq!(payload.inserted_at(3), 3);
    }

    #[test]
    fn prepend_is_index_zero() {
        let payload = InsertPayload::parse(
            &json!({"insert": "prepend", "block": {"type": "paragraph", "text": "x"}}),
        )
        .unwrap();
        assert_eq!(payload.inserted_at(5), 0);
    }

    #[test]
    fn index_is_clamped_into_range() {
        let at = |index: i64, count: usize| {
            InsertPayload::parse(&json!({
                "insert": "index",
                "index": index,
                "block": {"type": "paragraph", "text": "x"}
            }))
            .unwrap()
            .inserted_at(count)
        };
        assert_eq!(at(-1, 4), 0);
        assert_eq!(at(2, 4), 2);
        assert_eq!(at(99, 4), 4);
    }

    #[test]
    fn index_without_value_appends() {
        let payload = InsertPayload::parse(
            &json!({"insert": "index", "block": {"type": "paragraph", "text": "x"}}),
        )
        .unwrap();
        assert_eq!(payload.inserted_at(2), 2);
    }

    #[test]
    fn missing_block_fails_closed() {
        let err = InsertPayload::parse(&json!({"insert": "append"})).unwrap_err();
        assert!(matches!(err, DualNativeError::MissingBlock));
        let err = InsertPayload::parse(&json!({"blocks": []})).unwrap_err();
        assert!(matches!(err, DualNativeError::MissingBlock));
    }

    #[test]
    fn non_object_body_is_invalid_payload() {
        let err = InsertPayload::parse(&json!([1, 2])).unwrap_err();
        assert!(matches!(err, DualNativeError::InvalidPayload(_)));
    }

    #[test]
    fn unknown_block_kind_is_unsupported() {
        let err =
            InsertPayload::parse(&json!({"block": {"type": "video", "src": "x"}})).unwrap_err();
        match err {
            DualNativeError::UnsupportedBlock(kind) => assert_eq!(kind, "video"),
            other => panic!("expected UnsupportedBlock, got {other:?}"),
        }
    }

    #[test]
    fn multiple_blocks_keep_order() {
        let payload = InsertPayload::parse(&json!({
            "blocks": [
                {"type": "heading", "level": 2, "text": "A"},
                {"type": "paragraph", "text": "B"}
            ]
        }))
        .unwrap();
        assert_eq!(
            payload.blocks[0],
            ContentBlock::Heading {
                level: 2,
                text: "A".into()
            }
        );
        assert_eq!(payload.blocks.len(), 2);
    }
}

mod round_trip_tests {
    use crate::builder::extract_blocks;
    use crate::model::ContentBlock;
    use crate::server::handlers::block_to_raw;

    fn round_trip(block: ContentBlock) -> Vec<ContentBlock> {
        let raw = block_to_raw(&block).expect("block should render");
        extract_blocks(&[raw])
    }

    #[test]
    fn inserted_blocks_survive_rebuilding() {
        let cases = vec![
            ContentBlock::Paragraph {
                text: "Hello".into(),
            },
            ContentBlock::Heading {
                level: 2,
                text: "Summary".into(),
            },
            ContentBlock::List {
                ordered: true,
                items: vec!["one".into(), "two".into()],
            },
            ContentBlock::Quote {
                text: "quoted".into(),
            },
            ContentBlock::Code {
                text: "let x;".into(),
            },
        ];
        for case in cases {
            assert_eq!(round_trip(case.clone()), vec![case]);
        }
    }

    #[test]
    fn image_round_trips_id_url_alt() {
        let image = ContentBlock::Image {
            id: 9,
            url: Some("http://x/p.png".into()),
            alt_text: "pic".into(),
        };
        assert_eq!(round_trip(image.clone()), vec![image]);
    }

    #[test]
    fn generic_keeps_its_kind() {
        let block = ContentBlock::Generic {
            kind: "pullquote".into(),
            text: "words".into(),
        };
        assert_eq!(round_trip(block.clone()), vec![block]);
    }

    #[test]
    fn empty_blocks_render_to_nothing() {
        assert!(block_to_raw(&ContentBlock::Paragraph { text: "  ".into() }).is_none());
        assert!(block_to_raw(&ContentBlock::List {
            ordered: false,
            items: vec![]
        })
        .is_none());
        assert!(block_to_raw(&ContentBlock::Image {
            id: 0,
            url: None,
            alt_text: String::new()
        })
        .is_none());
    }

    #[test]
    fn markup_in_text_is_escaped_not_parsed() {
        let block = ContentBlock::Paragraph {
            text: "a < b & c".into(),
        };
        let raw = block_to_raw(&block).unwrap();
        assert!(raw.inner_html.contains("&lt;"));
        // Entities in block text are left encoded; only the flattened core
        // text decodes them.
        let rebuilt = extract_blocks(&[raw]);
        assert_eq!(
            rebuilt,
            vec![ContentBlock::Paragraph {
                text: "a &lt; b &amp; c".into()
            }]
        );
    }
}

mod cid_cache_tests {
    use crate::server::CidCache;

    #[test]
    fn lazy_population_is_idempotent() {
        let cache = CidCache::default();
        assert!(cache.get(1).is_none());
        cache.put(1, "sha256-a".into());
        cache.put(1, "sha256-a".into());
        assert_eq!(cache.get(1).as_deref(), Some("sha256-a"));
    }

    #[test]
    fn invalidation_forces_recompute() {
        let cache = CidCache::default();
        cache.put(1, "sha256-a".into());
        cache.invalidate(1);
        assert!(cache.get(1).is_none());
        // Invalidating an absent entry is harmless.
        cache.invalidate(1);
    }
}

mod error_response_tests {
    use crate::error::DualNativeError;
    use axum::http::{header, StatusCode};
    use axum::response::IntoResponse;

    #[test]
    fn statuses_match_the_taxonomy() {
        let cases = vec![
            (DualNativeError::NotFound, StatusCode::NOT_FOUND),
            (
                DualNativeError::InvalidPayload("x".into()),
                StatusCode::BAD_REQUEST,
            ),
            (DualNativeError::MissingBlock, StatusCode::BAD_REQUEST),
            (
                DualNativeError::UnsupportedBlock("video".into()),
                StatusCode::UNPROCESSABLE_ENTITY,
            ),
            (
                DualNativeError::Store("down".into()),
                StatusCode::INTERNAL_SERVER_ERROR,
            ),
        ];
        for (err, expected) in cases {
            assert_eq!(err.into_response().status(), expected);
        }
    }

    #[test]
    fn precondition_failure_carries_current_etag() {
        let response = DualNativeError::PreconditionFailed {
            current: "sha256-now".into(),
        }
        .into_response();
        assert_eq!(response.status(), StatusCode::PRECONDITION_FAILED);
        assert_eq!(
            response.headers().get(header::ETAG).unwrap(),
            "\"sha256-now\""
        );
    }
}
