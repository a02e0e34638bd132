//! End-to-end tests for ImageMill over real HTTP.
//!
//! Two wiremock servers stand in for the picture host and the image search
//! service, so downloads, caching, retries and response mapping all run
//! through the production clients.

use image_mill::config::AppConfig;
use image_mill::{
    BatchAttachment, ImageItem, ImageMill, MillError, SearchParam, SyncOperation, NO_MORE_DATA,
};
use serde_json::json;
use std::time::Duration;
use wiremock::matchers::{body_partial_json, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

struct Harness {
    pictures: MockServer,
    service: MockServer,
}

impl Harness {
    async fn start() -> Self {
        Self {
            pictures: MockServer::start().await,
            service: MockServer::start().await,
        }
    }

    fn config(&self) -> AppConfig {
        let mut config = AppConfig::for_endpoint(self.service.uri());
        config.download_prefix = Some(format!("{}/", self.pictures.uri()));
        config.retry_delay_ms = 20;
        config.round_timeout_ms = 2_000;
        config
    }

    fn mill(&self) -> ImageMill {
        ImageMill::new(&self.config()).expect("mill builds")
    }

    async fn host_picture(&self, name: &str, expected_downloads: u64) {
        Mock::given(method("GET"))
            .and(path(format!("/{}", name)))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(b"jpeg".to_vec()))
            .expect(expected_downloads)
            .mount(&self.pictures)
            .await;
    }
}

fn image(name: &str) -> ImageItem {
    ImageItem {
        pic_name: name.to_string(),
        product_id: format!("p-{}", name),
        image_url: format!("{}.jpg", name),
    }
}

fn attachment() -> BatchAttachment {
    BatchAttachment {
        instance_name: "furniture".into(),
        category_id: Some(9),
        str_attr: "test".into(),
    }
}

fn fault(code: &str, message: &str) -> serde_json::Value {
    json!({"Code": code, "Message": message, "RequestId": "req-1"})
}

#[tokio::test]
async fn adds_whole_batch_in_one_round() {
    let harness = Harness::start().await;
    harness.host_picture("id1.jpg", 1).await;
    harness.host_picture("id2.jpg", 1).await;
    Mock::given(method("POST"))
        .and(path("/AddImage"))
        .and(body_partial_json(json!({
            "InstanceName": "furniture",
            "CategoryId": 9,
            "StrAttr": "test",
            "PicContent": "anBlZw=="
        })))
        .respond_with(ResponseTemplate::new(200))
        .expect(2)
        .mount(&harness.service)
        .await;

    let mill = harness.mill();
    let mut names = mill
        .add_images(&[image("id1"), image("id2")], &attachment())
        .await
        .unwrap();
    names.sort();

    assert_eq!(names, vec!["id1", "id2"]);
    assert!(mill.cache().is_empty());
}

#[tokio::test]
async fn throttled_add_is_retried_from_cache() {
    let harness = Harness::start().await;
    // One download each, even though id2 is submitted twice.
    harness.host_picture("id1.jpg", 1).await;
    harness.host_picture("id2.jpg", 1).await;
    Mock::given(method("POST"))
        .and(path("/AddImage"))
        .and(body_partial_json(json!({"PicName": "id2"})))
        .respond_with(ResponseTemplate::new(503).set_body_json(fault("Throttling.User", "slow down")))
        .up_to_n_times(1)
        .with_priority(1)
        .mount(&harness.service)
        .await;
    Mock::given(method("POST"))
        .and(path("/AddImage"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"RequestId": "ok"})))
        .expect(2)
        .mount(&harness.service)
        .await;

    let mill = harness.mill();
    let report = mill
        .sync_images(&[image("id1"), image("id2")], &attachment(), SyncOperation::Add)
        .await
        .unwrap();

    assert_eq!(report.rounds, 2);
    assert_eq!(report.succeeded.len(), 2);
    assert!(report.failed.is_empty());
    assert!(mill.cache().is_empty());
}

#[tokio::test]
async fn failed_download_is_terminal() {
    let harness = Harness::start().await;
    harness.host_picture("id1.jpg", 1).await;
    Mock::given(method("GET"))
        .and(path("/missing.jpg"))
        .respond_with(ResponseTemplate::new(404))
        .expect(1)
        .mount(&harness.pictures)
        .await;
    Mock::given(method("POST"))
        .and(path("/AddImage"))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&harness.service)
        .await;

    let mill = harness.mill();
    let report = mill
        .sync_images(&[image("id1"), image("missing")], &attachment(), SyncOperation::Add)
        .await
        .unwrap();

    assert_eq!(report.succeeded, vec!["id1"]);
    assert_eq!(report.rounds, 1);
    assert_eq!(report.failed.len(), 1);
    assert_eq!(report.failed[0].image.pic_name, "missing");
    assert!(report.failed[0].reason.contains("missing.jpg"));
}

#[tokio::test]
async fn rejected_delete_is_not_retried() {
    let harness = Harness::start().await;
    Mock::given(method("POST"))
        .and(path("/DeleteImage"))
        .and(body_partial_json(json!({"PicName": "id1", "ProductId": "p-id1"})))
        .respond_with(ResponseTemplate::new(404).set_body_json(fault("PicNotExist", "no such picture")))
        .expect(1)
        .mount(&harness.service)
        .await;
    Mock::given(method("POST"))
        .and(path("/DeleteImage"))
        .and(body_partial_json(json!({"PicName": "id2"})))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&harness.service)
        .await;

    let mill = harness.mill();
    let names = mill
        .delete_images(&[image("id1"), image("id2")], &attachment())
        .await
        .unwrap();

    assert_eq!(names, vec!["id2"]);
}

#[tokio::test]
async fn slow_items_are_dropped_at_round_deadline() {
    let harness = Harness::start().await;
    Mock::given(method("POST"))
        .and(path("/DeleteImage"))
        .and(body_partial_json(json!({"PicName": "slow"})))
        .respond_with(ResponseTemplate::new(200).set_delay(Duration::from_secs(3)))
        .with_priority(1)
        .mount(&harness.service)
        .await;
    Mock::given(method("POST"))
        .and(path("/DeleteImage"))
        .respond_with(ResponseTemplate::new(200))
        .mount(&harness.service)
        .await;

    let mut config = harness.config();
    config.round_timeout_ms = 300;
    let mill = ImageMill::new(&config).unwrap();
    let report = mill
        .sync_images(&[image("id1"), image("slow")], &attachment(), SyncOperation::Delete)
        .await
        .unwrap();

    assert_eq!(report.succeeded, vec!["id1"]);
    assert_eq!(report.dropped, vec![image("slow")]);
    assert!(report.failed.is_empty());
    assert_eq!(report.rounds, 1);
}

#[tokio::test]
async fn search_rewrites_reference_and_dedups() {
    let harness = Harness::start().await;
    harness.host_picture("query.jpg", 1).await;
    Mock::given(method("POST"))
        .and(path("/SearchImage"))
        .and(body_partial_json(json!({
            "Type": "SearchByPic",
            "Filter": "str_attr=\"test\"",
            "Start": 0,
            "Num": 3,
            "PicContent": "anBlZw=="
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "Head": {"DocsFound": 12, "DocsReturn": 3, "SearchTime": 40},
            "Auctions": [
                {"ProductId": "p1", "PicName": "a"},
                {"ProductId": "p2", "PicName": "b"},
                {"ProductId": "p1", "PicName": "c"}
            ],
            "RequestId": "req-2"
        })))
        .expect(1)
        .mount(&harness.service)
        .await;

    let param = SearchParam {
        image_url: "query.jpg".into(),
        limit: 3,
        str_attr: "test".into(),
        is_removal: true,
        instance_name: "furniture".into(),
        ..SearchParam::default()
    };
    let result = harness.mill().search_image(&param).await.unwrap();

    assert_eq!(result.image_url, "query.jpg");
    assert_eq!(result.product_ids, vec!["p1", "p2"]);
    assert_eq!(result.offset, 3);
    assert_eq!(result.docs_found, 12);
    assert_eq!(result.search_time, 40);
}

#[tokio::test]
async fn search_past_last_page_is_empty_not_an_error() {
    let harness = Harness::start().await;
    harness.host_picture("query.jpg", 1).await;
    Mock::given(method("POST"))
        .and(path("/SearchImage"))
        .respond_with(
            ResponseTemplate::new(400).set_body_json(fault("InvalidStartParameter", "start too large")),
        )
        .mount(&harness.service)
        .await;

    let param = SearchParam {
        image_url: "query.jpg".into(),
        offset: 500,
        ..SearchParam::default()
    };
    let result = harness.mill().search_image(&param).await.unwrap();

    assert!(result.product_ids.is_empty());
    assert_eq!(result.offset, NO_MORE_DATA);
}

#[tokio::test]
async fn throttled_search_surfaces_throttling() {
    let harness = Harness::start().await;
    harness.host_picture("query.jpg", 1).await;
    Mock::given(method("POST"))
        .and(path("/SearchImage"))
        .respond_with(ResponseTemplate::new(403).set_body_json(fault("DeniedRequest", "quota")))
        .mount(&harness.service)
        .await;

    let param = SearchParam {
        image_url: "query.jpg".into(),
        ..SearchParam::default()
    };
    let err = harness.mill().search_image(&param).await.unwrap_err();
    assert!(matches!(err, MillError::Throttled));
}

#[tokio::test]
async fn origin_image_skips_rewrite() {
    let harness = Harness::start().await;
    harness.host_picture("direct.jpg", 1).await;
    Mock::given(method("POST"))
        .and(path("/SearchImage"))
        .respond_with(ResponseTemplate::new(500).set_body_string("upstream exploded"))
        .mount(&harness.service)
        .await;

    let mut config = harness.config();
    config.download_query = Some("?imageView2/0/w/750".into());
    let mill = ImageMill::new(&config).unwrap();
    let param = SearchParam {
        image_url: format!("{}/direct.jpg", harness.pictures.uri()),
        use_origin_image: true,
        ..SearchParam::default()
    };
    let err = mill.search_image(&param).await.unwrap_err();
    match err {
        MillError::Search(message) => assert!(message.contains("500")),
        other => panic!("unexpected error: {:?}", other),
    }

    let downloads = harness.pictures.received_requests().await.unwrap_or_default();
    assert_eq!(downloads.len(), 1);
    assert_eq!(downloads[0].url.query(), None);
}

#[tokio::test]
async fn invalid_offset_makes_no_requests() {
    let harness = Harness::start().await;
    let param = SearchParam {
        image_url: "query.jpg".into(),
        offset: -1,
        ..SearchParam::default()
    };
    let err = harness.mill().search_image(&param).await.unwrap_err();
    assert!(matches!(err, MillError::InvalidArgument(_)));
    assert!(harness.pictures.received_requests().await.unwrap_or_default().is_empty());
    assert!(harness.service.received_requests().await.unwrap_or_default().is_empty());
}
