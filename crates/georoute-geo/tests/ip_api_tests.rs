use georoute_geo::{GeoLookup, IpApiClient, LookupError};
use httpmock::prelude::*;
use serde_json::json;

#[tokio::test]
async fn success_response_is_decoded() {
    let server = MockServer::start_async().await;
    let mock = server
        .mock_async(|when, then| {
            when.method(GET).path("/json/8.8.8.8");
            then.status(200).json_body(json!({
                "status": "success",
                "country": "United States",
                "city": "Ashburn",
                "lat": 39.03,
                "lon": -77.5,
                "isp": "Google LLC",
                "org": "Google Public DNS",
                "as": "AS15169 Google LLC",
                "query": "8.8.8.8"
            }));
        })
        .await;

    let client = IpApiClient::new(server.base_url()).unwrap();
    let record = client.lookup("8.8.8.8").await.unwrap();

    mock.assert_async().await;
    assert!(record.is_success());
    assert_eq!(record.city.as_deref(), Some("Ashburn"));
    assert_eq!(record.lat, Some(39.03));
    assert_eq!(record.lon, Some(-77.5));
    assert_eq!(record.as_name.as_deref(), Some("AS15169 Google LLC"));
}

#[tokio::test]
async fn fail_status_is_returned_as_record() {
    let server = MockServer::start_async().await;
    server
        .mock_async(|when, then| {
            when.method(GET).path("/json/10.0.0.1");
            then.status(200).json_body(json!({
                "status": "fail",
                "message": "private range",
                "query": "10.0.0.1"
            }));
        })
        .await;

    let client = IpApiClient::new(server.base_url()).unwrap();
    let record = client.lookup("10.0.0.1").await.unwrap();

    assert!(!record.is_success());
    assert_eq!(record.message.as_deref(), Some("private range"));
    assert_eq!(record.lat, None);
}

#[tokio::test]
async fn http_error_status_is_a_lookup_error() {
    let server = MockServer::start_async().await;
    server
        .mock_async(|when, then| {
            when.method(GET).path("/json/1.1.1.1");
            then.status(429).body("rate limited");
        })
        .await;

    let client = IpApiClient::new(server.base_url()).unwrap();
    let err = client.lookup("1.1.1.1").await.unwrap_err();

    assert!(matches!(err, LookupError::Status(429)));
}

#[tokio::test]
async fn malformed_body_is_a_decode_error() {
    let server = MockServer::start_async().await;
    server
        .mock_async(|when, then| {
            when.method(GET).path("/json/1.1.1.1");
            then.status(200).body("<html>maintenance</html>");
        })
        .await;

    let client = IpApiClient::new(server.base_url()).unwrap();
    let err = client.lookup("1.1.1.1").await.unwrap_err();

    assert!(matches!(err, LookupError::Decode(_)));
}

#[tokio::test]
async fn unreachable_provider_is_a_transport_error() {
    let client = IpApiClient::new("http://127.0.0.1:1").unwrap();
    let err = client.lookup("1.1.1.1").await.unwrap_err();

    assert!(matches!(err, LookupError::Transport(_)));
}
