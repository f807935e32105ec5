use std::sync::Arc;

use httpmock::prelude::*;
use parking_lot::Mutex;
use serde_json::json;
use storefront_client::{
    ClientError, ClientHooks, MultipartForm, ReadContext, RequestParams, ResponseFailure,
    SessionContext, StoreApiClient, StoreApiClientBuilder, Transport,
};

mod common;

use common::ScriptedTransport;

fn client_for(server: &MockServer) -> StoreApiClientBuilder {
    StoreApiClient::builder(server.url("/store-api")).access_token("SWSCKEY")
}

#[tokio::test]
async fn read_context_returns_data_and_status() {
    let server = MockServer::start_async().await;
    let mock = server
        .mock_async(|when, then| {
            when.method(GET)
                .path("/store-api/context")
                .header("sw-access-key", "SWSCKEY")
                .header("accept", "application/json");
            then.status(200).json_body(json!({"currency": {"id": "c1"}}));
        })
        .await;

    let client = client_for(&server).build().expect("client");
    let response = client
        .invoke("readContext get /context", None)
        .await
        .expect("request succeeds");

    assert_eq!(response.status, 200);
    assert_eq!(response.data, json!({"currency": {"id": "c1"}}));
    mock.assert_async().await;
}

#[tokio::test]
async fn typed_call_decodes_the_response() {
    let server = MockServer::start_async().await;
    server
        .mock_async(|when, then| {
            when.method(GET).path("/store-api/context");
            then.status(200).json_body(json!({
                "token": "ctx",
                "currency": {"id": "c1", "isoCode": "EUR"}
            }));
        })
        .await;

    let client = client_for(&server).build().expect("client");
    let response = client.call::<ReadContext>(None).await.expect("decodes");

    assert_eq!(response.data.token.as_deref(), Some("ctx"));
    let currency = response.data.currency.expect("currency");
    assert_eq!(currency.iso_code.as_deref(), Some("EUR"));
}

#[tokio::test]
async fn failed_update_is_normalized_into_client_error() {
    let server = MockServer::start_async().await;
    let mock = server
        .mock_async(|when, then| {
            when.method(PATCH)
                .path("/store-api/context")
                .json_body(json!({"countryId": "DE"}));
            then.status(422).json_body(json!({
                "errors": [{"title": "Invalid country", "detail": "DE is not shippable"}]
            }));
        })
        .await;

    let failures = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&failures);
    let hooks = ClientHooks::new().on_response_error(move |failure| {
        if let ResponseFailure::Response(response) = failure {
            sink.lock().push(response.status);
        }
    });
    let client = client_for(&server).hooks(hooks).build().expect("client");

    let error = client
        .invoke(
            "updateContext patch /context",
            Some(RequestParams::new().body(json!({"countryId": "DE"}))),
        )
        .await
        .expect_err("422 is an error");

    let api = error.as_api_error().expect("api error");
    assert_eq!(api.status, 422);
    assert!(api.url.ends_with("/store-api/context"));
    assert!(error.to_string().contains("[Invalid country] DE is not shippable"));
    assert_eq!(*failures.lock(), vec![422]);
    mock.assert_async().await;
}

#[tokio::test]
async fn failure_without_errors_reports_unknown_error() {
    let server = MockServer::start_async().await;
    server
        .mock_async(|when, then| {
            when.method(POST).path("/store-api/account/customer");
            then.status(403).body("forbidden");
        })
        .await;

    let client = client_for(&server).build().expect("client");
    let error = client
        .invoke("readCustomer post /account/customer", None)
        .await
        .expect_err("403 is an error");

    assert!(error.to_string().contains("Unknown error"));
    assert_eq!(error.as_api_error().expect("api error").status_text, "Forbidden");
}

#[tokio::test]
async fn rotated_context_token_is_stored_and_reported() {
    let server = MockServer::start_async().await;
    server
        .mock_async(|when, then| {
            when.method(POST)
                .path("/store-api/account/login")
                .header("sw-context-token", "old");
            then.status(200)
                .header("sw-context-token", "new")
                .json_body(json!({"contextToken": "new"}));
        })
        .await;
    let follow_up = server
        .mock_async(|when, then| {
            when.method(GET)
                .path("/store-api/context")
                .header("sw-context-token", "new");
            then.status(200)
                .header("sw-context-token", "new")
                .json_body(json!({}));
        })
        .await;

    let changes = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&changes);
    let hooks =
        ClientHooks::new().on_context_changed(move |token| sink.lock().push(token.to_owned()));
    let client = client_for(&server)
        .context_token("old")
        .hooks(hooks)
        .build()
        .expect("client");

    client
        .invoke(
            "loginCustomer post /account/login",
            Some(RequestParams::new().body(json!({"username": "a@b.c", "password": "pw"}))),
        )
        .await
        .expect("login");
    client
        .invoke("readContext get /context", None)
        .await
        .expect("context");

    assert_eq!(client.context_token().as_deref(), Some("new"));
    // Once for the initial token, once for the rotation; an unchanged token is not reported.
    assert_eq!(*changes.lock(), vec!["old".to_owned(), "new".to_owned()]);
    follow_up.assert_async().await;
}

#[tokio::test]
async fn path_and_query_parameters_are_rendered() {
    let server = MockServer::start_async().await;
    let mock = server
        .mock_async(|when, then| {
            when.method(POST)
                .path("/store-api/product-listing/cat-1")
                .query_param("p", "2")
                .query_param("order", "price-asc");
            then.status(200).json_body(json!({"elements": []}));
        })
        .await;

    let client = client_for(&server).build().expect("client");
    let response = client
        .invoke(
            "readProductListing post /product-listing/{categoryId}",
            Some(
                RequestParams::new()
                    .path_param("categoryId", "cat-1")
                    .query(json!({"p": 2, "limit": null, "order": "price-asc"})),
            ),
        )
        .await
        .expect("listing");

    assert_eq!(response.data, json!({"elements": []}));
    mock.assert_async().await;
}

#[tokio::test]
async fn missing_path_parameter_fails_before_sending() {
    let transport = Arc::new(ScriptedTransport::new());
    let client = StoreApiClient::builder("https://shop.test/store-api")
        .transport(Arc::clone(&transport) as Arc<dyn Transport>)
        .build()
        .expect("client");

    let error = client
        .invoke(
            "readProductListing post /product-listing/{categoryId}",
            Some(RequestParams::new()),
        )
        .await
        .expect_err("missing path parameter");

    assert!(matches!(error, ClientError::MissingPathParameter { .. }));
    assert!(transport.requests().is_empty());
}

#[tokio::test]
async fn request_headers_override_defaults_and_raw_options_win() {
    let transport = Arc::new(ScriptedTransport::new());
    let client = StoreApiClient::builder("https://shop.test/store-api")
        .access_token("default-key")
        .default_header("sw-language-id", "default-lang")
        .transport(Arc::clone(&transport) as Arc<dyn Transport>)
        .build()
        .expect("client");

    client
        .invoke(
            "readContext get /context",
            Some(
                RequestParams::new()
                    .header("sw-language-id", "request-lang")
                    .header("sw-access-key", "request-key")
                    .raw_header("sw-access-key", "raw-key"),
            ),
        )
        .await
        .expect("request");

    let sent = transport.requests();
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].header("sw-language-id"), Some("request-lang"));
    assert_eq!(sent[0].header("sw-access-key"), Some("raw-key"));
    assert_eq!(client.default_headers().get("sw-language-id").as_deref(), Some("default-lang"));
}

#[tokio::test]
async fn multipart_content_type_is_left_to_the_transport() {
    let transport = Arc::new(ScriptedTransport::new());
    let client = StoreApiClient::builder("https://shop.test/store-api")
        .default_header("Content-Type", "multipart/form-data")
        .transport(Arc::clone(&transport) as Arc<dyn Transport>)
        .build()
        .expect("client");
    client
        .register_operation("uploadAvatar post /account/avatar", true)
        .expect("registers");

    client
        .invoke(
            "uploadAvatar post /account/avatar",
            Some(RequestParams::new().multipart(
                MultipartForm::new()
                    .text("customerId", "c1")
                    .file("avatar", "me.png", Some("image/png".to_owned()), vec![1, 2, 3]),
            )),
        )
        .await
        .expect("upload");

    let sent = transport.requests();
    assert_eq!(sent[0].header("content-type"), None);
}

#[tokio::test]
async fn transport_failure_surfaces_as_transport_error() {
    let failures = Arc::new(Mutex::new(0usize));
    let sink = Arc::clone(&failures);
    let hooks = ClientHooks::new().on_response_error(move |failure| {
        if matches!(failure, ResponseFailure::Transport(_)) {
            *sink.lock() += 1;
        }
    });
    let client = StoreApiClient::builder("http://127.0.0.1:1/store-api")
        .hooks(hooks)
        .build()
        .expect("client");

    let error = client
        .invoke("readContext get /context", None)
        .await
        .expect_err("nothing listens on port 1");

    assert!(matches!(error, ClientError::Transport(_)));
    assert!(!error.to_string().is_empty());
    assert_eq!(*failures.lock(), 1);
}

#[tokio::test]
async fn session_context_patches_then_refreshes() {
    let server = MockServer::start_async().await;
    let patch = server
        .mock_async(|when, then| {
            when.method(PATCH)
                .path("/store-api/context")
                .json_body(json!({"countryId": "at"}));
            then.status(200).json_body(json!({"contextToken": "ctx"}));
        })
        .await;
    let read = server
        .mock_async(|when, then| {
            when.method(GET).path("/store-api/context");
            then.status(200).json_body(json!({
                "shippingLocation": {"country": {"id": "at"}}
            }));
        })
        .await;

    let session = SessionContext::new(client_for(&server).build().expect("client"));
    session.set_country("at").await.expect("country set");

    assert_eq!(session.country_id().as_deref(), Some("at"));
    patch.assert_async().await;
    read.assert_async().await;
}

fn recording_hooks(events: &Arc<Mutex<Vec<String>>>) -> ClientHooks {
    let on_request = Arc::clone(events);
    let on_success = Arc::clone(events);
    let on_error = Arc::clone(events);
    let on_header = Arc::clone(events);
    let on_context = Arc::clone(events);
    ClientHooks::new()
        .on_request(move |request| on_request.lock().push(format!("request {}", request.method)))
        .on_success_response(move |response| {
            on_success.lock().push(format!("success {}", response.status));
        })
        .on_response_error(move |failure| {
            let event = match failure {
                ResponseFailure::Response(response) => format!("error {}", response.status),
                ResponseFailure::Transport(_) => "error transport".to_owned(),
            };
            on_error.lock().push(event);
        })
        .on_default_header_changed(move |name, value| {
            on_header
                .lock()
                .push(format!("header {name}={}", value.unwrap_or("<removed>")));
        })
        .on_context_changed(move |token| on_context.lock().push(format!("context {token}")))
}

#[tokio::test]
async fn lifecycle_hooks_fire_in_order_before_the_call_settles() {
    let server = MockServer::start_async().await;
    server
        .mock_async(|when, then| {
            when.method(GET).path("/store-api/context");
            then.status(200)
                .header("sw-context-token", "ctx1")
                .json_body(json!({}));
        })
        .await;
    server
        .mock_async(|when, then| {
            when.method(POST).path("/store-api/account/customer");
            then.status(403).json_body(json!({"errors": []}));
        })
        .await;

    let events = Arc::new(Mutex::new(Vec::new()));
    let client = client_for(&server)
        .hooks(recording_hooks(&events))
        .build()
        .expect("client");

    // Construction writes every present default header once.
    assert_eq!(
        *events.lock(),
        vec!["header sw-access-key=SWSCKEY", "header accept=application/json"]
    );
    events.lock().clear();

    client
        .invoke("readContext get /context", None)
        .await
        .expect("context");
    assert_eq!(
        *events.lock(),
        vec![
            "request GET",
            "success 200",
            "header sw-context-token=ctx1",
            "context ctx1",
        ]
    );
    events.lock().clear();

    client
        .invoke("readCustomer post /account/customer", None)
        .await
        .expect_err("403 is an error");
    assert_eq!(*events.lock(), vec!["request POST", "error 403"]);

    client.default_headers().remove("accept");
    assert_eq!(events.lock().last().map(String::as_str), Some("header accept=<removed>"));
}
