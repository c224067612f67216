mod common;

use anyhow::Result;
use reqwest::StatusCode;
use serde_json::{json, Value};

#[tokio::test]
async fn create_list_delete_destination() -> Result<()> {
    let server = common::spawn_server().await?;
    let token = common::id_token(&server, "alice").await?;

    let res = server
        .client
        .post(server.url("/destinations"))
        .bearer_auth(&token)
        .json(&common::paris())
        .send()
        .await?;
    assert_eq!(res.status(), StatusCode::NO_CONTENT);

    let res = server
        .client
        .get(server.url("/destinations?user=alice"))
        .bearer_auth(&token)
        .send()
        .await?;
    assert_eq!(res.status(), StatusCode::OK);
    let destinations = res.json::<Vec<Value>>().await?;
    assert_eq!(destinations, vec![common::paris()]);

    let res = server
        .client
        .delete(server.url("/destinations?place_id=p1"))
        .bearer_auth(&token)
        .send()
        .await?;
    assert_eq!(res.status(), StatusCode::NO_CONTENT);

    let destinations = server
        .client
        .get(server.url("/destinations?user=alice"))
        .bearer_auth(&token)
        .send()
        .await?
        .json::<Vec<Value>>()
        .await?;
    assert!(destinations.is_empty());
    Ok(())
}

#[tokio::test]
async fn destinations_are_stored_per_user() -> Result<()> {
    let server = common::spawn_server().await?;
    let alice = common::id_token(&server, "alice").await?;
    let bob = common::id_token(&server, "bob").await?;

    let mut rome = common::paris();
    rome["place_id"] = json!("p2");
    rome["name"] = json!("Rome");

    let posts = [(&alice, common::paris()), (&bob, rome)];
    let results = futures::future::join_all(posts.iter().map(|(token, body)| {
        server
            .client
            .post(server.url("/destinations"))
            .bearer_auth(token)
            .json(body)
            .send()
    }))
    .await;
    for res in results {
        assert_eq!(res?.status(), StatusCode::NO_CONTENT);
    }

    let bobs = server
        .client
        .get(server.url("/destinations?user=bob"))
        .bearer_auth(&alice)
        .send()
        .await?
        .json::<Vec<Value>>()
        .await?;
    assert_eq!(bobs.len(), 1);
    assert_eq!(bobs[0]["name"], "Rome");

    // Deleting as bob never touches alice's partition
    let res = server
        .client
        .delete(server.url("/destinations?place_id=p1"))
        .bearer_auth(&bob)
        .send()
        .await?;
    assert_eq!(res.status(), StatusCode::NO_CONTENT);
    let alices = server
        .client
        .get(server.url("/destinations?user=alice"))
        .bearer_auth(&alice)
        .send()
        .await?
        .json::<Vec<Value>>()
        .await?;
    assert_eq!(alices.len(), 1);
    Ok(())
}

#[tokio::test]
async fn missing_query_parameters_are_validation_errors() -> Result<()> {
    let server = common::spawn_server().await?;
    let token = common::id_token(&server, "alice").await?;

    for (method, param) in [(reqwest::Method::GET, "user"), (reqwest::Method::DELETE, "place_id")] {
        let res = server
            .client
            .request(method, server.url("/destinations"))
            .bearer_auth(&token)
            .send()
            .await?;
        assert_eq!(res.status(), StatusCode::BAD_REQUEST);
        let body = res.json::<Value>().await?;
        assert_eq!(body["code"], "VALIDATION_ERROR");
        assert!(body["field_errors"].get(param).is_some(), "{}", body);
    }
    Ok(())
}

#[tokio::test]
async fn invalid_destination_bodies_are_rejected() -> Result<()> {
    let server = common::spawn_server().await?;
    let token = common::id_token(&server, "alice").await?;

    let mut missing = common::paris();
    missing.as_object_mut().unwrap().remove("longitude");
    let res = server
        .client
        .post(server.url("/destinations"))
        .bearer_auth(&token)
        .json(&missing)
        .send()
        .await?;
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);
    let body = res.json::<Value>().await?;
    assert_eq!(body["field_errors"]["longitude"], "expected number, got missing");

    let mut mistyped = common::paris();
    mistyped["latitude"] = json!("48.85");
    let res = server
        .client
        .post(server.url("/destinations"))
        .bearer_auth(&token)
        .json(&mistyped)
        .send()
        .await?;
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);

    let res = server
        .client
        .post(server.url("/destinations"))
        .bearer_auth(&token)
        .header("Content-Type", "application/json")
        .body("{not json")
        .send()
        .await?;
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);
    assert_eq!(res.json::<Value>().await?["code"], "INVALID_JSON");

    let listed = server
        .client
        .get(server.url("/destinations?user=alice"))
        .bearer_auth(&token)
        .send()
        .await?
        .json::<Vec<Value>>()
        .await?;
    assert!(listed.is_empty());
    Ok(())
}

#[tokio::test]
async fn oversized_bodies_are_refused() -> Result<()> {
    let mut config = travelmap_gateway::config::AppConfig::development();
    config.api.max_request_size_bytes = 1024;
    let server = common::spawn_with(config).await?;
    let token = common::id_token(&server, "alice").await?;

    let mut big = common::paris();
    big["notes"] = json!("x".repeat(4096));
    let res = server
        .client
        .post(server.url("/destinations"))
        .bearer_auth(&token)
        .json(&big)
        .send()
        .await?;
    assert_eq!(res.status(), StatusCode::PAYLOAD_TOO_LARGE);
    Ok(())
}

#[tokio::test]
async fn unavailable_credential_authority_fails_closed() -> Result<()> {
    let mut config = travelmap_gateway::config::AppConfig::development();
    config.broker.signing_secret = String::new();
    let server = common::spawn_with(config).await?;

    // Sign-up itself needs a credential for the user pool
    let res = server
        .client
        .post(server.url("/auth/create_user"))
        .json(&json!({ "username": "alice", "password": common::PASSWORD, "email": "a@example.com" }))
        .send()
        .await?;
    assert_eq!(res.status(), StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(res.json::<Value>().await?["code"], "SERVICE_UNAVAILABLE");
    Ok(())
}
