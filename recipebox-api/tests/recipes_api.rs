/// Integration tests for the recipe endpoints
///
/// Each test creates its own users, so they can run in parallel against one
/// database. Without `DATABASE_URL` they return immediately.

mod common;

use axum::http::StatusCode;
use common::{ids, names, send_as, TestContext};
use serde_json::json;

async fn create_recipe(ctx: &TestContext, title: &str, tags: &[&str]) -> i64 {
    let tags: Vec<_> = tags.iter().map(|name| json!({ "name": name })).collect();
    let (status, body) = ctx
        .send(
            "POST",
            "/recipes/",
            Some(json!({
                "title": title,
                "time_minutes": 10,
                "price": "5.00",
                "tags": tags,
            })),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED, "{}", body);
    body["id"].as_i64().unwrap()
}

#[tokio::test]
async fn test_create_recipe_returns_detail() {
    let Some(ctx) = TestContext::new().await else { return };

    let (status, body) = ctx
        .send(
            "POST",
            "/recipes/",
            Some(json!({
                "title": "  Thai curry",
                "time_minutes": 30,
                "price": "8.50",
                "description": "Creamy",
                "ingredients": [{"name": "Coconut milk"}, {"name": " Coconut milk "}],
            })),
        )
        .await;

    assert_eq!(status, StatusCode::CREATED, "{}", body);
    assert!(body["id"].is_i64());
    assert_eq!(body["time_minutes"], 30);
    assert_eq!(body["price"], "8.50");
    assert_eq!(body["description"], "Creamy");
    assert_eq!(body["link"], "");
    assert_eq!(body["tags"], json!([]));
    assert_eq!(names(&body["ingredients"]), vec!["Coconut milk"]);

    ctx.cleanup().await;
}

#[tokio::test]
async fn test_create_reuses_existing_tag() {
    let Some(ctx) = TestContext::new().await else { return };

    let (status, spicy) = ctx.send("POST", "/tags/", Some(json!({"name": "Spicy"}))).await;
    assert_eq!(status, StatusCode::CREATED);

    let (status, body) = ctx
        .send(
            "POST",
            "/recipes/",
            Some(json!({
                "title": "Vindaloo",
                "time_minutes": 45,
                "price": "9.99",
                "tags": [{"name": "Spicy"}, {"name": "Swallow"}],
            })),
        )
        .await;

    assert_eq!(status, StatusCode::CREATED, "{}", body);
    let tags = body["tags"].as_array().unwrap();
    assert_eq!(tags.len(), 2);
    assert!(ids(&body["tags"]).contains(&spicy["id"].as_i64().unwrap()));

    let (_, all_tags) = ctx.send("GET", "/tags/", None).await;
    assert_eq!(names(&all_tags), vec!["Swallow", "Spicy"]);

    ctx.cleanup().await;
}

#[tokio::test]
async fn test_create_validation_errors() {
    let Some(ctx) = TestContext::new().await else { return };

    let (status, body) = ctx.send("POST", "/recipes/", Some(json!({"title": "Soup"}))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "validation_error");
    let fields: Vec<&str> = body["details"]
        .as_array()
        .unwrap()
        .iter()
        .map(|d| d["field"].as_str().unwrap())
        .collect();
    assert!(fields.contains(&"time_minutes"));
    assert!(fields.contains(&"price"));

    let (status, _) = ctx
        .send(
            "POST",
            "/recipes/",
            Some(json!({"title": "Soup", "time_minutes": 5, "price": "1.00", "tags": [{"name": "  "}]})),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = ctx
        .send(
            "POST",
            "/recipes/",
            Some(json!({"title": "Soup", "time_minutes": 5, "price": "-1.00"})),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (_, list) = ctx.send("GET", "/recipes/", None).await;
    assert_eq!(list, json!([]));

    ctx.cleanup().await;
}

#[tokio::test]
async fn test_list_is_owner_scoped_and_newest_first() {
    let Some(ctx) = TestContext::new().await else { return };
    let (_, other_token) = ctx.other_user().await;

    let first = create_recipe(&ctx, "First", &[]).await;
    let second = create_recipe(&ctx, "Second", &[]).await;

    let (status, theirs) = send_as(
        &ctx.app,
        &other_token,
        "POST",
        "/recipes/",
        Some(json!({"title": "Theirs", "time_minutes": 5, "price": "1.00"})),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);

    let (status, list) = ctx.send("GET", "/recipes/", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(ids(&list), vec![second, first]);
    assert!(list[0].get("description").is_none());

    let (_, their_list) = send_as(&ctx.app, &other_token, "GET", "/recipes/", None).await;
    assert_eq!(ids(&their_list), vec![theirs["id"].as_i64().unwrap()]);

    ctx.cleanup().await;
}

#[tokio::test]
async fn test_other_users_recipe_is_not_found() {
    let Some(ctx) = TestContext::new().await else { return };
    let (_, other_token) = ctx.other_user().await;
    let id = create_recipe(&ctx, "Mine", &["Dinner"]).await;
    let uri = format!("/recipes/{}/", id);

    for (method, body) in [
        ("GET", None),
        ("PATCH", Some(json!({"title": "Stolen"}))),
        ("PUT", Some(json!({"title": "Stolen", "time_minutes": 1, "price": "1.00"}))),
        ("DELETE", None),
    ] {
        let (status, _) = send_as(&ctx.app, &other_token, method, &uri, body).await;
        assert_eq!(status, StatusCode::NOT_FOUND, "{}", method);
    }

    let (status, body) = ctx.send("GET", &uri, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["title"], "Mine");
    assert_eq!(names(&body["tags"]), vec!["Dinner"]);

    let (status, _) = ctx.send("GET", "/recipes/999999999/", None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    ctx.cleanup().await;
}

#[tokio::test]
async fn test_patch_tags_replaces_set() {
    let Some(ctx) = TestContext::new().await else { return };
    let id = create_recipe(&ctx, "Stew", &["Winter"]).await;
    let uri = format!("/recipes/{}/", id);

    let (status, body) = ctx
        .send(
            "PATCH",
            &uri,
            Some(json!({"tags": [{"name": "Hearty"}, {"name": "Cheap"}, {"name": "Hearty"}]})),
        )
        .await;
    assert_eq!(status, StatusCode::OK, "{}", body);

    let (_, body) = ctx.send("GET", &uri, None).await;
    let mut tags = names(&body["tags"]);
    tags.sort();
    assert_eq!(tags, vec!["Cheap", "Hearty"]);
    assert_eq!(body["title"], "Stew");

    ctx.cleanup().await;
}

#[tokio::test]
async fn test_patch_empty_list_clears_without_deleting_tags() {
    let Some(ctx) = TestContext::new().await else { return };
    let id = create_recipe(&ctx, "Salad", &["Fresh", "Quick"]).await;
    let uri = format!("/recipes/{}/", id);

    let (status, body) = ctx.send("PATCH", &uri, Some(json!({"tags": []}))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["tags"], json!([]));

    let (_, tags) = ctx.send("GET", "/tags/", None).await;
    assert_eq!(names(&tags), vec!["Quick", "Fresh"]);

    ctx.cleanup().await;
}

#[tokio::test]
async fn test_patch_without_lists_keeps_associations() {
    let Some(ctx) = TestContext::new().await else { return };
    let id = create_recipe(&ctx, "Toast", &["Breakfast"]).await;
    let uri = format!("/recipes/{}/", id);

    let (status, body) = ctx.send("PATCH", &uri, Some(json!({"price": "2.25"}))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["price"], "2.25");
    assert_eq!(names(&body["tags"]), vec!["Breakfast"]);

    ctx.cleanup().await;
}

#[tokio::test]
async fn test_patch_cannot_change_owner() {
    let Some(ctx) = TestContext::new().await else { return };
    let (other, other_token) = ctx.other_user().await;
    let id = create_recipe(&ctx, "Pie", &[]).await;
    let uri = format!("/recipes/{}/", id);

    let (status, _) = ctx
        .send("PATCH", &uri, Some(json!({"user": other.id, "id": 1})))
        .await;
    assert_eq!(status, StatusCode::OK);

    let (status, body) = ctx.send("GET", &uri, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["id"], id);

    let (status, _) = send_as(&ctx.app, &other_token, "GET", &uri, None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    ctx.cleanup().await;
}

#[tokio::test]
async fn test_put_requires_core_fields() {
    let Some(ctx) = TestContext::new().await else { return };
    let id = create_recipe(&ctx, "Risotto", &["Italian"]).await;
    let uri = format!("/recipes/{}/", id);

    let (status, _) = ctx.send("PUT", &uri, Some(json!({"title": "Risotto"}))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, body) = ctx
        .send(
            "PUT",
            &uri,
            Some(json!({"title": "Mushroom risotto", "time_minutes": 40, "price": "12.00"})),
        )
        .await;
    assert_eq!(status, StatusCode::OK, "{}", body);
    assert_eq!(body["title"], "Mushroom risotto");
    assert_eq!(body["time_minutes"], 40);
    assert_eq!(names(&body["tags"]), vec!["Italian"]);

    ctx.cleanup().await;
}

#[tokio::test]
async fn test_delete_keeps_tags() {
    let Some(ctx) = TestContext::new().await else { return };
    let id = create_recipe(&ctx, "Chili", &["Spicy"]).await;
    let uri = format!("/recipes/{}/", id);

    let (status, body) = ctx.send("DELETE", &uri, None).await;
    assert_eq!(status, StatusCode::NO_CONTENT);
    assert_eq!(body, serde_json::Value::Null);

    let (status, _) = ctx.send("GET", &uri, None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, _) = ctx.send("DELETE", &uri, None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (_, tags) = ctx.send("GET", "/tags/", None).await;
    assert_eq!(names(&tags), vec!["Spicy"]);

    ctx.cleanup().await;
}

#[tokio::test]
async fn test_list_filters() {
    let Some(ctx) = TestContext::new().await else { return };

    let (_, curry) = ctx
        .send(
            "POST",
            "/recipes/",
            Some(json!({
                "title": "Curry",
                "time_minutes": 30,
                "price": "7.00",
                "tags": [{"name": "Spicy"}],
                "ingredients": [{"name": "Rice"}],
            })),
        )
        .await;
    let (_, pasta) = ctx
        .send(
            "POST",
            "/recipes/",
            Some(json!({
                "title": "Arrabbiata",
                "time_minutes": 20,
                "price": "6.00",
                "tags": [{"name": "Spicy"}],
                "ingredients": [{"name": "Pasta"}],
            })),
        )
        .await;
    let plain = create_recipe(&ctx, "Porridge", &["Breakfast"]).await;

    let spicy = curry["tags"][0]["id"].as_i64().unwrap();
    let rice = curry["ingredients"][0]["id"].as_i64().unwrap();
    let breakfast = {
        let (_, body) = ctx.send("GET", &format!("/recipes/{}/", plain), None).await;
        body["tags"][0]["id"].as_i64().unwrap()
    };

    let (status, list) = ctx.send("GET", &format!("/recipes/?tags={}", spicy), None).await;
    assert_eq!(status, StatusCode::OK);
    let mut found = ids(&list);
    found.sort();
    let mut expected = vec![curry["id"].as_i64().unwrap(), pasta["id"].as_i64().unwrap()];
    expected.sort();
    assert_eq!(found, expected);

    let (_, list) = ctx
        .send("GET", &format!("/recipes/?tags={},{}", spicy, breakfast), None)
        .await;
    assert_eq!(list.as_array().unwrap().len(), 3);

    let (_, list) = ctx
        .send("GET", &format!("/recipes/?tags={}&ingredients={}", spicy, rice), None)
        .await;
    assert_eq!(ids(&list), vec![curry["id"].as_i64().unwrap()]);

    let (_, list) = ctx.send("GET", "/recipes/?tags=", None).await;
    assert_eq!(list.as_array().unwrap().len(), 3);

    let (status, _) = ctx.send("GET", "/recipes/?tags=spicy", None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    ctx.cleanup().await;
}

#[tokio::test]
async fn test_malformed_json_is_bad_request() {
    let Some(ctx) = TestContext::new().await else { return };

    use axum::body::Body;
    use axum::http::Request;
    use tower::Service as _;

    let request = Request::builder()
        .method("POST")
        .uri("/recipes/")
        .header("authorization", ctx.auth_header())
        .header("content-type", "application/json")
        .body(Body::from("{\"title\": "))
        .unwrap();

    let response = ctx.app.clone().call(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    ctx.cleanup().await;
}

#[tokio::test]
async fn test_nul_character_in_nested_name_is_rejected() {
    let Some(ctx) = TestContext::new().await else { return };

    let (status, body) = ctx
        .send(
            "POST",
            "/recipes/",
            Some(json!({
                "title": "Soup",
                "time_minutes": 5,
                "price": "1.00",
                "tags": [{"name": "Good"}, {"name": "Bad\u{0}Name"}],
            })),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST, "{}", body);
    assert_eq!(body["details"][0]["field"], "tags");

    // Validation runs before any tag is created
    let (_, tags) = ctx.send("GET", "/tags/", None).await;
    assert_eq!(tags, json!([]));

    ctx.cleanup().await;
}

#[tokio::test]
async fn test_nul_character_in_recipe_fields_is_rejected() {
    let Some(ctx) = TestContext::new().await else { return };

    let (status, body) = ctx
        .send(
            "POST",
            "/recipes/",
            Some(json!({"title": "So\u{0}up", "time_minutes": 5, "price": "1.00"})),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["details"][0]["field"], "title");

    let id = create_recipe(&ctx, "Soup", &[]).await;
    let (status, body) = ctx
        .send(
            "PATCH",
            &format!("/recipes/{}/", id),
            Some(json!({"description": "a\u{0}b", "link": "\u{0}"})),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["details"].as_array().unwrap().len(), 2);

    ctx.cleanup().await;
}

#[tokio::test]
async fn test_non_numeric_id_is_json_not_found() {
    let Some(ctx) = TestContext::new().await else { return };

    for (method, uri) in [
        ("GET", "/recipes/abc/"),
        ("DELETE", "/recipes/abc/"),
        ("GET", "/recipes/99999999999999999999/"),
    ] {
        let (status, body) = ctx.send(method, uri, None).await;
        assert_eq!(status, StatusCode::NOT_FOUND, "{} {}", method, uri);
        assert_eq!(body["error"], "not_found");
    }

    let (status, body) = ctx
        .send("PATCH", "/recipes/abc/", Some(json!({"title": "x"})))
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"], "not_found");

    ctx.cleanup().await;
}
