use std::sync::Arc;

use axum::{
    routing::{get, put},
    Router,
};

use crate::features::menu::handlers;
use crate::features::menu::services::MenuService;

/// Create management routes for the menu feature
///
/// Note: This feature requires authentication
pub fn routes(service: Arc<MenuService>) -> Router {
    Router::new()
        .route(
            "/api/menu/categories",
            get(handlers::list_categories).post(handlers::create_category),
        )
        .route(
            "/api/menu/categories/reorder",
            put(handlers::reorder_categories),
        )
        .route(
            "/api/menu/categories/{id}",
            get(handlers::get_category)
                .put(handlers::update_category)
                .delete(handlers::delete_category),
        )
        .route(
            "/api/menu/items",
            get(handlers::list_items).post(handlers::create_item),
        )
        .route("/api/menu/items/reorder", put(handlers::reorder_items))
        .route(
            "/api/menu/items/{id}",
            get(handlers::get_item)
                .put(handlers::update_item)
                .patch(handlers::toggle_item_availability)
                .delete(handlers::delete_item),
        )
        .with_state(service)
}

/// Create guest routes for the menu feature
///
/// Note: This feature is public (no authentication required)
pub fn public_routes(service: Arc<MenuService>) -> Router {
    Router::new()
        .route(
            "/api/menu/{venue_id}/public",
            get(handlers::get_public_menu),
        )
        .with_state(service)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::config::MenuConfig;
    use crate::features::auth::model::AuthenticatedUser;
    use crate::features::menu::models::venue::VenueStatus;
    use crate::features::menu::models::Venue;
    use crate::features::menu::repositories::memory::InMemoryMenuRepository;
    use crate::shared::test_helpers::{admin_user, manager_user, with_user};
    use axum::http::StatusCode;
    use axum_test::TestServer;
    use fake::{faker::lorem::en::Word, Fake};
    use serde_json::{json, Value};

    struct Harness {
        repo: Arc<InMemoryMenuRepository>,
        venue: Venue,
    }

    impl Harness {
        async fn new() -> Self {
            let repo = Arc::new(InMemoryMenuRepository::new());
            let venue = repo.add_venue("manager-1", VenueStatus::Active).await;
            Self { repo, venue }
        }

        fn server(&self, user: Option<AuthenticatedUser>) -> TestServer {
            let service = Arc::new(MenuService::new(self.repo.clone(), MenuConfig::default()));
            let protected = match user {
                Some(user) => with_user(routes(service.clone()), user),
                None => routes(service.clone()),
            };
            TestServer::new(protected.merge(public_routes(service))).unwrap()
        }

        async fn create_category(&self, server: &TestServer, parent_id: Option<&str>) -> Value {
            let name: String = Word().fake();
            let response = server
                .post("/api/menu/categories")
                .json(&json!({
                    "venue_id": self.venue.id,
                    "name": name,
                    "parent_id": parent_id,
                }))
                .await;
            response.assert_status(StatusCode::CREATED);
            response.json::<Value>()["data"].clone()
        }
    }

    #[tokio::test]
    async fn test_requires_authentication() {
        let harness = Harness::new().await;
        let server = harness.server(None);

        let response = server
            .get("/api/menu/categories")
            .add_query_param("venue_id", harness.venue.id)
            .await;

        response.assert_status(StatusCode::UNAUTHORIZED);
        assert_eq!(response.json::<Value>()["success"], false);
    }

    #[tokio::test]
    async fn test_foreign_manager_is_forbidden() {
        let harness = Harness::new().await;
        let owner = harness.server(Some(manager_user("manager-1")));
        let category = harness.create_category(&owner, None).await;

        let intruder = harness.server(Some(manager_user("manager-2")));
        let response = intruder
            .get(&format!("/api/menu/categories/{}", category["id"].as_str().unwrap()))
            .await;
        response.assert_status(StatusCode::FORBIDDEN);

        let response = intruder
            .post("/api/menu/categories")
            .json(&json!({ "venue_id": harness.venue.id, "name": "Sneaky" }))
            .await;
        response.assert_status(StatusCode::FORBIDDEN);

        // admins manage every venue
        let admin = harness.server(Some(admin_user()));
        admin
            .get("/api/menu/categories")
            .add_query_param("venue_id", harness.venue.id)
            .await
            .assert_status_ok();
    }

    #[tokio::test]
    async fn test_create_category_and_item() {
        let harness = Harness::new().await;
        let server = harness.server(Some(manager_user("manager-1")));

        let first = harness.create_category(&server, None).await;
        let second = harness.create_category(&server, None).await;
        assert_eq!(first["display_order"], 0);
        assert_eq!(second["display_order"], 1);

        let response = server
            .post("/api/menu/items")
            .json(&json!({
                "category_id": first["id"],
                "name": "Tomato soup",
                "price": 650,
            }))
            .await;
        response.assert_status(StatusCode::CREATED);
        let item = response.json::<Value>()["data"].clone();
        assert_eq!(item["display_order"], 0);
        assert_eq!(item["is_available"], true);

        let tree = server
            .get("/api/menu/categories")
            .add_query_param("venue_id", harness.venue.id)
            .await
            .json::<Value>();
        assert_eq!(tree["meta"]["total"], 2);
        assert_eq!(tree["data"][0]["items"][0]["name"], "Tomato soup");

        let items = server
            .get("/api/menu/items")
            .add_query_param("venue_id", harness.venue.id)
            .await
            .json::<Value>();
        assert_eq!(items["data"][0]["name"], "Tomato soup");
        assert_eq!(items["data"][0]["category"]["id"], first["id"]);
        assert_eq!(items["data"][0]["category"]["name"], first["name"]);
    }

    #[tokio::test]
    async fn test_invalid_payloads_are_rejected() {
        let harness = Harness::new().await;
        let server = harness.server(Some(manager_user("manager-1")));
        let category = harness.create_category(&server, None).await;

        let response = server
            .post("/api/menu/items")
            .json(&json!({ "category_id": category["id"], "name": "", "price": -1 }))
            .await;
        response.assert_status(StatusCode::BAD_REQUEST);

        let response = server
            .put("/api/menu/categories/reorder")
            .json(&json!({ "venue_id": harness.venue.id, "ordered_ids": [] }))
            .await;
        response.assert_status(StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_circular_update_is_bad_request() {
        let harness = Harness::new().await;
        let server = harness.server(Some(manager_user("manager-1")));
        let parent = harness.create_category(&server, None).await;
        let parent_id = parent["id"].as_str().unwrap().to_string();
        let child = harness.create_category(&server, Some(&parent_id)).await;

        let response = server
            .put(&format!("/api/menu/categories/{}", parent_id))
            .json(&json!({ "parent_id": child["id"] }))
            .await;

        response.assert_status(StatusCode::BAD_REQUEST);
        let body = response.json::<Value>();
        assert_eq!(body["success"], false);
        assert_eq!(body["message"], "Cannot create circular category reference");
    }

    #[tokio::test]
    async fn test_delete_last_category_and_move_without_target() {
        let harness = Harness::new().await;
        let server = harness.server(Some(manager_user("manager-1")));
        let only = harness.create_category(&server, None).await;
        let only_id = only["id"].as_str().unwrap().to_string();

        server
            .delete(&format!("/api/menu/categories/{}", only_id))
            .await
            .assert_status(StatusCode::BAD_REQUEST);

        harness.create_category(&server, Some(&only_id)).await;
        let response = server
            .delete(&format!("/api/menu/categories/{}", only_id))
            .add_query_param("strategy", "move")
            .await;
        response.assert_status(StatusCode::BAD_REQUEST);
        assert_eq!(
            response.json::<Value>()["message"],
            "Target category is required for the move strategy"
        );
    }

    #[tokio::test]
    async fn test_toggle_and_public_menu() {
        let harness = Harness::new().await;
        let server = harness.server(Some(manager_user("manager-1")));
        let category = harness.create_category(&server, None).await;
        let item = server
            .post("/api/menu/items")
            .json(&json!({ "category_id": category["id"], "name": "Lemonade" }))
            .await
            .json::<Value>()["data"]
            .clone();

        let toggled = server
            .patch(&format!("/api/menu/items/{}", item["id"].as_str().unwrap()))
            .await;
        toggled.assert_status_ok();
        assert_eq!(toggled.json::<Value>()["data"]["is_available"], false);

        let guest = harness.server(None);
        let menu = guest
            .get(&format!("/api/menu/{}/public", harness.venue.id))
            .await;
        menu.assert_status_ok();
        let body = menu.json::<Value>();
        assert_eq!(body["data"][0]["items"][0]["name"], "Lemonade");
        assert_eq!(body["data"][0]["items"][0]["is_available"], false);
        assert!(body["data"][0].get("display_order").is_none());

        let pending = harness.repo.add_venue("manager-9", VenueStatus::Pending).await;
        guest
            .get(&format!("/api/menu/{}/public", pending.id))
            .await
            .assert_status(StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_missing_item_is_not_found() {
        let harness = Harness::new().await;
        let server = harness.server(Some(manager_user("manager-1")));

        server
            .get(&format!("/api/menu/items/{}", uuid::Uuid::new_v4()))
            .await
            .assert_status(StatusCode::NOT_FOUND);
    }
}
