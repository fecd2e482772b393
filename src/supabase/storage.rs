use async_trait::async_trait;
use reqwest::header::{CACHE_CONTROL, CONTENT_TYPE};
use serde_json::json;

use super::{check, ObjectEntry, ObjectStore, ProviderResult, PutOptions, SupabaseClient};

const LIST_LIMIT: usize = 100;

#[async_trait]
impl ObjectStore for SupabaseClient {
    async fn put(&self, path: &str, bytes: Vec<u8>, options: &PutOptions) -> ProviderResult<()> {
        let url = self.endpoint(
            ["storage", "v1", "object", self.bucket.as_str()]
                .into_iter()
                .chain(path.split('/')),
        )?;

        let response = self
            .authorized(self.http.post(url))
            .header(CONTENT_TYPE, &options.content_type)
            .header(CACHE_CONTROL, format!("max-age={}", options.cache_control_secs))
            .header("x-upsert", options.overwrite.to_string())
            .body(bytes)
            .send()
            .await?;
        check(response).await?;
        Ok(())
    }

    async fn list(&self, prefix: &str, search: &str) -> ProviderResult<Vec<ObjectEntry>> {
        let url = self.endpoint(["storage", "v1", "object", "list", self.bucket.as_str()])?;
        let body = json!({
            "prefix": prefix,
            "search": search,
            "limit": LIST_LIMIT,
            "offset": 0,
            "sortBy": { "column": "name", "order": "asc" },
        });

        let response = self.authorized(self.http.post(url)).json(&body).send().await?;
        Ok(check(response).await?.json().await?)
    }

    async fn remove(&self, paths: &[String]) -> ProviderResult<()> {
        let url = self.endpoint(["storage", "v1", "object", self.bucket.as_str()])?;
        let response = self
            .authorized(self.http.delete(url))
            .json(&json!({ "prefixes": paths }))
            .send()
            .await?;
        check(response).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mockito::Matcher;
    use std::time::Duration;

    fn client(url: &str) -> SupabaseClient {
        SupabaseClient::new(url, "anon-key", "storage", Duration::from_secs(5)).unwrap()
    }

    fn options() -> PutOptions {
        PutOptions {
            content_type: "image/jpeg".into(),
            overwrite: false,
            cache_control_secs: 3600,
        }
    }

    #[actix_web::test]
    async fn put_sends_policy_headers() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/storage/v1/object/storage/profile_photos/jane_doe.jpg")
            .match_header("apikey", "anon-key")
            .match_header("authorization", "Bearer anon-key")
            .match_header("x-upsert", "false")
            .match_header("cache-control", "max-age=3600")
            .match_header("content-type", "image/jpeg")
            .match_body(Matcher::Exact("jpeg-bytes".into()))
            .with_status(200)
            .with_body(r#"{"Key":"storage/profile_photos/jane_doe.jpg"}"#)
            .create_async()
            .await;

        client(&server.url())
            .put("profile_photos/jane_doe.jpg", b"jpeg-bytes".to_vec(), &options())
            .await
            .unwrap();
        mock.assert_async().await;
    }

    #[actix_web::test]
    async fn put_surfaces_provider_message() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("POST", "/storage/v1/object/storage/cloud/a.txt")
            .with_status(400)
            .with_body(r#"{"statusCode":"409","error":"Duplicate","message":"The resource already exists"}"#)
            .create_async()
            .await;

        let err = client(&server.url())
            .put("cloud/a.txt", b"x".to_vec(), &options())
            .await
            .unwrap_err();
        assert_eq!(err.message, "The resource already exists");
        assert_eq!(err.status, Some(400));
    }

    #[actix_web::test]
    async fn list_posts_prefix_and_search() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/storage/v1/object/list/storage")
            .match_body(Matcher::PartialJson(serde_json::json!({
                "prefix": "profile_photos",
                "search": "jane_doe.jpg",
            })))
            .with_status(200)
            .with_body(r#"[{"name":"jane_doe.jpg","id":"1","metadata":{}}]"#)
            .create_async()
            .await;

        let entries = client(&server.url())
            .list("profile_photos", "jane_doe.jpg")
            .await
            .unwrap();
        mock.assert_async().await;
        assert_eq!(
            entries,
            vec![ObjectEntry {
                name: "jane_doe.jpg".into()
            }]
        );
    }

    #[actix_web::test]
    async fn remove_sends_prefixes() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("DELETE", "/storage/v1/object/storage")
            .match_body(Matcher::Json(serde_json::json!({
                "prefixes": ["profile_photos/jane_doe.jpg"],
            })))
            .with_status(200)
            .with_body("[]")
            .create_async()
            .await;

        client(&server.url())
            .remove(&["profile_photos/jane_doe.jpg".to_string()])
            .await
            .unwrap();
        mock.assert_async().await;
    }
}
