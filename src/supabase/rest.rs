use async_trait::async_trait;
use serde_json::Value;

use super::{check, ProviderResult, RowStore, SupabaseClient};

#[async_trait]
impl RowStore for SupabaseClient {
    async fn upsert(&self, table: &str, row: Value, on_conflict: &str) -> ProviderResult<()> {
        let mut url = self.endpoint(["rest", "v1", table])?;
        url.query_pairs_mut().append_pair("on_conflict", on_conflict);

        let response = self
            .authorized(self.http.post(url))
            .header("Prefer", "resolution=merge-duplicates,return=minimal")
            .json(&row)
            .send()
            .await?;
        check(response).await?;
        Ok(())
    }

    async fn select_all(&self, table: &str) -> ProviderResult<Vec<Value>> {
        let mut url = self.endpoint(["rest", "v1", table])?;
        url.query_pairs_mut().append_pair("select", "*");

        let response = self.authorized(self.http.get(url)).send().await?;
        Ok(check(response).await?.json().await?)
    }
}
