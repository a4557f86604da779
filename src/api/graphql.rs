use async_graphql::{Context, EmptySubscription, Object, Schema};
use std::sync::Arc;

use crate::domain::monitor_service::{MonitorResults, MonitorService, PollSummary};
use crate::domain::node::Node;
use crate::domain::types::{DaemonHealth, LabelView, NodeDetail};
use crate::monitors::ColumnDescriptor;

pub type NodewatchSchema = Schema<QueryRoot, MutationRoot, EmptySubscription>;

pub struct QueryRoot;

#[Object]
impl QueryRoot {
    async fn health(&self, ctx: &Context<'_>) -> async_graphql::Result<DaemonHealth> {
        let svc = ctx.data::<Arc<MonitorService>>()?;
        Ok(svc.health().await)
    }

    async fn nodes(&self, ctx: &Context<'_>) -> async_graphql::Result<Vec<Node>> {
        let svc = ctx.data::<Arc<MonitorService>>()?;
        Ok(svc.registry().list().await)
    }

    async fn node(&self, ctx: &Context<'_>, name: String) -> async_graphql::Result<Option<NodeDetail>> {
        let svc = ctx.data::<Arc<MonitorService>>()?;
        Ok(svc.node_detail(&name).await)
    }

    /// Label columns for a node. A negative `max` shows every label.
    async fn labels(
        &self,
        ctx: &Context<'_>,
        name: String,
        #[graphql(default = -1)] max: i32,
        #[graphql(default = true)] dynamic: bool,
    ) -> async_graphql::Result<Option<LabelView>> {
        let svc = ctx.data::<Arc<MonitorService>>()?;
        Ok(svc
            .registry()
            .get(&name)
            .await
            .map(|node| LabelView::new(&node, dynamic, max)))
    }

    async fn columns(&self, ctx: &Context<'_>) -> async_graphql::Result<Vec<ColumnDescriptor>> {
        let svc = ctx.data::<Arc<MonitorService>>()?;
        Ok(svc.columns())
    }

    /// Latest results of a monitor from memory. Never triggers a poll.
    async fn results(
        &self,
        ctx: &Context<'_>,
        monitor_id: String,
    ) -> async_graphql::Result<Option<MonitorResults>> {
        let svc = ctx.data::<Arc<MonitorService>>()?;
        Ok(svc.results(&monitor_id).await)
    }
}

pub struct MutationRoot;

#[Object]
impl MutationRoot {
    /// Run one cycle of `monitorId`, or of every monitor when omitted.
    async fn poll(
        &self,
        ctx: &Context<'_>,
        monitor_id: Option<String>,
    ) -> async_graphql::Result<Vec<PollSummary>> {
        let svc = ctx.data::<Arc<MonitorService>>()?;
        match monitor_id {
            Some(id) => svc
                .poll(&id)
                .await
                .map(|summary| vec![summary])
                .map_err(|e| async_graphql::Error::new(e.to_string())),
            None => Ok(svc.poll_all().await),
        }
    }

    /// Administratively enable or disable a node.
    async fn set_enabled(
        &self,
        ctx: &Context<'_>,
        name: String,
        enabled: bool,
    ) -> async_graphql::Result<Node> {
        let svc = ctx.data::<Arc<MonitorService>>()?;
        svc.registry()
            .set_enabled(&name, enabled)
            .await
            .map_err(|e| async_graphql::Error::new(e.to_string()))?;
        svc.registry()
            .get(&name)
            .await
            .ok_or_else(|| async_graphql::Error::new(format!("unknown node '{}'", name)))
    }
}

pub fn build_schema(monitors: Arc<MonitorService>) -> NodewatchSchema {
    Schema::build(QueryRoot, MutationRoot, EmptySubscription)
        .data(monitors)
        .finish()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::registry::tests::registry_with;
    use crate::monitors::status::NodeStatus;
    use crate::monitors::NodeMonitor;
    use std::time::Duration;

    async fn schema() -> NodewatchSchema {
        let registry = Arc::new(registry_with(&["a", "b"]).await);
        let monitors: Vec<Arc<dyn NodeMonitor>> = vec![Arc::new(NodeStatus::new("nodeStatus"))];
        build_schema(Arc::new(MonitorService::new(
            registry,
            monitors,
            Duration::from_secs(5),
        )))
    }

    #[tokio::test]
    async fn queries_nodes_and_columns() {
        let schema = schema().await;
        let resp = schema
            .execute("{ nodes { name online offlineCause { causeText } } columns { name position } }")
            .await;
        assert!(resp.errors.is_empty(), "{:?}", resp.errors);

        let data = resp.data.into_json().unwrap();
        assert_eq!(data["nodes"].as_array().unwrap().len(), 2);
        assert_eq!(data["nodes"][0]["name"], "a");
        assert_eq!(data["nodes"][0]["online"], true);
        assert!(data["nodes"][0]["offlineCause"].is_null());
        assert_eq!(data["columns"][0]["name"], "Status");
    }

    #[tokio::test]
    async fn poll_mutation_fills_results() {
        let schema = schema().await;
        let before = schema.execute(r#"{ results(monitorId: "nodeStatus") { monitorId } }"#).await;
        assert!(before.data.into_json().unwrap()["results"].is_null());

        let resp = schema.execute("mutation { poll { monitorId polled } }").await;
        assert!(resp.errors.is_empty(), "{:?}", resp.errors);
        let data = resp.data.into_json().unwrap();
        assert_eq!(data["poll"][0]["polled"], 2);

        let after = schema
            .execute(r#"{ results(monitorId: "nodeStatus") { data { node } skipped } }"#)
            .await;
        let data = after.data.into_json().unwrap();
        assert_eq!(data["results"]["data"].as_array().unwrap().len(), 2);

        let unknown = schema.execute(r#"mutation { poll(monitorId: "nope") { polled } }"#).await;
        assert!(!unknown.errors.is_empty());
    }

    #[tokio::test]
    async fn disabling_takes_node_offline() {
        let schema = schema().await;
        let resp = schema
            .execute(r#"mutation { setEnabled(name: "a", enabled: false) { enabled online offlineCause { causeText } } }"#)
            .await;
        assert!(resp.errors.is_empty(), "{:?}", resp.errors);
        let data = resp.data.into_json().unwrap();
        assert_eq!(data["setEnabled"]["online"], false);
        assert_eq!(data["setEnabled"]["offlineCause"]["causeText"], "administratively disabled");

        let missing = schema
            .execute(r#"mutation { setEnabled(name: "ghost", enabled: true) { name } }"#)
            .await;
        assert!(!missing.errors.is_empty());
    }

    #[tokio::test]
    async fn labels_query_limits_prefix() {
        let schema = schema().await;
        let resp = schema
            .execute(r#"{ labels(name: "a", max: 0) { allowed all } }"#)
            .await;
        let data = resp.data.into_json().unwrap();
        assert_eq!(data["labels"]["allowed"].as_array().unwrap().len(), 0);
        assert_eq!(data["labels"]["all"][0], "linux");
    }
}
