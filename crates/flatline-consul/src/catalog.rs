//! Node address lookup through the catalog.

use crate::client::{Consul, ConsulRequest, Transport};
use crate::error::ConsulResult;
use crate::types::CatalogNode;

impl<T: Transport> Consul<T> {
    /// `GET /v1/catalog/node/<name>` → the node's advertised address.
    ///
    /// Consul answers an unknown node with `null`, which maps to `None`.
    pub async fn node_address(&self, name: &str) -> ConsulResult<Option<String>> {
        let path = format!("v1/catalog/node/{name}");
        let response = self.call(ConsulRequest::get(path), false).await?;
        if response.body.is_null() {
            return Ok(None);
        }
        let node: CatalogNode = serde_json::from_value(response.body)?;
        Ok(node
            .node
            .map(|n| n.address)
            .filter(|address| !address.is_empty()))
    }
}

#[cfg(test)]
mod tests {
    use crate::client::{Consul, ConsulResponse};
    use crate::testing::ScriptedTransport;
    use http::Method;
    use serde_json::{Value, json};

    #[tokio::test]
    async fn node_address_from_catalog() {
        let transport = ScriptedTransport::new();
        transport.respond(
            Method::GET,
            "v1/catalog/node/foobar",
            vec![Ok(ConsulResponse::new(json!({
                "Node": {
                    "Node": "foobar",
                    "Address": "10.1.10.12",
                    "TaggedAddresses": { "wan": "10.1.10.12" }
                },
                "Services": {
                    "consul": { "ID": "consul", "Service": "consul", "Tags": null, "Port": 8300 }
                }
            })))],
        );
        let consul = Consul::new(transport);

        let address = consul.node_address("foobar").await.unwrap();
        assert_eq!(address.as_deref(), Some("10.1.10.12"));
    }

    #[tokio::test]
    async fn unknown_node_is_none() {
        let transport = ScriptedTransport::new();
        transport.respond(
            Method::GET,
            "v1/catalog/node/ghost",
            vec![Ok(ConsulResponse::new(Value::Null))],
        );
        let consul = Consul::new(transport);

        assert_eq!(consul.node_address("ghost").await.unwrap(), None);
    }
}
