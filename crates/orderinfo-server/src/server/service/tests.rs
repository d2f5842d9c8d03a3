use super::{ServiceState, catalog::ProductCatalogService, orders::OrderManagerService};
use crate::server::config::ServerConfig;
use core::{num::NonZeroUsize, time::Duration};
use orderinfo_core::proto::{
    Order, OrderId, Product, ProductId, SearchQuery, ShipmentStatus,
    order_manager_client::OrderManagerClient,
    order_manager_server::{OrderManager, OrderManagerServer},
    product_info_client::ProductInfoClient,
    product_info_server::{ProductInfo, ProductInfoServer},
};
use std::{collections::HashSet, net::SocketAddr};
use tokio::{net::TcpListener, sync::mpsc, time::timeout};
use tokio_stream::{StreamExt, wrappers::ReceiverStream, wrappers::TcpListenerStream};
use tonic::{Code, Request, transport::Server};

fn product(name: &str, price: f32) -> Product {
    Product {
        id: String::new(),
        name: name.to_string(),
        description: format!("{name} description"),
        price,
    }
}

fn order(id: &str, items: &[&str]) -> Order {
    Order {
        id: id.to_string(),
        items: items.iter().map(|s| s.to_string()).collect(),
        description: String::new(),
        price: 0.0,
        destination: String::new(),
    }
}

#[tokio::test]
async fn added_products_round_trip_with_distinct_ids() {
    let catalog = ProductCatalogService::new(ServiceState::new(ServerConfig::default()));

    let first = catalog
        .add_product(Request::new(product("Apple iPhone 11", 1000.0)))
        .await
        .unwrap()
        .into_inner();
    let second = catalog
        .add_product(Request::new(product("Google Pixel", 700.0)))
        .await
        .unwrap()
        .into_inner();
    assert_ne!(first.value, second.value);

    let stored = catalog
        .get_product(Request::new(first.clone()))
        .await
        .unwrap()
        .into_inner();
    assert_eq!(stored.id, first.value);
    assert_eq!(stored.name, "Apple iPhone 11");
    assert_eq!(stored.description, "Apple iPhone 11 description");
    assert_eq!(stored.price, 1000.0);
}

#[tokio::test]
async fn client_supplied_product_id_is_ignored() {
    let catalog = ProductCatalogService::new(ServiceState::new(ServerConfig::default()));
    let mut request = product("Apple iPhone 11", 1000.0);
    request.id = "chosen-by-client".to_string();

    let id = catalog
        .add_product(Request::new(request))
        .await
        .unwrap()
        .into_inner();
    assert_ne!(id.value, "chosen-by-client");

    let missing = catalog
        .get_product(Request::new(ProductId {
            value: "chosen-by-client".to_string(),
        }))
        .await
        .unwrap_err();
    assert_eq!(missing.code(), Code::NotFound);
}

#[tokio::test]
async fn unknown_product_is_not_found() {
    let catalog = ProductCatalogService::new(ServiceState::new(ServerConfig::default()));
    let err = catalog
        .get_product(Request::new(ProductId {
            value: "01ARZ3NDEKTSV4RRFFQ69G5FAV".to_string(),
        }))
        .await
        .unwrap_err();
    assert_eq!(err.code(), Code::NotFound);
}

#[tokio::test]
async fn negative_or_nan_price_is_rejected() {
    let state = ServiceState::new(ServerConfig::default());
    let catalog = ProductCatalogService::new(state.clone());

    for price in [-1.0, f32::NAN, f32::INFINITY] {
        let err = catalog
            .add_product(Request::new(product("Broken", price)))
            .await
            .unwrap_err();
        assert_eq!(err.code(), Code::InvalidArgument);
    }
    assert_eq!(state.store.products().len(), 0);
}

#[tokio::test]
async fn add_order_assigns_a_server_id() {
    let orders = OrderManagerService::new(ServiceState::new(ServerConfig::default()));

    let id = orders
        .add_order(Request::new(order("client-id", &["Google Pixel 3A"])))
        .await
        .unwrap()
        .into_inner();
    assert_ne!(id.value, "client-id");

    let stored = orders
        .get_order(Request::new(id.clone()))
        .await
        .unwrap()
        .into_inner();
    assert_eq!(stored.id, id.value);
    assert_eq!(stored.items, vec!["Google Pixel 3A"]);
}

#[tokio::test]
async fn unknown_order_is_not_found() {
    let orders = OrderManagerService::new(ServiceState::new(ServerConfig::default()));
    let err = orders
        .get_order(Request::new(OrderId {
            value: "123456789".to_string(),
        }))
        .await
        .unwrap_err();
    assert_eq!(err.code(), Code::NotFound);
}

#[tokio::test]
async fn search_streams_only_matching_orders() {
    let state = ServiceState::new(ServerConfig::default());
    state.store.orders().upsert(order("1", &["Google Pixel"]));
    state.store.orders().upsert(order("2", &["Apple iPhone"]));
    let orders = OrderManagerService::new(state);

    let stream = orders
        .search_orders(Request::new(SearchQuery {
            substring: "Google".to_string(),
        }))
        .await
        .unwrap()
        .into_inner();
    let found: Vec<_> = stream.map(|o| o.unwrap().id).collect().await;
    assert_eq!(found, vec!["1"]);
}

#[tokio::test]
async fn calls_are_refused_after_shutdown() {
    let state = ServiceState::new(ServerConfig {
        shutdown_timeout: 0,
        ..ServerConfig::default()
    });
    let orders = OrderManagerService::new(state.clone());
    state.shutdown().await;

    let err = orders
        .search_orders(Request::new(SearchQuery {
            substring: String::new(),
        }))
        .await
        .err()
        .unwrap();
    assert_eq!(err.code(), Code::Unavailable);

    let err = orders
        .get_order(Request::new(OrderId {
            value: "1".to_string(),
        }))
        .await
        .unwrap_err();
    assert_eq!(err.code(), Code::Unavailable);
}

/// Serves both services on an ephemeral loopback port.
async fn serve(config: ServerConfig) -> SocketAddr {
    serve_with_state(config).await.0
}

/// Like [`serve`], also returning the state behind the services.
async fn serve_with_state(config: ServerConfig) -> (SocketAddr, ServiceState) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let state = ServiceState::new(config);

    tokio::spawn(
        Server::builder()
            .add_service(ProductInfoServer::new(ProductCatalogService::new(state.clone())))
            .add_service(OrderManagerServer::new(OrderManagerService::new(state.clone())))
            .serve_with_incoming(TcpListenerStream::new(listener)),
    );
    (addr, state)
}

#[tokio::test]
async fn end_to_end_over_grpc() {
    let addr = serve(ServerConfig {
        batch_size: NonZeroUsize::new(3).unwrap(),
        ..ServerConfig::default()
    })
    .await;
    let endpoint = format!("http://{addr}");
    let mut products = ProductInfoClient::connect(endpoint.clone()).await.unwrap();
    let mut orders = OrderManagerClient::connect(endpoint).await.unwrap();

    // Unary.
    let id = products
        .add_product(product("Apple iPhone 11", 1000.0))
        .await
        .unwrap()
        .into_inner();
    let stored = products.get_product(id.clone()).await.unwrap().into_inner();
    assert_eq!(stored.name, "Apple iPhone 11");

    // Client streaming: replies once, after all three are visible.
    let summary = orders
        .update_orders(tokio_stream::iter(vec![
            order("A", &["Google Pixel 3A"]),
            order("B", &["Apple iPhone XS"]),
            order("C", &["Google Home Mini"]),
        ]))
        .await
        .unwrap()
        .into_inner();
    assert_eq!(summary.order_ids, vec!["A", "B", "C"]);
    for id in ["A", "B", "C"] {
        let found = orders
            .get_order(OrderId {
                value: id.to_string(),
            })
            .await
            .unwrap()
            .into_inner();
        assert_eq!(found.id, id);
    }

    // Server streaming.
    let mut matches: Vec<_> = orders
        .search_orders(SearchQuery {
            substring: "Google".to_string(),
        })
        .await
        .unwrap()
        .into_inner()
        .map(|o| o.unwrap().id)
        .collect()
        .await;
    matches.sort();
    assert_eq!(matches, vec!["A", "C"]);

    // Bidirectional: the full batch is flushed before input ends.
    let (tx, rx) = mpsc::channel(8);
    let mut shipments = orders
        .process_orders(ReceiverStream::new(rx))
        .await
        .unwrap()
        .into_inner();
    for id in ["1", "2", "3"] {
        tx.send(OrderId {
            value: id.to_string(),
        })
        .await
        .unwrap();
    }
    let first = timeout(Duration::from_secs(5), shipments.message())
        .await
        .expect("flush did not arrive before end of input")
        .unwrap()
        .unwrap();
    assert_eq!(first.order_ids, vec!["1", "2", "3"]);
    assert_eq!(first.status(), ShipmentStatus::BatchFull);

    tx.send(OrderId {
        value: "4".to_string(),
    })
    .await
    .unwrap();
    drop(tx);

    let last = shipments.message().await.unwrap().unwrap();
    assert_eq!(last.order_ids, vec!["4"]);
    assert_eq!(last.status(), ShipmentStatus::StreamEnd);
    assert!(shipments.message().await.unwrap().is_none());

    let ids: HashSet<_> = [first.id, last.id].into_iter().collect();
    assert_eq!(ids.len(), 2);
}

#[tokio::test]
async fn update_with_missing_id_fails_and_writes_nothing() {
    let addr = serve(ServerConfig::default()).await;
    let mut orders = OrderManagerClient::connect(format!("http://{addr}"))
        .await
        .unwrap();

    let err = orders
        .update_orders(tokio_stream::iter(vec![
            order("A", &["x"]),
            order("", &["y"]),
        ]))
        .await
        .unwrap_err();
    assert_eq!(err.code(), Code::InvalidArgument);

    let err = orders
        .get_order(OrderId {
            value: "A".to_string(),
        })
        .await
        .unwrap_err();
    assert_eq!(err.code(), Code::NotFound);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_writers_lose_no_updates() {
    const CALLERS: usize = 16;
    const ORDERS_PER_CALL: usize = 25;

    let (addr, state) = serve_with_state(ServerConfig::default()).await;
    let endpoint = format!("http://{addr}");

    let updates = (0..CALLERS).map(|caller| {
        let endpoint = endpoint.clone();
        tokio::spawn(async move {
            let mut orders = OrderManagerClient::connect(endpoint).await.unwrap();
            let batch: Vec<_> = (0..ORDERS_PER_CALL)
                .map(|n| order(&format!("{caller}-{n}"), &["Google Pixel"]))
                .collect();
            orders
                .update_orders(tokio_stream::iter(batch))
                .await
                .unwrap()
                .into_inner()
        })
    });
    let adds = (0..CALLERS).map(|caller| {
        let endpoint = endpoint.clone();
        tokio::spawn(async move {
            let mut products = ProductInfoClient::connect(endpoint).await.unwrap();
            products
                .add_product(product(&format!("Phone {caller}"), 100.0))
                .await
                .unwrap()
                .into_inner()
        })
    });

    let (summaries, product_ids) = tokio::join!(
        futures::future::join_all(updates),
        futures::future::join_all(adds)
    );

    for summary in summaries {
        assert_eq!(summary.unwrap().order_ids.len(), ORDERS_PER_CALL);
    }
    let product_ids: HashSet<_> = product_ids
        .into_iter()
        .map(|id| id.unwrap().value)
        .collect();
    assert_eq!(product_ids.len(), CALLERS);

    let store = &state.store;
    assert_eq!(store.orders().len(), CALLERS * ORDERS_PER_CALL);
    assert_eq!(store.products().len(), CALLERS);
    for caller in 0..CALLERS {
        for n in 0..ORDERS_PER_CALL {
            let id = format!("{caller}-{n}");
            let stored = store.orders().get(&id).unwrap();
            assert_eq!(stored.id, id);
            assert_eq!(stored.items, vec!["Google Pixel"]);
        }
    }
    for id in &product_ids {
        assert_eq!(store.products().get(id).unwrap().id, *id);
    }
}
