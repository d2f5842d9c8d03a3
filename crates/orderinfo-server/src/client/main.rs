//! Demo client exercising every `orderinfo` call.

use clap::Parser;
use orderinfo_core::proto::{
    Order, OrderId, Product, SearchQuery, order_manager_client::OrderManagerClient,
    product_info_client::ProductInfoClient,
};
use tokio::sync::mpsc;
use tokio_stream::{StreamExt, wrappers::ReceiverStream};
use tonic::{codec::CompressionEncoding, transport::Channel};

#[derive(Parser, Debug)]
#[command(name = "orderinfo-client", version, about = "Drives an orderinfo server")]
struct Args {
    /// Server endpoint.
    #[arg(long, env = "ORDERINFO_ADDR", default_value = "http://127.0.0.1:50051")]
    addr: String,
}

fn order(id: &str, items: &[&str], destination: &str) -> Order {
    Order {
        id: id.to_string(),
        items: items.iter().map(|s| s.to_string()).collect(),
        description: String::new(),
        price: 0.0,
        destination: destination.to_string(),
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let _ = dotenvy::dotenv();
    let args = Args::parse();

    let channel = Channel::from_shared(args.addr)?.connect().await?;
    let mut products = ProductInfoClient::new(channel.clone());
    let mut orders =
        OrderManagerClient::new(channel).send_compressed(CompressionEncoding::Zstd);

    let id = products
        .add_product(Product {
            id: String::new(),
            name: "Apple iPhone 11".to_string(),
            description: "Meet Apple iPhone 11. All-new dual-camera system.".to_string(),
            price: 1000.0,
        })
        .await?
        .into_inner();
    println!("Product ID: {} added successfully", id.value);

    let product = products.get_product(id).await?.into_inner();
    println!("Product: {product:?}");

    let summary = orders
        .update_orders(tokio_stream::iter(vec![
            order("102", &["Google Pixel 3A", "Mac Book Pro"], "Mountain View, CA"),
            order("103", &["Apple Watch S4"], "San Jose, CA"),
            order("104", &["Google Home Mini", "Google Nest Hub"], "Mountain View, CA"),
        ]))
        .await?
        .into_inner();
    println!("Update Orders Res: {}", summary.message);

    let found = orders
        .get_order(OrderId {
            value: "102".to_string(),
        })
        .await?
        .into_inner();
    println!("Order: {found:?}");

    let mut search = orders
        .search_orders(SearchQuery {
            substring: "Google".to_string(),
        })
        .await?
        .into_inner();
    while let Some(matched) = search.next().await {
        println!("Search Result: {:?}", matched?);
    }

    // Shipments are read on a separate task while identifiers are still being
    // sent.
    let (tx, rx) = mpsc::channel(8);
    let mut shipments = orders
        .process_orders(ReceiverStream::new(rx))
        .await?
        .into_inner();
    let reader = tokio::spawn(async move {
        while let Some(shipment) = shipments.next().await {
            match shipment {
                Ok(s) => println!(
                    "Combined shipment {} [{}]: {:?} ({})",
                    s.id,
                    s.destination,
                    s.order_ids,
                    s.status().as_str_name()
                ),
                Err(status) => {
                    eprintln!("Shipment stream failed: {status}");
                    break;
                }
            }
        }
    });

    for id in ["102", "103", "104", "101"] {
        tx.send(OrderId {
            value: id.to_string(),
        })
        .await?;
    }
    drop(tx);
    reader.await?;

    Ok(())
}
