use chrono::Utc;
use dual_native::model::{Author, RawBlock};
use dual_native::store::RawDocument;
use dual_native::{service, MemoryStore, ServerConfig};
use tokio::net::TcpListener;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt::init();

    let store = MemoryStore::new();
    store.insert(demo_document());

    let addr = "127.0.0.1:8787";
    let config = ServerConfig {
        base_url: format!("http://{addr}"),
        ..ServerConfig::default()
    };
    let app = service(store, config);

    println!("Listening on {}", addr);
    let listener = TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

fn demo_document() -> RawDocument {
    let now = Utc::now();
    RawDocument {
        rid: 1,
        doc_type: "post".to_string(),
        title: "Welcome".to_string(),
        status: "publish".to_string(),
        modified: now,
        published: now,
        author: Author {
            id: 1,
            name: "admin".to_string(),
            url: String::new(),
        },
        image: None,
        categories: Vec::new(),
        tags: Vec::new(),
        blocks: vec![
            RawBlock::leaf("heading", "<h2>Getting started</h2>"),
            RawBlock::leaf(
                "paragraph",
                "<p>Fetch this document at <code>/resources/1</code>.</p>",
            ),
        ],
    }
}
