//! Simulated page load - the watcher finds the page, then follows edits
//!
//! Watcher events are printed as JSON lines after the log output.

use dom::Document;
use std::rc::Rc;
use tokio::task::LocalSet;
use watcher::{TokioIdleScheduler, Watcher, WatcherConfig};

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_max_level(tracing::Level::DEBUG)
        .init();

    let local = LocalSet::new();
    local
        .run_until(async {
            let doc = Document::new();
            let body = doc.create_element("body");
            doc.append_child(doc.root_id(), body)?;

            let watcher = Watcher::start(&doc, &WatcherConfig::default(), Rc::new(TokioIdleScheduler))?;
            let mut events = watcher.subscribe();

            // The app shell renders first, the page content arrives later
            let topbar = doc.create_element_with("div", &[("class", "notion-topbar")])?;
            doc.append_child(body, topbar)?;

            let page = doc.create_element_with("div", &[("class", "notion-page-content")])?;
            for (id, text) in [("b1", "שלום עולם"), ("b2", "Hello world")] {
                let block = doc.create_element_with("div", &[("data-block-id", id)])?;
                let text = doc.create_text(text);
                doc.append_child(block, text)?;
                doc.append_child(page, block)?;
            }
            let todo = doc.create_element_with("div", &[("placeholder", "To-do"), ("style", "text-align: left")])?;
            doc.append_child(page, todo)?;
            doc.append_child(body, page)?;

            // Host mutation flush, then give the idle drain its turn
            doc.flush_mutations();
            while watcher.drain_pending() {
                tokio::task::yield_now().await;
            }

            // User types a new block: handled synchronously by the narrow observer
            let late = doc.create_element_with("div", &[("data-block-id", "b3")])?;
            doc.append_child(page, late)?;
            doc.flush_mutations();

            while let Ok(event) = events.try_recv() {
                println!("{}", serde_json::to_string(&event)?);
            }
            println!("state: {:?}", watcher.state());
            print!("{}", doc.to_markup(doc.root_id())?);

            Ok::<_, Box<dyn std::error::Error>>(())
        })
        .await
}
