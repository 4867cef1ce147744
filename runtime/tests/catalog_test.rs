//! Event catalogue tests.

#![allow(clippy::expect_used)]
#![allow(clippy::unwrap_used)]

use boxoffice_core::error::ValidationError;
use boxoffice_core::types::{EventFilter, EventId};
use boxoffice_runtime::catalog::{CatalogError, EventCatalog};
use boxoffice_testing::fixtures::new_event;
use boxoffice_testing::{InMemoryStore, test_clock};
use std::sync::Arc;

fn catalog() -> (Arc<InMemoryStore>, EventCatalog) {
    let store = Arc::new(InMemoryStore::new());
    let catalog = EventCatalog::new(store.clone(), Arc::new(test_clock()));
    (store, catalog)
}

#[tokio::test]
async fn test_create_event_starts_unsold() {
    let (store, catalog) = catalog();

    let event = catalog.create(new_event("Quantum Computing Summit", Some(300))).await.unwrap();

    assert_eq!(event.tickets_sold, 0);
    assert_eq!(event.tickets_remaining(), Some(300));
    assert!(event.image_url.starts_with("https://picsum.photos/seed/"));
    assert_eq!(store.event(&event.id), Some(event));
}

#[tokio::test]
async fn test_create_event_requires_organizer() {
    let (store, catalog) = catalog();
    let mut input = new_event("Untitled", None);
    input.organizer = "   ".to_string();

    let err = catalog.create(input).await.unwrap_err();

    assert_eq!(err, CatalogError::Validation(ValidationError::Required { field: "organizer" }));
    assert_eq!(store.event_count(), 0);
}

#[tokio::test]
async fn test_get_unknown_event() {
    let (_, catalog) = catalog();
    let id = EventId::from_string("missing-event");
    assert_eq!(catalog.get(&id).await.unwrap_err(), CatalogError::NotFound(id));
}

#[tokio::test]
async fn test_browse_by_category_and_search() {
    let (_, catalog) = catalog();
    let mut summit = new_event("Quantum Computing Summit", None);
    summit.category = "Tech".to_string();
    summit.organizer = "Future Forward".to_string();
    catalog.create(summit).await.unwrap();
    catalog.create(new_event("Cosmic Funk Fest", Some(5000))).await.unwrap();
    catalog.create(new_event("Deep Space Jazz Night", Some(150))).await.unwrap();

    assert_eq!(catalog.categories().await.unwrap(), vec!["Music", "Tech"]);

    let tech = catalog
        .list(&EventFilter { search: None, category: Some("Tech".into()) })
        .await
        .unwrap();
    assert_eq!(tech.len(), 1);

    let by_organizer = catalog
        .list(&EventFilter { search: Some("future".into()), category: None })
        .await
        .unwrap();
    assert_eq!(by_organizer[0].title, "Quantum Computing Summit");
}
