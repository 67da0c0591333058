// Common test utilities and fixtures


// Re-export commonly used items
// Note: These may appear unused in some test binaries but are used in others
#[allow(unused_imports)]
pub use fixtures::{log_document, CountingMetadataStore, MockEngine};
#[allow(unused_imports)]
pub use helpers::{
    create_test_registry, create_test_registry_with, create_test_services, test_config,
    TestRegistry,
};
