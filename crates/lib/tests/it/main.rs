/*! Integration tests for Coedit.
 *
 * This test suite is organized as a single integration test binary
 * following the pattern described by matklad in
 * https://matklad.github.io/2021/02/27/delete-cargo-integration-tests.html
 *
 * The module structure mirrors the main library structure:
 * - crdt: Tests for the shared types (Text, List, Map) and the SharedType union
 * - document: Tests for Document registration, routing, merging and snapshots
 * - operation: Tests for Operation construction and its wire format
 * - store: Tests for DocumentStore
 */

use tracing_subscriber::EnvFilter;

#[ctor::ctor]
fn init_test_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::from_default_env().add_directive("coedit=info".parse().unwrap()),
        )
        .with_test_writer()
        .try_init();
}
