use caseflow_storage::conformance::run_conformance_suite;
use caseflow_storage::MemoryStore;

#[tokio::test]
async fn memory_store_passes_conformance_suite() {
    let report = run_conformance_suite(|| async { MemoryStore::new() }).await;
    assert!(report.total > 0);
    assert!(report.failed == 0, "{report}");
}
